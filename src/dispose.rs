use tracing::trace;

use crate::relay::Subscription;

/// A group of subscriptions released together.
///
/// Each view owns its own bag; disposing (or dropping) the bag unsubscribes
/// everything in it.
#[derive(Debug, Default)]
pub struct DisposeBag {
    subscriptions: Vec<Subscription>,
}

impl DisposeBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `subscription`, dropping entries that were already unsubscribed
    /// some other way.
    pub fn insert(&mut self, subscription: Subscription) {
        self.subscriptions.retain(Subscription::is_active);
        self.subscriptions.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release every subscription. The bag stays usable afterwards.
    pub fn dispose(&mut self) {
        if self.subscriptions.is_empty() {
            return;
        }
        trace!(count = self.subscriptions.len(), "disposing bag");
        for subscription in self.subscriptions.drain(..) {
            subscription.dispose();
        }
    }
}

impl Drop for DisposeBag {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Subscription {
    /// Hand this subscription to `bag`, tying its lifetime to the bag's.
    pub fn disposed_by(self, bag: &mut DisposeBag) {
        bag.insert(self);
    }
}
