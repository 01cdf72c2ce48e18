//! Binds a [`Relay`] to a render callback.
//!
//! A `Binding` keeps the last value it rendered, subscribes at most once no
//! matter how often the owning view re-renders, and posts every render to the
//! view's [`UiContext`]. After `detach` nothing reaches the render callback,
//! including renders that were already posted.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use tracing::{debug, trace};

use crate::dispose::DisposeBag;
use crate::relay::{Relay, SubscriptionId, lock};

pub type Job = Box<dyn FnOnce() + Send>;

/// Render callback owned by a binding.
pub type Renderer<T> = Box<dyn FnMut(&T) + Send>;

/// The context view updates must run on.
pub trait UiContext: Send + Sync {
    fn post(&self, job: Job);
}

/// Runs jobs inline, for callers already on the UI context.
#[derive(Clone, Copy, Debug, Default)]
pub struct Immediate;

impl UiContext for Immediate {
    fn post(&self, job: Job) {
        job();
    }
}

/// State shared between a binding and the jobs it posts.
struct Shared<T> {
    value: Mutex<T>,
    render: Mutex<Renderer<T>>,
    // Latest value not yet handed to the renderer.
    pending: Mutex<Option<T>>,
    rendering: AtomicBool,
}

impl<T: Clone> Shared<T> {
    fn deliver(&self, next: T) {
        *lock(&self.value) = next.clone();
        *lock(&self.pending) = Some(next);
        self.drain();
    }

    /// Render pending values until none are left.
    ///
    /// A render that writes back to the relay lands here again while the
    /// outer call is still rendering; it only fills `pending` and the outer
    /// loop renders it next.
    fn drain(&self) {
        loop {
            if self.rendering.swap(true, Ordering::AcqRel) {
                trace!("render already in progress");
                return;
            }
            loop {
                let next = lock(&self.pending).take();
                let Some(next) = next else {
                    break;
                };
                let mut render = lock(&self.render);
                (*render)(&next);
            }
            self.rendering.store(false, Ordering::Release);
            if lock(&self.pending).is_none() {
                return;
            }
        }
    }
}

struct Attachment {
    id: SubscriptionId,
    live: Arc<AtomicBool>,
}

pub struct Binding<T: Clone + Send + 'static> {
    relay: Relay<T>,
    shared: Arc<Shared<T>>,
    context: Arc<dyn UiContext>,
    attachment: Option<Attachment>,
}

impl<T: Clone + Send + 'static> Binding<T> {
    pub fn new(relay: Relay<T>, context: Arc<dyn UiContext>, render: Renderer<T>) -> Self {
        let shared = Arc::new(Shared {
            value: Mutex::new(relay.value()),
            render: Mutex::new(render),
            pending: Mutex::new(None),
            rendering: AtomicBool::new(false),
        });
        Self {
            relay,
            shared,
            context,
            attachment: None,
        }
    }

    /// The last value delivered to this binding.
    pub fn current(&self) -> T {
        lock(&self.shared.value).clone()
    }

    /// Write through to the relay.
    pub fn set(&self, value: T) {
        self.relay.accept(value);
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    /// Subscribe to the relay, placing the subscription in `bag`.
    ///
    /// Does nothing if already attached, so views can call this on every
    /// render. The relay replays its value, so the first render is posted
    /// before this returns.
    pub fn attach(&mut self, bag: &mut DisposeBag) {
        if self.attachment.is_some() {
            trace!("binding already attached");
            return;
        }

        let live = Arc::new(AtomicBool::new(true));
        let observer_live = Arc::clone(&live);
        let shared = Arc::clone(&self.shared);
        let context = Arc::clone(&self.context);

        let subscription = self.relay.subscribe(move |next: &T| {
            let next = next.clone();
            let live = Arc::clone(&observer_live);
            let shared = Arc::clone(&shared);
            context.post(Box::new(move || {
                if !live.load(Ordering::Acquire) {
                    trace!("render dropped after detach");
                    return;
                }
                shared.deliver(next);
            }));
        });

        debug!(id = ?subscription.id(), "binding attached");
        self.attachment = Some(Attachment {
            id: subscription.id(),
            live,
        });
        bag.insert(subscription);
    }

    /// Stop rendering. Safe to call repeatedly and before `attach`.
    ///
    /// The subscription left in the bag is inactive from here on and is
    /// pruned the next time the bag takes a subscription.
    pub fn detach(&mut self) {
        if let Some(attachment) = self.attachment.take() {
            attachment.live.store(false, Ordering::Release);
            self.relay.unsubscribe(attachment.id);
            lock(&self.shared.pending).take();
            debug!(id = ?attachment.id, "binding detached");
        }
    }
}

impl<T: Clone + Send + 'static> Drop for Binding<T> {
    fn drop(&mut self) {
        self.detach();
    }
}
