//! Latest-value relay.
//!
//! A `Relay<T>` always holds a value. Observers registered with
//! [`Relay::subscribe`] are called once with the current value right away and
//! then again on every [`Relay::accept`], in subscription order.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::trace;

/// Callback registered on a relay.
pub type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Inner<T> {
    current: T,
    observers: Vec<(SubscriptionId, Observer<T>)>,
    next_id: u64,
    closed: bool,
}

impl<T> Inner<T> {
    fn issue_id(&mut self) -> SubscriptionId {
        self.next_id = self.next_id.wrapping_add(1);
        SubscriptionId(self.next_id)
    }
}

/// Removes an observer by id without knowing the relay's value type, so a
/// [`Subscription`] stays untyped and bags can mix relays.
trait Detach: Send + Sync {
    fn detach(&self, id: SubscriptionId);
    fn is_subscribed(&self, id: SubscriptionId) -> bool;
}

impl<T: Send> Detach for Mutex<Inner<T>> {
    fn detach(&self, id: SubscriptionId) {
        let mut inner = lock(self);
        let before = inner.observers.len();
        inner.observers.retain(|(sid, _)| *sid != id);
        if inner.observers.len() == before {
            trace!(?id, "observer already removed");
        }
    }

    fn is_subscribed(&self, id: SubscriptionId) -> bool {
        lock(self).observers.iter().any(|(sid, _)| *sid == id)
    }
}

pub struct Relay<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Relay<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Relay<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                current: initial,
                observers: Vec::new(),
                next_id: 0,
                closed: false,
            })),
        }
    }

    /// The last accepted value.
    pub fn value(&self) -> T {
        lock(&self.inner).current.clone()
    }

    /// Store `value` and notify every observer with it.
    ///
    /// Observers run outside the relay's lock on a snapshot of the list, so an
    /// observer may subscribe, unsubscribe or accept again without deadlocking.
    pub fn accept(&self, value: T) {
        let snapshot: Vec<Observer<T>> = {
            let mut inner = lock(&self.inner);
            inner.current = value.clone();
            if inner.closed {
                trace!("relay closed, value stored without notifying");
                return;
            }
            inner.observers.iter().map(|(_, f)| Arc::clone(f)).collect()
        };
        for observer in snapshot {
            observer(&value);
        }
    }

    /// Register `observer` and replay the current value to it before returning.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let observer: Observer<T> = Arc::new(observer);
        let (id, current, registered) = {
            let mut inner = lock(&self.inner);
            let id = inner.issue_id();
            let registered = !inner.closed;
            if registered {
                inner.observers.push((id, Arc::clone(&observer)));
            }
            (id, inner.current.clone(), registered)
        };
        observer(&current);

        let source: Weak<dyn Detach> = if registered {
            let weak: Weak<Mutex<Inner<T>>> = Arc::downgrade(&self.inner);
            weak
        } else {
            Weak::<Mutex<Inner<T>>>::new()
        };
        Subscription { id, source }
    }

    /// Remove the observer registered under `id`. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.detach(id);
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.inner).observers.len()
    }

    /// Drop every observer and stop notifying. Later `accept`s still update
    /// the stored value; later `subscribe`s only get the replay.
    pub fn close(&self) {
        let dropped = {
            let mut inner = lock(&self.inner);
            inner.closed = true;
            std::mem::take(&mut inner.observers)
        };
        trace!(observers = dropped.len(), "relay closed");
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner).closed
    }
}

impl<T: fmt::Debug> fmt::Debug for Relay<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("Relay")
            .field("current", &inner.current)
            .field("observers", &inner.observers.len())
            .field("closed", &inner.closed)
            .finish()
    }
}

/// Handle to one observer registration. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriptionId,
    source: Weak<dyn Detach>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Unsubscribe. Safe to call any number of times, and after the relay is gone.
    pub fn dispose(&self) {
        if let Some(source) = self.source.upgrade() {
            source.detach(self.id);
        }
    }

    /// Whether the observer is still registered on a live relay.
    pub fn is_active(&self) -> bool {
        self.source
            .upgrade()
            .is_some_and(|source| source.is_subscribed(self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<i64>>>, impl Fn(&i64) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |v: &i64| lock(&sink).push(*v))
    }

    #[test]
    fn subscribe_replays_current_value_before_returning() {
        let relay = Relay::new(7);
        let (seen, cb) = recorder();
        let _sub = relay.subscribe(cb);
        assert_eq!(*lock(&seen), vec![7]);
    }

    #[test]
    fn accept_without_observers_just_stores() {
        let relay = Relay::new(0);
        relay.accept(42);
        assert_eq!(relay.value(), 42);
        assert_eq!(relay.observer_count(), 0);
    }

    #[test]
    fn unsubscribed_observer_gets_nothing_more() {
        let relay = Relay::new(0);
        let (seen, cb) = recorder();
        let sub = relay.subscribe(cb);
        relay.accept(5);
        relay.unsubscribe(sub.id());
        relay.accept(6);
        assert_eq!(*lock(&seen), vec![0, 5]);
        assert_eq!(relay.value(), 6);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let relay = Relay::new(0);
        let (_seen, cb) = recorder();
        let sub = relay.subscribe(cb);
        sub.dispose();
        sub.dispose();
        relay.unsubscribe(sub.id());
        assert_eq!(relay.observer_count(), 0);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let relay = Relay::new(0);
        let (seen, cb) = recorder();
        {
            let _sub = relay.subscribe(cb);
            relay.accept(1);
        }
        relay.accept(2);
        assert_eq!(*lock(&seen), vec![0, 1]);
    }

    #[test]
    fn observers_fire_in_subscription_order() {
        let relay = Relay::new(0);
        let order = Arc::new(Mutex::new(Vec::new()));
        let subs: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|name| {
                let order = Arc::clone(&order);
                relay.subscribe(move |v: &i64| lock(&order).push((name, *v)))
            })
            .collect();
        lock(&order).clear();
        relay.accept(9);
        assert_eq!(*lock(&order), vec![("a", 9), ("b", 9), ("c", 9)]);
        drop(subs);
    }

    #[test]
    fn same_callback_subscribed_twice_fires_twice() {
        let relay = Relay::new(0);
        let (seen, cb) = recorder();
        let cb = Arc::new(cb);
        let first = Arc::clone(&cb);
        let second = Arc::clone(&cb);
        let _a = relay.subscribe(move |v: &i64| first(v));
        let _b = relay.subscribe(move |v: &i64| second(v));
        relay.accept(3);
        assert_eq!(*lock(&seen), vec![0, 0, 3, 3]);
    }

    #[test]
    fn reentrant_accept_does_not_deadlock_or_corrupt() {
        let relay = Relay::new(0);
        let inner = relay.clone();
        let _bump = relay.subscribe(move |v: &i64| {
            if *v == 1 {
                inner.accept(2);
            }
        });
        let (seen, cb) = recorder();
        let _rec = relay.subscribe(cb);
        relay.accept(1);
        assert_eq!(relay.value(), 2);
        assert_eq!(relay.observer_count(), 2);
        assert!(lock(&seen).contains(&2));
    }

    #[test]
    fn observer_may_unsubscribe_during_notification() {
        let relay = Relay::new(0);
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let held = Arc::clone(&slot);
        let sub = relay.subscribe(move |v: &i64| {
            if *v > 0 {
                lock(&held).take();
            }
        });
        *lock(&slot) = Some(sub);
        relay.accept(1);
        assert_eq!(relay.observer_count(), 0);
    }

    #[test]
    fn closed_relay_stops_notifying() {
        let relay = Relay::new(0);
        let (seen, cb) = recorder();
        let _sub = relay.subscribe(cb);
        relay.close();
        relay.accept(4);
        assert!(relay.is_closed());
        assert_eq!(relay.value(), 4);
        assert_eq!(*lock(&seen), vec![0]);

        let (late, cb) = recorder();
        let _late = relay.subscribe(cb);
        relay.accept(5);
        assert_eq!(*lock(&late), vec![4]);
    }

    #[test]
    fn subscription_reports_whether_it_is_active() {
        let relay = Relay::new(0);
        let (_seen, cb) = recorder();
        let sub = relay.subscribe(cb);
        assert!(sub.is_active());
        relay.unsubscribe(sub.id());
        assert!(!sub.is_active());

        let (_seen, cb) = recorder();
        let closed = relay.subscribe(cb);
        relay.close();
        assert!(!closed.is_active());
    }

    #[test]
    fn subscription_outliving_relay_disposes_quietly() {
        let (_seen, cb) = recorder();
        let sub = {
            let relay = Relay::new(0);
            relay.subscribe(cb)
        };
        sub.dispose();
    }
}
