#![forbid(unsafe_code)]

//! Shared, version-tracked values with change notification.
//!
//! An [`Observable`] is the "observable field" collaborator of the token
//! engine: reading it inside a derived value makes that value depend on it,
//! and writing it reports the change to the [`UpdateQueue`] so dependents
//! recompute on the next flush.
//!
//! [`UpdateQueue`]: crate::scheduler::UpdateQueue

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::batch;
use super::tracker::{self, SourceId};
use crate::scheduler::UpdateQueue;

type Callback<T> = dyn Fn(&T);

struct Inner<T> {
    value: T,
    version: u64,
    subscribers: Vec<Weak<Callback<T>>>,
}

/// A shared value whose reads are tracked and whose writes are observable.
///
/// Clones share state.
pub struct Observable<T> {
    inner: Rc<RefCell<Inner<T>>>,
    source: SourceId,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            source: self.source,
        }
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                value,
                version: 0,
                subscribers: Vec::new(),
            })),
            source: SourceId::next(),
        }
    }

    /// Current value. Recorded as a dependency of the active evaluation.
    #[must_use]
    pub fn get(&self) -> T {
        tracker::track(self.source);
        self.inner.borrow().value.clone()
    }

    /// Borrow the current value. Recorded like [`get`](Self::get).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        tracker::track(self.source);
        f(&self.inner.borrow().value)
    }

    /// Replace the value. Equal values are ignored.
    pub fn set(&self, value: T) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return;
            }
            inner.value = value;
            inner.version += 1;
        }
        UpdateQueue::notify_changed(self.source);
        self.notify();
    }

    /// Mutate the value in place; notifies only if the result differs.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut next = self.inner.borrow().value.clone();
        f(&mut next);
        self.set(next);
    }

    /// Register a callback invoked with the new value after each change.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let callback: Rc<Callback<T>> = Rc::new(callback);
        self.inner
            .borrow_mut()
            .subscribers
            .push(Rc::downgrade(&callback));
        Subscription::from_guard(callback)
    }

    /// Number of changes applied so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Identity used by the dependency tracker.
    #[must_use]
    pub fn source_id(&self) -> SourceId {
        self.source
    }

    /// Live subscriber count (dropped subscriptions are pruned first).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.borrow_mut();
        inner.subscribers.retain(|w| w.strong_count() > 0);
        inner.subscribers.len()
    }

    fn notify(&self) {
        if batch::is_batching() {
            let this = self.clone();
            batch::defer(move || this.deliver());
        } else {
            self.deliver();
        }
    }

    fn deliver(&self) {
        let (value, callbacks) = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|w| w.strong_count() > 0);
            let callbacks: Vec<Rc<Callback<T>>> =
                inner.subscribers.iter().filter_map(Weak::upgrade).collect();
            (inner.value.clone(), callbacks)
        };
        for callback in callbacks {
            callback(&value);
        }
    }
}

impl<T: Default + Clone + PartialEq + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("source", &self.source)
            .finish()
    }
}

/// RAII guard for a callback registration. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    _guard: Box<dyn Any>,
}

impl Subscription {
    /// Wrap whatever keeps a registration alive (usually the `Rc` whose
    /// `Weak` the publisher holds).
    pub fn from_guard<G: 'static>(guard: G) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
