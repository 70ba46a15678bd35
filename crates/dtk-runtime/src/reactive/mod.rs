#![forbid(unsafe_code)]

//! Reactive building blocks for design tokens.
//!
//! This module provides change-tracking primitives for reactive token values:
//!
//! - [`Observable`]: A shared, version-tracked value wrapper with change
//!   notification via subscriber callbacks. Reads inside a recording
//!   evaluation are captured as dependencies.
//! - [`Subscription`]: RAII guard that automatically unsubscribes on drop.
//! - [`BatchScope`]: RAII guard that defers all `Observable` notifications
//!   until the scope exits, preventing intermediate callbacks.
//! - [`tracker`]: the recording evaluation context plus the
//!   [`DependencyGraph`] linking observers to the sources they read.
//!
//! # Architecture
//!
//! `Observable<T>` uses `Rc<RefCell<..>>` for single-threaded shared ownership.
//! Subscribers are stored as `Weak` function pointers and cleaned up lazily
//! during notification.
//!
//! Every readable thing (an observable, a token resolution at one element) is
//! identified by a [`SourceId`]. Reads call [`tracker::track`]; derived
//! evaluations run inside [`tracker::record`], and the captured set replaces
//! the observer's previous edges in the thread-local graph.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per mutation that changes the value.
//! 2. Subscribers are notified in registration order.
//! 3. Setting a value equal to the current value is a no-op (no version bump,
//!    no notifications).
//! 4. Dropping a [`Subscription`] removes the callback before the next
//!    notification cycle.
//! 5. An observer's edges always equal the set captured by its most recent
//!    evaluation; sources no longer read are pruned.
//! 6. Within a `BatchScope`, values are updated immediately but notifications
//!    are deferred until the outermost scope exits.

pub mod batch;
pub mod observable;
pub mod tracker;

pub use batch::BatchScope;
pub use observable::{Observable, Subscription};
pub use tracker::{DependencyGraph, DependencySet, Invalidate, Invalidation, SourceId};
