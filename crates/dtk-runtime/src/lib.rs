#![forbid(unsafe_code)]

//! Runtime support for design tokens.
//!
//! - [`reactive`]: observables, subscriptions, batch scopes and the dependency
//!   tracker used to make derived values reactive.
//! - [`scheduler`]: the batched [`UpdateQueue`] that coalesces invalidations
//!   raised during a script turn into a single flush.
//! - [`config`]: tunables for the scheduler.

pub mod config;
pub mod reactive;
pub mod scheduler;

pub use config::SchedulerConfig;
pub use reactive::{
    BatchScope, DependencyGraph, DependencySet, Invalidate, Invalidation, Observable, SourceId,
    Subscription,
};
pub use scheduler::{FlushError, FlushReport, UpdateQueue, flush};
