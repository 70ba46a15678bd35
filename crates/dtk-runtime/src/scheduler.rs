#![forbid(unsafe_code)]

//! Batched "next update" queue.
//!
//! Synchronous writes only record *what* changed. The host event loop calls
//! [`UpdateQueue::flush`] once per turn, which:
//!
//! 1. drains changed sources through the [`DependencyGraph`] until no more
//!    observers report [`Invalidation::Changed`] (a fixed point), then
//! 2. runs every scheduled task (CSS writes, subscriber callbacks) in the
//!    order it was scheduled.
//!
//! Tasks may write again; that work is picked up by another pass of the same
//! flush. Passes are bounded by [`SchedulerConfig::max_passes`].
//!
//! # Invariants
//!
//! 1. No task runs before every invalidation pending at the start of its pass
//!    has been applied.
//! 2. A source reported several times before a flush is propagated once.
//! 3. Flushing with nothing pending does nothing and reports zero passes.
//! 4. A flush requested from inside a running flush is a no-op; the outer
//!    flush picks the work up.

use std::cell::RefCell;
use std::collections::VecDeque;

use ahash::AHashSet;
use tracing::{debug, trace, warn};

use crate::config::SchedulerConfig;
use crate::reactive::tracker::{DependencyGraph, Invalidation, SourceId};

type Task = Box<dyn FnOnce()>;

struct QueueState {
    changed: Vec<SourceId>,
    changed_set: AHashSet<SourceId>,
    tasks: Vec<Task>,
    config: SchedulerConfig,
    flushing: bool,
}

impl Default for QueueState {
    fn default() -> Self {
        Self {
            changed: Vec::new(),
            changed_set: AHashSet::new(),
            tasks: Vec::new(),
            config: SchedulerConfig::from_env(),
            flushing: false,
        }
    }
}

thread_local! {
    static QUEUE: RefCell<QueueState> = RefCell::new(QueueState::default());
}

/// Summary of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Propagate-then-run passes performed.
    pub passes: usize,
    /// Observers invalidated across all passes.
    pub invalidated: usize,
    /// Scheduled tasks executed.
    pub tasks_run: usize,
}

impl FlushReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlushError {
    /// Work kept re-enqueueing itself; the remainder was discarded.
    #[error("flush exceeded {max_passes} passes; dropped {dropped} pending items")]
    PassLimit { max_passes: usize, dropped: usize },
}

/// Thread-local handle to the shared update queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateQueue;

impl UpdateQueue {
    pub fn configure(config: SchedulerConfig) {
        QUEUE.with(|q| q.borrow_mut().config = config);
    }

    #[must_use]
    pub fn config() -> SchedulerConfig {
        QUEUE.with(|q| q.borrow().config)
    }

    /// Report that `source` changed; its dependents are invalidated on the
    /// next flush.
    pub fn notify_changed(source: SourceId) {
        QUEUE.with(|q| {
            let mut q = q.borrow_mut();
            if q.changed_set.insert(source) {
                q.changed.push(source);
            }
        });
    }

    /// Run `task` during the next flush, after propagation.
    pub fn schedule(task: impl FnOnce() + 'static) {
        QUEUE.with(|q| q.borrow_mut().tasks.push(Box::new(task)));
    }

    #[must_use]
    pub fn is_pending() -> bool {
        QUEUE.with(|q| {
            let q = q.borrow();
            !q.changed.is_empty() || !q.tasks.is_empty()
        })
    }

    #[must_use]
    pub fn is_flushing() -> bool {
        QUEUE.with(|q| q.borrow().flushing)
    }

    /// Discard all pending work. Returns how many items were dropped.
    pub fn clear() -> usize {
        QUEUE.with(|q| {
            let mut q = q.borrow_mut();
            let dropped = q.changed.len() + q.tasks.len();
            q.changed.clear();
            q.changed_set.clear();
            q.tasks.clear();
            dropped
        })
    }

    /// Apply all pending invalidations, then run scheduled tasks.
    ///
    /// # Errors
    ///
    /// [`FlushError::PassLimit`] when work is still pending after
    /// `max_passes` passes.
    pub fn flush() -> Result<FlushReport, FlushError> {
        let (reentrant, max_passes) = QUEUE.with(|q| {
            let mut q = q.borrow_mut();
            let reentrant = q.flushing;
            q.flushing = true;
            (reentrant, q.config.max_passes)
        });
        if reentrant {
            return Ok(FlushReport::default());
        }
        let _flushing = FlushingGuard;

        let mut report = FlushReport::default();
        while Self::is_pending() {
            if report.passes >= max_passes {
                let dropped = Self::clear();
                warn!(max_passes, dropped, "flush pass limit reached");
                return Err(FlushError::PassLimit {
                    max_passes,
                    dropped,
                });
            }
            report.passes += 1;
            let _span = tracing::debug_span!("token_flush", pass = report.passes).entered();

            loop {
                let changed = take_changed();
                if changed.is_empty() {
                    break;
                }
                report.invalidated += propagate(changed);
            }

            let tasks = QUEUE.with(|q| std::mem::take(&mut q.borrow_mut().tasks));
            for task in tasks {
                task();
                report.tasks_run += 1;
            }
        }

        if !report.is_empty() {
            debug!(
                passes = report.passes,
                invalidated = report.invalidated,
                tasks_run = report.tasks_run,
                "flush complete"
            );
        }
        Ok(report)
    }
}

/// Flush this thread's [`UpdateQueue`].
///
/// # Errors
///
/// See [`UpdateQueue::flush`].
pub fn flush() -> Result<FlushReport, FlushError> {
    UpdateQueue::flush()
}

struct FlushingGuard;

impl Drop for FlushingGuard {
    fn drop(&mut self) {
        QUEUE.with(|q| q.borrow_mut().flushing = false);
    }
}

fn take_changed() -> Vec<SourceId> {
    QUEUE.with(|q| {
        let mut q = q.borrow_mut();
        q.changed_set.clear();
        std::mem::take(&mut q.changed)
    })
}

fn propagate(changed: Vec<SourceId>) -> usize {
    let mut visited: AHashSet<SourceId> = AHashSet::new();
    let mut work: VecDeque<SourceId> = changed.into();
    let mut invalidated = 0;

    while let Some(source) = work.pop_front() {
        let dependents = DependencyGraph::with_global(|g| g.dependents_of(source));
        for observer in dependents {
            if !visited.insert(observer) {
                continue;
            }
            let Some(invalidator) = DependencyGraph::with_global(|g| g.invalidator(observer))
            else {
                DependencyGraph::with_global(|g| g.forget(observer));
                continue;
            };
            invalidated += 1;
            trace!(%source, %observer, "invalidate");
            if invalidator.invalidate(observer) == Invalidation::Changed {
                work.push_back(observer);
            }
        }
    }
    invalidated
}
