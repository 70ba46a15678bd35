#![forbid(unsafe_code)]

//! Deferred subscriber notification.
//!
//! While a [`BatchScope`] is alive, `Observable` writes apply immediately but
//! their subscriber callbacks are queued. When the outermost scope drops, the
//! queue is drained in the order writes happened. Nested scopes only count
//! depth.

use std::cell::RefCell;

type Deferred = Box<dyn FnOnce()>;

#[derive(Default)]
struct BatchState {
    depth: usize,
    pending: Vec<Deferred>,
}

thread_local! {
    static BATCH: RefCell<BatchState> = RefCell::new(BatchState::default());
}

/// Whether a batch scope is active on this thread.
#[must_use]
pub fn is_batching() -> bool {
    BATCH.with(|b| b.borrow().depth > 0)
}

pub(crate) fn defer(f: impl FnOnce() + 'static) {
    BATCH.with(|b| b.borrow_mut().pending.push(Box::new(f)));
}

/// RAII guard deferring observable notifications until it drops.
#[must_use = "dropping the scope flushes deferred notifications immediately"]
pub struct BatchScope {
    _private: (),
}

impl BatchScope {
    pub fn new() -> Self {
        BATCH.with(|b| b.borrow_mut().depth += 1);
        Self { _private: () }
    }

    /// Run `f` inside a batch scope.
    pub fn run<R>(f: impl FnOnce() -> R) -> R {
        let _scope = Self::new();
        f()
    }
}

impl Default for BatchScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BatchScope {
    fn drop(&mut self) {
        let pending = BATCH.with(|b| {
            let mut state = b.borrow_mut();
            state.depth = state.depth.saturating_sub(1);
            if state.depth == 0 {
                std::mem::take(&mut state.pending)
            } else {
                Vec::new()
            }
        });
        for notify in pending {
            notify();
        }
    }
}

impl std::fmt::Debug for BatchScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchScope").finish()
    }
}
