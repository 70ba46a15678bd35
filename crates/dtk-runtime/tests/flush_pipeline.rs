#![forbid(unsafe_code)]

//! Observable writes flowing through the dependency graph into flush tasks.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use dtk_runtime::reactive::tracker;
use dtk_runtime::{
    BatchScope, DependencyGraph, FlushError, Invalidate, Invalidation, Observable,
    SchedulerConfig, SourceId, UpdateQueue, flush,
};
use proptest::prelude::*;
use tracing_test::traced_test;

/// Lazily recomputed sum of two observables; schedules a "render" when dirty.
struct Sum {
    observer: SourceId,
    a: Observable<i32>,
    b: Observable<i32>,
    cached: Cell<Option<i32>>,
    renders: Rc<RefCell<Vec<i32>>>,
    this: Weak<Sum>,
}

impl Sum {
    fn new(a: &Observable<i32>, b: &Observable<i32>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            observer: SourceId::next(),
            a: a.clone(),
            b: b.clone(),
            cached: Cell::new(None),
            renders: Rc::new(RefCell::new(Vec::new())),
            this: this.clone(),
        })
    }

    fn value(&self) -> i32 {
        if let Some(v) = self.cached.get() {
            return v;
        }
        let (v, deps) = tracker::record(|| self.a.get() + self.b.get());
        let invalidator: Weak<dyn Invalidate> = self.this.clone();
        DependencyGraph::with_global(|g| g.replace_dependencies(self.observer, deps, invalidator));
        self.cached.set(Some(v));
        v
    }
}

impl Invalidate for Sum {
    fn invalidate(&self, _observer: SourceId) -> Invalidation {
        if self.cached.take().is_none() {
            return Invalidation::Unchanged;
        }
        let this = self.this.clone();
        UpdateQueue::schedule(move || {
            if let Some(sum) = this.upgrade() {
                let v = sum.value();
                sum.renders.borrow_mut().push(v);
            }
        });
        Invalidation::Changed
    }
}

#[test]
fn writes_render_once_per_flush() {
    let a = Observable::new(1);
    let b = Observable::new(2);
    let sum = Sum::new(&a, &b);
    assert_eq!(sum.value(), 3);

    a.set(10);
    b.set(20);
    a.set(11);
    assert!(sum.renders.borrow().is_empty(), "nothing runs before flush");

    let report = flush().expect("flush");
    assert_eq!(report.tasks_run, 1);
    assert_eq!(*sum.renders.borrow(), vec![31]);
}

#[test]
fn equal_writes_are_silent() {
    let a = Observable::new(1);
    let b = Observable::new(2);
    let sum = Sum::new(&a, &b);
    let _ = sum.value();

    a.set(1);
    assert!(!UpdateQueue::is_pending());
    assert!(flush().expect("flush").is_empty());
}

#[test]
fn untracked_reads_do_not_subscribe() {
    let a = Observable::new(1);
    let (_, deps) = tracker::record(|| tracker::untracked(|| a.get()));
    assert!(deps.is_empty());

    let (_, deps) = tracker::record(|| a.get());
    assert!(deps.contains(a.source_id()));
}

#[test]
fn dropped_observer_is_skipped() {
    let a = Observable::new(1);
    let b = Observable::new(2);
    let sum = Sum::new(&a, &b);
    let _ = sum.value();
    drop(sum);

    a.set(5);
    let report = flush().expect("flush");
    assert_eq!(report.tasks_run, 0);
}

#[test]
fn batch_scope_defers_subscribers_not_values() {
    let a = Observable::new(0);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = seen.clone();
    let _sub = a.subscribe(move |v| s.borrow_mut().push(*v));

    BatchScope::run(|| {
        a.set(1);
        assert_eq!(a.get(), 1);
        a.set(2);
        assert!(seen.borrow().is_empty());
    });
    assert_eq!(*seen.borrow(), vec![2, 2]);
}

#[test]
fn self_rescheduling_task_hits_pass_limit() {
    UpdateQueue::configure(SchedulerConfig::default().with_max_passes(3));

    fn again() {
        UpdateQueue::schedule(again);
    }
    UpdateQueue::schedule(again);

    let err = flush().expect_err("never settles");
    assert_eq!(
        err,
        FlushError::PassLimit {
            max_passes: 3,
            dropped: 1
        }
    );
    assert!(!UpdateQueue::is_pending());
}

#[test]
#[traced_test]
fn flush_logs_summary() {
    let a = Observable::new(1);
    let b = Observable::new(2);
    let sum = Sum::new(&a, &b);
    let _ = sum.value();

    b.set(3);
    flush().expect("flush");
    assert!(logs_contain("flush complete"));
}

proptest! {
    #[test]
    fn version_counts_only_real_changes(
        start in -3i32..3,
        writes in prop::collection::vec(-3i32..3, 0..32),
        batched in any::<bool>(),
    ) {
        let obs = Observable::new(start);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = obs.subscribe(move |v| s.borrow_mut().push(*v));

        let mut changes = Vec::new();
        let mut last = start;
        for &w in &writes {
            if w != last {
                changes.push(w);
                last = w;
            }
        }

        let apply = || {
            for &w in &writes {
                obs.set(w);
            }
        };
        if batched {
            BatchScope::run(apply);
        } else {
            apply();
        }

        prop_assert_eq!(obs.version(), changes.len() as u64);
        prop_assert_eq!(obs.get(), last);
        prop_assert_eq!(UpdateQueue::is_pending(), !changes.is_empty());
        if batched {
            // Deferred deliveries all observe the settled value.
            prop_assert_eq!(seen.borrow().clone(), vec![last; changes.len()]);
        } else {
            prop_assert_eq!(seen.borrow().clone(), changes);
        }

        flush().expect("flush");
        prop_assert!(!UpdateQueue::is_pending());
    }
}
