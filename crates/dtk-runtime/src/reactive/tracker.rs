#![forbid(unsafe_code)]

//! Dependency capture for derived values.
//!
//! A derived value is evaluated inside [`record`], which pushes a fresh
//! recording frame onto a thread-local stack. Every read of a reactive source
//! calls [`track`], adding the source's [`SourceId`] to the innermost frame.
//! When the evaluation returns, the frame is popped and handed back as a
//! [`DependencySet`], which the caller installs into the [`DependencyGraph`]
//! with [`DependencyGraph::replace_dependencies`].
//!
//! # Invariants
//!
//! 1. Nested recordings are independent: a read made by an inner evaluation
//!    lands only in the inner frame.
//! 2. Replacing an observer's dependencies drops every edge from its previous
//!    evaluation before the new edges are added.
//! 3. Dependents of a source are reported in the order they first started
//!    depending on it.
//!
//! # Failure Modes
//!
//! - Panic inside [`record`]: the frame is still popped (guard on drop).
//! - Invalidator dropped while edges remain: the scheduler forgets the
//!   observer the next time it is reached.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static RECORDING: RefCell<Vec<DependencySet>> = const { RefCell::new(Vec::new()) };
    static GRAPH: RefCell<DependencyGraph> = RefCell::new(DependencyGraph::new());
}

/// Identity of anything that can be read reactively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    /// Allocate a fresh, process-unique source id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "src#{}", self.0)
    }
}

/// Ordered, duplicate-free set of sources read during one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    sources: Vec<SourceId>,
}

impl DependencySet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source. Returns `false` if it was already present.
    pub fn insert(&mut self, source: SourceId) -> bool {
        if self.sources.contains(&source) {
            return false;
        }
        self.sources.push(source);
        true
    }

    #[must_use]
    pub fn contains(&self, source: SourceId) -> bool {
        self.sources.contains(&source)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Sources in first-read order.
    pub fn iter(&self) -> impl Iterator<Item = SourceId> + '_ {
        self.sources.iter().copied()
    }
}

impl FromIterator<SourceId> for DependencySet {
    fn from_iter<I: IntoIterator<Item = SourceId>>(iter: I) -> Self {
        let mut set = Self::new();
        for source in iter {
            set.insert(source);
        }
        set
    }
}

/// Outcome of invalidating one observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    /// The observer dropped state that others may have read; its own
    /// dependents must be visited too.
    Changed,
    /// The observer is a sink (or had nothing cached); propagation stops here.
    Unchanged,
}

/// Receiver of invalidation for observers registered in the graph.
pub trait Invalidate {
    /// Called during a flush when one of `observer`'s sources changed.
    fn invalidate(&self, observer: SourceId) -> Invalidation;
}

/// Record a read of `source` into the innermost active recording, if any.
pub fn track(source: SourceId) {
    RECORDING.with(|frames| {
        if let Some(frame) = frames.borrow_mut().last_mut() {
            frame.insert(source);
        }
    });
}

/// Whether a recording evaluation is currently active on this thread.
#[must_use]
pub fn is_recording() -> bool {
    RECORDING.with(|frames| !frames.borrow().is_empty())
}

/// Evaluate `f`, capturing every source it reads.
pub fn record<R>(f: impl FnOnce() -> R) -> (R, DependencySet) {
    RECORDING.with(|frames| frames.borrow_mut().push(DependencySet::new()));
    let guard = FrameGuard { finished: false };
    let result = f();
    (result, guard.finish())
}

/// Evaluate `f` without letting its reads reach the enclosing recording.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    record(f).0
}

struct FrameGuard {
    finished: bool,
}

impl FrameGuard {
    fn finish(mut self) -> DependencySet {
        self.finished = true;
        RECORDING
            .with(|frames| frames.borrow_mut().pop())
            .unwrap_or_default()
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if !self.finished {
            RECORDING.with(|frames| {
                frames.borrow_mut().pop();
            });
        }
    }
}

/// Observer → source edges plus the reverse index used during propagation.
#[derive(Default)]
pub struct DependencyGraph {
    sources: AHashMap<SourceId, DependencySet>,
    dependents: AHashMap<SourceId, Vec<SourceId>>,
    invalidators: AHashMap<SourceId, Weak<dyn Invalidate>>,
}

impl DependencyGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against this thread's graph.
    ///
    /// `f` must not re-enter the graph; collect what it needs and act after
    /// it returns.
    pub fn with_global<R>(f: impl FnOnce(&mut DependencyGraph) -> R) -> R {
        GRAPH.with(|graph| f(&mut graph.borrow_mut()))
    }

    /// Install `deps` as the complete dependency set of `observer`.
    pub fn replace_dependencies(
        &mut self,
        observer: SourceId,
        deps: DependencySet,
        invalidator: Weak<dyn Invalidate>,
    ) {
        self.drop_edges(observer);
        for source in deps.iter() {
            let list = self.dependents.entry(source).or_default();
            if !list.contains(&observer) {
                list.push(observer);
            }
        }
        self.sources.insert(observer, deps);
        self.invalidators.insert(observer, invalidator);
    }

    /// Remove every edge and the invalidator of `observer`.
    pub fn forget(&mut self, observer: SourceId) {
        self.drop_edges(observer);
        self.invalidators.remove(&observer);
    }

    fn drop_edges(&mut self, observer: SourceId) {
        let Some(previous) = self.sources.remove(&observer) else {
            return;
        };
        for source in previous.iter() {
            if let Some(list) = self.dependents.get_mut(&source) {
                list.retain(|o| *o != observer);
                if list.is_empty() {
                    self.dependents.remove(&source);
                }
            }
        }
    }

    #[must_use]
    pub fn dependencies_of(&self, observer: SourceId) -> Option<&DependencySet> {
        self.sources.get(&observer)
    }

    /// Observers that read `source` in their latest evaluation.
    #[must_use]
    pub fn dependents_of(&self, source: SourceId) -> Vec<SourceId> {
        self.dependents.get(&source).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn invalidator(&self, observer: SourceId) -> Option<Rc<dyn Invalidate>> {
        self.invalidators.get(&observer).and_then(Weak::upgrade)
    }

    /// Total number of observer → source edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.sources.values().map(DependencySet::len).sum()
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.invalidators.len()
    }
}

impl fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("observers", &self.observer_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}
