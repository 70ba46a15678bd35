#![forbid(unsafe_code)]

//! Resolution index: per-token entries, resolved-value cache and the
//! bookkeeping that keeps the cache honest.
//!
//! # Invariants
//!
//! 1. A cached value for element `E` was produced by the entry nearest to `E`
//!    at the time of caching; any write to `E` or an unshadowed ancestor of
//!    `E` drops it synchronously.
//! 2. Each (token, element) resolution has one stable [`SourceId`]. It is the
//!    observer for a derived evaluation's reads and the source that watchers
//!    and other tokens' derivations depend on.
//! 3. Failed resolutions are never cached.
//! 4. Elements leaving the tree take their entries, cache lines, edges and
//!    watchers with them.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use ahash::{AHashMap, AHashSet};
use dtk_dom::{DocumentId, Element, ElementId, TreeMutation};
use dtk_runtime::reactive::tracker;
use dtk_runtime::{DependencyGraph, Invalidate, Invalidation, SourceId, Subscription, UpdateQueue};
use tracing::{debug, trace};

use crate::TokenError;
use crate::emission::Watcher;
use crate::token::TokenId;
use crate::value::{DeriveFn, TokenValue};

pub(crate) struct TokenState<T> {
    pub(crate) entries: AHashMap<ElementId, TokenValue<T>>,
    cache: AHashMap<ElementId, T>,
    sources: AHashMap<ElementId, SourceId>,
    owners: AHashMap<SourceId, ElementId>,
    evaluating: AHashSet<ElementId>,
    documents: AHashMap<DocumentId, Subscription>,
    pub(crate) watchers: AHashMap<ElementId, Vec<Rc<Watcher<T>>>>,
}

impl<T> Default for TokenState<T> {
    fn default() -> Self {
        Self {
            entries: AHashMap::new(),
            cache: AHashMap::new(),
            sources: AHashMap::new(),
            owners: AHashMap::new(),
            evaluating: AHashSet::new(),
            documents: AHashMap::new(),
            watchers: AHashMap::new(),
        }
    }
}

pub(crate) struct TokenInner<T> {
    pub(crate) id: TokenId,
    pub(crate) name: String,
    pub(crate) property: String,
    pub(crate) state: RefCell<TokenState<T>>,
    this: Weak<TokenInner<T>>,
}

impl<T: Clone + 'static> TokenInner<T> {
    pub(crate) fn new(id: TokenId, name: String) -> Rc<Self> {
        let property = format!("--{name}");
        Rc::new_cyclic(|this| Self {
            id,
            name,
            property,
            state: RefCell::new(TokenState::default()),
            this: this.clone(),
        })
    }

    pub(crate) fn weak(&self) -> Weak<Self> {
        self.this.clone()
    }

    /// Start listening to structural changes of `element`'s document.
    pub(crate) fn ensure_document(&self, element: &Element) {
        let doc = element.document();
        if self.state.borrow().documents.contains_key(&doc.id()) {
            return;
        }
        let weak = self.weak();
        let sub = doc.on_mutation(move |mutation| {
            if let Some(inner) = weak.upgrade() {
                inner.on_mutation(mutation);
            }
        });
        self.state.borrow_mut().documents.insert(doc.id(), sub);
    }

    pub(crate) fn resolution_source(&self, element: ElementId) -> SourceId {
        let mut state = self.state.borrow_mut();
        if let Some(source) = state.sources.get(&element) {
            return *source;
        }
        let source = SourceId::next();
        state.sources.insert(element, source);
        state.owners.insert(source, element);
        source
    }

    pub(crate) fn cached(&self, element: ElementId) -> Option<T> {
        self.state.borrow().cache.get(&element).cloned()
    }

    pub(crate) fn store(&self, element: ElementId, value: T) {
        self.state.borrow_mut().cache.insert(element, value);
    }

    /// Entry set on `element` or its nearest ancestor that has one.
    pub(crate) fn nearest_entry(&self, element: &Element) -> Option<(ElementId, TokenValue<T>)> {
        let state = self.state.borrow();
        std::iter::once(element.clone())
            .chain(element.ancestors())
            .find_map(|el| state.entries.get(&el.id()).map(|v| (el.id(), v.clone())))
    }

    /// Run a derived function for `element`, capturing its reads as the
    /// dependencies of `source`.
    pub(crate) fn evaluate(
        &self,
        source: SourceId,
        element: &Element,
        derive: &DeriveFn<T>,
    ) -> Result<T, TokenError> {
        if !self.state.borrow_mut().evaluating.insert(element.id()) {
            return Err(TokenError::Cycle {
                token: self.name.clone(),
                element: element.id(),
            });
        }
        let guard = EvaluatingGuard {
            inner: self,
            element: element.id(),
        };
        let (result, deps) = tracker::record(|| derive(element));
        drop(guard);

        trace!(token = %self.name, element = %element.id(), deps = deps.len(), ok = result.is_ok(), "evaluated derived value");
        let invalidator: Weak<dyn Invalidate> = self.weak();
        DependencyGraph::with_global(|g| g.replace_dependencies(source, deps, invalidator));
        result
    }

    /// Drop the derivation edges of a resolution that is no longer derived.
    pub(crate) fn forget_edges(&self, source: SourceId) {
        DependencyGraph::with_global(|g| g.forget(source));
    }

    /// Drop cached resolutions of `root` and every descendant that does not
    /// carry its own entry, and report them as changed.
    pub(crate) fn invalidate_subtree(&self, root: &Element) {
        let changed = {
            let mut state = self.state.borrow_mut();
            let mut changed = Vec::new();
            let mut stack = vec![root.clone()];
            while let Some(el) = stack.pop() {
                state.cache.remove(&el.id());
                if let Some(source) = state.sources.get(&el.id()) {
                    changed.push(*source);
                }
                stack.extend(
                    el.children()
                        .into_iter()
                        .filter(|child| !state.entries.contains_key(&child.id())),
                );
            }
            changed
        };
        trace!(token = %self.name, root = %root.id(), changed = changed.len(), "invalidated subtree");
        self.report_changed(&changed);
    }

    fn report_changed(&self, sources: &[SourceId]) {
        for source in sources {
            self.forget_edges(*source);
            UpdateQueue::notify_changed(*source);
        }
    }

    fn on_mutation(&self, mutation: &TreeMutation) {
        match mutation {
            TreeMutation::Removed { elements, .. } => self.purge(elements),
            TreeMutation::Inserted { elements, .. } => self.reparented(elements),
        }
    }

    /// Elements got new ancestry: nothing cached for them can be trusted.
    fn reparented(&self, elements: &[ElementId]) {
        let changed: Vec<SourceId> = {
            let mut state = self.state.borrow_mut();
            elements
                .iter()
                .filter_map(|id| {
                    state.cache.remove(id);
                    state.sources.get(id).copied()
                })
                .collect()
        };
        self.report_changed(&changed);
    }

    /// Elements left the tree: drop everything this token knows about them.
    fn purge(&self, elements: &[ElementId]) {
        let mut sources = Vec::new();
        let mut watchers = Vec::new();
        let mut dropped_entries = 0usize;
        {
            let mut state = self.state.borrow_mut();
            for id in elements {
                if state.entries.remove(id).is_some() {
                    dropped_entries += 1;
                }
                state.cache.remove(id);
                state.evaluating.remove(id);
                if let Some(source) = state.sources.remove(id) {
                    state.owners.remove(&source);
                    sources.push(source);
                }
                if let Some(list) = state.watchers.remove(id) {
                    watchers.extend(list);
                }
            }
        }
        for source in sources {
            self.forget_edges(source);
        }
        for watcher in &watchers {
            watcher.deactivate();
        }
        if dropped_entries > 0 || !watchers.is_empty() {
            debug!(
                token = %self.name,
                entries = dropped_entries,
                bindings = watchers.len(),
                "dropped state for detached elements"
            );
        }
    }
}

impl<T: Clone + 'static> Invalidate for TokenInner<T> {
    fn invalidate(&self, observer: SourceId) -> Invalidation {
        let mut state = self.state.borrow_mut();
        let Some(element) = state.owners.get(&observer).copied() else {
            return Invalidation::Unchanged;
        };
        state.cache.remove(&element);
        trace!(token = %self.name, element = %element, "dependency changed");
        Invalidation::Changed
    }
}

struct EvaluatingGuard<'a, T> {
    inner: &'a TokenInner<T>,
    element: ElementId,
}

impl<T> Drop for EvaluatingGuard<'_, T> {
    fn drop(&mut self) {
        self.inner.state.borrow_mut().evaluating.remove(&self.element);
    }
}
