#![forbid(unsafe_code)]

//! Watchers on one (token, element) resolution: CSS custom property bindings
//! and change subscriptions.
//!
//! A watcher is a sink in the dependency graph. When its resolution is
//! invalidated it goes `Active -> Dirty` and schedules one task on the
//! [`UpdateQueue`]; however many writes land before the flush, the task
//! re-resolves once and writes once. Deactivation makes any pending task a
//! no-op.
//!
//! ```text
//! Inactive --add--> Active --invalidated--> Dirty --flush--> Active
//!     ^                |                      |
//!     +----remove/detach----------------------+
//! ```

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use dtk_dom::Element;
use dtk_runtime::{DependencyGraph, DependencySet, Invalidate, Invalidation, SourceId, UpdateQueue};
use tracing::{debug, warn};

use crate::TokenError;
use crate::index::TokenInner;
use crate::token::DesignToken;

/// Lifecycle of a binding or subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    Inactive,
    Active,
    /// Invalidated; a rewrite is queued for the next flush.
    Dirty,
}

type ChangeCallback<T> = Rc<dyn Fn(&Element, Result<T, TokenError>)>;

pub(crate) enum WatchKind<T> {
    Css { render: fn(&T) -> String },
    Callback(ChangeCallback<T>),
}

pub(crate) struct Watcher<T> {
    observer: SourceId,
    element: Element,
    kind: WatchKind<T>,
    state: Cell<BindingState>,
    token: Weak<TokenInner<T>>,
    this: Weak<Watcher<T>>,
}

impl<T: Clone + 'static> Watcher<T> {
    pub(crate) fn new(token: &Rc<TokenInner<T>>, element: &Element, kind: WatchKind<T>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            observer: SourceId::next(),
            element: element.clone(),
            kind,
            state: Cell::new(BindingState::Inactive),
            token: Rc::downgrade(token),
            this: this.clone(),
        })
    }

    pub(crate) fn is_css(&self) -> bool {
        matches!(self.kind, WatchKind::Css { .. })
    }

    pub(crate) fn state(&self) -> BindingState {
        self.state.get()
    }

    /// Subscribe to `resolution` and move to `Active`.
    pub(crate) fn activate(&self, resolution: SourceId) {
        let mut deps = DependencySet::new();
        deps.insert(resolution);
        let invalidator: Weak<dyn Invalidate> = self.this.clone();
        DependencyGraph::with_global(|g| g.replace_dependencies(self.observer, deps, invalidator));
        self.state.set(BindingState::Active);
    }

    /// Unsubscribe; CSS bindings also remove their property.
    pub(crate) fn deactivate(&self) {
        if self.state.replace(BindingState::Inactive) == BindingState::Inactive {
            return;
        }
        DependencyGraph::with_global(|g| g.forget(self.observer));
        if self.is_css() {
            if let Some(token) = self.token.upgrade() {
                self.element.remove_property(&token.property);
            }
        }
    }

    /// Resolve and deliver the current value.
    pub(crate) fn run(&self) -> Result<(), TokenError> {
        let Some(inner) = self.token.upgrade() else {
            return Ok(());
        };
        let token = DesignToken::from_inner(inner);
        let result = token.get_value_for(&self.element);
        match &self.kind {
            WatchKind::Css { render } => match result {
                Ok(value) => {
                    self.element
                        .set_property(token.css_custom_property(), render(&value));
                    Ok(())
                }
                Err(err) => {
                    self.element.remove_property(token.css_custom_property());
                    Err(err)
                }
            },
            WatchKind::Callback(callback) => {
                callback(&self.element, result);
                Ok(())
            }
        }
    }

    fn flush_dirty(&self) {
        if self.state.get() != BindingState::Dirty {
            return;
        }
        self.state.set(BindingState::Active);
        if let Err(err) = self.run() {
            warn!(element = %self.element.id(), error = %err, "token emission failed");
        }
    }
}

impl<T: Clone + 'static> Invalidate for Watcher<T> {
    fn invalidate(&self, _observer: SourceId) -> Invalidation {
        if self.state.get() == BindingState::Active {
            self.state.set(BindingState::Dirty);
            let this = self.this.clone();
            UpdateQueue::schedule(move || {
                if let Some(watcher) = this.upgrade() {
                    watcher.flush_dirty();
                }
            });
        }
        Invalidation::Unchanged
    }
}

/// Handle returned by [`DesignToken::subscribe`]. Dropping it unsubscribes.
#[must_use = "dropping a TokenSubscription unsubscribes immediately"]
pub struct TokenSubscription<T: Clone + 'static> {
    watcher: Rc<Watcher<T>>,
}

impl<T: Clone + 'static> TokenSubscription<T> {
    pub(crate) fn new(watcher: Rc<Watcher<T>>) -> Self {
        Self { watcher }
    }

    #[must_use]
    pub fn state(&self) -> BindingState {
        self.watcher.state()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.watcher.state() != BindingState::Inactive
    }
}

impl<T: Clone + 'static> Drop for TokenSubscription<T> {
    fn drop(&mut self) {
        self.watcher.deactivate();
        if let Some(token) = self.watcher.token.upgrade() {
            let id = self.watcher.element.id();
            let mut state = token.state.borrow_mut();
            if let Some(list) = state.watchers.get_mut(&id) {
                list.retain(|w| !Rc::ptr_eq(w, &self.watcher));
                if list.is_empty() {
                    state.watchers.remove(&id);
                }
            }
        }
        debug!(element = %self.watcher.element.id(), "token subscription dropped");
    }
}

impl<T: Clone + 'static> fmt::Debug for TokenSubscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSubscription")
            .field("element", &self.watcher.element.id())
            .field("state", &self.watcher.state())
            .finish()
    }
}

pub(crate) fn callback<T>(f: impl Fn(&Element, Result<T, TokenError>) + 'static) -> WatchKind<T> {
    WatchKind::Callback(Rc::new(f))
}
