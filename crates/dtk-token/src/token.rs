#![forbid(unsafe_code)]

//! The [`DesignToken`] handle.
//!
//! # Invariants
//!
//! 1. Reading a token for an element with no entry on itself or any ancestor
//!    fails with [`TokenError::NoValue`]; there is no silent default.
//! 2. The nearest entry wins: `E`, then `parent(E)`, then its parent, ...
//! 3. Writing at `E` affects resolution at `E` and its unshadowed descendants
//!    only, never at ancestors of `E`.
//! 4. Two tokens created with the same name are distinct identities.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use dtk_dom::Element;
use dtk_runtime::reactive::tracker;
use tracing::{debug, trace};

use crate::TokenError;
use crate::emission::{self, BindingState, TokenSubscription, WatchKind, Watcher};
use crate::index::TokenInner;
use crate::value::{CssValue, TokenValue};

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique token identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(u64);

impl TokenId {
    fn next() -> Self {
        Self(NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token#{}", self.0)
    }
}

fn validate_name(name: &str) -> Result<(), TokenError> {
    let valid = !name.is_empty()
        && !name.starts_with("--")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(TokenError::InvalidName(name.to_string()))
    }
}

/// Named key for per-element values of type `T`.
///
/// Cheap to clone; clones share identity and state.
pub struct DesignToken<T> {
    inner: Rc<TokenInner<T>>,
}

impl<T> Clone for DesignToken<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> DesignToken<T> {
    /// Create a token. `name` becomes the custom property suffix.
    ///
    /// # Errors
    ///
    /// [`TokenError::InvalidName`] unless `name` is a non-empty run of ASCII
    /// alphanumerics, `-` and `_` (without a leading `--`).
    pub fn create(name: impl Into<String>) -> Result<Self, TokenError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self {
            inner: TokenInner::new(TokenId::next(), name),
        })
    }

    /// Create a token with a generated name (`token-<id>`).
    #[must_use]
    pub fn create_anonymous() -> Self {
        let id = TokenId::next();
        Self {
            inner: TokenInner::new(id, format!("token-{}", id.get())),
        }
    }

    pub(crate) fn from_inner(inner: Rc<TokenInner<T>>) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn id(&self) -> TokenId {
        self.inner.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// `--<name>`.
    #[must_use]
    pub fn css_custom_property(&self) -> &str {
        &self.inner.property
    }

    /// `var(--<name>)`.
    #[must_use]
    pub fn create_css(&self) -> String {
        format!("var({})", self.inner.property)
    }

    /// Resolve the token for `element`.
    ///
    /// Inside a derived evaluation the read is recorded, so the caller
    /// recomputes when this resolution changes.
    ///
    /// # Errors
    ///
    /// - [`TokenError::NoValue`] when nothing is set on the ancestor chain.
    /// - Any error returned by a derived function, and
    ///   [`TokenError::Cycle`] for self-dependent derivations.
    pub fn get_value_for(&self, element: &Element) -> Result<T, TokenError> {
        let inner = &self.inner;
        inner.ensure_document(element);
        let source = inner.resolution_source(element.id());
        tracker::track(source);

        if let Some(value) = inner.cached(element.id()) {
            trace!(token = %inner.name, element = %element.id(), "cache hit");
            return Ok(value);
        }
        trace!(token = %inner.name, element = %element.id(), "cache miss");

        let Some((holder, entry)) = inner.nearest_entry(element) else {
            inner.forget_edges(source);
            return Err(TokenError::NoValue {
                token: inner.name.clone(),
                element: element.id(),
            });
        };
        let value = match entry {
            TokenValue::Static(value) => {
                inner.forget_edges(source);
                value
            }
            TokenValue::Derived(derive) => inner.evaluate(source, element, &derive)?,
        };
        trace!(token = %inner.name, element = %element.id(), from = %holder, "resolved");
        inner.store(element.id(), value.clone());
        Ok(value)
    }

    /// Set a static or derived value on `element`, replacing any previous
    /// entry there.
    pub fn set_value_for(&self, element: &Element, value: impl Into<TokenValue<T>>) {
        let value = value.into();
        self.inner.ensure_document(element);
        debug!(
            token = %self.inner.name,
            element = %element.id(),
            derived = value.is_derived(),
            "set token value"
        );
        self.inner
            .state
            .borrow_mut()
            .entries
            .insert(element.id(), value);
        self.inner.invalidate_subtree(element);
    }

    /// Remove the entry on `element`; reads fall through to ancestors.
    /// Returns whether an entry existed.
    pub fn delete_value_for(&self, element: &Element) -> bool {
        let removed = self
            .inner
            .state
            .borrow_mut()
            .entries
            .remove(&element.id())
            .is_some();
        if removed {
            debug!(token = %self.inner.name, element = %element.id(), "deleted token value");
            self.inner.invalidate_subtree(element);
        }
        removed
    }

    /// Whether an entry is set directly on `element` (ancestors ignored).
    #[must_use]
    pub fn has_value_for(&self, element: &Element) -> bool {
        self.inner
            .state
            .borrow()
            .entries
            .contains_key(&element.id())
    }

    /// Call `callback` after every flush in which the resolution at
    /// `element` was invalidated.
    pub fn subscribe(
        &self,
        element: &Element,
        callback: impl Fn(&Element, Result<T, TokenError>) + 'static,
    ) -> TokenSubscription<T> {
        let watcher = self.install_watcher(element, emission::callback(callback));
        // Prime derivation edges so dependency changes reach the watcher.
        // `NoValue` is expected before any value is set; the watcher fires
        // once one is.
        self.get_value_for(element).ok();
        TokenSubscription::new(watcher)
    }

    /// State of the CSS binding for `element`.
    #[must_use]
    pub fn binding_state_for(&self, element: &Element) -> BindingState {
        self.css_watcher(element)
            .map_or(BindingState::Inactive, |w| w.state())
    }

    /// Stop mirroring the token into `element`'s custom property and remove
    /// the property. Returns whether a binding was active.
    pub fn remove_custom_property_for(&self, element: &Element) -> bool {
        let watcher = {
            let mut state = self.inner.state.borrow_mut();
            let Some(list) = state.watchers.get_mut(&element.id()) else {
                return false;
            };
            let Some(pos) = list.iter().position(|w| w.is_css()) else {
                return false;
            };
            let watcher = list.remove(pos);
            if list.is_empty() {
                state.watchers.remove(&element.id());
            }
            watcher
        };
        watcher.deactivate();
        debug!(token = %self.inner.name, element = %element.id(), "removed custom property binding");
        true
    }

    fn css_watcher(&self, element: &Element) -> Option<Rc<Watcher<T>>> {
        self.inner
            .state
            .borrow()
            .watchers
            .get(&element.id())
            .and_then(|list| list.iter().find(|w| w.is_css()).cloned())
    }

    fn install_watcher(&self, element: &Element, kind: WatchKind<T>) -> Rc<Watcher<T>> {
        self.inner.ensure_document(element);
        let watcher = Watcher::new(&self.inner, element, kind);
        watcher.activate(self.inner.resolution_source(element.id()));
        self.inner
            .state
            .borrow_mut()
            .watchers
            .entry(element.id())
            .or_default()
            .push(Rc::clone(&watcher));
        watcher
    }
}

impl<T: Clone + CssValue + 'static> DesignToken<T> {
    /// Mirror the resolved value at `element` into its `--<name>` custom
    /// property, now and after every flush that changes it.
    ///
    /// The binding stays active even when the first write fails; it is
    /// retried whenever the resolution changes.
    ///
    /// # Errors
    ///
    /// Whatever [`get_value_for`](Self::get_value_for) returns for the
    /// initial write (usually [`TokenError::NoValue`]).
    pub fn add_custom_property_for(&self, element: &Element) -> Result<(), TokenError> {
        let watcher = match self.css_watcher(element) {
            Some(existing) => existing,
            None => {
                debug!(token = %self.inner.name, element = %element.id(), "added custom property binding");
                self.install_watcher(
                    element,
                    WatchKind::Css {
                        render: <T as CssValue>::to_css,
                    },
                )
            }
        };
        watcher.run()
    }
}

impl<T> fmt::Display for DesignToken<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "var({})", self.inner.property)
    }
}

impl<T> fmt::Debug for DesignToken<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DesignToken")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

impl<T> PartialEq for DesignToken<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Eq for DesignToken<T> {}
