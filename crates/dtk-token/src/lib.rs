#![forbid(unsafe_code)]

//! Design tokens for element trees.
//!
//! A [`DesignToken`] is a named key for per-element configuration values.
//! Values are set on elements and resolved by nearest ancestor; derived
//! values are functions of the requesting element whose reads are tracked,
//! so they recompute when their inputs change. A token can mirror its
//! resolved value into a CSS custom property (`--name`) on any element.
//!
//! # Example
//!
//! ```
//! use dtk_dom::Document;
//! use dtk_runtime::{Observable, flush};
//! use dtk_token::{DesignToken, TokenValue};
//!
//! let doc = Document::new();
//! let target = doc.create_element("div");
//! doc.body().append_child(&target).unwrap();
//!
//! let base = Observable::new(6);
//! let size = DesignToken::<i32>::create("size").unwrap();
//! let b = base.clone();
//! size.set_value_for(&target, TokenValue::computed(move |_| b.get() * 2));
//! size.add_custom_property_for(&target).unwrap();
//! assert_eq!(target.computed_style().property_value("--size"), Some("12"));
//!
//! base.set(7);
//! flush().unwrap();
//! assert_eq!(size.get_value_for(&target), Ok(14));
//! assert_eq!(target.computed_style().property_value("--size"), Some("14"));
//! ```
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | No value | Nothing set on the element or any ancestor | `TokenError::NoValue` |
//! | Derivation error | Derived function returned an error | Propagated, nothing cached |
//! | Cycle | Derived value reads itself at the same element | `TokenError::Cycle` |
//! | Emission failure during flush | Value became unresolvable | Property removed, logged at `warn` |

mod emission;
mod index;
pub mod token;
pub mod value;

pub use dtk_dom::{Element, ElementId};
pub use emission::{BindingState, TokenSubscription};
pub use token::{DesignToken, TokenId};
pub use value::{CssValue, DeriveFn, TokenValue};

/// Errors surfaced by token reads and bindings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("no value set for token '{token}' on {element} or any of its ancestors")]
    NoValue { token: String, element: ElementId },
    #[error("derived value failed: {0}")]
    Derivation(String),
    #[error("token '{token}' depends on itself at {element}")]
    Cycle { token: String, element: ElementId },
    #[error("invalid token name '{0}'")]
    InvalidName(String),
}

impl TokenError {
    /// Build a [`TokenError::Derivation`] from any displayable cause.
    pub fn derivation(cause: impl std::fmt::Display) -> Self {
        Self::Derivation(cause.to_string())
    }
}
