#![forbid(unsafe_code)]

//! Widgets that consume design tokens.
//!
//! Widgets here own a host element in a [`dtk_dom::Document`], reflect their
//! state through attributes, and publish their themable dimensions as
//! [`dtk_token::DesignToken`]s emitted as CSS custom properties on that host.

pub mod carousel;
pub mod flipper;

pub use carousel::{Carousel, CarouselPattern, CarouselTokens, NavKey};
pub use flipper::{FlipDirection, Flipper};

use dtk_dom::DomError;
use dtk_token::TokenError;

/// Errors raised while building or restructuring a widget.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WidgetError {
    /// The element handed to a widget constructor has the wrong tag.
    #[error("expected a <{expected}> element, got <{found}>")]
    WrongElement {
        expected: &'static str,
        found: String,
    },
    #[error(transparent)]
    Dom(#[from] DomError),
    #[error(transparent)]
    Token(#[from] TokenError),
}
