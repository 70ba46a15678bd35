#![forbid(unsafe_code)]

//! Design tokens for element trees.
//!
//! This crate re-exports the workspace's public API:
//!
//! - [`dom`]: the element tree tokens resolve against.
//! - [`runtime`]: observables, dependency tracking and the batched flush.
//! - [`token`]: [`DesignToken`] and its values.
//! - [`widgets`] (feature `widgets`, on by default): token-driven widgets.
//!
//! Most programs only need the [`prelude`].
//!
//! ```
//! use dtk::prelude::*;
//!
//! let doc = Document::new();
//! let card = doc.create_element("div");
//! doc.body().append_child(&card).unwrap();
//!
//! let radius = DesignToken::<f64>::create("corner-radius").unwrap();
//! radius.set_value_for(&doc.body(), 4.0);
//! radius.add_custom_property_for(&card).unwrap();
//! assert_eq!(card.property("--corner-radius").as_deref(), Some("4"));
//!
//! radius.set_value_for(&doc.body(), 6.0);
//! flush().unwrap();
//! assert_eq!(card.property("--corner-radius").as_deref(), Some("6"));
//! ```

pub use dtk_dom as dom;
pub use dtk_runtime as runtime;
pub use dtk_token as token;
#[cfg(feature = "widgets")]
pub use dtk_widgets as widgets;

pub use dtk_dom::{ComputedStyle, Document, DomError, Element, ElementId, TreeMutation};
pub use dtk_runtime::{
    BatchScope, FlushError, FlushReport, Observable, SchedulerConfig, Subscription, UpdateQueue,
    flush,
};
pub use dtk_token::{
    BindingState, CssValue, DesignToken, TokenError, TokenSubscription, TokenValue,
};

pub mod prelude {
    //! Common imports.

    pub use dtk_dom::{Document, Element};
    pub use dtk_runtime::{BatchScope, Observable, flush};
    pub use dtk_token::{DesignToken, TokenError, TokenValue};
    #[cfg(feature = "widgets")]
    pub use dtk_widgets::{Carousel, CarouselPattern, NavKey};
}
