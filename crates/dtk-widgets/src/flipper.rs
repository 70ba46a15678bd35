#![forbid(unsafe_code)]

//! Previous/next flipper buttons.

use std::fmt;

use dtk_dom::{Document, Element};

/// Tag of flipper host elements.
pub const FLIPPER_TAG: &str = "fast-flipper";

/// Which way a flipper moves its carousel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FlipDirection {
    Previous,
    Next,
}

impl FlipDirection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Previous => "previous",
            Self::Next => "next",
        }
    }

    /// Class of the container element hosting a flipper of this direction.
    #[must_use]
    pub const fn container_class(self) -> &'static str {
        match self {
            Self::Previous => "previous-flipper-container",
            Self::Next => "next-flipper-container",
        }
    }

    fn from_attribute(value: &str) -> Option<Self> {
        match value {
            "previous" => Some(Self::Previous),
            "next" => Some(Self::Next),
            _ => None,
        }
    }
}

impl fmt::Display for FlipDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A flipper button element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flipper {
    element: Element,
    direction: FlipDirection,
}

impl Flipper {
    /// Create a detached flipper element in `doc`.
    pub fn new(doc: &Document, direction: FlipDirection) -> Self {
        let element = doc.create_element(FLIPPER_TAG);
        element.set_attribute("direction", direction.as_str());
        element.set_attribute("class", direction.container_class());
        Self { element, direction }
    }

    /// Wrap an existing `fast-flipper` element; `None` for anything else.
    pub fn from_element(element: &Element) -> Option<Self> {
        if element.tag_name() != FLIPPER_TAG {
            return None;
        }
        let direction = element
            .attribute("direction")
            .as_deref()
            .and_then(FlipDirection::from_attribute)
            .unwrap_or(FlipDirection::Next);
        Some(Self {
            element: element.clone(),
            direction,
        })
    }

    #[must_use]
    pub fn element(&self) -> &Element {
        &self.element
    }

    #[must_use]
    pub fn direction(&self) -> FlipDirection {
        self.direction
    }

    /// Whether a click landing on `target` hits this flipper.
    #[must_use]
    pub fn hit(&self, target: &Element) -> bool {
        self.element.contains(target)
    }
}
