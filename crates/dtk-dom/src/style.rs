#![forbid(unsafe_code)]

//! Computed style view.
//!
//! Only the inheritance rule that matters to tokens is modelled: custom
//! properties (`--*`) inherit from ancestors, everything else applies to the
//! element that declares it.

use std::collections::BTreeMap;

use crate::element::Element;

/// Whether `name` is a CSS custom property name.
#[must_use]
pub fn is_custom_property(name: &str) -> bool {
    name.len() > 2 && name.starts_with("--")
}

/// Snapshot of an element's resolved style properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputedStyle {
    properties: BTreeMap<String, String>,
}

impl ComputedStyle {
    pub(crate) fn compute(element: &Element) -> Self {
        let mut chain: Vec<Element> = element.ancestors().collect();
        chain.reverse();

        let mut properties = BTreeMap::new();
        for ancestor in &chain {
            for (name, value) in ancestor.inline_properties() {
                if is_custom_property(&name) {
                    properties.insert(name, value);
                }
            }
        }
        properties.extend(element.inline_properties());
        Self { properties }
    }

    /// Value of `name`, or `None` when nothing in the chain declares it.
    #[must_use]
    pub fn property_value(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Custom properties in name order.
    pub fn custom_properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .filter(|(name, _)| is_custom_property(name))
            .map(|(n, v)| (n.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}
