#![forbid(unsafe_code)]

//! Element handles: traversal, structure edits, attributes and inline style.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::DomError;
use crate::document::{Document, ROOT_SLOT, TreeMutation};
use crate::style::ComputedStyle;

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique element identity (unique across documents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ElementId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "el#{}", self.0)
    }
}

/// Handle to one element of a [`Document`]. Equality is identity.
#[derive(Clone)]
pub struct Element {
    doc: Document,
    id: ElementId,
    slot: usize,
}

impl Element {
    pub(crate) fn from_parts(doc: Document, id: ElementId, slot: usize) -> Self {
        Self { doc, id, slot }
    }

    #[must_use]
    pub fn id(&self) -> ElementId {
        self.id
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.doc
    }

    #[must_use]
    pub fn tag_name(&self) -> String {
        self.doc.nodes().nodes[self.slot].tag.clone()
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.slot == ROOT_SLOT
    }

    #[must_use]
    pub fn parent(&self) -> Option<Element> {
        let parent = self.doc.nodes().nodes[self.slot].parent?;
        Some(self.doc.handle(parent))
    }

    #[must_use]
    pub fn children(&self) -> Vec<Element> {
        let slots = self.doc.nodes().nodes[self.slot].children.clone();
        slots.into_iter().map(|s| self.doc.handle(s)).collect()
    }

    /// Ancestors, nearest first.
    #[must_use]
    pub fn ancestors(&self) -> Ancestors {
        Ancestors {
            next: self.parent(),
        }
    }

    /// All descendants in pre-order, excluding `self`.
    #[must_use]
    pub fn descendants(&self) -> Vec<Element> {
        self.subtree_slots()
            .into_iter()
            .skip(1)
            .map(|s| self.doc.handle(s))
            .collect()
    }

    fn subtree_slots(&self) -> Vec<usize> {
        let inner = self.doc.nodes();
        let mut out = Vec::new();
        let mut stack = vec![self.slot];
        while let Some(slot) = stack.pop() {
            out.push(slot);
            stack.extend(inner.nodes[slot].children.iter().rev().copied());
        }
        out
    }

    fn subtree_ids(&self) -> Vec<ElementId> {
        let slots = self.subtree_slots();
        let inner = self.doc.nodes();
        slots.into_iter().map(|s| inner.nodes[s].id).collect()
    }

    /// Whether this element is reachable from the document root.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.is_root() || self.ancestors().any(|a| a.is_root())
    }

    /// Whether `other` is this element or one of its descendants.
    #[must_use]
    pub fn contains(&self, other: &Element) -> bool {
        other == self || other.ancestors().any(|a| &a == self)
    }

    /// Append `child` as the last child, moving it out of its current parent.
    ///
    /// # Errors
    ///
    /// - [`DomError::WrongDocument`] if `child` belongs to another document.
    /// - [`DomError::HierarchyRequest`] if `child` is `self` or an ancestor.
    pub fn append_child(&self, child: &Element) -> Result<(), DomError> {
        if !self.doc.same_as(&child.doc) {
            return Err(DomError::WrongDocument(child.id));
        }
        if child.contains(self) {
            return Err(DomError::HierarchyRequest {
                parent: self.id,
                child: child.id,
            });
        }
        if let Some(old_parent) = child.parent() {
            old_parent.remove_child(child)?;
        }
        {
            let mut inner = self.doc.nodes_mut();
            inner.nodes[child.slot].parent = Some(self.slot);
            inner.nodes[self.slot].children.push(child.slot);
        }
        let elements = child.subtree_ids();
        debug!(parent = %self.id, child = %child.id, subtree = elements.len(), "element inserted");
        self.doc.notify(&TreeMutation::Inserted {
            document: self.doc.id(),
            elements,
        });
        Ok(())
    }

    /// Detach `child` (and its subtree) from this element.
    ///
    /// # Errors
    ///
    /// [`DomError::NotAChild`] if `child` is not a direct child.
    pub fn remove_child(&self, child: &Element) -> Result<(), DomError> {
        {
            let mut inner = self.doc.nodes_mut();
            let siblings = &mut inner.nodes[self.slot].children;
            let Some(pos) = siblings
                .iter()
                .position(|s| *s == child.slot)
                .filter(|_| self.doc.same_as(&child.doc))
            else {
                return Err(DomError::NotAChild {
                    parent: self.id,
                    child: child.id,
                });
            };
            siblings.remove(pos);
            inner.nodes[child.slot].parent = None;
        }
        let elements = child.subtree_ids();
        debug!(parent = %self.id, child = %child.id, subtree = elements.len(), "element removed");
        self.doc.notify(&TreeMutation::Removed {
            document: self.doc.id(),
            elements,
        });
        Ok(())
    }

    /// Detach this element from its parent. No-op when already detached.
    ///
    /// # Errors
    ///
    /// [`DomError::RootRemoval`] for the document root.
    pub fn remove(&self) -> Result<(), DomError> {
        if self.is_root() {
            return Err(DomError::RootRemoval);
        }
        match self.parent() {
            Some(parent) => parent.remove_child(self),
            None => Ok(()),
        }
    }

    pub fn set_attribute(&self, name: &str, value: impl Into<String>) {
        let value = value.into();
        let mut inner = self.doc.nodes_mut();
        let attrs = &mut inner.nodes[self.slot].attributes;
        match attrs.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => attrs.push((name.to_string(), value)),
        }
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.doc.nodes().nodes[self.slot]
            .attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Returns `true` if the attribute existed.
    pub fn remove_attribute(&self, name: &str) -> bool {
        let mut inner = self.doc.nodes_mut();
        let attrs = &mut inner.nodes[self.slot].attributes;
        let before = attrs.len();
        attrs.retain(|(n, _)| n != name);
        attrs.len() != before
    }

    /// The `id` attribute.
    #[must_use]
    pub fn html_id(&self) -> Option<String> {
        self.attribute("id")
    }

    pub fn set_html_id(&self, id: impl Into<String>) {
        self.set_attribute("id", id);
    }

    pub fn set_text_content(&self, text: impl Into<String>) {
        self.doc.nodes_mut().nodes[self.slot].text = text.into();
    }

    /// Own text followed by descendants' text in document order.
    #[must_use]
    pub fn text_content(&self) -> String {
        let slots = self.subtree_slots();
        let inner = self.doc.nodes();
        slots
            .into_iter()
            .map(|s| inner.nodes[s].text.as_str())
            .collect()
    }

    /// Set an inline style property (e.g. a `--token` custom property).
    pub fn set_property(&self, name: &str, value: impl Into<String>) {
        let value = value.into();
        let mut inner = self.doc.nodes_mut();
        let props = &mut inner.nodes[self.slot].properties;
        match props.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => props.push((name.to_string(), value)),
        }
    }

    /// Inline value only; see [`computed_style`](Self::computed_style) for
    /// inherited values.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<String> {
        self.doc.nodes().nodes[self.slot]
            .properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    /// Remove an inline property, returning its previous value.
    pub fn remove_property(&self, name: &str) -> Option<String> {
        let mut inner = self.doc.nodes_mut();
        let props = &mut inner.nodes[self.slot].properties;
        let pos = props.iter().position(|(n, _)| n == name)?;
        Some(props.remove(pos).1)
    }

    /// Inline properties in the order they were first set.
    #[must_use]
    pub fn inline_properties(&self) -> Vec<(String, String)> {
        self.doc.nodes().nodes[self.slot].properties.clone()
    }

    /// Snapshot of this element's computed style.
    #[must_use]
    pub fn computed_style(&self) -> ComputedStyle {
        ComputedStyle::compute(self)
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Element {}

impl Hash for Element {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.id)
            .field("tag", &self.tag_name())
            .finish()
    }
}

/// Iterator over an element's ancestors, nearest first.
#[derive(Debug, Clone)]
pub struct Ancestors {
    next: Option<Element>,
}

impl Iterator for Ancestors {
    type Item = Element;

    fn next(&mut self) -> Option<Element> {
        let current = self.next.take()?;
        self.next = current.parent();
        Some(current)
    }
}
