#![forbid(unsafe_code)]

//! Element tree collaborator for design tokens.
//!
//! A [`Document`] owns an arena of elements rooted at `body`. [`Element`]
//! handles give parent/child traversal, attributes, inline custom properties
//! and an inherited [`ComputedStyle`] view. Structural changes are reported
//! to listeners registered with [`Document::on_mutation`], which is how token
//! state learns that elements moved or left the tree.

pub mod document;
pub mod element;
pub mod style;

pub use document::{Document, DocumentId, TreeMutation};
pub use element::{Ancestors, Element, ElementId};
pub use style::ComputedStyle;

/// Errors from tree operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// Inserting a node into itself or one of its descendants.
    #[error("cannot insert element {child} under its own descendant {parent}")]
    HierarchyRequest { parent: ElementId, child: ElementId },
    /// `remove_child` with an element that is not a child.
    #[error("element {child} is not a child of {parent}")]
    NotAChild { parent: ElementId, child: ElementId },
    /// Elements from different documents cannot be linked.
    #[error("element {0} belongs to another document")]
    WrongDocument(ElementId),
    /// The root element cannot be detached.
    #[error("the document root cannot be removed")]
    RootRemoval,
}
