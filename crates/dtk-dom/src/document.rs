#![forbid(unsafe_code)]

//! Document arena and mutation notifications.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use dtk_runtime::Subscription;

use crate::element::{Element, ElementId};

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique document identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u64);

impl DocumentId {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

/// Structural change reported to [`Document::on_mutation`] listeners.
///
/// Both variants list the whole affected subtree, root first, in pre-order.
/// Moving an element is reported as `Removed` followed by `Inserted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeMutation {
    Inserted {
        document: DocumentId,
        elements: Vec<ElementId>,
    },
    Removed {
        document: DocumentId,
        elements: Vec<ElementId>,
    },
}

impl TreeMutation {
    #[must_use]
    pub fn document(&self) -> DocumentId {
        match self {
            Self::Inserted { document, .. } | Self::Removed { document, .. } => *document,
        }
    }

    #[must_use]
    pub fn elements(&self) -> &[ElementId] {
        match self {
            Self::Inserted { elements, .. } | Self::Removed { elements, .. } => elements,
        }
    }
}

type MutationListener = dyn Fn(&TreeMutation);

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) id: ElementId,
    pub(crate) tag: String,
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
    pub(crate) attributes: Vec<(String, String)>,
    pub(crate) properties: Vec<(String, String)>,
    pub(crate) text: String,
}

impl Node {
    fn new(tag: &str) -> Self {
        Self {
            id: ElementId::next(),
            tag: tag.to_ascii_lowercase(),
            parent: None,
            children: Vec::new(),
            attributes: Vec::new(),
            properties: Vec::new(),
            text: String::new(),
        }
    }
}

pub(crate) struct DocumentInner {
    pub(crate) nodes: Vec<Node>,
    slots: AHashMap<ElementId, usize>,
    listeners: Vec<Weak<MutationListener>>,
}

pub(crate) const ROOT_SLOT: usize = 0;

/// Shared handle to an element tree. Clones refer to the same document.
#[derive(Clone)]
pub struct Document {
    inner: Rc<RefCell<DocumentInner>>,
    id: DocumentId,
}

impl Document {
    /// Create a document containing only its `body` root.
    #[must_use]
    pub fn new() -> Self {
        let body = Node::new("body");
        let mut slots = AHashMap::new();
        slots.insert(body.id, ROOT_SLOT);
        Self {
            inner: Rc::new(RefCell::new(DocumentInner {
                nodes: vec![body],
                slots,
                listeners: Vec::new(),
            })),
            id: DocumentId(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed)),
        }
    }

    #[must_use]
    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// The root element.
    #[must_use]
    pub fn body(&self) -> Element {
        self.handle(ROOT_SLOT)
    }

    /// Create a detached element.
    pub fn create_element(&self, tag: &str) -> Element {
        let slot = {
            let mut inner = self.inner.borrow_mut();
            let node = Node::new(tag);
            let slot = inner.nodes.len();
            inner.slots.insert(node.id, slot);
            inner.nodes.push(node);
            slot
        };
        self.handle(slot)
    }

    /// Look up an element of this document by id.
    #[must_use]
    pub fn element(&self, id: ElementId) -> Option<Element> {
        let slot = self.inner.borrow().slots.get(&id).copied()?;
        Some(self.handle(slot))
    }

    /// Number of elements ever created in this document, connected or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First connected element whose `id` attribute equals `html_id`.
    #[must_use]
    pub fn query_by_id(&self, html_id: &str) -> Option<Element> {
        std::iter::once(self.body())
            .chain(self.body().descendants())
            .find(|el| el.html_id().as_deref() == Some(html_id))
    }

    /// Connected elements with the given tag, in document order.
    #[must_use]
    pub fn query_by_tag(&self, tag: &str) -> Vec<Element> {
        let tag = tag.to_ascii_lowercase();
        std::iter::once(self.body())
            .chain(self.body().descendants())
            .filter(|el| el.tag_name() == tag)
            .collect()
    }

    /// Listen for structural changes. Dropping the subscription stops them.
    pub fn on_mutation(&self, listener: impl Fn(&TreeMutation) + 'static) -> Subscription {
        let listener: Rc<MutationListener> = Rc::new(listener);
        self.inner
            .borrow_mut()
            .listeners
            .push(Rc::downgrade(&listener));
        Subscription::from_guard(listener)
    }

    pub(crate) fn handle(&self, slot: usize) -> Element {
        let id = self.inner.borrow().nodes[slot].id;
        Element::from_parts(self.clone(), id, slot)
    }

    pub(crate) fn nodes(&self) -> Ref<'_, DocumentInner> {
        self.inner.borrow()
    }

    pub(crate) fn nodes_mut(&self) -> RefMut<'_, DocumentInner> {
        self.inner.borrow_mut()
    }

    pub(crate) fn same_as(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn notify(&self, mutation: &TreeMutation) {
        let listeners: Vec<Rc<MutationListener>> = {
            let mut inner = self.inner.borrow_mut();
            inner.listeners.retain(|w| w.strong_count() > 0);
            inner.listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in listeners {
            listener(mutation);
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("elements", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn new_document_has_body() {
        let doc = Document::new();
        assert_eq!(doc.body().tag_name(), "body");
        assert!(doc.body().is_connected());
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn documents_have_distinct_ids() {
        assert_ne!(Document::new().id(), Document::new().id());
    }

    #[test]
    fn element_lookup_by_id() {
        let doc = Document::new();
        let el = doc.create_element("DIV");
        assert_eq!(el.tag_name(), "div");
        assert_eq!(doc.element(el.id()), Some(el.clone()));
        assert!(Document::new().element(el.id()).is_none());
    }

    #[test]
    fn query_only_sees_connected_elements() {
        let doc = Document::new();
        let a = doc.create_element("fast-tab");
        a.set_html_id("tab-1");
        let b = doc.create_element("fast-tab");
        doc.body().append_child(&a).expect("append");

        assert_eq!(doc.query_by_id("tab-1"), Some(a.clone()));
        assert_eq!(doc.query_by_tag("fast-tab"), vec![a]);
        drop(b);
    }

    #[test]
    fn mutation_listener_lifecycle() {
        let doc = Document::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let sub = doc.on_mutation(move |m| s.borrow_mut().push(m.clone()));

        let el = doc.create_element("div");
        doc.body().append_child(&el).expect("append");
        el.remove().expect("remove");
        drop(sub);
        doc.body().append_child(&el).expect("append");

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[0], TreeMutation::Inserted { .. }));
        assert!(matches!(seen[1], TreeMutation::Removed { .. }));
        assert_eq!(seen[1].elements(), &[el.id()]);
        assert_eq!(seen[1].document(), doc.id());
    }
}
