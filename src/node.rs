//! Graph nodes.
//!
//! A [`Node`] wraps exactly one native element and carries the node's
//! identity plus a non-owning reference to its parent component. The parent
//! reference is an identifier used for lookups only; lifetime is managed by
//! the parent's owning child collection.

use crate::engine::{Element, ElementKind, Pad, PadLinkReturn};
use crate::error::Result;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Non-owning reference from a child to its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentLink {
    /// Parent identity.
    pub id: NodeId,
    /// Parent name, kept for logs.
    pub name: String,
}

#[derive(Debug)]
struct SinkLink {
    peer: NodeId,
    src_pad: Pad,
    sink_pad: Pad,
}

/// A named node wrapping one native element.
pub struct Node {
    id: NodeId,
    name: String,
    element: Element,
    parent: Mutex<Option<ParentLink>>,
    sink: Mutex<Option<SinkLink>>,
}

impl Node {
    /// Wrap an element. The node takes the element's name.
    pub fn new(element: Element) -> Self {
        Self {
            id: NodeId::next(),
            name: element.name().to_string(),
            element,
            parent: Mutex::new(None),
            sink: Mutex::new(None),
        }
    }

    /// Node identity.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Node name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wrapped native element.
    pub fn element(&self) -> &Element {
        &self.element
    }

    /// Look up a static pad of the wrapped element.
    pub fn static_pad(&self, name: &str) -> Option<Pad> {
        self.element.static_pad(name)
    }

    /// The current parent, if attached.
    pub fn parent(&self) -> Option<ParentLink> {
        self.parent.lock().unwrap().clone()
    }

    /// Whether this node is attached to a parent.
    pub fn has_parent(&self) -> bool {
        self.parent.lock().unwrap().is_some()
    }

    /// Whether `id` is this node's parent.
    pub fn is_child_of(&self, id: NodeId) -> bool {
        self.parent
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|p| p.id == id)
    }

    /// Record `parent`. Fails if a parent is already recorded.
    pub(crate) fn set_parent(&self, parent: ParentLink) -> bool {
        let mut slot = self.parent.lock().unwrap();
        if slot.is_some() {
            return false;
        }
        *slot = Some(parent);
        true
    }

    pub(crate) fn clear_parent(&self) {
        *self.parent.lock().unwrap() = None;
    }

    /// Link this node's `src` pad to `sink`'s `sink` pad.
    pub fn link_to_sink(&self, sink: &Node) -> bool {
        let mut slot = self.sink.lock().unwrap();
        if let Some(existing) = slot.as_ref() {
            tracing::error!(
                node = %self.name,
                peer = %existing.peer,
                "node is already linked to a sink"
            );
            return false;
        }
        let (Some(src_pad), Some(sink_pad)) = (self.static_pad("src"), sink.static_pad("sink"))
        else {
            tracing::error!(
                node = %self.name,
                sink = %sink.name,
                "missing src or sink pad for link"
            );
            return false;
        };
        match src_pad.link(&sink_pad) {
            PadLinkReturn::Ok => {
                tracing::debug!(src = %self.name, sink = %sink.name, "linked");
                *slot = Some(SinkLink {
                    peer: sink.id,
                    src_pad,
                    sink_pad,
                });
                true
            }
            other => {
                tracing::error!(
                    src = %self.name,
                    sink = %sink.name,
                    result = ?other,
                    "failed to link"
                );
                false
            }
        }
    }

    /// Undo [`Node::link_to_sink`].
    pub fn unlink_from_sink(&self) -> bool {
        let Some(link) = self.sink.lock().unwrap().take() else {
            tracing::error!(node = %self.name, "node is not linked to a sink");
            return false;
        };
        link.src_pad.unlink(&link.sink_pad);
        tracing::debug!(node = %self.name, peer = %link.peer, "unlinked from sink");
        true
    }

    /// Link `source`'s `src` pad to this node's `sink` pad.
    pub fn link_to_source(&self, source: &Node) -> bool {
        source.link_to_sink(self)
    }

    /// Undo [`Node::link_to_source`]. Fails if `source` is not linked to
    /// this node.
    pub fn unlink_from_source(&self, source: &Node) -> bool {
        if source.linked_sink() != Some(self.id) {
            tracing::error!(node = %self.name, source = %source.name, "source is not linked to node");
            return false;
        }
        source.unlink_from_sink()
    }

    /// Whether this node is linked to a downstream sink.
    pub fn is_linked_to_sink(&self) -> bool {
        self.sink.lock().unwrap().is_some()
    }

    /// Identity of the linked downstream node.
    pub fn linked_sink(&self) -> Option<NodeId> {
        self.sink.lock().unwrap().as_ref().map(|l| l.peer)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.element.kind())
            .field("parent", &self.parent())
            .finish()
    }
}

/// A leaf node wrapping a single element. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Elementr(Arc<Node>);

impl Elementr {
    /// Create an element by factory name and wrap it.
    pub fn new(factory: &str, name: impl Into<String>) -> Result<Self> {
        Ok(Self::from_element(Element::make(factory, name)?))
    }

    /// Create an element of a known kind and wrap it.
    pub fn of_kind(kind: ElementKind, name: impl Into<String>) -> Self {
        Self::from_element(Element::new(kind, name))
    }

    /// Wrap an existing element.
    pub fn from_element(element: Element) -> Self {
        Self(Arc::new(Node::new(element)))
    }

    /// The wrapped node.
    pub fn node(&self) -> &Node {
        &self.0
    }
}

impl Deref for Elementr {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.0
    }
}

impl PartialEq for Elementr {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Elementr {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = Elementr::of_kind(ElementKind::Queue, "a");
        let b = Elementr::of_kind(ElementKind::Queue, "a");
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_single_parent_slot() {
        let q = Elementr::of_kind(ElementKind::Queue, "q");
        let p1 = ParentLink {
            id: NodeId::next(),
            name: "p1".into(),
        };
        assert!(q.set_parent(p1.clone()));
        assert!(!q.set_parent(ParentLink {
            id: NodeId::next(),
            name: "p2".into()
        }));
        assert!(q.is_child_of(p1.id));
        q.clear_parent();
        assert!(!q.has_parent());
    }

    #[test]
    fn test_link_and_unlink() {
        let q = Elementr::of_kind(ElementKind::Queue, "q");
        let sink = Elementr::of_kind(ElementKind::FakeSink, "sink");
        let other = Elementr::of_kind(ElementKind::FakeSink, "other");

        assert!(q.link_to_sink(&sink));
        assert!(!q.link_to_sink(&other));
        assert_eq!(q.linked_sink(), Some(sink.id()));
        assert!(!other.unlink_from_source(&q));
        assert!(sink.unlink_from_source(&q));
        assert!(!q.unlink_from_sink());
        assert!(!q.is_linked_to_sink());
    }

    #[test]
    fn test_link_requires_pads() {
        let sink = Elementr::of_kind(ElementKind::FakeSink, "sink");
        let sink2 = Elementr::of_kind(ElementKind::FakeSink, "sink2");
        assert!(!sink.link_to_sink(&sink2));
    }
}
