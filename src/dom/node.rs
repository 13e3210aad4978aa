//! Node tree - the minimal single-threaded document the engine binds to.
//!
//! Nodes are `Rc`-shared handles; cloning a [`Node`] clones the handle.
//! Three kinds exist: elements (tag + children), text (mutable data), and
//! comments. Comments optionally carry a marker role so a pair of them can
//! delimit a containerless control-flow region (see
//! [`Region`](crate::dom::Region)).
//!
//! # Disposal
//!
//! Bindings register teardown callbacks on the node they bound via
//! [`Node::on_dispose`]. [`Node::purge`] runs them depth-first (children
//! first) across a subtree, each at most once. Removing content from a
//! region purges it first, which is how descendant computeds and nested
//! controllers die when a region unmaterializes.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

/// Identity of a node, unique within the thread. Fresh ids are assigned to
/// clones, so a rendered copy never aliases its template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

thread_local! {
    static NEXT_NODE_ID: Cell<u64> = const { Cell::new(0) };
}

fn next_node_id() -> NodeId {
    NEXT_NODE_ID.with(|next| {
        let id = next.get();
        next.set(id + 1);
        NodeId(id)
    })
}

/// Role of a comment node in virtual-region bracketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerRole {
    None,
    RegionStart,
    RegionEnd,
}

pub(crate) enum NodeKind {
    Element { tag: String },
    Text { data: RefCell<String> },
    Comment { text: String, marker: MarkerRole },
}

pub(crate) struct NodeInner {
    id: NodeId,
    kind: NodeKind,
    parent: RefCell<Weak<NodeInner>>,
    children: RefCell<Vec<Node>>,
    disposal: RefCell<Vec<Box<dyn FnOnce()>>>,
    binding_key: RefCell<Option<Rc<str>>>,
}

/// Shared handle to a node in the tree.
#[derive(Clone)]
pub struct Node {
    inner: Rc<NodeInner>,
}

impl PartialEq for Node {
    fn eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Node {}

/// Weak handle to a node. Bindings attached to a node are owned by its
/// disposal list, so anything they capture that points back at the node must
/// hold it weakly or the subtree can never be freed.
#[derive(Clone)]
pub struct WeakNode {
    inner: Weak<NodeInner>,
}

impl WeakNode {
    pub fn upgrade(&self) -> Option<Node> {
        self.inner.upgrade().map(|inner| Node { inner })
    }
}

impl Node {
    fn from_kind(kind: NodeKind) -> Node {
        Node {
            inner: Rc::new(NodeInner {
                id: next_node_id(),
                kind,
                parent: RefCell::new(Weak::new()),
                children: RefCell::new(Vec::new()),
                disposal: RefCell::new(Vec::new()),
                binding_key: RefCell::new(None),
            }),
        }
    }

    pub fn element(tag: &str) -> Node {
        Node::from_kind(NodeKind::Element { tag: tag.to_string() })
    }

    pub fn text(data: &str) -> Node {
        Node::from_kind(NodeKind::Text {
            data: RefCell::new(data.to_string()),
        })
    }

    pub fn comment(text: &str) -> Node {
        Node::from_kind(NodeKind::Comment {
            text: text.to_string(),
            marker: MarkerRole::None,
        })
    }

    /// Comment node opening a virtual region, e.g. `<!--ko if: x-->`.
    pub fn region_start(text: &str) -> Node {
        Node::from_kind(NodeKind::Comment {
            text: text.to_string(),
            marker: MarkerRole::RegionStart,
        })
    }

    /// Comment node closing a virtual region, e.g. `<!--/ko-->`.
    pub fn region_end(text: &str) -> Node {
        Node::from_kind(NodeKind::Comment {
            text: text.to_string(),
            marker: MarkerRole::RegionEnd,
        })
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn is_element(&self) -> bool {
        matches!(self.inner.kind, NodeKind::Element { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(self.inner.kind, NodeKind::Text { .. })
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.inner.kind, NodeKind::Comment { .. })
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.inner.kind {
            NodeKind::Element { tag } => Some(tag),
            _ => None,
        }
    }

    pub fn text_data(&self) -> Option<String> {
        match &self.inner.kind {
            NodeKind::Text { data } => Some(data.borrow().clone()),
            _ => None,
        }
    }

    pub fn set_text_data(&self, text: &str) {
        if let NodeKind::Text { data } = &self.inner.kind {
            *data.borrow_mut() = text.to_string();
        }
    }

    pub fn comment_text(&self) -> Option<&str> {
        match &self.inner.kind {
            NodeKind::Comment { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn marker_role(&self) -> MarkerRole {
        match &self.inner.kind {
            NodeKind::Comment { marker, .. } => *marker,
            _ => MarkerRole::None,
        }
    }

    // -------------------------------------------------------------------------
    // Tree surgery
    // -------------------------------------------------------------------------

    pub fn parent(&self) -> Option<Node> {
        self.inner
            .parent
            .borrow()
            .upgrade()
            .map(|inner| Node { inner })
    }

    /// Snapshot of the child list.
    pub fn children(&self) -> Vec<Node> {
        self.inner.children.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    pub fn first_child(&self) -> Option<Node> {
        self.inner.children.borrow().first().cloned()
    }

    pub fn child(&self, index: usize) -> Option<Node> {
        self.inner.children.borrow().get(index).cloned()
    }

    pub fn append_child(&self, child: &Node) {
        child.detach();
        *child.inner.parent.borrow_mut() = Rc::downgrade(&self.inner);
        self.inner.children.borrow_mut().push(child.clone());
    }

    /// Insert `child` before `reference` (which must be a child of `self`),
    /// or append when `reference` is `None`.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) {
        child.detach();
        *child.inner.parent.borrow_mut() = Rc::downgrade(&self.inner);
        let mut children = self.inner.children.borrow_mut();
        let position = reference
            .and_then(|r| children.iter().position(|c| c == r))
            .unwrap_or(children.len());
        children.insert(position, child.clone());
    }

    /// Detach this node from its parent, if any. Does not run disposal.
    pub fn detach(&self) {
        if let Some(parent) = self.parent() {
            parent
                .inner
                .children
                .borrow_mut()
                .retain(|c| c != self);
            *self.inner.parent.borrow_mut() = Weak::new();
        }
    }

    pub fn next_sibling(&self) -> Option<Node> {
        let parent = self.parent()?;
        let children = parent.inner.children.borrow();
        let position = children.iter().position(|c| c == self)?;
        children.get(position + 1).cloned()
    }

    /// Deep copy with fresh ids. Marker roles and binding keys are
    /// preserved; disposal callbacks and parent links are not.
    pub fn clone_subtree(&self) -> Node {
        let kind = match &self.inner.kind {
            NodeKind::Element { tag } => NodeKind::Element { tag: tag.clone() },
            NodeKind::Text { data } => NodeKind::Text {
                data: RefCell::new(data.borrow().clone()),
            },
            NodeKind::Comment { text, marker } => NodeKind::Comment {
                text: text.clone(),
                marker: *marker,
            },
        };
        let copy = Node::from_kind(kind);
        *copy.inner.binding_key.borrow_mut() = self.inner.binding_key.borrow().clone();
        for child in self.children() {
            copy.append_child(&child.clone_subtree());
        }
        copy
    }

    /// The node's binding key, if one was assigned. Unlike [`NodeId`], the
    /// key travels with [`Node::clone_subtree`], the way a markup attribute
    /// would, so rendered copies of a template resolve to the same declared
    /// bindings as the original.
    pub fn binding_key(&self) -> Option<Rc<str>> {
        self.inner.binding_key.borrow().clone()
    }

    pub fn set_binding_key(&self, key: &str) {
        *self.inner.binding_key.borrow_mut() = Some(Rc::from(key));
    }

    pub fn downgrade(&self) -> WeakNode {
        WeakNode {
            inner: Rc::downgrade(&self.inner),
        }
    }

    // -------------------------------------------------------------------------
    // Disposal
    // -------------------------------------------------------------------------

    /// Register a callback to run when this node's subtree is purged.
    pub fn on_dispose(&self, callback: impl FnOnce() + 'static) {
        self.inner.disposal.borrow_mut().push(Box::new(callback));
    }

    /// Run disposal callbacks for this node and every descendant,
    /// depth-first (children before their parent). Each callback runs at
    /// most once. The tree structure is left untouched.
    pub fn purge(&self) {
        for child in self.children() {
            child.purge();
        }
        let callbacks: Vec<Box<dyn FnOnce()>> =
            self.inner.disposal.borrow_mut().drain(..).collect();
        if !callbacks.is_empty() {
            trace!(node = ?self.inner.id, count = callbacks.len(), "purging node");
        }
        for callback in callbacks {
            callback();
        }
    }

    // -------------------------------------------------------------------------
    // Serialization (primarily for tests and debugging)
    // -------------------------------------------------------------------------

    /// Serialize the subtree, comments included, e.g.
    /// `A<!--ko if: x--><!--/ko-->B`.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    /// Serialize only the children, the way a container's inner HTML reads.
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in self.children() {
            child.write_html(&mut out);
        }
        out
    }

    fn write_html(&self, out: &mut String) {
        match &self.inner.kind {
            NodeKind::Element { tag } => {
                out.push('<');
                out.push_str(tag);
                out.push('>');
                for child in self.children() {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            NodeKind::Text { data } => out.push_str(&data.borrow()),
            NodeKind::Comment { text, .. } => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
        }
    }

    /// Concatenated text of the subtree, ignoring markup.
    pub fn text_content(&self) -> String {
        match &self.inner.kind {
            NodeKind::Text { data } => data.borrow().clone(),
            NodeKind::Comment { .. } => String::new(),
            NodeKind::Element { .. } => {
                self.children().iter().map(Node::text_content).collect()
            }
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.kind {
            NodeKind::Element { tag } => write!(f, "Element<{tag}>({:?})", self.inner.id),
            NodeKind::Text { data } => write!(f, "Text({:?}, {:?})", self.inner.id, data.borrow()),
            NodeKind::Comment { text, marker } => {
                write!(f, "Comment({:?}, {text:?}, {marker:?})", self.inner.id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_tree_surgery() {
        let root = Node::element("div");
        let a = Node::text("A");
        let span = Node::element("span");
        let b = Node::text("B");

        root.append_child(&a);
        root.append_child(&b);
        root.insert_before(&span, Some(&b));

        assert_eq!(root.to_html(), "<div>A<span></span>B</div>");
        assert_eq!(span.next_sibling(), Some(b.clone()));
        assert_eq!(span.parent(), Some(root.clone()));

        span.detach();
        assert_eq!(root.to_html(), "<div>AB</div>");
        assert!(span.parent().is_none());
    }

    #[test]
    fn test_clone_subtree_is_independent() {
        let original = Node::element("div");
        let child = Node::text("hello");
        original.append_child(&child);

        let copy = original.clone_subtree();
        assert_eq!(copy.to_html(), original.to_html());
        assert_ne!(copy.id(), original.id());

        copy.first_child().unwrap().set_text_data("changed");
        assert_eq!(original.first_child().unwrap().text_data().unwrap(), "hello");
    }

    #[test]
    fn test_purge_runs_depth_first_once() {
        let root = Node::element("div");
        let child = Node::element("span");
        root.append_child(&child);

        let order = Rc::new(RefCell::new(Vec::new()));
        let order_root = order.clone();
        root.on_dispose(move || order_root.borrow_mut().push("root"));
        let order_child = order.clone();
        child.on_dispose(move || order_child.borrow_mut().push("child"));

        root.purge();
        assert_eq!(*order.borrow(), vec!["child", "root"]);

        // Second purge is a no-op.
        root.purge();
        assert_eq!(order.borrow().len(), 2);
    }

    #[test]
    fn test_purge_does_not_remove_nodes() {
        let root = Node::element("div");
        let child = Node::text("x");
        root.append_child(&child);

        let fired = Rc::new(Cell::new(false));
        let fired_cb = fired.clone();
        child.on_dispose(move || fired_cb.set(true));

        root.purge();
        assert!(fired.get());
        assert_eq!(root.to_html(), "<div>x</div>");
    }

    #[test]
    fn test_comment_serialization() {
        let root = Node::element("div");
        root.append_child(&Node::text("hello "));
        root.append_child(&Node::region_start("ko if: someitem"));
        root.append_child(&Node::region_end("/ko"));
        root.append_child(&Node::text(" goodbye"));

        assert_eq!(
            root.inner_html(),
            "hello <!--ko if: someitem--><!--/ko--> goodbye"
        );
    }
}
