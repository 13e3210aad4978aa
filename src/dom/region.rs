//! Virtual Region - first-class control-flow region.
//!
//! A region is the range of nodes a control-flow binding owns: either the
//! child list of an element, or the nodes strictly between a start/end
//! comment-marker pair when no wrapping element exists. The two-marker
//! invariant is carried by this type rather than by comment-text sniffing:
//! markers are typed ([`MarkerRole`]) and the matching end is found by a
//! nesting-counted sibling scan, so nested regions stay correctly bracketed
//! while outer regions rebuild.
//!
//! The owning controller never removes its own markers; only the content
//! between them is replaced.

use crate::error::BindError;

use super::node::{MarkerRole, Node};

#[derive(Clone)]
enum RegionKind {
    /// The region is the element's entire child list.
    Element(Node),
    /// The region is the sibling range strictly between the two markers.
    Virtual { start: Node, end: Node },
}

/// The node range a control-flow binding materializes into.
#[derive(Clone)]
pub struct Region {
    kind: RegionKind,
}

impl Region {
    /// Region spanning an element's children.
    pub fn element(node: &Node) -> Region {
        Region {
            kind: RegionKind::Element(node.clone()),
        }
    }

    /// Region delimited by an existing marker pair.
    pub fn virtual_pair(start: &Node, end: &Node) -> Region {
        Region {
            kind: RegionKind::Virtual {
                start: start.clone(),
                end: end.clone(),
            },
        }
    }

    /// Resolve a region from its start marker by scanning following
    /// siblings for the matching end, counting nested pairs.
    pub fn from_start_marker(start: &Node) -> Result<Region, BindError> {
        let end = find_matching_end(start).ok_or_else(|| {
            BindError::UnbalancedRegion(
                start.comment_text().unwrap_or_default().to_string(),
            )
        })?;
        Ok(Region::virtual_pair(start, &end))
    }

    /// Create a fresh marker pair appended to `parent` and return the
    /// region between them.
    pub fn virtual_in(parent: &Node, label: &str) -> Region {
        let start = Node::region_start(label);
        let end = Node::region_end("/ko");
        parent.append_child(&start);
        parent.append_child(&end);
        Region::virtual_pair(&start, &end)
    }

    /// The node bindings and disposal callbacks attach to: the element
    /// itself, or the start marker.
    pub fn owner(&self) -> &Node {
        match &self.kind {
            RegionKind::Element(node) => node,
            RegionKind::Virtual { start, .. } => start,
        }
    }

    /// Start marker, for virtual regions.
    pub fn start_marker(&self) -> Option<&Node> {
        match &self.kind {
            RegionKind::Virtual { start, .. } => Some(start),
            RegionKind::Element(_) => None,
        }
    }

    /// End marker, for virtual regions.
    pub fn end_marker(&self) -> Option<&Node> {
        match &self.kind {
            RegionKind::Virtual { end, .. } => Some(end),
            RegionKind::Element(_) => None,
        }
    }

    /// The region's current content, in document order. Markers are not
    /// content.
    pub fn contents(&self) -> Vec<Node> {
        match &self.kind {
            RegionKind::Element(node) => node.children(),
            RegionKind::Virtual { start, end } => {
                let mut nodes = Vec::new();
                let mut cursor = start.next_sibling();
                while let Some(node) = cursor {
                    if node == *end {
                        break;
                    }
                    cursor = node.next_sibling();
                    nodes.push(node);
                }
                nodes
            }
        }
    }

    /// Insert `nodes` at the end of the region (before the end marker).
    pub fn insert(&self, nodes: &[Node]) {
        match &self.kind {
            RegionKind::Element(parent) => {
                for node in nodes {
                    parent.append_child(node);
                }
            }
            RegionKind::Virtual { end, .. } => {
                if let Some(parent) = end.parent() {
                    for node in nodes {
                        parent.insert_before(node, Some(end));
                    }
                }
            }
        }
    }

    /// Purge and remove the region's content. Markers stay in place.
    pub fn clear(&self) {
        for node in self.contents() {
            node.purge();
            node.detach();
        }
    }

    /// Remove the region's content *without* running disposal, returning it
    /// in document order. Used to capture an authored template before
    /// anything has been bound.
    pub fn take_contents(&self) -> Vec<Node> {
        let nodes = self.contents();
        for node in &nodes {
            node.detach();
        }
        nodes
    }
}

/// Scan following siblings of `start` for the end marker that closes it,
/// skipping over nested start/end pairs.
pub fn find_matching_end(start: &Node) -> Option<Node> {
    let mut depth = 0usize;
    let mut cursor = start.next_sibling();
    while let Some(node) = cursor {
        match node.marker_role() {
            MarkerRole::RegionStart => depth += 1,
            MarkerRole::RegionEnd => {
                if depth == 0 {
                    return Some(node);
                }
                depth -= 1;
            }
            MarkerRole::None => {}
        }
        cursor = node.next_sibling();
    }
    None
}
