//! Binding Applier - walks the tree applying declared bindings.
//!
//! Pre-order traversal over real children *and* virtual regions: a
//! region-start comment binds like an element boundary, and when its binding
//! controls its own descendants the walk resumes after the matching end
//! marker instead of descending. Nodes are preprocessed by the installed
//! provider before binding application sees them; the replacement list is
//! authoritative.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use tracing::trace;

use crate::dom::{find_matching_end, MarkerRole, Node, Region};
use crate::error::BindError;

use super::context::BindingContext;
use super::handlers::{ConditionalHandler, TextHandler};
use super::provider::{provider, BindingEntry};

/// A binding implementation resolvable by name.
pub trait BindingHandler {
    /// Whether this binding owns its node's content: the default traversal
    /// will not recurse into it, and the handler is responsible for
    /// applying bindings to anything it inserts.
    fn controls_descendants(&self) -> bool {
        false
    }

    fn bind(&self, node: &Node, entry: &BindingEntry, ctx: &BindingContext)
        -> Result<(), BindError>;
}

fn default_handlers() -> AHashMap<String, Rc<dyn BindingHandler>> {
    let mut map: AHashMap<String, Rc<dyn BindingHandler>> = AHashMap::new();
    map.insert("if".into(), Rc::new(ConditionalHandler { negate: false }));
    map.insert("ifnot".into(), Rc::new(ConditionalHandler { negate: true }));
    map.insert("text".into(), Rc::new(TextHandler));
    map
}

thread_local! {
    static REGISTRY: RefCell<AHashMap<String, Rc<dyn BindingHandler>>> =
        RefCell::new(default_handlers());
}

/// Register (or replace) a binding handler under `name`.
pub fn register_binding(name: &str, handler: Rc<dyn BindingHandler>) {
    REGISTRY.with(|registry| {
        registry.borrow_mut().insert(name.to_string(), handler);
    });
}

fn handler_for(name: &str) -> Option<Rc<dyn BindingHandler>> {
    REGISTRY.with(|registry| registry.borrow().get(name).cloned())
}

/// Apply bindings to `root` and its whole subtree, nested conditional
/// regions included. Returns once the tree is fully materialized.
pub fn apply_bindings(root: &Node, ctx: &BindingContext) -> Result<(), BindError> {
    let controls = bind_node(root, ctx)?;
    if !controls {
        bind_child_range(root.first_child(), None, ctx)?;
    }
    Ok(())
}

/// Apply bindings to a region's current content. Controllers call this on
/// the nodes they insert.
pub(crate) fn bind_region_contents(
    region: &Region,
    ctx: &BindingContext,
) -> Result<(), BindError> {
    match (region.start_marker(), region.end_marker()) {
        (Some(start), Some(end)) => {
            bind_child_range(start.next_sibling(), Some(end.clone()), ctx)
        }
        _ => bind_child_range(region.owner().first_child(), None, ctx),
    }
}

/// The region a content-owning binding operates on: an element's child
/// list, or the virtual range opened by a start marker.
pub(crate) fn region_for_node(node: &Node) -> Result<Region, BindError> {
    if node.is_element() {
        Ok(Region::element(node))
    } else if node.marker_role() == MarkerRole::RegionStart {
        Region::from_start_marker(node)
    } else {
        Err(BindError::Expression(
            "binding requires an element or a virtual-region start marker".to_string(),
        ))
    }
}

/// Walk a sibling range, binding each node; stops before `stop` (the
/// enclosing region's end marker) when given.
fn bind_child_range(
    first: Option<Node>,
    stop: Option<Node>,
    ctx: &BindingContext,
) -> Result<(), BindError> {
    let mut cursor = first;
    while let Some(node) = cursor {
        if stop.as_ref() == Some(&node) {
            break;
        }

        // A preprocessor may replace the node; grab the continuation point
        // first in case it vanishes entirely.
        let fallback = node.next_sibling();
        let node = match provider().preprocess(&node) {
            Some(replacements) => match replacements.into_iter().next() {
                Some(first_replacement) => first_replacement,
                None => {
                    cursor = fallback;
                    continue;
                }
            },
            None => node,
        };

        cursor = bind_in_range(&node, ctx)?;
    }
    Ok(())
}

/// Bind one node; returns the next sibling the outer walk should visit.
fn bind_in_range(node: &Node, ctx: &BindingContext) -> Result<Option<Node>, BindError> {
    if node.marker_role() == MarkerRole::RegionStart {
        // Virtual regions bind like element boundaries. Resolve the end
        // first: a content-owning binding removes everything in between.
        let end = find_matching_end(node).ok_or_else(|| {
            BindError::UnbalancedRegion(node.comment_text().unwrap_or_default().to_string())
        })?;
        let controls = bind_node(node, ctx)?;
        if !controls {
            bind_child_range(node.next_sibling(), Some(end.clone()), ctx)?;
        }
        return Ok(end.next_sibling());
    }

    let controls = bind_node(node, ctx)?;
    if !controls && node.is_element() {
        bind_child_range(node.first_child(), None, ctx)?;
    }
    Ok(node.next_sibling())
}

/// Apply every binding declared on `node`; reports whether any of them
/// controls descendants.
fn bind_node(node: &Node, ctx: &BindingContext) -> Result<bool, BindError> {
    let Some(bindings) = provider().bindings_for(node) else {
        return Ok(false);
    };
    trace!(node = ?node.id(), count = bindings.entries.len(), "binding node");

    let mut controls = false;
    for entry in &bindings.entries {
        let handler = handler_for(&entry.name)
            .ok_or_else(|| BindError::UnknownBinding(entry.name.clone()))?;
        controls |= handler.controls_descendants();
        handler.bind(node, entry, ctx)?;
    }
    Ok(controls)
}
