//! Document model - node tree, disposal, and virtual regions.
//!
//! The engine binds against this minimal single-threaded DOM:
//! - [`Node`]: `Rc`-shared element/text/comment nodes with child-list
//!   surgery, deep cloning, serialization, and per-node disposal callbacks.
//! - [`Region`]: the range a control-flow binding owns, either an element's
//!   child list or a comment-delimited virtual range.

mod node;
mod region;

pub use node::{MarkerRole, Node, NodeId, WeakNode};
pub use region::{find_matching_end, Region};
