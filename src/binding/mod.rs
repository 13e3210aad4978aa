//! Binding layer - contexts, providers, handlers, and the applier.
//!
//! - [`BindingContext`]: hierarchical scope resolving `$data`, `$parent`,
//!   `$parents`, `$root`, `$index`.
//! - [`BindingProvider`]: collaborator seam supplying parsed bindings per
//!   node, plus the node preprocessing hook.
//! - [`apply_bindings`]: the external-facing entry; walks the tree (virtual
//!   regions included) and applies declared bindings against the current
//!   context. Bindings that control their own descendants suppress the
//!   default recursion.
//! - the conditional controller behind the `if`/`ifnot` handlers, which
//!   materializes and tears down its region on boolean edges of its
//!   condition.

mod applier;
mod conditional;
mod context;
mod handlers;
mod provider;

pub use applier::{apply_bindings, register_binding, BindingHandler};
pub use context::BindingContext;
pub use provider::{
    provider, set_provider, AfterRender, BindingEntry, BindingExpr, BindingOptions,
    BindingProvider, MapBindingProvider, NodeBindings, Preprocessor,
};
