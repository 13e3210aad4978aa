//! # graft
//!
//! Declarative view-binding engine with fine-grained reactivity.
//!
//! graft attaches live application data to a node tree: subtrees are
//! automatically attached, detached, or re-rendered as the underlying data
//! changes, with no virtual-DOM diff pass. Reading an [`Observable`] inside
//! a derived expression builds the subscription graph implicitly; writes
//! propagate synchronously and settle the whole document before the write
//! returns.
//!
//! ## Architecture
//!
//! ```text
//! Observable write → Computed condition re-evaluates → conditional
//! controller diffs the boolean edge → region torn down / re-materialized
//! via the template engine → bindings applied to inserted nodes with a
//! fresh pass-through context → afterRender fires once, untracked
//! ```
//!
//! ## Modules
//!
//! - [`reactive`] - dependency tracker, observable cells, computed
//!   expressions
//! - [`types`] - the dynamic host value model ([`Value`])
//! - [`dom`] - minimal node tree, disposal, virtual regions
//! - [`template`] - templating collaborator seam
//! - [`binding`] - contexts, providers, handlers, and [`apply_bindings`]
//!
//! ## Example
//!
//! ```
//! use std::rc::Rc;
//! use graft::{
//!     apply_bindings, set_provider, BindingContext, MapBindingProvider, Node, Observable,
//!     Value,
//! };
//!
//! let root = Node::element("div");
//! let child = Node::element("span");
//! root.append_child(&child);
//!
//! let visible = Observable::new(Value::Bool(false));
//! let provider = Rc::new(MapBindingProvider::new());
//! let cell = visible.clone();
//! provider.bind(&root, "if", Rc::new(move |_| Ok(Value::obs(&cell))));
//! set_provider(provider);
//!
//! let ctx = BindingContext::new(Value::object([]));
//! apply_bindings(&root, &ctx).unwrap();
//! assert_eq!(root.child_count(), 0);
//!
//! visible.set(Value::Bool(true)).unwrap();
//! assert_eq!(root.child_count(), 1);
//! ```

pub mod binding;
pub mod dom;
pub mod error;
pub mod reactive;
pub mod template;
pub mod types;

pub use binding::{
    apply_bindings, provider, register_binding, set_provider, AfterRender, BindingContext,
    BindingEntry, BindingExpr, BindingHandler, BindingOptions, BindingProvider,
    MapBindingProvider, NodeBindings,
};

pub use dom::{MarkerRole, Node, NodeId, Region, WeakNode};

pub use error::BindError;

pub use reactive::{track, untracked, Computed, Observable, SubscriptionHandle};

pub use template::{set_template_engine, NativeTemplateEngine, Template, TemplateEngine};

pub use types::Value;
