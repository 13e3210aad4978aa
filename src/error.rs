//! Error taxonomy for the binding engine.
//!
//! Everything fatal funnels into [`BindError`]. A disposed subscriber
//! encountered mid-notification is *not* an error: it is silently skipped by
//! the notification fan-out.

use thiserror::Error;

/// Errors raised by the reactive core and the binding layer.
///
/// All of these propagate synchronously to the caller of
/// [`apply_bindings`](crate::binding::apply_bindings) or to the enclosing
/// [`Observable::set`](crate::reactive::Observable::set) call. There is no
/// per-binding isolation: the first failing binding aborts the whole
/// materialization pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// A computed expression read itself (directly or through other
    /// computeds) while it was being recomputed higher up the same call
    /// chain. Aborts the triggering write's propagation.
    #[error("circular dependency detected while evaluating a computed expression")]
    CircularDependency,

    /// A binding expression failed to evaluate.
    #[error("binding expression failed: {0}")]
    Expression(String),

    /// No handler is registered under the binding name a node declared.
    #[error("no handler registered for binding '{0}'")]
    UnknownBinding(String),

    /// The templating collaborator failed to render.
    #[error("template rendering failed: {0}")]
    Template(String),

    /// A virtual region start marker has no matching end marker among its
    /// following siblings.
    #[error("virtual region '{0}' is missing its end marker")]
    UnbalancedRegion(String),
}
