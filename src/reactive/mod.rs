//! Reactive core - dependency tracking, observable cells, computed expressions.
//!
//! The reactive graph is built implicitly: reading an [`Observable`] or a
//! [`Computed`] inside a tracked evaluation records the read into the current
//! evaluation frame, and the evaluating computed subscribes to exactly the
//! sources it read. Writes propagate synchronously and run to completion
//! before [`Observable::set`] returns.
//!
//! # Capability seams
//!
//! Instead of duck-typing "is this observable?", the seams are explicit
//! traits:
//! - [`Trackable`] - a source with identity that reactions can attach to
//!   (implemented by observable cells and computed expressions).
//! - [`Reaction`] - a subscriber that can be notified and can report itself
//!   disposed (implemented by computed expressions and by binding
//!   controllers).
//!
//! # Ordering
//!
//! Subscribers are notified in the order their subscriptions were
//! registered, and a computed finishes recomputing (dependencies re-wired,
//! value stored) before its own subscribers see the change, so propagation
//! through the graph is topological, never interleaved.

mod computed;
mod observable;
mod subscription;
pub mod tracking;

pub use computed::Computed;
pub use observable::Observable;
pub use subscription::{SubscriptionHandle, SubscriptionId};
pub use tracking::{track, untracked};

use std::cell::Cell;
use std::rc::{Rc, Weak};

use crate::error::BindError;

/// Identity of a reactive source, unique within the thread.
pub type SourceId = u64;

thread_local! {
    static NEXT_SOURCE_ID: Cell<SourceId> = const { Cell::new(0) };
}

/// Allocate a fresh source identity.
pub(crate) fn next_source_id() -> SourceId {
    NEXT_SOURCE_ID.with(|next| {
        let id = next.get();
        next.set(id + 1);
        id
    })
}

/// A reactive source that dependents can attach to.
///
/// Attaching never causes evaluation; it only registers the reaction for
/// future change notification. The subscription edge is exclusively owned by
/// the subscriber, which detaches it when it no longer reads the source.
pub trait Trackable {
    /// Stable identity used for dependency-set diffing.
    fn source_id(&self) -> SourceId;

    /// Register a reaction; returns the subscription identity needed to
    /// detach it later.
    fn attach(&self, reaction: Weak<dyn Reaction>) -> SubscriptionId;

    /// Remove a previously attached reaction. Unknown ids are ignored.
    fn detach(&self, subscription: SubscriptionId);
}

/// A subscriber in the reactive graph.
pub trait Reaction {
    /// React to a change in an attached source. Errors abort the
    /// propagation chain and surface from the triggering write.
    fn notify(self: Rc<Self>) -> Result<(), BindError>;

    /// Disposed reactions are skipped by notification fan-out.
    fn is_disposed(&self) -> bool;
}
