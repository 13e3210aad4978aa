//! Computed Expression - derived reactive value with auto-tracked
//! dependencies.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashSet;
use smallvec::SmallVec;
use tracing::trace;

use crate::error::BindError;

use super::subscription::{ListenerReaction, Subscribers, SubscriptionHandle};
use super::tracking;
use super::{next_source_id, Reaction, SourceId, SubscriptionId, Trackable};

/// One subscription edge from this computed back to a source it reads.
struct DependencyEdge {
    source: Rc<dyn Trackable>,
    subscription: SubscriptionId,
}

/// A derived value recomputed from its tracked dependencies.
///
/// The first evaluation runs eagerly inside [`Computed::new`]. Each
/// recomputation replaces the dependency set wholesale: sources no longer
/// read are unsubscribed, newly read ones subscribed. The computed is itself
/// a [`Trackable`] source, so computeds chain into a directed acyclic
/// subscription graph.
///
/// # Cycle policy
///
/// Reading a computed that is currently recomputing higher up the same call
/// chain fails with [`BindError::CircularDependency`] instead of recursing.
/// The same error is raised for subscription cycles: a recompute re-entering
/// a computed that is still fanning out its own change notification aborts
/// the propagation instead of recursing unboundedly. Plain cached reads of a
/// notifying computed stay valid, so diamond-shaped graphs are unaffected.
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

struct ComputedInner<T> {
    id: SourceId,
    evaluate: Box<dyn Fn() -> Result<T, BindError>>,
    value: RefCell<T>,
    edges: RefCell<SmallVec<[DependencyEdge; 4]>>,
    subscribers: Subscribers,
    recomputing: Cell<bool>,
    propagating: Cell<bool>,
    disposed: Cell<bool>,
}

impl<T: 'static> Trackable for ComputedInner<T> {
    fn source_id(&self) -> SourceId {
        self.id
    }

    fn attach(&self, reaction: Weak<dyn Reaction>) -> SubscriptionId {
        self.subscribers.attach(reaction)
    }

    fn detach(&self, subscription: SubscriptionId) {
        self.subscribers.detach(subscription)
    }
}

impl<T: Clone + PartialEq + 'static> Reaction for ComputedInner<T> {
    fn notify(self: Rc<Self>) -> Result<(), BindError> {
        if self.disposed.get() {
            return Ok(());
        }
        self.recompute()
    }

    fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

impl<T: Clone + PartialEq + 'static> ComputedInner<T> {
    fn recompute(self: &Rc<Self>) -> Result<(), BindError> {
        if self.recomputing.get() || self.propagating.get() {
            return Err(BindError::CircularDependency);
        }
        self.recomputing.set(true);
        let (result, deps) = tracking::track(|| (self.evaluate)());
        self.recomputing.set(false);
        let new_value = result?;

        self.rewire(deps);

        let changed = {
            let mut stored = self.value.borrow_mut();
            if *stored == new_value {
                false
            } else {
                *stored = new_value;
                true
            }
        };
        trace!(source = self.id, changed, "computed recomputed");

        if changed {
            // Dependencies are settled and the value is stored before our
            // own subscribers hear about it. The guard stays up across the
            // fan-out: a dependent that circles back into this recompute
            // gets CircularDependency instead of unbounded recursion, while
            // cached `get()` reads stay valid.
            self.propagating.set(true);
            let outcome = self.subscribers.notify();
            self.propagating.set(false);
            outcome?;
        }
        Ok(())
    }

    /// Replace the dependency set wholesale: detach edges to sources no
    /// longer read, attach edges for newly read ones.
    fn rewire(self: &Rc<Self>, deps: Vec<Rc<dyn Trackable>>) {
        let new_ids: AHashSet<SourceId> = deps.iter().map(|d| d.source_id()).collect();

        let mut edges = self.edges.borrow_mut();
        edges.retain(|edge| {
            if new_ids.contains(&edge.source.source_id()) {
                true
            } else {
                edge.source.detach(edge.subscription);
                false
            }
        });

        let kept_ids: AHashSet<SourceId> =
            edges.iter().map(|edge| edge.source.source_id()).collect();
        let weak = Rc::downgrade(self) as Weak<dyn Reaction>;
        for source in deps {
            if !kept_ids.contains(&source.source_id()) {
                let subscription = source.attach(weak.clone());
                edges.push(DependencyEdge { source, subscription });
            }
        }
    }
}

impl<T: Clone + PartialEq + 'static> Computed<T> {
    /// Evaluate `evaluate` once, subscribing to every source it read.
    ///
    /// Fails if the initial evaluation fails; no subscriptions are kept in
    /// that case.
    pub fn new(evaluate: impl Fn() -> Result<T, BindError> + 'static) -> Result<Self, BindError> {
        let evaluate: Box<dyn Fn() -> Result<T, BindError>> = Box::new(evaluate);
        let (result, deps) = tracking::track(|| (evaluate)());
        let value = result?;

        let inner = Rc::new(ComputedInner {
            id: next_source_id(),
            evaluate,
            value: RefCell::new(value),
            edges: RefCell::new(SmallVec::new()),
            subscribers: Subscribers::default(),
            recomputing: Cell::new(false),
            propagating: Cell::new(false),
            disposed: Cell::new(false),
        });

        let weak = Rc::downgrade(&inner) as Weak<dyn Reaction>;
        let mut edges = inner.edges.borrow_mut();
        for source in deps {
            let subscription = source.attach(weak.clone());
            edges.push(DependencyEdge { source, subscription });
        }
        drop(edges);

        Ok(Computed { inner })
    }

    /// Read the current value. Inside a tracked evaluation this registers
    /// the computed itself as a dependency.
    ///
    /// Fails with [`BindError::CircularDependency`] when called from inside
    /// this computed's own recomputation.
    pub fn get(&self) -> Result<T, BindError> {
        if self.inner.recomputing.get() {
            return Err(BindError::CircularDependency);
        }
        tracking::track_read(self.inner.clone());
        Ok(self.inner.value.borrow().clone())
    }

    /// Read the cached value without registering a dependency.
    pub fn peek(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Attach an external listener invoked with the new value after each
    /// change. Delivery ends when the returned handle is dropped.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> SubscriptionHandle {
        let weak_inner = Rc::downgrade(&self.inner);
        let listener = ListenerReaction::new(move || {
            if let Some(inner) = weak_inner.upgrade() {
                let value = inner.value.borrow().clone();
                callback(&value);
            }
            Ok(())
        });
        let weak_reaction = Rc::downgrade(&listener) as Weak<dyn Reaction>;
        let id = self.inner.subscribers.attach(weak_reaction);
        SubscriptionHandle::new(self.inner.clone(), id, listener)
    }

    /// Unsubscribe from every dependency and mark the expression terminal.
    /// Later writes to former dependencies are ignored for it.
    pub fn dispose(&self) {
        if self.inner.disposed.get() {
            return;
        }
        self.inner.disposed.set(true);
        let mut edges = self.inner.edges.borrow_mut();
        for edge in edges.drain(..) {
            edge.source.detach(edge.subscription);
        }
        self.inner.subscribers.clear();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Identity of this computed in the reactive graph.
    pub fn source_id(&self) -> SourceId {
        self.inner.id
    }

    /// Number of sources currently subscribed to.
    pub fn dependency_count(&self) -> usize {
        self.inner.edges.borrow().len()
    }

    /// Attach a reaction to this computed's own change notifications.
    pub(crate) fn attach_reaction(&self, reaction: Weak<dyn Reaction>) -> SubscriptionId {
        self.inner.subscribers.attach(reaction)
    }
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Computed { inner: self.inner.clone() }
    }
}

impl<T> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}
