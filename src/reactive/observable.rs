//! Observable Cell - mutable value box with subscriber notification.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::error::BindError;

use super::subscription::{ListenerReaction, Subscribers, SubscriptionHandle};
use super::tracking;
use super::{next_source_id, Reaction, SourceId, SubscriptionId, Trackable};

/// A reactive mutable value box; the root data source of the graph.
///
/// Cloning an `Observable` clones the handle, not the value: all clones share
/// the same cell, the same identity, and the same subscriber list.
///
/// # Equality gating
///
/// [`set`](Observable::set) is a no-op (no stored value change, no
/// notification) when the new value compares equal to the stored one under
/// `T`'s equality rule. For the host value model this means primitives
/// compare by value and objects by reference identity.
pub struct Observable<T> {
    inner: Rc<ObservableInner<T>>,
}

struct ObservableInner<T> {
    id: SourceId,
    value: RefCell<T>,
    subscribers: Subscribers,
}

impl<T: 'static> Trackable for ObservableInner<T> {
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

impl<T: Clone + PartialEq + 'static> Observable<T> {
    pub fn new(value: T) -> Self {
        Observable {
            inner: Rc::new(ObservableInner {
                id: next_source_id(),
                value: RefCell::new(value),
                subscribers: Subscribers::default(),
            }),
        }
    }

    /// Read the current value. Inside a tracked evaluation this registers
    /// the cell into the active dependency frame.
    pub fn get(&self) -> T {
        tracking::track_read(self.inner.clone());
        self.inner.value.borrow().clone()
    }

    /// Read the current value without registering a dependency.
    pub fn peek(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Store a new value and synchronously notify subscribers in
    /// registration order. Equal values are a no-op.
    ///
    /// Propagation runs to completion before this returns; a
    /// [`BindError::CircularDependency`] (or any binding error raised while
    /// dependents react) aborts the chain and surfaces here.
    pub fn set(&self, value: T) -> Result<(), BindError> {
        {
            let mut stored = self.inner.value.borrow_mut();
            if *stored == value {
                return Ok(());
            }
            *stored = value;
        }
        trace!(source = self.inner.id, "observable write");
        self.inner.subscribers.notify()
    }

    /// Attach an external listener invoked with the new value after each
    /// accepted write. Delivery ends when the returned handle is dropped.
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

    /// Identity of this cell in the reactive graph.
    pub fn source_id(&self) -> SourceId {
        self.inner.id
    }

    /// Whether two handles point at the same cell.
    pub fn ptr_eq(&self, other: &Observable<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn as_trackable(&self) -> Rc<dyn Trackable> {
        self.inner.clone()
    }
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Observable { inner: self.inner.clone() }
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable").field("id", &self.inner.id).finish()
    }
}
