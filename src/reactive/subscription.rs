//! Subscriber registries and external subscription handles.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::error::BindError;

use super::{Reaction, Trackable};

/// Identity of one subscription edge within its source.
pub type SubscriptionId = u64;

struct SubscriberEntry {
    id: SubscriptionId,
    reaction: Weak<dyn Reaction>,
}

/// Registration-ordered subscriber list shared by observable cells and
/// computed expressions.
///
/// Notification snapshots the list first, so a reaction that attaches or
/// detaches subscribers mid-fan-out never mutates the sequence being
/// iterated. Dead and disposed reactions are skipped, never an error.
#[derive(Default)]
pub(crate) struct Subscribers {
    entries: RefCell<Vec<SubscriberEntry>>,
    next_id: Cell<SubscriptionId>,
}

impl Subscribers {
    pub(crate) fn attach(&self, reaction: Weak<dyn Reaction>) -> SubscriptionId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.entries.borrow_mut().push(SubscriberEntry { id, reaction });
        id
    }

    pub(crate) fn detach(&self, subscription: SubscriptionId) {
        self.entries
            .borrow_mut()
            .retain(|entry| entry.id != subscription);
    }

    /// Notify every live subscriber in registration order. The first error
    /// aborts the fan-out and propagates to the triggering write.
    pub(crate) fn notify(&self) -> Result<(), BindError> {
        let snapshot: Vec<Weak<dyn Reaction>> = self
            .entries
            .borrow()
            .iter()
            .map(|entry| entry.reaction.clone())
            .collect();

        for weak in snapshot {
            let Some(reaction) = weak.upgrade() else {
                continue;
            };
            if reaction.is_disposed() {
                continue;
            }
            reaction.notify()?;
        }
        Ok(())
    }

    pub(crate) fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

/// Adapts a plain closure into a [`Reaction`] for external listeners.
pub(crate) struct ListenerReaction {
    callback: Box<dyn Fn() -> Result<(), BindError>>,
    disposed: Cell<bool>,
}

impl ListenerReaction {
    pub(crate) fn new(callback: impl Fn() -> Result<(), BindError> + 'static) -> Rc<Self> {
        Rc::new(ListenerReaction {
            callback: Box::new(callback),
            disposed: Cell::new(false),
        })
    }
}

impl Reaction for ListenerReaction {
    fn notify(self: Rc<Self>) -> Result<(), BindError> {
        if self.disposed.get() {
            return Ok(());
        }
        (self.callback)()
    }

    fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

/// Owned edge from an external listener to a source.
///
/// The listener stays registered for as long as the handle lives; dropping
/// (or explicitly disposing) the handle ends delivery.
pub struct SubscriptionHandle {
    source: Rc<dyn Trackable>,
    id: SubscriptionId,
    listener: Rc<ListenerReaction>,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        source: Rc<dyn Trackable>,
        id: SubscriptionId,
        listener: Rc<ListenerReaction>,
    ) -> Self {
        SubscriptionHandle { source, id, listener }
    }

    /// Stop receiving notifications.
    pub fn dispose(self) {
        // Drop does the work.
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.listener.disposed.set(true);
        self.source.detach(self.id);
    }
}
