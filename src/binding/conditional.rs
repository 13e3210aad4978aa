//! Control-Flow Binding Controller - the `if`/`ifnot` lifecycle.
//!
//! One controller exists per directive occurrence. At creation it captures
//! the authored subtree once (the element's children, or the nodes between
//! the virtual marker pair) and detaches it from the live document; that
//! capture is the template for every future materialization.
//!
//! # State machine
//!
//! Two states, `Unmaterialized` and `Materialized`, switched only by the
//! *boolean* edge of the condition:
//! - falsy -> truthy: render the capture, insert into the region, apply
//!   bindings to the inserted subtree with the pass-through context, then
//!   fire `afterRender` once, outside any tracking frame.
//! - truthy -> falsy: purge (depth-first disposal) and remove the content;
//!   no callback.
//! - truthy -> different truthy: nothing. No DOM mutation, no re-bind, no
//!   callback. The condition computed is `Computed<bool>`, so value-identity
//!   changes never even notify; the last-rendered-state cell guards the
//!   initial transition.
//!
//! The controller never removes its own markers, and a disposed controller
//! ignores every later notification.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::dom::{Node, Region, WeakNode};
use crate::error::BindError;
use crate::reactive::{tracking, Computed, Reaction};
use crate::template::Template;

use super::applier;
use super::context::BindingContext;
use super::provider::{AfterRender, BindingEntry};

pub(crate) struct ConditionalController {
    /// Weak anchor to the owning node: the node owns the controller through
    /// its disposal list, so a strong edge back would keep the whole
    /// subtree alive forever.
    anchor: WeakNode,
    template: Template,
    condition: Computed<bool>,
    context: BindingContext,
    after_render: Option<AfterRender>,
    rendered: Cell<bool>,
    disposed: Cell<bool>,
}

/// Wire up a conditional binding on `node` (an element, or a virtual-region
/// start marker) and apply its initial state.
pub(crate) fn bind_conditional(
    node: &Node,
    entry: &BindingEntry,
    ctx: &BindingContext,
    negate: bool,
) -> Result<(), BindError> {
    let region = applier::region_for_node(node)?;

    // Capture once; the authored nodes leave the document immediately.
    let template = match &entry.options.template_name {
        Some(name) => {
            let _ = region.take_contents();
            Template::named(name)
        }
        None => Template::from_nodes(region.take_contents()),
    };

    let expr = entry.expr.clone();
    let expr_ctx = ctx.clone();
    let condition = Computed::new(move || {
        let truthy = expr(&expr_ctx)?.unwrap().is_truthy();
        Ok(if negate { !truthy } else { truthy })
    })?;

    let controller = Rc::new(ConditionalController {
        anchor: region.owner().downgrade(),
        template,
        condition: condition.clone(),
        // Pass-through: content sees the same scope, so `$parents` is
        // unaffected by the wrapping.
        context: ctx.clone(),
        after_render: entry.options.after_render.clone(),
        rendered: Cell::new(false),
        disposed: Cell::new(false),
    });

    condition.attach_reaction(Rc::downgrade(&controller) as Weak<dyn Reaction>);

    // The controller lives exactly as long as its region: when an ancestor
    // region tears down, purging the owner node disposes it.
    let controller_for_dispose = controller.clone();
    region.owner().on_dispose(move || controller_for_dispose.dispose());

    controller.apply_state(condition.peek())
}

impl ConditionalController {
    /// Rebuild the region from the anchor. `None` once the owning subtree
    /// has been dropped.
    fn region(&self) -> Option<Region> {
        let anchor = self.anchor.upgrade()?;
        if anchor.is_element() {
            Some(Region::element(&anchor))
        } else {
            Region::from_start_marker(&anchor).ok()
        }
    }

    fn apply_state(&self, truthy: bool) -> Result<(), BindError> {
        if self.disposed.get() || truthy == self.rendered.get() {
            return Ok(());
        }
        let Some(region) = self.region() else {
            return Ok(());
        };

        if truthy {
            debug!("conditional region materializing");
            let nodes = self.template.render(&self.context)?;
            region.insert(&nodes);
            applier::bind_region_contents(&region, &self.context)?;
            self.rendered.set(true);

            if let Some(callback) = &self.after_render {
                // Re-read from the region: preprocessing and virtual
                // bindings may have rewritten the inserted nodes, and the
                // callback gets the authoritative list. The inert frame
                // keeps reads inside the callback from subscribing to
                // anything.
                let reported = region.contents();
                let data = self.context.data();
                tracking::untracked(|| callback(&reported, &data));
            }
        } else {
            debug!("conditional region tearing down");
            region.clear();
            self.rendered.set(false);
        }
        Ok(())
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.condition.dispose();
    }
}

impl Reaction for ConditionalController {
    fn notify(self: Rc<Self>) -> Result<(), BindError> {
        if self.disposed.get() {
            return Ok(());
        }
        self.apply_state(self.condition.peek())
    }

    fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}
