//! Default binding handlers: `if`, `ifnot`, `text`.

use crate::dom::{Node, Region};
use crate::error::BindError;
use crate::reactive::Computed;

use super::applier::{region_for_node, BindingHandler};
use super::conditional::bind_conditional;
use super::context::BindingContext;
use super::provider::BindingEntry;

/// The `if`/`ifnot` directive: delegates to the control-flow controller.
pub(crate) struct ConditionalHandler {
    pub(crate) negate: bool,
}

impl BindingHandler for ConditionalHandler {
    fn controls_descendants(&self) -> bool {
        true
    }

    fn bind(
        &self,
        node: &Node,
        entry: &BindingEntry,
        ctx: &BindingContext,
    ) -> Result<(), BindError> {
        bind_conditional(node, entry, ctx, self.negate)
    }
}

/// Keeps a node's text content in sync with its expression through a
/// dedicated computed, disposed with the node.
pub(crate) struct TextHandler;

impl BindingHandler for TextHandler {
    fn controls_descendants(&self) -> bool {
        true
    }

    fn bind(
        &self,
        node: &Node,
        entry: &BindingEntry,
        ctx: &BindingContext,
    ) -> Result<(), BindError> {
        let region = region_for_node(node)?;

        let expr = entry.expr.clone();
        let expr_ctx = ctx.clone();
        let text_value = Computed::new(move || Ok(expr(&expr_ctx)?.as_text()))?;

        set_region_text(&region, &text_value.peek());

        // Weak anchor: the node owns this subscription through its disposal
        // list, so the update closure must not hold the node strongly.
        let anchor = node.downgrade();
        let subscription = text_value.subscribe(move |text| {
            if let Some(node) = anchor.upgrade() {
                if let Ok(region) = region_for_node(&node) {
                    set_region_text(&region, text);
                }
            }
        });

        let computed_for_dispose = text_value;
        node.on_dispose(move || {
            drop(subscription);
            computed_for_dispose.dispose();
        });
        Ok(())
    }
}

fn set_region_text(region: &Region, text: &str) {
    let contents = region.contents();
    // Common case: keep the single text node, just rewrite its data.
    if contents.len() == 1 && contents[0].is_text() {
        contents[0].set_text_data(text);
        return;
    }
    region.clear();
    region.insert(&[Node::text(text)]);
}
