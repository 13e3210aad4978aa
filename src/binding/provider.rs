//! Binding-provider collaborator seam.
//!
//! The provider supplies, per node, the parsed set of bindings (name +
//! expression + options) and may preprocess a node into zero or more
//! replacement nodes before binding application sees it. The installed
//! instance is thread-local, like the rest of the engine's singletons.
//!
//! Markup parsing is out of scope for the core, so the concrete
//! [`MapBindingProvider`] is declaration-based: callers register binding
//! entries against nodes, and the entries follow the node through template
//! cloning via its binding key. Tests and demos drive everything through it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ahash::AHashMap;

use crate::dom::Node;
use crate::error::BindError;
use crate::types::Value;

use super::context::BindingContext;

/// A binding expression: evaluated against the current context, reads of
/// observable cells inside it are tracked.
pub type BindingExpr = Rc<dyn Fn(&BindingContext) -> Result<Value, BindError>>;

/// Render-complete callback: `(inserted nodes, context data)`.
pub type AfterRender = Rc<dyn Fn(&[Node], &Value)>;

/// Per-binding configuration beyond the main expression.
#[derive(Clone, Default)]
pub struct BindingOptions {
    /// Invoked once per materialization, outside any tracking frame.
    pub after_render: Option<AfterRender>,
    /// Template-selection option passed through to the templating
    /// collaborator; `None` means the authored content is the template.
    pub template_name: Option<String>,
}

/// One binding declared on a node.
#[derive(Clone)]
pub struct BindingEntry {
    pub name: String,
    pub expr: BindingExpr,
    pub options: BindingOptions,
}

/// The parsed bindings of one node.
#[derive(Clone, Default)]
pub struct NodeBindings {
    pub entries: Vec<BindingEntry>,
}

/// Node preprocessor: rewrites one source node into zero or more
/// replacements. The implementation must perform the DOM surgery itself and
/// return the authoritative replacement list.
pub type Preprocessor = Rc<dyn Fn(&Node) -> Option<Vec<Node>>>;

/// Supplies parsed bindings per node.
pub trait BindingProvider {
    fn bindings_for(&self, node: &Node) -> Option<NodeBindings>;

    /// Rewrite `node` before binding application sees it. `None` leaves the
    /// node untouched; `Some(nodes)` replaces it (an empty list removes it).
    fn preprocess(&self, _node: &Node) -> Option<Vec<Node>> {
        None
    }
}

/// Declaration-based provider keyed by node binding keys. Declaring a
/// binding assigns the node a key if it has none; because keys survive
/// [`Node::clone_subtree`], rendered copies of template content keep their
/// declared bindings.
#[derive(Default)]
pub struct MapBindingProvider {
    table: RefCell<AHashMap<Rc<str>, NodeBindings>>,
    next_key: Cell<u64>,
    preprocessor: RefCell<Option<Preprocessor>>,
}

impl MapBindingProvider {
    pub fn new() -> MapBindingProvider {
        MapBindingProvider::default()
    }

    /// Declare a binding on `node`.
    pub fn bind(&self, node: &Node, name: &str, expr: BindingExpr) {
        self.bind_with(node, name, expr, BindingOptions::default());
    }

    /// Declare a binding with options (afterRender, template selection).
    pub fn bind_with(
        &self,
        node: &Node,
        name: &str,
        expr: BindingExpr,
        options: BindingOptions,
    ) {
        let key = match node.binding_key() {
            Some(key) => key,
            None => {
                let fresh = format!("b{}", self.next_key.get());
                self.next_key.set(self.next_key.get() + 1);
                node.set_binding_key(&fresh);
                Rc::from(fresh.as_str())
            }
        };
        self.table
            .borrow_mut()
            .entry(key)
            .or_default()
            .entries
            .push(BindingEntry {
                name: name.to_string(),
                expr,
                options,
            });
    }

    /// Install a node preprocessor.
    pub fn set_preprocessor(&self, preprocessor: Preprocessor) {
        *self.preprocessor.borrow_mut() = Some(preprocessor);
    }
}

impl BindingProvider for MapBindingProvider {
    fn bindings_for(&self, node: &Node) -> Option<NodeBindings> {
        let key = node.binding_key()?;
        self.table.borrow().get(&key).cloned()
    }

    fn preprocess(&self, node: &Node) -> Option<Vec<Node>> {
        let preprocessor = self.preprocessor.borrow().clone();
        preprocessor.and_then(|p| p(node))
    }
}

thread_local! {
    static INSTANCE: RefCell<Rc<dyn BindingProvider>> =
        RefCell::new(Rc::new(MapBindingProvider::new()));
}

/// The installed provider instance.
pub fn provider() -> Rc<dyn BindingProvider> {
    INSTANCE.with(|instance| instance.borrow().clone())
}

/// Install a provider; returns the previously installed one so callers can
/// restore it.
pub fn set_provider(provider: Rc<dyn BindingProvider>) -> Rc<dyn BindingProvider> {
    INSTANCE.with(|instance| std::mem::replace(&mut *instance.borrow_mut(), provider))
}
