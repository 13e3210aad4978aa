//! Templating collaborator seam.
//!
//! The core only needs two operations from a template engine: capture a
//! template and render it into fresh nodes. Capture is a core operation
//! (the conditional controller detaches the authored subtree itself), so a
//! faulty or exotic installed engine is provably never touched while a
//! region is unmaterialized - and anonymous (captured-content) templates
//! always render through the native engine, independently of whichever
//! engine is installed. Only named templates go through the installed
//! engine.

use std::cell::RefCell;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::binding::BindingContext;
use crate::dom::Node;
use crate::error::BindError;

#[derive(Clone)]
enum TemplateSource {
    /// Captured authored nodes, detached from the live document. Later
    /// edits to rendered copies never mutate the capture.
    Anonymous(Rc<SmallVec<[Node; 4]>>),
    /// A template known to the installed engine by name.
    Named(Rc<str>),
}

/// A renderable template.
#[derive(Clone)]
pub struct Template {
    source: TemplateSource,
}

impl Template {
    /// Capture detached source nodes as an anonymous template.
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Template {
        Template {
            source: TemplateSource::Anonymous(Rc::new(nodes.into_iter().collect())),
        }
    }

    /// Reference a template by name; rendering goes through the installed
    /// engine.
    pub fn named(name: &str) -> Template {
        Template {
            source: TemplateSource::Named(Rc::from(name)),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self.source, TemplateSource::Anonymous(_))
    }

    /// The template's name; `None` for anonymous captures. Installed engines
    /// resolve named templates through this.
    pub fn name(&self) -> Option<&str> {
        match &self.source {
            TemplateSource::Named(name) => Some(name),
            TemplateSource::Anonymous(_) => None,
        }
    }

    /// Captured node count (zero for named templates).
    pub fn len(&self) -> usize {
        match &self.source {
            TemplateSource::Anonymous(nodes) => nodes.len(),
            TemplateSource::Named(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render into fresh sibling nodes. Anonymous templates always use the
    /// native engine; named templates use the installed one.
    pub fn render(&self, ctx: &BindingContext) -> Result<Vec<Node>, BindError> {
        match &self.source {
            TemplateSource::Anonymous(_) => NativeTemplateEngine.render(self, ctx),
            TemplateSource::Named(_) => engine().render(self, ctx),
        }
    }
}

/// Renders a template into nodes. Implementations must not depend on
/// document order beyond producing valid sibling nodes.
pub trait TemplateEngine {
    fn render(&self, template: &Template, ctx: &BindingContext) -> Result<Vec<Node>, BindError>;
}

/// Deep-clones anonymous captures; knows no named templates.
pub struct NativeTemplateEngine;

impl TemplateEngine for NativeTemplateEngine {
    fn render(&self, template: &Template, _ctx: &BindingContext) -> Result<Vec<Node>, BindError> {
        match &template.source {
            TemplateSource::Anonymous(nodes) => {
                Ok(nodes.iter().map(Node::clone_subtree).collect())
            }
            TemplateSource::Named(name) => Err(BindError::Template(format!(
                "native template engine knows no template named '{name}'"
            ))),
        }
    }
}

thread_local! {
    static ENGINE: RefCell<Rc<dyn TemplateEngine>> = RefCell::new(Rc::new(NativeTemplateEngine));
}

/// The installed template engine.
pub fn engine() -> Rc<dyn TemplateEngine> {
    ENGINE.with(|engine| engine.borrow().clone())
}

/// Install a template engine; returns the previous one so callers can
/// restore it.
pub fn set_template_engine(engine: Rc<dyn TemplateEngine>) -> Rc<dyn TemplateEngine> {
    ENGINE.with(|slot| std::mem::replace(&mut *slot.borrow_mut(), engine))
}
