//! Binding Context - hierarchical scope for expression resolution.
//!
//! A context carries the current data value plus links to the ancestor
//! scopes, resolving `$data`, `$parent`, `$parents[n]`, `$root`, and
//! `$index`. Contexts are immutable after creation and shared by reference
//! among every node bound within the same region; re-renders replace them
//! wholesale.
//!
//! Virtual-region wrapping never adds a context level by itself: a
//! pass-through control-flow binding hands its content the *same* context,
//! so `$parents.len()` inside the region is observably identical to an
//! unwrapped sibling at the same depth.

use std::rc::Rc;

use crate::reactive::Observable;
use crate::types::Value;

struct ContextInner {
    data: Value,
    parent: Option<BindingContext>,
    parents: Vec<Value>,
    root: Value,
    index: Option<Observable<Value>>,
}

/// Immutable scope object; cloning shares the same scope.
#[derive(Clone)]
pub struct BindingContext {
    inner: Rc<ContextInner>,
}

impl BindingContext {
    /// Root context: no parents, `$root` is the data itself.
    pub fn new(data: Value) -> BindingContext {
        BindingContext {
            inner: Rc::new(ContextInner {
                root: data.clone(),
                data,
                parent: None,
                parents: Vec::new(),
                index: None,
            }),
        }
    }

    /// Child scope for a directive that rebinds the data value. The new
    /// `$parents` chain is this scope's data followed by its own ancestors;
    /// `$root` is inherited unchanged.
    pub fn extend(&self, data: Value) -> BindingContext {
        let mut parents = Vec::with_capacity(self.inner.parents.len() + 1);
        parents.push(self.inner.data.clone());
        parents.extend(self.inner.parents.iter().cloned());

        BindingContext {
            inner: Rc::new(ContextInner {
                data,
                parent: Some(self.clone()),
                parents,
                root: self.inner.root.clone(),
                index: None,
            }),
        }
    }

    /// Like [`extend`](BindingContext::extend), but also carries a `$index`
    /// cell for iteration collaborators.
    pub fn extend_with_index(&self, data: Value, index: Observable<Value>) -> BindingContext {
        let extended = self.extend(data);
        BindingContext {
            inner: Rc::new(ContextInner {
                data: extended.inner.data.clone(),
                parent: extended.inner.parent.clone(),
                parents: extended.inner.parents.clone(),
                root: extended.inner.root.clone(),
                index: Some(index),
            }),
        }
    }

    /// `$data`.
    pub fn data(&self) -> Value {
        self.inner.data.clone()
    }

    /// The enclosing scope, if any.
    pub fn parent(&self) -> Option<BindingContext> {
        self.inner.parent.clone()
    }

    /// `$parent`: the nearest ancestor's data, or `Undefined` at the root.
    pub fn parent_data(&self) -> Value {
        self.inner
            .parents
            .first()
            .cloned()
            .unwrap_or(Value::Undefined)
    }

    /// `$parents`: ancestor data values, nearest first.
    pub fn parents(&self) -> &[Value] {
        &self.inner.parents
    }

    /// `$root`.
    pub fn root(&self) -> Value {
        self.inner.root.clone()
    }

    /// `$index`, present only inside iteration collaborators.
    pub fn index(&self) -> Option<Observable<Value>> {
        self.inner.index.clone()
    }

    /// Whether two handles share the same scope object.
    pub fn ptr_eq(&self, other: &BindingContext) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}
