//! Host value model - the dynamic values binding expressions evaluate to.
//!
//! View-model data is untyped from the engine's point of view: objects,
//! strings, numbers, and observable cells all flow through the same
//! [`Value`] enum. Truthiness follows the host coercion rule the conditional
//! binding is specified against: `Undefined`, `Null`, `false`, `0`/NaN and
//! `""` are falsy, everything else (including empty objects and lists) is
//! truthy.
//!
//! # Equality rule
//!
//! `Value` equality gates change notification, so it mirrors the host
//! model: primitives compare by value, lists/objects/observables by
//! reference identity. Two distinct objects with identical fields are *not*
//! equal - writing one over the other is a real change.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::reactive::Observable;

/// Insertion-ordered object map; field order is observable in the host model.
pub type ObjectMap = IndexMap<String, Value, ahash::RandomState>;

/// A dynamically typed host value.
#[derive(Clone, Debug)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<ObjectMap>>),
    /// A reactive cell holding a value; unwrapped (and thereby tracked) by
    /// [`Value::unwrap`].
    Obs(Observable<Value>),
}

impl Value {
    /// Build an object value from key/value pairs, preserving order.
    pub fn object<'a>(entries: impl IntoIterator<Item = (&'a str, Value)>) -> Value {
        let map: ObjectMap = entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();
        Value::Object(Rc::new(RefCell::new(map)))
    }

    /// Build a list value.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    /// Wrap an observable cell.
    pub fn obs(cell: &Observable<Value>) -> Value {
        Value::Obs(cell.clone())
    }

    /// Resolve wrapped observables to their current contents.
    ///
    /// Each unwrapped cell is read with [`Observable::get`], so inside a
    /// tracked evaluation this registers the cell as a dependency.
    pub fn unwrap(&self) -> Value {
        let mut current = self.clone();
        while let Value::Obs(cell) = current {
            current = cell.get();
        }
        current
    }

    /// Host truthiness coercion. Note that an observable *handle* is itself
    /// truthy (it is an object); callers normally [`unwrap`](Value::unwrap)
    /// first.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::List(_) | Value::Object(_) | Value::Obs(_) => true,
        }
    }

    /// Look up an object field. Missing fields and non-objects resolve to
    /// `Undefined`, like the host model's property access.
    pub fn get(&self, key: &str) -> Value {
        match self.unwrap() {
            Value::Object(map) => map
                .borrow()
                .get(key)
                .cloned()
                .unwrap_or(Value::Undefined),
            _ => Value::Undefined,
        }
    }

    /// Text rendering used by the text binding.
    pub fn as_text(&self) -> String {
        match self.unwrap() {
            Value::Undefined | Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    format!("{}", n as i64)
                } else {
                    n.to_string()
                }
            }
            Value::Str(s) => s,
            Value::List(items) => items
                .borrow()
                .iter()
                .map(Value::as_text)
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object]".to_string(),
            Value::Obs(_) => String::new(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Obs(a), Value::Obs(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Observable<Value>> for Value {
    fn from(cell: Observable<Value>) -> Self {
        Value::Obs(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness_of_falsy_coercions() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::from("").is_truthy());
    }

    #[test]
    fn test_truthiness_of_truthy_values() {
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Number(0.5).is_truthy());
        assert!(Value::from("different truthy value").is_truthy());
        assert!(Value::object([]).is_truthy());
        assert!(Value::list([]).is_truthy());
    }

    #[test]
    fn test_unwrap_reads_through_observables() {
        let cell = Observable::new(Value::from("inner"));
        let wrapped = Value::obs(&cell);
        assert_eq!(wrapped.unwrap(), Value::from("inner"));

        // The handle itself is truthy even when its contents are not.
        cell.set(Value::Null).unwrap();
        assert!(wrapped.is_truthy());
        assert!(!wrapped.unwrap().is_truthy());
    }

    #[test]
    fn test_object_identity_equality() {
        let a = Value::object([("x", Value::from(1i64))]);
        let b = Value::object([("x", Value::from(1i64))]);
        assert_ne!(a, b, "structurally equal objects are distinct values");
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_field_access() {
        let item = Value::object([("existentChildProp", Value::from("Child prop value"))]);
        assert_eq!(item.get("existentChildProp"), Value::from("Child prop value"));
        assert_eq!(item.get("nonExistentChildProp"), Value::Undefined);
        assert_eq!(Value::Null.get("anything"), Value::Undefined);
    }

    #[test]
    fn test_as_text() {
        assert_eq!(Value::from("hello").as_text(), "hello");
        assert_eq!(Value::Number(3.0).as_text(), "3");
        assert_eq!(Value::Number(3.5).as_text(), "3.5");
        assert_eq!(Value::Undefined.as_text(), "");
        assert_eq!(Value::Bool(true).as_text(), "true");
    }
}
