//! Runtime values captured from the caller's environment.
//!
//! Containers are shared (`Rc<RefCell<..>>`), so a value graph can contain
//! cycles exactly like the host objects it mirrors. Nothing here walks a
//! graph recursively; use [`crate::normalize::normalize`] for that.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

pub type ObjectRef = Rc<RefCell<IndexMap<String, Value>>>;
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// A function, by name. Empty for anonymous functions.
    Function(String),
    Array(ArrayRef),
    Object(ObjectRef),
}

impl Value {
    pub fn object() -> Self {
        Value::Object(Rc::new(RefCell::new(IndexMap::new())))
    }

    pub fn array() -> Self {
        Value::Array(Rc::new(RefCell::new(Vec::new())))
    }

    pub fn object_from<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(key, value)| (key.into(), value))
            .collect();
        Value::Object(Rc::new(RefCell::new(map)))
    }

    pub fn array_from<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Value::Array(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    pub fn function(name: impl Into<String>) -> Self {
        Value::Function(name.into())
    }

    /// Sets a property; returns `false` when `self` is not an object.
    pub fn set(&self, key: impl Into<String>, value: Value) -> bool {
        match self {
            Value::Object(entries) => {
                entries.borrow_mut().insert(key.into(), value);
                true
            }
            _ => false,
        }
    }

    /// Appends an element; returns `false` when `self` is not an array.
    pub fn push(&self, value: Value) -> bool {
        match self {
            Value::Array(items) => {
                items.borrow_mut().push(value);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(entries) => entries.borrow().get(key).cloned(),
            Value::Array(items) => key
                .parse::<usize>()
                .ok()
                .and_then(|index| items.borrow().get(index).cloned()),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Address of the shared container, for containers only.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Array(items) => Some(Rc::as_ptr(items) as *const () as usize),
            Value::Object(entries) => Some(Rc::as_ptr(entries) as *const () as usize),
            _ => None,
        }
    }

    pub fn same_container(&self, other: &Value) -> bool {
        matches!((self.identity(), other.identity()), (Some(a), Some(b)) if a == b)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

// Shallow on purpose: a derived Debug would recurse forever on cycles.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Undefined"),
            Value::Null => write!(f, "Null"),
            Value::Bool(value) => write!(f, "Bool({value})"),
            Value::Number(value) => write!(f, "Number({value})"),
            Value::String(value) => write!(f, "String({value:?})"),
            Value::Function(name) => write!(f, "Function({name:?})"),
            Value::Array(items) => match items.try_borrow() {
                Ok(items) => write!(f, "Array(len={})", items.len()),
                Err(_) => write!(f, "Array(<borrowed>)"),
            },
            Value::Object(entries) => match entries.try_borrow() {
                Ok(entries) => {
                    let keys: Vec<&str> = entries.keys().map(String::as_str).collect();
                    write!(f, "Object{keys:?}")
                }
                Err(_) => write!(f, "Object(<borrowed>)"),
            },
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

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containers_share_identity_across_clones() {
        let user = Value::object();
        let alias = user.clone();
        assert!(user.set("name", "Andy".into()));
        assert!(user.same_container(&alias));
        assert!(!user.same_container(&Value::object()));
        assert!(matches!(alias.get("name"), Some(Value::String(name)) if name == "Andy"));
    }

    #[test]
    fn debug_is_shallow_for_cycles() {
        let node = Value::object();
        node.set("self", node.clone());
        assert_eq!(format!("{node:?}"), "Object[\"self\"]");
    }

    #[test]
    fn arrays_index_by_string_key() {
        let list = Value::array_from([Value::from(1), Value::from(2)]);
        assert!(list.push(3.into()));
        assert!(matches!(list.get("2"), Some(Value::Number(n)) if n == 3.0));
        assert!(list.get("x").is_none());
        assert!(!list.set("k", Value::Null));
    }
}
