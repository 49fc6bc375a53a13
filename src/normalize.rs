//! Cycle-safe deep copy of captured values.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::value::Value;

/// Substituted for any reference back to an object that is still being
/// copied higher up the current path.
pub const CIRCULAR_MARKER: &str = "[Circular ~]";

/// Owned, acyclic copy of a [`Value`] graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Function(String),
    Array(Vec<Normalized>),
    Object(IndexMap<String, Normalized>),
}

impl Normalized {
    pub fn circular() -> Self {
        Normalized::String(CIRCULAR_MARKER.to_string())
    }

    pub fn is_circular(&self) -> bool {
        matches!(self, Normalized::String(text) if text == CIRCULAR_MARKER)
    }

    pub fn get(&self, key: &str) -> Option<&Normalized> {
        match self {
            Normalized::Object(entries) => entries.get(key),
            Normalized::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Builds a fresh value graph with the same shape. No containers are
    /// shared in the result.
    pub fn to_value(&self) -> Value {
        match self {
            Normalized::Undefined => Value::Undefined,
            Normalized::Null => Value::Null,
            Normalized::Bool(value) => Value::Bool(*value),
            Normalized::Number(value) => Value::Number(*value),
            Normalized::String(value) => Value::String(value.clone()),
            Normalized::Function(name) => Value::Function(name.clone()),
            Normalized::Array(items) => Value::array_from(items.iter().map(Normalized::to_value)),
            Normalized::Object(entries) => Value::object_from(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_value())),
            ),
        }
    }

    /// JSON drops `undefined` and functions from objects.
    fn is_serialized_in_object(&self) -> bool {
        !matches!(self, Normalized::Undefined | Normalized::Function(_))
    }
}

pub fn normalize(value: &Value) -> Normalized {
    let mut ancestors = HashSet::new();
    copy_value(value, &mut ancestors)
}

fn copy_value(value: &Value, ancestors: &mut HashSet<usize>) -> Normalized {
    match value {
        Value::Undefined => Normalized::Undefined,
        Value::Null => Normalized::Null,
        Value::Bool(value) => Normalized::Bool(*value),
        Value::Number(value) => Normalized::Number(*value),
        Value::String(value) => Normalized::String(value.clone()),
        Value::Function(name) => Normalized::Function(name.clone()),
        Value::Array(items) => {
            let Some(id) = enter(value, ancestors) else {
                return Normalized::circular();
            };
            let copied = items
                .borrow()
                .iter()
                .map(|item| copy_value(item, ancestors))
                .collect();
            ancestors.remove(&id);
            Normalized::Array(copied)
        }
        Value::Object(entries) => {
            let Some(id) = enter(value, ancestors) else {
                return Normalized::circular();
            };
            let copied = entries
                .borrow()
                .iter()
                .map(|(key, entry)| (key.clone(), copy_value(entry, ancestors)))
                .collect();
            ancestors.remove(&id);
            Normalized::Object(copied)
        }
    }
}

/// Marks a container as being on the current path. `None` when it already
/// is, i.e. descending would close a cycle.
fn enter(value: &Value, ancestors: &mut HashSet<usize>) -> Option<usize> {
    let id = value.identity()?;
    ancestors.insert(id).then_some(id)
}

impl Serialize for Normalized {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Normalized::Undefined | Normalized::Null | Normalized::Function(_) => {
                serializer.serialize_unit()
            }
            Normalized::Bool(value) => serializer.serialize_bool(*value),
            Normalized::Number(value) => serialize_number(*value, serializer),
            Normalized::String(value) => serializer.serialize_str(value),
            Normalized::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Normalized::Object(entries) => {
                let visible: Vec<_> = entries
                    .iter()
                    .filter(|(_, value)| value.is_serialized_in_object())
                    .collect();
                let mut map = serializer.serialize_map(Some(visible.len()))?;
                for (key, value) in visible {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

fn serialize_number<S: Serializer>(value: f64, serializer: S) -> Result<S::Ok, S::Error> {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
    if !value.is_finite() {
        serializer.serialize_unit()
    } else if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        serializer.serialize_i64(value as i64)
    } else {
        serializer.serialize_f64(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn andy() -> Value {
        Value::object_from([("firstName", Value::from("Andy"))])
    }

    #[test]
    fn self_reference_becomes_marker() {
        let foo = andy();
        foo.set("self", foo.clone());

        let normalized = normalize(&foo);
        assert_eq!(normalized.get("firstName"), Some(&Normalized::String("Andy".into())));
        assert!(normalized.get("self").unwrap().is_circular());
        assert_eq!(
            serde_json::to_value(&normalized).unwrap(),
            json!({ "firstName": "Andy", "self": "[Circular ~]" })
        );
    }

    #[test]
    fn array_containing_its_owner() {
        let owner = Value::object();
        let children = Value::array();
        children.push(owner.clone());
        children.push(children.clone());
        owner.set("children", children);

        let normalized = normalize(&owner);
        assert_eq!(
            serde_json::to_value(&normalized).unwrap(),
            json!({ "children": ["[Circular ~]", "[Circular ~]"] })
        );
    }

    #[test]
    fn mutual_references() {
        let a = Value::object_from([("name", Value::from("a"))]);
        let b = Value::object_from([("name", Value::from("b"))]);
        a.set("peer", b.clone());
        b.set("peer", a.clone());

        let normalized = normalize(&a);
        assert_eq!(
            serde_json::to_value(&normalized).unwrap(),
            json!({ "name": "a", "peer": { "name": "b", "peer": "[Circular ~]" } })
        );
    }

    #[test]
    fn shared_but_acyclic_values_are_copied_twice() {
        let shared = andy();
        let root = Value::object_from([("left", shared.clone()), ("right", shared)]);

        let normalized = normalize(&root);
        assert_eq!(normalized.get("left"), normalized.get("right"));
        assert!(!normalized.get("right").unwrap().is_circular());
    }

    #[test]
    fn source_is_not_mutated() {
        let foo = andy();
        foo.set("self", foo.clone());
        normalize(&foo);
        assert!(foo.get("self").unwrap().same_container(&foo));
    }

    #[test]
    fn second_pass_is_a_plain_copy() {
        let foo = andy();
        foo.set("self", foo.clone());
        foo.set("list", Value::array_from([foo.clone(), Value::Undefined]));

        let once = normalize(&foo);
        let twice = normalize(&once.to_value());
        assert_eq!(once, twice);
    }

    #[test]
    fn json_rules_for_undefined_and_functions() {
        let context = Value::object_from([
            ("done", Value::function("done")),
            ("bar", Value::Undefined),
            ("count", Value::from(3)),
            ("ratio", Value::from(0.5)),
            ("list", Value::array_from([Value::Undefined, Value::function("")])),
            ("nan", Value::from(f64::NAN)),
        ]);

        assert_eq!(
            serde_json::to_value(normalize(&context)).unwrap(),
            json!({ "count": 3, "ratio": 0.5, "list": [null, null], "nan": null })
        );
    }
}
