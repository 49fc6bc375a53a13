//! Snapshot expressions and explicit environment snapshots.
//!
//! [`generate`] emits JavaScript that, evaluated where the error was caught,
//! collects every readable name into one object. Each read sits in its own
//! `try`, so names that are out of scope or still in their temporal dead
//! zone are simply left out.
//!
//! Callers that cannot evaluate source text build the same mapping with
//! [`CapturedContext::capture`] and a [`BindingReader`] over bindings they
//! still hold.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::scope::NameSet;
use crate::value::Value;

pub const ACCUMULATOR: &str = "__scope";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotCode(String);

impl SnapshotCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SnapshotCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SnapshotCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub fn generate(names: &NameSet) -> SnapshotCode {
    let accumulator = accumulator_for(names);
    let mut code = format!("(function(){{var {accumulator}={{}};");
    for name in names.iter() {
        if !is_identifier(name) {
            debug!("skipping non-identifier name {name:?}");
            continue;
        }
        code.push_str(&format!(
            "(function(){{try{{{accumulator}['{name}']={name}}}catch(e){{}}}})();"
        ));
    }
    code.push_str(&format!("return {accumulator};}})()"));
    SnapshotCode(code)
}

/// `__scope`, lengthened until it shadows none of the captured names.
fn accumulator_for(names: &NameSet) -> String {
    let mut accumulator = ACCUMULATOR.to_string();
    while names.contains(&accumulator) {
        accumulator.push('_');
    }
    accumulator
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_' || first == '$')
        && chars.all(|ch| ch.is_alphanumeric() || ch == '_' || ch == '$')
}

/// Outcome of reading one binding.
#[derive(Debug, Clone)]
pub enum Read {
    Value(Value),
    Skipped,
}

pub trait BindingReader {
    fn read(&self, name: &str) -> Read;
}

impl<F> BindingReader for F
where
    F: Fn(&str) -> Read,
{
    fn read(&self, name: &str) -> Read {
        self(name)
    }
}

impl BindingReader for HashMap<String, Value> {
    fn read(&self, name: &str) -> Read {
        match self.get(name) {
            Some(value) => Read::Value(value.clone()),
            None => Read::Skipped,
        }
    }
}

/// Name → value for every name whose read succeeded, in [`NameSet`] order.
#[derive(Debug, Clone, Default)]
pub struct CapturedContext {
    bindings: IndexMap<String, Value>,
}

impl CapturedContext {
    pub fn capture(names: &NameSet, reader: &impl BindingReader) -> Self {
        let mut bindings = IndexMap::new();
        for name in names.iter() {
            match reader.read(name) {
                Read::Value(value) => {
                    bindings.insert(name.to_string(), value);
                }
                Read::Skipped => debug!("binding '{name}' not readable, skipped"),
            }
        }
        Self { bindings }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn into_value(self) -> Value {
        Value::object_from(self.bindings)
    }
}
