//! Mapping between the wire and in-memory key conventions.
//!
//! MMIF is LD-flavoured: keywords such as `@type`, `@value` and `@language`
//! carry an `@` prefix on the wire. In memory those keys use `_` instead
//! (`_type`, `_value`), so every free-form JSON value held by the model is
//! stored in memory convention and mapped back on the way out. The mapping
//! is recursive and is the only structural transform between the two forms.
//!
//! This module also owns emptiness (`null`, `""`, `[]`, `{}`), which decides
//! whether an optional field is emitted, and [`WireObject`], the builder every
//! record uses to produce its wire object.

use serde_json::{Map, Value};

/// Key prefix used on the wire.
pub const WIRE_PREFIX: char = '@';

/// Key prefix used in memory.
pub const MEMORY_PREFIX: char = '_';

/// Maps a single in-memory key to its wire spelling.
#[must_use]
pub fn wire_key(key: &str) -> String {
    match key.strip_prefix(MEMORY_PREFIX) {
        Some(rest) => format!("{WIRE_PREFIX}{rest}"),
        None => key.to_string(),
    }
}

/// Maps a single wire key to its in-memory spelling.
#[must_use]
pub fn memory_key(key: &str) -> String {
    match key.strip_prefix(WIRE_PREFIX) {
        Some(rest) => format!("{MEMORY_PREFIX}{rest}"),
        None => key.to_string(),
    }
}

/// Rewrites every `@key` to `_key`, recursively through objects and arrays.
#[must_use]
pub fn to_memory(value: Value) -> Value {
    map_keys(value, &memory_key)
}

/// Rewrites every `_key` to `@key`, recursively through objects and arrays.
#[must_use]
pub fn to_wire(value: Value) -> Value {
    map_keys(value, &wire_key)
}

fn map_keys(value: Value, f: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (f(&k), map_keys(v, f)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(|v| map_keys(v, f)).collect()),
        other => other,
    }
}

/// Whether an optional field holding `value` is skipped on serialization.
#[must_use]
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Builder for the wire object of a record.
///
/// Field names are given in memory convention and converted on insertion,
/// values are converted recursively. Required fields are always written,
/// optional fields only when non-empty. Insertion order is emission order.
#[derive(Debug, Default)]
pub struct WireObject {
    map: Map<String, Value>,
}

impl WireObject {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a field unconditionally.
    #[must_use]
    pub fn required(mut self, name: &str, value: Value) -> Self {
        self.map.insert(wire_key(name), to_wire(value));
        self
    }

    /// Writes a field unless it is empty.
    #[must_use]
    pub fn optional(mut self, name: &str, value: Value) -> Self {
        if !is_empty(&value) {
            self.map.insert(wire_key(name), to_wire(value));
        }
        self
    }

    /// Writes an optional string field.
    #[must_use]
    pub fn optional_str(self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.optional(name, Value::String(v.to_string())),
            None => self,
        }
    }

    /// Writes every open field that is not empty, after the named ones.
    #[must_use]
    pub fn open<'a, I>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
    {
        for (name, value) in fields {
            if !is_empty(value) && !self.map.contains_key(&wire_key(name)) {
                self.map.insert(wire_key(name), to_wire(value.clone()));
            }
        }
        self
    }

    #[must_use]
    pub fn build(self) -> Value {
        Value::Object(self.map)
    }
}
