//! Generic attribute-mapped records.
//!
//! Every MMIF object is a record: a fixed set of named fields plus, for open
//! records, a bag of additional properties. This module provides
//!
//! - [`Properties`], the ordered open bag,
//! - [`Record`], uniform `get_field`/`set_field` routing over named fields
//!   and the open bag,
//! - [`Fields`], the reader records use to pull their named fields out of an
//!   in-memory JSON object during deserialization.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MmifError, MmifResult};
use crate::schema::SchemaViolation;
use crate::wire;

// ============================================================================
// Open property bag
// ============================================================================

/// Insertion-ordered map of property names to JSON values.
///
/// Values are held in memory key convention (see [`crate::wire`]).
/// Equality ignores order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(IndexMap<String, Value>);

impl Properties {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.0.get_mut(name)
    }

    /// Inserts or replaces a value, keeping the original position on replace.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(name.into(), value)
    }

    /// Removes a value, preserving the order of the remaining entries.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.shift_remove(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.0.iter()
    }

    /// Copies every entry of `other` into `self`, later values winning.
    pub fn extend_from(&mut self, other: &Properties) {
        for (k, v) in other.iter() {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// Wire form of the bag with empty values skipped.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        wire::WireObject::new().open(self.iter()).build()
    }
}

/// Empty values are dropped, as they would be on serialization.
impl From<Map<String, Value>> for Properties {
    fn from(map: Map<String, Value>) -> Self {
        Self(map.into_iter().filter(|(_, v)| !wire::is_empty(v)).collect())
    }
}

impl FromIterator<(String, Value)> for Properties {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Properties {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for Properties {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// ============================================================================
// Field routing
// ============================================================================

/// Uniform access to the named fields and open bag of a record.
///
/// Implementors describe their named fields; the provided methods route a
/// field name to the right place and raise the record-level errors.
pub trait Record {
    /// Record name used in error messages.
    fn record_name(&self) -> &'static str;

    /// Names of fields that are emitted even when empty.
    fn required_fields(&self) -> &'static [&'static str];

    /// Current value of a named field, `None` when `name` is not declared.
    fn named_field(&self, name: &str) -> Option<Value>;

    /// Assigns a named field, `None` when `name` is not declared.
    fn set_named_field(&mut self, name: &str, value: Value) -> Option<MmifResult<()>>;

    /// The open bag, `None` for closed records.
    fn open_fields(&self) -> Option<&Properties>;

    fn open_fields_mut(&mut self) -> Option<&mut Properties>;

    /// Reads a named field or open property.
    ///
    /// An optional named field that is currently empty reads as missing.
    fn get_field(&self, name: &str) -> MmifResult<Value> {
        let missing = || MmifError::KeyNotFound {
            record: self.record_name().to_string(),
            key: name.to_string(),
        };
        if let Some(value) = self.named_field(name) {
            if wire::is_empty(&value) && !self.required_fields().contains(&name) {
                return Err(missing());
            }
            return Ok(value);
        }
        self.open_fields()
            .and_then(|open| open.get(name))
            .cloned()
            .ok_or_else(missing)
    }

    /// Writes a named field or, for open records, an open property.
    fn set_field(&mut self, name: &str, value: Value) -> MmifResult<()> {
        if let Some(result) = self.set_named_field(name, value.clone()) {
            return result;
        }
        let record = self.record_name();
        match self.open_fields_mut() {
            Some(open) => {
                open.insert(name, value);
                Ok(())
            }
            None => Err(MmifError::AdditionalPropertiesDisallowed {
                record: record.to_string(),
                key: name.to_string(),
            }),
        }
    }
}

/// Coerces a JSON value into an optional string field.
pub(crate) fn string_field(name: &str, value: Value) -> MmifResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        other => Err(MmifError::invalid_value(
            name,
            format!("expected a string, got {other}"),
        )),
    }
}

// ============================================================================
// Deserialization reader
// ============================================================================

/// Pulls named fields out of an in-memory JSON object.
///
/// Whatever is left after the named fields are taken is either the open bag
/// ([`Fields::into_open`]) or an error for closed records
/// ([`Fields::deny_open`]).
#[derive(Debug)]
pub(crate) struct Fields {
    record: &'static str,
    path: String,
    map: Map<String, Value>,
}

impl Fields {
    pub(crate) fn new(record: &'static str, path: impl Into<String>, value: Value) -> MmifResult<Self> {
        let path = path.into();
        match value {
            Value::Object(map) => Ok(Self { record, path, map }),
            other => Err(SchemaViolation::new(
                path,
                format!("{record} must be an object, got {}", type_name(&other)),
            )
            .into()),
        }
    }

    /// JSON pointer of a member of this object.
    pub(crate) fn child_path(&self, name: &str) -> String {
        format!("{}/{}", self.path, wire::wire_key(name))
    }

    fn violation(&self, name: &str, detail: String) -> MmifError {
        SchemaViolation::new(self.child_path(name), detail).into()
    }

    pub(crate) fn required(&mut self, name: &str) -> MmifResult<Value> {
        self.map
            .shift_remove(name)
            .ok_or_else(|| self.violation(name, format!("{} requires {}", self.record, wire::wire_key(name))))
    }

    pub(crate) fn optional(&mut self, name: &str) -> Option<Value> {
        self.map.shift_remove(name).filter(|v| !v.is_null())
    }

    pub(crate) fn required_str(&mut self, name: &str) -> MmifResult<String> {
        match self.required(name)? {
            Value::String(s) => Ok(s),
            other => Err(self.violation(name, format!("expected a string, got {}", type_name(&other)))),
        }
    }

    pub(crate) fn optional_str(&mut self, name: &str) -> MmifResult<Option<String>> {
        match self.optional(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(self.violation(name, format!("expected a string, got {}", type_name(&other)))),
        }
    }

    /// An object member, empty when absent.
    pub(crate) fn optional_object(&mut self, name: &str) -> MmifResult<Map<String, Value>> {
        match self.optional(name) {
            None => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map),
            Some(other) => Err(self.violation(name, format!("expected an object, got {}", type_name(&other)))),
        }
    }

    pub(crate) fn required_array(&mut self, name: &str) -> MmifResult<Vec<Value>> {
        match self.required(name)? {
            Value::Array(items) => Ok(items),
            other => Err(self.violation(name, format!("expected an array, got {}", type_name(&other)))),
        }
    }

    pub(crate) fn optional_array(&mut self, name: &str) -> MmifResult<Vec<Value>> {
        match self.optional(name) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(self.violation(name, format!("expected an array, got {}", type_name(&other)))),
        }
    }

    /// Remaining members as the open bag.
    pub(crate) fn into_open(self) -> Properties {
        Properties::from(self.map)
    }

    /// Fails if any member was not consumed as a named field.
    pub(crate) fn deny_open(self) -> MmifResult<()> {
        match self.map.keys().next() {
            Some(key) => Err(MmifError::AdditionalPropertiesDisallowed {
                record: self.record.to_string(),
                key: wire::wire_key(key),
            }),
            None => Ok(()),
        }
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
