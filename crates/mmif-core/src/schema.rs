//! Structural validation of wire payloads.
//!
//! Validation runs on the raw `@`-keyed JSON before anything is built, so a
//! rejected payload never produces a partial object. The [`SchemaValidator`]
//! trait is the seam for plugging in a full JSON-Schema implementation;
//! [`StructuralValidator`] checks the members the object model relies on.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::record::type_name;

/// A wire payload does not match the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("schema violation at {path}: {detail}")]
pub struct SchemaViolation {
    /// JSON pointer to the offending member.
    pub path: String,
    pub detail: String,
}

impl SchemaViolation {
    pub fn new(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            detail: detail.into(),
        }
    }
}

/// Validates a wire payload.
pub trait SchemaValidator {
    fn validate(&self, payload: &Value) -> Result<(), SchemaViolation>;
}

impl<F> SchemaValidator for F
where
    F: Fn(&Value) -> Result<(), SchemaViolation>,
{
    fn validate(&self, payload: &Value) -> Result<(), SchemaViolation> {
        self(payload)
    }
}

/// Checks required members, their JSON types, and anchor ambiguity.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralValidator;

impl SchemaValidator for StructuralValidator {
    fn validate(&self, payload: &Value) -> Result<(), SchemaViolation> {
        let root = object(payload, "")?;

        let metadata = object(member(root, "", "metadata")?, "/metadata")?;
        string(member(metadata, "/metadata", "mmif")?, "/metadata/mmif")?;

        let documents = array(member(root, "", "documents")?, "/documents")?;
        for (i, doc) in documents.iter().enumerate() {
            check_annotation(doc, &format!("/documents/{i}"))?;
        }

        let views = array(member(root, "", "views")?, "/views")?;
        for (i, view) in views.iter().enumerate() {
            check_view(view, &format!("/views/{i}"))?;
        }
        Ok(())
    }
}

fn check_view(value: &Value, path: &str) -> Result<(), SchemaViolation> {
    let view = object(value, path)?;
    string(member(view, path, "id")?, &format!("{path}/id"))?;

    let meta_path = format!("{path}/metadata");
    let metadata = object(member(view, path, "metadata")?, &meta_path)?;
    string(member(metadata, &meta_path, "app")?, &format!("{meta_path}/app"))?;
    if let Some(contains) = metadata.get("contains") {
        object(contains, &format!("{meta_path}/contains"))?;
    }
    if let Some(error) = metadata.get("error") {
        let error_path = format!("{meta_path}/error");
        let error = object(error, &error_path)?;
        string(member(error, &error_path, "message")?, &format!("{error_path}/message"))?;
    }
    if let Some(warnings) = metadata.get("warnings") {
        array(warnings, &format!("{meta_path}/warnings"))?;
    }

    let annotations = array(member(view, path, "annotations")?, &format!("{path}/annotations"))?;
    for (i, ann) in annotations.iter().enumerate() {
        check_annotation(ann, &format!("{path}/annotations/{i}"))?;
    }
    Ok(())
}

fn check_annotation(value: &Value, path: &str) -> Result<(), SchemaViolation> {
    let ann = object(value, path)?;
    string(member(ann, path, "@type")?, &format!("{path}/@type"))?;
    let props_path = format!("{path}/properties");
    let props = object(member(ann, path, "properties")?, &props_path)?;
    string(member(props, &props_path, "id")?, &format!("{props_path}/id"))?;
    if props.contains_key("targets") && (props.contains_key("start") || props.contains_key("end")) {
        return Err(SchemaViolation::new(
            props_path,
            "targets cannot be combined with start/end",
        ));
    }
    Ok(())
}

fn member<'a>(map: &'a Map<String, Value>, path: &str, name: &str) -> Result<&'a Value, SchemaViolation> {
    map.get(name)
        .ok_or_else(|| SchemaViolation::new(path, format!("missing required member {name}")))
}

fn object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, SchemaViolation> {
    value
        .as_object()
        .ok_or_else(|| SchemaViolation::new(path, format!("expected an object, got {}", type_name(value))))
}

fn array<'a>(value: &'a Value, path: &str) -> Result<&'a Vec<Value>, SchemaViolation> {
    value
        .as_array()
        .ok_or_else(|| SchemaViolation::new(path, format!("expected an array, got {}", type_name(value))))
}

fn string<'a>(value: &'a Value, path: &str) -> Result<&'a str, SchemaViolation> {
    value
        .as_str()
        .ok_or_else(|| SchemaViolation::new(path, format!("expected a string, got {}", type_name(value))))
}
