//! Annotations and documents.
//!
//! An [`Annotation`] is a typed, identified bag of properties. Besides the
//! properties it owns (and serializes), it keeps two process-local overlays
//! that are never written out:
//!
//! - *ephemeral* properties, filled from the owning view's `contains`
//!   metadata and from alias propagation,
//! - an alignment cache mapping `Alignment` annotation ids to the id of the
//!   annotation on the other end.
//!
//! A [`Document`] wraps an annotation and adds the structured `mime`,
//! `location` and `text` fields plus a three-tier property store:
//!
//! | tier      | source                                          | serialized |
//! |-----------|-------------------------------------------------|------------|
//! | pending   | `add_property` after the document was created   | no         |
//! | ephemeral | capital annotations that reference the document | no         |
//! | original  | construction or load                            | yes        |
//!
//! Lookups go pending, then ephemeral, then original. Pending values reach
//! the wire only through capital annotations, see
//! [`crate::Mmif::generate_capital_annotations`].

use std::path::PathBuf;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::warn;

use crate::collections::Keyed;
use crate::docloc::{self, ResolverRegistry};
use crate::error::{MmifError, MmifResult};
use crate::record::{Fields, Properties, Record, string_field};
use crate::vocabulary::AtType;
use crate::wire::{self, WireObject};

/// Separates a view id from the local part of an annotation id.
pub const ID_DELIMITER: char = ':';

/// Names of properties that anchor an annotation on its own.
const SPAN_PROPERTIES: [&str; 2] = ["start", "end"];

// ============================================================================
// Annotation
// ============================================================================

/// A typed annotation.
#[derive(Debug, Clone)]
pub struct Annotation {
    at_type: AtType,
    id: String,
    properties: Properties,
    ephemeral: Properties,
    alignments: IndexMap<String, String>,
}

impl Annotation {
    #[must_use]
    pub fn new(at_type: AtType, id: impl Into<String>) -> Self {
        Self {
            at_type,
            id: id.into(),
            properties: Properties::new(),
            ephemeral: Properties::new(),
            alignments: IndexMap::new(),
        }
    }

    pub fn at_type(&self) -> &AtType {
        &self.at_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// View id part of a qualified id.
    pub fn parent(&self) -> Option<&str> {
        self.id.split_once(ID_DELIMITER).map(|(view, _)| view)
    }

    /// Id without the view prefix.
    pub fn local_id(&self) -> &str {
        self.id
            .split_once(ID_DELIMITER)
            .map_or(self.id.as_str(), |(_, local)| local)
    }

    /// Properties owned by this annotation, without `id`.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Raw access to owned properties; no validation or alias handling.
    pub(crate) fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    /// Derived, non-serialized properties.
    pub fn ephemeral(&self) -> &Properties {
        &self.ephemeral
    }

    pub fn has_property(&self, name: &str) -> bool {
        name == "id" || self.properties.contains_key(name) || self.ephemeral.contains_key(name)
    }

    /// Looks up a property in owned properties, then the ephemeral overlay.
    pub fn get_property(&self, name: &str) -> MmifResult<Value> {
        if name == "id" {
            return Ok(Value::String(self.id.clone()));
        }
        self.properties
            .get(name)
            .or_else(|| self.ephemeral.get(name))
            .cloned()
            .ok_or_else(|| MmifError::PropertyNotFound {
                id: self.id.clone(),
                name: name.to_string(),
            })
    }

    /// Like [`Annotation::get_property`] with a fallback value.
    pub fn get_property_or(&self, name: &str, default: Value) -> Value {
        self.get_property(name).unwrap_or(default)
    }

    /// Sets an owned property.
    ///
    /// Values are limited to primitives, arrays, and flat objects. Setting
    /// `targets` next to `start`/`end` (or the reverse) is rejected, and so
    /// is `id`: identifiers come from the constructor and the owning view.
    pub fn add_property(&mut self, name: &str, value: Value) -> MmifResult<()> {
        if name == "id" {
            let id = value.as_str().map_or_else(|| value.to_string(), str::to_string);
            return Err(MmifError::invalid_id(id, "annotations cannot be renamed"));
        }
        check_value(name, &value, false)?;
        let conflicts = match name {
            "targets" => SPAN_PROPERTIES.iter().any(|p| self.properties.contains_key(p)),
            "start" | "end" => self.properties.contains_key("targets"),
            _ => false,
        };
        if conflicts {
            return Err(MmifError::AmbiguousAnchor { id: self.id.clone() });
        }
        self.propagate_aliases(name, &value);
        self.properties.insert(name, value);
        Ok(())
    }

    /// Paired annotation id through a given alignment.
    pub fn aligned_to_by(&self, alignment_id: &str) -> Option<&str> {
        self.alignments.get(alignment_id).map(String::as_str)
    }

    /// Alignment id, paired id, alignment id, paired id, ... in cache order.
    pub fn iter_all_aligned(&self) -> impl Iterator<Item = &str> {
        self.alignments
            .iter()
            .flat_map(|(alignment, paired)| [alignment.as_str(), paired.as_str()])
    }

    pub fn is_aligned(&self) -> bool {
        !self.alignments.is_empty()
    }

    /// Fails with [`MmifError::AmbiguousAnchor`] when `targets` and
    /// `start`/`end` are both present.
    pub fn check_anchor(&self) -> MmifResult<()> {
        if self.properties.contains_key("targets")
            && SPAN_PROPERTIES.iter().any(|p| self.properties.contains_key(p))
        {
            return Err(MmifError::AmbiguousAnchor { id: self.id.clone() });
        }
        Ok(())
    }

    pub(crate) fn cache_alignment(&mut self, alignment_id: &str, paired_id: &str) {
        self.alignments
            .insert(alignment_id.to_string(), paired_id.to_string());
    }

    pub(crate) fn clear_alignments(&mut self) {
        self.alignments.clear();
    }

    /// Copies view-level metadata into the overlay where no owned value exists.
    pub(crate) fn apply_contain(&mut self, contain: &Properties) {
        for (name, value) in contain {
            if !self.properties.contains_key(name) {
                self.ephemeral.insert(name.clone(), value.clone());
            }
        }
    }

    fn propagate_aliases(&mut self, name: &str, value: &Value) {
        for group in self.at_type.property_aliases() {
            if !group.contains(&name) {
                continue;
            }
            for synonym in group.iter().filter(|s| **s != name) {
                if let Some(existing) = self.properties.get(synonym) {
                    if existing != value {
                        warn!(
                            id = %self.id,
                            property = name,
                            synonym = *synonym,
                            "alias collision: synonym already holds a different value"
                        );
                    }
                }
                self.ephemeral.insert(*synonym, value.clone());
            }
        }
    }

    fn propagate_all_aliases(&mut self) {
        let owned: Vec<(String, Value)> = self
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (name, value) in owned {
            self.propagate_aliases(&name, &value);
        }
    }

    /// Wire form.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let properties = WireObject::new()
            .required("id", Value::String(self.id.clone()))
            .open(self.properties.iter())
            .build();
        WireObject::new()
            .required("_type", Value::String(self.at_type.to_string()))
            .required("properties", properties)
            .build()
    }

    /// Builds an annotation from its in-memory JSON form.
    pub(crate) fn from_value(value: Value, path: &str) -> MmifResult<Self> {
        let mut fields = Fields::new("Annotation", path, value)?;
        let at_type: AtType = fields.required_str("_type")?.parse()?;
        let props_path = fields.child_path("properties");
        let props = fields.required("properties")?;
        fields.deny_open()?;

        let mut props = Fields::new("AnnotationProperties", props_path, props)?;
        let id = props.required_str("id")?;
        let mut annotation = Self::new(at_type, id);
        annotation.properties = props.into_open();
        annotation.check_anchor()?;
        annotation.propagate_all_aliases();
        Ok(annotation)
    }
}

impl PartialEq for Annotation {
    fn eq(&self, other: &Self) -> bool {
        self.at_type == other.at_type && self.id == other.id && self.properties == other.properties
    }
}

impl Keyed for Annotation {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Only primitives, arrays, and flat objects are accepted as values.
fn check_value(name: &str, value: &Value, in_object: bool) -> MmifResult<()> {
    match value {
        Value::Object(_) | Value::Array(_) if in_object => Err(MmifError::invalid_value(
            name,
            "object members must be primitive values",
        )),
        Value::Object(map) => map.values().try_for_each(|v| check_value(name, v, true)),
        Value::Array(items) => items.iter().try_for_each(|v| check_value(name, v, false)),
        _ => Ok(()),
    }
}

// ============================================================================
// Text
// ============================================================================

/// Text content of a document: `{"@value": ..., "@language": ...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Text {
    pub value: String,
    pub language: Option<String>,
}

impl Text {
    #[must_use]
    pub fn new(value: impl Into<String>, language: Option<&str>) -> Self {
        Self {
            value: value.into(),
            language: language.map(str::to_string),
        }
    }

    /// Accepts either a plain string or a `{_value, _language}` object.
    pub(crate) fn from_value(value: Value, path: &str) -> MmifResult<Self> {
        if let Value::String(s) = value {
            return Ok(Self::new(s, None));
        }
        let mut fields = Fields::new("Text", path, value)?;
        let value = fields.required_str("_value")?;
        let language = fields.optional_str("_language")?;
        fields.deny_open()?;
        Ok(Self { value, language })
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        WireObject::new()
            .required("_value", Value::String(self.value.clone()))
            .optional_str("_language", self.language.as_deref())
            .build()
    }
}

impl Record for Text {
    fn record_name(&self) -> &'static str {
        "Text"
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["_value"]
    }

    fn named_field(&self, name: &str) -> Option<Value> {
        match name {
            "_value" => Some(Value::String(self.value.clone())),
            "_language" => Some(self.language.clone().map_or(Value::Null, Value::String)),
            _ => None,
        }
    }

    fn set_named_field(&mut self, name: &str, value: Value) -> Option<MmifResult<()>> {
        match name {
            "_value" => Some(string_field(name, value).map(|v| self.value = v.unwrap_or_default())),
            "_language" => Some(string_field(name, value).map(|v| self.language = v)),
            _ => None,
        }
    }

    fn open_fields(&self) -> Option<&Properties> {
        None
    }

    fn open_fields_mut(&mut self) -> Option<&mut Properties> {
        None
    }
}

// ============================================================================
// Document
// ============================================================================

/// A document annotation with structured content fields and tiered properties.
#[derive(Debug, Clone)]
pub struct Document {
    annotation: Annotation,
    mime: Option<String>,
    location: Option<String>,
    text: Option<Text>,
    pending: Properties,
    ephemeral: Properties,
}

impl Document {
    #[must_use]
    pub fn new(at_type: AtType, id: impl Into<String>) -> Self {
        Self {
            annotation: Annotation::new(at_type, id),
            mime: None,
            location: None,
            text: None,
            pending: Properties::new(),
            ephemeral: Properties::new(),
        }
    }

    /// A text document carrying its content inline.
    #[must_use]
    pub fn new_text(id: impl Into<String>, text: &str, language: Option<&str>) -> Self {
        let mut doc = Self::new(crate::vocabulary::TEXT_DOCUMENT, id);
        doc.text = Some(Text::new(text, language));
        doc
    }

    pub fn id(&self) -> &str {
        self.annotation.id()
    }

    pub fn at_type(&self) -> &AtType {
        self.annotation.at_type()
    }

    /// The underlying annotation; its properties are the original tier.
    pub fn annotation(&self) -> &Annotation {
        &self.annotation
    }

    pub(crate) fn annotation_mut(&mut self) -> &mut Annotation {
        &mut self.annotation
    }

    pub fn mime(&self) -> Option<&str> {
        self.mime.as_deref()
    }

    pub fn set_mime(&mut self, mime: impl Into<String>) {
        self.mime = Some(mime.into());
    }

    pub fn text(&self) -> Option<&Text> {
        self.text.as_ref()
    }

    pub fn set_text(&mut self, text: Text) {
        self.text = Some(text);
    }

    pub fn text_value(&self) -> Option<&str> {
        self.text.as_ref().map(|t| t.value.as_str())
    }

    pub fn text_language(&self) -> Option<&str> {
        self.text.as_ref().and_then(|t| t.language.as_deref())
    }

    /// Location URI as stored.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Sets the location; a scheme-less absolute path becomes a `file://` URI.
    pub fn set_location(&mut self, location: &str) -> MmifResult<()> {
        self.location = Some(docloc::normalize_location(location)?);
        Ok(())
    }

    /// Scheme of the location URI, e.g. `file` or `http`.
    pub fn location_scheme(&self) -> Option<&str> {
        self.location
            .as_deref()
            .and_then(docloc::split_scheme)
            .map(|(scheme, _)| scheme)
    }

    /// Location without its scheme: host plus path, or just the path.
    pub fn location_address(&self) -> Option<&str> {
        self.location
            .as_deref()
            .map(|loc| docloc::split_scheme(loc).map_or(loc, |(_, rest)| rest))
    }

    /// Local filesystem path of the document, resolved through `registry`.
    pub fn location_path(&self, registry: &ResolverRegistry) -> MmifResult<PathBuf> {
        let location = self.location.as_deref().ok_or_else(|| MmifError::PropertyNotFound {
            id: self.id().to_string(),
            name: "location".to_string(),
        })?;
        registry.resolve(location)
    }

    /// Properties added after embedding, not yet recorded anywhere.
    pub fn pending(&self) -> &Properties {
        &self.pending
    }

    /// Properties recorded for this document by capital annotations.
    pub fn ephemeral(&self) -> &Properties {
        &self.ephemeral
    }

    /// Looks up pending, then ephemeral, then original properties.
    pub fn get_property(&self, name: &str) -> MmifResult<Value> {
        if let Some(value) = self.pending.get(name).or_else(|| self.ephemeral.get(name)) {
            return Ok(value.clone());
        }
        match self.structured_field(name) {
            Some(value) => Ok(value),
            None => self.annotation.get_property(name),
        }
    }

    pub fn get_property_or(&self, name: &str, default: Value) -> Value {
        self.get_property(name).unwrap_or(default)
    }

    /// A document whose properties are original from the start.
    ///
    /// `mime`, `location` and `text` fill the structured fields.
    pub fn with_properties(at_type: AtType, id: impl Into<String>, properties: Properties) -> MmifResult<Self> {
        let mut doc = Self::new(at_type, id);
        for (name, value) in properties {
            doc.set_original(&name, value)?;
        }
        Ok(doc)
    }

    /// Adds a property to this document.
    ///
    /// `text`, `mime` and `location` always update the structured fields.
    /// Any other name already in the original tier cannot change value;
    /// new names go to the pending tier.
    pub fn add_property(&mut self, name: &str, value: Value) -> MmifResult<()> {
        if let Some(result) = self.set_structured_field(name, value.clone()) {
            return result;
        }
        if self.restates_original(name, &value)? {
            return Ok(());
        }
        check_value(name, &value, false)?;
        self.pending.insert(name, value);
        Ok(())
    }

    fn set_original(&mut self, name: &str, value: Value) -> MmifResult<()> {
        if let Some(result) = self.set_structured_field(name, value.clone()) {
            return result;
        }
        if self.restates_original(name, &value)? {
            return Ok(());
        }
        self.annotation.add_property(name, value)
    }

    /// Whether the original tier already holds exactly this value.
    ///
    /// A different value there is [`MmifError::ReadOnlyProperty`].
    fn restates_original(&self, name: &str, value: &Value) -> MmifResult<bool> {
        match self.annotation.properties().get(name) {
            None => Ok(false),
            Some(existing) if existing == value => Ok(true),
            Some(_) => Err(MmifError::ReadOnlyProperty {
                id: self.id().to_string(),
                name: name.to_string(),
            }),
        }
    }

    fn structured_field(&self, name: &str) -> Option<Value> {
        match name {
            "mime" => self.mime.clone().map(Value::String),
            "location" => self.location.clone().map(Value::String),
            "text" => self.text.as_ref().map(|t| wire::to_memory(t.to_value())),
            _ => None,
        }
    }

    fn set_structured_field(&mut self, name: &str, value: Value) -> Option<MmifResult<()>> {
        let result = match name {
            "id" => self.annotation.add_property(name, value),
            "mime" => string_field(name, value).map(|v| self.mime = v),
            "location" => match string_field(name, value) {
                Ok(Some(loc)) => self.set_location(&loc),
                Ok(None) => {
                    self.location = None;
                    Ok(())
                }
                Err(e) => Err(e),
            },
            "text" => Text::from_value(wire::to_memory(value), "/text").map(|t| self.text = Some(t)),
            _ => return None,
        };
        Some(result)
    }

    /// Moves pending values into the ephemeral tier once recorded elsewhere.
    pub(crate) fn record_pending(&mut self, names: &[String]) {
        for name in names {
            if let Some(value) = self.pending.remove(name) {
                self.ephemeral.insert(name.clone(), value);
            }
        }
    }

    /// Moves pending values into the original tier.
    pub(crate) fn promote_pending(&mut self, names: &[String]) {
        for name in names {
            if let Some(value) = self.pending.remove(name) {
                self.annotation.properties_mut().insert(name.clone(), value);
            }
        }
    }

    pub(crate) fn add_ephemeral(&mut self, properties: &Properties) {
        self.ephemeral.extend_from(properties);
    }

    pub(crate) fn clear_ephemeral(&mut self) {
        self.ephemeral.clear();
    }

    /// Wire form; pending properties are not part of it.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let properties = WireObject::new()
            .required("id", Value::String(self.id().to_string()))
            .optional_str("mime", self.mime.as_deref())
            .optional_str("location", self.location.as_deref())
            .optional("text", self.text.as_ref().map_or(Value::Null, Text::to_value))
            .open(self.annotation.properties().iter())
            .build();
        WireObject::new()
            .required("_type", Value::String(self.at_type().to_string()))
            .required("properties", properties)
            .build()
    }

    pub(crate) fn from_value(value: Value, path: &str) -> MmifResult<Self> {
        let mut fields = Fields::new("Document", path, value)?;
        let at_type: AtType = fields.required_str("_type")?.parse()?;
        let props_path = fields.child_path("properties");
        let props = fields.required("properties")?;
        fields.deny_open()?;

        let mut props = Fields::new("DocumentProperties", props_path, props)?;
        let id = props.required_str("id")?;
        let mime = props.optional_str("mime")?;
        let location = props.optional_str("location")?;
        let text_path = props.child_path("text");
        let text = props
            .optional("text")
            .map(|t| Text::from_value(t, &text_path))
            .transpose()?;

        let mut doc = Self::new(at_type, id);
        doc.mime = mime;
        doc.location = location;
        doc.text = text;
        *doc.annotation.properties_mut() = props.into_open();
        Ok(doc)
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.annotation == other.annotation
            && self.mime == other.mime
            && self.location == other.location
            && self.text == other.text
    }
}

impl Keyed for Document {
    fn key(&self) -> &str {
        self.id()
    }
}

// ============================================================================
// Element
// ============================================================================

/// Anything a view can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Annotation(Annotation),
    Document(Document),
}

impl Element {
    pub fn id(&self) -> &str {
        self.annotation().id()
    }

    pub fn at_type(&self) -> &AtType {
        self.annotation().at_type()
    }

    /// The annotation part, for documents the original tier.
    pub fn annotation(&self) -> &Annotation {
        match self {
            Self::Annotation(a) => a,
            Self::Document(d) => d.annotation(),
        }
    }

    pub(crate) fn annotation_mut(&mut self) -> &mut Annotation {
        match self {
            Self::Annotation(a) => a,
            Self::Document(d) => d.annotation_mut(),
        }
    }

    pub fn is_document(&self) -> bool {
        matches!(self, Self::Document(_))
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Document(d) => Some(d),
            Self::Annotation(_) => None,
        }
    }

    pub fn as_document_mut(&mut self) -> Option<&mut Document> {
        match self {
            Self::Document(d) => Some(d),
            Self::Annotation(_) => None,
        }
    }

    pub fn get_property(&self, name: &str) -> MmifResult<Value> {
        match self {
            Self::Annotation(a) => a.get_property(name),
            Self::Document(d) => d.get_property(name),
        }
    }

    pub fn get_property_or(&self, name: &str, default: Value) -> Value {
        self.get_property(name).unwrap_or(default)
    }

    /// A property held by the element itself, ignoring view-level metadata.
    pub fn own_property(&self, name: &str) -> Option<Value> {
        match self {
            Self::Annotation(a) if name == "id" => Some(Value::String(a.id().to_string())),
            Self::Annotation(a) => a.properties().get(name).cloned(),
            Self::Document(d) => d
                .structured_field(name)
                .or_else(|| d.annotation().properties().get(name).cloned())
                .or_else(|| (name == "id").then(|| Value::String(d.id().to_string()))),
        }
    }

    pub fn add_property(&mut self, name: &str, value: Value) -> MmifResult<()> {
        match self {
            Self::Annotation(a) => a.add_property(name, value),
            Self::Document(d) => d.add_property(name, value),
        }
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Annotation(a) => a.to_value(),
            Self::Document(d) => d.to_value(),
        }
    }

    /// Dispatches on the document-ness of `_type`.
    pub(crate) fn from_value(value: Value, path: &str) -> MmifResult<Self> {
        let is_document = value
            .get("_type")
            .and_then(Value::as_str)
            .and_then(|t| t.parse::<AtType>().ok())
            .is_some_and(|t| t.is_document());
        if is_document {
            Document::from_value(value, path).map(Self::Document)
        } else {
            Annotation::from_value(value, path).map(Self::Annotation)
        }
    }
}

impl Keyed for Element {
    fn key(&self) -> &str {
        self.id()
    }
}

impl From<Annotation> for Element {
    fn from(annotation: Annotation) -> Self {
        Self::Annotation(annotation)
    }
}

impl From<Document> for Element {
    fn from(document: Document) -> Self {
        Self::Document(document)
    }
}
