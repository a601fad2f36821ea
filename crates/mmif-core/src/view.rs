//! Views: one pipeline stage's contribution to an MMIF file.
//!
//! A view owns its annotations and documents, keyed by view-qualified id
//! (`v1:tf_1`), and a [`ViewMetadata`] record describing the app that
//! produced it. The `contains` metadata declares which types the view holds
//! and the properties shared by every instance of a type; those shared
//! properties are copied into each annotation's ephemeral overlay.
//!
//! A view is either contentful (annotations plus `contains`) or failed
//! (`error` set, no annotations). [`View::set_error`] switches to the latter.

use std::collections::HashMap;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::debug;

use crate::annotation::{Annotation, Document, Element, ID_DELIMITER, Text};
use crate::collections::{Contain, ContainsMap, Keyed, KeyedList};
use crate::error::{MmifError, MmifResult};
use crate::record::{Fields, Properties, Record, string_field, type_name};
use crate::schema::SchemaViolation;
use crate::vocabulary::{self, AtType};
use crate::wire::{self, WireObject};

// ============================================================================
// Error record
// ============================================================================

/// Failure report of an app: `{"message", "stackTrace"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorRecord {
    pub message: String,
    pub stack_trace: Option<String>,
}

impl ErrorRecord {
    #[must_use]
    pub fn to_value(&self) -> Value {
        WireObject::new()
            .required("message", Value::String(self.message.clone()))
            .optional_str("stackTrace", self.stack_trace.as_deref())
            .build()
    }

    fn from_value(value: Value, path: &str) -> MmifResult<Self> {
        let mut fields = Fields::new("ErrorRecord", path, value)?;
        let message = fields.required_str("message")?;
        let stack_trace = fields.optional_str("stackTrace")?;
        fields.deny_open()?;
        Ok(Self {
            message,
            stack_trace,
        })
    }
}

impl Record for ErrorRecord {
    fn record_name(&self) -> &'static str {
        "ErrorRecord"
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["message"]
    }

    fn named_field(&self, name: &str) -> Option<Value> {
        match name {
            "message" => Some(Value::String(self.message.clone())),
            "stackTrace" => Some(self.stack_trace.clone().map_or(Value::Null, Value::String)),
            _ => None,
        }
    }

    fn set_named_field(&mut self, name: &str, value: Value) -> Option<MmifResult<()>> {
        match name {
            "message" => Some(string_field(name, value).map(|v| self.message = v.unwrap_or_default())),
            "stackTrace" => Some(string_field(name, value).map(|v| self.stack_trace = v)),
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
// View metadata
// ============================================================================

/// Metadata of a view. Only `app` is required.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewMetadata {
    /// Document the whole view is about, if there is a single one.
    pub document: Option<String>,
    pub timestamp: Option<String>,
    /// URI of the app that produced the view.
    pub app: String,
    pub contains: ContainsMap,
    /// Runtime parameters the app was invoked with.
    pub parameters: Properties,
    /// Configuration the app resolved from its parameters.
    pub app_configuration: Properties,
    pub error: Option<ErrorRecord>,
    pub warnings: Vec<String>,
    /// Members not declared above.
    pub additional: Properties,
}

impl ViewMetadata {
    /// Wire form.
    ///
    /// `contains` is written even when empty unless the view reports an
    /// error or warnings.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let bare = self.contains.is_empty() && self.error.is_none() && self.warnings.is_empty();
        let object = WireObject::new()
            .optional_str("document", self.document.as_deref())
            .optional_str("timestamp", self.timestamp.as_deref())
            .required("app", Value::String(self.app.clone()));
        let object = if bare {
            object.required("contains", self.contains.to_wire())
        } else {
            object.optional("contains", self.contains.to_wire())
        };
        object
            .optional("parameters", self.parameters.to_wire())
            .optional("appConfiguration", self.app_configuration.to_wire())
            .optional("error", self.error.as_ref().map_or(Value::Null, ErrorRecord::to_value))
            .optional("warnings", warnings_value(&self.warnings))
            .open(self.additional.iter())
            .build()
    }

    fn from_value(value: Value, path: &str) -> MmifResult<Self> {
        let mut fields = Fields::new("ViewMetadata", path, value)?;
        let document = fields.optional_str("document")?;
        let timestamp = fields.optional_str("timestamp")?;
        let app = fields.required_str("app")?;
        let contains_path = fields.child_path("contains");
        let contains = parse_contains(Value::Object(fields.optional_object("contains")?), &contains_path)?;
        let parameters = Properties::from(fields.optional_object("parameters")?);
        let app_configuration = Properties::from(fields.optional_object("appConfiguration")?);
        let error_path = fields.child_path("error");
        let error = fields
            .optional("error")
            .filter(|v| !wire::is_empty(v))
            .map(|v| ErrorRecord::from_value(v, &error_path))
            .transpose()?;
        let warnings_path = fields.child_path("warnings");
        let warnings = parse_warnings(Value::Array(fields.optional_array("warnings")?), &warnings_path)?;
        Ok(Self {
            document,
            timestamp,
            app,
            contains,
            parameters,
            app_configuration,
            error,
            warnings,
            additional: fields.into_open(),
        })
    }
}

fn warnings_value(warnings: &[String]) -> Value {
    Value::Array(warnings.iter().cloned().map(Value::String).collect())
}

fn parse_contains(value: Value, path: &str) -> MmifResult<ContainsMap> {
    let map = match value {
        Value::Object(map) => map,
        other => {
            return Err(SchemaViolation::new(path, format!("expected an object, got {}", type_name(&other))).into());
        }
    };
    let mut contains = ContainsMap::new();
    for (uri, metadata) in map {
        let at_type: AtType = uri.parse()?;
        let contain = match metadata {
            Value::Object(m) => Contain::from(m),
            Value::Null => Contain::new(),
            other => {
                return Err(SchemaViolation::new(
                    format!("{path}/{uri}"),
                    format!("expected an object, got {}", type_name(&other)),
                )
                .into());
            }
        };
        contains.append(at_type, contain, false)?;
    }
    Ok(contains)
}

fn parse_warnings(value: Value, path: &str) -> MmifResult<Vec<String>> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(SchemaViolation::new(path, format!("expected an array, got {}", type_name(&other))).into());
        }
    };
    Ok(items
        .into_iter()
        .map(|w| match w {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .collect())
}

impl Record for ViewMetadata {
    fn record_name(&self) -> &'static str {
        "ViewMetadata"
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["app"]
    }

    fn named_field(&self, name: &str) -> Option<Value> {
        let string = |s: &Option<String>| s.clone().map_or(Value::Null, Value::String);
        match name {
            "document" => Some(string(&self.document)),
            "timestamp" => Some(string(&self.timestamp)),
            "app" => Some(Value::String(self.app.clone())),
            "contains" => Some(self.contains.to_wire()),
            "parameters" => Some(self.parameters.to_wire()),
            "appConfiguration" => Some(self.app_configuration.to_wire()),
            "error" => Some(self.error.as_ref().map_or(Value::Null, ErrorRecord::to_value)),
            "warnings" => Some(warnings_value(&self.warnings)),
            _ => None,
        }
    }

    fn set_named_field(&mut self, name: &str, value: Value) -> Option<MmifResult<()>> {
        let object = |value: Value| match value {
            Value::Object(m) => Ok(Properties::from(m)),
            Value::Null => Ok(Properties::new()),
            other => Err(MmifError::invalid_value(name, format!("expected an object, got {}", type_name(&other)))),
        };
        let result = match name {
            "document" => string_field(name, value).map(|v| self.document = v),
            "timestamp" => string_field(name, value).map(|v| self.timestamp = v),
            "app" => string_field(name, value).map(|v| self.app = v.unwrap_or_default()),
            "contains" => parse_contains(wire::to_memory(value), "/contains").map(|c| self.contains = c),
            "parameters" => object(wire::to_memory(value)).map(|p| self.parameters = p),
            "appConfiguration" => object(wire::to_memory(value)).map(|p| self.app_configuration = p),
            "error" if value.is_null() => {
                self.error = None;
                Ok(())
            }
            "error" => ErrorRecord::from_value(value, "/error").map(|e| self.error = Some(e)),
            "warnings" => parse_warnings(value, "/warnings").map(|w| self.warnings = w),
            _ => return None,
        };
        Some(result)
    }

    fn open_fields(&self) -> Option<&Properties> {
        Some(&self.additional)
    }

    fn open_fields_mut(&mut self) -> Option<&mut Properties> {
        Some(&mut self.additional)
    }
}

// ============================================================================
// View
// ============================================================================

/// A view and the annotations it owns.
#[derive(Debug, Clone)]
pub struct View {
    id: String,
    metadata: ViewMetadata,
    annotations: KeyedList<Element>,
    /// Last number handed out per id prefix.
    id_counts: HashMap<String, u64>,
}

impl View {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metadata: ViewMetadata::default(),
            annotations: KeyedList::new(),
            id_counts: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn metadata(&self) -> &ViewMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut ViewMetadata {
        &mut self.metadata
    }

    pub fn app(&self) -> &str {
        &self.metadata.app
    }

    pub fn set_app(&mut self, app: impl Into<String>) {
        self.metadata.app = app.into();
    }

    /// Stamps the view with the current UTC time.
    pub fn set_timestamp_now(&mut self) {
        self.metadata.timestamp = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true));
    }

    pub fn annotations(&self) -> &KeyedList<Element> {
        &self.annotations
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn has_error(&self) -> bool {
        self.metadata.error.is_some()
    }

    pub fn has_warnings(&self) -> bool {
        !self.metadata.warnings.is_empty()
    }

    /// Prefixes a local id with this view's id.
    ///
    /// Ids that already carry this view's prefix pass through; ids qualified
    /// with another view are rejected.
    pub fn qualify_id(&self, id: &str) -> MmifResult<String> {
        match id.split_once(ID_DELIMITER) {
            None => Ok(format!("{}{ID_DELIMITER}{id}", self.id)),
            Some((view, _)) if view == self.id => Ok(id.to_string()),
            Some(_) => Err(MmifError::invalid_id(
                id,
                format!("qualified with a view other than {}", self.id),
            )),
        }
    }

    /// Next free `<prefix>_<N>` id.
    fn next_id(&mut self, prefix: &str) -> String {
        loop {
            let counter = self.id_counts.entry(prefix.to_string()).or_insert(0);
            *counter += 1;
            let candidate = format!("{}{ID_DELIMITER}{prefix}_{}", self.id, *counter);
            if !self.annotations.contains_key(&candidate) {
                debug!(view = %self.id, id = %candidate, "autogenerated annotation id");
                return candidate;
            }
        }
    }

    /// Creates an annotation of `at_type` and adds it to the view.
    ///
    /// Without `id`, one is generated from the type's prefix.
    pub fn new_annotation(
        &mut self,
        at_type: AtType,
        id: Option<&str>,
        properties: Properties,
    ) -> MmifResult<&mut Annotation> {
        let id = match id {
            Some(id) => self.qualify_id(id)?,
            None => self.next_id(&at_type.id_prefix()),
        };
        let mut annotation = Annotation::new(at_type, id.clone());
        for (name, value) in properties {
            annotation.add_property(&name, value)?;
        }
        self.add_annotation(annotation.into(), false)?;
        match self.annotations.get_mut(&id) {
            Some(Element::Annotation(a)) => Ok(a),
            _ => Err(MmifError::not_found(id)),
        }
    }

    /// Creates a text document and adds it to the view.
    pub fn new_textdocument(
        &mut self,
        text: &str,
        language: Option<&str>,
        id: Option<&str>,
        properties: Properties,
    ) -> MmifResult<&mut Document> {
        let id = match id {
            Some(id) => self.qualify_id(id)?,
            None => self.next_id(&vocabulary::TEXT_DOCUMENT.id_prefix()),
        };
        let mut document = Document::with_properties(vocabulary::TEXT_DOCUMENT, id.clone(), properties)?;
        document.set_text(Text::new(text, language));
        self.add_document(document, false)?;
        self.get_document_mut(&id)
    }

    /// Adds an annotation or document.
    ///
    /// A bare id is qualified with this view's id. The view's `contains`
    /// gains an empty entry for the type if it had none, and the type's
    /// shared metadata is copied into the annotation's overlay. A view
    /// that reports an error takes nothing.
    pub fn add_annotation(&mut self, mut element: Element, overwrite: bool) -> MmifResult<()> {
        self.check_no_error()?;
        let id = self.qualify_id(element.id())?;
        if !overwrite && self.annotations.contains_key(&id) {
            return Err(MmifError::DuplicateKey { key: id });
        }
        element.annotation_mut().set_id(id);
        element.annotation().check_anchor()?;

        let at_type = element.at_type().clone();
        if !self.metadata.contains.contains(&at_type) {
            self.metadata.contains.entry(at_type.clone());
        }
        if let Some(contain) = self.metadata.contains.get(&at_type) {
            element.annotation_mut().apply_contain(contain);
        }
        self.annotations.append(element, overwrite)
    }

    pub fn add_document(&mut self, document: Document, overwrite: bool) -> MmifResult<()> {
        self.add_annotation(Element::Document(document), overwrite)
    }

    /// Declares `at_type` in `contains`, merging in shared metadata.
    ///
    /// Existing annotations of the type see the new metadata immediately.
    /// Later changes go through another call.
    pub fn new_contain(&mut self, at_type: AtType, metadata: Properties) -> MmifResult<()> {
        self.check_no_error()?;
        let contain = self.metadata.contains.entry(at_type.clone());
        contain.extend_from(&metadata);
        let contain = contain.clone();
        for element in self.annotations.iter_mut() {
            if *element.at_type() == at_type {
                element.annotation_mut().apply_contain(&contain);
            }
        }
        Ok(())
    }

    fn check_no_error(&self) -> MmifResult<()> {
        if self.has_error() {
            return Err(MmifError::ViewHasError { view: self.id.clone() });
        }
        Ok(())
    }

    /// Annotations of a type (fuzzy) whose properties match every filter.
    ///
    /// A filter matches when the annotation's own property or the view-level
    /// metadata for its type holds the expected value. The iterator is lazy;
    /// call again to restart.
    pub fn get_annotations<'a>(
        &'a self,
        at_type: Option<&AtType>,
        filters: &[(&str, Value)],
    ) -> impl Iterator<Item = &'a Element> + use<'a> {
        let at_type = at_type.cloned();
        let filters: Vec<(String, Value)> = filters
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .collect();
        self.annotations.iter().filter(move |element| {
            if let Some(wanted) = &at_type {
                if !element.at_type().matches(wanted, true) {
                    return false;
                }
            }
            filters.iter().all(|(name, expected)| {
                element.own_property(name).as_ref() == Some(expected)
                    || self
                        .metadata
                        .contains
                        .get(element.at_type())
                        .and_then(|c| c.get(name))
                        == Some(expected)
            })
        })
    }

    /// Looks up an annotation by local or qualified id.
    pub fn get_annotation_by_id(&self, id: &str) -> MmifResult<&Element> {
        let id = self.qualify_id(id)?;
        self.annotations
            .get(&id)
            .ok_or_else(|| MmifError::not_found(id))
    }

    pub fn get_annotation_mut(&mut self, id: &str) -> MmifResult<&mut Element> {
        let id = self.qualify_id(id)?;
        self.annotations
            .get_mut(&id)
            .ok_or_else(|| MmifError::not_found(id))
    }

    pub fn get_documents(&self) -> impl Iterator<Item = &Document> {
        self.annotations.iter().filter_map(Element::as_document)
    }

    pub fn get_document_by_id(&self, id: &str) -> MmifResult<&Document> {
        self.get_annotation_by_id(id)?
            .as_document()
            .ok_or_else(|| MmifError::not_found(id))
    }

    pub fn get_document_mut(&mut self, id: &str) -> MmifResult<&mut Document> {
        self.get_annotation_mut(id)?
            .as_document_mut()
            .ok_or_else(|| MmifError::not_found(id))
    }

    /// Marks the view as failed; annotations and `contains` are dropped.
    pub fn set_error(&mut self, message: impl Into<String>, stack_trace: impl Into<String>) {
        let stack_trace = stack_trace.into();
        self.metadata.error = Some(ErrorRecord {
            message: message.into(),
            stack_trace: (!stack_trace.is_empty()).then_some(stack_trace),
        });
        self.metadata.contains.clear();
        self.annotations.clear();
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.metadata.warnings.push(warning.into());
    }

    pub fn add_parameter(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.metadata.parameters.insert(name, value.into());
    }

    pub fn add_parameters<I, K, V>(&mut self, parameters: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (k, v) in parameters {
            self.add_parameter(k, v);
        }
    }

    pub fn get_parameter(&self, name: &str) -> MmifResult<&Value> {
        self.metadata
            .parameters
            .get(name)
            .ok_or_else(|| MmifError::KeyNotFound {
                record: format!("parameters of view {}", self.id),
                key: name.to_string(),
            })
    }

    /// Whether `reference`, written inside this view, points at `target`.
    pub(crate) fn reference_matches(&self, reference: &str, target: &str) -> bool {
        reference == target
            || (!reference.contains(ID_DELIMITER)
                && target
                    .strip_prefix(self.id.as_str())
                    .and_then(|rest| rest.strip_prefix(ID_DELIMITER))
                    == Some(reference))
    }

    /// Canonical id for a reference written inside this view.
    ///
    /// Bare references that name one of this view's annotations are
    /// qualified; anything else is returned unchanged.
    pub(crate) fn canonical_reference(&self, reference: &str) -> String {
        if !reference.contains(ID_DELIMITER) {
            let qualified = format!("{}{ID_DELIMITER}{reference}", self.id);
            if self.annotations.contains_key(&qualified) {
                return qualified;
            }
        }
        reference.to_string()
    }

    /// Whether anything in this view points at `document_id`.
    pub fn references_document(&self, document_id: &str) -> bool {
        let points_at = |value: &Value| {
            value
                .as_str()
                .is_some_and(|r| self.reference_matches(r, document_id))
        };
        self.metadata
            .document
            .as_deref()
            .is_some_and(|r| self.reference_matches(r, document_id))
            || self
                .metadata
                .contains
                .iter()
                .any(|(_, c)| c.get("document").is_some_and(points_at))
            || self.annotations.iter().any(|el| {
                el.annotation()
                    .properties()
                    .get("document")
                    .is_some_and(points_at)
            })
    }

    pub(crate) fn annotations_mut(&mut self) -> &mut KeyedList<Element> {
        &mut self.annotations
    }

    /// Wire form.
    #[must_use]
    pub fn to_value(&self) -> Value {
        WireObject::new()
            .required("id", Value::String(self.id.clone()))
            .required("metadata", self.metadata.to_value())
            .required(
                "annotations",
                Value::Array(self.annotations.iter().map(Element::to_value).collect()),
            )
            .build()
    }

    pub(crate) fn from_value(value: Value, path: &str) -> MmifResult<Self> {
        let mut fields = Fields::new("View", path, value)?;
        let id = fields.required_str("id")?;
        let metadata_path = fields.child_path("metadata");
        let metadata = ViewMetadata::from_value(fields.required("metadata")?, &metadata_path)?;
        let annotations_path = fields.child_path("annotations");
        let items = fields.required_array("annotations")?;
        fields.deny_open()?;

        let mut view = Self::new(id);
        view.metadata = metadata;
        for (i, item) in items.into_iter().enumerate() {
            let mut element = Element::from_value(item, &format!("{annotations_path}/{i}"))?;
            let qualified = view.qualify_id(element.id())?;
            element.annotation_mut().set_id(qualified);
            if let Some(contain) = view.metadata.contains.get(element.at_type()) {
                element.annotation_mut().apply_contain(contain);
            }
            view.annotations.append(element, false)?;
        }
        Ok(view)
    }
}

impl PartialEq for View {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.metadata == other.metadata && self.annotations == other.annotations
    }
}

impl Keyed for View {
    fn key(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::{BOUNDING_BOX, TIME_FRAME, TIME_POINT};
    use serde_json::json;

    fn view() -> View {
        let mut view = View::new("v1");
        view.set_app("http://apps.clams.ai/test/v1");
        view
    }

    #[test]
    fn autogenerated_ids_are_qualified_and_counted_per_prefix() {
        let mut v = view();
        let a = v.new_annotation(TIME_FRAME, None, Properties::new()).unwrap().id().to_string();
        let b = v.new_annotation(TIME_FRAME, None, Properties::new()).unwrap().id().to_string();
        let c = v.new_annotation(TIME_POINT, None, Properties::new()).unwrap().id().to_string();
        assert_eq!(a, "v1:tf_1");
        assert_eq!(b, "v1:tf_2");
        assert_eq!(c, "v1:tp_1");
    }

    #[test]
    fn autogeneration_skips_taken_ids() {
        let mut v = view();
        v.new_annotation(TIME_FRAME, Some("tf_1"), Properties::new()).unwrap();
        let next = v.new_annotation(TIME_FRAME, None, Properties::new()).unwrap();
        assert_eq!(next.id(), "v1:tf_2");
    }

    #[test]
    fn explicit_ids_are_checked() {
        let mut v = view();
        assert_eq!(
            v.new_annotation(TIME_POINT, Some("v1:tp_9"), Properties::new()).unwrap().id(),
            "v1:tp_9"
        );
        let err = v.new_annotation(TIME_POINT, Some("v2:tp_1"), Properties::new()).unwrap_err();
        assert!(matches!(err, MmifError::InvalidIdentifier { .. }));
        let err = v.new_annotation(TIME_POINT, Some("tp_9"), Properties::new()).unwrap_err();
        assert!(matches!(err, MmifError::DuplicateKey { .. }));
    }

    #[test]
    fn adding_declares_type_in_contains() {
        let mut v = view();
        assert!(v.metadata().contains.is_empty());
        v.new_annotation(BOUNDING_BOX, None, Properties::new()).unwrap();
        assert!(v.metadata().contains.contains(&BOUNDING_BOX));
        assert!(v.metadata().contains.get(&BOUNDING_BOX).unwrap().is_empty());
    }

    #[test]
    fn contains_metadata_reaches_annotations() {
        let mut v = view();
        v.new_contain(TIME_FRAME, Properties::new().with("timeUnit", "milliseconds")).unwrap();
        let tf = v.new_annotation(TIME_FRAME, None, Properties::new()).unwrap();
        assert_eq!(tf.get_property("timeUnit").unwrap(), json!("milliseconds"));

        v.new_contain(TIME_FRAME, Properties::new().with("document", "m1")).unwrap();
        let tf = v.get_annotation_by_id("tf_1").unwrap();
        assert_eq!(tf.get_property("document").unwrap(), json!("m1"));
    }

    #[test]
    fn get_annotations_filters_on_instance_or_view_metadata() {
        let mut v = view();
        v.new_contain(TIME_FRAME, Properties::new().with("document", "m1")).unwrap();
        v.new_annotation(TIME_FRAME, None, Properties::new().with("label", "bars")).unwrap();
        v.new_annotation(TIME_FRAME, None, Properties::new().with("label", "slate")).unwrap();
        v.new_annotation(TIME_POINT, None, Properties::new().with("label", "bars")).unwrap();

        assert_eq!(v.get_annotations(None, &[]).count(), 3);
        assert_eq!(v.get_annotations(Some(&TIME_FRAME), &[]).count(), 2);

        let filters = [("label", json!("bars"))];
        let ids: Vec<_> = v.get_annotations(None, &filters).map(Element::id).collect();
        assert_eq!(ids, vec!["v1:tf_1", "v1:tp_1"]);

        let filters = [("document", json!("m1")), ("label", json!("slate"))];
        let ids: Vec<_> = v.get_annotations(Some(&TIME_FRAME), &filters).map(Element::id).collect();
        assert_eq!(ids, vec!["v1:tf_2"]);

        // restartable
        let it = v.get_annotations(Some(&TIME_FRAME), &[]);
        assert_eq!(it.count(), 2);
        assert_eq!(v.get_annotations(Some(&TIME_FRAME), &[]).count(), 2);
    }

    #[test]
    fn get_annotations_type_filter_is_fuzzy() {
        let mut v = view();
        v.new_annotation(AtType::clams("TimeFrame", 4), None, Properties::new()).unwrap();
        assert_eq!(v.get_annotations(Some(&TIME_FRAME), &[]).count(), 1);
    }

    #[test]
    fn text_documents() {
        let mut v = view();
        let td = v
            .new_textdocument("hello", Some("en"), None, Properties::new().with("origin", "asr"))
            .unwrap();
        assert_eq!(td.id(), "v1:td_1");
        assert_eq!(td.text_value(), Some("hello"));
        assert_eq!(td.annotation().properties().get("origin"), Some(&json!("asr")));
        assert_eq!(v.get_documents().count(), 1);
        assert!(v.get_document_by_id("td_1").is_ok());
    }

    #[test]
    fn error_and_content_are_exclusive() {
        let mut v = view();
        v.new_annotation(TIME_FRAME, None, Properties::new()).unwrap();
        v.set_error("boom", "at line 3");
        assert!(v.has_error());
        assert!(v.is_empty());
        assert!(v.metadata().contains.is_empty());
        let value = v.to_value();
        assert!(value["metadata"].get("contains").is_none());
        assert_eq!(
            value["metadata"]["error"],
            json!({"message": "boom", "stackTrace": "at line 3"})
        );
    }

    #[test]
    fn errored_view_takes_no_content() {
        let mut v = view();
        v.set_error("boom", "");
        let err = v.new_annotation(TIME_FRAME, None, Properties::new()).unwrap_err();
        assert!(matches!(err, MmifError::ViewHasError { .. }));
        let tp = Annotation::new(TIME_POINT, "tp_1");
        assert!(v.add_annotation(tp.into(), false).is_err());
        assert!(v.new_textdocument("x", None, None, Properties::new()).is_err());
        assert!(v.new_contain(TIME_FRAME, Properties::new()).is_err());

        assert!(v.is_empty());
        let value = v.to_value();
        assert_eq!(value["annotations"], json!([]));
        assert!(value["metadata"].get("contains").is_none());
    }

    #[test]
    fn empty_contains_is_emitted_without_error_or_warnings() {
        let v = view();
        assert_eq!(v.to_value()["metadata"]["contains"], json!({}));

        let mut warned = view();
        warned.add_warning("UserWarning: low confidence");
        let value = warned.to_value();
        assert!(value["metadata"].get("contains").is_none());
        assert_eq!(value["metadata"]["warnings"], json!(["UserWarning: low confidence"]));
    }

    #[test]
    fn parameters() {
        let mut v = view();
        v.add_parameters([("threshold", "0.5"), ("model", "large")]);
        assert_eq!(v.get_parameter("threshold").unwrap(), &json!("0.5"));
        assert!(matches!(
            v.get_parameter("missing"),
            Err(MmifError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn metadata_record_routing() {
        let mut meta = ViewMetadata::default();
        meta.set_field("app", json!("http://apps/x")).unwrap();
        meta.set_field("custom", json!(1)).unwrap();
        assert_eq!(meta.get_field("custom").unwrap(), json!(1));
        assert!(meta.get_field("timestamp").is_err());
        assert_eq!(meta.get_field("app").unwrap(), json!("http://apps/x"));
        assert_eq!(meta.additional.get("custom"), Some(&json!(1)));

        let mut error = ErrorRecord::default();
        assert!(matches!(
            error.set_field("code", json!(1)),
            Err(MmifError::AdditionalPropertiesDisallowed { .. })
        ));
    }

    #[test]
    fn loaded_ids_are_qualified() {
        let value = wire::to_memory(json!({
            "id": "v1",
            "metadata": {"app": "http://apps/x", "contains": {
                TIME_POINT.to_string(): {"timeUnit": "frames"}
            }},
            "annotations": [{
                "@type": TIME_POINT.to_string(),
                "properties": {"id": "tp_1", "timePoint": 3}
            }]
        }));
        let v = View::from_value(value, "/views/0").unwrap();
        let tp = v.get_annotation_by_id("tp_1").unwrap();
        assert_eq!(tp.id(), "v1:tp_1");
        assert_eq!(tp.get_property("timeUnit").unwrap(), json!("frames"));
        assert_eq!(v.to_value()["annotations"][0]["properties"]["id"], "v1:tp_1");
    }

    #[test]
    fn document_references() {
        let mut v = view();
        v.new_annotation(TIME_FRAME, None, Properties::new().with("document", "m1")).unwrap();
        v.new_textdocument("x", None, Some("td_1"), Properties::new()).unwrap();
        assert!(v.references_document("m1"));
        assert!(!v.references_document("m2"));
        assert!(v.reference_matches("td_1", "v1:td_1"));
        assert_eq!(v.canonical_reference("td_1"), "v1:td_1");
        assert_eq!(v.canonical_reference("m1"), "m1");
    }
}
