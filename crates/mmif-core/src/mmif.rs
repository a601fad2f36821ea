//! The MMIF container: top-level documents plus an ordered list of views.
//!
//! Besides storage, the container owns everything that needs a view of the
//! whole graph:
//!
//! - id resolution ([`Mmif::get`]), where top-level document ids and view
//!   ids share one namespace and annotation ids are `view:local`,
//! - the alignment cache held on each annotation, rebuilt whenever a view
//!   is handed out mutably (see [`ViewMut`]),
//! - anchor resolution of time-based annotations,
//! - capital annotations, which carry document properties added after a
//!   document was embedded (see [`Mmif::generate_capital_annotations`]).

use std::ops::{Deref, DerefMut};
use std::str::FromStr;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::annotation::{Annotation, Document, Element, ID_DELIMITER};
use crate::collections::{KeyedList, contain_value};
use crate::config::MmifConfig;
use crate::error::{MmifError, MmifResult};
use crate::record::{Fields, Properties, Record, string_field};
use crate::schema::{SchemaValidator, StructuralValidator};
use crate::view::View;
use crate::vocabulary::{ALIGNMENT, ANNOTATION, AtType};
use crate::wire::{self, WireObject};

/// Spec version written into new files.
pub const SPEC_VERSION: &str = "1.0.4";

/// Names that [`Mmif::get`] resolves to top-level members.
const TOP_LEVEL_NAMES: [&str; 3] = ["metadata", "documents", "views"];

// ============================================================================
// Metadata
// ============================================================================

/// Top-level metadata. `mmif` is the spec URI; anything else is kept as is.
#[derive(Debug, Clone, PartialEq)]
pub struct MmifMetadata {
    pub mmif: String,
    pub additional: Properties,
}

impl Default for MmifMetadata {
    fn default() -> Self {
        Self {
            mmif: format!("http://mmif.clams.ai/{SPEC_VERSION}"),
            additional: Properties::new(),
        }
    }
}

impl MmifMetadata {
    /// Version part of the spec URI.
    pub fn spec_version(&self) -> &str {
        self.mmif.trim_end_matches('/').rsplit('/').next().unwrap_or_default()
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        WireObject::new()
            .required("mmif", Value::String(self.mmif.clone()))
            .open(self.additional.iter())
            .build()
    }

    fn from_value(value: Value, path: &str) -> MmifResult<Self> {
        let mut fields = Fields::new("MmifMetadata", path, value)?;
        let mmif = fields.required_str("mmif")?;
        Ok(Self {
            mmif,
            additional: fields.into_open(),
        })
    }
}

impl Record for MmifMetadata {
    fn record_name(&self) -> &'static str {
        "MmifMetadata"
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["mmif"]
    }

    fn named_field(&self, name: &str) -> Option<Value> {
        (name == "mmif").then(|| Value::String(self.mmif.clone()))
    }

    fn set_named_field(&mut self, name: &str, value: Value) -> Option<MmifResult<()>> {
        (name == "mmif").then(|| string_field(name, value).map(|v| self.mmif = v.unwrap_or_default()))
    }

    fn open_fields(&self) -> Option<&Properties> {
        Some(&self.additional)
    }

    fn open_fields_mut(&mut self) -> Option<&mut Properties> {
        Some(&mut self.additional)
    }
}

// ============================================================================
// Lookup results and options
// ============================================================================

/// What an id resolved to.
#[derive(Debug, Clone, Copy)]
pub enum Resolved<'a> {
    Metadata(&'a MmifMetadata),
    Documents(&'a KeyedList<Document>),
    Views(&'a KeyedList<View>),
    Document(&'a Document),
    View(&'a View),
    Element(&'a Element),
}

/// Which end of an annotation to anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorEdge {
    Start,
    End,
}

/// Output switches for [`Mmif::serialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Indent the JSON output.
    pub pretty: bool,
    /// Drop unused `contains` entries and re-validate before writing.
    pub sanitize: bool,
    /// Turn pending document properties into capital annotations first.
    pub autogenerate_capital_annotations: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            pretty: false,
            sanitize: false,
            autogenerate_capital_annotations: true,
        }
    }
}

impl SerializeOptions {
    #[must_use]
    pub fn from_config(config: &MmifConfig) -> Self {
        Self {
            autogenerate_capital_annotations: config.autogenerate_capital_annotations,
            ..Self::default()
        }
    }
}

/// A capital annotation update planned for one document.
struct CapitalPlan {
    document_id: String,
    owner_view: Option<String>,
    pending_keys: Vec<String>,
    new_pairs: Properties,
}

// ============================================================================
// Mmif
// ============================================================================

/// An MMIF file.
#[derive(Debug, Clone, Default)]
pub struct Mmif {
    metadata: MmifMetadata,
    documents: KeyedList<Document>,
    views: KeyedList<View>,
    config: MmifConfig,
}

impl Mmif {
    /// An empty file for the current spec version.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: MmifConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Parses and builds a file with the default configuration.
    pub fn from_json(json: &str) -> MmifResult<Self> {
        Self::from_json_with(json, MmifConfig::default())
    }

    /// Parses and builds a file, validating first when `config.validate` is set.
    pub fn from_json_with(json: &str, config: MmifConfig) -> MmifResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        let validator = config.validate.then_some(&StructuralValidator as &dyn SchemaValidator);
        Self::from_value(value, config, validator)
    }

    /// Builds a file from its wire form.
    ///
    /// The payload is validated before anything is built, and any later
    /// failure discards the partial result.
    pub fn from_value(
        value: Value,
        config: MmifConfig,
        validator: Option<&dyn SchemaValidator>,
    ) -> MmifResult<Self> {
        if let Some(validator) = validator {
            validator.validate(&value)?;
        }
        let mut fields = Fields::new("Mmif", "", wire::to_memory(value))?;
        let metadata = MmifMetadata::from_value(fields.required("metadata")?, "/metadata")?;
        let documents = fields.required_array("documents")?;
        let views = fields.required_array("views")?;
        fields.deny_open()?;

        let mut mmif = Self {
            metadata,
            config,
            ..Self::default()
        };
        for (i, item) in documents.into_iter().enumerate() {
            mmif.add_document(Document::from_value(item, &format!("/documents/{i}"))?, false)?;
        }
        for (i, item) in views.into_iter().enumerate() {
            mmif.insert_view(View::from_value(item, &format!("/views/{i}"))?, false)?;
        }
        mmif.apply_capital_properties();
        mmif.refresh_alignment_cache();
        Ok(mmif)
    }

    pub fn config(&self) -> &MmifConfig {
        &self.config
    }

    pub fn metadata(&self) -> &MmifMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut MmifMetadata {
        &mut self.metadata
    }

    pub fn documents(&self) -> &KeyedList<Document> {
        &self.documents
    }

    pub fn views(&self) -> &KeyedList<View> {
        &self.views
    }

    // ------------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------------

    /// Adds a top-level document.
    pub fn add_document(&mut self, document: Document, overwrite: bool) -> MmifResult<()> {
        check_top_level_id(document.id())?;
        if self.views.contains_key(document.id()) {
            return Err(MmifError::Ambiguous {
                id: document.id().to_string(),
            });
        }
        self.documents.append(document, overwrite)
    }

    /// Adds a view and caches the alignments it holds.
    pub fn add_view(&mut self, view: View, overwrite: bool) -> MmifResult<()> {
        let id = view.id().to_string();
        self.insert_view(view, overwrite)?;
        let pairs = self
            .views
            .get(&id)
            .map(|v| self.alignment_pairs(v))
            .unwrap_or_default();
        self.cache_alignments(pairs);
        Ok(())
    }

    fn insert_view(&mut self, view: View, overwrite: bool) -> MmifResult<()> {
        check_top_level_id(view.id())?;
        if self.documents.contains_key(view.id()) {
            return Err(MmifError::Ambiguous {
                id: view.id().to_string(),
            });
        }
        self.views.append(view, overwrite)
    }

    /// Adds an annotation to a view, caching it if it is an alignment.
    pub fn add_annotation(&mut self, view_id: &str, element: Element, overwrite: bool) -> MmifResult<()> {
        let view = self
            .views
            .get_mut(view_id)
            .ok_or_else(|| MmifError::not_found(view_id))?;
        let id = view.qualify_id(element.id())?;
        view.add_annotation(element, overwrite)?;

        let pair = self
            .views
            .get(view_id)
            .and_then(|v| v.annotations().get(&id).map(|el| (v, el)))
            .and_then(|(v, el)| self.alignment_pair(v, el.annotation()));
        self.cache_alignments(pair.into_iter().collect());
        Ok(())
    }

    /// `v_<N>` with `N` starting at the view count, skipping taken ids.
    pub fn new_view_id(&self) -> String {
        let mut n = self.views.len();
        loop {
            let candidate = format!("v_{n}");
            if !self.views.contains_key(&candidate) && !self.documents.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Appends a new, timestamped view.
    pub fn new_view(&mut self) -> MmifResult<ViewMut<'_>> {
        let id = self.new_view_id();
        let mut view = View::new(id.clone());
        view.set_timestamp_now();
        self.add_view(view, false)?;
        debug!(view = %id, "created view");
        self.get_view_mut(&id)
    }

    /// Removes a view. Alignments pointing into it are dropped from the cache.
    pub fn remove_view(&mut self, id: &str) -> MmifResult<View> {
        let view = self.views.remove(id).ok_or_else(|| MmifError::not_found(id))?;
        self.refresh_alignment_cache();
        Ok(view)
    }

    // ------------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------------

    /// Resolves an id: top-level names, documents, views, then `view:local`.
    pub fn get(&self, id: &str) -> MmifResult<Resolved<'_>> {
        match id {
            "metadata" => return Ok(Resolved::Metadata(&self.metadata)),
            "documents" => return Ok(Resolved::Documents(&self.documents)),
            "views" => return Ok(Resolved::Views(&self.views)),
            _ => {}
        }
        let document = self.documents.get(id);
        let view = self.views.get(id);
        match (document, view) {
            (Some(_), Some(_)) => Err(MmifError::Ambiguous { id: id.to_string() }),
            (Some(d), None) => Ok(Resolved::Document(d)),
            (None, Some(v)) => Ok(Resolved::View(v)),
            (None, None) => self
                .element(id)
                .map(Resolved::Element)
                .ok_or_else(|| MmifError::not_found(id)),
        }
    }

    /// Like [`Mmif::get`], but never fails.
    pub fn find(&self, id: &str) -> Option<Resolved<'_>> {
        self.get(id).ok()
    }

    /// Canonical id of a reference made inside `context_view`.
    ///
    /// Qualified references must exist as given. Bare references name an
    /// annotation of the context view first, then a top-level document.
    pub fn resolve_reference(&self, reference: &str, context_view: Option<&str>) -> Option<String> {
        if reference.contains(ID_DELIMITER) {
            return self.element(reference).map(|_| reference.to_string());
        }
        if let Some(view) = context_view.and_then(|v| self.views.get(v)) {
            let canonical = view.canonical_reference(reference);
            if canonical != reference {
                return Some(canonical);
            }
        }
        self.documents
            .contains_key(reference)
            .then(|| reference.to_string())
    }

    fn element(&self, id: &str) -> Option<&Element> {
        let (view_id, _) = id.split_once(ID_DELIMITER)?;
        self.views.get(view_id)?.annotations().get(id)
    }

    /// Annotation part of a view element or top-level document.
    pub fn get_annotation(&self, id: &str) -> Option<&Annotation> {
        self.element(id)
            .map(Element::annotation)
            .or_else(|| self.documents.get(id).map(Document::annotation))
    }

    fn annotation_mut(&mut self, id: &str) -> Option<&mut Annotation> {
        match id.split_once(ID_DELIMITER) {
            Some((view_id, _)) => self
                .views
                .get_mut(view_id)?
                .annotations_mut()
                .get_mut(id)
                .map(Element::annotation_mut),
            None => self.documents.get_mut(id).map(Document::annotation_mut),
        }
    }

    fn document_mut(&mut self, id: &str) -> Option<&mut Document> {
        match id.split_once(ID_DELIMITER) {
            Some((view_id, _)) => self.views.get_mut(view_id)?.get_document_mut(id).ok(),
            None => self.documents.get_mut(id),
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// A top-level document, or a document inside a view for qualified ids.
    pub fn get_document_by_id(&self, id: &str) -> MmifResult<&Document> {
        let found = match id.split_once(ID_DELIMITER) {
            Some(_) => self.element(id).and_then(Element::as_document),
            None => self.documents.get(id),
        };
        found.ok_or_else(|| MmifError::not_found(id))
    }

    pub fn get_document_mut(&mut self, id: &str) -> MmifResult<&mut Document> {
        self.document_mut(id).ok_or_else(|| MmifError::not_found(id))
    }

    pub fn get_view_by_id(&self, id: &str) -> MmifResult<&View> {
        self.views.get(id).ok_or_else(|| MmifError::not_found(id))
    }

    /// Mutable access to a view, see [`ViewMut`].
    pub fn get_view_mut(&mut self, id: &str) -> MmifResult<ViewMut<'_>> {
        let index = self.views.index_of(id).ok_or_else(|| MmifError::not_found(id))?;
        Ok(ViewMut { mmif: self, index })
    }

    /// Top-level documents followed by documents held in views.
    pub fn all_documents(&self) -> impl Iterator<Item = &Document> {
        self.documents
            .iter()
            .chain(self.views.iter().flat_map(View::get_documents))
    }

    /// Documents of one view, or the top-level documents for `None`.
    pub fn get_documents_in_view(&self, view_id: Option<&str>) -> MmifResult<Vec<&Document>> {
        match view_id {
            None => Ok(self.documents.iter().collect()),
            Some(id) => Ok(self.get_view_by_id(id)?.get_documents().collect()),
        }
    }

    /// Documents created by views of `app`.
    pub fn get_documents_by_app(&self, app: &str) -> Vec<&Document> {
        self.views
            .iter()
            .filter(|v| v.app() == app)
            .flat_map(View::get_documents)
            .collect()
    }

    /// Documents whose property `name` reads `value`, from any tier.
    pub fn get_documents_by_property(&self, name: &str, value: &Value) -> Vec<&Document> {
        self.all_documents()
            .filter(|d| d.get_property(name).ok().as_ref() == Some(value))
            .collect()
    }

    /// Locations of every document of a type.
    pub fn get_documents_locations(&self, at_type: &AtType) -> Vec<&str> {
        self.all_documents()
            .filter(|d| self.type_matches(d.at_type(), at_type))
            .filter_map(Document::location)
            .collect()
    }

    /// Location of the first document of a type.
    pub fn get_document_location(&self, at_type: &AtType) -> Option<&str> {
        self.get_documents_locations(at_type).into_iter().next()
    }

    /// Views declaring every one of `types`.
    pub fn get_all_views_contain(&self, types: &[AtType]) -> Vec<&View> {
        self.views
            .iter()
            .filter(|v| types.iter().all(|t| self.view_contains(v, t)))
            .collect()
    }

    /// Views declaring at least one of `types`.
    pub fn get_views_contain(&self, types: &[AtType]) -> Vec<&View> {
        self.views
            .iter()
            .filter(|v| types.iter().any(|t| self.view_contains(v, t)))
            .collect()
    }

    /// The most recent view declaring `at_type`.
    pub fn get_view_contains(&self, at_type: &AtType) -> Option<&View> {
        self.views.iter().rev().find(|v| self.view_contains(v, at_type))
    }

    /// Views that hold or point at a document.
    pub fn get_views_for_document(&self, document_id: &str) -> Vec<&View> {
        self.views
            .iter()
            .filter(|v| v.references_document(document_id) || v.annotations().contains_key(document_id))
            .collect()
    }

    pub fn get_last_view(&self) -> Option<&View> {
        self.views.last()
    }

    /// The most recent view without an error and with annotations.
    pub fn get_last_contentful_view(&self) -> Option<&View> {
        self.views.iter().rev().find(|v| !v.has_error() && !v.is_empty())
    }

    pub fn get_views_with_error(&self) -> Vec<&View> {
        self.views.iter().filter(|v| v.has_error()).collect()
    }

    /// Alignments between annotations of two types, grouped by view id.
    ///
    /// Endpoint order does not matter.
    pub fn get_alignments(&self, type1: &AtType, type2: &AtType) -> IndexMap<String, Vec<&Annotation>> {
        let mut found: IndexMap<String, Vec<&Annotation>> = IndexMap::new();
        for view in &self.views {
            for element in view.annotations() {
                let alignment = element.annotation();
                if !self.type_matches(alignment.at_type(), &ALIGNMENT) {
                    continue;
                }
                let Some((_, source, target)) = self.alignment_pair(view, alignment) else {
                    continue;
                };
                let endpoint_type = |id: &str| self.get_annotation(id).map(Annotation::at_type);
                let (Some(s), Some(t)) = (endpoint_type(&source), endpoint_type(&target)) else {
                    continue;
                };
                let forward = self.type_matches(s, type1) && self.type_matches(t, type2);
                let backward = self.type_matches(s, type2) && self.type_matches(t, type1);
                if forward || backward {
                    found.entry(view.id().to_string()).or_default().push(alignment);
                }
            }
        }
        found
    }

    fn type_matches(&self, actual: &AtType, wanted: &AtType) -> bool {
        actual.matches(wanted, self.config.fuzzy_types)
    }

    fn view_contains(&self, view: &View, at_type: &AtType) -> bool {
        view.metadata()
            .contains
            .keys()
            .any(|k| self.type_matches(k, at_type))
    }

    // ------------------------------------------------------------------------
    // Alignments
    // ------------------------------------------------------------------------

    /// Rebuilds the alignment cache of every annotation from scratch.
    pub fn refresh_alignment_cache(&mut self) {
        for document in self.documents.iter_mut() {
            document.annotation_mut().clear_alignments();
        }
        for view in self.views.iter_mut() {
            for element in view.annotations_mut().iter_mut() {
                element.annotation_mut().clear_alignments();
            }
        }
        let pairs: Vec<_> = self
            .views
            .iter()
            .flat_map(|v| self.alignment_pairs(v))
            .collect();
        self.cache_alignments(pairs);
    }

    fn alignment_pairs(&self, view: &View) -> Vec<(String, String, String)> {
        view.annotations()
            .iter()
            .filter_map(|el| self.alignment_pair(view, el.annotation()))
            .collect()
    }

    /// `(alignment, source, target)` with both endpoints resolved.
    fn alignment_pair(&self, view: &View, alignment: &Annotation) -> Option<(String, String, String)> {
        if !alignment.at_type().same_kind(&ALIGNMENT) {
            return None;
        }
        let endpoint = |name: &str| {
            let reference = alignment.properties().get(name).and_then(Value::as_str);
            let resolved = reference.and_then(|r| self.resolve_reference(r, Some(view.id())));
            if resolved.is_none() {
                warn!(
                    alignment = %alignment.id(),
                    endpoint = name,
                    reference = reference.unwrap_or_default(),
                    "alignment endpoint does not resolve, not cached"
                );
            }
            resolved
        };
        let source = endpoint("source")?;
        let target = endpoint("target")?;
        Some((alignment.id().to_string(), source, target))
    }

    fn cache_alignments(&mut self, pairs: Vec<(String, String, String)>) {
        for (alignment, source, target) in pairs {
            if let Some(a) = self.annotation_mut(&source) {
                a.cache_alignment(&alignment, &target);
            }
            if let Some(a) = self.annotation_mut(&target) {
                a.cache_alignment(&alignment, &source);
            }
        }
    }

    /// The annotation paired with `annotation_id` through `alignment_id`.
    pub fn aligned_to_by(&self, annotation_id: &str, alignment_id: &str) -> Option<&Annotation> {
        let paired = self.get_annotation(annotation_id)?.aligned_to_by(alignment_id)?;
        self.get_annotation(paired)
    }

    /// Every annotation aligned with `annotation_id`, in cache order.
    pub fn get_aligned(&self, annotation_id: &str) -> Vec<&Annotation> {
        let Some(annotation) = self.get_annotation(annotation_id) else {
            return Vec::new();
        };
        annotation
            .iter_all_aligned()
            .skip(1)
            .step_by(2)
            .filter_map(|id| self.get_annotation(id))
            .collect()
    }

    // ------------------------------------------------------------------------
    // Anchors
    // ------------------------------------------------------------------------

    /// Start point of a time-based annotation.
    pub fn anchor_start(&self, id: &str) -> MmifResult<f64> {
        self.anchor_point(id, AnchorEdge::Start, false)
    }

    /// End point of a time-based annotation.
    pub fn anchor_end(&self, id: &str) -> MmifResult<f64> {
        self.anchor_point(id, AnchorEdge::End, false)
    }

    /// Same as [`Mmif::anchor_start`], optionally trusting `targets` order.
    pub fn get_start(&self, id: &str, targets_sorted: bool) -> MmifResult<f64> {
        self.anchor_point(id, AnchorEdge::Start, targets_sorted)
    }

    /// Same as [`Mmif::anchor_end`], optionally trusting `targets` order.
    pub fn get_end(&self, id: &str, targets_sorted: bool) -> MmifResult<f64> {
        self.anchor_point(id, AnchorEdge::End, targets_sorted)
    }

    /// Resolves an anchor from `timePoint`, then `targets`, then `start`/`end`.
    ///
    /// Over `targets` the start is the minimum and the end the maximum of
    /// the targets' own anchors. With `targets_sorted` only the first (or
    /// last) target is read.
    pub fn anchor_point(&self, id: &str, edge: AnchorEdge, targets_sorted: bool) -> MmifResult<f64> {
        let mut path = Vec::new();
        self.resolve_anchor(id, None, edge, targets_sorted, &mut path)
    }

    fn resolve_anchor(
        &self,
        reference: &str,
        context_view: Option<&str>,
        edge: AnchorEdge,
        targets_sorted: bool,
        path: &mut Vec<String>,
    ) -> MmifResult<f64> {
        let id = self
            .resolve_reference(reference, context_view)
            .ok_or_else(|| MmifError::not_found(reference))?;
        if path.contains(&id) {
            return Err(MmifError::AnchorCycle { id });
        }
        let annotation = self.get_annotation(&id).ok_or_else(|| MmifError::not_found(&id))?;
        annotation.check_anchor()?;

        if let Ok(point) = annotation.get_property("timePoint") {
            return number("timePoint", &point);
        }

        if let Some(targets) = annotation.properties().get("targets") {
            let targets: Vec<&str> = targets
                .as_array()
                .map(|items| items.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            let chosen: Vec<&str> = match (targets_sorted, edge) {
                (true, AnchorEdge::Start) => targets.first().copied().into_iter().collect(),
                (true, AnchorEdge::End) => targets.last().copied().into_iter().collect(),
                (false, _) => targets,
            };
            if chosen.is_empty() {
                return Err(MmifError::MissingAnchor { id });
            }

            path.push(id);
            let context = annotation.parent();
            let mut points = Vec::with_capacity(chosen.len());
            for target in chosen {
                points.push(self.resolve_anchor(target, context, edge, targets_sorted, path)?);
            }
            path.pop();

            let point = match edge {
                AnchorEdge::Start => points.into_iter().fold(f64::INFINITY, f64::min),
                AnchorEdge::End => points.into_iter().fold(f64::NEG_INFINITY, f64::max),
            };
            return Ok(point);
        }

        let name = match edge {
            AnchorEdge::Start => "start",
            AnchorEdge::End => "end",
        };
        match annotation.get_property(name) {
            Ok(value) => number(name, &value),
            Err(_) => Err(MmifError::MissingAnchor { id }),
        }
    }

    // ------------------------------------------------------------------------
    // Capital annotations
    // ------------------------------------------------------------------------

    /// Records pending document properties as capital annotations.
    ///
    /// The target is the last view without an error, whose app is taken
    /// as the running app. Only pairs not already recorded with the same
    /// value are written. Documents created in the target view receive them
    /// as original properties; any other document gets them through an
    /// `Annotation` in the most recent view of the running app that refers
    /// to it (or the target view). Pending values are moved to the ephemeral
    /// tier afterwards, so a second run does nothing.
    pub fn generate_capital_annotations(&mut self) -> MmifResult<()> {
        let Some((target_view, current_app)) = self
            .views
            .iter()
            .rev()
            .find(|v| !v.has_error())
            .map(|v| (v.id().to_string(), v.app().to_string()))
        else {
            return Ok(());
        };

        let recorded = self.recorded_document_properties();
        let plans: Vec<CapitalPlan> = self
            .documents
            .iter()
            .map(|d| (None, d))
            .chain(
                self.views
                    .iter()
                    .flat_map(|v| v.get_documents().map(move |d| (Some(v.id().to_string()), d))),
            )
            .filter(|(_, d)| !d.pending().is_empty())
            .map(|(owner_view, d)| {
                let known = recorded.get(d.id());
                let new_pairs = d
                    .pending()
                    .iter()
                    .filter(|(k, v)| known.and_then(|p| p.get(k)) != Some(*v))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                CapitalPlan {
                    document_id: d.id().to_string(),
                    owner_view,
                    pending_keys: d.pending().keys().cloned().collect(),
                    new_pairs,
                }
            })
            .collect();

        for plan in plans {
            if !plan.new_pairs.is_empty() {
                if plan.owner_view.as_deref() == Some(target_view.as_str()) {
                    let keys: Vec<String> = plan.new_pairs.keys().cloned().collect();
                    if let Some(doc) = self.document_mut(&plan.document_id) {
                        doc.promote_pending(&keys);
                    }
                    debug!(document = %plan.document_id, properties = ?keys, "promoted pending properties");
                } else {
                    let view_id = self
                        .views
                        .iter()
                        .rev()
                        .find(|v| v.app() == current_app && !v.has_error() && v.references_document(&plan.document_id))
                        .map_or_else(|| target_view.clone(), |v| v.id().to_string());
                    self.write_capital_annotation(&view_id, &plan.document_id, plan.new_pairs)?;
                }
            }
            if let Some(doc) = self.document_mut(&plan.document_id) {
                doc.record_pending(&plan.pending_keys);
            }
        }
        Ok(())
    }

    fn write_capital_annotation(&mut self, view_id: &str, document_id: &str, pairs: Properties) -> MmifResult<()> {
        let view = self.get_view_by_id(view_id)?;
        let existing = view
            .annotations()
            .iter()
            .filter(|el| !el.is_document() && el.at_type().same_kind(&ANNOTATION))
            .find(|el| self.capital_document(view, el.annotation()).as_deref() == Some(document_id))
            .map(|el| el.id().to_string());
        let implied = contain_value(&view.metadata().contains, &ANNOTATION, "document")
            .and_then(Value::as_str)
            .is_some_and(|r| view.reference_matches(r, document_id));

        let view = self
            .views
            .get_mut(view_id)
            .ok_or_else(|| MmifError::not_found(view_id))?;
        match existing {
            Some(id) => {
                let element = view.get_annotation_mut(&id)?;
                for (name, value) in pairs {
                    element.add_property(&name, value)?;
                }
                debug!(view = %view_id, annotation = %id, document = %document_id, "updated capital annotation");
            }
            None => {
                let mut properties = Properties::new();
                if !implied {
                    properties.insert("document", Value::String(document_id.to_string()));
                }
                properties.extend_from(&pairs);
                let annotation = view.new_annotation(ANNOTATION, None, properties)?;
                debug!(view = %view_id, annotation = %annotation.id(), document = %document_id, "created capital annotation");
            }
        }
        Ok(())
    }

    /// Document a capital annotation speaks about, resolved.
    fn capital_document(&self, view: &View, annotation: &Annotation) -> Option<String> {
        let reference = annotation
            .properties()
            .get("document")
            .or_else(|| contain_value(&view.metadata().contains, annotation.at_type(), "document"))?
            .as_str()?;
        self.resolve_reference(reference, Some(view.id()))
    }

    /// Properties recorded per document by capital annotations, later views winning.
    fn recorded_document_properties(&self) -> IndexMap<String, Properties> {
        let mut recorded: IndexMap<String, Properties> = IndexMap::new();
        for view in &self.views {
            for element in view.annotations() {
                let Element::Annotation(annotation) = element else {
                    continue;
                };
                if !annotation.at_type().same_kind(&ANNOTATION) {
                    continue;
                }
                let Some(document_id) = self.capital_document(view, annotation) else {
                    continue;
                };
                let properties = recorded.entry(document_id).or_default();
                for (name, value) in annotation.properties() {
                    if name != "document" {
                        properties.insert(name.clone(), value.clone());
                    }
                }
            }
        }
        recorded
    }

    /// Fills each document's ephemeral tier from capital annotations.
    fn apply_capital_properties(&mut self) {
        let recorded = self.recorded_document_properties();
        for document in self.documents.iter_mut() {
            document.clear_ephemeral();
        }
        for view in self.views.iter_mut() {
            for element in view.annotations_mut().iter_mut() {
                if let Some(document) = element.as_document_mut() {
                    document.clear_ephemeral();
                }
            }
        }
        for (document_id, properties) in &recorded {
            if let Some(document) = self.document_mut(document_id) {
                document.add_ephemeral(properties);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------------

    /// Drops `contains` entries no annotation uses, then validates.
    pub fn sanitize(&mut self) -> MmifResult<()> {
        for view in self.views.iter_mut() {
            let used: Vec<AtType> = view.annotations().iter().map(|el| el.at_type().clone()).collect();
            view.metadata_mut()
                .contains
                .retain(|at_type, _| used.iter().any(|u| u == at_type));
        }
        if self.config.validate {
            self.validate()?;
        }
        Ok(())
    }

    /// Runs the structural validator over the current wire form.
    pub fn validate(&self) -> MmifResult<()> {
        StructuralValidator.validate(&self.to_value())?;
        Ok(())
    }

    /// Serializes to a JSON string.
    pub fn serialize(&mut self, options: SerializeOptions) -> MmifResult<String> {
        if options.autogenerate_capital_annotations {
            self.generate_capital_annotations()?;
        }
        if options.sanitize {
            self.sanitize()?;
        }
        let value = self.to_value();
        let json = if options.pretty {
            serde_json::to_string_pretty(&value)?
        } else {
            serde_json::to_string(&value)?
        };
        Ok(json)
    }

    /// Wire form as it stands, without capital annotation generation.
    #[must_use]
    pub fn to_value(&self) -> Value {
        WireObject::new()
            .required("metadata", self.metadata.to_value())
            .required(
                "documents",
                Value::Array(self.documents.iter().map(Document::to_value).collect()),
            )
            .required(
                "views",
                Value::Array(self.views.iter().map(View::to_value).collect()),
            )
            .build()
    }
}

// ============================================================================
// Mutable view access
// ============================================================================

/// A view borrowed mutably from its [`Mmif`].
///
/// Alignments added through it, or annotations that complete an alignment
/// held in another view, reach the alignment cache when the guard drops.
#[derive(Debug)]
pub struct ViewMut<'a> {
    mmif: &'a mut Mmif,
    index: usize,
}

impl Deref for ViewMut<'_> {
    type Target = View;

    fn deref(&self) -> &View {
        &self.mmif.views[self.index]
    }
}

impl DerefMut for ViewMut<'_> {
    fn deref_mut(&mut self) -> &mut View {
        &mut self.mmif.views[self.index]
    }
}

impl Drop for ViewMut<'_> {
    fn drop(&mut self) {
        self.mmif.refresh_alignment_cache();
    }
}

impl PartialEq for Mmif {
    fn eq(&self, other: &Self) -> bool {
        self.metadata == other.metadata && self.documents == other.documents && self.views == other.views
    }
}

impl FromStr for Mmif {
    type Err = MmifError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_json(s)
    }
}

/// Top-level ids are bare and must not shadow the container's own members.
fn check_top_level_id(id: &str) -> MmifResult<()> {
    if id.contains(ID_DELIMITER) {
        return Err(MmifError::invalid_id(id, "top-level ids cannot contain ':'"));
    }
    if TOP_LEVEL_NAMES.contains(&id) {
        return Err(MmifError::invalid_id(id, "reserved name"));
    }
    Ok(())
}

fn number(name: &str, value: &Value) -> MmifResult<f64> {
    value
        .as_f64()
        .ok_or_else(|| MmifError::invalid_value(name, format!("expected a number, got {value}")))
}
