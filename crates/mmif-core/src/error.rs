//! Error types for the MMIF object model.

use thiserror::Error;

use crate::schema::SchemaViolation;

/// Result type alias for MMIF operations.
pub type MmifResult<T> = Result<T, MmifError>;

/// Errors that can occur while loading, mutating, or serializing MMIF.
#[derive(Debug, Error)]
pub enum MmifError {
    /// The wire payload is malformed.
    #[error(transparent)]
    SchemaViolation(#[from] SchemaViolation),

    /// JSON could not be parsed or produced.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O failure while resolving or reading a document.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A keyed collection already holds an item with this key.
    #[error("key already exists: {key}")]
    DuplicateKey { key: String },

    /// No document, view, or annotation carries this identifier.
    #[error("identifier not found: {id}")]
    NotFound { id: String },

    /// The identifier names both a top-level document and a view.
    #[error("ambiguous identifier: {id} names both a document and a view")]
    Ambiguous { id: String },

    /// An annotation declares both `targets` and `start`/`end`.
    #[error("ambiguous anchor on {id}: both targets and start/end are present")]
    AmbiguousAnchor { id: String },

    /// An annotation has no `timePoint`, `targets`, or `start`/`end` to anchor on.
    #[error("no anchor found on {id}")]
    MissingAnchor { id: String },

    /// Anchor resolution revisited an annotation already on its path.
    #[error("anchor cycle through {id}")]
    AnchorCycle { id: String },

    /// A view that reports an error cannot also hold annotations.
    #[error("view {view} reports an error and cannot hold annotations")]
    ViewHasError { view: String },

    /// A record does not hold a value for this field.
    #[error("{record} has no field named {key}")]
    KeyNotFound { record: String, key: String },

    /// A closed record was given a field it does not declare.
    #[error("{record} does not accept additional property {key}")]
    AdditionalPropertiesDisallowed { record: String, key: String },

    /// An annotation or document does not hold this property.
    #[error("property {name} not found on {id}")]
    PropertyNotFound { id: String, name: String },

    /// An original document property cannot be overwritten.
    #[error("property {name} of document {id} is read-only")]
    ReadOnlyProperty { id: String, name: String },

    /// A property value has an unsupported shape.
    #[error("invalid value for property {name}: {reason}")]
    InvalidPropertyValue { name: String, reason: String },

    /// A type URI could not be parsed.
    #[error("invalid type {uri}: {reason}")]
    InvalidType { uri: String, reason: String },

    /// An identifier is malformed for where it is used.
    #[error("invalid identifier {id}: {reason}")]
    InvalidIdentifier { id: String, reason: String },

    /// No location resolver is registered for this scheme.
    #[error("unsupported location scheme {scheme}: install and register the mmif-docloc-{scheme} plugin")]
    UnsupportedScheme { scheme: String },

    /// A document location is malformed.
    #[error("invalid document location {location}: {reason}")]
    InvalidLocation { location: String, reason: String },

    /// A location resolver failed to produce a local path.
    #[error("failed to resolve {uri}: {reason}")]
    ResolverFailed { uri: String, reason: String },

    /// A time unit name is not recognized.
    #[error("unsupported time unit: {0}")]
    InvalidTimeUnit(String),

    /// A time value does not fit the declared unit.
    #[error("invalid time value: {0}")]
    InvalidTime(String),
}

impl MmifError {
    /// Shorthand for [`MmifError::NotFound`].
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Shorthand for [`MmifError::InvalidPropertyValue`].
    pub fn invalid_value(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPropertyValue {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`MmifError::InvalidIdentifier`].
    pub fn invalid_id(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
