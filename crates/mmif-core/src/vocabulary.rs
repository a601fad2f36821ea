//! Versioned vocabulary type tokens.
//!
//! Every annotation carries an `@type` URI. For the CLAMS vocabulary the
//! canonical form is
//!
//! ```text
//! http://mmif.clams.ai/vocabulary/TimeFrame/v5
//! ```
//!
//! Files written against older spec versions use the legacy form
//! `http://mmif.clams.ai/0.4.2/vocabulary/TimeFrame`, which is normalized
//! through a fixed table to the type version that spec release shipped.
//! Any other IRI (for example `http://vocab.lappsgrid.org/Token`) is kept as
//! an unversioned external type.
//!
//! Two tokens are *exactly* equal when namespace, name and version all match.
//! [`AtType::matches`] adds *fuzzy* equality, which tolerates versions one
//! step apart so that consumers keep working across adjacent vocabulary
//! revisions.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::error::MmifError;

/// Namespace of the CLAMS vocabulary.
pub const CLAMS_NAMESPACE: &str = "http://mmif.clams.ai";

static VERSIONED_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<ns>.+)/vocabulary/(?P<name>[^/]+)/v(?P<ver>\d+)$").expect("valid regex")
});

static LEGACY_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<ns>.+)/(?P<spec>\d+\.\d+\.\d+)/vocabulary/(?P<name>[^/]+)$")
        .expect("valid regex")
});

// ============================================================================
// Type token
// ============================================================================

/// A vocabulary type: namespace, short name, and optional version.
///
/// Hashing covers namespace and name only, so tokens that are fuzzily equal
/// land in the same bucket; `==` is exact.
#[derive(Debug, Clone)]
pub struct AtType {
    namespace: Cow<'static, str>,
    name: Cow<'static, str>,
    version: Option<u32>,
}

impl AtType {
    /// A CLAMS vocabulary type.
    #[must_use]
    pub const fn clams(name: &'static str, version: u32) -> Self {
        Self {
            namespace: Cow::Borrowed(CLAMS_NAMESPACE),
            name: Cow::Borrowed(name),
            version: Some(version),
        }
    }

    /// A type from an arbitrary namespace.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, version: Option<u32>) -> Self {
        Self {
            namespace: Cow::Owned(namespace.into()),
            name: Cow::Owned(name.into()),
            version,
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Short name, e.g. `TimeFrame`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn version(&self) -> Option<u32> {
        self.version
    }

    /// Whether this type belongs to the document family.
    #[must_use]
    pub fn is_document(&self) -> bool {
        self.namespace == CLAMS_NAMESPACE && self.name.ends_with("Document")
    }

    /// Same namespace and name, regardless of version.
    #[must_use]
    pub fn same_kind(&self, other: &AtType) -> bool {
        self.namespace == other.namespace && self.name == other.name
    }

    /// Equality with optional tolerance for adjacent versions.
    ///
    /// A fuzzy match across differing versions is logged as a warning.
    #[must_use]
    pub fn matches(&self, other: &AtType, fuzzy: bool) -> bool {
        if !self.same_kind(other) {
            return false;
        }
        match (self.version, other.version) {
            (a, b) if a == b => true,
            (Some(a), Some(b)) if fuzzy && a.abs_diff(b) <= 1 => {
                warn!(left = %self, right = %other, "matching vocabulary types across adjacent versions");
                true
            }
            _ => false,
        }
    }

    /// Prefix for autogenerated annotation ids.
    ///
    /// The capital letters of the short name, lowercased (`TimeFrame` gives
    /// `tf`), or the lowercased first letter when there are none.
    #[must_use]
    pub fn id_prefix(&self) -> String {
        let capitals: String = self.name.chars().filter(char::is_ascii_uppercase).collect();
        if capitals.is_empty() {
            self.name.chars().take(1).collect::<String>().to_lowercase()
        } else {
            capitals.to_lowercase()
        }
    }

    /// Synonym groups declared for properties of this type.
    #[must_use]
    pub fn property_aliases(&self) -> &'static [&'static [&'static str]] {
        if self.namespace != CLAMS_NAMESPACE {
            return &[];
        }
        match self.name.as_ref() {
            "TimeFrame" => &[&["label", "frameType"]],
            "BoundingBox" => &[&["label", "boxType"]],
            _ => &[],
        }
    }
}

/// Exact equality: namespace, name and version must all agree.
///
/// Version-tolerant comparison is [`AtType::matches`] with `fuzzy` set, which
/// is what view queries and `contains` lookups use.
impl PartialEq for AtType {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other, false)
    }
}

impl Eq for AtType {}

impl Hash for AtType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for AtType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.namespace.is_empty(), self.version) {
            (true, _) => write!(f, "{}", self.name),
            (false, Some(v)) => write!(f, "{}/vocabulary/{}/v{}", self.namespace, self.name, v),
            (false, None) => write!(f, "{}/{}", self.namespace, self.name),
        }
    }
}

impl FromStr for AtType {
    type Err = MmifError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| MmifError::InvalidType {
            uri: s.to_string(),
            reason: reason.to_string(),
        };

        if let Some(caps) = VERSIONED_URI.captures(s) {
            let version = caps["ver"]
                .parse()
                .map_err(|_| invalid("version out of range"))?;
            return Ok(Self::new(&caps["ns"], &caps["name"], Some(version)));
        }
        if let Some(caps) = LEGACY_URI.captures(s) {
            let name = &caps["name"];
            let version = legacy_version(&caps["spec"], name)
                .ok_or_else(|| invalid("unknown legacy spec version"))?;
            return Ok(Self::new(&caps["ns"], name, Some(version)));
        }
        match s.rsplit_once('/') {
            Some((_, "")) => Err(invalid("empty type name")),
            Some((ns, name)) => Ok(Self::new(ns, name, None)),
            None if s.is_empty() => Err(invalid("empty type name")),
            None => Ok(Self::new("", s, None)),
        }
    }
}

impl Serialize for AtType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AtType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Legacy normalization
// ============================================================================

/// Type version shipped with a legacy spec release.
///
/// 0.4.0 and 0.4.1 carried every type at v1; 0.4.2 and 0.5.0 bumped
/// `Annotation` to v2.
#[must_use]
pub fn legacy_version(spec_version: &str, name: &str) -> Option<u32> {
    match spec_version {
        "0.4.0" | "0.4.1" => Some(1),
        "0.4.2" | "0.5.0" if name == "Annotation" => Some(2),
        "0.4.2" | "0.5.0" => Some(1),
        _ => None,
    }
}

// ============================================================================
// Vocabulary
// ============================================================================

pub const THING: AtType = AtType::clams("Thing", 1);
pub const ANNOTATION: AtType = AtType::clams("Annotation", 6);
pub const REGION: AtType = AtType::clams("Region", 1);
pub const TIME_POINT: AtType = AtType::clams("TimePoint", 4);
pub const INTERVAL: AtType = AtType::clams("Interval", 1);
pub const SPAN: AtType = AtType::clams("Span", 1);
pub const TIME_FRAME: AtType = AtType::clams("TimeFrame", 5);
pub const CHAPTER: AtType = AtType::clams("Chapter", 6);
pub const POLYGON: AtType = AtType::clams("Polygon", 1);
pub const BOUNDING_BOX: AtType = AtType::clams("BoundingBox", 4);
pub const VIDEO_OBJECT: AtType = AtType::clams("VideoObject", 4);
pub const RELATION: AtType = AtType::clams("Relation", 1);
pub const ALIGNMENT: AtType = AtType::clams("Alignment", 1);
pub const DOCUMENT: AtType = AtType::clams("Document", 1);
pub const VIDEO_DOCUMENT: AtType = AtType::clams("VideoDocument", 1);
pub const TEXT_DOCUMENT: AtType = AtType::clams("TextDocument", 1);
pub const IMAGE_DOCUMENT: AtType = AtType::clams("ImageDocument", 1);
pub const AUDIO_DOCUMENT: AtType = AtType::clams("AudioDocument", 1);

/// Every CLAMS vocabulary type at its current version.
pub static VOCABULARY: [AtType; 18] = [
    THING,
    ANNOTATION,
    REGION,
    TIME_POINT,
    INTERVAL,
    SPAN,
    TIME_FRAME,
    CHAPTER,
    POLYGON,
    BOUNDING_BOX,
    VIDEO_OBJECT,
    RELATION,
    ALIGNMENT,
    DOCUMENT,
    VIDEO_DOCUMENT,
    TEXT_DOCUMENT,
    IMAGE_DOCUMENT,
    AUDIO_DOCUMENT,
];

/// Looks up a CLAMS vocabulary type by short name.
#[must_use]
pub fn by_name(name: &str) -> Option<&'static AtType> {
    VOCABULARY.iter().find(|t| t.name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(s: &str) -> AtType {
        s.parse().unwrap()
    }

    #[test]
    fn canonical_roundtrip() {
        let s = "http://mmif.clams.ai/vocabulary/TimeFrame/v5";
        let t = token(s);
        assert_eq!(t, TIME_FRAME);
        assert_eq!(t.to_string(), s);
    }

    #[test]
    fn external_iri_roundtrip() {
        let s = "http://vocab.lappsgrid.org/Token";
        let t = token(s);
        assert_eq!(t.namespace(), "http://vocab.lappsgrid.org");
        assert_eq!(t.name(), "Token");
        assert_eq!(t.version(), None);
        assert_eq!(t.to_string(), s);
        assert!(!t.is_document());
    }

    #[test]
    fn bare_name() {
        let t = token("Token");
        assert_eq!(t.to_string(), "Token");
        assert!("".parse::<AtType>().is_err());
        assert!("http://x.org/".parse::<AtType>().is_err());
    }

    #[test]
    fn legacy_uris_normalize() {
        let v1 = AtType::clams("Annotation", 1);
        let v2 = AtType::clams("Annotation", 2);
        assert_eq!(v1, token("http://mmif.clams.ai/0.4.0/vocabulary/Annotation"));
        assert_eq!(v2, token("http://mmif.clams.ai/0.4.2/vocabulary/Annotation"));
        assert_ne!(v2, token("http://mmif.clams.ai/0.4.0/vocabulary/Annotation"));
        assert_ne!(v1, token("http://mmif.clams.ai/0.4.2/vocabulary/Annotation"));
        for spec in ["0.4.0", "0.4.1", "0.4.2"] {
            let tf = token(&format!("http://mmif.clams.ai/{spec}/vocabulary/TimeFrame"));
            assert_eq!(tf, AtType::clams("TimeFrame", 1));
        }
        assert_eq!(
            token("http://mmif.clams.ai/0.4.2/vocabulary/TimeFrame").to_string(),
            "http://mmif.clams.ai/vocabulary/TimeFrame/v1"
        );
    }

    #[test]
    fn unknown_legacy_version_fails() {
        let err = "http://mmif.clams.ai/9.9.9/vocabulary/TimeFrame"
            .parse::<AtType>()
            .unwrap_err();
        assert!(matches!(err, MmifError::InvalidType { .. }));
    }

    #[test]
    fn fuzzy_equality_tolerates_adjacent_versions() {
        let v1 = token("http://mmif.clams.ai/vocabulary/Foo/v1");
        let v2 = token("http://mmif.clams.ai/vocabulary/Foo/v2");
        let v3 = token("http://mmif.clams.ai/vocabulary/Foo/v3");
        assert!(v1.matches(&v1, false));
        assert!(v1.matches(&v2, true));
        assert!(!v1.matches(&v2, false));
        assert!(!v1.matches(&v3, true));
        assert_ne!(v1, v2);
        assert!(!v1.matches(&token("http://mmif.clams.ai/vocabulary/Bar/v1"), true));
    }

    #[test]
    fn hash_ignores_version() {
        use std::collections::hash_map::DefaultHasher;
        let hash = |t: &AtType| {
            let mut h = DefaultHasher::new();
            t.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash(&AtType::clams("Foo", 1)), hash(&AtType::clams("Foo", 2)));
    }

    #[test]
    fn document_family() {
        assert!(TEXT_DOCUMENT.is_document());
        assert!(VIDEO_DOCUMENT.is_document());
        assert!(DOCUMENT.is_document());
        assert!(!TIME_FRAME.is_document());
        assert!(!AtType::new("http://other.org", "TextDocument", None).is_document());
    }

    #[test]
    fn id_prefixes() {
        assert_eq!(TIME_FRAME.id_prefix(), "tf");
        assert_eq!(BOUNDING_BOX.id_prefix(), "bb");
        assert_eq!(TEXT_DOCUMENT.id_prefix(), "td");
        assert_eq!(ANNOTATION.id_prefix(), "a");
        assert_eq!(token("token").id_prefix(), "t");
    }

    #[test]
    fn aliases_declared_for_legacy_label_names() {
        assert_eq!(TIME_FRAME.property_aliases(), &[&["label", "frameType"][..]]);
        assert_eq!(BOUNDING_BOX.property_aliases()[0], &["label", "boxType"][..]);
        assert!(TIME_POINT.property_aliases().is_empty());
    }

    #[test]
    fn serde_as_string() {
        let json = serde_json::to_string(&TIME_POINT).unwrap();
        assert_eq!(json, "\"http://mmif.clams.ai/vocabulary/TimePoint/v4\"");
        let back: AtType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TIME_POINT);
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(by_name("Alignment"), Some(&ALIGNMENT));
        assert!(by_name("Nope").is_none());
    }
}
