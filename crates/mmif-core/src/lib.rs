//! mmif-core: runtime object model for MMIF multimedia annotation files
//!
//! This crate provides:
//! - Loading and serializing MMIF JSON with the `@`/`_` key convention
//! - Versioned vocabulary types with exact and fuzzy matching
//! - Views, annotations and documents with tiered property lookup
//! - Id resolution, alignment caching and anchor resolution over the graph
//! - Capital annotations recording document properties added downstream
//! - Document location resolvers keyed by URI scheme
//!
//! # Usage
//!
//! ```rust,ignore
//! use mmif_core::{Mmif, Properties, SerializeOptions, vocabulary};
//!
//! let mut mmif = Mmif::from_json(&std::fs::read_to_string("input.mmif")?)?;
//! let mut view = mmif.new_view()?;
//! view.set_app("http://apps.clams.ai/example/v1");
//! view.new_annotation(
//!     vocabulary::TIME_FRAME,
//!     None,
//!     Properties::new().with("start", 0).with("end", 1500),
//! )?;
//! drop(view);
//! let json = mmif.serialize(SerializeOptions { pretty: true, ..Default::default() })?;
//! ```

pub mod annotation;
pub mod collections;
pub mod config;
pub mod docloc;
pub mod error;
pub mod mmif;
pub mod record;
pub mod schema;
pub mod timeunit;
pub mod view;
pub mod vocabulary;
pub mod wire;

// Re-exports for convenience
pub use annotation::{Annotation, Document, Element, Text};
pub use collections::{Contain, ContainsMap, Keyed, KeyedList};
pub use config::{ConfigError, MmifConfig};
pub use docloc::{LocationResolver, ResolverRegistry};
pub use error::{MmifError, MmifResult};
pub use mmif::{AnchorEdge, Mmif, MmifMetadata, Resolved, SerializeOptions, ViewMut};
pub use record::{Properties, Record};
pub use schema::{SchemaValidator, SchemaViolation, StructuralValidator};
pub use view::{ErrorRecord, View, ViewMetadata};
pub use vocabulary::AtType;
