//! Document location resolution.
//!
//! Documents point at their media through a location URI. Turning that URI
//! into a local path is delegated to a [`LocationResolver`] chosen by URI
//! scheme. The core ships a resolver for `file`; other schemes come from
//! plugin crates (such as `mmif-docloc-http`) that the embedding application
//! registers explicitly on a [`ResolverRegistry`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{MmifError, MmifResult};

/// Turns a location URI of one scheme into a local path.
pub trait LocationResolver: Send + Sync {
    fn resolve(&self, location: &str) -> MmifResult<PathBuf>;
}

impl<F> LocationResolver for F
where
    F: Fn(&str) -> MmifResult<PathBuf> + Send + Sync,
{
    fn resolve(&self, location: &str) -> MmifResult<PathBuf> {
        self(location)
    }
}

/// Splits `scheme://rest`, requiring an RFC 3986 scheme.
pub fn split_scheme(location: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = location.split_once("://")?;
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some((scheme, rest))
}

/// Gives a scheme-less absolute path the `file` scheme.
pub fn normalize_location(location: &str) -> MmifResult<String> {
    if split_scheme(location).is_some() {
        return Ok(location.to_string());
    }
    if Path::new(location).is_absolute() {
        return Ok(format!("file://{location}"));
    }
    Err(MmifError::InvalidLocation {
        location: location.to_string(),
        reason: "a location without a scheme must be an absolute path".to_string(),
    })
}

/// Built-in resolver for `file://` URIs.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileResolver;

impl LocationResolver for FileResolver {
    fn resolve(&self, location: &str) -> MmifResult<PathBuf> {
        let address = match split_scheme(location) {
            Some(("file", rest)) => rest,
            Some((scheme, _)) => {
                return Err(MmifError::UnsupportedScheme {
                    scheme: scheme.to_string(),
                });
            }
            None => location,
        };
        // file://localhost/path and file:///path are the same file
        let path = match address.strip_prefix("localhost") {
            Some(rest) if rest.starts_with('/') => rest,
            _ => address,
        };
        if !path.starts_with('/') {
            return Err(MmifError::InvalidLocation {
                location: location.to_string(),
                reason: "file locations must carry an absolute path".to_string(),
            });
        }
        Ok(PathBuf::from(path))
    }
}

/// Scheme-keyed set of location resolvers.
pub struct ResolverRegistry {
    resolvers: HashMap<String, Box<dyn LocationResolver>>,
}

impl ResolverRegistry {
    /// A registry with only the `file` resolver.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("file", FileResolver);
        registry
    }

    /// A registry with no resolvers at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            resolvers: HashMap::new(),
        }
    }

    /// Registers (or replaces) the resolver for a scheme.
    pub fn register(
        &mut self,
        scheme: impl Into<String>,
        resolver: impl LocationResolver + 'static,
    ) -> &mut Self {
        self.resolvers.insert(scheme.into(), Box::new(resolver));
        self
    }

    pub fn supports(&self, scheme: &str) -> bool {
        self.resolvers.contains_key(scheme)
    }

    /// Resolves a location; scheme-less absolute paths count as `file`.
    pub fn resolve(&self, location: &str) -> MmifResult<PathBuf> {
        let scheme = split_scheme(location).map_or("file", |(scheme, _)| scheme);
        let resolver = self
            .resolvers
            .get(scheme)
            .ok_or_else(|| MmifError::UnsupportedScheme {
                scheme: scheme.to_string(),
            })?;
        resolver.resolve(location)
    }
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut schemes: Vec<_> = self.resolvers.keys().collect();
        schemes.sort();
        f.debug_struct("ResolverRegistry")
            .field("schemes", &schemes)
            .finish()
    }
}
