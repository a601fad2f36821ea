//! mmif-docloc-http: `http` and `https` document locations for the MMIF runtime
//!
//! Documents hosted on a web server are downloaded into a temporary file and
//! the path of that file is handed back. The file is kept after resolution,
//! so callers own its cleanup.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mmif_core::ResolverRegistry;
//!
//! let mut registry = ResolverRegistry::new();
//! mmif_docloc_http::register(&mut registry)?;
//! let path = document.location_path(&registry)?;
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use mmif_core::docloc::{LocationResolver, ResolverRegistry, split_scheme};
use mmif_core::error::{MmifError, MmifResult};
use reqwest::blocking::Client;
use tracing::debug;

/// Schemes served by [`HttpResolver`].
pub const SCHEMES: [&str; 2] = ["http", "https"];

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Downloads `http`/`https` locations into temporary files.
#[derive(Debug, Clone)]
pub struct HttpResolver {
    client: Client,
}

impl HttpResolver {
    /// A resolver with default timeouts.
    pub fn new() -> MmifResult<Self> {
        Self::with_timeouts(CONNECT_TIMEOUT, REQUEST_TIMEOUT)
    }

    pub fn with_timeouts(connect: Duration, request: Duration) -> MmifResult<Self> {
        let client = Client::builder()
            .connect_timeout(connect)
            .timeout(request)
            .build()
            .map_err(|e| MmifError::ResolverFailed {
                uri: String::new(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }

    fn fetch(&self, url: &str) -> MmifResult<PathBuf> {
        let failed = |e: reqwest::Error| MmifError::ResolverFailed {
            uri: url.to_string(),
            reason: e.to_string(),
        };
        let body = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.bytes())
            .map_err(failed)?;

        let mut file = tempfile::Builder::new()
            .prefix("mmif-docloc-")
            .suffix(&suffix_of(url))
            .tempfile()?;
        file.write_all(&body)?;
        let (_, path) = file.keep().map_err(|e| MmifError::Io(e.error))?;
        debug!(url, path = %path.display(), bytes = body.len(), "downloaded document");
        Ok(path)
    }
}

impl LocationResolver for HttpResolver {
    fn resolve(&self, location: &str) -> MmifResult<PathBuf> {
        match split_scheme(location) {
            Some((scheme, _)) if SCHEMES.contains(&scheme) => self.fetch(location),
            Some((scheme, _)) => Err(MmifError::UnsupportedScheme {
                scheme: scheme.to_string(),
            }),
            None => Err(MmifError::InvalidLocation {
                location: location.to_string(),
                reason: "expected an http or https URL".to_string(),
            }),
        }
    }
}

/// Registers an [`HttpResolver`] for both `http` and `https`.
pub fn register(registry: &mut ResolverRegistry) -> MmifResult<()> {
    let resolver = HttpResolver::new()?;
    for scheme in SCHEMES {
        registry.register(scheme, resolver.clone());
    }
    Ok(())
}

/// File extension of the last path segment, with its dot, or empty.
fn suffix_of(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let address = split_scheme(path).map_or(path, |(_, rest)| rest);
    let segment = match address.split_once('/') {
        Some((_, path)) => path.rsplit('/').next().unwrap_or_default(),
        None => "",
    };
    match segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => format!(".{ext}"),
        _ => String::new(),
    }
}
