//! Asset resolution: fetch the raw bytes of an asset by identifier.
//!
//! The assembler only needs bytes; where they come from is the resolver's
//! business. Two implementations ship with the crate:
//!
//! * [`DirectoryResolver`] reads from the uploads directory.
//! * [`HttpResolver`] downloads from a base URL (or an absolute URL
//!   identifier).
//!
//! Dropping the future returned by [`AssetResolver::fetch`] cancels the
//! fetch; both shipped resolvers rely on that for abandoned runs.

use crate::error::ResolveError;
use reqwest::Url;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Fetches asset bytes for the assembler.
pub trait AssetResolver: Send + Sync {
    /// Return the raw (still encoded) bytes of the asset.
    fn fetch(&self, identifier: &str) -> impl Future<Output = Result<Vec<u8>, ResolveError>> + Send;
}

/// Check if an identifier looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Identifiers of stored files are bare names: no separators, and neither
/// `.` nor `..`. Dots inside a name (`north..wall.png`) are fine.
pub fn is_safe_file_name(identifier: &str) -> bool {
    !identifier.is_empty()
        && identifier != "."
        && identifier != ".."
        && !identifier.contains('/')
        && !identifier.contains('\\')
        && !identifier.contains('\0')
}

/// Reads assets from a local directory.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
}

impl DirectoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetResolver for DirectoryResolver {
    async fn fetch(&self, identifier: &str) -> Result<Vec<u8>, ResolveError> {
        if !is_safe_file_name(identifier) {
            return Err(ResolveError::InvalidIdentifier {
                identifier: identifier.to_string(),
            });
        }
        let path = self.root.join(identifier);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!("Read {} ({} bytes)", path.display(), bytes.len());
                Ok(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ResolveError::NotFound {
                identifier: identifier.to_string(),
            }),
            Err(e) => Err(ResolveError::Io {
                identifier: identifier.to_string(),
                source: e,
            }),
        }
    }
}

/// Downloads assets over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpResolver {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpResolver {
    /// `base_url` is joined with relative identifiers, e.g.
    /// `http://host:5001/uploads` + `file-1.jpg`.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ResolveError::Http {
                url: base_url.to_string(),
                reason: e.to_string(),
            })?;
        Self::with_client(client, base_url)
    }

    /// Use a caller-configured client (proxies, TLS roots, timeouts).
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, ResolveError> {
        let base_url = parse_url(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ResolveError::Http {
                url: base_url.into(),
                reason: "base URL cannot carry a path".to_string(),
            });
        }
        Ok(Self { client, base_url })
    }

    /// Full URL for an identifier.
    ///
    /// Absolute `http(s)://` identifiers are used as given. Anything else is
    /// appended to the base path one `/`-separated segment at a time, with
    /// reserved characters (`#`, `?`, `%`, spaces) percent-encoded.
    pub fn url_for(&self, identifier: &str) -> Result<Url, ResolveError> {
        if is_url(identifier) {
            return parse_url(identifier);
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ResolveError::Http {
                url: self.base_url.to_string(),
                reason: "base URL cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(identifier.trim_start_matches('/').split('/'));
        Ok(url)
    }
}

fn parse_url(raw: &str) -> Result<Url, ResolveError> {
    Url::parse(raw).map_err(|e| ResolveError::Http {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

impl AssetResolver for HttpResolver {
    async fn fetch(&self, identifier: &str) -> Result<Vec<u8>, ResolveError> {
        let url = self.url_for(identifier)?;
        debug!("Downloading asset from: {}", url);

        let http_err = |reason: String| ResolveError::Http {
            url: url.to_string(),
            reason,
        };
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| http_err(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ResolveError::NotFound {
                identifier: identifier.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(http_err(format!("HTTP {}", response.status())));
        }

        let bytes = response.bytes().await.map_err(|e| http_err(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
