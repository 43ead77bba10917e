//! Loading schema and example documents.
//!
//! A document lives either on disk or behind an `http(s)://` URL. Fetches
//! are single attempts: failures are reported as [`LoadError`] and the
//! caller decides how to degrade.

use std::{
    fmt,
    future::Future,
    path::{Path, PathBuf},
};

use log::{info, warn};
use serde_json::Value;
use thiserror::Error;

use crate::data::Schema;

/// Failures while loading a JSON document.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch {url}: {message}")]
    Http { url: String, message: String },

    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("document is not a JSON object")]
    NotAnObject,

    #[error("no document source configured")]
    NoSource,
}

/// Where a document is loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Local file.
    Path(PathBuf),
    /// Remote document.
    Url(String),
}

impl Location {
    /// Classify a user supplied string.
    pub fn parse(s: &str) -> Self {
        if s.starts_with("http://") || s.starts_with("https://") {
            Location::Url(s.to_string())
        } else {
            Location::Path(PathBuf::from(s))
        }
    }

    /// Resolve a relative path against `base`; URLs and absolute paths are kept.
    pub fn resolve_against(self, base: &Path) -> Self {
        match self {
            Location::Path(p) if p.is_relative() => Location::Path(base.join(p)),
            other => other,
        }
    }

    /// Load and parse the document.
    pub async fn load_json(&self) -> Result<Value, LoadError> {
        let text = match self {
            Location::Path(path) => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| LoadError::Io {
                        path: path.clone(),
                        source,
                    })?
            }
            Location::Url(url) => fetch_text(url).await?,
        };
        Ok(serde_json::from_str(&text)?)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Path(p) => write!(f, "{}", p.display()),
            Location::Url(u) => f.write_str(u),
        }
    }
}

async fn fetch_text(url: &str) -> Result<String, LoadError> {
    let http_err = |message: String| LoadError::Http {
        url: url.to_string(),
        message,
    };

    let client = reqwest::Client::builder()
        .user_agent(concat!("packvars/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| http_err(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| http_err(e.to_string()))?;

    if !response.status().is_success() {
        return Err(http_err(format!("HTTP status {}", response.status())));
    }

    response.text().await.map_err(|e| http_err(e.to_string()))
}

/// Something that can produce the example document on demand.
///
/// The editor only fetches when its startup policy needs the example, so
/// implementations should not do any work before [`fetch`](Self::fetch).
pub trait DocumentSource {
    /// Fetch the document.
    fn fetch(&self) -> impl Future<Output = Result<Value, LoadError>> + Send;
}

impl DocumentSource for Location {
    fn fetch(&self) -> impl Future<Output = Result<Value, LoadError>> + Send {
        self.load_json()
    }
}

impl<S: DocumentSource + Sync> DocumentSource for Option<S> {
    fn fetch(&self) -> impl Future<Output = Result<Value, LoadError>> + Send {
        async move {
            match self {
                Some(source) => source.fetch().await,
                None => Err(LoadError::NoSource),
            }
        }
    }
}

/// Load the schema, degrading to an empty schema on any failure.
pub async fn load_schema(location: &Location) -> Schema {
    match location.load_json().await {
        Ok(value) => {
            let schema = Schema::from_value(&value);
            info!(
                "Loaded schema '{}' with {} entries from {location}",
                schema.page_name,
                schema.len()
            );
            schema
        }
        Err(e) => {
            warn!("Failed to load schema from {location}: {e}; continuing with an empty schema");
            Schema::empty()
        }
    }
}
