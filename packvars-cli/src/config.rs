//! Project configuration file.
//!
//! Settings are read from `.packvars.toml`. Every field is optional and can
//! be overridden on the command line.
//!
//! # Configuration File Format
//!
//! ```toml
//! schema = "ui/_global_variables.schema.json"
//! example = "ui/_global_variables.json"
//! session_dir = ".packvars"
//! session = "default"
//! output = "build/_global_variables.json"
//! listen = "127.0.0.1:8080"
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".packvars.toml";

/// Contents of the configuration file.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PackConfig {
    /// Schema document, path or URL.
    pub schema: Option<String>,
    /// Example document, path or URL.
    pub example: Option<String>,
    /// Root directory of session snapshots.
    pub session_dir: Option<PathBuf>,
    /// Session name; each name has its own snapshot.
    pub session: Option<String>,
    /// Export target.
    pub output: Option<PathBuf>,
    /// Listen address of `serve`.
    pub listen: Option<String>,
}

impl PackConfig {
    /// Parse configuration text.
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("invalid packvars configuration")
    }

    /// Load `path`. A missing file yields the default configuration only
    /// when `required` is false.
    pub async fn load(path: &Path, required: bool) -> anyhow::Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(s) => Self::from_toml_str(&s)
                .with_context(|| format!("Failed to parse {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                debug!("No configuration at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        }
    }
}
