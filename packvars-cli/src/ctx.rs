//! Application context.
//!
//! [`AppContext`] merges command line flags over the configuration file and
//! resolves every path against the directory the configuration lives in.

use std::path::{Path, PathBuf};

use clap::Args;
use packvars::{
    DOWNLOAD_FILE_NAME, Editor, Location,
    source::load_schema,
    store::DirStore,
};

use crate::config::{CONFIG_FILE_NAME, PackConfig};

/// Default schema document, relative to the project directory.
pub const DEFAULT_SCHEMA: &str = "_global_variables.schema.json";

/// Default session snapshot directory, relative to the project directory.
pub const DEFAULT_SESSION_DIR: &str = ".packvars";

/// Default session name.
pub const DEFAULT_SESSION: &str = "default";

/// Flags shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Configuration file (defaults to `.packvars.toml` in the working directory).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// Schema document, path or URL.
    #[arg(long, global = true)]
    pub schema: Option<String>,
    /// Example document, path or URL.
    #[arg(long, global = true)]
    pub example: Option<String>,
    /// Root directory of session snapshots.
    #[arg(long, global = true)]
    pub session_dir: Option<PathBuf>,
    /// Session name; each session keeps its own snapshot.
    #[arg(short, long, global = true)]
    pub session: Option<String>,
    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Resolved locations of the project.
#[derive(Debug, Clone)]
pub struct PathConfig {
    /// Directory relative paths are resolved against.
    pub base: PathBuf,
    /// Root of the session snapshot directories.
    pub session_dir: PathBuf,
    /// Export target.
    pub output: PathBuf,
}

/// The application context.
#[derive(Debug, Clone)]
pub struct AppContext {
    /// Resolved paths.
    pub paths: PathConfig,
    /// Schema document.
    pub schema: Location,
    /// Example document, if any.
    pub example: Option<Location>,
    /// Session name.
    pub session: String,
    /// Listen address of `serve`, from the configuration.
    pub listen: Option<String>,
}

impl AppContext {
    /// Build the context from flags and the configuration file.
    ///
    /// # Errors
    ///
    /// Fails when an explicitly requested configuration file cannot be read
    /// or any configuration file cannot be parsed.
    pub async fn from_args(args: &GlobalArgs) -> anyhow::Result<Self> {
        let (config_path, required) = match &args.config {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(CONFIG_FILE_NAME), false),
        };
        let config = PackConfig::load(&config_path, required).await?;
        let base = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self::resolve(args, config, base))
    }

    /// Merge `args` over `config`; relative config paths resolve against `base`.
    pub fn resolve(args: &GlobalArgs, config: PackConfig, base: PathBuf) -> Self {
        // Flags are relative to the working directory, config values to `base`.
        let schema = match &args.schema {
            Some(s) => Location::parse(s),
            None => Location::parse(config.schema.as_deref().unwrap_or(DEFAULT_SCHEMA))
                .resolve_against(&base),
        };
        let example = match &args.example {
            Some(s) => Some(Location::parse(s)),
            None => config
                .example
                .as_deref()
                .map(|s| Location::parse(s).resolve_against(&base)),
        };
        let session_dir = args.session_dir.clone().unwrap_or_else(|| {
            base.join(config.session_dir.unwrap_or_else(|| DEFAULT_SESSION_DIR.into()))
        });
        let output = base.join(config.output.unwrap_or_else(|| DOWNLOAD_FILE_NAME.into()));
        let session = args
            .session
            .clone()
            .or(config.session)
            .unwrap_or_else(|| DEFAULT_SESSION.to_string());

        Self {
            paths: PathConfig {
                base,
                session_dir,
                output,
            },
            schema,
            example,
            session,
            listen: config.listen,
        }
    }

    /// Snapshot store of the current session.
    pub fn store(&self) -> DirStore {
        DirStore::for_session(&self.paths.session_dir, &self.session)
    }

    /// Load the schema and run the startup reconciliation for the session.
    ///
    /// Never fails: an unreadable schema yields an empty editor and a
    /// missing example yields type defaults.
    pub async fn open_editor(&self) -> Editor<DirStore> {
        let schema = load_schema(&self.schema).await;
        let mut editor = Editor::new(schema, self.store());
        let status = editor.initialize(&self.example).await;
        debug!("Session '{}' initialized: {status:?}", self.session);
        editor
    }
}
