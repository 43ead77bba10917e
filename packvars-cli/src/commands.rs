//! Command handlers.
//!
//! Each invocation opens the session editor, performs one operation and
//! exits; the session snapshot carries the state to the next invocation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use packvars::{
    Edit, EditError, Editor, Status, Value, VarKind,
    serialize::value_to_display_text,
    store::DirStore,
};
use tokio::fs;

use crate::ctx::AppContext;

/// Editor operations.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the current document.
    Show {
        /// Only list the variables that differ from their defaults.
        #[arg(long)]
        modified: bool,
    },
    /// Print the value of one variable.
    Get {
        /// Variable key.
        key: String,
    },
    /// Set a variable. The value is read as JSON, or as text for text variables.
    Set {
        /// Variable key.
        key: String,
        /// New value.
        value: String,
    },
    /// Set one element of a number array.
    SetElement {
        /// Variable key.
        key: String,
        /// Element index.
        index: usize,
        /// Element value; blank restores the default element.
        text: String,
    },
    /// Restore the last state of the session, or the defaults.
    Reset,
    /// Reload the example document into state and defaults.
    LoadExample,
    /// Replace the state with a JSON document, keeping only schema keys.
    Import {
        /// Document to import.
        path: PathBuf,
    },
    /// Write `_global_variables.json`.
    Export {
        /// Target file (defaults to the configured output).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the schema entries.
    Describe,
    /// End the session and delete its snapshot.
    Clear,
    /// Serve the editor API over HTTP.
    #[cfg(feature = "web")]
    Serve {
        /// Listen address (defaults to the configured one or 127.0.0.1:8080).
        #[arg(short, long)]
        listen: Option<std::net::SocketAddr>,
    },
}

/// Handler for editor commands.
pub struct CommandHandler;

impl CommandHandler {
    /// Run `command` in `ctx`.
    ///
    /// # Errors
    ///
    /// Returns an error for rejected edits and for I/O failures on files the
    /// user named explicitly. Schema, example and snapshot problems are
    /// logged and degraded instead.
    pub async fn handle(ctx: &AppContext, command: Command) -> Result<()> {
        match command {
            #[cfg(feature = "web")]
            Command::Serve { listen } => Self::handle_serve(ctx, listen).await,
            command => Self::handle_session(ctx, command).await,
        }
    }

    async fn handle_session(ctx: &AppContext, command: Command) -> Result<()> {
        let mut editor = ctx.open_editor().await;

        match command {
            Command::Show { modified } => Self::handle_show(&editor, modified),
            Command::Get { key } => {
                let value = editor
                    .get(&key)
                    .ok_or_else(|| anyhow!("unknown variable: {key}"))?;
                println!("{}", value_to_display_text(value));
            }
            Command::Set { key, value } => Self::handle_set(&mut editor, &key, value)?,
            Command::SetElement { key, index, text } => {
                let edit = Edit::Element {
                    index,
                    text: text.clone(),
                };
                let modified = apply_and_commit(&mut editor, &key, edit, &text)?;
                print_edit(&editor, &key, modified);
            }
            Command::Reset => {
                let status = editor.reset();
                let msg = match status {
                    Status::Restored => "Restored the last state of this session",
                    _ => "Reset to defaults",
                };
                println!("{}", msg.green());
            }
            Command::LoadExample => {
                let status = editor.load_example(&ctx.example).await;
                match status {
                    Status::ExampleLoaded => println!("{}", "Example loaded".green()),
                    _ => println!(
                        "{}",
                        "Example unavailable; using type defaults".yellow()
                    ),
                }
            }
            Command::Import { path } => {
                let text = fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let doc: Value = serde_json::from_str(&text)
                    .with_context(|| format!("Invalid JSON in {}", path.display()))?;
                editor.import_document(&doc)?;
                println!("{}", format!("Imported {}", path.display()).green());
            }
            Command::Export { output } => {
                let target = output.unwrap_or_else(|| ctx.paths.output.clone());
                Self::handle_export(&editor, &target).await?;
            }
            Command::Describe => Self::handle_describe(&editor),
            Command::Clear => {
                editor.end_session();
                println!("{}", format!("Session '{}' cleared", ctx.session).green());
            }
            #[cfg(feature = "web")]
            Command::Serve { listen } => Self::handle_serve(ctx, listen).await?,
        }

        Ok(())
    }

    fn handle_show(editor: &Editor<DirStore>, modified: bool) {
        if !modified {
            println!("{}", editor.preview());
            return;
        }
        for key in editor.modified_keys() {
            let current = editor.get(key).map(value_to_display_text).unwrap_or_default();
            let default = editor
                .defaults()
                .get(key)
                .map(value_to_display_text)
                .unwrap_or_else(|| "null".to_string());
            println!("{} = {} {}", key.bold(), current, format!("(default {default})").dimmed());
        }
    }

    fn handle_set(editor: &mut Editor<DirStore>, key: &str, raw: String) -> Result<()> {
        let is_text = editor
            .schema()
            .variable(key)
            .is_some_and(|d| matches!(d.kind, VarKind::String | VarKind::Choice));

        let edit = match serde_json::from_str::<Value>(&raw) {
            Ok(value) if !is_text => Edit::Value(value),
            _ => Edit::Text(raw.clone()),
        };
        let modified = apply_and_commit(editor, key, edit, &raw)?;
        print_edit(editor, key, modified);
        Ok(())
    }

    async fn handle_export(editor: &Editor<DirStore>, target: &Path) -> Result<()> {
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(target, editor.download_bytes())
            .await
            .with_context(|| format!("Failed to write {}", target.display()))?;
        info!("Exported {} variables", editor.state().len());
        println!("{}", format!("Wrote {}", target.display()).green());
        Ok(())
    }

    fn handle_describe(editor: &Editor<DirStore>) {
        let schema = editor.schema();
        println!("{}", schema.page_name.bold().underline());
        for (key, d) in schema.entries() {
            if d.is_section() {
                println!("\n{}", d.label.as_deref().unwrap_or(key).bold().purple());
                continue;
            }
            let marker = if editor.is_modified(key) { "*" } else { " " };
            let mut line = format!("{marker} {key} ({})", d.kind.tag().unwrap_or("untyped"));
            if d.readonly {
                line.push_str(" [readonly]");
            }
            if let Some(label) = &d.label {
                line.push_str(&format!(" - {label}"));
            }
            println!("{line}");
            if !d.choices.is_empty() {
                println!("    choices: {}", d.choices.join(", ").dimmed());
            }
        }
    }

    #[cfg(feature = "web")]
    async fn handle_serve(ctx: &AppContext, listen: Option<std::net::SocketAddr>) -> Result<()> {
        let listen = match (listen, &ctx.listen) {
            (Some(addr), _) => addr,
            (None, Some(s)) => s
                .parse()
                .with_context(|| format!("Invalid listen address: {s}"))?,
            (None, None) => std::net::SocketAddr::from(([127, 0, 0, 1], 8080)),
        };
        let schema = packvars::source::load_schema(&ctx.schema).await;
        let state = packvars::web::AppState::new(schema, ctx.example.clone());
        packvars::web::serve(state, listen)
            .await
            .with_context(|| format!("Server on {listen} failed"))
    }
}

/// Apply `edit` and commit it at once.
///
/// A single invocation has no editing in progress, so text that does not
/// parse is rejected instead of waiting for a commit. Blank text still
/// commits to the default.
fn apply_and_commit(
    editor: &mut Editor<DirStore>,
    key: &str,
    edit: Edit,
    raw: &str,
) -> Result<bool> {
    let outcome = editor.apply_edit(key, edit)?;
    if outcome.pending && !raw.trim().is_empty() {
        return Err(EditError::InvalidText {
            key: key.to_string(),
            text: raw.to_string(),
        }
        .into());
    }
    Ok(editor.commit(key)?.modified)
}

fn print_edit(editor: &Editor<DirStore>, key: &str, modified: bool) {
    let value = editor.get(key).map(value_to_display_text).unwrap_or_default();
    let note = if modified { "modified".yellow() } else { "default".dimmed() };
    println!("{} = {} ({})", key.bold(), value, note);
}
