//! # packvars
//!
//! Schema-driven editor core for the global variables document of a UI
//! resource pack.
//!
//! A JSON schema describes a flat set of named variables (booleans, numbers,
//! number arrays, strings and enumerated choices). `packvars` turns that
//! schema into typed descriptors, reconciles schema defaults, a bundled
//! example document and the previously persisted session snapshot into one
//! authoritative state, and renders that state as the pretty-printed JSON the
//! resource pack consumes.
//!
//! ## Quick Start
//!
//! ```rust
//! use packvars::{Edit, Editor, Schema, store::MemoryStore};
//! use serde_json::json;
//!
//! let schema = Schema::from_value(&json!({
//!     "pageName": "HUD",
//!     "variables": {
//!         "show_fps": { "type": "boolean" },
//!         "offset": { "type": "number_array", "count": 2 }
//!     }
//! }));
//!
//! let mut editor = Editor::new(schema, MemoryStore::default());
//! editor.load_example_result(Err(packvars::LoadError::NotAnObject));
//! let outcome = editor.apply_edit("show_fps", Edit::Value(json!(true))).unwrap();
//! assert!(outcome.modified);
//! assert!(outcome.preview.contains("\"offset\": [0, 0]"));
//! ```
//!
//! ## Modules
//!
//! - [`data`] - Descriptors, schema parsing and the variable state
//! - [`reconcile`] - Sanitization of arbitrary documents against a schema
//! - [`editor`] - The editor context: startup, edits, reset
//! - [`serialize`] - Display, persisted and download renderings
//! - [`store`] - Session-scoped snapshot storage
//! - [`source`] - Loading schema and example documents
//! - [`web`] - HTTP host (requires `web` feature)

/// Descriptors, schema parsing and the variable state.
pub mod data;

/// The editor context owning schema, state and defaults.
pub mod editor;

/// Sanitization and section stripping.
pub mod reconcile;

/// Text renderings of a variable state.
pub mod serialize;

/// Loading schema and example documents from paths or URLs.
pub mod source;

/// Session-scoped snapshot storage.
pub mod store;

/// HTTP host exposing the editor as a JSON API.
///
/// This module is only available when the `web` feature is enabled.
#[cfg(feature = "web")]
pub mod web;

pub use data::{Descriptor, Schema, VarKind, VarState};
pub use editor::{Edit, EditError, EditOutcome, Editor, Status};
pub use serialize::DOWNLOAD_FILE_NAME;
pub use source::{DocumentSource, LoadError, Location};
pub use serde_json::Value;
