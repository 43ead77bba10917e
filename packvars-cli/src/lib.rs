//! # packvars-cli
//!
//! Command line host for the `packvars` editor core.
//!
//! Each invocation belongs to a named session whose snapshot lives under the
//! session directory, so a sequence of `set` commands behaves like a series
//! of edits in one browser tab. `clear` ends the session.
//!
//! ## Modules
//!
//! - [`commands`] - Command definitions and handlers
//! - [`config`] - The `.packvars.toml` configuration file
//! - [`ctx`] - Flag/config merging and editor construction

/// Command definitions and handlers.
pub mod commands;

/// Configuration file parsing.
pub mod config;

/// Application context.
pub mod ctx;

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;
