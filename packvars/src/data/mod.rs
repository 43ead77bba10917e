//! Descriptor model and variable state.
//!
//! - [`descriptor`] - Typed descriptors and default/choice resolution
//! - [`schema`] - Schema parsing, including the legacy flat shape
//! - [`state`] - The ordered key/value state and JSON-equivalent comparison

/// Typed variable descriptors.
pub mod descriptor;

/// Schema parsing and normalization.
pub mod schema;

/// Ordered variable state.
pub mod state;

pub use descriptor::{Descriptor, VarKind, default_value_for, resolve_choices, resolve_choices_for};
pub use schema::Schema;
pub use state::{VarState, json_equivalent};
