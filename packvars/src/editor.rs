//! The editor context.
//!
//! [`Editor`] owns the schema, the current state, the defaults baseline and
//! the session store. Every mutation goes through it, and every mutation
//! re-renders the preview and writes the state snapshot before returning.
//!
//! ## Startup
//!
//! [`Editor::initialize`] reconciles three sources:
//!
//! 1. a state snapshot left by an earlier run of the same session,
//! 2. the defaults snapshot of that session,
//! 3. the example document.
//!
//! A restored state is only kept when the defaults snapshot exists too;
//! otherwise the example is loaded and replaces both.

use std::collections::HashSet;

use log::{debug, info, warn};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    data::{Descriptor, Schema, VarKind, VarState, json_equivalent},
    reconcile::{sanitize, strip_section_keys},
    serialize::{to_display_text, to_download_bytes, to_persisted_form},
    source::{DocumentSource, LoadError},
    store::{DEFAULTS_KEY, STATE_KEY, SessionStore},
};

/// What the last whole-state operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Constructed, not initialized yet.
    Fresh,
    /// State restored from the session snapshot.
    Restored,
    /// State and defaults taken from the example document.
    ExampleLoaded,
    /// Example unavailable; state and defaults are type defaults.
    TypeDefaults,
    /// State replaced by the defaults.
    Reset,
    /// State replaced by an imported document.
    Imported,
    /// At least one edit since the last whole-state operation.
    Edited,
}

/// One user edit.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// Replace the whole value.
    Value(Value),
    /// Text typed into the variable's control.
    Text(String),
    /// Text typed into one element of a number array.
    Element { index: usize, text: String },
    /// Replace one element of a number array.
    ElementValue { index: usize, value: Value },
}

/// Result of an edit or commit.
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    /// Fresh display rendering of the whole state.
    pub preview: String,
    /// Whether the edited key now differs from its default.
    pub modified: bool,
    /// Whether the key holds blank input waiting for [`Editor::commit`].
    pub pending: bool,
}

/// Rejected edits.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("unknown variable: {0}")]
    UnknownKey(String),

    #[error("variable is read-only: {0}")]
    ReadOnly(String),

    #[error("variable is not a number array: {0}")]
    NotAnArray(String),

    #[error("element {index} is out of range for {key} ({len} elements)")]
    IndexOutOfRange { key: String, index: usize, len: usize },

    #[error("invalid value {text:?} for {key}")]
    InvalidText { key: String, text: String },
}

type PendingSlot = (String, Option<usize>);

/// Editing context for one session.
pub struct Editor<S: SessionStore> {
    schema: Schema,
    state: VarState,
    defaults: VarState,
    store: S,
    pending: HashSet<PendingSlot>,
    preview: String,
    status: Status,
}

impl<S: SessionStore> Editor<S> {
    /// Create an editor holding type defaults. Nothing is persisted yet.
    pub fn new(schema: Schema, store: S) -> Self {
        let state = sanitize(&schema, None);
        let defaults = sanitize(&schema, None);
        let preview = to_display_text(&state);
        Self {
            schema,
            state,
            defaults,
            store,
            pending: HashSet::new(),
            preview,
            status: Status::Fresh,
        }
    }

    /// Run the startup reconciliation.
    ///
    /// `example` is only fetched when the session has no usable snapshot.
    pub async fn initialize<D: DocumentSource>(&mut self, example: &D) -> Status {
        let Some(mut saved) = self.read_snapshot(STATE_KEY) else {
            self.load_example(example).await;
            return self.status;
        };

        strip_section_keys(&self.schema, &mut saved);
        self.state = sanitize(&self.schema, Some(&saved));

        match self.read_snapshot(DEFAULTS_KEY).filter(|d| !d.is_empty()) {
            Some(defaults) => {
                self.defaults = VarState::from(defaults);
                self.status = Status::Restored;
                self.pending.clear();
                self.refresh();
                info!("Restored {} variables from session snapshot", self.state.len());
            }
            None => {
                debug!("Session state found without defaults; loading example");
                self.load_example(example).await;
            }
        }
        self.status
    }

    /// Fetch the example and make it both the state and the defaults.
    pub async fn load_example<D: DocumentSource>(&mut self, example: &D) -> Status {
        let result = example.fetch().await;
        self.load_example_result(result)
    }

    /// Apply the outcome of an example fetch.
    ///
    /// A document that is not a JSON object counts as a failed fetch.
    pub fn load_example_result(&mut self, result: Result<Value, LoadError>) -> Status {
        let doc = result.and_then(|value| match value {
            Value::Object(map) => Ok(map),
            _ => Err(LoadError::NotAnObject),
        });

        match doc {
            Ok(doc) => {
                self.state = sanitize(&self.schema, Some(&doc));
                self.defaults = sanitize(&self.schema, Some(&doc));
                self.status = Status::ExampleLoaded;
                info!("Loaded example document ({} variables)", self.state.len());
            }
            Err(e) => {
                warn!("Example document unavailable: {e}; using type defaults");
                self.state = sanitize(&self.schema, None);
                self.defaults = sanitize(&self.schema, None);
                self.status = Status::TypeDefaults;
            }
        }

        self.write_snapshot(DEFAULTS_KEY, &to_persisted_form(&self.defaults));
        self.pending.clear();
        self.refresh();
        self.status
    }

    /// Restore the last state of this session, or the defaults when the
    /// session has none.
    pub fn reset(&mut self) -> Status {
        match self.read_snapshot(STATE_KEY) {
            Some(mut saved) => {
                strip_section_keys(&self.schema, &mut saved);
                self.state = sanitize(&self.schema, Some(&saved));
                self.status = Status::Restored;
            }
            None => {
                self.state = self.defaults.clone();
                self.status = Status::Reset;
            }
        }
        self.pending.clear();
        self.refresh();
        self.status
    }

    /// Replace the state with an uploaded document, realigned to the schema.
    pub fn import_document(&mut self, doc: &Value) -> Result<Status, LoadError> {
        let Value::Object(map) = doc else {
            return Err(LoadError::NotAnObject);
        };
        let mut map = map.clone();
        strip_section_keys(&self.schema, &mut map);
        self.state = sanitize(&self.schema, Some(&map));
        self.status = Status::Imported;
        self.pending.clear();
        self.refresh();
        Ok(self.status)
    }

    /// Current value of `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// Replace the value of `key`.
    pub fn set(&mut self, key: &str, value: Value) -> Result<EditOutcome, EditError> {
        self.apply_edit(key, Edit::Value(value))
    }

    /// Apply one edit, then re-render the preview and persist the state.
    ///
    /// Blank or unparseable numeric text leaves the stored value as it is
    /// and marks the slot pending until [`commit`](Self::commit).
    pub fn apply_edit(&mut self, key: &str, edit: Edit) -> Result<EditOutcome, EditError> {
        let descriptor = editable(&self.schema, key)?;

        match edit {
            Edit::Value(value) => {
                self.state.insert(key, value);
                self.pending.remove(&(key.to_string(), None));
            }
            Edit::Text(text) => match text_value(key, descriptor, &text)? {
                Some(value) => {
                    self.state.insert(key, value);
                    self.pending.remove(&(key.to_string(), None));
                }
                None => {
                    self.pending.insert((key.to_string(), None));
                }
            },
            Edit::Element { index, text } => {
                ensure_element(key, descriptor, &self.state, index)?;
                match parse_number(&text) {
                    Some(value) => {
                        write_element(&mut self.state, key, descriptor, index, value);
                        self.pending.remove(&(key.to_string(), Some(index)));
                    }
                    None => {
                        self.pending.insert((key.to_string(), Some(index)));
                    }
                }
            }
            Edit::ElementValue { index, value } => {
                ensure_element(key, descriptor, &self.state, index)?;
                write_element(&mut self.state, key, descriptor, index, value);
                self.pending.remove(&(key.to_string(), Some(index)));
            }
        }

        self.status = Status::Edited;
        self.refresh();
        Ok(self.outcome(key))
    }

    /// Finish editing `key`: pending blank input snaps back to the default.
    pub fn commit(&mut self, key: &str) -> Result<EditOutcome, EditError> {
        let descriptor = self
            .schema
            .variable(key)
            .ok_or_else(|| EditError::UnknownKey(key.to_string()))?;

        let slots: Vec<PendingSlot> = self
            .pending
            .iter()
            .filter(|(k, _)| k == key)
            .cloned()
            .collect();

        for slot in &slots {
            match slot.1 {
                None => {
                    self.state.insert(key, descriptor.default_value());
                }
                Some(index) => {
                    let value = descriptor.default_element(index);
                    write_element(&mut self.state, key, descriptor, index, value);
                }
            }
            self.pending.remove(slot);
        }

        if !slots.is_empty() {
            self.status = Status::Edited;
            self.refresh();
        }
        Ok(self.outcome(key))
    }

    /// Whether `key` differs from its default.
    pub fn is_modified(&self, key: &str) -> bool {
        let current = self.state.get(key).unwrap_or(&Value::Null);
        let default = self.defaults.get(key).unwrap_or(&Value::Null);
        !json_equivalent(current, default)
    }

    /// Keys differing from their defaults, in schema order.
    pub fn modified_keys(&self) -> Vec<&str> {
        self.state.keys().filter(|k| self.is_modified(k)).collect()
    }

    /// Whether `key` holds blank input waiting for a commit.
    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.iter().any(|(k, _)| k == key)
    }

    /// Drop the session snapshot. The in-memory state is kept.
    pub fn end_session(&mut self) {
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear session storage: {e}");
        }
    }

    /// Current schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Current state.
    pub fn state(&self) -> &VarState {
        &self.state
    }

    /// Defaults baseline.
    pub fn defaults(&self) -> &VarState {
        &self.defaults
    }

    /// Display rendering of the current state.
    pub fn preview(&self) -> &str {
        &self.preview
    }

    /// Bytes of the exported `_global_variables.json`.
    pub fn download_bytes(&self) -> Vec<u8> {
        to_download_bytes(&self.state)
    }

    /// Status of the last operation.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Borrow the session store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn outcome(&self, key: &str) -> EditOutcome {
        EditOutcome {
            preview: self.preview.clone(),
            modified: self.is_modified(key),
            pending: self.is_pending(key),
        }
    }

    fn refresh(&mut self) {
        self.preview = to_display_text(&self.state);
        let snapshot = to_persisted_form(&self.state);
        self.write_snapshot(STATE_KEY, &snapshot);
    }

    fn read_snapshot(&self, key: &str) -> Option<Map<String, Value>> {
        let text = match self.store.get(key) {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read {key} from session storage: {e}");
                return None;
            }
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) => {
                debug!("Ignoring {key} snapshot: not a JSON object");
                None
            }
            Err(e) => {
                debug!("Ignoring malformed {key} snapshot: {e}");
                None
            }
        }
    }

    fn write_snapshot(&mut self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            warn!("Failed to write {key} to session storage: {e}");
        }
    }
}

fn editable<'a>(schema: &'a Schema, key: &str) -> Result<&'a Descriptor, EditError> {
    let descriptor = schema
        .variable(key)
        .ok_or_else(|| EditError::UnknownKey(key.to_string()))?;
    if descriptor.readonly {
        return Err(EditError::ReadOnly(key.to_string()));
    }
    Ok(descriptor)
}

/// Check that `index` addresses an element of `key`.
///
/// A number array holds `array_len()` elements, or more when the stored
/// value is already longer. Other kinds only accept element edits while
/// they hold an array, bounded by its length.
fn ensure_element(
    key: &str,
    descriptor: &Descriptor,
    state: &VarState,
    index: usize,
) -> Result<(), EditError> {
    let stored = match state.get(key) {
        Some(Value::Array(items)) => Some(items.len()),
        _ => None,
    };
    let len = match (&descriptor.kind, stored) {
        (VarKind::NumberArray, stored) => stored.unwrap_or(0).max(descriptor.array_len()),
        (_, Some(len)) => len,
        (_, None) => return Err(EditError::NotAnArray(key.to_string())),
    };
    if index < len {
        Ok(())
    } else {
        Err(EditError::IndexOutOfRange {
            key: key.to_string(),
            index,
            len,
        })
    }
}

/// Write one array element, rebuilding the array when the stored value is
/// not one. `index` must have passed [`ensure_element`]; a stored array
/// shorter than `array_len()` is padded with zeros up to it.
fn write_element(
    state: &mut VarState,
    key: &str,
    descriptor: &Descriptor,
    index: usize,
    value: Value,
) {
    if !matches!(state.get(key), Some(Value::Array(_))) {
        state.insert(key, Value::Array(vec![Value::from(0); descriptor.array_len()]));
    }
    if let Some(Value::Array(items)) = state.get_mut(key) {
        if items.len() <= index {
            items.resize(index + 1, Value::from(0));
        }
        items[index] = value;
    }
}

/// Interpret control text for `descriptor`. `Ok(None)` means "blank, wait
/// for commit".
fn text_value(key: &str, descriptor: &Descriptor, text: &str) -> Result<Option<Value>, EditError> {
    match descriptor.kind {
        VarKind::Number => Ok(parse_number(text)),
        VarKind::NumberArray => {
            let items: Option<Vec<Value>> = text
                .trim()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .split(',')
                .map(parse_number)
                .collect();
            Ok(items.map(Value::Array))
        }
        VarKind::Boolean => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "yes" | "1" => Ok(Some(Value::Bool(true))),
            "false" | "off" | "no" | "0" => Ok(Some(Value::Bool(false))),
            _ => Err(EditError::InvalidText {
                key: key.to_string(),
                text: text.to_string(),
            }),
        },
        VarKind::String | VarKind::Choice | VarKind::Untyped(_) => {
            Ok(Some(Value::String(text.to_string())))
        }
        VarKind::Section => Err(EditError::UnknownKey(key.to_string())),
    }
}

/// Parse numeric control text. Integral values are stored as integers.
pub fn parse_number(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let f = text.parse::<f64>().ok().filter(|f| f.is_finite())?;
    if f.fract() == 0.0 && f.abs() <= 9_007_199_254_740_992.0 {
        Some(Value::from(f as i64))
    } else {
        serde_json::Number::from_f64(f).map(Value::Number)
    }
}
