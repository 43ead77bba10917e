//! Text renderings of a [`VarState`].
//!
//! The display form is the document shipped in the resource pack: two-space
//! indented JSON where arrays of primitives stay on one line, e.g.
//!
//! ```text
//! {
//!   "offset": [0, 1, -0.5],
//!   "enabled": true
//! }
//! ```

use serde_json::Value;

use crate::data::VarState;

/// File name of the exported document.
pub const DOWNLOAD_FILE_NAME: &str = "_global_variables.json";

const INDENT: &str = "  ";

/// Indented rendering with primitive arrays collapsed onto one line.
pub fn to_display_text(state: &VarState) -> String {
    let mut out = String::new();
    write_object(&mut out, state.iter(), state.len(), 0);
    out
}

/// Compact rendering used for session snapshots.
pub fn to_persisted_form(state: &VarState) -> String {
    state.to_value().to_string()
}

/// Display rendering followed by one newline, as UTF-8 bytes.
pub fn to_download_bytes(state: &VarState) -> Vec<u8> {
    let mut text = to_display_text(state);
    text.push('\n');
    text.into_bytes()
}

/// Render any JSON value with the display conventions.
pub fn value_to_display_text(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, 0);
    out
}

fn write_value(out: &mut String, value: &Value, depth: usize) {
    match value {
        Value::Array(items) => write_array(out, items, depth),
        Value::Object(map) => write_object(
            out,
            map.iter().map(|(k, v)| (k.as_str(), v)),
            map.len(),
            depth,
        ),
        // Display on scalars is serde_json's own compact encoder, escaping included.
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_array(out: &mut String, items: &[Value], depth: usize) {
    if items.is_empty() {
        out.push_str("[]");
        return;
    }

    if items.iter().all(is_scalar) {
        out.push('[');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&item.to_string());
        }
        out.push(']');
        return;
    }

    out.push_str("[\n");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(",\n");
        }
        push_indent(out, depth + 1);
        write_value(out, item, depth + 1);
    }
    out.push('\n');
    push_indent(out, depth);
    out.push(']');
}

fn write_object<'a>(
    out: &mut String,
    entries: impl Iterator<Item = (&'a str, &'a Value)>,
    len: usize,
    depth: usize,
) {
    if len == 0 {
        out.push_str("{}");
        return;
    }

    out.push_str("{\n");
    for (i, (key, value)) in entries.enumerate() {
        if i > 0 {
            out.push_str(",\n");
        }
        push_indent(out, depth + 1);
        out.push_str(&Value::from(key).to_string());
        out.push_str(": ");
        write_value(out, value, depth + 1);
    }
    out.push('\n');
    push_indent(out, depth);
    out.push('}');
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}
