//! Filtering arbitrary documents down to the current schema.
//!
//! [`sanitize`] is the whitelist every state passes through: the result holds
//! exactly the schema's variable keys, in schema order, whatever the input.

use serde_json::{Map, Value};

use crate::data::{Schema, VarState};

/// Realign `source` to `schema`.
///
/// Each variable key takes the source's own value verbatim when present and
/// the descriptor default otherwise. Source keys unknown to the schema are
/// dropped.
pub fn sanitize(schema: &Schema, source: Option<&Map<String, Value>>) -> VarState {
    let mut state = VarState::new();
    for (key, descriptor) in schema.variables() {
        let value = match source.and_then(|doc| doc.get(key)) {
            Some(value) => value.clone(),
            None => descriptor.default_value(),
        };
        state.insert(key, value);
    }
    state
}

/// Remove keys the current schema describes as sections.
///
/// Keys the schema no longer knows are left for [`sanitize`] to drop.
pub fn strip_section_keys(schema: &Schema, doc: &mut Map<String, Value>) {
    doc.retain(|key, _| !schema.is_section(key));
}
