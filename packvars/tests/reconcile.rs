use packvars::{
    Schema,
    data::{Descriptor, default_value_for},
    reconcile::sanitize,
};
use serde_json::{Value, json};

fn schema() -> Schema {
    Schema::from_value(&json!({
        "pageName": "HUD",
        "variables": {
            "hud_section": {"type": "section", "label": "HUD"},
            "show_fps": {"type": "boolean"},
            "scale": {"type": "number", "default": 1.25, "min": 0.5, "max": 2},
            "offset": {"type": "number_array", "count": 2},
            "title": {"type": "string"},
            "theme": {"type": "choice", "choice_2": "dark", "choice_1": "light"},
            "legacy": {"type": "gradient"}
        }
    }))
}

fn variable_keys(schema: &Schema) -> Vec<&str> {
    schema.variable_keys().collect()
}

#[test]
fn key_set_matches_schema_for_any_source() {
    let schema = schema();
    let sources = [
        None,
        Some(json!({})),
        Some(json!({"show_fps": true, "unrelated": 1})),
        Some(json!({"hud_section": 3, "theme": "dark", "offset": [4, 5, 6]})),
    ];
    for source in &sources {
        let state = sanitize(&schema, source.as_ref().and_then(Value::as_object));
        assert_eq!(state.keys().collect::<Vec<_>>(), variable_keys(&schema));
    }
}

#[test]
fn own_values_are_copied_without_coercion() {
    let schema = schema();
    let doc = json!({"scale": "large", "offset": [1], "show_fps": null});
    let state = sanitize(&schema, doc.as_object());
    assert_eq!(state.get("scale"), Some(&json!("large")));
    assert_eq!(state.get("offset"), Some(&json!([1])));
    assert_eq!(state.get("show_fps"), Some(&Value::Null));
}

#[test]
fn missing_values_take_descriptor_defaults() {
    let schema = schema();
    let state = sanitize(&schema, None);
    for (key, descriptor) in schema.variables() {
        assert_eq!(state.get(key), Some(&default_value_for(Some(descriptor))));
    }
    assert_eq!(
        state.to_value(),
        json!({
            "show_fps": false,
            "scale": 1.25,
            "offset": [0, 0],
            "title": "",
            "theme": "light",
            "legacy": null
        })
    );
}

#[test]
fn sanitize_is_idempotent() {
    let schema = schema();
    let doc = json!({"title": "Hi", "extra": [1, 2], "offset": [9, 9]});
    let once = sanitize(&schema, doc.as_object());
    let twice = sanitize(&schema, Some(once.as_map()));
    assert_eq!(once, twice);
}

#[test]
fn choice_descriptor_resolution() {
    let d = Descriptor::from_value(&json!({"choice_2": "B", "choice_1": "A"}));
    assert_eq!(d.choices, vec!["A", "B"]);
    let d = Descriptor::from_value(&json!({"choices": ["X", "Y"], "choice_1": "A"}));
    assert_eq!(d.choices, vec!["X", "Y"]);
}
