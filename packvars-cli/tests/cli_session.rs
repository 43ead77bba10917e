use std::path::Path;
use std::process::{Command, Output};

use serde_json::{Value, json};

const SCHEMA: &str = r#"{
  "pageName": "HUD",
  "variables": {
    "general": { "type": "section", "label": "General" },
    "show_fps": { "type": "boolean" },
    "scale": { "type": "number", "min": 0, "max": 4 },
    "offset": { "type": "number_array", "count": 2 },
    "title": { "type": "string" },
    "theme": { "type": "choice", "choice_2": "dark", "choice_1": "light" },
    "build": { "type": "string", "readonly": true }
  }
}"#;

const EXAMPLE: &str = r#"{
  "show_fps": true,
  "scale": 2,
  "offset": [4, 8],
  "title": "Main",
  "theme": "dark",
  "build": "1.0",
  "leftover": 1
}"#;

fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("schema.json"), SCHEMA).unwrap();
    std::fs::write(dir.path().join("example.json"), EXAMPLE).unwrap();
    std::fs::write(
        dir.path().join(".packvars.toml"),
        "schema = \"schema.json\"\nexample = \"example.json\"\n",
    )
    .unwrap();
    dir
}

fn run_cli(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_packvars"))
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("failed to run packvars CLI")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn show_prints_example_aligned_to_schema() {
    let dir = project();
    let output = run_cli(dir.path(), &["show"]);
    assert!(output.status.success());

    let text = stdout(&output);
    assert!(text.contains("\"offset\": [4, 8]"));
    assert!(!text.contains("leftover"));
    assert!(!text.contains("general"));

    let doc: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(doc["theme"], json!("dark"));
}

#[test]
fn edits_persist_across_invocations() {
    let dir = project();
    assert!(run_cli(dir.path(), &["set", "scale", "3"]).status.success());
    assert!(
        run_cli(dir.path(), &["set-element", "offset", "1", "10"])
            .status
            .success()
    );
    assert!(run_cli(dir.path(), &["set", "title", "123"]).status.success());

    let get = run_cli(dir.path(), &["get", "scale"]);
    assert_eq!(stdout(&get).trim(), "3");

    let get = run_cli(dir.path(), &["get", "title"]);
    assert_eq!(stdout(&get).trim(), "\"123\"");

    let modified = stdout(&run_cli(dir.path(), &["show", "--modified"]));
    assert!(modified.contains("scale"));
    assert!(modified.contains("offset"));
    assert!(!modified.contains("show_fps"));
}

#[test]
fn sessions_are_isolated() {
    let dir = project();
    assert!(
        run_cli(dir.path(), &["-s", "a", "set", "show_fps", "false"])
            .status
            .success()
    );

    let a = stdout(&run_cli(dir.path(), &["-s", "a", "get", "show_fps"]));
    let b = stdout(&run_cli(dir.path(), &["-s", "b", "get", "show_fps"]));
    assert_eq!(a.trim(), "false");
    assert_eq!(b.trim(), "true");
}

#[test]
fn clear_ends_the_session() {
    let dir = project();
    assert!(run_cli(dir.path(), &["set", "scale", "1"]).status.success());
    assert!(run_cli(dir.path(), &["clear"]).status.success());

    let get = run_cli(dir.path(), &["get", "scale"]);
    assert_eq!(stdout(&get).trim(), "2");
}

#[test]
fn rejected_edits_fail() {
    let dir = project();
    assert!(!run_cli(dir.path(), &["set", "build", "\"2.0\""]).status.success());
    assert!(!run_cli(dir.path(), &["set", "nope", "1"]).status.success());
    assert!(!run_cli(dir.path(), &["get", "nope"]).status.success());
}

#[test]
fn export_writes_download_file() {
    let dir = project();
    assert!(run_cli(dir.path(), &["set", "theme", "light"]).status.success());
    assert!(run_cli(dir.path(), &["export"]).status.success());

    let bytes = std::fs::read_to_string(dir.path().join("_global_variables.json")).unwrap();
    assert!(bytes.ends_with("}\n"));
    let doc: Value = serde_json::from_str(&bytes).unwrap();
    assert_eq!(doc["theme"], json!("light"));
    assert_eq!(doc.as_object().unwrap().len(), 6);

    let target = dir.path().join("out/vars.json");
    let target_arg = target.to_string_lossy().to_string();
    assert!(
        run_cli(dir.path(), &["export", "-o", &target_arg])
            .status
            .success()
    );
    assert_eq!(std::fs::read_to_string(&target).unwrap(), bytes);
}

#[test]
fn import_keeps_only_schema_keys() {
    let dir = project();
    std::fs::write(
        dir.path().join("upload.json"),
        r#"{ "scale": 4, "stray": true, "general": 1 }"#,
    )
    .unwrap();
    assert!(run_cli(dir.path(), &["import", "upload.json"]).status.success());

    let doc: Value = serde_json::from_str(&stdout(&run_cli(dir.path(), &["show"]))).unwrap();
    assert_eq!(doc["scale"], json!(4));
    assert_eq!(doc["show_fps"], json!(false));
    assert!(doc.get("stray").is_none());
    assert!(doc.get("general").is_none());
}

#[test]
fn missing_example_falls_back_to_type_defaults() {
    let dir = project();
    std::fs::remove_file(dir.path().join("example.json")).unwrap();

    let output = run_cli(dir.path(), &["show"]);
    assert!(output.status.success());
    let doc: Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(doc["offset"], json!([0, 0]));
    assert_eq!(doc["theme"], json!("light"));
    assert_eq!(doc["title"], json!(""));
}

#[test]
fn describe_lists_sections_and_flags() {
    let dir = project();
    let text = stdout(&run_cli(dir.path(), &["describe"]));
    assert!(text.contains("HUD"));
    assert!(text.contains("General"));
    assert!(text.contains("build (string) [readonly]"));
    assert!(text.contains("choices: light, dark"));
}

#[test]
fn unparseable_numbers_are_rejected() {
    let dir = project();
    let output = run_cli(dir.path(), &["set", "scale", "abc"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("abc"));
    assert!(!run_cli(dir.path(), &["set-element", "offset", "0", "x"]).status.success());

    assert_eq!(stdout(&run_cli(dir.path(), &["get", "scale"])).trim(), "2");
    assert_eq!(stdout(&run_cli(dir.path(), &["get", "offset"])).trim(), "[4, 8]");
}

#[test]
fn blank_number_commits_to_descriptor_default() {
    let dir = project();
    assert!(run_cli(dir.path(), &["set", "scale", "3"]).status.success());
    assert!(run_cli(dir.path(), &["set", "scale", ""]).status.success());
    assert_eq!(stdout(&run_cli(dir.path(), &["get", "scale"])).trim(), "0");
}

#[test]
fn element_index_past_count_fails() {
    let dir = project();
    let output = run_cli(dir.path(), &["set-element", "offset", "2", "1"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("out of range"));
    assert_eq!(stdout(&run_cli(dir.path(), &["get", "offset"])).trim(), "[4, 8]");
}
