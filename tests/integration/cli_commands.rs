#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::{json, Value};
use tempfile::TempDir;

fn write_records(dir: &TempDir, name: &str, records: &Value) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, serde_json::to_string(records).expect("serialize records"))
        .expect("write records file");
    path
}

fn sample_records() -> Value {
    json!([
        { "@id": "A", "history": { "prime": "root" }, "title": "First draft" },
        { "@id": "B", "history": { "previous": "A" } },
        { "@id": "C", "history": { "previous": "A" }, "createdAt": "2024-01-02" },
        { "@id": "D", "history": { "previous": "A" }, "createdAt": "2024-01-01" }
    ])
}

fn decode(output: Vec<u8>) -> String {
    String::from_utf8(output).expect("utf8 output")
}

#[test]
fn tree_renders_roots_before_children() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_records(&dir, "records.json", &sample_records());
    let output = cargo_bin_cmd!("stemma")
        .arg("tree")
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = decode(output);

    let root = text.find("A <A>").expect("root line");
    let newest = text.find("  C <C>").expect("newest child line");
    let middle = text.find("  D <D>").expect("middle child line");
    let undated = text.find("  B <B>").expect("undated child line");
    assert!(root < newest && newest < middle && middle < undated);
    // Dated versions carry an age, undated ones do not.
    assert!(text.contains("  C <C> ("));
    assert!(text.lines().any(|line| line.trim_end() == "  B <B>"));
}

#[test]
fn tree_emits_json() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_records(&dir, "records.json", &sample_records());
    let output = cargo_bin_cmd!("stemma")
        .args(["--format", "json", "tree"])
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let graph: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(graph["roots"], json!(["A"]));
    assert_eq!(graph["children"]["A"], json!(["C", "D", "B"]));
    assert_eq!(graph["nodes"]["B"]["history"]["previous"], json!("A"));
}

#[test]
fn tree_reports_an_empty_dataset() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_records(&dir, "records.json", &json!([]));
    let output = cargo_bin_cmd!("stemma")
        .arg("tree")
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(decode(output).trim(), "no versions");
}

#[test]
fn tree_lists_flat_when_the_history_is_fully_cyclic() {
    let dir = TempDir::new().expect("tempdir");
    let records = json!([
        { "@id": "A", "history": { "previous": "B" } },
        { "@id": "B", "history": { "previous": "A" } }
    ]);
    let path = write_records(&dir, "records.json", &records);
    let output = cargo_bin_cmd!("stemma")
        .arg("tree")
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = decode(output);
    assert!(text.contains("no entry points; listing 2 versions"));
    assert!(text.contains("- A <A>"));
    assert!(text.contains("- B <B>"));
}

#[test]
fn shared_descendants_render_under_each_parent() {
    let dir = TempDir::new().expect("tempdir");
    let records = json!([
        { "@id": "base", "history": { "prime": "root" } },
        { "@id": "left", "history": { "previous": "base" } },
        { "@id": "right", "history": { "previous": "base", "next": ["merged"] } },
        { "@id": "merged", "history": { "previous": "left" } }
    ]);
    let path = write_records(&dir, "records.json", &records);
    let output = cargo_bin_cmd!("stemma")
        .arg("tree")
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = decode(output);
    // A diamond is not a cycle: the shared version appears once under each
    // of its parents, unmarked.
    assert_eq!(text.matches("merged <merged>").count(), 2);
    assert!(!text.contains("(cycle)"));
}

#[test]
fn back_edges_reachable_from_a_root_get_the_cycle_marker() {
    let dir = TempDir::new().expect("tempdir");
    let records = json!([
        { "@id": "A", "history": { "prime": "root", "next": ["B"] } },
        { "@id": "B", "history": { "previous": "A", "next": ["C"] } },
        { "@id": "C", "history": { "previous": "B", "next": ["B"] } }
    ]);
    let path = write_records(&dir, "records.json", &records);
    let output = cargo_bin_cmd!("stemma")
        .arg("tree")
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = decode(output);
    assert!(text.contains("B <B> (cycle)"));
    assert_eq!(text.matches("(cycle)").count(), 1);
}

#[test]
fn label_key_flag_changes_displayed_labels() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_records(&dir, "records.json", &sample_records());
    let output = cargo_bin_cmd!("stemma")
        .args(["--label-key", "title", "tree"])
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = decode(output);
    assert!(text.contains("First draft <A>"));
    // Records without the field fall back to their identifier tail.
    assert!(text.contains("  B <B>"));
}

#[test]
fn inspect_reports_a_version_and_its_relationships() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_records(&dir, "records.json", &sample_records());
    let output = cargo_bin_cmd!("stemma")
        .arg("inspect")
        .arg(&path)
        .arg("B")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = decode(output);
    assert!(text.contains("id:       B"));
    assert!(text.contains("parent:   A"));
    assert!(text.contains("children: -"));
}

#[test]
fn inspect_emits_json() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_records(&dir, "records.json", &sample_records());
    let output = cargo_bin_cmd!("stemma")
        .args(["--format", "json", "inspect"])
        .arg(&path)
        .arg("A")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let summary: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(summary["id"], json!("A"));
    assert_eq!(summary["children"], json!(["C", "D", "B"]));
    assert_eq!(summary["parent"], Value::Null);
    assert_eq!(summary["record"]["title"], json!("First draft"));
}

#[test]
fn inspect_fails_for_an_unknown_id() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_records(&dir, "records.json", &sample_records());
    let output = cargo_bin_cmd!("stemma")
        .arg("inspect")
        .arg(&path)
        .arg("nope")
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(decode(output).contains("unknown version id 'nope'"));
}

#[test]
fn summaries_lists_every_version_in_node_order() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_records(&dir, "records.json", &sample_records());
    let output = cargo_bin_cmd!("stemma")
        .arg("summaries")
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = decode(output);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("A: "));
    assert!(lines[0].contains("children=3"));
    assert!(lines[1].starts_with("B: "));
    assert!(lines[1].contains("parent=A"));
}

#[test]
fn summaries_emit_json_with_labels() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_records(&dir, "records.json", &sample_records());
    let output = cargo_bin_cmd!("stemma")
        .args(["--format", "json", "--label-key", "title", "summaries"])
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let list: Value = serde_json::from_slice(&output).expect("valid json");
    let entries = list.as_array().expect("array of summaries");
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0]["label"], json!("First draft"));
    assert_eq!(entries[1]["label"], json!("B"));
}

#[test]
fn wrapped_store_payload_files_are_accepted() {
    let dir = TempDir::new().expect("tempdir");
    let wrapped = json!({ "items": sample_records() });
    let path = write_records(&dir, "payload.json", &wrapped);
    let output = cargo_bin_cmd!("stemma")
        .args(["--format", "json", "tree"])
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let graph: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(graph["roots"], json!(["A"]));
}

#[test]
fn malformed_records_files_fail_cleanly() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("broken.json");
    fs::write(&path, "not json at all").expect("write file");
    let output = cargo_bin_cmd!("stemma")
        .arg("tree")
        .arg(&path)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(decode(output).contains("error: malformed records payload"));
}
