#![allow(missing_docs)]

use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

struct Workspace {
    _dir: TempDir,
    db: PathBuf,
    config: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let db = dir.path().join("catalog.db");
        let config = dir.path().join("cli.toml");
        Self {
            _dir: dir,
            db,
            config,
        }
    }

    fn ground(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("ground");
        cmd.env_remove("GROUND_DB")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(&self.config)
            .arg("--theme")
            .arg("plain");
        cmd
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self
            .ground()
            .arg("--db")
            .arg(&self.db)
            .args(["--format", "json"])
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).expect("valid json")
    }
}

fn id_of(value: &Value) -> String {
    value["id"].as_u64().expect("numeric id").to_string()
}

fn ids(value: &Value) -> Vec<u64> {
    value
        .as_array()
        .expect("array")
        .iter()
        .map(|id| id.as_u64().expect("numeric id"))
        .collect()
}

#[test]
fn init_creates_the_catalog_file() {
    let ws = Workspace::new();
    ws.ground().arg("--db").arg(&ws.db).arg("init").assert().success();
    assert!(ws.db.exists());
}

#[test]
fn missing_database_is_reported() {
    let ws = Workspace::new();
    let output = ws
        .ground()
        .args(["leaves", "1"])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8_lossy(&output);
    assert!(stderr.contains("no catalog file given"), "{stderr}");
}

#[test]
fn versions_leaves_and_truncation() {
    let ws = Workspace::new();
    let node = ws.json(&[
        "item", "create", "node", "--name", "orders", "--source-key", "orders", "--tag",
        "owner=string:ops",
    ]);
    assert_eq!(node["kind"], "node");
    assert_eq!(node["tags"][0]["key"], "owner");
    let node_id = id_of(&node);
    let node_id = node_id.as_str();

    let v1 = id_of(&ws.json(&["version", "create", node_id, "--tag", "rows=long:10"]));
    let v2 = id_of(&ws.json(&["version", "create", node_id, "--parent", v1.as_str()]));
    let v3 = id_of(&ws.json(&[
        "version",
        "create",
        node_id,
        "--parent",
        v2.as_str(),
        "--reference",
        "s3://b/o",
        "--param",
        "region=eu",
    ]));

    let leaves = ws.json(&["leaves", node_id]);
    assert_eq!(ids(&leaves), vec![v3.parse::<u64>().expect("id")]);

    let shown = ws.json(&["version", "show", "node", v3.as_str()]);
    assert_eq!(shown["reference"], "s3://b/o");
    assert_eq!(shown["reference_parameters"]["region"], "eu");

    let report = ws.json(&["truncate", node_id, "--levels", "1"]);
    let deleted = ids(&report["deleted_versions"]);
    assert_eq!(deleted.len(), 2);
    assert!(deleted.contains(&v1.parse::<u64>().expect("id")));

    let history = ws.json(&["history", node_id]);
    assert_eq!(history["edges"].as_array().expect("edges").len(), 1);
    assert_eq!(history["edges"][0]["from_id"], 0);
}

#[test]
fn search_and_find_by_source_key() {
    let ws = Workspace::new();
    let node = ws.json(&[
        "item", "create", "node", "--name", "orders", "--source-key", "orders", "--tag", "pii",
    ]);
    let found = ws.json(&["item", "find", "node", "orders"]);
    assert_eq!(found["id"], node["id"]);

    let hits = ws.json(&["search", "items", "pii"]);
    assert_eq!(hits.as_array().expect("array").len(), 1);
    assert!(ws.json(&["search", "versions", "pii"]).as_array().expect("array").is_empty());
}

#[test]
fn config_set_database_is_used_by_later_commands() {
    let ws = Workspace::new();
    ws.ground()
        .args(["config", "set-database"])
        .arg(&ws.db)
        .assert()
        .success();
    assert!(ws.config.exists());

    let output = ws
        .ground()
        .args(["--format", "json", "item", "create", "lineage-edge", "--name", "etl"])
        .args(["--source-key", "etl"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let item: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(item["kind"], "lineage_edge");
    assert!(ws.db.exists());
}

#[test]
fn edge_creation_requires_endpoints() {
    let ws = Workspace::new();
    let output = ws
        .ground()
        .arg("--db")
        .arg(&ws.db)
        .args(["item", "create", "edge", "--name", "e", "--source-key", "e"])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("--from-node"));
}

#[test]
fn text_history_shows_parents_and_leaves() {
    let ws = Workspace::new();
    let node = id_of(&ws.json(&[
        "item", "create", "node", "--name", "orders", "--source-key", "orders",
    ]));
    let v1 = id_of(&ws.json(&["version", "create", node.as_str()]));
    let v2 = id_of(&ws.json(&["version", "create", node.as_str(), "--parent", v1.as_str()]));

    let output = ws
        .ground()
        .arg("--db")
        .arg(&ws.db)
        .args(["history", node.as_str()])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8_lossy(&output);
    assert!(text.starts_with(&format!("History of item {node}\n")), "{text}");
    assert!(text.contains(&format!("{v1} <- root\n")), "{text}");
    assert!(text.contains(&format!("{v2} <- {v1}  (leaf)\n")), "{text}");
}
