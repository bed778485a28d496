//! Integration tests for aq CLI.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn aq_cmd(root: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_aq"));
    cmd.env("AMBIT_ROOT", root);
    cmd
}

fn aq(root: &Path, args: &[&str]) -> Output {
    aq_cmd(root).args(args).output().expect("failed to run aq")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn init_ambit(root: &Path) {
    let output = aq(root, &["init"]);
    assert!(output.status.success(), "aq init failed: {:?}", output);
}

fn load(root: &Path, resource_type: &str, json: &str) {
    let file = root.join(format!("{}.json", resource_type));
    std::fs::write(&file, json).unwrap();
    let output = aq(root, &["load", resource_type, file.to_str().unwrap()]);
    assert!(output.status.success(), "aq load failed: {:?}", output);
}

fn seed(root: &Path) {
    init_ambit(root);
    load(root, "clusters", r#"[{"Clusters/cluster_name": "c1"}]"#);
    load(
        root,
        "hosts",
        r#"[
            {"Hosts/cluster_name": "c1", "Hosts/host_name": "h1", "Hosts/cpu_count": 2},
            {"Hosts/cluster_name": "c1", "Hosts/host_name": "h2", "Hosts/cpu_count": 8},
            {"Hosts/cluster_name": "c1", "Hosts/host_name": "h3", "Hosts/cpu_count": 16}
        ]"#,
    );
    load(
        root,
        "host_components",
        r#"[{
            "HostRoles/cluster_name": "c1",
            "HostRoles/service_name": "HDFS",
            "HostRoles/component_name": "DATANODE",
            "HostRoles/host_name": "h2",
            "HostRoles/state": "STARTED"
        }]"#,
    );
}

fn get_json(root: &Path, args: &[&str]) -> serde_json::Value {
    let output = aq(root, args);
    assert!(output.status.success(), "aq get failed: {:?}", output);
    serde_json::from_str(&stdout(&output)).expect("aq get printed invalid JSON")
}

fn host_names(json: &serde_json::Value) -> Vec<String> {
    json["items"]
        .as_array()
        .expect("no items")
        .iter()
        .map(|item| item["Hosts"]["host_name"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_init() {
    let tmp = TempDir::new().unwrap();
    init_ambit(tmp.path());

    assert!(tmp.path().join("db/ambit.duckdb").exists());
    assert!(tmp.path().join("config.toml").exists());

    // a second init leaves the store alone
    let output = aq(tmp.path(), &["init"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("already initialized"));
}

#[test]
fn test_lex() {
    let tmp = TempDir::new().unwrap();
    let output = aq(tmp.path(), &["lex", "a<=1&fields=x,y"]);
    assert!(output.status.success());
    let lines: Vec<String> = stdout(&output).lines().map(str::to_string).collect();
    assert_eq!(lines, vec!["Property(a)", "RelationalOp(<=)", "Value(1)"]);
}

#[test]
fn test_parse() {
    let tmp = TempDir::new().unwrap();
    let output = aq(tmp.path(), &["parse", "Hosts/host_name.in(h1,h2)&!Hosts/cpu_count<4"]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output).trim(),
        "((Hosts/host_name=h1|Hosts/host_name=h2)&!Hosts/cpu_count<4)"
    );

    let output = aq(tmp.path(), &["parse", "fields=Hosts/host_name"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "No predicate.");
}

#[test]
fn test_parse_json() {
    let tmp = TempDir::new().unwrap();
    let output = aq(tmp.path(), &["parse", "--json", "a=1"]);
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["Comparison"]["op"], "=");
}

#[test]
fn test_parse_invalid_query() {
    let tmp = TempDir::new().unwrap();
    let output = aq(tmp.path(), &["parse", "foo=1&&5=2"]);
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Error: Unable to compile query predicate: "));
}

#[test]
fn test_check() {
    let tmp = TempDir::new().unwrap();
    let output = aq(tmp.path(), &["check", "Host", "Hosts/host_name", "metrics/cpu"]);
    assert!(output.status.success(), "{:?}", output);

    let output = aq(tmp.path(), &["check", "hosts", "Hosts/host_name", "Hosts/bogus"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Hosts/bogus"));

    let output = aq(tmp.path(), &["check", "widgets", "a"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Unknown resource type: widgets"));
}

#[test]
fn test_get_requires_init() {
    let tmp = TempDir::new().unwrap();
    let output = aq(tmp.path(), &["get", "/api/v1/clusters"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Not initialized"));
}

#[test]
fn test_get_collection() {
    let tmp = TempDir::new().unwrap();
    seed(tmp.path());

    let json = get_json(tmp.path(), &["get", "/api/v1/clusters/c1/hosts"]);
    assert_eq!(json["href"], "/api/v1/clusters/c1/hosts");
    assert_eq!(host_names(&json), vec!["h1", "h2", "h3"]);
    assert_eq!(json["items"][0]["href"], "/api/v1/clusters/c1/hosts/h1");
}

#[test]
fn test_get_with_query() {
    let tmp = TempDir::new().unwrap();
    seed(tmp.path());

    // numeric comparison: "16" > "4" even though it sorts lower as text
    let json = get_json(tmp.path(), &["get", "/api/v1/clusters/c1/hosts?Hosts/cpu_count>4"]);
    assert_eq!(host_names(&json), vec!["h2", "h3"]);

    let json = get_json(
        tmp.path(),
        &["get", "/api/v1/clusters/c1/hosts?Hosts/host_name=h1|Hosts/host_name=h3"],
    );
    assert_eq!(host_names(&json), vec!["h1", "h3"]);
}

#[test]
fn test_get_body_query_overrides_uri() {
    let tmp = TempDir::new().unwrap();
    seed(tmp.path());

    let json = get_json(
        tmp.path(),
        &[
            "get",
            "/api/v1/clusters/c1/hosts?Hosts/host_name=h1",
            "--body-query",
            "Hosts/host_name=h2",
        ],
    );
    assert_eq!(host_names(&json), vec!["h2"]);
}

#[test]
fn test_get_single_with_sub_resources() {
    let tmp = TempDir::new().unwrap();
    seed(tmp.path());

    let json = get_json(tmp.path(), &["get", "/api/v1/clusters/c1/hosts/h2"]);
    assert_eq!(json["href"], "/api/v1/clusters/c1/hosts/h2");
    assert_eq!(json["Hosts"]["cpu_count"], "8");

    let components = json["host_components"].as_array().unwrap();
    assert_eq!(components.len(), 1);
    assert_eq!(
        components[0]["href"],
        "/api/v1/clusters/c1/hosts/h2/host_components/DATANODE"
    );
    assert!(components[0]["HostRoles"].get("state").is_none());
}

#[test]
fn test_get_sub_resource_fields() {
    let tmp = TempDir::new().unwrap();
    seed(tmp.path());

    let json = get_json(
        tmp.path(),
        &["get", "/api/v1/clusters/c1/hosts?fields=host_components/*"],
    );
    assert_eq!(host_names(&json), vec!["h1", "h2", "h3"]);
    let h2 = &json["items"][1];
    assert!(h2["Hosts"].get("cpu_count").is_none());
    assert_eq!(h2["host_components"][0]["HostRoles"]["state"], "STARTED");
}

#[test]
fn test_get_body_query_keeps_uri_fields() {
    let tmp = TempDir::new().unwrap();
    seed(tmp.path());

    let json = get_json(
        tmp.path(),
        &[
            "get",
            "/api/v1/clusters/c1/hosts?fields=Hosts/cpu_count",
            "--body-query",
            "(Hosts/host_name=h3&_=1)",
        ],
    );
    assert_eq!(host_names(&json), vec!["h3"]);
    assert_eq!(json["items"][0]["Hosts"]["cpu_count"], "16");
}

#[test]
fn test_get_missing_resource() {
    let tmp = TempDir::new().unwrap();
    seed(tmp.path());

    let output = aq(tmp.path(), &["get", "/api/v1/clusters/c1/hosts/h9"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Not found"));
}

#[test]
fn test_get_invalid_query() {
    let tmp = TempDir::new().unwrap();
    seed(tmp.path());

    let output = aq(tmp.path(), &["get", "/api/v1/clusters/c1/hosts?Hosts/host_name=h1)"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Error: Unable to compile query predicate: "));
}

#[test]
fn test_load_rejects_missing_key() {
    let tmp = TempDir::new().unwrap();
    init_ambit(tmp.path());

    let file = tmp.path().join("bad.json");
    std::fs::write(&file, r#"[{"Hosts/cluster_name": "c1"}]"#).unwrap();
    let output = aq(tmp.path(), &["load", "Host", file.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Missing key property Hosts/host_name"));
}
