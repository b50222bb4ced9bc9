//! The `reqrender` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use reqrender::test_utils::WorkspaceFixture;
use std::path::Path;
use tempfile::TempDir;

/// Temporary store plus an empty config so the user's own config is never read.
struct CliProject {
    temp: TempDir,
}

impl CliProject {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        WorkspaceFixture::standard().write_to(&temp.path().join("store")).unwrap();
        std::fs::write(temp.path().join("config.toml"), "").unwrap();
        Self {
            temp,
        }
    }

    fn store(&self) -> &Path {
        self.temp.path()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("reqrender").unwrap();
        cmd.env_remove("RUST_LOG")
            .env_remove("REQRENDER_CONFIG")
            .arg("--config")
            .arg(self.temp.path().join("config.toml"));
        cmd
    }

    fn scoped(&self, subcommand: &str) -> Command {
        let mut cmd = self.command();
        cmd.arg(subcommand)
            .arg("--store")
            .arg(self.store().join("store"))
            .args(["--workspace", "wrk_1", "--request", "req_1", "--environment", "env_stage"]);
        cmd
    }
}

#[test]
fn test_render_template() {
    let project = CliProject::new();

    project
        .scoped("render")
        .arg("{{ base_url }}/{{ resource }}")
        .assert()
        .success()
        .stdout("https://staging.example.com/users\n");
}

#[test]
fn test_render_json_document() {
    let project = CliProject::new();

    project
        .scoped("render")
        .arg("--json")
        .arg(r#"{"url": "{{ api }}", "_id": "{{ keep }}"}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""url": "https://staging.example.com/v1""#))
        .stdout(predicate::str::contains(r#""_id": "{{ keep }}""#));
}

#[test]
fn test_render_template_from_stdin() {
    let project = CliProject::new();

    project
        .scoped("render")
        .arg("-")
        .write_stdin("user={{ auth.user }}")
        .assert()
        .success()
        .stdout("user=alice\n");
}

#[test]
fn test_undefined_variable_reports_suggestion() {
    let project = CliProject::new();

    project
        .scoped("render")
        .arg("{{ base_ur }}")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Template variable not found: 'base_ur'"))
        .stderr(predicate::str::contains("base_url"));
}

#[test]
fn test_template_failure_is_reported_once() {
    let project = CliProject::new();

    let output = project.scoped("render").arg("GET {{ base_url }}\nX-Page: {{ pag }}").output().unwrap();
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("Template variable not found: 'pag'").count(), 1);
    assert!(stderr.contains(">    2 | X-Page: {{ pag }}"));
    assert!(stderr.contains("page"));
    assert!(!stderr.contains("ERROR: Template Variable Not Found"));
}

#[test]
fn test_context_keys() {
    let project = CliProject::new();

    project
        .scoped("context")
        .arg("--keys")
        .assert()
        .success()
        .stdout(predicate::str::contains("auth.token"))
        .stdout(predicate::str::contains("\"stage\""));
}

#[test]
fn test_context_json_lists_ancestors() {
    let project = CliProject::new();

    let output = project.scoped("context").output().unwrap();
    assert!(output.status.success());

    let context: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<&str> = context["ancestors"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|doc| doc["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["req_1", "fld_inner", "fld_outer", "wrk_1"]);
    assert_eq!(context["bindings"]["page"], 2);
}

#[test]
fn test_missing_request_fails() {
    let project = CliProject::new();

    project
        .command()
        .args(["context", "--workspace", "wrk_1", "--request", "req_nope", "--store"])
        .arg(project.store().join("store"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("req_nope"));
}

#[test]
fn test_store_required() {
    let project = CliProject::new();

    project
        .command()
        .args(["render", "--workspace", "wrk_1", "plain"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No document store given"));
}

#[test]
fn test_store_dir_from_config() {
    let project = CliProject::new();
    let config = format!("store_dir = {:?}\n", project.store().join("store").to_string_lossy());
    std::fs::write(project.temp.path().join("config.toml"), config).unwrap();

    project
        .command()
        .args(["render", "--workspace", "wrk_1", "{{ auth.token }}"])
        .assert()
        .success()
        .stdout("base\n");
}
