//! Command-line smoke tests; none of these reach the network.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Workspace with a definitions file whose first template directory exists.
fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("templates/python_service")).unwrap();
    std::fs::write(
        dir.path().join("templates/python_service/.gitlab-ci.yml"),
        "stages: [build]\n",
    )
    .unwrap();
    std::fs::create_dir_all(dir.path().join("Config")).unwrap();
    std::fs::write(
        dir.path().join("Config/pipeline_definitions.yml"),
        r#"
pipelines:
  python_service:
    description: Python web service on OpenShift
    template_path: templates/python_service
    required_env: [OPENSHIFT_SERVER, OPENSHIFT_TOKEN]
    files_to_create: [.gitlab-ci.yml]
  javascript_package:
    template_path: templates/javascript_package
    required_env: []
    files_to_create: [.gitlab-ci.yml]
"#,
    )
    .unwrap();
    dir
}

fn pipeops(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pipeops").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("GITLAB_TOKEN")
        .env("RUST_LOG", "off");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    pipeops(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("monitor"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("list"));
}

#[test]
fn test_version_flag() {
    let dir = TempDir::new().unwrap();
    pipeops(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pipeops"));
}

#[test]
fn test_validate_marks_template_directories() {
    let dir = workspace();
    pipeops(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("Found 2 pipeline types"))
        .stdout(predicate::str::contains("✅ python_service"))
        .stdout(predicate::str::contains("❌ javascript_package"));
}

#[test]
fn test_validate_fails_for_missing_file() {
    let dir = TempDir::new().unwrap();
    pipeops(&dir)
        .args(["validate", "--config", "absent.yml"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Configuration validation failed"));
}

#[test]
fn test_list_shows_descriptions() {
    let dir = workspace();
    pipeops(&dir)
        .args(["list", "-c", "Config/pipeline_definitions.yml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("🔧 python_service"))
        .stdout(predicate::str::contains("Python web service on OpenShift"))
        .stdout(predicate::str::contains("Template: templates/python_service"));
}

#[test]
fn test_init_rejects_non_http_url() {
    let dir = workspace();
    pipeops(&dir)
        .args([
            "init",
            "--project-url",
            "gitlab.example.com/team/billing-api",
            "--token",
            "glpat-0123456789",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("http:// or https://"));
}

#[test]
fn test_init_rejects_short_token() {
    let dir = workspace();
    pipeops(&dir)
        .args([
            "init",
            "-p",
            "https://gitlab.example.com/team/billing-api",
            "-t",
            "abc",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("too short"));
}

#[test]
fn test_init_requires_a_token() {
    let dir = workspace();
    pipeops(&dir)
        .args(["init", "-p", "https://gitlab.example.com/team/billing-api"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--token"));
}
