use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const CTM_VARS: [&str; 7] = [
    "CTM_FROM_ORG",
    "CTM_TO_ORG",
    "CTM_FROM_TOKEN",
    "CTM_TO_TOKEN",
    "CTM_TO_WEBSITE",
    "CTM_TO_SECTION",
    "CTM_CONFIG_PATH",
];

/// A `ctm` command isolated from the caller's environment and `.env` file
fn ctm(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ctm").unwrap();
    cmd.current_dir(dir.path());
    for var in CTM_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn tenant_args() -> [&'static str; 6] {
    ["--from-org", "devtraining", "--from-token", "s", "--to-token", "t"]
}

#[test]
fn test_cli_help() {
    let dir = TempDir::new().unwrap();
    ctm(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("move content objects between tenants"))
        .stdout(predicate::str::contains("story"))
        .stdout(predicate::str::contains("redirects"));
}

#[test]
fn test_cli_version() {
    let dir = TempDir::new().unwrap();
    ctm(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ctm"));
}

#[test]
fn test_missing_tenant_arguments() {
    let dir = TempDir::new().unwrap();
    ctm(&dir)
        .args(["story", "STORY1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--from-org"));
}

#[test]
fn test_invalid_format_is_rejected() {
    let dir = TempDir::new().unwrap();
    ctm(&dir)
        .args(["--format", "xml", "image", "IMG1"])
        .args(tenant_args())
        .assert()
        .failure()
        .stderr(predicate::str::contains("xml"));
}

#[test]
fn test_production_requires_destination_org() {
    let dir = TempDir::new().unwrap();
    ctm(&dir)
        .args(["story", "STORY1"])
        .args(tenant_args())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--to-org is required"));
}

#[test]
fn test_malformed_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("broken.yaml"), "id: [unclosed").unwrap();

    ctm(&dir)
        .args(["--config", "broken.yaml", "author", "jdoe", "--to-org", "cetest"])
        .args(tenant_args())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_config_path_from_environment() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("custom.yaml"),
        "id: migrate\nname: Migration\nprovider: ctm\nversion: 1.0.0\nvalues:\n  request_timeout_secs: never\n",
    )
    .unwrap();

    ctm(&dir)
        .env("CTM_CONFIG_PATH", "custom.yaml")
        .args(["authors", "--to-org", "cetest"])
        .args(tenant_args())
        .assert()
        .failure()
        .stderr(predicate::str::contains("request_timeout_secs"));
}

#[test]
fn test_limit_must_be_a_number() {
    let dir = TempDir::new().unwrap();
    ctm(&dir)
        .args(["authors", "--limit", "many"])
        .args(tenant_args())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--limit"));
}
