use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

const VALID_KEY: &str = "0x0707070707070707070707070707070707070707070707070707070707070707";

/// A command isolated from the caller's environment and config files.
fn stashpass(dir: &Path) -> Command {
    let config = dir.join("config.toml");
    std::fs::write(&config, "").unwrap();

    let mut cmd = Command::cargo_bin("stashpass").unwrap();
    for var in [
        "SUI_NETWORK",
        "SUI_RPC_URL",
        "SUI_PACKAGE_ID",
        "SUI_PRIVATE_KEY",
        "SUI_PROTOCOL_TREASURY_ID",
        "PRIVATE_KEY",
        "STASHPASS_CONFIG",
        "STASHPASS_DEPLOYMENT",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("NO_COLOR", "1")
        .arg("--config")
        .arg(&config)
        .arg("--deployment")
        .arg(dir.join("deployment.json"));
    cmd
}

#[test]
fn help_lists_lifecycle_commands() {
    let dir = tempfile::tempdir().unwrap();
    stashpass(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("create-event")
                .and(predicate::str::contains("stamp"))
                .and(predicate::str::contains("evolve"))
                .and(predicate::str::contains("verify-souvenir"))
                .and(predicate::str::contains("whoami")),
        );
}

#[test]
fn bad_private_key_fails_before_any_network_call() {
    let dir = tempfile::tempdir().unwrap();
    stashpass(dir.path())
        .args(["--package-id", "0x2", "--rpc-url", "http://127.0.0.1:9"])
        .args(["--private-key", "definitely-not-a-key", "whoami"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Key decode"));
}

#[test]
fn missing_package_id_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    stashpass(dir.path())
        .args(["--private-key", VALID_KEY, "stats", "--machine", "0xa1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("package id not configured"));
}

#[test]
fn malformed_object_id_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    stashpass(dir.path())
        .args(["stamp", "--ticket", "0xnothex", "--booth", "0xb1"])
        .assert()
        .code(2);
}

#[test]
fn simulated_setup_writes_a_deployment_record() {
    let dir = tempfile::tempdir().unwrap();
    let record = dir.path().join("sim-record.json");
    stashpass(dir.path())
        .args(["--simulate", "--private-key", VALID_KEY, "-o", "json"])
        .args(["setup", "--booth", "Main Gate", "--booth", "Workshop", "--record"])
        .arg(&record)
        .assert()
        .success()
        .stdout(predicate::str::contains("machine_id"));

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&record).unwrap()).unwrap();
    assert!(written.get("ORGANIZER_CAP_ID").is_some());
    assert_eq!(written["BOOTHS"].as_array().map(Vec::len), Some(2));
}
