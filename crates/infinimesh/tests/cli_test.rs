//! Integration tests for the `infinimesh` CLI binary.
//!
//! Argument parsing, help output, completions, configuration handling and
//! error exit codes -- none of these need a live gateway.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a command for the `infinimesh` binary with env isolation.
///
/// Clears all `INFINIMESH_*` variables and points config directories at
/// `home` so tests never touch the user's real configuration.
fn infinimesh_cmd(home: &std::path::Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("infinimesh");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("INFINIMESH_PROFILE")
        .env_remove("INFINIMESH_ENDPOINT")
        .env_remove("INFINIMESH_TOKEN")
        .env_remove("INFINIMESH_OUTPUT")
        .env_remove("INFINIMESH_INSECURE")
        .env_remove("INFINIMESH_TIMEOUT")
        .env_remove("INFINIMESH_DEFAULT_PROFILE")
        .env_remove("RUST_LOG");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = infinimesh_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    infinimesh_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("devices")
                .and(predicate::str::contains("shadow"))
                .and(predicate::str::contains("config"))
                .and(predicate::str::contains("completions")),
        );
}

#[test]
fn test_version_flag() {
    let home = tempfile::tempdir().unwrap();
    infinimesh_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("infinimesh"));
}

#[test]
fn test_shadow_help_lists_operations() {
    let home = tempfile::tempdir().unwrap();
    infinimesh_cmd(home.path())
        .args(["shadow", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("get")
                .and(predicate::str::contains("watch"))
                .and(predicate::str::contains("patch")),
        );
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    let home = tempfile::tempdir().unwrap();
    infinimesh_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    let home = tempfile::tempdir().unwrap();
    infinimesh_cmd(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Argument validation ─────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let home = tempfile::tempdir().unwrap();
    let output = infinimesh_cmd(home.path()).arg("foobar").output().unwrap();
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("foobar"));
}

#[test]
fn test_invalid_output_format() {
    let home = tempfile::tempdir().unwrap();
    let output = infinimesh_cmd(home.path())
        .args(["--output", "xml", "devices", "list"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("possible values"));
}

#[test]
fn test_shadow_get_requires_devices() {
    let home = tempfile::tempdir().unwrap();
    infinimesh_cmd(home.path())
        .args(["shadow", "get"])
        .assert()
        .code(2);
}

#[test]
fn test_patch_requires_exactly_one_target() {
    let home = tempfile::tempdir().unwrap();
    infinimesh_cmd(home.path())
        .args(["shadow", "patch", "dev-1", r#"{"led":"on"}"#])
        .assert()
        .code(2);

    infinimesh_cmd(home.path())
        .args([
            "shadow",
            "patch",
            "dev-1",
            "--desired",
            "--reported",
            r#"{"led":"on"}"#,
        ])
        .assert()
        .code(2);
}

#[test]
fn test_patch_requires_payload() {
    let home = tempfile::tempdir().unwrap();
    infinimesh_cmd(home.path())
        .args(["shadow", "patch", "dev-1", "--desired"])
        .assert()
        .code(2);
}

// ── Configuration ───────────────────────────────────────────────────

#[test]
fn test_devices_list_without_config() {
    let home = tempfile::tempdir().unwrap();
    infinimesh_cmd(home.path())
        .args(["devices", "list"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("endpoint"));
}

#[test]
fn test_endpoint_without_token_is_auth_error() {
    let home = tempfile::tempdir().unwrap();
    infinimesh_cmd(home.path())
        .args(["--endpoint", "https://gw.invalid", "devices", "list"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("token"));
}

#[test]
fn test_unknown_profile_is_reported() {
    let home = tempfile::tempdir().unwrap();
    infinimesh_cmd(home.path())
        .args(["--profile", "nope", "shadow", "get", "dev-1"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn test_config_show_without_file() {
    let home = tempfile::tempdir().unwrap();
    infinimesh_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[defaults]"));
}

#[test]
fn test_config_path_points_into_config_home() {
    let home = tempfile::tempdir().unwrap();
    infinimesh_cmd(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_set_then_show_json() {
    let home = tempfile::tempdir().unwrap();
    infinimesh_cmd(home.path())
        .args(["config", "set", "endpoint", "https://api.example.com"])
        .assert()
        .success();
    infinimesh_cmd(home.path())
        .args(["config", "set", "namespace", "infinimesh"])
        .assert()
        .success();

    let output = infinimesh_cmd(home.path())
        .args(["--output", "json", "config", "show"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let shown: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        shown["profiles"]["default"]["endpoint"],
        "https://api.example.com"
    );
    assert_eq!(shown["profiles"]["default"]["namespace"], "infinimesh");
}

#[test]
fn test_config_set_rejects_bad_values() {
    let home = tempfile::tempdir().unwrap();
    infinimesh_cmd(home.path())
        .args(["config", "set", "timeout", "soon"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("timeout"));

    infinimesh_cmd(home.path())
        .args(["config", "set", "token", "plaintext"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("set-token"));
}
