//! Integration tests for the `tagbridge` binary.
//!
//! These cover argument parsing, configuration errors and exit codes
//! without a controller or a row store.
#![allow(clippy::unwrap_used)]

use std::io::Write;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::NamedTempFile;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the binary with env isolation.
///
/// Clears `TAGBRIDGE_*` overrides and points config directories at a
/// nonexistent path so tests never read a real configuration.
fn tagbridge_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("tagbridge");
    cmd.env("HOME", "/tmp/tagbridge-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/tagbridge-cli-test-nonexistent")
        .env_remove("RUST_LOG")
        .env_remove("TAGBRIDGE_CONFIG")
        .env_remove("TAGBRIDGE_LOG_FORMAT")
        .env_remove("TAGBRIDGE_SINK__API_KEY")
        .env_remove("TAGBRIDGE_SINK__URL")
        .env_remove("TAGBRIDGE_CONTROLLER__ADDRESS")
        .env_remove("TAGBRIDGE_TEST_STORE_KEY");
    cmd
}

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

const LOG_SINK: &str = "[sink]\nkind = \"log\"\n";

const KEYLESS_STORE: &str = r#"
[sink]
url = "https://store.example.co"
api_key_env = "TAGBRIDGE_TEST_STORE_KEY"
"#;

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    tagbridge_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("tag catalog")
            .and(predicate::str::contains("--dry-run"))
            .and(predicate::str::contains("check-config")),
    );
}

#[test]
fn test_version_flag() {
    tagbridge_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tagbridge"));
}

#[test]
fn test_unknown_flag_is_usage_error() {
    tagbridge_cmd().arg("--bogus").assert().code(2);
}

// ── check-config ────────────────────────────────────────────────────

#[test]
fn test_check_config_lists_reference_catalog() {
    let file = config_file(LOG_SINK);
    tagbridge_cmd()
        .arg("--config")
        .arg(file.path())
        .arg("check-config")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("192.168.1.10")
                .and(predicate::str::contains("12 tags"))
                .and(predicate::str::contains("Data[10]"))
                .and(predicate::str::contains("Rpm")),
        );
}

#[test]
fn test_check_config_print_masks_api_key() {
    let file = config_file(
        "[sink]\nurl = \"https://store.example.co\"\napi_key = \"super-secret\"\n",
    );
    tagbridge_cmd()
        .arg("--config")
        .arg(file.path())
        .args(["check-config", "--print"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("super-secret")
                .not()
                .and(predicate::str::contains("[controller]")),
        );
}

#[test]
fn test_missing_config_file_exits_3() {
    tagbridge_cmd()
        .args(["--config", "/tmp/tagbridge-cli-test-nonexistent/none.toml"])
        .arg("check-config")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_invalid_value_exits_3() {
    let file = config_file("[sink]\nkind = \"log\"\n[retry]\nmax_attempts = 0\n");
    tagbridge_cmd()
        .arg("--config")
        .arg(file.path())
        .arg("check-config")
        .assert()
        .code(3);
}

#[test]
fn test_missing_credentials_exits_4() {
    let file = config_file(KEYLESS_STORE);
    tagbridge_cmd()
        .arg("--config")
        .arg(file.path())
        .arg("check-config")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("No API key"));
}

#[test]
fn test_run_without_credentials_exits_4_before_connecting() {
    let file = config_file(KEYLESS_STORE);
    tagbridge_cmd()
        .arg("--config")
        .arg(file.path())
        .assert()
        .code(4);
}

#[test]
fn test_api_key_from_named_env_var() {
    let file = config_file(KEYLESS_STORE);
    tagbridge_cmd()
        .env("TAGBRIDGE_TEST_STORE_KEY", "from-env")
        .arg("--config")
        .arg(file.path())
        .arg("check-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("store.example.co"));
}

#[test]
fn test_dry_run_needs_no_credentials() {
    let file = config_file(KEYLESS_STORE);
    tagbridge_cmd()
        .arg("--config")
        .arg(file.path())
        .args(["--dry-run", "check-config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dry run"));
}

// ── run ─────────────────────────────────────────────────────────────

#[test]
fn test_unreachable_controller_exits_7() {
    // Port 9 (discard) is closed on test hosts, so every connect is refused.
    let file = config_file(
        r#"
[controller]
address = "http://127.0.0.1:9"
timeout = "2s"

[retry]
max_attempts = 2
initial_delay = "10ms"

[sink]
kind = "log"
"#,
    );
    tagbridge_cmd()
        .arg("--config")
        .arg(file.path())
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .code(7)
        .stderr(predicate::str::contains("Gave up connecting"));
}
