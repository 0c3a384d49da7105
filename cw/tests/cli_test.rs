//! CLI tests for the `cw` binary

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command with logs and user config redirected into a temp dir
fn cw(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("cw").expect("binary builds");
    cmd.current_dir(home)
        .env("HOME", home)
        .env("XDG_DATA_HOME", home.join("data"))
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    cw(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("replay"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_config_prints_defaults() {
    let home = TempDir::new().unwrap();
    cw(home.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("channel-buffer: 1000"))
        .stdout(predicate::str::contains("scheduler: direct"));
}

#[test]
fn test_config_reads_local_file() {
    let home = TempDir::new().unwrap();
    fs::write(
        home.path().join(".clusterwatch.yml"),
        "watchdog:\n  expected-servers: 7\n",
    )
    .unwrap();

    cw(home.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("expected-servers: 7"));
}

#[test]
fn test_config_explicit_missing_file_fails() {
    let home = TempDir::new().unwrap();
    cw(home.path())
        .args(["config", "--config", "nope.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_replay_script() {
    let home = TempDir::new().unwrap();
    let script = home.path().join("session.jsonl");
    fs::write(
        &script,
        r#"# one connector, one monitor
{"op": "request", "agent": "m1", "msg": {"action": "subscribe", "id": "m1"}}
{"op": "register", "record": {"id": "connector-1", "serverType": "connector"}}
{"op": "request", "msg": {"action": "query"}}
{"op": "request", "msg": {"action": "record", "id": "connector-1"}}
{"op": "push", "batch": {"req-id": 1, "route": "onChat", "msg": "hi", "recvs": [4]}}
"#,
    )
    .unwrap();

    cw(home.path())
        .arg("replay")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""output":"event""#))
        .stdout(predicate::str::contains(r#""action":"addServer""#))
        .stdout(predicate::str::contains(r#""output":"silent""#))
        .stdout(predicate::str::contains(r#""delivery":"single""#))
        .stdout(predicate::str::contains(r#""output":"metrics""#));
}

#[test]
fn test_replay_from_stdin() {
    let home = TempDir::new().unwrap();
    cw(home.path())
        .args(["replay", "-"])
        .write_stdin("{\"op\": \"disconnect\", \"id\": \"s9\", \"type\": \"connector\"}\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""event":"disconnect""#));
}

#[test]
fn test_replay_bad_script_fails() {
    let home = TempDir::new().unwrap();
    cw(home.path())
        .args(["replay", "-"])
        .write_stdin("{\"op\": \"teleport\"}\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 1"));
}

#[test]
fn test_log_level_from_flag_writes_log() {
    let home = TempDir::new().unwrap();
    cw(home.path())
        .args(["--log-level", "debug", "config"])
        .assert()
        .success();

    let log = home
        .path()
        .join("data")
        .join("clusterwatch")
        .join("logs")
        .join("clusterwatch.log");
    let content = fs::read_to_string(log).unwrap();
    assert!(content.contains("Logging initialized"));
}
