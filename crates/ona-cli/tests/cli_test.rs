//! Integration tests for the `ona` binary against a fake engine.

use std::io::Write;
use std::process::{Command, Output, Stdio};

use ona_test_utils::FakeEngine;

fn ona(engine: &FakeEngine, config_home: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ona"));
    cmd.env("XDG_CONFIG_HOME", config_home)
        .env_remove("ONA_BINARY")
        .env_remove("ONA_HOME")
        .env_remove("ONA_DEADLINE_MS")
        .env_remove("ONA_IDLE_GRACE_MS")
        .arg("--binary")
        .arg(engine.path())
        .arg("--working-dir")
        .arg(engine.dir())
        .args(["--deadline-ms", "2000", "--idle-grace-ms", "100"]);
    cmd
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn run_prints_transcript_and_execution_summary() {
    let engine = FakeEngine::ona_like();
    let home = tempfile::tempdir().unwrap();
    let script = home.path().join("script.nal");
    std::fs::write(
        &script,
        "// warm up\n<a --> b>.\n\ng! :|:\ng! :|:\n5\n",
    )
    .unwrap();

    let output = ona(&engine, home.path())
        .arg("run")
        .arg(&script)
        .output()
        .unwrap();
    let out = stdout(&output);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(out.contains("Input: <a --> b>."), "got: {out}");
    assert!(out.contains("4 commands sent"), "got: {out}");
    assert!(out.contains("^left"), "got: {out}");
    assert!(out.lines().any(|l| l.trim_start().starts_with("^left") && l.trim_end().ends_with(" 2")), "got: {out}");
}

#[test]
fn run_quiet_prints_only_summary() {
    let engine = FakeEngine::ona_like();
    let home = tempfile::tempdir().unwrap();
    let script = home.path().join("script.nal");
    std::fs::write(&script, "<a --> b>.\n").unwrap();

    let output = ona(&engine, home.path())
        .arg("run")
        .arg(&script)
        .arg("--quiet")
        .output()
        .unwrap();
    let out = stdout(&output);
    assert!(output.status.success());
    assert!(!out.contains("Input:"), "got: {out}");
    assert!(out.contains("no operator executions"), "got: {out}");
}

#[test]
fn stats_prints_json_snapshot() {
    let engine = FakeEngine::ona_like();
    let home = tempfile::tempdir().unwrap();

    let output = ona(&engine, home.path()).arg("stats").output().unwrap();
    assert!(output.status.success());
    let stats: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(stats["currentTime"], 42);
    assert_eq!(stats["average_concept_priority"], 0.57);
}

#[test]
fn shell_json_emits_one_reply_per_command() {
    let engine = FakeEngine::ona_like();
    let home = tempfile::tempdir().unwrap();

    let mut child = ona(&engine, home.path())
        .args(["shell", "--json"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"<a --> b>.\n\n*stats\nquit\n<never --> sent>.\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let out = stdout(&output);
    let replies: Vec<serde_json::Value> = out
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(replies.len(), 2, "got: {out}");
    assert_eq!(replies[0]["input"][0]["term"], "<a --> b>");
    assert_eq!(replies[1]["currentTime"], 42);
}

#[test]
fn missing_engine_fails_with_location() {
    let home = tempfile::tempdir().unwrap();
    let missing = home.path().join("no-engine-here");

    let output = Command::new(env!("CARGO_BIN_EXE_ona"))
        .env("XDG_CONFIG_HOME", home.path())
        .arg("--binary")
        .arg(&missing)
        .arg("stats")
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no-engine-here"), "stderr: {stderr}");
}

#[test]
fn init_writes_config_and_refuses_overwrite() {
    let engine = FakeEngine::ona_like();
    let home = tempfile::tempdir().unwrap();

    let first = ona(&engine, home.path()).arg("init").output().unwrap();
    assert!(first.status.success());
    let written = std::fs::read_to_string(home.path().join("ona").join("config.toml")).unwrap();
    assert!(written.contains("[engine]"), "got: {written}");
    assert!(written.contains("deadline_ms = 2000"), "got: {written}");

    let second = ona(&engine, home.path()).arg("init").output().unwrap();
    assert!(!second.status.success());

    let forced = ona(&engine, home.path())
        .args(["init", "--force"])
        .output()
        .unwrap();
    assert!(forced.status.success());
}
