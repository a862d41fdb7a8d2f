//! Shared test utilities for ona integration tests.
//!
//! Provides fake engines: small `/bin/sh` scripts that speak enough of the
//! engine's line protocol to drive the client without a real engine build.
//! Each fake lives in its own temporary directory, removed on drop.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ona_client::{EngineConfig, TerminationPolicy};
use tempfile::TempDir;

/// Stats block printed by [`FakeEngine::ona_like`] for `*stats`.
pub const FAKE_STATS: &[&str] = &[
    "Statistics",
    "currentTime: 42",
    "total concepts: 3",
    "average concept priority: 0.57",
    "note: something odd",
];

/// Reason printed by [`FakeEngine::ona_like`] before executing `^left`.
pub const FAKE_REASON: &str = "decision expectation=0.616961 implication: <(a &/ ^left) =/> g>. Truth: frequency=0.978 confidence=0.290 dt=1.0 precondition: a. :|: Truth: frequency=1.0 confidence=0.9 occurrenceTime=5";

/// A fake engine script on disk.
pub struct FakeEngine {
    dir: TempDir,
    script: PathBuf,
}

impl FakeEngine {
    /// Write `body` as an executable shell script.
    pub fn new(body: &str) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir for fake engine");
        let script = dir.path().join("fake-ona");
        std::fs::write(&script, format!("#!/bin/sh\n{body}"))
            .expect("failed to write fake engine script");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
                .expect("failed to make fake engine executable");
        }

        Self { dir, script }
    }

    /// Engine that answers the way the real shell does for a handful of
    /// inputs:
    ///
    /// - `0` prints the cycle completion marker
    /// - a bare number prints a short inference trace
    /// - `*stats` prints [`FAKE_STATS`]; other `*` commands print nothing
    /// - a question echoes as input and answers `None.`
    /// - an event goal (`... ! :|:`) prints [`FAKE_REASON`] and runs `^left`
    /// - `pick!` runs `^pick` and waits for the operation's result line
    /// - `crash` exits with status 3
    /// - anything else echoes as input
    pub fn ona_like() -> Self {
        let stats: Vec<String> = FAKE_STATS.iter().map(|l| format!("'{l}'")).collect();
        Self::new(&format!(
            r#"echo "Welcome to the fake engine"
echo "//banner line"
while IFS= read -r line; do
  case "$line" in
    quit) exit 0 ;;
    crash) exit 3 ;;
    0) echo "done with 0 additional inference steps." ;;
    '*stats') printf '%s\n' {stats} ;;
    '*'*) ;;
    *'! :|:')
      echo '{FAKE_REASON}'
      echo "^left executed with args ({{SELF}} * ball) desire=0.616961"
      ;;
    'pick!')
      echo "^pick executed with args"
      echo "//Operation result product expected:"
      IFS= read -r _result
      ;;
    *'?')
      echo "Input: $line Priority=1.000000"
      echo "Answer: None."
      ;;
    *[!0-9]*) echo "Input: $line Priority=1.000000 Truth: frequency=1.000000, confidence=0.900000" ;;
    *)
      echo "performing $line inference steps"
      echo "done with $line additional inference steps."
      ;;
  esac
done
"#,
            stats = stats.join(" "),
        ))
    }

    /// Engine that tags every output line with the index of the command that
    /// caused it: `batch <n>: ...`.
    pub fn tagging() -> Self {
        Self::new(
            r#"n=0
while IFS= read -r line; do
  case "$line" in
    quit) exit 0 ;;
    0) echo "done with 0 additional inference steps." ;;
    *)
      n=$((n + 1))
      echo "batch $n: $line"
      echo "batch $n: derived"
      echo "batch $n: more"
      ;;
  esac
done
"#,
        )
    }

    /// Engine whose `slow` command prints `slow: head`, pauses for 300 ms,
    /// then prints `slow: tail`. Any other command prints `reply: <command>`.
    pub fn slow_tail() -> Self {
        Self::new(
            r#"while IFS= read -r line; do
  case "$line" in
    quit) exit 0 ;;
    0) echo "done with 0 additional inference steps." ;;
    slow)
      echo "slow: head"
      sleep 0.3
      echo "slow: tail"
      ;;
    *) echo "reply: $line" ;;
  esac
done
"#,
        )
    }

    /// Engine that prints `lines` after the first command, then never
    /// prints again nor exits on `quit`.
    pub fn stalling(lines: &[&str]) -> Self {
        let echoes: Vec<String> = lines.iter().map(|l| format!("echo '{l}'")).collect();
        Self::new(&format!(
            "IFS= read -r _first\n{}\nexec sleep 3600\n",
            echoes.join("\n")
        ))
    }

    pub fn path(&self) -> &Path {
        &self.script
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Client config pointed at this engine, with short timings and no
    /// initial commands.
    pub fn config(&self) -> EngineConfig {
        let mut config = EngineConfig::new(&self.script)
            .with_working_dir(self.dir.path())
            .with_policy(TerminationPolicy::new(
                Duration::from_secs(2),
                Duration::from_millis(100),
            ));
        config.initial_commands.clear();
        config.terminate_grace = Duration::from_millis(500);
        config
    }
}
