//! Engine process handle.
//!
//! Spawns `<binary> shell` with piped stdin/stdout, hands stdout to an
//! [`OutputDrain`], and owns stdin for command writes.
//!
//! ```text
//! ProcessHandle::start(config)
//!     |
//!     +-- spawn child (kill_on_drop) -- stdin --> write_line()
//!     |                                 stdout --> OutputDrain --> mpsc --> BatchReader
//!     |
//!     +-- discard banner, state = Running
//!
//! terminate(): quit -> wait grace -> SIGTERM -> SIGKILL, state = Terminated
//! ```

pub mod drain;

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, trace, warn};

use crate::batch::BatchReader;
use crate::config::EngineConfig;
use crate::error::{OnaError, Result};

pub use drain::OutputDrain;

/// How long to wait after SIGTERM before escalating to SIGKILL.
const SIGTERM_GRACE: Duration = Duration::from_millis(250);

/// Lifecycle of an engine process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Starting,
    Running,
    Terminating,
    Terminated,
}

/// Exclusive owner of one engine process and its stdin.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    /// `Option` so `terminate` can close the pipe by dropping it.
    stdin: Option<ChildStdin>,
    pid: Option<u32>,
    state: Lifecycle,
    drain: OutputDrain,
    quit_command: String,
    terminate_grace: Duration,
}

impl ProcessHandle {
    /// Spawn the engine and discard its welcome banner.
    ///
    /// Returns the handle together with the [`BatchReader`] bound to the
    /// process's output.
    pub async fn start(config: &EngineConfig) -> Result<(Self, BatchReader)> {
        let binary = config.resolve_binary()?;
        // The child runs in `working_dir`, so a relative program path would
        // be resolved against the wrong directory.
        let program = std::fs::canonicalize(&binary).unwrap_or_else(|_| binary.clone());

        let mut cmd = Command::new(&program);
        cmd.args(&config.args)
            .current_dir(&config.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(OnaError::Spawn)?;
        let pid = child.id();
        let stdin = child.stdin.take();
        let stdout = child.stdout.take().ok_or_else(|| {
            OnaError::Spawn(std::io::Error::other("engine stdout was not captured"))
        })?;

        let (drain, rx) = OutputDrain::spawn(stdout);
        let mut reader = BatchReader::new(rx);

        let mut handle = Self {
            child,
            stdin,
            pid,
            state: Lifecycle::Starting,
            drain,
            quit_command: config.quit_command.clone(),
            terminate_grace: config.terminate_grace,
        };
        debug!(pid = ?handle.pid, binary = %program.display(), "engine spawned");

        let banner = reader
            .drain_idle(config.banner_idle, config.banner_max)
            .await;
        debug!(pid = ?handle.pid, lines = banner.len(), "discarded startup banner");

        handle.state = Lifecycle::Running;
        Ok((handle, reader))
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    /// Check whether the OS process is still alive.
    pub fn is_running(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(Some(_status)) => false,
            Ok(None) => true,
            Err(e) => {
                warn!(pid = ?self.pid, error = %e, "error checking engine status");
                false
            }
        }
    }

    /// Write `text` followed by a newline and flush.
    pub async fn write_line(&mut self, text: &str) -> Result<()> {
        if self.state != Lifecycle::Running {
            return Err(OnaError::connection_lost(format!(
                "engine is {:?}",
                self.state
            )));
        }
        if let Ok(Some(status)) = self.child.try_wait() {
            return Err(OnaError::connection_lost(format!(
                "engine exited ({status})"
            )));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| OnaError::connection_lost("engine stdin is closed"))?;

        let mut payload = String::with_capacity(text.len() + 1);
        payload.push_str(text);
        payload.push('\n');

        stdin
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| OnaError::connection_lost(format!("write to engine failed: {e}")))?;
        stdin
            .flush()
            .await
            .map_err(|e| OnaError::connection_lost(format!("flush to engine failed: {e}")))?;

        trace!(pid = ?self.pid, command = text, "wrote command");
        Ok(())
    }

    /// Stop the engine. Best effort and idempotent: never fails.
    pub async fn terminate(&mut self) {
        if self.state == Lifecycle::Terminated {
            return;
        }
        self.state = Lifecycle::Terminating;
        let pid = self.pid;

        if let Some(mut stdin) = self.stdin.take() {
            let quit = format!("{}\n", self.quit_command);
            if let Err(e) = stdin.write_all(quit.as_bytes()).await {
                debug!(?pid, error = %e, "could not send quit command");
            }
            let _ = stdin.flush().await;
            // Dropping stdin closes the pipe, which also ends most shells.
        }

        match tokio::time::timeout(self.terminate_grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(?pid, %status, "engine exited after quit");
            }
            _ => {
                #[cfg(unix)]
                {
                    if let Some(raw) = pid {
                        // SAFETY: raw is the pid of a child we spawned and
                        // have not yet reaped.
                        let ret = unsafe { libc::kill(raw as i32, libc::SIGTERM) };
                        if ret != 0 {
                            warn!(pid = raw, "SIGTERM failed, proceeding to SIGKILL");
                        }
                    }
                }

                match tokio::time::timeout(SIGTERM_GRACE, self.child.wait()).await {
                    Ok(Ok(_status)) => {
                        debug!(?pid, "engine exited after SIGTERM");
                    }
                    _ => {
                        debug!(?pid, "engine still alive, sending SIGKILL");
                        let _ = self.child.kill().await;
                    }
                }
            }
        }

        self.drain.stop();
        self.state = Lifecycle::Terminated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::batch::TerminationPolicy;

    fn write_script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    fn config_for(script: &Path, dir: &Path) -> EngineConfig {
        let mut cfg = EngineConfig::new(script).with_working_dir(dir);
        cfg.terminate_grace = Duration::from_millis(500);
        cfg.policy = TerminationPolicy::new(Duration::from_secs(2), Duration::from_millis(100));
        cfg
    }

    #[tokio::test]
    async fn start_discards_banner_and_runs() {
        let tmp = tempfile::tempdir().unwrap();
        let script = write_script(
            tmp.path(),
            "banner.sh",
            "echo 'Welcome to the engine'\necho '//banner'\nwhile IFS= read -r line; do\n  [ \"$line\" = quit ] && exit 0\n  echo \"got $line\"\ndone\n",
        );

        let (mut handle, mut reader) = ProcessHandle::start(&config_for(&script, tmp.path()))
            .await
            .unwrap();
        assert_eq!(handle.state(), Lifecycle::Running);
        assert!(handle.pid().is_some());

        handle.write_line("ping").await.unwrap();
        let batch = reader.read_batch(&TerminationPolicy::default()).await;
        assert_eq!(batch.lines, vec!["got ping"]);

        handle.terminate().await;
        assert_eq!(handle.state(), Lifecycle::Terminated);
    }

    #[tokio::test]
    async fn start_runs_in_working_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let work = tmp.path().join("root");
        std::fs::create_dir(&work).unwrap();
        let script = write_script(
            tmp.path(),
            "pwd.sh",
            "while IFS= read -r line; do\n  [ \"$line\" = quit ] && exit 0\n  pwd\ndone\n",
        );

        let (mut handle, mut reader) = ProcessHandle::start(&config_for(&script, &work))
            .await
            .unwrap();
        handle.write_line("where").await.unwrap();
        let batch = reader.read_batch(&TerminationPolicy::default()).await;

        let expected = work.canonicalize().unwrap();
        let reported = std::path::PathBuf::from(&batch.lines[0])
            .canonicalize()
            .unwrap();
        assert_eq!(reported, expected);
        handle.terminate().await;
    }

    #[tokio::test]
    async fn missing_binary_is_configuration_error() {
        let cfg = EngineConfig::new("/nonexistent/path/to/ona");
        let err = ProcessHandle::start(&cfg).await.unwrap_err();
        assert!(matches!(err, OnaError::Configuration { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn write_after_exit_is_connection_lost() {
        let tmp = tempfile::tempdir().unwrap();
        let script = write_script(tmp.path(), "quick.sh", "exit 0\n");

        let (mut handle, _reader) = ProcessHandle::start(&config_for(&script, tmp.path()))
            .await
            .unwrap();

        // Poll until the process exits (with a timeout to avoid hanging).
        for _ in 0..20 {
            if !handle.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let err = handle.write_line("late").await.unwrap_err();
        assert!(matches!(err, OnaError::ConnectionLost { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn terminate_kills_engine_that_ignores_quit() {
        let tmp = tempfile::tempdir().unwrap();
        let script = write_script(tmp.path(), "stubborn.sh", "trap '' TERM\nexec sleep 3600\n");

        let (mut handle, _reader) = ProcessHandle::start(&config_for(&script, tmp.path()))
            .await
            .unwrap();
        assert!(handle.is_running());

        handle.terminate().await;
        assert_eq!(handle.state(), Lifecycle::Terminated);
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn terminate_twice_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let script = write_script(
            tmp.path(),
            "polite.sh",
            "while IFS= read -r line; do\n  [ \"$line\" = quit ] && exit 0\ndone\n",
        );

        let (mut handle, _reader) = ProcessHandle::start(&config_for(&script, tmp.path()))
            .await
            .unwrap();
        handle.terminate().await;
        handle.terminate().await;
        assert_eq!(handle.state(), Lifecycle::Terminated);

        let err = handle.write_line("after").await.unwrap_err();
        assert!(matches!(err, OnaError::ConnectionLost { .. }));
    }
}
