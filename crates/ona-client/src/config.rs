use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::batch::TerminationPolicy;
use crate::error::{OnaError, Result};

/// Engine configuration.
///
/// Reads `ONA_BINARY` and `ONA_HOME` from the environment, falling back to an
/// `ona` binary inside the current directory.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Engine executable. Bare names are looked up on `$PATH` and then in
    /// [`Self::working_dir`]; relative paths are relative to the working dir.
    pub binary: PathBuf,
    /// Arguments passed to the binary. Defaults to the interactive shell mode.
    pub args: Vec<String>,
    /// Engine root, used as the child's current directory.
    pub working_dir: PathBuf,
    /// Deadline and idle grace applied to every command's batch.
    pub policy: TerminationPolicy,
    /// Idle gap that ends the startup banner discard.
    pub banner_idle: Duration,
    /// Upper bound on the startup banner discard.
    pub banner_max: Duration,
    /// How long `terminate` waits for a natural exit after `quit`.
    pub terminate_grace: Duration,
    /// Command written after every command so the engine prints a cycle
    /// completion marker. `None` relies on the idle grace alone.
    pub flush_command: Option<String>,
    /// Commands issued once after startup, output discarded.
    pub initial_commands: Vec<String>,
    /// Command that asks the engine to exit.
    pub quit_command: String,
}

impl EngineConfig {
    /// Binary name used when nothing else is configured.
    pub const DEFAULT_BINARY: &str = "ona";

    /// Build a config from the environment.
    ///
    /// Priority: `ONA_BINARY` / `ONA_HOME` env vars, then the defaults.
    pub fn from_env() -> Self {
        let working_dir = env::var_os("ONA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let binary = env::var_os("ONA_BINARY")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_BINARY));
        Self::new(binary).with_working_dir(working_dir)
    }

    /// Build a config for an explicit binary with default timing.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            args: vec!["shell".to_string()],
            working_dir: PathBuf::from("."),
            policy: TerminationPolicy::default(),
            banner_idle: Duration::from_millis(50),
            banner_max: Duration::from_millis(500),
            terminate_grace: Duration::from_secs(1),
            flush_command: Some("0".to_string()),
            initial_commands: vec!["*volume=100".to_string()],
            quit_command: "quit".to_string(),
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_policy(mut self, policy: TerminationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Locate the engine binary on disk.
    ///
    /// Returns [`OnaError::Configuration`] naming the expected location when
    /// nothing executable is found there.
    pub fn resolve_binary(&self) -> Result<PathBuf> {
        let expected = if is_bare_name(&self.binary) {
            if let Ok(found) = which::which(&self.binary) {
                return Ok(found);
            }
            self.working_dir.join(&self.binary)
        } else if self.binary.is_absolute() {
            self.binary.clone()
        } else {
            self.working_dir.join(&self.binary)
        };

        if expected.is_file() {
            Ok(expected)
        } else {
            Err(OnaError::Configuration {
                path: expected,
                hint: "build the engine binary, or set ONA_BINARY / ONA_HOME to point at it"
                    .to_string(),
            })
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn is_bare_name(path: &Path) -> bool {
    !path.is_absolute() && path.components().count() == 1
}
