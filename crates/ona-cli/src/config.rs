//! Configuration file management for ona.
//!
//! Provides a TOML-based config file at `~/.config/ona/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use ona_client::{EngineConfig, TerminationPolicy};

/// Env var overriding the batch deadline, in milliseconds.
pub const DEADLINE_ENV: &str = "ONA_DEADLINE_MS";
/// Env var overriding the idle grace, in milliseconds.
pub const IDLE_GRACE_ENV: &str = "ONA_IDLE_GRACE_MS";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub timing: TimingSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EngineSection {
    /// Engine executable, bare name or path.
    pub binary: Option<PathBuf>,
    /// Engine root directory.
    pub working_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TimingSection {
    pub deadline_ms: Option<u64>,
    pub idle_grace_ms: Option<u64>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the ona config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/ona` or `~/.config/ona`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("ona");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("ona")
}

/// Return the path to the ona config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. `Ok(None)` when it does not exist.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(Some(config))
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub binary: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
    pub deadline_ms: Option<u64>,
    pub idle_grace_ms: Option<u64>,
}

/// Resolve the engine configuration using the chain:
/// CLI flag > env var > config file > default.
///
/// - Binary: `--binary` > `ONA_BINARY` > `engine.binary` > `ona`
/// - Working dir: `--working-dir` > `ONA_HOME` > `engine.working_dir` > `.`
/// - Deadline: `--deadline-ms` > `ONA_DEADLINE_MS` > `timing.deadline_ms` > 2000
/// - Idle grace: `--idle-grace-ms` > `ONA_IDLE_GRACE_MS` > `timing.idle_grace_ms` > 100
pub fn resolve(cli: &CliOverrides) -> Result<EngineConfig> {
    let file = load_config()?;
    resolve_with(cli, file.as_ref())
}

/// [`resolve`] against an already loaded config file.
pub fn resolve_with(cli: &CliOverrides, file: Option<&ConfigFile>) -> Result<EngineConfig> {
    // `from_env` covers the env and default layers for binary and working dir.
    let mut config = EngineConfig::from_env();

    if let Some(binary) = &cli.binary {
        config.binary = binary.clone();
    } else if std::env::var_os("ONA_BINARY").is_none() {
        if let Some(binary) = file.and_then(|f| f.engine.binary.as_ref()) {
            config.binary = binary.clone();
        }
    }

    if let Some(dir) = &cli.working_dir {
        config.working_dir = dir.clone();
    } else if std::env::var_os("ONA_HOME").is_none() {
        if let Some(dir) = file.and_then(|f| f.engine.working_dir.as_ref()) {
            config.working_dir = dir.clone();
        }
    }

    let defaults = TerminationPolicy::default();
    let deadline_ms = pick_millis(
        cli.deadline_ms,
        DEADLINE_ENV,
        file.and_then(|f| f.timing.deadline_ms),
    )?;
    let idle_grace_ms = pick_millis(
        cli.idle_grace_ms,
        IDLE_GRACE_ENV,
        file.and_then(|f| f.timing.idle_grace_ms),
    )?;
    config.policy = TerminationPolicy::new(
        deadline_ms.map_or(defaults.deadline, Duration::from_millis),
        idle_grace_ms.map_or(defaults.idle_grace, Duration::from_millis),
    );

    debug!(
        binary = %config.binary.display(),
        working_dir = %config.working_dir.display(),
        deadline = ?config.policy.deadline,
        idle_grace = ?config.policy.idle_grace,
        "resolved engine config"
    );
    Ok(config)
}

fn pick_millis(cli: Option<u64>, env_var: &str, file: Option<u64>) -> Result<Option<u64>> {
    if cli.is_some() {
        return Ok(cli);
    }
    if let Ok(raw) = std::env::var(env_var) {
        let ms = raw
            .trim()
            .parse()
            .with_context(|| format!("{env_var} must be a whole number of milliseconds, got {raw:?}"))?;
        return Ok(Some(ms));
    }
    Ok(file)
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    fn clear_env() {
        for var in ["ONA_BINARY", "ONA_HOME", DEADLINE_ENV, IDLE_GRACE_ENV] {
            unsafe { std::env::remove_var(var) };
        }
    }

    fn sample_file() -> ConfigFile {
        ConfigFile {
            engine: EngineSection {
                binary: Some(PathBuf::from("/opt/ona/NAR")),
                working_dir: Some(PathBuf::from("/opt/ona")),
            },
            timing: TimingSection {
                deadline_ms: Some(5000),
                idle_grace_ms: Some(250),
            },
        }
    }

    #[test]
    fn config_file_toml_roundtrip() {
        let original = sample_file();
        let contents = toml::to_string_pretty(&original).unwrap();
        assert!(contents.contains("[engine]"), "got: {contents}");

        let loaded: ConfigFile = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.engine.binary, original.engine.binary);
        assert_eq!(loaded.timing.idle_grace_ms, Some(250));
    }

    #[test]
    fn partial_config_file_parses() {
        let loaded: ConfigFile = toml::from_str("[timing]\ndeadline_ms = 900\n").unwrap();
        assert_eq!(loaded.engine.binary, None);
        assert_eq!(loaded.timing.deadline_ms, Some(900));
    }

    #[test]
    fn save_and_load_under_xdg_config_home() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };

        assert!(load_config().unwrap().is_none());
        save_config(&sample_file()).unwrap();
        assert_eq!(config_path(), tmp.path().join("ona").join("config.toml"));

        let loaded = load_config().unwrap().unwrap();
        assert_eq!(loaded.engine.working_dir, Some(PathBuf::from("/opt/ona")));

        unsafe { std::env::remove_var("XDG_CONFIG_HOME") };
    }

    #[test]
    fn resolve_with_cli_flag_overrides_all() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var("ONA_BINARY", "/env/ona") };
        unsafe { std::env::set_var(DEADLINE_ENV, "3000") };

        let cli = CliOverrides {
            binary: Some(PathBuf::from("/cli/ona")),
            deadline_ms: Some(700),
            ..CliOverrides::default()
        };
        let config = resolve_with(&cli, Some(&sample_file())).unwrap();
        assert_eq!(config.binary, PathBuf::from("/cli/ona"));
        assert_eq!(config.policy.deadline, Duration::from_millis(700));

        clear_env();
    }

    #[test]
    fn resolve_with_env_var_overrides_config_file() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var("ONA_BINARY", "/env/ona") };
        unsafe { std::env::set_var(IDLE_GRACE_ENV, "40") };

        let config = resolve_with(&CliOverrides::default(), Some(&sample_file())).unwrap();
        assert_eq!(config.binary, PathBuf::from("/env/ona"));
        assert_eq!(config.working_dir, PathBuf::from("/opt/ona"));
        assert_eq!(config.policy.idle_grace, Duration::from_millis(40));
        assert_eq!(config.policy.deadline, Duration::from_millis(5000));

        clear_env();
    }

    #[test]
    fn resolve_defaults_when_nothing_set() {
        let _lock = lock_env();
        clear_env();

        let config = resolve_with(&CliOverrides::default(), None).unwrap();
        assert_eq!(config.binary, PathBuf::from(EngineConfig::DEFAULT_BINARY));
        assert_eq!(config.working_dir, PathBuf::from("."));
        assert_eq!(config.policy, TerminationPolicy::default());
    }

    #[test]
    fn resolve_rejects_malformed_env_millis() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var(DEADLINE_ENV, "soon") };

        let err = resolve_with(&CliOverrides::default(), None).unwrap_err();
        assert!(err.to_string().contains(DEADLINE_ENV), "got: {err}");

        clear_env();
    }
}
