mod config;
mod run_cmd;
mod shell_cmd;
#[cfg(test)]
mod test_util;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use config::CliOverrides;

#[derive(Parser)]
#[command(name = "ona", about = "Drive an ONA reasoning engine over its shell protocol")]
struct Cli {
    /// Engine binary (overrides ONA_BINARY env var)
    #[arg(long, global = true)]
    binary: Option<PathBuf>,

    /// Engine root directory (overrides ONA_HOME env var)
    #[arg(long, global = true)]
    working_dir: Option<PathBuf>,

    /// Per-command output deadline in milliseconds
    #[arg(long, global = true)]
    deadline_ms: Option<u64>,

    /// Quiet period that ends a command's output, in milliseconds
    #[arg(long, global = true)]
    idle_grace_ms: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an ona config file from the global flags
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Relay stdin to the engine (default)
    Shell {
        /// Print each reply as a JSON line instead of the raw output
        #[arg(long)]
        json: bool,
    },
    /// Feed a script file to the engine and summarize operator executions
    Run {
        /// Script with one command per line
        file: PathBuf,
        /// Do not echo engine output
        #[arg(long)]
        quiet: bool,
    },
    /// Print the engine's statistics as JSON
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the engine transcript, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let overrides = CliOverrides {
        binary: cli.binary,
        working_dir: cli.working_dir,
        deadline_ms: cli.deadline_ms,
        idle_grace_ms: cli.idle_grace_ms,
    };

    match cli.command.unwrap_or(Commands::Shell { json: false }) {
        Commands::Init { force } => {
            cmd_init(&overrides, force)?;
        }
        Commands::Shell { json } => {
            let engine = config::resolve(&overrides)?;
            shell_cmd::run_shell(engine, json).await?;
        }
        Commands::Run { file, quiet } => {
            let engine = config::resolve(&overrides)?;
            run_cmd::run_script(engine, &file, quiet).await?;
        }
        Commands::Stats => {
            let engine = config::resolve(&overrides)?;
            shell_cmd::run_stats(engine).await?;
        }
    }

    Ok(())
}

/// Execute the `ona init` command: write the config file.
fn cmd_init(overrides: &CliOverrides, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        engine: config::EngineSection {
            binary: overrides.binary.clone(),
            working_dir: overrides.working_dir.clone(),
        },
        timing: config::TimingSection {
            deadline_ms: overrides.deadline_ms,
            idle_grace_ms: overrides.idle_grace_ms,
        },
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    if let Some(binary) = &cfg.engine.binary {
        println!("  engine.binary = {}", binary.display());
    }
    if let Some(dir) = &cfg.engine.working_dir {
        println!("  engine.working_dir = {}", dir.display());
    }
    println!();
    println!("Next: run `ona stats` to check that the engine starts.");

    Ok(())
}
