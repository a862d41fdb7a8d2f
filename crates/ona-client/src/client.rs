//! Protocol client: one command in, one classified batch out.

use std::io::Write;

use tracing::{debug, info};

use crate::batch::{BatchEnd, BatchReader, SentinelKind, TerminationPolicy};
use crate::config::EngineConfig;
use crate::error::{OnaError, Result};
use crate::process::{Lifecycle, ProcessHandle};
use crate::protocol::{OutputBatch, Reply, StatsSnapshot};

/// Asks the engine for its statistics.
pub const STATS_COMMAND: &str = "*stats";
/// Clears the engine's memory.
pub const RESET_COMMAND: &str = "*reset";

/// Client for one engine process.
///
/// Commands are serialised through `&mut self`: each call writes one command
/// and collects the output attributable to it before returning.
#[derive(Debug)]
pub struct OnaClient {
    process: ProcessHandle,
    reader: BatchReader,
    policy: TerminationPolicy,
    flush_command: Option<String>,
    /// A flush command was written but its completion line has not been read.
    awaiting_flush: bool,
}

impl OnaClient {
    /// Spawn the engine and run the configured initial commands.
    pub async fn start(config: EngineConfig) -> Result<Self> {
        let (process, reader) = ProcessHandle::start(&config).await?;
        let mut client = Self {
            process,
            reader,
            policy: config.policy,
            flush_command: config.flush_command.clone(),
            awaiting_flush: false,
        };
        info!(pid = ?client.pid(), "engine started");

        for command in &config.initial_commands {
            client.send(command).await?;
        }
        Ok(client)
    }

    /// Send one command and return its output.
    ///
    /// The statistics command yields [`Reply::Stats`]; everything else yields
    /// [`Reply::Batch`]. With `print` set, the raw output is echoed to stdout.
    pub async fn add_input(&mut self, command: &str, print: bool) -> Result<Reply> {
        let mut batch = self.send(command).await?;
        if print && !batch.raw.is_empty() {
            echo(&mut std::io::stdout().lock(), &batch.raw);
        }
        Ok(match batch.stats.take() {
            Some(stats) => Reply::Stats(stats),
            None => Reply::Batch(batch),
        })
    }

    /// Send one command and return the full batch.
    ///
    /// Same as [`add_input`](Self::add_input) without printing; for the
    /// statistics command the snapshot is in [`OutputBatch::stats`].
    pub async fn send(&mut self, command: &str) -> Result<OutputBatch> {
        let command = command.trim_end();

        if self.awaiting_flush {
            self.awaiting_flush = false;
            let late = self
                .reader
                .drain_through(SentinelKind::CycleComplete, self.policy.deadline)
                .await;
            let complete = late.end == BatchEnd::Sentinel(SentinelKind::CycleComplete);
            if !complete || !late.lines.is_empty() {
                debug!(
                    pid = ?self.process.pid(),
                    count = late.lines.len(),
                    lines = ?late.lines,
                    end = ?late.end,
                    "skipped late output from previous command"
                );
            }
        }

        // Anything still queued was printed before this write.
        self.reader.discard_pending();

        self.process.write_line(command).await?;
        if let Some(flush) = &self.flush_command {
            if flush != command {
                self.process.write_line(flush).await?;
            }
        }

        let raw = self.reader.read_batch(&self.policy).await;
        // The flush completion line still follows unless it ended this
        // batch or the engine consumed the flush as an operation result.
        self.awaiting_flush = self.flush_command.is_some()
            && matches!(
                raw.end,
                BatchEnd::IdleGrace
                    | BatchEnd::Deadline
                    | BatchEnd::Sentinel(SentinelKind::BatchDone)
            );
        if raw.end == BatchEnd::Disconnected && raw.lines.is_empty() {
            return Err(OnaError::connection_lost("engine closed its output"));
        }
        debug!(
            pid = ?self.process.pid(),
            command,
            lines = raw.lines.len(),
            end = ?raw.end,
            "command answered"
        );

        let mut batch = OutputBatch::from_lines(raw.lines, raw.request_output_args);
        if command == STATS_COMMAND {
            batch.stats = Some(batch.stats_snapshot());
        }
        Ok(batch)
    }

    /// Clear the engine's memory.
    pub async fn reset(&mut self) -> Result<()> {
        self.send(RESET_COMMAND).await?;
        Ok(())
    }

    /// Run `steps` inference cycles.
    pub async fn execute_cycles(&mut self, steps: u32) -> Result<OutputBatch> {
        self.send(&steps.to_string()).await
    }

    /// Fresh statistics snapshot.
    pub async fn get_stats(&mut self) -> Result<StatsSnapshot> {
        let batch = self.send(STATS_COMMAND).await?;
        Ok(batch.stats.unwrap_or_default())
    }

    /// Bind operator slot `index` to `name` (e.g. `^left`).
    pub async fn register_operator(&mut self, index: u32, name: &str) -> Result<()> {
        self.send(&format!("*setopname {index} {name}")).await?;
        Ok(())
    }

    /// Set an engine parameter: `*<name>=<value>`.
    pub async fn set_parameter(&mut self, name: &str, value: impl std::fmt::Display) -> Result<()> {
        self.send(&format!("*{name}={value}")).await?;
        Ok(())
    }

    pub async fn set_motor_babbling(&mut self, rate: f64) -> Result<()> {
        self.set_parameter("motorbabbling", rate).await
    }

    pub async fn set_seed(&mut self, seed: u64) -> Result<()> {
        self.set_parameter("seed", seed).await
    }

    pub async fn set_volume(&mut self, percent: u8) -> Result<()> {
        self.set_parameter("volume", percent).await
    }

    /// Stop the engine. Safe to call more than once.
    pub async fn terminate(&mut self) {
        self.process.terminate().await;
        info!(pid = ?self.pid(), "engine terminated");
    }

    pub fn state(&self) -> Lifecycle {
        self.process.state()
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.pid()
    }
}

/// Best-effort write of a batch's raw text.
fn echo(out: &mut impl Write, raw: &str) {
    if let Err(e) = writeln!(out, "{raw}") {
        debug!(error = %e, "failed to echo engine output");
    }
}
