//! Batch reader: turns the drain's line channel into one response per command.
//!
//! A batch ends on the first of:
//!
//! - a sentinel line ([`CYCLE_COMPLETE`], [`BATCH_DONE`],
//!   [`OPERATION_ARGS_REQUESTED`]),
//! - the idle grace elapsing after at least one line was collected,
//! - the deadline,
//! - the drain closing the channel (the engine is gone).
//!
//! None of these are errors. The caller decides what an empty batch means.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Printed by the engine after running the `0` flush command.
pub const CYCLE_COMPLETE: &str = "done with 0 additional inference steps.";
/// Explicit end-of-output marker emitted by some engine builds.
pub const BATCH_DONE: &str = "//*done";
/// The engine is blocked waiting for an operation's result arguments.
pub const OPERATION_ARGS_REQUESTED: &str = "//Operation result product expected:";

/// Which terminator line ended a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelKind {
    CycleComplete,
    BatchDone,
    OperationArgsRequested,
}

impl SentinelKind {
    /// Match a line exactly against the terminator set.
    pub fn detect(line: &str) -> Option<Self> {
        match line {
            CYCLE_COMPLETE => Some(Self::CycleComplete),
            BATCH_DONE => Some(Self::BatchDone),
            OPERATION_ARGS_REQUESTED => Some(Self::OperationArgsRequested),
            _ => None,
        }
    }
}

/// Time limits for collecting one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationPolicy {
    /// Hard wall-clock budget for the whole batch.
    pub deadline: Duration,
    /// Quiet period that ends a batch once something has been collected.
    pub idle_grace: Duration,
}

impl TerminationPolicy {
    pub fn new(deadline: Duration, idle_grace: Duration) -> Self {
        Self {
            deadline,
            idle_grace,
        }
    }
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_millis(100))
    }
}

/// Why a batch stopped collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchEnd {
    Sentinel(SentinelKind),
    IdleGrace,
    Deadline,
    /// The output channel closed; no further lines will ever arrive.
    Disconnected,
}

/// Lines collected for one command, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBatch {
    pub lines: Vec<String>,
    pub request_output_args: bool,
    pub end: BatchEnd,
}

/// Consumer side of the output channel.
///
/// Exactly one reader exists per engine process; the drain task is the only
/// producer.
#[derive(Debug)]
pub struct BatchReader {
    rx: mpsc::UnboundedReceiver<String>,
}

impl BatchReader {
    pub fn new(rx: mpsc::UnboundedReceiver<String>) -> Self {
        Self { rx }
    }

    /// Collect one batch under `policy`. Never waits past the deadline.
    pub async fn read_batch(&mut self, policy: &TerminationPolicy) -> RawBatch {
        let deadline = Instant::now() + policy.deadline;
        let mut lines = Vec::new();
        let mut request_output_args = false;

        let end = loop {
            let now = Instant::now();
            if now >= deadline {
                break BatchEnd::Deadline;
            }
            let remaining = deadline - now;
            let wait = if lines.is_empty() {
                remaining
            } else {
                remaining.min(policy.idle_grace)
            };

            match tokio::time::timeout(wait, self.rx.recv()).await {
                Ok(Some(line)) => match SentinelKind::detect(&line) {
                    Some(SentinelKind::OperationArgsRequested) => {
                        lines.push(line);
                        request_output_args = true;
                        break BatchEnd::Sentinel(SentinelKind::OperationArgsRequested);
                    }
                    Some(kind) => break BatchEnd::Sentinel(kind),
                    None => {
                        trace!(line = %line, "engine output");
                        lines.push(line);
                    }
                },
                Ok(None) => break BatchEnd::Disconnected,
                Err(_) => {
                    if Instant::now() >= deadline {
                        break BatchEnd::Deadline;
                    }
                    if !lines.is_empty() {
                        break BatchEnd::IdleGrace;
                    }
                }
            }
        };

        debug!(lines = lines.len(), end = ?end, "batch complete");
        RawBatch {
            lines,
            request_output_args,
            end,
        }
    }

    /// Remove every line already queued, without waiting.
    ///
    /// Called before a command is written: anything still queued was emitted
    /// before that write and belongs to no later batch.
    pub fn discard_pending(&mut self) -> Vec<String> {
        let mut stale = Vec::new();
        while let Ok(line) = self.rx.try_recv() {
            stale.push(line);
        }
        if !stale.is_empty() {
            debug!(count = stale.len(), "discarded stale engine output");
        }
        stale
    }

    /// Read up to and including the next `kind` sentinel, bounded by `max`.
    ///
    /// Used when an earlier batch ended before its terminator arrived. Lines
    /// seen on the way are returned, the sentinel itself is not.
    pub async fn drain_through(&mut self, kind: SentinelKind, max: Duration) -> RawBatch {
        let deadline = Instant::now() + max;
        let mut lines = Vec::new();
        let mut request_output_args = false;

        let end = loop {
            let now = Instant::now();
            if now >= deadline {
                break BatchEnd::Deadline;
            }
            match tokio::time::timeout(deadline - now, self.rx.recv()).await {
                Ok(Some(line)) => {
                    let seen = SentinelKind::detect(&line);
                    if seen == Some(kind) {
                        break BatchEnd::Sentinel(kind);
                    }
                    request_output_args |= seen == Some(SentinelKind::OperationArgsRequested);
                    lines.push(line);
                }
                Ok(None) => break BatchEnd::Disconnected,
                Err(_) => break BatchEnd::Deadline,
            }
        };

        trace!(lines = lines.len(), end = ?end, "drained through sentinel");
        RawBatch {
            lines,
            request_output_args,
            end,
        }
    }

    /// Drain until the channel has been quiet for `idle`, bounded by `max`.
    ///
    /// Used to swallow the welcome banner after startup.
    pub async fn drain_idle(&mut self, idle: Duration, max: Duration) -> Vec<String> {
        let deadline = Instant::now() + max;
        let mut drained = Vec::new();
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let wait = idle.min(deadline - now);
            match tokio::time::timeout(wait, self.rx.recv()).await {
                Ok(Some(line)) => drained.push(line),
                Ok(None) | Err(_) => break,
            }
        }
        drained
    }
}
