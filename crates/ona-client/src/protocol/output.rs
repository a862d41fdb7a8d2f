//! Aggregated result of one command.

use serde::Serialize;

use super::classify::{classify, parse_reason};
use super::types::{Execution, ParsedEvent, Reason, StatsSnapshot, Task, TaskRole};

/// Everything the engine printed in response to one command, classified.
///
/// `events`, `lines` and `raw` always hold the complete batch. The typed
/// collections are views over `events`; `Unstructured` lines appear only in
/// `events`, `lines` and `raw`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutputBatch {
    pub input: Vec<Task>,
    /// `Derived:` and `Revised:` tasks in arrival order.
    pub derivations: Vec<Task>,
    pub answers: Vec<Task>,
    pub selections: Vec<Task>,
    pub executions: Vec<Execution>,
    pub reason: Option<Reason>,
    /// Set only for the statistics command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsSnapshot>,
    /// The engine stopped and is waiting for an operation's result arguments.
    pub request_output_args: bool,
    pub events: Vec<ParsedEvent>,
    #[serde(skip)]
    pub lines: Vec<String>,
    pub raw: String,
}

impl OutputBatch {
    /// Classify `lines` in order and build the batch.
    pub fn from_lines(lines: Vec<String>, request_output_args: bool) -> Self {
        let mut batch = Self {
            request_output_args,
            raw: lines.join("\n"),
            ..Self::default()
        };

        for line in &lines {
            let event = classify(line);
            match &event {
                ParsedEvent::Task { role, task } => {
                    let bucket = match role {
                        TaskRole::Input => &mut batch.input,
                        TaskRole::Derived | TaskRole::Revised => &mut batch.derivations,
                        TaskRole::Answer => &mut batch.answers,
                        TaskRole::Selected => &mut batch.selections,
                    };
                    bucket.push(task.clone());
                }
                ParsedEvent::Execution(execution) => batch.executions.push(execution.clone()),
                ParsedEvent::Reason(reason) => batch.reason = Some(reason.clone()),
                ParsedEvent::StatsEntry { .. } | ParsedEvent::Unstructured { .. } => {}
            }
            batch.events.push(event);
        }

        // An explanation may be spread over several lines.
        if batch.reason.is_none() {
            batch.reason = parse_reason(&batch.raw);
        }

        batch.lines = lines;
        batch
    }

    /// Collect the `StatsEntry` events. A repeated key keeps its last value.
    pub fn stats_snapshot(&self) -> StatsSnapshot {
        let mut stats = StatsSnapshot::new();
        for event in &self.events {
            if let ParsedEvent::StatsEntry { key, value } = event {
                stats.insert(key.clone(), value.clone());
            }
        }
        stats
    }

    /// The first answer, if any. `Answer: None.` counts as an answer whose
    /// term is `None`.
    pub fn answer(&self) -> Option<&Task> {
        self.answers.first()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Result of [`OnaClient::add_input`](crate::OnaClient::add_input).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Batch(OutputBatch),
    /// Returned for the statistics command.
    Stats(StatsSnapshot),
}

impl Reply {
    pub fn into_batch(self) -> Option<OutputBatch> {
        match self {
            Self::Batch(batch) => Some(batch),
            Self::Stats(_) => None,
        }
    }

    pub fn into_stats(self) -> Option<StatsSnapshot> {
        match self {
            Self::Stats(stats) => Some(stats),
            Self::Batch(_) => None,
        }
    }
}
