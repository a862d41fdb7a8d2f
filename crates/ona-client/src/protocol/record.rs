//! Line-delimited JSON records.
//!
//! Some engine builds print one JSON object per event instead of text. A task
//! record carries a `term` object; an operator record carries `operator`.

use serde::Deserialize;
use serde_json::Value;

use super::types::{Execution, OccurrenceTime, ParsedEvent, Punctuation, Task, TaskRole, Truth};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Record {
    Task(TaskRecord),
    Execution(ExecutionRecord),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskRecord {
    term: String,
    #[serde(default, alias = "punctuation")]
    r#type: Option<String>,
    #[serde(default)]
    truth: Option<TruthRecord>,
    #[serde(default)]
    occurrence_time: Option<Value>,
    #[serde(default)]
    priority: Option<f64>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    stamp: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct TruthRecord {
    #[serde(default = "default_frequency")]
    frequency: f64,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_frequency() -> f64 {
    1.0
}

fn default_confidence() -> f64 {
    0.9
}

#[derive(Debug, Deserialize)]
struct ExecutionRecord {
    operator: String,
    #[serde(default, alias = "args")]
    arguments: Vec<String>,
    #[serde(default)]
    desire: Option<f64>,
}

/// Decode one JSON record. `None` when the line is not a record this client
/// understands; the caller then falls through to the text rules.
pub fn decode(line: &str) -> Option<ParsedEvent> {
    match serde_json::from_str::<Record>(line).ok()? {
        Record::Task(record) => {
            let punctuation = match record.r#type.as_deref() {
                None | Some("belief") | Some(".") => Punctuation::Belief,
                Some("goal") | Some("!") => Punctuation::Goal,
                Some("question") | Some("?") => Punctuation::Question,
                Some(_) => return None,
            };
            let role = match record.role.as_deref().map(str::to_ascii_lowercase).as_deref() {
                Some("input") => TaskRole::Input,
                Some("revised") => TaskRole::Revised,
                Some("answer") => TaskRole::Answer,
                Some("selected") => TaskRole::Selected,
                _ => TaskRole::Derived,
            };
            let task = Task {
                term: record.term,
                punctuation,
                occurrence_time: occurrence(record.occurrence_time.as_ref()),
                truth: record
                    .truth
                    .map(|t| Truth::new(t.frequency, t.confidence)),
                priority: record.priority,
                stamp: record.stamp,
            };
            Some(ParsedEvent::Task { role, task })
        }
        Record::Execution(record) => {
            if !record.operator.starts_with('^') {
                return None;
            }
            Some(ParsedEvent::Execution(Execution {
                operator: record.operator,
                arguments: record.arguments,
                desire: record.desire,
            }))
        }
    }
}

fn occurrence(value: Option<&Value>) -> OccurrenceTime {
    match value {
        Some(Value::Number(n)) => n.as_i64().map_or(OccurrenceTime::Eternal, OccurrenceTime::At),
        Some(Value::String(s)) => match s.as_str() {
            "now" => OccurrenceTime::Now,
            other => other
                .parse()
                .map_or(OccurrenceTime::Eternal, OccurrenceTime::At),
        },
        _ => OccurrenceTime::Eternal,
    }
}
