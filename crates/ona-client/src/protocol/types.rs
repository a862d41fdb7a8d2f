//! Typed events extracted from engine output.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Statement punctuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Punctuation {
    /// `.`
    Belief,
    /// `!`
    Goal,
    /// `?`
    Question,
}

impl Punctuation {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '.' => Some(Self::Belief),
            '!' => Some(Self::Goal),
            '?' => Some(Self::Question),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::Belief => '.',
            Self::Goal => '!',
            Self::Question => '?',
        }
    }
}

/// When a statement holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OccurrenceTime {
    Eternal,
    /// Tagged with `:|:` but no explicit timestamp was printed.
    Now,
    At(i64),
}

impl OccurrenceTime {
    pub fn is_eternal(self) -> bool {
        matches!(self, Self::Eternal)
    }
}

/// Evidential support: (frequency, confidence).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Truth {
    pub frequency: f64,
    pub confidence: f64,
}

impl Truth {
    pub fn new(frequency: f64, confidence: f64) -> Self {
        Self {
            frequency,
            confidence,
        }
    }
}

/// A belief, goal or question as printed by the engine.
///
/// The term is kept as opaque text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub term: String,
    pub punctuation: Punctuation,
    pub occurrence_time: OccurrenceTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truth: Option<Truth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
    /// Evidence ids, empty when the engine did not print a stamp.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stamp: Vec<u64>,
}

impl Task {
    /// An eternal task with no metadata.
    pub fn new(term: impl Into<String>, punctuation: Punctuation) -> Self {
        Self {
            term: term.into(),
            punctuation,
            occurrence_time: OccurrenceTime::Eternal,
            truth: None,
            priority: None,
            stamp: Vec::new(),
        }
    }

    pub fn with_truth(mut self, truth: Truth) -> Self {
        self.truth = Some(truth);
        self
    }

    pub fn with_occurrence(mut self, occurrence_time: OccurrenceTime) -> Self {
        self.occurrence_time = occurrence_time;
        self
    }
}

/// Which output line prefix a task came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskRole {
    Input,
    Derived,
    Revised,
    Answer,
    Selected,
}

impl TaskRole {
    pub const ALL: [TaskRole; 5] = [
        Self::Input,
        Self::Derived,
        Self::Revised,
        Self::Answer,
        Self::Selected,
    ];

    /// The line prefix, colon included.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Input => "Input:",
            Self::Derived => "Derived:",
            Self::Revised => "Revised:",
            Self::Answer => "Answer:",
            Self::Selected => "Selected:",
        }
    }
}

/// An operator the engine decided to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    /// Operator name including the `^` sigil.
    pub operator: String,
    pub arguments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desire: Option<f64>,
}

/// Decision explanation: the learned implication and the precondition that
/// triggered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reason {
    pub desire: f64,
    pub hypothesis: Task,
    pub precondition: Task,
}

/// A statistics value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl StatValue {
    /// Integer first, then float, else the trimmed text.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if let Ok(i) = text.parse::<i64>() {
            Self::Int(i)
        } else if let Ok(f) = text.parse::<f64>() {
            Self::Float(f)
        } else {
            Self::Text(text.to_string())
        }
    }
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Metric name to value, built fresh for each stats query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatsSnapshot(BTreeMap<String, StatValue>);

impl StatsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value. A repeated key overwrites the earlier value.
    pub fn insert(&mut self, key: impl Into<String>, value: StatValue) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&StatValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StatValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// One classified output line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ParsedEvent {
    Task { role: TaskRole, task: Task },
    Execution(Execution),
    Reason(Reason),
    StatsEntry { key: String, value: StatValue },
    /// Anything no parser claimed. Kept verbatim.
    Unstructured { raw: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stat_value_prefers_integer_then_float() {
        assert_eq!(StatValue::parse("42"), StatValue::Int(42));
        assert_eq!(StatValue::parse(" 0.57 "), StatValue::Float(0.57));
        assert_eq!(
            StatValue::parse("something odd"),
            StatValue::Text("something odd".to_string())
        );
        assert_eq!(StatValue::parse("-3"), StatValue::Int(-3));
    }

    #[test]
    fn stats_snapshot_keeps_last_value_for_repeated_key() {
        let mut stats = StatsSnapshot::new();
        stats.insert("currentTime", StatValue::Int(1));
        stats.insert("currentTime", StatValue::Int(2));
        assert_eq!(stats.len(), 1);
        assert_eq!(stats.get("currentTime"), Some(&StatValue::Int(2)));
    }

    #[test]
    fn stats_snapshot_iterates_in_key_order() {
        let mut stats = StatsSnapshot::new();
        stats.insert("volume", StatValue::Int(100));
        stats.insert("currentTime", StatValue::Int(42));
        let keys: Vec<&str> = stats.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["currentTime", "volume"]);
    }

    #[test]
    fn stats_snapshot_serializes_as_flat_map() {
        let mut stats = StatsSnapshot::new();
        stats.insert("currentTime", StatValue::Int(42));
        stats.insert("average_priority", StatValue::Float(0.5));
        stats.insert("note", StatValue::Text("odd".to_string()));
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"currentTime": 42, "average_priority": 0.5, "note": "odd"})
        );
    }

    #[test]
    fn punctuation_chars_roundtrip() {
        for p in [Punctuation::Belief, Punctuation::Goal, Punctuation::Question] {
            assert_eq!(Punctuation::from_char(p.as_char()), Some(p));
        }
        assert_eq!(Punctuation::from_char('>'), None);
    }

    #[test]
    fn event_serializes_with_tag() {
        let event = ParsedEvent::Execution(Execution {
            operator: "^left".to_string(),
            arguments: vec![],
            desire: None,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "execution");
        assert_eq!(json["operator"], "^left");
    }
}
