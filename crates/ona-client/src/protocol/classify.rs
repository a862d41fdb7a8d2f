//! Line classification.
//!
//! [`classify`] is total: every line becomes exactly one [`ParsedEvent`].
//! Rules are tried in order and the first that claims the line wins. A line
//! that matches a rule's shape but fails to parse is kept as
//! [`ParsedEvent::Unstructured`] rather than dropped.

use tracing::trace;

use super::record;
use super::task::{number_after, parse_task, value_after_last};
use super::types::{Execution, OccurrenceTime, ParsedEvent, Punctuation, Reason, StatValue, TaskRole};

/// Classify one line of engine output.
pub fn classify(line: &str) -> ParsedEvent {
    let trimmed = line.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return record::decode(trimmed).unwrap_or_else(|| unstructured(line));
    }

    for role in TaskRole::ALL {
        if let Some(payload) = trimmed.strip_prefix(role.prefix()) {
            return match parse_task(payload) {
                Some(task) => ParsedEvent::Task { role, task },
                None => unstructured(line),
            };
        }
    }

    if trimmed.starts_with('^') {
        return parse_execution(trimmed)
            .map(ParsedEvent::Execution)
            .unwrap_or_else(|| unstructured(line));
    }

    if trimmed.contains("decision expectation=")
        && (trimmed.contains("implication:") || trimmed.contains("precondition:"))
    {
        return parse_reason(trimmed)
            .map(ParsedEvent::Reason)
            .unwrap_or_else(|| unstructured(line));
    }

    if trimmed.contains(':') && !trimmed.starts_with("//") {
        if let Some((key, value)) = parse_stats_entry(trimmed) {
            return ParsedEvent::StatsEntry { key, value };
        }
    }

    unstructured(line)
}

fn unstructured(line: &str) -> ParsedEvent {
    trace!(line, "unstructured engine output");
    ParsedEvent::Unstructured {
        raw: line.to_string(),
    }
}

/// Parse an operator execution line.
///
/// Handles `^op executed with args (a * b) desire=0.6` and the
/// `^executed: ^op ...` variant. The `{SELF}` placeholder is dropped from the
/// arguments.
pub fn parse_execution(line: &str) -> Option<Execution> {
    let line = line.trim();
    let body = line
        .strip_prefix("^executed:")
        .map(str::trim_start)
        .unwrap_or(line);

    let operator = body.split_whitespace().next()?;
    if !operator.starts_with('^') || operator.len() < 2 {
        return None;
    }

    let arguments = match body.find("args ") {
        Some(at) => {
            let rest = &body[at + "args ".len()..];
            let rest = rest.find("desire=").map_or(rest, |end| &rest[..end]);
            split_arguments(rest)
        }
        None => Vec::new(),
    };

    Some(Execution {
        operator: operator.to_string(),
        arguments,
        desire: number_after(body, "desire="),
    })
}

fn split_arguments(text: &str) -> Vec<String> {
    let mut inner = text.trim();
    if inner.starts_with('(') && inner.ends_with(')') && outer_parens_match(inner) {
        inner = inner[1..inner.len() - 1].trim();
    }
    split_top_level(inner, " * ")
        .into_iter()
        .map(str::trim)
        .filter(|arg| !arg.is_empty() && *arg != "{SELF}")
        .map(str::to_string)
        .collect()
}

/// True when the opening paren at index 0 closes at the very end.
fn outer_parens_match(text: &str) -> bool {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i == text.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

/// Split on `sep` where it is not nested inside brackets.
fn split_top_level<'a>(text: &'a str, sep: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut i = 0;
    let bytes = text.as_bytes();
    while i < bytes.len() {
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            _ => {}
        }
        if depth == 0 && bytes[i..].starts_with(sep.as_bytes()) {
            parts.push(&text[start..i]);
            i += sep.len();
            start = i;
            continue;
        }
        i += 1;
    }
    parts.push(&text[start..]);
    parts
}

/// Parse a decision explanation.
///
/// Works on a single line or on a whole batch's text; the last
/// `decision expectation=`, `implication: ` and `precondition: ` markers are
/// used. The hypothesis is always an eternal belief and the precondition is
/// always a belief.
pub fn parse_reason(text: &str) -> Option<Reason> {
    let desire = value_after_last(text, "decision expectation=")?.parse().ok()?;

    let implication_at = text.rfind("implication: ")? + "implication: ".len();
    let implication = text[implication_at..]
        .split("precondition: ")
        .next()?
        .lines()
        .next()?;

    let precondition_at = text.rfind("precondition: ")? + "precondition: ".len();
    let precondition = text[precondition_at..].lines().next()?;

    let mut hypothesis = parse_task(implication)?;
    hypothesis.occurrence_time = OccurrenceTime::Eternal;
    hypothesis.punctuation = Punctuation::Belief;

    let mut precondition = parse_task(precondition)?;
    precondition.punctuation = Punctuation::Belief;

    Some(Reason {
        desire,
        hypothesis,
        precondition,
    })
}

/// Split `key: value` on the first colon. Whitespace runs in the key become
/// underscores.
pub fn parse_stats_entry(line: &str) -> Option<(String, StatValue)> {
    let (key, value) = line.split_once(':')?;
    let key = key.split_whitespace().collect::<Vec<_>>().join("_");
    if key.is_empty() {
        return None;
    }
    Some((key, StatValue::parse(value)))
}
