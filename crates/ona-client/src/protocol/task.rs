//! Text form of tasks: parsing the engine's printout and rendering it back.

use std::fmt;

use super::types::{OccurrenceTime, Punctuation, Task, Truth};

/// Markers that end the sentence part of a printed task. The earliest one
/// present wins.
const METADATA_MARKERS: &[&str] = &[
    " :|:",
    " occurrenceTime=",
    " creationTime=",
    " Priority=",
    " Truth:",
    " Stamp=",
    " dt=",
];

/// Parse a task from the text after its role prefix.
///
/// Accepts both the output form
/// (`<a --> b>. :|: occurrenceTime=3 Priority=0.5 Truth: frequency=1.0 confidence=0.9`)
/// and the input form (`<a --> b>. :|: {1.0 0.9}`). Returns `None` when no
/// sentence with a valid punctuation can be found.
pub fn parse_task(text: &str) -> Option<Task> {
    let text = text.trim();
    let cut = METADATA_MARKERS
        .iter()
        .filter_map(|marker| text.find(marker))
        .min()
        .unwrap_or(text.len());
    let (mut sentence, metadata) = (text[..cut].trim_end(), &text[cut..]);

    let mut truth = truth_fields(metadata);
    if let Some((head, brace)) = trailing_brace_truth(sentence) {
        sentence = head;
        truth = truth.or(Some(brace));
    }
    if truth.is_none() {
        truth = trailing_brace_truth(metadata.trim_end()).map(|(_, t)| t);
    }

    let punct = sentence.chars().last()?;
    let punctuation = Punctuation::from_char(punct)?;
    let term = sentence[..sentence.len() - punct.len_utf8()].trim_end();
    if term.is_empty() {
        return None;
    }

    let occurrence_time = match value_after(metadata, "occurrenceTime=").and_then(|v| v.parse().ok())
    {
        Some(t) => OccurrenceTime::At(t),
        None if metadata.contains(":|:") => OccurrenceTime::Now,
        None => OccurrenceTime::Eternal,
    };

    Some(Task {
        term: term.to_string(),
        punctuation,
        occurrence_time,
        truth,
        priority: number_after(metadata, "Priority="),
        stamp: stamp(metadata),
    })
}

impl Task {
    /// Render in engine input syntax, suitable for `add_input`.
    pub fn to_narsese(&self) -> String {
        let mut out = format!("{}{}", self.term, self.punctuation.as_char());
        if !self.occurrence_time.is_eternal() {
            out.push_str(" :|:");
        }
        if let Some(truth) = self.truth {
            out.push_str(&format!(" {{{} {}}}", truth.frequency, truth.confidence));
        }
        out
    }
}

/// Output form, the same shape the engine prints.
impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.term, self.punctuation.as_char())?;
        match self.occurrence_time {
            OccurrenceTime::Eternal => {}
            OccurrenceTime::Now => f.write_str(" :|:")?,
            OccurrenceTime::At(t) => write!(f, " :|: occurrenceTime={t}")?,
        }
        if let Some(priority) = self.priority {
            write!(f, " Priority={priority}")?;
        }
        if !self.stamp.is_empty() {
            let ids: Vec<String> = self.stamp.iter().map(u64::to_string).collect();
            write!(f, " Stamp=[{}]", ids.join(","))?;
        }
        if let Some(truth) = self.truth {
            write!(
                f,
                " Truth: frequency={} confidence={}",
                truth.frequency, truth.confidence
            )?;
        }
        Ok(())
    }
}

/// The token following the first `marker`, stopped by whitespace or a comma.
pub(crate) fn value_after<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let start = text.find(marker)? + marker.len();
    token(&text[start..])
}

/// Like [`value_after`] but anchored on the last occurrence of `marker`.
pub(crate) fn value_after_last<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let start = text.rfind(marker)? + marker.len();
    token(&text[start..])
}

pub(crate) fn number_after(text: &str, marker: &str) -> Option<f64> {
    value_after(text, marker)?.parse().ok()
}

fn token(rest: &str) -> Option<&str> {
    let end = rest
        .find(|c: char| c.is_whitespace() || c == ',')
        .unwrap_or(rest.len());
    let value = &rest[..end];
    (!value.is_empty()).then_some(value)
}

fn truth_fields(metadata: &str) -> Option<Truth> {
    let frequency = number_after(metadata, "frequency=")?;
    let confidence = number_after(metadata, "confidence=")?;
    Some(Truth::new(frequency, confidence))
}

/// Split a trailing `{f c}` off `text`.
fn trailing_brace_truth(text: &str) -> Option<(&str, Truth)> {
    let body = text.strip_suffix('}')?;
    let open = body.rfind('{')?;
    let mut parts = body[open + 1..].split_whitespace();
    let frequency = parts.next()?.parse().ok()?;
    let confidence = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((body[..open].trim_end(), Truth::new(frequency, confidence)))
}

fn stamp(metadata: &str) -> Vec<u64> {
    let Some(start) = metadata.find("Stamp=[") else {
        return Vec::new();
    };
    let rest = &metadata[start + "Stamp=[".len()..];
    let Some(end) = rest.find(']') else {
        return Vec::new();
    };
    rest[..end]
        .split(',')
        .filter_map(|id| id.trim().parse().ok())
        .collect()
}
