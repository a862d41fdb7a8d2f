//! Engine output protocol: line classification and typed events.

pub mod classify;
pub mod output;
pub mod record;
pub mod task;
pub mod types;

pub use classify::{classify, parse_execution, parse_reason, parse_stats_entry};
pub use output::{OutputBatch, Reply};
pub use task::parse_task;
pub use types::{
    Execution, OccurrenceTime, ParsedEvent, Punctuation, Reason, StatValue, StatsSnapshot, Task,
    TaskRole, Truth,
};
