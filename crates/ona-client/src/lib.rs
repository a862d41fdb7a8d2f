//! Client for an ONA reasoning engine running as a subprocess.
//!
//! The engine speaks a line protocol over stdin/stdout. [`OnaClient`] writes
//! one command at a time and returns the output attributable to it as a
//! classified [`OutputBatch`].
//!
//! ```no_run
//! # async fn demo() -> ona_client::Result<()> {
//! use ona_client::{EngineConfig, OnaClient};
//!
//! let mut client = OnaClient::start(EngineConfig::from_env()).await?;
//! client.add_input("<bird --> animal>.", false).await?;
//! let batch = client.send("<bird --> ?x>?").await?;
//! if let Some(answer) = batch.answer() {
//!     println!("{answer}");
//! }
//! client.terminate().await;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod client;
pub mod config;
pub mod error;
pub mod process;
pub mod protocol;

pub use batch::{BatchEnd, TerminationPolicy};
pub use client::{OnaClient, RESET_COMMAND, STATS_COMMAND};
pub use config::EngineConfig;
pub use error::{OnaError, Result};
pub use process::Lifecycle;
pub use protocol::{
    Execution, OccurrenceTime, OutputBatch, ParsedEvent, Punctuation, Reason, Reply, StatValue,
    StatsSnapshot, Task, TaskRole, Truth, classify, parse_task,
};
