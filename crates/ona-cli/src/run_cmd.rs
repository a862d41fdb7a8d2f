//! `ona run`: feed a script file to the engine.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

use ona_client::{EngineConfig, OnaClient, Reply};

/// Commands in a script: trimmed lines, minus blanks and `//` comments.
/// A `quit` line ends the script.
pub fn script_commands(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("//"))
        .take_while(|line| *line != "quit")
        .collect()
}

/// Per-operator execution counts.
#[derive(Debug, Default)]
pub struct ExecutionTally {
    counts: BTreeMap<String, usize>,
    commands: usize,
}

impl ExecutionTally {
    pub fn record(&mut self, reply: &Reply) {
        self.commands += 1;
        if let Reply::Batch(batch) = reply {
            for execution in &batch.executions {
                *self.counts.entry(execution.operator.clone()).or_default() += 1;
            }
        }
    }

    pub fn render(&self) -> String {
        let mut out = format!("{} commands sent\n", self.commands);
        if self.counts.is_empty() {
            out.push_str("no operator executions\n");
            return out;
        }
        out.push_str("executions:\n");
        for (operator, count) in &self.counts {
            out.push_str(&format!("  {operator:<16} {count}\n"));
        }
        out
    }
}

pub async fn run_script(config: EngineConfig, file: &Path, quiet: bool) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read script {}", file.display()))?;
    let commands = script_commands(&text);

    let mut client = OnaClient::start(config)
        .await
        .context("failed to start engine")?;

    let mut tally = ExecutionTally::default();
    let mut result = Ok(());
    for command in commands {
        match client.add_input(command, !quiet).await {
            Ok(reply) => tally.record(&reply),
            Err(e) => {
                result = Err(e).with_context(|| format!("engine failed on {command:?}"));
                break;
            }
        }
    }
    client.terminate().await;
    result?;

    print!("{}", tally.render());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ona_client::OutputBatch;

    #[test]
    fn script_skips_blanks_and_comments_and_stops_at_quit() {
        let text = "// setup\n<a --> b>.\n\n   5  \n//more\nquit\n<never --> sent>.\n";
        assert_eq!(script_commands(text), vec!["<a --> b>.", "5"]);
    }

    #[test]
    fn tally_counts_per_operator() {
        let mut tally = ExecutionTally::default();
        let lines = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        tally.record(&Reply::Batch(OutputBatch::from_lines(
            lines(&["^left executed with args", "^right executed with args"]),
            false,
        )));
        tally.record(&Reply::Batch(OutputBatch::from_lines(
            lines(&["^left executed with args"]),
            false,
        )));
        tally.record(&Reply::Stats(Default::default()));

        let rendered = tally.render();
        assert!(rendered.starts_with("3 commands sent\n"), "got: {rendered}");
        assert!(rendered.contains("^left            2"), "got: {rendered}");
        assert!(rendered.contains("^right           1"), "got: {rendered}");
    }

    #[test]
    fn tally_without_executions() {
        let tally = ExecutionTally::default();
        assert_eq!(tally.render(), "0 commands sent\nno operator executions\n");
    }
}
