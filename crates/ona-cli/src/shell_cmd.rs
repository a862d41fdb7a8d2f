//! `ona shell` and `ona stats`: interactive use of one engine.

use std::io::BufRead;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use ona_client::{EngineConfig, OnaClient, Reply};

/// Relay stdin to the engine line by line until EOF or `quit`.
///
/// Without `json` the engine's raw output is echoed; with it each reply is
/// printed as one JSON object per line.
pub async fn run_shell(config: EngineConfig, json: bool) -> Result<()> {
    let mut client = OnaClient::start(config)
        .await
        .context("failed to start engine")?;

    let mut lines = spawn_stdin_reader();
    let result = relay(&mut client, &mut lines, json).await;
    client.terminate().await;
    result
}

/// Read stdin on a plain thread so a pending read never holds up runtime
/// shutdown after `quit`.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn relay(
    client: &mut OnaClient,
    lines: &mut mpsc::UnboundedReceiver<std::io::Result<String>>,
    json: bool,
) -> Result<()> {
    while let Some(line) = lines.recv().await {
        let line = line.context("failed to read stdin")?;
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        if command == "quit" {
            break;
        }

        let reply = client
            .add_input(command, !json)
            .await
            .with_context(|| format!("engine failed on {command:?}"))?;
        if json {
            println!("{}", render_json(&reply)?);
        }
    }
    Ok(())
}

fn render_json(reply: &Reply) -> Result<String> {
    serde_json::to_string(reply).context("failed to serialize reply")
}

/// Start the engine, print one statistics snapshot as JSON, stop.
pub async fn run_stats(config: EngineConfig) -> Result<()> {
    let mut client = OnaClient::start(config)
        .await
        .context("failed to start engine")?;
    let stats = client.get_stats().await;
    client.terminate().await;

    let stats = stats.context("failed to query engine statistics")?;
    println!(
        "{}",
        serde_json::to_string_pretty(&stats).context("failed to serialize statistics")?
    );
    Ok(())
}
