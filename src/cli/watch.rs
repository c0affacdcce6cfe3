use anyhow::{Context, Result};
use std::io::Write;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::extractors::ExtractorRegistry;
use crate::models::ToolTag;
use crate::services::ExtractionService;

/// Stream new and changed conversations as JSON lines until Ctrl+C.
pub async fn handle_watch_command(tools: Vec<ToolTag>) -> Result<()> {
    let config = Config::load()?;
    let registry = ExtractorRegistry::for_tools(&config, &super::selected_tools(tools));
    let service = ExtractionService::new(registry);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handles = service.watch(tx)?;
    if handles.is_empty() {
        anyhow::bail!("No tool storage found to watch. Run `chatvault status` to see locations.");
    }
    eprintln!("Watching {} source(s). Press Ctrl+C to stop.", handles.len());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            received = rx.recv() => {
                let Some(conversation) = received else {
                    break;
                };
                let json = serde_json::to_string(&conversation)?;
                let mut out = std::io::stdout().lock();
                writeln!(out, "{json}").context("Failed to write conversation")?;
                out.flush()?;
            }
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted, stopping watchers");
                break;
            }
        }
    }

    for handle in handles {
        handle.stop();
    }
    Ok(())
}
