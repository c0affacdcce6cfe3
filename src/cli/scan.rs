use anyhow::Result;
use std::io::Write;

use crate::config::Config;
use crate::extractors::ExtractorRegistry;
use crate::models::ToolTag;
use crate::services::ExtractionService;

/// Run a full extraction and write each conversation as one JSON line.
pub async fn handle_scan_command(tools: Vec<ToolTag>) -> Result<()> {
    let config = Config::load()?;
    let registry = ExtractorRegistry::for_tools(&config, &super::selected_tools(tools));
    let service = ExtractionService::new(registry);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut write_error = None;

    let summary = service
        .extract_all(|conversation| {
            if write_error.is_some() {
                return;
            }
            let line = serde_json::to_string(&conversation)
                .map_err(anyhow::Error::from)
                .and_then(|json| writeln!(out, "{json}").map_err(anyhow::Error::from));
            if let Err(e) = line {
                write_error = Some(e);
            }
        })
        .await;

    if let Some(e) = write_error {
        return Err(e.context("Failed to write conversation"));
    }

    tracing::info!(
        conversations = summary.conversations,
        messages = summary.messages,
        "Scan complete"
    );
    eprintln!("{}", serde_json::to_string(&summary)?);

    Ok(())
}
