use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::Config;
use crate::error::Result;
use crate::extractors::{ExtractorRegistry, WatchHandle};
use crate::models::{Conversation, ToolTag};

/// Availability of one tool's storage location
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatus {
    pub tool: ToolTag,
    pub root: PathBuf,
    pub available: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionSummary {
    pub conversations: usize,
    pub messages: usize,
    pub per_tool: BTreeMap<String, usize>,
}

/// Runs every configured extractor, as a full pass or incrementally.
pub struct ExtractionService {
    registry: ExtractorRegistry,
}

impl ExtractionService {
    pub fn new(registry: ExtractorRegistry) -> Self {
        Self { registry }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(ExtractorRegistry::from_config(config))
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    pub fn status(&self) -> Vec<SourceStatus> {
        self.registry
            .extractors()
            .iter()
            .map(|extractor| SourceStatus {
                tool: extractor.tool(),
                root: extractor.root(),
                available: extractor.is_available(),
            })
            .collect()
    }

    /// Full extraction. `callback` is invoked once per conversation, tools
    /// in registry order.
    pub async fn extract_all<F>(&self, mut callback: F) -> ExtractionSummary
    where
        F: FnMut(Conversation),
    {
        let mut summary = ExtractionSummary::default();

        for extractor in self.registry.available() {
            let tool = extractor.tool();
            let conversations = extractor.extract_all().await;
            tracing::info!(tool = %tool, count = conversations.len(), "Extracted conversations");

            *summary.per_tool.entry(tool.to_string()).or_default() += conversations.len();
            for conversation in conversations {
                summary.conversations += 1;
                summary.messages += conversation.messages.len();
                callback(conversation);
            }
        }

        for extractor in self.registry.extractors().iter().filter(|e| !e.is_available()) {
            tracing::debug!(tool = %extractor.tool(), root = %extractor.root().display(), "Source not present, skipped");
        }

        summary
    }

    /// Start a watcher per available tool. New or changed conversations are
    /// sent on `sender`; dropping the returned handles stops watching.
    /// A watcher that fails to start is logged and skipped; the error is
    /// returned only when no watcher started at all.
    pub fn watch(&self, sender: UnboundedSender<Conversation>) -> Result<Vec<WatchHandle>> {
        let mut handles = Vec::new();
        let mut last_error = None;

        for extractor in self.registry.available() {
            match extractor.watch_for_changes(sender.clone()) {
                Ok(handle) => {
                    tracing::info!(tool = %extractor.tool(), "Watching for changes");
                    handles.push(handle);
                }
                Err(e) => {
                    tracing::warn!(
                        tool = %extractor.tool(),
                        category = e.category(),
                        error = %e,
                        "Failed to start watcher"
                    );
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if handles.is_empty() => Err(e),
            _ => Ok(handles),
        }
    }
}
