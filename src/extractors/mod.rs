pub mod antigravity;
pub mod base;
pub mod blob_scanner;
pub mod claude_code;
pub mod copilot;
pub mod cursor;
pub mod vscdb;
pub mod watch;

use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::Config;
use crate::error::Result;
use crate::models::{Conversation, ToolTag};

pub use antigravity::AntigravityExtractor;
pub use claude_code::ClaudeCodeExtractor;
pub use copilot::CopilotExtractor;
pub use cursor::CursorExtractor;
pub use watch::WatchHandle;

pub enum Extractor {
    Copilot(CopilotExtractor),
    Cursor(CursorExtractor),
    ClaudeCode(ClaudeCodeExtractor),
    Antigravity(AntigravityExtractor),
}

impl Extractor {
    /// Extractor for `tool` rooted at the configured directory, or the
    /// tool's default location. `None` for tools without on-disk storage
    /// or when no root can be determined.
    pub fn for_tool(tool: ToolTag, config: &Config) -> Option<Self> {
        match tool {
            ToolTag::Copilot => config
                .copilot_dir()
                .or_else(CopilotExtractor::default_root)
                .map(|root| Extractor::Copilot(CopilotExtractor::new(root))),
            ToolTag::Cursor => config
                .cursor_dir()
                .or_else(CursorExtractor::default_root)
                .map(|root| {
                    let extractor = CursorExtractor::new(root);
                    let extractor = match config.cursor_poll_interval() {
                        Some(interval) => extractor.with_poll_interval(interval),
                        None => extractor,
                    };
                    Extractor::Cursor(extractor)
                }),
            ToolTag::ClaudeCode => config
                .claude_dir()
                .or_else(ClaudeCodeExtractor::default_root)
                .map(|root| Extractor::ClaudeCode(ClaudeCodeExtractor::new(root))),
            ToolTag::Antigravity => config
                .antigravity_dir()
                .or_else(AntigravityExtractor::default_root)
                .map(|root| Extractor::Antigravity(AntigravityExtractor::new(root))),
            ToolTag::Codex | ToolTag::GeminiCli => None,
        }
    }

    pub fn tool(&self) -> ToolTag {
        match self {
            Extractor::Copilot(_) => ToolTag::Copilot,
            Extractor::Cursor(_) => ToolTag::Cursor,
            Extractor::ClaudeCode(_) => ToolTag::ClaudeCode,
            Extractor::Antigravity(_) => ToolTag::Antigravity,
        }
    }

    pub fn root(&self) -> PathBuf {
        match self {
            Extractor::Copilot(extractor) => extractor.root().to_path_buf(),
            Extractor::Cursor(extractor) => extractor.root().to_path_buf(),
            Extractor::ClaudeCode(extractor) => extractor.root().to_path_buf(),
            Extractor::Antigravity(extractor) => extractor.root().to_path_buf(),
        }
    }

    pub fn is_available(&self) -> bool {
        match self {
            Extractor::Copilot(extractor) => extractor.is_available(),
            Extractor::Cursor(extractor) => extractor.is_available(),
            Extractor::ClaudeCode(extractor) => extractor.is_available(),
            Extractor::Antigravity(extractor) => extractor.is_available(),
        }
    }

    pub async fn extract_all(&self) -> Vec<Conversation> {
        match self {
            Extractor::Copilot(extractor) => extractor.extract_all().await,
            Extractor::Cursor(extractor) => extractor.extract_all().await,
            Extractor::ClaudeCode(extractor) => extractor.extract_all().await,
            Extractor::Antigravity(extractor) => extractor.extract_all().await,
        }
    }

    pub fn watch_for_changes(&self, sender: UnboundedSender<Conversation>) -> Result<WatchHandle> {
        match self {
            Extractor::Copilot(extractor) => extractor.watch_for_changes(sender),
            Extractor::Cursor(extractor) => extractor.watch_for_changes(sender),
            Extractor::ClaudeCode(extractor) => extractor.watch_for_changes(sender),
            Extractor::Antigravity(extractor) => extractor.watch_for_changes(sender),
        }
    }
}

/// The set of extractors a run works with.
#[derive(Default)]
pub struct ExtractorRegistry {
    extractors: Vec<Extractor>,
}

impl ExtractorRegistry {
    pub fn new(extractors: Vec<Extractor>) -> Self {
        Self { extractors }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::for_tools(config, &ToolTag::with_extractors())
    }

    pub fn for_tools(config: &Config, tools: &[ToolTag]) -> Self {
        let extractors = tools
            .iter()
            .filter_map(|tool| {
                let extractor = Extractor::for_tool(*tool, config);
                if extractor.is_none() {
                    tracing::debug!(tool = %tool, "No storage location for tool");
                }
                extractor
            })
            .collect();
        Self { extractors }
    }

    pub fn extractors(&self) -> &[Extractor] {
        &self.extractors
    }

    pub fn get(&self, tool: ToolTag) -> Option<&Extractor> {
        self.extractors.iter().find(|e| e.tool() == tool)
    }

    pub fn available(&self) -> impl Iterator<Item = &Extractor> {
        self.extractors.iter().filter(|e| e.is_available())
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}
