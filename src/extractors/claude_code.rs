use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;

use super::base::{
    collect_files, file_modified, has_extension, normalize_role, parse_timestamp,
    text_from_content, ConversationDraft,
};
use super::watch::{spawn_fs_watch, WatchHandle};
use crate::models::{Conversation, MessageRole, ToolTag};

/// One line of a Claude Code session log.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord {
    #[serde(rename = "type")]
    record_type: Option<String>,
    session_id: Option<String>,
    timestamp: Option<Value>,
    message: Option<RecordMessage>,
    summary: Option<String>,
    cwd: Option<String>,
    #[serde(default)]
    is_meta: bool,
}

#[derive(Debug, Deserialize)]
struct RecordMessage {
    role: Option<String>,
    content: Option<Value>,
    model: Option<String>,
}

/// Reads `~/.claude/projects/**/*.jsonl`; one file is one conversation.
#[derive(Debug, Clone)]
pub struct ClaudeCodeExtractor {
    root: PathBuf,
}

impl ClaudeCodeExtractor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn default_root() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".claude").join("projects"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_available(&self) -> bool {
        self.root.is_dir()
    }

    pub fn is_session_file(path: &Path) -> bool {
        has_extension(path, "jsonl")
    }

    pub async fn extract_all(&self) -> Vec<Conversation> {
        if !self.is_available() {
            return Vec::new();
        }

        let mut conversations = Vec::new();
        for file in collect_files(&self.root, Self::is_session_file).await {
            match self.extract_file(&file).await {
                Ok(Some(conversation)) => conversations.push(conversation),
                Ok(None) => {
                    tracing::debug!(path = %file.display(), "Session has no messages, skipping")
                }
                Err(e) => tracing::warn!(path = %file.display(), error = %e, "Failed to read session"),
            }
        }

        tracing::info!(tool = %ToolTag::ClaudeCode, count = conversations.len(), "Extraction finished");
        conversations
    }

    pub async fn extract_file(&self, path: &Path) -> Result<Option<Conversation>> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read session file: {}", path.display()))?;

        let key = path
            .strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();
        let fallback = file_modified(path).unwrap_or_else(chrono::Utc::now);

        Ok(parse_session(&key, &content, fallback))
    }

    pub fn watch_for_changes(&self, sender: UnboundedSender<Conversation>) -> crate::error::Result<WatchHandle> {
        let extractor = self.clone();
        spawn_fs_watch(
            ToolTag::ClaudeCode,
            vec![self.root.clone()],
            Self::is_session_file,
            move || {
                let extractor = extractor.clone();
                async move { extractor.extract_all().await }
            },
            sender,
        )
    }
}

/// Parse one session log. Lines that are not JSON records are skipped.
pub fn parse_session(key: &str, content: &str, fallback: chrono::DateTime<chrono::Utc>) -> Option<Conversation> {
    let mut session_id = None;
    let mut summary = None;
    let mut workspace = None;
    let mut draft_turns = Vec::new();

    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let record: SessionRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!(key, line = index + 1, error = %e, "Skipping malformed line");
                continue;
            }
        };

        if session_id.is_none() {
            session_id = record.session_id.clone();
        }
        if workspace.is_none() {
            workspace = record.cwd.clone().filter(|cwd| !cwd.is_empty());
        }
        if record.record_type.as_deref() == Some("summary") {
            summary = record.summary.clone().or(summary);
            continue;
        }
        if record.is_meta {
            continue;
        }

        let Some(message) = record.message else {
            continue;
        };
        let role = message
            .role
            .as_deref()
            .or(record.record_type.as_deref())
            .map(normalize_role)
            .unwrap_or(MessageRole::System);
        let text = message
            .content
            .as_ref()
            .map(text_from_content)
            .unwrap_or_default();
        let timestamp = record.timestamp.as_ref().and_then(parse_timestamp);
        let model = message.model.filter(|m| role == MessageRole::Assistant && !m.starts_with('<'));

        draft_turns.push((role, text, timestamp, model));
    }

    let mut draft = ConversationDraft::new(ToolTag::ClaudeCode, session_id.unwrap_or_else(|| key.to_string()))
        .title(summary)
        .workspace(workspace.map(PathBuf::from))
        .fallback_time(fallback);
    for (role, text, timestamp, model) in draft_turns {
        draft.push(role, text, timestamp, model);
    }

    draft.build()
}
