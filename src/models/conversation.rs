use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use super::message::Message;
use super::tool::ToolTag;

/// Ordered messages from one extraction event, normalized across tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub title: String,
    pub tool: ToolTag,
    /// Content fingerprint used for cross-run dedup and change detection
    pub source_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Returns `None` for an empty message list.
    ///
    /// Timestamps default to the earliest and latest message timestamps.
    pub fn new(
        id: Uuid,
        tool: ToolTag,
        title: String,
        source_hash: String,
        messages: Vec<Message>,
    ) -> Option<Self> {
        let created_at = messages.iter().map(|m| m.timestamp).min()?;
        let updated_at = messages
            .iter()
            .map(|m| m.timestamp)
            .max()
            .unwrap_or(created_at);

        Some(Self {
            id,
            title,
            tool,
            source_hash,
            workspace_path: None,
            created_at,
            updated_at,
            messages,
        })
    }

    pub fn with_workspace(mut self, workspace_path: Option<PathBuf>) -> Self {
        self.workspace_path = workspace_path;
        self
    }

    pub fn with_timestamps(mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at.max(created_at);
        self
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn first_user_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.is_user_message())
    }
}
