use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;

use super::base::{
    collect_files, file_modified, has_extension, parse_timestamp, text_from_content,
    ConversationDraft,
};
use super::blob_scanner;
use super::watch::{spawn_fs_watch, WatchHandle};
use crate::models::{Conversation, MessageRole, ToolTag};

/// Reads Antigravity conversations, stored either as JSON documents or as
/// opaque protobuf blobs.
#[derive(Debug, Clone)]
pub struct AntigravityExtractor {
    root: PathBuf,
}

impl AntigravityExtractor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn default_root() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".gemini").join("antigravity").join("conversations"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_available(&self) -> bool {
        self.root.is_dir()
    }

    pub fn is_conversation_file(path: &Path) -> bool {
        has_extension(path, "json") || has_extension(path, "pb")
    }

    pub async fn extract_all(&self) -> Vec<Conversation> {
        if !self.is_available() {
            return Vec::new();
        }

        let mut conversations = Vec::new();
        for file in collect_files(&self.root, Self::is_conversation_file).await {
            match self.extract_file(&file).await {
                Ok(Some(conversation)) => conversations.push(conversation),
                Ok(None) => tracing::debug!(path = %file.display(), "Nothing recoverable, skipping"),
                Err(e) => tracing::warn!(path = %file.display(), error = %e, "Failed to read conversation"),
            }
        }

        tracing::info!(tool = %ToolTag::Antigravity, count = conversations.len(), "Extraction finished");
        conversations
    }

    pub async fn extract_file(&self, path: &Path) -> Result<Option<Conversation>> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read conversation file: {}", path.display()))?;

        let key = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        let fallback = file_modified(path).unwrap_or_else(Utc::now);

        Ok(parse_conversation(&key, &data, fallback))
    }

    pub fn watch_for_changes(&self, sender: UnboundedSender<Conversation>) -> crate::error::Result<WatchHandle> {
        let extractor = self.clone();
        spawn_fs_watch(
            ToolTag::Antigravity,
            vec![self.root.clone()],
            Self::is_conversation_file,
            move || {
                let extractor = extractor.clone();
                async move { extractor.extract_all().await }
            },
            sender,
        )
    }
}

/// JSON when the bytes parse as JSON, the binary string scan otherwise.
/// A JSON document without a turn array yields nothing.
pub fn parse_conversation(key: &str, data: &[u8], fallback: DateTime<Utc>) -> Option<Conversation> {
    match serde_json::from_slice::<Value>(data) {
        Ok(document) => {
            let conversation = parse_json_document(key, &document, fallback);
            if conversation.is_none() {
                tracing::debug!(key, "JSON document without turns, skipping");
            }
            conversation
        }
        Err(_) => parse_binary(key, data, fallback),
    }
}

fn parse_json_document(key: &str, document: &Value, fallback: DateTime<Utc>) -> Option<Conversation> {
    let turns = ["messages", "turns", "steps"]
        .iter()
        .find_map(|field| document.get(*field).and_then(Value::as_array))
        .or_else(|| document.as_array())?;

    let title = ["title", "name", "summary"]
        .iter()
        .find_map(|field| document.get(*field).and_then(Value::as_str))
        .map(str::to_string);
    let workspace = document
        .get("workspace")
        .and_then(Value::as_str)
        .map(PathBuf::from);
    let created = document.get("createdAt").and_then(parse_timestamp);
    let updated = document.get("updatedAt").and_then(parse_timestamp);

    let mut draft = ConversationDraft::new(ToolTag::Antigravity, key)
        .title(title)
        .workspace(workspace)
        .timestamps(created, updated)
        .fallback_time(fallback);

    for turn in turns {
        let Some(role) = turn_role(turn) else {
            continue;
        };
        let text = ["content", "text", "parts"]
            .iter()
            .find_map(|field| turn.get(*field))
            .map(turn_text)
            .unwrap_or_default();
        let timestamp = turn.get("timestamp").and_then(parse_timestamp);
        let model = turn
            .get("model")
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|_| role == MessageRole::Assistant);
        draft.push(role, text, timestamp, model);
    }

    draft.build()
}

fn turn_role(turn: &Value) -> Option<MessageRole> {
    let raw = ["role", "author", "type"]
        .iter()
        .find_map(|field| turn.get(*field).and_then(Value::as_str))?;

    match raw.trim().to_ascii_uppercase().as_str() {
        "USER" | "HUMAN" | "USER_INPUT" => Some(MessageRole::User),
        "ASSISTANT" | "MODEL" | "RESPONSE" | "PLANNER_RESPONSE" | "AGENT" => Some(MessageRole::Assistant),
        "SYSTEM" => Some(MessageRole::System),
        _ => None,
    }
}

/// Plain strings, text blocks, or Gemini-style `parts[].text`.
fn turn_text(value: &Value) -> String {
    match value {
        Value::Object(_) => value
            .get("text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default(),
        _ => text_from_content(value),
    }
}

fn parse_binary(key: &str, data: &[u8], fallback: DateTime<Utc>) -> Option<Conversation> {
    let strings = blob_scanner::extract_strings(data);
    if strings.is_empty() {
        return None;
    }

    let mut metadata = Map::new();
    metadata.insert("heuristic".to_string(), Value::Bool(true));
    metadata.insert("extraction".to_string(), Value::String("binary-scan".to_string()));

    let mut draft = ConversationDraft::new(ToolTag::Antigravity, key).fallback_time(fallback);
    for (index, text) in strings.into_iter().enumerate() {
        let role = if index % 2 == 0 {
            MessageRole::User
        } else {
            MessageRole::Assistant
        };
        draft.push_with_metadata(role, text, None, None, metadata.clone());
    }

    draft.build()
}
