//! Shared helpers for every file extractor: deterministic ids, hashing,
//! title derivation and role normalization.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::{Conversation, Message, MessageRole, ToolTag};

pub const TITLE_MAX_CHARS: usize = 80;
const UNTITLED: &str = "Untitled conversation";

/// Deterministic UUID-shaped id from the SHA-256 of `input`.
pub fn generate_id(input: &str) -> Uuid {
    let digest = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

pub fn hash_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Fingerprint over the tool tag and the first three messages' content.
pub fn source_hash(tool: ToolTag, messages: &[Message]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tool.as_str().as_bytes());
    for message in messages.iter().take(3) {
        hasher.update(b"\n");
        hasher.update(message.content.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Map a tool-specific role string onto the shared enumeration.
/// Unrecognized roles become `System`.
pub fn normalize_role(role: &str) -> MessageRole {
    match role.trim().to_ascii_lowercase().as_str() {
        "user" | "human" | "me" | "prompt" => MessageRole::User,
        "assistant" | "ai" | "bot" | "model" | "agent" | "response" => MessageRole::Assistant,
        _ => MessageRole::System,
    }
}

/// Truncate to `max_chars` characters, ending in "..." when shortened.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str("...");
    truncated
}

/// Explicit title if non-blank, else the first user message, else a placeholder.
pub fn derive_title(messages: &[Message], explicit: Option<&str>) -> String {
    if let Some(title) = explicit.map(str::trim).filter(|t| !t.is_empty()) {
        return title.to_string();
    }

    messages
        .iter()
        .find(|m| m.is_user_message())
        .map(|m| {
            let flattened = m.content.trim().replace(['\r', '\n'], " ");
            truncate_with_ellipsis(&flattened, TITLE_MAX_CHARS)
        })
        .unwrap_or_else(|| UNTITLED.to_string())
}

pub fn timestamp_from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// RFC 3339 strings or epoch milliseconds (as number or numeric string).
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(timestamp_from_millis),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<i64>().ok().and_then(timestamp_from_millis)),
        _ => None,
    }
}

pub fn file_modified(path: &Path) -> Option<DateTime<Utc>> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}

/// Join the text of `{type: "text", text}` blocks, or return a plain string.
pub fn text_from_content(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(blocks) => blocks
            .iter()
            .filter_map(|block| match block {
                Value::String(s) => Some(s.as_str()),
                Value::Object(_) => {
                    let kind = block.get("type").and_then(Value::as_str);
                    match kind {
                        None | Some("text") | Some("input_text") | Some("output_text") => {
                            block.get("text").and_then(Value::as_str)
                        }
                        _ => None,
                    }
                }
                _ => None,
            })
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"),
        _ => String::new(),
    }
}

/// Files under `root` (recursively) accepted by `matches`, sorted.
/// Unreadable directories are logged and skipped.
pub async fn collect_files(root: &Path, matches: fn(&Path) -> bool) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(path = %dir.display(), error = %e, "Skipping unreadable directory");
                continue;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            match entry.file_type().await {
                Ok(kind) if kind.is_dir() => pending.push(path),
                Ok(kind) if kind.is_file() && matches(&path) => files.push(path),
                _ => {}
            }
        }
    }

    files.sort();
    files
}

pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// Project folder recorded in a VS Code style `workspace.json`
/// (`{"folder": "file:///..."}`).
pub async fn read_workspace_folder(workspace_dir: &Path) -> Option<PathBuf> {
    let raw = tokio::fs::read_to_string(workspace_dir.join("workspace.json"))
        .await
        .ok()?;
    let value: Value = serde_json::from_str(&raw).ok()?;
    let folder = value
        .get("folder")
        .or_else(|| value.get("workspace"))
        .and_then(Value::as_str)?;

    match url::Url::parse(folder) {
        Ok(url) if url.scheme() == "file" => url.to_file_path().ok(),
        Ok(_) => None,
        Err(_) => Some(PathBuf::from(folder)),
    }
}

#[derive(Debug, Clone)]
struct DraftTurn {
    role: MessageRole,
    content: String,
    timestamp: Option<DateTime<Utc>>,
    model: Option<String>,
    metadata: Map<String, Value>,
}

/// Accumulates raw turns for one conversation and builds the normalized record.
#[derive(Debug, Clone)]
pub struct ConversationDraft {
    tool: ToolTag,
    key: String,
    title: Option<String>,
    workspace: Option<PathBuf>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    fallback_time: DateTime<Utc>,
    turns: Vec<DraftTurn>,
}

impl ConversationDraft {
    /// `key` must identify the conversation stably across runs (file path, session id).
    pub fn new(tool: ToolTag, key: impl Into<String>) -> Self {
        Self {
            tool,
            key: key.into(),
            title: None,
            workspace: None,
            created_at: None,
            updated_at: None,
            fallback_time: DateTime::<Utc>::from(std::time::UNIX_EPOCH),
            turns: Vec::new(),
        }
    }

    pub fn title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    pub fn workspace(mut self, workspace: Option<PathBuf>) -> Self {
        self.workspace = workspace;
        self
    }

    pub fn set_workspace(&mut self, workspace: PathBuf) {
        self.workspace = Some(workspace);
    }

    pub fn timestamps(
        mut self,
        created_at: Option<DateTime<Utc>>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    /// Timestamp used for turns that carry none of their own.
    pub fn fallback_time(mut self, time: DateTime<Utc>) -> Self {
        self.fallback_time = time;
        self
    }

    pub fn push(
        &mut self,
        role: MessageRole,
        content: impl Into<String>,
        timestamp: Option<DateTime<Utc>>,
        model: Option<String>,
    ) {
        self.push_with_metadata(role, content, timestamp, model, Map::new());
    }

    pub fn push_with_metadata(
        &mut self,
        role: MessageRole,
        content: impl Into<String>,
        timestamp: Option<DateTime<Utc>>,
        model: Option<String>,
        metadata: Map<String, Value>,
    ) {
        let content = content.into();
        if content.trim().is_empty() {
            return;
        }
        self.turns.push(DraftTurn {
            role,
            content,
            timestamp,
            model,
            metadata,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn build(self) -> Option<Conversation> {
        let conversation_id = generate_id(&format!("{}:{}", self.tool, self.key));
        let default_time = self.created_at.unwrap_or(self.fallback_time);

        let messages: Vec<Message> = self
            .turns
            .into_iter()
            .enumerate()
            .filter_map(|(index, turn)| {
                let id = generate_id(&format!(
                    "{conversation_id}:{index}:{}:{}",
                    turn.role, turn.content
                ));
                let mut message = Message::new(
                    id,
                    conversation_id,
                    turn.role,
                    turn.content,
                    turn.timestamp.unwrap_or(default_time),
                )?
                .with_model(turn.model);
                message.metadata = turn.metadata;
                Some(message)
            })
            .collect();

        let title = derive_title(&messages, self.title.as_deref());
        let hash = source_hash(self.tool, &messages);
        let mut conversation = Conversation::new(conversation_id, self.tool, title, hash, messages)?
            .with_workspace(self.workspace);

        if self.created_at.is_some() || self.updated_at.is_some() {
            let created = self.created_at.unwrap_or(conversation.created_at);
            let updated = self.updated_at.unwrap_or(conversation.updated_at);
            conversation = conversation.with_timestamps(created, updated);
        }

        Some(conversation)
    }
}
