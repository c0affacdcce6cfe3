use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;

use super::base::{
    collect_files, file_modified, has_extension, parse_timestamp, read_workspace_folder,
    ConversationDraft,
};
use super::vscdb::{self, ITEM_TABLE, STATE_DB};
use super::watch::{spawn_fs_watch, WatchHandle};
use crate::models::{Conversation, MessageRole, ToolTag};

const SESSIONS_DIR: &str = "chatSessions";
const SESSIONS_KEY: &str = "interactive.sessions";

/// Reads GitHub Copilot Chat sessions from VS Code's `workspaceStorage`.
#[derive(Debug, Clone)]
pub struct CopilotExtractor {
    root: PathBuf,
}

impl CopilotExtractor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn default_root() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("Code").join("User").join("workspaceStorage"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_available(&self) -> bool {
        self.root.is_dir()
    }

    fn is_source_file(path: &Path) -> bool {
        has_extension(path, "json") || has_extension(path, "vscdb")
    }

    pub async fn extract_all(&self) -> Vec<Conversation> {
        if !self.is_available() {
            return Vec::new();
        }

        let mut workspaces = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %self.root.display(), error = %e, "Cannot list workspaceStorage");
                return Vec::new();
            }
        };

        let mut dirs = Vec::new();
        while let Ok(Some(entry)) = workspaces.next_entry().await {
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                dirs.push(entry.path());
            }
        }
        dirs.sort();

        let mut conversations = Vec::new();
        for dir in dirs {
            match self.extract_workspace(&dir).await {
                Ok(found) => conversations.extend(found),
                Err(e) => tracing::warn!(workspace = %dir.display(), error = %e, "Failed to read workspace"),
            }
        }

        tracing::info!(tool = %ToolTag::Copilot, count = conversations.len(), "Extraction finished");
        conversations
    }

    /// Sessions of one `workspaceStorage/<id>` directory. The session
    /// files are preferred; the database is read only when they yield
    /// nothing.
    pub async fn extract_workspace(&self, dir: &Path) -> Result<Vec<Conversation>> {
        let workspace = read_workspace_folder(dir).await;
        let fallback = file_modified(dir).unwrap_or_else(Utc::now);

        let mut conversations = Vec::new();
        let sessions_dir = dir.join(SESSIONS_DIR);
        if sessions_dir.is_dir() {
            for file in collect_files(&sessions_dir, |p| has_extension(p, "json")).await {
                let raw = match tokio::fs::read_to_string(&file).await {
                    Ok(raw) => raw,
                    Err(e) => {
                        tracing::warn!(path = %file.display(), error = %e, "Failed to read session file");
                        continue;
                    }
                };
                let document: Value = match serde_json::from_str(&raw) {
                    Ok(document) => document,
                    Err(e) => {
                        tracing::debug!(path = %file.display(), error = %e, "Skipping malformed session file");
                        continue;
                    }
                };
                let key = file.to_string_lossy().to_string();
                let file_time = file_modified(&file).unwrap_or(fallback);
                conversations.extend(sessions_from_document(&document, &key, workspace.as_deref(), file_time));
            }
        }

        if conversations.is_empty() {
            let db_path = dir.join(STATE_DB);
            if db_path.is_file() {
                let document = tokio::task::spawn_blocking(move || -> Result<Option<Value>> {
                    let conn = vscdb::open_read_only(&db_path)?;
                    vscdb::get_json(&conn, ITEM_TABLE, SESSIONS_KEY)
                })
                .await
                .context("Database read task failed")??;

                if let Some(document) = document {
                    let key = dir.to_string_lossy().to_string();
                    conversations.extend(sessions_from_document(&document, &key, workspace.as_deref(), fallback));
                }
            }
        }

        Ok(conversations)
    }

    pub fn watch_for_changes(&self, sender: UnboundedSender<Conversation>) -> crate::error::Result<WatchHandle> {
        let extractor = self.clone();
        spawn_fs_watch(
            ToolTag::Copilot,
            vec![self.root.clone()],
            Self::is_source_file,
            move || {
                let extractor = extractor.clone();
                async move { extractor.extract_all().await }
            },
            sender,
        )
    }
}

/// A document is a single session (`requests[]`), a `{sessions: [...]}`
/// wrapper, or a bare array of sessions.
pub fn sessions_from_document(
    document: &Value,
    key: &str,
    workspace: Option<&Path>,
    fallback: DateTime<Utc>,
) -> Vec<Conversation> {
    let sessions: Vec<&Value> = if document.get("requests").is_some() {
        vec![document]
    } else if let Some(sessions) = document.get("sessions").and_then(Value::as_array) {
        sessions.iter().collect()
    } else if let Some(sessions) = document.as_array() {
        sessions.iter().collect()
    } else {
        Vec::new()
    };

    sessions
        .into_iter()
        .enumerate()
        .filter_map(|(index, session)| {
            let session_key = session
                .get("sessionId")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("{key}#{index}"));
            parse_session(session, &session_key, workspace, fallback)
        })
        .collect()
}

fn parse_session(
    session: &Value,
    key: &str,
    workspace: Option<&Path>,
    fallback: DateTime<Utc>,
) -> Option<Conversation> {
    let requests = session.get("requests").and_then(Value::as_array)?;
    let created = session.get("creationDate").and_then(parse_timestamp);
    let updated = session.get("lastMessageDate").and_then(parse_timestamp);
    let title = session
        .get("customTitle")
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut draft = ConversationDraft::new(ToolTag::Copilot, key)
        .title(title)
        .workspace(workspace.map(Path::to_path_buf))
        .timestamps(created, updated)
        .fallback_time(fallback);

    for request in requests {
        let timestamp = request.get("timestamp").and_then(parse_timestamp);
        let model = request
            .get("modelId")
            .and_then(Value::as_str)
            .map(|m| m.trim_start_matches("copilot/").to_string());

        let prompt = request
            .pointer("/message/text")
            .and_then(Value::as_str)
            .unwrap_or_default();
        draft.push(MessageRole::User, prompt, timestamp, None);
        draft.push(MessageRole::Assistant, response_text(request), timestamp, model);
    }

    draft.build()
}

/// Joined markdown parts of `response[]`: `{value}` or
/// `{kind, content: {value}}`.
fn response_text(request: &Value) -> String {
    request
        .get("response")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| {
                    part.get("value")
                        .and_then(Value::as_str)
                        .or_else(|| part.pointer("/content/value").and_then(Value::as_str))
                })
                .collect::<String>()
        })
        .unwrap_or_default()
}
