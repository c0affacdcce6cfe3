//! Cursor keeps chat state in per-workspace `state.vscdb` key-value stores.
//!
//! Full transcripts live in the global database (`cursorDiskKV`,
//! `composerData:<id>`). Older or partially synced installs only have the
//! workspace's composer index and its flat prompt history, with no key
//! linking a prompt to its composer; those are matched by title prefix,
//! which is approximate.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

use super::base::{file_modified, parse_timestamp, read_workspace_folder, timestamp_from_millis, ConversationDraft};
use super::vscdb::{self, DISK_KV_TABLE, ITEM_TABLE, STATE_DB};
use super::watch::{spawn_mtime_poll, WatchHandle, DEFAULT_POLL_INTERVAL};
use crate::models::{Conversation, MessageRole, ToolTag};

const COMPOSER_INDEX_KEY: &str = "composer.composerData";
const PROMPTS_KEY: &str = "aiService.prompts";
const GENERATIONS_KEY: &str = "aiService.generations";
const COMPOSER_DATA_PREFIX: &str = "composerData:";
const BUBBLE_PREFIX: &str = "bubbleId:";

const BUBBLE_USER: i64 = 1;
const BUBBLE_ASSISTANT: i64 = 2;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposerEntry {
    pub composer_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub last_updated_at: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComposerIndex {
    #[serde(default)]
    all_composers: Vec<ComposerEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptEntry {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub command_type: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerationEntry {
    #[serde(default)]
    unix_ms: Option<i64>,
}

/// A prompt with the time Cursor recorded its generation.
#[derive(Debug, Clone)]
pub struct TimedPrompt {
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Turn from a global-store transcript.
#[derive(Debug, Clone)]
struct Bubble {
    role: MessageRole,
    text: String,
    timestamp: Option<DateTime<Utc>>,
    model: Option<String>,
}

/// Raw contents of one workspace database plus matching global transcripts.
#[derive(Debug, Default)]
struct WorkspaceState {
    composers: Vec<ComposerEntry>,
    prompts: Vec<TimedPrompt>,
    transcripts: HashMap<String, Vec<Bubble>>,
}

#[derive(Debug, Clone)]
pub struct CursorExtractor {
    root: PathBuf,
    poll_interval: Duration,
}

impl CursorExtractor {
    /// `root` is Cursor's `workspaceStorage` directory; the global store is
    /// its sibling `globalStorage/state.vscdb`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn default_root() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("Cursor").join("User").join("workspaceStorage"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn global_database(&self) -> Option<PathBuf> {
        let path = self.root.parent()?.join("globalStorage").join(STATE_DB);
        path.is_file().then_some(path)
    }

    pub fn is_available(&self) -> bool {
        self.root.is_dir()
    }

    pub async fn extract_all(&self) -> Vec<Conversation> {
        if !self.is_available() {
            return Vec::new();
        }

        let root = self.root.clone();
        let databases = tokio::task::spawn_blocking(move || vscdb::workspace_databases(&root))
            .await
            .unwrap_or_default();

        let mut conversations = Vec::new();
        for db_path in databases {
            match self.extract_workspace(&db_path).await {
                Ok(found) => conversations.extend(found),
                Err(e) => tracing::warn!(path = %db_path.display(), error = %e, "Failed to read Cursor database"),
            }
        }

        tracing::info!(tool = %ToolTag::Cursor, count = conversations.len(), "Extraction finished");
        conversations
    }

    pub async fn extract_workspace(&self, db_path: &Path) -> Result<Vec<Conversation>> {
        let workspace_dir = db_path.parent().unwrap_or(Path::new("."));
        let workspace = read_workspace_folder(workspace_dir).await;
        let workspace_id = workspace_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let fallback = file_modified(db_path).unwrap_or_else(Utc::now);

        let path = db_path.to_path_buf();
        let global = self.global_database();
        let state = tokio::task::spawn_blocking(move || read_workspace_state(&path, global.as_deref()))
            .await
            .context("Database read task failed")??;

        Ok(build_conversations(&workspace_id, state, workspace, fallback))
    }

    pub fn watch_for_changes(&self, sender: UnboundedSender<Conversation>) -> crate::error::Result<WatchHandle> {
        let root = self.root.clone();
        let global = self.root.parent().map(|p| p.join("globalStorage").join(STATE_DB));
        let extractor = self.clone();

        Ok(spawn_mtime_poll(
            ToolTag::Cursor,
            self.poll_interval,
            move || {
                let mut files = vscdb::workspace_databases(&root);
                files.extend(global.clone().filter(|p| p.is_file()));
                files
            },
            move || {
                let extractor = extractor.clone();
                async move { extractor.extract_all().await }
            },
            sender,
        ))
    }
}

fn read_workspace_state(db_path: &Path, global: Option<&Path>) -> Result<WorkspaceState> {
    let conn = vscdb::open_read_only(db_path)?;

    let composers = vscdb::get_value(&conn, ITEM_TABLE, COMPOSER_INDEX_KEY)?
        .and_then(|raw| parse_or_log::<ComposerIndex>(&raw, COMPOSER_INDEX_KEY))
        .map(|index| index.all_composers)
        .unwrap_or_default();

    let prompts: Vec<PromptEntry> = vscdb::get_value(&conn, ITEM_TABLE, PROMPTS_KEY)?
        .and_then(|raw| parse_or_log(&raw, PROMPTS_KEY))
        .unwrap_or_default();
    let generations: Vec<GenerationEntry> = vscdb::get_value(&conn, ITEM_TABLE, GENERATIONS_KEY)?
        .and_then(|raw| parse_or_log(&raw, GENERATIONS_KEY))
        .unwrap_or_default();

    let prompts = prompts
        .into_iter()
        .enumerate()
        .map(|(index, prompt)| TimedPrompt {
            text: prompt.text,
            timestamp: generations
                .get(index)
                .and_then(|g| g.unix_ms)
                .and_then(timestamp_from_millis),
        })
        .collect();

    let mut transcripts = HashMap::new();
    if let Some(global) = global {
        match vscdb::open_read_only(global) {
            Ok(global_conn) => {
                for composer in &composers {
                    match read_transcript(&global_conn, &composer.composer_id) {
                        Ok(bubbles) if !bubbles.is_empty() => {
                            transcripts.insert(composer.composer_id.clone(), bubbles);
                        }
                        Ok(_) => {}
                        Err(e) => tracing::debug!(
                            composer = %composer.composer_id,
                            error = %e,
                            "Unreadable composer transcript"
                        ),
                    }
                }
            }
            Err(e) => tracing::debug!(error = %e, "Global Cursor database unavailable"),
        }
    }

    Ok(WorkspaceState {
        composers,
        prompts,
        transcripts,
    })
}

fn parse_or_log<T: serde::de::DeserializeOwned>(raw: &str, key: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(key, error = %e, "Unexpected value shape, ignoring");
            None
        }
    }
}

/// Bubbles inline in `conversation[]`, or referenced from
/// `fullConversationHeadersOnly[]` and stored under `bubbleId:<composer>:<bubble>`.
fn read_transcript(conn: &Connection, composer_id: &str) -> Result<Vec<Bubble>> {
    let key = format!("{COMPOSER_DATA_PREFIX}{composer_id}");
    let Some(data) = vscdb::get_json(conn, DISK_KV_TABLE, &key)? else {
        return Ok(Vec::new());
    };

    if let Some(inline) = data.get("conversation").and_then(Value::as_array) {
        if !inline.is_empty() {
            return Ok(inline.iter().filter_map(bubble_from_value).collect());
        }
    }

    let Some(headers) = data.get("fullConversationHeadersOnly").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    let prefix = format!("{BUBBLE_PREFIX}{composer_id}:");
    let stored: HashMap<String, String> = vscdb::values_with_prefix(conn, DISK_KV_TABLE, &prefix)?
        .into_iter()
        .collect();

    Ok(headers
        .iter()
        .filter_map(|header| header.get("bubbleId").and_then(Value::as_str))
        .filter_map(|bubble_id| stored.get(&format!("{prefix}{bubble_id}")))
        .filter_map(|raw| serde_json::from_str::<Value>(raw).ok())
        .filter_map(|value| bubble_from_value(&value))
        .collect())
}

fn bubble_from_value(value: &Value) -> Option<Bubble> {
    let role = match value.get("type").and_then(Value::as_i64)? {
        BUBBLE_USER => MessageRole::User,
        BUBBLE_ASSISTANT => MessageRole::Assistant,
        _ => return None,
    };
    let text = value.get("text").and_then(Value::as_str)?.to_string();
    let timestamp = value
        .pointer("/timingInfo/clientStartTime")
        .or_else(|| value.get("createdAt"))
        .and_then(parse_timestamp);
    let model = value
        .pointer("/modelInfo/modelName")
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|_| role == MessageRole::Assistant);

    Some(Bubble {
        role,
        text,
        timestamp,
        model,
    })
}

fn normalize_title(text: &str) -> String {
    let trimmed = text.trim().trim_end_matches("...").trim_end_matches('…');
    trimmed
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Assign each prompt to a composer. A prompt whose normalized text starts
/// with a composer's normalized name (or vice versa) opens that composer;
/// any other prompt joins the composer opened most recently. Prompts before
/// the first match are returned separately.
pub fn reconcile_prompts(
    composers: &[ComposerEntry],
    prompts: &[TimedPrompt],
) -> (Vec<TimedPrompt>, HashMap<String, Vec<TimedPrompt>>) {
    let names: Vec<(usize, String)> = composers
        .iter()
        .enumerate()
        .filter_map(|(index, composer)| {
            let name = normalize_title(composer.name.as_deref().unwrap_or_default());
            (!name.is_empty()).then_some((index, name))
        })
        .collect();

    let mut leading = Vec::new();
    let mut assigned: HashMap<String, Vec<TimedPrompt>> = HashMap::new();
    let mut opened: Vec<bool> = vec![false; composers.len()];
    let mut current: Option<usize> = None;

    for prompt in prompts {
        let text = normalize_title(&prompt.text);
        let matches = |name: &String| !text.is_empty() && (text.starts_with(name.as_str()) || name.starts_with(text.as_str()));

        let matched = names
            .iter()
            .find(|(index, name)| !opened[*index] && matches(name))
            .or_else(|| names.iter().find(|(_, name)| matches(name)))
            .map(|(index, _)| *index);

        if let Some(index) = matched {
            opened[index] = true;
            current = Some(index);
        }

        match current {
            Some(index) => assigned
                .entry(composers[index].composer_id.clone())
                .or_default()
                .push(prompt.clone()),
            None => leading.push(prompt.clone()),
        }
    }

    (leading, assigned)
}

fn build_conversations(
    workspace_id: &str,
    mut state: WorkspaceState,
    workspace: Option<PathBuf>,
    fallback: DateTime<Utc>,
) -> Vec<Conversation> {
    let mut conversations = Vec::new();
    let mut pending = Vec::new();

    for composer in &state.composers {
        let Some(bubbles) = state.transcripts.remove(&composer.composer_id) else {
            pending.push(composer.clone());
            continue;
        };
        let mut draft = composer_draft(composer, workspace.clone(), fallback);
        for bubble in bubbles {
            draft.push(bubble.role, bubble.text, bubble.timestamp, bubble.model);
        }
        conversations.extend(draft.build());
    }

    // Prompts matching a composer that already has a transcript are consumed by it.
    let (leading, mut assigned) = reconcile_prompts(&state.composers, &state.prompts);

    for composer in &pending {
        let Some(prompts) = assigned.remove(&composer.composer_id) else {
            continue;
        };
        let mut draft = composer_draft(composer, workspace.clone(), fallback);
        for prompt in prompts {
            draft.push(MessageRole::User, prompt.text, prompt.timestamp, None);
        }
        conversations.extend(draft.build());
    }

    if !leading.is_empty() {
        let mut draft = ConversationDraft::new(ToolTag::Cursor, format!("{workspace_id}:untitled"))
            .workspace(workspace)
            .fallback_time(fallback);
        for prompt in leading {
            draft.push(MessageRole::User, prompt.text, prompt.timestamp, None);
        }
        conversations.extend(draft.build());
    }

    conversations
}

fn composer_draft(composer: &ComposerEntry, workspace: Option<PathBuf>, fallback: DateTime<Utc>) -> ConversationDraft {
    ConversationDraft::new(ToolTag::Cursor, composer.composer_id.clone())
        .title(composer.name.clone())
        .workspace(workspace)
        .timestamps(
            composer.created_at.and_then(timestamp_from_millis),
            composer.last_updated_at.and_then(timestamp_from_millis),
        )
        .fallback_time(fallback)
}
