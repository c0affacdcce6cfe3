use anyhow::Result;
use chatvault::config::Config;
use chatvault::extractors::{ClaudeCodeExtractor, CursorExtractor, Extractor, ExtractorRegistry};
use chatvault::models::{Conversation, ToolTag};
use chatvault::services::ExtractionService;
use rusqlite::{params, Connection};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn claude_session(dir: &Path, name: &str, prompt: &str) {
    let line = serde_json::json!({
        "type": "user",
        "sessionId": name,
        "timestamp": "2025-05-01T12:00:00Z",
        "message": {"role": "user", "content": prompt}
    });
    fs::write(dir.join(format!("{name}.jsonl")), format!("{line}\n")).unwrap();
}

fn cursor_workspace(root: &Path, prompts: &[&str]) {
    let workspace = root.join("ws");
    fs::create_dir_all(&workspace).unwrap();
    let conn = Connection::open(workspace.join("state.vscdb")).unwrap();
    conn.execute_batch("CREATE TABLE IF NOT EXISTS ItemTable (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB);")
        .unwrap();
    let prompts: Vec<serde_json::Value> = prompts
        .iter()
        .map(|text| serde_json::json!({"text": text, "commandType": 4}))
        .collect();
    conn.execute(
        "INSERT INTO ItemTable (key, value) VALUES (?1, ?2)",
        params!["aiService.prompts", serde_json::Value::Array(prompts).to_string()],
    )
    .unwrap();
}

#[tokio::test]
async fn test_extract_all_invokes_callback_once_per_conversation() -> Result<()> {
    let claude_dir = TempDir::new()?;
    claude_session(claude_dir.path(), "one", "first session");
    claude_session(claude_dir.path(), "two", "second session");

    let mut config = Config::default();
    config.sources.claude_dir = Some(claude_dir.path().to_path_buf());
    config.sources.copilot_dir = Some(claude_dir.path().join("no-copilot"));
    config.sources.cursor_dir = Some(claude_dir.path().join("no-cursor"));
    config.sources.antigravity_dir = Some(claude_dir.path().join("no-antigravity"));

    let service = ExtractionService::from_config(&config);
    let status = service.status();
    assert_eq!(status.len(), 4);
    assert_eq!(status.iter().filter(|s| s.available).count(), 1);

    let mut received: Vec<Conversation> = Vec::new();
    let summary = service.extract_all(|conversation| received.push(conversation)).await;

    assert_eq!(received.len(), 2);
    assert!(received.iter().all(|c| c.tool == ToolTag::ClaudeCode));
    assert_eq!(summary.conversations, 2);
    assert_eq!(summary.messages, 2);
    assert_eq!(summary.per_tool.get("claude-code"), Some(&2));

    Ok(())
}

#[tokio::test]
async fn test_cursor_poll_reports_only_changes() -> Result<()> {
    let cursor_root = TempDir::new()?;
    cursor_workspace(cursor_root.path(), &["explain the build script"]);

    let extractor = CursorExtractor::new(cursor_root.path()).with_poll_interval(Duration::from_millis(50));
    let service = ExtractionService::new(ExtractorRegistry::new(vec![Extractor::Cursor(extractor)]));

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let handles = service.watch(tx)?;
    assert_eq!(handles.len(), 1);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(rx.try_recv().is_err(), "seeded conversations are not re-sent");

    cursor_workspace(cursor_root.path(), &["explain the build script", "now add caching"]);
    let db = cursor_root.path().join("ws").join("state.vscdb");
    let later = std::time::SystemTime::now() + Duration::from_secs(5);
    fs::File::options().write(true).open(&db)?.set_modified(later)?;

    let conversation = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await?
        .expect("changed conversation is sent");
    assert_eq!(conversation.tool, ToolTag::Cursor);
    assert_eq!(conversation.messages.len(), 2);
    assert_eq!(conversation.messages[1].content, "now add caching");

    drop(handles);
    Ok(())
}

#[tokio::test]
async fn test_individual_extractor_dispatch() -> Result<()> {
    let claude_dir = TempDir::new()?;
    claude_session(claude_dir.path(), "solo", "only session");

    let extractor = Extractor::ClaudeCode(ClaudeCodeExtractor::new(claude_dir.path()));
    assert_eq!(extractor.tool(), ToolTag::ClaudeCode);
    assert!(extractor.is_available());
    assert_eq!(extractor.extract_all().await.len(), 1);

    Ok(())
}
