use anyhow::Result;
use chatvault::extractors::ClaudeCodeExtractor;
use chatvault::models::{MessageRole, ToolTag};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const SESSION: &str = r#"{"type":"summary","summary":"Refactor the config loader","leafUuid":"x"}
{"type":"user","sessionId":"7f0c","cwd":"/home/dev/app","timestamp":"2025-06-01T09:00:00Z","message":{"role":"user","content":"Split config.rs into modules"}}
this line is not json
{"type":"assistant","sessionId":"7f0c","timestamp":"2025-06-01T09:00:10Z","message":{"role":"assistant","model":"claude-opus-4","content":[{"type":"text","text":"I'll start with the loader."},{"type":"tool_use","id":"t1","name":"Read","input":{"path":"config.rs"}}]}}
{"type":"user","sessionId":"7f0c","timestamp":"2025-06-01T09:00:11Z","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"t1","content":"fn load()"}]}}
{"type":"assistant","sessionId":"7f0c","timestamp":"2025-06-01T09:00:20Z","message":{"role":"assistant","model":"<synthetic>","content":"Done."}}
"#;

#[tokio::test]
async fn test_parses_session_and_skips_malformed_lines() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let project = temp_dir.path().join("-home-dev-app");
    fs::create_dir_all(&project)?;
    fs::write(project.join("7f0c.jsonl"), SESSION)?;
    fs::write(project.join("notes.txt"), "ignored")?;

    let extractor = ClaudeCodeExtractor::new(temp_dir.path());
    let conversations = extractor.extract_all().await;
    assert_eq!(conversations.len(), 1);

    let conversation = &conversations[0];
    assert_eq!(conversation.tool, ToolTag::ClaudeCode);
    assert_eq!(conversation.title, "Refactor the config loader");
    assert_eq!(conversation.workspace_path, Some(PathBuf::from("/home/dev/app")));
    assert_eq!(conversation.messages.len(), 3);

    let roles: Vec<MessageRole> = conversation.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![MessageRole::User, MessageRole::Assistant, MessageRole::Assistant]
    );
    assert_eq!(conversation.messages[1].content, "I'll start with the loader.");
    assert_eq!(conversation.messages[1].model.as_deref(), Some("claude-opus-4"));
    assert_eq!(conversation.messages[2].model, None);
    assert_eq!(conversation.created_at.to_rfc3339(), "2025-06-01T09:00:00+00:00");

    Ok(())
}

#[tokio::test]
async fn test_extract_file_is_deterministic() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("s.jsonl");
    fs::write(&path, SESSION)?;

    let extractor = ClaudeCodeExtractor::new(temp_dir.path());
    let first = extractor.extract_file(&path).await?.unwrap();
    let second = extractor.extract_file(&path).await?.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.source_hash, second.source_hash);
    Ok(())
}

#[tokio::test]
async fn test_session_without_messages_is_skipped() -> Result<()> {
    let temp_dir = TempDir::new()?;
    fs::write(
        temp_dir.path().join("empty.jsonl"),
        "{\"type\":\"summary\",\"summary\":\"Nothing here\"}\n\n",
    )?;

    let extractor = ClaudeCodeExtractor::new(temp_dir.path());
    assert!(extractor.extract_all().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_watch_emits_new_session() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let extractor = ClaudeCodeExtractor::new(temp_dir.path());

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let handle = extractor.watch_for_changes(tx)?;
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    fs::write(temp_dir.path().join("new.jsonl"), SESSION)?;

    let conversation = tokio::time::timeout(std::time::Duration::from_secs(10), rx.recv())
        .await?
        .expect("watcher sends the new session");
    assert_eq!(conversation.title, "Refactor the config loader");

    handle.stop();
    Ok(())
}
