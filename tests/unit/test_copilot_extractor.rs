use anyhow::Result;
use chatvault::extractors::CopilotExtractor;
use chatvault::models::{MessageRole, ToolTag};
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn session_json(session_id: &str, prompt: &str, reply: &str) -> String {
    serde_json::json!({
        "version": 3,
        "sessionId": session_id,
        "creationDate": 1_735_787_045_000i64,
        "lastMessageDate": 1_735_787_100_000i64,
        "requests": [
            {
                "message": {"text": prompt, "parts": []},
                "response": [{"value": reply}],
                "modelId": "copilot/claude-sonnet-4",
                "timestamp": 1_735_787_046_000i64
            }
        ]
    })
    .to_string()
}

fn create_workspace(root: &Path, id: &str) -> PathBuf {
    let workspace = root.join(id);
    fs::create_dir_all(&workspace).unwrap();
    fs::write(
        workspace.join("workspace.json"),
        r#"{"folder": "file:///home/dev/my%20app"}"#,
    )
    .unwrap();
    workspace
}

#[tokio::test]
async fn test_extracts_chat_session_files() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let workspace = create_workspace(temp_dir.path(), "abc123");
    let sessions = workspace.join("chatSessions");
    fs::create_dir_all(&sessions)?;
    fs::write(
        sessions.join("s1.json"),
        session_json("s1", "How do I read a file?", "Use std::fs::read_to_string."),
    )?;
    fs::write(sessions.join("broken.json"), "{\"requests\": [")?;

    let extractor = CopilotExtractor::new(temp_dir.path());
    assert!(extractor.is_available());

    let conversations = extractor.extract_all().await;
    assert_eq!(conversations.len(), 1);

    let conversation = &conversations[0];
    assert_eq!(conversation.tool, ToolTag::Copilot);
    assert_eq!(conversation.title, "How do I read a file?");
    assert_eq!(conversation.workspace_path, Some(PathBuf::from("/home/dev/my app")));
    assert_eq!(conversation.messages.len(), 2);
    assert_eq!(conversation.messages[0].role, MessageRole::User);
    assert_eq!(conversation.messages[1].model.as_deref(), Some("claude-sonnet-4"));
    assert_eq!(conversation.created_at.timestamp_millis(), 1_735_787_045_000);
    assert_eq!(conversation.updated_at.timestamp_millis(), 1_735_787_100_000);

    Ok(())
}

#[tokio::test]
async fn test_falls_back_to_state_database() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let workspace = create_workspace(temp_dir.path(), "def456");

    let value = format!(
        "{{\"sessions\": [{}, {}]}}",
        session_json("a", "first question", "first answer"),
        session_json("b", "second question", "second answer")
    );
    let conn = Connection::open(workspace.join("state.vscdb"))?;
    conn.execute_batch("CREATE TABLE ItemTable (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB);")?;
    conn.execute(
        "INSERT INTO ItemTable (key, value) VALUES (?1, ?2)",
        params!["interactive.sessions", value],
    )?;
    drop(conn);

    let extractor = CopilotExtractor::new(temp_dir.path());
    let conversations = extractor.extract_all().await;
    assert_eq!(conversations.len(), 2);
    assert_eq!(conversations[1].messages[1].content, "second answer");

    Ok(())
}

#[tokio::test]
async fn test_ids_are_stable_across_runs() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let workspace = create_workspace(temp_dir.path(), "ghi789");
    let sessions = workspace.join("chatSessions");
    fs::create_dir_all(&sessions)?;
    fs::write(sessions.join("s.json"), session_json("stable", "q", "a"))?;

    let extractor = CopilotExtractor::new(temp_dir.path());
    let first = extractor.extract_all().await;
    let second = extractor.extract_all().await;

    assert_eq!(first[0].id, second[0].id);
    assert_eq!(first[0].source_hash, second[0].source_hash);
    assert_eq!(first[0].messages[1].id, second[0].messages[1].id);

    Ok(())
}

#[tokio::test]
async fn test_missing_root_yields_nothing() {
    let extractor = CopilotExtractor::new("/nonexistent/Code/User/workspaceStorage");
    assert!(!extractor.is_available());
    assert!(extractor.extract_all().await.is_empty());
}
