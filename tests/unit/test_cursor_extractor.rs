use anyhow::Result;
use chatvault::extractors::CursorExtractor;
use chatvault::models::{MessageRole, ToolTag};
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn create_kv_database(path: &Path, tables: &[&str], rows: &[(&str, &str, String)]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let conn = Connection::open(path).unwrap();
    for table in tables {
        conn.execute_batch(&format!(
            "CREATE TABLE {table} (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB);"
        ))
        .unwrap();
    }
    for (table, key, value) in rows {
        conn.execute(
            &format!("INSERT INTO {table} (key, value) VALUES (?1, ?2)"),
            params![key, value],
        )
        .unwrap();
    }
}

/// `<tmp>/User/workspaceStorage/<id>/state.vscdb` plus `workspace.json`.
fn workspace_storage(base: &Path) -> PathBuf {
    let root = base.join("User").join("workspaceStorage");
    let workspace = root.join("ws1");
    fs::create_dir_all(&workspace).unwrap();
    fs::write(
        workspace.join("workspace.json"),
        r#"{"folder": "file:///home/dev/project"}"#,
    )
    .unwrap();
    root
}

fn composer_index() -> String {
    serde_json::json!({
        "allComposers": [
            {"composerId": "c1", "name": "Fix the login bug", "createdAt": 1_735_787_045_000i64, "lastUpdatedAt": 1_735_787_100_000i64},
            {"composerId": "c2", "name": "Add dark mode...", "createdAt": 1_735_787_200_000i64}
        ]
    })
    .to_string()
}

#[tokio::test]
async fn test_prompts_are_reconciled_to_composers() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = workspace_storage(temp_dir.path());

    let prompts = serde_json::json!([
        {"text": "fix the login bug in auth.rs", "commandType": 4},
        {"text": "also update the tests", "commandType": 4},
        {"text": "Add dark mode to the settings page", "commandType": 4}
    ])
    .to_string();
    let generations = serde_json::json!([
        {"unixMs": 1_735_787_050_000i64, "textDescription": "fix the login bug"},
        {"unixMs": 1_735_787_060_000i64},
        {"unixMs": 1_735_787_210_000i64}
    ])
    .to_string();

    create_kv_database(
        &root.join("ws1").join("state.vscdb"),
        &["ItemTable"],
        &[
            ("ItemTable", "composer.composerData", composer_index()),
            ("ItemTable", "aiService.prompts", prompts),
            ("ItemTable", "aiService.generations", generations),
        ],
    );

    let extractor = CursorExtractor::new(&root);
    assert!(extractor.is_available());
    assert!(extractor.global_database().is_none());

    let conversations = extractor.extract_all().await;
    assert_eq!(conversations.len(), 2);

    let login = conversations
        .iter()
        .find(|c| c.title == "Fix the login bug")
        .unwrap();
    assert_eq!(login.tool, ToolTag::Cursor);
    assert_eq!(login.messages.len(), 2);
    assert_eq!(login.messages[1].content, "also update the tests");
    assert_eq!(login.messages[0].timestamp.timestamp_millis(), 1_735_787_050_000);
    assert_eq!(login.created_at.timestamp_millis(), 1_735_787_045_000);
    assert_eq!(login.workspace_path, Some(PathBuf::from("/home/dev/project")));

    let dark = conversations
        .iter()
        .find(|c| c.title == "Add dark mode...")
        .unwrap();
    assert_eq!(dark.messages.len(), 1);
    assert!(dark.messages.iter().all(|m| m.role == MessageRole::User));

    Ok(())
}

#[tokio::test]
async fn test_global_transcripts_are_preferred() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = workspace_storage(temp_dir.path());

    create_kv_database(
        &root.join("ws1").join("state.vscdb"),
        &["ItemTable"],
        &[
            ("ItemTable", "composer.composerData", composer_index()),
            (
                "ItemTable",
                "aiService.prompts",
                r#"[{"text": "fix the login bug please"}]"#.to_string(),
            ),
        ],
    );

    let inline = serde_json::json!({
        "composerId": "c1",
        "conversation": [
            {"type": 1, "bubbleId": "b1", "text": "fix the login bug please"},
            {"type": 2, "bubbleId": "b2", "text": "The token check is inverted.", "modelInfo": {"modelName": "claude-4-sonnet"}}
        ]
    })
    .to_string();
    let headers_only = serde_json::json!({
        "composerId": "c2",
        "fullConversationHeadersOnly": [{"bubbleId": "x1", "type": 1}, {"bubbleId": "x2", "type": 2}]
    })
    .to_string();

    create_kv_database(
        &temp_dir.path().join("User").join("globalStorage").join("state.vscdb"),
        &["ItemTable", "cursorDiskKV"],
        &[
            ("cursorDiskKV", "composerData:c1", inline),
            ("cursorDiskKV", "composerData:c2", headers_only),
            (
                "cursorDiskKV",
                "bubbleId:c2:x1",
                r#"{"type": 1, "text": "Add dark mode"}"#.to_string(),
            ),
            (
                "cursorDiskKV",
                "bubbleId:c2:x2",
                r#"{"type": 2, "text": "Added a theme toggle."}"#.to_string(),
            ),
        ],
    );

    let extractor = CursorExtractor::new(&root);
    assert!(extractor.global_database().is_some());

    let conversations = extractor.extract_all().await;
    assert_eq!(conversations.len(), 2);

    let login = conversations.iter().find(|c| c.title == "Fix the login bug").unwrap();
    assert_eq!(login.messages.len(), 2);
    assert_eq!(login.messages[1].role, MessageRole::Assistant);
    assert_eq!(login.messages[1].model.as_deref(), Some("claude-4-sonnet"));

    let dark = conversations.iter().find(|c| c.title == "Add dark mode...").unwrap();
    assert_eq!(dark.messages[1].content, "Added a theme toggle.");

    Ok(())
}

#[tokio::test]
async fn test_unreadable_database_is_skipped() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = workspace_storage(temp_dir.path());
    fs::write(root.join("ws1").join("state.vscdb"), b"not a database")?;

    let extractor = CursorExtractor::new(&root);
    assert!(extractor.extract_all().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_missing_root_is_unavailable() {
    let extractor = CursorExtractor::new("/nonexistent/cursor/workspaceStorage");
    assert!(!extractor.is_available());
    assert!(extractor.extract_all().await.is_empty());
}
