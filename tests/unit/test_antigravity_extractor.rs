use anyhow::Result;
use chatvault::extractors::antigravity::parse_conversation;
use chatvault::extractors::AntigravityExtractor;
use chatvault::models::{MessageRole, ToolTag};
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

/// Length-delimited field (wire type 2) with a single-byte length.
fn field(number: u8, payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() < 128);
    let mut out = vec![(number << 3) | 2, payload.len() as u8];
    out.extend_from_slice(payload);
    out
}

fn binary_conversation() -> Vec<u8> {
    let mut step_one = field(1, b"Create a new Axum handler for /health");
    step_one.extend(field(2, b"0b4f2c1e-uuid-like-identifier"));
    let step_two = field(1, b"Added a handler that returns 200 OK.");

    let mut data = vec![0x08, 0x96, 0x01];
    data.extend(field(3, &step_one));
    data.extend(field(3, &step_two));
    data
}

#[tokio::test]
async fn test_reads_json_and_binary_files() -> Result<()> {
    let temp_dir = TempDir::new()?;
    fs::write(
        temp_dir.path().join("a1.json"),
        serde_json::json!({
            "title": "Health check",
            "messages": [
                {"role": "user", "content": "Add a health endpoint"},
                {"role": "assistant", "content": [{"type": "text", "text": "Done, see main.rs"}], "model": "gemini-3-pro"}
            ]
        })
        .to_string(),
    )?;
    fs::write(temp_dir.path().join("b2.pb"), binary_conversation())?;
    fs::write(temp_dir.path().join("c3.txt"), "ignored")?;

    let extractor = AntigravityExtractor::new(temp_dir.path());
    let conversations = extractor.extract_all().await;
    assert_eq!(conversations.len(), 2);

    let json = &conversations[0];
    assert_eq!(json.tool, ToolTag::Antigravity);
    assert_eq!(json.title, "Health check");
    assert_eq!(json.messages[1].model.as_deref(), Some("gemini-3-pro"));
    assert!(json.messages[1].metadata.get("heuristic").is_none());

    let binary = &conversations[1];
    assert_eq!(binary.messages.len(), 2);
    assert_eq!(binary.messages[0].role, MessageRole::User);
    assert_eq!(binary.messages[0].content, "Create a new Axum handler for /health");
    assert_eq!(binary.messages[1].role, MessageRole::Assistant);
    assert_eq!(binary.messages[1].content, "Added a handler that returns 200 OK.");
    assert_eq!(binary.messages[1].metadata.get("heuristic"), Some(&Value::Bool(true)));
    assert_eq!(
        binary.messages[1].metadata.get("extraction"),
        Some(&Value::String("binary-scan".to_string()))
    );

    Ok(())
}

#[test]
fn test_bare_array_document() {
    let data = br#"[{"author": "USER", "text": "hello there"}, {"author": "MODEL", "text": "hi"}]"#;
    let conversation = parse_conversation("k", data, chrono::Utc::now()).unwrap();
    assert_eq!(conversation.messages.len(), 2);
    assert_eq!(conversation.title, "hello there");
}

#[test]
fn test_unrecoverable_blob_is_skipped() {
    let data = [0xffu8, 0x00, 0x13, 0x37, 0x02, 0x01];
    assert!(parse_conversation("k", &data, chrono::Utc::now()).is_none());
}

#[test]
fn test_json_without_turns_is_not_scanned_as_binary() {
    let data = br#"{"theme": "the dark mode setting is the best one for working late at night", "version": 3}"#;
    assert!(parse_conversation("settings", data, chrono::Utc::now()).is_none());
}

#[tokio::test]
async fn test_settings_file_next_to_conversations_is_skipped() -> Result<()> {
    let temp_dir = TempDir::new()?;
    fs::write(
        temp_dir.path().join("settings.json"),
        r#"{"theme": "the dark mode setting is the best one for working late at night", "version": 3}"#,
    )?;
    fs::write(temp_dir.path().join("b2.pb"), binary_conversation())?;

    let conversations = AntigravityExtractor::new(temp_dir.path()).extract_all().await;
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].messages[0].content, "Create a new Axum handler for /health");

    Ok(())
}
