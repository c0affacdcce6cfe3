use anyhow::Result;
use chatvault::interceptor::{CaptureConfig, Http1Tap, Http2Tap, RequestOptions, RequestTarget};
use chatvault::models::{InterceptedExchange, MessageRole, ToolTag};
use chatvault::services::CaptureService;
use chatvault::ChatVaultError;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;

const ANTHROPIC_REQUEST: &str = r#"{"model":"claude-sonnet-4","stream":true,"messages":[{"role":"user","content":"What is a lifetime?"},{"role":"assistant","content":"A scope."},{"role":"user","content":"Give an example"}]}"#;
const ANTHROPIC_STREAM: &str = concat!(
    "event: message_start\n",
    "data: {\"type\":\"message_start\",\"message\":{\"model\":\"claude-sonnet-4-20250514\"}}\n\n",
    "event: content_block_delta\n",
    "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"fn longest<'a>\"}}\n\n",
    "event: content_block_delta\n",
    "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"(x: &'a str)\"}}\n\n",
    "event: message_stop\n",
    "data: {\"type\":\"message_stop\"}\n\n"
);

#[tokio::test]
async fn test_http1_stream_becomes_conversation() -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let service = CaptureService::new(CaptureConfig::default(), tx);
    service.start()?;

    let tap = Http1Tap::new(service.hub());
    let mut request = tap.request(RequestTarget::Url("https://api.anthropic.com/v1/messages"), Vec::new());
    assert!(request.is_captured());
    request.write_all(ANTHROPIC_REQUEST.as_bytes()).await?;

    let (_, mut response) = request.response(
        200,
        &[("content-type", "text/event-stream; charset=utf-8")],
        ANTHROPIC_STREAM.as_bytes(),
    );
    let mut passed_through = String::new();
    response.read_to_string(&mut passed_through).await?;
    assert_eq!(passed_through, ANTHROPIC_STREAM);

    let conversation = rx.try_recv()?;
    assert_eq!(conversation.tool, ToolTag::ClaudeCode);
    assert_eq!(conversation.title, "Give an example");
    assert_eq!(conversation.messages.len(), 2);
    assert_eq!(conversation.messages[0].role, MessageRole::User);
    assert_eq!(conversation.messages[1].content, "fn longest<'a>(x: &'a str)");
    assert_eq!(conversation.messages[1].model.as_deref(), Some("claude-sonnet-4-20250514"));
    assert_eq!(conversation.messages[1].metadata["source"], "network");
    assert_eq!(conversation.messages[1].metadata["streaming"], true);

    Ok(())
}

#[tokio::test]
async fn test_http2_stream_becomes_conversation() -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let service = CaptureService::new(CaptureConfig::default(), tx);
    service.start()?;

    let session = Http2Tap::new(service.hub()).session("https://api.openai.com");
    let mut stream = session.request(&[
        (":method", "POST"),
        (":path", "/v1/chat/completions"),
        ("content-type", "application/json"),
    ]);
    assert!(stream.is_captured());
    stream.send_data(br#"{"model":"gpt-4o","messages":[{"role":"user","content":"#);
    stream.send_data(br#""Ping"}]}"#);
    stream.response_headers(&[(":status", "200"), ("content-type", "application/json")]);
    stream.recv_data(br#"{"choices":[{"message":{"content":"Pong"}}]}"#);
    stream.end();

    let conversation = rx.try_recv()?;
    assert_eq!(conversation.tool, ToolTag::Codex);
    assert_eq!(conversation.messages[0].content, "Ping");
    assert_eq!(conversation.messages[1].content, "Pong");
    assert_eq!(conversation.messages[1].model.as_deref(), Some("gpt-4o"));

    Ok(())
}

#[tokio::test]
async fn test_error_status_is_not_forwarded() -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let service = CaptureService::new(CaptureConfig::default(), tx);
    service.start()?;

    let tap = Http1Tap::new(service.hub());
    let options = RequestOptions::new("api.anthropic.com", "/v1/messages").with_method("POST");
    let mut request = tap.request(RequestTarget::Options(&options), Vec::new());
    request.write_all(ANTHROPIC_REQUEST.as_bytes()).await?;

    let body: &[u8] = br#"{"type":"error","error":{"type":"overloaded_error"}}"#;
    let (_, mut response) = request.response(529, &[("content-type", "application/json")], body);
    let mut sink = Vec::new();
    response.read_to_end(&mut sink).await?;

    assert!(rx.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn test_truncated_request_is_flagged_and_skipped() -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let service = CaptureService::new(
        CaptureConfig {
            enabled: true,
            max_body_bytes: 32,
        },
        tx,
    );
    service.start()?;

    let tap = Http1Tap::new(service.hub());
    let mut request = tap.request(RequestTarget::Url("https://api.anthropic.com/v1/messages"), Vec::new());
    request.write_all(ANTHROPIC_REQUEST.as_bytes()).await?;
    let (sent, mut response) = request.response(200, &[], &b"{}"[..]);
    assert_eq!(sent, ANTHROPIC_REQUEST.as_bytes());

    let mut sink = Vec::new();
    response.read_to_end(&mut sink).await?;

    // The request body no longer parses as JSON, so nothing is reconstructed.
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn test_second_install_is_rejected_and_stop_detaches() -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let service = CaptureService::new(CaptureConfig::default(), tx);
    service.start()?;

    let other: Arc<dyn chatvault::interceptor::ExchangeObserver> = Arc::new(|_: InterceptedExchange| {});
    assert!(matches!(
        service.hub().install(other),
        Err(ChatVaultError::AlreadyInstalled)
    ));

    let tap = Http1Tap::new(service.hub());
    let mut in_flight = tap.request(RequestTarget::Url("https://api.anthropic.com/v1/messages"), Vec::new());
    in_flight.write_all(ANTHROPIC_REQUEST.as_bytes()).await?;

    service.stop();
    assert!(!service.is_running());

    let (_, mut response) = in_flight.response(200, &[], ANTHROPIC_STREAM.as_bytes());
    let mut passed_through = Vec::new();
    response.read_to_end(&mut passed_through).await?;
    assert_eq!(passed_through, ANTHROPIC_STREAM.as_bytes());
    assert!(rx.try_recv().is_err());

    let after = tap.request(RequestTarget::Url("https://api.anthropic.com/v1/messages"), Vec::new());
    assert!(!after.is_captured());

    Ok(())
}

#[tokio::test]
async fn test_disabled_config_passes_everything_through() -> Result<()> {
    let (tx, _rx) = mpsc::unbounded_channel();
    let service = CaptureService::new(CaptureConfig::default(), tx);
    service.start()?;
    service.settings().set_enabled(false);

    let tap = Http1Tap::new(service.hub());
    let request = tap.request(RequestTarget::Url("https://api.openai.com/v1/responses"), Vec::new());
    assert!(!request.is_captured());

    service.settings().set_enabled(true);
    let request = tap.request(RequestTarget::Url("https://api.openai.com/v1/responses"), Vec::new());
    assert!(request.is_captured());

    Ok(())
}
