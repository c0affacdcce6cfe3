use chatvault::extractors::base::timestamp_from_millis;
use chatvault::interceptor::match_endpoint;
use chatvault::models::{
    AiProvider, CapturedRequest, CapturedResponse, InterceptedExchange, MessageRole,
};
use chatvault::providers::{parse_exchange, ProviderParser};

fn exchange(host: &str, path: &str, request: &str, response: &str, streaming: bool) -> InterceptedExchange {
    let timestamp = timestamp_from_millis(1_735_787_045_000).unwrap();
    InterceptedExchange {
        request: CapturedRequest {
            method: "POST".to_string(),
            hostname: host.to_string(),
            path: path.to_string(),
            endpoint: match_endpoint(host, path).expect("known endpoint"),
            body: request.to_string(),
            body_truncated: false,
            timestamp,
        },
        response: CapturedResponse {
            status: 200,
            body: response.to_string(),
            body_truncated: false,
            streaming,
            timestamp,
        },
    }
}

#[test]
fn test_openai_chat_completion() {
    let request = r#"{"model":"gpt-4o","messages":[{"role":"system","content":"Be terse"},{"role":"user","content":[{"type":"text","text":"What is Rust?"}]}]}"#;
    let response = r#"{"model":"gpt-4o-2024-08-06","choices":[{"message":{"role":"assistant","content":"A systems language."}}]}"#;
    let exchange = exchange("api.openai.com", "/v1/chat/completions", request, response, false);

    let parsed = parse_exchange(&exchange).unwrap();
    assert_eq!(parsed.provider, AiProvider::OpenAi);
    assert_eq!(parsed.model.as_deref(), Some("gpt-4o-2024-08-06"));
    assert_eq!(parsed.request_messages.len(), 2);
    assert_eq!(parsed.request_messages[0].role, MessageRole::System);
    assert_eq!(parsed.last_user_message().unwrap().content, "What is Rust?");
    assert_eq!(parsed.assistant_message.unwrap().content, "A systems language.");
}

#[test]
fn test_openai_streaming_deltas() {
    let request = r#"{"model":"gpt-4o-mini","stream":true,"messages":[{"role":"user","content":"Count to three"}]}"#;
    let response = concat!(
        "data: {\"model\":\"gpt-4o-mini\",\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"1, \"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"2, 3\"}}]}\n\n",
        "data: [DONE]\n\n"
    );
    let exchange = exchange("api.openai.com", "/v1/chat/completions", request, response, true);

    let parsed = parse_exchange(&exchange).unwrap();
    assert_eq!(parsed.assistant_message.unwrap().content, "1, 2, 3");
    assert_eq!(parsed.model.as_deref(), Some("gpt-4o-mini"));
}

#[test]
fn test_openai_responses_stream_without_event_stream_content_type() {
    let request = r#"{"model":"gpt-4.1","input":"hi","stream":true}"#;
    let response = concat!(
        "event: response.output_text.delta\n",
        "data: {\"type\":\"response.output_text.delta\",\"delta\":\"Hel\"}\n\n",
        "event: response.output_text.delta\n",
        "data: {\"type\":\"response.output_text.delta\",\"delta\":\"lo\"}\n\n",
        "event: response.completed\n",
        "data: {\"type\":\"response.completed\",\"response\":{\"model\":\"gpt-4.1-2025-04-14\"}}\n\n"
    );
    let exchange = exchange("api.openai.com", "/v1/responses", request, response, false);

    let parsed = parse_exchange(&exchange).unwrap();
    assert_eq!(parsed.last_user_message().unwrap().content, "hi");
    assert_eq!(parsed.assistant_message.unwrap().content, "Hello");
    assert_eq!(parsed.model.as_deref(), Some("gpt-4.1-2025-04-14"));
}

#[test]
fn test_gemini_stream_with_model_from_path() {
    let request = r#"{"contents":[{"role":"user","parts":[{"text":"Hi"}]},{"role":"model","parts":[{"text":"Hello"}]},{"role":"user","parts":[{"text":"Tell me a joke"}]}]}"#;
    let response = concat!(
        "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"Why did \"}]}}]}\r\n\r\n",
        "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"the crab...\"}]}}]}\r\n\r\n"
    );
    let exchange = exchange(
        "generativelanguage.googleapis.com",
        "/v1beta/models/gemini-2.5-pro:streamGenerateContent?alt=sse",
        request,
        response,
        false,
    );

    let parsed = parse_exchange(&exchange).unwrap();
    assert_eq!(parsed.provider, AiProvider::Google);
    assert_eq!(parsed.model.as_deref(), Some("gemini-2.5-pro"));
    assert_eq!(parsed.request_messages.len(), 3);
    assert_eq!(parsed.request_messages[1].role, MessageRole::Assistant);
    assert_eq!(parsed.assistant_message.unwrap().content, "Why did the crab...");
}

#[test]
fn test_gemini_code_assist_wrapping() {
    let request = r#"{"model":"gemini-2.5-flash","project":"p","request":{"contents":[{"role":"user","parts":[{"text":"Summarize main.rs"}]}]}}"#;
    let response = r#"{"response":{"modelVersion":"gemini-2.5-flash-001","candidates":[{"content":{"parts":[{"text":"It starts the CLI."}]}}]}}"#;
    let exchange = exchange("cloudcode-pa.googleapis.com", "/v1internal:generateContent", request, response, false);

    let parsed = parse_exchange(&exchange).unwrap();
    assert_eq!(parsed.model.as_deref(), Some("gemini-2.5-flash-001"));
    assert_eq!(parsed.last_user_message().unwrap().content, "Summarize main.rs");
    assert_eq!(parsed.assistant_message.unwrap().content, "It starts the CLI.");
}

#[test]
fn test_anthropic_stream() {
    let request = r#"{"model":"claude-sonnet-4","stream":true,"system":[{"type":"text","text":"You are helpful"}],"messages":[{"role":"user","content":"Name a prime"}]}"#;
    let response = concat!(
        "event: message_start\n",
        "data: {\"type\":\"message_start\",\"message\":{\"model\":\"claude-sonnet-4-20250514\"}}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Seven\"}}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":1,\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{}\"}}\n\n",
        "event: message_stop\n",
        "data: {\"type\":\"message_stop\"}\n\n"
    );
    let exchange = exchange("api.anthropic.com", "/v1/messages", request, response, false);

    let parsed = ProviderParser::for_provider(AiProvider::Anthropic).parse(&exchange).unwrap();
    assert_eq!(parsed.model.as_deref(), Some("claude-sonnet-4-20250514"));
    assert_eq!(parsed.request_messages[0].role, MessageRole::System);
    assert_eq!(parsed.assistant_message.unwrap().content, "Seven");
}

#[test]
fn test_unparseable_response_keeps_request_turns() {
    let request = r#"{"model":"claude-sonnet-4","messages":[{"role":"user","content":"hello"}]}"#;
    let exchange = exchange("api.anthropic.com", "/v1/messages", request, "{\"content\":[{\"type\":", false);

    let parsed = parse_exchange(&exchange).unwrap();
    assert!(parsed.assistant_message.is_none());
    assert_eq!(parsed.request_messages.len(), 1);
    assert_eq!(parsed.model.as_deref(), Some("claude-sonnet-4"));
}

#[test]
fn test_non_json_request_is_skipped() {
    let exchange = exchange("api.openai.com", "/v1/chat/completions", "{\"model\":\"gpt", "{}", false);
    assert!(parse_exchange(&exchange).is_none());
}

#[test]
fn test_request_without_message_field_is_skipped() {
    let unrelated = r#"{"model":"m","unrelated":true}"#;
    for (host, path) in [
        ("api.openai.com", "/v1/chat/completions"),
        ("api.openai.com", "/v1/responses"),
        ("api.anthropic.com", "/v1/messages"),
        ("generativelanguage.googleapis.com", "/v1beta/models/gemini-2.5-pro:generateContent"),
        ("cloudcode-pa.googleapis.com", "/v1internal:generateContent"),
    ] {
        let rejected = exchange(host, path, unrelated, "{}", false);
        assert!(parse_exchange(&rejected).is_none(), "{host}{path}");
    }

    let wrapped_without_contents = r#"{"model":"gemini-2.5-flash","request":{"generationConfig":{}}}"#;
    let wrapped = exchange(
        "cloudcode-pa.googleapis.com",
        "/v1internal:generateContent",
        wrapped_without_contents,
        "{}",
        false,
    );
    assert!(parse_exchange(&wrapped).is_none());

    let legacy = exchange(
        "api.openai.com",
        "/v1/completions",
        r#"{"model":"gpt-3.5-turbo-instruct","prompt":"Say hi"}"#,
        "{}",
        false,
    );
    assert_eq!(parse_exchange(&legacy).unwrap().request_messages.len(), 1);
}
