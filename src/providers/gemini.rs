use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use super::{assistant, json_object, str_field};
use crate::extractors::base::normalize_role;
use crate::interceptor::sse::parse_sse_events;
use crate::models::{AiProvider, InterceptedExchange, MessageRole, ParsedChatExchange, ParsedMessage};

lazy_static! {
    static ref MODEL_IN_PATH: Regex = Regex::new(r"models/([^/:?]+)").expect("valid regex");
}

/// Gemini API and Code Assist (`v1internal`, which wraps payloads in
/// `request`/`response`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeminiParser;

impl GeminiParser {
    pub fn parse(&self, exchange: &InterceptedExchange) -> Option<ParsedChatExchange> {
        let body = json_object(&exchange.request.body)?;
        let request = body.get("request").filter(|r| r.is_object()).unwrap_or(&body);
        let contents = request.get("contents").and_then(Value::as_array)?;

        let mut request_messages = Vec::new();
        if let Some(system) = request.get("systemInstruction") {
            request_messages.extend(ParsedMessage::new(MessageRole::System, parts_text(system)));
        }
        request_messages.extend(contents.iter().filter_map(|content| {
            let role = content.get("role").and_then(Value::as_str).unwrap_or("user");
            ParsedMessage::new(normalize_role(role), parts_text(content))
        }));

        let streaming = exchange.response.streaming
            || exchange.request.path.contains("streamGenerateContent");
        let events = if streaming {
            stream_events(&exchange.response.body)
        } else {
            json_object(&exchange.response.body).into_iter().collect()
        };

        let mut text = String::new();
        let mut response_model = None;
        for event in &events {
            let payload = event.get("response").filter(|r| r.is_object()).unwrap_or(event);
            if response_model.is_none() {
                response_model = str_field(payload, "modelVersion").map(str::to_string);
            }
            if let Some(content) = payload.pointer("/candidates/0/content") {
                text.push_str(&parts_text(content));
            }
        }

        let model = response_model
            .or_else(|| model_from_path(&exchange.request.path))
            .or_else(|| {
                str_field(&body, "model")
                    .or_else(|| str_field(request, "model"))
                    .map(|m| m.trim_start_matches("models/").to_string())
            });

        Some(ParsedChatExchange {
            provider: AiProvider::Google,
            model,
            request_messages,
            assistant_message: assistant(text),
        })
    }
}

/// Concatenated `parts[].text`, skipping thought parts.
fn parts_text(content: &Value) -> String {
    content
        .get("parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter(|part| !part.get("thought").and_then(Value::as_bool).unwrap_or(false))
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// SSE framing, or a bracketed JSON array of chunks when `alt=sse` was not
/// requested.
fn stream_events(body: &str) -> Vec<Value> {
    let events = parse_sse_events(body);
    if !events.is_empty() {
        return events;
    }

    match serde_json::from_str::<Value>(body.trim()) {
        Ok(Value::Array(chunks)) => chunks,
        Ok(chunk @ Value::Object(_)) => vec![chunk],
        _ => Vec::new(),
    }
}

fn model_from_path(path: &str) -> Option<String> {
    MODEL_IN_PATH
        .captures(path)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
