use serde_json::Value;

use super::{assistant, json_object, str_field};
use crate::extractors::base::{normalize_role, text_from_content};
use crate::interceptor::sse::parse_sse_events;
use crate::models::{AiProvider, InterceptedExchange, MessageRole, ParsedChatExchange, ParsedMessage};

/// Chat Completions, Responses and legacy Completions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenAiParser;

impl OpenAiParser {
    pub fn parse(&self, exchange: &InterceptedExchange) -> Option<ParsedChatExchange> {
        let request = json_object(&exchange.request.body)?;
        if !["messages", "input", "prompt"].iter().any(|key| request.get(*key).is_some()) {
            return None;
        }
        let request_messages = request_messages(&request);

        let body = exchange.response.body.as_str();
        let streaming = exchange.response.streaming
            || request.get("stream").and_then(Value::as_bool).unwrap_or(false)
            || body.trim_start().starts_with("data:");
        let (text, response_model) = if streaming {
            stream_text(body)
        } else {
            json_object(body)
                .map(|response| (response_text(&response), str_field(&response, "model").map(str::to_string)))
                .unwrap_or_default()
        };

        let model = response_model.or_else(|| str_field(&request, "model").map(str::to_string));

        Some(ParsedChatExchange {
            provider: AiProvider::OpenAi,
            model,
            request_messages,
            assistant_message: assistant(text),
        })
    }
}

fn request_messages(request: &Value) -> Vec<ParsedMessage> {
    let mut messages = Vec::new();

    if let Some(instructions) = str_field(request, "instructions") {
        messages.extend(ParsedMessage::new(MessageRole::System, instructions));
    }

    if let Some(items) = request.get("messages").and_then(Value::as_array) {
        messages.extend(items.iter().filter_map(role_item));
    }

    match request.get("input") {
        Some(Value::String(input)) => messages.extend(ParsedMessage::new(MessageRole::User, input.as_str())),
        Some(Value::Array(items)) => messages.extend(items.iter().filter_map(role_item)),
        _ => {}
    }

    match request.get("prompt") {
        Some(Value::String(prompt)) => messages.extend(ParsedMessage::new(MessageRole::User, prompt.as_str())),
        Some(Value::Array(prompts)) => messages.extend(
            prompts
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|prompt| ParsedMessage::new(MessageRole::User, prompt)),
        ),
        _ => {}
    }

    messages
}

/// `{role, content}` where content is a string or typed blocks. Items
/// without a role (tool calls, tool outputs) are skipped.
fn role_item(item: &Value) -> Option<ParsedMessage> {
    let role = item.get("role").and_then(Value::as_str)?;
    let content = item.get("content").map(text_from_content).unwrap_or_default();
    ParsedMessage::new(normalize_role(role), content)
}

fn response_text(response: &Value) -> String {
    if let Some(choice) = response.pointer("/choices/0") {
        if let Some(content) = choice.pointer("/message/content") {
            return text_from_content(content);
        }
        if let Some(text) = choice.get("text").and_then(Value::as_str) {
            return text.to_string();
        }
    }

    if let Some(text) = response.get("output_text").and_then(Value::as_str) {
        return text.to_string();
    }

    response
        .get("output")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| item.get("type").and_then(Value::as_str).unwrap_or("message") == "message")
                .filter_map(|item| item.get("content"))
                .map(text_from_content)
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join("\n\n")
        })
        .unwrap_or_default()
}

fn stream_text(body: &str) -> (String, Option<String>) {
    let mut text = String::new();
    let mut model = None;

    for event in parse_sse_events(body) {
        if model.is_none() {
            model = str_field(&event, "model")
                .or_else(|| event.get("response").and_then(|r| str_field(r, "model")))
                .map(str::to_string);
        }

        if let Some(delta) = event.pointer("/choices/0/delta/content").and_then(Value::as_str) {
            text.push_str(delta);
        } else if let Some(delta) = event.pointer("/choices/0/text").and_then(Value::as_str) {
            text.push_str(delta);
        } else if event.get("type").and_then(Value::as_str) == Some("response.output_text.delta") {
            if let Some(delta) = event.get("delta").and_then(Value::as_str) {
                text.push_str(delta);
            }
        }
    }

    (text, model)
}
