use serde_json::Value;

use super::{assistant, json_object, str_field};
use crate::extractors::base::{normalize_role, text_from_content};
use crate::interceptor::sse::parse_sse_events;
use crate::models::{AiProvider, InterceptedExchange, MessageRole, ParsedChatExchange, ParsedMessage};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnthropicParser;

impl AnthropicParser {
    pub fn parse(&self, exchange: &InterceptedExchange) -> Option<ParsedChatExchange> {
        let request = json_object(&exchange.request.body)?;
        let messages = request.get("messages").and_then(Value::as_array)?;

        let mut request_messages = Vec::new();
        if let Some(system) = request.get("system") {
            request_messages.extend(ParsedMessage::new(MessageRole::System, text_from_content(system)));
        }
        request_messages.extend(messages.iter().filter_map(|message| {
            let role = message.get("role").and_then(Value::as_str)?;
            let content = message.get("content").map(text_from_content)?;
            ParsedMessage::new(normalize_role(role), content)
        }));

        let streaming = exchange.response.streaming
            || request.get("stream").and_then(Value::as_bool).unwrap_or(false);
        let (text, response_model) = if streaming {
            stream_text(&exchange.response.body)
        } else {
            json_object(&exchange.response.body)
                .map(|response| {
                    let text = response.get("content").map(text_from_content).unwrap_or_default();
                    (text, str_field(&response, "model").map(str::to_string))
                })
                .unwrap_or_default()
        };

        let model = response_model.or_else(|| str_field(&request, "model").map(str::to_string));

        Some(ParsedChatExchange {
            provider: AiProvider::Anthropic,
            model,
            request_messages,
            assistant_message: assistant(text),
        })
    }
}

/// Text deltas in stream order; the model comes from `message_start`.
fn stream_text(body: &str) -> (String, Option<String>) {
    let mut text = String::new();
    let mut model = None;

    for event in parse_sse_events(body) {
        match event.get("type").and_then(Value::as_str) {
            Some("message_start") => {
                model = event
                    .get("message")
                    .and_then(|message| str_field(message, "model"))
                    .map(str::to_string);
            }
            Some("content_block_delta") => {
                let delta = event.get("delta");
                let is_text = delta
                    .and_then(|d| d.get("type"))
                    .and_then(Value::as_str)
                    == Some("text_delta");
                if let Some(chunk) = delta.filter(|_| is_text).and_then(|d| d.get("text")).and_then(Value::as_str) {
                    text.push_str(chunk);
                }
            }
            _ => {}
        }
    }

    (text, model)
}
