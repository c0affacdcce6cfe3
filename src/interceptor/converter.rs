use serde_json::{Map, Value};
use uuid::Uuid;

use crate::extractors::base::{generate_id, hash_hex};
use crate::models::{Conversation, InterceptedExchange, Message, MessageRole, ParsedChatExchange, ParsedMessage};

const NETWORK_TITLE_MAX_CHARS: usize = 100;
const MINUTE_MS: i64 = 60_000;

/// Turn one parsed exchange into a conversation holding the last user turn
/// and, when reconstructed, the assistant reply.
///
/// Exchanges with the same tool, the same user text and a request time in
/// the same minute share an id, so retries and duplicate captures collapse.
pub fn exchange_to_conversation(
    parsed: &ParsedChatExchange,
    exchange: &InterceptedExchange,
) -> Option<Conversation> {
    let user = parsed.last_user_message()?;
    let tool = parsed.provider.tool_tag();

    let minute_bucket = exchange.request.timestamp.timestamp_millis().div_euclid(MINUTE_MS);
    let conversation_id = generate_id(&format!("{tool}:{minute_bucket}:{}", user.content));
    let source_hash = hash_hex(&format!("{}{}", exchange.request.body, exchange.response.body));
    let metadata = exchange_metadata(parsed, exchange);

    let mut messages = Vec::with_capacity(2);
    messages.push(network_message(
        conversation_id,
        0,
        user,
        exchange.request.timestamp,
        None,
        &metadata,
    )?);
    if let Some(assistant) = parsed.assistant_message.as_ref() {
        if let Some(message) = network_message(
            conversation_id,
            1,
            assistant,
            exchange.response.timestamp,
            parsed.model.clone(),
            &metadata,
        ) {
            messages.push(message);
        }
    }

    let title: String = user
        .content
        .trim()
        .replace(['\r', '\n'], " ")
        .chars()
        .take(NETWORK_TITLE_MAX_CHARS)
        .collect();

    Conversation::new(conversation_id, tool, title, source_hash, messages)
}

fn network_message(
    conversation_id: Uuid,
    index: usize,
    parsed: &ParsedMessage,
    timestamp: chrono::DateTime<chrono::Utc>,
    model: Option<String>,
    metadata: &Map<String, Value>,
) -> Option<Message> {
    let role: MessageRole = parsed.role;
    let id = generate_id(&format!("{conversation_id}:{index}:{role}:{}", parsed.content));
    let mut message = Message::new(id, conversation_id, role, parsed.content.clone(), timestamp)?
        .with_model(model);
    message.metadata = metadata.clone();
    Some(message)
}

fn exchange_metadata(parsed: &ParsedChatExchange, exchange: &InterceptedExchange) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("source".into(), Value::from("network"));
    metadata.insert("provider".into(), Value::from(parsed.provider.to_string()));
    metadata.insert("endpoint".into(), Value::from(exchange.request.endpoint.label));
    if let Some(model) = parsed.model.as_deref() {
        metadata.insert("model".into(), Value::from(model));
    }
    metadata.insert(
        "requestTruncated".into(),
        Value::from(exchange.request.body_truncated),
    );
    metadata.insert(
        "responseTruncated".into(),
        Value::from(exchange.response.body_truncated),
    );
    metadata.insert("streaming".into(), Value::from(exchange.response.streaming));
    metadata
}
