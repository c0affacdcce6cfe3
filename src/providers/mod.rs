//! Provider-specific readers that reconstruct chat turns from captured
//! request/response bodies.

pub mod anthropic;
pub mod gemini;
pub mod openai;

pub use anthropic::AnthropicParser;
pub use gemini::GeminiParser;
pub use openai::OpenAiParser;

use serde_json::Value;

use crate::models::{AiProvider, InterceptedExchange, MessageRole, ParsedChatExchange, ParsedMessage};

/// One parser per provider, selected from the matched endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderParser {
    OpenAi(OpenAiParser),
    Gemini(GeminiParser),
    Anthropic(AnthropicParser),
}

impl ProviderParser {
    pub fn for_provider(provider: AiProvider) -> Self {
        match provider {
            AiProvider::OpenAi => ProviderParser::OpenAi(OpenAiParser),
            AiProvider::Google => ProviderParser::Gemini(GeminiParser),
            AiProvider::Anthropic => ProviderParser::Anthropic(AnthropicParser),
        }
    }

    pub fn provider(&self) -> AiProvider {
        match self {
            ProviderParser::OpenAi(_) => AiProvider::OpenAi,
            ProviderParser::Gemini(_) => AiProvider::Google,
            ProviderParser::Anthropic(_) => AiProvider::Anthropic,
        }
    }

    /// `None` when the request body is not a JSON object or lacks the
    /// provider's message field (`messages`/`input`/`prompt`, `messages`,
    /// `contents`). A response that yields no text still produces the
    /// request turns.
    pub fn parse(&self, exchange: &InterceptedExchange) -> Option<ParsedChatExchange> {
        let parsed = match self {
            ProviderParser::OpenAi(parser) => parser.parse(exchange),
            ProviderParser::Gemini(parser) => parser.parse(exchange),
            ProviderParser::Anthropic(parser) => parser.parse(exchange),
        };

        if parsed.is_none() {
            tracing::debug!(
                provider = %self.provider(),
                endpoint = exchange.request.endpoint.label,
                truncated = exchange.request.body_truncated,
                "Request body not parseable, skipping exchange"
            );
        }
        parsed
    }
}

/// Parse with the parser matching the exchange's endpoint.
pub fn parse_exchange(exchange: &InterceptedExchange) -> Option<ParsedChatExchange> {
    ProviderParser::for_provider(exchange.provider()).parse(exchange)
}

pub(crate) fn json_object(body: &str) -> Option<Value> {
    serde_json::from_str::<Value>(body.trim())
        .ok()
        .filter(Value::is_object)
}

pub(crate) fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub(crate) fn assistant(text: String) -> Option<ParsedMessage> {
    ParsedMessage::new(MessageRole::Assistant, text)
}
