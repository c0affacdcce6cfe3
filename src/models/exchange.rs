use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::MessageRole;
use super::tool::ToolTag;

/// AI API vendors whose chat endpoints are recognized on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    OpenAi,
    Google,
    Anthropic,
}

impl AiProvider {
    /// Tool credited with conversations captured from this provider's traffic
    pub fn tool_tag(&self) -> ToolTag {
        match self {
            AiProvider::OpenAi => ToolTag::Codex,
            AiProvider::Google => ToolTag::GeminiCli,
            AiProvider::Anthropic => ToolTag::ClaudeCode,
        }
    }
}

impl std::fmt::Display for AiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiProvider::OpenAi => write!(f, "openai"),
            AiProvider::Google => write!(f, "google"),
            AiProvider::Anthropic => write!(f, "anthropic"),
        }
    }
}

/// Static rule identifying one provider chat API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EndpointDescriptor {
    pub provider: AiProvider,
    pub hostname: &'static str,
    pub path_prefix: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub hostname: String,
    /// Path including any query string
    pub path: String,
    pub endpoint: &'static EndpointDescriptor,
    pub body: String,
    pub body_truncated: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CapturedResponse {
    pub status: u16,
    pub body: String,
    pub body_truncated: bool,
    pub streaming: bool,
    pub timestamp: DateTime<Utc>,
}

/// One captured outbound request paired with its completed response.
#[derive(Debug, Clone)]
pub struct InterceptedExchange {
    pub request: CapturedRequest,
    pub response: CapturedResponse,
}

impl InterceptedExchange {
    pub fn provider(&self) -> AiProvider {
        self.request.endpoint.provider
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.response.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ParsedMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Option<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            return None;
        }
        Some(Self { role, content })
    }
}

/// Provider-neutral reading of one exchange.
#[derive(Debug, Clone)]
pub struct ParsedChatExchange {
    pub provider: AiProvider,
    pub model: Option<String>,
    /// Request-side turns in request order, roles normalized
    pub request_messages: Vec<ParsedMessage>,
    pub assistant_message: Option<ParsedMessage>,
}

impl ParsedChatExchange {
    pub fn last_user_message(&self) -> Option<&ParsedMessage> {
        self.request_messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
    }
}
