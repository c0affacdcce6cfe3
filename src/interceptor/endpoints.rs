use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::models::{AiProvider, EndpointDescriptor};

/// Known chat completion/generation endpoints.
pub static ENDPOINTS: &[EndpointDescriptor] = &[
    EndpointDescriptor {
        provider: AiProvider::OpenAi,
        hostname: "api.openai.com",
        path_prefix: "/v1/chat/completions",
        label: "OpenAI Chat Completions",
    },
    EndpointDescriptor {
        provider: AiProvider::OpenAi,
        hostname: "api.openai.com",
        path_prefix: "/v1/responses",
        label: "OpenAI Responses",
    },
    EndpointDescriptor {
        provider: AiProvider::OpenAi,
        hostname: "api.openai.com",
        path_prefix: "/v1/completions",
        label: "OpenAI Completions",
    },
    EndpointDescriptor {
        provider: AiProvider::Google,
        hostname: "generativelanguage.googleapis.com",
        path_prefix: "/v1beta/models/",
        label: "Gemini API (v1beta)",
    },
    EndpointDescriptor {
        provider: AiProvider::Google,
        hostname: "generativelanguage.googleapis.com",
        path_prefix: "/v1/models/",
        label: "Gemini API (v1)",
    },
    EndpointDescriptor {
        provider: AiProvider::Google,
        hostname: "cloudcode-pa.googleapis.com",
        path_prefix: "/v1internal",
        label: "Gemini Code Assist",
    },
    EndpointDescriptor {
        provider: AiProvider::Anthropic,
        hostname: "api.anthropic.com",
        path_prefix: "/v1/messages",
        label: "Anthropic Messages",
    },
];

/// Hostname-indexed view over [`ENDPOINTS`].
pub struct EndpointRegistry {
    by_host: HashMap<&'static str, Vec<&'static EndpointDescriptor>>,
}

lazy_static! {
    static ref REGISTRY: EndpointRegistry = EndpointRegistry::new(ENDPOINTS);
}

impl EndpointRegistry {
    pub fn new(endpoints: &'static [EndpointDescriptor]) -> Self {
        let mut by_host: HashMap<&'static str, Vec<&'static EndpointDescriptor>> = HashMap::new();
        for endpoint in endpoints {
            by_host.entry(endpoint.hostname).or_default().push(endpoint);
        }
        Self { by_host }
    }

    /// Process-wide registry built from [`ENDPOINTS`]
    pub fn global() -> &'static EndpointRegistry {
        &REGISTRY
    }

    /// First endpoint at `hostname` whose prefix starts `path`.
    ///
    /// Hostnames are matched case-insensitively and without a `:port` suffix.
    pub fn match_endpoint(&self, hostname: &str, path: &str) -> Option<&'static EndpointDescriptor> {
        let candidates = match self.by_host.get(hostname) {
            Some(candidates) => candidates,
            None => {
                let normalized = normalize_host(hostname)?;
                self.by_host.get(normalized.as_str())?
            }
        };

        candidates
            .iter()
            .find(|endpoint| path.starts_with(endpoint.path_prefix))
            .copied()
    }

    pub fn hostnames(&self) -> impl Iterator<Item = &&'static str> {
        self.by_host.keys()
    }
}

/// `None` when normalizing would not change the hostname.
fn normalize_host(hostname: &str) -> Option<String> {
    let without_port = match hostname.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => hostname,
    };
    let without_dot = without_port.strip_suffix('.').unwrap_or(without_port);
    let normalized = without_dot.to_ascii_lowercase();
    (normalized != hostname).then_some(normalized)
}

/// Look up `hostname`/`path` in the global registry.
pub fn match_endpoint(hostname: &str, path: &str) -> Option<&'static EndpointDescriptor> {
    EndpointRegistry::global().match_endpoint(hostname, path)
}
