use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::Result;
use crate::interceptor::{
    exchange_to_conversation, CaptureConfig, CaptureHub, CaptureSettings, ExchangeObserver,
    InstallToken,
};
use crate::models::{Conversation, InterceptedExchange};
use crate::providers::parse_exchange;

/// Connects the capture hub to the provider parsers and the converter, and
/// forwards reconstructed conversations to a channel.
pub struct CaptureService {
    hub: Arc<CaptureHub>,
    settings: CaptureSettings,
    sender: UnboundedSender<Conversation>,
    token: Mutex<Option<InstallToken>>,
}

/// Observer installed by [`CaptureService::start`].
struct ConversationForwarder {
    sender: UnboundedSender<Conversation>,
}

impl ExchangeObserver for ConversationForwarder {
    fn on_exchange(&self, exchange: InterceptedExchange) {
        if let Some(conversation) = reconstruct(&exchange) {
            if self.sender.send(conversation).is_err() {
                tracing::debug!("Conversation receiver closed, dropping captured exchange");
            }
        }
    }
}

/// Parse and convert one exchange. Non-2xx responses are dropped.
pub fn reconstruct(exchange: &InterceptedExchange) -> Option<Conversation> {
    if !exchange.is_success() {
        tracing::debug!(
            status = exchange.response.status,
            endpoint = exchange.request.endpoint.label,
            "Ignoring unsuccessful exchange"
        );
        return None;
    }

    let parsed = parse_exchange(exchange)?;
    let conversation = exchange_to_conversation(&parsed, exchange);
    if conversation.is_none() {
        tracing::debug!(endpoint = exchange.request.endpoint.label, "Exchange has no user turn");
    }
    conversation
}

impl CaptureService {
    pub fn new(config: CaptureConfig, sender: UnboundedSender<Conversation>) -> Self {
        let (hub, settings) = CaptureHub::new(config);
        Self {
            hub,
            settings,
            sender,
            token: Mutex::new(None),
        }
    }

    /// Hub to build transport taps from.
    pub fn hub(&self) -> Arc<CaptureHub> {
        Arc::clone(&self.hub)
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Install the forwarding observer. Fails with `AlreadyInstalled` when
    /// another observer holds the hub.
    pub fn start(&self) -> Result<()> {
        let mut token = self.token.lock().unwrap_or_else(|e| e.into_inner());
        if token.is_some() {
            tracing::debug!("Capture service already started");
            return Ok(());
        }

        let observer = Arc::new(ConversationForwarder {
            sender: self.sender.clone(),
        });
        *token = Some(self.hub.install(observer)?);
        Ok(())
    }

    /// Remove the observer. Exchanges still in flight complete without
    /// being delivered.
    pub fn stop(&self) {
        let token = self.token.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(token) = token {
            token.remove();
        }
    }

    pub fn is_running(&self) -> bool {
        self.hub.is_installed()
            && self
                .token
                .lock()
                .map(|token| token.is_some())
                .unwrap_or(false)
    }

    pub fn apply_config(&self, config: CaptureConfig) {
        self.settings.update(config);
    }
}
