use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::body::BodyCollector;
use super::hub::CaptureHub;
use super::target::ResolvedTarget;
use crate::models::{CapturedRequest, CapturedResponse, EndpointDescriptor, InterceptedExchange};

struct ResponseState {
    status: u16,
    streaming: bool,
    body: BodyCollector,
}

/// In-flight state of one matched call. Owned by the tap that created it;
/// `finish` hands the completed exchange to the hub.
pub struct ExchangeCapture {
    hub: Arc<CaptureHub>,
    endpoint: &'static EndpointDescriptor,
    target: ResolvedTarget,
    started_at: DateTime<Utc>,
    max_body_bytes: usize,
    request_body: BodyCollector,
    response: Option<ResponseState>,
}

impl ExchangeCapture {
    pub(crate) fn new(
        hub: Arc<CaptureHub>,
        endpoint: &'static EndpointDescriptor,
        target: ResolvedTarget,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            hub,
            endpoint,
            target,
            started_at: Utc::now(),
            max_body_bytes,
            request_body: BodyCollector::new(max_body_bytes),
            response: None,
        }
    }

    pub fn endpoint(&self) -> &'static EndpointDescriptor {
        self.endpoint
    }

    pub fn target(&self) -> &ResolvedTarget {
        &self.target
    }

    pub fn record_request_chunk(&mut self, chunk: &[u8]) {
        self.request_body.push(chunk);
    }

    pub fn begin_response(&mut self, status: u16, streaming: bool) {
        self.response = Some(ResponseState {
            status,
            streaming,
            body: BodyCollector::new(self.max_body_bytes),
        });
    }

    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }

    /// Chunks arriving before `begin_response` are ignored.
    pub fn record_response_chunk(&mut self, chunk: &[u8]) {
        if let Some(response) = self.response.as_mut() {
            response.body.push(chunk);
        }
    }

    /// Build the exchange and deliver it. Without a response nothing is
    /// delivered.
    pub fn finish(self) {
        let Some(response) = self.response else {
            tracing::debug!(
                endpoint = self.endpoint.label,
                "Capture ended before a response arrived"
            );
            return;
        };

        let exchange = InterceptedExchange {
            request: CapturedRequest {
                method: self.target.method,
                hostname: self.target.hostname,
                path: self.target.path,
                endpoint: self.endpoint,
                body: self.request_body.to_string_lossy(),
                body_truncated: self.request_body.is_truncated(),
                timestamp: self.started_at,
            },
            response: CapturedResponse {
                status: response.status,
                body: response.body.to_string_lossy(),
                body_truncated: response.body.is_truncated(),
                streaming: response.streaming,
                timestamp: Utc::now(),
            },
        };

        tracing::debug!(
            provider = %exchange.provider(),
            status = exchange.response.status,
            request_bytes = exchange.request.body.len(),
            response_bytes = exchange.response.body.len(),
            "Exchange captured"
        );
        self.hub.deliver(exchange);
    }
}

impl std::fmt::Debug for ExchangeCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeCapture")
            .field("endpoint", &self.endpoint.label)
            .field("target", &self.target)
            .field("request_bytes", &self.request_body.len())
            .field("has_response", &self.response.is_some())
            .finish()
    }
}
