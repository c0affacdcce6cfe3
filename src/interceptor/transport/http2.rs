use std::sync::Arc;

use super::header_value;
use crate::interceptor::capture::ExchangeCapture;
use crate::interceptor::hub::{fail_open, CaptureHub};
use crate::interceptor::target::{is_event_stream, ResolvedTarget};

/// Entry point for HTTP/2 sessions. Frames are reported by the caller as
/// they pass; nothing here touches the connection itself.
#[derive(Clone)]
pub struct Http2Tap {
    hub: Arc<CaptureHub>,
}

impl Http2Tap {
    pub fn new(hub: Arc<CaptureHub>) -> Self {
        Self { hub }
    }

    /// `authority` is the connect target, e.g. `https://api.openai.com` or
    /// `api.openai.com:443`.
    pub fn session(&self, authority: &str) -> TappedSession {
        let authority = authority
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(authority)
            .trim_end_matches('/')
            .to_string();

        TappedSession {
            hub: Arc::clone(&self.hub),
            authority,
        }
    }
}

#[derive(Clone)]
pub struct TappedSession {
    hub: Arc<CaptureHub>,
    authority: String,
}

impl TappedSession {
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Open a stream from its request pseudo-headers (`:method`, `:path`,
    /// `:authority`). A `:authority` header overrides the session's.
    pub fn request(&self, headers: &[(&str, &str)]) -> TappedStream {
        let capture = fail_open("begin http2 capture", || {
            let host = header_value(headers, ":authority").unwrap_or(self.authority.as_str());
            if host.is_empty() {
                return None;
            }
            let target = ResolvedTarget::new(
                header_value(headers, ":method").unwrap_or_default(),
                host,
                header_value(headers, ":path").unwrap_or("/"),
            );
            self.hub.begin(&target)
        })
        .flatten();

        TappedStream { capture }
    }
}

/// One request/response stream on a tapped session.
#[derive(Debug)]
pub struct TappedStream {
    capture: Option<ExchangeCapture>,
}

impl TappedStream {
    pub fn is_captured(&self) -> bool {
        self.capture.is_some()
    }

    pub fn send_data(&mut self, chunk: &[u8]) {
        self.with_capture("record http2 request data", |capture| {
            capture.record_request_chunk(chunk)
        });
    }

    pub fn response_headers(&mut self, headers: &[(&str, &str)]) {
        self.with_capture("record http2 response headers", |capture| {
            let status = header_value(headers, ":status")
                .and_then(|s| s.trim().parse::<u16>().ok())
                .unwrap_or(0);
            let streaming = is_event_stream(header_value(headers, "content-type"));
            capture.begin_response(status, streaming);
        });
    }

    pub fn recv_data(&mut self, chunk: &[u8]) {
        self.with_capture("record http2 response data", |capture| {
            capture.record_response_chunk(chunk)
        });
    }

    /// Stream closed normally.
    pub fn end(mut self) {
        if let Some(capture) = self.capture.take() {
            fail_open("finish http2 exchange", || capture.finish());
        }
    }

    /// Stream reset or errored; the partial exchange is dropped.
    pub fn reset(mut self) {
        if self.capture.take().is_some() {
            tracing::debug!("HTTP/2 stream reset, discarding capture");
        }
    }

    fn with_capture(&mut self, step: &str, f: impl FnOnce(&mut ExchangeCapture)) {
        if let Some(capture) = self.capture.as_mut() {
            if fail_open(step, || f(capture)).is_none() {
                self.capture = None;
            }
        }
    }
}
