use bytes::{Bytes, BytesMut};
use futures::Stream;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, Request, RequestBuilder, StatusCode, Url};
use std::sync::Arc;

use crate::interceptor::capture::ExchangeCapture;
use crate::interceptor::hub::{fail_open, CaptureHub};
use crate::interceptor::target::{is_event_stream, ResolvedTarget};

/// `reqwest::Client` wrapper whose calls to known AI endpoints are captured.
#[derive(Clone)]
pub struct InterceptingClient {
    inner: Client,
    hub: Arc<CaptureHub>,
}

impl InterceptingClient {
    pub fn new(inner: Client, hub: Arc<CaptureHub>) -> Self {
        Self { inner, hub }
    }

    pub fn inner(&self) -> &Client {
        &self.inner
    }

    pub fn get(&self, url: impl reqwest::IntoUrl) -> RequestBuilder {
        self.inner.get(url)
    }

    pub fn post(&self, url: impl reqwest::IntoUrl) -> RequestBuilder {
        self.inner.post(url)
    }

    pub async fn send(&self, builder: RequestBuilder) -> reqwest::Result<FetchResponse> {
        let request = builder.build()?;
        self.execute(request).await
    }

    /// Execute the request through the wrapped client. The result is exactly
    /// what the inner client returned, wrapped so the body can be teed.
    pub async fn execute(&self, request: Request) -> reqwest::Result<FetchResponse> {
        let capture = fail_open("begin fetch capture", || self.begin_capture(&request)).flatten();
        let response = self.inner.execute(request).await?;
        Ok(FetchResponse::new(response, capture))
    }

    fn begin_capture(&self, request: &Request) -> Option<ExchangeCapture> {
        let target = ResolvedTarget::from_url(request.method().as_str(), request.url())?;
        let mut capture = self.hub.begin(&target)?;

        if let Some(body) = request.body() {
            match body.as_bytes() {
                Some(bytes) => capture.record_request_chunk(bytes),
                None => tracing::debug!(
                    endpoint = capture.endpoint().label,
                    "Streaming request body not captured"
                ),
            }
        }

        Some(capture)
    }
}

/// Response that reads through to the caller while teeing the body.
pub struct FetchResponse {
    inner: reqwest::Response,
    capture: Option<ExchangeCapture>,
}

impl FetchResponse {
    pub(crate) fn new(inner: reqwest::Response, capture: Option<ExchangeCapture>) -> Self {
        let capture = capture.and_then(|mut capture| {
            let status = inner.status().as_u16();
            let content_type = inner
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok());
            fail_open("begin fetch response", || {
                capture.begin_response(status, is_event_stream(content_type))
            })?;
            Some(capture)
        });

        Self { inner, capture }
    }

    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn url(&self) -> &Url {
        self.inner.url()
    }

    pub fn is_captured(&self) -> bool {
        self.capture.is_some()
    }

    /// Next body chunk. The end of the body completes the capture; a read
    /// error discards it.
    pub async fn chunk(&mut self) -> reqwest::Result<Option<Bytes>> {
        match self.inner.chunk().await {
            Ok(Some(chunk)) => {
                if let Some(capture) = self.capture.as_mut() {
                    if fail_open("record fetch chunk", || capture.record_response_chunk(&chunk)).is_none() {
                        self.capture = None;
                    }
                }
                Ok(Some(chunk))
            }
            Ok(None) => {
                if let Some(capture) = self.capture.take() {
                    fail_open("finish fetch exchange", || capture.finish());
                }
                Ok(None)
            }
            Err(err) => {
                if self.capture.take().is_some() {
                    tracing::debug!(error = %err, "Response body failed, discarding capture");
                }
                Err(err)
            }
        }
    }

    pub async fn bytes(mut self) -> reqwest::Result<Bytes> {
        let mut body = BytesMut::new();
        while let Some(chunk) = self.chunk().await? {
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }

    pub async fn text(self) -> reqwest::Result<String> {
        let body = self.bytes().await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    pub async fn json<T: serde::de::DeserializeOwned>(self) -> crate::error::Result<T> {
        let body = self.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub fn bytes_stream(self) -> impl Stream<Item = reqwest::Result<Bytes>> {
        futures::stream::unfold(Some(self), |state| async move {
            let mut response = state?;
            match response.chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(response))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }

    /// Unwrap without completing the capture.
    pub fn into_inner(self) -> reqwest::Response {
        self.inner
    }
}
