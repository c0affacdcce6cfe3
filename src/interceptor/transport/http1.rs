use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use super::header_value;
use crate::interceptor::capture::ExchangeCapture;
use crate::interceptor::hub::{fail_open, CaptureHub};
use crate::interceptor::target::{is_event_stream, RequestTarget};

/// Entry point for HTTP/1 style calls: a body writer going out, a body
/// reader coming back.
#[derive(Clone)]
pub struct Http1Tap {
    hub: Arc<CaptureHub>,
}

impl Http1Tap {
    pub fn new(hub: Arc<CaptureHub>) -> Self {
        Self { hub }
    }

    /// Wrap the request body writer. Calls to unknown hosts, or made while
    /// capture is off, get a wrapper that only forwards.
    pub fn request<W>(&self, target: RequestTarget<'_>, writer: W) -> TappedRequest<W>
    where
        W: AsyncWrite + Unpin,
    {
        let capture = fail_open("begin http1 capture", || {
            let resolved = target.resolve()?;
            self.hub.begin(&resolved)
        })
        .flatten();

        TappedRequest {
            inner: writer,
            capture,
        }
    }
}

pub struct TappedRequest<W> {
    inner: W,
    capture: Option<ExchangeCapture>,
}

impl<W> TappedRequest<W> {
    pub fn is_captured(&self) -> bool {
        self.capture.is_some()
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Pair the request with its response. `headers` are only consulted for
    /// the content type; the reader is returned wrapped.
    pub fn response<R>(self, status: u16, headers: &[(&str, &str)], reader: R) -> (W, TappedResponse<R>)
    where
        R: AsyncRead + Unpin,
    {
        let capture = self.capture.and_then(|mut capture| {
            fail_open("begin http1 response", || {
                let streaming = is_event_stream(header_value(headers, "content-type"));
                capture.begin_response(status, streaming);
            })?;
            Some(capture)
        });

        (
            self.inner,
            TappedResponse {
                inner: reader,
                capture,
            },
        )
    }
}

impl<W> AsyncWrite for TappedRequest<W>
where
    W: AsyncWrite + Unpin,
{
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let result = Pin::new(&mut this.inner).poll_write(cx, buf);

        if let Poll::Ready(Ok(written)) = &result {
            if let Some(capture) = this.capture.as_mut() {
                let chunk = &buf[..*written];
                if fail_open("record http1 request chunk", || capture.record_request_chunk(chunk)).is_none() {
                    this.capture = None;
                }
            }
        }

        result
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

pub struct TappedResponse<R> {
    inner: R,
    capture: Option<ExchangeCapture>,
}

impl<R> TappedResponse<R> {
    pub fn is_captured(&self) -> bool {
        self.capture.is_some()
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R> AsyncRead for TappedResponse<R>
where
    R: AsyncRead + Unpin,
{
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let result = Pin::new(&mut this.inner).poll_read(cx, buf);

        match &result {
            Poll::Ready(Ok(())) => {
                let chunk = &buf.filled()[before..];
                if chunk.is_empty() && buf.remaining() > 0 {
                    if let Some(capture) = this.capture.take() {
                        fail_open("finish http1 exchange", || capture.finish());
                    }
                } else if let Some(capture) = this.capture.as_mut() {
                    if fail_open("record http1 response chunk", || capture.record_response_chunk(chunk)).is_none() {
                        this.capture = None;
                    }
                }
            }
            Poll::Ready(Err(err)) => {
                if this.capture.take().is_some() {
                    tracing::debug!(error = %err, "Response stream failed, discarding capture");
                }
            }
            Poll::Pending => {}
        }

        result
    }
}
