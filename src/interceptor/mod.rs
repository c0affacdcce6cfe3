//! Passive capture of AI chat traffic leaving this process.
//!
//! Outbound calls go through a tap from [`transport`]; taps ask the
//! [`CaptureHub`] whether a call targets a known AI endpoint and, if so, tee
//! request and response bytes into an [`ExchangeCapture`]. Completed
//! exchanges are handed to the installed observer.

pub mod body;
pub mod capture;
pub mod converter;
pub mod endpoints;
pub mod hub;
pub mod sse;
pub mod target;
pub mod transport;

pub use body::BodyCollector;
pub use capture::ExchangeCapture;
pub use converter::exchange_to_conversation;
pub use endpoints::{match_endpoint, EndpointRegistry, ENDPOINTS};
pub use hub::{CaptureConfig, CaptureHub, CaptureSettings, ExchangeObserver, InstallToken};
pub use sse::parse_sse_events;
pub use target::{is_event_stream, RequestOptions, RequestTarget, ResolvedTarget};
#[cfg(feature = "reqwest")]
pub use transport::fetch::{FetchResponse, InterceptingClient};
pub use transport::http1::{Http1Tap, TappedRequest, TappedResponse};
pub use transport::http2::{Http2Tap, TappedSession, TappedStream};
