//! Resolution of the different shapes an outbound call can be described by.

use url::Url;

/// Options-object form of an HTTP/1 request, mirroring the fields a caller
/// can pass instead of (or on top of) a URL.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub protocol: Option<String>,
    pub hostname: Option<String>,
    /// May carry a `:port` suffix; `hostname` wins when both are set
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub method: Option<String>,
}

impl RequestOptions {
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            hostname: Some(host.into()),
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }
}

/// The call-signature shapes an HTTP/1 request can arrive in.
#[derive(Debug, Clone, Copy)]
pub enum RequestTarget<'a> {
    Url(&'a str),
    ParsedUrl(&'a Url),
    Options(&'a RequestOptions),
    /// URL plus options; option fields override the URL's
    UrlWithOptions(&'a str, &'a RequestOptions),
}

/// Hostname, path (with query) and method of an outbound call. The method
/// is empty when the call shape did not name one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub method: String,
    pub hostname: String,
    pub path: String,
}

impl ResolvedTarget {
    pub fn new(method: &str, hostname: &str, path: &str) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            hostname: strip_port(hostname).to_string(),
            path: if path.is_empty() {
                "/".to_string()
            } else {
                path.to_string()
            },
        }
    }

    pub fn from_url(method: &str, url: &Url) -> Option<Self> {
        let host = url.host_str()?;
        Some(Self::new(method, host, &path_and_query(url)))
    }
}

impl RequestTarget<'_> {
    /// `None` when no hostname can be determined.
    pub fn resolve(&self) -> Option<ResolvedTarget> {
        match self {
            RequestTarget::Url(raw) => {
                let url = Url::parse(raw).ok()?;
                ResolvedTarget::from_url("", &url)
            }
            RequestTarget::ParsedUrl(url) => ResolvedTarget::from_url("", url),
            RequestTarget::Options(options) => {
                let host = options
                    .hostname
                    .as_deref()
                    .or(options.host.as_deref())
                    .filter(|h| !h.is_empty())?;
                Some(ResolvedTarget::new(
                    options.method.as_deref().unwrap_or_default(),
                    host,
                    options.path.as_deref().unwrap_or("/"),
                ))
            }
            RequestTarget::UrlWithOptions(raw, options) => {
                let base = Url::parse(raw).ok();
                let host = options
                    .hostname
                    .as_deref()
                    .or(options.host.as_deref())
                    .map(str::to_string)
                    .or_else(|| base.as_ref().and_then(|u| u.host_str().map(str::to_string)))?;
                let path = options
                    .path
                    .clone()
                    .or_else(|| base.as_ref().map(path_and_query))
                    .unwrap_or_else(|| "/".to_string());
                Some(ResolvedTarget::new(
                    options.method.as_deref().unwrap_or_default(),
                    &host,
                    &path,
                ))
            }
        }
    }
}

fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host;
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Whether a response content type announces server-sent events.
pub fn is_event_stream(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.to_ascii_lowercase().contains("text/event-stream"))
        .unwrap_or(false)
}
