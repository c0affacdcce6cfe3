//! Taps over the three outbound primitives.

#[cfg(feature = "reqwest")]
pub mod fetch;
pub mod http1;
pub mod http2;

/// Case-insensitive header lookup over name/value pairs.
pub(crate) fn header_value<'a>(headers: &[(&str, &'a str)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| *value)
}
