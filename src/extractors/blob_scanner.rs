//! Heuristic text recovery from protobuf blobs without a schema.
//!
//! Well-formed blobs are walked field by field, descending into
//! length-delimited fields that parse as messages. When the walk fails
//! (truncated or corrupt data) every offset is tried as a length-delimited
//! field key instead. Either way a payload is kept only when it is valid
//! UTF-8, mostly printable, long enough, and not identifier-like.
//! Nesting below `MAX_DEPTH` is not descended; those payloads are judged
//! as text.

use bytes::Buf;
use prost::encoding::decode_varint;

pub const MIN_TEXT_CHARS: usize = 12;
pub const MIN_PRINTABLE_RATIO: f64 = 0.85;
pub const MAX_DEPTH: usize = 32;

const WIRE_VARINT: u64 = 0;
const WIRE_FIXED64: u64 = 1;
const WIRE_LEN: u64 = 2;
const WIRE_FIXED32: u64 = 5;

/// Plausible strings in blob order, consecutive duplicates collapsed.
pub fn extract_strings(data: &[u8]) -> Vec<String> {
    match walk_message(data, 0) {
        Some(strings) => strings,
        None => {
            tracing::debug!(bytes = data.len(), "Blob is not a well-formed message, scanning");
            scan_strings(data)
        }
    }
}

/// Strict walk. `None` as soon as the bytes stop looking like a message.
fn walk_message(data: &[u8], depth: usize) -> Option<Vec<String>> {
    let mut buf = data;
    let mut found = Vec::new();

    while buf.has_remaining() {
        let key = decode_varint(&mut buf).ok()?;
        if key >> 3 == 0 {
            return None;
        }

        match key & 0x07 {
            WIRE_VARINT => {
                decode_varint(&mut buf).ok()?;
            }
            WIRE_FIXED64 => skip(&mut buf, 8)?,
            WIRE_FIXED32 => skip(&mut buf, 4)?,
            WIRE_LEN => {
                let length = decode_varint(&mut buf).ok()? as usize;
                if length > buf.remaining() {
                    return None;
                }
                let (payload, rest) = buf.split_at(length);
                buf = rest;
                for text in field_strings(payload, depth + 1) {
                    push_unique(&mut found, text);
                }
            }
            _ => return None,
        }
    }

    Some(found)
}

fn field_strings(payload: &[u8], depth: usize) -> Vec<String> {
    if payload.is_empty() {
        return Vec::new();
    }

    if depth < MAX_DEPTH {
        let nested = walk_message(payload, depth).filter(|strings| !strings.is_empty());
        if let Some(strings) = nested {
            return strings;
        }
    }

    std::str::from_utf8(payload)
        .ok()
        .filter(|text| is_plausible_text(text))
        .map(|text| vec![text.trim().to_string()])
        .unwrap_or_default()
}

fn skip(buf: &mut &[u8], count: usize) -> Option<()> {
    if buf.remaining() < count {
        return None;
    }
    buf.advance(count);
    Some(())
}

fn push_unique(found: &mut Vec<String>, text: String) {
    if found.last() != Some(&text) {
        found.push(text);
    }
}

/// Offset-by-offset fallback for blobs the walk rejects.
pub fn scan_strings(data: &[u8]) -> Vec<String> {
    let mut found = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        match candidate_at(data, offset) {
            Some((text, end)) => {
                push_unique(&mut found, text);
                offset = end;
            }
            None => offset += 1,
        }
    }

    found
}

fn candidate_at(data: &[u8], offset: usize) -> Option<(String, usize)> {
    let key = u64::from(data[offset]);
    if key & 0x07 != WIRE_LEN || key >> 3 == 0 {
        return None;
    }

    let mut buf = &data[offset + 1..];
    let before = buf.remaining();
    let length = decode_varint(&mut buf).ok()? as usize;
    let header = 1 + before - buf.remaining();

    if length < MIN_TEXT_CHARS || length > buf.remaining() {
        return None;
    }

    let text = std::str::from_utf8(&buf[..length]).ok()?;
    if !is_plausible_text(text) {
        return None;
    }

    Some((text.trim().to_string(), offset + header + length))
}

pub fn is_plausible_text(text: &str) -> bool {
    let trimmed = text.trim();
    let total = trimmed.chars().count();
    if total < MIN_TEXT_CHARS || trimmed.starts_with(char::is_control) {
        return false;
    }

    let printable = trimmed
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .count();
    if (printable as f64) / (total as f64) < MIN_PRINTABLE_RATIO {
        return false;
    }

    !looks_like_identifier(trimmed)
}

/// Single tokens made of id/path characters: UUIDs, hashes, paths, URLs.
fn looks_like_identifier(text: &str) -> bool {
    !text.chars().any(char::is_whitespace)
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | '+'))
}
