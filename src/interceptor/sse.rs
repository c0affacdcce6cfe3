use serde_json::Value;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Decode every `data:` line of a server-sent-events blob as JSON.
///
/// The `[DONE]` sentinel and lines that fail to parse are skipped, so a
/// partial or truncated stream still yields whatever is decodable.
pub fn parse_sse_events(text: &str) -> Vec<Value> {
    text.lines()
        .filter_map(|line| line.strip_prefix(DATA_PREFIX))
        .map(str::trim)
        .filter(|payload| !payload.is_empty() && *payload != DONE_SENTINEL)
        .filter_map(|payload| serde_json::from_str(payload).ok())
        .collect()
}
