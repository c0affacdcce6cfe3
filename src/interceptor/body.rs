/// Bounded accumulator for a streamed request or response body.
///
/// Once `max_bytes` is reached the collector keeps what fit, flags itself
/// truncated and rejects further chunks.
#[derive(Debug, Clone)]
pub struct BodyCollector {
    buffer: Vec<u8>,
    max_bytes: usize,
    truncated: bool,
}

impl BodyCollector {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_bytes,
            truncated: false,
        }
    }

    /// Returns `false` when the chunk was rejected because the collector was
    /// already truncated.
    pub fn push(&mut self, chunk: &[u8]) -> bool {
        if self.truncated {
            return false;
        }

        let room = self.max_bytes - self.buffer.len();
        if chunk.len() <= room {
            self.buffer.extend_from_slice(chunk);
            return true;
        }

        self.buffer.extend_from_slice(&chunk[..room]);
        self.truncated = true;
        tracing::debug!(
            max_bytes = self.max_bytes,
            dropped = chunk.len() - room,
            "Body exceeded capture limit, truncating"
        );
        true
    }

    pub fn push_str(&mut self, chunk: &str) -> bool {
        self.push(chunk.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// UTF-8 view of everything collected; invalid sequences (e.g. a
    /// character split by truncation) become U+FFFD.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.buffer).into_owned()
    }
}
