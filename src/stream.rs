//! Incremental parser for the line-delimited `data:` answer feed.
//!
//! Fed raw byte chunks as they arrive; only complete lines are interpreted
//! and the trailing partial fragment is carried to the next call. Meaningful
//! lines look like `data: <payload>` where the payload is either a JSON
//! object carrying a token field, raw token text, or the terminal sentinel.
//!
//! All emitted tokens are accumulated into a running full-text buffer so the
//! dispatcher can commit the complete assistant turn exactly once.

const DATA_PREFIX: &str = "data: ";
const END_MARKER: &str = "[DONE]";

/// Result of feeding one chunk to the parser.
#[derive(Debug, Default)]
pub struct StreamUpdate {
    /// Tokens completed by this chunk, in order. Never contains empties.
    pub tokens: Vec<String>,
    /// True once the terminal sentinel has been seen.
    pub terminal: bool,
}

pub struct StreamParser {
    buf: Vec<u8>,
    full_text: String,
    terminated: bool,
}

impl StreamParser {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            full_text: String::new(),
            terminated: false,
        }
    }

    /// Consume a raw byte chunk, returning any tokens completed by it.
    /// After the terminal sentinel, further input is ignored.
    pub fn push(&mut self, chunk: &[u8]) -> StreamUpdate {
        let mut update = StreamUpdate::default();
        if self.terminated {
            update.terminal = true;
            return update;
        }

        self.buf.extend_from_slice(chunk);

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            let line = line.trim_end_matches(['\r', '\n']);

            let payload = match line.strip_prefix(DATA_PREFIX) {
                Some(p) => p.trim(),
                None => continue,
            };

            if payload == END_MARKER || payload.eq_ignore_ascii_case("done") {
                self.terminated = true;
                self.buf.clear();
                update.terminal = true;
                return update;
            }

            let token = extract_token(payload);
            if token.is_empty() {
                continue;
            }
            log::debug!("[STREAM] Token: {:?}", token);
            self.full_text.push_str(&token);
            update.tokens.push(token);
        }

        update
    }

    /// Everything emitted so far, concatenated.
    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Token field of a JSON payload, or the raw payload verbatim when it is
/// not JSON (or carries no string token field).
fn extract_token(payload: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(payload) {
        if let Some(token) = value
            .get("response")
            .and_then(|v| v.as_str())
            .or_else(|| value.get("message").and_then(|v| v.as_str()))
        {
            return token.to_string();
        }
    }
    payload.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconstructs_tokens_and_stops_at_sentinel() {
        let mut parser = StreamParser::new();
        let update = parser.push(
            b"data: {\"response\":\"He\"}\ndata: {\"response\":\"llo\"}\ndata: [DONE]\n",
        );
        assert_eq!(update.tokens, vec!["He", "llo"]);
        assert!(update.terminal);
        assert_eq!(parser.full_text(), "Hello");
    }

    #[test]
    fn no_tokens_after_terminal() {
        let mut parser = StreamParser::new();
        parser.push(b"data: [DONE]\ndata: {\"response\":\"late\"}\n");
        let update = parser.push(b"data: {\"response\":\"later\"}\n");
        assert!(update.tokens.is_empty());
        assert!(update.terminal);
        assert_eq!(parser.full_text(), "");
    }

    #[test]
    fn partial_lines_carry_across_chunks() {
        let mut parser = StreamParser::new();
        let update = parser.push(b"data: {\"resp");
        assert!(update.tokens.is_empty());
        assert!(!update.terminal);

        let update = parser.push(b"onse\":\"Hi\"}\n");
        assert_eq!(update.tokens, vec!["Hi"]);
    }

    #[test]
    fn raw_payload_is_a_token_and_done_is_case_insensitive() {
        let mut parser = StreamParser::new();
        let update = parser.push(b"data: plain words\ndata: DONE\n");
        assert_eq!(update.tokens, vec!["plain words"]);
        assert!(update.terminal);
    }

    #[test]
    fn message_field_and_non_string_fields() {
        let mut parser = StreamParser::new();
        let update = parser.push(b"data: {\"message\":\"from msg\"}\n");
        assert_eq!(update.tokens, vec!["from msg"]);

        // No string token field: the raw payload is the token.
        let update = parser.push(b"data: {\"response\":42}\n");
        assert_eq!(update.tokens, vec!["{\"response\":42}"]);
    }

    #[test]
    fn empty_tokens_and_unprefixed_lines_are_skipped() {
        let mut parser = StreamParser::new();
        let update = parser.push(b"data: {\"response\":\"\"}\nnoise line\ndata: ok\n");
        assert_eq!(update.tokens, vec!["ok"]);
        assert!(!update.terminal);
    }
}
