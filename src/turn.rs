//! Decoding of one streamed assistant turn.

use crate::api::StreamChunk;
use crate::sse::{classify, LineBuffer, SseLine};

/// Accumulates the assistant's reply for a single turn as chunks arrive.
///
/// Feed it raw network chunks; it frames them into lines, extracts
/// `choices[0].delta.content` from each `data:` payload, and keeps the
/// running concatenation. A payload split across chunks is not an error:
/// the line is pushed back onto the buffer and retried once more bytes
/// arrive, so the final text never depends on where the network happened
/// to cut the stream.
#[derive(Debug)]
pub(crate) struct TurnDecoder {
    lines: LineBuffer,
    text: String,
}

impl TurnDecoder {
    pub(crate) fn new() -> Self {
        Self {
            lines: LineBuffer::new(),
            text: String::new(),
        }
    }

    /// Feeds one chunk and returns the content deltas it completed, in order.
    ///
    /// The drain stops early in two cases: a `[DONE]` sentinel (remaining
    /// buffered lines are left for the next round), and a payload that does
    /// not yet parse as JSON (the line goes back on the buffer to be retried
    /// together with the next chunk).
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.lines.extend(chunk);

        let mut applied = Vec::new();
        while let Some(line) = self.lines.next_line() {
            match classify(&line) {
                SseLine::Ignored => continue,
                SseLine::Done => break,
                SseLine::Data(payload) => match serde_json::from_str::<StreamChunk>(payload) {
                    Ok(parsed) => {
                        if let Some(delta) = parsed.delta_content()
                            && !delta.is_empty()
                        {
                            self.text.push_str(&delta);
                            applied.push(delta);
                        }
                    }
                    Err(_) => {
                        self.lines.push_back(&line);
                        break;
                    }
                },
            }
        }
        applied
    }

    /// The text accumulated so far. When the stream closes this is the final
    /// reply; bytes still buffered without a trailing newline are dropped
    /// with the decoder, never treated as an implicit last line.
    pub(crate) fn text(&self) -> &str {
        &self.text
    }
}
