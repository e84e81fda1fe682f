//! Line framing for the event stream: turns raw byte chunks into logical
//! lines, no matter where the network happens to split them.

/// Growing text buffer fed by byte chunks and drained line by line.
///
/// Chunks may end in the middle of a multi-byte UTF-8 character, so decoding
/// carries the incomplete trailing bytes over to the next chunk instead of
/// decoding each chunk on its own.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    text: String,
    carry: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends one raw chunk to the buffer.
    pub(crate) fn extend(&mut self, chunk: &[u8]) {
        let joined;
        let mut input: &[u8] = if self.carry.is_empty() {
            chunk
        } else {
            let mut bytes = std::mem::take(&mut self.carry);
            bytes.extend_from_slice(chunk);
            joined = bytes;
            &joined
        };

        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    self.text.push_str(text);
                    break;
                }
                Err(err) => {
                    let (valid, rest) = input.split_at(err.valid_up_to());
                    self.text.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        // Genuinely invalid bytes: replace and keep going.
                        Some(len) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[len..];
                        }
                        // Incomplete trailing character: wait for more bytes.
                        None => {
                            self.carry = rest.to_vec();
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Removes and returns the next complete line, minus its `\n` and at
    /// most one trailing `\r`. Returns `None` when only an incomplete line
    /// remains buffered.
    pub(crate) fn next_line(&mut self) -> Option<String> {
        let idx = self.text.find('\n')?;
        let mut line: String = self.text.drain(..=idx).collect();
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
        Some(line)
    }

    /// Restores an extracted line (newline re-added) to the front of the
    /// buffer so it is retried once more bytes have arrived.
    pub(crate) fn push_back(&mut self, line: &str) {
        self.text.insert(0, '\n');
        self.text.insert_str(0, line);
    }
}

/// Classification of one framed line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SseLine<'a> {
    /// Blank line, `:` comment/keep-alive, or an unrecognized event prefix.
    Ignored,
    /// The `[DONE]` sentinel.
    Done,
    /// Candidate JSON payload of a `data: ` line.
    Data(&'a str),
}

pub(crate) fn classify(line: &str) -> SseLine<'_> {
    if line.starts_with(':') || line.trim().is_empty() {
        return SseLine::Ignored;
    }
    let Some(payload) = line.strip_prefix("data: ") else {
        return SseLine::Ignored;
    };
    let payload = payload.trim();
    if payload == "[DONE]" {
        SseLine::Done
    } else {
        SseLine::Data(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_lines_across_chunk_boundaries() {
        let mut buffer = LineBuffer::new();
        buffer.extend(b"data: one\nda");
        assert_eq!(buffer.next_line().as_deref(), Some("data: one"));
        assert_eq!(buffer.next_line(), None);

        buffer.extend(b"ta: two\n");
        assert_eq!(buffer.next_line().as_deref(), Some("data: two"));
        assert_eq!(buffer.next_line(), None);
    }

    #[test]
    fn strips_one_trailing_carriage_return() {
        let mut buffer = LineBuffer::new();
        buffer.extend(b"alpha\r\nbeta\n\r\r\n");
        assert_eq!(buffer.next_line().as_deref(), Some("alpha"));
        assert_eq!(buffer.next_line().as_deref(), Some("beta"));
        assert_eq!(buffer.next_line().as_deref(), Some("\r"));
    }

    #[test]
    fn carries_split_utf8_character() {
        // "नमस्ते" split inside the first character.
        let bytes = "नमस्ते\n".as_bytes();
        let mut buffer = LineBuffer::new();
        buffer.extend(&bytes[..2]);
        assert_eq!(buffer.next_line(), None);
        buffer.extend(&bytes[2..]);
        assert_eq!(buffer.next_line().as_deref(), Some("नमस्ते"));
    }

    #[test]
    fn replaces_invalid_bytes_without_stalling() {
        let mut buffer = LineBuffer::new();
        buffer.extend(b"ok \xff\xfe end\n");
        let line = buffer.next_line().unwrap();
        assert!(line.starts_with("ok "));
        assert!(line.ends_with(" end"));
        assert!(line.contains(char::REPLACEMENT_CHARACTER));
    }

    #[test]
    fn push_back_restores_line_order() {
        let mut buffer = LineBuffer::new();
        buffer.extend(b"data: {\"partial\nrest\n");
        let first = buffer.next_line().unwrap();
        buffer.push_back(&first);
        assert_eq!(buffer.next_line().as_deref(), Some("data: {\"partial"));
        assert_eq!(buffer.next_line().as_deref(), Some("rest"));
    }

    #[test]
    fn classifies_lines() {
        assert_eq!(classify(""), SseLine::Ignored);
        assert_eq!(classify("   "), SseLine::Ignored);
        assert_eq!(classify(": keep-alive"), SseLine::Ignored);
        assert_eq!(classify("event: ping"), SseLine::Ignored);
        assert_eq!(classify("data:no-space"), SseLine::Ignored);
        assert_eq!(classify("data: [DONE]"), SseLine::Done);
        assert_eq!(classify("data:  [DONE] "), SseLine::Done);
        assert_eq!(classify("data: {\"a\":1}"), SseLine::Data("{\"a\":1}"));
    }
}
