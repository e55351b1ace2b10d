//! Incremental UTF-8 decoding of terminal output.
//!
//! A child's output arrives in arbitrary chunks, so a multi-byte character can
//! be split across two reads. [`Utf8Decoder`] holds back an incomplete trailing
//! sequence until the next chunk completes it. Bytes that can never form valid
//! UTF-8 are replaced with U+FFFD.

/// Result of decoding one chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedText {
    /// The decoded text.
    pub text: String,
    /// Number of replacement characters inserted.
    pub replacements: usize,
}

impl EncodedText {
    /// Whether any bytes had to be replaced.
    #[must_use]
    pub const fn had_errors(&self) -> bool {
        self.replacements > 0
    }
}

/// Decode bytes as UTF-8, replacing invalid sequences.
#[must_use]
pub fn decode_utf8_lossy(bytes: &[u8]) -> EncodedText {
    let text = String::from_utf8_lossy(bytes).into_owned();
    let replacements = text.matches('\u{FFFD}').count();
    EncodedText { text, replacements }
}

/// Stateful lossy decoder that carries split sequences between chunks.
#[derive(Debug, Clone, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes held back from earlier chunks.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Decode the next chunk.
    pub fn decode(&mut self, bytes: &[u8]) -> EncodedText {
        let mut data = std::mem::take(&mut self.pending);
        data.extend_from_slice(bytes);

        let split = data.len() - incomplete_tail_len(&data);
        self.pending = data.split_off(split);
        decode_utf8_lossy(&data)
    }

    /// Flush held-back bytes at end of stream.
    pub fn finish(&mut self) -> EncodedText {
        let pending = std::mem::take(&mut self.pending);
        decode_utf8_lossy(&pending)
    }
}

/// Length of a trailing sequence that is a valid prefix of a longer character.
fn incomplete_tail_len(data: &[u8]) -> usize {
    let mut rest = data;
    loop {
        match std::str::from_utf8(rest) {
            Ok(_) => return 0,
            Err(e) => match e.error_len() {
                None => return rest.len() - e.valid_up_to(),
                Some(bad) => rest = &rest[e.valid_up_to() + bad..],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_through() {
        let mut decoder = Utf8Decoder::new();
        let out = decoder.decode(b"login: ");
        assert_eq!(out.text, "login: ");
        assert!(!out.had_errors());
        assert!(decoder.pending().is_empty());
    }

    #[test]
    fn split_character_is_carried() {
        let snowman = "☃".as_bytes();
        let mut decoder = Utf8Decoder::new();

        let first = decoder.decode(&[b'a', snowman[0]]);
        assert_eq!(first.text, "a");
        assert_eq!(decoder.pending(), &snowman[..1]);

        let second = decoder.decode(&snowman[1..]);
        assert_eq!(second.text, "☃");
        assert!(decoder.pending().is_empty());
    }

    #[test]
    fn invalid_bytes_are_replaced() {
        let mut decoder = Utf8Decoder::new();
        let out = decoder.decode(b"a\xffb");
        assert_eq!(out.text, "a\u{FFFD}b");
        assert_eq!(out.replacements, 1);
    }

    #[test]
    fn invalid_byte_before_split_tail() {
        let euro = "€".as_bytes();
        let mut decoder = Utf8Decoder::new();
        let out = decoder.decode(&[0xff, b'x', euro[0], euro[1]]);
        assert_eq!(out.text, "\u{FFFD}x");
        assert_eq!(decoder.pending(), &euro[..2]);
        assert_eq!(decoder.decode(&euro[2..]).text, "€");
    }

    #[test]
    fn finish_flushes_truncated_tail() {
        let mut decoder = Utf8Decoder::new();
        let _ = decoder.decode(&"é".as_bytes()[..1]);
        let tail = decoder.finish();
        assert_eq!(tail.text, "\u{FFFD}");
        assert!(decoder.pending().is_empty());
    }
}
