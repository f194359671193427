/// Incremental UTF-8 decoder for byte chunks of arbitrary length.
///
/// A chunk that ends inside a multi-byte character keeps the leading bytes of
/// that character until the next chunk completes it. Bytes that can never form
/// a valid character are replaced with U+FFFD.
#[derive(Debug, Default, Clone)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut text = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    break;
                }
                Err(error) => {
                    let (valid, tail) = rest.split_at(error.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match error.error_len() {
                        Some(invalid_len) => {
                            tracing::warn!(
                                invalid_len,
                                "replacing invalid UTF-8 sequence in event stream"
                            );
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[invalid_len..];
                        }
                        None => {
                            self.pending = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        text
    }

    /// Number of bytes held back waiting for the rest of a character.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Discards any held-back bytes at end of stream, returning how many were dropped.
    pub fn finish(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::Utf8Decoder;

    #[test]
    fn unit_decoder_carries_split_multibyte_character() {
        let bytes = "r\u{e9}sum\u{e9} \u{1f50e}".as_bytes();
        let mut decoder = Utf8Decoder::new();

        // 0xC3 of the first e-acute ends the first chunk.
        let first = decoder.decode(&bytes[..2]);
        assert_eq!(first, "r");
        assert_eq!(decoder.pending_len(), 1);

        let second = decoder.decode(&bytes[2..]);
        assert_eq!(format!("{first}{second}"), "r\u{e9}sum\u{e9} \u{1f50e}");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn unit_decoder_feeds_four_byte_character_one_byte_at_a_time() {
        let bytes = "\u{1f50e}".as_bytes();
        let mut decoder = Utf8Decoder::new();
        let mut text = String::new();
        for byte in bytes {
            text.push_str(&decoder.decode(std::slice::from_ref(byte)));
        }
        assert_eq!(text, "\u{1f50e}");
    }

    #[test]
    fn regression_invalid_bytes_are_replaced_without_losing_following_text() {
        let mut decoder = Utf8Decoder::new();
        let text = decoder.decode(&[b'a', 0xFF, b'b', 0xC3, 0x28, b'c']);
        assert_eq!(text, "a\u{fffd}b\u{fffd}(c");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn unit_finish_drops_dangling_partial_character() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&[b'x', 0xE2, 0x82]), "x");
        assert_eq!(decoder.finish(), 2);
        assert_eq!(decoder.pending_len(), 0);
    }
}
