/// Blank line separating two frames once line terminators are normalized.
pub const FRAME_DELIMITER: &str = "\n\n";

/// Accumulates decoded text and cuts it into complete frame blocks.
///
/// Text after the last delimiter stays buffered until a later chunk completes
/// it. Nothing is emitted for a block whose delimiter has not been seen.
#[derive(Debug, Default, Clone)]
pub struct FrameBuffer {
    pending: String,
    scan_from: usize,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, chunk: &str) -> Vec<String> {
        self.append_normalized(chunk);

        let mut blocks = Vec::new();
        let mut consumed = 0;
        let mut search_from = self.scan_from;
        while let Some(offset) = self.pending[search_from..].find(FRAME_DELIMITER) {
            let end = search_from + offset;
            blocks.push(self.pending[consumed..end].to_string());
            consumed = end + FRAME_DELIMITER.len();
            search_from = consumed;
        }
        if consumed > 0 {
            self.pending.drain(..consumed);
        }

        self.scan_from = if self.pending.ends_with('\n') {
            self.pending.len() - 1
        } else {
            self.pending.len()
        };
        blocks
    }

    fn append_normalized(&mut self, chunk: &str) {
        // A trailing '\r' is the first half of a "\r\n" pair split across chunks.
        if chunk.starts_with('\n') && self.pending.ends_with('\r') {
            self.pending.pop();
            self.scan_from = self.scan_from.min(self.pending.len());
            if self.pending.ends_with('\n') {
                self.scan_from = self.scan_from.min(self.pending.len() - 1);
            }
        }
        if chunk.contains('\r') {
            self.pending.push_str(&chunk.replace("\r\n", "\n"));
        } else {
            self.pending.push_str(chunk);
        }
    }

    /// Bytes of an incomplete frame currently held back.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drops whatever partial frame is left at end of stream and reports its size.
    pub fn finish(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.scan_from = 0;
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::FrameBuffer;

    #[test]
    fn unit_ingest_yields_each_delimited_block_in_order() {
        let mut buffer = FrameBuffer::new();
        let blocks = buffer.ingest("data: 1\n\ndata: 2\n\ndata: 3");
        assert_eq!(blocks, vec!["data: 1".to_string(), "data: 2".to_string()]);
        assert_eq!(buffer.pending_len(), "data: 3".len());
    }

    #[test]
    fn unit_chunk_without_delimiter_is_held_entirely() {
        let mut buffer = FrameBuffer::new();
        assert!(buffer.ingest("event: agent_started\ndata: {\"ag").is_empty());
        assert!(buffer.ingest("ent\":\"a\"}\n").is_empty());
        let blocks = buffer.ingest("\n");
        assert_eq!(
            blocks,
            vec!["event: agent_started\ndata: {\"agent\":\"a\"}".to_string()]
        );
        assert_eq!(buffer.pending_len(), 0);
    }

    #[test]
    fn functional_crlf_terminators_split_across_chunks_still_delimit() {
        let mut buffer = FrameBuffer::new();
        assert!(buffer.ingest("data: 1\r\n\r").is_empty());
        let blocks = buffer.ingest("\ndata: 2\r\n\r\n");
        assert_eq!(blocks, vec!["data: 1".to_string(), "data: 2".to_string()]);
    }

    #[test]
    fn regression_lone_carriage_return_is_not_rejoined_on_later_chunks() {
        let mut whole = FrameBuffer::new();
        let expected = whole.ingest("data: x\r\r\n\n");

        let mut split = FrameBuffer::new();
        assert!(split.ingest("data: x\r\r\n").is_empty());
        assert_eq!(split.ingest("\n"), expected);
        assert_eq!(expected, vec!["data: x\r".to_string()]);
    }

    #[test]
    fn regression_partial_trailing_frame_is_dropped_on_finish() {
        let mut buffer = FrameBuffer::new();
        assert_eq!(buffer.ingest("data: {\"a\":1}\n\ndata: {\"b\""), vec!["data: {\"a\":1}"]);
        assert_eq!(buffer.finish(), "data: {\"b\"".len());
        assert_eq!(buffer.pending_len(), 0);
        assert!(buffer.ingest("").is_empty());
    }

    #[test]
    fn unit_multibyte_tail_does_not_break_resumed_scan() {
        let mut buffer = FrameBuffer::new();
        assert!(buffer.ingest("data: \u{e9}").is_empty());
        assert!(buffer.ingest("\u{1f50e}\n").is_empty());
        assert_eq!(buffer.ingest("\n"), vec!["data: \u{e9}\u{1f50e}".to_string()]);
    }
}
