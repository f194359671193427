//! Wire-level framing for `text/event-stream` bodies.
//!
//! Bytes go in through [`Utf8Decoder`], text is split into frame blocks by
//! [`FrameBuffer`], and each block is turned into a [`Frame`] by [`parse_frame`].
mod buffer;
mod frame;
mod utf8;

pub use buffer::{FrameBuffer, FRAME_DELIMITER};
pub use frame::{parse_frame, Frame, DEFAULT_EVENT_TYPE};
pub use utf8::Utf8Decoder;

/// Decodes one raw chunk and returns the frames it completed.
///
/// Convenience wrapper for callers that hold a decoder and a buffer side by side.
pub fn ingest_bytes(
    decoder: &mut Utf8Decoder,
    buffer: &mut FrameBuffer,
    chunk: &[u8],
) -> Vec<Frame> {
    let text = decoder.decode(chunk);
    buffer
        .ingest(&text)
        .iter()
        .filter_map(|block| parse_frame(block))
        .collect()
}
