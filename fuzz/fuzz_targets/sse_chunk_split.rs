#![no_main]

use libfuzzer_sys::fuzz_target;
use vera_sse::{ingest_bytes, FrameBuffer, Utf8Decoder};

fuzz_target!(|data: &[u8]| {
    let Some((&split, body)) = data.split_first() else {
        return;
    };
    let split = usize::from(split).min(body.len());

    let mut decoder = Utf8Decoder::new();
    let mut buffer = FrameBuffer::new();
    let whole = ingest_bytes(&mut decoder, &mut buffer, body);

    let mut decoder = Utf8Decoder::new();
    let mut buffer = FrameBuffer::new();
    let (head, tail) = body.split_at(split);
    let mut parts = ingest_bytes(&mut decoder, &mut buffer, head);
    parts.extend(ingest_bytes(&mut decoder, &mut buffer, tail));

    assert_eq!(whole, parts);
    for frame in &whole {
        assert!(!frame.event_type.is_empty());
    }
});
