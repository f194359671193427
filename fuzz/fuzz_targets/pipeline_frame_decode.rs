#![no_main]

use libfuzzer_sys::fuzz_target;
use vera_events::{try_decode_frame, ChatEvent, PipelineEvent, StreamEvent};
use vera_sse::parse_frame;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let Some(frame) = parse_frame(&raw) else {
        return;
    };
    if let Ok(event) = try_decode_frame::<PipelineEvent>(&frame) {
        assert_eq!(event.event_type(), frame.event_type);
    }
    if let Ok(event) = try_decode_frame::<ChatEvent>(&frame) {
        assert_eq!(event.event_type(), frame.event_type);
    }
});
