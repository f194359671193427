use serde_json::Value;
use thiserror::Error;
use vera_sse::Frame;

#[derive(Debug, Error)]
/// Enumerates reasons a frame payload yields no event.
pub enum EventDecodeError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload for '{event_type}' has unexpected shape: {source}")]
    Shape {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

impl EventDecodeError {
    pub(crate) fn shape(event_type: &str, source: serde_json::Error) -> Self {
        Self::Shape {
            event_type: event_type.to_string(),
            source,
        }
    }
}

/// Trait contract for event families carried over one stream protocol.
pub trait StreamEvent: Sized + Clone + Send + Sync + 'static {
    /// Interprets an already-parsed payload according to its event type.
    ///
    /// Unknown event types must map to an unrecognized variant, not an error.
    fn from_payload(event_type: &str, payload: Value) -> Result<Self, EventDecodeError>;

    /// Wire tag this event was decoded from.
    fn event_type(&self) -> &str;

    /// True for events that end the logical exchange on their protocol.
    fn is_terminal(&self) -> bool {
        false
    }
}

pub fn try_decode_frame<E: StreamEvent>(frame: &Frame) -> Result<E, EventDecodeError> {
    let payload: Value = serde_json::from_str(&frame.payload)?;
    E::from_payload(&frame.event_type, payload)
}

/// Decodes a frame, logging and swallowing any failure.
pub fn decode_frame<E: StreamEvent>(frame: &Frame) -> Option<E> {
    match try_decode_frame(frame) {
        Ok(event) => Some(event),
        Err(error) => {
            tracing::warn!(
                event_type = %frame.event_type,
                sequence_id = ?frame.sequence_id,
                error = %error,
                "dropping undecodable stream frame"
            );
            None
        }
    }
}
