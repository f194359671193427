use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ids, EventDecodeError, StreamEvent};

/// Wire tags carried by the chat token stream.
pub mod chat_tags {
    pub const TOKEN: &str = "chat_token";
    pub const CITATIONS: &str = "chat_citations";
    pub const DONE: &str = "chat_done";
    pub const ERROR: &str = "chat_error";
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
/// Reference to a source entity backing part of an answer.
pub struct Citation {
    #[serde(default, alias = "type")]
    pub source_type: Option<String>,
    #[serde(default, deserialize_with = "ids::optional_id")]
    pub source_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
/// Terminal result of a chat exchange: the authoritative full text.
pub struct ChatDone {
    #[serde(deserialize_with = "ids::id")]
    pub message_id: String,
    #[serde(alias = "content")]
    pub full_content: String,
}

#[derive(Debug, Clone, PartialEq)]
/// Enumerates events of the chat token stream.
pub enum ChatEvent {
    Token(String),
    Citations(Vec<Citation>),
    Done(ChatDone),
    ApplicationError(String),
    Unrecognized { event_type: String, payload: Value },
}

#[derive(Deserialize)]
struct TokenPayload {
    #[serde(alias = "content", alias = "text")]
    token: String,
}

#[derive(Deserialize)]
struct CitationsPayload {
    citations: Vec<Citation>,
}

#[derive(Deserialize)]
struct ErrorPayload {
    #[serde(alias = "error")]
    message: String,
}

fn decode_token(payload: Value) -> Result<String, serde_json::Error> {
    match payload {
        Value::String(token) => Ok(token),
        other => serde_json::from_value::<TokenPayload>(other).map(|payload| payload.token),
    }
}

fn decode_citations(payload: Value) -> Result<Vec<Citation>, serde_json::Error> {
    match payload {
        Value::Array(_) => serde_json::from_value(payload),
        other => {
            serde_json::from_value::<CitationsPayload>(other).map(|payload| payload.citations)
        }
    }
}

impl StreamEvent for ChatEvent {
    fn from_payload(event_type: &str, payload: Value) -> Result<Self, EventDecodeError> {
        let event = match event_type {
            chat_tags::TOKEN => decode_token(payload).map(Self::Token),
            chat_tags::CITATIONS => decode_citations(payload).map(Self::Citations),
            chat_tags::DONE => serde_json::from_value(payload).map(Self::Done),
            chat_tags::ERROR => serde_json::from_value::<ErrorPayload>(payload)
                .map(|payload| Self::ApplicationError(payload.message)),
            _ => Ok(Self::Unrecognized {
                event_type: event_type.to_string(),
                payload,
            }),
        };
        event.map_err(|error| EventDecodeError::shape(event_type, error))
    }

    fn event_type(&self) -> &str {
        match self {
            Self::Token(_) => chat_tags::TOKEN,
            Self::Citations(_) => chat_tags::CITATIONS,
            Self::Done(_) => chat_tags::DONE,
            Self::ApplicationError(_) => chat_tags::ERROR,
            Self::Unrecognized { event_type, .. } => event_type.as_str(),
        }
    }

    /// `chat_error` ends the exchange just as `chat_done` does.
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::ApplicationError(_))
    }
}
