use thiserror::Error;

#[derive(Debug, Error)]
/// Enumerates failures surfaced to callers of the stream clients.
pub enum StreamError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("stream endpoint returned non-success status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid stream client config: {0}")]
    InvalidConfig(String),
    #[error("invalid stream request: {0}")]
    InvalidRequest(String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("chat exchange failed: {message}")]
    Application { message: String },
    #[error("stream ended before the terminal event")]
    IncompleteExchange { partial: String },
    #[error("stream task failed: {0}")]
    TaskJoin(String),
}

impl StreamError {
    /// True when the connection itself failed, as opposed to the exchange on it.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::HttpStatus { .. } | Self::Transport(_)
        )
    }
}
