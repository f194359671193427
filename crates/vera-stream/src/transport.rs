use async_trait::async_trait;
use serde_json::Value;

use crate::StreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
/// What to open: a subscription (`GET`) or a request whose response streams (`POST`).
pub struct StreamRequest {
    pub method: StreamMethod,
    pub url: String,
    pub body: Option<Value>,
}

impl StreamRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: StreamMethod::Get,
            url: url.into(),
            body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: StreamMethod::Post,
            url: url.into(),
            body: Some(body),
        }
    }
}

#[async_trait]
/// An open response body delivering raw chunks.
pub trait ChunkSource: Send {
    /// Next chunk, or `None` once the body has ended.
    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, StreamError>>;

    /// Releases the underlying connection. The controller calls this exactly once.
    fn close(&mut self);
}

#[async_trait]
/// Trait contract for opening streaming responses.
pub trait StreamTransport: Send + Sync {
    async fn open(&self, request: &StreamRequest) -> Result<Box<dyn ChunkSource>, StreamError>;
}
