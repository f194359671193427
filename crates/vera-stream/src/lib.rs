//! Streaming clients for the fact-checking backend.
//!
//! [`PipelineStream`] follows a report's agent activity and [`ChatStream`]
//! runs token-by-token chat exchanges. Both sit on a [`ConnectionController`]
//! that owns the transport, reassembles SSE frames and feeds an
//! [`EventDispatcher`].

mod chat;
mod config;
mod controller;
mod dispatcher;
mod error;
mod http;
mod pipeline;
mod transport;

#[cfg(test)]
mod test_support;

pub use chat::{ChatMessageRequest, ChatReply, ChatStream, PartialTextHandler};
pub use config::{
    validate_report_id, StreamClientConfig, DEFAULT_API_BASE, DEFAULT_CONNECT_TIMEOUT_MS,
};
pub use controller::{
    CancelHandle, ConnectionController, ConnectionState, StreamCompletion, StreamHandle,
    StreamOutcome, StreamSummary,
};
pub use dispatcher::{Dispatched, EventDispatcher, EventFilter, EventHandler, SubscriptionId};
pub use error::StreamError;
pub use http::HttpTransport;
pub use pipeline::{PipelineStream, PipelineTracker};
pub use transport::{ChunkSource, StreamMethod, StreamRequest, StreamTransport};

pub use vera_events::{
    agent_display, ChatEvent, ChatSessionState, Citation, PipelineEvent, PipelineSessionState,
    StreamEvent,
};
