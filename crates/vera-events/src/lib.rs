//! Typed events for the pipeline and chat streams, plus the state folds built on them.
mod agents;
mod chat;
mod decode;
mod ids;
mod pipeline;
mod session;

pub use agents::{agent_display, known_agent_ids, AgentDisplay};
pub use chat::{chat_tags, ChatDone, ChatEvent, Citation};
pub use decode::{decode_frame, try_decode_frame, EventDecodeError, StreamEvent};
pub use pipeline::{
    pipeline_tags, AgentActivity, ClaimRouted, EvidenceFound, InfoExchange, PipelineCompleted,
    PipelineError, PipelineEvent, Reinvestigation, VerdictIssued,
};
pub use session::{AgentStatus, ChatSessionState, PipelineSessionState};
