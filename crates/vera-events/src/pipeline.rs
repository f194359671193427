use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ids, EventDecodeError, StreamEvent};

/// Wire tags carried by the pipeline activity stream.
pub mod pipeline_tags {
    pub const AGENT_STARTED: &str = "agent_started";
    pub const AGENT_THINKING: &str = "agent_thinking";
    pub const AGENT_COMPLETED: &str = "agent_completed";
    pub const CLAIM_ROUTED: &str = "claim_routed";
    pub const EVIDENCE_FOUND: &str = "evidence_found";
    pub const VERDICT_ISSUED: &str = "verdict_issued";
    pub const REINVESTIGATION: &str = "reinvestigation";
    pub const INFO_REQUEST_POSTED: &str = "info_request_posted";
    pub const INFO_REQUEST_ROUTED: &str = "info_request_routed";
    pub const INFO_RESPONSE_POSTED: &str = "info_response_posted";
    pub const PIPELINE_COMPLETED: &str = "pipeline_completed";
    pub const ERROR: &str = "error";
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
/// Payload for agent lifecycle events (`agent_started`, `agent_thinking`, `agent_completed`).
pub struct AgentActivity {
    #[serde(default, alias = "agent_id")]
    pub agent: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClaimRouted {
    #[serde(default, alias = "agent_id")]
    pub agent: Option<String>,
    #[serde(default, deserialize_with = "ids::optional_id")]
    pub claim_id: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EvidenceFound {
    #[serde(default, alias = "agent_id")]
    pub agent: Option<String>,
    #[serde(default, deserialize_with = "ids::optional_id")]
    pub claim_id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
/// Payload for `verdict_issued`; `verdict` is the only guaranteed field.
pub struct VerdictIssued {
    #[serde(default, alias = "agent_id")]
    pub agent: Option<String>,
    #[serde(default, deserialize_with = "ids::optional_id")]
    pub claim_id: Option<String>,
    pub verdict: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Reinvestigation {
    #[serde(default, alias = "agent_id")]
    pub agent: Option<String>,
    #[serde(default, deserialize_with = "ids::optional_id")]
    pub claim_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
/// Payload shared by the info request/response events exchanged between agents.
pub struct InfoExchange {
    #[serde(default, alias = "agent_id")]
    pub agent: Option<String>,
    #[serde(default, deserialize_with = "ids::optional_id")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineCompleted {
    #[serde(default, alias = "agent_id")]
    pub agent: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
/// Application-level `error` frame. Carried as data; it never closes the connection.
pub struct PipelineError {
    #[serde(default, alias = "agent_id")]
    pub agent: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
/// Enumerates events of the pipeline activity stream.
pub enum PipelineEvent {
    AgentStarted(AgentActivity),
    AgentThinking(AgentActivity),
    AgentCompleted(AgentActivity),
    ClaimRouted(ClaimRouted),
    EvidenceFound(EvidenceFound),
    VerdictIssued(VerdictIssued),
    Reinvestigation(Reinvestigation),
    InfoRequestPosted(InfoExchange),
    InfoRequestRouted(InfoExchange),
    InfoResponsePosted(InfoExchange),
    PipelineCompleted(PipelineCompleted),
    ApplicationError(PipelineError),
    Unrecognized { event_type: String, payload: Value },
}

impl PipelineEvent {
    /// Agent the event is attributed to, when the server named one.
    pub fn agent(&self) -> Option<&str> {
        let agent = match self {
            Self::AgentStarted(payload)
            | Self::AgentThinking(payload)
            | Self::AgentCompleted(payload) => &payload.agent,
            Self::ClaimRouted(payload) => &payload.agent,
            Self::EvidenceFound(payload) => &payload.agent,
            Self::VerdictIssued(payload) => &payload.agent,
            Self::Reinvestigation(payload) => &payload.agent,
            Self::InfoRequestPosted(payload)
            | Self::InfoRequestRouted(payload)
            | Self::InfoResponsePosted(payload) => &payload.agent,
            Self::PipelineCompleted(payload) => &payload.agent,
            Self::ApplicationError(payload) => &payload.agent,
            Self::Unrecognized { payload, .. } => {
                return payload.get("agent").and_then(Value::as_str);
            }
        };
        agent.as_deref()
    }
}

fn shaped<T>(event_type: &str, payload: Value) -> Result<T, EventDecodeError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(payload).map_err(|error| EventDecodeError::shape(event_type, error))
}

impl StreamEvent for PipelineEvent {
    fn from_payload(event_type: &str, payload: Value) -> Result<Self, EventDecodeError> {
        use pipeline_tags as tags;

        let event = match event_type {
            tags::AGENT_STARTED => Self::AgentStarted(shaped(event_type, payload)?),
            tags::AGENT_THINKING => Self::AgentThinking(shaped(event_type, payload)?),
            tags::AGENT_COMPLETED => Self::AgentCompleted(shaped(event_type, payload)?),
            tags::CLAIM_ROUTED => Self::ClaimRouted(shaped(event_type, payload)?),
            tags::EVIDENCE_FOUND => Self::EvidenceFound(shaped(event_type, payload)?),
            tags::VERDICT_ISSUED => Self::VerdictIssued(shaped(event_type, payload)?),
            tags::REINVESTIGATION => Self::Reinvestigation(shaped(event_type, payload)?),
            tags::INFO_REQUEST_POSTED => Self::InfoRequestPosted(shaped(event_type, payload)?),
            tags::INFO_REQUEST_ROUTED => Self::InfoRequestRouted(shaped(event_type, payload)?),
            tags::INFO_RESPONSE_POSTED => Self::InfoResponsePosted(shaped(event_type, payload)?),
            tags::PIPELINE_COMPLETED => Self::PipelineCompleted(shaped(event_type, payload)?),
            tags::ERROR => Self::ApplicationError(shaped(event_type, payload)?),
            _ => Self::Unrecognized {
                event_type: event_type.to_string(),
                payload,
            },
        };
        Ok(event)
    }

    fn event_type(&self) -> &str {
        use pipeline_tags as tags;

        match self {
            Self::AgentStarted(_) => tags::AGENT_STARTED,
            Self::AgentThinking(_) => tags::AGENT_THINKING,
            Self::AgentCompleted(_) => tags::AGENT_COMPLETED,
            Self::ClaimRouted(_) => tags::CLAIM_ROUTED,
            Self::EvidenceFound(_) => tags::EVIDENCE_FOUND,
            Self::VerdictIssued(_) => tags::VERDICT_ISSUED,
            Self::Reinvestigation(_) => tags::REINVESTIGATION,
            Self::InfoRequestPosted(_) => tags::INFO_REQUEST_POSTED,
            Self::InfoRequestRouted(_) => tags::INFO_REQUEST_ROUTED,
            Self::InfoResponsePosted(_) => tags::INFO_RESPONSE_POSTED,
            Self::PipelineCompleted(_) => tags::PIPELINE_COMPLETED,
            Self::ApplicationError(_) => tags::ERROR,
            Self::Unrecognized { event_type, .. } => event_type.as_str(),
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::PipelineCompleted(_))
    }
}
