use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{ChatDone, ChatEvent, Citation, PipelineEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates lifecycle states an agent moves through in one pipeline run.
pub enum AgentStatus {
    #[default]
    Idle,
    Working,
    Completed,
    Error,
}

/// Session view folded from pipeline events, one event at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PipelineSessionState {
    agents: BTreeMap<String, AgentStatus>,
    active: BTreeSet<String>,
    completed: BTreeSet<String>,
    errored: BTreeSet<String>,
    pipeline_complete: bool,
    events_applied: u64,
}

impl PipelineSessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with every listed agent known and `idle`.
    pub fn with_roster<I, S>(agent_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let agents = agent_ids
            .into_iter()
            .map(|agent| (agent.into(), AgentStatus::Idle))
            .collect();
        Self {
            agents,
            ..Self::default()
        }
    }

    /// Folds a recorded event log from an empty state.
    pub fn replay<'a, I>(events: I) -> Self
    where
        I: IntoIterator<Item = &'a PipelineEvent>,
    {
        let mut state = Self::new();
        for event in events {
            state.apply(event);
        }
        state
    }

    pub fn apply(&mut self, event: &PipelineEvent) {
        self.events_applied = self.events_applied.saturating_add(1);
        match event {
            PipelineEvent::AgentStarted(payload) => {
                if let Some(agent) = payload.agent.as_deref() {
                    self.set_status(agent, AgentStatus::Working);
                }
            }
            PipelineEvent::AgentCompleted(payload) => {
                if let Some(agent) = payload.agent.as_deref() {
                    self.set_status(agent, AgentStatus::Completed);
                }
            }
            PipelineEvent::ApplicationError(payload) => {
                if let Some(agent) = payload.agent.as_deref() {
                    self.set_status(agent, AgentStatus::Error);
                }
            }
            PipelineEvent::PipelineCompleted(_) => self.pipeline_complete = true,
            _ => {}
        }
    }

    fn set_status(&mut self, agent: &str, status: AgentStatus) {
        self.active.remove(agent);
        self.completed.remove(agent);
        self.errored.remove(agent);
        match status {
            AgentStatus::Idle => {}
            AgentStatus::Working => {
                self.active.insert(agent.to_string());
            }
            AgentStatus::Completed => {
                self.completed.insert(agent.to_string());
            }
            AgentStatus::Error => {
                self.errored.insert(agent.to_string());
            }
        }
        self.agents.insert(agent.to_string(), status);
    }

    /// Status of `agent`; agents never seen read as `idle`.
    pub fn status(&self, agent: &str) -> AgentStatus {
        self.agents.get(agent).copied().unwrap_or_default()
    }

    pub fn agents(&self) -> &BTreeMap<String, AgentStatus> {
        &self.agents
    }

    pub fn active_agents(&self) -> &BTreeSet<String> {
        &self.active
    }

    pub fn completed_agents(&self) -> &BTreeSet<String> {
        &self.completed
    }

    pub fn errored_agents(&self) -> &BTreeSet<String> {
        &self.errored
    }

    pub fn pipeline_complete(&self) -> bool {
        self.pipeline_complete
    }

    pub fn events_applied(&self) -> u64 {
        self.events_applied
    }
}

/// Accumulated text, citations and terminal result of one chat exchange.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatSessionState {
    text: String,
    citations: Vec<Citation>,
    result: Option<ChatDone>,
    error: Option<String>,
}

impl ChatSessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replay<'a, I>(events: I) -> Self
    where
        I: IntoIterator<Item = &'a ChatEvent>,
    {
        let mut state = Self::new();
        for event in events {
            state.apply(event);
        }
        state
    }

    pub fn apply(&mut self, event: &ChatEvent) {
        match event {
            ChatEvent::Token(token) => self.text.push_str(token),
            ChatEvent::Citations(citations) => self.citations.extend(citations.iter().cloned()),
            ChatEvent::Done(done) => {
                if let Some(existing) = &self.result {
                    tracing::warn!(
                        message_id = %existing.message_id,
                        duplicate_message_id = %done.message_id,
                        "ignoring repeated chat_done event"
                    );
                } else {
                    self.result = Some(done.clone());
                }
            }
            ChatEvent::ApplicationError(message) => self.error = Some(message.clone()),
            ChatEvent::Unrecognized { .. } => {}
        }
    }

    /// Text accumulated from token fragments, in arrival order.
    pub fn partial_text(&self) -> &str {
        &self.text
    }

    /// Best available text: the terminal content once known, else the accumulation.
    pub fn final_text(&self) -> &str {
        self.result
            .as_ref()
            .map(|done| done.full_content.as_str())
            .unwrap_or(self.text.as_str())
    }

    pub fn citations(&self) -> &[Citation] {
        &self.citations
    }

    pub fn result(&self) -> Option<&ChatDone> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.result.is_some() || self.error.is_some()
    }
}
