use std::sync::{Arc, Mutex};

use serde::Serialize;
use vera_events::{ChatEvent, ChatSessionState, Citation};

use crate::dispatcher::lock_or_recover;
use crate::{
    ConnectionController, Dispatched, EventDispatcher, EventFilter, HttpTransport,
    StreamClientConfig, StreamError, StreamHandle, StreamRequest, StreamTransport,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Outgoing user message carried in the chat request body.
pub struct ChatMessageRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl ChatMessageRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_id: None,
        }
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Completed chat answer.
pub struct ChatReply {
    pub message_id: String,
    /// Authoritative text from `chat_done`, not the token accumulation.
    pub content: String,
    pub citations: Vec<Citation>,
}

/// Receives the text accumulated so far after each token.
pub type PartialTextHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Client for the token-by-token chat stream.
pub struct ChatStream {
    transport: Arc<dyn StreamTransport>,
    config: StreamClientConfig,
}

impl ChatStream {
    pub fn new(config: StreamClientConfig) -> Result<Self, StreamError> {
        let transport = HttpTransport::new(config.clone())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: StreamClientConfig, transport: Arc<dyn StreamTransport>) -> Self {
        Self { transport, config }
    }

    pub fn request(
        &self,
        report_id: &str,
        message: &ChatMessageRequest,
    ) -> Result<StreamRequest, StreamError> {
        if message.message.trim().is_empty() {
            return Err(StreamError::InvalidRequest(
                "chat message is empty".to_string(),
            ));
        }
        let body = serde_json::to_value(message)?;
        Ok(StreamRequest::post_json(self.config.chat_url(report_id)?, body))
    }

    /// Sends a message and streams the answer's events to `dispatcher` on a background task.
    pub fn send(
        &self,
        report_id: &str,
        message: &ChatMessageRequest,
        dispatcher: EventDispatcher<ChatEvent>,
    ) -> Result<StreamHandle, StreamError> {
        let request = self.request(report_id, message)?;
        tracing::debug!(report_id, "opening chat stream");
        Ok(ConnectionController::new(Arc::clone(&self.transport), dispatcher)
            .with_close_on_terminal_event(self.config.close_on_terminal_event)
            .spawn(request))
    }

    /// Runs one exchange to its terminal event and returns the final answer.
    ///
    /// A `chat_error` event yields [`StreamError::Application`]; a stream that
    /// ends before `chat_done` yields [`StreamError::IncompleteExchange`].
    pub async fn complete(
        &self,
        report_id: &str,
        message: &ChatMessageRequest,
        on_partial: Option<PartialTextHandler>,
    ) -> Result<ChatReply, StreamError> {
        let request = self.request(report_id, message)?;
        let session = Arc::new(Mutex::new(ChatSessionState::new()));

        let dispatcher = EventDispatcher::new();
        let sink = Arc::clone(&session);
        dispatcher.subscribe(
            EventFilter::All,
            Arc::new(move |dispatched: &Dispatched<ChatEvent>| {
                let partial = {
                    let mut session = lock_or_recover(&sink);
                    session.apply(&dispatched.event);
                    let partial = matches!(dispatched.event, ChatEvent::Token(_))
                        .then(|| session.partial_text().to_string());
                    partial
                };
                if let (Some(partial), Some(on_partial)) = (partial, on_partial.as_ref()) {
                    on_partial(&partial);
                }
            }),
        );

        ConnectionController::new(Arc::clone(&self.transport), dispatcher)
            .with_close_on_terminal_event(true)
            .run(request)
            .await?;

        let session = lock_or_recover(&session).clone();
        if let Some(message) = session.error() {
            return Err(StreamError::Application {
                message: message.to_string(),
            });
        }
        match session.result() {
            Some(done) => Ok(ChatReply {
                message_id: done.message_id.clone(),
                content: done.full_content.clone(),
                citations: session.citations().to_vec(),
            }),
            None => Err(StreamError::IncompleteExchange {
                partial: session.partial_text().to_string(),
            }),
        }
    }
}
