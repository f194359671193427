use std::sync::{Arc, Mutex};

use vera_events::{PipelineEvent, PipelineSessionState};

use crate::dispatcher::lock_or_recover;
use crate::{
    ConnectionController, Dispatched, EventDispatcher, EventFilter, HttpTransport,
    StreamClientConfig, StreamError, StreamHandle, StreamRequest, StreamTransport,
    SubscriptionId,
};

/// Client for a report's pipeline activity stream.
pub struct PipelineStream {
    transport: Arc<dyn StreamTransport>,
    config: StreamClientConfig,
}

impl PipelineStream {
    pub fn new(config: StreamClientConfig) -> Result<Self, StreamError> {
        let transport = HttpTransport::new(config.clone())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: StreamClientConfig, transport: Arc<dyn StreamTransport>) -> Self {
        Self { transport, config }
    }

    pub fn request(&self, report_id: &str) -> Result<StreamRequest, StreamError> {
        Ok(StreamRequest::get(self.config.pipeline_stream_url(report_id)?))
    }

    /// Subscribes to a report's activity; events flow to `dispatcher` on a background task.
    pub fn open(
        &self,
        report_id: &str,
        dispatcher: EventDispatcher<PipelineEvent>,
    ) -> Result<StreamHandle, StreamError> {
        let request = self.request(report_id)?;
        tracing::debug!(report_id, "opening pipeline stream");
        Ok(ConnectionController::new(Arc::clone(&self.transport), dispatcher)
            .with_close_on_terminal_event(self.config.close_on_terminal_event)
            .spawn(request))
    }

    /// Like [`PipelineStream::open`], with a tracker folding session state from the start.
    pub fn open_tracked(
        &self,
        report_id: &str,
        dispatcher: EventDispatcher<PipelineEvent>,
        initial: PipelineSessionState,
    ) -> Result<(StreamHandle, PipelineTracker), StreamError> {
        let tracker = PipelineTracker::attach(&dispatcher, initial);
        let handle = self.open(report_id, dispatcher)?;
        Ok((handle, tracker))
    }
}

#[derive(Debug, Clone)]
/// Subscriber that keeps a [`PipelineSessionState`] current as events arrive.
pub struct PipelineTracker {
    state: Arc<Mutex<PipelineSessionState>>,
    subscription: SubscriptionId,
}

impl PipelineTracker {
    pub fn attach(
        dispatcher: &EventDispatcher<PipelineEvent>,
        initial: PipelineSessionState,
    ) -> Self {
        let state = Arc::new(Mutex::new(initial));
        let sink = Arc::clone(&state);
        let subscription = dispatcher.subscribe(
            EventFilter::All,
            Arc::new(move |dispatched: &Dispatched<PipelineEvent>| {
                lock_or_recover(&sink).apply(&dispatched.event);
            }),
        );
        Self {
            state,
            subscription,
        }
    }

    pub fn snapshot(&self) -> PipelineSessionState {
        lock_or_recover(&self.state).clone()
    }

    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }
}
