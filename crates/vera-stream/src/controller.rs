use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use vera_events::{decode_frame, StreamEvent};
use vera_sse::{parse_frame, FrameBuffer, Utf8Decoder};

use crate::{ChunkSource, EventDispatcher, StreamError, StreamRequest, StreamTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates lifecycle states of one stream connection.
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    Error,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Why a read loop stopped without a transport failure.
pub enum StreamOutcome {
    EndOfStream,
    Cancelled,
    TerminalEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamSummary {
    pub frames: u64,
    pub dispatched: u64,
    pub decode_failures: u64,
    pub dropped_partial_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamCompletion {
    pub outcome: StreamOutcome,
    pub summary: StreamSummary,
}

#[derive(Debug, Clone)]
/// Idempotent cancellation for one connection; usable before, during or after the run.
pub struct CancelHandle {
    cancel_tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }
}

// Releases the transport exactly once, whichever way the read loop exits.
struct TransportLease {
    source: Box<dyn ChunkSource>,
    released: bool,
}

impl TransportLease {
    fn new(source: Box<dyn ChunkSource>) -> Self {
        Self {
            source,
            released: false,
        }
    }

    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, StreamError>> {
        if self.released {
            return None;
        }
        self.source.next_chunk().await
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.source.close();
        }
    }
}

impl Drop for TransportLease {
    fn drop(&mut self) {
        self.release();
    }
}

/// Owns one connection: opens the transport, runs the read loop and feeds the dispatcher.
pub struct ConnectionController<E: StreamEvent> {
    transport: Arc<dyn StreamTransport>,
    dispatcher: EventDispatcher<E>,
    close_on_terminal_event: bool,
    state_tx: watch::Sender<ConnectionState>,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
}

impl<E: StreamEvent> ConnectionController<E> {
    pub fn new(transport: Arc<dyn StreamTransport>, dispatcher: EventDispatcher<E>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            transport,
            dispatcher,
            close_on_terminal_event: false,
            state_tx,
            cancel_tx: Arc::new(cancel_tx),
            cancel_rx,
        }
    }

    pub fn with_close_on_terminal_event(mut self, enabled: bool) -> Self {
        self.close_on_terminal_event = enabled;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancel_tx: Arc::clone(&self.cancel_tx),
        }
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn dispatcher(&self) -> &EventDispatcher<E> {
        &self.dispatcher
    }

    /// Runs the connection on a background task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self, request: StreamRequest) -> StreamHandle {
        let cancel = self.cancel_handle();
        let state = self.state();
        let task = tokio::spawn(self.run(request));
        StreamHandle {
            cancel,
            state,
            task: Some(task),
        }
    }

    #[tracing::instrument(
        name = "vera_stream.connection.run",
        skip(self, request),
        fields(url = %request.url, method = ?request.method)
    )]
    pub async fn run(self, request: StreamRequest) -> Result<StreamCompletion, StreamError> {
        let mut cancel_rx = self.cancel_rx.clone();
        let mut summary = StreamSummary::default();

        let opened = tokio::select! {
            biased;
            _ = cancelled(&mut cancel_rx) => None,
            opened = self.transport.open(&request) => Some(opened),
        };
        let source = match opened {
            None => {
                tracing::debug!("stream cancelled while connecting");
                self.set_state(ConnectionState::Closed);
                return Ok(StreamCompletion {
                    outcome: StreamOutcome::Cancelled,
                    summary,
                });
            }
            Some(Err(error)) => {
                tracing::debug!(error = %error, "stream failed to open");
                self.set_state(ConnectionState::Error);
                return Err(error);
            }
            Some(Ok(source)) => source,
        };

        let mut lease = TransportLease::new(source);
        self.set_state(ConnectionState::Open);
        tracing::debug!("stream open");

        let mut decoder = Utf8Decoder::new();
        let mut buffer = FrameBuffer::new();
        let result = 'read: loop {
            let next = tokio::select! {
                biased;
                _ = cancelled(&mut cancel_rx) => break 'read Ok(StreamOutcome::Cancelled),
                next = lease.next_chunk() => next,
            };
            let chunk = match next {
                None => break 'read Ok(StreamOutcome::EndOfStream),
                Some(Err(error)) => {
                    // An abort racing a cancel is reported as the cancel.
                    if *cancel_rx.borrow() {
                        break 'read Ok(StreamOutcome::Cancelled);
                    }
                    break 'read Err(error);
                }
                Some(Ok(chunk)) => chunk,
            };

            let text = decoder.decode(&chunk);
            let blocks = buffer.ingest(&text);
            if !blocks.is_empty() {
                tracing::trace!(
                    blocks = blocks.len(),
                    bytes = chunk.len(),
                    "chunk completed frames"
                );
            }
            for block in blocks {
                if *cancel_rx.borrow() {
                    break 'read Ok(StreamOutcome::Cancelled);
                }
                let Some(frame) = parse_frame(&block) else {
                    continue;
                };
                summary.frames += 1;
                let Some(event) = decode_frame::<E>(&frame) else {
                    summary.decode_failures += 1;
                    continue;
                };
                let terminal = event.is_terminal();
                self.dispatcher.dispatch(frame.sequence_id, event);
                summary.dispatched += 1;
                if terminal && self.close_on_terminal_event {
                    break 'read Ok(StreamOutcome::TerminalEvent);
                }
            }
        };

        if matches!(result, Ok(StreamOutcome::EndOfStream)) {
            summary.dropped_partial_bytes = buffer.finish() + decoder.finish();
            if summary.dropped_partial_bytes > 0 {
                tracing::debug!(
                    dropped_bytes = summary.dropped_partial_bytes,
                    "stream ended inside a frame; partial frame dropped"
                );
            }
        }
        lease.release();

        match result {
            Ok(outcome) => {
                self.set_state(ConnectionState::Closed);
                tracing::debug!(
                    outcome = ?outcome,
                    frames = summary.frames,
                    dispatched = summary.dispatched,
                    decode_failures = summary.decode_failures,
                    "stream closed"
                );
                Ok(StreamCompletion { outcome, summary })
            }
            Err(error) => {
                self.set_state(ConnectionState::Error);
                tracing::debug!(error = %error, dispatched = summary.dispatched, "stream failed");
                Err(error)
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }
}

async fn cancelled(cancel_rx: &mut watch::Receiver<bool>) {
    loop {
        if *cancel_rx.borrow_and_update() {
            return;
        }
        if cancel_rx.changed().await.is_err() {
            // The controller owns the sender, so this only happens on teardown.
            std::future::pending::<()>().await;
        }
    }
}

#[derive(Debug)]
/// Handle to a connection running on a background task.
///
/// Dropping the handle cancels the connection; call [`StreamHandle::join`] to
/// wait for it instead.
pub struct StreamHandle {
    cancel: CancelHandle,
    state: watch::Receiver<ConnectionState>,
    task: Option<JoinHandle<Result<StreamCompletion, StreamError>>>,
}

impl StreamHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Waits for the read loop to end. Transport failures surface here, once.
    pub async fn join(mut self) -> Result<StreamCompletion, StreamError> {
        let Some(task) = self.task.take() else {
            return Err(StreamError::TaskJoin("stream task already joined".to_string()));
        };
        task.await
            .map_err(|error| StreamError::TaskJoin(error.to_string()))?
    }
}

impl Drop for StreamHandle {
    // Cancelling a finished loop is a no-op.
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
