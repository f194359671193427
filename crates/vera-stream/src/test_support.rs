use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{CancelHandle, ChunkSource, StreamError, StreamRequest, StreamTransport};

pub(crate) enum ScriptStep {
    Chunk(Vec<u8>),
    Fail(String),
    /// Trips the armed cancel handle, then fails the read like an aborted body.
    CancelThenFail(String),
    Hang,
}

impl ScriptStep {
    pub(crate) fn chunk(text: &str) -> Self {
        Self::Chunk(text.as_bytes().to_vec())
    }
}

/// In-memory transport replaying a fixed script of chunks.
pub(crate) struct ScriptedTransport {
    steps: Mutex<Option<Vec<ScriptStep>>>,
    open_error: Mutex<Option<StreamError>>,
    cancel_on_fail: Mutex<Option<CancelHandle>>,
    closes: Arc<AtomicUsize>,
    pub(crate) open_count: AtomicUsize,
    pub(crate) requests: Mutex<Vec<StreamRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new(steps: Vec<ScriptStep>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(Some(steps)),
            open_error: Mutex::new(None),
            cancel_on_fail: Mutex::new(None),
            closes: Arc::new(AtomicUsize::new(0)),
            open_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn failing_open(error: StreamError) -> Arc<Self> {
        let transport = Self::new(Vec::new());
        *transport.open_error.lock().expect("open error lock") = Some(error);
        transport
    }

    pub(crate) fn arm_cancel(&self, cancel: CancelHandle) {
        *self.cancel_on_fail.lock().expect("cancel lock") = Some(cancel);
    }

    pub(crate) fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    async fn open(&self, request: &StreamRequest) -> Result<Box<dyn ChunkSource>, StreamError> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        if let Some(error) = self.open_error.lock().expect("open error lock").take() {
            return Err(error);
        }
        let steps = self
            .steps
            .lock()
            .expect("steps lock")
            .take()
            .expect("scripted transport opened twice");
        Ok(Box::new(ScriptedSource {
            steps: steps.into(),
            cancel: self.cancel_on_fail.lock().expect("cancel lock").clone(),
            closes: self.closes.clone(),
        }))
    }
}

struct ScriptedSource {
    steps: VecDeque<ScriptStep>,
    cancel: Option<CancelHandle>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl ChunkSource for ScriptedSource {
    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, StreamError>> {
        match self.steps.pop_front()? {
            ScriptStep::Chunk(bytes) => Some(Ok(bytes)),
            ScriptStep::Fail(message) => Some(Err(StreamError::Transport(message))),
            ScriptStep::CancelThenFail(message) => {
                if let Some(cancel) = &self.cancel {
                    cancel.cancel();
                }
                Some(Err(StreamError::Transport(message)))
            }
            ScriptStep::Hang => std::future::pending().await,
        }
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
