use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::mpsc;
use vera_events::StreamEvent;

#[derive(Debug, Clone, PartialEq)]
/// A decoded event as handed to subscribers.
pub struct Dispatched<E> {
    /// Local arrival counter; starts at 1 and grows by one per dispatched event.
    pub local_seq: u64,
    /// Server-supplied frame id, `0` when absent or unparsable.
    pub server_id: u64,
    pub event: E,
}

pub type EventHandler<E> = Arc<dyn Fn(&Dispatched<E>) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Selects which events a subscriber receives.
pub enum EventFilter {
    All,
    Tag(String),
}

impl EventFilter {
    pub fn tag(event_type: impl Into<String>) -> Self {
        Self::Tag(event_type.into())
    }

    pub fn matches(&self, event_type: &str) -> bool {
        match self {
            Self::All => true,
            Self::Tag(tag) => tag == event_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Subscriber<E> {
    id: SubscriptionId,
    filter: EventFilter,
    handler: EventHandler<E>,
}

struct DispatcherInner<E> {
    next_subscription: u64,
    subscribers: Vec<Subscriber<E>>,
    local_seq: u64,
    last_server_id: Option<u64>,
}

/// Delivers decoded events to registered subscribers in arrival order.
///
/// Clones share the same registry and sequence counter, so a clone kept by the
/// caller can add or remove subscribers while a connection is dispatching.
pub struct EventDispatcher<E> {
    inner: Arc<Mutex<DispatcherInner<E>>>,
}

impl<E> Clone for EventDispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> std::fmt::Debug for EventDispatcher<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock_or_recover(&self.inner);
        f.debug_struct("EventDispatcher")
            .field("subscribers", &inner.subscribers.len())
            .field("local_seq", &inner.local_seq)
            .finish()
    }
}

impl<E: StreamEvent> Default for EventDispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: StreamEvent> EventDispatcher<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(DispatcherInner {
                next_subscription: 1,
                subscribers: Vec::new(),
                local_seq: 0,
                last_server_id: None,
            })),
        }
    }

    pub fn subscribe(&self, filter: EventFilter, handler: EventHandler<E>) -> SubscriptionId {
        self.register(filter, |_| handler)
    }

    /// Subscribes a queue instead of a callback; events arrive in dispatch order.
    ///
    /// The subscription removes itself once the receiver is dropped.
    pub fn subscribe_channel(
        &self,
        filter: EventFilter,
    ) -> mpsc::UnboundedReceiver<Dispatched<E>> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let registry = Arc::downgrade(&self.inner);
        self.register(filter, move |id| {
            let handler: EventHandler<E> = Arc::new(move |dispatched: &Dispatched<E>| {
                if sender.send(dispatched.clone()).is_ok() {
                    return;
                }
                tracing::debug!(
                    subscription = id.0,
                    "channel receiver dropped; removing subscription"
                );
                remove_subscriber(&registry, id);
            });
            handler
        });
        receiver
    }

    fn register(
        &self,
        filter: EventFilter,
        make_handler: impl FnOnce(SubscriptionId) -> EventHandler<E>,
    ) -> SubscriptionId {
        let mut inner = lock_or_recover(&self.inner);
        let id = SubscriptionId(inner.next_subscription);
        inner.next_subscription = inner.next_subscription.saturating_add(1);
        inner.subscribers.push(Subscriber {
            id,
            filter,
            handler: make_handler(id),
        });
        id
    }

    /// Removes a subscriber; returns false when the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        lock_or_recover(&self.inner).remove(id)
    }

    pub fn subscriber_count(&self) -> usize {
        lock_or_recover(&self.inner).subscribers.len()
    }

    /// Number of events dispatched so far.
    pub fn dispatched_count(&self) -> u64 {
        lock_or_recover(&self.inner).local_seq
    }

    /// Hands one event to every matching subscriber and returns its local sequence number.
    pub fn dispatch(&self, server_id: Option<u64>, event: E) -> u64 {
        let (dispatched, handlers) = {
            let mut inner = lock_or_recover(&self.inner);
            inner.local_seq = inner.local_seq.saturating_add(1);
            if let Some(server_id) = server_id {
                if let Some(previous) = inner.last_server_id {
                    if server_id <= previous {
                        tracing::warn!(
                            server_id,
                            previous_server_id = previous,
                            local_seq = inner.local_seq,
                            event_type = event.event_type(),
                            "server event id did not increase"
                        );
                    }
                }
                inner.last_server_id = Some(server_id);
            }

            let handlers: Vec<EventHandler<E>> = inner
                .subscribers
                .iter()
                .filter(|subscriber| subscriber.filter.matches(event.event_type()))
                .map(|subscriber| Arc::clone(&subscriber.handler))
                .collect();
            let dispatched = Dispatched {
                local_seq: inner.local_seq,
                server_id: server_id.unwrap_or(0),
                event,
            };
            (dispatched, handlers)
        };

        // Handlers run without the lock so they may subscribe or unsubscribe.
        for handler in handlers {
            handler(&dispatched);
        }
        dispatched.local_seq
    }
}

impl<E> DispatcherInner<E> {
    fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|subscriber| subscriber.id != id);
        self.subscribers.len() != before
    }
}

fn remove_subscriber<E>(registry: &Weak<Mutex<DispatcherInner<E>>>, id: SubscriptionId) {
    if let Some(inner) = registry.upgrade() {
        lock_or_recover(&inner).remove(id);
    }
}

pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
