use std::sync::{Mutex, RwLock};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use notes_types::CorrelationToken;

use crate::error::{BusError, BusResult};
use crate::event::{ActionComplete, ActionRequestEvent};

/// Default capacity of each completion subscriber's channel.
pub const DEFAULT_COMPLETION_CAPACITY: usize = 256;

/// Filter for subscribing to a subset of completions.
#[derive(Clone, Debug, Default)]
pub struct CompletionFilter {
    /// If set, only completions of these operations are delivered.
    pub operations: Option<Vec<String>>,
    /// If set, only the completion carrying this token is delivered.
    pub token: Option<CorrelationToken>,
}

impl CompletionFilter {
    pub fn operation(name: impl Into<String>) -> Self {
        Self {
            operations: Some(vec![name.into()]),
            token: None,
        }
    }

    pub fn token(token: CorrelationToken) -> Self {
        Self {
            operations: None,
            token: Some(token),
        }
    }

    /// Returns `true` if the given completion matches this filter.
    pub fn matches(&self, event: &ActionComplete) -> bool {
        if let Some(ref ops) = self.operations {
            if !ops.iter().any(|op| *op == event.operation) {
                return false;
            }
        }
        if let Some(token) = self.token {
            if token != event.token {
                return false;
            }
        }
        true
    }
}

/// A broadcast channel receiver for completions.
pub type CompletionStream = broadcast::Receiver<ActionComplete>;

struct Subscriber {
    filter: CompletionFilter,
    sender: broadcast::Sender<ActionComplete>,
}

/// The single consumer of `action-request` events.
///
/// Dropping the subscription unsubscribes.
pub struct RequestSubscription {
    receiver: mpsc::UnboundedReceiver<ActionRequestEvent>,
}

impl RequestSubscription {
    /// Next request, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<ActionRequestEvent> {
        self.receiver.recv().await
    }

    /// Stop receiving requests. Queued requests are discarded.
    pub fn unsubscribe(self) {}
}

/// Typed channels between UI collaborators and the coordinator.
///
/// Requests flow one way to exactly one subscriber. Completions fan out
/// to every subscriber whose filter matches.
pub struct ActionBus {
    requests: Mutex<Option<mpsc::UnboundedSender<ActionRequestEvent>>>,
    subscribers: RwLock<Vec<Subscriber>>,
    capacity: usize,
}

impl ActionBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_COMPLETION_CAPACITY)
    }

    /// Bus whose completion subscribers buffer up to `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            requests: Mutex::new(None),
            subscribers: RwLock::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    /// Deliver a request to the request subscriber.
    pub fn publish_request(&self, event: ActionRequestEvent) -> BusResult<()> {
        let mut slot = self.requests.lock().expect("bus lock poisoned");
        let Some(sender) = slot.as_ref() else {
            return Err(BusError::NoSubscribers);
        };
        if sender.send(event).is_err() {
            *slot = None;
            return Err(BusError::NoSubscribers);
        }
        Ok(())
    }

    /// Become the request subscriber. Fails while another is attached.
    pub fn subscribe_requests(&self) -> BusResult<RequestSubscription> {
        let mut slot = self.requests.lock().expect("bus lock poisoned");
        if slot.as_ref().is_some_and(|sender| !sender.is_closed()) {
            return Err(BusError::AlreadySubscribed);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *slot = Some(tx);
        debug!("request subscriber attached");
        Ok(RequestSubscription { receiver: rx })
    }

    pub fn has_request_subscriber(&self) -> bool {
        self.requests
            .lock()
            .expect("bus lock poisoned")
            .as_ref()
            .is_some_and(|sender| !sender.is_closed())
    }

    /// Fan a completion out to every matching subscriber.
    ///
    /// Returns how many subscribers it was delivered to. Subscribers whose
    /// receivers are gone are pruned.
    pub fn publish_complete(&self, event: ActionComplete) -> usize {
        let mut subs = self.subscribers.write().expect("bus lock poisoned");
        let mut delivered = 0;
        subs.retain(|sub| {
            if sub.filter.matches(&event) {
                let alive = sub.sender.send(event.clone()).is_ok();
                delivered += usize::from(alive);
                alive
            } else {
                sub.sender.receiver_count() > 0
            }
        });
        if delivered == 0 {
            debug!(token = %event.token, operation = %event.operation, "completion had no subscribers");
        }
        delivered
    }

    /// Register a completion subscriber with the given filter.
    pub fn subscribe_completions(&self, filter: CompletionFilter) -> CompletionStream {
        let (tx, rx) = broadcast::channel(self.capacity);
        self.subscribers
            .write()
            .expect("bus lock poisoned")
            .push(Subscriber { filter, sender: tx });
        rx
    }

    /// Number of registered completion subscribers.
    pub fn completion_subscriber_count(&self) -> usize {
        self.subscribers.read().expect("bus lock poisoned").len()
    }
}

impl Default for ActionBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ActionBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionBus")
            .field("request_subscriber", &self.has_request_subscriber())
            .field("completion_subscribers", &self.completion_subscriber_count())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Wait on `stream` for the completion carrying `token`.
///
/// Other completions are skipped. A lagging receiver keeps waiting, since
/// the awaited event may still be ahead.
pub async fn wait_for(
    stream: &mut CompletionStream,
    token: CorrelationToken,
) -> BusResult<ActionComplete> {
    loop {
        match stream.recv().await {
            Ok(event) if event.token == token => return Ok(event),
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, %token, "completion subscriber lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return Err(BusError::Closed),
        }
    }
}
