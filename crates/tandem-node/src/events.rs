use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};

use tandem_core::{ReachabilityState, UserInfoRecord};
use tokio::sync::oneshot;
use tracing::warn;

use crate::error::{HandlerError, TransferError};

/// Event names subscribers register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    UserInfo,
    Message,
    Reachability,
}

impl EventName {
    pub fn as_str(self) -> &'static str {
        match self {
            EventName::UserInfo => "user-info",
            EventName::Message => "message",
            EventName::Reachability => "reachability",
        }
    }
}

/// Payload distributed by the event bus.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Inbound user-info records, oldest first.
    UserInfo(Vec<UserInfoRecord>),
    /// Generic inbound message that was not an acknowledgment.
    Message(UserInfoRecord),
    /// Peer reachability transition.
    Reachability(ReachabilityState),
}

impl Event {
    pub fn name(&self) -> EventName {
        match self {
            Event::UserInfo(_) => EventName::UserInfo,
            Event::Message(_) => EventName::Message,
            Event::Reachability(_) => EventName::Reachability,
        }
    }
}

/// Subscriber callback. Errors and panics are contained per handler.
pub type EventHandler = Box<dyn FnMut(&Event) -> Result<(), HandlerError> + Send>;

/// Capability returned by `subscribe`, used only to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

enum Sink {
    Handler(EventHandler),
    Once(Option<oneshot::Sender<Event>>),
}

struct Subscriber {
    id: SubscriptionId,
    name: EventName,
    sink: Sink,
}

impl Subscriber {
    fn is_live(&self) -> bool {
        match &self.sink {
            Sink::Handler(_) => true,
            Sink::Once(tx) => tx.as_ref().is_some_and(|tx| !tx.is_closed()),
        }
    }

    fn deliver(&mut self, event: &Event) -> Result<(), HandlerError> {
        match &mut self.sink {
            Sink::Handler(handler) => {
                match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                    Ok(result) => result,
                    Err(panic) => Err(HandlerError::Panicked(panic_message(&*panic))),
                }
            }
            Sink::Once(slot) => match slot.take() {
                Some(tx) => tx
                    .send(event.clone())
                    .map_err(|_| HandlerError::failed("one-shot waiter dropped")),
                None => Err(HandlerError::failed("one-shot waiter already fired")),
            },
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Per-publish delivery counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers that accepted the event.
    pub delivered: usize,
    /// Subscribers whose handler failed or panicked.
    pub failed: usize,
}

/// In-process publish/subscribe table.
///
/// Dispatch is synchronous and in subscription order. Since publish and
/// unsubscribe both take `&mut self`, a subscriber is either fully invoked
/// for an event or fully skipped.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Subscriber>,
    next_id: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl EventBus {
    fn allocate_id(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }

    /// Registers a handler for `name`.
    pub fn subscribe<F>(&mut self, name: EventName, handler: F) -> SubscriptionId
    where
        F: FnMut(&Event) -> Result<(), HandlerError> + Send + 'static,
    {
        let id = self.allocate_id();
        self.subscribers.push(Subscriber {
            id,
            name,
            sink: Sink::Handler(Box::new(handler)),
        });
        id
    }

    /// Registers a waiter that resolves with the next `name` event and is
    /// then removed.
    pub fn subscribe_once(&mut self, name: EventName) -> EventWaiter {
        let id = self.allocate_id();
        let (tx, rx) = oneshot::channel();
        self.subscribers.push(Subscriber {
            id,
            name,
            sink: Sink::Once(Some(tx)),
        });
        EventWaiter { id, rx }
    }

    /// Removes a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|sub| sub.id != id);
        self.subscribers.len() != before
    }

    /// Number of live subscriptions for `name`.
    pub fn subscriber_count(&self, name: EventName) -> usize {
        self.subscribers
            .iter()
            .filter(|sub| sub.name == name && sub.is_live())
            .count()
    }

    /// Invokes every subscriber registered for the event's name.
    pub fn publish(&mut self, event: &Event) -> PublishReport {
        let name = event.name();
        let mut report = PublishReport::default();
        for sub in self.subscribers.iter_mut().filter(|sub| sub.name == name) {
            if !sub.is_live() {
                continue;
            }
            match sub.deliver(event) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    report.failed += 1;
                    warn!(event = name.as_str(), error = %err, "event handler failed");
                }
            }
        }
        self.prune();
        report
    }

    /// Delivers an event to a single subscription, bypassing the others.
    ///
    /// Returns `None` when the subscription does not exist.
    pub fn deliver_to(
        &mut self,
        id: SubscriptionId,
        event: &Event,
    ) -> Option<Result<(), HandlerError>> {
        let sub = self.subscribers.iter_mut().find(|sub| sub.id == id)?;
        let result = sub.deliver(event);
        if let Err(err) = &result {
            warn!(event = event.name().as_str(), error = %err, "event handler failed");
        }
        self.prune();
        Some(result)
    }

    /// Drops spent one-shot waiters and those whose receiver went away.
    fn prune(&mut self) {
        self.subscribers.retain(Subscriber::is_live);
    }
}

/// Future of the next event delivered to a one-shot subscription.
#[derive(Debug)]
pub struct EventWaiter {
    id: SubscriptionId,
    rx: oneshot::Receiver<Event>,
}

impl EventWaiter {
    /// Subscription id, usable to cancel the wait.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Non-blocking check for an already-delivered event.
    pub fn try_event(&mut self) -> Option<Result<Event, TransferError>> {
        match self.rx.try_recv() {
            Ok(event) => Some(Ok(event)),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(TransferError::Closed)),
        }
    }
}

impl Future for EventWaiter {
    type Output = Result<Event, TransferError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.map_err(|_| TransferError::Closed))
    }
}
