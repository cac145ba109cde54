//! Single-owner async runtime around [`TransferService`].
//!
//! One task owns the service. Callers and transport threads talk to it over
//! an unbounded command channel, so every mutation happens in the order it
//! was received. The task also polls the adapter on `poll_interval` and
//! fires acknowledgment deadlines exactly when they fall due.

use std::future::pending;
use std::ops::ControlFlow;
use std::time::Instant as StdInstant;

use tandem_core::{ReachabilityState, TransferClass, UserInfoRecord};
use tandem_transport::adapter::{TransportAdapter, TransportEvent};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::error::{HandlerError, TransferError};
use crate::events::{Event, EventHandler, EventName, EventWaiter, SubscriptionId};
use crate::outbound::TransferHandle;
use crate::service::{SubsystemStats, TransferService};

enum Command {
    Submit {
        payload: UserInfoRecord,
        class: TransferClass,
        reply: oneshot::Sender<Result<TransferHandle, TransferError>>,
    },
    SendMessage {
        message: UserInfoRecord,
        reply: oneshot::Sender<Result<(), TransferError>>,
    },
    DrainMissed {
        reply: oneshot::Sender<Vec<UserInfoRecord>>,
    },
    Subscribe {
        name: EventName,
        handler: EventHandler,
        reply: oneshot::Sender<SubscriptionId>,
    },
    SubscribeOnce {
        name: EventName,
        reply: oneshot::Sender<EventWaiter>,
    },
    Unsubscribe {
        id: SubscriptionId,
        reply: oneshot::Sender<bool>,
    },
    Inbound(TransportEvent),
    Reachability {
        reply: oneshot::Sender<ReachabilityState>,
    },
    Stats {
        reply: oneshot::Sender<SubsystemStats>,
    },
    DetachTransport {
        reply: oneshot::Sender<bool>,
    },
    Shutdown {
        reply: oneshot::Sender<usize>,
    },
}

/// Cloneable caller handle to a running subsystem.
///
/// Every method fails with [`TransferError::Closed`] once the runtime task
/// has stopped.
#[derive(Debug, Clone)]
pub struct SubsystemHandle {
    commands: mpsc::UnboundedSender<Command>,
}

/// Thread-safe entry point for adapter callbacks that push inbound events
/// instead of waiting to be polled.
#[derive(Debug, Clone)]
pub struct InboundSink {
    commands: mpsc::UnboundedSender<Command>,
}

impl InboundSink {
    /// Queues an inbound event for the owner task. Returns false once the
    /// runtime has stopped.
    pub fn deliver(&self, event: TransportEvent) -> bool {
        self.commands.send(Command::Inbound(event)).is_ok()
    }
}

impl SubsystemHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, TransferError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| TransferError::Closed)?;
        rx.await.map_err(|_| TransferError::Closed)
    }

    /// Submits a transfer. The returned handle resolves on acknowledgment,
    /// timeout, supersession, or send failure.
    pub async fn submit(
        &self,
        payload: UserInfoRecord,
        class: TransferClass,
    ) -> Result<TransferHandle, TransferError> {
        self.request(|reply| Command::Submit {
            payload,
            class,
            reply,
        })
        .await?
    }

    pub async fn transfer_user_info(
        &self,
        payload: UserInfoRecord,
    ) -> Result<TransferHandle, TransferError> {
        self.submit(payload, TransferClass::Standard).await
    }

    pub async fn transfer_complication_user_info(
        &self,
        payload: UserInfoRecord,
    ) -> Result<TransferHandle, TransferError> {
        self.submit(payload, TransferClass::Complication).await
    }

    /// Sends a generic live message to the peer.
    pub async fn send_message(&self, message: UserInfoRecord) -> Result<(), TransferError> {
        self.request(|reply| Command::SendMessage { message, reply })
            .await?
    }

    /// Returns and removes every missed user-info record, oldest first.
    pub async fn drain_missed(&self) -> Result<Vec<UserInfoRecord>, TransferError> {
        self.request(|reply| Command::DrainMissed { reply }).await
    }

    pub async fn subscribe<F>(
        &self,
        name: EventName,
        handler: F,
    ) -> Result<SubscriptionId, TransferError>
    where
        F: FnMut(&Event) -> Result<(), HandlerError> + Send + 'static,
    {
        let handler: EventHandler = Box::new(handler);
        self.request(|reply| Command::Subscribe {
            name,
            handler,
            reply,
        })
        .await
    }

    pub async fn subscribe_once(&self, name: EventName) -> Result<EventWaiter, TransferError> {
        self.request(|reply| Command::SubscribeOnce { name, reply })
            .await
    }

    /// Waits for the next `name` event.
    pub async fn once(&self, name: EventName) -> Result<Event, TransferError> {
        self.subscribe_once(name).await?.await
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, TransferError> {
        self.request(|reply| Command::Unsubscribe { id, reply })
            .await
    }

    pub async fn reachability(&self) -> Result<ReachabilityState, TransferError> {
        self.request(|reply| Command::Reachability { reply }).await
    }

    pub async fn stats(&self) -> Result<SubsystemStats, TransferError> {
        self.request(|reply| Command::Stats { reply }).await
    }

    /// Detaches the transport. Returns false if none was attached.
    pub async fn detach_transport(&self) -> Result<bool, TransferError> {
        self.request(|reply| Command::DetachTransport { reply })
            .await
    }

    /// Stops the runtime, resolving every pending handle with `Closed`.
    /// Returns how many transfers were closed.
    pub async fn shutdown(&self) -> Result<usize, TransferError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    pub fn inbound_sink(&self) -> InboundSink {
        InboundSink {
            commands: self.commands.clone(),
        }
    }
}

fn now() -> StdInstant {
    Instant::now().into_std()
}

async fn sleep_until_deadline(deadline: Option<StdInstant>) {
    match deadline {
        Some(deadline) => sleep_until(Instant::from_std(deadline)).await,
        None => pending::<()>().await,
    }
}

/// Spawns the owner task on the current tokio runtime.
pub fn spawn_subsystem<A>(service: TransferService<A>) -> (SubsystemHandle, JoinHandle<()>)
where
    A: TransportAdapter + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_subsystem(service, rx));
    (SubsystemHandle { commands: tx }, task)
}

async fn run_subsystem<A: TransportAdapter>(
    mut service: TransferService<A>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut poll = interval(service.config().poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let deadline = service.next_deadline();
        tokio::select! {
            maybe_cmd = commands.recv() => match maybe_cmd {
                Some(cmd) => {
                    if apply(&mut service, cmd).is_break() {
                        break;
                    }
                }
                None => {
                    debug!("all subsystem handles dropped");
                    service.shutdown();
                    break;
                }
            },
            _ = sleep_until_deadline(deadline) => {
                service.expire_due(now());
            }
            _ = poll.tick() => {
                service.pump_transport();
                service.expire_due(now());
            }
        }
    }

    info!(stats = ?service.stats(), "transfer subsystem stopped");
}

/// Applies one command. `Break` stops the owner task.
fn apply<A: TransportAdapter>(service: &mut TransferService<A>, cmd: Command) -> ControlFlow<()> {
    // A dropped reply receiver means the caller stopped waiting.
    match cmd {
        Command::Submit {
            payload,
            class,
            reply,
        } => {
            let _ = reply.send(service.submit(payload, class, now()));
        }
        Command::SendMessage { message, reply } => {
            let _ = reply.send(service.send_message(&message));
        }
        Command::DrainMissed { reply } => {
            let _ = reply.send(service.drain_missed());
        }
        Command::Subscribe {
            name,
            handler,
            reply,
        } => {
            let _ = reply.send(service.subscribe(name, handler));
        }
        Command::SubscribeOnce { name, reply } => {
            let _ = reply.send(service.subscribe_once(name));
        }
        Command::Unsubscribe { id, reply } => {
            let _ = reply.send(service.unsubscribe(id));
        }
        Command::Inbound(event) => service.handle_event(event),
        Command::Reachability { reply } => {
            let _ = reply.send(service.reachability());
        }
        Command::Stats { reply } => {
            let _ = reply.send(service.stats());
        }
        Command::DetachTransport { reply } => {
            let _ = reply.send(service.detach_transport().is_some());
        }
        Command::Shutdown { reply } => {
            let _ = reply.send(service.shutdown());
            return ControlFlow::Break(());
        }
    }
    ControlFlow::Continue(())
}
