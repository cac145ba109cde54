use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use tandem_core::{TransferClass, TransferId, UserInfoRecord};
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::config::{ComplicationPolicy, SubsystemConfig, MAX_ACK_TIMEOUT};
use crate::error::{TransferError, TransferOutcome};

/// Lifecycle of one outbound transfer. Everything but `Sent` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Sent,
    Acknowledged,
    TimedOut,
    Superseded,
    Failed,
}

/// Outbound transfer awaiting acknowledgment.
#[derive(Debug)]
pub struct PendingTransfer {
    pub id: TransferId,
    pub class: TransferClass,
    pub payload: UserInfoRecord,
    pub submitted_at: Instant,
    /// Wall-clock deadline fixed at submit time.
    pub deadline: Instant,
    pub state: TransferState,
    seq: u64,
    completion: Option<oneshot::Sender<TransferOutcome>>,
}

impl PendingTransfer {
    fn resolve(&mut self, state: TransferState, outcome: TransferOutcome) {
        self.state = state;
        if let Some(tx) = self.completion.take() {
            // A dropped handle means the caller stopped waiting.
            let _ = tx.send(outcome);
        }
    }
}

/// Caller side of a submitted transfer; resolves once the transfer leaves
/// the `Sent` state.
#[derive(Debug)]
pub struct TransferHandle {
    id: TransferId,
    class: TransferClass,
    rx: oneshot::Receiver<TransferOutcome>,
}

impl TransferHandle {
    pub fn id(&self) -> TransferId {
        self.id
    }

    pub fn class(&self) -> TransferClass {
        self.class
    }

    /// Non-blocking check for a resolved outcome.
    pub fn try_outcome(&mut self) -> Option<TransferOutcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(TransferError::Closed)),
        }
    }
}

impl Future for TransferHandle {
    type Output = TransferOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or(Err(TransferError::Closed)))
    }
}

/// Result of admitting a transfer into the queue.
#[derive(Debug)]
pub struct Admission {
    pub handle: TransferHandle,
    /// Complication transfers evicted to make room, oldest first.
    pub superseded: Vec<TransferId>,
}

/// Pending-transfer table with per-class submission order.
#[derive(Debug)]
pub struct OutboundQueue {
    pending: HashMap<TransferId, PendingTransfer>,
    standard_order: VecDeque<TransferId>,
    complication_order: VecDeque<TransferId>,
    complication_capacity: usize,
    complication_policy: ComplicationPolicy,
    ack_timeout: Duration,
    next_seq: u64,
}

impl OutboundQueue {
    pub fn new(config: &SubsystemConfig) -> Self {
        Self {
            pending: HashMap::new(),
            standard_order: VecDeque::new(),
            complication_order: VecDeque::new(),
            complication_capacity: config.complication_capacity.max(1),
            complication_policy: config.complication_policy,
            ack_timeout: config.ack_timeout.min(MAX_ACK_TIMEOUT),
            next_seq: 0,
        }
    }

    fn order_mut(&mut self, class: TransferClass) -> &mut VecDeque<TransferId> {
        match class {
            TransferClass::Standard => &mut self.standard_order,
            TransferClass::Complication => &mut self.complication_order,
        }
    }

    fn order(&self, class: TransferClass) -> &VecDeque<TransferId> {
        match class {
            TransferClass::Standard => &self.standard_order,
            TransferClass::Complication => &self.complication_order,
        }
    }

    /// Removes a transfer from the table and its class order.
    fn take(&mut self, id: TransferId) -> Option<PendingTransfer> {
        let transfer = self.pending.remove(&id)?;
        self.order_mut(transfer.class).retain(|queued| *queued != id);
        Some(transfer)
    }

    /// Admits a new transfer in the `Sent` state, evicting complication
    /// backlog per policy first.
    pub fn admit(
        &mut self,
        id: TransferId,
        class: TransferClass,
        payload: UserInfoRecord,
        now: Instant,
    ) -> Admission {
        let mut superseded = Vec::new();
        if class == TransferClass::Complication {
            let keep = match self.complication_policy {
                ComplicationPolicy::DropOldest => self.complication_capacity - 1,
                ComplicationPolicy::NewestWins => 0,
            };
            while self.complication_order.len() > keep {
                let Some(oldest) = self.complication_order.front().copied() else {
                    break;
                };
                if let Some(mut evicted) = self.take(oldest) {
                    info!(transfer = %oldest, by = %id, "complication transfer superseded");
                    evicted.resolve(
                        TransferState::Superseded,
                        Err(TransferError::Superseded { id: oldest, by: id }),
                    );
                    superseded.push(oldest);
                }
            }
        }

        let deadline = now
            .checked_add(self.ack_timeout)
            .unwrap_or_else(|| now + MAX_ACK_TIMEOUT);
        let (tx, rx) = oneshot::channel();
        self.next_seq += 1;
        self.pending.insert(
            id,
            PendingTransfer {
                id,
                class,
                payload,
                submitted_at: now,
                deadline,
                state: TransferState::Sent,
                seq: self.next_seq,
                completion: Some(tx),
            },
        );
        self.order_mut(class).push_back(id);

        Admission {
            handle: TransferHandle { id, class, rx },
            superseded,
        }
    }

    /// Resolves a transfer with the peer's echoed record.
    ///
    /// Returns the terminal state, or `None` when nothing is pending under
    /// `id` (for example, the deadline already fired).
    pub fn on_acknowledged(
        &mut self,
        id: TransferId,
        echoed: Option<UserInfoRecord>,
    ) -> Option<TransferState> {
        let mut transfer = self.take(id)?;
        match echoed {
            Some(record) => {
                debug!(transfer = %id, class = %transfer.class, "transfer acknowledged");
                transfer.resolve(TransferState::Acknowledged, Ok(record));
            }
            None => {
                debug!(transfer = %id, "acknowledgment without user-info payload");
                transfer.resolve(
                    TransferState::Failed,
                    Err(TransferError::InvalidAck { id }),
                );
            }
        }
        Some(transfer.state)
    }

    /// Resolves a transfer as timed out. No retry is attempted.
    pub fn on_timeout(&mut self, id: TransferId) -> bool {
        let Some(mut transfer) = self.take(id) else {
            return false;
        };
        let after = transfer.deadline.saturating_duration_since(transfer.submitted_at);
        info!(transfer = %id, class = %transfer.class, ?after, "transfer timed out");
        transfer.resolve(
            TransferState::TimedOut,
            Err(TransferError::TimedOut { id, after }),
        );
        true
    }

    /// Resolves a transfer whose hand-off to the transport failed.
    pub fn on_send_failed(&mut self, id: TransferId, reason: String) -> bool {
        let Some(mut transfer) = self.take(id) else {
            return false;
        };
        transfer.resolve(
            TransferState::Failed,
            Err(TransferError::SendFailed { id, reason }),
        );
        true
    }

    /// Times out every transfer whose deadline is at or before `now`, in
    /// deadline order.
    pub fn expire_due(&mut self, now: Instant) -> Vec<TransferId> {
        let mut due: Vec<(Instant, u64, TransferId)> = self
            .pending
            .values()
            .filter(|t| t.deadline <= now)
            .map(|t| (t.deadline, t.seq, t.id))
            .collect();
        due.sort_unstable_by_key(|(deadline, seq, _)| (*deadline, *seq));
        due.into_iter()
            .filter_map(|(_, _, id)| self.on_timeout(id).then_some(id))
            .collect()
    }

    /// Oldest pending transfer of `class`, or of any class when `None`.
    pub fn oldest_pending(&self, class: Option<TransferClass>) -> Option<TransferId> {
        match class {
            Some(class) => self.order(class).front().copied(),
            None => [TransferClass::Standard, TransferClass::Complication]
                .into_iter()
                .filter_map(|class| self.order(class).front())
                .filter_map(|id| self.pending.get(id))
                .min_by_key(|t| t.seq)
                .map(|t| t.id),
        }
    }

    /// Earliest deadline among pending transfers.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|t| t.deadline).min()
    }

    pub fn is_pending(&self, id: TransferId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Pending transfer ids of `class`, in submission order.
    pub fn pending_ids(&self, class: TransferClass) -> Vec<TransferId> {
        self.order(class).iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Resolves every pending transfer with `Closed`.
    pub fn close_all(&mut self) -> usize {
        let closed = self.pending.len();
        for (_, mut transfer) in self.pending.drain() {
            transfer.resolve(TransferState::Failed, Err(TransferError::Closed));
        }
        self.standard_order.clear();
        self.complication_order.clear();
        closed
    }
}
