use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Coarse per-adapter transport health counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportHealthSnapshot {
    pub outbound_queued: u64,
    pub outbound_send_ok: u64,
    pub outbound_send_err: u64,
    pub inbound_received: u64,
    pub reachability_changes: u64,
    pub last_error: Option<String>,
}

/// Inbound event surfaced by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Generic message bytes.
    Message(Vec<u8>),
    /// User-info transfer envelope bytes, before any queueing decision.
    UserInfo(Vec<u8>),
    /// Peer reachability transition.
    Reachability(bool),
}

/// Outbound frame as seen by the far side of a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Standard(Vec<u8>),
    Complication(Vec<u8>),
    Message(Vec<u8>),
}

impl OutboundFrame {
    pub fn bytes(&self) -> &[u8] {
        match self {
            OutboundFrame::Standard(b)
            | OutboundFrame::Complication(b)
            | OutboundFrame::Message(b) => b,
        }
    }
}

/// Byte-oriented transport contract used by the transfer subsystem.
///
/// Sends are fire-and-forget hand-offs: `Ok` means the adapter accepted the
/// bytes, not that the peer received them.
pub trait TransportAdapter {
    /// Transport-specific send error.
    type Error: std::fmt::Display;

    /// Hands a user-info envelope to the bulk transfer lane.
    fn send_standard(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;
    /// Hands a user-info envelope to the complication lane.
    fn send_complication(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;
    /// Sends a generic live message.
    fn send_message(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;
    /// Returns the next inbound event, if any.
    fn recv(&mut self) -> Option<TransportEvent>;

    /// Whether outbound send is currently available.
    ///
    /// Used to seed reachability when the adapter is attached.
    fn can_send(&self) -> bool {
        true
    }

    /// Best-effort transport health counters.
    fn health_snapshot(&self) -> TransportHealthSnapshot {
        TransportHealthSnapshot::default()
    }
}

#[derive(Debug)]
struct LinkState {
    to_peer: Vec<OutboundFrame>,
    to_local: VecDeque<TransportEvent>,
    reachable: bool,
    allow_send: bool,
    drop_outbound: bool,
    send_ok: u64,
    send_err: u64,
    recv_ok: u64,
    reachability_changes: u64,
    last_error: Option<String>,
}

impl Default for LinkState {
    fn default() -> Self {
        Self {
            to_peer: Vec::new(),
            to_local: VecDeque::new(),
            reachable: true,
            allow_send: true,
            drop_outbound: false,
            send_ok: 0,
            send_err: 0,
            recv_ok: 0,
            reachability_changes: 0,
            last_error: None,
        }
    }
}

type SharedLink = Arc<Mutex<LinkState>>;

fn lock(link: &SharedLink) -> MutexGuard<'_, LinkState> {
    link.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory adapter for tests and simulations.
///
/// Shares one link with an [`InMemoryPeer`], which plays the far side from
/// any thread.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAdapter {
    link: SharedLink,
}

/// Far side of an in-memory link.
#[derive(Debug, Clone)]
pub struct InMemoryPeer {
    link: SharedLink,
}

/// Creates a connected adapter/peer pair. The link starts reachable.
pub fn in_memory_pair() -> (InMemoryAdapter, InMemoryPeer) {
    let adapter = InMemoryAdapter::default();
    let peer = InMemoryPeer {
        link: Arc::clone(&adapter.link),
    };
    (adapter, peer)
}

impl InMemoryAdapter {
    fn push_outbound(&mut self, frame: OutboundFrame) -> Result<(), &'static str> {
        let mut link = lock(&self.link);
        if !link.allow_send {
            link.send_err += 1;
            link.last_error = Some("send disabled".to_string());
            return Err("send disabled");
        }
        if link.drop_outbound {
            link.send_err += 1;
            return Ok(());
        }
        link.to_peer.push(frame);
        link.send_ok += 1;
        Ok(())
    }
}

impl InMemoryPeer {
    /// Drains and returns all frames the local side has sent so far.
    pub fn take_outbound(&self) -> Vec<OutboundFrame> {
        std::mem::take(&mut lock(&self.link).to_peer)
    }

    /// Queues a generic message for the local side.
    pub fn push_message(&self, bytes: Vec<u8>) {
        lock(&self.link)
            .to_local
            .push_back(TransportEvent::Message(bytes));
    }

    /// Queues a user-info envelope for the local side.
    pub fn push_user_info(&self, bytes: Vec<u8>) {
        lock(&self.link)
            .to_local
            .push_back(TransportEvent::UserInfo(bytes));
    }

    /// Flips reachability and queues the matching event when it changes.
    pub fn set_reachable(&self, reachable: bool) {
        let mut link = lock(&self.link);
        if link.reachable != reachable {
            link.reachable = reachable;
            link.reachability_changes += 1;
            link.to_local
                .push_back(TransportEvent::Reachability(reachable));
        }
    }

    /// Enables/disables outbound sending on the local side.
    pub fn set_allow_send(&self, allow_send: bool) {
        lock(&self.link).allow_send = allow_send;
    }

    /// If enabled, local sends are accepted then dropped (loss simulation).
    pub fn set_drop_outbound(&self, drop_outbound: bool) {
        lock(&self.link).drop_outbound = drop_outbound;
    }
}

impl TransportAdapter for InMemoryAdapter {
    type Error = &'static str;

    fn send_standard(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.push_outbound(OutboundFrame::Standard(bytes.to_vec()))
    }

    fn send_complication(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.push_outbound(OutboundFrame::Complication(bytes.to_vec()))
    }

    fn send_message(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.push_outbound(OutboundFrame::Message(bytes.to_vec()))
    }

    fn recv(&mut self) -> Option<TransportEvent> {
        let mut link = lock(&self.link);
        let event = link.to_local.pop_front();
        if event.is_some() {
            link.recv_ok += 1;
        }
        event
    }

    fn can_send(&self) -> bool {
        let link = lock(&self.link);
        link.allow_send && link.reachable
    }

    fn health_snapshot(&self) -> TransportHealthSnapshot {
        let link = lock(&self.link);
        TransportHealthSnapshot {
            outbound_queued: link.to_peer.len() as u64,
            outbound_send_ok: link.send_ok,
            outbound_send_err: link.send_err,
            inbound_received: link.recv_ok,
            reachability_changes: link.reachability_changes,
            last_error: link.last_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{in_memory_pair, OutboundFrame, TransportAdapter, TransportEvent};

    #[test]
    fn in_memory_pair_carries_frames_both_ways() {
        let (mut adapter, peer) = in_memory_pair();
        adapter.send_standard(&[1, 2]).expect("send should succeed");
        adapter.send_complication(&[3]).expect("send should succeed");
        adapter.send_message(&[4]).expect("send should succeed");

        assert_eq!(
            peer.take_outbound(),
            vec![
                OutboundFrame::Standard(vec![1, 2]),
                OutboundFrame::Complication(vec![3]),
                OutboundFrame::Message(vec![4]),
            ]
        );
        assert!(peer.take_outbound().is_empty());

        peer.push_user_info(vec![9]);
        peer.push_message(vec![8]);
        assert_eq!(adapter.recv(), Some(TransportEvent::UserInfo(vec![9])));
        assert_eq!(adapter.recv(), Some(TransportEvent::Message(vec![8])));
        assert_eq!(adapter.recv(), None);

        let health = adapter.health_snapshot();
        assert_eq!(health.outbound_send_ok, 3);
        assert_eq!(health.inbound_received, 2);
    }

    #[test]
    fn reachability_changes_emit_events_once() {
        let (mut adapter, peer) = in_memory_pair();
        assert!(adapter.can_send());
        peer.set_reachable(false);
        peer.set_reachable(false);
        assert!(!adapter.can_send());
        assert_eq!(adapter.recv(), Some(TransportEvent::Reachability(false)));
        assert_eq!(adapter.recv(), None);
        assert_eq!(adapter.health_snapshot().reachability_changes, 1);
    }

    #[test]
    fn disabled_send_fails_and_lossy_send_is_silent() {
        let (mut adapter, peer) = in_memory_pair();
        peer.set_allow_send(false);
        let err = adapter
            .send_standard(&[1])
            .expect_err("disabled send should fail");
        assert_eq!(err, "send disabled");
        assert_eq!(
            adapter.health_snapshot().last_error.as_deref(),
            Some("send disabled")
        );

        peer.set_allow_send(true);
        peer.set_drop_outbound(true);
        adapter
            .send_message(&[1])
            .expect("best-effort drop should still return ok");
        assert!(peer.take_outbound().is_empty());
    }

    #[test]
    fn frame_bytes_accessor() {
        assert_eq!(OutboundFrame::Complication(vec![7]).bytes(), &[7]);
    }
}
