use std::time::Instant;

use tandem_codec::envelope::{
    decode_envelope_cbor, decode_message_cbor, encode_envelope_cbor, encode_message_cbor,
    TransferEnvelopeV1,
};
use tandem_core::{ReachabilityState, TransferClass, TransferId, UserInfoRecord};
use tandem_transport::adapter::{TransportAdapter, TransportEvent, TransportHealthSnapshot};
use tracing::{debug, info, warn};

use crate::ack::{correlate_inbound_message, MessageDisposition};
use crate::config::{MissedItemPolicy, SubsystemConfig};
use crate::error::{HandlerError, TransferError};
use crate::events::{Event, EventBus, EventName, EventWaiter, SubscriptionId};
use crate::missed::MissedItemQueue;
use crate::outbound::{OutboundQueue, TransferHandle, TransferState};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SubsystemStats {
    /// Transfers accepted by `submit`.
    pub submitted: usize,
    /// Transfers resolved by a matching acknowledgment.
    pub acknowledged: usize,
    /// Acknowledgments matched by the oldest-pending fallback.
    pub fallback_acks: usize,
    /// Acknowledgments that matched nothing pending.
    pub stale_acks: usize,
    /// Acknowledgments without a usable user-info payload.
    pub invalid_acks: usize,
    /// Transfers that reached their deadline.
    pub timed_out: usize,
    /// Complication transfers evicted from the backlog.
    pub superseded: usize,
    /// Transfers the adapter refused.
    pub send_failed: usize,
    /// Generic messages handed to the adapter.
    pub messages_sent: usize,
    /// Generic inbound messages decoded.
    pub inbound_messages: usize,
    /// Inbound user-info records decoded.
    pub inbound_user_info: usize,
    /// Inbound frames that failed to decode.
    pub decode_errors: usize,
    /// Subscriber handlers that failed or panicked.
    pub handler_errors: usize,
    /// Missed items dropped by the queue bound.
    pub missed_dropped: usize,
}

/// Single-owner facade over the transfer subsystem.
///
/// Every state transition goes through `&mut self`; callers that receive
/// transport events on other threads marshal them in through
/// [`crate::runtime`].
pub struct TransferService<A: TransportAdapter> {
    config: SubsystemConfig,
    transport: Option<A>,
    outbound: OutboundQueue,
    missed: MissedItemQueue,
    bus: EventBus,
    reachability: ReachabilityState,
    stats: SubsystemStats,
}

impl<A: TransportAdapter> TransferService<A> {
    /// Creates a service with no transport attached.
    pub fn new(config: SubsystemConfig) -> Self {
        let config = config.normalized();
        Self {
            outbound: OutboundQueue::new(&config),
            missed: MissedItemQueue::with_capacity(config.missed_item_capacity),
            bus: EventBus::default(),
            transport: None,
            reachability: ReachabilityState::Unreachable,
            stats: SubsystemStats::default(),
            config,
        }
    }

    pub fn with_transport(config: SubsystemConfig, transport: A) -> Self {
        let mut service = Self::new(config);
        service.attach_transport(transport);
        service
    }

    /// Attaches a transport, returning the previous one. Reachability is
    /// seeded from the adapter's `can_send`.
    pub fn attach_transport(&mut self, transport: A) -> Option<A> {
        let reachable = ReachabilityState::from(transport.can_send());
        let previous = self.transport.replace(transport);
        self.set_reachability(reachable);
        previous
    }

    /// Detaches the transport; later submits fail with `TransportUnavailable`.
    pub fn detach_transport(&mut self) -> Option<A> {
        let previous = self.transport.take();
        self.set_reachability(ReachabilityState::Unreachable);
        previous
    }

    pub fn config(&self) -> &SubsystemConfig {
        &self.config
    }

    pub fn reachability(&self) -> ReachabilityState {
        self.reachability
    }

    pub fn stats(&self) -> SubsystemStats {
        self.stats
    }

    pub fn transport_health(&self) -> Option<TransportHealthSnapshot> {
        self.transport.as_ref().map(TransportAdapter::health_snapshot)
    }

    /// Pending transfers across both classes.
    pub fn pending_transfers(&self) -> usize {
        self.outbound.len()
    }

    /// Submits a user-info transfer and hands its envelope to the transport.
    ///
    /// Returning `Ok` is the local hand-off signal; the handle resolves when
    /// the peer acknowledges, the deadline passes, or the transfer is
    /// superseded.
    pub fn submit(
        &mut self,
        payload: UserInfoRecord,
        class: TransferClass,
        now: Instant,
    ) -> Result<TransferHandle, TransferError> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(TransferError::TransportUnavailable);
        };

        let id = TransferId::generate();
        let bytes = encode_envelope_cbor(&TransferEnvelopeV1::new(id, class, payload.clone()))?;
        if !self.reachability.is_reachable() {
            debug!(transfer = %id, "submitting while peer is unreachable");
        }

        let admission = self.outbound.admit(id, class, payload, now);
        self.stats.submitted += 1;
        self.stats.superseded += admission.superseded.len();

        let sent = match class {
            TransferClass::Standard => transport.send_standard(&bytes),
            TransferClass::Complication => transport.send_complication(&bytes),
        };
        if let Err(err) = sent {
            warn!(transfer = %id, %class, error = %err, "transport refused transfer");
            if self.outbound.on_send_failed(id, err.to_string()) {
                self.stats.send_failed += 1;
            }
        }

        Ok(admission.handle)
    }

    /// Sends a generic live message. Requires a reachable peer.
    pub fn send_message(&mut self, message: &UserInfoRecord) -> Result<(), TransferError> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(TransferError::TransportUnavailable);
        };
        if !self.reachability.is_reachable() {
            return Err(TransferError::NotReachable);
        }
        let bytes = encode_message_cbor(message)?;
        transport
            .send_message(&bytes)
            .map_err(|err| TransferError::MessageSendFailed(err.to_string()))?;
        self.stats.messages_sent += 1;
        Ok(())
    }

    /// Drains every event currently queued by the transport.
    pub fn pump_transport(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.transport.as_mut().and_then(TransportAdapter::recv) {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Applies one inbound transport event.
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(bytes) => match decode_message_cbor(&bytes) {
                Ok(message) => {
                    self.on_inbound_message(message);
                }
                Err(err) => {
                    self.stats.decode_errors += 1;
                    warn!(error = %err, "dropping undecodable inbound message");
                }
            },
            TransportEvent::UserInfo(bytes) => match decode_envelope_cbor(&bytes) {
                Ok(envelope) => self.on_user_info_received(envelope.user_info),
                Err(err) => {
                    self.stats.decode_errors += 1;
                    warn!(error = %err, "dropping undecodable inbound user-info");
                }
            },
            TransportEvent::Reachability(reachable) => {
                self.set_reachability(ReachabilityState::from(reachable));
            }
        }
    }

    /// Routes a decoded inbound message through acknowledgment correlation.
    pub fn on_inbound_message(&mut self, message: UserInfoRecord) -> MessageDisposition {
        self.stats.inbound_messages += 1;
        let disposition = correlate_inbound_message(&mut self.outbound, message);
        match &disposition {
            MessageDisposition::Acknowledged {
                state, by_fallback, ..
            } => {
                if *state == TransferState::Acknowledged {
                    self.stats.acknowledged += 1;
                } else {
                    self.stats.invalid_acks += 1;
                }
                if *by_fallback {
                    self.stats.fallback_acks += 1;
                }
            }
            MessageDisposition::Stale(_) => self.stats.stale_acks += 1,
            MessageDisposition::PassThrough(message) => {
                let report = self.bus.publish(&Event::Message(message.clone()));
                self.stats.handler_errors += report.failed;
            }
        }
        disposition
    }

    /// Delivers an inbound user-info record to live subscribers and queues
    /// it per the missed-item policy.
    pub fn on_user_info_received(&mut self, record: UserInfoRecord) {
        self.stats.inbound_user_info += 1;
        let report = self.bus.publish(&Event::UserInfo(vec![record.clone()]));
        self.stats.handler_errors += report.failed;

        let consumed = report.delivered > 0;
        if !consumed || self.config.missed_item_policy == MissedItemPolicy::AlwaysRetain {
            if self.missed.enqueue(record).is_some() {
                self.stats.missed_dropped += 1;
            }
        }
    }

    /// Applies a reachability transition and publishes it when it changes.
    pub fn set_reachability(&mut self, state: ReachabilityState) {
        if self.reachability == state {
            return;
        }
        info!(reachable = state.is_reachable(), "peer reachability changed");
        self.reachability = state;
        let report = self.bus.publish(&Event::Reachability(state));
        self.stats.handler_errors += report.failed;
    }

    /// Times out a single pending transfer.
    pub fn on_timeout(&mut self, id: TransferId) -> bool {
        let timed_out = self.outbound.on_timeout(id);
        if timed_out {
            self.stats.timed_out += 1;
        }
        timed_out
    }

    /// Times out every transfer whose deadline is at or before `now`.
    pub fn expire_due(&mut self, now: Instant) -> usize {
        let expired = self.outbound.expire_due(now).len();
        self.stats.timed_out += expired;
        expired
    }

    /// Earliest pending acknowledgment deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.outbound.next_deadline()
    }

    /// Returns and removes every missed user-info record, oldest first.
    pub fn drain_missed(&mut self) -> Vec<UserInfoRecord> {
        self.missed.drain_all()
    }

    pub fn missed_len(&self) -> usize {
        self.missed.len()
    }

    pub fn subscribe<F>(&mut self, name: EventName, handler: F) -> SubscriptionId
    where
        F: FnMut(&Event) -> Result<(), HandlerError> + Send + 'static,
    {
        let id = self.bus.subscribe(name, handler);
        self.flush_missed_to(name, id);
        id
    }

    pub fn subscribe_once(&mut self, name: EventName) -> EventWaiter {
        let waiter = self.bus.subscribe_once(name);
        self.flush_missed_to(name, waiter.id());
        waiter
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Hands the queued backlog to a new user-info subscriber when
    /// `flush_missed_on_subscribe` is set. A refused batch is re-queued.
    fn flush_missed_to(&mut self, name: EventName, id: SubscriptionId) {
        if name != EventName::UserInfo
            || !self.config.flush_missed_on_subscribe
            || self.missed.is_empty()
        {
            return;
        }
        let batch = self.missed.drain_all();
        let event = Event::UserInfo(batch);
        if let Some(Err(_)) = self.bus.deliver_to(id, &event) {
            self.stats.handler_errors += 1;
            if let Event::UserInfo(batch) = event {
                for record in batch {
                    if self.missed.enqueue(record).is_some() {
                        self.stats.missed_dropped += 1;
                    }
                }
            }
        }
    }

    /// Resolves every pending transfer with `Closed`.
    pub fn shutdown(&mut self) -> usize {
        let closed = self.outbound.close_all();
        if closed > 0 {
            info!(closed, "closed pending transfers on shutdown");
        }
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::TransferService;
    use crate::config::{ComplicationPolicy, MissedItemPolicy, SubsystemConfig, MAX_ACK_TIMEOUT};
    use crate::error::{HandlerError, TransferError};
    use crate::events::{Event, EventName};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};
    use tandem_codec::ack::AckMessage;
    use tandem_codec::envelope::{
        decode_envelope_cbor, encode_envelope_cbor, encode_message_cbor, TransferEnvelopeV1,
    };
    use tandem_core::{ReachabilityState, TransferClass, TransferId, UserInfoRecord};
    use tandem_transport::adapter::{
        in_memory_pair, InMemoryAdapter, InMemoryPeer, OutboundFrame, TransportEvent,
    };

    fn bob() -> UserInfoRecord {
        UserInfoRecord::new().with("uid", "xyz").with("name", "bob")
    }

    fn mike() -> UserInfoRecord {
        UserInfoRecord::new()
            .with("uid", "abc")
            .with("name", "mike")
            .with("email", "mike@example.com")
    }

    fn service_with(config: SubsystemConfig) -> (TransferService<InMemoryAdapter>, InMemoryPeer) {
        let (adapter, peer) = in_memory_pair();
        (TransferService::with_transport(config, adapter), peer)
    }

    fn user_info_bytes(record: UserInfoRecord) -> Vec<u8> {
        encode_envelope_cbor(&TransferEnvelopeV1::new(
            TransferId::generate(),
            TransferClass::Standard,
            record,
        ))
        .expect("envelope should encode")
    }

    fn echo_ack(frame: &OutboundFrame, echo_identity: bool) -> Vec<u8> {
        let envelope = decode_envelope_cbor(frame.bytes()).expect("outbound is an envelope");
        let ack = AckMessage {
            id: echo_identity.then_some(envelope.id),
            class: echo_identity.then_some(envelope.class),
            user_info: Some(envelope.user_info),
        };
        encode_message_cbor(&ack.to_message()).expect("ack should encode")
    }

    #[test]
    fn submit_without_transport_fails_immediately() {
        let mut service: TransferService<InMemoryAdapter> =
            TransferService::new(SubsystemConfig::default());
        let err = service
            .submit(bob(), TransferClass::Standard, Instant::now())
            .expect_err("no transport attached");
        assert_eq!(err, TransferError::TransportUnavailable);
        assert_eq!(service.stats().submitted, 0);
    }

    #[test]
    fn acknowledged_standard_transfer_round_trips_payload() {
        let (mut service, peer) = service_with(SubsystemConfig::default());
        let mut handle = service
            .submit(bob(), TransferClass::Standard, Instant::now())
            .expect("submit should succeed");

        let frames = peer.take_outbound();
        assert_eq!(frames.len(), 1);
        assert!(matches!(frames[0], OutboundFrame::Standard(_)));
        let envelope = decode_envelope_cbor(frames[0].bytes()).expect("envelope");
        assert_eq!(envelope.id, handle.id());
        assert_eq!(envelope.user_info, bob());

        peer.push_message(echo_ack(&frames[0], true));
        assert_eq!(service.pump_transport(), 1);
        assert_eq!(handle.try_outcome(), Some(Ok(bob())));
        assert_eq!(service.stats().acknowledged, 1);
        assert_eq!(service.pending_transfers(), 0);
    }

    #[test]
    fn complication_uses_its_own_lane_and_falls_back_without_identity() {
        let (mut service, peer) = service_with(SubsystemConfig::default());
        let mut handle = service
            .submit(bob(), TransferClass::Complication, Instant::now())
            .expect("submit should succeed");
        let frames = peer.take_outbound();
        assert!(matches!(frames[0], OutboundFrame::Complication(_)));

        peer.push_message(echo_ack(&frames[0], false));
        service.pump_transport();
        assert_eq!(handle.try_outcome(), Some(Ok(bob())));
        assert_eq!(service.stats().fallback_acks, 1);
    }

    #[test]
    fn complication_backlog_overflow_supersedes_oldest() {
        let (mut service, _peer) = service_with(SubsystemConfig {
            complication_capacity: 2,
            complication_policy: ComplicationPolicy::DropOldest,
            ..SubsystemConfig::default()
        });
        let now = Instant::now();
        let mut first = service
            .submit(bob(), TransferClass::Complication, now)
            .expect("submit");
        let mut second = service
            .submit(bob(), TransferClass::Complication, now)
            .expect("submit");
        let third = service
            .submit(mike(), TransferClass::Complication, now)
            .expect("submit");

        assert_eq!(
            first.try_outcome(),
            Some(Err(TransferError::Superseded {
                id: first.id(),
                by: third.id()
            }))
        );
        assert!(second.try_outcome().is_none());
        assert_eq!(service.stats().superseded, 1);
    }

    #[test]
    fn unacknowledged_transfer_times_out_at_deadline() {
        let (mut service, _peer) = service_with(SubsystemConfig {
            ack_timeout: Duration::from_secs(3),
            ..SubsystemConfig::default()
        });
        let start = Instant::now();
        let mut handle = service
            .submit(bob(), TransferClass::Standard, start)
            .expect("submit");

        assert_eq!(service.expire_due(start + Duration::from_millis(2_999)), 0);
        assert!(handle.try_outcome().is_none());
        assert_eq!(service.expire_due(start + Duration::from_secs(3)), 1);
        assert_eq!(
            handle.try_outcome(),
            Some(Err(TransferError::TimedOut {
                id: handle.id(),
                after: Duration::from_secs(3)
            }))
        );
        assert_eq!(service.stats().timed_out, 1);
    }

    #[test]
    fn refused_send_resolves_failed() {
        let (mut service, peer) = service_with(SubsystemConfig::default());
        peer.set_allow_send(false);
        let mut handle = service
            .submit(bob(), TransferClass::Standard, Instant::now())
            .expect("hand-off is still accepted");
        assert!(matches!(
            handle.try_outcome(),
            Some(Err(TransferError::SendFailed { .. }))
        ));
        assert_eq!(service.stats().send_failed, 1);
    }

    #[test]
    fn missed_items_drain_in_arrival_order_once() {
        let (mut service, peer) = service_with(SubsystemConfig::default());
        peer.push_user_info(user_info_bytes(bob()));
        peer.push_user_info(user_info_bytes(mike()));
        service.pump_transport();

        assert_eq!(service.drain_missed(), vec![bob(), mike()]);
        assert!(service.drain_missed().is_empty());
    }

    #[test]
    fn live_subscriber_consumes_item_under_default_policy() {
        let (mut service, peer) = service_with(SubsystemConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        service.subscribe(EventName::UserInfo, move |event| {
            if let Event::UserInfo(records) = event {
                sink.lock().expect("lock").extend(records.iter().cloned());
            }
            Ok(())
        });

        peer.push_user_info(user_info_bytes(bob()));
        service.pump_transport();
        assert_eq!(*seen.lock().expect("lock"), vec![bob()]);
        assert!(service.drain_missed().is_empty());
    }

    #[test]
    fn always_retain_policy_queues_delivered_items_too() {
        let (mut service, peer) = service_with(SubsystemConfig {
            missed_item_policy: MissedItemPolicy::AlwaysRetain,
            ..SubsystemConfig::default()
        });
        let waiter_count = Arc::new(Mutex::new(0_usize));
        let counter = Arc::clone(&waiter_count);
        service.subscribe(EventName::UserInfo, move |_| {
            *counter.lock().expect("lock") += 1;
            Ok(())
        });

        peer.push_user_info(user_info_bytes(bob()));
        service.pump_transport();
        assert_eq!(*waiter_count.lock().expect("lock"), 1);
        assert_eq!(service.drain_missed(), vec![bob()]);
    }

    #[test]
    fn failing_subscriber_does_not_consume_item() {
        let (mut service, peer) = service_with(SubsystemConfig::default());
        service.subscribe(EventName::UserInfo, |_| Err(HandlerError::failed("busy")));
        peer.push_user_info(user_info_bytes(bob()));
        service.pump_transport();

        assert_eq!(service.stats().handler_errors, 1);
        assert_eq!(service.drain_missed(), vec![bob()]);
    }

    #[test]
    fn unsubscribed_handler_no_longer_consumes() {
        let (mut service, peer) = service_with(SubsystemConfig::default());
        let id = service.subscribe(EventName::UserInfo, |_| Ok(()));
        assert!(service.unsubscribe(id));
        peer.push_user_info(user_info_bytes(bob()));
        service.pump_transport();
        assert_eq!(service.drain_missed(), vec![bob()]);
    }

    #[test]
    fn flush_on_subscribe_hands_backlog_to_new_waiter() {
        let (mut service, peer) = service_with(SubsystemConfig {
            flush_missed_on_subscribe: true,
            ..SubsystemConfig::default()
        });
        peer.push_user_info(user_info_bytes(bob()));
        peer.push_user_info(user_info_bytes(mike()));
        service.pump_transport();

        let mut waiter = service.subscribe_once(EventName::UserInfo);
        let event = waiter
            .try_event()
            .expect("backlog should be delivered immediately")
            .expect("event");
        assert_eq!(event, Event::UserInfo(vec![bob(), mike()]));
        assert!(service.drain_missed().is_empty());
    }

    #[test]
    fn refused_flush_puts_backlog_back_in_order() {
        let (mut service, peer) = service_with(SubsystemConfig {
            flush_missed_on_subscribe: true,
            ..SubsystemConfig::default()
        });
        peer.push_user_info(user_info_bytes(bob()));
        peer.push_user_info(user_info_bytes(mike()));
        service.pump_transport();

        let calls = Arc::new(Mutex::new(0_usize));
        let counter = Arc::clone(&calls);
        service.subscribe(EventName::UserInfo, move |_| {
            *counter.lock().expect("lock") += 1;
            Err(HandlerError::failed("not ready"))
        });

        assert_eq!(*calls.lock().expect("lock"), 1);
        assert_eq!(service.stats().handler_errors, 1);
        assert_eq!(service.missed_len(), 2);
        assert_eq!(service.drain_missed(), vec![bob(), mike()]);
    }

    #[test]
    fn bounded_missed_queue_keeps_newest_and_counts_drops() {
        let (mut service, peer) = service_with(SubsystemConfig {
            missed_item_capacity: Some(1),
            ..SubsystemConfig::default()
        });
        peer.push_user_info(user_info_bytes(bob()));
        peer.push_user_info(user_info_bytes(mike()));
        service.pump_transport();

        assert_eq!(service.stats().missed_dropped, 1);
        assert_eq!(service.drain_missed(), vec![mike()]);
    }

    #[test]
    fn oversized_ack_timeout_is_capped_at_submit() {
        let (mut service, _peer) = service_with(SubsystemConfig {
            ack_timeout: Duration::MAX,
            ..SubsystemConfig::default()
        });
        let now = Instant::now();
        let mut handle = service
            .submit(bob(), TransferClass::Standard, now)
            .expect("submit should succeed");

        assert!(handle.try_outcome().is_none());
        assert_eq!(service.next_deadline(), Some(now + MAX_ACK_TIMEOUT));
        assert_eq!(service.expire_due(now + Duration::from_secs(3_600)), 0);
    }

    #[test]
    fn generic_messages_reach_message_subscribers() {
        let (mut service, peer) = service_with(SubsystemConfig::default());
        let mut waiter = service.subscribe_once(EventName::Message);
        let msg = UserInfoRecord::new().with("text", "hello").with("test", true);
        peer.push_message(encode_message_cbor(&msg).expect("encode"));
        service.pump_transport();
        assert_eq!(waiter.try_event(), Some(Ok(Event::Message(msg))));
    }

    #[test]
    fn reachability_tracks_transport_and_gates_messages() {
        let (mut service, peer) = service_with(SubsystemConfig::default());
        assert_eq!(service.reachability(), ReachabilityState::Reachable);
        let mut waiter = service.subscribe_once(EventName::Reachability);

        peer.set_reachable(false);
        service.pump_transport();
        assert_eq!(service.reachability(), ReachabilityState::Unreachable);
        assert_eq!(
            waiter.try_event(),
            Some(Ok(Event::Reachability(ReachabilityState::Unreachable)))
        );
        assert_eq!(
            service.send_message(&UserInfoRecord::new().with("text", "hi")),
            Err(TransferError::NotReachable)
        );

        // Transfers are still handed to the transport while unreachable.
        assert!(service
            .submit(bob(), TransferClass::Standard, Instant::now())
            .is_ok());
        assert_eq!(peer.take_outbound().len(), 1);
    }

    #[test]
    fn undecodable_frames_are_counted_and_dropped() {
        let (mut service, _peer) = service_with(SubsystemConfig::default());
        service.handle_event(TransportEvent::UserInfo(vec![0xff, 0x01]));
        service.handle_event(TransportEvent::Message(vec![]));
        assert_eq!(service.stats().decode_errors, 2);
        assert!(service.drain_missed().is_empty());
    }

    #[test]
    fn detach_and_shutdown() {
        let (mut service, _peer) = service_with(SubsystemConfig::default());
        let mut handle = service
            .submit(bob(), TransferClass::Standard, Instant::now())
            .expect("submit");
        assert!(service.detach_transport().is_some());
        assert_eq!(
            service
                .submit(bob(), TransferClass::Standard, Instant::now())
                .expect_err("detached"),
            TransferError::TransportUnavailable
        );
        assert_eq!(service.shutdown(), 1);
        assert_eq!(handle.try_outcome(), Some(Err(TransferError::Closed)));
    }
}
