use tandem_codec::ack::AckMessage;
use tandem_codec::envelope::{
    decode_envelope_cbor, decode_message_cbor, encode_envelope_cbor, encode_message_cbor,
    TransferEnvelopeV1,
};
use tandem_core::{TransferClass, TransferId, UserInfoRecord};
use tandem_transport::adapter::{InMemoryPeer, OutboundFrame};
use tracing::{debug, warn};

/// Message text that asks the paired device for the first canned record.
pub const REQUEST_USER_INFO: &str = "send me some user info";
/// Message text that asks the paired device for the second canned record.
pub const REQUEST_MORE_USER_INFO: &str = "send me some more user info";

pub fn first_canned_record() -> UserInfoRecord {
    UserInfoRecord::new()
        .with("uid", "xyz")
        .with("name", "bob")
        .with("email", "bob@example.com")
}

pub fn second_canned_record() -> UserInfoRecord {
    UserInfoRecord::new()
        .with("uid", "abc")
        .with("name", "mike")
        .with("email", "mike@example.com")
}

/// How the simulated device answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceBehavior {
    /// Reply to each user-info transfer with an acknowledgment message.
    pub acknowledge: bool,
    /// Echo the transfer identity and class in acknowledgments.
    pub echo_identity: bool,
}

impl Default for DeviceBehavior {
    fn default() -> Self {
        Self {
            acknowledge: true,
            echo_identity: true,
        }
    }
}

/// Far side of an in-memory link that behaves like the paired device.
#[derive(Debug)]
pub struct PairedDevice {
    peer: InMemoryPeer,
    behavior: DeviceBehavior,
    received: Vec<UserInfoRecord>,
}

impl PairedDevice {
    pub fn new(peer: InMemoryPeer, behavior: DeviceBehavior) -> Self {
        Self {
            peer,
            behavior,
            received: Vec::new(),
        }
    }

    pub fn peer(&self) -> &InMemoryPeer {
        &self.peer
    }

    /// User-info records received so far, in arrival order.
    pub fn received(&self) -> &[UserInfoRecord] {
        &self.received
    }

    /// Handles every frame sent since the last step. Returns how many frames
    /// were processed.
    pub fn step(&mut self) -> usize {
        let frames = self.peer.take_outbound();
        let count = frames.len();
        for frame in frames {
            match frame {
                OutboundFrame::Standard(bytes) | OutboundFrame::Complication(bytes) => {
                    self.on_user_info(&bytes)
                }
                OutboundFrame::Message(bytes) => self.on_message(&bytes),
            }
        }
        count
    }

    fn on_user_info(&mut self, bytes: &[u8]) {
        let envelope = match decode_envelope_cbor(bytes) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(error = %err, "device dropped undecodable transfer");
                return;
            }
        };
        debug!(transfer = %envelope.id, class = %envelope.class, "device received user info");
        self.received.push(envelope.user_info.clone());
        if !self.behavior.acknowledge {
            return;
        }

        let echo = self.behavior.echo_identity;
        let ack = AckMessage {
            id: echo.then_some(envelope.id),
            class: echo.then_some(envelope.class),
            user_info: Some(envelope.user_info),
        };
        match encode_message_cbor(&ack.to_message()) {
            Ok(bytes) => self.peer.push_message(bytes),
            Err(err) => warn!(error = %err, "device failed to encode acknowledgment"),
        }
    }

    fn on_message(&mut self, bytes: &[u8]) {
        let message = match decode_message_cbor(bytes) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "device dropped undecodable message");
                return;
            }
        };
        let reply = match message.get_str("text") {
            Some(REQUEST_USER_INFO) => first_canned_record(),
            Some(REQUEST_MORE_USER_INFO) => second_canned_record(),
            other => {
                debug!(text = ?other, "device ignored message");
                return;
            }
        };
        let envelope =
            TransferEnvelopeV1::new(TransferId::generate(), TransferClass::Standard, reply);
        match encode_envelope_cbor(&envelope) {
            Ok(bytes) => self.peer.push_user_info(bytes),
            Err(err) => warn!(error = %err, "device failed to encode user info"),
        }
    }
}
