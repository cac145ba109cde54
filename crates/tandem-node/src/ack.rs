use tandem_codec::ack::AckMessage;
use tandem_core::{TransferId, UserInfoRecord};
use tracing::debug;

use crate::outbound::{OutboundQueue, TransferState};

/// What the correlator did with one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageDisposition {
    /// An acknowledgment resolved a pending transfer.
    Acknowledged {
        id: TransferId,
        state: TransferState,
        /// Matched by "oldest pending" because the peer echoed no identity.
        by_fallback: bool,
    },
    /// An acknowledgment matched nothing pending and was dropped.
    Stale(AckMessage),
    /// Not an acknowledgment; forward unchanged as a generic message.
    PassThrough(UserInfoRecord),
}

/// Routes one inbound message: acknowledgments resolve their transfer,
/// everything else passes through untouched.
///
/// An echoed identity is authoritative. A late acknowledgment for an
/// identity that already resolved is stale and never reassigned to another
/// transfer. Only identity-less acknowledgments use the oldest-pending
/// fallback (restricted to the echoed class when one is present).
pub fn correlate_inbound_message(
    outbound: &mut OutboundQueue,
    message: UserInfoRecord,
) -> MessageDisposition {
    let Some(ack) = AckMessage::parse(&message) else {
        return MessageDisposition::PassThrough(message);
    };

    let target = match ack.id {
        Some(id) if outbound.is_pending(id) => Some((id, false)),
        Some(_) => None,
        None => outbound.oldest_pending(ack.class).map(|id| (id, true)),
    };

    let Some((id, by_fallback)) = target else {
        debug!(transfer = ?ack.id, "acknowledgment matched no pending transfer; dropped");
        return MessageDisposition::Stale(ack);
    };

    match outbound.on_acknowledged(id, ack.user_info.clone()) {
        Some(state) => MessageDisposition::Acknowledged {
            id,
            state,
            by_fallback,
        },
        None => MessageDisposition::Stale(ack),
    }
}
