use std::time::Duration;

use tandem_codec::error::CodecError;
use tandem_core::TransferId;
use thiserror::Error;

/// Outcome delivered through a transfer handle.
pub type TransferOutcome = Result<tandem_core::UserInfoRecord, TransferError>;

/// Errors concerning one submitted transfer or one caller request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransferError {
    /// No transport adapter is attached.
    #[error("transport unavailable")]
    TransportUnavailable,
    /// The peer is not reachable for live messages.
    #[error("peer not reachable")]
    NotReachable,
    /// No acknowledgment arrived before the deadline.
    #[error("transfer {id} timed out after {after:?}")]
    TimedOut { id: TransferId, after: Duration },
    /// Evicted from the complication backlog by a newer transfer.
    #[error("transfer {id} superseded by {by}")]
    Superseded { id: TransferId, by: TransferId },
    /// The adapter refused the hand-off.
    #[error("transfer {id} send failed: {reason}")]
    SendFailed { id: TransferId, reason: String },
    /// The adapter refused a live message.
    #[error("message send failed: {0}")]
    MessageSendFailed(String),
    /// The acknowledgment did not carry a user-info mapping.
    #[error("transfer {id} acknowledged with invalid payload")]
    InvalidAck { id: TransferId },
    /// Outbound framing failed.
    #[error("codec error: {0}")]
    Encode(String),
    /// The subsystem shut down before the request completed.
    #[error("subsystem closed")]
    Closed,
}

impl From<CodecError> for TransferError {
    fn from(err: CodecError) -> Self {
        TransferError::Encode(err.to_string())
    }
}

/// Failure reported by one event-bus subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// The handler returned an error.
    #[error("handler failed: {0}")]
    Failed(String),
    /// The handler panicked; the panic was contained.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn failed(reason: impl Into<String>) -> Self {
        HandlerError::Failed(reason.into())
    }
}
