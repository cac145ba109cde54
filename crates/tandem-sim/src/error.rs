use tandem_core::UserInfoRecord;
use tandem_node::error::TransferError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error("{what}: expected {expected:?}, got {got:?}")]
    Mismatch {
        what: &'static str,
        expected: Vec<UserInfoRecord>,
        got: Vec<UserInfoRecord>,
    },
    #[error("unexpected event while waiting for {0}")]
    UnexpectedEvent(&'static str),
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
}
