use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Opaque identity assigned to each outbound transfer at submit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferId(pub Uuid);

impl TransferId {
    /// Generates a fresh random identity.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TransferId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| CoreError::InvalidTransferId(s.to_string()))
    }
}

/// Delivery class of a user-info transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferClass {
    /// Unbounded FIFO bulk transfer.
    Standard,
    /// Bounded backlog for the live complication value.
    Complication,
}

impl TransferClass {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferClass::Standard => "standard",
            TransferClass::Complication => "complication",
        }
    }
}

impl fmt::Display for TransferClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferClass {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(TransferClass::Standard),
            "complication" => Ok(TransferClass::Complication),
            other => Err(CoreError::InvalidTransferClass(other.to_string())),
        }
    }
}

/// Whether the peer currently has an active session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReachabilityState {
    Reachable,
    #[default]
    Unreachable,
}

impl ReachabilityState {
    pub fn is_reachable(self) -> bool {
        matches!(self, ReachabilityState::Reachable)
    }
}

impl From<bool> for ReachabilityState {
    fn from(reachable: bool) -> Self {
        if reachable {
            ReachabilityState::Reachable
        } else {
            ReachabilityState::Unreachable
        }
    }
}
