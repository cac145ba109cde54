//! Core Tandem primitives shared across crates.
//!
//! Includes the user-info record model, transfer identity/class types,
//! reachability state, and base errors.

pub mod error;
pub mod record;
pub mod types;

pub use record::{UserInfoRecord, UserInfoValue};
pub use types::{ReachabilityState, TransferClass, TransferId};
