//! Simulated paired device and scenario runner for the transfer subsystem.

pub mod device;
pub mod error;
pub mod scenarios;

pub use device::{DeviceBehavior, PairedDevice};
pub use error::SimError;
pub use scenarios::{Scenario, SimHarness};
