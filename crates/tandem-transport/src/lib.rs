//! Transport abstractions for Tandem.
//!
//! The node/runtime only depends on the byte-oriented adapter trait defined
//! in this crate. Wire framing lives in `tandem-codec`.

pub mod adapter;
