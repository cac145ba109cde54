//! Tandem wire codec primitives.
//!
//! Defines the transfer envelope schema, generic message framing, and the
//! acknowledgment message shape, with CBOR encode/decode helpers.

pub mod ack;
pub mod envelope;
pub mod error;
