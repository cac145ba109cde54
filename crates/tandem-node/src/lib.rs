//! Tandem node-layer primitives and runtime.
//!
//! This crate wires together the outbound transfer queue, acknowledgment
//! correlation, the missed-item queue, and the event bus on top of a
//! pluggable transport.

pub mod ack;
pub mod config;
pub mod error;
pub mod events;
pub mod missed;
pub mod outbound;
pub mod runtime;
pub mod service;
