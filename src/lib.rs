//! Lead Chat - session-scoped chat widget engine
//!
//! Sequences a visitor's messages through a remote reply service one
//! exchange at a time, with lead capture gating the first exchange.

pub mod config;
pub mod conversation;
pub mod db;
pub mod reply;
pub mod runtime;
pub mod session;
pub mod state_machine;
