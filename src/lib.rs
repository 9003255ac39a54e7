//! Rollout Stream - Session transcript discovery, tailing, and messaging.

pub mod config;
pub mod events;
pub mod rpc;
pub mod session;
pub mod tail;
