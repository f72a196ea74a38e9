//! # hub-voter-relayer
//! Relay engine that observes cross-chain deposit events on an EVM-style
//! side chain and votes them onto the hub consensus chain.
//!
//! Delivery is exactly-once-effective: the engine observes at-least-once
//! (a crash replays heights since the last persisted checkpoint) and the
//! hub chain's own "done" markers reject duplicate votes.

#![deny(missing_docs)]

pub mod client;
pub mod config;
pub mod event;
pub mod ports;
pub mod service;
pub mod storage;

pub use config::Config;
pub use service::RelayerHandle;
