//! Peg Orchestrator - two-way peg bridge orchestration
//!
//! Negotiates conversions between a source chain's base asset and its wrapped
//! form on a target chain, through a set of competing liquidity providers.

pub mod api;
pub mod chain;
pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod orchestrator;
pub mod provider;
pub mod quote;
pub mod settlement;

#[cfg(test)]
mod testing;

pub use error::{BridgeError, BridgeResult};
pub use orchestrator::{BridgeOrchestrator, BridgeView};
