//! Peg orchestration for one user session
//!
//! The orchestrator:
//! 1. Loads the provider directory and tracks the selected provider
//! 2. Negotiates quotes for either direction with that provider
//! 3. Binds accepted quotes exactly once
//! 4. Submits peg-out deposits through the chain gateway
//! 5. Records every on-chain operation until it is finalized

pub mod engine;

#[cfg(test)]
mod tests;

pub use engine::{BridgeOrchestrator, BridgeView};
