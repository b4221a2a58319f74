//! Target chain access
//!
//! The orchestrator only touches the chain at one point: submitting the
//! value-bearing peg-out deposit. That call goes through a [`ChainGateway`],
//! which owns the wallet and RPC connection and keeps no orchestrator state.

pub mod gateway;

pub use gateway::EvmChainGateway;

use crate::error::GatewayError;
use crate::quote::{QuoteId, QuoteSignature};

use async_trait::async_trait;

/// A peg-out deposit ready for submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositCall {
    pub quote_id: QuoteId,
    /// `amount + commission`, in the target chain's smallest unit
    pub value: u128,
    /// Provider authorization passed through to the bridge contract
    pub signature: QuoteSignature,
    /// Source chain address that receives the released funds
    pub destination: String,
}

/// Wallet signing and RPC submission.
///
/// Implementations are not assumed to be safe for concurrent use on the
/// same account; callers serialize submissions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Sign and broadcast the deposit, returning the transaction hash
    async fn submit_deposit(&self, call: DepositCall) -> Result<String, GatewayError>;
}

/// Map a raw RPC or wallet error message onto a gateway error
pub fn classify_submission_error(message: String) -> GatewayError {
    let lower = message.to_lowercase();
    if lower.contains("insufficient funds") || lower.contains("insufficient balance") {
        GatewayError::InsufficientFunds(message)
    } else if lower.contains("user rejected") || lower.contains("user denied") {
        GatewayError::SigningRejected(message)
    } else {
        GatewayError::Rpc(message)
    }
}
