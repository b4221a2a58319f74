//! Settlement tracking for accepted bridge operations
//!
//! Every operation that reaches the chain (a peg-in binding, or a submitted
//! peg-out deposit) is recorded as a [`BridgeTransaction`]. Its status only
//! ever moves `Pending -> Completed | Failed`.

mod ledger;

pub use ledger::{SettlementLedger, TransactionSelector};

use crate::provider::ProviderId;
use crate::quote::{Direction, QuoteId};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        match self {
            TransactionStatus::Pending => false,
            TransactionStatus::Completed | TransactionStatus::Failed => true,
        }
    }

    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        match (self, next) {
            (TransactionStatus::Pending, TransactionStatus::Completed)
            | (TransactionStatus::Pending, TransactionStatus::Failed) => true,
            (TransactionStatus::Pending, TransactionStatus::Pending)
            | (TransactionStatus::Completed, _)
            | (TransactionStatus::Failed, _) => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A bridge operation as seen by the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeTransaction {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: Direction,
    pub quote_id: QuoteId,
    pub provider_id: ProviderId,
    pub amount: u128,
    pub status: TransactionStatus,
    pub timestamp: DateTime<Utc>,
    pub tx_hash: Option<String>,
    pub deposit_address: Option<String>,
}

impl BridgeTransaction {
    /// Pending peg-in awaiting the user's source-chain deposit
    pub fn peg_in(
        quote_id: QuoteId,
        provider_id: ProviderId,
        amount: u128,
        deposit_address: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: Direction::PegIn,
            quote_id,
            provider_id,
            amount,
            status: TransactionStatus::Pending,
            timestamp: Utc::now(),
            tx_hash: None,
            deposit_address: Some(deposit_address),
        }
    }

    /// Pending peg-out whose deposit call has been submitted
    pub fn peg_out(quote_id: QuoteId, provider_id: ProviderId, amount: u128, tx_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: Direction::PegOut,
            quote_id,
            provider_id,
            amount,
            status: TransactionStatus::Pending,
            timestamp: Utc::now(),
            tx_hash: Some(tx_hash),
            deposit_address: None,
        }
    }
}
