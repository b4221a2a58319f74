//! Session transaction ledger

use super::{BridgeTransaction, TransactionStatus};
use crate::error::StatusUpdateError;

use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

/// How an external chain watcher identifies a transaction
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionSelector {
    Id(Uuid),
    TxHash(String),
}

impl std::fmt::Display for TransactionSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionSelector::Id(id) => write!(f, "{}", id),
            TransactionSelector::TxHash(hash) => f.write_str(hash),
        }
    }
}

/// Ordered list of bridge transactions, oldest first
#[derive(Debug, Default)]
pub struct SettlementLedger {
    transactions: Vec<BridgeTransaction>,
}

impl SettlementLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new pending transaction
    pub fn record(&mut self, tx: BridgeTransaction) -> Uuid {
        debug_assert_eq!(tx.status, TransactionStatus::Pending);
        info!(
            "Recorded {} transaction {} for quote {} ({})",
            tx.kind, tx.id, tx.quote_id, tx.amount
        );
        let id = tx.id;
        self.transactions.push(tx);
        id
    }

    /// Move a pending transaction to a terminal status.
    ///
    /// Terminal records are left untouched and reported as `AlreadyFinalized`.
    pub fn finalize(
        &mut self,
        selector: &TransactionSelector,
        status: TransactionStatus,
        tx_hash: Option<String>,
    ) -> Result<BridgeTransaction, StatusUpdateError> {
        if !status.is_terminal() {
            return Err(StatusUpdateError::NotTerminal(status));
        }

        let tx = self
            .find_mut(selector)
            .ok_or_else(|| StatusUpdateError::TransactionNotFound(selector.to_string()))?;

        if !tx.status.can_transition_to(status) {
            debug!(
                "Ignoring {} update for transaction {} already {}",
                status, tx.id, tx.status
            );
            return Err(StatusUpdateError::AlreadyFinalized {
                id: tx.id,
                status: tx.status,
            });
        }

        tx.status = status;
        if tx_hash.is_some() {
            tx.tx_hash = tx_hash;
        }
        info!("Transaction {} finalized as {}", tx.id, status);
        Ok(tx.clone())
    }

    pub fn get(&self, selector: &TransactionSelector) -> Option<&BridgeTransaction> {
        self.transactions.iter().find(|tx| matches_selector(tx, selector))
    }

    fn find_mut(&mut self, selector: &TransactionSelector) -> Option<&mut BridgeTransaction> {
        self.transactions
            .iter_mut()
            .find(|tx| matches_selector(tx, selector))
    }

    pub fn transactions(&self) -> &[BridgeTransaction] {
        &self.transactions
    }

    pub fn pending(&self) -> Vec<BridgeTransaction> {
        self.transactions
            .iter()
            .filter(|tx| tx.status == TransactionStatus::Pending)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

fn matches_selector(tx: &BridgeTransaction, selector: &TransactionSelector) -> bool {
    match selector {
        TransactionSelector::Id(id) => tx.id == *id,
        TransactionSelector::TxHash(hash) => tx
            .tx_hash
            .as_deref()
            .map_or(false, |h| h.eq_ignore_ascii_case(hash)),
    }
}
