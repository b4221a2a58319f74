//! Orchestrator events for observers
//!
//! Every state change the orchestrator applies is also published on a
//! broadcast channel so UIs and chain watchers can react without polling.

use crate::provider::ProviderId;
use crate::quote::{Direction, QuoteId};
use crate::settlement::TransactionStatus;

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum BridgeEvent {
    /// Provider set replaced
    #[serde(rename_all = "camelCase")]
    ProvidersLoaded { count: usize },

    /// Selected provider changed; all un-accepted quotes were dropped
    #[serde(rename_all = "camelCase")]
    ProviderSelected { provider_id: ProviderId },

    /// A provider reload dropped the selected provider and its quotes
    #[serde(rename_all = "camelCase")]
    SelectionCleared { provider_id: ProviderId },

    /// A quote batch landed in the cache
    #[serde(rename_all = "camelCase")]
    QuotesReceived {
        provider_id: ProviderId,
        direction: Direction,
        count: usize,
    },

    /// A quote batch was thrown away because it was no longer current
    #[serde(rename_all = "camelCase")]
    QuotesDiscarded {
        provider_id: ProviderId,
        direction: Direction,
        count: usize,
    },

    #[serde(rename_all = "camelCase")]
    QuoteAccepted {
        provider_id: ProviderId,
        direction: Direction,
        quote_id: QuoteId,
    },

    #[serde(rename_all = "camelCase")]
    DepositSubmitted {
        quote_id: QuoteId,
        transaction_id: Uuid,
        tx_hash: String,
    },

    #[serde(rename_all = "camelCase")]
    TransactionFinalized {
        transaction_id: Uuid,
        direction: Direction,
        status: TransactionStatus,
    },
}

impl BridgeEvent {
    /// Get event name for logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            BridgeEvent::ProvidersLoaded { .. } => "providers_loaded",
            BridgeEvent::ProviderSelected { .. } => "provider_selected",
            BridgeEvent::SelectionCleared { .. } => "selection_cleared",
            BridgeEvent::QuotesReceived { .. } => "quotes_received",
            BridgeEvent::QuotesDiscarded { .. } => "quotes_discarded",
            BridgeEvent::QuoteAccepted { .. } => "quote_accepted",
            BridgeEvent::DepositSubmitted { .. } => "deposit_submitted",
            BridgeEvent::TransactionFinalized { .. } => "transaction_finalized",
        }
    }

    /// Whether the event changes the transaction list
    pub fn touches_transactions(&self) -> bool {
        matches!(
            self,
            BridgeEvent::QuoteAccepted {
                direction: Direction::PegIn,
                ..
            } | BridgeEvent::DepositSubmitted { .. }
                | BridgeEvent::TransactionFinalized { .. }
        )
    }
}
