//! Error types for the peg orchestrator
//!
//! Each public operation family has its own error enum so callers can match
//! exhaustively on what can go wrong for that call. [`BridgeError`] wraps all
//! of them for code that does not care which operation failed.

use crate::provider::ProviderId;
use crate::quote::{Direction, QuoteId};
use crate::settlement::TransactionStatus;

use thiserror::Error;
use uuid::Uuid;

/// Transport-level failure talking to a liquidity provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider unreachable: {0}")]
    Unreachable(String),

    #[error("provider rejected request (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// Failure loading the provider set
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("failed to load liquidity providers: {0}")]
    LoadProviders(#[from] ProviderError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("provider {provider_id} is not in the loaded provider set")]
    UnknownProvider { provider_id: ProviderId },

    #[error("provider {provider_id} is inactive")]
    ProviderInactive { provider_id: ProviderId },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("no liquidity provider selected")]
    NoProviderSelected,

    #[error("invalid {direction} amount: must be greater than zero")]
    InvalidAmount { direction: Direction },

    #[error("{direction} request requires a destination address")]
    MissingDestination { direction: Direction },

    #[error("provider {provider_id} unreachable while quoting {direction}: {message}")]
    ProviderUnreachable {
        provider_id: ProviderId,
        direction: Direction,
        message: String,
    },

    #[error("provider {provider_id} rejected {direction} quote request: {message}")]
    ProviderRejected {
        provider_id: ProviderId,
        direction: Direction,
        message: String,
    },

    #[error("provider selection changed from {requested} while quoting {direction}")]
    SelectionChanged {
        requested: ProviderId,
        direction: Direction,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcceptanceError {
    #[error("no liquidity provider selected")]
    NoProviderSelected,

    #[error("quote {quote_id} belongs to provider {quote_provider}, selected provider is {selected}")]
    ProviderMismatch {
        quote_id: QuoteId,
        quote_provider: ProviderId,
        selected: ProviderId,
    },

    #[error("quote {quote_id} is a {actual} quote, cannot accept as {expected}")]
    DirectionMismatch {
        quote_id: QuoteId,
        expected: Direction,
        actual: Direction,
    },

    #[error("quote {quote_id} is not in the current quote set")]
    UnknownQuote { quote_id: QuoteId },

    #[error("quote {quote_id} expired")]
    QuoteExpired { quote_id: QuoteId },

    #[error("quote {quote_id} was already accepted")]
    AlreadyAccepted { quote_id: QuoteId },

    #[error("provider {provider_id} unreachable while accepting quote {quote_id}: {message}")]
    ProviderUnreachable {
        provider_id: ProviderId,
        quote_id: QuoteId,
        message: String,
    },

    #[error("provider {provider_id} rejected quote {quote_id}: {message}")]
    ProviderRejected {
        provider_id: ProviderId,
        quote_id: QuoteId,
        message: String,
    },

    #[error("provider {provider_id} returned no deposit address for peg-in quote {quote_id}")]
    MissingDepositAddress {
        provider_id: ProviderId,
        quote_id: QuoteId,
    },

    #[error("provider selection changed from {requested} while accepting quote {quote_id}")]
    SelectionChanged {
        requested: ProviderId,
        quote_id: QuoteId,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DepositError {
    #[error("quote {quote_id} has no matching accepted peg-out binding")]
    NotAccepted { quote_id: QuoteId },

    #[error("quote {quote_id} expired before deposit")]
    QuoteExpired { quote_id: QuoteId },

    #[error("deposit for quote {quote_id} was already submitted")]
    AlreadyDeposited { quote_id: QuoteId },

    #[error("deposit total for quote {quote_id} overflows")]
    AmountOverflow { quote_id: QuoteId },

    #[error("accepted quote {quote_id} has no destination address")]
    MissingDestination { quote_id: QuoteId },

    #[error("wallet rejected signing deposit for quote {quote_id}: {message}")]
    SigningRejected { quote_id: QuoteId, message: String },

    #[error("insufficient funds to deposit {required} for quote {quote_id}")]
    InsufficientFunds { quote_id: QuoteId, required: u128 },

    #[error("chain submission failed for quote {quote_id}: {message}")]
    ChainSubmissionFailed { quote_id: QuoteId, message: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdateError {
    #[error("transaction {0} not found")]
    TransactionNotFound(String),

    #[error("transaction {id} already finalized as {status}")]
    AlreadyFinalized { id: Uuid, status: TransactionStatus },

    #[error("status {0} is not a terminal settlement status")]
    NotTerminal(TransactionStatus),
}

/// Transport-level failure from the signer/chain gateway
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("signing rejected: {0}")]
    SigningRejected(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("invalid deposit call: {0}")]
    InvalidCall(String),

    #[error("rpc failure: {0}")]
    Rpc(String),

    #[error("timeout waiting for {operation}")]
    Timeout { operation: String },
}

/// Umbrella error for any orchestrator operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    #[error(transparent)]
    Acceptance(#[from] AcceptanceError),

    #[error(transparent)]
    Deposit(#[from] DepositError),

    #[error(transparent)]
    StatusUpdate(#[from] StatusUpdateError),
}

impl BridgeError {
    /// Whether the caller may reasonably retry the same call.
    ///
    /// The orchestrator never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::Registry(RegistryError::LoadProviders(ProviderError::Unreachable(_)))
                | BridgeError::Negotiation(NegotiationError::ProviderUnreachable { .. })
                | BridgeError::Negotiation(NegotiationError::SelectionChanged { .. })
                | BridgeError::Acceptance(AcceptanceError::ProviderUnreachable { .. })
                | BridgeError::Deposit(DepositError::ChainSubmissionFailed { .. })
        )
    }

    /// Whether the error should be surfaced to an operator
    pub fn should_alert(&self) -> bool {
        matches!(
            self,
            BridgeError::Deposit(DepositError::InsufficientFunds { .. })
                | BridgeError::Deposit(DepositError::AmountOverflow { .. })
                | BridgeError::Deposit(DepositError::MissingDestination { .. })
                | BridgeError::Acceptance(AcceptanceError::MissingDepositAddress { .. })
        )
    }

    /// Short stable label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::Registry(_) => "load_providers",
            BridgeError::Selection(SelectionError::UnknownProvider { .. }) => "unknown_provider",
            BridgeError::Selection(SelectionError::ProviderInactive { .. }) => "provider_inactive",
            BridgeError::Negotiation(e) => match e {
                NegotiationError::NoProviderSelected => "no_provider_selected",
                NegotiationError::InvalidAmount { .. } => "invalid_amount",
                NegotiationError::MissingDestination { .. } => "missing_destination",
                NegotiationError::ProviderUnreachable { .. } => "provider_unreachable",
                NegotiationError::ProviderRejected { .. } => "provider_rejected",
                NegotiationError::SelectionChanged { .. } => "selection_changed",
            },
            BridgeError::Acceptance(e) => match e {
                AcceptanceError::NoProviderSelected => "no_provider_selected",
                AcceptanceError::ProviderMismatch { .. } => "provider_mismatch",
                AcceptanceError::DirectionMismatch { .. } => "direction_mismatch",
                AcceptanceError::UnknownQuote { .. } => "unknown_quote",
                AcceptanceError::QuoteExpired { .. } => "quote_expired",
                AcceptanceError::AlreadyAccepted { .. } => "already_accepted",
                AcceptanceError::ProviderUnreachable { .. } => "provider_unreachable",
                AcceptanceError::ProviderRejected { .. } => "provider_rejected",
                AcceptanceError::MissingDepositAddress { .. } => "missing_deposit_address",
                AcceptanceError::SelectionChanged { .. } => "selection_changed",
            },
            BridgeError::Deposit(e) => match e {
                DepositError::NotAccepted { .. } => "not_accepted",
                DepositError::QuoteExpired { .. } => "quote_expired",
                DepositError::AlreadyDeposited { .. } => "already_deposited",
                DepositError::AmountOverflow { .. } => "amount_overflow",
                DepositError::MissingDestination { .. } => "missing_destination",
                DepositError::SigningRejected { .. } => "signing_rejected",
                DepositError::InsufficientFunds { .. } => "insufficient_funds",
                DepositError::ChainSubmissionFailed { .. } => "chain_submission_failed",
            },
            BridgeError::StatusUpdate(e) => match e {
                StatusUpdateError::TransactionNotFound(_) => "transaction_not_found",
                StatusUpdateError::AlreadyFinalized { .. } => "already_finalized",
                StatusUpdateError::NotTerminal(_) => "not_terminal",
            },
        }
    }
}

/// Result type for orchestrator operations
pub type BridgeResult<T> = Result<T, BridgeError>;
