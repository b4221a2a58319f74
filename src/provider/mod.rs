//! Liquidity providers and the protocol used to talk to them
//!
//! This module provides:
//! - Provider identity and descriptor types
//! - The [`ProviderApi`] trait the orchestrator drives
//! - Wire types exchanged with provider servers
//! - The in-session [`ProviderRegistry`]
//! - [`HttpProviderClient`], the reqwest implementation of [`ProviderApi`]

pub mod http;
pub mod registry;

pub use http::HttpProviderClient;
pub use registry::ProviderRegistry;

use crate::error::ProviderError;
use crate::quote::{Direction, QuoteId, QuoteRequest};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque provider identifier, unique within a loaded provider set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(pub u64);

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A liquidity provider as advertised by the provider directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityProvider {
    pub id: ProviderId,
    pub name: String,
    /// Fractional commission, e.g. `0.002` for 0.2%
    pub fee_rate: f64,
    pub active: bool,
}

/// Quote as returned on the wire by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderQuote {
    pub id: QuoteId,
    pub provider_id: ProviderId,
    /// Some providers echo the direction; when present it must match the request
    #[serde(default)]
    pub direction: Option<Direction>,
    pub amount: u128,
    pub commission: u128,
    pub estimated_delivery_seconds: u64,
    /// Unix seconds at which the provider issued the quote
    #[serde(default)]
    pub agreement_timestamp: Option<i64>,
    /// Seconds after `agreement_timestamp` during which the quote is honoured
    #[serde(default)]
    pub time_for_deposit: Option<u64>,
}

/// Provider response to an accept call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptResponse {
    #[serde(default)]
    pub deposit_address: Option<String>,
    pub signature: String,
}

/// Liquidity provider protocol.
///
/// Implementations perform exactly one network round trip per call and do
/// not retry. Timeouts are applied by the caller as well.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// Fetch the current provider directory
    async fn providers(&self) -> Result<Vec<LiquidityProvider>, ProviderError>;

    /// Ask `provider` for quotes matching `request`
    async fn quotes(
        &self,
        provider: ProviderId,
        request: &QuoteRequest,
    ) -> Result<Vec<ProviderQuote>, ProviderError>;

    /// Bind `quote_id` with `provider`, obtaining its signature
    async fn accept(
        &self,
        provider: ProviderId,
        direction: Direction,
        quote_id: &QuoteId,
    ) -> Result<AcceptResponse, ProviderError>;
}
