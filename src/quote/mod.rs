//! Quote types for both peg directions
//!
//! A [`Quote`] is a provider's offer for a single conversion. Once bound with
//! the provider it becomes an [`AcceptedQuote`], whose shape depends on the
//! direction: peg-in bindings carry a deposit address on the source chain,
//! peg-out bindings carry only the provider's authorization signature.

pub mod acceptance;
pub mod book;

pub use acceptance::AcceptanceGuard;
pub use book::QuoteBook;

use crate::provider::{ProviderId, ProviderQuote};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Conversion direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    /// Source chain base asset -> wrapped asset on the target chain
    PegIn,
    /// Wrapped asset on the target chain -> base asset on the source chain
    PegOut,
}

impl Direction {
    pub fn name(&self) -> &'static str {
        match self {
            Direction::PegIn => "peg_in",
            Direction::PegOut => "peg_out",
        }
    }

    /// URL path segment used by provider servers
    pub fn path_segment(&self) -> &'static str {
        match self {
            Direction::PegIn => "pegin",
            Direction::PegOut => "pegout",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::PegIn => write!(f, "peg-in"),
            Direction::PegOut => write!(f, "peg-out"),
        }
    }
}

/// Provider-assigned quote identifier (usually a hex quote hash)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuoteId(pub String);

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QuoteId {
    fn from(s: &str) -> Self {
        QuoteId(s.to_string())
    }
}

impl From<String> for QuoteId {
    fn from(s: String) -> Self {
        QuoteId(s)
    }
}

/// Provider signature over a quote, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuoteSignature(pub String);

impl QuoteSignature {
    /// Raw signature bytes, accepting an optional `0x` prefix
    pub fn to_bytes(&self) -> Result<Vec<u8>, hex::FromHexError> {
        hex::decode(self.0.trim_start_matches("0x"))
    }
}

impl From<&str> for QuoteSignature {
    fn from(s: &str) -> Self {
        QuoteSignature(s.to_string())
    }
}

/// Caller's request for quotes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub direction: Direction,
    /// Smallest indivisible unit of the asset being converted
    pub amount: u128,
    /// Required for peg-out; forwarded verbatim, never validated here
    #[serde(default)]
    pub destination_address: Option<String>,
}

impl QuoteRequest {
    pub fn peg_in(amount: u128) -> Self {
        Self {
            direction: Direction::PegIn,
            amount,
            destination_address: None,
        }
    }

    pub fn peg_out(amount: u128, destination_address: impl Into<String>) -> Self {
        Self {
            direction: Direction::PegOut,
            amount,
            destination_address: Some(destination_address.into()),
        }
    }
}

/// A validated quote held in the session quote book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: QuoteId,
    pub provider_id: ProviderId,
    pub direction: Direction,
    pub amount: u128,
    /// Absolute fee, same unit as `amount`
    pub commission: u128,
    pub estimated_delivery_seconds: u64,
    pub destination_address: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Quote {
    /// Build a session quote from a provider response.
    ///
    /// Missing expiry data falls back to `received_at` and `default_ttl`.
    pub fn from_provider(
        wire: ProviderQuote,
        request: &QuoteRequest,
        received_at: DateTime<Utc>,
        default_ttl: Duration,
    ) -> Self {
        let issued_at = wire
            .agreement_timestamp
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or(received_at);

        let ttl = wire
            .time_for_deposit
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(Duration::try_seconds)
            .unwrap_or(default_ttl);

        let expires_at = issued_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            id: wire.id,
            provider_id: wire.provider_id,
            direction: request.direction,
            amount: wire.amount,
            commission: wire.commission,
            estimated_delivery_seconds: wire.estimated_delivery_seconds,
            destination_address: request.destination_address.clone(),
            issued_at,
            expires_at,
        }
    }

    /// Commission as a fraction of the amount
    pub fn effective_rate(&self) -> f64 {
        if self.amount == 0 {
            return 0.0;
        }
        self.commission as f64 / self.amount as f64
    }

    /// Amount the user pays including commission, `None` on overflow
    pub fn total_payable(&self) -> Option<u128> {
        self.amount.checked_add(self.commission)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// A quote bound by its provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "direction", rename_all = "camelCase")]
pub enum AcceptedQuote {
    #[serde(rename_all = "camelCase")]
    PegIn {
        quote_id: QuoteId,
        /// Source chain address the user must fund
        deposit_address: String,
        signature: QuoteSignature,
    },
    #[serde(rename_all = "camelCase")]
    PegOut {
        quote_id: QuoteId,
        /// Must accompany the on-chain deposit call
        signature: QuoteSignature,
    },
}

impl AcceptedQuote {
    pub fn quote_id(&self) -> &QuoteId {
        match self {
            AcceptedQuote::PegIn { quote_id, .. } | AcceptedQuote::PegOut { quote_id, .. } => {
                quote_id
            }
        }
    }

    pub fn signature(&self) -> &QuoteSignature {
        match self {
            AcceptedQuote::PegIn { signature, .. } | AcceptedQuote::PegOut { signature, .. } => {
                signature
            }
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            AcceptedQuote::PegIn { .. } => Direction::PegIn,
            AcceptedQuote::PegOut { .. } => Direction::PegOut,
        }
    }

    pub fn deposit_address(&self) -> Option<&str> {
        match self {
            AcceptedQuote::PegIn {
                deposit_address, ..
            } => Some(deposit_address),
            AcceptedQuote::PegOut { .. } => None,
        }
    }
}
