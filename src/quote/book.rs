//! Session quote cache
//!
//! Quotes are stored per direction. A newer batch for a direction replaces
//! the older one, and batches are only ever kept for a single provider.

use super::{Direction, Quote, QuoteId, QuoteRequest};
use crate::provider::{ProviderId, ProviderQuote};

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Why a provider quote was dropped during validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    ForeignProvider,
    ZeroAmount,
    DirectionMismatch,
    Duplicate,
}

impl DiscardReason {
    pub fn name(&self) -> &'static str {
        match self {
            DiscardReason::ForeignProvider => "foreign_provider",
            DiscardReason::ZeroAmount => "zero_amount",
            DiscardReason::DirectionMismatch => "direction_mismatch",
            DiscardReason::Duplicate => "duplicate",
        }
    }
}

/// Result of validating a provider response
#[derive(Debug, Default)]
pub struct ValidatedQuotes {
    pub quotes: Vec<Quote>,
    pub discarded: Vec<(QuoteId, DiscardReason)>,
}

#[derive(Debug)]
struct QuoteBatch {
    provider_id: ProviderId,
    seq: u64,
    quotes: Vec<Quote>,
}

/// Per-direction quote cache
#[derive(Debug, Default)]
pub struct QuoteBook {
    batches: HashMap<Direction, QuoteBatch>,
    next_seq: u64,
}

impl QuoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a sequence number for a request about to be issued
    pub fn begin_request(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Check shape of a provider response against the request that produced it
    pub fn validate(
        provider_id: ProviderId,
        request: &QuoteRequest,
        wire: Vec<ProviderQuote>,
        received_at: DateTime<Utc>,
        default_ttl: Duration,
    ) -> ValidatedQuotes {
        let mut seen = HashSet::new();
        let mut out = ValidatedQuotes::default();

        for q in wire {
            let reason = if q.provider_id != provider_id {
                Some(DiscardReason::ForeignProvider)
            } else if q.amount == 0 {
                Some(DiscardReason::ZeroAmount)
            } else if q.direction.map_or(false, |d| d != request.direction) {
                Some(DiscardReason::DirectionMismatch)
            } else if !seen.insert(q.id.clone()) {
                Some(DiscardReason::Duplicate)
            } else {
                None
            };

            match reason {
                Some(reason) => {
                    warn!(
                        "Discarding quote {} from provider {}: {}",
                        q.id,
                        provider_id,
                        reason.name()
                    );
                    out.discarded.push((q.id, reason));
                }
                None => out
                    .quotes
                    .push(Quote::from_provider(q, request, received_at, default_ttl)),
            }
        }

        out
    }

    /// Store a batch produced by request `seq`.
    ///
    /// Returns `false` without touching the cache if a later request for the
    /// same direction has already landed.
    pub fn store(
        &mut self,
        direction: Direction,
        provider_id: ProviderId,
        seq: u64,
        quotes: Vec<Quote>,
    ) -> bool {
        if let Some(existing) = self.batches.get(&direction) {
            if existing.seq > seq {
                debug!(
                    "Ignoring superseded {} batch (seq {} < {})",
                    direction, seq, existing.seq
                );
                return false;
            }
        }

        self.batches.retain(|_, b| b.provider_id == provider_id);
        self.batches.insert(
            direction,
            QuoteBatch {
                provider_id,
                seq,
                quotes,
            },
        );
        true
    }

    /// Drop every cached quote
    pub fn clear(&mut self) {
        self.batches.clear();
    }

    pub fn find(&self, id: &QuoteId) -> Option<&Quote> {
        self.batches
            .values()
            .flat_map(|b| b.quotes.iter())
            .find(|q| &q.id == id)
    }

    pub fn quotes(&self, direction: Direction) -> &[Quote] {
        self.batches
            .get(&direction)
            .map(|b| b.quotes.as_slice())
            .unwrap_or(&[])
    }

    /// All cached quotes, peg-in first
    pub fn all(&self) -> Vec<Quote> {
        [Direction::PegIn, Direction::PegOut]
            .iter()
            .flat_map(|d| self.quotes(*d).iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.batches.values().map(|b| b.quotes.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
