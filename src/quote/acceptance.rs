//! Single-shot acceptance tracking
//!
//! Providers sign each quote once. A quote id moves through
//! `free -> reserved -> bound`, and a reserved slot can fall back to free if
//! the provider call fails. Bound slots are never released, and neither are
//! reservations whose provider call signed but produced no usable binding.

use super::{AcceptedQuote, Quote, QuoteId, QuoteSignature};
use crate::error::AcceptanceError;

use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
enum Slot {
    Reserved,
    Bound { accepted: AcceptedQuote, quote: Quote },
}

#[derive(Debug, Default)]
pub struct AcceptanceGuard {
    slots: HashMap<QuoteId, Slot>,
    deposited: HashSet<QuoteId>,
}

impl AcceptanceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `quote_id` ahead of the provider call
    pub fn reserve(&mut self, quote_id: &QuoteId) -> Result<(), AcceptanceError> {
        if self.slots.contains_key(quote_id) {
            return Err(AcceptanceError::AlreadyAccepted {
                quote_id: quote_id.clone(),
            });
        }
        self.slots.insert(quote_id.clone(), Slot::Reserved);
        Ok(())
    }

    /// Free a reservation whose provider call produced no binding
    pub fn release(&mut self, quote_id: &QuoteId) {
        if let Some(Slot::Reserved) = self.slots.get(quote_id) {
            self.slots.remove(quote_id);
        }
    }

    /// Record the provider binding together with the quote it was made for
    pub fn bind(&mut self, accepted: AcceptedQuote, quote: Quote) {
        self.slots
            .insert(accepted.quote_id().clone(), Slot::Bound { accepted, quote });
    }

    /// Whether `quote_id` is reserved or bound
    pub fn is_claimed(&self, quote_id: &QuoteId) -> bool {
        self.slots.contains_key(quote_id)
    }

    pub fn binding(&self, quote_id: &QuoteId) -> Option<&AcceptedQuote> {
        match self.slots.get(quote_id) {
            Some(Slot::Bound { accepted, .. }) => Some(accepted),
            _ => None,
        }
    }

    /// The quote as it stood when it was bound
    pub fn bound_quote(&self, quote_id: &QuoteId) -> Option<&Quote> {
        match self.slots.get(quote_id) {
            Some(Slot::Bound { quote, .. }) => Some(quote),
            _ => None,
        }
    }

    /// Whether `signature` is the peg-out binding recorded for `quote_id`
    pub fn is_bound_peg_out(&self, quote_id: &QuoteId, signature: &QuoteSignature) -> bool {
        matches!(
            self.binding(quote_id),
            Some(AcceptedQuote::PegOut { signature: s, .. }) if s == signature
        )
    }

    pub fn is_deposited(&self, quote_id: &QuoteId) -> bool {
        self.deposited.contains(quote_id)
    }

    pub fn mark_deposited(&mut self, quote_id: &QuoteId) {
        self.deposited.insert(quote_id.clone());
    }
}
