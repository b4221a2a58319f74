//! Bridge orchestrator: the single owner of session state

use crate::chain::{ChainGateway, DepositCall};
use crate::config::BridgeConfig;
use crate::error::{
    AcceptanceError, BridgeError, DepositError, GatewayError, NegotiationError, ProviderError,
    RegistryError, SelectionError, StatusUpdateError,
};
use crate::events::BridgeEvent;
use crate::metrics;
use crate::provider::{LiquidityProvider, ProviderApi, ProviderId, ProviderRegistry};
use crate::quote::{
    AcceptanceGuard, AcceptedQuote, Direction, Quote, QuoteBook, QuoteId, QuoteRequest,
    QuoteSignature,
};
use crate::settlement::{BridgeTransaction, SettlementLedger, TransactionSelector, TransactionStatus};

use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Mutex};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Everything the orchestrator mutates. Guarded by one mutex that is never
/// held across a network call.
#[derive(Default)]
struct SessionState {
    registry: ProviderRegistry,
    /// Bumped on every change of the selected provider
    selection_epoch: u64,
    quotes: QuoteBook,
    acceptances: AcceptanceGuard,
    ledger: SettlementLedger,
}

impl SessionState {
    fn change_selection(&mut self) {
        self.selection_epoch += 1;
        self.quotes.clear();
    }
}

/// Provider and epoch captured when a network call is issued
#[derive(Debug, Clone, Copy)]
struct SelectionTicket {
    provider_id: ProviderId,
    epoch: u64,
}

/// Releases a quote reservation if the acceptance does not reach a verdict,
/// including when the accepting future is dropped mid-call
struct Reservation {
    state: Arc<Mutex<SessionState>>,
    quote_id: Option<QuoteId>,
}

impl Reservation {
    /// Keep the reservation: the quote is bound or deliberately consumed
    fn keep(mut self) {
        self.quote_id = None;
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        let Some(quote_id) = self.quote_id.take() else {
            return;
        };
        debug!("Releasing reservation of quote {}", quote_id);

        if let Ok(mut state) = self.state.try_lock() {
            state.acceptances.release(&quote_id);
        } else if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let state = self.state.clone();
            handle.spawn(async move {
                state.lock().await.acceptances.release(&quote_id);
            });
        } else {
            warn!("Reservation of quote {} could not be released", quote_id);
        }
    }
}

/// Read-only view of the session for display
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeView {
    pub providers: Vec<LiquidityProvider>,
    pub selected_provider: Option<LiquidityProvider>,
    pub current_quotes: Vec<Quote>,
    pub transactions: Vec<BridgeTransaction>,
}

/// Two-way peg orchestrator
pub struct BridgeOrchestrator {
    /// Liquidity provider protocol client
    provider_api: Arc<dyn ProviderApi>,
    /// Wallet and RPC submission for peg-out deposits
    gateway: Arc<dyn ChainGateway>,
    /// Configuration
    config: BridgeConfig,
    /// Session state
    state: Arc<Mutex<SessionState>>,
    /// Serializes deposit submissions for the gateway account
    deposit_lane: Mutex<()>,
    /// Event broadcast channel
    event_tx: broadcast::Sender<BridgeEvent>,
}

impl BridgeOrchestrator {
    pub fn new(
        provider_api: Arc<dyn ProviderApi>,
        gateway: Arc<dyn ChainGateway>,
        config: BridgeConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));

        Self {
            provider_api,
            gateway,
            config,
            state: Arc::new(Mutex::new(SessionState::default())),
            deposit_lane: Mutex::new(()),
            event_tx,
        }
    }

    /// Subscribe to orchestrator events
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.event_tx.subscribe()
    }

    fn publish(&self, event: BridgeEvent) {
        debug!("Publishing event: {}", event.name());
        // No subscribers is not an error
        let _ = self.event_tx.send(event);
    }

    /// Run a provider call under the configured timeout
    async fn call_provider<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, ProviderError> {
        let start = Instant::now();
        let result = match timeout(self.config.provider_timeout(), call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Unreachable(format!(
                "{} timed out after {:?}",
                operation,
                self.config.provider_timeout()
            ))),
        };
        metrics::record_provider_call(operation, start.elapsed().as_secs_f64());
        result
    }

    // ------------------------------------------------------------------
    // Provider registry
    // ------------------------------------------------------------------

    /// Fetch the provider directory and replace the cached set
    pub async fn load_providers(&self) -> Result<Vec<LiquidityProvider>, RegistryError> {
        let providers = match self
            .call_provider("providers", self.provider_api.providers())
            .await
        {
            Ok(providers) => providers,
            Err(e) => {
                warn!("Failed to load liquidity providers: {}", e);
                metrics::record_provider_load(false);
                let err = RegistryError::LoadProviders(e);
                metrics::record_error("load_providers", &BridgeError::from(err.clone()));
                return Err(err);
            }
        };
        metrics::record_provider_load(true);

        let mut state = self.state.lock().await;
        let previous = state.registry.selected_id();
        let cleared = state.registry.replace(providers.clone());
        if cleared {
            state.change_selection();
        }
        drop(state);

        self.publish(BridgeEvent::ProvidersLoaded {
            count: providers.len(),
        });
        if let (true, Some(provider_id)) = (cleared, previous) {
            warn!(
                "Selected provider {} is no longer available, selection cleared",
                provider_id
            );
            self.publish(BridgeEvent::SelectionCleared { provider_id });
        }
        Ok(providers)
    }

    /// Select the provider all further negotiation goes through.
    ///
    /// A change of provider drops every un-accepted quote and invalidates
    /// any negotiation or acceptance still in flight.
    pub async fn select_provider(&self, provider_id: ProviderId) -> Result<(), SelectionError> {
        let mut state = self.state.lock().await;
        let changed = match state.registry.select(provider_id) {
            Ok(changed) => changed,
            Err(e) => {
                metrics::record_error("select_provider", &BridgeError::from(e.clone()));
                return Err(e);
            }
        };

        if changed {
            state.change_selection();
            drop(state);
            info!("Selected liquidity provider {}", provider_id);
            self.publish(BridgeEvent::ProviderSelected { provider_id });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Quote negotiation
    // ------------------------------------------------------------------

    /// Request quotes from the selected provider.
    ///
    /// Local validation happens before any network call. The returned list
    /// is unranked and may be empty.
    pub async fn request_quotes(
        &self,
        request: QuoteRequest,
    ) -> Result<Vec<Quote>, NegotiationError> {
        let result = self.negotiate(request).await;
        if let Err(e) = &result {
            metrics::record_error("request_quotes", &BridgeError::from(e.clone()));
        }
        result
    }

    async fn negotiate(&self, request: QuoteRequest) -> Result<Vec<Quote>, NegotiationError> {
        let direction = request.direction;

        let (ticket, seq) = {
            let mut state = self.state.lock().await;
            let provider_id = state
                .registry
                .selected_id()
                .ok_or(NegotiationError::NoProviderSelected)?;

            if request.amount == 0 {
                return Err(NegotiationError::InvalidAmount { direction });
            }
            if direction == Direction::PegOut
                && request
                    .destination_address
                    .as_deref()
                    .map_or(true, |d| d.trim().is_empty())
            {
                return Err(NegotiationError::MissingDestination { direction });
            }

            let ticket = SelectionTicket {
                provider_id,
                epoch: state.selection_epoch,
            };
            (ticket, state.quotes.begin_request())
        };

        debug!(
            "Requesting {} quotes for {} from provider {}",
            direction, request.amount, ticket.provider_id
        );

        let wire = self
            .call_provider(
                "quotes",
                self.provider_api.quotes(ticket.provider_id, &request),
            )
            .await
            .map_err(|e| negotiation_error(ticket.provider_id, direction, e))?;

        let validated = QuoteBook::validate(
            ticket.provider_id,
            &request,
            wire,
            Utc::now(),
            self.config.default_quote_ttl(),
        );
        for (_, reason) in &validated.discarded {
            metrics::record_quote_discarded(reason.name());
        }
        let quotes = validated.quotes;

        let mut state = self.state.lock().await;
        if state.selection_epoch != ticket.epoch {
            drop(state);
            warn!(
                "Discarding {} {} quotes from provider {}: selection changed",
                quotes.len(),
                direction,
                ticket.provider_id
            );
            metrics::record_quote_discarded("selection_changed");
            self.publish(BridgeEvent::QuotesDiscarded {
                provider_id: ticket.provider_id,
                direction,
                count: quotes.len(),
            });
            return Err(NegotiationError::SelectionChanged {
                requested: ticket.provider_id,
                direction,
            });
        }

        let cached = state
            .quotes
            .store(direction, ticket.provider_id, seq, quotes.clone());
        drop(state);

        if quotes.is_empty() {
            info!(
                "Provider {} returned no {} quotes",
                ticket.provider_id, direction
            );
        }

        if cached {
            metrics::record_quotes_received(direction, quotes.len());
            self.publish(BridgeEvent::QuotesReceived {
                provider_id: ticket.provider_id,
                direction,
                count: quotes.len(),
            });
        } else {
            metrics::record_quote_discarded("superseded");
            self.publish(BridgeEvent::QuotesDiscarded {
                provider_id: ticket.provider_id,
                direction,
                count: quotes.len(),
            });
        }

        Ok(quotes)
    }

    // ------------------------------------------------------------------
    // Quote acceptance
    // ------------------------------------------------------------------

    /// Bind a peg-in quote, obtaining the deposit address the user must fund.
    ///
    /// Records a pending peg-in transaction on success.
    pub async fn accept_peg_in(&self, quote: &Quote) -> Result<AcceptedQuote, AcceptanceError> {
        let result = self.accept(quote, Direction::PegIn).await;
        if let Err(e) = &result {
            metrics::record_error("accept_peg_in", &BridgeError::from(e.clone()));
        }
        result
    }

    /// Bind a peg-out quote, obtaining the provider's deposit authorization.
    ///
    /// Nothing is recorded until the deposit is submitted.
    pub async fn accept_peg_out(&self, quote: &Quote) -> Result<AcceptedQuote, AcceptanceError> {
        let result = self.accept(quote, Direction::PegOut).await;
        if let Err(e) = &result {
            metrics::record_error("accept_peg_out", &BridgeError::from(e.clone()));
        }
        result
    }

    async fn accept(
        &self,
        quote: &Quote,
        expected: Direction,
    ) -> Result<AcceptedQuote, AcceptanceError> {
        let quote_id = quote.id.clone();

        let (ticket, cached) = {
            let mut state = self.state.lock().await;
            let selected = state
                .registry
                .selected_id()
                .ok_or(AcceptanceError::NoProviderSelected)?;

            if quote.provider_id != selected {
                return Err(AcceptanceError::ProviderMismatch {
                    quote_id,
                    quote_provider: quote.provider_id,
                    selected,
                });
            }
            if state.acceptances.is_claimed(&quote_id) {
                return Err(AcceptanceError::AlreadyAccepted { quote_id });
            }

            let cached = state
                .quotes
                .find(&quote_id)
                .cloned()
                .ok_or_else(|| AcceptanceError::UnknownQuote {
                    quote_id: quote_id.clone(),
                })?;
            // The cached copy is authoritative, the caller's may be stale or edited
            if cached.direction != expected {
                return Err(AcceptanceError::DirectionMismatch {
                    quote_id,
                    expected,
                    actual: cached.direction,
                });
            }
            if cached.is_expired() {
                return Err(AcceptanceError::QuoteExpired { quote_id });
            }

            state.acceptances.reserve(&quote_id)?;
            let ticket = SelectionTicket {
                provider_id: selected,
                epoch: state.selection_epoch,
            };
            (ticket, cached)
        };
        let reservation = Reservation {
            state: self.state.clone(),
            quote_id: Some(quote_id.clone()),
        };

        let response = match self
            .call_provider(
                "accept",
                self.provider_api
                    .accept(ticket.provider_id, expected, &quote_id),
            )
            .await
        {
            Ok(response) => response,
            Err(e) => {
                drop(reservation);
                warn!("Provider {} failed to accept quote {}: {}", ticket.provider_id, quote_id, e);
                return Err(acceptance_error(ticket.provider_id, quote_id, e));
            }
        };

        let signature = QuoteSignature(response.signature);
        let accepted = match expected {
            Direction::PegIn => match response.deposit_address {
                Some(deposit_address) if !deposit_address.is_empty() => AcceptedQuote::PegIn {
                    quote_id: quote_id.clone(),
                    deposit_address,
                    signature,
                },
                _ => {
                    // Provider has signed; the reservation stays so it is not asked again
                    reservation.keep();
                    error!(
                        "Provider {} accepted peg-in quote {} without a deposit address",
                        ticket.provider_id, quote_id
                    );
                    return Err(AcceptanceError::MissingDepositAddress {
                        provider_id: ticket.provider_id,
                        quote_id,
                    });
                }
            },
            Direction::PegOut => AcceptedQuote::PegOut {
                quote_id: quote_id.clone(),
                signature,
            },
        };

        let mut state = self.state.lock().await;
        reservation.keep();
        if state.selection_epoch != ticket.epoch {
            drop(state);
            warn!(
                "Discarding acceptance of quote {}: selection changed from provider {}",
                quote_id, ticket.provider_id
            );
            return Err(AcceptanceError::SelectionChanged {
                requested: ticket.provider_id,
                quote_id,
            });
        }

        state.acceptances.bind(accepted.clone(), cached.clone());
        if let AcceptedQuote::PegIn {
            deposit_address, ..
        } = &accepted
        {
            state.ledger.record(BridgeTransaction::peg_in(
                quote_id.clone(),
                ticket.provider_id,
                cached.amount,
                deposit_address.clone(),
            ));
        }
        drop(state);

        info!(
            "Accepted {} quote {} with provider {}",
            expected, quote_id, ticket.provider_id
        );
        metrics::record_quote_accepted(expected);
        self.publish(BridgeEvent::QuoteAccepted {
            provider_id: ticket.provider_id,
            direction: expected,
            quote_id,
        });

        Ok(accepted)
    }

    // ------------------------------------------------------------------
    // Peg-out deposit
    // ------------------------------------------------------------------

    /// Submit the peg-out deposit for an accepted quote.
    ///
    /// Pays `amount + commission` with the provider's signature attached.
    /// Exactly one pending transaction is recorded on success and none on
    /// failure; a failed deposit may be retried until the quote expires.
    pub async fn deposit_pegout(
        &self,
        quote: &Quote,
        signature: &QuoteSignature,
    ) -> Result<String, DepositError> {
        let result = self.deposit(quote, signature).await;
        match &result {
            Ok(_) => metrics::record_deposit("submitted"),
            Err(e) => {
                metrics::record_deposit("failed");
                metrics::record_error("deposit_pegout", &BridgeError::from(e.clone()));
            }
        }
        result
    }

    async fn deposit(&self, quote: &Quote, signature: &QuoteSignature) -> Result<String, DepositError> {
        let quote_id = quote.id.clone();
        let _lane = self.deposit_lane.lock().await;

        let (call, bound) = {
            let state = self.state.lock().await;
            if !state.acceptances.is_bound_peg_out(&quote_id, signature) {
                return Err(DepositError::NotAccepted { quote_id });
            }
            if state.acceptances.is_deposited(&quote_id) {
                return Err(DepositError::AlreadyDeposited { quote_id });
            }
            let bound = state
                .acceptances
                .bound_quote(&quote_id)
                .cloned()
                .ok_or_else(|| DepositError::NotAccepted {
                    quote_id: quote_id.clone(),
                })?;

            if bound.is_expired() {
                return Err(DepositError::QuoteExpired { quote_id });
            }
            let value = bound
                .total_payable()
                .ok_or_else(|| DepositError::AmountOverflow {
                    quote_id: quote_id.clone(),
                })?;

            let destination = match bound.destination_address.as_deref().map(str::trim) {
                Some(destination) if !destination.is_empty() => destination.to_string(),
                _ => return Err(DepositError::MissingDestination { quote_id }),
            };

            let call = DepositCall {
                quote_id: quote_id.clone(),
                value,
                signature: signature.clone(),
                destination,
            };
            (call, bound)
        };

        let value = call.value;
        info!("Submitting peg-out deposit of {} for quote {}", value, quote_id);

        let tx_hash = match timeout(self.config.deposit_timeout(), self.gateway.submit_deposit(call)).await {
            Ok(Ok(tx_hash)) => tx_hash,
            Ok(Err(e)) => {
                warn!("Peg-out deposit for quote {} failed: {}", quote_id, e);
                return Err(deposit_error(quote_id, value, e));
            }
            Err(_) => {
                warn!("Peg-out deposit for quote {} timed out", quote_id);
                return Err(DepositError::ChainSubmissionFailed {
                    quote_id,
                    message: format!("submission timed out after {:?}", self.config.deposit_timeout()),
                });
            }
        };

        let mut state = self.state.lock().await;
        state.acceptances.mark_deposited(&quote_id);
        let transaction_id = state.ledger.record(BridgeTransaction::peg_out(
            quote_id.clone(),
            bound.provider_id,
            bound.amount,
            tx_hash.clone(),
        ));
        drop(state);

        self.publish(BridgeEvent::DepositSubmitted {
            quote_id,
            transaction_id,
            tx_hash: tx_hash.clone(),
        });
        Ok(tx_hash)
    }

    // ------------------------------------------------------------------
    // Settlement
    // ------------------------------------------------------------------

    /// Finalize a pending transaction on external confirmation.
    ///
    /// Updates to terminal records are rejected with `AlreadyFinalized` and
    /// change nothing.
    pub async fn mark_transaction_status(
        &self,
        selector: TransactionSelector,
        status: TransactionStatus,
        tx_hash: Option<String>,
    ) -> Result<BridgeTransaction, StatusUpdateError> {
        let result = self.state.lock().await.ledger.finalize(&selector, status, tx_hash);

        match &result {
            Ok(tx) => {
                metrics::record_transaction_finalized(tx.kind, tx.status);
                self.publish(BridgeEvent::TransactionFinalized {
                    transaction_id: tx.id,
                    direction: tx.kind,
                    status: tx.status,
                });
            }
            Err(e) => {
                metrics::record_error("mark_transaction_status", &BridgeError::from(e.clone()));
            }
        }
        result
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    pub async fn snapshot(&self) -> BridgeView {
        let state = self.state.lock().await;
        BridgeView {
            providers: state.registry.providers().to_vec(),
            selected_provider: state.registry.selected().cloned(),
            current_quotes: state.quotes.all(),
            transactions: state.ledger.transactions().to_vec(),
        }
    }

    pub async fn providers(&self) -> Vec<LiquidityProvider> {
        self.state.lock().await.registry.providers().to_vec()
    }

    pub async fn selected_provider(&self) -> Option<LiquidityProvider> {
        self.state.lock().await.registry.selected().cloned()
    }

    pub async fn current_quotes(&self) -> Vec<Quote> {
        self.state.lock().await.quotes.all()
    }

    pub async fn transactions(&self) -> Vec<BridgeTransaction> {
        self.state.lock().await.ledger.transactions().to_vec()
    }

    pub async fn transaction(&self, id: Uuid) -> Option<BridgeTransaction> {
        self.state
            .lock()
            .await
            .ledger
            .get(&TransactionSelector::Id(id))
            .cloned()
    }

    /// The binding recorded for `quote_id`, if it has been accepted
    pub async fn accepted_quote(&self, quote_id: &QuoteId) -> Option<AcceptedQuote> {
        self.state
            .lock()
            .await
            .acceptances
            .binding(quote_id)
            .cloned()
    }
}

fn negotiation_error(
    provider_id: ProviderId,
    direction: Direction,
    e: ProviderError,
) -> NegotiationError {
    match e {
        ProviderError::Unreachable(message) => NegotiationError::ProviderUnreachable {
            provider_id,
            direction,
            message,
        },
        ProviderError::Rejected { status, message } => NegotiationError::ProviderRejected {
            provider_id,
            direction,
            message: format!("{} (status {})", message, status),
        },
        ProviderError::Malformed(message) => NegotiationError::ProviderRejected {
            provider_id,
            direction,
            message: format!("malformed response: {}", message),
        },
    }
}

fn acceptance_error(provider_id: ProviderId, quote_id: QuoteId, e: ProviderError) -> AcceptanceError {
    match e {
        ProviderError::Unreachable(message) => AcceptanceError::ProviderUnreachable {
            provider_id,
            quote_id,
            message,
        },
        ProviderError::Rejected { status, message } => AcceptanceError::ProviderRejected {
            provider_id,
            quote_id,
            message: format!("{} (status {})", message, status),
        },
        ProviderError::Malformed(message) => AcceptanceError::ProviderRejected {
            provider_id,
            quote_id,
            message: format!("malformed response: {}", message),
        },
    }
}

fn deposit_error(quote_id: QuoteId, required: u128, e: GatewayError) -> DepositError {
    match e {
        GatewayError::SigningRejected(message) => DepositError::SigningRejected { quote_id, message },
        GatewayError::InsufficientFunds(_) => DepositError::InsufficientFunds { quote_id, required },
        GatewayError::InvalidCall(message) | GatewayError::Rpc(message) => {
            DepositError::ChainSubmissionFailed { quote_id, message }
        }
        GatewayError::Timeout { operation } => DepositError::ChainSubmissionFailed {
            quote_id,
            message: format!("timeout waiting for {}", operation),
        },
    }
}
