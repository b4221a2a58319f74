//! In-process fakes for orchestrator tests

use crate::chain::{ChainGateway, DepositCall};
use crate::config::BridgeConfig;
use crate::error::{GatewayError, ProviderError};
use crate::orchestrator::BridgeOrchestrator;
use crate::provider::{AcceptResponse, LiquidityProvider, ProviderApi, ProviderId, ProviderQuote};
use crate::quote::{Direction, QuoteId, QuoteRequest};

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};

pub fn provider(id: u64, active: bool) -> LiquidityProvider {
    LiquidityProvider {
        id: ProviderId(id),
        name: format!("provider-{}", id),
        fee_rate: 0.002,
        active,
    }
}

/// Blocks a fake call until the test releases it
pub struct Gate {
    pub entered: Notify,
    permits: Semaphore,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
            permits: Semaphore::new(0),
        })
    }

    pub fn release(&self) {
        self.permits.add_permits(1);
    }

    async fn pass(&self) {
        self.entered.notify_one();
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
    }
}

/// Scripted liquidity provider server.
///
/// Quote ids are unique per call: `p{provider}-{direction}-{call}-{a|b}`.
#[derive(Default)]
pub struct FakeProvider {
    pub providers: Mutex<Vec<LiquidityProvider>>,
    /// Quote validity reported to the orchestrator, `(agreement offset secs, time_for_deposit)`
    pub validity: Mutex<Option<(i64, u64)>>,
    /// Extra quote from another provider slipped into every response
    pub leak_foreign: Mutex<bool>,
    pub accept_error: Mutex<Option<ProviderError>>,
    pub omit_deposit_address: Mutex<bool>,
    pub quote_gate: Option<Arc<Gate>>,
    pub accept_gate: Option<Arc<Gate>>,
    pub quote_calls: AtomicUsize,
    pub accept_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn with_providers(providers: Vec<LiquidityProvider>) -> Self {
        Self {
            providers: Mutex::new(providers),
            ..Default::default()
        }
    }

    pub fn with_quote_gate(mut self, gate: Arc<Gate>) -> Self {
        self.quote_gate = Some(gate);
        self
    }

    pub fn with_accept_gate(mut self, gate: Arc<Gate>) -> Self {
        self.accept_gate = Some(gate);
        self
    }

    pub fn set_validity(&self, agreement_offset_secs: i64, time_for_deposit: u64) {
        *self.validity.lock().unwrap() = Some((agreement_offset_secs, time_for_deposit));
    }

    pub fn quote_calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }

    pub fn accept_calls(&self) -> usize {
        self.accept_calls.load(Ordering::SeqCst)
    }

    fn wire_quote(&self, id: String, provider: ProviderId, amount: u128) -> ProviderQuote {
        let validity = *self.validity.lock().unwrap();
        ProviderQuote {
            id: QuoteId(id),
            provider_id: provider,
            direction: None,
            amount,
            commission: amount / 100,
            estimated_delivery_seconds: 1_800,
            agreement_timestamp: validity.map(|(offset, _)| Utc::now().timestamp() + offset),
            time_for_deposit: validity.map(|(_, tfd)| tfd),
        }
    }
}

#[async_trait]
impl ProviderApi for FakeProvider {
    async fn providers(&self) -> Result<Vec<LiquidityProvider>, ProviderError> {
        Ok(self.providers.lock().unwrap().clone())
    }

    async fn quotes(
        &self,
        provider: ProviderId,
        request: &QuoteRequest,
    ) -> Result<Vec<ProviderQuote>, ProviderError> {
        let call = self.quote_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(gate) = &self.quote_gate {
            gate.pass().await;
        }

        let prefix = format!("p{}-{}-{}", provider, request.direction.path_segment(), call);
        let leak_foreign = *self.leak_foreign.lock().unwrap();
        let mut quotes = vec![
            self.wire_quote(format!("{}-a", prefix), provider, request.amount),
            self.wire_quote(format!("{}-b", prefix), provider, request.amount),
        ];
        if leak_foreign {
            quotes.push(self.wire_quote(
                format!("{}-foreign", prefix),
                ProviderId(provider.0 + 100),
                request.amount,
            ));
        }
        Ok(quotes)
    }

    async fn accept(
        &self,
        provider: ProviderId,
        direction: Direction,
        quote_id: &QuoteId,
    ) -> Result<AcceptResponse, ProviderError> {
        self.accept_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.accept_gate {
            gate.pass().await;
        }
        let accept_error = self.accept_error.lock().unwrap().clone();
        if let Some(e) = accept_error {
            return Err(e);
        }

        let omit_deposit_address = *self.omit_deposit_address.lock().unwrap();
        let deposit_address = match direction {
            Direction::PegIn if !omit_deposit_address => {
                Some(format!("2N{}{}", provider, quote_id))
            }
            _ => None,
        };
        Ok(AcceptResponse {
            deposit_address,
            signature: format!("0x{}", hex::encode(quote_id.0.as_bytes())),
        })
    }
}

/// Gateway that records submissions and answers from a script
#[derive(Default)]
pub struct FakeGateway {
    pub responses: Mutex<Vec<Result<String, GatewayError>>>,
    pub submitted: Mutex<Vec<DepositCall>>,
    pub gate: Option<Arc<Gate>>,
}

impl FakeGateway {
    pub fn answering(responses: Vec<Result<String, GatewayError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            ..Default::default()
        }
    }

    pub fn with_gate(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn submissions(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }
}

#[async_trait]
impl ChainGateway for FakeGateway {
    async fn submit_deposit(&self, call: DepositCall) -> Result<String, GatewayError> {
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        let n = {
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push(call);
            submitted.len()
        };
        let next = {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                None
            } else {
                Some(responses.remove(0))
            }
        };
        next.unwrap_or_else(|| Ok(format!("0x{:064x}", n)))
    }
}

pub fn orchestrator(
    provider: Arc<dyn ProviderApi>,
    gateway: Arc<dyn ChainGateway>,
) -> BridgeOrchestrator {
    BridgeOrchestrator::new(provider, gateway, BridgeConfig::default())
}
