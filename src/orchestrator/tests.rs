use super::BridgeOrchestrator;
use crate::chain::MockChainGateway;
use crate::config::BridgeConfig;
use crate::error::{
    AcceptanceError, DepositError, GatewayError, NegotiationError, ProviderError, SelectionError,
    StatusUpdateError,
};
use crate::events::BridgeEvent;
use crate::provider::{MockProviderApi, ProviderId};
use crate::quote::{AcceptedQuote, Direction, Quote, QuoteId, QuoteRequest, QuoteSignature};
use crate::settlement::{TransactionSelector, TransactionStatus};
use crate::testing::{orchestrator, provider, FakeGateway, FakeProvider, Gate};

use std::sync::Arc;
use std::time::Duration;

const AMOUNT: u128 = 5_000_000;

async fn ready(
    fake: FakeProvider,
    gateway: FakeGateway,
) -> (Arc<BridgeOrchestrator>, Arc<FakeProvider>, Arc<FakeGateway>) {
    {
        let mut providers = fake.providers.lock().unwrap();
        if providers.is_empty() {
            *providers = vec![provider(1, true), provider(2, true)];
        }
    }
    let fake = Arc::new(fake);
    let gateway = Arc::new(gateway);
    let orch = Arc::new(orchestrator(fake.clone(), gateway.clone()));

    orch.load_providers().await.unwrap();
    orch.select_provider(ProviderId(1)).await.unwrap();
    (orch, fake, gateway)
}

async fn accepted_peg_out(orch: &BridgeOrchestrator) -> (Quote, QuoteSignature) {
    let quotes = orch
        .request_quotes(QuoteRequest::peg_out(AMOUNT, "bc1qdest"))
        .await
        .unwrap();
    let quote = quotes[0].clone();
    let accepted = orch.accept_peg_out(&quote).await.unwrap();
    (quote, accepted.signature().clone())
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<BridgeEvent>) -> Vec<BridgeEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_select_provider_rejects_inactive_and_unknown() {
    let fake = Arc::new(FakeProvider::with_providers(vec![
        provider(1, true),
        provider(2, false),
    ]));
    let orch = orchestrator(fake, Arc::new(FakeGateway::default()));

    let loaded = orch.load_providers().await.unwrap();
    assert_eq!(loaded.len(), 2);

    assert_eq!(
        orch.select_provider(ProviderId(2)).await,
        Err(SelectionError::ProviderInactive {
            provider_id: ProviderId(2)
        })
    );
    assert_eq!(
        orch.select_provider(ProviderId(9)).await,
        Err(SelectionError::UnknownProvider {
            provider_id: ProviderId(9)
        })
    );
    assert!(orch.selected_provider().await.is_none());

    orch.select_provider(ProviderId(1)).await.unwrap();
    assert_eq!(
        orch.selected_provider().await.map(|p| p.id),
        Some(ProviderId(1))
    );
}

#[tokio::test]
async fn test_peg_in_quote_and_accept() {
    let (orch, _, _) = ready(FakeProvider::default(), FakeGateway::default()).await;

    let quotes = orch
        .request_quotes(QuoteRequest::peg_in(AMOUNT))
        .await
        .unwrap();
    assert!(!quotes.is_empty());
    assert!(quotes.iter().all(|q| q.provider_id == ProviderId(1)));
    assert!(quotes.iter().all(|q| q.direction == Direction::PegIn));

    let accepted = orch.accept_peg_in(&quotes[0]).await.unwrap();
    let deposit_address = accepted.deposit_address().unwrap().to_string();
    assert!(!deposit_address.is_empty());

    let txs = orch.transactions().await;
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].kind, Direction::PegIn);
    assert_eq!(txs[0].status, TransactionStatus::Pending);
    assert_eq!(txs[0].amount, AMOUNT);
    assert_eq!(txs[0].quote_id, quotes[0].id);
    assert_eq!(txs[0].deposit_address.as_deref(), Some(deposit_address.as_str()));
}

#[tokio::test]
async fn test_foreign_quotes_are_filtered() {
    let fake = FakeProvider::default();
    *fake.leak_foreign.lock().unwrap() = true;
    let (orch, _, _) = ready(fake, FakeGateway::default()).await;

    let quotes = orch
        .request_quotes(QuoteRequest::peg_in(AMOUNT))
        .await
        .unwrap();
    assert_eq!(quotes.len(), 2);
    assert!(quotes.iter().all(|q| q.provider_id == ProviderId(1)));
    assert_eq!(orch.current_quotes().await, quotes);
}

#[tokio::test]
async fn test_local_validation_issues_no_network_call() {
    let mut api = MockProviderApi::new();
    api.expect_providers()
        .times(1)
        .returning(|| Ok(vec![provider(1, true)]));
    api.expect_quotes().never();

    let orch = orchestrator(Arc::new(api), Arc::new(MockChainGateway::new()));

    assert_eq!(
        orch.request_quotes(QuoteRequest::peg_in(AMOUNT)).await,
        Err(NegotiationError::NoProviderSelected)
    );

    orch.load_providers().await.unwrap();
    orch.select_provider(ProviderId(1)).await.unwrap();

    let missing = QuoteRequest {
        direction: Direction::PegOut,
        amount: AMOUNT,
        destination_address: None,
    };
    assert_eq!(
        orch.request_quotes(missing).await,
        Err(NegotiationError::MissingDestination {
            direction: Direction::PegOut
        })
    );
    assert_eq!(
        orch.request_quotes(QuoteRequest::peg_out(AMOUNT, "  ")).await,
        Err(NegotiationError::MissingDestination {
            direction: Direction::PegOut
        })
    );
    assert_eq!(
        orch.request_quotes(QuoteRequest::peg_in(0)).await,
        Err(NegotiationError::InvalidAmount {
            direction: Direction::PegIn
        })
    );
}

#[tokio::test]
async fn test_failed_deposit_records_nothing_and_may_be_retried() {
    let gateway = FakeGateway::answering(vec![Err(GatewayError::InsufficientFunds(
        "insufficient funds for gas * price + value".into(),
    ))]);
    let (orch, _, gateway) = ready(FakeProvider::default(), gateway).await;
    let (quote, signature) = accepted_peg_out(&orch).await;

    assert_eq!(
        orch.deposit_pegout(&quote, &signature).await,
        Err(DepositError::InsufficientFunds {
            quote_id: quote.id.clone(),
            required: AMOUNT + AMOUNT / 100,
        })
    );
    assert!(orch.transactions().await.is_empty());

    let tx_hash = orch.deposit_pegout(&quote, &signature).await.unwrap();
    let txs = orch.transactions().await;
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].kind, Direction::PegOut);
    assert_eq!(txs[0].status, TransactionStatus::Pending);
    assert_eq!(txs[0].tx_hash.as_deref(), Some(tx_hash.as_str()));
    assert_eq!(gateway.submissions(), 2);
}

#[tokio::test]
async fn test_deposit_pays_amount_plus_commission_to_destination() {
    let fake = Arc::new(FakeProvider::with_providers(vec![provider(1, true)]));
    let mut chain = MockChainGateway::new();
    chain
        .expect_submit_deposit()
        .withf(|call| call.value == 5_050_000 && call.destination == "bc1qdest")
        .times(1)
        .returning(|_| Ok("0xfeed".to_string()));

    let orch = orchestrator(fake, Arc::new(chain));
    orch.load_providers().await.unwrap();
    orch.select_provider(ProviderId(1)).await.unwrap();

    let (quote, signature) = accepted_peg_out(&orch).await;
    assert_eq!(orch.deposit_pegout(&quote, &signature).await.unwrap(), "0xfeed");
}

#[tokio::test]
async fn test_accept_twice_is_rejected_without_network_call() {
    let (orch, fake, _) = ready(FakeProvider::default(), FakeGateway::default()).await;
    let quotes = orch
        .request_quotes(QuoteRequest::peg_in(AMOUNT))
        .await
        .unwrap();

    orch.accept_peg_in(&quotes[0]).await.unwrap();
    assert_eq!(
        orch.accept_peg_in(&quotes[0]).await,
        Err(AcceptanceError::AlreadyAccepted {
            quote_id: quotes[0].id.clone()
        })
    );
    assert_eq!(fake.accept_calls(), 1);
    assert_eq!(orch.transactions().await.len(), 1);
}

#[tokio::test]
async fn test_concurrent_accept_reaches_provider_once() {
    let gate = Gate::new();
    let (orch, fake, _) = ready(
        FakeProvider::default().with_accept_gate(gate.clone()),
        FakeGateway::default(),
    )
    .await;
    let quotes = orch
        .request_quotes(QuoteRequest::peg_in(AMOUNT))
        .await
        .unwrap();

    let first = {
        let orch = orch.clone();
        let quote = quotes[0].clone();
        tokio::spawn(async move { orch.accept_peg_in(&quote).await })
    };
    gate.entered.notified().await;

    assert!(matches!(
        orch.accept_peg_in(&quotes[0]).await,
        Err(AcceptanceError::AlreadyAccepted { .. })
    ));

    gate.release();
    assert!(first.await.unwrap().is_ok());
    assert_eq!(fake.accept_calls(), 1);
}

#[tokio::test]
async fn test_distinct_quotes_accept_concurrently() {
    let (orch, fake, _) = ready(FakeProvider::default(), FakeGateway::default()).await;
    let quotes = orch
        .request_quotes(QuoteRequest::peg_in(AMOUNT))
        .await
        .unwrap();

    let results = futures::future::join_all(quotes.iter().map(|q| orch.accept_peg_in(q))).await;
    for result in results {
        tokio_test::assert_ok!(result);
    }
    assert_eq!(fake.accept_calls(), quotes.len());
    assert_eq!(orch.transactions().await.len(), quotes.len());
}

#[tokio::test]
async fn test_failed_accept_can_be_retried() {
    let fake = FakeProvider::default();
    *fake.accept_error.lock().unwrap() = Some(ProviderError::Unreachable("connection reset".into()));
    let (orch, fake, _) = ready(fake, FakeGateway::default()).await;
    let quotes = orch
        .request_quotes(QuoteRequest::peg_in(AMOUNT))
        .await
        .unwrap();

    assert!(matches!(
        orch.accept_peg_in(&quotes[0]).await,
        Err(AcceptanceError::ProviderUnreachable { provider_id: ProviderId(1), .. })
    ));
    assert!(orch.transactions().await.is_empty());

    *fake.accept_error.lock().unwrap() = None;
    orch.accept_peg_in(&quotes[0]).await.unwrap();
    assert_eq!(fake.accept_calls(), 2);
}

#[tokio::test]
async fn test_rejected_accept_surfaces_provider_message() {
    let fake = FakeProvider::default();
    *fake.accept_error.lock().unwrap() = Some(ProviderError::Rejected {
        status: 410,
        message: "quote expired".into(),
    });
    let (orch, _, _) = ready(fake, FakeGateway::default()).await;
    let quotes = orch
        .request_quotes(QuoteRequest::peg_in(AMOUNT))
        .await
        .unwrap();

    match orch.accept_peg_in(&quotes[0]).await {
        Err(AcceptanceError::ProviderRejected { message, quote_id, .. }) => {
            assert!(message.contains("quote expired"));
            assert_eq!(quote_id, quotes[0].id);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_peg_in_without_deposit_address_consumes_quote() {
    let fake = FakeProvider::default();
    *fake.omit_deposit_address.lock().unwrap() = true;
    let (orch, _, _) = ready(fake, FakeGateway::default()).await;
    let quotes = orch
        .request_quotes(QuoteRequest::peg_in(AMOUNT))
        .await
        .unwrap();

    assert_eq!(
        orch.accept_peg_in(&quotes[0]).await,
        Err(AcceptanceError::MissingDepositAddress {
            provider_id: ProviderId(1),
            quote_id: quotes[0].id.clone(),
        })
    );
    assert!(matches!(
        orch.accept_peg_in(&quotes[0]).await,
        Err(AcceptanceError::AlreadyAccepted { .. })
    ));
    assert!(orch.transactions().await.is_empty());
}

#[tokio::test]
async fn test_acceptance_preconditions() {
    let (orch, fake, _) = ready(FakeProvider::default(), FakeGateway::default()).await;
    let quotes = orch
        .request_quotes(QuoteRequest::peg_in(AMOUNT))
        .await
        .unwrap();
    let quote = quotes[0].clone();

    let foreign = Quote {
        provider_id: ProviderId(2),
        ..quote.clone()
    };
    assert_eq!(
        orch.accept_peg_in(&foreign).await,
        Err(AcceptanceError::ProviderMismatch {
            quote_id: quote.id.clone(),
            quote_provider: ProviderId(2),
            selected: ProviderId(1),
        })
    );

    assert_eq!(
        orch.accept_peg_out(&quote).await,
        Err(AcceptanceError::DirectionMismatch {
            quote_id: quote.id.clone(),
            expected: Direction::PegOut,
            actual: Direction::PegIn,
        })
    );

    let unknown = Quote {
        id: QuoteId::from("never-issued"),
        ..quote.clone()
    };
    assert_eq!(
        orch.accept_peg_in(&unknown).await,
        Err(AcceptanceError::UnknownQuote {
            quote_id: QuoteId::from("never-issued")
        })
    );
    assert_eq!(fake.accept_calls(), 0);
}

#[tokio::test]
async fn test_direction_is_checked_against_cached_quote() {
    let (orch, fake, gateway) = ready(FakeProvider::default(), FakeGateway::default()).await;
    let quotes = orch
        .request_quotes(QuoteRequest::peg_in(AMOUNT))
        .await
        .unwrap();

    let relabeled = Quote {
        direction: Direction::PegOut,
        destination_address: Some("bc1qdest".into()),
        ..quotes[0].clone()
    };
    assert_eq!(
        orch.accept_peg_out(&relabeled).await,
        Err(AcceptanceError::DirectionMismatch {
            quote_id: quotes[0].id.clone(),
            expected: Direction::PegOut,
            actual: Direction::PegIn,
        })
    );
    assert_eq!(fake.accept_calls(), 0);

    let signature = QuoteSignature(format!("0x{}", hex::encode(quotes[0].id.0.as_bytes())));
    assert_eq!(
        orch.deposit_pegout(&relabeled, &signature).await,
        Err(DepositError::NotAccepted {
            quote_id: quotes[0].id.clone()
        })
    );
    assert_eq!(gateway.submissions(), 0);

    // The quote is still available in its own direction
    orch.accept_peg_in(&quotes[0]).await.unwrap();
    assert_eq!(fake.accept_calls(), 1);
}

#[tokio::test]
async fn test_dropped_accept_releases_reservation() {
    let gate = Gate::new();
    let (orch, fake, _) = ready(
        FakeProvider::default().with_accept_gate(gate.clone()),
        FakeGateway::default(),
    )
    .await;
    let quotes = orch
        .request_quotes(QuoteRequest::peg_in(AMOUNT))
        .await
        .unwrap();

    let inflight = {
        let orch = orch.clone();
        let quote = quotes[0].clone();
        tokio::spawn(async move { orch.accept_peg_in(&quote).await })
    };
    gate.entered.notified().await;
    inflight.abort();
    assert!(inflight.await.unwrap_err().is_cancelled());
    tokio::task::yield_now().await;

    assert!(orch.accepted_quote(&quotes[0].id).await.is_none());
    assert!(orch.transactions().await.is_empty());

    gate.release();
    let accepted = orch.accept_peg_in(&quotes[0]).await.unwrap();
    assert!(matches!(accepted, AcceptedQuote::PegIn { .. }));
    assert_eq!(fake.accept_calls(), 2);
    assert_eq!(orch.transactions().await.len(), 1);
}

#[tokio::test]
async fn test_expired_quote_is_rejected_before_provider_call() {
    let fake = FakeProvider::default();
    fake.set_validity(-1_000, 10);
    let (orch, fake, _) = ready(fake, FakeGateway::default()).await;
    let quotes = orch
        .request_quotes(QuoteRequest::peg_in(AMOUNT))
        .await
        .unwrap();

    assert_eq!(
        orch.accept_peg_in(&quotes[0]).await,
        Err(AcceptanceError::QuoteExpired {
            quote_id: quotes[0].id.clone()
        })
    );
    assert_eq!(fake.accept_calls(), 0);
}

#[tokio::test]
async fn test_selection_change_discards_inflight_quotes() {
    let gate = Gate::new();
    let (orch, fake, _) = ready(
        FakeProvider::default().with_quote_gate(gate.clone()),
        FakeGateway::default(),
    )
    .await;
    let mut events = orch.subscribe();

    let inflight = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.request_quotes(QuoteRequest::peg_in(AMOUNT)).await })
    };
    gate.entered.notified().await;

    orch.select_provider(ProviderId(2)).await.unwrap();
    gate.release();

    assert_eq!(
        inflight.await.unwrap(),
        Err(NegotiationError::SelectionChanged {
            requested: ProviderId(1),
            direction: Direction::PegIn,
        })
    );
    assert!(orch.current_quotes().await.is_empty());
    assert!(drain(&mut events)
        .iter()
        .any(|e| matches!(e, BridgeEvent::QuotesDiscarded { provider_id: ProviderId(1), .. })));

    gate.release();
    let quotes = orch
        .request_quotes(QuoteRequest::peg_in(AMOUNT))
        .await
        .unwrap();
    assert!(quotes.iter().all(|q| q.provider_id == ProviderId(2)));
    assert!(orch
        .current_quotes()
        .await
        .iter()
        .all(|q| q.provider_id == ProviderId(2)));
    assert_eq!(fake.quote_calls(), 2);
}

#[tokio::test]
async fn test_selection_change_discards_inflight_acceptance() {
    let gate = Gate::new();
    let (orch, _, _) = ready(
        FakeProvider::default().with_accept_gate(gate.clone()),
        FakeGateway::default(),
    )
    .await;
    let quotes = orch
        .request_quotes(QuoteRequest::peg_in(AMOUNT))
        .await
        .unwrap();

    let inflight = {
        let orch = orch.clone();
        let quote = quotes[0].clone();
        tokio::spawn(async move { orch.accept_peg_in(&quote).await })
    };
    gate.entered.notified().await;

    orch.select_provider(ProviderId(2)).await.unwrap();
    gate.release();

    assert_eq!(
        inflight.await.unwrap(),
        Err(AcceptanceError::SelectionChanged {
            requested: ProviderId(1),
            quote_id: quotes[0].id.clone(),
        })
    );
    assert!(orch.transactions().await.is_empty());
    assert!(orch.accepted_quote(&quotes[0].id).await.is_none());
}

#[tokio::test]
async fn test_reloading_without_selected_provider_clears_session() {
    let (orch, fake, _) = ready(FakeProvider::default(), FakeGateway::default()).await;
    orch.request_quotes(QuoteRequest::peg_in(AMOUNT))
        .await
        .unwrap();
    assert!(!orch.current_quotes().await.is_empty());

    let mut events = orch.subscribe();

    *fake.providers.lock().unwrap() = vec![provider(1, false), provider(2, true)];
    orch.load_providers().await.unwrap();

    assert!(orch.selected_provider().await.is_none());
    assert!(orch.current_quotes().await.is_empty());
    assert_eq!(
        drain(&mut events),
        vec![
            BridgeEvent::ProvidersLoaded { count: 2 },
            BridgeEvent::SelectionCleared {
                provider_id: ProviderId(1)
            },
        ]
    );

    // Reloading while the selection survives publishes no clearing
    orch.select_provider(ProviderId(2)).await.unwrap();
    drain(&mut events);
    orch.load_providers().await.unwrap();
    assert_eq!(
        drain(&mut events),
        vec![BridgeEvent::ProvidersLoaded { count: 2 }]
    );
}

#[tokio::test]
async fn test_deposit_requires_matching_peg_out_binding() {
    let (orch, _, gateway) = ready(FakeProvider::default(), FakeGateway::default()).await;
    let quotes = orch
        .request_quotes(QuoteRequest::peg_out(AMOUNT, "bc1qdest"))
        .await
        .unwrap();
    let quote = quotes[0].clone();

    assert_eq!(
        orch.deposit_pegout(&quote, &QuoteSignature::from("0xabcd"))
            .await,
        Err(DepositError::NotAccepted {
            quote_id: quote.id.clone()
        })
    );

    let accepted = orch.accept_peg_out(&quote).await.unwrap();
    assert!(matches!(accepted, AcceptedQuote::PegOut { .. }));
    assert_eq!(
        orch.deposit_pegout(&quote, &QuoteSignature::from("0xabcd"))
            .await,
        Err(DepositError::NotAccepted {
            quote_id: quote.id.clone()
        })
    );
    assert_eq!(gateway.submissions(), 0);
    assert!(orch.transactions().await.is_empty());
}

#[tokio::test]
async fn test_deposit_is_submitted_once() {
    let gate = Gate::new();
    let (orch, _, gateway) = ready(
        FakeProvider::default(),
        FakeGateway::default().with_gate(gate.clone()),
    )
    .await;
    let (quote, signature) = accepted_peg_out(&orch).await;

    let first = {
        let orch = orch.clone();
        let (quote, signature) = (quote.clone(), signature.clone());
        tokio::spawn(async move { orch.deposit_pegout(&quote, &signature).await })
    };
    gate.entered.notified().await;

    let second = {
        let orch = orch.clone();
        let (quote, signature) = (quote.clone(), signature.clone());
        tokio::spawn(async move { orch.deposit_pegout(&quote, &signature).await })
    };
    gate.release();

    assert!(first.await.unwrap().is_ok());
    assert_eq!(
        second.await.unwrap(),
        Err(DepositError::AlreadyDeposited {
            quote_id: quote.id.clone()
        })
    );
    assert_eq!(gateway.submissions(), 1);
    assert_eq!(orch.transactions().await.len(), 1);
}

#[tokio::test]
async fn test_deposit_after_expiry_fails() {
    let fake = FakeProvider::default();
    fake.set_validity(0, 2);
    let (orch, _, gateway) = ready(fake, FakeGateway::default()).await;
    let (quote, signature) = accepted_peg_out(&orch).await;

    tokio::time::sleep(Duration::from_millis(2_100)).await;

    assert_eq!(
        orch.deposit_pegout(&quote, &signature).await,
        Err(DepositError::QuoteExpired {
            quote_id: quote.id.clone()
        })
    );
    assert_eq!(gateway.submissions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unresponsive_provider_times_out() {
    let gate = Gate::new();
    let (orch, _, _) = ready(
        FakeProvider::default().with_quote_gate(gate),
        FakeGateway::default(),
    )
    .await;

    assert!(matches!(
        orch.request_quotes(QuoteRequest::peg_in(AMOUNT)).await,
        Err(NegotiationError::ProviderUnreachable {
            provider_id: ProviderId(1),
            direction: Direction::PegIn,
            ..
        })
    ));
    assert!(orch.current_quotes().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unresponsive_chain_times_out() {
    let gate = Gate::new();
    let (orch, _, _) = ready(
        FakeProvider::default(),
        FakeGateway::default().with_gate(gate),
    )
    .await;
    let (quote, signature) = accepted_peg_out(&orch).await;

    assert!(matches!(
        orch.deposit_pegout(&quote, &signature).await,
        Err(DepositError::ChainSubmissionFailed { .. })
    ));
    assert!(orch.transactions().await.is_empty());
}

#[tokio::test]
async fn test_finalization_is_idempotent() {
    let (orch, _, _) = ready(FakeProvider::default(), FakeGateway::default()).await;
    let quotes = orch
        .request_quotes(QuoteRequest::peg_in(AMOUNT))
        .await
        .unwrap();
    orch.accept_peg_in(&quotes[0]).await.unwrap();
    let id = orch.transactions().await[0].id;

    let done = orch
        .mark_transaction_status(
            TransactionSelector::Id(id),
            TransactionStatus::Completed,
            Some("0xbtc".into()),
        )
        .await
        .unwrap();
    assert_eq!(done.status, TransactionStatus::Completed);

    assert_eq!(
        orch.mark_transaction_status(TransactionSelector::Id(id), TransactionStatus::Failed, None)
            .await,
        Err(StatusUpdateError::AlreadyFinalized {
            id,
            status: TransactionStatus::Completed,
        })
    );
    let tx = orch.transaction(id).await.unwrap();
    assert_eq!(tx.status, TransactionStatus::Completed);
    assert_eq!(tx.tx_hash.as_deref(), Some("0xbtc"));
}

#[tokio::test]
async fn test_finalize_peg_out_by_tx_hash() {
    let (orch, _, _) = ready(FakeProvider::default(), FakeGateway::default()).await;
    let (quote, signature) = accepted_peg_out(&orch).await;
    let tx_hash = orch.deposit_pegout(&quote, &signature).await.unwrap();

    assert_eq!(
        orch.mark_transaction_status(
            TransactionSelector::TxHash(tx_hash.clone()),
            TransactionStatus::Pending,
            None
        )
        .await,
        Err(StatusUpdateError::NotTerminal(TransactionStatus::Pending))
    );
    assert!(matches!(
        orch.mark_transaction_status(
            TransactionSelector::TxHash("0xmissing".into()),
            TransactionStatus::Failed,
            None
        )
        .await,
        Err(StatusUpdateError::TransactionNotFound(_))
    ));

    let failed = orch
        .mark_transaction_status(
            TransactionSelector::TxHash(tx_hash),
            TransactionStatus::Failed,
            None,
        )
        .await
        .unwrap();
    assert_eq!(failed.kind, Direction::PegOut);
    assert_eq!(failed.status, TransactionStatus::Failed);
}

#[tokio::test]
async fn test_snapshot_and_events_follow_session() {
    let fake = Arc::new(FakeProvider::with_providers(vec![
        provider(1, true),
        provider(2, true),
    ]));
    let orch = BridgeOrchestrator::new(
        fake,
        Arc::new(FakeGateway::default()),
        BridgeConfig::default(),
    );
    let mut events = orch.subscribe();

    orch.load_providers().await.unwrap();
    orch.select_provider(ProviderId(1)).await.unwrap();
    // Re-selecting the same provider is not a change
    orch.select_provider(ProviderId(1)).await.unwrap();
    let quotes = orch
        .request_quotes(QuoteRequest::peg_in(AMOUNT))
        .await
        .unwrap();
    orch.accept_peg_in(&quotes[0]).await.unwrap();

    let view = orch.snapshot().await;
    assert_eq!(view.providers.len(), 2);
    assert_eq!(view.selected_provider.map(|p| p.id), Some(ProviderId(1)));
    assert_eq!(view.current_quotes.len(), quotes.len());
    assert_eq!(view.transactions.len(), 1);

    let names: Vec<_> = drain(&mut events).iter().map(|e| e.name()).collect();
    assert_eq!(
        names,
        vec![
            "providers_loaded",
            "provider_selected",
            "quotes_received",
            "quote_accepted"
        ]
    );
}
