use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use rust_decimal_macros::dec;

use super::common::*;
use crate::workflows::payouts::domain::{
    LedgerEntryKind, PayoutRequest, PayoutRequestId, PayoutStatus,
};
use crate::workflows::payouts::evaluation::FixedPolicyConfig;
use crate::workflows::payouts::memory::ScriptedProcessor;
use crate::workflows::payouts::repository::{LedgerStore, StatusUpdate, StoreError};
use crate::workflows::payouts::service::{PayoutEvaluationService, PayoutServiceError};

#[tokio::test]
async fn eligible_request_is_paid_and_debited_once() {
    let (service, store, processor) = eligible_service();

    let report = service
        .evaluate_at(&request_id(), now())
        .await
        .expect("evaluation completes");

    assert!(report.success);
    assert!(report.approved);
    assert_eq!(report.status, PayoutStatus::Approved);
    assert_eq!(report.amount, Some(dec!(50.00)));
    assert_eq!(report.new_balance, Some(dec!(50.00)));
    let reference = report.external_reference.clone().expect("reference set");
    assert!(!reference.is_empty());

    let account = store.account(&account_id()).expect("account");
    assert_eq!(account.balance, dec!(50.00));

    let transactions = store.transactions_for(&request_id());
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].amount, dec!(-50.00));
    assert_eq!(transactions[0].kind, LedgerEntryKind::Debit);
    assert!(transactions[0].description.contains(&reference));

    let stored = store.request(&request_id()).expect("request");
    assert_eq!(stored.status, PayoutStatus::Approved);
    assert_eq!(stored.external_reference, Some(reference));
    assert_eq!(stored.automatic_approval, Some(true));
    assert_eq!(stored.paid_at, Some(now()));
    assert_eq!(processor.payouts().len(), 1);
}

#[tokio::test]
async fn large_request_is_deferred_to_manual_review() {
    let mut account = eligible_account();
    account.balance = dec!(1000.00);
    let store = Arc::new(seeded_store(account, payout_request(dec!(500.00)), 6, 0));
    let processor = Arc::new(ScriptedProcessor::new());
    let service = build_service(store.clone(), processor.clone(), policy_config());

    let report = service
        .evaluate_at(&request_id(), now())
        .await
        .expect("evaluation completes");

    assert!(report.success);
    assert!(!report.approved);
    assert!(report.requires_manual_approval);
    assert_eq!(report.status, PayoutStatus::Pending);
    assert_eq!(report.reason.as_deref(), Some("amount exceeds automatic limit"));

    let stored = store.request(&request_id()).expect("request");
    assert_eq!(stored.status, PayoutStatus::Pending);
    assert!(stored.manual_review);
    assert_eq!(stored.reason.as_deref(), Some("amount exceeds automatic limit"));
    assert_eq!(
        store.account(&account_id()).expect("account").balance,
        dec!(1000.00)
    );
    assert!(processor.instructions().is_empty());
}

#[tokio::test]
async fn small_request_is_rejected() {
    let store = Arc::new(seeded_store(
        eligible_account(),
        payout_request(dec!(30.00)),
        6,
        0,
    ));
    let processor = Arc::new(ScriptedProcessor::new());
    let service = build_service(store.clone(), processor.clone(), policy_config());

    let report = service
        .evaluate_at(&request_id(), now())
        .await
        .expect("evaluation completes");

    assert!(report.success);
    assert!(!report.approved);
    assert!(!report.requires_manual_approval);
    assert_eq!(report.status, PayoutStatus::Rejected);
    assert_eq!(report.reason.as_deref(), Some("amount below minimum"));

    let stored = store.request(&request_id()).expect("request");
    assert_eq!(stored.status, PayoutStatus::Rejected);
    assert_eq!(stored.processed_at, Some(now()));
    assert!(processor.instructions().is_empty());
    assert!(store.transactions().is_empty());
}

#[tokio::test]
async fn open_dispute_defers_the_request() {
    let store = Arc::new(seeded_store(
        eligible_account(),
        payout_request(dec!(50.00)),
        6,
        1,
    ));
    let processor = Arc::new(ScriptedProcessor::new());
    let service = build_service(store.clone(), processor.clone(), policy_config());

    let report = service
        .evaluate_at(&request_id(), now())
        .await
        .expect("evaluation completes");

    assert!(report.requires_manual_approval);
    assert_eq!(report.status, PayoutStatus::Pending);
    assert_eq!(report.reason.as_deref(), Some("open disputes present"));
    assert!(processor.instructions().is_empty());
    assert_eq!(
        store.account(&account_id()).expect("account").balance,
        dec!(100.00)
    );
}

#[tokio::test]
async fn insufficient_balance_rejects_without_reading_risk_signals() {
    let mut account = eligible_account();
    account.balance = dec!(40.00);
    account.became_hubber_at = Some(now() - ChronoDuration::days(3));
    let store = Arc::new(InstrumentedStore::wrap(seeded_store(
        account,
        payout_request(dec!(60.00)),
        0,
        2,
    )));
    let processor = Arc::new(ScriptedProcessor::new());
    let service = PayoutEvaluationService::new(
        store.clone(),
        processor.clone(),
        Arc::new(FixedPolicyConfig(policy_config())),
        settlement_options(),
    );

    let report = service
        .evaluate_at(&request_id(), now())
        .await
        .expect("evaluation completes");

    assert_eq!(report.status, PayoutStatus::Rejected);
    assert_eq!(report.reason.as_deref(), Some("insufficient balance"));
    assert_eq!(store.signal_reads(), 0);
    assert!(processor.instructions().is_empty());
}

#[tokio::test]
async fn inactive_processor_account_rejects_before_risk_checks() {
    let mut account = eligible_account();
    account.processor.payouts_enabled = false;
    account.became_hubber_at = Some(now() - ChronoDuration::days(2));
    let store = Arc::new(InstrumentedStore::wrap(seeded_store(
        account,
        payout_request(dec!(50.00)),
        0,
        3,
    )));
    let processor = Arc::new(ScriptedProcessor::new());
    let service = PayoutEvaluationService::new(
        store.clone(),
        processor.clone(),
        Arc::new(FixedPolicyConfig(policy_config())),
        settlement_options(),
    );

    let report = service
        .evaluate_at(&request_id(), now())
        .await
        .expect("evaluation completes");

    assert!(!report.approved);
    assert!(!report.requires_manual_approval);
    assert_eq!(report.status, PayoutStatus::Rejected);
    assert_eq!(
        report.reason.as_deref(),
        Some("processor account not fully activated")
    );
    assert_eq!(store.signal_reads(), 0);
    assert!(processor.instructions().is_empty());
    assert_eq!(
        store.inner.account(&account_id()).expect("account").balance,
        dec!(100.00)
    );
}

#[tokio::test]
async fn risk_signals_are_read_once_screening_passes() {
    let store = Arc::new(InstrumentedStore::wrap(seeded_store(
        eligible_account(),
        payout_request(dec!(50.00)),
        6,
        0,
    )));
    let service = PayoutEvaluationService::new(
        store.clone(),
        Arc::new(ScriptedProcessor::new()),
        Arc::new(FixedPolicyConfig(policy_config())),
        settlement_options(),
    );

    let report = service
        .evaluate_at(&request_id(), now())
        .await
        .expect("evaluation completes");

    assert!(report.approved);
    assert_eq!(store.signal_reads(), 2);
}

#[tokio::test]
async fn repeated_trigger_reports_already_processed() {
    let (service, store, processor) = eligible_service();

    service
        .evaluate_at(&request_id(), now())
        .await
        .expect("first evaluation completes");
    let second = service.evaluate_at(&request_id(), now()).await;

    match second {
        Err(PayoutServiceError::AlreadyProcessed { id, status }) => {
            assert_eq!(id, request_id());
            assert_eq!(status, PayoutStatus::Approved);
        }
        other => panic!("expected already processed, got {other:?}"),
    }
    assert_eq!(processor.payouts().len(), 1);
    assert_eq!(store.transactions_for(&request_id()).len(), 1);
    assert_eq!(
        store.account(&account_id()).expect("account").balance,
        dec!(50.00)
    );
}

#[tokio::test]
async fn concurrent_triggers_race_on_the_claim_and_settle_once() {
    let store = Arc::new(YieldingStore {
        inner: seeded_store(eligible_account(), payout_request(dec!(50.00)), 6, 0),
    });
    let processor = Arc::new(ScriptedProcessor::new());
    let service = PayoutEvaluationService::new(
        store.clone(),
        processor.clone(),
        Arc::new(FixedPolicyConfig(policy_config())),
        settlement_options(),
    );
    let id = request_id();

    // Both evaluations read the request while it is still pending, so only the
    // conditional claim can separate them.
    let (first, second) = tokio::join!(
        service.evaluate_at(&id, now()),
        service.evaluate_at(&id, now())
    );

    let outcomes = [first, second];
    let approved = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, Ok(report) if report.approved))
        .count();
    let lost_claim = outcomes
        .iter()
        .filter(|outcome| {
            matches!(
                outcome,
                Err(PayoutServiceError::AlreadyProcessed {
                    status: PayoutStatus::Processing,
                    ..
                })
            )
        })
        .count();
    assert_eq!(approved, 1);
    assert_eq!(lost_claim, 1);
    assert_eq!(processor.instructions().len(), 1);
    assert_eq!(processor.payouts().len(), 1);
    assert_eq!(store.inner.transactions().len(), 1);
    assert_eq!(
        store.inner.account(&account_id()).expect("account").balance,
        dec!(50.00)
    );
}

#[tokio::test]
async fn stale_claims_list_requests_stranded_in_processing() {
    let (service, store, _processor) = eligible_service();
    let fresh_id = PayoutRequestId("po-000002".to_string());
    store
        .insert_request(PayoutRequest::new(
            fresh_id.clone(),
            account_id(),
            dec!(60.00),
            now() - ChronoDuration::hours(1),
        ))
        .expect("request stored");
    let stranded_at = now() - ChronoDuration::minutes(45);
    store
        .transition_status(
            &request_id(),
            PayoutStatus::Pending,
            StatusUpdate::claim(stranded_at),
        )
        .await
        .expect("claim applied");
    store
        .transition_status(
            &fresh_id,
            PayoutStatus::Pending,
            StatusUpdate::claim(now() - ChronoDuration::minutes(2)),
        )
        .await
        .expect("claim applied");

    let stale = service
        .stale_claims_at(now(), ChronoDuration::minutes(15), 10)
        .await
        .expect("listing completes");

    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].id, request_id());
    assert_eq!(stale[0].claimed_at, Some(stranded_at));

    let retrigger = service.evaluate_at(&request_id(), now()).await;
    assert!(matches!(
        retrigger,
        Err(PayoutServiceError::AlreadyProcessed {
            status: PayoutStatus::Processing,
            ..
        })
    ));
}

#[tokio::test]
async fn disabled_feature_defers_everything() {
    let mut config = policy_config();
    config.automatic_payouts_enabled = false;
    let store = Arc::new(seeded_store(
        eligible_account(),
        payout_request(dec!(50.00)),
        6,
        0,
    ));
    let processor = Arc::new(ScriptedProcessor::new());
    let service = build_service(store.clone(), processor.clone(), config);

    let report = service
        .evaluate_at(&request_id(), now())
        .await
        .expect("evaluation completes");

    assert!(report.automatic_payouts_disabled());
    assert!(report.requires_manual_approval);
    assert_eq!(report.status, PayoutStatus::Pending);
    assert!(processor.instructions().is_empty());
}

#[tokio::test]
async fn unknown_request_is_not_found() {
    let (service, _store, _processor) = eligible_service();
    let missing = PayoutRequestId("po-missing".to_string());

    let result = service.evaluate_at(&missing, now()).await;

    assert!(matches!(result, Err(PayoutServiceError::NotFound(id)) if id == missing));
}

#[tokio::test]
async fn request_without_account_is_reported() {
    let store = Arc::new(crate::workflows::payouts::InMemoryLedgerStore::new());
    store
        .insert_request(payout_request(dec!(50.00)))
        .expect("request stored");
    let service = build_service(
        store.clone(),
        Arc::new(ScriptedProcessor::new()),
        policy_config(),
    );

    let result = service.evaluate_at(&request_id(), now()).await;

    assert!(matches!(result, Err(PayoutServiceError::AccountNotFound(_))));
    assert_eq!(
        store.request(&request_id()).expect("request").status,
        PayoutStatus::Pending
    );
}

#[tokio::test]
async fn non_positive_amount_is_invalid() {
    let store = Arc::new(seeded_store(
        eligible_account(),
        payout_request(dec!(0.00)),
        6,
        0,
    ));
    let service = build_service(
        store.clone(),
        Arc::new(ScriptedProcessor::new()),
        policy_config(),
    );

    let result = service.evaluate_at(&request_id(), now()).await;

    assert!(matches!(result, Err(PayoutServiceError::InvalidAmount { .. })));
    assert_eq!(
        store.request(&request_id()).expect("request").status,
        PayoutStatus::Pending
    );
}

#[tokio::test]
async fn unreachable_store_is_an_error_not_a_rejection() {
    let service = PayoutEvaluationService::new(
        Arc::new(UnavailableStore),
        Arc::new(ScriptedProcessor::new()),
        Arc::new(FixedPolicyConfig(policy_config())),
        settlement_options(),
    );

    let result = service.evaluate_at(&request_id(), now()).await;

    assert!(matches!(
        result,
        Err(PayoutServiceError::Store(StoreError::Unavailable(_)))
    ));
}

#[tokio::test]
async fn sweep_skips_requests_waiting_on_a_reviewer() {
    let (service, store, _processor) = eligible_service();
    let mut deferred = PayoutRequest::new(
        PayoutRequestId("po-000002".to_string()),
        account_id(),
        dec!(500.00),
        now() - ChronoDuration::hours(1),
    );
    deferred.manual_review = true;
    deferred.reason = Some("amount exceeds automatic limit".to_string());
    store.insert_request(deferred).expect("request stored");

    let entries = service.sweep_at(10, now()).await.expect("sweep completes");

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].payout_request_id, request_id());
    assert!(entries[0].error.is_none());
    assert!(entries[0]
        .report
        .as_ref()
        .is_some_and(|report| report.approved));
    assert!(
        store
            .request(&PayoutRequestId("po-000002".to_string()))
            .expect("request")
            .manual_review
    );
}

#[tokio::test]
async fn sweep_records_failures_per_request() {
    let store = Arc::new(crate::workflows::payouts::InMemoryLedgerStore::new());
    store
        .insert_request(payout_request(dec!(50.00)))
        .expect("request stored");
    let service = build_service(
        store.clone(),
        Arc::new(ScriptedProcessor::new()),
        policy_config(),
    );

    let entries = service.sweep_at(10, now()).await.expect("sweep completes");

    assert_eq!(entries.len(), 1);
    assert!(entries[0].report.is_none());
    assert!(entries[0]
        .error
        .as_deref()
        .is_some_and(|message| message.contains("account hub-anna not found")));
}

#[tokio::test]
async fn status_lookup_reflects_stored_request() {
    let (service, _store, _processor) = eligible_service();

    let before = service.get(&request_id()).await.expect("request found");
    assert_eq!(before.status, PayoutStatus::Pending);

    service
        .evaluate_at(&request_id(), now())
        .await
        .expect("evaluation completes");
    let after = service.get(&request_id()).await.expect("request found");
    assert_eq!(after.status, PayoutStatus::Approved);

    let missing = service
        .get(&PayoutRequestId("po-missing".to_string()))
        .await;
    assert!(matches!(missing, Err(PayoutServiceError::NotFound(_))));
}
