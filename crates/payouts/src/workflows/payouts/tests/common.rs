use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use crate::workflows::payouts::domain::{
    Account, AccountId, BookingRecord, BookingStatus, Dispute, DisputeStatus, PayoutRequest,
    PayoutRequestId, PayoutStatus, ProcessorAccount, RiskSignals,
};
use crate::workflows::payouts::evaluation::{FixedPolicyConfig, PayoutPolicyConfig};
use crate::workflows::payouts::memory::{InMemoryLedgerStore, ScriptedProcessor};
use crate::workflows::payouts::repository::{
    LedgerStore, SettlementCommit, SettlementReceipt, StatusUpdate, StoreError,
};
use crate::workflows::payouts::service::PayoutEvaluationService;
use crate::workflows::payouts::settlement::SettlementOptions;

pub(super) type MemoryService =
    PayoutEvaluationService<InMemoryLedgerStore, ScriptedProcessor, FixedPolicyConfig>;

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn policy_config() -> PayoutPolicyConfig {
    PayoutPolicyConfig {
        automatic_payouts_enabled: true,
        automatic_approval_ceiling: dec!(200.00),
        minimum_amount: dec!(50.00),
        minimum_tenure_days: 30,
        minimum_completed_transactions: 5,
    }
}

pub(super) fn settlement_options() -> SettlementOptions {
    SettlementOptions {
        currency: "eur".to_string(),
        processor_timeout: Duration::from_millis(200),
        store_timeout: Duration::from_millis(200),
    }
}

pub(super) fn account_id() -> AccountId {
    AccountId("hub-anna".to_string())
}

pub(super) fn request_id() -> PayoutRequestId {
    PayoutRequestId("po-000001".to_string())
}

/// Balance 100.00, hubber for 60 days, processor fully activated.
pub(super) fn eligible_account() -> Account {
    Account {
        id: account_id(),
        display_name: "Anna Rossi".to_string(),
        balance: dec!(100.00),
        processor: ProcessorAccount {
            account_id: Some("acct_anna".to_string()),
            charges_enabled: true,
            payouts_enabled: true,
        },
        created_at: now() - ChronoDuration::days(400),
        became_hubber_at: Some(now() - ChronoDuration::days(60)),
    }
}

pub(super) fn payout_request(amount: Decimal) -> PayoutRequest {
    PayoutRequest::new(
        request_id(),
        account_id(),
        amount,
        now() - ChronoDuration::hours(2),
    )
}

pub(super) fn eligible_signals() -> RiskSignals {
    RiskSignals {
        open_disputes: 0,
        completed_transactions: 6,
    }
}

/// Store holding one account and one pending request, with the given track record.
pub(super) fn seeded_store(
    account: Account,
    request: PayoutRequest,
    completed_bookings: u32,
    open_disputes: u32,
) -> InMemoryLedgerStore {
    let store = InMemoryLedgerStore::new();
    for index in 0..completed_bookings {
        store
            .insert_booking(BookingRecord {
                id: format!("bk-{index}"),
                hubber_id: account.id.clone(),
                status: BookingStatus::Completed,
            })
            .expect("booking stored");
    }
    store
        .insert_booking(BookingRecord {
            id: "bk-cancelled".to_string(),
            hubber_id: account.id.clone(),
            status: BookingStatus::Cancelled,
        })
        .expect("booking stored");
    for index in 0..open_disputes {
        store
            .insert_dispute(Dispute {
                id: format!("dp-{index}"),
                account_id: account.id.clone(),
                status: DisputeStatus::Open,
            })
            .expect("dispute stored");
    }
    store
        .insert_dispute(Dispute {
            id: "dp-resolved".to_string(),
            account_id: account.id.clone(),
            status: DisputeStatus::Resolved,
        })
        .expect("dispute stored");
    store.insert_account(account).expect("account stored");
    store.insert_request(request).expect("request stored");
    store
}

pub(super) fn build_service(
    store: Arc<InMemoryLedgerStore>,
    processor: Arc<ScriptedProcessor>,
    config: PayoutPolicyConfig,
) -> MemoryService {
    PayoutEvaluationService::new(
        store,
        processor,
        Arc::new(FixedPolicyConfig(config)),
        settlement_options(),
    )
}

/// Scenario A wiring: eligible account, 50.00 request, default thresholds.
pub(super) fn eligible_service() -> (
    MemoryService,
    Arc<InMemoryLedgerStore>,
    Arc<ScriptedProcessor>,
) {
    let store = Arc::new(seeded_store(
        eligible_account(),
        payout_request(dec!(50.00)),
        6,
        0,
    ));
    let processor = Arc::new(ScriptedProcessor::new());
    let service = build_service(store.clone(), processor.clone(), policy_config());
    (service, store, processor)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 16 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Store wrapper counting risk-signal reads and able to fail the settlement commit.
#[derive(Default)]
pub(super) struct InstrumentedStore {
    pub(super) inner: InMemoryLedgerStore,
    pub(super) signal_reads: AtomicUsize,
    pub(super) fail_commits: AtomicBool,
}

impl InstrumentedStore {
    pub(super) fn wrap(inner: InMemoryLedgerStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub(super) fn signal_reads(&self) -> usize {
        self.signal_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerStore for InstrumentedStore {
    async fn fetch_request(
        &self,
        id: &PayoutRequestId,
    ) -> Result<Option<PayoutRequest>, StoreError> {
        self.inner.fetch_request(id).await
    }

    async fn fetch_account(&self, id: &AccountId) -> Result<Option<Account>, StoreError> {
        self.inner.fetch_account(id).await
    }

    async fn open_dispute_count(&self, account_id: &AccountId) -> Result<u32, StoreError> {
        self.signal_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.open_dispute_count(account_id).await
    }

    async fn completed_transaction_count(
        &self,
        account_id: &AccountId,
    ) -> Result<u32, StoreError> {
        self.signal_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.completed_transaction_count(account_id).await
    }

    async fn transition_status(
        &self,
        id: &PayoutRequestId,
        expected: PayoutStatus,
        update: StatusUpdate,
    ) -> Result<PayoutRequest, StoreError> {
        self.inner.transition_status(id, expected, update).await
    }

    async fn commit_settlement(
        &self,
        commit: SettlementCommit,
    ) -> Result<SettlementReceipt, StoreError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("ledger write failed".to_string()));
        }
        self.inner.commit_settlement(commit).await
    }

    async fn pending_requests(&self, limit: usize) -> Result<Vec<PayoutRequest>, StoreError> {
        self.inner.pending_requests(limit).await
    }

    async fn stale_claims(
        &self,
        claimed_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PayoutRequest>, StoreError> {
        self.inner.stale_claims(claimed_before, limit).await
    }
}

/// Store wrapper that yields to the scheduler before every read, so evaluations joined on
/// one task interleave the way concurrent triggers against a real database would.
pub(super) struct YieldingStore {
    pub(super) inner: InMemoryLedgerStore,
}

#[async_trait]
impl LedgerStore for YieldingStore {
    async fn fetch_request(
        &self,
        id: &PayoutRequestId,
    ) -> Result<Option<PayoutRequest>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.fetch_request(id).await
    }

    async fn fetch_account(&self, id: &AccountId) -> Result<Option<Account>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.fetch_account(id).await
    }

    async fn open_dispute_count(&self, account_id: &AccountId) -> Result<u32, StoreError> {
        self.inner.open_dispute_count(account_id).await
    }

    async fn completed_transaction_count(
        &self,
        account_id: &AccountId,
    ) -> Result<u32, StoreError> {
        self.inner.completed_transaction_count(account_id).await
    }

    async fn transition_status(
        &self,
        id: &PayoutRequestId,
        expected: PayoutStatus,
        update: StatusUpdate,
    ) -> Result<PayoutRequest, StoreError> {
        self.inner.transition_status(id, expected, update).await
    }

    async fn commit_settlement(
        &self,
        commit: SettlementCommit,
    ) -> Result<SettlementReceipt, StoreError> {
        self.inner.commit_settlement(commit).await
    }

    async fn pending_requests(&self, limit: usize) -> Result<Vec<PayoutRequest>, StoreError> {
        self.inner.pending_requests(limit).await
    }

    async fn stale_claims(
        &self,
        claimed_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PayoutRequest>, StoreError> {
        self.inner.stale_claims(claimed_before, limit).await
    }
}

/// Store that always fails, standing in for an unreachable database.
pub(super) struct UnavailableStore;

#[async_trait]
impl LedgerStore for UnavailableStore {
    async fn fetch_request(
        &self,
        _id: &PayoutRequestId,
    ) -> Result<Option<PayoutRequest>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn fetch_account(&self, _id: &AccountId) -> Result<Option<Account>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn open_dispute_count(&self, _account_id: &AccountId) -> Result<u32, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn completed_transaction_count(
        &self,
        _account_id: &AccountId,
    ) -> Result<u32, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn transition_status(
        &self,
        _id: &PayoutRequestId,
        _expected: PayoutStatus,
        _update: StatusUpdate,
    ) -> Result<PayoutRequest, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn commit_settlement(
        &self,
        _commit: SettlementCommit,
    ) -> Result<SettlementReceipt, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn pending_requests(&self, _limit: usize) -> Result<Vec<PayoutRequest>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn stale_claims(
        &self,
        _claimed_before: DateTime<Utc>,
        _limit: usize,
    ) -> Result<Vec<PayoutRequest>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}
