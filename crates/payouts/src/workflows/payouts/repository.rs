use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{
    Account, AccountId, LedgerTransaction, PayoutRequest, PayoutRequestId, PayoutStatus,
};

/// Ledger store holding payout requests, balances, disputes and booking history.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn fetch_request(&self, id: &PayoutRequestId)
        -> Result<Option<PayoutRequest>, StoreError>;
    async fn fetch_account(&self, id: &AccountId) -> Result<Option<Account>, StoreError>;
    async fn open_dispute_count(&self, account_id: &AccountId) -> Result<u32, StoreError>;
    async fn completed_transaction_count(&self, account_id: &AccountId)
        -> Result<u32, StoreError>;

    /// Conditional write: applies `update` only while the request is still in `expected`.
    /// Fails with [`StoreError::Conflict`] carrying the current status otherwise.
    async fn transition_status(
        &self,
        id: &PayoutRequestId,
        expected: PayoutStatus,
        update: StatusUpdate,
    ) -> Result<PayoutRequest, StoreError>;

    /// Atomically marks a `processing` request approved, debits the live balance and appends
    /// one ledger transaction. Nothing is written when any step fails.
    async fn commit_settlement(
        &self,
        commit: SettlementCommit,
    ) -> Result<SettlementReceipt, StoreError>;

    /// Pending requests not yet flagged for manual review, oldest first.
    async fn pending_requests(&self, limit: usize) -> Result<Vec<PayoutRequest>, StoreError>;

    /// Requests still `processing` whose claim was taken at or before `claimed_before`,
    /// oldest claim first.
    async fn stale_claims(
        &self,
        claimed_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PayoutRequest>, StoreError>;
}

/// Field changes applied together with a status transition.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: PayoutStatus,
    pub reason: Option<String>,
    pub manual_review: bool,
    pub processed_at: Option<DateTime<Utc>>,
    /// Only meaningful for the claim; stores clear it whenever a request returns to pending.
    pub claimed_at: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    pub fn claim(at: DateTime<Utc>) -> Self {
        Self {
            status: PayoutStatus::Processing,
            reason: None,
            manual_review: false,
            processed_at: None,
            claimed_at: Some(at),
        }
    }

    pub fn release() -> Self {
        Self {
            status: PayoutStatus::Pending,
            reason: None,
            manual_review: false,
            processed_at: None,
            claimed_at: None,
        }
    }

    pub fn defer(reason: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            status: PayoutStatus::Pending,
            reason: Some(reason.into()),
            manual_review: true,
            processed_at: Some(at),
            claimed_at: None,
        }
    }

    pub fn reject(reason: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            status: PayoutStatus::Rejected,
            reason: Some(reason.into()),
            manual_review: false,
            processed_at: Some(at),
            claimed_at: None,
        }
    }

    pub fn uncertain(reason: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            status: PayoutStatus::Uncertain,
            reason: Some(reason.into()),
            manual_review: true,
            processed_at: Some(at),
            claimed_at: None,
        }
    }
}

/// Everything the store needs to record a successful external payout.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementCommit {
    pub request_id: PayoutRequestId,
    pub account_id: AccountId,
    pub amount: Decimal,
    pub external_reference: String,
    pub description: String,
    pub paid_at: DateTime<Utc>,
}

/// Result of an applied settlement commit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementReceipt {
    pub request: PayoutRequest,
    pub new_balance: Decimal,
    pub transaction: LedgerTransaction,
}

/// Error enumeration for ledger store failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("request is {current}, not in the expected state")]
    Conflict { current: PayoutStatus },
    #[error("balance {available} cannot cover {requested}")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },
    #[error("ledger store timed out")]
    Timeout,
    #[error("ledger store unavailable: {0}")]
    Unavailable(String),
}

/// Payment processor capable of paying out to a connected account.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Looks up a payout previously created under `idempotency_key`.
    async fn find_payout(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<ExternalPayout>, ProcessorError>;

    async fn create_payout(
        &self,
        instruction: PayoutInstruction,
    ) -> Result<ExternalPayout, ProcessorError>;
}

/// Outbound payout order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutInstruction {
    pub destination: String,
    pub amount_minor: i64,
    pub currency: String,
    pub idempotency_key: String,
    pub metadata: BTreeMap<String, String>,
}

/// Payout as recorded by the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPayout {
    pub reference: String,
    pub amount_minor: i64,
    pub currency: String,
}

/// Processor failures, split by what they imply about the money.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessorError {
    /// The processor answered and refused; no payout exists.
    #[error("processor declined payout: {0}")]
    Declined(String),
    /// The call never reached the processor; no payout exists.
    #[error("processor unreachable: {0}")]
    Unavailable(String),
    /// No answer within the deadline; the payout may or may not exist.
    #[error("processor call timed out")]
    Timeout,
}

/// Bounds a collaborator call, turning an elapsed deadline into `on_timeout`.
pub(crate) async fn within<T, E, F>(limit: Duration, on_timeout: E, call: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout),
    }
}
