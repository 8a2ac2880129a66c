use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for withdrawal requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PayoutRequestId(pub String);

impl PayoutRequestId {
    /// Deterministic key handed to the processor so a retried settlement maps onto the
    /// payout created by an earlier attempt.
    pub fn idempotency_key(&self) -> String {
        format!("payout-request-{}", self.0)
    }
}

impl fmt::Display for PayoutRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for hubber accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a payout request.
///
/// `Pending` is the only state the engine evaluates. `Processing` is held while a settlement
/// is in flight and `Uncertain` marks settlements whose external outcome is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    Processing,
    Approved,
    Rejected,
    Uncertain,
}

impl PayoutStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Processing => "processing",
            PayoutStatus::Approved => "approved",
            PayoutStatus::Rejected => "rejected",
            PayoutStatus::Uncertain => "uncertain",
        }
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Withdrawal intent raised by a hubber against their internal balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub id: PayoutRequestId,
    pub account_id: AccountId,
    pub amount: Decimal,
    pub status: PayoutStatus,
    pub external_reference: Option<String>,
    pub reason: Option<String>,
    /// Set when the engine deferred the request to the manual-approval surface.
    pub manual_review: bool,
    pub automatic_approval: Option<bool>,
    pub requested_at: DateTime<Utc>,
    /// When a settlement claimed the request. Cleared again if the claim is released.
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl PayoutRequest {
    pub fn new(
        id: PayoutRequestId,
        account_id: AccountId,
        amount: Decimal,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account_id,
            amount,
            status: PayoutStatus::Pending,
            external_reference: None,
            reason: None,
            manual_review: false,
            automatic_approval: None,
            requested_at,
            claimed_at: None,
            processed_at: None,
            paid_at: None,
        }
    }
}

/// Connected account at the payment processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorAccount {
    pub account_id: Option<String>,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
}

impl ProcessorAccount {
    pub fn is_fully_activated(&self) -> bool {
        self.account_id
            .as_deref()
            .map(|id| !id.trim().is_empty())
            .unwrap_or(false)
            && self.charges_enabled
            && self.payouts_enabled
    }
}

/// Owner of the funds being withdrawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub display_name: String,
    pub balance: Decimal,
    pub processor: ProcessorAccount,
    pub created_at: DateTime<Utc>,
    pub became_hubber_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Tenure is counted from the hubber upgrade, or from sign-up when it was never recorded.
    pub fn tenure_start(&self) -> DateTime<Utc> {
        self.became_hubber_at.unwrap_or(self.created_at)
    }

    pub fn tenure_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.tenure_start()).num_days()
    }
}

/// Risk signals read only once the request has passed the structural checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RiskSignals {
    pub open_disputes: u32,
    pub completed_transactions: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Open,
    Resolved,
    Dismissed,
}

/// Complaint raised against a hubber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    pub id: String,
    pub account_id: AccountId,
    pub status: DisputeStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Active,
    Completed,
    Cancelled,
}

/// Rental booking used as track-record evidence for a hubber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: String,
    pub hubber_id: AccountId,
    pub status: BookingStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryKind {
    Debit,
}

/// Append-only audit entry for a balance mutation caused by a settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: String,
    pub account_id: AccountId,
    /// Signed; debits are negative.
    pub amount: Decimal,
    pub kind: LedgerEntryKind,
    pub description: String,
    pub payout_request_id: PayoutRequestId,
    pub created_at: DateTime<Utc>,
}

/// Converts a decimal amount into the processor's minor currency unit (cents).
pub fn minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED).round_dp(0).to_i64()
}
