use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::domain::{
    Account, AccountId, BookingRecord, BookingStatus, Dispute, DisputeStatus, LedgerEntryKind,
    LedgerTransaction, PayoutRequest, PayoutRequestId, PayoutStatus,
};
use super::repository::{
    ExternalPayout, LedgerStore, PaymentProcessor, PayoutInstruction, ProcessorError,
    SettlementCommit, SettlementReceipt, StatusUpdate, StoreError,
};

#[derive(Default)]
struct LedgerState {
    requests: BTreeMap<PayoutRequestId, PayoutRequest>,
    accounts: HashMap<AccountId, Account>,
    disputes: Vec<Dispute>,
    bookings: Vec<BookingRecord>,
    transactions: Vec<LedgerTransaction>,
    next_transaction: u64,
}

/// Ledger store kept in process memory. Every operation runs under one lock, so the
/// settlement commit is atomic.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("ledger mutex poisoned".to_string()))
    }

    pub fn insert_account(&self, account: Account) -> Result<(), StoreError> {
        self.lock()?.accounts.insert(account.id.clone(), account);
        Ok(())
    }

    pub fn insert_request(&self, request: PayoutRequest) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.requests.contains_key(&request.id) {
            return Err(StoreError::Conflict {
                current: state.requests[&request.id].status,
            });
        }
        state.requests.insert(request.id.clone(), request);
        Ok(())
    }

    pub fn insert_dispute(&self, dispute: Dispute) -> Result<(), StoreError> {
        self.lock()?.disputes.push(dispute);
        Ok(())
    }

    pub fn insert_booking(&self, booking: BookingRecord) -> Result<(), StoreError> {
        self.lock()?.bookings.push(booking);
        Ok(())
    }

    pub fn remove_account(&self, id: &AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.lock()?.accounts.remove(id))
    }

    pub fn account(&self, id: &AccountId) -> Option<Account> {
        self.lock().ok()?.accounts.get(id).cloned()
    }

    pub fn request(&self, id: &PayoutRequestId) -> Option<PayoutRequest> {
        self.lock().ok()?.requests.get(id).cloned()
    }

    pub fn transactions_for(&self, id: &PayoutRequestId) -> Vec<LedgerTransaction> {
        self.lock()
            .map(|state| {
                state
                    .transactions
                    .iter()
                    .filter(|tx| &tx.payout_request_id == id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn transactions(&self) -> Vec<LedgerTransaction> {
        self.lock()
            .map(|state| state.transactions.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn fetch_request(
        &self,
        id: &PayoutRequestId,
    ) -> Result<Option<PayoutRequest>, StoreError> {
        Ok(self.lock()?.requests.get(id).cloned())
    }

    async fn fetch_account(&self, id: &AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.lock()?.accounts.get(id).cloned())
    }

    async fn open_dispute_count(&self, account_id: &AccountId) -> Result<u32, StoreError> {
        let state = self.lock()?;
        let count = state
            .disputes
            .iter()
            .filter(|dispute| {
                &dispute.account_id == account_id && dispute.status == DisputeStatus::Open
            })
            .count();
        Ok(count as u32)
    }

    async fn completed_transaction_count(
        &self,
        account_id: &AccountId,
    ) -> Result<u32, StoreError> {
        let state = self.lock()?;
        let count = state
            .bookings
            .iter()
            .filter(|booking| {
                &booking.hubber_id == account_id && booking.status == BookingStatus::Completed
            })
            .count();
        Ok(count as u32)
    }

    async fn transition_status(
        &self,
        id: &PayoutRequestId,
        expected: PayoutStatus,
        update: StatusUpdate,
    ) -> Result<PayoutRequest, StoreError> {
        let mut state = self.lock()?;
        let request = state.requests.get_mut(id).ok_or(StoreError::NotFound)?;
        if request.status != expected {
            return Err(StoreError::Conflict {
                current: request.status,
            });
        }

        request.status = update.status;
        request.reason = update.reason;
        request.manual_review = update.manual_review;
        if update.processed_at.is_some() {
            request.processed_at = update.processed_at;
        }
        match update.status {
            PayoutStatus::Processing => request.claimed_at = update.claimed_at,
            PayoutStatus::Pending => request.claimed_at = None,
            _ => {}
        }
        if update.status != PayoutStatus::Processing && update.status != PayoutStatus::Pending {
            request.automatic_approval = Some(false);
        }
        Ok(request.clone())
    }

    async fn commit_settlement(
        &self,
        commit: SettlementCommit,
    ) -> Result<SettlementReceipt, StoreError> {
        let mut state = self.lock()?;

        let status = state
            .requests
            .get(&commit.request_id)
            .map(|request| request.status)
            .ok_or(StoreError::NotFound)?;
        if status != PayoutStatus::Processing {
            return Err(StoreError::Conflict { current: status });
        }

        let available = state
            .accounts
            .get(&commit.account_id)
            .map(|account| account.balance)
            .ok_or(StoreError::NotFound)?;
        if available < commit.amount {
            return Err(StoreError::InsufficientFunds {
                requested: commit.amount,
                available,
            });
        }

        // Every check has passed; the writes below cannot fail.
        state.next_transaction += 1;
        let transaction = LedgerTransaction {
            id: format!("ltx-{:06}", state.next_transaction),
            account_id: commit.account_id.clone(),
            amount: Decimal::ZERO - commit.amount,
            kind: LedgerEntryKind::Debit,
            description: commit.description,
            payout_request_id: commit.request_id.clone(),
            created_at: commit.paid_at,
        };
        state.transactions.push(transaction.clone());

        let new_balance = available - commit.amount;
        if let Some(account) = state.accounts.get_mut(&commit.account_id) {
            account.balance = new_balance;
        }

        let request = state
            .requests
            .get_mut(&commit.request_id)
            .ok_or(StoreError::NotFound)?;
        request.status = PayoutStatus::Approved;
        request.external_reference = Some(commit.external_reference);
        request.automatic_approval = Some(true);
        request.manual_review = false;
        request.reason = None;
        request.processed_at = Some(commit.paid_at);
        request.paid_at = Some(commit.paid_at);

        Ok(SettlementReceipt {
            request: request.clone(),
            new_balance,
            transaction,
        })
    }

    async fn pending_requests(&self, limit: usize) -> Result<Vec<PayoutRequest>, StoreError> {
        let state = self.lock()?;
        let mut pending: Vec<PayoutRequest> = state
            .requests
            .values()
            .filter(|request| request.status == PayoutStatus::Pending && !request.manual_review)
            .cloned()
            .collect();
        pending.sort_by_key(|request| request.requested_at);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn stale_claims(
        &self,
        claimed_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PayoutRequest>, StoreError> {
        let state = self.lock()?;
        // A processing row without a claim stamp predates stamping and is always stale.
        let mut stale: Vec<PayoutRequest> = state
            .requests
            .values()
            .filter(|request| {
                request.status == PayoutStatus::Processing
                    && request
                        .claimed_at
                        .map_or(true, |claimed_at| claimed_at <= claimed_before)
            })
            .cloned()
            .collect();
        stale.sort_by_key(|request| request.claimed_at);
        stale.truncate(limit);
        Ok(stale)
    }
}

/// Scripted response for the next `create_payout` call.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessorBehavior {
    Accept,
    Decline(String),
    Unavailable(String),
    /// Returns a timeout without creating anything.
    Timeout,
    /// Creates the payout but loses the response.
    AcceptThenTimeout,
    /// Sleeps before accepting, so the caller's own deadline can elapse.
    Stall(Duration),
}

#[derive(Default)]
struct ProcessorState {
    payouts: BTreeMap<String, ExternalPayout>,
    instructions: Vec<PayoutInstruction>,
    script: VecDeque<ProcessorBehavior>,
    next_reference: u64,
}

impl ProcessorState {
    fn accept(&mut self, instruction: &PayoutInstruction) -> ExternalPayout {
        if let Some(existing) = self.payouts.get(&instruction.idempotency_key) {
            return existing.clone();
        }
        self.next_reference += 1;
        let payout = ExternalPayout {
            reference: format!("po_sim_{:06}", self.next_reference),
            amount_minor: instruction.amount_minor,
            currency: instruction.currency.clone(),
        };
        self.payouts
            .insert(instruction.idempotency_key.clone(), payout.clone());
        payout
    }
}

/// Payment processor simulator honouring idempotency keys. Behaves as `Accept` unless a
/// scripted behavior is queued.
#[derive(Default, Clone)]
pub struct ScriptedProcessor {
    state: Arc<Mutex<ProcessorState>>,
}

impl ScriptedProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, ProcessorState>, ProcessorError> {
        self.state
            .lock()
            .map_err(|_| ProcessorError::Unavailable("processor mutex poisoned".to_string()))
    }

    pub fn push_behavior(&self, behavior: ProcessorBehavior) {
        if let Ok(mut state) = self.lock() {
            state.script.push_back(behavior);
        }
    }

    /// Every instruction received, including declined and duplicate ones.
    pub fn instructions(&self) -> Vec<PayoutInstruction> {
        self.lock()
            .map(|state| state.instructions.clone())
            .unwrap_or_default()
    }

    /// Distinct payouts that actually exist on the processor side.
    pub fn payouts(&self) -> Vec<ExternalPayout> {
        self.lock()
            .map(|state| state.payouts.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PaymentProcessor for ScriptedProcessor {
    async fn find_payout(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<ExternalPayout>, ProcessorError> {
        Ok(self.lock()?.payouts.get(idempotency_key).cloned())
    }

    async fn create_payout(
        &self,
        instruction: PayoutInstruction,
    ) -> Result<ExternalPayout, ProcessorError> {
        let behavior = {
            let mut state = self.lock()?;
            state.instructions.push(instruction.clone());
            state
                .script
                .pop_front()
                .unwrap_or(ProcessorBehavior::Accept)
        };

        match behavior {
            ProcessorBehavior::Accept => Ok(self.lock()?.accept(&instruction)),
            ProcessorBehavior::Decline(detail) => Err(ProcessorError::Declined(detail)),
            ProcessorBehavior::Unavailable(detail) => Err(ProcessorError::Unavailable(detail)),
            ProcessorBehavior::Timeout => Err(ProcessorError::Timeout),
            ProcessorBehavior::AcceptThenTimeout => {
                self.lock()?.accept(&instruction);
                Err(ProcessorError::Timeout)
            }
            ProcessorBehavior::Stall(delay) => {
                tokio::time::sleep(delay).await;
                Ok(self.lock()?.accept(&instruction))
            }
        }
    }
}
