use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::domain::{minor_units, Account, AccountId, PayoutRequest, PayoutStatus};
use super::evaluation::Ineligibility;
use super::repository::{
    within, ExternalPayout, LedgerStore, PaymentProcessor, PayoutInstruction, ProcessorError,
    SettlementCommit, SettlementReceipt, StatusUpdate, StoreError,
};
use super::service::PayoutServiceError;

/// Knobs for the external payout call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementOptions {
    pub currency: String,
    pub processor_timeout: Duration,
    pub store_timeout: Duration,
}

impl Default for SettlementOptions {
    fn default() -> Self {
        Self {
            currency: "eur".to_string(),
            processor_timeout: Duration::from_secs(10),
            store_timeout: Duration::from_secs(5),
        }
    }
}

/// Infrastructure failure that interrupted a claimed settlement before any payout existed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettlementFault {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Processor(#[from] ProcessorError),
    /// The owning account vanished between the claim and the live re-check.
    #[error("account {0} not found")]
    AccountMissing(AccountId),
}

/// What happened to a claimed request. Only `Settled` has touched the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum SettlementOutcome {
    Settled {
        receipt: SettlementReceipt,
        adopted_existing: bool,
    },
    /// Live re-check failed after the claim; no external call was made.
    Ineligible(Ineligibility),
    /// Processor refused the payout.
    Declined(String),
    /// Nothing was paid out; the claim must be released so the request can be retried.
    Interrupted(SettlementFault),
    /// Money may have moved without a matching ledger entry.
    Uncertain(String),
}

/// Moves money for an approved request exactly once.
pub struct SettlementExecutor<S, P> {
    store: Arc<S>,
    processor: Arc<P>,
    options: SettlementOptions,
}

impl<S, P> SettlementExecutor<S, P>
where
    S: LedgerStore + 'static,
    P: PaymentProcessor + 'static,
{
    pub fn new(store: Arc<S>, processor: Arc<P>, options: SettlementOptions) -> Self {
        Self {
            store,
            processor,
            options,
        }
    }

    /// Claims the request (`pending -> processing`) and stamps the claim time; a lost race
    /// surfaces as [`PayoutServiceError::AlreadyProcessed`] and nothing else happens.
    pub async fn claim(
        &self,
        request: &PayoutRequest,
        now: DateTime<Utc>,
    ) -> Result<PayoutRequest, PayoutServiceError> {
        let claimed = within(
            self.options.store_timeout,
            StoreError::Timeout,
            self.store.transition_status(
                &request.id,
                PayoutStatus::Pending,
                StatusUpdate::claim(now),
            ),
        )
        .await;

        match claimed {
            Ok(record) => Ok(record),
            Err(StoreError::Conflict { current }) => Err(PayoutServiceError::AlreadyProcessed {
                id: request.id.clone(),
                status: current,
            }),
            Err(other) => Err(other.into()),
        }
    }

    /// Settles a request previously claimed with [`SettlementExecutor::claim`].
    pub async fn settle(&self, request: &PayoutRequest, now: DateTime<Utc>) -> SettlementOutcome {
        let account = match self.live_account(request).await {
            Ok(account) => account,
            Err(fault) => return SettlementOutcome::Interrupted(fault),
        };

        if request.amount > account.balance {
            return SettlementOutcome::Ineligible(Ineligibility::InsufficientBalance {
                requested: request.amount,
                available: account.balance,
            });
        }

        let destination = match account.processor.account_id.as_deref() {
            Some(destination) if account.processor.is_fully_activated() => destination.to_string(),
            _ => return SettlementOutcome::Ineligible(Ineligibility::AccountNotActivated),
        };

        let Some(amount_minor) = minor_units(request.amount) else {
            return SettlementOutcome::Declined(format!(
                "amount {} cannot be expressed in minor units",
                request.amount
            ));
        };

        let idempotency_key = request.id.idempotency_key();
        let existing = within(
            self.options.processor_timeout,
            ProcessorError::Timeout,
            self.processor.find_payout(&idempotency_key),
        )
        .await;

        let (payout, adopted_existing) = match existing {
            Ok(Some(payout)) => {
                warn!(
                    payout_request_id = %request.id,
                    reference = %payout.reference,
                    "adopting payout created by an earlier attempt"
                );
                (payout, true)
            }
            Ok(None) => {
                let instruction = PayoutInstruction {
                    destination,
                    amount_minor,
                    currency: self.options.currency.clone(),
                    idempotency_key,
                    metadata: payout_metadata(request),
                };
                match self.create(instruction).await {
                    Ok(payout) => (payout, false),
                    Err(outcome) => return outcome,
                }
            }
            Err(error) => return SettlementOutcome::Interrupted(error.into()),
        };

        self.commit(request, payout, adopted_existing, now).await
    }

    async fn live_account(&self, request: &PayoutRequest) -> Result<Account, SettlementFault> {
        within(
            self.options.store_timeout,
            StoreError::Timeout,
            self.store.fetch_account(&request.account_id),
        )
        .await?
        .ok_or_else(|| SettlementFault::AccountMissing(request.account_id.clone()))
    }

    async fn create(
        &self,
        instruction: PayoutInstruction,
    ) -> Result<ExternalPayout, SettlementOutcome> {
        let created = within(
            self.options.processor_timeout,
            ProcessorError::Timeout,
            self.processor.create_payout(instruction),
        )
        .await;

        match created {
            Ok(payout) => Ok(payout),
            Err(ProcessorError::Declined(detail)) => Err(SettlementOutcome::Declined(detail)),
            Err(ProcessorError::Timeout) => Err(SettlementOutcome::Uncertain(
                "processor did not answer in time; payout outcome unknown".to_string(),
            )),
            Err(unreachable @ ProcessorError::Unavailable(_)) => {
                Err(SettlementOutcome::Interrupted(unreachable.into()))
            }
        }
    }

    async fn commit(
        &self,
        request: &PayoutRequest,
        payout: ExternalPayout,
        adopted_existing: bool,
        now: DateTime<Utc>,
    ) -> SettlementOutcome {
        let commit = SettlementCommit {
            request_id: request.id.clone(),
            account_id: request.account_id.clone(),
            amount: request.amount,
            external_reference: payout.reference.clone(),
            description: format!("Automatic payout {} ({})", request.id, payout.reference),
            paid_at: now,
        };

        match within(
            self.options.store_timeout,
            StoreError::Timeout,
            self.store.commit_settlement(commit),
        )
        .await
        {
            Ok(receipt) => {
                info!(
                    payout_request_id = %request.id,
                    account_id = %request.account_id,
                    amount = %request.amount,
                    reference = %payout.reference,
                    new_balance = %receipt.new_balance,
                    "payout settled"
                );
                SettlementOutcome::Settled {
                    receipt,
                    adopted_existing,
                }
            }
            Err(error) => SettlementOutcome::Uncertain(format!(
                "payout {} created but ledger commit failed: {error}",
                payout.reference
            )),
        }
    }
}

fn payout_metadata(request: &PayoutRequest) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    metadata.insert("payout_request_id".to_string(), request.id.0.clone());
    metadata.insert("account_id".to_string(), request.account_id.0.clone());
    metadata.insert("automatic".to_string(), "true".to_string());
    metadata
}
