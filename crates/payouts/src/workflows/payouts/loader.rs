use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use super::domain::{Account, AccountId, PayoutRequest, PayoutRequestId, PayoutStatus, RiskSignals};
use super::repository::{within, LedgerStore, StoreError};
use super::service::PayoutServiceError;

/// Request and owning account as read at the start of an evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedRequest {
    pub request: PayoutRequest,
    pub account: Account,
}

/// Reads the state an evaluation needs, refusing anything that is no longer pending.
pub struct RequestLoader<S> {
    store: Arc<S>,
    timeout: Duration,
}

impl<S> RequestLoader<S>
where
    S: LedgerStore + 'static,
{
    pub fn new(store: Arc<S>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn load(&self, id: &PayoutRequestId) -> Result<LoadedRequest, PayoutServiceError> {
        let request = within(self.timeout, StoreError::Timeout, self.store.fetch_request(id))
            .await?
            .ok_or_else(|| PayoutServiceError::NotFound(id.clone()))?;

        if request.status != PayoutStatus::Pending {
            return Err(PayoutServiceError::AlreadyProcessed {
                id: id.clone(),
                status: request.status,
            });
        }

        if request.amount <= Decimal::ZERO {
            return Err(PayoutServiceError::InvalidAmount {
                id: id.clone(),
                amount: request.amount,
            });
        }

        let account = within(
            self.timeout,
            StoreError::Timeout,
            self.store.fetch_account(&request.account_id),
        )
        .await?
        .ok_or_else(|| PayoutServiceError::AccountNotFound(request.account_id.clone()))?;

        Ok(LoadedRequest { request, account })
    }

    /// Dispute and booking counts, read only when the structural rules have all passed.
    pub async fn load_signals(&self, account_id: &AccountId) -> Result<RiskSignals, StoreError> {
        let open_disputes = within(
            self.timeout,
            StoreError::Timeout,
            self.store.open_dispute_count(account_id),
        )
        .await?;
        let completed_transactions = within(
            self.timeout,
            StoreError::Timeout,
            self.store.completed_transaction_count(account_id),
        )
        .await?;

        Ok(RiskSignals {
            open_disputes,
            completed_transactions,
        })
    }
}
