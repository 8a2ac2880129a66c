use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::domain::{PayoutRequest, PayoutStatus};
use super::evaluation::Decision;
use super::report::EvaluationReport;
use super::repository::{within, LedgerStore, StatusUpdate, StoreError};
use super::service::PayoutServiceError;
use super::settlement::SettlementOutcome;

/// Writes evaluation and settlement outcomes back onto the payout request.
pub struct StatusReconciler<S> {
    store: Arc<S>,
    timeout: Duration,
}

impl<S> StatusReconciler<S>
where
    S: LedgerStore + 'static,
{
    pub fn new(store: Arc<S>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Persists a reject or defer decision for a request that is still `pending`.
    pub async fn record_decision(
        &self,
        request: &PayoutRequest,
        decision: &Decision,
        now: DateTime<Utc>,
    ) -> Result<EvaluationReport, PayoutServiceError> {
        let update = match decision {
            Decision::Reject(reason) => StatusUpdate::reject(reason.reason(), now),
            Decision::Defer(reason) => StatusUpdate::defer(reason.reason(), now),
            Decision::Approve => {
                return Err(PayoutServiceError::Invariant(
                    "approvals are recorded by the settlement commit".to_string(),
                ))
            }
        };

        let stored = self.apply(request, PayoutStatus::Pending, update).await?;

        match decision {
            Decision::Defer(reason) => warn!(
                payout_request_id = %stored.id,
                account_id = %stored.account_id,
                reason = reason.reason(),
                detail = %reason.summary(),
                "payout deferred to manual review"
            ),
            _ => info!(
                payout_request_id = %stored.id,
                account_id = %stored.account_id,
                reason = decision.reason().unwrap_or_default(),
                "payout rejected"
            ),
        }

        Ok(EvaluationReport::from_decision(&stored, decision))
    }

    /// Persists the outcome of a claimed settlement.
    pub async fn record_settlement(
        &self,
        request: &PayoutRequest,
        outcome: SettlementOutcome,
        now: DateTime<Utc>,
    ) -> Result<EvaluationReport, PayoutServiceError> {
        match outcome {
            SettlementOutcome::Settled { receipt, .. } => {
                Ok(EvaluationReport::settled(&receipt.request, receipt.new_balance))
            }
            SettlementOutcome::Ineligible(reason) => {
                let decision = Decision::Reject(reason);
                let update = StatusUpdate::reject(decision.reason().unwrap_or_default(), now);
                let stored = self.apply(request, PayoutStatus::Processing, update).await?;
                info!(
                    payout_request_id = %stored.id,
                    reason = decision.reason().unwrap_or_default(),
                    "payout rejected on live re-check"
                );
                Ok(EvaluationReport::from_decision(&stored, &decision))
            }
            SettlementOutcome::Declined(detail) => {
                let update = StatusUpdate::reject(format!("processor declined: {detail}"), now);
                let stored = self.apply(request, PayoutStatus::Processing, update).await?;
                info!(payout_request_id = %stored.id, %detail, "processor declined payout");
                Ok(EvaluationReport::settlement_failed(&stored, "processor_declined"))
            }
            SettlementOutcome::Uncertain(detail) => {
                let stored = self
                    .apply(request, PayoutStatus::Processing, StatusUpdate::uncertain(&detail, now))
                    .await
                    .map_err(|persist_error| {
                        error!(
                            payout_request_id = %request.id,
                            %detail,
                            error = %persist_error,
                            "unable to flag uncertain settlement; request left processing"
                        );
                        persist_error
                    })?;
                warn!(
                    payout_request_id = %stored.id,
                    %detail,
                    "settlement outcome unknown, manual reconciliation required"
                );
                Ok(EvaluationReport::settlement_failed(&stored, "settlement_uncertain"))
            }
            SettlementOutcome::Interrupted(fault) => {
                if let Err(release_error) = self
                    .apply(request, PayoutStatus::Processing, StatusUpdate::release())
                    .await
                {
                    error!(
                        payout_request_id = %request.id,
                        error = %release_error,
                        "unable to release settlement claim"
                    );
                }
                error!(payout_request_id = %request.id, error = %fault, "settlement interrupted");
                Err(fault.into())
            }
        }
    }

    async fn apply(
        &self,
        request: &PayoutRequest,
        expected: PayoutStatus,
        update: StatusUpdate,
    ) -> Result<PayoutRequest, PayoutServiceError> {
        let applied = within(
            self.timeout,
            StoreError::Timeout,
            self.store.transition_status(&request.id, expected, update),
        )
        .await;

        match applied {
            Ok(stored) => Ok(stored),
            Err(StoreError::Conflict { current }) => Err(PayoutServiceError::AlreadyProcessed {
                id: request.id.clone(),
                status: current,
            }),
            Err(other) => Err(other.into()),
        }
    }
}
