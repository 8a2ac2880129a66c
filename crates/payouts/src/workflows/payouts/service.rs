use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::domain::{AccountId, PayoutRequest, PayoutRequestId, PayoutStatus};
use super::evaluation::{EligibilityPolicy, EvaluationContext, PolicyConfigProvider};
use super::loader::RequestLoader;
use super::reconciler::StatusReconciler;
use super::report::EvaluationReport;
use super::repository::{within, LedgerStore, PaymentProcessor, ProcessorError, StoreError};
use super::settlement::{SettlementExecutor, SettlementFault, SettlementOptions};
use crate::config::ConfigError;

/// Service composing the loader, eligibility policy, settlement executor and reconciler.
pub struct PayoutEvaluationService<S, P, C> {
    store: Arc<S>,
    settings: Arc<C>,
    loader: RequestLoader<S>,
    policy: EligibilityPolicy,
    executor: SettlementExecutor<S, P>,
    reconciler: StatusReconciler<S>,
    store_timeout: std::time::Duration,
}

impl<S, P, C> PayoutEvaluationService<S, P, C>
where
    S: LedgerStore + 'static,
    P: PaymentProcessor + 'static,
    C: PolicyConfigProvider + 'static,
{
    pub fn new(
        store: Arc<S>,
        processor: Arc<P>,
        settings: Arc<C>,
        options: SettlementOptions,
    ) -> Self {
        let store_timeout = options.store_timeout;
        Self {
            loader: RequestLoader::new(store.clone(), store_timeout),
            reconciler: StatusReconciler::new(store.clone(), store_timeout),
            executor: SettlementExecutor::new(store.clone(), processor, options),
            policy: EligibilityPolicy::new(),
            store,
            settings,
            store_timeout,
        }
    }

    /// Evaluate a pending payout request and, when eligible, settle it.
    pub async fn evaluate(
        &self,
        id: &PayoutRequestId,
    ) -> Result<EvaluationReport, PayoutServiceError> {
        self.evaluate_at(id, Utc::now()).await
    }

    pub async fn evaluate_at(
        &self,
        id: &PayoutRequestId,
        now: DateTime<Utc>,
    ) -> Result<EvaluationReport, PayoutServiceError> {
        let loaded = self.loader.load(id).await?;
        let config = self.settings.policy()?;

        let ctx = EvaluationContext {
            request: &loaded.request,
            account: &loaded.account,
            config: &config,
            now,
        };

        let verdict = match self.policy.screen(&ctx) {
            Some(verdict) => verdict,
            None => {
                let signals = self.loader.load_signals(&loaded.account.id).await?;
                self.policy.evaluate(&ctx, &signals)
            }
        };

        debug!(
            payout_request_id = %id,
            decided_by = verdict.decided_by.unwrap_or("none"),
            decision = %verdict.decision.summary(),
            "eligibility evaluated"
        );

        if !verdict.decision.is_approved() {
            return self
                .reconciler
                .record_decision(&loaded.request, &verdict.decision, now)
                .await;
        }

        let claimed = self.executor.claim(&loaded.request, now).await?;
        let outcome = self.executor.settle(&claimed, now).await;
        self.reconciler
            .record_settlement(&claimed, outcome, now)
            .await
    }

    /// Evaluate up to `limit` pending requests that are not waiting on a reviewer.
    pub async fn sweep(&self, limit: usize) -> Result<Vec<SweepEntry>, PayoutServiceError> {
        self.sweep_at(limit, Utc::now()).await
    }

    pub async fn sweep_at(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<SweepEntry>, PayoutServiceError> {
        let pending = within(
            self.store_timeout,
            StoreError::Timeout,
            self.store.pending_requests(limit),
        )
        .await?;

        let mut entries = Vec::with_capacity(pending.len());
        for request in pending {
            let entry = match self.evaluate_at(&request.id, now).await {
                Ok(report) => SweepEntry {
                    payout_request_id: request.id,
                    report: Some(report),
                    error: None,
                },
                Err(err) => {
                    error!(
                        payout_request_id = %request.id,
                        error = %err,
                        "sweep evaluation failed"
                    );
                    SweepEntry {
                        payout_request_id: request.id,
                        report: None,
                        error: Some(err.to_string()),
                    }
                }
            };
            entries.push(entry);
        }

        info!(evaluated = entries.len(), "payout sweep finished");
        Ok(entries)
    }

    /// Requests left `processing` for longer than `older_than`, typically after a crash between
    /// the processor call and the ledger commit. They need manual reconciliation.
    pub async fn stale_claims(
        &self,
        older_than: ChronoDuration,
        limit: usize,
    ) -> Result<Vec<PayoutRequest>, PayoutServiceError> {
        self.stale_claims_at(Utc::now(), older_than, limit).await
    }

    pub async fn stale_claims_at(
        &self,
        now: DateTime<Utc>,
        older_than: ChronoDuration,
        limit: usize,
    ) -> Result<Vec<PayoutRequest>, PayoutServiceError> {
        let stale = within(
            self.store_timeout,
            StoreError::Timeout,
            self.store.stale_claims(now - older_than, limit),
        )
        .await?;
        if !stale.is_empty() {
            warn!(count = stale.len(), "stale settlement claims awaiting reconciliation");
        }
        Ok(stale)
    }

    /// Fetch a payout request for status responses.
    pub async fn get(&self, id: &PayoutRequestId) -> Result<PayoutRequest, PayoutServiceError> {
        within(self.store_timeout, StoreError::Timeout, self.store.fetch_request(id))
            .await?
            .ok_or_else(|| PayoutServiceError::NotFound(id.clone()))
    }
}

/// One line of a sweep run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepEntry {
    pub payout_request_id: PayoutRequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<EvaluationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Error raised by the payout service. Business outcomes never appear here.
#[derive(Debug, thiserror::Error)]
pub enum PayoutServiceError {
    #[error("payout request {0} not found")]
    NotFound(PayoutRequestId),
    #[error("payout request {id} already processed ({status})")]
    AlreadyProcessed {
        id: PayoutRequestId,
        status: PayoutStatus,
    },
    #[error("account {0} not found")]
    AccountNotFound(AccountId),
    #[error("payout request {id} has non-positive amount {amount}")]
    InvalidAmount { id: PayoutRequestId, amount: Decimal },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Processor(#[from] ProcessorError),
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl From<SettlementFault> for PayoutServiceError {
    fn from(value: SettlementFault) -> Self {
        match value {
            SettlementFault::Store(err) => Self::Store(err),
            SettlementFault::Processor(err) => Self::Processor(err),
            SettlementFault::AccountMissing(id) => Self::AccountNotFound(id),
        }
    }
}
