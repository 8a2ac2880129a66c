use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Duration as ChronoDuration;
use serde::Deserialize;
use serde_json::json;

use super::domain::PayoutRequestId;
use super::evaluation::PolicyConfigProvider;
use super::report::PayoutStatusView;
use super::repository::{LedgerStore, PaymentProcessor, StoreError};
use super::service::{PayoutEvaluationService, PayoutServiceError};

const DEFAULT_SWEEP_LIMIT: usize = 50;
const DEFAULT_STALE_CLAIM_MINUTES: i64 = 15;
const MAX_STALE_CLAIM_MINUTES: i64 = 60 * 24 * 366;

/// Trigger payload for a single evaluation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatePayoutRequest {
    pub payout_request_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SweepRequest {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleClaimsQuery {
    pub older_than_minutes: Option<i64>,
    pub limit: Option<usize>,
}

/// Router builder exposing evaluation, sweep and status endpoints.
pub fn payout_router<S, P, C>(service: Arc<PayoutEvaluationService<S, P, C>>) -> Router
where
    S: LedgerStore + 'static,
    P: PaymentProcessor + 'static,
    C: PolicyConfigProvider + 'static,
{
    Router::new()
        .route("/api/v1/payouts/evaluate", post(evaluate_handler::<S, P, C>))
        .route("/api/v1/payouts/sweep", post(sweep_handler::<S, P, C>))
        .route(
            "/api/v1/payouts/claims/stale",
            get(stale_claims_handler::<S, P, C>),
        )
        .route(
            "/api/v1/payouts/:payout_request_id",
            get(status_handler::<S, P, C>),
        )
        .with_state(service)
}

pub(crate) async fn evaluate_handler<S, P, C>(
    State(service): State<Arc<PayoutEvaluationService<S, P, C>>>,
    axum::Json(payload): axum::Json<EvaluatePayoutRequest>,
) -> Response
where
    S: LedgerStore + 'static,
    P: PaymentProcessor + 'static,
    C: PolicyConfigProvider + 'static,
{
    let id = PayoutRequestId(payload.payout_request_id);
    match service.evaluate(&id).await {
        Ok(report) if report.automatic_payouts_disabled() => {
            (StatusCode::FORBIDDEN, axum::Json(report)).into_response()
        }
        Ok(report) if !report.success => {
            (StatusCode::GATEWAY_TIMEOUT, axum::Json(report)).into_response()
        }
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn sweep_handler<S, P, C>(
    State(service): State<Arc<PayoutEvaluationService<S, P, C>>>,
    axum::Json(payload): axum::Json<SweepRequest>,
) -> Response
where
    S: LedgerStore + 'static,
    P: PaymentProcessor + 'static,
    C: PolicyConfigProvider + 'static,
{
    let limit = payload.limit.unwrap_or(DEFAULT_SWEEP_LIMIT);
    match service.sweep(limit).await {
        Ok(entries) => {
            let payload = json!({
                "evaluated": entries.len(),
                "results": entries,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn stale_claims_handler<S, P, C>(
    State(service): State<Arc<PayoutEvaluationService<S, P, C>>>,
    Query(query): Query<StaleClaimsQuery>,
) -> Response
where
    S: LedgerStore + 'static,
    P: PaymentProcessor + 'static,
    C: PolicyConfigProvider + 'static,
{
    let minutes = query
        .older_than_minutes
        .unwrap_or(DEFAULT_STALE_CLAIM_MINUTES)
        .clamp(0, MAX_STALE_CLAIM_MINUTES);
    let limit = query.limit.unwrap_or(DEFAULT_SWEEP_LIMIT);
    match service
        .stale_claims(ChronoDuration::minutes(minutes), limit)
        .await
    {
        Ok(requests) => {
            let claims: Vec<PayoutStatusView> =
                requests.iter().map(PayoutStatusView::from).collect();
            let payload = json!({
                "count": claims.len(),
                "claims": claims,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn status_handler<S, P, C>(
    State(service): State<Arc<PayoutEvaluationService<S, P, C>>>,
    Path(payout_request_id): Path<String>,
) -> Response
where
    S: LedgerStore + 'static,
    P: PaymentProcessor + 'static,
    C: PolicyConfigProvider + 'static,
{
    let id = PayoutRequestId(payout_request_id);
    match service.get(&id).await {
        Ok(request) => {
            let view = PayoutStatusView::from(&request);
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

/// Maps service failures so infrastructure problems never look like a business rejection.
pub(crate) fn error_response(error: PayoutServiceError) -> Response {
    let status = match &error {
        PayoutServiceError::NotFound(_) | PayoutServiceError::AccountNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        PayoutServiceError::AlreadyProcessed { .. } => StatusCode::CONFLICT,
        PayoutServiceError::InvalidAmount { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        PayoutServiceError::Store(StoreError::Timeout | StoreError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        PayoutServiceError::Processor(_) => StatusCode::BAD_GATEWAY,
        PayoutServiceError::Store(_)
        | PayoutServiceError::Config(_)
        | PayoutServiceError::Invariant(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = match &error {
        PayoutServiceError::AlreadyProcessed { id, status } => json!({
            "success": true,
            "approved": false,
            "payoutRequestId": id,
            "status": status,
            "error": error.to_string(),
        }),
        _ => json!({
            "success": false,
            "error": error.to_string(),
        }),
    };

    (status, axum::Json(payload)).into_response()
}
