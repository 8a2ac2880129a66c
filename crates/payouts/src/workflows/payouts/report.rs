use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::domain::{PayoutRequest, PayoutRequestId, PayoutStatus};
use super::evaluation::Decision;

/// Structured result handed back to the caller for every completed evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationReport {
    pub payout_request_id: PayoutRequestId,
    /// False only when settlement hit an infrastructure problem with an unknown outcome.
    pub success: bool,
    pub approved: bool,
    pub status: PayoutStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub requires_manual_approval: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_balance: Option<Decimal>,
}

impl EvaluationReport {
    pub(crate) fn from_decision(request: &PayoutRequest, decision: &Decision) -> Self {
        let ineligibility = decision.ineligibility();
        Self {
            payout_request_id: request.id.clone(),
            success: true,
            approved: false,
            status: request.status,
            code: ineligibility.map(|reason| reason.code()),
            reason: ineligibility.map(|reason| reason.reason().to_string()),
            requires_manual_approval: matches!(decision, Decision::Defer(_)),
            external_reference: None,
            amount: None,
            new_balance: None,
        }
    }

    pub(crate) fn settled(request: &PayoutRequest, new_balance: Decimal) -> Self {
        Self {
            payout_request_id: request.id.clone(),
            success: true,
            approved: true,
            status: request.status,
            code: None,
            reason: None,
            requires_manual_approval: false,
            external_reference: request.external_reference.clone(),
            amount: Some(request.amount),
            new_balance: Some(new_balance),
        }
    }

    pub(crate) fn settlement_failed(request: &PayoutRequest, code: &'static str) -> Self {
        Self {
            payout_request_id: request.id.clone(),
            success: request.status != PayoutStatus::Uncertain,
            approved: false,
            status: request.status,
            code: Some(code),
            reason: request.reason.clone(),
            requires_manual_approval: request.status == PayoutStatus::Uncertain,
            external_reference: None,
            amount: None,
            new_balance: None,
        }
    }

    /// True for the feature-gate deferral, which callers route to the manual path.
    pub fn automatic_payouts_disabled(&self) -> bool {
        self.code == Some("automatic_payouts_disabled")
    }
}

/// Public view of a stored request for the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutStatusView {
    pub payout_request_id: PayoutRequestId,
    pub status: PayoutStatus,
    pub amount: Decimal,
    pub manual_review: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
}

impl From<&PayoutRequest> for PayoutStatusView {
    fn from(request: &PayoutRequest) -> Self {
        Self {
            payout_request_id: request.id.clone(),
            status: request.status,
            amount: request.amount,
            manual_review: request.manual_review,
            reason: request.reason.clone(),
            external_reference: request.external_reference.clone(),
            claimed_at: request.claimed_at,
        }
    }
}
