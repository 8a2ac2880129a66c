mod config;
mod policy;
mod rules;

pub use config::{FixedPolicyConfig, PayoutPolicyConfig, PolicyConfigProvider};
pub use policy::{Decision, Ineligibility};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{Account, PayoutRequest, RiskSignals};
use rules::{RISK_RULES, SCREENING_RULES};

/// Inputs shared by every rule of one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub request: &'a PayoutRequest,
    pub account: &'a Account,
    pub config: &'a PayoutPolicyConfig,
    pub now: DateTime<Utc>,
}

/// Decision plus the name of the rule that produced it, for the audit log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyVerdict {
    pub decision: Decision,
    pub decided_by: Option<&'static str>,
}

impl PolicyVerdict {
    fn approve() -> Self {
        Self {
            decision: Decision::Approve,
            decided_by: None,
        }
    }

    fn fired(rule: &'static str, ineligibility: Ineligibility) -> Self {
        Self {
            decision: Decision::from_ineligibility(ineligibility),
            decided_by: Some(rule),
        }
    }
}

/// Stateless rule chain deciding whether a payout may be settled automatically.
#[derive(Debug, Clone, Copy, Default)]
pub struct EligibilityPolicy;

impl EligibilityPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Runs the structural rules only. `None` means the risk signals must be loaded and
    /// passed to [`EligibilityPolicy::evaluate`].
    pub fn screen(&self, ctx: &EvaluationContext<'_>) -> Option<PolicyVerdict> {
        SCREENING_RULES
            .iter()
            .find_map(|&(name, rule)| rule(ctx).map(|found| PolicyVerdict::fired(name, found)))
    }

    /// Runs the full chain in order and returns the first terminal decision.
    pub fn evaluate(&self, ctx: &EvaluationContext<'_>, signals: &RiskSignals) -> PolicyVerdict {
        if let Some(verdict) = self.screen(ctx) {
            return verdict;
        }

        RISK_RULES
            .iter()
            .find_map(|&(name, rule)| {
                rule(ctx, signals).map(|found| PolicyVerdict::fired(name, found))
            })
            .unwrap_or_else(PolicyVerdict::approve)
    }
}
