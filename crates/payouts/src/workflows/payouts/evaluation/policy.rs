use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Terminal outcome of the eligibility rule chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Decision {
    Approve,
    /// Objectively unsatisfiable without user action; the request becomes `rejected`.
    Reject(Ineligibility),
    /// Risk threshold a reviewer may override; the request stays `pending`.
    Defer(Ineligibility),
}

impl Decision {
    pub(crate) fn from_ineligibility(ineligibility: Ineligibility) -> Self {
        if ineligibility.requires_manual_approval() {
            Decision::Defer(ineligibility)
        } else {
            Decision::Reject(ineligibility)
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Decision::Approve)
    }

    pub fn ineligibility(&self) -> Option<&Ineligibility> {
        match self {
            Decision::Approve => None,
            Decision::Reject(reason) | Decision::Defer(reason) => Some(reason),
        }
    }

    pub fn reason(&self) -> Option<&'static str> {
        self.ineligibility().map(Ineligibility::reason)
    }

    pub fn summary(&self) -> String {
        match self {
            Decision::Approve => "payout approved".to_string(),
            Decision::Reject(reason) => format!("rejected: {}", reason.summary()),
            Decision::Defer(reason) => format!("deferred to manual review: {}", reason.summary()),
        }
    }
}

/// Named policy conditions. Each one carries its own reject/defer semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Ineligibility {
    FeatureDisabled,
    AmountExceedsCeiling {
        requested: Decimal,
        ceiling: Decimal,
    },
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },
    BelowMinimum {
        requested: Decimal,
        minimum: Decimal,
    },
    AccountNotActivated,
    OpenDisputes(u32),
    AccountTooNew {
        tenure_days: i64,
        minimum_days: i64,
    },
    InsufficientHistory {
        completed: u32,
        minimum: u32,
    },
}

impl Ineligibility {
    pub fn requires_manual_approval(&self) -> bool {
        match self {
            Ineligibility::FeatureDisabled
            | Ineligibility::AmountExceedsCeiling { .. }
            | Ineligibility::OpenDisputes(_)
            | Ineligibility::AccountTooNew { .. }
            | Ineligibility::InsufficientHistory { .. } => true,
            Ineligibility::InsufficientBalance { .. }
            | Ineligibility::BelowMinimum { .. }
            | Ineligibility::AccountNotActivated => false,
        }
    }

    /// Stable user-facing reason persisted on the request.
    pub fn reason(&self) -> &'static str {
        match self {
            Ineligibility::FeatureDisabled => "automatic payouts disabled",
            Ineligibility::AmountExceedsCeiling { .. } => "amount exceeds automatic limit",
            Ineligibility::InsufficientBalance { .. } => "insufficient balance",
            Ineligibility::BelowMinimum { .. } => "amount below minimum",
            Ineligibility::AccountNotActivated => "processor account not fully activated",
            Ineligibility::OpenDisputes(_) => "open disputes present",
            Ineligibility::AccountTooNew { .. } => "account too new",
            Ineligibility::InsufficientHistory { .. } => {
                "insufficient completed-transaction history"
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Ineligibility::FeatureDisabled => "automatic_payouts_disabled",
            Ineligibility::AmountExceedsCeiling { .. } => "amount_exceeds_ceiling",
            Ineligibility::InsufficientBalance { .. } => "insufficient_balance",
            Ineligibility::BelowMinimum { .. } => "below_minimum",
            Ineligibility::AccountNotActivated => "account_not_activated",
            Ineligibility::OpenDisputes(_) => "open_disputes",
            Ineligibility::AccountTooNew { .. } => "account_too_new",
            Ineligibility::InsufficientHistory { .. } => "insufficient_history",
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Ineligibility::FeatureDisabled => {
                "automatic payouts disabled, use manual approval".to_string()
            }
            Ineligibility::AmountExceedsCeiling { requested, ceiling } => {
                format!("amount {requested} exceeds automatic limit {ceiling}")
            }
            Ineligibility::InsufficientBalance {
                requested,
                available,
            } => format!("insufficient balance (requested {requested}, available {available})"),
            Ineligibility::BelowMinimum { requested, minimum } => {
                format!("amount {requested} below minimum {minimum}")
            }
            Ineligibility::AccountNotActivated => self.reason().to_string(),
            Ineligibility::OpenDisputes(count) => format!("{count} open dispute(s) present"),
            Ineligibility::AccountTooNew {
                tenure_days,
                minimum_days,
            } => format!("account too new ({tenure_days} of {minimum_days} days)"),
            Ineligibility::InsufficientHistory { completed, minimum } => format!(
                "insufficient completed-transaction history ({completed} of {minimum})"
            ),
        }
    }
}
