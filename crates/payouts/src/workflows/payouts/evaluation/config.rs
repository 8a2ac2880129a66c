use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Thresholds parameterizing the automatic payout policy for a single evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutPolicyConfig {
    pub automatic_payouts_enabled: bool,
    pub automatic_approval_ceiling: Decimal,
    pub minimum_amount: Decimal,
    pub minimum_tenure_days: i64,
    pub minimum_completed_transactions: u32,
}

/// Source of policy thresholds, consulted once at the start of every evaluation.
pub trait PolicyConfigProvider: Send + Sync {
    fn policy(&self) -> Result<PayoutPolicyConfig, ConfigError>;
}

/// Provider returning the same configuration for every evaluation.
#[derive(Debug, Clone)]
pub struct FixedPolicyConfig(pub PayoutPolicyConfig);

impl PolicyConfigProvider for FixedPolicyConfig {
    fn policy(&self) -> Result<PayoutPolicyConfig, ConfigError> {
        Ok(self.0.clone())
    }
}
