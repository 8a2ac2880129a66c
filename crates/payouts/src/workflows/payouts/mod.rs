//! Automatic payout eligibility and settlement.
//!
//! A trigger names one pending payout request. The [`loader`] reads the request and its
//! owning account, the [`evaluation`] rule chain decides approve / reject / defer, the
//! [`settlement`] executor moves money exactly once for approvals and the [`reconciler`]
//! writes the outcome back. Collaborators (ledger store, payment processor, threshold source)
//! are reached through the traits in [`repository`] and [`evaluation`].

pub mod domain;
pub mod evaluation;
pub mod loader;
pub mod memory;
pub mod reconciler;
pub mod report;
pub mod repository;
pub mod router;
pub mod service;
pub mod settlement;

#[cfg(test)]
mod tests;

pub use domain::{
    Account, AccountId, BookingRecord, BookingStatus, Dispute, DisputeStatus, LedgerEntryKind,
    LedgerTransaction, PayoutRequest, PayoutRequestId, PayoutStatus, ProcessorAccount,
    RiskSignals,
};
pub use evaluation::{
    Decision, EligibilityPolicy, EvaluationContext, FixedPolicyConfig, Ineligibility,
    PayoutPolicyConfig, PolicyConfigProvider, PolicyVerdict,
};
pub use memory::{InMemoryLedgerStore, ProcessorBehavior, ScriptedProcessor};
pub use report::{EvaluationReport, PayoutStatusView};
pub use repository::{
    ExternalPayout, LedgerStore, PaymentProcessor, PayoutInstruction, ProcessorError,
    SettlementCommit, SettlementReceipt, StatusUpdate, StoreError,
};
pub use router::payout_router;
pub use service::{PayoutEvaluationService, PayoutServiceError, SweepEntry};
pub use settlement::{SettlementOptions, SettlementOutcome};
