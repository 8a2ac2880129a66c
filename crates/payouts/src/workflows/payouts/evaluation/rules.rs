use super::super::domain::RiskSignals;
use super::policy::Ineligibility;
use super::EvaluationContext;

/// Structural checks answered from the request and account snapshot alone.
pub(crate) type ScreeningRule = fn(&EvaluationContext<'_>) -> Option<Ineligibility>;

/// Risk checks that need the dispute and track-record counts.
pub(crate) type RiskRule = fn(&EvaluationContext<'_>, &RiskSignals) -> Option<Ineligibility>;

/// Evaluated in order; the first rule that fires decides.
pub(crate) const SCREENING_RULES: &[(&str, ScreeningRule)] = &[
    ("feature_gate", feature_gate),
    ("amount_ceiling", amount_ceiling),
    ("balance_sufficiency", balance_sufficiency),
    ("minimum_amount", minimum_amount),
    ("processor_activation", processor_activation),
];

/// Evaluated after every screening rule has passed.
pub(crate) const RISK_RULES: &[(&str, RiskRule)] = &[
    ("open_disputes", open_disputes),
    ("account_tenure", account_tenure),
    ("track_record", track_record),
];

fn feature_gate(ctx: &EvaluationContext<'_>) -> Option<Ineligibility> {
    (!ctx.config.automatic_payouts_enabled).then_some(Ineligibility::FeatureDisabled)
}

fn amount_ceiling(ctx: &EvaluationContext<'_>) -> Option<Ineligibility> {
    let requested = ctx.request.amount;
    let ceiling = ctx.config.automatic_approval_ceiling;
    (requested > ceiling).then_some(Ineligibility::AmountExceedsCeiling { requested, ceiling })
}

fn balance_sufficiency(ctx: &EvaluationContext<'_>) -> Option<Ineligibility> {
    let requested = ctx.request.amount;
    let available = ctx.account.balance;
    (requested > available).then_some(Ineligibility::InsufficientBalance {
        requested,
        available,
    })
}

fn minimum_amount(ctx: &EvaluationContext<'_>) -> Option<Ineligibility> {
    let requested = ctx.request.amount;
    let minimum = ctx.config.minimum_amount;
    (requested < minimum).then_some(Ineligibility::BelowMinimum { requested, minimum })
}

fn processor_activation(ctx: &EvaluationContext<'_>) -> Option<Ineligibility> {
    (!ctx.account.processor.is_fully_activated()).then_some(Ineligibility::AccountNotActivated)
}

fn open_disputes(_ctx: &EvaluationContext<'_>, signals: &RiskSignals) -> Option<Ineligibility> {
    (signals.open_disputes > 0).then_some(Ineligibility::OpenDisputes(signals.open_disputes))
}

fn account_tenure(ctx: &EvaluationContext<'_>, _signals: &RiskSignals) -> Option<Ineligibility> {
    let tenure_days = ctx.account.tenure_days(ctx.now);
    let minimum_days = ctx.config.minimum_tenure_days;
    (tenure_days < minimum_days).then_some(Ineligibility::AccountTooNew {
        tenure_days,
        minimum_days,
    })
}

fn track_record(ctx: &EvaluationContext<'_>, signals: &RiskSignals) -> Option<Ineligibility> {
    let completed = signals.completed_transactions;
    let minimum = ctx.config.minimum_completed_transactions;
    (completed < minimum).then_some(Ineligibility::InsufficientHistory { completed, minimum })
}
