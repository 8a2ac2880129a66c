use crate::infra::{seed_demo_ledger, DEMO_HUBBERS};
use chrono::Utc;
use clap::Args;
use payouts::config::{AppConfig, EnvPolicyConfig};
use payouts::error::AppError;
use payouts::workflows::payouts::{
    EvaluationReport, FixedPolicyConfig, InMemoryLedgerStore, LedgerStore,
    PayoutEvaluationService, PayoutRequestId, PayoutServiceError, PolicyConfigProvider,
    ScriptedProcessor, SettlementOptions,
};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct EvaluateArgs {
    /// Payout request to evaluate (seeded ids are po-a through po-e)
    #[arg(long = "id")]
    pub(crate) payout_request_id: String,
}

#[derive(Args, Debug)]
pub(crate) struct SweepArgs {
    /// Maximum number of pending requests to evaluate
    #[arg(long, default_value_t = 50)]
    pub(crate) limit: usize,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Print the full JSON report for every scenario
    #[arg(long)]
    pub(crate) json: bool,
}

type DemoService<C> = PayoutEvaluationService<InMemoryLedgerStore, ScriptedProcessor, C>;

fn seeded_service<C>(
    settings: C,
    options: SettlementOptions,
) -> Result<(DemoService<C>, Arc<InMemoryLedgerStore>), AppError>
where
    C: PolicyConfigProvider + 'static,
{
    let store = Arc::new(InMemoryLedgerStore::new());
    seed_demo_ledger(&store, Utc::now()).map_err(PayoutServiceError::from)?;
    let service = PayoutEvaluationService::new(
        store.clone(),
        Arc::new(ScriptedProcessor::new()),
        Arc::new(settings),
        options,
    );
    Ok((service, store))
}

pub(crate) async fn run_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let (service, _) = seeded_service(EnvPolicyConfig, config.payouts.settlement)?;

    let report = service
        .evaluate(&PayoutRequestId(args.payout_request_id))
        .await?;
    print_json(&report);
    Ok(())
}

pub(crate) async fn run_sweep(args: SweepArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let (service, _) = seeded_service(EnvPolicyConfig, config.payouts.settlement)?;

    let entries = service.sweep(args.limit).await?;
    println!("Evaluated {} pending request(s)", entries.len());
    for entry in &entries {
        match (&entry.report, &entry.error) {
            (Some(report), _) => println!("- {}", outcome_line(report)),
            (None, Some(error)) => println!("- {}: error: {error}", entry.payout_request_id),
            (None, None) => println!("- {}: no outcome", entry.payout_request_id),
        }
    }
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let mut policy = config.payouts.policy.clone();
    policy.automatic_payouts_enabled = true;

    println!("Automatic payout demo");
    println!(
        "Thresholds: ceiling {} | minimum {} | tenure {} days | {} completed bookings",
        policy.automatic_approval_ceiling,
        policy.minimum_amount,
        policy.minimum_tenure_days,
        policy.minimum_completed_transactions
    );

    let (service, store) = seeded_service(FixedPolicyConfig(policy), config.payouts.settlement)?;

    for hubber in DEMO_HUBBERS.iter() {
        let id = PayoutRequestId(hubber.request.to_string());
        println!("\n{} ({}): {}", hubber.name, hubber.request, hubber.expectation);
        match service.evaluate(&id).await {
            Ok(report) => {
                println!("  {}", outcome_line(&report));
                if args.json {
                    print_json(&report);
                }
            }
            Err(err) => println!("  evaluation failed: {err}"),
        }
    }

    println!("\nRepeat trigger for po-a");
    match service.evaluate(&PayoutRequestId("po-a".to_string())).await {
        Ok(report) => println!("  unexpected second outcome: {}", outcome_line(&report)),
        Err(err) => println!("  {err}"),
    }

    let ledger = store.transactions();
    println!("\nLedger entries written: {}", ledger.len());
    for transaction in &ledger {
        println!(
            "  - {} {} {}",
            transaction.id, transaction.amount, transaction.description
        );
    }

    let waiting = store
        .pending_requests(DEMO_HUBBERS.len())
        .await
        .map_err(PayoutServiceError::from)?;
    println!(
        "Requests still eligible for automatic sweep: {}",
        waiting.len()
    );

    Ok(())
}

fn outcome_line(report: &EvaluationReport) -> String {
    let verdict = if report.approved {
        format!(
            "approved, reference {}",
            report.external_reference.as_deref().unwrap_or("n/a")
        )
    } else if report.requires_manual_approval {
        format!(
            "manual review: {}",
            report.reason.as_deref().unwrap_or("no reason recorded")
        )
    } else {
        format!(
            "rejected: {}",
            report.reason.as_deref().unwrap_or("no reason recorded")
        )
    };
    format!("{} -> {} ({verdict})", report.payout_request_id, report.status)
}

fn print_json(report: &EvaluationReport) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{json}"),
        Err(err) => println!("  report unavailable: {err}"),
    }
}
