use crate::cli::ServeArgs;
use crate::infra::{seed_demo_ledger, AppState};
use crate::routes::with_payout_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use payouts::config::{AppConfig, AppEnvironment, EnvPolicyConfig};
use payouts::error::AppError;
use payouts::telemetry;
use payouts::workflows::payouts::{
    InMemoryLedgerStore, PayoutEvaluationService, PayoutServiceError, ScriptedProcessor,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryLedgerStore::new());
    if config.environment == AppEnvironment::Production {
        warn!("production environment runs on an empty in-memory ledger");
    } else {
        let seeded = seed_demo_ledger(&store, Utc::now()).map_err(PayoutServiceError::from)?;
        info!(requests = seeded.len(), "demo ledger seeded");
    }

    if !config.payouts.policy.automatic_payouts_enabled {
        warn!("automatic payouts disabled; every trigger is routed to manual approval");
    }

    let service = Arc::new(PayoutEvaluationService::new(
        store,
        Arc::new(ScriptedProcessor::new()),
        Arc::new(EnvPolicyConfig),
        config.payouts.settlement.clone(),
    ));

    let app = with_payout_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "payout service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
