use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use microfin::config::AppConfig;
use microfin::error::AppError;
use microfin::lending::LendingDesk;
use microfin::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

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

    let desk = Arc::new(LendingDesk::in_memory(&config.engine)?);

    if !config.engine.orphan_sweep_interval.is_zero() {
        spawn_orphan_sweep(desk.clone(), config.engine.orphan_sweep_interval);
    }

    let app = with_service_routes(desk)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        sequence_file = ?config.engine.sequence_file,
        reporting_offset = %config.engine.reporting_offset,
        "lending service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

/// Periodically discards loans left behind by approvals whose final write failed.
pub(crate) fn spawn_orphan_sweep(desk: Arc<LendingDesk>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let desk = desk.clone();
            match tokio::task::spawn_blocking(move || desk.reconcile_orphans()).await {
                Ok(Ok(report))
                    if report.discarded.is_empty() && report.dangling_applications.is_empty() =>
                {
                    debug!(examined = report.examined, "orphan sweep found nothing");
                }
                Ok(Ok(report)) => warn!(
                    examined = report.examined,
                    discarded = ?report.discarded,
                    dangling = ?report.dangling_applications,
                    "orphan sweep repaired loan links"
                ),
                Ok(Err(err)) => warn!(error = %err, "orphan sweep failed; retrying next tick"),
                Err(err) => error!(error = %err, "orphan sweep task aborted"),
            }
        }
    })
}
