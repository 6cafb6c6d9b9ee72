use crate::cli::ServeArgs;
use crate::infra::{dispatch_config, AppState, InMemoryUpdatePublisher};
use crate::routes::with_dispatch_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use cargolink::config::AppConfig;
use cargolink::dispatch::{
    run_expiry_sweep, CapacityRegistry, DispatchService, HaversineEstimator, ShipmentStore,
};
use cargolink::error::AppError;
use cargolink::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub(crate) async fn run(args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let registry = Arc::new(CapacityRegistry::new());
    let store = Arc::new(ShipmentStore::new());
    let notifier = Arc::new(InMemoryUpdatePublisher::default());
    let dispatch_service = Arc::new(DispatchService::new(
        registry.clone(),
        store,
        Arc::new(HaversineEstimator::default()),
        notifier,
        dispatch_config(&config.dispatch),
    ));

    let app = with_dispatch_routes(dispatch_service.clone())
        .layer(Extension(app_state))
        .layer(Extension(registry))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    tokio::spawn(run_expiry_sweep(
        dispatch_service,
        Duration::from_secs(config.dispatch.sweep_seconds),
    ));

    info!(
        environment = config.environment.label(),
        %addr,
        "cargo dispatch engine ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
