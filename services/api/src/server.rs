use crate::cli::ServeArgs;
use crate::demo::seed_demo_data;
use crate::infra::{AppState, InMemoryBookingStore, InMemoryPolicyStore};
use crate::routes::with_cancellation_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use salon_booking::cancellation::CancellationOrchestrator;
use salon_booking::config::AppConfig;
use salon_booking::error::AppError;
use salon_booking::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

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

    let bookings = Arc::new(InMemoryBookingStore::default());
    let policies = Arc::new(InMemoryPolicyStore::default());
    if config.stores.seed_demo_data {
        seed_demo_data(&bookings, &policies, Utc::now())?;
        info!("demo salon policies and bookings loaded");
    }
    let service = Arc::new(CancellationOrchestrator::new(bookings, policies));

    let app = with_cancellation_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "salon cancellation service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
