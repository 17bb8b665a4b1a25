use crate::cli::ServeArgs;
use crate::infra::{AppState, RecordingNotifications};
use crate::routes::with_staffing_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use care_rota::config::AppConfig;
use care_rota::error::AppError;
use care_rota::telemetry;
use care_rota::workflows::staffing::{
    InMemoryStaffingRepository, StaffingApi, StaffingConfig, StaffingService, VerificationService,
};
use std::sync::atomic::{AtomicBool, Ordering};
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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(InMemoryStaffingRepository::with_lock_timeout(
        config.storage.timeout,
    ));
    let notifications = Arc::new(RecordingNotifications::default());
    let staffing_config = StaffingConfig::from(&config);
    let api = StaffingApi {
        staffing: Arc::new(StaffingService::new(
            repository.clone(),
            notifications.clone(),
            staffing_config,
        )),
        verification: Arc::new(VerificationService::new(
            repository,
            notifications,
            staffing_config,
        )),
    };

    let app = with_staffing_routes(api)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        max_shift_hours = config.scheduling.max_shift_hours,
        retry_attempts = staffing_config.retry_attempts,
        "care rota service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
