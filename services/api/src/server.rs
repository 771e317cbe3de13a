use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use tracing::info;

use paddock::config::AppConfig;
use paddock::error::AppError;
use paddock::league::{CachedStore, LeagueService, RatingModelConfig, ScoringTable};
use paddock::telemetry;

use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryLeagueStore};
use crate::routes::with_league_routes;

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

    let store = CachedStore::new(
        InMemoryLeagueStore::seeded(),
        config.cache.capacity,
        config.cache.ttl,
    );
    let league_service = Arc::new(LeagueService::new(
        Arc::new(store),
        ScoringTable::default(),
        RatingModelConfig::default(),
    ));

    let app = with_league_routes(league_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "league results service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
