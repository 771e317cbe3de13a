use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{CategoryId, DriverId, PenaltyId, RoundId};
use super::normalizer::RawSessionData;
use super::penalties::PenaltySpec;
use super::repository::{LeagueStore, StoreError};
use super::service::{LeagueService, LeagueServiceError};
use super::EngineError;

/// Router builder exposing the league engine over HTTP.
pub fn league_router<S>(service: Arc<LeagueService<S>>) -> Router
where
    S: LeagueStore + 'static,
{
    Router::new()
        .route("/api/v1/results", post(save_results_handler::<S>))
        .route("/api/v1/penalties", post(apply_penalty_handler::<S>))
        .route(
            "/api/v1/categories/:category_id/penalties/:penalty_id",
            delete(reverse_penalty_handler::<S>),
        )
        .route(
            "/api/v1/categories/:category_id/standings",
            get(standings_handler::<S>),
        )
        .route(
            "/api/v1/categories/:category_id/calendar",
            get(calendar_handler::<S>),
        )
        .route(
            "/api/v1/categories/:category_id/drivers/:driver_id/stats",
            get(driver_stats_handler::<S>),
        )
        .route(
            "/api/v1/maintenance/ratings",
            post(recompute_ratings_handler::<S>),
        )
        .with_state(service)
}

/// Raw round submission body: one entry per session run at the round.
#[derive(Debug, Deserialize)]
pub struct ResultsSubmission {
    pub category_id: CategoryId,
    pub round_id: RoundId,
    pub sessions: Vec<RawSessionData>,
}

/// Penalty application body.
#[derive(Debug, Deserialize)]
pub struct PenaltyRequest {
    pub category_id: CategoryId,
    #[serde(flatten)]
    pub spec: PenaltySpec,
}

pub(crate) async fn save_results_handler<S>(
    State(service): State<Arc<LeagueService<S>>>,
    axum::Json(submission): axum::Json<ResultsSubmission>,
) -> Response
where
    S: LeagueStore + 'static,
{
    match service.ingest_raw_round(
        submission.category_id,
        submission.round_id,
        &submission.sessions,
    ) {
        Ok(report) => (StatusCode::CREATED, axum::Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn apply_penalty_handler<S>(
    State(service): State<Arc<LeagueService<S>>>,
    axum::Json(request): axum::Json<PenaltyRequest>,
) -> Response
where
    S: LeagueStore + 'static,
{
    match service.apply_penalty(request.category_id, request.spec) {
        Ok(receipt) => (StatusCode::CREATED, axum::Json(receipt)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn reverse_penalty_handler<S>(
    State(service): State<Arc<LeagueService<S>>>,
    Path((category_id, penalty_id)): Path<(u32, u32)>,
) -> Response
where
    S: LeagueStore + 'static,
{
    match service.reverse_penalty(CategoryId(category_id), PenaltyId(penalty_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn standings_handler<S>(
    State(service): State<Arc<LeagueService<S>>>,
    Path(category_id): Path<u32>,
) -> Response
where
    S: LeagueStore + 'static,
{
    match service.standings(CategoryId(category_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn calendar_handler<S>(
    State(service): State<Arc<LeagueService<S>>>,
    Path(category_id): Path<u32>,
) -> Response
where
    S: LeagueStore + 'static,
{
    match service.calendar(CategoryId(category_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn driver_stats_handler<S>(
    State(service): State<Arc<LeagueService<S>>>,
    Path((category_id, driver_id)): Path<(u32, u32)>,
) -> Response
where
    S: LeagueStore + 'static,
{
    match service.driver_stats(CategoryId(category_id), DriverId(driver_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn recompute_ratings_handler<S>(
    State(service): State<Arc<LeagueService<S>>>,
) -> Response
where
    S: LeagueStore + 'static,
{
    match service.recompute_ratings() {
        Ok(updated) => {
            let payload = json!({ "drivers_updated": updated });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

fn error_response(error: LeagueServiceError) -> Response {
    let status = match &error {
        LeagueServiceError::Engine(EngineError::DuplicateSubmission { .. }) => {
            StatusCode::CONFLICT
        }
        LeagueServiceError::Engine(EngineError::Mapping { .. })
        | LeagueServiceError::Engine(EngineError::InvalidDraft { .. }) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        LeagueServiceError::Engine(EngineError::MissingPriorResult { .. }) => {
            StatusCode::NOT_FOUND
        }
        LeagueServiceError::Engine(EngineError::InconsistentState { .. }) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        LeagueServiceError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
        LeagueServiceError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
        LeagueServiceError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
