use super::{
    AppState,
    error::{ApiError, BasicResponse},
    user::{User, is_valid_user_id},
};
use crate::server::{
    service::greeter::greet,
    telemetry::{increment_request_errors, increment_requests},
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use fanout::{AggregateReport, StatusResult, UnitState};
use serde::{Deserialize, Serialize};

/// `GET /api/v1/ping`
pub async fn ping() -> Json<BasicResponse> {
    Json(BasicResponse::new("pong"))
}

/// `GET /api/v1/user/{id}`
pub async fn user_get(Path(id): Path<String>) -> Result<Json<BasicResponse>, ApiError> {
    if !is_valid_user_id(&id) {
        return Err(ApiError::NotFound);
    }
    Ok(Json(BasicResponse::new(format!("Hello {id}!"))))
}

/// `POST /api/v1/user/`
pub async fn user_post(
    payload: Result<Json<User>, JsonRejection>,
) -> Result<Json<BasicResponse>, ApiError> {
    let Json(user) = payload?;
    user.validate().map_err(ApiError::bad_request)?;

    tracing::info!("Adding user {} ({})", user.name, user.id);
    Ok(Json(BasicResponse::new(format!(
        "User '{}' (id: {}) was successfully added.",
        user.name, user.id
    ))))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HelloBody {
    pub name: String,
}

/// `POST /v1/hello`
pub async fn hello(
    payload: Result<Json<HelloBody>, JsonRejection>,
) -> Result<Json<BasicResponse>, ApiError> {
    increment_requests();
    let Json(body) = payload.inspect_err(|_| increment_request_errors())?;
    let message = greet(&body.name).inspect_err(|_| increment_request_errors())?;
    Ok(Json(BasicResponse::new(message)))
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub units: Option<u32>,
}

/// JSON rendering of an [`AggregateReport`].
#[derive(Debug, Serialize)]
pub struct StatusView {
    pub expected: usize,
    pub partial: bool,
    pub completed: usize,
    pub canceled: usize,
    pub failed: usize,
    pub results: Vec<StatusResult>,
}

impl From<AggregateReport> for StatusView {
    fn from(report: AggregateReport) -> Self {
        Self {
            expected: report.expected(),
            partial: !report.is_complete(),
            completed: report.count(UnitState::Completed),
            canceled: report.count(UnitState::Canceled),
            failed: report.count(UnitState::Failed),
            results: report.into_results(),
        }
    }
}

/// `GET /api/v1/status?units=N`
///
/// Holds the connection until every unit reports. A client that disconnects
/// early drops this future, which cancels the remaining units.
pub async fn status(
    State(state): State<AppState>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<StatusView>, ApiError> {
    let Query(query) = query?;
    let report = state.status.aggregate(query.units).await?;
    for result in report.results() {
        tracing::info!("{}", result.message());
    }
    Ok(Json(report.into()))
}
