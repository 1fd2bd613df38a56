use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::errors::AdvisorError;
use crate::models::{ClassificationResult, SchoolRecord};
use crate::{db, fit};

/// Shared handler state. The two default candidate-set sizes are
/// independent knobs; the two read paths use different fallbacks.
#[derive(Clone)]
pub struct ApiState {
    pub pool: SqlitePool,
    pub recommend_limit: i64,
    pub insight_limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct FitRequest {
    pub gpa: Option<f64>,
    pub candidate_school_ids: Option<Vec<i64>>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/recommendations", post(recommendations))
        .route("/api/insights", post(insights))
        .with_state(state)
}

struct ApiError(AdvisorError);

impl From<AdvisorError> for ApiError {
    fn from(err: AdvisorError) -> Self {
        ApiError(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError(AdvisorError::Internal(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AdvisorError::Validation(_) | AdvisorError::InsufficientData => {
                StatusCode::BAD_REQUEST
            }
            AdvisorError::Provider(_) => StatusCode::BAD_GATEWAY,
            AdvisorError::Database(_) | AdvisorError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

fn require_gpa(request: &FitRequest) -> Result<f64, AdvisorError> {
    request
        .gpa
        .ok_or_else(|| AdvisorError::Validation("gpa is required".to_string()))
}

/// Explicit ids read from the cache in request order; otherwise the most
/// recently refreshed rows stand in as the candidate set.
async fn candidate_set(
    state: &ApiState,
    request: &FitRequest,
    default_limit: i64,
) -> anyhow::Result<Vec<SchoolRecord>> {
    match request.candidate_school_ids.as_deref() {
        Some(ids) if !ids.is_empty() => db::schools_by_external_ids(&state.pool, ids).await,
        _ => db::recent_schools(&state.pool, default_limit).await,
    }
}

fn detail_entry(result: &ClassificationResult) -> serde_json::Value {
    json!({
        "school_id": result.school.external_id,
        "name": result.school.name,
        "state": result.school.state,
        "median_gpa": result.school.median_gpa,
        "score": result.score,
        "bucket": result.bucket.label(),
    })
}

async fn recommendations(
    State(state): State<ApiState>,
    Json(request): Json<FitRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let gpa = require_gpa(&request)?;
    let candidates = candidate_set(&state, &request, state.recommend_limit).await?;
    let grouped = fit::recommend(gpa, &candidates);

    let names = |results: &[ClassificationResult]| {
        results
            .iter()
            .map(|r| r.school.name.clone())
            .collect::<Vec<_>>()
    };

    let detail: Vec<serde_json::Value> = candidates
        .iter()
        .map(|school| detail_entry(&fit::classify(gpa, school)))
        .collect();

    Ok(Json(json!({
        "recommendations": {
            "reach": names(&grouped.reach),
            "target": names(&grouped.target),
            "safety": names(&grouped.safety),
        },
        "detail": detail,
    })))
}

async fn insights(
    State(state): State<ApiState>,
    Json(request): Json<FitRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let gpa = require_gpa(&request)?;
    let candidates = candidate_set(&state, &request, state.insight_limit).await?;
    let insights = fit::percentile_summary(gpa, &candidates)?;

    Ok(Json(json!({
        "labels": insights.labels,
        "counts": insights.counts,
        "user_percentile": insights.user_percentile,
        "n_schools": insights.sample_size,
    })))
}
