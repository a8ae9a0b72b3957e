//! Valuation endpoints
//!
//! - `POST /predict`: blended price with the default neighbour count
//! - `POST /similar?k=N`: blended price plus the neighbours behind it
//! - `POST /segmento`: global and local segment of the property
//!
//! Bodies are `PropiedadInput` JSON. A body serde cannot read (malformed
//! JSON, missing required field, unknown field) is answered with 422.

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use sicop_common::api::{EstimateResponse, PropertyInput, SegmentResponse, SimilarResponse};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Query parameters of `/similar`
#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    /// Neighbour count; the configured default when absent
    pub k: Option<usize>,
}

fn read_body(body: Result<Json<PropertyInput>, JsonRejection>) -> ApiResult<PropertyInput> {
    body.map(|Json(input)| input)
        .map_err(|rejection| ApiError::Unprocessable(rejection.body_text()))
}

/// POST /predict
pub async fn predict(
    State(state): State<AppState>,
    body: Result<Json<PropertyInput>, JsonRejection>,
) -> ApiResult<Json<EstimateResponse>> {
    let input = read_body(body)?;
    debug!(comuna = %input.comuna, "POST /predict");

    let response = state.engine.estimate(&input)?;
    Ok(Json(response))
}

/// POST /similar?k=N
pub async fn similar(
    State(state): State<AppState>,
    query: Result<Query<SimilarQuery>, QueryRejection>,
    body: Result<Json<PropertyInput>, JsonRejection>,
) -> ApiResult<Json<SimilarResponse>> {
    let Query(query) = query.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let input = read_body(body)?;
    debug!(comuna = %input.comuna, k = ?query.k, "POST /similar");

    let response = state.engine.find_similar(&input, query.k)?;
    Ok(Json(response))
}

/// POST /segmento
pub async fn segment(
    State(state): State<AppState>,
    body: Result<Json<PropertyInput>, JsonRejection>,
) -> ApiResult<Json<SegmentResponse>> {
    let input = read_body(body)?;
    debug!(comuna = %input.comuna, "POST /segmento");

    let response = state.engine.segment(&input)?;
    Ok(Json(response))
}

/// Build valuation routes
pub fn valuation_routes() -> Router<AppState> {
    Router::new()
        .route("/predict", post(predict))
        .route("/similar", post(similar))
        .route("/segmento", post(segment))
}
