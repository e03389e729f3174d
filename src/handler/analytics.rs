use std::sync::Arc;

use axum::{
    extract::Query,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use validator::Validate;

use crate::{
    dtos::{AnalyticsHistoryQueryDto, ApiResponse, GenerateAnalyticsDto},
    error::HttpError,
    middleware::{business_scope, BusinessScope},
    AppState,
};

pub fn analytics_handler() -> Router {
    Router::new()
        .route("/dashboard", get(get_dashboard))
        .route("/generate", post(generate_snapshot))
        .route("/history", get(get_history))
        .layer(middleware::from_fn(business_scope))
}

pub async fn get_dashboard(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
) -> Result<impl IntoResponse, HttpError> {
    let figures = app_state.analytics.dashboard(scope.business.id).await?;
    Ok(Json(ApiResponse::success(figures)))
}

pub async fn generate_snapshot(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
    Json(body): Json<GenerateAnalyticsDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let snapshot = app_state
        .analytics
        .generate(scope.business.id, body.period.unwrap_or_default())
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(snapshot))))
}

pub async fn get_history(
    Query(query_params): Query<AnalyticsHistoryQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let snapshots = app_state
        .analytics
        .history(scope.business.id, query_params.period, query_params.limit)
        .await?;

    Ok(Json(ApiResponse::success(snapshots)))
}
