use std::sync::Arc;

use axum::{middleware, response::IntoResponse, routing::post, Extension, Json, Router};

use crate::{
    dtos::ApiResponse, error::HttpError, middleware::cron_key, AppState,
};

/// Endpoints for the external scheduler. There is no in-process timer.
pub fn maintenance_handler() -> Router {
    Router::new()
        .route("/expire", post(expire_stale))
        .layer(middleware::from_fn(cron_key))
}

pub async fn expire_stale(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let report = app_state.ledger.expire_stale().await?;

    tracing::info!(
        "expiry sweep: {} referrals and {} rewards expired",
        report.referrals_expired,
        report.rewards_expired
    );

    Ok(Json(ApiResponse::success(report)))
}
