use std::sync::Arc;

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, put},
    Extension, Json, Router,
};
use validator::Validate;

use crate::{
    db::{BusinessChanges, BusinessExt},
    dtos::{ApiResponse, UpdateBusinessDto, UpdateBusinessSettingsDto},
    error::HttpError,
    middleware::{business_scope, BusinessScope},
    service::error::ServiceError,
    utils::phone::normalize_phone,
    AppState,
};

pub fn business_handler() -> Router {
    Router::new()
        .route("/", get(get_business).put(update_business))
        .route("/settings", put(update_settings))
        .layer(middleware::from_fn(business_scope))
}

pub async fn get_business(
    Extension(scope): Extension<BusinessScope>,
) -> Result<impl IntoResponse, HttpError> {
    Ok(Json(ApiResponse::success(scope.business)))
}

pub async fn update_business(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
    Json(body): Json<UpdateBusinessDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let contact_phone = body
        .contact_phone
        .as_deref()
        .map(normalize_phone)
        .transpose()
        .map_err(HttpError::bad_request)?;

    let changes = BusinessChanges {
        business_name: body.business_name,
        description: body.description,
        industry: body.industry,
        website: body.website,
        contact_email: body.contact_email.map(|e| e.trim().to_lowercase()),
        contact_phone,
        ..Default::default()
    };

    let business = app_state
        .db_client
        .update_business(scope.business.id, changes)
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?;

    Ok(Json(ApiResponse::success(business)))
}

pub async fn update_settings(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
    Json(body): Json<UpdateBusinessSettingsDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let changes = BusinessChanges {
        email_notifications: body.email_notifications,
        sms_notifications: body.sms_notifications,
        default_reward_amount: body.default_reward_amount,
        default_referral_expiration_days: body.default_referral_expiration_days,
        ..Default::default()
    };

    let business = app_state
        .db_client
        .update_business(scope.business.id, changes)
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?;

    tracing::info!("settings updated for business {}", business.id);

    Ok(Json(ApiResponse::success(business)))
}
