use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{ReferralExt, ReferralFilter},
    dtos::{
        ApiResponse, ConvertRefereeDto, CreateReferralDto, FollowUpDto, GenerateReferralDto,
        ListResponse, ReferralQueryDto, UpdateReferralStatusDto, DEFAULT_PAGE_SIZE,
    },
    error::HttpError,
    middleware::{business_scope, customer_scope, BusinessScope, CustomerScope},
    service::error::ServiceError,
    AppState,
};

pub fn referral_handler() -> Router {
    Router::new()
        .route(
            "/",
            get(get_referrals)
                .post(create_referral)
                .layer(middleware::from_fn(business_scope)),
        )
        .route(
            "/customer",
            get(get_customer_referrals).layer(middleware::from_fn(customer_scope)),
        )
        .route(
            "/generate-code",
            post(generate_code).layer(middleware::from_fn(customer_scope)),
        )
        .route(
            "/:id",
            get(get_referral).layer(middleware::from_fn(business_scope)),
        )
        .route(
            "/:id/status",
            put(update_referral_status).layer(middleware::from_fn(business_scope)),
        )
        .route(
            "/:id/convert",
            post(convert_referee).layer(middleware::from_fn(business_scope)),
        )
        .route(
            "/:id/followup",
            post(send_follow_up).layer(middleware::from_fn(business_scope)),
        )
}

/// Click tracking is hit straight from shared links.
pub fn public_referral_handler() -> Router {
    Router::new().route("/:id/click", put(track_click).get(track_click))
}

pub async fn create_referral(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
    Json(body): Json<CreateReferralDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let created = app_state
        .ledger
        .create_referral(scope.business.id, body.into())
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

pub async fn generate_code(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<CustomerScope>,
    Json(body): Json<GenerateReferralDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let customer = scope.customer;
    let created = app_state
        .ledger
        .create_referral(customer.business_id, body.for_referrer(customer.id))
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

pub async fn get_referrals(
    Query(query_params): Query<ReferralQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let page = query_params.page.unwrap_or(1);
    let limit = query_params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let filter = ReferralFilter {
        status: query_params.status,
        campaign_id: query_params.campaign_id,
        referrer_id: query_params.referrer_id,
    };

    let (referrals, total) = app_state
        .db_client
        .get_referrals(scope.business.id, filter, page, limit)
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?;

    Ok(Json(ListResponse::new(referrals, total, page)))
}

pub async fn get_referral(
    Path(referral_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
) -> Result<impl IntoResponse, HttpError> {
    let referral = app_state
        .db_client
        .get_referral(scope.business.id, referral_id)
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?
        .ok_or_else(|| HttpError::not_found("Referral not found"))?;

    Ok(Json(ApiResponse::success(referral)))
}

pub async fn get_customer_referrals(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<CustomerScope>,
) -> Result<impl IntoResponse, HttpError> {
    let referrals = app_state
        .db_client
        .get_customer_referrals(scope.customer.id)
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?;

    Ok(Json(ApiResponse::success(referrals)))
}

pub async fn update_referral_status(
    Path(referral_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
    Json(body): Json<UpdateReferralStatusDto>,
) -> Result<impl IntoResponse, HttpError> {
    let outcome = app_state
        .ledger
        .transition_status(
            scope.business.id,
            referral_id,
            body.status,
            body.conversion_details,
        )
        .await?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "referral": outcome.referral,
        "customer": outcome.referee,
        "rewards": outcome.rewards,
    }))))
}

pub async fn convert_referee(
    Path(referral_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
    Json(body): Json<ConvertRefereeDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let (customer, details) = body.split();
    let conversion = app_state
        .ledger
        .convert_referee(scope.business.id, referral_id, customer, details)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(conversion))))
}

pub async fn send_follow_up(
    Path(referral_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
    Json(body): Json<FollowUpDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let referral = app_state
        .ledger
        .send_follow_up(scope.business.id, referral_id, body.method, &body.message)
        .await?;

    Ok(Json(ApiResponse::success(referral)))
}

pub async fn track_click(
    Path(locator): Path<String>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let referral = app_state.ledger.track_click(&locator).await?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "referralId": referral.id,
        "campaignId": referral.campaign_id,
        "status": referral.status,
        "clickCount": referral.click_count,
    }))))
}
