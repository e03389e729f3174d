use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{BusinessExt, CustomerExt, RewardExt, RewardFilter},
    dtos::{
        ApiResponse, ClaimRewardDto, ListResponse, RewardNotificationDto, RewardQueryDto,
        UpdateRewardStatusDto, VerifyRewardCodeDto, DEFAULT_PAGE_SIZE,
    },
    error::{ErrorMessage, HttpError},
    middleware::{
        business_scope, customer_scope, role_check, BusinessScope, CustomerScope,
        JWTAuthMiddleware,
    },
    models::usermodel::UserRole,
    service::error::ServiceError,
    AppState,
};

pub fn reward_handler() -> Router {
    Router::new()
        .route(
            "/",
            get(get_rewards).layer(middleware::from_fn(business_scope)),
        )
        .route(
            "/customer",
            get(get_customer_rewards).layer(middleware::from_fn(customer_scope)),
        )
        .route(
            "/verify",
            post(verify_reward_code).layer(middleware::from_fn(business_scope)),
        )
        .route(
            "/:id",
            get(get_reward).layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![UserRole::Business, UserRole::Customer])
            })),
        )
        .route(
            "/:id/status",
            put(update_reward_status).layer(middleware::from_fn(business_scope)),
        )
        .route(
            "/:id/notify",
            post(send_reward_notification).layer(middleware::from_fn(business_scope)),
        )
        .route(
            "/:id/claim",
            post(claim_reward).layer(middleware::from_fn(customer_scope)),
        )
}

pub async fn get_rewards(
    Query(query_params): Query<RewardQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let page = query_params.page.unwrap_or(1);
    let limit = query_params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let filter = RewardFilter {
        campaign_id: query_params.campaign_id,
        status: query_params.status,
        recipient_type: query_params.recipient_type,
        reward_type: query_params.reward_type,
    };

    let (rewards, total) = app_state
        .db_client
        .get_rewards(scope.business.id, filter, page, limit)
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?;

    Ok(Json(ListResponse::new(rewards, total, page)))
}

pub async fn get_customer_rewards(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<CustomerScope>,
) -> Result<impl IntoResponse, HttpError> {
    let rewards = app_state
        .db_client
        .get_customer_rewards(scope.customer.id)
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?;

    Ok(Json(ApiResponse::success(rewards)))
}

/// Readable by the owning business and by the recipient.
pub async fn get_reward(
    Path(reward_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let reward = match user.user.role {
        UserRole::Business => {
            let business = app_state
                .db_client
                .get_business_by_user(user.user.id)
                .await
                .map_err(|e| HttpError::from(ServiceError::from(e)))?
                .ok_or_else(|| {
                    HttpError::forbidden(ErrorMessage::BusinessProfileMissing.to_string())
                })?;
            app_state.rewards.get(business.id, reward_id).await?
        }
        _ => {
            let customer = app_state
                .db_client
                .get_customer_by_user(user.user.id)
                .await
                .map_err(|e| HttpError::from(ServiceError::from(e)))?
                .ok_or_else(|| {
                    HttpError::forbidden(ErrorMessage::CustomerProfileMissing.to_string())
                })?;
            app_state
                .db_client
                .get_reward(customer.business_id, reward_id)
                .await
                .map_err(|e| HttpError::from(ServiceError::from(e)))?
                .filter(|reward| reward.recipient_id == customer.id)
                .ok_or_else(|| HttpError::not_found("Reward not found"))?
        }
    };

    Ok(Json(ApiResponse::success(reward)))
}

pub async fn verify_reward_code(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
    Json(body): Json<VerifyRewardCodeDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let reward = app_state
        .rewards
        .verify_code(scope.business.id, &body.code)
        .await?;

    Ok(Json(ApiResponse::success(reward)))
}

pub async fn update_reward_status(
    Path(reward_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
    Json(body): Json<UpdateRewardStatusDto>,
) -> Result<impl IntoResponse, HttpError> {
    let reward = app_state
        .rewards
        .update_status(
            scope.business.id,
            reward_id,
            body.status,
            body.claim_details,
            body.notify_recipient,
        )
        .await?;

    Ok(Json(ApiResponse::success(reward)))
}

pub async fn send_reward_notification(
    Path(reward_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
    Json(body): Json<RewardNotificationDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let record = app_state
        .rewards
        .send_notification(scope.business.id, reward_id, body.kind, body.custom_message)
        .await?;

    Ok(Json(ApiResponse::success(record)))
}

pub async fn claim_reward(
    Path(reward_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<CustomerScope>,
    body: Option<Json<ClaimRewardDto>>,
) -> Result<impl IntoResponse, HttpError> {
    let details = body
        .and_then(|Json(dto)| dto.claim_details)
        .unwrap_or_default();

    let reward = app_state
        .rewards
        .claim(reward_id, scope.customer.id, details)
        .await?;

    tracing::info!("reward {} claimed by customer {}", reward.id, scope.customer.id);

    Ok(Json(ApiResponse::success(reward)))
}
