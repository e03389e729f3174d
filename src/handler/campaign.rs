use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::CampaignExt,
    dtos::{
        ApiResponse, CampaignQueryDto, CampaignStatsDto, CreateCampaignDto, ListResponse,
        PublicCampaignDto, UpdateCampaignDto, DEFAULT_PAGE_SIZE,
    },
    error::HttpError,
    middleware::{business_scope, customer_scope, BusinessScope, CustomerScope},
    models::campaignmodel::{Campaign, CampaignStatus},
    service::error::ServiceError,
    AppState,
};

pub fn campaign_handler() -> Router {
    Router::new()
        .route(
            "/",
            get(get_campaigns)
                .post(create_campaign)
                .layer(middleware::from_fn(business_scope)),
        )
        .route(
            "/active",
            get(get_active_campaigns).layer(middleware::from_fn(customer_scope)),
        )
        .route(
            "/:id",
            get(get_campaign)
                .put(update_campaign)
                .delete(delete_campaign)
                .layer(middleware::from_fn(business_scope)),
        )
        .route(
            "/:id/toggle",
            put(toggle_campaign).layer(middleware::from_fn(business_scope)),
        )
        .route(
            "/:id/status",
            put(change_campaign_status).layer(middleware::from_fn(business_scope)),
        )
        .route(
            "/:id/stats",
            get(get_campaign_stats).layer(middleware::from_fn(business_scope)),
        )
}

/// Routes reachable from a shared link without logging in.
pub fn public_campaign_handler() -> Router {
    Router::new().route("/:id/public", get(get_public_campaign))
}

#[derive(Debug, Deserialize)]
pub struct CampaignStatusDto {
    pub status: CampaignStatus,
}

async fn load_campaign(
    app_state: &AppState,
    business_id: Uuid,
    campaign_id: Uuid,
) -> Result<Campaign, HttpError> {
    app_state
        .db_client
        .get_campaign(business_id, campaign_id)
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?
        .ok_or_else(|| HttpError::not_found("Campaign not found"))
}

/// Moves a campaign along its status table. The write is guarded on the
/// status that was read.
async fn apply_status(
    app_state: &AppState,
    campaign: &Campaign,
    next: CampaignStatus,
) -> Result<Campaign, HttpError> {
    if !campaign.status.can_transition_to(next) {
        return Err(HttpError::bad_request(format!(
            "Cannot move campaign from {} to {}",
            campaign.status.to_str(),
            next.to_str()
        ))
        .with_kind("invalid_transition"));
    }

    app_state
        .db_client
        .update_campaign_status(campaign.business_id, campaign.id, campaign.status, next)
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?
        .ok_or_else(|| {
            HttpError::unique_constraint_violation("Campaign was changed by another request")
        })
}

pub async fn create_campaign(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
    Json(body): Json<CreateCampaignDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    if let (Some(start), Some(end)) = (body.start_date, body.end_date) {
        if end < start {
            return Err(HttpError::bad_request("End date must be after the start date"));
        }
    }

    let now = app_state.clock.now();
    let campaign = app_state
        .db_client
        .save_campaign(scope.business.id, body.into_new_campaign(now))
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?;

    tracing::info!(
        "campaign {} created for business {}",
        campaign.id,
        scope.business.id
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::success(campaign))))
}

pub async fn get_campaigns(
    Query(query_params): Query<CampaignQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let page = query_params.page.unwrap_or(1);
    let limit = query_params.limit.unwrap_or(DEFAULT_PAGE_SIZE);

    let (campaigns, total) = app_state
        .db_client
        .get_campaigns(
            scope.business.id,
            query_params.status,
            query_params.active,
            page,
            limit,
        )
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?;

    Ok(Json(ListResponse::new(campaigns, total, page)))
}

pub async fn get_campaign(
    Path(campaign_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
) -> Result<impl IntoResponse, HttpError> {
    let campaign = load_campaign(&app_state, scope.business.id, campaign_id).await?;
    Ok(Json(ApiResponse::success(campaign)))
}

pub async fn update_campaign(
    Path(campaign_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
    Json(body): Json<UpdateCampaignDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let mut campaign = load_campaign(&app_state, scope.business.id, campaign_id).await?;

    let start = body.start_date.unwrap_or(campaign.start_date);
    if let Some(end) = body.end_date.or(campaign.end_date) {
        if end < start {
            return Err(HttpError::bad_request("End date must be after the start date"));
        }
    }

    if let Some(next) = body.status.filter(|status| *status != campaign.status) {
        campaign = apply_status(&app_state, &campaign, next).await?;
    }

    // Rule edits only affect rewards issued from now on.
    let campaign = app_state
        .db_client
        .update_campaign(scope.business.id, campaign.id, body.changes())
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?
        .ok_or_else(|| HttpError::not_found("Campaign not found"))?;

    Ok(Json(ApiResponse::success(campaign)))
}

pub async fn change_campaign_status(
    Path(campaign_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
    Json(body): Json<CampaignStatusDto>,
) -> Result<impl IntoResponse, HttpError> {
    let campaign = load_campaign(&app_state, scope.business.id, campaign_id).await?;
    let campaign = apply_status(&app_state, &campaign, body.status).await?;

    tracing::info!(
        "campaign {} is now {}",
        campaign.id,
        campaign.status.to_str()
    );

    Ok(Json(ApiResponse::success(campaign)))
}

pub async fn toggle_campaign(
    Path(campaign_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
) -> Result<impl IntoResponse, HttpError> {
    let campaign = load_campaign(&app_state, scope.business.id, campaign_id).await?;

    let campaign = app_state
        .db_client
        .set_campaign_active(scope.business.id, campaign.id, !campaign.active)
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?
        .ok_or_else(|| HttpError::not_found("Campaign not found"))?;

    Ok(Json(ApiResponse::success(campaign)))
}

/// Soft delete: the campaign is cancelled and switched off. Its referrals
/// and rewards stay.
pub async fn delete_campaign(
    Path(campaign_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
) -> Result<impl IntoResponse, HttpError> {
    let campaign = app_state
        .db_client
        .cancel_campaign(scope.business.id, campaign_id)
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?
        .ok_or_else(|| HttpError::not_found("Campaign not found"))?;

    tracing::info!("campaign {} cancelled", campaign.id);

    Ok(Json(ApiResponse::success(campaign)))
}

pub async fn get_campaign_stats(
    Path(campaign_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
) -> Result<impl IntoResponse, HttpError> {
    let campaign = load_campaign(&app_state, scope.business.id, campaign_id).await?;
    Ok(Json(ApiResponse::success(CampaignStatsDto::from_campaign(
        &campaign,
    ))))
}

pub async fn get_active_campaigns(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<CustomerScope>,
) -> Result<impl IntoResponse, HttpError> {
    let campaigns = app_state
        .db_client
        .get_running_campaigns(scope.customer.business_id, app_state.clock.now())
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?
        .into_iter()
        .map(PublicCampaignDto::from_campaign)
        .collect::<Vec<_>>();

    Ok(Json(ApiResponse::success(campaigns)))
}

pub async fn get_public_campaign(
    Path(campaign_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let campaign = app_state
        .db_client
        .get_public_campaign(campaign_id)
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?
        .ok_or_else(|| HttpError::not_found("Campaign not found"))?;

    Ok(Json(ApiResponse::success(PublicCampaignDto::from_campaign(
        campaign,
    ))))
}
