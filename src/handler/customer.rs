use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::CustomerExt,
    dtos::{
        ApiResponse, CreateCustomerDto, CustomerQueryDto, FilterCustomerDto, ListResponse,
        PublicSignupDto, UpdateCustomerDto, UpdateCustomerProfileDto, DEFAULT_PAGE_SIZE,
    },
    error::{internal_error, HttpError},
    middleware::{business_scope, customer_scope, BusinessScope, CustomerScope},
    service::error::ServiceError,
    AppState,
};

pub fn customer_handler() -> Router {
    Router::new()
        .route(
            "/",
            get(get_customers)
                .post(create_customer)
                .layer(middleware::from_fn(business_scope)),
        )
        .route(
            "/profile",
            get(get_profile)
                .put(update_profile)
                .layer(middleware::from_fn(customer_scope)),
        )
        .route(
            "/:id",
            get(get_customer)
                .put(update_customer)
                .delete(delete_customer)
                .layer(middleware::from_fn(business_scope)),
        )
}

pub fn public_customer_handler() -> Router {
    Router::new().route("/public-referral", post(public_referral_signup))
}

pub async fn create_customer(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
    Json(body): Json<CreateCustomerDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let business_id = scope.business.id;

    if let Some(code) = body.referral_code.clone() {
        let conversion = app_state
            .ledger
            .convert_by_code(business_id, &code, body.into_new_customer())
            .await?;

        return Ok((
            StatusCode::CREATED,
            Json(ApiResponse::success(
                serde_json::to_value(conversion).map_err(internal_error)?,
            )),
        ));
    }

    let draft = body
        .draft(business_id, app_state.clock.now())
        .map_err(HttpError::bad_request)?;

    let customer = app_state
        .db_client
        .save_customer(&draft)
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?;

    tracing::info!("customer {} added to business {}", customer.id, business_id);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(serde_json::json!({ "customer": customer }))),
    ))
}

pub async fn get_customers(
    Query(query_params): Query<CustomerQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let page = query_params.page.unwrap_or(1);
    let limit = query_params.limit.unwrap_or(DEFAULT_PAGE_SIZE);

    let (customers, total) = app_state
        .db_client
        .get_customers(
            scope.business.id,
            query_params.search.as_deref(),
            query_params.source,
            page,
            limit,
        )
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?;

    Ok(Json(ListResponse::new(
        FilterCustomerDto::filter_customers(&customers),
        total,
        page,
    )))
}

pub async fn get_customer(
    Path(customer_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
) -> Result<impl IntoResponse, HttpError> {
    let customer = app_state
        .db_client
        .get_customer(scope.business.id, customer_id)
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?
        .ok_or_else(|| HttpError::not_found("Customer not found"))?;

    Ok(Json(ApiResponse::success(customer)))
}

pub async fn update_customer(
    Path(customer_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
    Json(body): Json<UpdateCustomerDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let changes = body.changes().map_err(HttpError::bad_request)?;

    let customer = app_state
        .db_client
        .update_customer(scope.business.id, customer_id, changes)
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?
        .ok_or_else(|| HttpError::not_found("Customer not found"))?;

    Ok(Json(ApiResponse::success(customer)))
}

/// Soft delete. Referral history keeps pointing at the row.
pub async fn delete_customer(
    Path(customer_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<BusinessScope>,
) -> Result<impl IntoResponse, HttpError> {
    let customer = app_state
        .db_client
        .deactivate_customer(scope.business.id, customer_id)
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?
        .ok_or_else(|| HttpError::not_found("Customer not found"))?;

    tracing::info!("customer {} deactivated", customer.id);

    Ok(Json(ApiResponse::success(customer)))
}

pub async fn get_profile(
    Extension(scope): Extension<CustomerScope>,
) -> Result<impl IntoResponse, HttpError> {
    Ok(Json(ApiResponse::success(scope.customer)))
}

pub async fn update_profile(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(scope): Extension<CustomerScope>,
    Json(body): Json<UpdateCustomerProfileDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let changes = body.changes().map_err(HttpError::bad_request)?;

    let customer = app_state
        .db_client
        .update_customer(scope.customer.business_id, scope.customer.id, changes)
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?
        .ok_or_else(|| HttpError::not_found("Customer not found"))?;

    Ok(Json(ApiResponse::success(customer)))
}

pub async fn public_referral_signup(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<PublicSignupDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let conversion = app_state
        .ledger
        .convert_public(body.campaign_id, body.referrer_id, body.new_customer())
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(conversion))))
}
