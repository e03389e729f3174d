use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::IntoResponse,
    Extension,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    db::{BusinessExt, CustomerExt, UserExt},
    error::{ErrorMessage, HttpError},
    models::{
        businessmodel::Business,
        customermodel::Customer,
        usermodel::{User, UserRole},
    },
    service::error::ServiceError,
    utils::token,
    AppState,
};

pub const CRON_KEY_HEADER: &str = "x-cron-key";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JWTAuthMiddleware {
    pub user: User,
}

/// The tenant a business user acts for. Every business-side query is scoped
/// by its id.
#[derive(Debug, Clone)]
pub struct BusinessScope {
    pub business: Business,
}

#[derive(Debug, Clone)]
pub struct CustomerScope {
    pub customer: Customer,
}

fn bearer_token(req: &Request) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|auth_header| auth_header.to_str().ok())
        .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
        .map(str::to_owned)
}

pub async fn auth(
    cookie_jar: CookieJar,
    Extension(app_state): Extension<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let token = cookie_jar
        .get("token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| bearer_token(&req))
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string()))?;

    let token_details = token::decode_token(token, app_state.env.jwt_secret.as_bytes())
        .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))?;

    let user_id = uuid::Uuid::parse_str(&token_details)
        .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))?;

    let user = app_state
        .db_client
        .get_user(Some(user_id), None)
        .await
        .map_err(|_| HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string()))?
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string()))?;

    req.extensions_mut().insert(JWTAuthMiddleware { user });

    Ok(next.run(req).await)
}

fn authenticated_user(req: &Request, roles: &[UserRole]) -> Result<User, HttpError> {
    let user = req
        .extensions()
        .get::<JWTAuthMiddleware>()
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNotAuthenticated.to_string()))?;

    if !roles.contains(&user.user.role) {
        return Err(HttpError::new(
            ErrorMessage::PermissionDenied.to_string(),
            StatusCode::FORBIDDEN,
        ));
    }

    Ok(user.user.clone())
}

pub async fn role_check(
    Extension(_app_state): Extension<Arc<AppState>>,
    req: Request,
    next: Next,
    required_roles: Vec<UserRole>,
) -> Result<impl IntoResponse, HttpError> {
    authenticated_user(&req, &required_roles)?;
    Ok(next.run(req).await)
}

/// Business users only. Resolves the business owned by the logged-in user.
pub async fn business_scope(
    Extension(app_state): Extension<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let user = authenticated_user(&req, &[UserRole::Business])?;

    let business = app_state
        .db_client
        .get_business_by_user(user.id)
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?
        .filter(|business| business.active)
        .ok_or_else(|| HttpError::forbidden(ErrorMessage::BusinessProfileMissing.to_string()))?;

    req.extensions_mut().insert(BusinessScope { business });

    Ok(next.run(req).await)
}

/// Customer users only. Resolves the customer row linked to the login.
pub async fn customer_scope(
    Extension(app_state): Extension<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let user = authenticated_user(&req, &[UserRole::Customer])?;

    let customer = app_state
        .db_client
        .get_customer_by_user(user.id)
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?
        .ok_or_else(|| HttpError::forbidden(ErrorMessage::CustomerProfileMissing.to_string()))?;

    req.extensions_mut().insert(CustomerScope { customer });

    Ok(next.run(req).await)
}

/// Guards the endpoints an external scheduler calls.
pub async fn cron_key(
    Extension(app_state): Extension<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let expected = app_state
        .env
        .cron_secret
        .as_deref()
        .ok_or_else(|| HttpError::forbidden("Scheduled maintenance is not configured"))?;

    let provided = req
        .headers()
        .get(CRON_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    if provided != Some(expected) {
        tracing::warn!("rejected maintenance call with a missing or wrong cron key");
        return Err(HttpError::unauthorized("Invalid cron key"));
    }

    Ok(next.run(req).await)
}
