use std::sync::Arc;

use axum::{
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::Cookie;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{BusinessExt, CustomerExt, LedgerStore, NewBusinessProfile, UserExt},
    dtos::{
        FilterUserDto, LoginUserDto, RegisterBusinessDto, RegisterCustomerDto, Response, UserData,
        UserLoginResponseDto, UserResponseDto,
    },
    error::{internal_error, ErrorMessage, HttpError},
    middleware::{auth, JWTAuthMiddleware},
    models::{
        customermodel::{CustomerDraft, CustomerPreferences, CustomerSource},
        usermodel::{User, UserRole},
    },
    service::error::ServiceError,
    utils::{password, phone::normalize_phone, token},
    AppState,
};

pub fn auth_handler() -> Router {
    Router::new()
        .route("/register", post(register_business))
        .route("/register/customer", post(register_customer))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(get_me).layer(middleware::from_fn(auth)))
}

fn token_cookie(app_state: &AppState, token: &str) -> Result<HeaderMap, HttpError> {
    let cookie_duration = time::Duration::minutes(app_state.env.jwt_maxage);
    let cookie = Cookie::build(("token", token.to_owned()))
        .path("/")
        .max_age(cookie_duration)
        .http_only(true)
        .build();

    let mut headers = HeaderMap::new();
    headers.append(
        header::SET_COOKIE,
        cookie
            .to_string()
            .parse()
            .map_err(|_| HttpError::server_error(ErrorMessage::ServerError.to_string()))?,
    );
    Ok(headers)
}

async fn ensure_email_free(app_state: &AppState, email: &str) -> Result<(), HttpError> {
    let existing = app_state
        .db_client
        .get_user(None, Some(email))
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?;

    if existing.is_some() {
        return Err(HttpError::unique_constraint_violation(
            ErrorMessage::EmailExist.to_string(),
        ));
    }
    Ok(())
}

pub async fn register_business(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<RegisterBusinessDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    ensure_email_free(&app_state, &body.email).await?;

    let hashed_password =
        password::hash(&body.password).map_err(internal_error)?;

    let contact_phone = body
        .phone
        .as_deref()
        .map(normalize_phone)
        .transpose()
        .map_err(HttpError::bad_request)?;

    let business_name = body
        .business_name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| format!("{}'s Business", body.name));

    let profile = NewBusinessProfile {
        business_name,
        description: body.description,
        industry: body.industry,
        website: body.website,
        contact_phone,
    };

    let (user, business) = app_state
        .db_client
        .save_business_user(&body.name, &body.email, &hashed_password, profile)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => {
                HttpError::unique_constraint_violation(ErrorMessage::EmailExist.to_string())
            }
            _ => HttpError::from(ServiceError::from(e)),
        })?;

    tracing::info!("business {} registered by user {}", business.id, user.id);

    Ok((
        StatusCode::CREATED,
        Json(UserResponseDto {
            status: "success".to_string(),
            data: UserData {
                user: FilterUserDto::filter_user(&user),
                business_id: Some(business.id),
                business_name: Some(business.business_name),
                customer_id: None,
            },
        }),
    ))
}

pub async fn register_customer(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<RegisterCustomerDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let business = app_state
        .db_client
        .load_business(body.business_id)
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?
        .filter(|business| business.active)
        .ok_or_else(|| HttpError::not_found("Business not found"))?;

    ensure_email_free(&app_state, &body.email).await?;

    let hashed_password =
        password::hash(&body.password).map_err(internal_error)?;

    let phone = body
        .phone
        .as_deref()
        .map(normalize_phone)
        .transpose()
        .map_err(HttpError::bad_request)?;

    let draft = CustomerDraft {
        id: Uuid::new_v4(),
        business_id: business.id,
        user_id: None,
        name: body.name.trim().to_string(),
        email: Some(body.email.trim().to_lowercase()),
        phone,
        source: CustomerSource::Direct,
        referred_by: None,
        referral_campaign: None,
        tags: Vec::new(),
        notes: None,
        preferences: CustomerPreferences::default(),
        created_at: app_state.clock.now(),
    };

    let (user, customer) = app_state
        .db_client
        .save_customer_user(&body.email, &hashed_password, draft)
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?;

    tracing::info!(
        "customer {} of business {} registered a login",
        customer.id,
        business.id
    );

    Ok((
        StatusCode::CREATED,
        Json(UserResponseDto {
            status: "success".to_string(),
            data: UserData {
                user: FilterUserDto::filter_user(&user),
                business_id: Some(business.id),
                business_name: Some(business.business_name),
                customer_id: Some(customer.id),
            },
        }),
    ))
}

pub async fn login(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<LoginUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let user = app_state
        .db_client
        .get_user(None, Some(&body.email))
        .await
        .map_err(|e| HttpError::from(ServiceError::from(e)))?
        .ok_or_else(|| HttpError::bad_request(ErrorMessage::WrongCredentials.to_string()))?;

    let password_matched = password::compare(&body.password, &user.password)
        .map_err(|_| HttpError::bad_request(ErrorMessage::WrongCredentials.to_string()))?;

    if !password_matched {
        return Err(HttpError::bad_request(ErrorMessage::WrongCredentials.to_string()));
    }

    let token = token::create_token(
        &user.id.to_string(),
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage,
    )
    .map_err(internal_error)?;

    let headers = token_cookie(&app_state, &token)?;

    let mut response = Json(UserLoginResponseDto {
        status: "success".to_string(),
        token,
    })
    .into_response();
    response.headers_mut().extend(headers);

    Ok(response)
}

pub async fn logout() -> Result<impl IntoResponse, HttpError> {
    let cookie = Cookie::build(("token", ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .http_only(true)
        .build();

    let mut headers = HeaderMap::new();
    headers.append(
        header::SET_COOKIE,
        cookie
            .to_string()
            .parse()
            .map_err(|_| HttpError::server_error(ErrorMessage::ServerError.to_string()))?,
    );

    let mut response = Json(Response {
        status: "success",
        message: "Logged out".to_string(),
    })
    .into_response();
    response.headers_mut().extend(headers);

    Ok(response)
}

async fn user_data(app_state: &AppState, user: &User) -> Result<UserData, HttpError> {
    let mut data = UserData {
        user: FilterUserDto::filter_user(user),
        business_id: None,
        business_name: None,
        customer_id: None,
    };

    match user.role {
        UserRole::Business => {
            if let Some(business) = app_state
                .db_client
                .get_business_by_user(user.id)
                .await
                .map_err(|e| HttpError::from(ServiceError::from(e)))?
            {
                data.business_id = Some(business.id);
                data.business_name = Some(business.business_name);
            }
        }
        UserRole::Customer => {
            if let Some(customer) = app_state
                .db_client
                .get_customer_by_user(user.id)
                .await
                .map_err(|e| HttpError::from(ServiceError::from(e)))?
            {
                data.business_id = Some(customer.business_id);
                data.customer_id = Some(customer.id);
            }
        }
        UserRole::Admin => {}
    }

    Ok(data)
}

pub async fn get_me(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let data = user_data(&app_state, &user.user).await?;

    Ok(Json(UserResponseDto {
        status: "success".to_string(),
        data,
    }))
}
