use thiserror::Error;

use crate::{
    db::StoreError,
    error::HttpError,
    models::{referralmodel::ReferralStatus, rewardmodel::RewardStatus},
};
use axum::http::StatusCode;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("Cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Referee has already been converted to a customer")]
    AlreadyConverted,

    #[error("Reward has already been claimed")]
    AlreadyClaimed,

    #[error("{0} has expired")]
    Expired(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl ServiceError {
    pub fn referral_transition(from: ReferralStatus, to: ReferralStatus) -> Self {
        ServiceError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn reward_transition(from: RewardStatus, to: RewardStatus) -> Self {
        ServiceError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ServiceError::NotFound(what.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "not_found",
            ServiceError::InvalidTransition { .. } => "invalid_transition",
            ServiceError::AlreadyConverted => "already_converted",
            ServiceError::AlreadyClaimed => "already_claimed",
            ServiceError::Expired(_) => "expired",
            ServiceError::Forbidden(_) => "forbidden",
            ServiceError::Validation(_) => "validation",
            ServiceError::Storage(StoreError::DuplicateCustomerEmail(_)) => "conflict",
            ServiceError::Storage(_) => "storage",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InvalidTransition { .. }
            | ServiceError::AlreadyConverted
            | ServiceError::AlreadyClaimed
            | ServiceError::Expired(_)
            | ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Storage(StoreError::DuplicateCustomerEmail(_)) => StatusCode::CONFLICT,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(error: sqlx::Error) -> Self {
        ServiceError::Storage(StoreError::from(error))
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        let status = error.status_code();
        let kind = error.kind();

        let message = match &error {
            ServiceError::Storage(StoreError::DuplicateCustomerEmail(_)) => error.to_string(),
            ServiceError::Storage(inner) => {
                tracing::error!("storage failure: {}", inner);
                "Something went wrong while saving your request".to_string()
            }
            _ => error.to_string(),
        };

        HttpError::new(message, status).with_kind(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_hide_internal_text() {
        let err = ServiceError::Storage(StoreError::Backend("connection reset by peer".into()));
        let http: HttpError = err.into();
        assert_eq!(http.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(http.kind, "storage");
        assert!(!http.message.contains("connection reset"));
    }

    #[test]
    fn invalid_transition_maps_to_bad_request() {
        let err = ServiceError::referral_transition(ReferralStatus::Rewarded, ReferralStatus::Pending);
        assert_eq!(err.to_string(), "Cannot move from rewarded to pending");
        let http: HttpError = err.into();
        assert_eq!(http.status, StatusCode::BAD_REQUEST);
        assert_eq!(http.kind, "invalid_transition");
    }
}
