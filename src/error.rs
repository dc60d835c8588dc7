use crate::account::auth::AuthError;
use crate::account::store::StoreError;
use crate::account::types::BadgeTier;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

/// API-facing error taxonomy. Every failure path surfaces one of these;
/// nothing is silently swallowed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    // Authentication
    #[error("authentication token is missing")]
    MissingCredential,
    #[error("invalid authentication token")]
    InvalidCredential,
    #[error("authentication token expired")]
    ExpiredCredential,
    #[error("invalid email or password")]
    InvalidLogin,

    // Validation
    #[error("{0}")]
    Validation(String),
    #[error("unknown card type: {0}")]
    UnknownCard(String),
    #[error("unknown badge type: {0}")]
    UnknownBadge(String),

    // Business rules
    #[error("insufficient token balance: have {balance}, need {required}")]
    InsufficientBalance { balance: u64, required: u64 },
    #[error("wallet not connected")]
    NoWallet,
    #[error("{tier} badge already minted")]
    AlreadyMinted { tier: BadgeTier },
    #[error("scratch voucher not found or already used")]
    VoucherNotFound,
    #[error("scratch voucher does not match this purchase")]
    VoucherMismatch,

    // Not found
    #[error("account not found")]
    AccountNotFound,

    // External service, surfaced after rollback
    #[error("failed to mint NFT: {0}")]
    MintFailed(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingCredential
            | Self::InvalidCredential
            | Self::ExpiredCredential
            | Self::InvalidLogin => StatusCode::UNAUTHORIZED,
            Self::Validation(_)
            | Self::UnknownCard(_)
            | Self::UnknownBadge(_)
            | Self::InsufficientBalance { .. }
            | Self::NoWallet
            | Self::AlreadyMinted { .. }
            | Self::VoucherNotFound
            | Self::VoucherMismatch => StatusCode::BAD_REQUEST,
            Self::AccountNotFound => StatusCode::NOT_FOUND,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::MintFailed(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Internal detail stays in the log, not on the wire
        let message = match &self {
            Self::Internal(detail) => {
                error!("internal error: {}", detail);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut body = serde_json::json!({ "success": false, "message": message });
        match &self {
            // Lets the caller distinguish re-login from reject
            Self::ExpiredCredential => {
                body["expired"] = serde_json::Value::Bool(true);
            }
            // Enough detail for the caller to self-correct
            Self::InsufficientBalance { balance, required } => {
                body["currentBalance"] = (*balance).into();
                body["required"] = (*required).into();
            }
            _ => {}
        }

        (self.status(), Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AccountNotFound => Self::AccountNotFound,
            StoreError::EmailTaken => Self::Validation("email already registered".to_string()),
            StoreError::VersionConflict => {
                Self::Internal("unresolved write conflict".to_string())
            }
            StoreError::Backend(detail) => Self::Internal(detail),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredential => Self::MissingCredential,
            AuthError::InvalidCredential => Self::InvalidCredential,
            AuthError::ExpiredCredential => Self::ExpiredCredential,
            AuthError::HashingFailed => Self::Internal("password hashing failed".to_string()),
        }
    }
}
