use axum::response::{IntoResponse, Response};
use axum_helpers::{AppError, ErrorCode};
use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Data is out of sync")]
    OutOfSync,

    #[error("OAuth2 exchange failed: {0}")]
    OauthExchange(String),

    #[error("No mail provider configured for {app}/{mail}")]
    NoProviderConfigured { app: String, mail: String },

    #[error("Sending mail failed: {0}")]
    SendMail(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Cache miss for {0}")]
    CacheMiss(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Database error: {0}")]
    Store(String),
}

pub type MailResult<T> = Result<T, MailError>;

impl From<DbErr> for MailError {
    fn from(err: DbErr) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<redis::RedisError> for MailError {
    fn from(err: redis::RedisError) -> Self {
        Self::Cache(err.to_string())
    }
}

/// Convert MailError to AppError for standardized error responses
impl From<MailError> for AppError {
    fn from(err: MailError) -> Self {
        let message = err.to_string();
        match err {
            MailError::Validation(msg) => AppError::coded(ErrorCode::ValidationError, msg),
            MailError::NotFound(msg) => AppError::NotFound(msg),
            MailError::Conflict(msg) => AppError::Conflict(msg),
            MailError::OutOfSync => AppError::coded(ErrorCode::OutOfSync, message),
            MailError::OauthExchange(_) => AppError::coded(ErrorCode::OauthExchange, message),
            MailError::NoProviderConfigured { .. } => {
                AppError::coded(ErrorCode::NoProviderConfigured, message)
            }
            MailError::SendMail(_) => AppError::coded(ErrorCode::SendMail, message),
            MailError::Encryption(_) => AppError::coded(ErrorCode::EncryptionError, message),
            MailError::Decryption(_) => AppError::coded(ErrorCode::DecryptionError, message),
            MailError::CacheMiss(_) | MailError::Cache(_) => {
                AppError::coded(ErrorCode::CacheError, message)
            }
            MailError::Store(_) => AppError::coded(ErrorCode::DatabaseError, message),
        }
    }
}

impl IntoResponse for MailError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}
