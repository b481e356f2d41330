//! Machine-readable error codes carried by every [`ErrorResponse`](super::ErrorResponse).
//!
//! Each code has a SCREAMING_SNAKE identifier for clients, an integer for
//! log correlation, the HTTP status it renders with, and a default message.
//!
//! ```rust
//! use axum_helpers::errors::ErrorCode;
//!
//! let code = ErrorCode::OutOfSync;
//! assert_eq!(code.as_str(), "OUT_OF_SYNC");
//! assert_eq!(code.code(), 1012);
//! assert_eq!(code.status().as_u16(), 409);
//! ```

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Client errors (1000s)
    ValidationError,
    InvalidId,
    JsonExtraction,
    NotFound,
    Conflict,
    UnprocessableEntity,
    /// Update carried an `updatedAt` older than the stored row
    OutOfSync,
    /// No provider could be resolved for an app and mail pairing
    NoProviderConfigured,

    // Server errors
    InternalError,
    ServiceUnavailable,

    // Persistence (2000s)
    DatabaseError,

    // Upstream providers (6000s)
    OauthExchange,
    SendMail,

    // Secret codec (7000s)
    EncryptionError,
    DecryptionError,

    // Cache (8000s)
    CacheError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::InvalidId => "INVALID_ID",
            Self::JsonExtraction => "JSON_EXTRACTION",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::UnprocessableEntity => "UNPROCESSABLE_ENTITY",
            Self::OutOfSync => "OUT_OF_SYNC",
            Self::NoProviderConfigured => "NO_PROVIDER_CONFIGURED",
            Self::InternalError => "INTERNAL_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::OauthExchange => "OAUTH_EXCHANGE",
            Self::SendMail => "SEND_MAIL",
            Self::EncryptionError => "ENCRYPTION_ERROR",
            Self::DecryptionError => "DECRYPTION_ERROR",
            Self::CacheError => "CACHE_ERROR",
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::ValidationError => 1001,
            Self::InvalidId => 1002,
            Self::JsonExtraction => 1003,
            Self::NotFound => 1004,
            Self::InternalError => 1005,
            Self::Conflict => 1008,
            Self::UnprocessableEntity => 1009,
            Self::ServiceUnavailable => 1011,
            Self::OutOfSync => 1012,
            Self::NoProviderConfigured => 1013,
            Self::DatabaseError => 2003,
            Self::OauthExchange => 6001,
            Self::SendMail => 6002,
            Self::EncryptionError => 7001,
            Self::DecryptionError => 7002,
            Self::CacheError => 8001,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::ValidationError | Self::InvalidId | Self::JsonExtraction => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict | Self::OutOfSync => StatusCode::CONFLICT,
            Self::UnprocessableEntity | Self::NoProviderConfigured => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::OauthExchange | Self::SendMail => StatusCode::BAD_GATEWAY,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::InternalError
            | Self::DatabaseError
            | Self::EncryptionError
            | Self::DecryptionError
            | Self::CacheError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            Self::ValidationError => "Request validation failed",
            Self::InvalidId => "Invalid id format",
            Self::JsonExtraction => "Failed to parse request body",
            Self::NotFound => "Resource not found",
            Self::Conflict => "Resource already exists",
            Self::UnprocessableEntity => "Request cannot be processed",
            Self::OutOfSync => "Resource was modified by another request",
            Self::NoProviderConfigured => "No mail provider is configured",
            Self::InternalError => "An internal server error occurred",
            Self::ServiceUnavailable => "Service is temporarily unavailable",
            Self::DatabaseError => "Database error occurred",
            Self::OauthExchange => "OAuth2 authorization code exchange failed",
            Self::SendMail => "Sending mail failed",
            Self::EncryptionError => "Encrypting a secret failed",
            Self::DecryptionError => "Decrypting a secret failed",
            Self::CacheError => "Cache error occurred",
        }
    }

    /// Server-side failures are logged at error level, client ones at info.
    pub fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
