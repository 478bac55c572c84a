//! Error handling for the TBS trading platform
//!
//! Provides consistent error responses in English and Bahasa Indonesia

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::DomainError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Workflow rule violations
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Account is inactive")]
    AccountInactive,

    // Request errors
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Domain(DomainError::validation(field, message))
    }

    /// Decode failure of a stored value; the row violates a schema rule
    pub fn corrupt(what: &str, err: impl std::fmt::Display) -> Self {
        AppError::Domain(DomainError::Consistency(format!("stored {} is invalid: {}", what, err)))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let (field, message) = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "invalid value".to_string());
                (field, message)
            })
            .unwrap_or(("request", "invalid request".to_string()));
        AppError::validation(field, message)
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: &str, message_en: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message_en: message_en.into(),
            message_id: message_id.into(),
            field: None,
        }
    }
}

fn domain_detail(err: &DomainError) -> (StatusCode, ErrorDetail) {
    match err {
        DomainError::Validation { field, message } => (
            StatusCode::BAD_REQUEST,
            ErrorDetail {
                field: Some(field.to_string()),
                ..ErrorDetail::new(
                    "VALIDATION_ERROR",
                    message.clone(),
                    format!("Data tidak valid: {}", message),
                )
            },
        ),
        DomainError::InsufficientStock {
            requested,
            available,
        } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorDetail {
                field: Some("jumlah_kg".to_string()),
                ..ErrorDetail::new(
                    "INSUFFICIENT_STOCK",
                    format!(
                        "Requested {} kg but only {} kg is available",
                        requested, available
                    ),
                    format!(
                        "Stok tidak mencukupi: diminta {} kg, tersedia {} kg",
                        requested, available
                    ),
                )
            },
        ),
        DomainError::InvalidTransition { .. } => (
            StatusCode::CONFLICT,
            ErrorDetail::new(
                "INVALID_TRANSITION",
                err.to_string(),
                format!("Status tidak dapat diubah: {}", err),
            ),
        ),
        DomainError::Consistency(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorDetail::new(
                "INTERNAL_ERROR",
                "An internal server error occurred",
                "Terjadi kesalahan pada server",
            ),
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::Domain(err) => domain_detail(err),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new(
                    "INVALID_CREDENTIALS",
                    "Invalid email or password",
                    "Email atau kata sandi salah",
                ),
            ),
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("TOKEN_EXPIRED", "Token has expired", "Token sudah kedaluwarsa"),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("INVALID_TOKEN", "Invalid token", "Token tidak valid"),
            ),
            AppError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new(
                    "INSUFFICIENT_PERMISSIONS",
                    "You do not have permission to perform this action",
                    "Anda tidak memiliki akses untuk tindakan ini",
                ),
            ),
            AppError::AccountInactive => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new(
                    "ACCOUNT_INACTIVE",
                    "Account is inactive",
                    "Akun tidak aktif",
                ),
            ),
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new(
                        "DUPLICATE_ENTRY",
                        format!("A record with this {} already exists", field),
                        format!("Data dengan {} ini sudah ada", field),
                    )
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new(
                    "NOT_FOUND",
                    format!("{} not found", resource),
                    format!("{} tidak ditemukan", resource),
                ),
            ),
            AppError::Configuration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "CONFIGURATION_ERROR",
                    "Server configuration error",
                    "Kesalahan konfigurasi server",
                ),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "DATABASE_ERROR",
                    "A database error occurred",
                    "Terjadi kesalahan pada database",
                ),
            ),
            AppError::Internal(_) | AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "INTERNAL_ERROR",
                    "An internal server error occurred",
                    "Terjadi kesalahan pada server",
                ),
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        } else {
            tracing::warn!(code = %error_detail.code, "request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
