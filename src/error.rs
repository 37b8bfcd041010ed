use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;

use crate::validation::ValidationError;

/// Failures raised by the payment ledger. None of them are retried internally.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transaction {external_ref} was already verified with amount {amount} at {verified_at}")]
    AlreadyVerified {
        external_ref: String,
        amount: BigDecimal,
        verified_at: DateTime<Utc>,
    },

    #[error("Transaction {0} is already verified and cannot be rejected")]
    CannotReject(String),

    #[error("Tenant {0} has no outstanding obligations")]
    NoOutstandingObligations(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Persistence(err.to_string())
    }
}

impl From<ValidationError> for LedgerError {
    fn from(err: ValidationError) -> Self {
        LedgerError::Validation(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::NotFound(_) => AppError::NotFound(message),
            LedgerError::AlreadyVerified { .. }
            | LedgerError::CannotReject(_)
            | LedgerError::NoOutstandingObligations(_) => AppError::Conflict(message),
            LedgerError::Validation(_) => AppError::Validation(message),
            LedgerError::Persistence(_) => AppError::DatabaseError(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_status_code() {
        let error = AppError::Validation("Invalid input".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_error_status_code() {
        let error = AppError::NotFound("Resource not found".to_string());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_database_error_status_code() {
        let error = AppError::DatabaseError("connection reset".to_string());
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unauthorized_error_status_code() {
        let error = AppError::Unauthorized("Unauthorized access".to_string());
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_ledger_errors_map_to_http_errors() {
        let already = LedgerError::AlreadyVerified {
            external_ref: "TXN1".to_string(),
            amount: BigDecimal::from(100),
            verified_at: Utc::now(),
        };
        assert_eq!(AppError::from(already).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::from(LedgerError::NoOutstandingObligations("t".into())).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(LedgerError::CannotReject("TXN1".into())).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(LedgerError::NotFound("TXN1".into())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(LedgerError::Validation("amount".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(LedgerError::Persistence("down".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_sqlx_error_becomes_persistence_error() {
        let err: LedgerError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, LedgerError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_error_response_reports_failure() {
        let response = AppError::Conflict("already verified".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["status"], 409);
    }
}
