//! HTTP mapping of orchestrator failures
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use whistle_core::WhistleError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_code: &'static str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", what)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", message)
    }
}

impl From<WhistleError> for ApiError {
    fn from(err: WhistleError) -> Self {
        let (status, code) = match &err {
            WhistleError::NotReady(_) => (StatusCode::CONFLICT, "NOT_READY"),
            WhistleError::GatewayInitFailure(_) => (StatusCode::SERVICE_UNAVAILABLE, "GATEWAY_INIT"),
            WhistleError::InvalidDraft(_) => (StatusCode::BAD_REQUEST, "INVALID_DRAFT"),
            WhistleError::EncryptionFailure(_) => (StatusCode::BAD_GATEWAY, "ENCRYPTION_FAILED"),
            WhistleError::DecryptionFailure(_) => (StatusCode::BAD_GATEWAY, "DECRYPTION_FAILED"),
            WhistleError::LedgerWriteRejected { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "LEDGER_REJECTED")
            }
            WhistleError::LedgerReadFailure(_) => (StatusCode::BAD_GATEWAY, "LEDGER_READ_FAILED"),
            WhistleError::UserDeclinedSignature => (StatusCode::CONFLICT, "USER_DECLINED"),
        };
        Self::new(status, code, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            error_code: self.code,
        };
        (self.status, Json(body)).into_response()
    }
}
