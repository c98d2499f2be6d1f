//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use vellum_pipeline::{ErrorKind, PipelineError};

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("payload too large: {size} bytes exceeds limit of {max}")]
    PayloadTooLarge { size: u64, max: u64 },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Pipeline(#[from] PipelineError),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::Internal(_) => "internal_error",
            Self::Pipeline(e) => e.kind.as_str(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Pipeline(e) => match e.kind {
                ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::ProviderUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Corrupted
                | ErrorKind::FeeEstimationDegraded
                | ErrorKind::TransactionReverted
                | ErrorKind::AmbiguousLedgerFault
                | ErrorKind::StorageUploadFailed => StatusCode::BAD_GATEWAY,
            },
        }
    }

    /// Message sent to the client. Pipeline failures outside the caller's own
    /// input carry endpoints and transport text, which stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Pipeline(e) if e.kind == ErrorKind::InvalidInput => {
                format!("{}: {}", e.summary(), e.source)
            }
            Self::Pipeline(e) => e.summary(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        let body = ErrorResponse {
            error: self.code().to_string(),
            message: Some(self.public_message()),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_pipeline::Stage;

    #[test]
    fn pipeline_kinds_map_to_statuses() {
        let cases = [
            (ErrorKind::InvalidInput, StatusCode::BAD_REQUEST),
            (ErrorKind::NotFound, StatusCode::NOT_FOUND),
            (ErrorKind::Corrupted, StatusCode::BAD_GATEWAY),
            (ErrorKind::ProviderUnavailable, StatusCode::SERVICE_UNAVAILABLE),
            (ErrorKind::Timeout, StatusCode::GATEWAY_TIMEOUT),
        ];
        for (kind, status) in cases {
            let err = ApiError::from(PipelineError::new(Stage::Download, None, kind, "x"));
            assert_eq!(err.status_code(), status, "{kind}");
            assert_eq!(err.code(), kind.as_str());
        }
    }

    #[test]
    fn pipeline_message_hides_transport_detail() {
        let err = ApiError::from(PipelineError::new(
            Stage::Fee,
            Some("primary"),
            ErrorKind::ProviderUnavailable,
            "ledger provider unavailable at http://10.0.0.7:8545: connection refused",
        ));
        assert_eq!(err.public_message(), "provider_unavailable during fee on primary");
        assert!(err.to_string().contains("connection refused"));

        let err = ApiError::from(PipelineError::invalid_input(
            Stage::Setup,
            "unknown network type: archival",
        ));
        assert_eq!(
            err.public_message(),
            "invalid_input during setup on -: unknown network type: archival"
        );
    }
}
