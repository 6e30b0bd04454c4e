use crate::domain::errors::{LlmError, ParseError, PipelineError};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Error returned by a handler, rendered as `{"detail": message}`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),

    /// Rejection raised by the framework while reading the body
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Rejected { status, .. } => *status,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::ModelNotFound(_) => ApiError::NotFound(e.to_string()),
            e if e.is_client_error() => ApiError::BadRequest(e.to_string()),
            e => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<ParseError> for ApiError {
    fn from(e: ParseError) -> Self {
        PipelineError::from(e).into()
    }
}

impl From<LlmError> for ApiError {
    fn from(e: LlmError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed ({}): {}", status, self);
        } else {
            warn!("Request rejected ({}): {}", status, self);
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ModelError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (PipelineError::MissingModel, StatusCode::BAD_REQUEST),
            (
                PipelineError::ModelNotFound("gru".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                PipelineError::Parse(ParseError::EmptyUpload),
                StatusCode::BAD_REQUEST,
            ),
            (
                PipelineError::InvalidHorizon {
                    reason: "Horizon must be an integer".to_string(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                PipelineError::Inference(ModelError::Inference {
                    reason: "boom".to_string(),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                PipelineError::Explainer("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status(), expected);
        }
    }

    #[test]
    fn test_message_is_passed_through() {
        let error = ApiError::from(PipelineError::ModelNotFound("gru".to_string()));
        assert_eq!(error.to_string(), "Model 'gru' is not loaded or available");
    }
}
