use thiserror::Error;

/// Errors raised while turning raw client input into a time series
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("Uploaded file is empty")]
    EmptyUpload,

    #[error("No numeric data found")]
    NoNumericData,

    #[error("No input data provided.")]
    NoInput,

    #[error("Could not parse direct input data: {reason}")]
    InvalidData { reason: String },
}

/// Errors from the fitted scaler
#[derive(Debug, Error, PartialEq)]
pub enum ScalerError {
    #[error("Scaler was fitted on {expected} features, input has {actual}")]
    FeatureMismatch { expected: usize, actual: usize },

    #[error("Invalid scaler parameters: {reason}")]
    InvalidParameters { reason: String },
}

/// Errors raised by a model backend
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to load model from {path}: {reason}")]
    Load { path: String, reason: String },

    #[error("Inference failed: {reason}")]
    Inference { reason: String },

    #[error("Unexpected tensor shape: {reason}")]
    Shape { reason: String },
}

/// Errors surfaced by the prediction, forecast and explanation pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Model name is required")]
    MissingModel,

    #[error("Model '{0}' is not loaded or available")]
    ModelNotFound(String),

    #[error("Input parsing error: {0}")]
    Parse(#[from] ParseError),

    #[error("Input sequence too short for model (need ≥ {required} timesteps, got {actual})")]
    InsufficientData { required: usize, actual: usize },

    #[error("Invalid horizon: {reason}")]
    InvalidHorizon { reason: String },

    #[error("Model prediction failed: {0}")]
    Inference(ModelError),

    #[error("SHAP computation failed: {0}")]
    Explainer(String),
}

/// Errors from text generation backends
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{backend} request failed: {reason}")]
    Transport { backend: String, reason: String },

    #[error("{backend} API error (status {status})")]
    Status { backend: String, status: u16 },

    #[error("Empty response from {backend}")]
    EmptyResponse { backend: String },

    #[error("{backend} is not configured: {reason}")]
    Unavailable { backend: String, reason: String },
}

impl PipelineError {
    /// True for errors caused by the request itself rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingModel
                | PipelineError::Parse(_)
                | PipelineError::InsufficientData { .. }
                | PipelineError::InvalidHorizon { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_data_formatting() {
        let error = PipelineError::InsufficientData {
            required: 60,
            actual: 12,
        };

        let msg = error.to_string();
        assert!(msg.contains("60"));
        assert!(msg.contains("12"));
        assert!(error.is_client_error());
    }

    #[test]
    fn test_parse_error_is_wrapped_as_client_error() {
        let error: PipelineError = ParseError::NoNumericData.into();
        assert_eq!(error.to_string(), "Input parsing error: No numeric data found");
        assert!(error.is_client_error());
    }

    #[test]
    fn test_inference_error_is_not_client_error() {
        let error = PipelineError::Inference(ModelError::Inference {
            reason: "graph exploded".to_string(),
        });
        assert!(!error.is_client_error());
        assert!(error.to_string().contains("graph exploded"));
    }
}
