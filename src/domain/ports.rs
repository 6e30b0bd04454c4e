use crate::domain::errors::{LlmError, ModelError};
use async_trait::async_trait;
use ndarray::ArrayView3;

/// A pre-trained forecasting model.
///
/// Implementations are read-only after construction and shared across requests.
pub trait ForecastModel: Send + Sync {
    fn name(&self) -> &str;

    /// Number of timesteps the model expects, if it declares one
    fn input_window(&self) -> Option<usize>;

    /// Run inference on a `(batch, timesteps, 1)` tensor.
    /// Returns one value per batch row (the first output of that row).
    fn predict(&self, input: ArrayView3<'_, f32>) -> Result<Vec<f32>, ModelError>;
}

/// Free-text generation backend used for natural-language explanations
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    fn name(&self) -> &str;
}
