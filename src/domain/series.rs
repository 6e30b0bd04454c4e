use crate::domain::errors::PipelineError;

/// Ordered, immutable sequence of observations on a time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Most recent `required` observations, in original order.
    ///
    /// `None` means the model accepts any length and the whole series is used.
    pub fn trailing_window(&self, required: Option<usize>) -> Result<&[f64], PipelineError> {
        match required {
            Some(w) if self.values.len() < w => Err(PipelineError::InsufficientData {
                required: w,
                actual: self.values.len(),
            }),
            Some(w) => Ok(&self.values[self.values.len() - w..]),
            None => Ok(&self.values),
        }
    }
}

impl From<Vec<f64>> for TimeSeries {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}
