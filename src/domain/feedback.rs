use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User feedback about a model's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub model: String,
    pub feedback: String,
    pub received_at: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn new(model: impl Into<String>, feedback: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            feedback: feedback.into(),
            received_at: Utc::now(),
        }
    }
}
