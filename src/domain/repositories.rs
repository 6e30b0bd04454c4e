//! Repository abstractions for state the service keeps between requests.
//!
//! Only feedback is stored today. The in-memory implementation lives in
//! `infrastructure::repositories` and is lost on restart.

use crate::domain::feedback::FeedbackRecord;
use async_trait::async_trait;

#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    /// Append a record and return its 1-based identifier
    async fn append(&self, record: FeedbackRecord) -> usize;

    async fn get_all(&self) -> Vec<FeedbackRecord>;

    async fn count(&self) -> usize;
}
