//! In-Memory Repository Implementations
//!
//! Thread-safe, in-memory implementations of the repository traits defined
//! in `domain::repositories`.
//!
//! # Limitations
//!
//! - Data is lost on application restart
//! - No sharing across multiple instances

use crate::domain::feedback::FeedbackRecord;
use crate::domain::repositories::FeedbackRepository;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory implementation of FeedbackRepository
pub struct InMemoryFeedbackRepository {
    records: Arc<RwLock<Vec<FeedbackRecord>>>,
}

impl InMemoryFeedbackRepository {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryFeedbackRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedbackRepository for InMemoryFeedbackRepository {
    async fn append(&self, record: FeedbackRecord) -> usize {
        // Push and length are read under the same write guard so ids are unique.
        let mut records = self.records.write().await;
        records.push(record);
        records.len()
    }

    async fn get_all(&self) -> Vec<FeedbackRecord> {
        self.records.read().await.clone()
    }

    async fn count(&self) -> usize {
        self.records.read().await.len()
    }
}
