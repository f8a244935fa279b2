use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{PostRecord, WindowRecord};

/// Keyed storage shared by the fetcher and the scorer.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Insert or refresh posts keyed by `post_id`; returns rows written.
    async fn upsert_posts(&self, posts: &[PostRecord]) -> Result<u64>;

    /// Posts whose `fetch_time >= since`.
    async fn select_window(&self, since: DateTime<Utc>) -> Result<Vec<WindowRecord>>;

    async fn update_score(&self, post_id: &str, score: f64) -> Result<()>;
}
