use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One listing entry as delivered by the content source. Every field is
/// optional so that a partially populated entry still reaches the record
/// transform, which decides whether to keep it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawItem {
    pub id: Option<String>,
    pub title: Option<String>,
    pub is_self: Option<bool>,
    pub url: Option<String>,
    pub link_title: Option<String>,
    pub subreddit: Option<String>,
    pub score: Option<i64>,
    pub num_comments: Option<i64>,
    pub created_utc: Option<f64>,
}

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Current front-page listing, at most `limit` entries.
    async fn list_front_page(&self, limit: u32) -> Result<Vec<RawItem>>;
}
