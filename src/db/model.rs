//! Row shapes returned by repository queries.
//!
//! Timestamps come back as text and are converted into domain types here so
//! the repository stays focused on SQL.

use anyhow::{anyhow, Result};
use sqlx::FromRow;

use crate::model::{parse_timestamp, WindowRecord};

/// Raw row for the scoring window projection.
#[derive(Debug, Clone, FromRow)]
pub struct WindowRow {
    pub post_id: String,
    pub upvotes: i64,
    pub comment_count: i64,
    pub content_timestamp: String,
}

impl TryFrom<WindowRow> for WindowRecord {
    type Error = anyhow::Error;

    fn try_from(row: WindowRow) -> Result<Self> {
        let content_timestamp = parse_timestamp(&row.content_timestamp).ok_or_else(|| {
            anyhow!(
                "post {} has unreadable content_timestamp {:?}",
                row.post_id,
                row.content_timestamp
            )
        })?;
        Ok(WindowRecord {
            post_id: row.post_id,
            upvotes: row.upvotes,
            comment_count: row.comment_count,
            content_timestamp,
        })
    }
}

/// Full stored row, used by inspection tooling and tests.
#[derive(Debug, Clone, FromRow)]
pub struct StoredPost {
    pub post_id: String,
    pub title: String,
    pub linked_page_url: String,
    pub linked_page_title: String,
    pub source_community_name: String,
    pub upvotes: i64,
    pub comment_count: i64,
    pub upvote_to_comment_ratio: f64,
    pub content_timestamp: String,
    pub fetch_time: String,
    pub score: Option<f64>,
}
