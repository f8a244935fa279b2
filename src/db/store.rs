use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

use super::repo::{self, Pool};
use crate::model::{PostRecord, WindowRecord};
use crate::store::PostStore;

#[derive(Clone)]
pub struct SqlitePostStore {
    pool: Pool,
}

impl SqlitePostStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `database_url` and apply migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = repo::init_pool(database_url).await?;
        repo::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

impl fmt::Debug for SqlitePostStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlitePostStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl PostStore for SqlitePostStore {
    async fn upsert_posts(&self, posts: &[PostRecord]) -> Result<u64> {
        repo::upsert_posts(&self.pool, posts).await
    }

    async fn select_window(&self, since: DateTime<Utc>) -> Result<Vec<WindowRecord>> {
        repo::select_window(&self.pool, since).await
    }

    async fn update_score(&self, post_id: &str, score: f64) -> Result<()> {
        repo::update_score(&self.pool, post_id, score).await
    }
}
