#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

use frontpage_scorer::db::SqlitePostStore;
use frontpage_scorer::model::{PostRecord, WindowRecord};
use frontpage_scorer::source::{ContentSource, RawItem};
use frontpage_scorer::store::PostStore;
use frontpage_scorer::{PipelineContext, PipelineSettings};

pub async fn memory_store() -> SqlitePostStore {
    SqlitePostStore::connect("sqlite::memory:").await.unwrap()
}

/// A link post created `age_hours` before `now`.
pub fn link_item(
    id: &str,
    upvotes: i64,
    comments: i64,
    now: DateTime<Utc>,
    age_hours: i64,
) -> RawItem {
    RawItem {
        id: Some(id.into()),
        title: Some(format!("Post {id}")),
        is_self: Some(false),
        url: Some(format!("https://news.example/{id}")),
        link_title: None,
        subreddit: Some("technology".into()),
        score: Some(upvotes),
        num_comments: Some(comments),
        created_utc: Some((now - Duration::hours(age_hours)).timestamp() as f64),
    }
}

pub fn self_item(id: &str, now: DateTime<Utc>) -> RawItem {
    RawItem {
        is_self: Some(true),
        url: Some(format!("https://www.reddit.com/r/AskReddit/comments/{id}/")),
        ..link_item(id, 50, 10, now, 1)
    }
}

#[derive(Clone, Default)]
pub struct ScriptedSource {
    responses: Arc<Mutex<VecDeque<Result<Vec<RawItem>>>>>,
    limits: Arc<Mutex<Vec<u32>>>,
}

impl ScriptedSource {
    pub fn with_responses(responses: Vec<Result<Vec<RawItem>>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            ..Default::default()
        }
    }

    pub async fn limits(&self) -> Vec<u32> {
        self.limits.lock().await.clone()
    }
}

#[async_trait]
impl ContentSource for ScriptedSource {
    async fn list_front_page(&self, limit: u32) -> Result<Vec<RawItem>> {
        self.limits.lock().await.push(limit);
        let next = self.responses.lock().await.pop_front();
        next.unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub struct PanickingSource;

#[async_trait]
impl ContentSource for PanickingSource {
    async fn list_front_page(&self, _limit: u32) -> Result<Vec<RawItem>> {
        panic!("listing exploded");
    }
}

/// SQLite-backed store that records calls and can be told to fail.
#[derive(Clone)]
pub struct RecordingStore {
    inner: SqlitePostStore,
    fail_upsert: bool,
    fail_window: bool,
    fail_scores_for: HashSet<String>,
    upserts: Arc<Mutex<Vec<Vec<String>>>>,
    score_writes: Arc<Mutex<Vec<(String, f64)>>>,
}

impl RecordingStore {
    pub async fn new() -> Self {
        Self {
            inner: memory_store().await,
            fail_upsert: false,
            fail_window: false,
            fail_scores_for: HashSet::new(),
            upserts: Arc::default(),
            score_writes: Arc::default(),
        }
    }

    pub fn failing_upsert(mut self) -> Self {
        self.fail_upsert = true;
        self
    }

    pub fn failing_window(mut self) -> Self {
        self.fail_window = true;
        self
    }

    pub fn failing_scores_for(mut self, ids: &[&str]) -> Self {
        self.fail_scores_for = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn inner(&self) -> &SqlitePostStore {
        &self.inner
    }

    pub async fn upserts(&self) -> Vec<Vec<String>> {
        self.upserts.lock().await.clone()
    }

    pub async fn score_writes(&self) -> Vec<(String, f64)> {
        self.score_writes.lock().await.clone()
    }
}

#[async_trait]
impl PostStore for RecordingStore {
    async fn upsert_posts(&self, posts: &[PostRecord]) -> Result<u64> {
        self.upserts
            .lock()
            .await
            .push(posts.iter().map(|p| p.post_id.clone()).collect());
        if self.fail_upsert {
            return Err(anyhow!("database is locked"));
        }
        self.inner.upsert_posts(posts).await
    }

    async fn select_window(&self, since: DateTime<Utc>) -> Result<Vec<WindowRecord>> {
        if self.fail_window {
            return Err(anyhow!("connection reset"));
        }
        self.inner.select_window(since).await
    }

    async fn update_score(&self, post_id: &str, score: f64) -> Result<()> {
        self.score_writes
            .lock()
            .await
            .push((post_id.to_string(), score));
        if self.fail_scores_for.contains(post_id) {
            return Err(anyhow!("write rejected for {post_id}"));
        }
        self.inner.update_score(post_id, score).await
    }
}

pub fn context(source: impl ContentSource + 'static, store: impl PostStore + 'static) -> PipelineContext {
    PipelineContext::new(Arc::new(source), Arc::new(store), PipelineSettings::default())
}
