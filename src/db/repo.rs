use super::model::{StoredPost, WindowRow};
use crate::model::{format_timestamp, PostRecord, WindowRecord};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::{instrument, warn};

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let mut options = SqliteConnectOptions::from_str(&normalized)
        .with_context(|| format!("invalid database url {normalized}"))?
        .create_if_missing(true);
    let in_memory = normalized.starts_with("sqlite::memory");
    if !in_memory {
        options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);
    }
    // In-memory databases live and die with a single connection.
    let max_connections = if in_memory { 1 } else { 5 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .context("failed to open posts database")?;
    Ok(pool)
}

/// Expand a leading `~/` in a file-backed SQLite URL and make sure its parent
/// directory exists. In-memory and non-sqlite URLs pass through untouched.
fn prepare_sqlite_url(url: &str) -> String {
    let Some(rest) = url.strip_prefix("sqlite:") else {
        return url.to_string();
    };
    if rest.starts_with(":memory") {
        return url.to_string();
    }

    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let (path, query) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };
    if path.is_empty() {
        return url.to_string();
    }

    let path = match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(tail), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), tail),
        _ => path.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    match query {
        Some(q) => format!("sqlite://{path}?{q}"),
        None => format!("sqlite://{path}"),
    }
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Insert new posts or refresh the engagement counters and fetch time of
/// existing ones. Descriptive fields, `content_timestamp` and `score` are left
/// untouched on conflict. All rows are written in one transaction.
#[instrument(skip_all, fields(batch = posts.len()))]
pub async fn upsert_posts(pool: &Pool, posts: &[PostRecord]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut written = 0;
    for post in posts {
        let res = sqlx::query(
            "INSERT INTO posts (post_id, title, linked_page_url, linked_page_title, source_community_name, \
                                upvotes, comment_count, upvote_to_comment_ratio, content_timestamp, fetch_time, score) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL) \
             ON CONFLICT(post_id) DO UPDATE SET \
                upvotes = excluded.upvotes, \
                comment_count = excluded.comment_count, \
                upvote_to_comment_ratio = excluded.upvote_to_comment_ratio, \
                fetch_time = excluded.fetch_time",
        )
        .bind(&post.post_id)
        .bind(&post.title)
        .bind(&post.linked_page_url)
        .bind(&post.linked_page_title)
        .bind(&post.source_community_name)
        .bind(post.upvotes)
        .bind(post.comment_count)
        .bind(post.upvote_to_comment_ratio)
        .bind(format_timestamp(post.content_timestamp))
        .bind(format_timestamp(post.fetch_time))
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to upsert post {}", post.post_id))?;
        written += res.rows_affected();
    }
    tx.commit().await?;
    Ok(written)
}

/// Every post fetched at or after `since`. Rows whose content timestamp cannot
/// be read are skipped.
#[instrument(skip_all)]
pub async fn select_window(pool: &Pool, since: DateTime<Utc>) -> Result<Vec<WindowRecord>> {
    let rows: Vec<WindowRow> = sqlx::query_as(
        "SELECT post_id, upvotes, comment_count, content_timestamp FROM posts \
         WHERE julianday(fetch_time) >= julianday(?) ORDER BY post_id",
    )
    .bind(format_timestamp(since))
    .fetch_all(pool)
    .await?;

    let records = rows
        .into_iter()
        .filter_map(|row| match WindowRecord::try_from(row) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(?err, "skipping unreadable row");
                None
            }
        })
        .collect();
    Ok(records)
}

#[instrument(skip_all, fields(post_id = %post_id))]
pub async fn update_score(pool: &Pool, post_id: &str, score: f64) -> Result<()> {
    let res = sqlx::query("UPDATE posts SET score = ? WHERE post_id = ?")
        .bind(score)
        .bind(post_id)
        .execute(pool)
        .await
        .with_context(|| format!("failed to update score for post {post_id}"))?;
    if res.rows_affected() == 0 {
        return Err(anyhow!("post {} not found", post_id));
    }
    Ok(())
}

pub async fn fetch_post(pool: &Pool, post_id: &str) -> Result<Option<StoredPost>> {
    let post = sqlx::query_as::<_, StoredPost>(
        "SELECT post_id, title, linked_page_url, linked_page_title, source_community_name, \
                upvotes, comment_count, upvote_to_comment_ratio, content_timestamp, fetch_time, score \
         FROM posts WHERE post_id = ?",
    )
    .bind(post_id)
    .fetch_optional(pool)
    .await?;
    Ok(post)
}

pub async fn count_posts(pool: &Pool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
