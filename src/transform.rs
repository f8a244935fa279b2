//! Listing entry to `PostRecord` mapping.
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::model::{from_epoch_seconds, upvote_to_comment_ratio, PostRecord};
use crate::source::RawItem;

/// Why a listing entry was left out of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    SelfPost,
    MissingUrl,
    MissingField(&'static str),
    BadTimestamp,
}

/// Map one entry to a record, or report why it is excluded.
pub fn classify(item: &RawItem, fetch_time: DateTime<Utc>) -> Result<PostRecord, Exclusion> {
    if item.is_self == Some(true) {
        return Err(Exclusion::SelfPost);
    }
    let url = item
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or(Exclusion::MissingUrl)?;

    let post_id = item
        .id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .ok_or(Exclusion::MissingField("id"))?;
    let title = item.title.as_deref().ok_or(Exclusion::MissingField("title"))?;
    let upvotes = item.score.ok_or(Exclusion::MissingField("score"))?;
    let comment_count = item
        .num_comments
        .ok_or(Exclusion::MissingField("num_comments"))?
        .max(0);
    let created = item
        .created_utc
        .ok_or(Exclusion::MissingField("created_utc"))?;
    let content_timestamp = from_epoch_seconds(created).ok_or(Exclusion::BadTimestamp)?;

    let linked_page_title = item
        .link_title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(title);

    Ok(PostRecord {
        post_id: post_id.to_string(),
        title: title.to_string(),
        linked_page_url: url.to_string(),
        linked_page_title: linked_page_title.to_string(),
        source_community_name: item.subreddit.clone().unwrap_or_default(),
        upvotes,
        comment_count,
        upvote_to_comment_ratio: upvote_to_comment_ratio(upvotes, comment_count),
        content_timestamp,
        fetch_time,
        score: None,
    })
}

/// `classify` with the exclusion reason logged and discarded.
pub fn transform_item(item: &RawItem, fetch_time: DateTime<Utc>) -> Option<PostRecord> {
    match classify(item, fetch_time) {
        Ok(record) => Some(record),
        Err(reason) => {
            debug!(id = ?item.id, ?reason, "excluding listing entry");
            None
        }
    }
}

/// Apply `f` to every item on at most `workers` blocking tasks. With a single
/// worker the map runs inline. Output order is unspecified; items whose task
/// panics are dropped.
pub async fn parallel_map<T, U, F>(items: Vec<T>, workers: NonZeroUsize, f: F) -> Vec<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> U + Send + Sync + 'static,
{
    if workers.get() == 1 {
        return items.into_iter().map(f).collect();
    }
    let f = Arc::new(f);
    stream::iter(items)
        .map(|item| {
            let f = Arc::clone(&f);
            tokio::task::spawn_blocking(move || f(item))
        })
        .buffer_unordered(workers.get())
        .filter_map(|joined| async move {
            match joined {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(%err, "transform worker failed");
                    None
                }
            }
        })
        .collect()
        .await
}

/// Transform a whole listing, keeping only the retained records.
pub async fn transform_all(
    items: Vec<RawItem>,
    fetch_time: DateTime<Utc>,
    workers: NonZeroUsize,
) -> Vec<PostRecord> {
    parallel_map(items, workers, move |item| transform_item(&item, fetch_time))
        .await
        .into_iter()
        .flatten()
        .collect()
}
