use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A front-page post as persisted by the fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub post_id: String,
    pub title: String,
    pub linked_page_url: String,
    pub linked_page_title: String,
    pub source_community_name: String,
    pub upvotes: i64,
    pub comment_count: i64,
    pub upvote_to_comment_ratio: f64,
    pub content_timestamp: DateTime<Utc>,
    pub fetch_time: DateTime<Utc>,
    pub score: Option<f64>,
}

/// Projection read back by the scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowRecord {
    pub post_id: String,
    pub upvotes: i64,
    pub comment_count: i64,
    pub content_timestamp: DateTime<Utc>,
}

/// Score breakdown for one post in a scoring window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostScore {
    pub post_id: String,
    pub norm_upvotes: f64,
    pub norm_comments: f64,
    pub age_hours: f64,
    pub decay: f64,
    pub score: f64,
}

/// `upvotes / comment_count`, or 0 when there are no comments.
pub fn upvote_to_comment_ratio(upvotes: i64, comment_count: i64) -> f64 {
    if comment_count > 0 {
        upvotes as f64 / comment_count as f64
    } else {
        0.0
    }
}

/// Canonical text form used for every timestamp column.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a timestamp column. Values carrying an offset are converted to UTC;
/// naive values (no offset) are taken to already be UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Convert fractional epoch seconds into UTC, rejecting out-of-range values.
pub fn from_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let millis = (secs * 1000.0).round();
    if millis < i64::MIN as f64 || millis > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}
