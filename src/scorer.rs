//! Recency-weighted popularity scoring.
//!
//! Each analyze cycle reads every post fetched within the trailing window,
//! min-max normalizes upvotes and comment counts across that window, discounts
//! by content age and writes one score per post:
//!
//! ```text
//! score = (0.7 * norm_upvotes + 0.3 * norm_comments) * exp(-age_hours / 24)
//! ```
use chrono::{DateTime, Duration, Utc};
use std::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::model::{PostScore, WindowRecord};
use crate::store::PostStore;

pub const UPVOTE_WEIGHT: f64 = 0.7;
pub const COMMENT_WEIGHT: f64 = 0.3;
/// Age at which decay reaches 1/e.
pub const DECAY_TIME_CONSTANT_HOURS: f64 = 24.0;

/// Outcome of a window query. "No rows" is its own variant so callers have
/// to handle it before scoring.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum Window {
    Empty { now: DateTime<Utc> },
    Populated(ScoringWindow),
}

impl Window {
    pub fn from_records(records: Vec<WindowRecord>, now: DateTime<Utc>) -> Self {
        match ScoringWindow::new(records, now) {
            Some(window) => Window::Populated(window),
            None => Window::Empty { now },
        }
    }
}

/// A non-empty set of posts scored together at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringWindow {
    records: Vec<WindowRecord>,
    now: DateTime<Utc>,
}

/// Min/max over one dimension, with the zero-range guard applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub min: f64,
    pub max: f64,
}

impl Span {
    fn of(values: impl Iterator<Item = f64>) -> Self {
        values.fold(
            Span {
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            },
            |acc, v| Span {
                min: acc.min.min(v),
                max: acc.max.max(v),
            },
        )
    }

    /// `max - min`, or 1 when every value is equal.
    pub fn range(&self) -> f64 {
        if self.max != self.min {
            self.max - self.min
        } else {
            1.0
        }
    }

    pub fn normalize(&self, value: f64) -> f64 {
        (value - self.min) / self.range()
    }
}

/// Summary logged for every analyze cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowStats {
    pub count: usize,
    pub upvotes: Span,
    pub comments: Span,
    pub mean_upvotes: f64,
    pub std_dev_upvotes: f64,
}

impl ScoringWindow {
    /// `None` when `records` is empty.
    pub fn new(records: Vec<WindowRecord>, now: DateTime<Utc>) -> Option<Self> {
        if records.is_empty() {
            return None;
        }
        Some(Self { records, now })
    }

    pub fn records(&self) -> &[WindowRecord] {
        &self.records
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Always at least 1.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn stats(&self) -> WindowStats {
        let count = self.records.len();
        let upvotes: Vec<f64> = self.records.iter().map(|r| r.upvotes as f64).collect();
        let mean = upvotes.iter().sum::<f64>() / count as f64;
        let variance = upvotes.iter().map(|u| (u - mean).powi(2)).sum::<f64>() / count as f64;
        WindowStats {
            count,
            upvotes: Span::of(upvotes.iter().copied()),
            comments: Span::of(self.records.iter().map(|r| r.comment_count as f64)),
            mean_upvotes: mean,
            std_dev_upvotes: variance.sqrt(),
        }
    }

    /// Score every post in the window, in window order.
    pub fn score(&self) -> Vec<PostScore> {
        let upvotes = Span::of(self.records.iter().map(|r| r.upvotes as f64));
        let comments = Span::of(self.records.iter().map(|r| r.comment_count as f64));

        self.records
            .iter()
            .map(|record| {
                let norm_upvotes = upvotes.normalize(record.upvotes as f64);
                let norm_comments = comments.normalize(record.comment_count as f64);
                let age = age_hours(record.content_timestamp, self.now);
                let decay = decay(age);
                PostScore {
                    post_id: record.post_id.clone(),
                    norm_upvotes,
                    norm_comments,
                    age_hours: age,
                    decay,
                    score: (UPVOTE_WEIGHT * norm_upvotes + COMMENT_WEIGHT * norm_comments)
                        * decay,
                }
            })
            .collect()
    }
}

/// Fractional hours from `created` to `now`; negative when `created` is ahead.
pub fn age_hours(created: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - created).num_milliseconds() as f64 / 3_600_000.0
}

/// `exp(-age_hours / 24)`. Above 1 for negative ages.
pub fn decay(age_hours: f64) -> f64 {
    (-age_hours / DECAY_TIME_CONSTANT_HOURS).exp()
}

/// Read every post fetched within `window` before `now`. A window too wide to
/// subtract from `now` covers every stored post.
#[instrument(skip_all)]
pub async fn retrieve_window(
    store: &dyn PostStore,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<Window, PipelineError> {
    let since = now
        .checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    let records = store
        .select_window(since)
        .await
        .map_err(PipelineError::StoreRead)?;
    Ok(Window::from_records(records, now))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalyzeReport {
    pub window_size: usize,
    pub written: usize,
    pub failed: usize,
}

/// Score `window` and write each score back. A failed write is logged and
/// counted; the remaining posts are still written.
pub async fn write_scores(store: &dyn PostStore, window: &ScoringWindow) -> AnalyzeReport {
    let mut report = AnalyzeReport {
        window_size: window.len(),
        ..Default::default()
    };
    for scored in window.score() {
        if !scored.score.is_finite() {
            warn!(post_id = %scored.post_id, score = scored.score, "skipping non-finite score");
            report.failed += 1;
            continue;
        }
        match store.update_score(&scored.post_id, scored.score).await {
            Ok(()) => {
                report.written += 1;
                info!(
                    post_id = %scored.post_id,
                    score = scored.score,
                    decay = scored.decay,
                    "updated score"
                );
            }
            Err(err) => {
                report.failed += 1;
                warn!(post_id = %scored.post_id, ?err, "failed to update score");
            }
        }
    }
    report
}

/// Score an already-read set of posts. An empty set writes nothing.
pub async fn analyze(
    store: &dyn PostStore,
    records: Vec<WindowRecord>,
    now: DateTime<Utc>,
) -> AnalyzeReport {
    match Window::from_records(records, now) {
        Window::Empty { .. } => AnalyzeReport::default(),
        Window::Populated(window) => write_scores(store, &window).await,
    }
}

/// One analyze cycle at `now`.
pub async fn analyze_at(
    ctx: &PipelineContext,
    now: DateTime<Utc>,
) -> Result<AnalyzeReport, PipelineError> {
    match retrieve_window(ctx.store.as_ref(), now, ctx.settings.window).await? {
        Window::Empty { now } => {
            info!(%now, "no posts in scoring window; skipping");
            Ok(AnalyzeReport::default())
        }
        Window::Populated(window) => {
            let stats = window.stats();
            info!(
                count = stats.count,
                upvotes_min = stats.upvotes.min,
                upvotes_max = stats.upvotes.max,
                comments_min = stats.comments.min,
                comments_max = stats.comments.max,
                mean_upvotes = stats.mean_upvotes,
                std_dev_upvotes = stats.std_dev_upvotes,
                "scoring window"
            );
            Ok(write_scores(ctx.store.as_ref(), &window).await)
        }
    }
}

/// Scheduled entry point: run one analyze cycle now, logging instead of
/// returning failures.
#[instrument(skip_all, fields(cycle_id = %Uuid::new_v4()))]
pub async fn run_analyze_cycle(ctx: &PipelineContext) -> Option<AnalyzeReport> {
    info!("analyzing posts");
    let started = Instant::now();
    match analyze_at(ctx, Utc::now()).await {
        Ok(report) => {
            info!(
                window = report.window_size,
                written = report.written,
                failed = report.failed,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "analyze cycle finished"
            );
            Some(report)
        }
        Err(err) => {
            error!(kind = err.kind(), %err, "analyze cycle failed");
            None
        }
    }
}
