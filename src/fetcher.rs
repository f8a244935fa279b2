use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::transform::transform_all;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Entries returned by the source.
    pub listed: usize,
    /// Entries dropped by the record transform.
    pub excluded: usize,
    /// Records sent to the store.
    pub written: usize,
}

/// One fetch cycle stamped with `fetch_time`: list, transform, upsert once.
pub async fn fetch_at(
    ctx: &PipelineContext,
    fetch_time: DateTime<Utc>,
) -> Result<FetchReport, PipelineError> {
    let items = ctx
        .source
        .list_front_page(ctx.settings.listing_limit)
        .await
        .map_err(PipelineError::SourceUnavailable)?;
    let listed = items.len();

    let records = transform_all(items, fetch_time, ctx.settings.transform_workers).await;
    let report = FetchReport {
        listed,
        excluded: listed - records.len(),
        written: records.len(),
    };
    if records.is_empty() {
        info!(listed, "no link posts in listing; nothing to store");
        return Ok(report);
    }

    ctx.store
        .upsert_posts(&records)
        .await
        .map_err(PipelineError::StoreWrite)?;
    Ok(report)
}

/// One fetch cycle stamped with the current time.
pub async fn fetch(ctx: &PipelineContext) -> Result<FetchReport, PipelineError> {
    fetch_at(ctx, Utc::now()).await
}

/// Scheduled entry point: run one fetch cycle, logging instead of returning
/// failures.
#[instrument(skip_all, fields(cycle_id = %Uuid::new_v4()))]
pub async fn run_fetch_cycle(ctx: &PipelineContext) -> Option<FetchReport> {
    info!("fetching front page");
    let started = Instant::now();
    let outcome = fetch(ctx).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match outcome {
        Ok(report) => {
            info!(
                listed = report.listed,
                excluded = report.excluded,
                written = report.written,
                elapsed_ms,
                "fetch cycle finished"
            );
            Some(report)
        }
        Err(err) => {
            error!(kind = err.kind(), %err, elapsed_ms, "fetch cycle failed");
            None
        }
    }
}
