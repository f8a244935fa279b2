use anyhow::{anyhow, Result};
use chrono::Duration;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::config::Config;
use crate::source::ContentSource;
use crate::store::PostStore;

/// Tunables shared by the fetch and analyze cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub listing_limit: u32,
    pub transform_workers: NonZeroUsize,
    pub window: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            listing_limit: 10,
            transform_workers: NonZeroUsize::MIN,
            window: Duration::hours(24),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let window = Duration::try_hours(i64::from(cfg.scoring.window_hours))
            .ok_or_else(|| anyhow!("scoring.window_hours is out of range"))?;
        Ok(Self {
            listing_limit: cfg.fetch.listing_limit,
            transform_workers: NonZeroUsize::new(cfg.fetch.transform_workers)
                .unwrap_or(NonZeroUsize::MIN),
            window,
        })
    }
}

/// Clients and settings built once at startup and handed to every cycle.
#[derive(Clone)]
pub struct PipelineContext {
    pub source: Arc<dyn ContentSource>,
    pub store: Arc<dyn PostStore>,
    pub settings: PipelineSettings,
}

impl PipelineContext {
    pub fn new(
        source: Arc<dyn ContentSource>,
        store: Arc<dyn PostStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            store,
            settings,
        }
    }
}

impl fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineContext")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
