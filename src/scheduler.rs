//! Driving loop: fetch on a fixed interval, analyze at the top of every hour.
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, DurationRound, Utc};
use std::sync::Arc;
use tracing::{error, info};

use crate::config::Config;
use crate::context::PipelineContext;
use crate::fetcher::run_fetch_cycle;
use crate::scorer::run_analyze_cycle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Fetch,
    Analyze,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSettings {
    pub fetch_every: Duration,
    pub tick: std::time::Duration,
    pub error_pause: std::time::Duration,
}

impl ScheduleSettings {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let secs = i64::try_from(cfg.schedule.fetch_interval_secs)
            .context("schedule.fetch_interval_secs is too large")?;
        let fetch_every = Duration::try_seconds(secs)
            .ok_or_else(|| anyhow!("schedule.fetch_interval_secs is out of range"))?;
        Ok(Self {
            fetch_every,
            tick: std::time::Duration::from_millis(cfg.schedule.tick_ms),
            error_pause: std::time::Duration::from_secs(cfg.schedule.error_pause_secs),
        })
    }
}

/// First top-of-hour instant strictly after `after`.
pub fn next_top_of_hour(after: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let floor = after
        .duration_trunc(Duration::hours(1))
        .context("cannot truncate timestamp to the hour")?;
    floor
        .checked_add_signed(Duration::hours(1))
        .ok_or_else(|| anyhow!("next hour after {after} is out of range"))
}

/// Due-time bookkeeping for both tasks. Slots missed while a task was running
/// collapse into a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    fetch_every: Duration,
    next_fetch: DateTime<Utc>,
    next_analyze: DateTime<Utc>,
}

impl Schedule {
    /// Schedule starting after a fetch that ran at `start`.
    pub fn new(start: DateTime<Utc>, fetch_every: Duration) -> Result<Self> {
        if fetch_every <= Duration::zero() {
            return Err(anyhow!("fetch interval must be positive"));
        }
        let next_fetch = start
            .checked_add_signed(fetch_every)
            .ok_or_else(|| anyhow!("fetch slot after {start} is out of range"))?;
        Ok(Self {
            fetch_every,
            next_fetch,
            next_analyze: next_top_of_hour(start)?,
        })
    }

    pub fn next_fetch(&self) -> DateTime<Utc> {
        self.next_fetch
    }

    pub fn next_analyze(&self) -> DateTime<Utc> {
        self.next_analyze
    }

    /// Tasks due at `now`, fetch first, advancing each past `now`.
    pub fn due(&mut self, now: DateTime<Utc>) -> Result<Vec<Task>> {
        let mut tasks = Vec::with_capacity(2);
        if now >= self.next_fetch {
            while self.next_fetch <= now {
                self.next_fetch = self
                    .next_fetch
                    .checked_add_signed(self.fetch_every)
                    .ok_or_else(|| anyhow!("fetch slot overflowed"))?;
            }
            tasks.push(Task::Fetch);
        }
        if now >= self.next_analyze {
            self.next_analyze = next_top_of_hour(now)?;
            tasks.push(Task::Analyze);
        }
        Ok(tasks)
    }
}

/// Run `task` on its own tokio task and wait for it. Cycle failures are
/// handled inside the cycle; only a panic surfaces here.
pub async fn dispatch(ctx: Arc<PipelineContext>, task: Task) -> Result<()> {
    let handle = tokio::spawn(async move {
        match task {
            Task::Fetch => {
                run_fetch_cycle(&ctx).await;
            }
            Task::Analyze => {
                run_analyze_cycle(&ctx).await;
            }
        }
    });
    handle
        .await
        .map_err(|err| anyhow!("{task:?} task aborted: {err}"))
}

pub struct Scheduler {
    ctx: Arc<PipelineContext>,
    settings: ScheduleSettings,
    schedule: Schedule,
}

impl Scheduler {
    pub fn new(
        ctx: Arc<PipelineContext>,
        settings: ScheduleSettings,
        start: DateTime<Utc>,
    ) -> Result<Self> {
        let schedule = Schedule::new(start, settings.fetch_every)?;
        Ok(Self {
            ctx,
            settings,
            schedule,
        })
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Dispatch everything due at `now`, one task at a time. Every due task is
    /// run even when an earlier one aborts; the first abort is returned after.
    pub async fn run_due(&mut self, now: DateTime<Utc>) -> Result<Vec<Task>> {
        let tasks = self.schedule.due(now)?;
        let mut first_err = None;
        for task in &tasks {
            if let Err(err) = dispatch(Arc::clone(&self.ctx), *task).await {
                error!(?err, ?task, "task aborted");
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(tasks),
        }
    }

    /// Poll forever. A failing iteration pauses for `error_pause` before the
    /// loop resumes.
    pub async fn run_forever(mut self) {
        info!(
            next_fetch = %self.schedule.next_fetch(),
            next_analyze = %self.schedule.next_analyze(),
            "scheduler started"
        );
        loop {
            match self.run_due(Utc::now()).await {
                Ok(_) => tokio::time::sleep(self.settings.tick).await,
                Err(err) => {
                    error!(
                        ?err,
                        pause_secs = self.settings.error_pause.as_secs(),
                        "scheduler iteration failed; pausing"
                    );
                    tokio::time::sleep(self.settings.error_pause).await;
                }
            }
        }
    }
}

/// Run the startup fetch and return a scheduler whose first slots follow it.
pub async fn start(ctx: Arc<PipelineContext>, settings: ScheduleSettings) -> Result<Scheduler> {
    let started = Utc::now();
    if let Err(err) = dispatch(Arc::clone(&ctx), Task::Fetch).await {
        error!(?err, "startup fetch aborted");
    }
    Scheduler::new(ctx, settings, started)
}

/// Immediate fetch, then the polling loop.
pub async fn run(ctx: PipelineContext, settings: ScheduleSettings) -> Result<()> {
    start(Arc::new(ctx), settings).await?.run_forever().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, h, m, s).unwrap()
    }

    #[test]
    fn top_of_hour_is_strictly_after() {
        assert_eq!(next_top_of_hour(at(9, 17, 3)).unwrap(), at(10, 0, 0));
        assert_eq!(next_top_of_hour(at(9, 0, 0)).unwrap(), at(10, 0, 0));
        assert_eq!(
            next_top_of_hour(at(23, 59, 59)).unwrap(),
            Utc.with_ymd_and_hms(2024, 7, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn fetch_every_interval_and_analyze_on_the_hour() {
        let mut schedule = Schedule::new(at(9, 45, 0), Duration::minutes(10)).unwrap();
        assert_eq!(schedule.next_fetch(), at(9, 55, 0));
        assert_eq!(schedule.next_analyze(), at(10, 0, 0));

        assert!(schedule.due(at(9, 50, 0)).unwrap().is_empty());
        assert_eq!(schedule.due(at(9, 55, 0)).unwrap(), vec![Task::Fetch]);
        assert!(schedule.due(at(9, 59, 59)).unwrap().is_empty());
        assert_eq!(schedule.due(at(10, 0, 0)).unwrap(), vec![Task::Analyze]);
        assert_eq!(schedule.due(at(10, 5, 1)).unwrap(), vec![Task::Fetch]);
        assert_eq!(schedule.next_fetch(), at(10, 15, 0));
        assert_eq!(schedule.next_analyze(), at(11, 0, 0));
    }

    #[test]
    fn both_due_runs_fetch_first() {
        let mut schedule = Schedule::new(at(9, 50, 0), Duration::minutes(10)).unwrap();
        assert_eq!(
            schedule.due(at(10, 0, 0)).unwrap(),
            vec![Task::Fetch, Task::Analyze]
        );
    }

    #[test]
    fn missed_slots_collapse() {
        let mut schedule = Schedule::new(at(9, 0, 0), Duration::minutes(10)).unwrap();
        assert_eq!(
            schedule.due(at(12, 34, 0)).unwrap(),
            vec![Task::Fetch, Task::Analyze]
        );
        assert_eq!(schedule.next_fetch(), at(12, 40, 0));
        assert_eq!(schedule.next_analyze(), at(13, 0, 0));
        assert!(schedule.due(at(12, 35, 0)).unwrap().is_empty());
    }

    #[test]
    fn oversized_interval_is_an_error_not_a_panic() {
        let mut cfg: Config = serde_yaml::from_str(crate::config::example()).unwrap();
        cfg.schedule.fetch_interval_secs = i64::MAX as u64;
        assert!(ScheduleSettings::from_config(&cfg).is_err());
        cfg.schedule.fetch_interval_secs = u64::MAX;
        assert!(ScheduleSettings::from_config(&cfg).is_err());
        cfg.schedule.fetch_interval_secs = 600;
        assert_eq!(
            ScheduleSettings::from_config(&cfg).unwrap().fetch_every,
            Duration::minutes(10)
        );
    }

    #[test]
    fn non_positive_interval_is_rejected() {
        assert!(Schedule::new(at(9, 0, 0), Duration::zero()).is_err());
    }
}
