// Scheduler engine: owns the sweep timer and the per-account auto
// check-in timers, and exposes the manual trigger paths

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, instrument, warn};

use crate::config::{RemoteConfig, SchedulerSettings};
use crate::errors::SchedulerError;
use crate::models::{CheckinOutcome, JobKey, RefreshOutcome};
use crate::registry::JobRegistry;
use crate::schedule::{self, IntervalPlan};
use crate::scheduler::runner::JobRunner;
use crate::store::ConfigStore;
use crate::telemetry;

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Cadence of the global keep-alive sweep
    pub sweep_interval: Duration,
    /// Cadence of each account's auto check-in timer
    pub checkin_interval: Duration,
    /// Timezone in which the until-midnight expiry is computed
    pub timezone: Tz,
    /// How long running jobs get to finish after shutdown is signalled
    pub shutdown_grace: Duration,
}

impl SchedulerConfig {
    pub fn from_settings(settings: &SchedulerSettings) -> Result<Self, SchedulerError> {
        let timezone = settings
            .timezone
            .parse::<Tz>()
            .map_err(|_| SchedulerError::InvalidTimezone(settings.timezone.clone()))?;

        Ok(Self {
            sweep_interval: Duration::from_secs(settings.sweep_interval_minutes * 60),
            checkin_interval: Duration::from_secs(settings.checkin_interval_minutes * 60),
            timezone,
            shutdown_grace: Duration::from_secs(settings.shutdown_grace_seconds),
        })
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(5 * 60),
            checkin_interval: Duration::from_secs(18 * 60),
            timezone: chrono_tz::Asia::Shanghai,
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

/// Drives all background work: one global keep-alive sweep plus one
/// expiring auto check-in timer per enabled account.
pub struct SchedulerEngine {
    config: SchedulerConfig,
    store: Arc<dyn ConfigStore>,
    runner: Arc<JobRunner>,
    registry: Arc<JobRegistry>,
    shutdown_tx: broadcast::Sender<()>,
}

impl SchedulerEngine {
    /// Create a new scheduler engine
    pub fn new(config: SchedulerConfig, remote: RemoteConfig, store: Arc<dyn ConfigStore>) -> Self {
        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
        let runner = Arc::new(JobRunner::new(Arc::clone(&store), remote));

        Self {
            config,
            store,
            runner,
            registry: Arc::new(JobRegistry::new()),
            shutdown_tx,
        }
    }

    /// Schedules the sweep, restores persisted auto check-in jobs and
    /// returns how many were restored. Does not block: every timer runs
    /// in its own spawned task.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<usize, SchedulerError> {
        info!(
            sweep_interval_seconds = self.config.sweep_interval.as_secs(),
            checkin_interval_seconds = self.config.checkin_interval.as_secs(),
            "Starting scheduler engine"
        );

        self.schedule_sweep();
        let restored = self.rehydrate().await?;

        info!(restored, "Scheduler engine started");
        Ok(restored)
    }

    /// Stop the scheduler gracefully: signal shutdown, wait out the
    /// grace period, then abort whatever is still running.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        info!("Stopping scheduler engine");

        let _ = self.shutdown_tx.send(());
        tokio::time::sleep(self.config.shutdown_grace).await;

        self.registry.clear();
        refresh_job_gauge(&self.registry);

        info!("Scheduler engine stopped");
    }

    /// Re-registers auto check-in timers for every active account whose
    /// persisted expiry is still in the future. A restored timer waits a
    /// full interval before its first fire; the stored expiry stays
    /// authoritative.
    #[instrument(skip(self))]
    pub async fn rehydrate(&self) -> Result<usize, SchedulerError> {
        let now = Utc::now();
        let configs = self.store.get_all_active().await?;

        let mut restored = 0;
        for config in configs {
            let Some(expire_at) = config.auto_checkin_expire_at else {
                continue;
            };
            if expire_at <= now {
                continue;
            }
            self.schedule_auto_checkin(config.owner_id, expire_at);
            restored += 1;
        }

        if restored > 0 {
            info!(count = restored, "Restored persisted auto check-in jobs");
        }
        Ok(restored)
    }

    /// Arms auto check-in for the account until local midnight and
    /// returns the computed expiry. The expiry lands in the store before
    /// the timer exists, so a crash in between re-creates the job at the
    /// next startup instead of losing it.
    #[instrument(skip(self))]
    pub async fn enable_auto_checkin(
        &self,
        owner_id: i64,
    ) -> Result<DateTime<Utc>, SchedulerError> {
        let config = self
            .store
            .get_by_owner(owner_id)
            .await?
            .ok_or(SchedulerError::NotConfigured(owner_id))?;
        if config.has_empty_credential() {
            return Err(SchedulerError::NotConfigured(owner_id));
        }

        let expire_at = schedule::next_local_midnight(Utc::now(), self.config.timezone);
        self.store
            .set_auto_checkin_expiry(owner_id, Some(expire_at))
            .await?;
        self.schedule_auto_checkin(owner_id, expire_at);

        info!(expire_at = %expire_at, "Auto check-in enabled");
        Ok(expire_at)
    }

    /// Clears the persisted expiry, then cancels the timer. Clearing
    /// first keeps a concurrent restart from resurrecting the job.
    #[instrument(skip(self))]
    pub async fn disable_auto_checkin(&self, owner_id: i64) -> Result<(), SchedulerError> {
        if self.store.get_by_owner(owner_id).await?.is_none() {
            return Err(SchedulerError::NotConfigured(owner_id));
        }

        self.store.set_auto_checkin_expiry(owner_id, None).await?;
        if self.registry.cancel(&JobKey::AutoCheckin(owner_id)) {
            info!("Auto check-in stopped");
        }
        refresh_job_gauge(&self.registry);

        Ok(())
    }

    /// Drops the account's timer without touching the store. Used when
    /// the account itself is removed upstream; an in-flight exchange is
    /// aborted and its result discarded.
    pub fn detach_account(&self, owner_id: i64) {
        if self.registry.cancel(&JobKey::AutoCheckin(owner_id)) {
            info!(owner_id, "Auto check-in job detached");
        }
        refresh_job_gauge(&self.registry);
    }

    /// Runs one keep-alive exchange for the account right now, outside
    /// the sweep cadence. Returns `Ok(None)` when the account exists but
    /// is inactive or lacks a credential.
    #[instrument(skip(self))]
    pub async fn keep_alive_now(
        &self,
        owner_id: i64,
    ) -> Result<Option<RefreshOutcome>, SchedulerError> {
        let config = self
            .store
            .get_by_owner(owner_id)
            .await?
            .ok_or(SchedulerError::NotConfigured(owner_id))?;

        if !config.is_active || config.has_empty_credential() {
            info!("Manual keep-alive skipped: account inactive or without credential");
            return Ok(None);
        }

        Ok(Some(self.runner.keep_alive_account(&config).await))
    }

    /// Runs one check-in for the account right now, outside its timer.
    #[instrument(skip(self))]
    pub async fn check_in_now(&self, owner_id: i64) -> Result<CheckinOutcome, SchedulerError> {
        let config = self
            .store
            .get_by_owner(owner_id)
            .await?
            .ok_or(SchedulerError::NotConfigured(owner_id))?;
        if config.has_empty_credential() {
            return Err(SchedulerError::NotConfigured(owner_id));
        }

        Ok(self.runner.check_in_account(&config).await)
    }

    pub fn is_auto_checkin_scheduled(&self, owner_id: i64) -> bool {
        self.registry.contains(&JobKey::AutoCheckin(owner_id))
    }

    pub fn scheduled_jobs(&self) -> usize {
        self.registry.len()
    }

    fn schedule_sweep(&self) {
        let plan = IntervalPlan::every(self.config.sweep_interval);
        let runner = Arc::clone(&self.runner);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        self.registry.schedule(JobKey::Sweep, move |_| {
            tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + plan.first_fire_delay(), plan.every);
                // Missed ticks are skipped, not replayed
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = ticker.tick() => runner.sweep_once().await,
                    }
                }
            })
        });
    }

    fn schedule_auto_checkin(&self, owner_id: i64, expire_at: DateTime<Utc>) {
        let plan = IntervalPlan::every(self.config.checkin_interval).until(expire_at);
        if !plan.has_fire_before_end(Utc::now()) {
            warn!(
                owner_id,
                expire_at = %expire_at,
                "Auto check-in expires before its first fire and will retire without running"
            );
        }

        let runner = Arc::clone(&self.runner);
        let registry = Arc::clone(&self.registry);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let key = JobKey::AutoCheckin(owner_id);

        self.registry.schedule(key.clone(), move |epoch| {
            tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + plan.first_fire_delay(), plan.every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = ticker.tick() => {
                            // A tick landing exactly on the expiry still
                            // runs; the first one past it retires the job
                            if plan.is_exhausted(Utc::now()) {
                                info!(owner_id, "Auto check-in reached its expiry, retiring");
                                registry.retire(&key, epoch);
                                refresh_job_gauge(&registry);
                                break;
                            }
                            runner.auto_checkin_tick(owner_id).await;
                        }
                    }
                }
            })
        });

        info!(
            owner_id,
            interval_seconds = self.config.checkin_interval.as_secs(),
            until = %expire_at,
            "Auto check-in scheduled"
        );
        refresh_job_gauge(&self.registry);
    }
}

fn refresh_job_gauge(registry: &JobRegistry) {
    let sweep = usize::from(registry.contains(&JobKey::Sweep));
    telemetry::update_auto_checkin_jobs(registry.len().saturating_sub(sweep));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.sweep_interval, Duration::from_secs(300));
        assert_eq!(config.checkin_interval, Duration::from_secs(1080));
        assert_eq!(config.timezone, chrono_tz::Asia::Shanghai);
        assert_eq!(config.shutdown_grace, Duration::from_secs(2));
    }

    #[test]
    fn test_scheduler_config_from_settings() {
        let settings = SchedulerSettings {
            sweep_interval_minutes: 10,
            checkin_interval_minutes: 30,
            timezone: "America/New_York".to_string(),
            shutdown_grace_seconds: 5,
        };

        let config = SchedulerConfig::from_settings(&settings).unwrap();
        assert_eq!(config.sweep_interval, Duration::from_secs(600));
        assert_eq!(config.checkin_interval, Duration::from_secs(1800));
        assert_eq!(config.timezone, chrono_tz::America::New_York);
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
    }

    #[test]
    fn test_scheduler_config_rejects_unknown_timezone() {
        let settings = SchedulerSettings {
            sweep_interval_minutes: 5,
            checkin_interval_minutes: 18,
            timezone: "Not/AZone".to_string(),
            shutdown_grace_seconds: 2,
        };

        let err = SchedulerConfig::from_settings(&settings).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidTimezone(tz) if tz == "Not/AZone"));
    }
}
