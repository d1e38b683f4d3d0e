//! Expiry sweeper for temporary bans.
//!
//! Runs on a short fixed interval. An expired record is lifted on every live
//! target and removed from the registry only when all of them confirmed;
//! otherwise it stays and the next sweep retries.

use crate::engine::{failure_names, BanEngine, TargetFailure};
use crate::error::Result;
use crate::models::SubjectId;
use crate::scheduler::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Result of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Expired records found
    pub expired: usize,
    /// Lifted everywhere and removed from the registry
    pub cleared: Vec<SubjectId>,
    /// Still recorded because some target refused
    pub retained: Vec<SubjectId>,
    pub failures: Vec<TargetFailure>,
}

/// Background loop that lifts expired temporary bans.
pub struct ExpirySweeper {
    engine: Arc<BanEngine>,
    interval: Duration,
    clock: Arc<dyn Clock>,
}

impl ExpirySweeper {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

    pub fn new(engine: Arc<BanEngine>, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sweep forever. A failed sweep is logged and the loop carries on.
    pub async fn run(self) {
        info!("Expiry sweeper running every {:?}", self.interval);

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match self.sweep_once(self.clock.now()).await {
                Ok(report) if report.expired > 0 => info!(
                    "Expiry sweep: {} expired, {} cleared, {} retained",
                    report.expired,
                    report.cleared.len(),
                    report.retained.len()
                ),
                Ok(_) => {}
                Err(e) => error!("Expiry sweep failed: {}", e),
            }
        }
    }

    /// Lift every ban that expired at or before `now`.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut state = self.engine.lock_state().await;
        let expired = state.registry.expired(now);
        if expired.is_empty() {
            return Ok(SweepReport::default());
        }

        let (live, _) = self.engine.live_targets(&mut state.targets).await?;

        let mut report = SweepReport {
            expired: expired.len(),
            ..SweepReport::default()
        };
        for record in &expired {
            let tally = self.engine.lift_everywhere(&live, record.subject_id).await;
            if tally.is_uniform() {
                report.cleared.push(record.subject_id);
            } else {
                report.retained.push(record.subject_id);
                report.failures.extend(tally.failures);
            }
        }

        if !report.cleared.is_empty() {
            let mut next = state.registry.clone();
            for subject in &report.cleared {
                next.remove(*subject);
            }
            self.engine.storage().save_registry(&next)?;
            *state.registry = next;
        }
        drop(state);

        self.engine
            .reporter()
            .report(&failure_names(&report.failures))
            .await;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BanRequest;
    use crate::models::TargetRef;
    use crate::testing::{Fixture, VirtualClock};
    use chrono::TimeDelta;

    fn request(id: u64, duration: &str) -> BanRequest {
        BanRequest {
            subject_id: SubjectId(id),
            name: format!("user{id}"),
            reason: None,
            duration: duration.to_string(),
        }
    }

    #[tokio::test]
    async fn expired_ban_is_lifted_everywhere() {
        let fx = Fixture::new(&[(1, "alpha"), (2, "beta")]).await;
        fx.engine.apply_ban(request(10, "1H")).await.unwrap();
        fx.engine.apply_ban(request(11, "/")).await.unwrap();

        let sweeper = ExpirySweeper::new(fx.engine.clone(), ExpirySweeper::DEFAULT_INTERVAL);
        let later = Utc::now() + TimeDelta::hours(2);
        let report = sweeper.sweep_once(later).await.unwrap();

        assert_eq!(report.expired, 1);
        assert_eq!(report.cleared, vec![SubjectId(10)]);
        assert!(fx.engine.get_ban(SubjectId(10)).await.is_none());
        assert!(fx.engine.get_ban(SubjectId(11)).await.is_some());
        for guild in [TargetRef(1), TargetRef(2)] {
            let bans = fx.client.bans(guild).await;
            assert!(!bans.contains(&SubjectId(10)));
            assert!(bans.contains(&SubjectId(11)));
        }
    }

    #[tokio::test]
    async fn nothing_expires_early() {
        let fx = Fixture::new(&[(1, "alpha")]).await;
        fx.engine.apply_ban(request(10, "1D")).await.unwrap();

        let sweeper = ExpirySweeper::new(fx.engine.clone(), ExpirySweeper::DEFAULT_INTERVAL);
        let report = sweeper.sweep_once(Utc::now()).await.unwrap();

        assert_eq!(report, SweepReport::default());
        assert!(fx.client.bans(TargetRef(1)).await.contains(&SubjectId(10)));
    }

    #[tokio::test]
    async fn refusal_keeps_record_until_every_target_confirms() {
        let fx = Fixture::new(&[(1, "alpha"), (2, "beta")]).await;
        fx.engine.apply_ban(request(10, "1H")).await.unwrap();
        fx.client.set_forbidden(TargetRef(2), true).await;

        let sweeper = ExpirySweeper::new(fx.engine.clone(), ExpirySweeper::DEFAULT_INTERVAL);
        let later = Utc::now() + TimeDelta::hours(2);
        let report = sweeper.sweep_once(later).await.unwrap();

        assert_eq!(report.retained, vec![SubjectId(10)]);
        assert!(report.cleared.is_empty());
        // Lifted where allowed, but the record stays while beta still enforces it.
        assert!(!fx.client.bans(TargetRef(1)).await.contains(&SubjectId(10)));
        assert!(fx.client.bans(TargetRef(2)).await.contains(&SubjectId(10)));
        assert!(fx.engine.get_ban(SubjectId(10)).await.is_some());
        assert_eq!(fx.reported().await, vec!["beta".to_string()]);

        // Once beta lets us, the next sweep finishes the job.
        fx.client.set_forbidden(TargetRef(2), false).await;
        let report = sweeper.sweep_once(later).await.unwrap();
        assert_eq!(report.cleared, vec![SubjectId(10)]);
        assert!(fx.client.bans(TargetRef(2)).await.is_empty());
        assert!(fx.engine.get_ban(SubjectId(10)).await.is_none());
    }

    #[tokio::test]
    async fn cleared_records_are_persisted() {
        let fx = Fixture::new(&[(1, "alpha")]).await;
        fx.engine.apply_ban(request(10, "1S")).await.unwrap();

        let sweeper = ExpirySweeper::new(fx.engine.clone(), ExpirySweeper::DEFAULT_INTERVAL);
        sweeper
            .sweep_once(Utc::now() + TimeDelta::minutes(1))
            .await
            .unwrap();

        let stored = fx.engine.storage().load_registry().unwrap().unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn reconcile_leaves_expired_records_to_the_sweeper() {
        let fx = Fixture::new(&[(1, "alpha"), (2, "beta")]).await;
        fx.engine.apply_ban(request(10, "1H")).await.unwrap();
        fx.client.set_forbidden(TargetRef(2), true).await;

        let sweeper = ExpirySweeper::new(fx.engine.clone(), ExpirySweeper::DEFAULT_INTERVAL);
        let later = Utc::now() + TimeDelta::hours(2);
        sweeper.sweep_once(later).await.unwrap();
        assert!(!fx.client.bans(TargetRef(1)).await.contains(&SubjectId(10)));

        // The retained record must not be pushed back onto alpha.
        let report = fx.engine.reconcile_at(later).await.unwrap();
        assert_eq!(report.applied, 0);
        assert!(!fx.client.bans(TargetRef(1)).await.contains(&SubjectId(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn loop_lifts_bans_as_they_expire() {
        let fx = Fixture::new(&[(1, "alpha")]).await;
        let clock = Arc::new(VirtualClock::new());
        fx.engine.apply_ban(request(10, "1S")).await.unwrap();

        let sweeper = ExpirySweeper::new(fx.engine.clone(), ExpirySweeper::DEFAULT_INTERVAL)
            .with_clock(clock);
        tokio::spawn(sweeper.run());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(fx.engine.get_ban(SubjectId(10)).await.is_some());

        tokio::time::sleep(ExpirySweeper::DEFAULT_INTERVAL).await;
        assert!(fx.engine.get_ban(SubjectId(10)).await.is_none());
        assert!(fx.client.bans(TargetRef(1)).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn loop_survives_a_failed_sweep() {
        let fx = Fixture::new(&[(1, "alpha")]).await;
        let clock = Arc::new(VirtualClock::new());
        fx.engine.apply_ban(request(10, "1S")).await.unwrap();
        fx.client.set_unavailable(true);

        let sweeper = ExpirySweeper::new(fx.engine.clone(), ExpirySweeper::DEFAULT_INTERVAL)
            .with_clock(clock.clone());
        assert!(sweeper.sweep_once(clock.now() + TimeDelta::minutes(1)).await.is_err());
        let task = tokio::spawn(sweeper.run());

        // The first expired sweep runs while the platform is down.
        tokio::time::sleep(ExpirySweeper::DEFAULT_INTERVAL + Duration::from_secs(1)).await;
        assert!(fx.engine.get_ban(SubjectId(10)).await.is_some());
        assert!(!task.is_finished());

        fx.client.set_unavailable(false);
        tokio::time::sleep(ExpirySweeper::DEFAULT_INTERVAL).await;
        assert!(fx.engine.get_ban(SubjectId(10)).await.is_none());
        // A failed lookup prunes nothing.
        assert!(fx.client.bans(TargetRef(1)).await.is_empty());
        assert_eq!(fx.engine.list_targets().await.unwrap().len(), 1);
    }
}
