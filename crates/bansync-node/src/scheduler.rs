//! Scheduled reconciliation.
//!
//! A single loop reconciles, sleeps until the next cadence boundary, and
//! repeats. The cadence lives in a `watch` channel: publishing a new one
//! wakes the sleeping loop, which reconciles immediately and then waits for
//! the new boundary. There is only ever one loop and one outstanding wait.
//!
//! # Boundaries
//!
//! ```text
//! CADENCE   NEXT RUN
//! ───────────────────────────────────────────────
//! daily     next local midnight
//! weekly    midnight starting next Monday
//! monthly   midnight starting the 1st of next month
//! ```
//!
//! Monthly boundaries use a fixed 365-day month table: in a leap year the
//! February run lands on the 29th instead of March 1st.
//!
//! Boundaries are local wall-clock times; the wait is measured between the
//! real instants they map to, so a daylight-saving shift moves the wait, not
//! the boundary.

use crate::engine::BanEngine;
use crate::error::Result;
use crate::models::{Cadence, ChannelRef, ScheduleConfig};
use chrono::{
    DateTime, Datelike, Days, Local, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

const MONTH_LENGTHS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Local wall-clock reading, used for calendar boundaries.
    fn local(&self) -> NaiveDateTime;
}

/// The host's clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Time from `now` until the next boundary of `cadence`, in the host zone.
pub fn until_next_boundary(now: NaiveDateTime, cadence: Cadence) -> Duration {
    until_next_boundary_in(&Local, now, cadence)
}

/// Time from local `now` until the next boundary of `cadence` in `tz`.
pub fn until_next_boundary_in<Tz: TimeZone>(
    tz: &Tz,
    now: NaiveDateTime,
    cadence: Cadence,
) -> Duration {
    let extra_days = match cadence {
        Cadence::Daily => 0,
        Cadence::Weekly => 6 - now.weekday().num_days_from_monday(),
        Cadence::Monthly => {
            MONTH_LENGTHS[now.month0() as usize].saturating_sub(now.day())
        }
    };

    let boundary = now
        .date()
        .succ_opt()
        .and_then(|tomorrow| tomorrow.checked_add_days(Days::new(u64::from(extra_days))))
        .map(|day| day.and_time(NaiveTime::MIN));
    let Some(boundary) = boundary else {
        return Duration::MAX;
    };
    local_span(tz, now, boundary)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Real time between two local readings. Falls back to the naive difference
/// when either reading falls in a skipped hour.
fn local_span<Tz: TimeZone>(tz: &Tz, from: NaiveDateTime, to: NaiveDateTime) -> TimeDelta {
    match (
        tz.from_local_datetime(&from).earliest(),
        tz.from_local_datetime(&to).earliest(),
    ) {
        (Some(from), Some(to)) => to.signed_duration_since(from),
        _ => to - from,
    }
}

/// The scheduled reconciliation loop.
pub struct Scheduler {
    engine: Arc<BanEngine>,
    clock: Arc<dyn Clock>,
    cadence_rx: watch::Receiver<Cadence>,
}

/// Cloneable control side of the [`Scheduler`].
///
/// The loop exits once every handle has been dropped.
#[derive(Clone)]
pub struct ScheduleHandle {
    engine: Arc<BanEngine>,
    config: Arc<Mutex<ScheduleConfig>>,
    cadence_tx: Arc<watch::Sender<Cadence>>,
}

impl Scheduler {
    pub fn new(
        engine: Arc<BanEngine>,
        clock: Arc<dyn Clock>,
        config: ScheduleConfig,
    ) -> (Self, ScheduleHandle) {
        let (cadence_tx, cadence_rx) = watch::channel(config.cadence);
        let handle = ScheduleHandle {
            engine: Arc::clone(&engine),
            config: Arc::new(Mutex::new(config)),
            cadence_tx: Arc::new(cadence_tx),
        };
        let scheduler = Self {
            engine,
            clock,
            cadence_rx,
        };
        (scheduler, handle)
    }

    /// Run until every [`ScheduleHandle`] is gone.
    pub async fn run(mut self) {
        loop {
            if self.cadence_rx.has_changed().is_err() {
                info!("Scheduler stopped");
                return;
            }

            if let Err(e) = self.engine.reconcile().await {
                error!("Scheduled reconciliation failed: {}", e);
            }

            let cadence = *self.cadence_rx.borrow_and_update();
            let wait = until_next_boundary(self.clock.local(), cadence);
            info!("Next {} sync in {:?}", cadence, wait);

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = self.cadence_rx.changed() => {
                    if changed.is_err() {
                        info!("Scheduler stopped");
                        return;
                    }
                    info!("Cadence changed, restarting scheduled sync");
                }
            }
        }
    }
}

impl ScheduleHandle {
    pub async fn current(&self) -> ScheduleConfig {
        *self.config.lock().await
    }

    /// Persist a new cadence and restart the loop on it.
    ///
    /// Returns the acknowledgement, which is also posted to the notify
    /// channel when one is set.
    pub async fn reschedule(
        &self,
        cadence: Cadence,
        notify_channel: Option<ChannelRef>,
    ) -> Result<String> {
        let mut config = self.config.lock().await;
        let next = ScheduleConfig {
            cadence,
            notify_channel: notify_channel.or(config.notify_channel),
        };
        self.engine.storage().save_schedule(&next)?;
        *config = next;
        self.cadence_tx.send_replace(cadence);
        drop(config);

        let message = format!("Done. The bans will now sync {cadence}.");
        if let Some(channel) = next.notify_channel {
            if let Err(e) = self
                .engine
                .client()
                .send_channel_message(channel, &message)
                .await
            {
                warn!("Failed to acknowledge cadence change in {}: {}", channel, e);
            }
        }
        Ok(message)
    }
}
