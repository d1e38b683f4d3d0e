//! Shared fixture for engine, sweeper and scheduler tests.

use crate::client::MemoryClient;
use crate::contact::{FailureReporter, RecordingContact};
use crate::engine::BanEngine;
use crate::models::TargetRef;
use crate::scheduler::Clock;
use crate::storage::Storage;
use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, Utc};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::time::Instant;

/// Wall clock that moves with tokio's (possibly paused) timer.
pub(crate) struct VirtualClock {
    base: DateTime<Utc>,
    started: Instant,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self {
            base: Utc::now(),
            started: Instant::now(),
        }
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.started.elapsed()).unwrap();
        self.base + elapsed
    }

    fn local(&self) -> NaiveDateTime {
        self.now().with_timezone(&Local).naive_local()
    }
}

pub(crate) struct Fixture {
    _dir: TempDir,
    pub client: Arc<MemoryClient>,
    pub contact: Arc<RecordingContact>,
    pub engine: Arc<BanEngine>,
}

impl Fixture {
    /// Fresh storage and a fleet of `(id, name)` guilds, all synced.
    pub async fn new(guilds: &[(u64, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(Storage::open(dir.path()).unwrap());
        let client = Arc::new(MemoryClient::with_guilds(
            guilds.iter().map(|(id, name)| (TargetRef(*id), *name)),
        ));
        let contact = Arc::new(RecordingContact::default());
        let engine = BanEngine::open(
            client.clone(),
            storage,
            FailureReporter::new(contact.clone()),
        )
        .await
        .unwrap();

        Self {
            _dir: dir,
            client,
            contact,
            engine: Arc::new(engine),
        }
    }

    /// Number of failure notifications sent so far.
    pub async fn notifications(&self) -> usize {
        self.contact.sent.lock().await.len()
    }

    /// Every target name listed in failure notifications, in order.
    pub async fn reported(&self) -> Vec<String> {
        self.contact
            .sent
            .lock()
            .await
            .iter()
            .flat_map(|message| message.lines())
            .filter_map(|line| {
                let (number, name) = line.split_once(". ")?;
                number.parse::<usize>().ok()?;
                Some(name.to_string())
            })
            .collect()
    }
}
