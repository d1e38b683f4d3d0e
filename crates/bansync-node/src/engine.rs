//! Ban reconciliation engine.
//!
//! # Commit rule
//!
//! The registry only changes when every live target agreed:
//!
//! ```text
//! ACTION     ALL TARGETS OK        ANY TARGET FAILED
//! ─────────────────────────────────────────────────────────
//! ban        record inserted       registry untouched
//! unban      record removed        record kept
//! expiry     record removed        record kept, retried next sweep
//! reconcile  (registry read-only)  failures reported
//! ```
//!
//! Per-target failures never abort a pass. They are collected, attributed to
//! the target by name and handed to the [`FailureReporter`] once per pass.
//!
//! # Locking
//!
//! Registry and target set each sit behind their own mutex. Every pass takes
//! the registry lock first, then the target lock, and holds both until the
//! pass has committed, so operator commands, scheduled passes and the expiry
//! sweep never interleave.

use crate::client::{ClientError, CommunityClient};
use crate::contact::FailureReporter;
use crate::error::{Error, Result};
use crate::models::{BanRecord, Registry, SubjectId, Target, TargetRef, TargetSet};
use crate::storage::Storage;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Why a target rejected an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    Forbidden,
    Error(String),
}

impl From<ClientError> for FailureKind {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Forbidden => FailureKind::Forbidden,
            other => FailureKind::Error(other.to_string()),
        }
    }
}

/// A target that rejected an action during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFailure {
    pub target: TargetRef,
    pub name: String,
    pub kind: FailureKind,
}

/// What happened on one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOutcome {
    Applied,
    /// The target already had the desired state
    AlreadyEnforced,
}

/// How widely an action landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Every target (vacuously true with no targets)
    Full,
    Partial,
    None,
}

impl Tier {
    pub fn from_counts(success: usize, total: usize) -> Self {
        if success == total {
            Tier::Full
        } else if success > 0 {
            Tier::Partial
        } else {
            Tier::None
        }
    }
}

/// Per-target accounting for one action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub target_count: usize,
    pub success_count: usize,
    pub failures: Vec<TargetFailure>,
}

impl Tally {
    pub(crate) fn record(
        &mut self,
        target: &Target,
        result: std::result::Result<TargetOutcome, FailureKind>,
    ) {
        self.target_count += 1;
        match result {
            Ok(outcome) => {
                debug!("{:?} on {} ({})", outcome, target.name, target.id);
                self.success_count += 1;
            }
            Err(kind) => {
                warn!("Target {} ({}) rejected action: {:?}", target.name, target.id, kind);
                self.failures.push(TargetFailure {
                    target: target.id,
                    name: target.name.clone(),
                    kind,
                });
            }
        }
    }

    pub fn is_uniform(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn tier(&self) -> Tier {
        Tier::from_counts(self.success_count, self.target_count)
    }
}

/// Names of failed targets, first occurrence order, no repeats.
pub fn failure_names(failures: &[TargetFailure]) -> Vec<String> {
    let mut seen = HashSet::new();
    failures
        .iter()
        .filter(|f| seen.insert(f.target))
        .map(|f| f.name.clone())
        .collect()
}

/// Result of a full reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Live targets visited
    pub targets: usize,
    /// Ban actions issued to close gaps
    pub applied: usize,
    /// Stale targets removed from the synced list
    pub pruned: Vec<TargetRef>,
    pub failures: Vec<TargetFailure>,
}

/// A ban request from the operator.
#[derive(Debug, Clone)]
pub struct BanRequest {
    pub subject_id: SubjectId,
    pub name: String,
    pub reason: Option<String>,
    /// Duration expression, e.g. "2W-3D" or "/"
    pub duration: String,
}

/// Result of [`BanEngine::apply_ban`].
#[derive(Debug, Clone)]
pub struct BanOutcome {
    pub record: BanRecord,
    pub tally: Tally,
    /// Whether the registry now holds the record
    pub committed: bool,
}

impl BanOutcome {
    pub fn summary(&self) -> String {
        let name = &self.record.name;
        match self.tally.tier() {
            Tier::Full => format!(
                "{} has been banned from all connected servers. Duration: {}.",
                name, self.record.expiry_display
            ),
            Tier::Partial => format!(
                "{name} has been banned from some of the connected servers. \
                 The global ban was not recorded; run it again once the failures are fixed."
            ),
            Tier::None => {
                format!("We have not been able to ban {name} from the connected servers.")
            }
        }
    }
}

/// Result of [`BanEngine::apply_unban`].
#[derive(Debug, Clone)]
pub struct UnbanOutcome {
    pub record: BanRecord,
    pub tally: Tally,
    /// Whether the record was removed from the registry
    pub committed: bool,
}

impl UnbanOutcome {
    pub fn summary(&self) -> String {
        let name = &self.record.name;
        match self.tally.tier() {
            Tier::Full => format!("{name} has been unbanned from all connected servers."),
            Tier::Partial => format!(
                "{name} has been unbanned from some of the connected servers. \
                 The global ban stays recorded until every server agrees."
            ),
            Tier::None => {
                format!("We have not been able to unban {name} from the connected servers.")
            }
        }
    }
}

/// Result of [`BanEngine::add_target`].
#[derive(Debug, Clone)]
pub enum AddTarget {
    Added { target: Target, report: PassReport },
    AlreadySynced { target: Target },
}

/// Result of [`BanEngine::remove_target`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveTarget {
    Removed,
    NotSynced,
}

/// Both state locks, held for the length of a pass.
pub(crate) struct StateGuard<'a> {
    pub registry: MutexGuard<'a, Registry>,
    pub targets: MutexGuard<'a, TargetSet>,
}

/// Owner of the registry and target set.
pub struct BanEngine {
    client: Arc<dyn CommunityClient>,
    storage: Arc<Storage>,
    reporter: FailureReporter,
    registry: Mutex<Registry>,
    targets: Mutex<TargetSet>,
}

impl BanEngine {
    /// Load state from storage, writing defaults on first run.
    ///
    /// On first run the synced list is seeded with every guild the client
    /// currently reports.
    pub async fn open(
        client: Arc<dyn CommunityClient>,
        storage: Arc<Storage>,
        reporter: FailureReporter,
    ) -> Result<Self> {
        let initial = if storage.load_targets()?.is_none() {
            client.list_guilds().await?
        } else {
            Vec::new()
        };
        storage.init_defaults(&initial)?;

        let registry = storage.load_registry()?.unwrap_or_default();
        let targets = storage.load_targets()?.unwrap_or_default();
        info!(
            "Loaded {} global bans and {} synced targets",
            registry.len(),
            targets.len()
        );

        Ok(Self {
            client,
            storage,
            reporter,
            registry: Mutex::new(registry),
            targets: Mutex::new(targets),
        })
    }

    pub fn client(&self) -> &Arc<dyn CommunityClient> {
        &self.client
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub(crate) fn reporter(&self) -> &FailureReporter {
        &self.reporter
    }

    pub(crate) async fn lock_state(&self) -> StateGuard<'_> {
        let registry = self.registry.lock().await;
        let targets = self.targets.lock().await;
        StateGuard { registry, targets }
    }

    /// Resolve every synced target, dropping the ones that no longer resolve.
    ///
    /// The cleaned set replaces the old one only after it has been persisted.
    /// A lookup error fails the whole pass and prunes nothing.
    pub(crate) async fn live_targets(
        &self,
        targets: &mut TargetSet,
    ) -> Result<(Vec<Target>, Vec<TargetRef>)> {
        let mut live = Vec::with_capacity(targets.len());
        for target in targets.iter() {
            if let Some(resolved) = self.client.resolve(target).await? {
                live.push(resolved);
            }
        }

        let live_ids: HashSet<TargetRef> = live.iter().map(|t| t.id).collect();
        let mut cleaned = targets.clone();
        let pruned = cleaned.retain_live(&live_ids);
        if !pruned.is_empty() {
            self.storage.save_targets(&cleaned)?;
            *targets = cleaned;
            warn!("Pruned {} unreachable targets: {:?}", pruned.len(), pruned);
        }

        Ok((live, pruned))
    }

    /// Bring every live target's ban list up to the registry.
    pub async fn reconcile(&self) -> Result<PassReport> {
        self.reconcile_at(Utc::now()).await
    }

    /// Records already expired at `now` are left for the sweeper.
    pub(crate) async fn reconcile_at(&self, now: DateTime<Utc>) -> Result<PassReport> {
        let mut state = self.lock_state().await;
        let (live, pruned) = self.live_targets(&mut state.targets).await?;

        let mut report = PassReport {
            targets: live.len(),
            pruned,
            ..PassReport::default()
        };

        for target in &live {
            match self.enforce_registry(target, &state.registry, now).await {
                Ok(applied) => report.applied += applied,
                Err(kind) => {
                    warn!("Sync failed on {} ({}): {:?}", target.name, target.id, kind);
                    report.failures.push(TargetFailure {
                        target: target.id,
                        name: target.name.clone(),
                        kind,
                    });
                }
            }
        }
        drop(state);

        info!(
            "Reconciled {} targets: {} bans applied, {} failed, {} pruned",
            report.targets,
            report.applied,
            report.failures.len(),
            report.pruned.len()
        );
        self.reporter.report(&failure_names(&report.failures)).await;

        Ok(report)
    }

    async fn enforce_registry(
        &self,
        target: &Target,
        registry: &Registry,
        now: DateTime<Utc>,
    ) -> std::result::Result<usize, FailureKind> {
        let existing: HashSet<SubjectId> =
            self.client.list_bans(target.id).await?.into_iter().collect();

        let mut applied = 0;
        for record in registry.iter().filter(|r| !r.is_expired(now)) {
            if !existing.contains(&record.subject_id) {
                self.client
                    .ban(target.id, record.subject_id, &record.reason)
                    .await?;
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Ban a subject on every live target.
    ///
    /// The duration is parsed before any target is touched. The record is
    /// committed only if no target failed.
    pub async fn apply_ban(&self, request: BanRequest) -> Result<BanOutcome> {
        let lifetime = bansync_duration::parse(&request.duration)?;

        let mut state = self.lock_state().await;
        let record = BanRecord::new(
            request.subject_id,
            request.name,
            request.reason,
            &lifetime,
            Utc::now(),
        )?;
        let (live, _) = self.live_targets(&mut state.targets).await?;

        let mut tally = Tally::default();
        for target in &live {
            let result = self.ban_on(target, &record).await;
            tally.record(target, result);
        }

        let committed = tally.is_uniform();
        if committed {
            let mut next = state.registry.clone();
            next.insert(record.clone());
            self.storage.save_registry(&next)?;
            *state.registry = next;
        }
        drop(state);

        info!(
            "Ban of {} ({}): {}/{} targets, committed: {}",
            record.name, record.subject_id, tally.success_count, tally.target_count, committed
        );
        self.reporter.report(&failure_names(&tally.failures)).await;

        Ok(BanOutcome {
            record,
            tally,
            committed,
        })
    }

    async fn ban_on(
        &self,
        target: &Target,
        record: &BanRecord,
    ) -> std::result::Result<TargetOutcome, FailureKind> {
        let bans = self.client.list_bans(target.id).await?;
        if bans.contains(&record.subject_id) {
            return Ok(TargetOutcome::AlreadyEnforced);
        }

        self.notify_subject(target, record).await;
        self.client
            .ban(target.id, record.subject_id, &record.reason)
            .await?;
        Ok(TargetOutcome::Applied)
    }

    /// Tell the subject before they lose the shared guild. Outcome ignored.
    async fn notify_subject(&self, target: &Target, record: &BanRecord) {
        let text = format!(
            "You have been banned from {}. Reason: {}. Duration: {}.",
            target.name, record.reason, record.expiry_display
        );
        if let Err(e) = self.client.send_direct_message(record.subject_id, &text).await {
            debug!("Could not notify {} before ban: {}", record.subject_id, e);
        }
    }

    /// Lift a ban on every live target. An already-absent ban counts as lifted.
    pub(crate) async fn lift_everywhere(&self, live: &[Target], subject: SubjectId) -> Tally {
        let mut tally = Tally::default();
        for target in live {
            let result = match self.client.unban(target.id, subject).await {
                Ok(()) => Ok(TargetOutcome::Applied),
                Err(ClientError::NotFound) => Ok(TargetOutcome::AlreadyEnforced),
                Err(e) => Err(FailureKind::from(e)),
            };
            tally.record(target, result);
        }
        tally
    }

    /// Unban a subject everywhere. The record is removed only if every live
    /// target confirmed.
    pub async fn apply_unban(&self, subject: SubjectId) -> Result<UnbanOutcome> {
        let mut state = self.lock_state().await;
        let record = state
            .registry
            .get(subject)
            .cloned()
            .ok_or(Error::SubjectNotFound(subject))?;

        let (live, _) = self.live_targets(&mut state.targets).await?;
        let tally = self.lift_everywhere(&live, subject).await;

        let committed = tally.is_uniform();
        if committed {
            let mut next = state.registry.clone();
            next.remove(subject);
            self.storage.save_registry(&next)?;
            *state.registry = next;
        }
        drop(state);

        info!(
            "Unban of {} ({}): {}/{} targets, committed: {}",
            record.name, subject, tally.success_count, tally.target_count, committed
        );
        self.reporter.report(&failure_names(&tally.failures)).await;

        Ok(UnbanOutcome {
            record,
            tally,
            committed,
        })
    }

    /// Snapshot of the registry.
    pub async fn list_bans(&self) -> Vec<BanRecord> {
        self.registry.lock().await.iter().cloned().collect()
    }

    pub async fn get_ban(&self, subject: SubjectId) -> Option<BanRecord> {
        self.registry.lock().await.get(subject).cloned()
    }

    /// Synced targets that still resolve (stale ones are pruned).
    pub async fn list_targets(&self) -> Result<Vec<Target>> {
        let mut targets = self.targets.lock().await;
        let (live, _) = self.live_targets(&mut targets).await?;
        Ok(live)
    }

    /// Subscribe a guild and sync the global bans to it.
    ///
    /// A guild that is already synced is left alone and no pass runs.
    pub async fn add_target(&self, target: TargetRef) -> Result<AddTarget> {
        let resolved = self
            .client
            .resolve(target)
            .await?
            .ok_or(Error::TargetUnresolvable(target))?;

        {
            let mut targets = self.targets.lock().await;
            if targets.contains(target) {
                return Ok(AddTarget::AlreadySynced { target: resolved });
            }
            let mut next = targets.clone();
            next.insert(target);
            self.storage.save_targets(&next)?;
            *targets = next;
        }
        info!("Added {} ({}) to the synced targets", resolved.name, target);

        let report = self.reconcile().await?;
        Ok(AddTarget::Added {
            target: resolved,
            report,
        })
    }

    /// Unsubscribe a guild. Its existing bans are left in place.
    pub async fn remove_target(&self, target: TargetRef) -> Result<RemoveTarget> {
        let mut targets = self.targets.lock().await;
        if !targets.contains(target) {
            return Ok(RemoveTarget::NotSynced);
        }
        let mut next = targets.clone();
        next.remove(target);
        self.storage.save_targets(&next)?;
        *targets = next;

        info!("Removed {} from the synced targets", target);
        Ok(RemoveTarget::Removed)
    }
}
