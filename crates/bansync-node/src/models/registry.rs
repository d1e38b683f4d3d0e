//! The global ban registry.

use super::ban::{BanRecord, SubjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Authoritative mapping of banned subject → ban record.
///
/// A subject present here should be banned on every live target. Enforcement
/// is eventual: reconciliation passes close the gap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Registry {
    bans: BTreeMap<SubjectId, BanRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bans.is_empty()
    }

    pub fn get(&self, subject: SubjectId) -> Option<&BanRecord> {
        self.bans.get(&subject)
    }

    pub fn contains(&self, subject: SubjectId) -> bool {
        self.bans.contains_key(&subject)
    }

    /// Insert or replace the record for its subject.
    pub fn insert(&mut self, record: BanRecord) -> Option<BanRecord> {
        self.bans.insert(record.subject_id, record)
    }

    pub fn remove(&mut self, subject: SubjectId) -> Option<BanRecord> {
        self.bans.remove(&subject)
    }

    /// Records in subject order.
    pub fn iter(&self) -> impl Iterator<Item = &BanRecord> {
        self.bans.values()
    }

    pub fn subject_ids(&self) -> impl Iterator<Item = SubjectId> + '_ {
        self.bans.keys().copied()
    }

    /// Temporary bans whose expiry is at or before `now`.
    pub fn expired(&self, now: DateTime<Utc>) -> Vec<BanRecord> {
        self.iter().filter(|r| r.is_expired(now)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bansync_duration::{parse, Lifetime};

    fn record(id: u64, lifetime: &Lifetime, now: DateTime<Utc>) -> BanRecord {
        BanRecord::new(SubjectId(id), format!("user{id}"), None, lifetime, now).unwrap()
    }

    #[test]
    fn insert_replaces_by_subject() {
        let now = Utc::now();
        let mut registry = Registry::new();
        assert!(registry.insert(record(1, &Lifetime::Permanent, now)).is_none());
        assert!(registry.insert(record(1, &parse("1D").unwrap(), now)).is_some());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(SubjectId(1)).unwrap().expiry_display, "1 day");
    }

    #[test]
    fn expired_only_returns_passed_temporaries() {
        let then: DateTime<Utc> = "2024-01-01T00:00:00Z".parse().unwrap();
        let mut registry = Registry::new();
        registry.insert(record(1, &Lifetime::Permanent, then));
        registry.insert(record(2, &parse("1H").unwrap(), then));
        registry.insert(record(3, &parse("1Y").unwrap(), then));

        let later: DateTime<Utc> = "2024-01-02T00:00:00Z".parse().unwrap();
        let expired: Vec<_> = registry.expired(later).into_iter().map(|r| r.subject_id).collect();
        assert_eq!(expired, vec![SubjectId(2)]);
    }

    #[test]
    fn json_uses_subject_keys() {
        let mut registry = Registry::new();
        registry.insert(record(7, &Lifetime::Permanent, Utc::now()));

        let json = serde_json::to_string(&registry).unwrap();
        assert!(json.starts_with("{\"7\":"));
        let back: Registry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, registry);
    }
}
