//! Ban records.

use crate::error::{Error, Result};
use bansync_duration::{Lifetime, ParseError};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reason recorded when the operator gives none.
pub const DEFAULT_REASON: &str = "Not Given";

/// A user identifier (snowflake).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub u64);

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SubjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        super::parse_snowflake(s, "user id").map(Self)
    }
}

/// When a ban stops applying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "at", rename_all = "snake_case")]
pub enum Expiry {
    Forever,
    At(DateTime<Utc>),
}

impl Expiry {
    /// Resolve a parsed lifetime against `now`.
    pub fn from_lifetime(lifetime: &Lifetime, now: DateTime<Utc>) -> Result<Self> {
        match lifetime {
            Lifetime::Permanent => Ok(Expiry::Forever),
            Lifetime::Limited(d) => i64::try_from(d.total_seconds())
                .ok()
                .and_then(TimeDelta::try_seconds)
                .and_then(|delta| now.checked_add_signed(delta))
                .map(Expiry::At)
                .ok_or(Error::MalformedDuration(ParseError::Overflow)),
        }
    }

    /// True once the expiry instant is at or before `now`. Never true for `Forever`.
    pub fn has_passed(&self, now: DateTime<Utc>) -> bool {
        match self {
            Expiry::Forever => false,
            Expiry::At(at) => *at <= now,
        }
    }
}

/// A globally banned subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanRecord {
    pub subject_id: SubjectId,

    /// Name at the time of the ban
    pub name: String,

    pub reason: String,

    pub expires: Expiry,

    /// "Forever" or the spelled-out duration, e.g. "2 days and 3 hours"
    pub expiry_display: String,

    pub banned_at: DateTime<Utc>,
}

impl BanRecord {
    /// Build a record for a ban issued at `now`.
    pub fn new(
        subject_id: SubjectId,
        name: String,
        reason: Option<String>,
        lifetime: &Lifetime,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REASON.to_string());

        Ok(Self {
            subject_id,
            name,
            reason,
            expires: Expiry::from_lifetime(lifetime, now)?,
            expiry_display: lifetime.display().to_string(),
            banned_at: now,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.has_passed(now)
    }

    pub fn is_permanent(&self) -> bool {
        self.expires == Expiry::Forever
    }
}

impl fmt::Display for BanRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) - reason: {} - duration: {}",
            self.name, self.subject_id, self.reason, self.expiry_display
        )
    }
}
