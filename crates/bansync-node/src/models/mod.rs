//! Data model for the global ban list.
//!
//! # Core Types
//!
//! - [`BanRecord`] - one globally banned subject
//! - [`Registry`] - the authoritative subject → record mapping
//! - [`TargetSet`] - ordered, duplicate-free list of synced guilds
//! - [`ScheduleConfig`] - cadence of automatic reconciliation
//!
//! # Identifiers
//!
//! - [`SubjectId`] - a user snowflake
//! - [`TargetRef`] - a guild snowflake
//! - [`ChannelRef`] - a channel snowflake

mod ban;
mod registry;
mod schedule;
mod target;

pub use ban::{BanRecord, Expiry, SubjectId, DEFAULT_REASON};
pub use registry::Registry;
pub use schedule::{Cadence, ChannelRef, ScheduleConfig};
pub use target::{Target, TargetRef, TargetSet};

/// Parse a numeric snowflake, naming the field on failure.
pub(crate) fn parse_snowflake(s: &str, what: &str) -> crate::Result<u64> {
    s.trim()
        .parse()
        .map_err(|_| crate::Error::InvalidInput(format!("{what} must be a number, got {s:?}")))
}
