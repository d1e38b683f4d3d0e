//! Remote community client.
//!
//! The engine never talks to a chat platform directly; it goes through
//! [`CommunityClient`]. [`MemoryClient`] is an in-process fleet used for
//! simulation runs and tests.

use crate::error::Error;
use crate::models::{ChannelRef, SubjectId, Target, TargetRef};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;

/// Failure of a single remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The guild rejected the action (missing ban permissions)
    #[error("missing permissions")]
    Forbidden,

    /// The guild, ban or user does not exist
    #[error("not found")]
    NotFound,

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

/// Operations the engine needs from the chat platform.
#[async_trait]
pub trait CommunityClient: Send + Sync {
    /// Every guild the bot is currently a member of.
    async fn list_guilds(&self) -> Result<Vec<TargetRef>, ClientError>;

    /// `Ok(None)` means the guild is gone. `Err` means the platform could not
    /// be asked, which says nothing about the guild.
    async fn resolve(&self, target: TargetRef) -> Result<Option<Target>, ClientError>;

    async fn list_bans(&self, target: TargetRef) -> Result<Vec<SubjectId>, ClientError>;

    async fn ban(
        &self,
        target: TargetRef,
        subject: SubjectId,
        reason: &str,
    ) -> Result<(), ClientError>;

    /// `NotFound` when the subject is not banned there.
    async fn unban(&self, target: TargetRef, subject: SubjectId) -> Result<(), ClientError>;

    async fn send_direct_message(
        &self,
        subject: SubjectId,
        text: &str,
    ) -> Result<(), ClientError>;

    async fn send_channel_message(
        &self,
        channel: ChannelRef,
        text: &str,
    ) -> Result<(), ClientError>;
}

#[derive(Debug, Clone)]
struct MemoryGuild {
    name: String,
    bans: BTreeSet<SubjectId>,
    forbidden: bool,
}

/// In-memory fleet of guilds.
#[derive(Debug, Default)]
pub struct MemoryClient {
    guilds: RwLock<BTreeMap<TargetRef, MemoryGuild>>,
    closed_dms: RwLock<HashSet<SubjectId>>,
    direct_messages: RwLock<Vec<(SubjectId, String)>>,
    channel_messages: RwLock<Vec<(ChannelRef, String)>>,
    ban_list_calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fleet from `(id, name)` pairs.
    pub fn with_guilds<I, S>(guilds: I) -> Self
    where
        I: IntoIterator<Item = (TargetRef, S)>,
        S: Into<String>,
    {
        let guilds = guilds
            .into_iter()
            .map(|(id, name)| {
                let guild = MemoryGuild {
                    name: name.into(),
                    bans: BTreeSet::new(),
                    forbidden: false,
                };
                (id, guild)
            })
            .collect();

        Self {
            guilds: RwLock::new(guilds),
            ..Self::default()
        }
    }

    /// Parse a fleet declaration like `"1:alpha,2:beta"`.
    pub fn parse_guilds(fleet: &str) -> crate::Result<Vec<(TargetRef, String)>> {
        fleet.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (id, name) = entry.split_once(':').ok_or_else(|| {
                    Error::InvalidInput(format!("guild entry {entry:?} is not id:name"))
                })?;
                Ok((id.parse::<TargetRef>()?, name.trim().to_string()))
            })
            .collect()
    }

    pub async fn add_guild(&self, id: TargetRef, name: impl Into<String>) {
        self.guilds.write().await.insert(
            id,
            MemoryGuild {
                name: name.into(),
                bans: BTreeSet::new(),
                forbidden: false,
            },
        );
    }

    /// Make a guild unreachable (the bot left it).
    pub async fn remove_guild(&self, id: TargetRef) {
        self.guilds.write().await.remove(&id);
    }

    /// Make every ban-related call on a guild fail with `Forbidden`.
    pub async fn set_forbidden(&self, id: TargetRef, forbidden: bool) {
        if let Some(guild) = self.guilds.write().await.get_mut(&id) {
            guild.forbidden = forbidden;
        }
    }

    /// Make guild lookups fail as if the platform were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make direct messages to a subject fail.
    pub async fn close_dms(&self, subject: SubjectId) {
        self.closed_dms.write().await.insert(subject);
    }

    /// Ban a subject locally, bypassing the permission check.
    pub async fn seed_ban(&self, id: TargetRef, subject: SubjectId) {
        if let Some(guild) = self.guilds.write().await.get_mut(&id) {
            guild.bans.insert(subject);
        }
    }

    pub async fn bans(&self, id: TargetRef) -> BTreeSet<SubjectId> {
        self.guilds
            .read()
            .await
            .get(&id)
            .map(|g| g.bans.clone())
            .unwrap_or_default()
    }

    pub async fn direct_messages(&self) -> Vec<(SubjectId, String)> {
        self.direct_messages.read().await.clone()
    }

    pub async fn channel_messages(&self) -> Vec<(ChannelRef, String)> {
        self.channel_messages.read().await.clone()
    }

    /// How many times a ban list has been fetched.
    pub fn ban_list_calls(&self) -> usize {
        self.ban_list_calls.load(Ordering::SeqCst)
    }

    async fn with_guild<T>(
        &self,
        id: TargetRef,
        f: impl FnOnce(&mut MemoryGuild) -> Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        let mut guilds = self.guilds.write().await;
        let guild = guilds.get_mut(&id).ok_or(ClientError::NotFound)?;
        if guild.forbidden {
            return Err(ClientError::Forbidden);
        }
        f(guild)
    }
}

#[async_trait]
impl CommunityClient for MemoryClient {
    async fn list_guilds(&self) -> Result<Vec<TargetRef>, ClientError> {
        Ok(self.guilds.read().await.keys().copied().collect())
    }

    async fn resolve(&self, target: TargetRef) -> Result<Option<Target>, ClientError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClientError::Unavailable("platform unreachable".to_string()));
        }
        Ok(self
            .guilds
            .read()
            .await
            .get(&target)
            .map(|g| Target::new(target, g.name.clone())))
    }

    async fn list_bans(&self, target: TargetRef) -> Result<Vec<SubjectId>, ClientError> {
        self.ban_list_calls.fetch_add(1, Ordering::SeqCst);
        self.with_guild(target, |g| Ok(g.bans.iter().copied().collect()))
            .await
    }

    async fn ban(
        &self,
        target: TargetRef,
        subject: SubjectId,
        _reason: &str,
    ) -> Result<(), ClientError> {
        self.with_guild(target, |g| {
            g.bans.insert(subject);
            Ok(())
        })
        .await
    }

    async fn unban(&self, target: TargetRef, subject: SubjectId) -> Result<(), ClientError> {
        self.with_guild(target, |g| {
            if g.bans.remove(&subject) {
                Ok(())
            } else {
                Err(ClientError::NotFound)
            }
        })
        .await
    }

    async fn send_direct_message(
        &self,
        subject: SubjectId,
        text: &str,
    ) -> Result<(), ClientError> {
        if self.closed_dms.read().await.contains(&subject) {
            return Err(ClientError::Forbidden);
        }
        self.direct_messages
            .write()
            .await
            .push((subject, text.to_string()));
        Ok(())
    }

    async fn send_channel_message(
        &self,
        channel: ChannelRef,
        text: &str,
    ) -> Result<(), ClientError> {
        self.channel_messages
            .write()
            .await
            .push((channel, text.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_guilds() {
        let guilds = MemoryClient::parse_guilds("1:alpha, 2:beta gamma,").unwrap();
        assert_eq!(
            guilds,
            vec![(TargetRef(1), "alpha".into()), (TargetRef(2), "beta gamma".into())]
        );
        assert!(MemoryClient::parse_guilds("x:alpha").is_err());
        assert!(MemoryClient::parse_guilds("1").is_err());
    }

    #[tokio::test]
    async fn forbidden_guild_rejects_everything() {
        let client = MemoryClient::with_guilds([(TargetRef(1), "a")]);
        client.set_forbidden(TargetRef(1), true).await;

        assert_eq!(client.list_bans(TargetRef(1)).await, Err(ClientError::Forbidden));
        assert_eq!(
            client.ban(TargetRef(1), SubjectId(9), "x").await,
            Err(ClientError::Forbidden)
        );
        // Still resolvable: forbidden is not the same as gone.
        assert!(client.resolve(TargetRef(1)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unavailable_is_not_gone() {
        let client = MemoryClient::with_guilds([(TargetRef(1), "alpha")]);
        client.set_unavailable(true);
        assert!(matches!(
            client.resolve(TargetRef(1)).await,
            Err(ClientError::Unavailable(_))
        ));
        client.set_unavailable(false);
        assert!(client.resolve(TargetRef(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unban_of_absent_ban_is_not_found() {
        let client = MemoryClient::with_guilds([(TargetRef(1), "a")]);
        assert_eq!(
            client.unban(TargetRef(1), SubjectId(9)).await,
            Err(ClientError::NotFound)
        );

        client.ban(TargetRef(1), SubjectId(9), "x").await.unwrap();
        assert!(client.unban(TargetRef(1), SubjectId(9)).await.is_ok());
        assert!(client.bans(TargetRef(1)).await.is_empty());
    }
}
