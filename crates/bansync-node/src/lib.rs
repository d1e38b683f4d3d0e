//! Bansync Node - Global Ban List Reconciliation
//!
//! Keeps a fleet of guilds enforcing one authoritative ban list. Bans and
//! unbans are applied to every synced guild at once; a scheduled pass
//! re-applies the list to catch drift and a sweeper lifts temporary bans
//! once they expire.
//!
//! # Architecture
//!
//! - **Models**: Ban records, the registry, synced targets, schedule config
//! - **Storage**: RocksDB-backed persistent storage
//! - **Client**: The remote guild interface (and an in-memory fleet)
//! - **Engine**: Reconciliation, ban and unban operations
//! - **Sweeper / Scheduler**: Background loops driving the engine
//! - **API**: Read-only HTTP status endpoints
//! - **Admin Socket**: Unix socket for operator commands (bansync-admin CLI)
//!
//! # Example
//!
//! ```no_run
//! use bansync_node::{BanSyncNode, MemoryClient, NodeConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NodeConfig::from_env()?;
//!     let client = Arc::new(MemoryClient::with_guilds(config.guilds.clone()));
//!     let node = BanSyncNode::new(config, client).await?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

pub mod admin_socket;
pub mod api;
pub mod client;
pub mod contact;
pub mod engine;
pub mod error;
pub mod models;
pub mod node;
pub mod scheduler;
pub mod storage;
pub mod sweeper;

#[cfg(test)]
mod testing;

pub use client::{ClientError, CommunityClient, MemoryClient};
pub use contact::{AdminContact, FailureReporter};
pub use engine::{BanEngine, BanOutcome, BanRequest, PassReport, UnbanOutcome};
pub use error::{Error, Result};
pub use models::{BanRecord, Cadence, Registry, ScheduleConfig, SubjectId, Target, TargetRef};
pub use node::{BanSyncNode, NodeConfig};
pub use scheduler::{ScheduleHandle, Scheduler};
pub use storage::Storage;
pub use sweeper::{ExpirySweeper, SweepReport};
