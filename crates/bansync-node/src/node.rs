//! Ban sync node - the main application entry point.
//!
//! Architecture:
//! - Single daemon process with shared RocksDB storage
//! - Scheduled reconciliation plus a short-interval expiry sweeper
//! - Unix admin socket for operator commands (bansync-admin CLI)
//! - Read-only HTTP status API

use crate::admin_socket::AdminSocket;
use crate::api::{self, ApiState};
use crate::client::{CommunityClient, MemoryClient};
use crate::contact::{AdminContact, DirectMessageContact, FailureReporter, TracingContact};
use crate::engine::BanEngine;
use crate::error::{Error, Result};
use crate::models::{SubjectId, TargetRef};
use crate::scheduler::{Scheduler, SystemClock};
use crate::storage::Storage;
use crate::sweeper::ExpirySweeper;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a ban sync node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Data directory for storage
    pub data_dir: PathBuf,

    /// HTTP API listen address
    pub api_addr: SocketAddr,

    /// Admin socket path (for bansync-admin CLI)
    pub admin_socket: PathBuf,

    /// Who receives failure reports. Unset means they only go to the log.
    pub owner_id: Option<SubjectId>,

    pub sweep_interval: Duration,

    /// Simulated fleet for the in-memory client
    pub guilds: Vec<(TargetRef, String)>,
}

fn env_or<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse()
        .map_err(|e| Error::InvalidInput(format!("{key}={raw}: {e}")))
}

impl NodeConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        let data_dir = PathBuf::from(
            std::env::var("BANSYNC_DATA_DIR").unwrap_or_else(|_| "./bansync-data".to_string()),
        );

        let api_addr = env_or("BANSYNC_API_ADDR", "127.0.0.1:8080")?;

        let admin_socket = std::env::var("BANSYNC_ADMIN_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("admin.sock"));

        let owner_id = match std::env::var("BANSYNC_OWNER_ID") {
            Ok(raw) if !raw.trim().is_empty() => Some(raw.parse::<SubjectId>()?),
            _ => None,
        };

        let sweep_secs: u64 = env_or(
            "BANSYNC_SWEEP_INTERVAL_SECS",
            &ExpirySweeper::DEFAULT_INTERVAL.as_secs().to_string(),
        )?;
        if sweep_secs == 0 {
            return Err(Error::InvalidInput(
                "BANSYNC_SWEEP_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }

        let guilds = match std::env::var("BANSYNC_GUILDS") {
            Ok(fleet) => MemoryClient::parse_guilds(&fleet)?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            data_dir,
            api_addr,
            admin_socket,
            owner_id,
            sweep_interval: Duration::from_secs(sweep_secs),
            guilds,
        })
    }
}

/// A ban sync node instance.
pub struct BanSyncNode {
    engine: Arc<BanEngine>,
    config: NodeConfig,
}

impl BanSyncNode {
    /// Open storage and load the engine state.
    pub async fn new(config: NodeConfig, client: Arc<dyn CommunityClient>) -> Result<Self> {
        // Ensure data directory exists
        std::fs::create_dir_all(&config.data_dir)?;

        let storage = Arc::new(Storage::open(&config.data_dir)?);

        let contact: Arc<dyn AdminContact> = match config.owner_id {
            Some(owner) => Arc::new(DirectMessageContact::new(Arc::clone(&client), owner)),
            None => {
                tracing::warn!("BANSYNC_OWNER_ID not set; failure reports go to the log only");
                Arc::new(TracingContact)
            }
        };

        let engine = BanEngine::open(client, storage, FailureReporter::new(contact)).await?;

        Ok(Self {
            engine: Arc::new(engine),
            config,
        })
    }

    pub fn engine(&self) -> Arc<BanEngine> {
        Arc::clone(&self.engine)
    }

    /// Run the node (scheduler, sweeper, admin socket and HTTP server).
    pub async fn run(self) -> Result<()> {
        tracing::info!("Ban sync node starting");
        tracing::info!("  API: http://{}", self.config.api_addr);
        tracing::info!("  Admin: {:?}", self.config.admin_socket);
        tracing::info!("  Data: {:?}", self.config.data_dir);

        let schedule = self.engine.storage().load_schedule()?.unwrap_or_default();
        tracing::info!("  Schedule: {}", schedule.cadence);

        let (scheduler, schedule_handle) =
            Scheduler::new(self.engine(), Arc::new(SystemClock), schedule);
        tokio::spawn(scheduler.run());

        let sweeper = ExpirySweeper::new(self.engine(), self.config.sweep_interval);
        tokio::spawn(sweeper.run());

        let socket_path = self.config.admin_socket.to_string_lossy().into_owned();
        let admin_socket = AdminSocket::new(self.engine(), schedule_handle.clone(), &socket_path);
        tokio::spawn(async move {
            if let Err(e) = admin_socket.run().await {
                tracing::error!("Admin socket error: {}", e);
            }
        });

        let app = api::build_router(ApiState {
            engine: self.engine(),
            schedule: schedule_handle,
        });

        let listener = tokio::net::TcpListener::bind(self.config.api_addr).await?;
        tracing::info!("HTTP server listening on {}", self.config.api_addr);

        axum::serve(listener, app).await?;

        Ok(())
    }
}
