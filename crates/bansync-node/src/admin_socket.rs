//! Unix socket server for admin commands.
//!
//! Provides a local IPC interface for banning, unbanning and managing the
//! synced targets. One JSON command per line in, one JSON response per line
//! out. Every failure is turned into an `error` response here; nothing
//! escapes the connection task.

use crate::engine::{AddTarget, BanEngine, BanRequest, RemoveTarget};
use crate::error::Result;
use crate::models::{Cadence, ChannelRef, SubjectId, TargetRef};
use crate::scheduler::ScheduleHandle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Admin command sent over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum AdminCommand {
    /// Ban a user from every synced server
    Ban {
        subject_id: SubjectId,
        name: String,
        #[serde(default)]
        reason: Option<String>,
        duration: String,
    },
    /// Lift a global ban
    Unban { subject_id: SubjectId },
    /// Run a reconciliation pass now
    Sync,
    /// List all global bans
    ListBans,
    /// List the synced servers
    ListTargets,
    /// Add a server to the synced list
    AddTarget { target: TargetRef },
    /// Remove a server from the synced list
    RemoveTarget { target: TargetRef },
    /// Change the automatic sync cadence
    Reschedule {
        cadence: Cadence,
        #[serde(default)]
        notify_channel: Option<ChannelRef>,
    },
    /// Ping (health check)
    Ping,
}

/// Response from admin command.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdminResponse {
    Ok { message: String },
    Error { error: String },
    List { items: Vec<String> },
    Pong,
}

impl<T: Into<String>> From<Result<T>> for AdminResponse {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(message) => AdminResponse::Ok {
                message: message.into(),
            },
            Err(e) => AdminResponse::Error {
                error: e.to_string(),
            },
        }
    }
}

/// Admin socket server.
pub struct AdminSocket {
    engine: Arc<BanEngine>,
    schedule: ScheduleHandle,
    socket_path: String,
}

impl AdminSocket {
    /// Create a new admin socket server.
    pub fn new(engine: Arc<BanEngine>, schedule: ScheduleHandle, socket_path: &str) -> Self {
        Self {
            engine,
            schedule,
            socket_path: socket_path.to_string(),
        }
    }

    /// Run the admin socket server.
    pub async fn run(&self) -> Result<()> {
        // Remove existing socket file if present
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!("Admin socket listening on {}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let engine = Arc::clone(&self.engine);
                    let schedule = self.schedule.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, engine, schedule).await {
                            tracing::error!("Admin connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept admin connection: {}", e);
                }
            }
        }
    }

    /// Get the socket path.
    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }
}

async fn handle_connection(
    stream: UnixStream,
    engine: Arc<BanEngine>,
    schedule: ScheduleHandle,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<AdminCommand>(&line) {
            Ok(cmd) => execute_command(cmd, &engine, &schedule).await,
            Err(e) => AdminResponse::Error {
                error: format!("Invalid command: {}", e),
            },
        };

        let response_json = serde_json::to_string(&response)? + "\n";
        writer.write_all(response_json.as_bytes()).await?;
        line.clear();
    }

    Ok(())
}

pub(crate) async fn execute_command(
    cmd: AdminCommand,
    engine: &BanEngine,
    schedule: &ScheduleHandle,
) -> AdminResponse {
    match cmd {
        AdminCommand::Ban {
            subject_id,
            name,
            reason,
            duration,
        } => {
            tracing::info!("Admin: ban {} ({}) for {}", name, subject_id, duration);
            let request = BanRequest {
                subject_id,
                name,
                reason,
                duration,
            };
            engine
                .apply_ban(request)
                .await
                .map(|outcome| outcome.summary())
                .into()
        }

        AdminCommand::Unban { subject_id } => {
            tracing::info!("Admin: unban {}", subject_id);
            engine
                .apply_unban(subject_id)
                .await
                .map(|outcome| outcome.summary())
                .into()
        }

        AdminCommand::Sync => engine
            .reconcile()
            .await
            .map(|_| "Done. If there is any error, the owner has been notified.")
            .into(),

        AdminCommand::ListBans => AdminResponse::List {
            items: engine
                .list_bans()
                .await
                .iter()
                .map(ToString::to_string)
                .collect(),
        },

        AdminCommand::ListTargets => match engine.list_targets().await {
            Ok(targets) => AdminResponse::List {
                items: targets
                    .into_iter()
                    .map(|t| format!("{} ({})", t.name, t.id))
                    .collect(),
            },
            Err(e) => AdminResponse::Error {
                error: e.to_string(),
            },
        },

        AdminCommand::AddTarget { target } => engine
            .add_target(target)
            .await
            .map(|outcome| match outcome {
                AddTarget::Added { target, report } => format!(
                    "The server, {}, has been added to the synced server list. \
                     {} global bans were synced to it.",
                    target.name, report.applied
                ),
                AddTarget::AlreadySynced { target } => {
                    format!("The server, {}, is already in the synced list.", target.name)
                }
            })
            .into(),

        AdminCommand::RemoveTarget { target } => engine
            .remove_target(target)
            .await
            .map(|outcome| match outcome {
                RemoveTarget::Removed => {
                    format!("The server {target} has been removed from the synced server list.")
                }
                RemoveTarget::NotSynced => "This server is not in the synced list.".to_string(),
            })
            .into(),

        AdminCommand::Reschedule {
            cadence,
            notify_channel,
        } => schedule.reschedule(cadence, notify_channel).await.into(),

        AdminCommand::Ping => AdminResponse::Pong,
    }
}
