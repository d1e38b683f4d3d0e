//! bansync-admin CLI tool
//!
//! Operator commands for a running bansync-node.
//!
//! Usage:
//!   bansync-admin ban <user_id> <name> <duration> [reason...]
//!   bansync-admin unban <user_id>
//!   bansync-admin sync
//!   bansync-admin list-bans
//!   bansync-admin list-targets
//!   bansync-admin add-target <server_id>
//!   bansync-admin remove-target <server_id>
//!   bansync-admin reschedule <daily|weekly|monthly> [channel_id]
//!   bansync-admin ping

use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

/// Admin command sent over the socket.
#[derive(Debug, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum AdminCommand {
    Ban {
        subject_id: u64,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        duration: String,
    },
    Unban { subject_id: u64 },
    Sync,
    ListBans,
    ListTargets,
    AddTarget { target: u64 },
    RemoveTarget { target: u64 },
    Reschedule {
        cadence: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        notify_channel: Option<u64>,
    },
    Ping,
}

/// Response from admin command.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum AdminResponse {
    Ok { message: String },
    Error { error: String },
    List { items: Vec<String> },
    Pong,
}

/// Shown in the usage text.
const DURATION_EXAMPLES: [&str; 2] = ["1W-2D", "12H-30N"];

fn print_usage() {
    eprintln!("bansync-admin - Manage the global ban list");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  bansync-admin ban <user_id> <name> <duration> [reason...]");
    eprintln!("                                          Ban a user from every synced server");
    eprintln!("  bansync-admin unban <user_id>           Lift a global ban");
    eprintln!("  bansync-admin sync                      Reconcile all servers now");
    eprintln!("  bansync-admin list-bans                 List global bans");
    eprintln!("  bansync-admin list-targets              List synced servers");
    eprintln!("  bansync-admin add-target <server_id>    Add a server to the synced list");
    eprintln!("  bansync-admin remove-target <server_id> Remove a server from the synced list");
    eprintln!("  bansync-admin reschedule <cadence> [channel_id]");
    eprintln!("                                          Sync daily, weekly or monthly");
    eprintln!("  bansync-admin ping                      Check if daemon is running");
    eprintln!();
    eprintln!(
        "Durations are <number><unit> tokens joined by '-', e.g. {}.",
        DURATION_EXAMPLES.join(" or ")
    );
    eprintln!("Units: Y=year M=month W=week D=day H=hour N=minute S=second.");
    eprintln!("Use / for a permanent ban.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  BANSYNC_SOCKET  Path to admin socket (default: ./bansync-data/admin.sock)");
}

fn get_socket_path() -> PathBuf {
    std::env::var("BANSYNC_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./bansync-data/admin.sock"))
}

fn send_command(cmd: AdminCommand) -> Result<AdminResponse, String> {
    let socket_path = get_socket_path();

    let mut stream = UnixStream::connect(&socket_path).map_err(|e| {
        format!(
            "Failed to connect to bansync-node at {:?}: {}\n\
             Is the bansync-node running?",
            socket_path, e
        )
    })?;

    // Send command
    let cmd_json = serde_json::to_string(&cmd).map_err(|e| e.to_string())?;
    writeln!(stream, "{}", cmd_json).map_err(|e| e.to_string())?;

    // Read response
    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader
        .read_line(&mut response_line)
        .map_err(|e| e.to_string())?;

    serde_json::from_str(&response_line).map_err(|e| format!("Invalid response: {}", e))
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

/// The `index`th argument, or exit naming what `command` needed.
fn arg<'a>(args: &'a [String], index: usize, command: &str, what: &str) -> &'a str {
    match args.get(index) {
        Some(value) => value,
        None => fail(&format!("{} requires a {} argument", command, what)),
    }
}

fn id_arg(args: &[String], index: usize, command: &str, what: &str) -> u64 {
    let raw = arg(args, index, command, what);
    raw.parse()
        .unwrap_or_else(|_| fail(&format!("{} must be a number, got {:?}", what, raw)))
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let cmd = match args[1].as_str() {
        "ban" => {
            let subject_id = id_arg(&args, 2, "ban", "user_id");
            let name = arg(&args, 3, "ban", "name").to_string();
            let duration = arg(&args, 4, "ban", "duration").to_string();
            let reason = (args.len() > 5).then(|| args[5..].join(" "));
            AdminCommand::Ban {
                subject_id,
                name,
                reason,
                duration,
            }
        }
        "unban" => AdminCommand::Unban {
            subject_id: id_arg(&args, 2, "unban", "user_id"),
        },
        "sync" => AdminCommand::Sync,
        "list-bans" => AdminCommand::ListBans,
        "list-targets" => AdminCommand::ListTargets,
        "add-target" => AdminCommand::AddTarget {
            target: id_arg(&args, 2, "add-target", "server_id"),
        },
        "remove-target" => AdminCommand::RemoveTarget {
            target: id_arg(&args, 2, "remove-target", "server_id"),
        },
        "reschedule" => {
            let cadence = arg(&args, 2, "reschedule", "cadence").to_ascii_lowercase();
            if !matches!(cadence.as_str(), "daily" | "weekly" | "monthly") {
                fail("please use daily, weekly or monthly");
            }
            let notify_channel =
                (args.len() > 3).then(|| id_arg(&args, 3, "reschedule", "channel_id"));
            AdminCommand::Reschedule {
                cadence,
                notify_channel,
            }
        }
        "ping" => AdminCommand::Ping,
        "-h" | "--help" | "help" => {
            print_usage();
            std::process::exit(0);
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            std::process::exit(1);
        }
    };

    match send_command(cmd) {
        Ok(response) => match response {
            AdminResponse::Ok { message } => {
                println!("{}", message);
            }
            AdminResponse::Error { error } => fail(&error),
            AdminResponse::List { items } => {
                if items.is_empty() {
                    println!("(none)");
                } else {
                    for item in items {
                        println!("{}", item);
                    }
                }
            }
            AdminResponse::Pong => {
                println!("pong - bansync-node is running");
            }
        },
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
