//! Failure reporting to the administrative contact.
//!
//! Delivery is best-effort: a failed notification is logged and dropped.

use crate::client::{ClientError, CommunityClient};
use crate::models::SubjectId;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Somewhere to send operator notifications.
#[async_trait]
pub trait AdminContact: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), ClientError>;
}

/// Direct-messages the bot owner.
pub struct DirectMessageContact {
    client: Arc<dyn CommunityClient>,
    owner: SubjectId,
}

impl DirectMessageContact {
    pub fn new(client: Arc<dyn CommunityClient>, owner: SubjectId) -> Self {
        Self { client, owner }
    }
}

#[async_trait]
impl AdminContact for DirectMessageContact {
    async fn send(&self, text: &str) -> Result<(), ClientError> {
        self.client.send_direct_message(self.owner, text).await
    }
}

/// Writes notifications to the log. Used when no owner is configured.
pub struct TracingContact;

#[async_trait]
impl AdminContact for TracingContact {
    async fn send(&self, text: &str) -> Result<(), ClientError> {
        warn!("{}", text);
        Ok(())
    }
}

const FAILURE_HEADER: &str = "I have not been set up correctly. (Check that I can ban and unban members.)\n\
     The ban sync failed on these targets:\n";

/// Aggregates the targets that rejected a pass into one notification.
#[derive(Clone)]
pub struct FailureReporter {
    contact: Arc<dyn AdminContact>,
}

impl FailureReporter {
    pub fn new(contact: Arc<dyn AdminContact>) -> Self {
        Self { contact }
    }

    /// Numbered list of failed target names under a fixed header.
    pub fn format(failed: &[String]) -> String {
        let mut message = FAILURE_HEADER.to_string();
        for (number, name) in failed.iter().enumerate() {
            message.push_str(&format!("\n{}. {}", number + 1, name));
        }
        message
    }

    /// Send one notification for a pass. Does nothing when `failed` is empty.
    pub async fn report(&self, failed: &[String]) {
        if failed.is_empty() {
            return;
        }
        if let Err(e) = self.contact.send(&Self::format(failed)).await {
            warn!("Failed to notify admin contact about {} failed targets: {}", failed.len(), e);
        }
    }
}

/// Records every notification it is sent.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingContact {
    pub sent: tokio::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
#[async_trait]
impl AdminContact for RecordingContact {
    async fn send(&self, text: &str) -> Result<(), ClientError> {
        self.sent.lock().await.push(text.to_string());
        Ok(())
    }
}
