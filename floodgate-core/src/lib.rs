use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single item from the community's new-submission stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub author: String,
    /// Creation time as unix seconds, as reported by the platform.
    pub created_utc: u64,
}

/// A private message from the moderator-command stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxMessage {
    pub id: String,
    pub sender: String,
    pub subject: String,
    pub body: String,
}

/// Moderation calls the action dispatcher issues against the platform.
///
/// Implemented by the Reddit client; dispatcher tests substitute a
/// recording mock. All three calls require moderator capability on the
/// target community.
#[async_trait]
pub trait ModerationActions: Send + Sync {
    /// Remove a post, attaching a moderator-visible note.
    async fn remove_post(&self, post_id: &str, note: &str) -> anyhow::Result<()>;

    /// File a report against a post with the given reason.
    async fn report_post(&self, post_id: &str, reason: &str) -> anyhow::Result<()>;

    /// Send one message to the moderation team.
    async fn send_modmail(&self, subject: &str, body: &str) -> anyhow::Result<()>;
}
