//! Collaborators the session talks to: the social platform the game is
//! played on and the renderer producing the images attached to posts.

use crate::party::Step;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message that mentions the game account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub id: String,
    pub author_handle: String,
    pub text: String,
    pub in_reply_to: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SocialPlatform: Send + Sync {
    /// Post a message, returning its id
    async fn publish(
        &self,
        text: &str,
        image: Option<Vec<u8>>,
        in_reply_to: Option<&str>,
    ) -> Result<String>;

    /// Replies/mentions newer than `message_id`, oldest first
    async fn fetch_replies_since(&self, message_id: &str) -> Result<Vec<Reply>>;

    /// Re-share someone else's message (used to celebrate a winner)
    async fn repost(&self, message_id: &str) -> Result<()>;
}

/// Draws a list of steps as an image (PNG bytes).
pub trait ImageRenderer: Send + Sync {
    fn render(&self, steps: &[Step]) -> Result<Vec<u8>>;
}
