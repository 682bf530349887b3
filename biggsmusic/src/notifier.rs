//! Outbound messages to rooms.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::info;

use crate::errors::Result;
use crate::model::{ChannelId, MessageRef};

/// Message delivery owned by the chat platform layer.
#[async_trait]
pub trait RoomNotifier: Send + Sync {
    async fn send(&self, channel: ChannelId, text: &str) -> Result<MessageRef>;

    async fn delete(&self, message: &MessageRef) -> Result<()>;
}

/// Writes outgoing messages to the log; used when no chat platform is wired.
#[derive(Debug, Default)]
pub struct LogNotifier {
    next_id: AtomicU64,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomNotifier for LogNotifier {
    async fn send(&self, channel: ChannelId, text: &str) -> Result<MessageRef> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        info!(channel = %channel, message_id = id, "{}", text);
        Ok(MessageRef { channel, id })
    }

    async fn delete(&self, message: &MessageRef) -> Result<()> {
        info!(channel = %message.channel, message_id = message.id, "message deleted");
        Ok(())
    }
}
