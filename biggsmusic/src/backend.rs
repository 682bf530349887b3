//! Seam between the room controllers and the rendering node.

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::errors::Result;
use crate::model::{ChannelId, LoadedTracks, NodeEvent, PlayerState, RoomId, Track, VoiceState};

/// Control and event protocol of a rendering node.
///
/// Every control call is a request/acknowledgement pair. A call made while
/// no node is attached fails with `MusicError::NodeUnavailable`; callers
/// surface it, nothing here retries.
#[async_trait]
pub trait PlaybackBackend: Send + Sync {
    /// Resolves a backend identifier (URL or `ytsearch:` query) into tracks,
    /// in backend ranking order. May be empty.
    async fn search(&self, identifier: &str) -> Result<LoadedTracks>;

    async fn play(&self, room: RoomId, track: &Track) -> Result<()>;

    /// Stops the current track; the node answers with a track-ended event.
    async fn stop(&self, room: RoomId) -> Result<()>;

    async fn set_volume(&self, room: RoomId, volume: u16) -> Result<()>;

    async fn set_paused(&self, room: RoomId, paused: bool) -> Result<()>;

    async fn connect(&self, room: RoomId, channel: ChannelId) -> Result<()>;

    /// Hands the platform voice handshake over to the node.
    async fn update_voice(&self, room: RoomId, voice: VoiceState) -> Result<()>;

    async fn disconnect(&self, room: RoomId) -> Result<()>;

    fn player_state(&self, room: RoomId) -> Option<PlayerState>;

    fn is_connected(&self, room: RoomId) -> bool {
        self.player_state(room)
            .map(|state| state.channel.is_some())
            .unwrap_or(false)
    }

    /// New receiver of track-started / ended / errored notifications.
    fn subscribe(&self) -> UnboundedReceiver<NodeEvent>;
}
