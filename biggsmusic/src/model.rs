use std::fmt;
use std::time::Duration;

/// A chat-platform destination with its own playback state (a guild).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub u64);

/// Text or voice channel inside a room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A playable media reference, immutable once resolved by the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    /// Opaque backend handle used to start playback.
    pub encoded: String,
    pub identifier: String,
    pub title: String,
    pub author: String,
    pub uri: Option<String>,
    /// `None` for live streams.
    pub length: Option<Duration>,
    /// Query that produced this track.
    pub query: String,
}

impl Track {
    pub fn is_stream(&self) -> bool {
        self.length.is_none()
    }
}

/// Reference to a message posted in a channel, kept so it can be removed later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub channel: ChannelId,
    pub id: u64,
}

/// Voice handshake data forwarded from the chat platform to the node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoiceState {
    pub token: String,
    pub endpoint: String,
    pub session_id: String,
}

/// Live per-room player state held by a node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlayerState {
    /// Voice channel the room is attached to.
    pub channel: Option<ChannelId>,
    pub position: Duration,
    /// Voice transport established on the node side.
    pub voice_connected: bool,
}

/// Asynchronous notifications coming from a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeEvent {
    TrackStarted { room: RoomId, title: String },
    TrackEnded { room: RoomId, reason: String },
    TrackErrored { room: RoomId, message: String },
    PlayerUpdated { room: RoomId, position: Duration, connected: bool },
    VoiceClosed { room: RoomId, code: u16, reason: String },
}

impl NodeEvent {
    pub fn room(&self) -> RoomId {
        match self {
            NodeEvent::TrackStarted { room, .. }
            | NodeEvent::TrackEnded { room, .. }
            | NodeEvent::TrackErrored { room, .. }
            | NodeEvent::PlayerUpdated { room, .. }
            | NodeEvent::VoiceClosed { room, .. } => *room,
        }
    }

    /// Errors advance the queue exactly like a normal end.
    pub fn completes_track(&self) -> bool {
        matches!(
            self,
            NodeEvent::TrackEnded { .. } | NodeEvent::TrackErrored { .. }
        )
    }
}

/// Outcome of resolving a query against the backend.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadedTracks {
    /// Set when a direct reference expanded to a playlist.
    pub playlist: Option<String>,
    pub tracks: Vec<Track>,
}

impl LoadedTracks {
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
