//! Wire types of the Lavalink v4 API.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{MusicError, Result};
use crate::model::{LoadedTracks, NodeEvent, RoomId, Track, VoiceState};

/// Messages pushed by the node over the websocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "op")]
pub enum Incoming {
    #[serde(rename = "ready", rename_all = "camelCase")]
    Ready { resumed: bool, session_id: String },
    #[serde(rename = "playerUpdate", rename_all = "camelCase")]
    PlayerUpdate { guild_id: String, state: PlayerUpdateState },
    #[serde(rename = "event")]
    Event(LavalinkEvent),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct PlayerUpdateState {
    /// Milliseconds into the current track.
    #[serde(default)]
    pub position: u64,
    #[serde(default)]
    pub connected: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum LavalinkEvent {
    TrackStartEvent {
        guild_id: String,
        track: TrackData,
    },
    TrackEndEvent {
        guild_id: String,
        reason: String,
    },
    TrackExceptionEvent {
        guild_id: String,
        exception: TrackException,
    },
    TrackStuckEvent {
        guild_id: String,
        threshold_ms: u64,
    },
    WebSocketClosedEvent {
        guild_id: String,
        code: u16,
        reason: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct TrackException {
    pub message: Option<String>,
    pub severity: String,
    #[serde(default)]
    pub cause: String,
}

impl TrackException {
    fn describe(&self) -> String {
        match &self.message {
            Some(message) => message.clone(),
            None => format!("{} ({})", self.cause, self.severity),
        }
    }
}

fn parse_room(guild_id: &str) -> Option<RoomId> {
    guild_id.parse().ok().map(RoomId)
}

impl LavalinkEvent {
    /// Maps a node event onto the room-level event stream.
    ///
    /// `loadFailed` and `replaced` end events are dropped: the first always
    /// follows an exception event that already completed the track, the
    /// second belongs to a track that is no longer current.
    pub fn into_node_event(self) -> Option<NodeEvent> {
        match self {
            LavalinkEvent::TrackStartEvent { guild_id, track } => Some(NodeEvent::TrackStarted {
                room: parse_room(&guild_id)?,
                title: track.info.title,
            }),
            LavalinkEvent::TrackEndEvent { guild_id, reason } => match reason.as_str() {
                "loadFailed" | "replaced" => None,
                _ => Some(NodeEvent::TrackEnded {
                    room: parse_room(&guild_id)?,
                    reason,
                }),
            },
            LavalinkEvent::TrackExceptionEvent {
                guild_id,
                exception,
            } => Some(NodeEvent::TrackErrored {
                room: parse_room(&guild_id)?,
                message: exception.describe(),
            }),
            LavalinkEvent::TrackStuckEvent {
                guild_id,
                threshold_ms,
            } => Some(NodeEvent::TrackErrored {
                room: parse_room(&guild_id)?,
                message: format!("track stuck for {} ms", threshold_ms),
            }),
            LavalinkEvent::WebSocketClosedEvent {
                guild_id,
                code,
                reason,
            } => Some(NodeEvent::VoiceClosed {
                room: parse_room(&guild_id)?,
                code,
                reason,
            }),
            LavalinkEvent::Unknown => None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct TrackData {
    pub encoded: String,
    pub info: TrackInfo,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub identifier: String,
    #[serde(default)]
    pub author: String,
    /// Milliseconds; meaningless for streams.
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub is_stream: bool,
    pub title: String,
    pub uri: Option<String>,
}

impl TrackData {
    pub fn into_track(self, query: &str) -> Track {
        let length = if self.info.is_stream {
            None
        } else {
            Some(Duration::from_millis(self.info.length))
        };
        Track {
            encoded: self.encoded,
            identifier: self.info.identifier,
            title: self.info.title,
            author: self.info.author,
            uri: self.info.uri,
            length,
            query: query.to_string(),
        }
    }
}

/// Response of `GET /v4/loadtracks`. `data` is shaped by `load_type`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadResult {
    pub load_type: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
struct PlaylistData {
    info: PlaylistInfo,
    tracks: Vec<TrackData>,
}

#[derive(Debug, Deserialize)]
struct PlaylistInfo {
    name: String,
}

#[derive(Debug, Deserialize)]
struct LoadException {
    message: Option<String>,
    #[serde(default)]
    cause: String,
}

fn decode<T: for<'de> Deserialize<'de>>(data: Value) -> Result<T> {
    serde_json::from_value(data).map_err(|e| MusicError::BackendRequest(e.to_string()))
}

impl LoadResult {
    pub fn into_loaded(self, query: &str) -> Result<LoadedTracks> {
        match self.load_type.as_str() {
            "track" => {
                let track: TrackData = decode(self.data)?;
                Ok(LoadedTracks {
                    playlist: None,
                    tracks: vec![track.into_track(query)],
                })
            }
            "playlist" => {
                let playlist: PlaylistData = decode(self.data)?;
                Ok(LoadedTracks {
                    playlist: Some(playlist.info.name),
                    tracks: playlist
                        .tracks
                        .into_iter()
                        .map(|t| t.into_track(query))
                        .collect(),
                })
            }
            "search" => {
                let tracks: Vec<TrackData> = decode(self.data)?;
                Ok(LoadedTracks {
                    playlist: None,
                    tracks: tracks.into_iter().map(|t| t.into_track(query)).collect(),
                })
            }
            "empty" => Ok(LoadedTracks::default()),
            "error" => {
                let exception: LoadException = decode(self.data)?;
                Err(MusicError::BackendRequest(
                    exception.message.unwrap_or(exception.cause),
                ))
            }
            other => Err(MusicError::BackendRequest(format!(
                "unknown load type {}",
                other
            ))),
        }
    }
}

/// Body of `PATCH /v4/sessions/{session}/players/{guild}`.
#[derive(Debug, Default, Serialize)]
pub struct UpdatePlayer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<UpdateTrack>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceBody>,
}

/// `encoded: null` stops the player.
#[derive(Debug, Serialize)]
pub struct UpdateTrack {
    pub encoded: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceBody {
    pub token: String,
    pub endpoint: String,
    pub session_id: String,
}

impl From<VoiceState> for VoiceBody {
    fn from(voice: VoiceState) -> Self {
        Self {
            token: voice.token,
            endpoint: voice.endpoint,
            session_id: voice.session_id,
        }
    }
}

impl UpdatePlayer {
    pub fn play(encoded: &str) -> Self {
        Self {
            track: Some(UpdateTrack {
                encoded: Some(encoded.to_string()),
            }),
            paused: Some(false),
            ..Default::default()
        }
    }

    pub fn stop() -> Self {
        Self {
            track: Some(UpdateTrack { encoded: None }),
            ..Default::default()
        }
    }

    pub fn volume(volume: u16) -> Self {
        Self {
            volume: Some(volume),
            ..Default::default()
        }
    }

    pub fn paused(paused: bool) -> Self {
        Self {
            paused: Some(paused),
            ..Default::default()
        }
    }

    pub fn voice(voice: VoiceState) -> Self {
        Self {
            voice: Some(voice.into()),
            ..Default::default()
        }
    }
}
