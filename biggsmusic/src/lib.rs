//! # biggsmusic
//!
//! Per-room music playback for the Biggs chat bot.
//!
//! A supervised Lavalink process renders the audio. Each room gets a
//! [`RoomController`] that plays its queue strictly one track at a time,
//! advancing when the node reports the current track ended or failed.
//! Keyword searches are kept per user in a [`SearchSessionStore`] until a
//! numeric reply picks a result.
//!
//! ```no_run
//! use std::sync::Arc;
//! use biggsmusic::{LogNotifier, MusicService};
//!
//! # async fn run() -> biggsmusic::Result<()> {
//! let config = biggsconfig::get_config();
//! let service = MusicService::start(&config, Arc::new(LogNotifier::new())).await?;
//! // feed chat messages to service.commands().handle_message(...)
//! service.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod commands;
pub mod config_ext;
pub mod controller;
pub mod errors;
pub mod events;
pub mod format;
pub mod lavalink;
pub mod model;
pub mod node_config;
pub mod notifier;
pub mod queue;
pub mod registry;
pub mod search;
pub mod service;
pub mod supervisor;

pub use backend::PlaybackBackend;
pub use commands::{Command, CommandContext, MusicCommands};
pub use config_ext::{MusicConfigExt, MusicSettings};
pub use controller::{ControllerSnapshot, RoomController, MAX_VOLUME};
pub use errors::{MusicError, Result};
pub use events::NodeEventBus;
pub use lavalink::LavalinkNode;
pub use model::{
    ChannelId, LoadedTracks, MessageRef, NodeEvent, PlayerState, RoomId, Track, UserId,
    VoiceState,
};
pub use node_config::NodeConfig;
pub use notifier::{LogNotifier, RoomNotifier};
pub use queue::{QueuePage, TrackQueue};
pub use registry::ControllerRegistry;
pub use search::{SearchSession, SearchSessionStore, Selection, SelectionMatcher};
pub use service::MusicService;
pub use supervisor::{BackendProcess, BackendStatus, SupervisorConfig};
