//! Music settings read from the Biggs configuration.

use std::path::PathBuf;

use crate::supervisor::SupervisorConfig;

const DEFAULT_EXECUTABLE: &str = "java";
const DEFAULT_DIRECTORY: &str = "./lavalink";
const DEFAULT_ARGS: &str = "-jar ./Lavalink.jar";
const DEFAULT_READY_MARKER: &str = r" lavalink.server.Launcher\s+: Started Launcher";
const DEFAULT_NODE_CONFIG: &str = "./lavalink/application.yml";
const DEFAULT_CLIENT_NAME: &str = "biggs";
const DEFAULT_VOLUME: usize = 40;
const DEFAULT_PAGE_SIZE: usize = 10;
const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Player-facing tunables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MusicSettings {
    pub default_volume: u16,
    pub page_size: usize,
    pub search_limit: usize,
    pub command_prefix: String,
}

impl Default for MusicSettings {
    fn default() -> Self {
        Self {
            default_volume: DEFAULT_VOLUME as u16,
            page_size: DEFAULT_PAGE_SIZE,
            search_limit: DEFAULT_SEARCH_LIMIT,
            command_prefix: "$".to_string(),
        }
    }
}

/// Extension trait for `biggsconfig::Config`.
pub trait MusicConfigExt {
    fn supervisor_config(&self) -> SupervisorConfig;

    /// Path of the backend's `application.yml`. Relative paths are taken
    /// from the working directory, like the backend directory.
    fn node_config_path(&self) -> PathBuf;

    fn node_client_name(&self) -> String;

    /// Bot account id sent in the node handshake.
    fn node_user_id(&self) -> u64;

    fn music_settings(&self) -> MusicSettings;
}

impl MusicConfigExt for biggsconfig::Config {
    fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            executable: PathBuf::from(
                self.get_string_or(&["music", "backend", "executable"], DEFAULT_EXECUTABLE),
            ),
            directory: PathBuf::from(
                self.get_string_or(&["music", "backend", "directory"], DEFAULT_DIRECTORY),
            ),
            args: self.get_string_or(&["music", "backend", "args"], DEFAULT_ARGS),
            ready_marker: self
                .get_string_or(&["music", "backend", "ready_marker"], DEFAULT_READY_MARKER),
        }
    }

    fn node_config_path(&self) -> PathBuf {
        PathBuf::from(self.get_string_or(&["music", "node", "config_file"], DEFAULT_NODE_CONFIG))
    }

    fn node_client_name(&self) -> String {
        self.get_string_or(&["music", "node", "client_name"], DEFAULT_CLIENT_NAME)
    }

    fn node_user_id(&self) -> u64 {
        self.get_u64_or(&["music", "node", "user_id"], 0)
    }

    fn music_settings(&self) -> MusicSettings {
        let volume = self.get_player_default_volume().unwrap_or(DEFAULT_VOLUME);
        MusicSettings {
            default_volume: crate::controller::clamp_volume(volume.min(i64::MAX as usize) as i64),
            page_size: self
                .get_player_page_size()
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .max(1),
            search_limit: self
                .get_player_search_limit()
                .unwrap_or(DEFAULT_SEARCH_LIMIT)
                .clamp(1, crate::search::MAX_CANDIDATES),
            command_prefix: self
                .get_command_prefix()
                .unwrap_or_else(|_| MusicSettings::default().command_prefix),
        }
    }
}
