use thiserror::Error;

#[derive(Error, Debug)]
pub enum MusicError {
    // Startup: the music capability cannot come up
    #[error("Node configuration file {0} is missing")]
    MissingNodeConfig(String),
    #[error("Invalid node configuration: {0}")]
    InvalidNodeConfig(String),
    #[error("Cannot start the rendering backend: {0}")]
    BackendSpawn(String),
    #[error("Rendering backend exited: {0}")]
    BackendExited(String),
    #[error("Configuration error: {0}")]
    Config(String),

    // Backend calls, surfaced to the command that issued them
    #[error("Node unavailable: {0}")]
    NodeUnavailable(String),
    #[error("Backend request failed: {0}")]
    BackendRequest(String),

    // Rejected before any state was touched
    #[error("{0}")]
    Validation(String),
    #[error("Please join a channel first...")]
    NotInVoiceChannel,

    // Empty-state answers
    #[error("I'm not playing anything...")]
    NothingPlaying,
    #[error("I'm not paused...")]
    NotPaused,
    #[error("There's nothing in the queue...")]
    QueueEmpty,
}

impl MusicError {
    pub fn validation(message: &str) -> Self {
        MusicError::Validation(message.to_string())
    }

    pub fn node_unavailable(message: &str) -> Self {
        MusicError::NodeUnavailable(message.to_string())
    }

    /// True for failures that leave the music capability unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MusicError::MissingNodeConfig(_)
                | MusicError::InvalidNodeConfig(_)
                | MusicError::BackendSpawn(_)
                | MusicError::BackendExited(_)
                | MusicError::Config(_)
        )
    }

    /// True for validation and empty-state answers, which are plain replies
    /// rather than failures.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            MusicError::Validation(_)
                | MusicError::NotInVoiceChannel
                | MusicError::NothingPlaying
                | MusicError::NotPaused
                | MusicError::QueueEmpty
        )
    }
}

pub type Result<T> = std::result::Result<T, MusicError>;
