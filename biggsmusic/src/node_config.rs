//! Node connection settings, read from the backend's own `application.yml`.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use crate::errors::{MusicError, Result};

#[derive(Debug, Deserialize)]
struct ApplicationFile {
    server: ServerSection,
    lavalink: LavalinkSection,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    address: String,
    port: u16,
}

#[derive(Debug, Deserialize)]
struct LavalinkSection {
    server: LavalinkServerSection,
}

#[derive(Debug, Deserialize)]
struct LavalinkServerSection {
    password: String,
}

/// Address and credentials of a rendering node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeConfig {
    pub address: String,
    pub port: u16,
    pub password: String,
}

impl NodeConfig {
    /// Reads the node file. A missing file is fatal for the music capability.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            error!(path = %path.display(), "node configuration missing");
            return Err(MusicError::MissingNodeConfig(path.display().to_string()));
        }
        let raw = fs::read_to_string(path)
            .map_err(|e| MusicError::InvalidNodeConfig(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_yaml(&raw)?;
        info!(address = %config.address, port = config.port, "node configuration loaded");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let file: ApplicationFile =
            serde_yaml::from_str(raw).map_err(|e| MusicError::InvalidNodeConfig(e.to_string()))?;
        Ok(Self {
            address: file.server.address,
            port: file.server.port,
            password: file.lavalink.server.password,
        })
    }

    pub fn rest_base(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }

    pub fn websocket_url(&self) -> String {
        format!("ws://{}:{}/v4/websocket", self.address, self.port)
    }
}
