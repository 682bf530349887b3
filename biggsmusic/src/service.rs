//! Wiring of the music capability.
//!
//! Startup order: rendering process, readiness, node configuration, node
//! registration, event dispatcher. Any failure along the way leaves the
//! capability down and is reported as fatal.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backend::PlaybackBackend;
use crate::commands::MusicCommands;
use crate::config_ext::{MusicConfigExt, MusicSettings};
use crate::errors::Result;
use crate::lavalink::LavalinkNode;
use crate::model::NodeEvent;
use crate::node_config::NodeConfig;
use crate::notifier::RoomNotifier;
use crate::registry::ControllerRegistry;
use crate::search::SearchSessionStore;
use crate::supervisor::BackendProcess;

pub struct MusicService {
    process: Option<BackendProcess>,
    node: Option<Arc<LavalinkNode>>,
    backend: Arc<dyn PlaybackBackend>,
    registry: Arc<ControllerRegistry>,
    sessions: Arc<SearchSessionStore>,
    commands: Arc<MusicCommands>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl MusicService {
    /// Starts the rendering process and attaches a node to it.
    pub async fn start(
        config: &biggsconfig::Config,
        notifier: Arc<dyn RoomNotifier>,
    ) -> Result<Self> {
        let process = BackendProcess::start(&config.supervisor_config())?;
        if let Err(e) = process.wait_for_ready().await {
            process.stop().await;
            return Err(e);
        }

        let node = match Self::attach_node(config).await {
            Ok(node) => node,
            Err(e) => {
                error!("music capability unavailable: {}", e);
                process.stop().await;
                return Err(e);
            }
        };

        let backend: Arc<dyn PlaybackBackend> = node.clone();
        let mut service = Self::with_backend(backend, notifier, config.music_settings());
        service.process = Some(process);
        service.node = Some(node);
        info!("music service started");
        Ok(service)
    }

    async fn attach_node(config: &biggsconfig::Config) -> Result<Arc<LavalinkNode>> {
        let node_config = NodeConfig::from_file(&config.node_config_path())?;
        LavalinkNode::register(
            node_config,
            config.node_user_id(),
            &config.node_client_name(),
        )
        .await
    }

    /// Builds the service around an already attached backend.
    pub fn with_backend(
        backend: Arc<dyn PlaybackBackend>,
        notifier: Arc<dyn RoomNotifier>,
        settings: MusicSettings,
    ) -> Self {
        let registry = Arc::new(ControllerRegistry::new(
            Arc::clone(&backend),
            Arc::clone(&notifier),
            settings.default_volume,
        ));
        let sessions = Arc::new(SearchSessionStore::new());
        let commands = Arc::new(MusicCommands::new(
            Arc::clone(&backend),
            notifier,
            Arc::clone(&registry),
            Arc::clone(&sessions),
            settings,
        ));
        let dispatcher = tokio::spawn(dispatch_events(backend.subscribe(), Arc::clone(&registry)));

        Self {
            process: None,
            node: None,
            backend,
            registry,
            sessions,
            commands,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    pub fn registry(&self) -> Arc<ControllerRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn sessions(&self) -> Arc<SearchSessionStore> {
        Arc::clone(&self.sessions)
    }

    pub fn commands(&self) -> Arc<MusicCommands> {
        Arc::clone(&self.commands)
    }

    pub fn backend(&self) -> Arc<dyn PlaybackBackend> {
        Arc::clone(&self.backend)
    }

    /// Destroys every controller, then releases the node and the process.
    pub async fn shutdown(&self) {
        for controller in self.registry.drain() {
            if let Err(e) = controller.destroy().await {
                warn!(room = %controller.room(), "room not detached cleanly: {}", e);
            }
        }

        let dispatcher = self.dispatcher.lock().unwrap().take();
        if let Some(dispatcher) = dispatcher {
            dispatcher.abort();
        }
        if let Some(node) = &self.node {
            node.close().await;
        }
        if let Some(process) = &self.process {
            process.stop().await;
        }
        info!("music service stopped");
    }
}

/// Routes node events to the room controllers.
async fn dispatch_events(mut events: UnboundedReceiver<NodeEvent>, registry: Arc<ControllerRegistry>) {
    while let Some(event) = events.recv().await {
        if let NodeEvent::TrackErrored { room, message } = &event {
            warn!(room = %room, "track failed: {}", message);
        }
        if event.completes_track() {
            if !registry.signal_completion(event.room()) {
                debug!(room = %event.room(), "completion with no track waiting");
            }
            continue;
        }
        match event {
            NodeEvent::VoiceClosed { room, code, reason } => {
                warn!(room = %room, code, "voice connection closed: {}", reason);
            }
            NodeEvent::TrackStarted { room, title } => {
                debug!(room = %room, title = %title, "track started");
            }
            _ => {}
        }
    }
    debug!("node event stream ended");
}
