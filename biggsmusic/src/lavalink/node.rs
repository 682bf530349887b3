use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use super::protocol::{Incoming, LoadResult, UpdatePlayer};
use crate::backend::PlaybackBackend;
use crate::errors::{MusicError, Result};
use crate::events::NodeEventBus;
use crate::model::{ChannelId, LoadedTracks, NodeEvent, PlayerState, RoomId, Track, VoiceState};
use crate::node_config::NodeConfig;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// State shared between the node handle and its websocket reader.
#[derive(Default)]
struct NodeShared {
    session: RwLock<Option<String>>,
    players: DashMap<RoomId, PlayerState>,
    events: NodeEventBus,
}

/// One registered Lavalink node.
///
/// Control calls go over REST, events come back on the websocket. Once the
/// websocket drops, the session is gone and every later call fails with
/// `NodeUnavailable`; nothing reconnects.
pub struct LavalinkNode {
    id: Uuid,
    config: NodeConfig,
    http: reqwest::Client,
    rest_base: Url,
    shared: Arc<NodeShared>,
    cancel: CancellationToken,
    reader: Mutex<Option<JoinHandle<()>>>,
}

fn header(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| MusicError::InvalidNodeConfig(e.to_string()))
}

fn unavailable(e: impl std::fmt::Display) -> MusicError {
    MusicError::NodeUnavailable(e.to_string())
}

impl LavalinkNode {
    /// Opens the websocket and waits for the node's `ready` op.
    pub async fn register(config: NodeConfig, user_id: u64, client_name: &str) -> Result<Arc<Self>> {
        let id = Uuid::new_v4();
        let rest_base = Url::parse(&format!("{}/", config.rest_base()))
            .map_err(|e| MusicError::InvalidNodeConfig(e.to_string()))?;

        let mut request = config
            .websocket_url()
            .into_client_request()
            .map_err(|e| MusicError::InvalidNodeConfig(e.to_string()))?;
        let headers = request.headers_mut();
        headers.insert("Authorization", header(&config.password)?);
        headers.insert("User-Id", header(&user_id.to_string())?);
        headers.insert("Client-Name", header(client_name)?);

        info!(node = %id, url = %config.websocket_url(), "registering node");
        let (socket, _) = connect_async(request).await.map_err(unavailable)?;

        let shared = Arc::new(NodeShared::default());
        let cancel = CancellationToken::new();
        let (ready_tx, ready_rx) = oneshot::channel();
        let reader = tokio::spawn(read_socket(
            id,
            socket,
            Arc::clone(&shared),
            cancel.clone(),
            ready_tx,
        ));

        let session = ready_rx
            .await
            .map_err(|_| unavailable("connection closed before the node was ready"))?;
        info!(node = %id, session = %session, "node ready");

        Ok(Arc::new(Self {
            id,
            config,
            http: reqwest::Client::new(),
            rest_base,
            shared,
            cancel,
            reader: Mutex::new(Some(reader)),
        }))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn session_id(&self) -> Option<String> {
        self.shared.session.read().unwrap().clone()
    }

    pub fn is_available(&self) -> bool {
        self.session_id().is_some()
    }

    /// Closes the websocket and waits for the reader to stop.
    pub async fn close(&self) {
        self.cancel.cancel();
        let reader = self.reader.lock().unwrap().take();
        if let Some(reader) = reader {
            let _ = reader.await;
        }
    }

    fn player_url(&self, room: RoomId) -> Result<Url> {
        let session = self
            .session_id()
            .ok_or_else(|| MusicError::node_unavailable("no session established"))?;
        self.rest_base
            .join(&format!("v4/sessions/{}/players/{}", session, room))
            .map_err(|e| MusicError::BackendRequest(e.to_string()))
    }

    async fn update_player(&self, room: RoomId, body: UpdatePlayer) -> Result<()> {
        let url = self.player_url(room)?;
        debug!(room = %room, ?body, "updating player");
        let response = self
            .http
            .patch(url)
            .header(AUTHORIZATION, &self.config.password)
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?;
        check(response).await.map(|_| ())
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(MusicError::BackendRequest(format!("{}: {}", status, body)))
}

async fn read_socket(
    node: Uuid,
    mut socket: Socket,
    shared: Arc<NodeShared>,
    cancel: CancellationToken,
    ready: oneshot::Sender<String>,
) {
    let mut ready = Some(ready);
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => {
                if let Err(e) = socket.close(None).await {
                    debug!(node = %node, "close handshake failed: {}", e);
                }
                break;
            }
            message = socket.next() => message,
        };

        match message {
            Some(Ok(Message::Text(text))) => handle_text(&shared, &text, &mut ready),
            Some(Ok(Message::Close(frame))) => {
                warn!(node = %node, ?frame, "node closed the connection");
                break;
            }
            // pings are answered by the socket itself
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                error!(node = %node, "node connection failed: {}", e);
                break;
            }
            None => break,
        }
    }

    shared.session.write().unwrap().take();
    let lost = shared.players.len();
    shared.players.clear();
    if cancel.is_cancelled() {
        info!(node = %node, "node connection closed");
    } else {
        error!(node = %node, players = lost, "node lost; attached rooms stop receiving events");
    }
}

fn handle_text(shared: &NodeShared, text: &str, ready: &mut Option<oneshot::Sender<String>>) {
    let incoming = match serde_json::from_str::<Incoming>(text) {
        Ok(incoming) => incoming,
        Err(e) => {
            warn!("unreadable node message: {}", e);
            return;
        }
    };

    match incoming {
        Incoming::Ready { session_id, resumed } => {
            debug!(session = %session_id, resumed, "session established");
            *shared.session.write().unwrap() = Some(session_id.clone());
            if let Some(ready) = ready.take() {
                let _ = ready.send(session_id);
            }
        }
        Incoming::PlayerUpdate { guild_id, state } => {
            let Ok(room) = guild_id.parse::<u64>().map(RoomId) else {
                warn!(guild = %guild_id, "player update for an unknown room id");
                return;
            };
            let position = Duration::from_millis(state.position);
            {
                let mut player = shared.players.entry(room).or_default();
                player.position = position;
                player.voice_connected = state.connected;
            }
            shared.events.broadcast(NodeEvent::PlayerUpdated {
                room,
                position,
                connected: state.connected,
            });
        }
        Incoming::Event(event) => {
            if let Some(event) = event.into_node_event() {
                debug!(?event, "node event");
                shared.events.broadcast(event);
            }
        }
        Incoming::Unknown => {}
    }
}

#[async_trait]
impl PlaybackBackend for LavalinkNode {
    async fn search(&self, identifier: &str) -> Result<LoadedTracks> {
        let mut url = self
            .rest_base
            .join("v4/loadtracks")
            .map_err(|e| MusicError::BackendRequest(e.to_string()))?;
        url.query_pairs_mut().append_pair("identifier", identifier);

        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, &self.config.password)
            .send()
            .await
            .map_err(unavailable)?;
        let result: LoadResult = check(response)
            .await?
            .json()
            .await
            .map_err(|e| MusicError::BackendRequest(e.to_string()))?;

        let loaded = result.into_loaded(identifier)?;
        debug!(identifier, count = loaded.tracks.len(), "tracks loaded");
        Ok(loaded)
    }

    async fn play(&self, room: RoomId, track: &Track) -> Result<()> {
        self.update_player(room, UpdatePlayer::play(&track.encoded)).await
    }

    async fn stop(&self, room: RoomId) -> Result<()> {
        self.update_player(room, UpdatePlayer::stop()).await
    }

    async fn set_volume(&self, room: RoomId, volume: u16) -> Result<()> {
        self.update_player(room, UpdatePlayer::volume(volume)).await
    }

    async fn set_paused(&self, room: RoomId, paused: bool) -> Result<()> {
        self.update_player(room, UpdatePlayer::paused(paused)).await
    }

    /// Records the room's voice channel. The platform join itself belongs to
    /// the chat layer, which then hands the handshake over via `update_voice`.
    async fn connect(&self, room: RoomId, channel: ChannelId) -> Result<()> {
        if !self.is_available() {
            return Err(MusicError::node_unavailable("no session established"));
        }
        self.shared.players.entry(room).or_default().channel = Some(channel);
        info!(room = %room, channel = %channel, "voice channel attached");
        Ok(())
    }

    async fn update_voice(&self, room: RoomId, voice: VoiceState) -> Result<()> {
        self.update_player(room, UpdatePlayer::voice(voice)).await
    }

    async fn disconnect(&self, room: RoomId) -> Result<()> {
        let url = self.player_url(room)?;
        let response = self
            .http
            .delete(url)
            .header(AUTHORIZATION, &self.config.password)
            .send()
            .await
            .map_err(unavailable)?;
        self.shared.players.remove(&room);
        if response.status() == StatusCode::NOT_FOUND {
            debug!(room = %room, "no player to destroy");
            return Ok(());
        }
        check(response).await?;
        info!(room = %room, "player destroyed");
        Ok(())
    }

    fn player_state(&self, room: RoomId) -> Option<PlayerState> {
        self.shared.players.get(&room).map(|p| p.value().clone())
    }

    fn subscribe(&self) -> UnboundedReceiver<NodeEvent> {
        self.shared.events.subscribe()
    }
}
