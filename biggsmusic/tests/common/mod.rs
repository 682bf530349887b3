//! Test doubles for the node and the chat layer.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use biggsmusic::{
    ChannelId, LoadedTracks, MessageRef, MusicError, NodeEvent, NodeEventBus, PlaybackBackend,
    PlayerState, Result, RoomId, RoomNotifier, Track, VoiceState,
};
use tokio::sync::mpsc::UnboundedReceiver;

const WAIT: Duration = Duration::from_secs(2);

pub fn track(title: &str, secs: Option<u64>) -> Track {
    Track {
        encoded: format!("enc-{title}"),
        identifier: title.to_string(),
        title: title.to_string(),
        author: "tester".to_string(),
        uri: Some(format!("https://example.org/{title}")),
        length: secs.map(Duration::from_secs),
        query: title.to_string(),
    }
}

/// Polls `check` until it holds or the wait budget runs out.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Search(String),
    Play(RoomId, String),
    Stop(RoomId),
    Volume(RoomId, u16),
    Paused(RoomId, bool),
    Connect(RoomId, ChannelId),
    Voice(RoomId),
    Disconnect(RoomId),
}

/// In-memory node. `stop` answers with a track-ended event, like a real one.
#[derive(Default)]
pub struct FakeBackend {
    calls: Mutex<Vec<Call>>,
    events: NodeEventBus,
    players: Mutex<HashMap<RoomId, PlayerState>>,
    results: Mutex<HashMap<String, LoadedTracks>>,
    failing: Mutex<HashSet<String>>,
    unavailable: Mutex<bool>,
    play_delay: Mutex<Option<Duration>>,
    slow_volume: Mutex<Option<(u16, Duration)>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(&self, identifier: &str, loaded: LoadedTracks) {
        self.results
            .lock()
            .unwrap()
            .insert(identifier.to_string(), loaded);
    }

    /// `play` for this title fails.
    pub fn fail_play(&self, title: &str) {
        self.failing.lock().unwrap().insert(title.to_string());
    }

    /// Every `play` takes `delay` before the node acknowledges it.
    pub fn slow_play(&self, delay: Duration) {
        *self.play_delay.lock().unwrap() = Some(delay);
    }

    /// `set_volume(volume)` takes `delay` before the node acknowledges it.
    pub fn slow_volume(&self, volume: u16, delay: Duration) {
        *self.slow_volume.lock().unwrap() = Some((volume, delay));
    }

    pub fn last_volume(&self, room: RoomId) -> Option<u16> {
        self.calls().into_iter().rev().find_map(|call| match call {
            Call::Volume(r, volume) if r == room => Some(volume),
            _ => None,
        })
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    pub fn set_position(&self, room: RoomId, position: Duration) {
        self.players.lock().unwrap().entry(room).or_default().position = position;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn plays(&self, room: RoomId) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Play(r, title) if r == room => Some(title),
                _ => None,
            })
            .collect()
    }

    pub async fn wait_for_plays(&self, room: RoomId, count: usize) -> Vec<String> {
        eventually(|| self.plays(room).len() >= count).await;
        self.plays(room)
    }

    /// Reports the current track of `room` as finished.
    pub fn finish(&self, room: RoomId) {
        self.events.broadcast(NodeEvent::TrackEnded {
            room,
            reason: "finished".to_string(),
        });
    }

    pub fn error(&self, room: RoomId) {
        self.events.broadcast(NodeEvent::TrackErrored {
            room,
            message: "decoder failure".to_string(),
        });
    }

    fn record(&self, call: Call) -> Result<()> {
        if *self.unavailable.lock().unwrap() {
            return Err(MusicError::node_unavailable("no session established"));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[async_trait]
impl PlaybackBackend for FakeBackend {
    async fn search(&self, identifier: &str) -> Result<LoadedTracks> {
        self.record(Call::Search(identifier.to_string()))?;
        Ok(self
            .results
            .lock()
            .unwrap()
            .get(identifier)
            .cloned()
            .unwrap_or_default())
    }

    async fn play(&self, room: RoomId, track: &Track) -> Result<()> {
        let delay = *self.play_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(&track.title) {
            return Err(MusicError::BackendRequest("400 Bad Request".to_string()));
        }
        self.record(Call::Play(room, track.title.clone()))
    }

    async fn stop(&self, room: RoomId) -> Result<()> {
        self.record(Call::Stop(room))?;
        self.events.broadcast(NodeEvent::TrackEnded {
            room,
            reason: "stopped".to_string(),
        });
        Ok(())
    }

    async fn set_volume(&self, room: RoomId, volume: u16) -> Result<()> {
        let slow = *self.slow_volume.lock().unwrap();
        if let Some((slow_volume, delay)) = slow {
            if slow_volume == volume {
                tokio::time::sleep(delay).await;
            }
        }
        self.record(Call::Volume(room, volume))
    }

    async fn set_paused(&self, room: RoomId, paused: bool) -> Result<()> {
        self.record(Call::Paused(room, paused))
    }

    async fn connect(&self, room: RoomId, channel: ChannelId) -> Result<()> {
        self.record(Call::Connect(room, channel))?;
        self.players.lock().unwrap().entry(room).or_default().channel = Some(channel);
        Ok(())
    }

    async fn update_voice(&self, room: RoomId, _voice: VoiceState) -> Result<()> {
        self.record(Call::Voice(room))
    }

    async fn disconnect(&self, room: RoomId) -> Result<()> {
        self.record(Call::Disconnect(room))?;
        self.players.lock().unwrap().remove(&room);
        Ok(())
    }

    fn player_state(&self, room: RoomId) -> Option<PlayerState> {
        self.players.lock().unwrap().get(&room).cloned()
    }

    fn subscribe(&self) -> UnboundedReceiver<NodeEvent> {
        self.events.subscribe()
    }
}

/// Notifier keeping every message it was asked to post or delete.
#[derive(Default)]
pub struct RecordingNotifier {
    next_id: AtomicU64,
    sent: Mutex<Vec<(MessageRef, String)>>,
    deleted: Mutex<Vec<MessageRef>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn last_text(&self) -> Option<String> {
        self.texts().pop()
    }

    pub fn message(&self, text_prefix: &str) -> Option<MessageRef> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .find(|(_, text)| text.starts_with(text_prefix))
            .map(|(message, _)| *message)
    }

    pub fn deleted(&self) -> Vec<MessageRef> {
        self.deleted.lock().unwrap().clone()
    }

    pub async fn wait_for(&self, text: &str) -> bool {
        eventually(|| self.texts().iter().any(|t| t == text)).await
    }
}

#[async_trait]
impl RoomNotifier for RecordingNotifier {
    async fn send(&self, channel: ChannelId, text: &str) -> Result<MessageRef> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let message = MessageRef { channel, id };
        self.sent.lock().unwrap().push((message, text.to_string()));
        Ok(message)
    }

    async fn delete(&self, message: &MessageRef) -> Result<()> {
        self.deleted.lock().unwrap().push(*message);
        Ok(())
    }
}
