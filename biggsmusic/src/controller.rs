//! Room controller: one per room, owns the queue and drives playback.
//!
//! ## Loop
//!
//! Each controller runs a single task for its whole lifetime:
//!
//! 1. arm a fresh completion slot (a one-shot channel),
//! 2. park until the queue has a head, then pop it,
//! 3. ask the backend to play it,
//! 4. post a "now playing" line to the room,
//! 5. park until the node reports the track ended or errored,
//! 6. start over.
//!
//! The slot is armed before the play request goes out, so an end event can
//! never slip in between "clear" and "wait". Both parking points also watch
//! the controller's cancellation token, which is how `shutdown` releases
//! the task. A play request already in flight is allowed to finish; the loop
//! then stops the track and exits without announcing it.
//!
//! Volume changes go through `volume_lock`, so the node always ends up with
//! the last stored value.

use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, Notify, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::PlaybackBackend;
use crate::errors::{MusicError, Result};
use crate::format;
use crate::model::{ChannelId, RoomId, Track};
use crate::notifier::RoomNotifier;
use crate::queue::{QueuePage, TrackQueue};

pub const MAX_VOLUME: u16 = 1000;

/// Clamps any requested volume into `[0, MAX_VOLUME]`.
pub fn clamp_volume(requested: i64) -> u16 {
    requested.clamp(0, MAX_VOLUME as i64) as u16
}

#[derive(Debug)]
struct ControllerState {
    queue: TrackQueue,
    current: Option<Track>,
    paused: bool,
    volume: u16,
    /// Text channel receiving "now playing" notifications.
    channel: Option<ChannelId>,
}

/// Read-only view of a controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerSnapshot {
    pub room: RoomId,
    pub current: Option<Track>,
    pub paused: bool,
    pub volume: u16,
    pub channel: Option<ChannelId>,
    pub queue: Vec<Track>,
}

pub struct RoomController {
    room: RoomId,
    backend: Arc<dyn PlaybackBackend>,
    notifier: Arc<dyn RoomNotifier>,
    state: Mutex<ControllerState>,
    volume_lock: AsyncMutex<()>,
    queue_ready: Notify,
    completion: Mutex<Option<oneshot::Sender<()>>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for RoomController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomController")
            .field("room", &self.room)
            .field("state", &self.state)
            .finish()
    }
}

impl RoomController {
    /// Builds a controller and starts its loop on the current runtime.
    pub fn spawn(
        room: RoomId,
        backend: Arc<dyn PlaybackBackend>,
        notifier: Arc<dyn RoomNotifier>,
        volume: u16,
    ) -> Arc<Self> {
        let controller = Arc::new(Self {
            room,
            backend,
            notifier,
            state: Mutex::new(ControllerState {
                queue: TrackQueue::new(),
                current: None,
                paused: false,
                volume: volume.min(MAX_VOLUME),
                channel: None,
            }),
            volume_lock: AsyncMutex::new(()),
            queue_ready: Notify::new(),
            completion: Mutex::new(None),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        });

        let runner = Arc::clone(&controller);
        let handle = tokio::spawn(async move { runner.run().await });
        *controller.task.lock().unwrap() = Some(handle);

        info!(room = %room, "room controller started");
        controller
    }

    pub fn room(&self) -> RoomId {
        self.room
    }

    async fn run(self: Arc<Self>) {
        {
            let _guard = self.volume_lock.lock().await;
            let volume = self.state.lock().unwrap().volume;
            if let Err(e) = self.backend.set_volume(self.room, volume).await {
                warn!(room = %self.room, "initial volume not applied: {}", e);
            }
        }

        loop {
            let (done_tx, done_rx) = oneshot::channel::<()>();
            *self.completion.lock().unwrap() = Some(done_tx);

            let track = tokio::select! {
                _ = self.cancel.cancelled() => break,
                track = self.next_track() => track,
            };

            debug!(room = %self.room, title = %track.title, "starting track");
            if let Err(e) = self.backend.play(self.room, &track).await {
                warn!(room = %self.room, title = %track.title, "play request failed: {}", e);
                self.finish_current();
                if self.cancel.is_cancelled() {
                    break;
                }
                self.notify(&format!(
                    "Couldn't play {}: {}",
                    format::escape_markdown(&track.title),
                    e
                ))
                .await;
                continue;
            }

            if self.cancel.is_cancelled() {
                debug!(room = %self.room, title = %track.title, "shut down while starting, stopping");
                if let Err(e) = self.backend.stop(self.room).await {
                    debug!(room = %self.room, "stop after shutdown failed: {}", e);
                }
                break;
            }

            self.notify(&format::now_playing_line(&track)).await;

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = done_rx => {}
            }

            debug!(room = %self.room, title = %track.title, "track completed");
            self.finish_current();
        }

        self.completion.lock().unwrap().take();
        debug!(room = %self.room, "controller loop stopped");
    }

    /// Parks until the queue has a head, then moves it into `current`.
    async fn next_track(&self) -> Track {
        loop {
            let notified = self.queue_ready.notified();
            {
                let mut state = self.state.lock().unwrap();
                if let Some(track) = state.queue.pop_front() {
                    state.current = Some(track.clone());
                    state.paused = false;
                    return track;
                }
            }
            notified.await;
        }
    }

    fn finish_current(&self) {
        let mut state = self.state.lock().unwrap();
        state.current = None;
        state.paused = false;
    }

    async fn notify(&self, text: &str) {
        let channel = self.state.lock().unwrap().channel;
        match channel {
            Some(channel) => {
                if let Err(e) = self.notifier.send(channel, text).await {
                    warn!(room = %self.room, "notification not delivered: {}", e);
                }
            }
            None => debug!(room = %self.room, "no channel bound, dropping: {}", text),
        }
    }

    /// Raises the completion slot. Returns false when the loop was not
    /// waiting on a track.
    pub fn signal_completion(&self) -> bool {
        // late end events for a torn-down player must not consume the
        // slot armed for the next track
        if self.state.lock().unwrap().current.is_none() {
            return false;
        }
        match self.completion.lock().unwrap().take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Binds the text channel used for notifications.
    pub fn bind_channel(&self, channel: ChannelId) {
        self.state.lock().unwrap().channel = Some(channel);
    }

    /// Appends a track; returns its 1-based queue position.
    pub fn enqueue(&self, track: Track) -> usize {
        let position = self.state.lock().unwrap().queue.push(track);
        self.queue_ready.notify_one();
        position
    }

    /// Appends tracks in order; returns how many were added.
    pub fn enqueue_all(&self, tracks: Vec<Track>) -> usize {
        let count = tracks.len();
        {
            let mut state = self.state.lock().unwrap();
            for track in tracks {
                state.queue.push(track);
            }
        }
        if count > 0 {
            self.queue_ready.notify_one();
        }
        count
    }

    pub fn remove_at(&self, position: usize) -> Result<Track> {
        self.state.lock().unwrap().queue.remove_at(position)
    }

    pub fn remove_range(&self, first: usize, last: usize) -> Result<Vec<Track>> {
        self.state.lock().unwrap().queue.remove_range(first, last)
    }

    /// Stores the clamped volume, then forwards it to the node.
    pub async fn set_volume(&self, requested: i64) -> Result<u16> {
        let volume = clamp_volume(requested);
        let _guard = self.volume_lock.lock().await;
        self.state.lock().unwrap().volume = volume;
        self.backend.set_volume(self.room, volume).await?;
        Ok(volume)
    }

    pub async fn pause(&self) -> Result<()> {
        {
            let state = self.state.lock().unwrap();
            if state.current.is_none() || state.paused {
                return Err(MusicError::NothingPlaying);
            }
        }
        self.backend.set_paused(self.room, true).await?;
        self.state.lock().unwrap().paused = true;
        Ok(())
    }

    pub async fn resume(&self) -> Result<()> {
        {
            let state = self.state.lock().unwrap();
            if state.current.is_none() || !state.paused {
                return Err(MusicError::NotPaused);
            }
        }
        self.backend.set_paused(self.room, false).await?;
        self.state.lock().unwrap().paused = false;
        Ok(())
    }

    /// Stops the current track; the resulting end event advances the loop.
    pub async fn skip_current(&self) -> Result<Track> {
        let current = self
            .state
            .lock()
            .unwrap()
            .current
            .clone()
            .ok_or(MusicError::NothingPlaying)?;
        self.backend.stop(self.room).await?;
        Ok(current)
    }

    pub fn current(&self) -> Option<Track> {
        self.state.lock().unwrap().current.clone()
    }

    pub fn is_idle(&self) -> bool {
        self.state.lock().unwrap().current.is_none()
    }

    pub fn queue_len(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    pub fn queue_page(&self, page: usize, page_size: usize) -> Result<QueuePage> {
        self.state.lock().unwrap().queue.page(page, page_size)
    }

    pub fn queued_length(&self) -> std::time::Duration {
        self.state.lock().unwrap().queue.total_length()
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        let state = self.state.lock().unwrap();
        ControllerSnapshot {
            room: self.room,
            current: state.current.clone(),
            paused: state.paused,
            volume: state.volume,
            channel: state.channel,
            queue: state.queue.to_vec(),
        }
    }

    /// Releases the loop at whichever parking point it is in.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        info!(room = %self.room, "room controller shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits for the loop task to finish after `shutdown`.
    pub async fn join(&self) {
        let handle = self.task.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Stops the loop, waits for it to exit, then detaches the room from its
    /// voice channel.
    pub async fn destroy(&self) -> Result<()> {
        self.shutdown();
        self.join().await;
        self.backend.disconnect(self.room).await
    }
}
