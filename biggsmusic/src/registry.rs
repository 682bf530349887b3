use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::backend::PlaybackBackend;
use crate::controller::RoomController;
use crate::model::RoomId;
use crate::notifier::RoomNotifier;

/// Room → controller map.
///
/// Create-if-absent and removal run under the map's per-key shard lock, so
/// two commands racing on the same room always end up with one controller.
pub struct ControllerRegistry {
    controllers: DashMap<RoomId, Arc<RoomController>>,
    backend: Arc<dyn PlaybackBackend>,
    notifier: Arc<dyn RoomNotifier>,
    default_volume: u16,
}

impl ControllerRegistry {
    pub fn new(
        backend: Arc<dyn PlaybackBackend>,
        notifier: Arc<dyn RoomNotifier>,
        default_volume: u16,
    ) -> Self {
        Self {
            controllers: DashMap::new(),
            backend,
            notifier,
            default_volume,
        }
    }

    /// Returns the room's controller, starting a new one on first use.
    pub fn get_or_create(&self, room: RoomId) -> Arc<RoomController> {
        self.controllers
            .entry(room)
            .or_insert_with(|| {
                info!(room = %room, "creating room controller");
                RoomController::spawn(
                    room,
                    Arc::clone(&self.backend),
                    Arc::clone(&self.notifier),
                    self.default_volume,
                )
            })
            .value()
            .clone()
    }

    pub fn get(&self, room: RoomId) -> Option<Arc<RoomController>> {
        self.controllers.get(&room).map(|entry| entry.value().clone())
    }

    /// Detaches the controller and stops its loop. The next `get_or_create`
    /// builds a fresh controller with an empty queue.
    pub fn remove(&self, room: RoomId) -> Option<Arc<RoomController>> {
        let (_, controller) = self.controllers.remove(&room)?;
        controller.shutdown();
        info!(room = %room, "room controller removed");
        Some(controller)
    }

    pub fn contains(&self, room: RoomId) -> bool {
        self.controllers.contains_key(&room)
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    pub fn rooms(&self) -> Vec<RoomId> {
        self.controllers.iter().map(|entry| *entry.key()).collect()
    }

    /// Routes a completion to the room's controller, if any.
    pub fn signal_completion(&self, room: RoomId) -> bool {
        self.get(room)
            .map(|controller| controller.signal_completion())
            .unwrap_or(false)
    }

    /// Removes and stops every controller.
    pub fn drain(&self) -> Vec<Arc<RoomController>> {
        self.rooms()
            .into_iter()
            .filter_map(|room| self.remove(room))
            .collect()
    }
}
