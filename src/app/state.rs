//! Application state shared across routes

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::game::{GameMatch, RoomRegistry};
use crate::util::time::unix_millis;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rooms: Arc<RoomRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            rooms: Arc::new(RoomRegistry::new()),
        }
    }

    /// Create every configured room and spawn its tick loop.
    /// Must be called from within the tokio runtime.
    pub fn spawn_rooms(&self) {
        for room_id in &self.config.room_ids {
            let seed: u64 = rand::random();
            let (room, handle) =
                GameMatch::new(room_id.clone(), self.config.game.clone(), seed, unix_millis());
            self.rooms.insert(handle);
            tokio::spawn(room.run());
            info!(room_id = %room_id, seed, "Room created");
        }
    }
}
