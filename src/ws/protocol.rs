//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::hex::{AxialCoord, CellChange, Team};
use crate::game::phase::MatchPhase;

/// Movement keys a client can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKey {
    Up,
    Down,
    Left,
    Right,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Create this session's player
    SpawnPlayer {
        name: String,
    },

    /// Remove this session's player
    DeletePlayer,

    /// Key pressed or released
    MoveKey {
        key: MoveKey,
        pressed: bool,
    },

    /// Fire at a cell
    Attack {
        target: AxialCoord,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        session_id: Uuid,
        room_id: String,
        server_time: u64,
    },

    /// Full room state, sent once when a session joins
    Setup {
        state: MatchPhase,
        winning_team: Option<Team>,
        map: MapInfo,
        cells: Vec<CellState>,
        players: Vec<PlayerSnapshot>,
        projectiles: Vec<ProjectileSnapshot>,
    },

    /// Reply to `spawn_player`; `null` when the room is full
    PlayerSpawned {
        player_id: Option<Uuid>,
    },

    /// Cells repainted during one tick
    MapDelta {
        cells: Vec<CellState>,
    },

    /// Every cell was reset to no color
    MapCleared,

    /// All players and projectiles, sent every tick
    Entities {
        tick: u64,
        players: Vec<PlayerSnapshot>,
        projectiles: Vec<ProjectileSnapshot>,
    },

    /// Match phase changed
    MatchState {
        state: MatchPhase,
        winning_team: Option<Team>,
    },

    /// Error message
    Error {
        code: String,
        message: String,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Static map geometry and rendering hints
#[derive(Debug, Clone, Serialize)]
pub struct MapInfo {
    pub rings: u32,
    pub edge_length: f64,
    /// Cosmetic projectile arc parameters; the simulation ignores them
    pub gravity: f64,
    pub launch_height: f64,
}

/// One cell and its color
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellState {
    pub q: i32,
    pub r: i32,
    pub x: f64,
    pub y: f64,
    pub color: Option<Team>,
}

impl From<CellChange> for CellState {
    fn from(change: CellChange) -> Self {
        Self {
            q: change.cell.q,
            r: change.cell.r,
            x: change.center.x,
            y: change.center.y,
            color: change.color,
        }
    }
}

/// Player state in a snapshot
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSnapshot {
    pub id: Uuid,
    pub name: String,
    /// Position X
    pub x: f64,
    /// Position Y
    pub y: f64,
    /// Cell the player stands on
    pub cell: AxialCoord,
    /// Heading (unit vector or zero)
    pub dir_x: f64,
    pub dir_y: f64,
    pub health: i32,
    pub team: Team,
    /// Unix millis of the last shot, if any
    pub last_shot: Option<u64>,
    pub invulnerable: bool,
    pub paralyzed: bool,
}

/// Projectile state in a snapshot
#[derive(Debug, Clone, Serialize)]
pub struct ProjectileSnapshot {
    pub id: Uuid,
    /// Player who fired it
    pub owner_id: Uuid,
    pub team: Team,
    pub x: f64,
    pub y: f64,
    /// Offset still to travel
    pub rem_x: f64,
    pub rem_y: f64,
    pub target: AxialCoord,
    pub progress: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_move_key() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"move_key","key":"left","pressed":true}"#).unwrap();
        assert!(matches!(
            msg,
            ClientMsg::MoveKey {
                key: MoveKey::Left,
                pressed: true
            }
        ));
    }

    #[test]
    fn test_decode_attack() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"attack","target":{"q":-2,"r":1}}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Attack { target } if target == AxialCoord::new(-2, 1)));
    }

    #[test]
    fn test_reject_unknown_key() {
        let raw = r#"{"type":"move_key","key":"w","pressed":true}"#;
        let res = serde_json::from_str::<ClientMsg>(raw);
        assert!(res.is_err());
    }

    #[test]
    fn test_encode_match_state() {
        let json = serde_json::to_value(ServerMsg::MatchState {
            state: MatchPhase::Over,
            winning_team: Some(Team::Blue),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "match_state", "state": "over", "winning_team": "blue"})
        );
    }

    #[test]
    fn test_encode_unpainted_cell() {
        let json = serde_json::to_value(ServerMsg::MapDelta {
            cells: vec![CellState { q: 1, r: 0, x: 30.0, y: 17.0, color: None }],
        })
        .unwrap();
        assert_eq!(json["cells"][0]["color"], serde_json::Value::Null);
        assert_eq!(json["type"], "map_delta");
    }
}
