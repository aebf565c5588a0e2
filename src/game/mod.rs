//! Game simulation modules

pub mod combat;
pub mod effects;
pub mod hex;
pub mod r#match;
pub mod phase;
pub mod physics;
pub mod player;
pub mod scheduler;
pub mod snapshot;

pub use phase::MatchPhase;
pub use r#match::{GameMatch, RoomCommand, RoomHandle, RoomRegistry};
