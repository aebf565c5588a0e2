//! Snapshot building and map delta accumulation

use std::collections::HashMap;
use uuid::Uuid;

use crate::config::GameConfig;
use crate::ws::protocol::{CellState, MapInfo, PlayerSnapshot, ProjectileSnapshot, ServerMsg};

use super::combat::Projectile;
use super::hex::{CellChange, HexGrid, Team};
use super::phase::MatchPhase;
use super::player::Player;

/// Builds messages for network transmission.
///
/// Cell changes are collected over a tick and flushed as one `map_delta`;
/// entity snapshots are always full.
pub struct SnapshotBuilder {
    gravity: f64,
    launch_height: f64,
    /// Cells changed since the last flush, last write wins
    pending_cells: Vec<CellState>,
}

impl SnapshotBuilder {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            gravity: config.gravity,
            launch_height: config.launch_height,
            pending_cells: Vec::new(),
        }
    }

    /// Queue painted cells for the next map delta
    pub fn record_changes(&mut self, changes: Vec<CellChange>) {
        for change in changes {
            let state = CellState::from(change);
            match self
                .pending_cells
                .iter_mut()
                .find(|c| c.q == state.q && c.r == state.r)
            {
                Some(existing) => existing.color = state.color,
                None => self.pending_cells.push(state),
            }
        }
    }

    /// Drop queued changes, used when the whole map is reset
    pub fn discard_changes(&mut self) {
        self.pending_cells.clear();
    }

    /// The accumulated `map_delta`, or `None` if nothing changed
    pub fn take_map_delta(&mut self) -> Option<ServerMsg> {
        if self.pending_cells.is_empty() {
            return None;
        }
        Some(ServerMsg::MapDelta {
            cells: std::mem::take(&mut self.pending_cells),
        })
    }

    /// Full players + projectiles list for one tick
    pub fn entities(
        &self,
        tick: u64,
        players: &HashMap<Uuid, Player>,
        projectiles: &HashMap<Uuid, Projectile>,
    ) -> ServerMsg {
        ServerMsg::Entities {
            tick,
            players: players.values().map(player_snapshot).collect(),
            projectiles: projectiles.values().map(projectile_snapshot).collect(),
        }
    }

    /// Everything a newly joined session needs to render the room
    pub fn setup(
        &self,
        phase: MatchPhase,
        winning_team: Option<Team>,
        grid: &HexGrid,
        players: &HashMap<Uuid, Player>,
        projectiles: &HashMap<Uuid, Projectile>,
    ) -> ServerMsg {
        let cells = grid
            .cells()
            .map(|(coord, cell)| CellState {
                q: coord.q,
                r: coord.r,
                x: cell.center.x,
                y: cell.center.y,
                color: cell.color,
            })
            .collect();

        ServerMsg::Setup {
            state: phase,
            winning_team,
            map: MapInfo {
                rings: grid.rings(),
                edge_length: grid.edge_length(),
                gravity: self.gravity,
                launch_height: self.launch_height,
            },
            cells,
            players: players.values().map(player_snapshot).collect(),
            projectiles: projectiles.values().map(projectile_snapshot).collect(),
        }
    }
}

fn player_snapshot(p: &Player) -> PlayerSnapshot {
    PlayerSnapshot {
        id: p.id,
        name: p.name.clone(),
        x: p.position.x,
        y: p.position.y,
        cell: p.cell,
        dir_x: p.direction.x,
        dir_y: p.direction.y,
        health: p.health,
        team: p.team,
        last_shot: p.last_shot_ms,
        invulnerable: p.invulnerable,
        paralyzed: p.paralyzed,
    }
}

fn projectile_snapshot(p: &Projectile) -> ProjectileSnapshot {
    ProjectileSnapshot {
        id: p.id,
        owner_id: p.owner_id,
        team: p.team,
        x: p.position.x,
        y: p.position.y,
        rem_x: p.remaining.x,
        rem_y: p.remaining.y,
        target: p.target,
        progress: p.progress,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::hex::{AxialCoord, CartCoord};

    #[test]
    fn test_map_delta_merges_repaints() {
        let config = GameConfig::default();
        let mut grid = HexGrid::generate(2, 20.0);
        let mut builder = SnapshotBuilder::new(&config);

        assert!(builder.take_map_delta().is_none());

        builder.record_changes(grid.paint(AxialCoord::ORIGIN, Some(Team::Red), 0));
        builder.record_changes(grid.paint(AxialCoord::ORIGIN, Some(Team::Blue), 0));

        match builder.take_map_delta() {
            Some(ServerMsg::MapDelta { cells }) => {
                assert_eq!(cells.len(), 1);
                assert_eq!(cells[0].color, Some(Team::Blue));
            }
            other => panic!("expected map delta, got {:?}", other),
        }
        assert!(builder.take_map_delta().is_none());
    }

    #[test]
    fn test_projectiles_carry_their_owner() {
        let config = GameConfig::default();
        let grid = HexGrid::generate(2, 20.0);
        let builder = SnapshotBuilder::new(&config);
        let owner = Uuid::new_v4();
        let shot = Projectile::launch(
            owner,
            Team::Blue,
            CartCoord::ZERO,
            AxialCoord::new(1, 0),
            &grid,
        )
        .unwrap();
        let projectiles = HashMap::from([(shot.id, shot)]);

        match builder.entities(3, &HashMap::new(), &projectiles) {
            ServerMsg::Entities { tick, projectiles, .. } => {
                assert_eq!(tick, 3);
                assert_eq!(projectiles.len(), 1);
                assert_eq!(projectiles[0].owner_id, owner);
                assert_eq!(projectiles[0].team, Team::Blue);
            }
            other => panic!("expected entities, got {:?}", other),
        }
    }

    #[test]
    fn test_setup_lists_every_cell() {
        let config = GameConfig::default();
        let grid = HexGrid::generate(1, 20.0);
        let builder = SnapshotBuilder::new(&config);

        match builder.setup(MatchPhase::Waiting, None, &grid, &HashMap::new(), &HashMap::new()) {
            ServerMsg::Setup { cells, map, .. } => {
                assert_eq!(cells.len(), 7);
                assert_eq!(map.rings, 1);
                assert_eq!(map.edge_length, 20.0);
                assert_eq!(map.gravity, config.gravity);
            }
            other => panic!("expected setup, got {:?}", other),
        }
    }
}
