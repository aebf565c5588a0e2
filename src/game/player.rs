//! Player avatar: position, input, health and combat state

use uuid::Uuid;

use crate::ws::protocol::MoveKey;

use super::combat::{CombatSystem, Projectile};
use super::hex::{AxialCoord, CartCoord, HexGrid, Team};
use super::phase::MatchPhase;
use super::physics::{MoveKeys, PhysicsSystem};

/// Health a player spawns and respawns with
pub const MAX_HEALTH: i32 = 2;

/// What a projectile impact did to a player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Out of the splash, same team, shielded, or damage disabled
    Unaffected,
    /// Lost health but still standing
    Damaged { health: i32 },
    /// Health ran out: healed and moved to the opposing team
    Converted { from: Team, to: Team },
}

/// Player state in a match (authoritative)
#[derive(Debug, Clone)]
pub struct Player {
    pub id: Uuid,
    pub name: String,

    // Positioning
    pub position: CartCoord,
    pub cell: AxialCoord,
    pub direction: CartCoord,
    pub speed: f64,

    // Combat
    pub health: i32,
    pub team: Team,
    pub last_shot_ms: Option<u64>,

    // Status flags, driven by timed actions
    pub invulnerable: bool,
    pub paralyzed: bool,

    keys: MoveKeys,
    direction_dirty: bool,
}

impl Player {
    pub fn new(
        id: Uuid,
        name: String,
        team: Team,
        cell: AxialCoord,
        position: CartCoord,
        speed: f64,
    ) -> Self {
        Self {
            id,
            name,
            position,
            cell,
            direction: CartCoord::ZERO,
            speed,
            health: MAX_HEALTH,
            team,
            last_shot_ms: None,
            invulnerable: false,
            paralyzed: false,
            keys: MoveKeys::default(),
            direction_dirty: false,
        }
    }

    /// Register a key edge; the heading is recomputed on the next tick
    pub fn set_move_key(&mut self, key: MoveKey, pressed: bool) {
        if self.keys.set(key, pressed) {
            self.direction_dirty = true;
        }
    }

    pub fn recompute_direction(&mut self) {
        self.direction = self.keys.direction();
        self.direction_dirty = false;
    }

    /// Advance one tick of movement. Steps that would leave the map are dropped.
    pub fn tick(&mut self, grid: &HexGrid, ticks_per_second: f64) {
        if self.direction_dirty {
            self.recompute_direction();
        }
        if self.paralyzed {
            return;
        }

        let step = PhysicsSystem::step(
            grid,
            self.position,
            self.direction,
            self.speed,
            ticks_per_second,
        );
        if let Some(next) = step {
            self.position = next;
            self.cell = grid.axial_of(next);
        }
    }

    pub fn can_fire(&self, now_ms: u64, cooldown_ms: u64) -> bool {
        CombatSystem::cooldown_elapsed(self.last_shot_ms, now_ms, cooldown_ms)
    }

    /// Consume the weapon cooldown. Returns false, untouched, if still cooling down.
    pub fn fire(&mut self, now_ms: u64, cooldown_ms: u64) -> bool {
        if !self.can_fire(now_ms, cooldown_ms) {
            return false;
        }
        self.last_shot_ms = Some(now_ms);
        true
    }

    /// Apply an impact. Team counters and the paralysis that follows a
    /// conversion are the caller's business.
    pub fn take_damage(&mut self, projectile: &Projectile, phase: MatchPhase) -> DamageOutcome {
        if phase != MatchPhase::Ongoing || projectile.team == self.team || self.invulnerable {
            return DamageOutcome::Unaffected;
        }

        let damage = CombatSystem::splash_damage(self.cell.distance(&projectile.target));
        if damage == 0 {
            return DamageOutcome::Unaffected;
        }

        self.health -= damage;
        if self.health > 0 {
            return DamageOutcome::Damaged { health: self.health };
        }

        let from = self.team;
        self.team = from.opponent();
        self.health = MAX_HEALTH;
        DamageOutcome::Converted { from, to: self.team }
    }

    /// Teleport to the centre of a cell
    pub fn relocate(&mut self, cell: AxialCoord, position: CartCoord) {
        self.cell = cell;
        self.position = position;
    }

    pub fn heal(&mut self) {
        self.health = MAX_HEALTH;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player_at(grid: &HexGrid, cell: AxialCoord, team: Team) -> Player {
        let position = grid.cartesian_of(cell).unwrap();
        Player::new(Uuid::new_v4(), "tester".to_string(), team, cell, position, 60.0)
    }

    fn projectile_at(grid: &HexGrid, target: AxialCoord, team: Team) -> Projectile {
        Projectile::launch(Uuid::new_v4(), team, CartCoord::ZERO, target, grid).unwrap()
    }

    #[test]
    fn test_direct_hit_costs_two() {
        let grid = HexGrid::generate(3, 20.0);
        let mut p = player_at(&grid, AxialCoord::new(1, 0), Team::Red);
        p.health = 3;
        let shot = projectile_at(&grid, AxialCoord::new(1, 0), Team::Blue);
        assert_eq!(p.take_damage(&shot, MatchPhase::Ongoing), DamageOutcome::Damaged { health: 1 });
    }

    #[test]
    fn test_adjacent_hit_costs_one() {
        let grid = HexGrid::generate(3, 20.0);
        let mut p = player_at(&grid, AxialCoord::new(1, 0), Team::Red);
        let shot = projectile_at(&grid, AxialCoord::new(1, 1), Team::Blue);
        assert_eq!(p.take_damage(&shot, MatchPhase::Ongoing), DamageOutcome::Damaged { health: 1 });
    }

    #[test]
    fn test_distant_hit_is_harmless() {
        let grid = HexGrid::generate(3, 20.0);
        let mut p = player_at(&grid, AxialCoord::new(-2, 0), Team::Red);
        let shot = projectile_at(&grid, AxialCoord::new(0, 0), Team::Blue);
        assert_eq!(p.take_damage(&shot, MatchPhase::Ongoing), DamageOutcome::Unaffected);
        assert_eq!(p.health, MAX_HEALTH);
    }

    #[test]
    fn test_friendly_fire_is_ignored() {
        let grid = HexGrid::generate(3, 20.0);
        let mut p = player_at(&grid, AxialCoord::ORIGIN, Team::Blue);
        let shot = projectile_at(&grid, AxialCoord::ORIGIN, Team::Blue);
        assert_eq!(p.take_damage(&shot, MatchPhase::Ongoing), DamageOutcome::Unaffected);
        assert_eq!(p.health, MAX_HEALTH);
    }

    #[test]
    fn test_damage_only_while_ongoing() {
        let grid = HexGrid::generate(3, 20.0);
        let shot = projectile_at(&grid, AxialCoord::ORIGIN, Team::Blue);
        for phase in [MatchPhase::Waiting, MatchPhase::Starting, MatchPhase::Over] {
            let mut p = player_at(&grid, AxialCoord::ORIGIN, Team::Red);
            assert_eq!(p.take_damage(&shot, phase), DamageOutcome::Unaffected);
        }
    }

    #[test]
    fn test_invulnerable_player_is_shielded() {
        let grid = HexGrid::generate(3, 20.0);
        let mut p = player_at(&grid, AxialCoord::ORIGIN, Team::Red);
        p.invulnerable = true;
        let shot = projectile_at(&grid, AxialCoord::ORIGIN, Team::Blue);
        assert_eq!(p.take_damage(&shot, MatchPhase::Ongoing), DamageOutcome::Unaffected);
    }

    #[test]
    fn test_lethal_hit_converts_team() {
        let grid = HexGrid::generate(3, 20.0);
        let mut p = player_at(&grid, AxialCoord::ORIGIN, Team::Red);
        let shot = projectile_at(&grid, AxialCoord::ORIGIN, Team::Blue);
        assert_eq!(
            p.take_damage(&shot, MatchPhase::Ongoing),
            DamageOutcome::Converted { from: Team::Red, to: Team::Blue }
        );
        assert_eq!(p.team, Team::Blue);
        assert_eq!(p.health, MAX_HEALTH);
    }

    #[test]
    fn test_fire_respects_cooldown() {
        let grid = HexGrid::generate(1, 20.0);
        let mut p = player_at(&grid, AxialCoord::ORIGIN, Team::Red);
        assert!(p.fire(10_000, 1000));
        assert!(!p.fire(10_999, 1000));
        assert_eq!(p.last_shot_ms, Some(10_000));
        assert!(p.fire(11_000, 1000));
        assert_eq!(p.last_shot_ms, Some(11_000));
    }

    #[test]
    fn test_direction_recomputed_lazily() {
        let grid = HexGrid::generate(3, 20.0);
        let mut p = player_at(&grid, AxialCoord::ORIGIN, Team::Red);
        p.set_move_key(MoveKey::Right, true);
        assert_eq!(p.direction, CartCoord::ZERO);
        p.tick(&grid, 20.0);
        assert_eq!(p.direction, CartCoord::new(1.0, 0.0));
        assert_eq!(p.position, CartCoord::new(3.0, 0.0));
    }

    #[test]
    fn test_tick_tracks_cell() {
        let grid = HexGrid::generate(3, 20.0);
        let mut p = player_at(&grid, AxialCoord::ORIGIN, Team::Red);
        p.speed = 200.0;
        p.set_move_key(MoveKey::Down, true);
        // 10px per tick; the next cell centre down is ~34.6px away
        for _ in 0..3 {
            p.tick(&grid, 20.0);
        }
        assert_eq!(p.cell, AxialCoord::new(0, 1));
    }

    #[test]
    fn test_paralyzed_player_stays_put() {
        let grid = HexGrid::generate(3, 20.0);
        let mut p = player_at(&grid, AxialCoord::ORIGIN, Team::Red);
        p.paralyzed = true;
        p.set_move_key(MoveKey::Left, true);
        p.tick(&grid, 20.0);
        assert_eq!(p.position, CartCoord::ZERO);
    }

    #[test]
    fn test_boundary_blocks_movement() {
        let grid = HexGrid::generate(0, 20.0);
        let mut p = player_at(&grid, AxialCoord::ORIGIN, Team::Red);
        p.speed = 200.0;
        p.set_move_key(MoveKey::Up, true);
        for _ in 0..10 {
            p.tick(&grid, 20.0);
        }
        assert_eq!(p.cell, AxialCoord::ORIGIN);
        assert!(p.position.y > -20.0);
    }
}
