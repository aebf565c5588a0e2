//! Combat system - projectiles, cooldowns, splash damage

use uuid::Uuid;

use super::hex::{AxialCoord, CartCoord, HexGrid, Team};

/// A shot travelling from its launch point to the centre of a target cell
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub team: Team,
    pub position: CartCoord,
    /// Offset still to travel
    pub remaining: CartCoord,
    pub target: AxialCoord,
    /// Fraction of the trip completed, 0..=1
    pub progress: f64,
    target_position: CartCoord,
    total_distance: f64,
}

impl Projectile {
    /// Create a projectile aimed at `target`. Returns `None` if the cell is off the map.
    pub fn launch(
        owner_id: Uuid,
        team: Team,
        start: CartCoord,
        target: AxialCoord,
        grid: &HexGrid,
    ) -> Option<Self> {
        let target_position = grid.cartesian_of(target)?;
        let remaining = CartCoord::new(target_position.x - start.x, target_position.y - start.y);

        Some(Self {
            id: Uuid::new_v4(),
            owner_id,
            team,
            position: start,
            remaining,
            target,
            progress: 0.0,
            target_position,
            total_distance: remaining.length(),
        })
    }

    pub fn has_arrived(&self) -> bool {
        self.progress >= 1.0
    }

    /// Advance one tick. Returns true on the tick the projectile arrives.
    ///
    /// The final step snaps exactly onto the cell centre instead of moving by
    /// the full step, so the projectile never overshoots.
    pub fn tick(&mut self, speed: f64, ticks_per_second: f64) -> bool {
        if self.has_arrived() {
            return false;
        }

        let step = speed / ticks_per_second;
        let distance_left = self.remaining.length();

        if distance_left > step {
            let dx = self.remaining.x * step / distance_left;
            let dy = self.remaining.y * step / distance_left;
            self.position.x += dx;
            self.position.y += dy;
            self.remaining.x -= dx;
            self.remaining.y -= dy;

            let travelled = self.total_distance - self.remaining.length();
            self.progress = (travelled / self.total_distance).clamp(self.progress, 1.0);
            false
        } else {
            self.position = self.target_position;
            self.remaining = CartCoord::ZERO;
            self.progress = 1.0;
            true
        }
    }
}

/// Combat system for cooldowns and damage rules
pub struct CombatSystem;

impl CombatSystem {
    /// Whether a weapon last fired at `last_shot_ms` may fire again at `now_ms`
    pub fn cooldown_elapsed(last_shot_ms: Option<u64>, now_ms: u64, cooldown_ms: u64) -> bool {
        match last_shot_ms {
            Some(last) => now_ms >= last.saturating_add(cooldown_ms),
            None => true,
        }
    }

    /// Health lost by a player `distance` cells from an impact
    pub fn splash_damage(distance: u32) -> i32 {
        match distance {
            0 => 2,
            1 => 1,
            _ => 0,
        }
    }

    /// Whether `target` is a valid shot for a firer standing on `origin`
    pub fn in_range(origin: AxialCoord, target: AxialCoord, range: u32) -> bool {
        origin.distance(&target) <= range
    }
}
