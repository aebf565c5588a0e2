//! Player movement: key state, heading, and boundary-checked stepping

use std::f64::consts::FRAC_1_SQRT_2;

use crate::ws::protocol::MoveKey;

use super::hex::{CartCoord, HexGrid};

/// Held movement keys. Opposing keys are mutually exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveKeys {
    pub up: bool,
    pub left: bool,
    pub down: bool,
    pub right: bool,
}

impl MoveKeys {
    /// Apply a key edge. Pressing a key releases its opposite.
    /// Returns true if any key changed state.
    pub fn set(&mut self, key: MoveKey, pressed: bool) -> bool {
        let before = *self;
        let (this, opposite) = match key {
            MoveKey::Up => (&mut self.up, &mut self.down),
            MoveKey::Down => (&mut self.down, &mut self.up),
            MoveKey::Left => (&mut self.left, &mut self.right),
            MoveKey::Right => (&mut self.right, &mut self.left),
        };
        if pressed {
            *opposite = false;
        }
        *this = pressed;
        *self != before
    }

    /// Heading for the held keys: a unit vector, or zero when idle.
    /// Diagonals are scaled so they are as fast as cardinal moves.
    pub fn direction(&self) -> CartCoord {
        let y = if self.up {
            -1.0
        } else if self.down {
            1.0
        } else {
            0.0
        };
        let x = if self.left {
            -1.0
        } else if self.right {
            1.0
        } else {
            0.0
        };

        if x != 0.0 && y != 0.0 {
            CartCoord::new(x * FRAC_1_SQRT_2, y * FRAC_1_SQRT_2)
        } else {
            CartCoord::new(x, y)
        }
    }
}

/// Physics system for updating player positions
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Position after one tick of travel along `direction`
    pub fn predict_position(
        position: CartCoord,
        direction: CartCoord,
        speed: f64,
        ticks_per_second: f64,
    ) -> CartCoord {
        let step = speed / ticks_per_second;
        CartCoord::new(
            position.x + direction.x * step,
            position.y + direction.y * step,
        )
    }

    /// Move one tick if the destination stays on the map.
    /// Returns the new position, or `None` when the step would leave the grid;
    /// there is no sliding along the edge.
    pub fn step(
        grid: &HexGrid,
        position: CartCoord,
        direction: CartCoord,
        speed: f64,
        ticks_per_second: f64,
    ) -> Option<CartCoord> {
        if direction.is_zero() {
            return None;
        }
        let next = Self::predict_position(position, direction, speed, ticks_per_second);
        grid.cell_exists(grid.axial_of(next)).then_some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite_keys_are_exclusive() {
        let mut keys = MoveKeys::default();
        assert!(keys.set(MoveKey::Up, true));
        assert!(keys.set(MoveKey::Down, true));
        assert!(!keys.up);
        assert!(keys.down);

        assert!(keys.set(MoveKey::Left, true));
        assert!(keys.set(MoveKey::Right, true));
        assert!(!keys.left);
        assert!(keys.right);
    }

    #[test]
    fn test_redundant_edges_do_not_toggle() {
        let mut keys = MoveKeys::default();
        assert!(!keys.set(MoveKey::Up, false));
        assert!(keys.set(MoveKey::Up, true));
        assert!(!keys.set(MoveKey::Up, true));
        // releasing a key that was cleared by its opposite changes nothing
        keys.set(MoveKey::Down, true);
        assert!(!keys.set(MoveKey::Up, false));
    }

    #[test]
    fn test_direction_components() {
        let mut keys = MoveKeys::default();
        assert_eq!(keys.direction(), CartCoord::ZERO);

        keys.set(MoveKey::Up, true);
        assert_eq!(keys.direction(), CartCoord::new(0.0, -1.0));

        keys.set(MoveKey::Up, false);
        keys.set(MoveKey::Right, true);
        assert_eq!(keys.direction(), CartCoord::new(1.0, 0.0));
    }

    #[test]
    fn test_diagonal_is_normalized() {
        let mut keys = MoveKeys::default();
        keys.set(MoveKey::Down, true);
        keys.set(MoveKey::Left, true);
        let dir = keys.direction();
        assert!((dir.length() - 1.0).abs() < 1e-12);
        assert!(dir.x < 0.0 && dir.y > 0.0);
    }

    #[test]
    fn test_step_inside_map() {
        let grid = HexGrid::generate(3, 20.0);
        let heading = CartCoord::new(1.0, 0.0);
        let next = PhysicsSystem::step(&grid, CartCoord::ZERO, heading, 60.0, 20.0);
        assert_eq!(next, Some(CartCoord::new(3.0, 0.0)));
    }

    #[test]
    fn test_step_blocked_at_boundary() {
        let grid = HexGrid::generate(0, 20.0);
        // the single cell has an inner radius of ~17.3px
        let edge = CartCoord::new(15.0, 0.0);
        let next = PhysicsSystem::step(&grid, edge, CartCoord::new(1.0, 0.0), 200.0, 20.0);
        assert_eq!(next, None);
    }

    #[test]
    fn test_idle_does_not_move() {
        let grid = HexGrid::generate(1, 20.0);
        assert_eq!(
            PhysicsSystem::step(&grid, CartCoord::ZERO, CartCoord::ZERO, 60.0, 20.0),
            None
        );
    }
}
