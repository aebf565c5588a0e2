//! Hex grid geometry and per-cell paint state
//!
//! Flat-top hexes addressed by axial `(q, r)` coordinates. Pixel space has its
//! origin at the grid centre, +x to the right and +y downwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// Team a player fights for; also the paint color of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    pub fn opponent(self) -> Self {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }
}

/// Integer hex-cell address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AxialCoord {
    pub q: i32,
    pub r: i32,
}

impl AxialCoord {
    pub const ORIGIN: AxialCoord = AxialCoord { q: 0, r: 0 };

    pub fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// Number of steps between two cells
    pub fn distance(&self, other: &AxialCoord) -> u32 {
        let dq = other.q - self.q;
        let dr = other.r - self.r;
        let ds = -dq - dr;
        dq.abs().max(dr.abs()).max(ds.abs()) as u32
    }
}

/// Continuous pixel-space position or offset
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CartCoord {
    pub x: f64,
    pub y: f64,
}

impl CartCoord {
    pub const ZERO: CartCoord = CartCoord { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

/// A single map cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HexCell {
    pub center: CartCoord,
    pub color: Option<Team>,
}

/// Cell whose color changed, as reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CellChange {
    pub cell: AxialCoord,
    pub center: CartCoord,
    pub color: Option<Team>,
}

/// The hex map. The set of cells is fixed at construction; only colors mutate.
#[derive(Debug, Clone)]
pub struct HexGrid {
    rings: i32,
    edge_length: f64,
    columns: BTreeMap<i32, BTreeMap<i32, HexCell>>,
}

impl HexGrid {
    /// Build every cell within `rings` of the origin
    pub fn generate(rings: u32, edge_length: f64) -> Self {
        let rings = i32::try_from(rings).unwrap_or(i32::MAX);
        let diag_scale = edge_length * SQRT_3 * (std::f64::consts::PI / 6.0).sin();
        let vert_scale = edge_length * SQRT_3;

        let mut columns = BTreeMap::new();
        for q in -rings..=rings {
            let (start, end) = if q < 0 {
                (-rings - q, rings)
            } else {
                (-rings, rings - q)
            };
            let y_start = diag_scale * q as f64 + vert_scale * start as f64;

            let column: BTreeMap<i32, HexCell> = (start..=end)
                .enumerate()
                .map(|(j, r)| {
                    let center = CartCoord::new(
                        edge_length * 1.5 * q as f64,
                        y_start + vert_scale * j as f64,
                    );
                    (r, HexCell { center, color: None })
                })
                .collect();
            columns.insert(q, column);
        }

        Self {
            rings,
            edge_length,
            columns,
        }
    }

    pub fn rings(&self) -> u32 {
        self.rings as u32
    }

    pub fn edge_length(&self) -> f64 {
        self.edge_length
    }

    pub fn cell_exists(&self, cell: AxialCoord) -> bool {
        self.get(cell).is_some()
    }

    pub fn get(&self, cell: AxialCoord) -> Option<&HexCell> {
        if cell.q.abs() > self.rings {
            return None;
        }
        self.columns.get(&cell.q).and_then(|column| column.get(&cell.r))
    }

    /// Pixel centre of a cell, `None` when off the map
    pub fn cartesian_of(&self, cell: AxialCoord) -> Option<CartCoord> {
        self.get(cell).map(|c| c.center)
    }

    /// Cell containing a pixel position (which may lie off the map)
    pub fn axial_of(&self, point: CartCoord) -> AxialCoord {
        let q = point.x * 2.0 / 3.0 / self.edge_length;
        let r = (-point.x / 3.0 + point.y * SQRT_3 / 3.0) / self.edge_length;
        cube_round(q, r)
    }

    /// Color every cell in the splash around `center`, returning only the cells
    /// whose color actually changed.
    ///
    /// The scan walks columns left to right. Columns left of the centre span
    /// `[r - i, r + radius]`, the rest span `[r - radius, r + 2 * radius - i]`,
    /// where `i` counts columns from the leftmost one. Clients select cells the
    /// same way, so this must not be swapped for a different range algorithm.
    pub fn paint(
        &mut self,
        center: AxialCoord,
        color: Option<Team>,
        radius: u32,
    ) -> Vec<CellChange> {
        let radius = i64::from(radius);
        let (cq, cr) = (i64::from(center.q), i64::from(center.r));
        let q_first = cq - radius;
        let mut changed = Vec::new();

        // Only columns that exist can change, so clip the scan to the map
        let rings = i64::from(self.rings);
        for q in q_first.max(-rings)..=(cq + radius).min(rings) {
            let i = q - q_first;
            let (r_start, r_end) = if q < cq {
                (cr - i, cr + radius)
            } else {
                (cr - radius, cr + 2 * radius - i)
            };
            let (Ok(q), Ok(r_start), Ok(r_end)) = (
                i32::try_from(q),
                i32::try_from(r_start.max(i64::from(i32::MIN))),
                i32::try_from(r_end.min(i64::from(i32::MAX))),
            ) else {
                continue;
            };
            if r_start > r_end {
                continue;
            }

            let Some(column) = self.columns.get_mut(&q) else {
                continue;
            };
            for (&r, cell) in column.range_mut(r_start..=r_end) {
                if cell.color != color {
                    cell.color = color;
                    changed.push(CellChange {
                        cell: AxialCoord::new(q, r),
                        center: cell.center,
                        color,
                    });
                }
            }
        }

        changed
    }

    /// Reset every cell to no color
    pub fn clear(&mut self) -> Vec<CellChange> {
        self.paint(AxialCoord::ORIGIN, None, self.rings as u32)
    }

    /// Cells a team spawns into once the match is running
    pub fn spawn_region(&self, team: Team) -> Vec<AxialCoord> {
        let edge = (self.rings + 1) / 2;
        if edge == 0 {
            return Vec::new();
        }
        self.cells()
            .map(|(cell, _)| cell)
            .filter(|cell| match team {
                Team::Red => cell.q <= -edge,
                Team::Blue => cell.q >= edge,
            })
            .collect()
    }

    /// Iterate every cell in column-major order
    pub fn cells(&self) -> impl Iterator<Item = (AxialCoord, &HexCell)> {
        self.columns.iter().flat_map(|(&q, column)| {
            column
                .iter()
                .map(move |(&r, cell)| (AxialCoord::new(q, r), cell))
        })
    }
}

/// Snap fractional axial coordinates to the nearest hex.
///
/// Rounds each cube axis independently, then recomputes the axis with the
/// largest rounding error from the other two so the result satisfies
/// `x + y + z == 0`.
fn cube_round(q: f64, r: f64) -> AxialCoord {
    let y = -q - r;
    let mut rx = round_half_up(q);
    let ry = round_half_up(y);
    let mut rz = round_half_up(r);

    let x_diff = (rx - q).abs();
    let y_diff = (ry - y).abs();
    let z_diff = (rz - r).abs();

    // y is implied by q and r, so correcting it leaves the result unchanged
    if x_diff > y_diff && x_diff > z_diff {
        rx = -ry - rz;
    } else if y_diff <= z_diff {
        rz = -rx - ry;
    }

    AxialCoord::new(rx as i32, rz as i32)
}

/// Ties go towards +inf, as browsers round, so points on a cell border land
/// in the same cell on both ends. `f64::round` sends -0.5 to -1.
fn round_half_up(v: f64) -> f64 {
    (v + 0.5).floor()
}

#[cfg(test)]
impl HexGrid {
    pub fn cell_count(&self) -> usize {
        self.columns.values().map(BTreeMap::len).sum()
    }
}
