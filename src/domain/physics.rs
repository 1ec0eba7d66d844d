/// Collision layer: square hitbox vs. tile grid.
///
/// ## World space
///
/// Positions are continuous `f32` coordinates. Cell `(cx, cy)` covers
/// `[origin + c * cell_size, origin + (c + 1) * cell_size)` on each axis.
/// Conversion uses `floor`, so anything left of or above the origin maps
/// to a negative index and counts as outside the grid.
///
/// ## Blocking rule
///
/// The hitbox is a square of half-width `hitbox_half` around the candidate
/// centre. Each of its four corners is mapped to a cell independently:
///   - a corner outside `[0, width) × [0, height)` blocks
///   - a corner in a Wall or Door cell blocks
///
/// Straddling a wall corner therefore blocks even when the centre cell is
/// open. Movement is tested one axis at a time by the caller, which gives
/// wall sliding for free.

use super::grid::Grid;

// ══════════════════════════════════════════════════════════════
// Geometry
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    pub cell_size: f32,
    pub origin_x: f32,
    pub origin_y: f32,
    pub hitbox_half: f32,
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry { cell_size: 40.0, origin_x: 0.0, origin_y: 0.0, hitbox_half: 8.0 }
    }
}

impl Geometry {
    /// Signed cell index of a world point. `None` for non-finite input.
    #[inline]
    pub fn cell_index(&self, x: f32, y: f32) -> Option<(i64, i64)> {
        let fx = ((x - self.origin_x) / self.cell_size).floor();
        let fy = ((y - self.origin_y) / self.cell_size).floor();
        if !fx.is_finite() || !fy.is_finite() {
            return None;
        }
        Some((fx as i64, fy as i64))
    }

    /// Cell containing a world point, if it lies inside the grid.
    #[inline]
    pub fn cell_of(&self, grid: &Grid, x: f32, y: f32) -> Option<(usize, usize)> {
        let (cx, cy) = self.cell_index(x, y)?;
        grid.in_bounds(cx, cy).then_some((cx as usize, cy as usize))
    }

    /// World-space centre of a cell.
    #[inline]
    pub fn cell_center(&self, cx: usize, cy: usize) -> (f32, f32) {
        (
            self.origin_x + (cx as f32 + 0.5) * self.cell_size,
            self.origin_y + (cy as f32 + 0.5) * self.cell_size,
        )
    }
}

// ══════════════════════════════════════════════════════════════
// Blocking test
// ══════════════════════════════════════════════════════════════

/// Would a hitbox centred at `(x, y)` overlap a blocking or out-of-grid cell?
pub fn is_blocked(grid: &Grid, geo: &Geometry, x: f32, y: f32) -> bool {
    let h = geo.hitbox_half;
    let corners = [(x - h, y - h), (x + h, y - h), (x - h, y + h), (x + h, y + h)];
    corners.iter().any(|&(px, py)| match geo.cell_of(grid, px, py) {
        Some((cx, cy)) => grid.query(cx, cy).is_blocking(),
        None => true,
    })
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
