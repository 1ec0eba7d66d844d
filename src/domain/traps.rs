/// Trap subsystem: proximity reveal, then a one-shot trigger.
///
/// Lifecycle of a single trap (per level attempt):
///
/// ```text
///   hidden ──(player within radius)──▶ revealed ──(player on cell)──▶ triggered
/// ```
///
/// A hidden trap is Empty in the current layer and harmless. Reveal is
/// monotonic. Triggering costs one life and clears the cell; only a grid
/// reset re-arms it.

use tracing::debug;

use super::entity::Player;
use super::grid::Grid;
use super::physics::Geometry;
use super::tile::CellTag;

/// Reveal every hidden trap whose cell centre lies within `radius` of the
/// player. Returns the newly revealed cells.
pub fn reveal_near(grid: &mut Grid, geo: &Geometry, px: f32, py: f32, radius: f32) -> Vec<(usize, usize)> {
    let r2 = radius * radius;
    let mut revealed = Vec::new();

    for i in 0..grid.traps().len() {
        let t = &grid.traps()[i];
        if t.revealed {
            continue;
        }
        let (tx, ty) = (t.x, t.y);
        let (cx, cy) = geo.cell_center(tx, ty);
        let (ddx, ddy) = (px - cx, py - cy);
        if ddx * ddx + ddy * ddy <= r2 {
            grid.trap_mut(i).revealed = true;
            grid.set(tx, ty, CellTag::Trap);
            debug!(x = tx, y = ty, "trap revealed");
            revealed.push((tx, ty));
        }
    }

    revealed
}

/// Fire an armed trap under the player, if any. Returns the triggered cell.
pub fn handle(grid: &mut Grid, geo: &Geometry, player: &mut Player) -> Option<(usize, usize)> {
    let here = geo.cell_of(grid, player.x, player.y);
    let idx = here.and_then(|(cx, cy)| grid.traps().iter().position(|t| t.x == cx && t.y == cy));

    let Some(i) = idx else {
        player.in_trap = false;
        return None;
    };
    if !grid.traps()[i].is_armed() {
        return None;
    }

    let (tx, ty) = (grid.traps()[i].x, grid.traps()[i].y);
    grid.trap_mut(i).triggered = true;
    grid.set(tx, ty, CellTag::Empty);
    player.lives = player.lives.saturating_sub(1);
    player.in_trap = true;
    debug!(x = tx, y = ty, lives = player.lives, "trap triggered");
    Some((tx, ty))
}
