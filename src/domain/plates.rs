/// Plate subsystem: a strictly ordered sequence that unlocks the door.
///
/// Plates are numbered in row-major discovery order. Exactly one plate is
/// visible at a time (the lowest-index unpressed one). Stepping onto it
/// presses it and either shows the next plate or, for the last one, opens
/// the door. `Player::on_plate` makes a press fire on the entering frame
/// only; it clears as soon as the player's cell is no longer a Plate cell.

use tracing::debug;

use super::entity::Player;
use super::grid::Grid;
use super::physics::Geometry;
use super::tile::CellTag;

/// What a press did to the puzzle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlatePress {
    /// Another plate follows; it is now visible at `next`.
    NextRevealed { pressed: (usize, usize), next: (usize, usize) },
    /// Last plate pressed and the door at `door` is open.
    DoorOpened { pressed: (usize, usize), door: (usize, usize) },
    /// Last plate pressed on a level without a door.
    SequenceDone { pressed: (usize, usize) },
}

pub fn handle(grid: &mut Grid, geo: &Geometry, player: &mut Player) -> Option<PlatePress> {
    let here = geo
        .cell_of(grid, player.x, player.y)
        .filter(|&(cx, cy)| grid.query(cx, cy) == CellTag::Plate);

    let Some((cx, cy)) = here else {
        player.on_plate = false;
        return None;
    };
    if player.on_plate {
        return None;
    }

    let i = grid.active_plate()?;
    if (grid.plates()[i].x, grid.plates()[i].y) != (cx, cy) {
        return None;
    }

    grid.plate_mut(i).pressed = true;
    grid.set(cx, cy, CellTag::Empty);
    player.on_plate = true;
    debug!(index = i, x = cx, y = cy, "plate pressed");

    if let Some(next) = grid.plates().get(i + 1) {
        let (nx, ny) = (next.x, next.y);
        grid.plate_mut(i + 1).visible = true;
        grid.set(nx, ny, CellTag::Plate);
        return Some(PlatePress::NextRevealed { pressed: (cx, cy), next: (nx, ny) });
    }

    match grid.door() {
        Some((dx, dy)) => {
            grid.set(dx, dy, CellTag::Empty);
            debug!(x = dx, y = dy, "door opened");
            Some(PlatePress::DoorOpened { pressed: (cx, cy), door: (dx, dy) })
        }
        None => Some(PlatePress::SequenceDone { pressed: (cx, cy) }),
    }
}
