/// WorldState: the complete snapshot of a running game.
///
/// ## Ownership
///
/// The world owns the Grid (both cell layers plus trap/plate metadata) and
/// the Player, and is the only place their lifecycles are tied together:
/// a level load swaps the Grid wholesale, a restart resets it in place,
/// and both respawn the player.
///
/// ## Phases
///
/// ```text
///   Playing ──lives 0──▶ OutOfLives ─┐
///      │  ──time up──▶ OutOfTime  ──┼──Restart──▶ Playing
///      │  ──bad next level──▶ Stalled┘
///      └──door on last level──▶ RunComplete ──NewRun──▶ Playing (level 0)
/// ```
///
/// Every phase other than `Playing` freezes the simulation, and so does
/// the pause flag.

use thiserror::Error;
use tracing::warn;

use crate::config::EngineConfig;
use crate::domain::entity::{Facing, Player};
use crate::domain::grid::Grid;
use crate::domain::physics::Geometry;
use crate::domain::tile::CellTag;
use super::level::LevelSource;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Playing,
    OutOfLives,
    OutOfTime,
    /// The next level failed to load; the player stays on the current one.
    Stalled,
    RunComplete,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpawnError {
    #[error("level {level} has no empty cell to spawn in")]
    NoEmptyCell { level: usize },
}

pub struct WorldState {
    // ── Level ──
    pub grid: Grid,
    pub levels: Vec<LevelSource>,
    pub current_level: usize,
    pub level_name: String,

    // ── Entities ──
    pub player: Player,

    // ── Settings ──
    pub engine: EngineConfig,

    // ── Meta ──
    pub phase: Phase,
    pub paused: bool,
    /// Seconds spent on the current level. Never exceeds the limit.
    pub elapsed: f32,
    /// The player walked through the open door this frame. Cleared by the
    /// next simulated frame; stays set once the run is complete.
    pub level_complete: bool,

    // ── UI ──
    pub message: String,
    pub message_timer: f32, // seconds
}

// ── Construction ──

impl WorldState {
    /// A fresh run on `grid`, which must be the loaded form of `levels[0]`.
    pub fn new(engine: EngineConfig, levels: Vec<LevelSource>, grid: Grid) -> Self {
        let level_name = levels.first().map(LevelSource::name).unwrap_or_default();
        let lives = engine.max_lives;
        WorldState {
            grid,
            levels,
            current_level: 0,
            level_name,
            player: Player::new(0.0, 0.0, lives),
            engine,
            phase: Phase::Playing,
            paused: false,
            elapsed: 0.0,
            level_complete: false,
            message: String::new(),
            message_timer: 0.0,
        }
    }

    /// Place the player at the centre of the first empty cell of the layout.
    /// On failure the previous position is kept.
    pub fn spawn(&mut self) -> Result<(), SpawnError> {
        let (cx, cy) = self
            .grid
            .first_empty()
            .ok_or(SpawnError::NoEmptyCell { level: self.current_level })?;
        let (x, y) = self.geometry().cell_center(cx, cy);
        self.player.respawn_at(x, y);
        Ok(())
    }

    /// `spawn`, logging instead of failing.
    pub(crate) fn spawn_or_warn(&mut self) -> bool {
        match self.spawn() {
            Ok(()) => true,
            Err(e) => {
                warn!("{e}; keeping previous position");
                false
            }
        }
    }

    pub fn set_message(&mut self, msg: &str, seconds: f32) {
        self.message = msg.to_string();
        self.message_timer = seconds;
    }
}

// ── Read-only queries (renderer / frontend) ──

impl WorldState {
    pub fn geometry(&self) -> Geometry {
        self.engine.geometry()
    }

    /// Simulation is frozen: paused, failed, stalled or finished.
    pub fn is_frozen(&self) -> bool {
        self.paused || self.phase != Phase::Playing
    }

    pub fn is_run_complete(&self) -> bool {
        self.phase == Phase::RunComplete
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.phase, Phase::OutOfLives | Phase::OutOfTime | Phase::Stalled)
    }

    pub fn width(&self) -> usize {
        self.grid.width()
    }

    pub fn height(&self) -> usize {
        self.grid.height()
    }

    pub fn cell(&self, x: usize, y: usize) -> CellTag {
        self.grid.query(x, y)
    }

    pub fn player_pos(&self) -> (f32, f32) {
        (self.player.x, self.player.y)
    }

    pub fn facing(&self) -> Facing {
        self.player.facing
    }

    /// Cell under the player's centre, if inside the grid.
    pub fn player_cell(&self) -> Option<(usize, usize)> {
        self.geometry().cell_of(&self.grid, self.player.x, self.player.y)
    }

    pub fn lives(&self) -> u32 {
        self.player.lives
    }

    pub fn time_remaining(&self) -> f32 {
        (self.engine.level_time_limit - self.elapsed).max(0.0)
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// `(pressed, total)` plates on this level.
    pub fn plate_progress(&self) -> (usize, usize) {
        (self.grid.plates_pressed(), self.grid.plates().len())
    }

    /// Door cell and whether it is open.
    pub fn door_state(&self) -> Option<((usize, usize), bool)> {
        self.grid.door().map(|d| (d, self.grid.is_door_open()))
    }

    pub fn status_message(&self) -> Option<&str> {
        (self.message_timer > 0.0 && !self.message.is_empty()).then_some(self.message.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::grid::tests::grid_from;

    fn world(rows: &[&str]) -> WorldState {
        let grid = grid_from(rows);
        WorldState::new(EngineConfig::default(), vec![], grid)
    }

    #[test]
    fn spawn_uses_first_truly_empty_cell() {
        let mut w = world(&["1111", "1203", "1111"]);
        w.spawn().unwrap();
        // (1,1) is a hidden trap, (2,1) is the first empty cell
        assert_eq!(w.player_pos(), (100.0, 60.0));
        assert_eq!(w.player_cell(), Some((2, 1)));
        assert_eq!(w.facing(), Facing::Down);
    }

    #[test]
    fn spawn_failure_keeps_position() {
        let mut w = world(&["11", "14"]);
        w.player.x = 5.0;
        w.player.y = 7.0;
        assert_eq!(w.spawn(), Err(SpawnError::NoEmptyCell { level: 0 }));
        assert!(!w.spawn_or_warn());
        assert_eq!(w.player_pos(), (5.0, 7.0));
    }

    #[test]
    fn queries_reflect_state() {
        let mut w = world(&["0304"]);
        assert_eq!((w.width(), w.height()), (4, 1));
        assert_eq!(w.lives(), 3);
        assert_eq!(w.plate_progress(), (0, 1));
        assert_eq!(w.door_state(), Some(((3, 0), false)));
        assert_eq!(w.cell(1, 0), CellTag::Plate);
        w.elapsed = 100.0;
        assert_eq!(w.time_remaining(), 20.0);
        w.elapsed = 500.0;
        assert_eq!(w.time_remaining(), 0.0);
    }

    #[test]
    fn frozen_in_every_phase_but_playing() {
        let mut w = world(&["00"]);
        assert!(!w.is_frozen());
        w.paused = true;
        assert!(w.is_frozen());
        w.paused = false;
        for phase in [Phase::OutOfLives, Phase::OutOfTime, Phase::Stalled, Phase::RunComplete] {
            w.phase = phase;
            assert!(w.is_frozen());
        }
        assert!(w.is_run_complete());
        w.phase = Phase::Stalled;
        assert!(w.is_failed());
    }

    #[test]
    fn status_message_expires() {
        let mut w = world(&["00"]);
        assert_eq!(w.status_message(), None);
        w.set_message("Level 1", 2.0);
        assert_eq!(w.status_message(), Some("Level 1"));
        w.message_timer = 0.0;
        assert_eq!(w.status_message(), None);
    }
}
