/// The step function: advances the world by one frame.
///
/// Processing order:
///   1. Signals (pause, restart, new run)
///   2. Freeze check (paused / failed / stalled / finished → no-op)
///   3. Level timer (time up → OutOfTime, rest of frame skipped)
///   4. Movement, X then Y, each gated by the collision test
///   5. Trap reveal, then trap trigger
///   6. Plate press
///   7. Door / level transition
///   8. Out-of-lives check

use tracing::{info, warn};

use crate::domain::entity::{Facing, FrameInput, Signal};
use crate::domain::physics;
use crate::domain::plates::{self, PlatePress};
use crate::domain::traps;
use super::event::GameEvent;
use super::level;
use super::world::{Phase, WorldState};

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

/// Advance by `dt` seconds with this frame's input.
pub fn advance(world: &mut WorldState, dt: f32, input: &FrameInput) -> Vec<GameEvent> {
    let mut events: Vec<GameEvent> = Vec::new();

    for &signal in &input.signals {
        apply_signal(world, signal, &mut events);
    }

    if world.is_frozen() { return events; }
    // Only the frame that reached the door reports the level complete
    world.level_complete = false;

    let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
    tick_message(world, dt);
    if resolve_timer(world, dt, &mut events) { return events; }

    resolve_movement(world, input.dx, input.dy);
    resolve_traps(world, &mut events);
    resolve_plates(world, &mut events);
    if resolve_door(world, &mut events) { return events; }
    resolve_lives(world, &mut events);

    events
}

/// Apply a one-shot signal. Also called by `advance` for queued signals.
pub fn apply_signal(world: &mut WorldState, signal: Signal, events: &mut Vec<GameEvent>) {
    match signal {
        Signal::TogglePause => {
            if world.phase == Phase::Playing {
                world.paused = !world.paused;
                events.push(GameEvent::PauseChanged { paused: world.paused });
            }
        }
        Signal::Resume => {
            if world.paused {
                world.paused = false;
                events.push(GameEvent::PauseChanged { paused: false });
            }
        }
        Signal::Restart => {
            if world.phase != Phase::RunComplete {
                restart_level(world, events);
            }
        }
        Signal::NewRun => {
            if world.is_run_complete() || world.is_failed() {
                new_run(world, events);
            }
        }
    }
}

/// Reset the current level's puzzle, refill lives, restart the timer.
pub fn restart_level(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    world.grid.reset();
    world.player.lives = world.engine.max_lives;
    world.elapsed = 0.0;
    world.paused = false;
    world.level_complete = false;
    world.phase = Phase::Playing;
    if !world.spawn_or_warn() {
        events.push(GameEvent::SpawnFailed { level: world.current_level });
    }
    world.set_message("Level restarted", 1.5);
    info!(level = world.current_level, "level restarted");
    events.push(GameEvent::LevelRestarted { level: world.current_level });
}

/// Back to the first level with full lives.
fn new_run(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    let lives = world.engine.max_lives;
    match level::load_level(world, 0, events) {
        Ok(()) => {
            world.player.lives = lives;
            info!("new run");
            events.push(GameEvent::LevelRestarted { level: 0 });
        }
        Err(e) => stall(world, 0, e.to_string(), events),
    }
}

// ══════════════════════════════════════════════════════════════
// Frame stages
// ══════════════════════════════════════════════════════════════

fn tick_message(world: &mut WorldState, dt: f32) {
    if world.message_timer > 0.0 {
        world.message_timer -= dt;
        if world.message_timer <= 0.0 {
            world.message_timer = 0.0;
            world.message.clear();
        }
    }
}

/// Returns true when the level timer ran out this frame.
fn resolve_timer(world: &mut WorldState, dt: f32, events: &mut Vec<GameEvent>) -> bool {
    let limit = world.engine.level_time_limit;
    world.elapsed += dt;
    if world.elapsed < limit { return false; }

    world.elapsed = limit;
    world.phase = Phase::OutOfTime;
    info!(level = world.current_level, "out of time");
    events.push(GameEvent::OutOfTime);
    true
}

/// Per-axis movement so the player slides along walls.
fn resolve_movement(world: &mut WorldState, dx: f32, dy: f32) {
    if let Some(f) = Facing::from_delta(dx, dy) {
        world.player.facing = f;
    }

    let geo = world.geometry();
    let (x, y) = world.player_pos();

    if dx != 0.0 && !physics::is_blocked(&world.grid, &geo, x + dx, y) {
        world.player.x = x + dx;
    }
    let x = world.player.x;
    if dy != 0.0 && !physics::is_blocked(&world.grid, &geo, x, y + dy) {
        world.player.y = y + dy;
    }
}

fn resolve_traps(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    let geo = world.geometry();
    let (px, py) = world.player_pos();

    for (x, y) in traps::reveal_near(&mut world.grid, &geo, px, py, world.engine.reveal_radius) {
        events.push(GameEvent::TrapRevealed { x, y });
    }

    if let Some((x, y)) = traps::handle(&mut world.grid, &geo, &mut world.player) {
        events.push(GameEvent::TrapTriggered { x, y, lives_left: world.player.lives });
    }
}

fn resolve_plates(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    let geo = world.geometry();
    let Some(press) = plates::handle(&mut world.grid, &geo, &mut world.player) else { return };

    let index = world.grid.plates_pressed() - 1;
    match press {
        PlatePress::NextRevealed { pressed: (x, y), next: (nx, ny) } => {
            events.push(GameEvent::PlatePressed { index, x, y });
            events.push(GameEvent::PlateRevealed { x: nx, y: ny });
        }
        PlatePress::DoorOpened { pressed: (x, y), door: (dx, dy) } => {
            events.push(GameEvent::PlatePressed { index, x, y });
            events.push(GameEvent::DoorOpened { x: dx, y: dy });
            world.set_message("The door is open!", 2.0);
        }
        PlatePress::SequenceDone { pressed: (x, y) } => {
            events.push(GameEvent::PlatePressed { index, x, y });
        }
    }
}

/// Returns true when the player left the level this frame.
fn resolve_door(world: &mut WorldState, events: &mut Vec<GameEvent>) -> bool {
    let Some(door) = world.grid.door() else { return false };
    if !world.grid.is_door_open() || world.player_cell() != Some(door) {
        return false;
    }

    world.level_complete = true;
    let next = world.current_level + 1;

    if next >= world.level_count() {
        world.phase = Phase::RunComplete;
        world.set_message("All levels cleared!", 5.0);
        info!(levels = world.level_count(), lives = world.lives(), "run complete");
        events.push(GameEvent::RunComplete);
        return true;
    }

    match level::load_level(world, next, events) {
        Ok(()) => events.push(GameEvent::LevelAdvanced { level: next }),
        Err(e) => stall(world, next, e.to_string(), events),
    }
    true
}

fn resolve_lives(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    if world.player.is_alive() { return; }
    world.phase = Phase::OutOfLives;
    info!(level = world.current_level, "out of lives");
    events.push(GameEvent::OutOfLives);
}

/// A level failed to load: stay where we are, frozen until restart.
fn stall(world: &mut WorldState, level: usize, reason: String, events: &mut Vec<GameEvent>) {
    warn!(level, "level load failed: {reason}");
    world.phase = Phase::Stalled;
    world.set_message(&format!("Cannot load level {}: {reason}", level + 1), f32::INFINITY);
    events.push(GameEvent::LoadFailed { level, reason });
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::domain::grid::tests::level_text;
    use crate::domain::tile::CellTag;
    use crate::sim::level::{start_run, LevelSource};
    use std::path::PathBuf;

    /// Leak test level text so it can live in an embedded source.
    fn source(name: &'static str, rows: &[&str]) -> LevelSource {
        let text: &'static str = Box::leak(level_text(rows).into_boxed_str());
        LevelSource::Embedded { name, text }
    }

    fn run_with(engine: EngineConfig, levels: Vec<LevelSource>) -> WorldState {
        start_run(engine, levels).unwrap()
    }

    fn run(levels: Vec<LevelSource>) -> WorldState {
        run_with(EngineConfig::default(), levels)
    }

    fn go(world: &mut WorldState, dx: f32, dy: f32) -> Vec<GameEvent> {
        advance(world, 0.016, &FrameInput::movement(dx, dy))
    }

    fn signal(world: &mut WorldState, s: Signal) -> Vec<GameEvent> {
        advance(world, 0.0, &FrameInput { dx: 0.0, dy: 0.0, signals: vec![s] })
    }

    /// Teleport to a cell centre and run one still frame.
    fn step_onto(world: &mut WorldState, cx: usize, cy: usize) -> Vec<GameEvent> {
        let (x, y) = world.geometry().cell_center(cx, cy);
        world.player.x = x;
        world.player.y = y;
        go(world, 0.0, 0.0)
    }

    // ── Movement ──

    #[test]
    fn slides_along_walls() {
        let mut w = run(vec![source("open", &["11111", "10001", "10001", "11111"])]);
        assert_eq!(w.player_pos(), (60.0, 60.0));
        // Up is blocked by the wall row, right is free: only x moves
        go(&mut w, 10.0, -20.0);
        assert_eq!(w.player_pos(), (70.0, 60.0));
        assert_eq!(w.facing(), Facing::Up);
    }

    #[test]
    fn blocked_move_keeps_position_but_turns() {
        let mut w = run(vec![source("box", &["111", "101", "111"])]);
        go(&mut w, -20.0, 0.0);
        assert_eq!(w.player_pos(), (60.0, 60.0));
        assert_eq!(w.facing(), Facing::Left);
        go(&mut w, 0.0, 0.0);
        assert_eq!(w.facing(), Facing::Left);
    }

    #[test]
    fn non_finite_movement_is_rejected() {
        let mut w = run(vec![source("open", &["0000"])]);
        go(&mut w, f32::NAN, f32::INFINITY);
        assert_eq!(w.player_pos(), (20.0, 20.0));
    }

    // ── Traps ──

    #[test]
    fn hidden_trap_is_free_revealed_trap_costs_one_life() {
        let engine = EngineConfig { reveal_radius: 5.0, ..EngineConfig::default() };
        let mut w = run_with(engine, vec![source("corridor", &["11111", "10021", "11111"])]);
        assert_eq!(w.player_pos(), (60.0, 60.0));

        // Onto the trap cell, far from its centre: still hidden
        let events = go(&mut w, 65.0, 0.0);
        assert_eq!(w.player_cell(), Some((3, 1)));
        assert!(events.is_empty());
        assert_eq!(w.lives(), 3);
        assert_eq!(w.cell(3, 1), CellTag::Empty);

        // To the centre: revealed and triggered in the same frame
        let events = go(&mut w, 15.0, 0.0);
        assert_eq!(events, vec![
            GameEvent::TrapRevealed { x: 3, y: 1 },
            GameEvent::TrapTriggered { x: 3, y: 1, lives_left: 2 },
        ]);
        assert_eq!(w.lives(), 2);
        assert_eq!(w.cell(3, 1), CellTag::Empty);

        // Pacing over it again costs nothing
        for _ in 0..10 {
            go(&mut w, -4.0, 0.0);
        }
        for _ in 0..10 {
            go(&mut w, 4.0, 0.0);
        }
        assert_eq!(w.lives(), 2);
    }

    #[test]
    fn trap_revealed_from_a_distance() {
        let mut w = run(vec![source("corridor", &["1111111", "1000021", "1111111"])]);
        // Trap centre (220,60); reveal radius 48
        let events = step_onto(&mut w, 4, 1);
        assert_eq!(events, vec![GameEvent::TrapRevealed { x: 5, y: 1 }]);
        assert_eq!(w.cell(5, 1), CellTag::Trap);
        assert_eq!(w.lives(), 3);
    }

    // ── Plates and doors ──

    fn plates_then_door() -> Vec<&'static str> {
        vec!["1111111", "1030301", "1111141"]
    }

    #[test]
    fn plate_sequence_opens_door_and_completes_run() {
        let mut w = run(vec![source("only", &plates_then_door())]);
        assert_eq!(w.plate_progress(), (0, 2));

        let events = step_onto(&mut w, 2, 1);
        assert_eq!(events, vec![
            GameEvent::PlatePressed { index: 0, x: 2, y: 1 },
            GameEvent::PlateRevealed { x: 4, y: 1 },
        ]);
        assert_eq!(w.cell(4, 1), CellTag::Plate);

        // Standing on the same plate does nothing; step off first
        assert!(step_onto(&mut w, 2, 1).is_empty());
        assert!(step_onto(&mut w, 3, 1).is_empty());
        let events = step_onto(&mut w, 4, 1);
        assert_eq!(events, vec![
            GameEvent::PlatePressed { index: 1, x: 4, y: 1 },
            GameEvent::DoorOpened { x: 5, y: 2 },
        ]);
        assert_eq!(w.door_state(), Some(((5, 2), true)));

        let events = step_onto(&mut w, 5, 2);
        assert_eq!(events, vec![GameEvent::RunComplete]);
        assert!(w.is_run_complete());
        assert!(w.level_complete);

        // Terminal: nothing moves any more
        let pos = w.player_pos();
        assert!(go(&mut w, -10.0, 0.0).is_empty());
        assert_eq!(w.player_pos(), pos);
        // Restart is refused once the run is won
        assert!(signal(&mut w, Signal::Restart).is_empty());
        assert!(w.is_run_complete());
    }

    #[test]
    fn door_advances_to_next_level() {
        let mut w = run(vec![
            source("one", &plates_then_door()),
            source("two", &["11111", "10041", "11111"]),
        ]);
        w.player.lives = 2;
        step_onto(&mut w, 2, 1);
        step_onto(&mut w, 3, 1);
        step_onto(&mut w, 4, 1);
        go(&mut w, 0.0, 0.0);
        assert!(w.elapsed > 0.0);

        let events = step_onto(&mut w, 5, 2);
        assert_eq!(events, vec![GameEvent::LevelAdvanced { level: 1 }]);
        assert_eq!(w.current_level, 1);
        assert_eq!(w.level_name, "two");
        assert_eq!(w.elapsed, 0.0);
        assert_eq!(w.lives(), 2);
        assert_eq!(w.player_cell(), Some((1, 1)));
        assert!(w.level_complete);
        // Second level has no plates: its door starts open
        assert_eq!(w.door_state(), Some(((3, 1), true)));

        // Cleared again on the next simulated frame
        go(&mut w, 0.0, 0.0);
        assert!(!w.level_complete);
    }

    #[test]
    fn closed_door_is_not_an_exit() {
        let mut w = run(vec![source("shut", &["0304"])]);
        step_onto(&mut w, 3, 0);
        assert_eq!(w.phase, Phase::Playing);
        assert!(!w.level_complete);
    }

    #[test]
    fn bad_next_level_stalls() {
        let mut w = run(vec![
            source("one", &["0004"]),
            LevelSource::File(PathBuf::from("/nonexistent/trapdoor/two.txt")),
        ]);
        let events = step_onto(&mut w, 3, 0);
        assert!(matches!(events.as_slice(), [GameEvent::LoadFailed { level: 1, .. }]));
        assert_eq!(w.phase, Phase::Stalled);
        assert_eq!(w.current_level, 0);
        assert!(w.status_message().is_some());
        // Frozen until restart
        let pos = w.player_pos();
        assert!(go(&mut w, -10.0, 0.0).is_empty());
        assert_eq!(w.player_pos(), pos);

        signal(&mut w, Signal::Restart);
        assert_eq!(w.phase, Phase::Playing);
        assert_eq!(w.player_cell(), Some((0, 0)));
    }

    // ── Failure states ──

    #[test]
    fn out_of_lives_freezes_until_restart() {
        let mut w = run(vec![source("traps", &["1111111", "1003001", "1022201", "1111141"])]);
        w.player.lives = 1;
        step_onto(&mut w, 3, 1); // press the plate so the grid has changed
        let events = step_onto(&mut w, 2, 2);
        assert!(events.contains(&GameEvent::TrapTriggered { x: 2, y: 2, lives_left: 0 }));
        assert_eq!(events.last(), Some(&GameEvent::OutOfLives));
        assert_eq!(w.phase, Phase::OutOfLives);

        let pos = w.player_pos();
        let cells = w.grid.current_cells().to_vec();
        let elapsed = w.elapsed;
        for _ in 0..5 {
            assert!(advance(&mut w, 1.0, &FrameInput::movement(10.0, 10.0)).is_empty());
        }
        assert_eq!(w.player_pos(), pos);
        assert_eq!(w.grid.current_cells(), cells.as_slice());
        assert_eq!(w.elapsed, elapsed);

        // Pause is meaningless here
        assert!(signal(&mut w, Signal::TogglePause).is_empty());

        let events = signal(&mut w, Signal::Restart);
        assert_eq!(events, vec![GameEvent::LevelRestarted { level: 0 }]);
        assert_eq!(w.phase, Phase::Playing);
        assert_eq!(w.lives(), 3);
        assert_eq!(w.elapsed, 0.0);
        assert_eq!(w.player_cell(), Some((1, 1)));
        assert_eq!(w.plate_progress(), (0, 1));
        assert_eq!(w.cell(3, 1), CellTag::Plate);
        assert_eq!(w.cell(2, 2), CellTag::Empty);
        assert!(w.grid.traps().iter().all(|t| !t.revealed && !t.triggered));
    }

    #[test]
    fn timer_runs_out_and_clamps() {
        let engine = EngineConfig { level_time_limit: 1.0, ..EngineConfig::default() };
        let mut w = run_with(engine, vec![source("open", &["00000"])]);
        advance(&mut w, 0.6, &FrameInput::movement(5.0, 0.0));
        assert_eq!(w.player_pos(), (25.0, 20.0));

        let events = advance(&mut w, 0.6, &FrameInput::movement(5.0, 0.0));
        assert_eq!(events, vec![GameEvent::OutOfTime]);
        assert_eq!(w.phase, Phase::OutOfTime);
        assert_eq!(w.elapsed, 1.0);
        assert_eq!(w.time_remaining(), 0.0);
        // The rest of that frame was skipped
        assert_eq!(w.player_pos(), (25.0, 20.0));

        advance(&mut w, 5.0, &FrameInput::default());
        assert_eq!(w.elapsed, 1.0);
    }

    #[test]
    fn pause_freezes_time_and_movement() {
        let mut w = run(vec![source("open", &["00000"])]);
        let events = signal(&mut w, Signal::TogglePause);
        assert_eq!(events, vec![GameEvent::PauseChanged { paused: true }]);

        advance(&mut w, 3.0, &FrameInput::movement(10.0, 0.0));
        assert_eq!(w.elapsed, 0.0);
        assert_eq!(w.player_pos(), (20.0, 20.0));

        // Resume applies before the frame runs
        advance(&mut w, 0.5, &FrameInput { dx: 10.0, dy: 0.0, signals: vec![Signal::Resume] });
        assert!(!w.paused);
        assert_eq!(w.elapsed, 0.5);
        assert_eq!(w.player_pos(), (30.0, 20.0));
    }

    #[test]
    fn new_run_only_after_the_end() {
        let mut w = run(vec![source("one", &["0004"]), source("two", &["0004"])]);
        w.player.lives = 1;
        assert!(signal(&mut w, Signal::NewRun).is_empty());

        step_onto(&mut w, 3, 0);
        assert_eq!(w.current_level, 1);
        step_onto(&mut w, 3, 0);
        assert!(w.is_run_complete());

        let events = signal(&mut w, Signal::NewRun);
        assert_eq!(events, vec![GameEvent::LevelRestarted { level: 0 }]);
        assert_eq!(w.current_level, 0);
        assert_eq!(w.lives(), 3);
        assert_eq!(w.phase, Phase::Playing);
    }

    #[test]
    fn restart_mid_level_restores_puzzle() {
        let mut w = run(vec![source("only", &plates_then_door())]);
        step_onto(&mut w, 2, 1);
        w.player.lives = 1;
        go(&mut w, 0.0, 0.0);
        let events = signal(&mut w, Signal::Restart);
        assert_eq!(events, vec![GameEvent::LevelRestarted { level: 0 }]);
        assert_eq!(w.plate_progress(), (0, 2));
        assert_eq!(w.cell(2, 1), CellTag::Plate);
        assert_eq!(w.cell(4, 1), CellTag::Empty);
        assert_eq!(w.lives(), 3);
    }
}
