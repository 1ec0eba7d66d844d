/// Events emitted during a simulation frame.
/// The presentation layer consumes these for sound and status lines.

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    TrapRevealed { x: usize, y: usize },
    TrapTriggered { x: usize, y: usize, lives_left: u32 },
    PlatePressed { index: usize, x: usize, y: usize },
    PlateRevealed { x: usize, y: usize },
    DoorOpened { x: usize, y: usize },
    LevelAdvanced { level: usize },
    RunComplete,
    OutOfLives,
    OutOfTime,
    PauseChanged { paused: bool },
    LevelRestarted { level: usize },
    SpawnFailed { level: usize },
    LoadFailed { level: usize, reason: String },
}
