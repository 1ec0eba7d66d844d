/// Entities: Player, Trap, Plate, plus the per-frame input the engine consumes.
/// Traps and plates are fixed to a cell; only their flags change during play.

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Facing {
    Up,
    Down,
    Left,
    Right,
}

impl Facing {
    /// Facing implied by a movement delta. The dominant axis wins;
    /// ties go to the horizontal axis. `None` for a zero delta.
    pub fn from_delta(dx: f32, dy: f32) -> Option<Facing> {
        if dx == 0.0 && dy == 0.0 {
            return None;
        }
        if dx.abs() >= dy.abs() {
            Some(if dx < 0.0 { Facing::Left } else { Facing::Right })
        } else {
            Some(if dy < 0.0 { Facing::Up } else { Facing::Down })
        }
    }
}

/// Discrete one-shot signals from the input layer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Signal {
    TogglePause,
    Resume,
    Restart,
    NewRun,
}

/// Frame input: movement is continuous (already scaled by speed and dt),
/// signals are edge-triggered and applied before the frame is simulated.
#[derive(Clone, Debug, Default)]
pub struct FrameInput {
    pub dx: f32,
    pub dy: f32,
    pub signals: Vec<Signal>,
}

impl FrameInput {
    pub fn movement(dx: f32, dy: f32) -> Self {
        FrameInput { dx, dy, signals: vec![] }
    }
}

#[derive(Clone, Debug)]
pub struct Player {
    /// World-space center of the hitbox.
    pub x: f32,
    pub y: f32,
    pub facing: Facing,
    pub lives: u32,
    /// Standing on the cell of a trap this player triggered.
    pub in_trap: bool,
    /// Standing on the plate that was pressed on entry.
    pub on_plate: bool,
}

impl Player {
    pub fn new(x: f32, y: f32, lives: u32) -> Self {
        Player {
            x,
            y,
            facing: Facing::Down,
            lives,
            in_trap: false,
            on_plate: false,
        }
    }

    /// Place the player at a fresh position and drop both edge flags.
    pub fn respawn_at(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
        self.facing = Facing::Down;
        self.in_trap = false;
        self.on_plate = false;
    }

    pub fn is_alive(&self) -> bool {
        self.lives > 0
    }
}

/// A trap cell. Hidden until the player comes close, fires once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trap {
    pub x: usize,
    pub y: usize,
    pub revealed: bool,
    pub triggered: bool,
}

impl Trap {
    pub fn new(x: usize, y: usize) -> Self {
        Trap { x, y, revealed: false, triggered: false }
    }

    /// Revealed and not yet consumed.
    pub fn is_armed(&self) -> bool {
        self.revealed && !self.triggered
    }
}

/// A pressure plate. Its index in `Grid::plates()` is its place in the sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plate {
    pub x: usize,
    pub y: usize,
    pub visible: bool,
    pub pressed: bool,
}

impl Plate {
    pub fn new(x: usize, y: usize) -> Self {
        Plate { x, y, visible: false, pressed: false }
    }

    /// Visible and waiting to be pressed.
    pub fn is_active(&self) -> bool {
        self.visible && !self.pressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facing_follows_dominant_axis() {
        assert_eq!(Facing::from_delta(0.0, 0.0), None);
        assert_eq!(Facing::from_delta(-2.0, 1.0), Some(Facing::Left));
        assert_eq!(Facing::from_delta(3.0, 0.0), Some(Facing::Right));
        assert_eq!(Facing::from_delta(0.5, -1.0), Some(Facing::Up));
        assert_eq!(Facing::from_delta(0.0, 4.0), Some(Facing::Down));
        // Exact diagonal: horizontal wins
        assert_eq!(Facing::from_delta(1.0, 1.0), Some(Facing::Right));
    }

    #[test]
    fn trap_lifecycle_flags() {
        let mut t = Trap::new(2, 1);
        assert!(!t.is_armed());
        t.revealed = true;
        assert!(t.is_armed());
        t.triggered = true;
        assert!(!t.is_armed());
    }

    #[test]
    fn respawn_clears_edge_flags() {
        let mut p = Player::new(10.0, 10.0, 3);
        p.in_trap = true;
        p.on_plate = true;
        p.facing = Facing::Left;
        p.respawn_at(60.0, 60.0);
        assert_eq!((p.x, p.y), (60.0, 60.0));
        assert!(!p.in_trap && !p.on_plate);
        assert_eq!(p.facing, Facing::Down);
        assert_eq!(p.lives, 3);
    }
}
