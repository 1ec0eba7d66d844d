/// Gamepad input tracker using gilrs.
///
/// Button mapping comes from the `[gamepad]` config section via
/// `load_button_config()`. Default mapping:
///   D-pad / Left Stick    →  Movement (stick is analog)
///   Start                 →  Pause
///   Y                     →  Restart level
///   A                     →  Confirm
///   Select                →  Quit

#[cfg(feature = "gamepad")]
use gilrs::{Axis, Button, EventType, Gilrs};
use tracing::warn;

use crate::config::GamepadConfig;

const STICK_DEADZONE: f32 = 0.25;

/// Logical button identifiers (one per physical button).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Btn {
    A,       // South
    B,       // East
    X,       // West
    Y,       // North
    L1,
    R1,
    Start,
    Select,
    Mode,
}

const BTN_COUNT: usize = 9;

impl Btn {
    fn from_name(s: &str) -> Option<Btn> {
        match s.to_uppercase().as_str() {
            "A" | "SOUTH" => Some(Btn::A),
            "B" | "EAST" => Some(Btn::B),
            "X" | "WEST" => Some(Btn::X),
            "Y" | "NORTH" => Some(Btn::Y),
            "L1" | "LB" | "LEFTTRIGGER" => Some(Btn::L1),
            "R1" | "RB" | "RIGHTTRIGGER" => Some(Btn::R1),
            "START" => Some(Btn::Start),
            "SELECT" | "BACK" => Some(Btn::Select),
            "MODE" | "GUIDE" | "HOME" => Some(Btn::Mode),
            _ => None,
        }
    }

    #[cfg(feature = "gamepad")]
    fn from_gilrs(btn: Button) -> Option<Btn> {
        match btn {
            Button::South => Some(Btn::A),
            Button::East => Some(Btn::B),
            Button::West => Some(Btn::X),
            Button::North => Some(Btn::Y),
            Button::LeftTrigger => Some(Btn::L1),
            Button::RightTrigger => Some(Btn::R1),
            Button::Start => Some(Btn::Start),
            Button::Select => Some(Btn::Select),
            Button::Mode => Some(Btn::Mode),
            _ => None,
        }
    }
}

/// Per-button state: held (continuous) and just_pressed (edge).
#[derive(Clone, Copy, Debug, Default)]
struct BtnState {
    held: bool,
    just_pressed: bool,
}

impl BtnState {
    fn set(&mut self, held: bool) {
        if held && !self.held {
            self.just_pressed = true;
        }
        self.held = held;
    }
}

/// Action-to-button mapping (loaded from config).
#[derive(Debug, PartialEq)]
struct ActionMap {
    pause: Vec<Btn>,
    restart: Vec<Btn>,
    confirm: Vec<Btn>,
    quit: Vec<Btn>,
}

impl Default for ActionMap {
    fn default() -> Self {
        ActionMap {
            pause: vec![Btn::Start],
            restart: vec![Btn::Y],
            confirm: vec![Btn::A],
            quit: vec![Btn::Select],
        }
    }
}

impl ActionMap {
    /// Unknown names are skipped; an action left with no buttons keeps
    /// its default.
    fn from_config(cfg: &GamepadConfig) -> Self {
        fn parse_list(action: &str, names: &[String], fallback: Vec<Btn>) -> Vec<Btn> {
            let btns: Vec<Btn> = names
                .iter()
                .filter_map(|s| {
                    let b = Btn::from_name(s);
                    if b.is_none() {
                        warn!("gamepad.{action}: unknown button {s:?}");
                    }
                    b
                })
                .collect();
            if btns.is_empty() { fallback } else { btns }
        }
        let d = ActionMap::default();
        ActionMap {
            pause: parse_list("pause", &cfg.pause, d.pause),
            restart: parse_list("restart", &cfg.restart, d.restart),
            confirm: parse_list("confirm", &cfg.confirm, d.confirm),
            quit: parse_list("quit", &cfg.quit, d.quit),
        }
    }
}

/// D-pad directions, in `dpad` array order.
#[derive(Clone, Copy)]
enum Pad {
    Up,
    Down,
    Left,
    Right,
}

pub struct GamepadState {
    #[cfg(feature = "gamepad")]
    gilrs: Option<Gilrs>,

    buttons: [BtnState; BTN_COUNT],
    dpad: [BtnState; 4],
    stick_x: f32,
    stick_y: f32,

    action_map: ActionMap,

    pub connected: bool,
}

impl GamepadState {
    pub fn new() -> Self {
        #[cfg(feature = "gamepad")]
        let (gilrs_opt, connected) = match Gilrs::new() {
            Ok(g) => {
                let has_pad = g.gamepads().next().is_some();
                (Some(g), has_pad)
            }
            Err(e) => {
                warn!("gamepad support unavailable: {e}");
                (None, false)
            }
        };
        #[cfg(not(feature = "gamepad"))]
        let connected = false;

        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs: gilrs_opt,
            buttons: [BtnState::default(); BTN_COUNT],
            dpad: [BtnState::default(); 4],
            stick_x: 0.0,
            stick_y: 0.0,
            action_map: ActionMap::default(),
            connected,
        }
    }

    pub fn load_button_config(&mut self, cfg: &GamepadConfig) {
        self.action_map = ActionMap::from_config(cfg);
    }

    /// Poll pending gamepad events. Call once per frame.
    pub fn update(&mut self) {
        for b in self.buttons.iter_mut().chain(self.dpad.iter_mut()) {
            b.just_pressed = false;
        }

        #[cfg(feature = "gamepad")]
        self.poll_gilrs();
    }

    #[cfg(feature = "gamepad")]
    fn poll_gilrs(&mut self) {
        let Some(gilrs) = &mut self.gilrs else { return };
        let events: Vec<_> = std::iter::from_fn(|| gilrs.next_event()).collect();

        for event in events {
            match event.event {
                EventType::ButtonPressed(btn, _) => {
                    self.connected = true;
                    self.set_button(btn, true);
                }
                EventType::ButtonReleased(btn, _) => self.set_button(btn, false),
                EventType::AxisChanged(Axis::LeftStickX, value, _) => self.stick_x = value,
                EventType::AxisChanged(Axis::LeftStickY, value, _) => self.stick_y = value,
                EventType::Connected => self.connected = true,
                EventType::Disconnected => {
                    self.connected = false;
                    self.release_all();
                }
                _ => {}
            }
        }
    }

    #[cfg(feature = "gamepad")]
    fn set_button(&mut self, gilrs_btn: Button, held: bool) {
        let pad = match gilrs_btn {
            Button::DPadUp => Some(Pad::Up),
            Button::DPadDown => Some(Pad::Down),
            Button::DPadLeft => Some(Pad::Left),
            Button::DPadRight => Some(Pad::Right),
            _ => None,
        };
        if let Some(p) = pad {
            self.dpad[p as usize].set(held);
        } else if let Some(btn) = Btn::from_gilrs(gilrs_btn) {
            self.buttons[btn as usize].set(held);
        }
    }

    // ── Action queries (config-driven) ──

    fn any_just_pressed(&self, btns: &[Btn]) -> bool {
        btns.iter().any(|&b| self.buttons[b as usize].just_pressed)
    }

    pub fn pause_pressed(&self) -> bool {
        self.any_just_pressed(&self.action_map.pause)
    }
    pub fn restart_pressed(&self) -> bool {
        self.any_just_pressed(&self.action_map.restart)
    }
    pub fn confirm_pressed(&self) -> bool {
        self.any_just_pressed(&self.action_map.confirm)
    }
    pub fn quit_pressed(&self) -> bool {
        self.any_just_pressed(&self.action_map.quit)
    }

    /// D-pad edges, for menu navigation.
    pub fn menu_up_pressed(&self) -> bool {
        self.dpad[Pad::Up as usize].just_pressed
    }
    pub fn menu_down_pressed(&self) -> bool {
        self.dpad[Pad::Down as usize].just_pressed
    }

    /// Movement vector in screen orientation (y grows downwards).
    /// The D-pad gives full deflection; otherwise the stick is analog.
    pub fn direction(&self) -> (f32, f32) {
        let held = |p: Pad| self.dpad[p as usize].held;
        let dx = f32::from(held(Pad::Right) as u8) - f32::from(held(Pad::Left) as u8);
        let dy = f32::from(held(Pad::Down) as u8) - f32::from(held(Pad::Up) as u8);
        if dx != 0.0 || dy != 0.0 {
            return (dx, dy);
        }
        stick_vector(self.stick_x, self.stick_y)
    }

    // ── Internal ──

    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    fn release_all(&mut self) {
        self.buttons = [BtnState::default(); BTN_COUNT];
        self.dpad = [BtnState::default(); 4];
        self.stick_x = 0.0;
        self.stick_y = 0.0;
    }
}

/// Apply the dead zone per axis and flip Y (gilrs reports up as positive).
fn stick_vector(x: f32, y: f32) -> (f32, f32) {
    let dz = |v: f32| if v.abs() < STICK_DEADZONE { 0.0 } else { v.clamp(-1.0, 1.0) };
    (dz(x), -dz(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn button_names_are_case_insensitive() {
        assert_eq!(Btn::from_name("start"), Some(Btn::Start));
        assert_eq!(Btn::from_name("South"), Some(Btn::A));
        assert_eq!(Btn::from_name("back"), Some(Btn::Select));
        assert_eq!(Btn::from_name("Guide"), Some(Btn::Mode));
        assert_eq!(Btn::from_name("Z"), None);
    }

    #[test]
    fn config_overrides_and_fallbacks() {
        let cfg = GamepadConfig {
            pause: names(&["Mode", "Start"]),
            restart: names(&["bogus"]),
            confirm: vec![],
            quit: names(&["B"]),
        };
        let map = ActionMap::from_config(&cfg);
        assert_eq!(map.pause, vec![Btn::Mode, Btn::Start]);
        assert_eq!(map.restart, vec![Btn::Y]);
        assert_eq!(map.confirm, vec![Btn::A]);
        assert_eq!(map.quit, vec![Btn::B]);
    }

    #[test]
    fn stick_has_dead_zone_and_flipped_y() {
        assert_eq!(stick_vector(0.1, -0.2), (0.0, 0.0));
        assert_eq!(stick_vector(0.5, 0.8), (0.5, -0.8));
        assert_eq!(stick_vector(-1.5, -1.0), (-1.0, 1.0));
    }

    #[test]
    fn dpad_beats_stick() {
        let mut gp = GamepadState::new();
        gp.stick_x = 0.6;
        assert_eq!(gp.direction(), (0.6, 0.0));
        gp.dpad[Pad::Left as usize].set(true);
        gp.dpad[Pad::Up as usize].set(true);
        assert_eq!(gp.direction(), (-1.0, -1.0));
        assert!(gp.menu_up_pressed());
    }

    #[test]
    fn edges_clear_each_frame() {
        let mut gp = GamepadState::new();
        gp.buttons[Btn::Start as usize].set(true);
        assert!(gp.pause_pressed());
        gp.update();
        assert!(!gp.pause_pressed());
        gp.buttons[Btn::Start as usize].set(true);
        assert!(!gp.pause_pressed());
    }
}
