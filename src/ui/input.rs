/// Keyboard state tracker.
///
/// Terminals report key presses, not key state, so "held" is derived:
///   - With keyboard enhancement, explicit Release events end a hold.
///   - Otherwise a key counts as held until HOLD_TIMEOUT passes without
///     a Press/Repeat event for it.
///
/// Movement reads held keys every frame; pause/restart/confirm read
/// fresh presses only, so holding R restarts once.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// After this long without a Press/Repeat event, the key is released.
/// Only used when the terminal doesn't report Release events.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

// ── Key bindings ──

pub const KEYS_UP: &[KeyCode] = &[KeyCode::Up, KeyCode::Char('w'), KeyCode::Char('W')];
pub const KEYS_DOWN: &[KeyCode] = &[KeyCode::Down, KeyCode::Char('s'), KeyCode::Char('S')];
pub const KEYS_LEFT: &[KeyCode] = &[KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A')];
pub const KEYS_RIGHT: &[KeyCode] = &[KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D')];
pub const KEYS_PAUSE: &[KeyCode] = &[KeyCode::Esc, KeyCode::Char('p'), KeyCode::Char('P')];
pub const KEYS_RESTART: &[KeyCode] = &[KeyCode::Char('r'), KeyCode::Char('R')];
pub const KEYS_CONFIRM: &[KeyCode] = &[KeyCode::Enter, KeyCode::Char(' ')];
pub const KEYS_QUIT: &[KeyCode] = &[KeyCode::Char('q'), KeyCode::Char('Q')];

pub struct InputState {
    /// Timestamp of the last Press/Repeat event per key.
    last_active: HashMap<KeyCode, Instant>,

    /// Keys that went from released to held during the last drain.
    fresh_presses: Vec<KeyCode>,

    /// Ctrl+C seen during the last drain.
    ctrl_c: bool,

    /// Honour Release events. Only set once keyboard enhancement is on.
    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            fresh_presses: Vec::with_capacity(8),
            ctrl_c: false,
            honor_release: false,
        }
    }

    /// Drain all pending terminal events. Call once per frame.
    pub fn drain_events(&mut self) {
        self.begin_frame();

        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                self.record(key, Instant::now());
            }
        }

        self.expire(Instant::now());
    }

    fn begin_frame(&mut self) {
        self.fresh_presses.clear();
        self.ctrl_c = false;
    }

    fn record(&mut self, key: KeyEvent, now: Instant) {
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
        {
            self.ctrl_c = true;
            return;
        }

        match key.kind {
            KeyEventKind::Release if self.honor_release => {
                self.last_active.remove(&key.code);
            }
            // Without enhancement, rely on the timeout instead
            KeyEventKind::Release => {}
            _ => {
                let was_held = self.held_at(key.code, now);
                self.last_active.insert(key.code, now);
                if !was_held {
                    self.fresh_presses.push(key.code);
                }
            }
        }
    }

    fn expire(&mut self, now: Instant) {
        self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
    }

    /// Is any of these keys held?
    pub fn any_held(&self, codes: &[KeyCode]) -> bool {
        let now = Instant::now();
        codes.iter().any(|c| self.held_at(*c, now))
    }

    /// Was any of these keys freshly pressed this frame?
    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.fresh_presses.contains(c))
    }

    pub fn ctrl_c_pressed(&self) -> bool {
        self.ctrl_c
    }

    /// Unit movement direction from held (or just pressed) arrow/WASD keys.
    /// Opposite keys cancel; diagonals are not normalised.
    pub fn direction(&self) -> (f32, f32) {
        let on = |keys: &[KeyCode]| self.any_held(keys) || self.any_pressed(keys);
        let axis = |neg: bool, pos: bool| match (neg, pos) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        };
        (
            axis(on(KEYS_LEFT), on(KEYS_RIGHT)),
            axis(on(KEYS_UP), on(KEYS_DOWN)),
        )
    }

    // ── Internal ──

    fn held_at(&self, code: KeyCode, now: Instant) -> bool {
        self.last_active
            .get(&code)
            .map_or(false, |t| now.duration_since(*t) < HOLD_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn key(code: KeyCode, kind: KeyEventKind) -> KeyEvent {
        KeyEvent { code, modifiers: KeyModifiers::NONE, kind, state: KeyEventState::NONE }
    }

    fn press(input: &mut InputState, code: KeyCode) {
        input.record(key(code, KeyEventKind::Press), Instant::now());
    }

    #[test]
    fn first_press_is_fresh_repeat_is_not() {
        let mut input = InputState::new();
        input.begin_frame();
        press(&mut input, KeyCode::Char('r'));
        assert!(input.any_pressed(KEYS_RESTART));

        input.begin_frame();
        input.record(key(KeyCode::Char('r'), KeyEventKind::Repeat), Instant::now());
        assert!(!input.any_pressed(KEYS_RESTART));
        assert!(input.any_held(KEYS_RESTART));
    }

    #[test]
    fn release_honoured_only_with_enhancement() {
        let mut input = InputState::new();
        press(&mut input, KeyCode::Left);
        input.record(key(KeyCode::Left, KeyEventKind::Release), Instant::now());
        assert!(input.any_held(KEYS_LEFT));

        input.honor_release = true;
        input.record(key(KeyCode::Left, KeyEventKind::Release), Instant::now());
        assert!(!input.any_held(KEYS_LEFT));
    }

    #[test]
    fn holds_expire_after_timeout() {
        let mut input = InputState::new();
        let then = Instant::now();
        input.record(key(KeyCode::Up, KeyEventKind::Press), then);
        input.expire(then + HOLD_TIMEOUT);
        assert!(!input.any_held(KEYS_UP));
    }

    #[test]
    fn direction_combines_axes() {
        let mut input = InputState::new();
        press(&mut input, KeyCode::Char('w'));
        press(&mut input, KeyCode::Right);
        assert_eq!(input.direction(), (1.0, -1.0));

        // Opposites cancel
        press(&mut input, KeyCode::Char('a'));
        assert_eq!(input.direction(), (0.0, -1.0));
    }

    #[test]
    fn ctrl_c_is_not_a_key_press() {
        let mut input = InputState::new();
        let mut ev = key(KeyCode::Char('c'), KeyEventKind::Press);
        ev.modifiers = KeyModifiers::CONTROL;
        input.record(ev, Instant::now());
        assert!(input.ctrl_c_pressed());
        assert!(!input.any_pressed(&[KeyCode::Char('c')]));
        input.begin_frame();
        assert!(!input.ctrl_c_pressed());
    }
}
