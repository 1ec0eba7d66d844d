/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// Each maze cell is CELL_W terminal columns wide so cells look square.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::entity::Facing;
use crate::domain::tile::CellTag;
use crate::sim::world::{Phase, WorldState};
use super::camera::Camera;

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit dark background for every "empty" terminal cell. Using the
    /// same RGB for `Clear` and for cells keeps VTE terminals from showing
    /// lines between rows.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Never produced by compose; forces a full repaint when stored in `back`.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        let bg = match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        };
        Cell { ch, fg, bg }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn invalidate(&mut self) {
        self.cells.fill(Cell::INVALID);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    /// Write a string at (x, y). One column per char; clipped at the edge.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Cell::new(ch, fg, bg));
        }
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Cell::new(' ', Color::White, bg));
        }
    }
}

// ── Layout ──

const CELL_W: usize = 2;

const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;
/// HUD, gap, message bar, gap, help bar.
const RESERVED_ROWS: usize = MAP_ROW + 4;

// ── Palette ──

const HUD_BG: Color = Color::Rgb { r: 20, g: 20, b: 60 };
const FLOOR_BG: Color = Color::Rgb { r: 34, g: 34, b: 50 };
const WALL_FG: Color = Color::Rgb { r: 96, g: 96, b: 130 };
const TRAP_FG: Color = Color::Rgb { r: 255, g: 70, b: 70 };
const SPENT_FG: Color = Color::Rgb { r: 90, g: 60, b: 60 };
const PLATE_FG: Color = Color::Rgb { r: 255, g: 220, b: 50 };
const PLATE_BG: Color = Color::Rgb { r: 70, g: 60, b: 10 };
const DOOR_FG: Color = Color::Rgb { r: 230, g: 140, b: 60 };
const DOOR_BG: Color = Color::Rgb { r: 80, g: 40, b: 15 };
const OPEN_FG: Color = Color::Rgb { r: 80, g: 255, b: 120 };
const PLAYER_FG: Color = Color::Rgb { r: 100, g: 220, b: 255 };
const HURT_BG: Color = Color::Rgb { r: 110, g: 20, b: 20 };
const MSG_BG: Color = Color::Rgb { r: 200, g: 180, b: 50 };
const BOX_BG: Color = Color::Rgb { r: 40, g: 40, b: 40 };

/// Entries of the pause menu, top to bottom.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PauseItem {
    Continue,
    Restart,
    Quit,
}

impl PauseItem {
    pub const ALL: [PauseItem; 3] = [PauseItem::Continue, PauseItem::Restart, PauseItem::Quit];

    fn label(self) -> &'static str {
        match self {
            PauseItem::Continue => "Continue",
            PauseItem::Restart => "Restart Level",
            PauseItem::Quit => "Quit",
        }
    }
}

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    camera: Camera,
    /// Phase and level of the last frame; a change forces a repaint and
    /// re-centres the camera.
    last_shown: Option<(Phase, usize)>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            camera: Camera::new(),
            last_shown: None,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.resize_to(tw as usize, th as usize);
        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    /// Draw one frame. `pause_cursor` indexes `PauseItem::ALL`.
    pub fn render(&mut self, world: &WorldState, pause_cursor: usize) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.resize_to(tw as usize, th as usize);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        let shown = (world.phase, world.current_level);
        if self.last_shown != Some(shown) {
            self.back.invalidate();
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        self.compose(world, pause_cursor);
        self.flush_diff()?;

        // Current front becomes next back
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    fn resize_to(&mut self, w: usize, h: usize) {
        self.term_w = w;
        self.term_h = h;
        self.front.resize(w, h);
        self.back.resize(w, h);
        self.back.invalidate();
    }

    /// Fit the camera to the terminal and the maze, then aim it.
    fn update_camera(&mut self, w: &WorldState) {
        let max_view_h = self.term_h.saturating_sub(RESERVED_ROWS).max(1);
        self.camera.view_w = (self.term_w / CELL_W).min(w.width());
        self.camera.view_h = max_view_h.min(w.height());

        let target = w.player_cell().unwrap_or((0, 0));
        let shown = (w.phase, w.current_level);
        if self.last_shown != Some(shown) {
            self.camera.center_on(target, w.width(), w.height());
            self.last_shown = Some(shown);
        } else {
            self.camera.follow(target, w.width(), w.height());
        }
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        // Cursor position after the last print, if known
        let mut cursor_at: Option<(usize, usize)> = None;

        // Explicit base colours: ResetColor would fall back to the
        // terminal's own default, which may differ from BASE_BG.
        queue!(self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    continue;
                }

                if cursor_at != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }

                queue!(self.writer, Print(cell.ch))?;
                cursor_at = Some((x + 1, y));
            }
        }

        self.writer.flush()
    }

    // ── Compose: build front buffer content ──

    fn compose(&mut self, w: &WorldState, pause_cursor: usize) {
        self.update_camera(w);
        self.front.clear();

        self.compose_hud(w);
        self.compose_map(w);
        self.compose_bars(w);

        match w.phase {
            Phase::Playing if w.paused => self.compose_pause_menu(pause_cursor),
            Phase::Playing => {}
            Phase::OutOfLives => self.compose_dialog(
                "OUT OF LIVES",
                TRAP_FG,
                &[String::from("Every life is spent."), String::new()],
                &["ENTER  Restart level", "Q      Quit"],
            ),
            Phase::OutOfTime => self.compose_dialog(
                "TIME UP",
                TRAP_FG,
                &[format!("{:.0}s were not enough.", w.engine.level_time_limit), String::new()],
                &["ENTER  Restart level", "Q      Quit"],
            ),
            Phase::Stalled => self.compose_dialog(
                "NEXT LEVEL FAILED",
                DOOR_FG,
                &[w.message.clone(), String::new()],
                &["ENTER  Restart level", "Q      Quit"],
            ),
            Phase::RunComplete => self.compose_dialog(
                "ALL LEVELS CLEAR",
                PLATE_FG,
                &[
                    format!("{} levels, {} lives left.", w.level_count(), w.lives()),
                    String::new(),
                ],
                &["ENTER  New run", "Q      Quit"],
            ),
        }
    }

    fn compose_hud(&mut self, w: &WorldState) {
        let (pressed, total) = w.plate_progress();
        let door = match w.door_state() {
            _ if w.level_complete => "passed",
            Some((_, true)) => "OPEN",
            Some((_, false)) => "locked",
            None => "none",
        };
        let hud = format!(
            " Level {}/{} {:<16} \u{2665}\u{00d7}{}  Time {:>3}  Plates {}/{}  Door {}{}",
            w.current_level + 1,
            w.level_count(),
            w.level_name,
            w.lives(),
            w.time_remaining().ceil() as u32,
            pressed,
            total,
            door,
            if w.paused { "  [PAUSED]" } else { "" },
        );
        self.front.fill_row(HUD_ROW, HUD_BG);
        self.front.put_str(0, HUD_ROW, &hud, Color::White, HUD_BG);
    }

    fn compose_map(&mut self, w: &WorldState) {
        let player = w.player_cell();
        for vy in 0..self.camera.view_h {
            let row = MAP_ROW + vy;
            if row >= self.front.height { break; }
            for vx in 0..self.camera.view_w {
                let col = vx * CELL_W;
                if col + 1 >= self.front.width { break; }

                let glyph = match self.camera.view_to_world(vx, vy, w.width(), w.height()) {
                    None => (Cell::BLANK, Cell::BLANK),
                    Some(p) if Some(p) == player => player_glyph(w),
                    Some((x, y)) => tile_glyph(w, x, y),
                };
                self.front.set(col, row, glyph.0);
                self.front.set(col + 1, row, glyph.1);
            }
        }
    }

    fn compose_bars(&mut self, w: &WorldState) {
        let msg_row = MAP_ROW + self.camera.view_h + 1;
        if let Some(msg) = w.status_message().filter(|_| msg_row < self.front.height) {
            self.front.fill_row(msg_row, MSG_BG);
            self.front.put_str(0, msg_row, &format!(" \u{25c8} {msg} "), Color::Black, MSG_BG);
        }

        let help_row = MAP_ROW + self.camera.view_h + 3;
        if help_row < self.front.height {
            let help = " WASD/Arrows:Move  Esc/P:Pause  R:Restart  Q:Quit  \u{2502}  Pad: Start/Y/Select";
            self.front.put_str(0, help_row, help, Color::DarkGrey, Color::Reset);
        }
    }

    fn compose_pause_menu(&mut self, cursor: usize) {
        let items: Vec<String> = PauseItem::ALL
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let mark = if i == cursor { '\u{25b8}' } else { ' ' };
                format!("{mark} {}", item.label())
            })
            .collect();
        let items: Vec<&str> = items.iter().map(String::as_str).collect();
        self.compose_dialog("PAUSED", PLATE_FG, &[], &items);
    }

    /// A centred box over the map: title, body text, then key lines.
    fn compose_dialog(&mut self, title: &str, title_fg: Color, body: &[String], keys: &[&str]) {
        let key_fg = Color::Rgb { r: 100, g: 200, b: 255 };
        let body_fg = Color::Rgb { r: 200, g: 200, b: 200 };

        let text_w = body
            .iter()
            .map(|s| s.chars().count())
            .chain(keys.iter().map(|s| s.chars().count()))
            .chain(std::iter::once(title.chars().count()))
            .max()
            .unwrap_or(0);
        let box_w = (text_w + 6).min(self.front.width);
        let box_h = (body.len() + keys.len() + 4).min(self.front.height);

        let view_cols = (self.camera.view_w * CELL_W).max(box_w);
        let view_rows = self.camera.view_h.max(box_h);
        let box_x = (view_cols - box_w) / 2;
        let box_y = MAP_ROW + (view_rows - box_h) / 2;

        for y in box_y..box_y + box_h {
            for x in box_x..box_x + box_w {
                self.front.set(x, y, Cell::new(' ', Color::Reset, BOX_BG));
            }
        }

        let title_x = box_x + (box_w.saturating_sub(title.chars().count())) / 2;
        self.front.put_str(title_x, box_y + 1, title, title_fg, BOX_BG);
        let lines = body.iter().map(|s| (s.as_str(), body_fg)).chain(keys.iter().map(|s| (*s, key_fg)));
        for (i, (line, fg)) in lines.enumerate() {
            self.front.put_str(box_x + 3, box_y + 3 + i, line, fg, BOX_BG);
        }
    }
}

// ── Glyphs ──

fn pair(a: char, b: char, fg: Color, bg: Color) -> (Cell, Cell) {
    (Cell::new(a, fg, bg), Cell::new(b, fg, bg))
}

fn player_glyph(w: &WorldState) -> (Cell, Cell) {
    let bg = if w.player.in_trap { HURT_BG } else { FLOOR_BG };
    let (a, b) = match w.facing() {
        Facing::Up => ('\u{25cf}', '\u{2191}'),
        Facing::Down => ('\u{25cf}', '\u{2193}'),
        Facing::Left => ('\u{2190}', '\u{25cf}'),
        Facing::Right => ('\u{25cf}', '\u{2192}'),
    };
    pair(a, b, PLAYER_FG, bg)
}

fn tile_glyph(w: &WorldState, x: usize, y: usize) -> (Cell, Cell) {
    match w.cell(x, y) {
        CellTag::Wall => pair('\u{2588}', '\u{2588}', WALL_FG, FLOOR_BG),
        CellTag::Trap => pair('^', '^', TRAP_FG, FLOOR_BG),
        CellTag::Plate => pair('[', ']', PLATE_FG, PLATE_BG),
        CellTag::Door => pair('\u{2590}', '\u{258c}', DOOR_FG, DOOR_BG),
        CellTag::Empty => {
            if w.door_state().is_some_and(|(d, _)| d == (x, y)) {
                pair('\u{2591}', '\u{2591}', OPEN_FG, FLOOR_BG)
            } else if w.grid.traps().iter().any(|t| t.triggered && (t.x, t.y) == (x, y)) {
                pair('.', '.', SPENT_FG, FLOOR_BG)
            } else {
                pair(' ', ' ', Color::White, FLOOR_BG)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::sim::level::{start_run, LevelSource};

    fn world(text: &'static str) -> WorldState {
        start_run(EngineConfig::default(), vec![LevelSource::Embedded { name: "t", text }]).unwrap()
    }

    fn renderer(w: usize, h: usize) -> Renderer {
        let mut r = Renderer::new();
        r.resize_to(w, h);
        r
    }

    fn row_text(r: &Renderer, y: usize) -> String {
        (0..r.front.width).map(|x| r.front.get(x, y).ch).collect()
    }

    fn screen_text(r: &Renderer) -> String {
        (0..r.front.height).map(|y| row_text(r, y)).collect::<Vec<_>>().join("\n")
    }

    const LEVEL: &str = "5 3\n1 1 1 1 1\n1 0 3 4 1\n1 1 1 1 1\n";

    #[test]
    fn hud_shows_progress() {
        let w = world(LEVEL);
        let mut r = renderer(80, 24);
        r.compose(&w, 0);
        let hud = row_text(&r, HUD_ROW);
        assert!(hud.contains("Level 1/1 t"), "{hud}");
        assert!(hud.contains("\u{2665}\u{00d7}3"));
        assert!(hud.contains("Time 120"));
        assert!(hud.contains("Plates 0/1"));
        assert!(hud.contains("Door locked"));
    }

    #[test]
    fn hud_marks_passed_door() {
        let mut w = world(LEVEL);
        w.level_complete = true;
        w.phase = Phase::RunComplete;
        let mut r = renderer(80, 24);
        r.compose(&w, 0);
        assert!(row_text(&r, HUD_ROW).contains("Door passed"));
    }

    #[test]
    fn maze_is_centred_and_drawn() {
        let w = world(LEVEL);
        let mut r = renderer(80, 24);
        r.compose(&w, 0);
        // 5 cells fit, so the camera does not scroll
        assert_eq!((r.camera.x, r.camera.y), (0, 0));
        let middle = row_text(&r, MAP_ROW + 1);
        assert!(middle.starts_with("\u{2588}\u{2588}\u{25cf}\u{2193}[]\u{2590}\u{258c}\u{2588}\u{2588}"), "{middle}");
    }

    #[test]
    fn large_maze_scrolls_with_player() {
        let text: &'static str = Box::leak(
            format!("60 3\n{}\n0{}4\n{}\n", "1 ".repeat(60), " 0".repeat(58) + " ", "1 ".repeat(60))
                .into_boxed_str(),
        );
        let mut w = world(text);
        let mut r = renderer(40, 24);
        r.compose(&w, 0);
        assert_eq!(r.camera.x, 0);
        assert_eq!(r.camera.view_w, 20);

        let (x, y) = w.geometry().cell_center(50, 1);
        w.player.x = x;
        w.player.y = y;
        r.compose(&w, 0);
        assert!(r.camera.world_to_view(50, 1).is_some());
    }

    #[test]
    fn overlays_follow_phase() {
        let mut w = world(LEVEL);
        let mut r = renderer(80, 24);

        w.paused = true;
        r.compose(&w, 1);
        let screen = screen_text(&r);
        assert!(screen.contains("PAUSED"));
        assert!(screen.contains("\u{25b8} Restart Level"));
        assert!(screen.contains("  Continue"));

        w.paused = false;
        w.phase = Phase::OutOfLives;
        r.compose(&w, 0);
        assert!(screen_text(&r).contains("ENTER  Restart level"));

        w.phase = Phase::RunComplete;
        r.compose(&w, 0);
        assert!(screen_text(&r).contains("ENTER  New run"));
    }

    #[test]
    fn tiny_terminal_does_not_panic() {
        let mut w = world(LEVEL);
        w.phase = Phase::OutOfTime;
        let mut r = renderer(6, 3);
        r.compose(&w, 0);
        let mut r = renderer(0, 0);
        r.compose(&w, 0);
    }
}
