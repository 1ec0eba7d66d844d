/// Grid: the maze layout and its puzzle metadata.
///
/// ## Layers
///
/// Two cell layers of identical size, stored as flat row-major buffers
/// (`index = y * width + x`):
///   - `original`: the level as parsed. **Never mutated** after load.
///   - `current`: what the player sees and collides with.
///
/// `current` is never trusted as-is after a copy: every load and every
/// reset replays discovery over `original`, which hides traps and all
/// plates but the first. Both buffers are created together in `from_cells`
/// and only ever overwritten in place afterwards.
///
/// ## Level text format
///
/// ```text
/// 5 3
/// 1 1 1 1 1
/// 1 0 0 2 1
/// 1 1 1 1 1
/// ```
///
/// First line `width height`, then `height` rows of `width` tag codes
/// (`0=Empty 1=Wall 2=Trap 3=Plate 4=Door`). Blank lines are skipped.

use std::path::Path;

use thiserror::Error;

use super::entity::{Plate, Trap};
use super::tile::CellTag;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("missing `width height` header")]
    MissingHeader,
    #[error("line {line}: expected `width height`, got {text:?}")]
    BadDimensions { line: usize, text: String },
    #[error("grid must be at least 1x1, got {width}x{height}")]
    ZeroSize { width: usize, height: usize },
    #[error("{width}x{height} grid is too large")]
    TooLarge { width: usize, height: usize },
    #[error("line {line}: row {row} has {found} cells, expected {expected}")]
    ShortRow { line: usize, row: usize, found: usize, expected: usize },
    #[error("line {line}: row {row} has {found} cells, expected {expected}")]
    LongRow { line: usize, row: usize, found: usize, expected: usize },
    #[error("expected {expected} rows, found {found}")]
    MissingRows { expected: usize, found: usize },
    #[error("line {line}: {token:?} is not an integer")]
    BadToken { line: usize, token: String },
    #[error("line {line}: unknown cell tag {code}")]
    UnknownTag { line: usize, code: i64 },
    #[error("second door at ({x}, {y}); a level has at most one door")]
    MultipleDoors { x: usize, y: usize },
    #[error("line {line}: unexpected data after the last row")]
    TrailingData { line: usize },
}

#[derive(Clone, Debug)]
pub struct Grid {
    width: usize,
    height: usize,
    original: Vec<CellTag>,
    current: Vec<CellTag>,
    traps: Vec<Trap>,
    plates: Vec<Plate>,
    door: Option<(usize, usize)>,
}

// ── Construction ──

impl Grid {
    /// Read and parse a level file. Nothing is returned on failure.
    pub fn load(path: &Path) -> Result<Grid, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Grid::parse(&text)
    }

    /// Parse level text. See the module docs for the format.
    pub fn parse(text: &str) -> Result<Grid, LoadError> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty());

        let (header_line, header) = lines.next().ok_or(LoadError::MissingHeader)?;
        let (width, height) = parse_dimensions(header_line, header)?;

        // Grows row by row: the header alone is not trusted for sizing
        let mut cells = Vec::new();
        let mut door: Option<(usize, usize)> = None;

        for row in 0..height {
            let (line, text) = lines
                .next()
                .ok_or(LoadError::MissingRows { expected: height, found: row })?;
            let tokens: Vec<&str> = text.split_whitespace().collect();
            if tokens.len() < width {
                return Err(LoadError::ShortRow { line, row, found: tokens.len(), expected: width });
            }
            if tokens.len() > width {
                return Err(LoadError::LongRow { line, row, found: tokens.len(), expected: width });
            }
            for (x, token) in tokens.iter().enumerate() {
                let code: i64 = token
                    .parse()
                    .map_err(|_| LoadError::BadToken { line, token: token.to_string() })?;
                let tag = CellTag::from_code(code).ok_or(LoadError::UnknownTag { line, code })?;
                if tag == CellTag::Door {
                    if door.is_some() {
                        return Err(LoadError::MultipleDoors { x, y: row });
                    }
                    door = Some((x, row));
                }
                cells.push(tag);
            }
        }

        if let Some((line, _)) = lines.next() {
            return Err(LoadError::TrailingData { line });
        }

        Ok(Grid::from_cells(width, height, cells))
    }

    /// Build both layers from validated cells and run discovery.
    pub(crate) fn from_cells(width: usize, height: usize, cells: Vec<CellTag>) -> Grid {
        debug_assert_eq!(cells.len(), width * height);
        let mut grid = Grid {
            width,
            height,
            current: cells.clone(),
            original: cells,
            traps: vec![],
            plates: vec![],
            door: None,
        };
        grid.discover();
        grid
    }

    /// Restore the initial puzzle state. Calling it twice changes nothing.
    pub fn reset(&mut self) {
        self.current.copy_from_slice(&self.original);
        for t in &mut self.traps {
            t.revealed = false;
            t.triggered = false;
        }
        for p in &mut self.plates {
            p.visible = false;
            p.pressed = false;
        }
        self.discover();
    }

    /// Rebuild trap/plate/door records from `original` (row-major order)
    /// and hide everything that must start hidden in `current`.
    fn discover(&mut self) {
        self.traps.clear();
        self.plates.clear();
        self.door = None;

        for y in 0..self.height {
            for x in 0..self.width {
                match self.original[y * self.width + x] {
                    CellTag::Trap => {
                        self.traps.push(Trap::new(x, y));
                        self.current[y * self.width + x] = CellTag::Empty;
                    }
                    CellTag::Plate => {
                        self.plates.push(Plate::new(x, y));
                        self.current[y * self.width + x] = CellTag::Empty;
                    }
                    CellTag::Door => self.door = Some((x, y)),
                    _ => {}
                }
            }
        }

        match self.plates.first_mut() {
            Some(first) => {
                first.visible = true;
                let (x, y) = (first.x, first.y);
                self.current[y * self.width + x] = CellTag::Plate;
            }
            // Nothing to press: the door starts open
            None => {
                if let Some((x, y)) = self.door {
                    self.current[y * self.width + x] = CellTag::Empty;
                }
            }
        }
    }
}

// ── Queries ──

impl Grid {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// Cell in the current layer. Callers bounds-check first.
    #[inline]
    pub fn query(&self, x: usize, y: usize) -> CellTag {
        assert!(x < self.width && y < self.height, "cell ({x}, {y}) outside {}x{}", self.width, self.height);
        self.current[y * self.width + x]
    }

    /// Cell as loaded, before any discovery or gameplay.
    #[cfg(test)]
    pub fn original_at(&self, x: usize, y: usize) -> CellTag {
        assert!(x < self.width && y < self.height, "cell ({x}, {y}) outside {}x{}", self.width, self.height);
        self.original[y * self.width + x]
    }

    pub fn traps(&self) -> &[Trap] {
        &self.traps
    }

    pub fn plates(&self) -> &[Plate] {
        &self.plates
    }

    pub fn door(&self) -> Option<(usize, usize)> {
        self.door
    }

    /// True once the door cell is passable in the current layer.
    pub fn is_door_open(&self) -> bool {
        match self.door {
            Some((x, y)) => self.query(x, y) == CellTag::Empty,
            None => false,
        }
    }

    /// Index of the plate waiting to be pressed, if any.
    pub fn active_plate(&self) -> Option<usize> {
        self.plates.iter().position(Plate::is_active)
    }

    pub fn plates_pressed(&self) -> usize {
        self.plates.iter().filter(|p| p.pressed).count()
    }

    /// First truly empty cell of the layout, row-major. Hidden traps and
    /// plates are Empty in `current`, so the scan runs over `original`.
    pub fn first_empty(&self) -> Option<(usize, usize)> {
        self.original
            .iter()
            .position(|&c| c == CellTag::Empty)
            .map(|i| (i % self.width, i / self.width))
    }

    /// The current layer, row-major. Used to compare puzzle states.
    pub fn current_cells(&self) -> &[CellTag] {
        &self.current
    }
}

// ── Mutation (subsystems only) ──

impl Grid {
    #[inline]
    pub(crate) fn set(&mut self, x: usize, y: usize, tag: CellTag) {
        assert!(x < self.width && y < self.height, "cell ({x}, {y}) outside {}x{}", self.width, self.height);
        self.current[y * self.width + x] = tag;
    }

    pub(crate) fn trap_mut(&mut self, idx: usize) -> &mut Trap {
        &mut self.traps[idx]
    }

    pub(crate) fn plate_mut(&mut self, idx: usize) -> &mut Plate {
        &mut self.plates[idx]
    }
}

fn parse_dimensions(line: usize, text: &str) -> Result<(usize, usize), LoadError> {
    let bad = || LoadError::BadDimensions { line, text: text.to_string() };
    let mut parts = text.split_whitespace();
    let width: usize = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let height: usize = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    if parts.next().is_some() {
        return Err(bad());
    }
    if width == 0 || height == 0 {
        return Err(LoadError::ZeroSize { width, height });
    }
    if width.checked_mul(height).is_none() {
        return Err(LoadError::TooLarge { width, height });
    }
    Ok((width, height))
}
