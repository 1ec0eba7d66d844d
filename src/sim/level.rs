/// Level sources and loading.
///
/// ## Sources (priority order):
///   1. Level files named on the command line, in the order given
///   2. `levels/` directory (`*.txt`, sorted by file name)
///   3. Built-in embedded levels
///
/// All three go through the same parser (`Grid::parse`). A load swaps the
/// world's Grid only after the new one parsed cleanly, so a broken file
/// never leaves a half-loaded level behind.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::domain::grid::{Grid, LoadError};
use super::event::GameEvent;
use super::world::{Phase, WorldState};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LevelSource {
    File(PathBuf),
    Embedded { name: &'static str, text: &'static str },
}

impl LevelSource {
    /// Display name: the file stem, or the built-in title.
    pub fn name(&self) -> String {
        match self {
            LevelSource::File(path) => path
                .file_stem()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string(),
            LevelSource::Embedded { name, .. } => name.to_string(),
        }
    }

    pub fn load(&self) -> Result<Grid, LoadError> {
        match self {
            LevelSource::File(path) => Grid::load(path),
            LevelSource::Embedded { text, .. } => Grid::parse(text),
        }
    }
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error("no levels to play")]
    NoLevels,
    #[error("level {name}: {source}")]
    Load {
        name: String,
        #[source]
        source: LoadError,
    },
}

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

/// Build the run's level list.
pub fn discover_levels(cli_files: &[PathBuf], levels_dir: &Path) -> Vec<LevelSource> {
    if !cli_files.is_empty() {
        return cli_files.iter().cloned().map(LevelSource::File).collect();
    }

    let files = load_from_directory(levels_dir);
    if !files.is_empty() {
        info!("{} levels from {}", files.len(), levels_dir.display());
        return files;
    }

    debug!("no level files in {}; using built-in levels", levels_dir.display());
    embedded_levels()
}

/// Load level 0 and spawn the player: the start of a run.
pub fn start_run(engine: EngineConfig, levels: Vec<LevelSource>) -> Result<WorldState, StartError> {
    let first = levels.first().ok_or(StartError::NoLevels)?;
    let grid = first
        .load()
        .map_err(|source| StartError::Load { name: first.name(), source })?;
    warn_if_doorless(&grid, &first.name());

    let mut world = WorldState::new(engine, levels, grid);
    world.spawn_or_warn();
    let name = world.level_name.clone();
    world.set_message(&name, 2.5);
    info!(level = 0, name = %name, "run started");
    Ok(world)
}

/// Swap in level `idx`. Lives are kept; the level timer restarts.
/// On error the world is untouched.
pub fn load_level(world: &mut WorldState, idx: usize, events: &mut Vec<GameEvent>) -> Result<(), LoadError> {
    let source = &world.levels[idx];
    let grid = source.load()?;
    let name = source.name();
    warn_if_doorless(&grid, &name);

    world.grid = grid;
    world.current_level = idx;
    world.level_name = name;
    world.elapsed = 0.0;
    world.paused = false;
    world.phase = Phase::Playing;
    if !world.spawn_or_warn() {
        events.push(GameEvent::SpawnFailed { level: idx });
    }

    let msg = format!("Level {}: {}", idx + 1, world.level_name);
    world.set_message(&msg, 2.5);
    info!(level = idx, name = %world.level_name, "level loaded");
    Ok(())
}

/// Parse every source without touching any world. For `--check`.
pub fn check_levels(levels: &[LevelSource]) -> Vec<(String, Result<Grid, LoadError>)> {
    levels.iter().map(|l| (l.name(), l.load())).collect()
}

fn warn_if_doorless(grid: &Grid, name: &str) {
    if grid.door().is_none() {
        warn!("level {name} has no door and cannot be completed");
    }
}

// ══════════════════════════════════════════════════════════════
// Directory loading (individual .txt files)
// ══════════════════════════════════════════════════════════════

fn load_from_directory(dir: &Path) -> Vec<LevelSource> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return vec![],
    };

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().map_or(false, |e| e == "txt"))
        .collect();
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    paths.into_iter().map(LevelSource::File).collect()
}

// ══════════════════════════════════════════════════════════════
// Embedded fallback levels
// ══════════════════════════════════════════════════════════════

pub fn embedded_levels() -> Vec<LevelSource> {
    vec![
        LevelSource::Embedded {
            name: "First Steps",
            text: include_str!("../../levels/01-first-steps.txt"),
        },
        LevelSource::Embedded {
            name: "Crossroads",
            text: include_str!("../../levels/02-crossroads.txt"),
        },
        LevelSource::Embedded {
            name: "Long Way Round",
            text: include_str!("../../levels/03-long-way-round.txt"),
        },
    ]
}
