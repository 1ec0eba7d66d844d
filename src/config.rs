/// External configuration loader.
///
/// Reads `config.toml` from an explicit path, or searches the executable's
/// directory, the CWD and the data directories. Missing files and missing
/// keys fall back to defaults; out-of-range values are logged and replaced.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::physics::Geometry;

// ── Public Config Structs ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub engine: EngineConfig,
    pub input: InputConfig,
    pub gamepad: GamepadConfig,
    pub levels_dir: PathBuf,
}

/// Gameplay constants consumed by the engine.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub cell_size: f32,
    pub max_lives: u32,
    pub reveal_radius: f32,
    pub level_time_limit: f32, // seconds
    pub hitbox_half: f32,
    pub origin_x: f32,
    pub origin_y: f32,
}

impl EngineConfig {
    pub fn geometry(&self) -> Geometry {
        Geometry {
            cell_size: self.cell_size,
            origin_x: self.origin_x,
            origin_y: self.origin_y,
            hitbox_half: self.hitbox_half,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let e = TomlEngine::default();
        EngineConfig {
            cell_size: e.cell_size,
            max_lives: e.max_lives,
            reveal_radius: e.reveal_radius,
            level_time_limit: e.level_time_limit,
            hitbox_half: e.hitbox_half,
            origin_x: e.origin_x,
            origin_y: e.origin_y,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct InputConfig {
    pub player_speed: f32, // world units per second
    pub frame_ms: u64,
    pub max_frame_delta_ms: u64,
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub pause: Vec<String>,
    pub restart: Vec<String>,
    pub confirm: Vec<String>,
    pub quit: Vec<String>,
}

/// An out-of-range configuration value. Never fatal.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} must be positive, got {value}")]
    NotPositive { key: &'static str, value: f64 },
    #[error("{key} must be finite, got {value}")]
    NotFinite { key: &'static str, value: f64 },
    #[error("hitbox_half {hitbox_half} does not fit in a {cell_size} cell")]
    HitboxTooLarge { hitbox_half: f32, cell_size: f32 },
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    engine: TomlEngine,
    #[serde(default)]
    input: TomlInput,
    #[serde(default)]
    gamepad: TomlGamepad,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlEngine {
    #[serde(default = "default_cell_size")]
    cell_size: f32,
    #[serde(default = "default_max_lives")]
    max_lives: u32,
    #[serde(default = "default_reveal_radius")]
    reveal_radius: f32,
    #[serde(default = "default_time_limit")]
    level_time_limit: f32,
    #[serde(default = "default_hitbox_half")]
    hitbox_half: f32,
    #[serde(default)]
    origin_x: f32,
    #[serde(default)]
    origin_y: f32,
}

#[derive(Deserialize, Debug)]
struct TomlInput {
    #[serde(default = "default_player_speed")]
    player_speed: f32,
    #[serde(default = "default_frame_ms")]
    frame_ms: u64,
    #[serde(default = "default_max_frame_delta")]
    max_frame_delta_ms: u64,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_pause")]
    pause: Vec<String>,
    #[serde(default = "default_restart")]
    restart: Vec<String>,
    #[serde(default = "default_confirm")]
    confirm: Vec<String>,
    #[serde(default = "default_quit")]
    quit: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
}

// ── Defaults ──

fn default_cell_size() -> f32 { 40.0 }
fn default_max_lives() -> u32 { 3 }
fn default_reveal_radius() -> f32 { 48.0 }  // a bit over one cell
fn default_time_limit() -> f32 { 120.0 }
fn default_hitbox_half() -> f32 { 8.0 }

fn default_player_speed() -> f32 { 200.0 }  // 5 cells per second
fn default_frame_ms() -> u64 { 16 }
fn default_max_frame_delta() -> u64 { 50 }

fn default_pause() -> Vec<String> { vec!["Start".into()] }
fn default_restart() -> Vec<String> { vec!["Y".into()] }
fn default_confirm() -> Vec<String> { vec!["A".into()] }
fn default_quit() -> Vec<String> { vec!["Select".into()] }
fn default_levels_dir() -> String { "levels".into() }

impl Default for TomlEngine {
    fn default() -> Self {
        TomlEngine {
            cell_size: default_cell_size(),
            max_lives: default_max_lives(),
            reveal_radius: default_reveal_radius(),
            level_time_limit: default_time_limit(),
            hitbox_half: default_hitbox_half(),
            origin_x: 0.0,
            origin_y: 0.0,
        }
    }
}

impl Default for TomlInput {
    fn default() -> Self {
        TomlInput {
            player_speed: default_player_speed(),
            frame_ms: default_frame_ms(),
            max_frame_delta_ms: default_max_frame_delta(),
        }
    }
}

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad {
            pause: default_pause(),
            restart: default_restart(),
            confirm: default_confirm(),
            quit: default_quit(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            levels_dir: default_levels_dir(),
        }
    }
}

// ── Validation ──

fn positive(key: &'static str, value: f32) -> Result<f32, ConfigError> {
    if !value.is_finite() {
        Err(ConfigError::NotFinite { key, value: value as f64 })
    } else if value <= 0.0 {
        Err(ConfigError::NotPositive { key, value: value as f64 })
    } else {
        Ok(value)
    }
}

fn finite(key: &'static str, value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::NotFinite { key, value: value as f64 })
    }
}

/// Use `value` if it validates, otherwise log and use `fallback`.
fn or_default<T>(checked: Result<T, ConfigError>, fallback: T) -> T {
    checked.unwrap_or_else(|e| {
        warn!("config: {e}; using default");
        fallback
    })
}

impl TomlEngine {
    fn validate(self) -> EngineConfig {
        let d = EngineConfig::default();
        let cell_size = or_default(positive("cell_size", self.cell_size), d.cell_size);
        let hitbox = positive("hitbox_half", self.hitbox_half).and_then(|h| {
            if h * 2.0 < cell_size {
                Ok(h)
            } else {
                Err(ConfigError::HitboxTooLarge { hitbox_half: h, cell_size })
            }
        });
        // The default hitbox is only valid against a cell at least as large
        let hitbox_fallback = d.hitbox_half.min(cell_size / 4.0);
        let max_lives = if self.max_lives == 0 {
            warn!("config: max_lives must be at least 1; using default");
            d.max_lives
        } else {
            self.max_lives
        };

        EngineConfig {
            cell_size,
            max_lives,
            reveal_radius: or_default(positive("reveal_radius", self.reveal_radius), d.reveal_radius),
            level_time_limit: or_default(
                positive("level_time_limit", self.level_time_limit),
                d.level_time_limit,
            ),
            hitbox_half: or_default(hitbox, hitbox_fallback),
            origin_x: or_default(finite("origin_x", self.origin_x), d.origin_x),
            origin_y: or_default(finite("origin_y", self.origin_y), d.origin_y),
        }
    }
}

impl TomlInput {
    fn validate(self) -> InputConfig {
        let frame_ms = if self.frame_ms == 0 {
            warn!("config: frame_ms must be at least 1; using default");
            default_frame_ms()
        } else {
            self.frame_ms
        };
        let max_frame_delta_ms = if self.max_frame_delta_ms < frame_ms {
            warn!(
                max_frame_delta_ms = self.max_frame_delta_ms,
                frame_ms, "config: max_frame_delta_ms below frame_ms; raising it"
            );
            frame_ms.max(default_max_frame_delta())
        } else {
            self.max_frame_delta_ms
        };
        InputConfig {
            player_speed: or_default(positive("player_speed", self.player_speed), default_player_speed()),
            frame_ms,
            max_frame_delta_ms,
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `explicit`, or from the first `config.toml` found
    /// in the candidate directories.
    pub fn load(explicit: Option<&Path>) -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = match explicit {
            Some(path) => read_toml(path).unwrap_or_default(),
            None => find_toml(&search_dirs),
        };
        GameConfig::resolve(toml_cfg, &search_dirs)
    }

    /// Parse config text without touching the filesystem.
    #[cfg(test)]
    fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        let cfg = toml::from_str::<TomlConfig>(text)?;
        Ok(GameConfig::resolve(cfg, &[]))
    }

    fn resolve(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        // Resolve levels directory
        let levels_dir_str = &toml_cfg.general.levels_dir;
        let levels_dir = if PathBuf::from(levels_dir_str).is_absolute() {
            PathBuf::from(levels_dir_str)
        } else {
            search_dirs.iter()
                .map(|d| d.join(levels_dir_str))
                .find(|p| p.is_dir())
                .unwrap_or_else(|| PathBuf::from(levels_dir_str))
        };

        GameConfig {
            engine: toml_cfg.engine.validate(),
            input: toml_cfg.input.validate(),
            gamepad: GamepadConfig {
                pause: toml_cfg.gamepad.pause,
                restart: toml_cfg.gamepad.restart,
                confirm: toml_cfg.gamepad.confirm,
                quit: toml_cfg.gamepad.quit,
            },
            levels_dir,
        }
    }
}

/// Candidate directories to search: exe dir + CWD + data paths (deduplicated).
pub fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        // Resolve symlinks so /usr/bin/trapdoor still finds data
        // next to the real binary.
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // 3. XDG data home (~/.local/share/trapdoor)
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/trapdoor");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    // 4. System data directory (/usr/share/trapdoor)
    let sys = PathBuf::from("/usr/share/trapdoor");
    if sys.is_dir() && !dirs.iter().any(|d| d == &sys) {
        dirs.push(sys);
    }

    // 5. Fallback
    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

fn read_toml(path: &Path) -> Option<TomlConfig> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            warn!("could not read {}: {e}", path.display());
            return None;
        }
    };
    match toml::from_str::<TomlConfig>(&text) {
        Ok(cfg) => {
            info!("config loaded from {}", path.display());
            Some(cfg)
        }
        Err(e) => {
            warn!("{} parse error: {e}; using default settings", path.display());
            None
        }
    }
}

/// Search for config.toml in candidate directories.
fn find_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            // A broken first match still wins over later files
            return read_toml(&path).unwrap_or_default();
        }
    }
    TomlConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = GameConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.engine, EngineConfig::default());
        assert_eq!(cfg.engine.cell_size, 40.0);
        assert_eq!(cfg.engine.max_lives, 3);
        assert_eq!(cfg.engine.reveal_radius, 48.0);
        assert_eq!(cfg.engine.level_time_limit, 120.0);
        assert_eq!(cfg.engine.hitbox_half, 8.0);
        assert_eq!(cfg.input.player_speed, 200.0);
        assert_eq!(cfg.input.frame_ms, 16);
        assert_eq!(cfg.gamepad.pause, vec!["Start".to_string()]);
        assert_eq!(cfg.levels_dir, PathBuf::from("levels"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = GameConfig::from_toml_str(
            "[engine]\nmax_lives = 5\norigin_x = 12.5\n\n[general]\nlevels_dir = \"/srv/mazes\"\n",
        )
        .unwrap();
        assert_eq!(cfg.engine.max_lives, 5);
        assert_eq!(cfg.engine.origin_x, 12.5);
        assert_eq!(cfg.engine.cell_size, 40.0);
        assert_eq!(cfg.levels_dir, PathBuf::from("/srv/mazes"));
    }

    #[test]
    fn invalid_values_fall_back() {
        let cfg = GameConfig::from_toml_str(
            "[engine]\ncell_size = -4.0\nmax_lives = 0\nreveal_radius = 0.0\n\
             [input]\nframe_ms = 0\nmax_frame_delta_ms = 0\nplayer_speed = -1.0\n",
        )
        .unwrap();
        assert_eq!(cfg.engine.cell_size, 40.0);
        assert_eq!(cfg.engine.max_lives, 3);
        assert_eq!(cfg.engine.reveal_radius, 48.0);
        assert_eq!(cfg.input.frame_ms, 16);
        assert_eq!(cfg.input.max_frame_delta_ms, 50);
        assert_eq!(cfg.input.player_speed, 200.0);
    }

    #[test]
    fn oversized_hitbox_is_shrunk_to_fit() {
        let cfg = GameConfig::from_toml_str("[engine]\ncell_size = 16.0\nhitbox_half = 8.0\n").unwrap();
        assert_eq!(cfg.engine.hitbox_half, 4.0);
        assert!(cfg.engine.hitbox_half * 2.0 < cfg.engine.cell_size);
    }

    #[test]
    fn validation_errors_describe_the_key() {
        let err = positive("reveal_radius", -1.0).unwrap_err();
        assert_eq!(err, ConfigError::NotPositive { key: "reveal_radius", value: -1.0 });
        assert!(err.to_string().contains("reveal_radius"));
        assert!(matches!(finite("origin_x", f32::NAN), Err(ConfigError::NotFinite { .. })));
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(GameConfig::from_toml_str("[engine\ncell_size = ").is_err());
    }

    #[test]
    fn geometry_mirrors_engine_settings() {
        let cfg = GameConfig::from_toml_str("[engine]\ncell_size = 32.0\norigin_y = 4.0\n").unwrap();
        let geo = cfg.engine.geometry();
        assert_eq!(geo.cell_size, 32.0);
        assert_eq!(geo.origin_y, 4.0);
        assert_eq!(geo.hitbox_half, 8.0);
    }
}
