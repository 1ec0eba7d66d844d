/// Entry point and game loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use clap::Parser;
use crossterm::event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags};
use crossterm::execute;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use config::GameConfig;
use domain::entity::{FrameInput, Signal};
use sim::event::GameEvent;
use sim::level::{check_levels, discover_levels, start_run};
use sim::step;
use sim::world::{Phase, WorldState};
use ui::gamepad::GamepadState;
use ui::input::{self, InputState};
use ui::renderer::{PauseItem, Renderer};
use ui::sound::SoundEngine;

/// Trapdoor: find the plates, dodge the traps, reach the door.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Level files to play, in order. Defaults to the levels directory.
    #[arg(value_name = "LEVEL")]
    levels: Vec<PathBuf>,
    /// Directory of `*.txt` levels, played in file-name order.
    #[arg(long, value_name = "DIR")]
    levels_dir: Option<PathBuf>,
    /// Config file to use instead of searching for `config.toml`.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Where log output goes; the terminal belongs to the game.
    #[arg(long, value_name = "FILE", default_value = "trapdoor.log")]
    log_file: PathBuf,
    /// Parse every level, print a report and exit.
    #[arg(long)]
    check: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_file);

    let config = GameConfig::load(cli.config.as_deref());
    let levels_dir = cli.levels_dir.clone().unwrap_or_else(|| config.levels_dir.clone());
    let levels = discover_levels(&cli.levels, &levels_dir);

    if cli.check {
        return check_report(&levels);
    }

    let mut world = match start_run(config.engine.clone(), levels) {
        Ok(w) => w,
        Err(e) => {
            error!("{e}");
            eprintln!("trapdoor: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return ExitCode::FAILURE;
    }

    let mut kb = InputState::new();
    kb.honor_release = enable_key_release_events();
    let sound = SoundEngine::new();

    let result = game_loop(&mut world, &mut renderer, &mut kb, sound.as_ref(), &config);

    if kb.honor_release {
        let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
    }
    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }

    match result {
        Ok(()) => {
            info!(level = world.current_level, lives = world.lives(), "quit");
            println!("Thanks for playing Trapdoor!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("game loop failed: {e}");
            eprintln!("Game error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Log to a file with ANSI off. Without a writable log file the game
/// still runs, just silently.
fn init_tracing(path: &Path) {
    let file = match File::create(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("trapdoor: cannot open log file {}: {e}", path.display());
            return;
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .init();
}

/// Terminals that support it report key releases, which makes held-key
/// movement exact instead of timeout based.
fn enable_key_release_events() -> bool {
    if !matches!(crossterm::terminal::supports_keyboard_enhancement(), Ok(true)) {
        return false;
    }
    let flags = KeyboardEnhancementFlags::REPORT_EVENT_TYPES;
    match execute!(io::stdout(), PushKeyboardEnhancementFlags(flags)) {
        Ok(()) => true,
        Err(e) => {
            debug!("keyboard enhancement unavailable: {e}");
            false
        }
    }
}

fn check_report(levels: &[sim::level::LevelSource]) -> ExitCode {
    let mut failed = 0;
    for (name, result) in check_levels(levels) {
        match result {
            Ok(grid) => println!(
                "ok    {name}: {}x{}, {} traps, {} plates, {}",
                grid.width(),
                grid.height(),
                grid.traps().len(),
                grid.plates().len(),
                if grid.door().is_some() { "door" } else { "NO DOOR" },
            ),
            Err(e) => {
                failed += 1;
                println!("FAIL  {name}: {e}");
            }
        }
    }
    println!("{} levels, {failed} failed", levels.len());
    if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

fn game_loop(
    world: &mut WorldState,
    renderer: &mut Renderer,
    kb: &mut InputState,
    sound: Option<&SoundEngine>,
    config: &GameConfig,
) -> io::Result<()> {
    let mut gp = GamepadState::new();
    gp.load_button_config(&config.gamepad);
    if gp.connected {
        info!("gamepad connected");
    }

    let frame_sleep = Duration::from_millis(config.input.frame_ms);
    let max_dt = config.input.max_frame_delta_ms as f32 / 1000.0;
    let mut last_frame = Instant::now();
    let mut pause_cursor = 0_usize;

    loop {
        kb.drain_events();
        gp.update();

        if kb.ctrl_c_pressed() {
            break;
        }
        let mut signals = Vec::new();
        if handle_meta(world, kb, &gp, &mut pause_cursor, &mut signals) {
            break;
        }

        let now = Instant::now();
        let dt = now.duration_since(last_frame).as_secs_f32().min(max_dt);
        last_frame = now;

        let (dx, dy) = detect_movement(kb, &gp);
        let step_len = config.input.player_speed * dt;
        let frame_input = FrameInput { signals, ..FrameInput::movement(dx * step_len, dy * step_len) };

        let events = step::advance(world, dt, &frame_input);
        for event in &events {
            debug!(?event, "game event");
        }
        process_sound_events(sound, &events);

        renderer.render(world, pause_cursor)?;
        std::thread::sleep(frame_sleep);
    }

    Ok(())
}

/// Keyboard wins when both devices ask to move.
fn detect_movement(kb: &InputState, gp: &GamepadState) -> (f32, f32) {
    let dir = kb.direction();
    if dir == (0.0, 0.0) { gp.direction() } else { dir }
}

fn process_sound_events(sound: Option<&SoundEngine>, events: &[GameEvent]) {
    let Some(sfx) = sound else { return };
    for event in events {
        match event {
            GameEvent::TrapRevealed { .. } => sfx.play_trap_reveal(),
            GameEvent::TrapTriggered { .. } => sfx.play_trap_hit(),
            GameEvent::PlatePressed { .. } => sfx.play_plate(),
            GameEvent::DoorOpened { .. } => sfx.play_door(),
            GameEvent::LevelAdvanced { .. } | GameEvent::RunComplete => sfx.play_clear(),
            GameEvent::OutOfLives | GameEvent::OutOfTime | GameEvent::LoadFailed { .. } => sfx.play_fail(),
            _ => {}
        }
    }
}

/// Turn this frame's key and button presses into signals.
/// Returns true when the player asked to quit.
fn handle_meta(
    world: &WorldState,
    kb: &InputState,
    gp: &GamepadState,
    pause_cursor: &mut usize,
    signals: &mut Vec<Signal>,
) -> bool {
    if kb.any_pressed(input::KEYS_QUIT) || gp.quit_pressed() {
        return true;
    }

    let confirm = kb.any_pressed(input::KEYS_CONFIRM) || gp.confirm_pressed();
    let pause = kb.any_pressed(input::KEYS_PAUSE) || gp.pause_pressed();
    let restart = kb.any_pressed(input::KEYS_RESTART) || gp.restart_pressed();

    match world.phase {
        Phase::Playing if world.paused => {
            let items = PauseItem::ALL.len();
            if kb.any_pressed(input::KEYS_UP) || gp.menu_up_pressed() {
                *pause_cursor = (*pause_cursor + items - 1) % items;
            }
            if kb.any_pressed(input::KEYS_DOWN) || gp.menu_down_pressed() {
                *pause_cursor = (*pause_cursor + 1) % items;
            }

            if pause {
                signals.push(Signal::Resume);
            } else if restart {
                signals.push(Signal::Restart);
            } else if confirm {
                match PauseItem::ALL[*pause_cursor % items] {
                    PauseItem::Continue => signals.push(Signal::Resume),
                    PauseItem::Restart => signals.push(Signal::Restart),
                    PauseItem::Quit => return true,
                }
            }
        }
        Phase::Playing => {
            if pause {
                *pause_cursor = 0;
                signals.push(Signal::TogglePause);
            } else if restart {
                signals.push(Signal::Restart);
            }
        }
        Phase::RunComplete => {
            if confirm {
                signals.push(Signal::NewRun);
            }
        }
        Phase::OutOfLives | Phase::OutOfTime | Phase::Stalled => {
            if confirm || restart {
                signals.push(Signal::Restart);
            }
        }
    }

    false
}
