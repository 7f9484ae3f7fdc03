use std::io;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, KeyboardEnhancementFlags,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use macropad_core::engine::MacroEngine;
use macropad_core::executor::ActionExecutor;
use macropad_core::orchestrator::{self, LoopOptions};
use macropad_core::platform::{create_output, hotkey};
use macropad_core::profile::ProfileManager;
use macropad_core::settings::Settings;
use macropad_core::sleep::SystemClock;
use macropad_core::types::{Command, PadView};
use macropad_core::logger;
use macropad_tui::colors::LedColors;

fn main() -> Result<()> {
    let force_stub = std::env::args().any(|a| a == "--stub");
    let force_check = std::env::args().any(|a| a == "--check");

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let settings = Settings::load(&cwd.join("settings.json"));

    logger::init(&cwd.join(&settings.log_dir))?;

    // A startup profile without macros is a configuration error
    let profiles = ProfileManager::load(&settings.profiles_dir, &settings.current_profile_file)?;
    if profiles.current().macros.is_empty() {
        bail!("profile '{}' has no valid macros", profiles.current().name);
    }

    let output = create_output(force_stub);
    let engine = MacroEngine::new(Box::new(SystemClock), ActionExecutor::new(output, settings.timing()));
    let options = LoopOptions {
        tick: Duration::from_millis(settings.tick_ms.max(1)),
        check_invariants: settings.check_invariants || force_check,
    };

    // Shared state
    let view = Arc::new(Mutex::new(PadView::default()));

    // Channels
    let (log_tx, log_rx) = mpsc::channel::<String>();
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();

    // Wire logger to TUI
    logger::set_tui_sender(log_tx);
    logger::info(&format!("macropad started with {} profile(s)", profiles.len()));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let release_events = supports_keyboard_enhancement().unwrap_or(false);
    if release_events {
        execute!(stdout, PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES))?;
    } else {
        logger::warn("terminal does not report key releases; hold keys run a single pass");
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = macropad_tui::App::new(Arc::clone(&view), LedColors::load(&settings.colors_file), log_rx, cmd_tx);

    // Spawn orchestrator on a background thread
    let orch_view = Arc::clone(&view);
    let orchestrator = thread::spawn(move || {
        orchestrator::orchestrate(engine, profiles, orch_view, cmd_rx, options);
    });

    // Global emergency stop (Cmd+Shift+Period)
    let hotkey_flag = Arc::new(AtomicBool::new(false));
    hotkey::start_emergency_listener(Arc::clone(&hotkey_flag));

    // Run TUI event loop on main thread
    let result = macropad_tui::event::run(&mut terminal, &mut app, hotkey_flag, release_events);

    // Restore terminal
    if release_events {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)?;
    }
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    // Dropping the app closes the command channel if Quit was never sent
    drop(app);
    if orchestrator.join().is_err() {
        logger::error("orchestrator thread panicked");
    }

    result
}
