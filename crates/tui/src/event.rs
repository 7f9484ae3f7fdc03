use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEventKind};
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::App;
use crate::app::key_for_char;
use crate::ui;

fn handle_confirm_key(app: &mut App, key: KeyEvent) {
    let Some(dialog) = app.confirm.as_mut() else { return };
    match key.code {
        KeyCode::Left | KeyCode::Right | KeyCode::Tab => dialog.toggle(),
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            dialog.selected = true;
            app.answer_confirm();
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.confirm = None,
        KeyCode::Enter => app.answer_confirm(),
        _ => {}
    }
}

/// `release_events`: the terminal reports key releases. Without them a pad
/// key is released right after it is pressed, so Hold macros run one pass.
fn handle_key(app: &mut App, key: KeyEvent, release_events: bool) {
    if let KeyCode::Char(c) = key.code {
        if let Some(pad_key) = key_for_char(c) {
            match key.kind {
                KeyEventKind::Press => {
                    app.key_down(pad_key);
                    if !release_events {
                        app.key_up(pad_key);
                    }
                }
                KeyEventKind::Release => app.key_up(pad_key),
                KeyEventKind::Repeat => {}
            }
            return;
        }
    }

    if key.kind != KeyEventKind::Press {
        return;
    }
    if app.confirm.is_some() {
        handle_confirm_key(app, key);
        return;
    }

    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.quit(),
        KeyCode::Char('q') | KeyCode::Char('Q') => app.request_quit(),
        KeyCode::Esc | KeyCode::Char(' ') => app.emergency_stop(),
        KeyCode::Left | KeyCode::Char('[') => app.switch_profile(-1),
        KeyCode::Right | KeyCode::Char(']') => app.switch_profile(1),
        KeyCode::Char('l') | KeyCode::Char('L') => app.toggle_log(),
        KeyCode::PageUp => app.scroll_log_up(10),
        KeyCode::PageDown => app.scroll_log_down(10),
        _ => {}
    }
}

pub fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    hotkey_flag: Arc<AtomicBool>,
    release_events: bool,
) -> anyhow::Result<()> {
    loop {
        if app.should_quit {
            return Ok(());
        }

        if hotkey_flag.swap(false, Ordering::AcqRel) {
            app.emergency_stop();
        }

        app.drain_logs();

        let view = app.snapshot();
        terminal.draw(|f| ui::draw(f, app, &view))?;

        // Short poll keeps LED timers moving
        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) => handle_key(app, key, release_events),
                Event::Mouse(mouse) => match mouse.kind {
                    MouseEventKind::ScrollUp => app.scroll_log_up(3),
                    MouseEventKind::ScrollDown => app.scroll_log_down(3),
                    _ => {}
                },
                _ => {}
            }
        }
    }
}
