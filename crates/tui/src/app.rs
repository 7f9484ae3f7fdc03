use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError, mpsc};

use macropad_core::types::{Command, KEY_COUNT, KeyId, PadView, StateName};

use crate::colors::LedColors;
use crate::confirm::ConfirmDialog;

/// Keyboard characters standing in for the 12 pad keys, in key order.
pub const PAD_CHARS: [char; KEY_COUNT] = ['1', '2', '3', '4', '5', '6', '7', '8', '9', '0', '-', '='];

/// Oldest log lines are dropped past this many.
pub const LOG_CAPACITY: usize = 1000;

pub fn key_for_char(c: char) -> Option<KeyId> {
    PAD_CHARS.iter().position(|&p| p == c).map(|i| i as KeyId)
}

pub struct App {
    pub view: Arc<Mutex<PadView>>,
    pub colors: LedColors,
    pub held: [bool; KEY_COUNT],
    pub log_visible: bool,
    pub log_messages: VecDeque<String>,
    pub log_scroll: usize, // scroll offset from bottom (0 = latest)
    pub log_rx: mpsc::Receiver<String>,
    pub cmd_tx: mpsc::Sender<Command>,
    pub confirm: Option<ConfirmDialog>,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        view: Arc<Mutex<PadView>>,
        colors: LedColors,
        log_rx: mpsc::Receiver<String>,
        cmd_tx: mpsc::Sender<Command>,
    ) -> Self {
        Self {
            view,
            colors,
            held: [false; KEY_COUNT],
            log_visible: true,
            log_messages: VecDeque::with_capacity(LOG_CAPACITY),
            log_scroll: 0,
            log_rx,
            cmd_tx,
            confirm: None,
            should_quit: false,
        }
    }

    /// Copy of the latest view published by the orchestrator.
    pub fn snapshot(&self) -> PadView {
        self.view.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn drain_logs(&mut self) {
        while let Ok(msg) = self.log_rx.try_recv() {
            if self.log_messages.len() == LOG_CAPACITY {
                self.log_messages.pop_front();
            }
            self.log_messages.push_back(msg);
        }
    }

    pub fn scroll_log_up(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_add(n);
    }

    pub fn scroll_log_down(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_sub(n);
    }

    pub fn toggle_log(&mut self) {
        self.log_visible = !self.log_visible;
    }

    /// Ignored while the key is already down (terminal auto-repeat).
    pub fn key_down(&mut self, key: KeyId) {
        let Some(held) = self.held.get_mut(key as usize) else { return };
        if *held {
            return;
        }
        *held = true;
        self.cmd_tx.send(Command::KeyDown(key)).ok();
    }

    pub fn key_up(&mut self, key: KeyId) {
        let Some(held) = self.held.get_mut(key as usize) else { return };
        if !*held {
            return;
        }
        *held = false;
        self.cmd_tx.send(Command::KeyUp(key)).ok();
    }

    pub fn emergency_stop(&mut self) {
        self.cmd_tx.send(Command::EmergencyStop).ok();
    }

    pub fn switch_profile(&mut self, direction: i32) {
        self.cmd_tx.send(Command::SwitchProfile(direction)).ok();
    }

    /// Quit, asking first if any macro is still running.
    pub fn request_quit(&mut self) {
        let running = self.snapshot().keys.iter().filter(|k| k.state != StateName::Off).count();
        if running == 0 {
            self.quit();
        } else {
            self.confirm = Some(ConfirmDialog::new(format!("{} macro(s) running. Quit?", running)));
        }
    }

    /// Close the dialog; quit if Yes was selected.
    pub fn answer_confirm(&mut self) {
        if let Some(dialog) = self.confirm.take() {
            if dialog.selected {
                self.quit();
            }
        }
    }

    pub fn quit(&mut self) {
        self.cmd_tx.send(Command::Quit).ok();
        self.should_quit = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> (App, mpsc::Receiver<Command>) {
        let (_log_tx, log_rx) = mpsc::channel();
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let app = App::new(Arc::new(Mutex::new(PadView::default())), LedColors::default(), log_rx, cmd_tx);
        (app, cmd_rx)
    }

    #[test]
    fn log_buffer_keeps_latest_lines() {
        let (log_tx, log_rx) = mpsc::channel();
        let (cmd_tx, _cmd_rx) = mpsc::channel();
        let mut app = App::new(Arc::new(Mutex::new(PadView::default())), LedColors::default(), log_rx, cmd_tx);

        for i in 0..LOG_CAPACITY + 250 {
            log_tx.send(format!("line {}", i)).unwrap();
        }
        app.drain_logs();
        assert_eq!(app.log_messages.len(), LOG_CAPACITY);
        assert_eq!(app.log_messages.front().map(String::as_str), Some("line 250"));

        log_tx.send("newest".to_string()).unwrap();
        app.drain_logs();
        assert_eq!(app.log_messages.len(), LOG_CAPACITY);
        assert_eq!(app.log_messages.front().map(String::as_str), Some("line 251"));
        assert_eq!(app.log_messages.back().map(String::as_str), Some("newest"));
    }

    #[test]
    fn pad_chars_cover_all_keys() {
        assert_eq!(key_for_char('1'), Some(0));
        assert_eq!(key_for_char('0'), Some(9));
        assert_eq!(key_for_char('='), Some(11));
        assert_eq!(key_for_char('q'), None);
    }

    #[test]
    fn auto_repeat_sends_one_key_down() {
        let (mut app, rx) = app();
        app.key_down(2);
        app.key_down(2);
        app.key_up(2);
        app.key_up(2);
        let sent: Vec<Command> = rx.try_iter().collect();
        assert_eq!(sent, vec![Command::KeyDown(2), Command::KeyUp(2)]);
    }

    #[test]
    fn idle_quit_skips_confirmation() {
        let (mut app, rx) = app();
        app.request_quit();
        assert!(app.should_quit);
        assert!(app.confirm.is_none());
        assert_eq!(rx.try_recv().ok(), Some(Command::Quit));
    }
}
