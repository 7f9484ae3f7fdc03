use anyhow::Result;

use crate::keycode::Keycode;
use crate::platform::OutputDevice;
use crate::sleep;
use crate::logger;
use crate::types::*;

/// Blocking delays inside a single action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorTiming {
    /// Hold time between pressing a combination and releasing it
    pub key_settle_ms: u64,
    /// Pause after each typed character
    pub type_char_ms: u64,
}

impl Default for ExecutorTiming {
    fn default() -> Self {
        Self { key_settle_ms: 10, type_char_ms: 50 }
    }
}

impl ExecutorTiming {
    /// No blocking at all; used by tests.
    pub fn instant() -> Self {
        Self { key_settle_ms: 0, type_char_ms: 0 }
    }
}

/// Runs one action at a time against the output device.
pub struct ActionExecutor {
    output: Box<dyn OutputDevice>,
    timing: ExecutorTiming,
}

impl ActionExecutor {
    pub fn new(output: Box<dyn OutputDevice>, timing: ExecutorTiming) -> Self {
        Self { output, timing }
    }

    /// Perform `action` and return the wait (ms) that should follow it.
    /// Output failures are logged and the action counts as done; the
    /// inline wait still applies. Repeat is handled by the engine and
    /// returns 0 here.
    pub fn execute(&mut self, action: &Action) -> u64 {
        let result = match &action.kind {
            ActionKind::Wait(ms) => return *ms,
            ActionKind::WaitRandom { min, max } => {
                let ms = sleep::random_ms(*min, *max);
                logger::info_p("exec", &format!("random wait {}ms", ms));
                return ms;
            }
            ActionKind::Repeat { .. } => {
                logger::warn_p("exec", "repeat reached the executor; ignored");
                return 0;
            }
            ActionKind::Press(keys) => self.tap(keys),
            ActionKind::PressDown(keys) => keys.iter().try_for_each(|k| self.output.press(*k)),
            ActionKind::PressUp(keys) => keys.iter().try_for_each(|k| self.output.release(*k)),
            ActionKind::Type(text) => self.type_text(text),
            ActionKind::MouseClick(button) => self.output.click(*button),
            ActionKind::MouseMove { x, y } => self.output.move_by(*x, *y, 0),
            ActionKind::MouseScroll(amount) => self.output.move_by(0, 0, *amount),
        };

        if let Err(e) = result {
            logger::warn_p("exec", &format!("{} failed: {}", action.label(), e));
        }

        match action.wait {
            Some(InlineWait::Fixed(ms)) => ms,
            Some(InlineWait::Random { min, max }) => sleep::random_ms(min, max),
            None => 0,
        }
    }

    /// Release every key and button. Errors are logged, never returned.
    pub fn release_all(&mut self) {
        match self.output.release_all() {
            Ok(()) => logger::info_p("exec", "released all keys"),
            Err(e) => logger::error_p("exec", &format!("release_all failed: {}", e)),
        }
    }

    fn tap(&mut self, keys: &[Keycode]) -> Result<()> {
        let pressed = keys.iter().try_for_each(|k| self.output.press(*k));
        sleep::sleep_ms(self.timing.key_settle_ms);
        // Release even if a press failed so nothing stays stuck
        let released = self.output.release_all();
        pressed.and(released)
    }

    fn type_text(&mut self, text: &str) -> Result<()> {
        for ch in text.chars() {
            self.output.send_char(ch)?;
            sleep::sleep_ms(self.timing.type_char_ms);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::bail;

    use super::*;

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<String>>>,
        fail_presses: bool,
    }

    impl Recorder {
        fn log(&self, s: String) {
            self.calls.lock().unwrap().push(s);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl OutputDevice for Recorder {
        fn press(&mut self, key: Keycode) -> Result<()> {
            if self.fail_presses {
                bail!("device unplugged");
            }
            self.log(format!("press {}", key));
            Ok(())
        }
        fn release(&mut self, key: Keycode) -> Result<()> {
            self.log(format!("release {}", key));
            Ok(())
        }
        fn release_all(&mut self) -> Result<()> {
            self.log("release_all".into());
            Ok(())
        }
        fn send_char(&mut self, ch: char) -> Result<()> {
            self.log(format!("char {}", ch));
            Ok(())
        }
        fn click(&mut self, button: MouseButton) -> Result<()> {
            self.log(format!("click {:?}", button));
            Ok(())
        }
        fn move_by(&mut self, dx: i32, dy: i32, wheel: i32) -> Result<()> {
            self.log(format!("move {} {} {}", dx, dy, wheel));
            Ok(())
        }
    }

    fn executor(rec: &Recorder) -> ActionExecutor {
        ActionExecutor::new(Box::new(rec.clone()), ExecutorTiming::instant())
    }

    #[test]
    fn press_releases_after_combination() {
        let rec = Recorder::default();
        let mut ex = executor(&rec);
        let wait = ex.execute(&Action::new(ActionKind::Press(vec![Keycode::LEFT_CONTROL, Keycode::C])).with_wait(40));
        assert_eq!(wait, 40);
        assert_eq!(rec.calls(), vec!["press CTRL", "press C", "release_all"]);
    }

    #[test]
    fn type_sends_each_character() {
        let rec = Recorder::default();
        let mut ex = executor(&rec);
        assert_eq!(ex.execute(&Action::new(ActionKind::Type("hi".into()))), 0);
        assert_eq!(rec.calls(), vec!["char h", "char i"]);
    }

    #[test]
    fn mouse_actions_map_to_move_and_click() {
        let rec = Recorder::default();
        let mut ex = executor(&rec);
        ex.execute(&Action::new(ActionKind::MouseMove { x: 5, y: -3 }));
        ex.execute(&Action::new(ActionKind::MouseScroll(-2)));
        ex.execute(&Action::new(ActionKind::MouseClick(MouseButton::Right)));
        assert_eq!(rec.calls(), vec!["move 5 -3 0", "move 0 0 -2", "click Right"]);
    }

    #[test]
    fn waits_return_without_output() {
        let rec = Recorder::default();
        let mut ex = executor(&rec);
        assert_eq!(ex.execute(&Action::new(ActionKind::Wait(250))), 250);
        let ms = ex.execute(&Action::new(ActionKind::WaitRandom { min: 10, max: 20 }));
        assert!((10..=20).contains(&ms));
        let ms = ex.execute(&Action::new(ActionKind::MouseClick(MouseButton::Left)).with_random_wait(3, 4));
        assert!((3..=4).contains(&ms));
        assert_eq!(rec.calls(), vec!["click Left"]);
    }

    #[test]
    fn failed_output_still_releases_and_keeps_wait() {
        let rec = Recorder { fail_presses: true, ..Default::default() };
        let mut ex = executor(&rec);
        let wait = ex.execute(&Action::new(ActionKind::Press(vec![Keycode::A])).with_wait(15));
        assert_eq!(wait, 15);
        assert_eq!(rec.calls(), vec!["release_all"]);
    }
}
