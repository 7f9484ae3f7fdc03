use std::collections::BTreeSet;

use anyhow::Result;

use crate::keycode::Keycode;
use crate::types::MouseButton;
use crate::logger;
use super::OutputDevice;

/// Logs every output call instead of sending it anywhere.
#[derive(Default)]
pub struct StubOutput {
    pressed: BTreeSet<Keycode>,
}

impl OutputDevice for StubOutput {
    fn press(&mut self, key: Keycode) -> Result<()> {
        self.pressed.insert(key);
        logger::info_p("stub", &format!("press({})", key));
        Ok(())
    }

    fn release(&mut self, key: Keycode) -> Result<()> {
        self.pressed.remove(&key);
        logger::info_p("stub", &format!("release({})", key));
        Ok(())
    }

    fn release_all(&mut self) -> Result<()> {
        if !self.pressed.is_empty() {
            let names: Vec<String> = self.pressed.iter().map(|k| k.to_string()).collect();
            logger::info_p("stub", &format!("release_all() [{}]", names.join(", ")));
        }
        self.pressed.clear();
        Ok(())
    }

    fn send_char(&mut self, ch: char) -> Result<()> {
        logger::info_p("stub", &format!("send_char({:?})", ch));
        Ok(())
    }

    fn click(&mut self, button: MouseButton) -> Result<()> {
        logger::info_p("stub", &format!("click({:?})", button));
        Ok(())
    }

    fn move_by(&mut self, dx: i32, dy: i32, wheel: i32) -> Result<()> {
        logger::info_p("stub", &format!("move_by({}, {}, {})", dx, dy, wheel));
        Ok(())
    }
}
