pub mod stub;
pub mod hotkey;

#[cfg(target_os = "macos")]
pub mod darwin;

use anyhow::Result;

use crate::keycode::Keycode;
use crate::types::MouseButton;
use crate::logger;

/// Keyboard and mouse output shared by every macro. Only the slot holder's
/// actions reach it.
pub trait OutputDevice: Send {
    fn press(&mut self, key: Keycode) -> Result<()>;
    fn release(&mut self, key: Keycode) -> Result<()>;
    fn release_all(&mut self) -> Result<()>;
    fn send_char(&mut self, ch: char) -> Result<()>;
    fn click(&mut self, button: MouseButton) -> Result<()>;
    /// Relative pointer motion; `wheel` scrolls vertically.
    fn move_by(&mut self, dx: i32, dy: i32, wheel: i32) -> Result<()>;
}

/// Create the output device appropriate for the current OS.
pub fn create_output(force_stub: bool) -> Box<dyn OutputDevice> {
    logger::register_prefix("stub", logger::COLOR_GRAY);
    if force_stub {
        return Box::new(stub::StubOutput::default());
    }
    #[cfg(target_os = "macos")]
    {
        logger::register_prefix("darwin", logger::COLOR_GRAY);
        match darwin::DarwinOutput::new() {
            Ok(out) => return Box::new(out),
            Err(e) => logger::error_p("darwin", &format!("falling back to stub output: {}", e)),
        }
    }
    Box::new(stub::StubOutput::default())
}
