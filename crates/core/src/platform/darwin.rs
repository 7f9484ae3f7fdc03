use std::collections::BTreeSet;

use anyhow::{Result, anyhow};
use core_graphics::event::*;
use core_graphics::event_source::*;
use core_graphics::geometry::CGPoint;

use crate::keycode::Keycode;
use crate::types::MouseButton;
use crate::logger;
use super::OutputDevice;

/// macOS virtual key code for a HID usage id.
fn mac_key_code(key: Keycode) -> Option<CGKeyCode> {
    let code = match key.0 {
        0x04 => 0x00, 0x05 => 0x0B, 0x06 => 0x08, 0x07 => 0x02, // a b c d
        0x08 => 0x0E, 0x09 => 0x03, 0x0A => 0x05, 0x0B => 0x04, // e f g h
        0x0C => 0x22, 0x0D => 0x26, 0x0E => 0x28, 0x0F => 0x25, // i j k l
        0x10 => 0x2E, 0x11 => 0x2D, 0x12 => 0x1F, 0x13 => 0x23, // m n o p
        0x14 => 0x0C, 0x15 => 0x0F, 0x16 => 0x01, 0x17 => 0x11, // q r s t
        0x18 => 0x20, 0x19 => 0x09, 0x1A => 0x0D, 0x1B => 0x07, // u v w x
        0x1C => 0x10, 0x1D => 0x06,                             // y z
        0x1E => 0x12, 0x1F => 0x13, 0x20 => 0x14, 0x21 => 0x15, // 1 2 3 4
        0x22 => 0x17, 0x23 => 0x16, 0x24 => 0x1A, 0x25 => 0x1C, // 5 6 7 8
        0x26 => 0x19, 0x27 => 0x1D,                             // 9 0
        0x28 => 0x24, 0x29 => 0x35, 0x2A => 0x33, 0x2B => 0x30, // enter esc backspace tab
        0x2C => 0x31, 0x2D => 0x1B, 0x2E => 0x18, 0x2F => 0x21, // space - = [
        0x30 => 0x1E, 0x31 => 0x2A, 0x32 => 0x2A, 0x33 => 0x29, // ] \ # ;
        0x34 => 0x27, 0x35 => 0x32, 0x36 => 0x2B, 0x37 => 0x2F, // ' ` , .
        0x38 => 0x2C, 0x39 => 0x39,                             // / caps
        0x3A => 0x7A, 0x3B => 0x78, 0x3C => 0x63, 0x3D => 0x76, // f1-f4
        0x3E => 0x60, 0x3F => 0x61, 0x40 => 0x62, 0x41 => 0x64, // f5-f8
        0x42 => 0x65, 0x43 => 0x6D, 0x44 => 0x67, 0x45 => 0x6F, // f9-f12
        // print screen / scroll lock / pause land on f13-f15
        0x46 => 0x69, 0x47 => 0x6B, 0x48 => 0x71,
        0x49 => 0x72, 0x4A => 0x73, 0x4B => 0x74, 0x4C => 0x75, // insert home pgup del
        0x4D => 0x77, 0x4E => 0x79,                             // end pgdn
        0x4F => 0x7C, 0x50 => 0x7B, 0x51 => 0x7D, 0x52 => 0x7E, // right left down up
        0xE0 => 0x3B, 0xE1 => 0x38, 0xE2 => 0x3A, 0xE3 => 0x37, // left ctrl shift alt cmd
        0xE4 => 0x3E, 0xE5 => 0x3C, 0xE6 => 0x3D, 0xE7 => 0x36, // right ctrl shift alt cmd
        _ => return None,
    };
    Some(code)
}

fn modifier_flag(key: Keycode) -> CGEventFlags {
    match key.0 {
        0xE0 | 0xE4 => CGEventFlags::CGEventFlagControl,
        0xE1 | 0xE5 => CGEventFlags::CGEventFlagShift,
        0xE2 | 0xE6 => CGEventFlags::CGEventFlagAlternate,
        0xE3 | 0xE7 => CGEventFlags::CGEventFlagCommand,
        _ => CGEventFlags::CGEventFlagNull,
    }
}

/// Posts keyboard and mouse events into the HID event stream.
/// Needs the Accessibility permission for the hosting terminal.
pub struct DarwinOutput {
    pressed: BTreeSet<Keycode>,
}

impl DarwinOutput {
    pub fn new() -> Result<Self> {
        source()?;
        Ok(Self { pressed: BTreeSet::new() })
    }

    fn held_flags(&self) -> CGEventFlags {
        self.pressed
            .iter()
            .fold(CGEventFlags::CGEventFlagNull, |acc, k| acc | modifier_flag(*k))
    }

    fn post_key(&self, key: Keycode, down: bool) -> Result<()> {
        let code = mac_key_code(key).ok_or_else(|| anyhow!("no macOS key code for {}", key))?;
        let event = CGEvent::new_keyboard_event(source()?, code, down)
            .map_err(|_| anyhow!("failed to create key event for {}", key))?;
        event.set_flags(self.held_flags());
        event.post(CGEventTapLocation::HID);
        Ok(())
    }

    fn cursor(&self) -> Result<CGPoint> {
        let event = CGEvent::new(source()?).map_err(|_| anyhow!("failed to read cursor position"))?;
        Ok(event.location())
    }
}

fn source() -> Result<CGEventSource> {
    CGEventSource::new(CGEventSourceStateID::HIDSystemState)
        .map_err(|_| anyhow!("failed to create HID event source"))
}

impl OutputDevice for DarwinOutput {
    fn press(&mut self, key: Keycode) -> Result<()> {
        self.pressed.insert(key);
        self.post_key(key, true)
    }

    fn release(&mut self, key: Keycode) -> Result<()> {
        self.pressed.remove(&key);
        self.post_key(key, false)
    }

    fn release_all(&mut self) -> Result<()> {
        // Non-modifiers first so no stray combo fires on the way out
        let (mods, keys): (Vec<Keycode>, Vec<Keycode>) =
            self.pressed.iter().copied().partition(|k| k.is_modifier());
        let mut failed = 0;
        for key in keys.into_iter().chain(mods) {
            self.pressed.remove(&key);
            if let Err(e) = self.post_key(key, false) {
                logger::warn_p("darwin", &format!("release {}: {}", key, e));
                failed += 1;
            }
        }
        if failed > 0 {
            return Err(anyhow!("{} key(s) failed to release", failed));
        }
        Ok(())
    }

    fn send_char(&mut self, ch: char) -> Result<()> {
        let text = ch.to_string();
        for down in [true, false] {
            let event = CGEvent::new_keyboard_event(source()?, 0, down)
                .map_err(|_| anyhow!("failed to create text event"))?;
            event.set_string(&text);
            event.post(CGEventTapLocation::HID);
        }
        Ok(())
    }

    fn click(&mut self, button: MouseButton) -> Result<()> {
        let (down, up, cg_button) = match button {
            MouseButton::Left => (CGEventType::LeftMouseDown, CGEventType::LeftMouseUp, CGMouseButton::Left),
            MouseButton::Right => (CGEventType::RightMouseDown, CGEventType::RightMouseUp, CGMouseButton::Right),
            MouseButton::Middle => (CGEventType::OtherMouseDown, CGEventType::OtherMouseUp, CGMouseButton::Center),
        };
        let point = self.cursor()?;
        for kind in [down, up] {
            let event = CGEvent::new_mouse_event(source()?, kind, point, cg_button)
                .map_err(|_| anyhow!("failed to create mouse event"))?;
            event.post(CGEventTapLocation::HID);
        }
        Ok(())
    }

    fn move_by(&mut self, dx: i32, dy: i32, wheel: i32) -> Result<()> {
        if dx != 0 || dy != 0 {
            let here = self.cursor()?;
            let target = CGPoint::new(here.x + dx as f64, here.y + dy as f64);
            let event = CGEvent::new_mouse_event(source()?, CGEventType::MouseMoved, target, CGMouseButton::Left)
                .map_err(|_| anyhow!("failed to create move event"))?;
            event.post(CGEventTapLocation::HID);
        }
        if wheel != 0 {
            let event = CGEvent::new_scroll_event(source()?, ScrollEventUnit::LINE, 1, wheel, 0, 0)
                .map_err(|_| anyhow!("failed to create scroll event"))?;
            event.post(CGEventTapLocation::HID);
        }
        Ok(())
    }
}
