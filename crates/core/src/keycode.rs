use std::fmt;

use anyhow::{Result, bail};

/// HID keyboard usage id. Modifiers live in 0xE0..=0xE7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Keycode(pub u8);

impl Keycode {
    pub const A: Keycode = Keycode(0x04);
    pub const B: Keycode = Keycode(0x05);
    pub const C: Keycode = Keycode(0x06);
    pub const V: Keycode = Keycode(0x19);
    pub const ENTER: Keycode = Keycode(0x28);
    pub const ESCAPE: Keycode = Keycode(0x29);
    pub const SPACE: Keycode = Keycode(0x2C);
    pub const LEFT_CONTROL: Keycode = Keycode(0xE0);
    pub const LEFT_SHIFT: Keycode = Keycode(0xE1);
    pub const LEFT_ALT: Keycode = Keycode(0xE2);
    pub const LEFT_GUI: Keycode = Keycode(0xE3);
    pub const RIGHT_CONTROL: Keycode = Keycode(0xE4);
    pub const RIGHT_SHIFT: Keycode = Keycode(0xE5);
    pub const RIGHT_ALT: Keycode = Keycode(0xE6);
    pub const RIGHT_GUI: Keycode = Keycode(0xE7);

    pub fn is_modifier(self) -> bool {
        (0xE0..=0xE7).contains(&self.0)
    }

    /// Canonical name, used for logging
    pub fn name(self) -> &'static str {
        KEY_NAMES
            .iter()
            .find(|(_, code)| *code == self)
            .map(|(name, _)| *name)
            .unwrap_or("?")
    }

    /// Look up a single key name, case-insensitive.
    pub fn from_name(name: &str) -> Option<Keycode> {
        let upper = name.trim().to_ascii_uppercase();
        KEY_NAMES
            .iter()
            .find(|(n, _)| *n == upper)
            .map(|(_, code)| *code)
    }
}

impl fmt::Display for Keycode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// First entry for a code is its canonical name.
const KEY_NAMES: &[(&str, Keycode)] = &[
    ("A", Keycode(0x04)), ("B", Keycode(0x05)), ("C", Keycode(0x06)), ("D", Keycode(0x07)),
    ("E", Keycode(0x08)), ("F", Keycode(0x09)), ("G", Keycode(0x0A)), ("H", Keycode(0x0B)),
    ("I", Keycode(0x0C)), ("J", Keycode(0x0D)), ("K", Keycode(0x0E)), ("L", Keycode(0x0F)),
    ("M", Keycode(0x10)), ("N", Keycode(0x11)), ("O", Keycode(0x12)), ("P", Keycode(0x13)),
    ("Q", Keycode(0x14)), ("R", Keycode(0x15)), ("S", Keycode(0x16)), ("T", Keycode(0x17)),
    ("U", Keycode(0x18)), ("V", Keycode(0x19)), ("W", Keycode(0x1A)), ("X", Keycode(0x1B)),
    ("Y", Keycode(0x1C)), ("Z", Keycode(0x1D)),
    ("1", Keycode(0x1E)), ("2", Keycode(0x1F)), ("3", Keycode(0x20)), ("4", Keycode(0x21)),
    ("5", Keycode(0x22)), ("6", Keycode(0x23)), ("7", Keycode(0x24)), ("8", Keycode(0x25)),
    ("9", Keycode(0x26)), ("0", Keycode(0x27)),
    ("ENTER", Keycode(0x28)), ("RETURN", Keycode(0x28)),
    ("ESCAPE", Keycode(0x29)), ("ESC", Keycode(0x29)),
    ("BACKSPACE", Keycode(0x2A)),
    ("TAB", Keycode(0x2B)),
    ("SPACE", Keycode(0x2C)), ("SPACEBAR", Keycode(0x2C)),
    ("MINUS", Keycode(0x2D)), ("EQUALS", Keycode(0x2E)),
    ("LEFT_BRACKET", Keycode(0x2F)), ("RIGHT_BRACKET", Keycode(0x30)),
    ("BACKSLASH", Keycode(0x31)), ("POUND", Keycode(0x32)),
    ("SEMICOLON", Keycode(0x33)), ("QUOTE", Keycode(0x34)),
    ("GRAVE_ACCENT", Keycode(0x35)),
    ("COMMA", Keycode(0x36)), ("PERIOD", Keycode(0x37)),
    ("FORWARD_SLASH", Keycode(0x38)),
    ("CAPS_LOCK", Keycode(0x39)),
    ("F1", Keycode(0x3A)), ("F2", Keycode(0x3B)), ("F3", Keycode(0x3C)), ("F4", Keycode(0x3D)),
    ("F5", Keycode(0x3E)), ("F6", Keycode(0x3F)), ("F7", Keycode(0x40)), ("F8", Keycode(0x41)),
    ("F9", Keycode(0x42)), ("F10", Keycode(0x43)), ("F11", Keycode(0x44)), ("F12", Keycode(0x45)),
    ("PRINT_SCREEN", Keycode(0x46)), ("SCROLL_LOCK", Keycode(0x47)), ("PAUSE", Keycode(0x48)),
    ("INSERT", Keycode(0x49)), ("HOME", Keycode(0x4A)),
    ("PAGE_UP", Keycode(0x4B)), ("PAGEUP", Keycode(0x4B)),
    ("DELETE", Keycode(0x4C)), ("END", Keycode(0x4D)),
    ("PAGE_DOWN", Keycode(0x4E)), ("PAGEDOWN", Keycode(0x4E)),
    ("RIGHT", Keycode(0x4F)), ("RIGHT_ARROW", Keycode(0x4F)),
    ("LEFT", Keycode(0x50)), ("LEFT_ARROW", Keycode(0x50)),
    ("DOWN", Keycode(0x51)), ("DOWN_ARROW", Keycode(0x51)),
    ("UP", Keycode(0x52)), ("UP_ARROW", Keycode(0x52)),
    // Bare modifier names map to the left-hand key
    ("CTRL", Keycode(0xE0)), ("CONTROL", Keycode(0xE0)),
    ("LEFT_CTRL", Keycode(0xE0)), ("LEFT_CONTROL", Keycode(0xE0)),
    ("SHIFT", Keycode(0xE1)), ("LEFT_SHIFT", Keycode(0xE1)),
    ("ALT", Keycode(0xE2)), ("OPTION", Keycode(0xE2)), ("LEFT_ALT", Keycode(0xE2)),
    ("GUI", Keycode(0xE3)), ("WIN", Keycode(0xE3)), ("WINDOWS", Keycode(0xE3)),
    ("CMD", Keycode(0xE3)), ("COMMAND", Keycode(0xE3)), ("LEFT_GUI", Keycode(0xE3)),
    ("RIGHT_CTRL", Keycode(0xE4)), ("RIGHT_CONTROL", Keycode(0xE4)),
    ("RIGHT_SHIFT", Keycode(0xE5)),
    ("RIGHT_ALT", Keycode(0xE6)),
    ("RIGHT_GUI", Keycode(0xE7)),
];

/// Parse a combination like `"Ctrl+Shift+F1"` into keycodes, in order.
pub fn parse_keys(keys: &str) -> Result<Vec<Keycode>> {
    if keys.trim().is_empty() {
        bail!("empty key combination");
    }
    keys.split('+')
        .map(|part| match Keycode::from_name(part) {
            Some(code) => Ok(code),
            None => bail!("unknown key '{}' in '{}'", part.trim(), keys),
        })
        .collect()
}
