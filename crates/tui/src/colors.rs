use std::path::Path;

use ratatui::style::Color;
use serde_json::Value;

use macropad_core::logger;
use macropad_core::types::{KeyId, PadView, StateName};

pub type Rgb = (u8, u8, u8);

/// LED color per derived key state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedColors {
    /// Macro bound but OFF
    pub ready: Rgb,
    /// ACTIVE or WAIT
    pub running: Rgb,
    /// SLEEPING
    pub wait: Rgb,
    pub queued: Rgb,
    /// Key without a macro
    pub off: Rgb,
    pub emergency: Rgb,
}

impl Default for LedColors {
    fn default() -> Self {
        Self {
            ready: (0, 80, 0),
            running: (0, 0, 80),
            wait: (80, 80, 0),
            queued: (60, 0, 60),
            off: (0, 0, 0),
            emergency: (255, 0, 0),
        }
    }
}

fn parse_rgb(value: &Value) -> Option<Rgb> {
    let parts = value.as_array()?;
    if parts.len() != 3 {
        return None;
    }
    let channel = |v: &Value| v.as_u64().and_then(|n| u8::try_from(n).ok());
    Some((channel(&parts[0])?, channel(&parts[1])?, channel(&parts[2])?))
}

impl LedColors {
    /// Defaults overridden by whatever valid entries `path` holds. The file
    /// may be flat or nest the table under `remaster` or `default`.
    pub fn load(path: &Path) -> Self {
        let mut colors = Self::default();
        let Some(data) = std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str::<Value>(&s).ok())
        else {
            return colors;
        };
        colors.apply(&data);
        colors
    }

    pub fn apply(&mut self, data: &Value) {
        let table = data.get("remaster").or_else(|| data.get("default")).unwrap_or(data);
        let Some(table) = table.as_object() else { return };

        for (name, value) in table {
            let Some(rgb) = parse_rgb(value) else {
                logger::warn(&format!("ignoring invalid color '{}'", name));
                continue;
            };
            match name.as_str() {
                "ready" => self.ready = rgb,
                "loop" => self.running = rgb,
                "wait" => self.wait = rgb,
                "queued" => self.queued = rgb,
                "off" => self.off = rgb,
                "emergency" | "error" => self.emergency = rgb,
                _ => {}
            }
        }
    }

    pub fn for_state(&self, state: Option<StateName>) -> Rgb {
        match state {
            None => self.off,
            Some(StateName::Off) => self.ready,
            Some(StateName::InQueue) => self.queued,
            Some(StateName::Sleeping) => self.wait,
            Some(StateName::Wait) | Some(StateName::Active) => self.running,
        }
    }

    /// Color of one pad key in `view`; every key goes red while blinking.
    pub fn for_key(&self, view: &PadView, key_id: KeyId) -> Rgb {
        if view.error.is_some() {
            return self.emergency;
        }
        self.for_state(view.key(key_id).map(|k| k.state))
    }
}

/// Dim hardware values look black in a terminal, so scale them up.
pub fn to_color((r, g, b): Rgb) -> Color {
    let boost = |c: u8| if c == 0 { 0 } else { c.saturating_mul(3).max(60) };
    Color::Rgb(boost(r), boost(g), boost(b))
}
