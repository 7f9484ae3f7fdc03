use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::keycode::parse_keys;
use crate::logger;
use crate::types::*;

// -- on-disk format --

#[derive(Debug, Deserialize)]
struct RawProfile {
    name: String,
    /// Index is the key id; `null` leaves the key unbound
    #[serde(default)]
    buttons: Vec<Value>,
    /// Older layout: `{"macros": {"0": {...}}}`
    #[serde(default)]
    macros: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawMacroKind {
    #[default]
    #[serde(alias = "once")]
    Press,
    Hold,
    Toggle,
}

#[derive(Debug, Deserialize)]
struct RawMacro {
    #[serde(rename = "type", default)]
    kind: RawMacroKind,
    name: Option<String>,
    #[serde(default, alias = "loop_cycle_wait_ms")]
    wait: u64,
    /// Older files carry this flag. It must be a bool but does not change
    /// behavior: a Hold macro repeats while held either way.
    #[serde(rename = "loop", default)]
    #[allow(dead_code)]
    looping: bool,
    actions: Vec<RawAction>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct RawRange {
    min: u64,
    max: u64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawButton {
    Number(u8),
    Name(String),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawKind {
    Press { keys: String },
    PressDown { keys: String },
    PressUp { keys: String },
    Type { text: String },
    Wait { ms: u64 },
    WaitRandom { min: u64, max: u64 },
    MouseClick { button: Option<RawButton> },
    MouseMove { x: i32, y: i32 },
    MouseScroll { amount: i32 },
    Repeat { count: u32, actions: Vec<RawAction> },
}

#[derive(Debug, Deserialize)]
struct RawAction {
    #[serde(flatten)]
    kind: RawKind,
    wait: Option<u64>,
    wait_random: Option<RawRange>,
}

// -- validation --

fn check_range(min: u64, max: u64) -> Result<()> {
    if min > max {
        bail!("min {} is greater than max {}", min, max);
    }
    Ok(())
}

fn convert_button(raw: Option<RawButton>) -> Result<MouseButton> {
    let button = match raw {
        None => MouseButton::Left,
        Some(RawButton::Number(1)) => MouseButton::Left,
        Some(RawButton::Number(2)) => MouseButton::Right,
        Some(RawButton::Number(3)) => MouseButton::Middle,
        Some(RawButton::Name(name)) => match name.to_ascii_lowercase().as_str() {
            "left" => MouseButton::Left,
            "right" => MouseButton::Right,
            "middle" => MouseButton::Middle,
            _ => bail!("invalid mouse button '{}'", name),
        },
        Some(RawButton::Number(n)) => bail!("invalid mouse button {}", n),
    };
    Ok(button)
}

fn convert_actions(raw: Vec<RawAction>, path: &str) -> Result<Arc<[Action]>> {
    raw.into_iter()
        .enumerate()
        .map(|(i, action)| {
            let at = if path.is_empty() { i.to_string() } else { format!("{}.{}", path, i) };
            convert_action(action, &at).with_context(|| format!("action {}", at))
        })
        .collect()
}

fn convert_action(raw: RawAction, path: &str) -> Result<Action> {
    let kind = match raw.kind {
        RawKind::Press { keys } => ActionKind::Press(parse_keys(&keys)?),
        RawKind::PressDown { keys } => ActionKind::PressDown(parse_keys(&keys)?),
        RawKind::PressUp { keys } => ActionKind::PressUp(parse_keys(&keys)?),
        RawKind::Type { text } => ActionKind::Type(text),
        RawKind::Wait { ms } => ActionKind::Wait(ms),
        RawKind::WaitRandom { min, max } => {
            check_range(min, max)?;
            ActionKind::WaitRandom { min, max }
        }
        RawKind::MouseClick { button } => ActionKind::MouseClick(convert_button(button)?),
        RawKind::MouseMove { x, y } => ActionKind::MouseMove { x, y },
        RawKind::MouseScroll { amount } => ActionKind::MouseScroll(amount),
        RawKind::Repeat { count, actions } => ActionKind::Repeat { count, actions: convert_actions(actions, path)? },
    };

    let mut action = Action::new(kind);
    if let Some(range) = raw.wait_random {
        check_range(range.min, range.max).context("wait_random")?;
        action = action.with_random_wait(range.min, range.max);
    } else if let Some(ms) = raw.wait {
        action = action.with_wait(ms);
    }
    Ok(action)
}

/// Validate one button entry into a macro for `key_id`.
pub fn parse_macro(key_id: KeyId, value: Value) -> Result<MacroConfig> {
    let raw: RawMacro = serde_json::from_value(value)?;
    if raw.actions.is_empty() {
        bail!("'actions' list is empty");
    }
    let kind = match raw.kind {
        RawMacroKind::Press => MacroKind::Press,
        RawMacroKind::Hold => MacroKind::Hold,
        RawMacroKind::Toggle => MacroKind::Toggle,
    };
    Ok(MacroConfig {
        kind,
        name: raw.name.unwrap_or_else(|| format!("Macro {}", key_id)),
        cycle_wait_ms: raw.wait,
        actions: convert_actions(raw.actions, "")?,
    })
}

/// Parse profile JSON. Invalid buttons are dropped with a warning; only a
/// malformed document is an error.
pub fn parse_profile(json: &str) -> Result<Profile> {
    let raw: RawProfile = serde_json::from_str(json)?;

    let mut entries: Vec<(KeyId, Value)> = raw
        .buttons
        .into_iter()
        .enumerate()
        .filter(|(_, v)| !v.is_null())
        .map(|(i, v)| (i as KeyId, v))
        .collect();
    for (key, value) in raw.macros {
        match key.parse::<KeyId>() {
            Ok(id) => entries.push((id, value)),
            Err(_) => logger::warn_p("profile", &format!("invalid key '{}', must be 0-{}", key, KEY_COUNT - 1)),
        }
    }

    let mut macros = BTreeMap::new();
    for (key_id, value) in entries {
        if key_id as usize >= KEY_COUNT {
            logger::warn_p("profile", &format!("key {} out of range (0-{}), skipping", key_id, KEY_COUNT - 1));
            continue;
        }
        match parse_macro(key_id, value) {
            Ok(config) => {
                macros.insert(key_id, config);
            }
            Err(e) => logger::warn_p("profile", &format!("key {}: {:#}, skipping", key_id, e)),
        }
    }

    Ok(Profile { name: raw.name, macros })
}

pub fn load_profile_file(path: &Path) -> Result<Profile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_profile(&text).with_context(|| format!("parsing {}", path.display()))
}

// -- profile switching --

#[derive(Debug, Default, Serialize, Deserialize)]
struct CurrentProfile {
    #[serde(default)]
    current: String,
}

#[derive(Debug)]
pub struct ProfileEntry {
    pub path: PathBuf,
    pub profile: Profile,
}

/// All profiles in a directory, plus which one is selected. The selection
/// survives restarts via the current-profile file.
#[derive(Debug)]
pub struct ProfileManager {
    entries: Vec<ProfileEntry>,
    current: usize,
    current_file: PathBuf,
}

impl ProfileManager {
    /// Load every `*.json` under `dir` in file-name order. Fails when none loads.
    pub fn load(dir: &Path, current_file: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("listing {}", dir.display()))?
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut entries = Vec::new();
        for path in paths {
            match load_profile_file(&path) {
                Ok(profile) => {
                    logger::info_p("profile", &format!("loaded '{}' from {}", profile.name, path.display()));
                    entries.push(ProfileEntry { path, profile });
                }
                Err(e) => logger::error_p("profile", &format!("{:#}", e)),
            }
        }
        if entries.is_empty() {
            bail!("no usable profiles in {}", dir.display());
        }

        let mut manager = Self { entries, current: 0, current_file: current_file.to_path_buf() };
        manager.restore_current();
        Ok(manager)
    }

    fn restore_current(&mut self) {
        let saved = std::fs::read_to_string(&self.current_file)
            .ok()
            .and_then(|s| serde_json::from_str::<CurrentProfile>(&s).ok())
            .unwrap_or_default();
        let wanted = Path::new(saved.current.trim());

        match self.entries.iter().position(|e| same_file(&e.path, wanted)) {
            Some(i) => self.current = i,
            None => {
                if !saved.current.is_empty() {
                    logger::warn_p("profile", &format!("saved profile {} not found, using first", saved.current));
                }
                self.current = 0;
                self.save_current();
            }
        }
        logger::info_p("profile", &format!("current profile: {}", self.current().name));
    }

    fn save_current(&self) {
        let data = CurrentProfile { current: self.entries[self.current].path.to_string_lossy().into_owned() };
        let result = serde_json::to_string_pretty(&data)
            .map_err(anyhow::Error::from)
            .and_then(|json| std::fs::write(&self.current_file, json).map_err(anyhow::Error::from));
        if let Err(e) = result {
            logger::warn_p("profile", &format!("could not save {}: {}", self.current_file.display(), e));
        }
    }

    pub fn current(&self) -> &Profile {
        &self.entries[self.current].profile
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.profile.name.clone()).collect()
    }

    /// Step `direction` profiles forward (negative: back), wrapping around.
    pub fn switch(&mut self, direction: i32) -> &Profile {
        let len = self.entries.len() as i64;
        self.current = (self.current as i64 + direction as i64).rem_euclid(len) as usize;
        self.save_current();
        logger::info_p("profile", &format!("switched to '{}'", self.current().name));
        self.current()
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if b.as_os_str().is_empty() {
        return false;
    }
    a == b || (a.file_name().is_some() && a.file_name() == b.file_name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keycode::Keycode;

    #[test]
    fn inline_waits_and_defaults() {
        let profile = parse_profile(r#"{
            "name": "Demo",
            "buttons": [
                {"type": "once", "actions": [
                    {"type": "press", "keys": "Ctrl+C", "wait": 20},
                    {"type": "mouse_click", "button": 2, "wait_random": {"min": 5, "max": 9}}
                ]}
            ]
        }"#).unwrap();
        let m = &profile.macros[&0];
        assert_eq!(m.kind, MacroKind::Press);
        assert_eq!(m.name, "Macro 0");
        assert_eq!(m.actions[0], Action::new(ActionKind::Press(vec![Keycode::LEFT_CONTROL, Keycode::C])).with_wait(20));
        assert_eq!(m.actions[1], Action::new(ActionKind::MouseClick(MouseButton::Right)).with_random_wait(5, 9));
    }

    #[test]
    fn switch_wraps_both_ways() {
        let dir = std::env::temp_dir().join(format!("macropad-profile-unit-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for name in ["a", "b", "c"] {
            let json = format!(r#"{{"name": "{}", "buttons": [{{"actions": [{{"type": "wait", "ms": 1}}]}}]}}"#, name);
            std::fs::write(dir.join(format!("{}.json", name)), json).unwrap();
        }
        let current = dir.join("current.txt");
        let mut pm = ProfileManager::load(&dir, &current).unwrap();
        assert_eq!(pm.current().name, "a");
        assert_eq!(pm.switch(-1).name, "c");
        assert_eq!(pm.switch(1).name, "a");
        assert_eq!(pm.switch(2).name, "c");
        std::fs::remove_dir_all(&dir).ok();
    }
}
