use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::executor::ExecutorTiming;

/// Runtime settings from `settings.json`. Missing fields take defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub profiles_dir: PathBuf,
    pub current_profile_file: PathBuf,
    pub colors_file: PathBuf,
    pub log_dir: PathBuf,
    /// Sleep between engine ticks
    pub tick_ms: u64,
    pub key_settle_ms: u64,
    pub type_char_ms: u64,
    /// Run `check_invariants` after every tick
    pub check_invariants: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            profiles_dir: PathBuf::from("data/profiles"),
            current_profile_file: PathBuf::from("data/current_profile.json"),
            colors_file: PathBuf::from("data/button_colors.json"),
            log_dir: PathBuf::from("logs"),
            tick_ms: 10,
            key_settle_ms: 10,
            type_char_ms: 50,
            check_invariants: false,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn timing(&self) -> ExecutorTiming {
        ExecutorTiming { key_settle_ms: self.key_settle_ms, type_char_ms: self.type_char_ms }
    }
}
