use std::time::Duration;

use macropad_core::types::{KeyView, MacroKind, PadView, StateName};

/// Rows on the pad's text display.
pub const DISPLAY_LINES: usize = 4;

fn truncate(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

fn short_time(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!("{}h", secs / 3600)
    } else if secs >= 60 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// Sort key: running first, then by time to next event, queued last.
fn urgency(key: &KeyView) -> (u8, Duration) {
    match key.state {
        StateName::Active => (0, Duration::ZERO),
        StateName::Wait | StateName::Sleeping => (1, key.remaining.unwrap_or_default()),
        _ => (2, Duration::ZERO),
    }
}

fn toggle_line(key: &KeyView) -> String {
    let name = truncate(&key.name, 5);
    let when = match key.state {
        StateName::InQueue => "Q".to_string(),
        StateName::Active => "0s".to_string(),
        StateName::Wait | StateName::Sleeping => short_time(key.remaining.unwrap_or_default()),
        StateName::Off => "?".to_string(),
    };
    format!("#{} {:5}: {}", key.key_id, name, when)
}

fn profile_navigation(view: &PadView) -> Vec<String> {
    if view.profiles.is_empty() {
        return vec!["No profiles".into(), "available".into(), String::new(), "Check data/".into()];
    }
    let total = view.profiles.len();
    let current = view.profiles.iter().position(|p| *p == view.profile_name).unwrap_or(0);
    let current_line = format!("[ {} ]", truncate(&view.profile_name, 12));
    if total == 1 {
        return vec![String::new(), current_line, String::new(), String::new()];
    }
    let prev = &view.profiles[(current + total - 1) % total];
    let next = &view.profiles[(current + 1) % total];
    vec![
        format!("< {}", truncate(prev, 13)),
        current_line,
        format!("> {}", truncate(next, 13)),
        String::new(),
    ]
}

/// The four lines shown on the pad's text display.
pub fn display_lines(view: &PadView) -> Vec<String> {
    if let Some(msg) = &view.error {
        return vec!["!!! ERROR !!!".into(), String::new(), truncate(msg, 16), "Press Enc=Reset".into()];
    }

    let mut toggles: Vec<&KeyView> = view
        .keys
        .iter()
        .filter(|k| k.kind == MacroKind::Toggle && k.state != StateName::Off)
        .collect();
    if toggles.is_empty() {
        return profile_navigation(view);
    }
    toggles.sort_by_key(|k| urgency(k));

    let mut lines: Vec<String> = if toggles.len() <= DISPLAY_LINES {
        toggles.iter().map(|k| toggle_line(k)).collect()
    } else {
        let mut lines: Vec<String> = toggles.iter().take(DISPLAY_LINES - 1).map(|k| toggle_line(k)).collect();
        lines.push(format!("... +{} more", toggles.len() - (DISPLAY_LINES - 1)));
        lines
    };
    lines.resize(DISPLAY_LINES, String::new());
    lines
}
