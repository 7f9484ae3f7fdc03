use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::logger;
use crate::types::*;

/// Progress through one active repeat block.
#[derive(Debug, Clone)]
pub struct RepeatFrame {
    pub actions: Arc<[Action]>,
    pub index: usize,
    pub iteration: u32,
    pub target: u32,
}

/// Derive the display state from the raw fields. The only place this mapping lives.
pub fn derive_state(
    active: bool,
    action_wait: Option<Instant>,
    cycle_wait: Option<Instant>,
    in_queue: bool,
) -> StateName {
    if !active {
        StateName::Off
    } else if cycle_wait.is_some() {
        StateName::Sleeping
    } else if action_wait.is_some() {
        StateName::Wait
    } else if in_queue {
        StateName::InQueue
    } else {
        StateName::Active
    }
}

/// Execution state of the macro bound to one key.
///
/// Two timers never run at once: the action wait keeps the slot, the cycle
/// wait (toggle only) gives it up.
#[derive(Debug)]
pub struct MacroState {
    pub key_id: KeyId,
    pub kind: MacroKind,
    pub name: String,
    actions: Arc<[Action]>,
    cycle_wait: Duration,

    active: bool,
    cursor: usize,
    repeat_stack: Vec<RepeatFrame>,
    action_wait_deadline: Option<Instant>,
    cycle_wait_deadline: Option<Instant>,
    key_held: bool,
}

impl MacroState {
    pub fn new(key_id: KeyId, config: &MacroConfig) -> Self {
        Self {
            key_id,
            kind: config.kind,
            name: config.name.clone(),
            actions: Arc::clone(&config.actions),
            cycle_wait: Duration::from_millis(config.cycle_wait_ms),
            active: false,
            cursor: 0,
            repeat_stack: Vec::new(),
            action_wait_deadline: None,
            cycle_wait_deadline: None,
            key_held: false,
        }
    }

    /// Start (or restart) from the first action.
    pub fn start(&mut self) {
        self.active = true;
        self.cursor = 0;
        self.repeat_stack.clear();
        self.action_wait_deadline = None;
        self.cycle_wait_deadline = None;
        if self.kind == MacroKind::Hold {
            self.key_held = true;
        }
        logger::info_p("engine", &format!("start {} ({}, {})", self.key_id, self.name, self.kind.label()));
    }

    /// Begin another pass without touching `active` or the slot (hold loop).
    pub fn restart(&mut self) {
        self.cursor = 0;
        self.repeat_stack.clear();
        self.action_wait_deadline = None;
    }

    /// Full reset to OFF. Safe to call repeatedly.
    pub fn stop(&mut self) {
        let was_active = self.active;
        self.active = false;
        self.cursor = 0;
        self.repeat_stack.clear();
        self.action_wait_deadline = None;
        self.cycle_wait_deadline = None;
        self.key_held = false;
        if was_active {
            logger::info_p("engine", &format!("stop {} ({})", self.key_id, self.name));
        }
    }

    /// Mark a toggle as wanting the slot, without starting it yet.
    pub fn activate(&mut self) {
        self.active = true;
        self.cursor = 0;
        self.repeat_stack.clear();
        self.action_wait_deadline = None;
        self.cycle_wait_deadline = None;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn key_held(&self) -> bool {
        self.key_held
    }

    pub fn set_key_held(&mut self, held: bool) {
        self.key_held = held;
    }

    pub fn cycle_wait(&self) -> Duration {
        self.cycle_wait
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn repeat_depth(&self) -> usize {
        self.repeat_stack.len()
    }

    pub fn action_wait_deadline(&self) -> Option<Instant> {
        self.action_wait_deadline
    }

    pub fn cycle_wait_deadline(&self) -> Option<Instant> {
        self.cycle_wait_deadline
    }

    pub fn is_waiting(&self) -> bool {
        self.active && self.action_wait_deadline.is_some()
    }

    pub fn is_sleeping(&self) -> bool {
        self.active && self.cycle_wait_deadline.is_some()
    }

    pub fn state_name(&self, in_queue: bool) -> StateName {
        derive_state(self.active, self.action_wait_deadline, self.cycle_wait_deadline, in_queue)
    }

    /// Time until the armed deadline fires, if one is armed.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.cycle_wait_deadline
            .or(self.action_wait_deadline)
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// (cursor, top-level action count)
    pub fn progress(&self) -> (usize, usize) {
        (self.cursor, self.actions.len())
    }

    // -- action cursor --

    /// The next action to run, or `None` once the top-level list is done.
    /// Finished repeat frames are rewound or popped here.
    pub fn current_action(&mut self) -> Option<&Action> {
        if !self.active {
            return None;
        }
        while let Some(frame) = self.repeat_stack.last_mut() {
            if frame.index < frame.actions.len() {
                break;
            }
            frame.iteration += 1;
            if frame.iteration < frame.target {
                frame.index = 0;
                break;
            }
            self.repeat_stack.pop();
        }
        match self.repeat_stack.last() {
            Some(frame) => frame.actions.get(frame.index),
            None => self.actions.get(self.cursor),
        }
    }

    /// Step past the current action in the innermost list.
    pub fn advance(&mut self) {
        match self.repeat_stack.last_mut() {
            Some(frame) => frame.index += 1,
            None => self.cursor = (self.cursor + 1).min(self.actions.len()),
        }
    }

    /// Consume the current Repeat action and push its frame. The parent is
    /// advanced first so the block falls through once exhausted.
    pub fn enter_repeat(&mut self, count: u32, actions: Arc<[Action]>) {
        self.advance();
        if count == 0 || actions.is_empty() {
            return;
        }
        self.repeat_stack.push(RepeatFrame { actions, index: 0, iteration: 0, target: count });
    }

    // -- timers --

    pub fn set_action_wait(&mut self, now: Instant, wait_ms: u64) {
        if wait_ms > 0 {
            self.action_wait_deadline = Some(now + Duration::from_millis(wait_ms));
        }
    }

    /// True exactly once per expiry.
    pub fn check_and_clear_action_timer(&mut self, now: Instant) -> bool {
        match self.action_wait_deadline {
            Some(deadline) if now >= deadline => {
                self.action_wait_deadline = None;
                true
            }
            _ => false,
        }
    }

    /// End of a toggle cycle: rewind and arm the cycle timer.
    /// Returns false when the configured wait is zero and nothing was armed.
    pub fn set_cycle_wait(&mut self, now: Instant) -> bool {
        self.restart();
        if self.cycle_wait.is_zero() {
            self.cycle_wait_deadline = None;
            return false;
        }
        self.cycle_wait_deadline = Some(now + self.cycle_wait);
        logger::info_p("engine", &format!("{} sleeping {}ms", self.key_id, self.cycle_wait.as_millis()));
        true
    }

    /// True exactly once per expiry.
    pub fn check_and_clear_cycle_timer(&mut self, now: Instant) -> bool {
        match self.cycle_wait_deadline {
            Some(deadline) if now >= deadline => {
                self.cycle_wait_deadline = None;
                true
            }
            _ => false,
        }
    }

    /// A priority macro took the slot from this toggle. It stays on, sleeps the
    /// full configured interval and restarts from its first action.
    pub fn interrupt_to_sleeping(&mut self, now: Instant) {
        if self.kind != MacroKind::Toggle {
            logger::warn_p("engine", &format!("interrupt_to_sleeping on non-toggle macro {}", self.key_id));
            return;
        }
        self.restart();
        self.cycle_wait_deadline = Some(now + self.cycle_wait);
        logger::info_p("engine", &format!("{} interrupted, sleeping {}ms", self.key_id, self.cycle_wait.as_millis()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keycode::Keycode;

    fn press(code: Keycode) -> Action {
        Action::new(ActionKind::Press(vec![code]))
    }

    fn config(kind: MacroKind, cycle_wait_ms: u64, actions: Vec<Action>) -> MacroConfig {
        MacroConfig { kind, name: "test".into(), cycle_wait_ms, actions: actions.into() }
    }

    /// Walk the cursor the way the engine does, collecting non-repeat actions.
    fn flatten(state: &mut MacroState) -> Vec<Action> {
        let mut out = Vec::new();
        while let Some(action) = state.current_action().cloned() {
            match action.kind {
                ActionKind::Repeat { count, actions } => state.enter_repeat(count, actions),
                _ => {
                    out.push(action);
                    state.advance();
                }
            }
        }
        out
    }

    #[test]
    fn nested_repeat_runs_inner_then_falls_through() {
        let inner: Arc<[Action]> = vec![press(Keycode::A)].into();
        let cfg = config(MacroKind::Press, 0, vec![
            Action::new(ActionKind::Repeat { count: 2, actions: inner }),
            press(Keycode::B),
        ]);
        let mut state = MacroState::new(0, &cfg);
        state.start();
        assert_eq!(flatten(&mut state), vec![press(Keycode::A), press(Keycode::A), press(Keycode::B)]);
        assert_eq!(state.repeat_depth(), 0);
    }

    #[test]
    fn repeat_once_matches_inlined_actions() {
        let inner: Arc<[Action]> = vec![press(Keycode::A), press(Keycode::B)].into();
        let cfg = config(MacroKind::Press, 0, vec![
            Action::new(ActionKind::Repeat { count: 1, actions: inner }),
            press(Keycode::C),
        ]);
        let mut state = MacroState::new(0, &cfg);
        state.start();
        assert_eq!(
            flatten(&mut state),
            vec![press(Keycode::A), press(Keycode::B), press(Keycode::C)]
        );
    }

    #[test]
    fn repeat_inside_repeat() {
        let innermost: Arc<[Action]> = vec![press(Keycode::A)].into();
        let middle: Arc<[Action]> = vec![
            Action::new(ActionKind::Repeat { count: 2, actions: innermost }),
            press(Keycode::B),
        ]
        .into();
        let cfg = config(MacroKind::Press, 0, vec![Action::new(ActionKind::Repeat { count: 2, actions: middle })]);
        let mut state = MacroState::new(0, &cfg);
        state.start();
        let a = press(Keycode::A);
        let b = press(Keycode::B);
        assert_eq!(flatten(&mut state), vec![a.clone(), a.clone(), b.clone(), a.clone(), a, b]);
    }

    #[test]
    fn zero_count_repeat_is_skipped() {
        let inner: Arc<[Action]> = vec![press(Keycode::A)].into();
        let cfg = config(MacroKind::Press, 0, vec![
            Action::new(ActionKind::Repeat { count: 0, actions: inner }),
            press(Keycode::B),
        ]);
        let mut state = MacroState::new(0, &cfg);
        state.start();
        assert_eq!(flatten(&mut state), vec![press(Keycode::B)]);
    }

    #[test]
    fn stop_is_idempotent() {
        let cfg = config(MacroKind::Hold, 0, vec![press(Keycode::A)]);
        let mut state = MacroState::new(3, &cfg);
        let now = Instant::now();
        state.start();
        state.set_action_wait(now, 50);
        state.stop();
        let once = (state.is_active(), state.cursor(), state.action_wait_deadline(), state.cycle_wait_deadline(), state.key_held());
        state.stop();
        let twice = (state.is_active(), state.cursor(), state.action_wait_deadline(), state.cycle_wait_deadline(), state.key_held());
        assert_eq!(once, twice);
        assert_eq!(state.state_name(false), StateName::Off);
    }

    #[test]
    fn timers_fire_exactly_once() {
        let cfg = config(MacroKind::Toggle, 500, vec![press(Keycode::A)]);
        let mut state = MacroState::new(0, &cfg);
        let t0 = Instant::now();
        state.start();

        state.set_action_wait(t0, 100);
        assert_eq!(state.state_name(false), StateName::Wait);
        assert!(!state.check_and_clear_action_timer(t0 + Duration::from_millis(99)));
        assert!(state.check_and_clear_action_timer(t0 + Duration::from_millis(100)));
        assert!(!state.check_and_clear_action_timer(t0 + Duration::from_millis(200)));

        assert!(state.set_cycle_wait(t0));
        assert_eq!(state.state_name(false), StateName::Sleeping);
        assert_eq!(state.remaining(t0 + Duration::from_millis(200)), Some(Duration::from_millis(300)));
        assert!(state.check_and_clear_cycle_timer(t0 + Duration::from_millis(500)));
        assert!(!state.check_and_clear_cycle_timer(t0 + Duration::from_millis(600)));
        assert_eq!(state.state_name(false), StateName::Active);
    }

    #[test]
    fn zero_wait_arms_nothing() {
        let cfg = config(MacroKind::Toggle, 0, vec![press(Keycode::A)]);
        let mut state = MacroState::new(0, &cfg);
        let now = Instant::now();
        state.start();
        state.set_action_wait(now, 0);
        assert_eq!(state.action_wait_deadline(), None);
        assert!(!state.set_cycle_wait(now));
        assert_eq!(state.cycle_wait_deadline(), None);
    }

    #[test]
    fn interrupt_uses_full_interval_and_rewinds() {
        let cfg = config(MacroKind::Toggle, 500, vec![press(Keycode::A), press(Keycode::B)]);
        let mut state = MacroState::new(0, &cfg);
        let now = Instant::now();
        state.start();
        state.advance();
        state.set_action_wait(now, 100);

        state.interrupt_to_sleeping(now);
        assert!(state.is_active());
        assert_eq!(state.cursor(), 0);
        assert_eq!(state.action_wait_deadline(), None);
        assert_eq!(state.cycle_wait_deadline(), Some(now + Duration::from_millis(500)));
    }

    #[test]
    fn interrupt_ignores_non_toggle() {
        let cfg = config(MacroKind::Press, 500, vec![press(Keycode::A)]);
        let mut state = MacroState::new(0, &cfg);
        state.start();
        state.interrupt_to_sleeping(Instant::now());
        assert_eq!(state.cycle_wait_deadline(), None);
        assert_eq!(state.state_name(false), StateName::Active);
    }

    #[test]
    fn derived_state_table() {
        let t = Some(Instant::now());
        assert_eq!(derive_state(false, t, None, true), StateName::Off);
        assert_eq!(derive_state(true, None, t, false), StateName::Sleeping);
        assert_eq!(derive_state(true, t, None, false), StateName::Wait);
        assert_eq!(derive_state(true, None, None, true), StateName::InQueue);
        assert_eq!(derive_state(true, None, None, false), StateName::Active);
    }
}
