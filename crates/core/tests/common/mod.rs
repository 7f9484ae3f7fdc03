#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;

use macropad_core::engine::MacroEngine;
use macropad_core::executor::{ActionExecutor, ExecutorTiming};
use macropad_core::keycode::Keycode;
use macropad_core::platform::OutputDevice;
use macropad_core::sleep::Clock;
use macropad_core::types::*;

/// Clock that only moves when a test says so.
#[derive(Clone)]
pub struct ManualClock {
    base: Instant,
    offset_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self { base: Instant::now(), offset_ms: Arc::new(AtomicU64::new(0)) }
    }

    pub fn advance(&self, ms: u64) {
        self.offset_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

/// Output device that records every call as a short string.
#[derive(Clone, Default)]
pub struct RecordingOutput {
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingOutput {
    fn push(&self, s: String) {
        self.calls.lock().unwrap().push(s);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Only the key presses, e.g. `["A", "A", "B"]`.
    pub fn pressed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix("press ").map(str::to_string))
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl OutputDevice for RecordingOutput {
    fn press(&mut self, key: Keycode) -> Result<()> {
        self.push(format!("press {}", key));
        Ok(())
    }
    fn release(&mut self, key: Keycode) -> Result<()> {
        self.push(format!("release {}", key));
        Ok(())
    }
    fn release_all(&mut self) -> Result<()> {
        self.push("release_all".into());
        Ok(())
    }
    fn send_char(&mut self, ch: char) -> Result<()> {
        self.push(format!("char {}", ch));
        Ok(())
    }
    fn click(&mut self, button: MouseButton) -> Result<()> {
        self.push(format!("click {:?}", button));
        Ok(())
    }
    fn move_by(&mut self, dx: i32, dy: i32, wheel: i32) -> Result<()> {
        self.push(format!("move {} {} {}", dx, dy, wheel));
        Ok(())
    }
}

pub struct Harness {
    pub engine: MacroEngine,
    pub clock: ManualClock,
    pub output: RecordingOutput,
}

impl Harness {
    pub fn new(profile: &Profile) -> Self {
        let clock = ManualClock::new();
        let output = RecordingOutput::default();
        let executor = ActionExecutor::new(Box::new(output.clone()), ExecutorTiming::instant());
        let mut engine = MacroEngine::new(Box::new(clock.clone()), executor);
        engine.load_profile(profile);
        output.clear();
        Self { engine, clock, output }
    }

    /// Advance time then run one tick, checking invariants after each step.
    pub fn step(&mut self, ms: u64) {
        self.clock.advance(ms);
        self.engine.tick();
        self.engine.check_invariants().unwrap();
    }

    pub fn press(&mut self, key: KeyId) {
        self.engine.handle_key_press(key);
        self.engine.check_invariants().unwrap();
    }

    pub fn release(&mut self, key: KeyId) {
        self.engine.handle_key_release(key);
        self.engine.check_invariants().unwrap();
    }

    pub fn state(&self, key: KeyId) -> StateName {
        self.engine.state_name(key).unwrap()
    }
}

// -- builders --

pub fn press(key: Keycode) -> Action {
    Action::new(ActionKind::Press(vec![key]))
}

pub fn wait(ms: u64) -> Action {
    Action::new(ActionKind::Wait(ms))
}

pub fn repeat(count: u32, actions: Vec<Action>) -> Action {
    Action::new(ActionKind::Repeat { count, actions: actions.into() })
}

pub fn macro_config(kind: MacroKind, cycle_wait_ms: u64, actions: Vec<Action>) -> MacroConfig {
    MacroConfig { kind, name: format!("{} macro", kind.label()), cycle_wait_ms, actions: actions.into() }
}

pub fn profile(macros: Vec<(KeyId, MacroConfig)>) -> Profile {
    Profile { name: "test".into(), macros: macros.into_iter().collect::<BTreeMap<_, _>>() }
}
