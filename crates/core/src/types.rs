use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::keycode::Keycode;

/// Logical key index. The pad itself has keys 0-11; the engine accepts any id.
pub type KeyId = u16;

/// Number of keys on the pad
pub const KEY_COUNT: usize = 12;

/// How a macro reacts to its key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroKind {
    /// Runs once per press, preempting whatever holds the slot
    Press,
    /// Repeats while the key is down, preempting whatever holds the slot
    Hold,
    /// Cycles until pressed again, waits in the queue for the slot
    Toggle,
}

impl MacroKind {
    /// Press and Hold preempt the slot; Toggle queues for it.
    pub fn is_priority(self) -> bool {
        matches!(self, MacroKind::Press | MacroKind::Hold)
    }

    pub fn label(self) -> &'static str {
        match self {
            MacroKind::Press => "press",
            MacroKind::Hold => "hold",
            MacroKind::Toggle => "toggle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

/// Wait attached to the end of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineWait {
    Fixed(u64),
    Random { min: u64, max: u64 },
}

/// One step of a macro
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    Press(Vec<Keycode>),
    PressDown(Vec<Keycode>),
    PressUp(Vec<Keycode>),
    Type(String),
    Wait(u64),
    WaitRandom { min: u64, max: u64 },
    MouseClick(MouseButton),
    MouseMove { x: i32, y: i32 },
    MouseScroll(i32),
    Repeat { count: u32, actions: Arc<[Action]> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    pub wait: Option<InlineWait>,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self { kind, wait: None }
    }

    pub fn with_wait(mut self, ms: u64) -> Self {
        self.wait = Some(InlineWait::Fixed(ms));
        self
    }

    pub fn with_random_wait(mut self, min: u64, max: u64) -> Self {
        self.wait = Some(InlineWait::Random { min, max });
        self
    }

    /// Short tag used in log lines
    pub fn label(&self) -> &'static str {
        match self.kind {
            ActionKind::Press(_) => "press",
            ActionKind::PressDown(_) => "press_down",
            ActionKind::PressUp(_) => "press_up",
            ActionKind::Type(_) => "type",
            ActionKind::Wait(_) => "wait",
            ActionKind::WaitRandom { .. } => "wait_random",
            ActionKind::MouseClick(_) => "mouse_click",
            ActionKind::MouseMove { .. } => "mouse_move",
            ActionKind::MouseScroll(_) => "mouse_scroll",
            ActionKind::Repeat { .. } => "repeat",
        }
    }
}

/// A validated macro bound to one key
#[derive(Debug, Clone)]
pub struct MacroConfig {
    pub kind: MacroKind,
    pub name: String,
    /// Toggle only: pause between cycles
    pub cycle_wait_ms: u64,
    pub actions: Arc<[Action]>,
}

/// A validated profile: at most one macro per key
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub name: String,
    pub macros: BTreeMap<KeyId, MacroConfig>,
}

/// Derived execution state of one macro
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateName {
    Off,
    Active,
    Wait,
    Sleeping,
    InQueue,
}

impl fmt::Display for StateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StateName::Off => "OFF",
            StateName::Active => "ACTIVE",
            StateName::Wait => "WAIT",
            StateName::Sleeping => "SLEEPING",
            StateName::InQueue => "IN_QUEUE",
        };
        f.write_str(s)
    }
}

/// Read-only view of one configured key, rebuilt every tick
#[derive(Debug, Clone)]
pub struct KeyView {
    pub key_id: KeyId,
    pub name: String,
    pub kind: MacroKind,
    pub state: StateName,
    pub remaining: Option<Duration>,
    /// (cursor, number of top-level actions)
    pub progress: (usize, usize),
}

/// Everything the display and LEDs need, published by the orchestrator
#[derive(Debug, Clone, Default)]
pub struct PadView {
    pub profile_name: String,
    pub profiles: Vec<String>,
    pub keys: Vec<KeyView>,
    pub slot: Option<KeyId>,
    pub queue: Vec<KeyId>,
    /// Message of the running error blink, if any
    pub error: Option<String>,
}

impl PadView {
    pub fn key(&self, key_id: KeyId) -> Option<&KeyView> {
        self.keys.iter().find(|k| k.key_id == key_id)
    }
}

/// Command from TUI to orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    KeyDown(KeyId),
    KeyUp(KeyId),
    EmergencyStop,
    /// +1 next profile, -1 previous
    SwitchProfile(i32),
    Quit,
}
