use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use anyhow::{Result, bail};

use crate::executor::ActionExecutor;
use crate::logger;
use crate::queue::QueueManager;
use crate::sleep::Clock;
use crate::state::MacroState;
use crate::types::*;

/// Upper bound on actions run for the slot holder in one tick.
/// A macro made only of zero-wait actions yields after this many.
pub const MAX_ACTIONS_PER_TICK: usize = 64;

pub const OVERFLOW_BLINK: Duration = Duration::from_secs(3);
pub const EMERGENCY_BLINK: Duration = Duration::from_millis(1500);
pub const ERROR_BLINK: Duration = Duration::from_secs(3);

/// Decides which macro owns the output and drives it one tick at a time.
///
/// Press and Hold preempt the slot holder. Toggles take a free slot or wait
/// in the FIFO queue. Nothing in here blocks: every pause is a deadline
/// compared against the injected clock.
pub struct MacroEngine {
    clock: Box<dyn Clock>,
    executor: ActionExecutor,
    queue: QueueManager,
    states: BTreeMap<KeyId, MacroState>,
    blink: Option<(Instant, String)>,
}

impl MacroEngine {
    pub fn new(clock: Box<dyn Clock>, executor: ActionExecutor) -> Self {
        Self {
            clock,
            executor,
            queue: QueueManager::new(),
            states: BTreeMap::new(),
            blink: None,
        }
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    // -- input --

    pub fn handle_key_press(&mut self, key_id: KeyId) {
        let Some(kind) = self.states.get(&key_id).map(|s| s.kind) else {
            logger::info_p("engine", &format!("key {} has no macro", key_id));
            return;
        };
        if kind.is_priority() {
            self.press_priority(key_id);
        } else {
            self.press_toggle(key_id);
        }
    }

    pub fn handle_key_release(&mut self, key_id: KeyId) {
        let Some(state) = self.states.get_mut(&key_id) else { return };
        if state.kind == MacroKind::Hold && state.key_held() {
            state.set_key_held(false);
            logger::info_p("engine", &format!("{} released, finishing pass", key_id));
        }
    }

    fn press_priority(&mut self, key_id: KeyId) {
        let now = self.clock.now();
        if let Some(holder) = self.queue.slot() {
            match self.states.get_mut(&holder) {
                Some(s) if s.kind == MacroKind::Toggle => s.interrupt_to_sleeping(now),
                Some(s) => s.stop(),
                None => logger::warn_p("engine", &format!("slot held by unknown key {}", holder)),
            }
        }
        if let Some(state) = self.states.get_mut(&key_id) {
            state.start();
        }
        self.queue.set_slot(Some(key_id));
    }

    fn press_toggle(&mut self, key_id: KeyId) {
        let Some(state) = self.states.get_mut(&key_id) else { return };

        if state.is_active() {
            state.stop();
            self.queue.remove_from_queue(key_id);
            if self.queue.slot() == Some(key_id) {
                self.queue.free_slot();
                self.process_queue();
            }
            return;
        }

        state.activate();
        if self.queue.is_slot_free() {
            state.start();
            self.queue.set_slot(Some(key_id));
        } else {
            self.enqueue_or_fail(key_id);
        }
    }

    /// Queue `key_id`; an overflow stops everything. Returns false on overflow.
    fn enqueue_or_fail(&mut self, key_id: KeyId) -> bool {
        if self.queue.try_add_to_queue(key_id) {
            return true;
        }
        self.emergency_stop_all();
        self.start_error_blink(OVERFLOW_BLINK, "QUEUE OVERFLOW!");
        false
    }

    /// Give the slot to `key_id` if free, otherwise join the queue tail.
    fn rearbitrate(&mut self, key_id: KeyId) -> bool {
        if self.queue.is_slot_free() {
            if let Some(state) = self.states.get_mut(&key_id) {
                state.start();
            }
            self.queue.set_slot(Some(key_id));
            true
        } else {
            self.enqueue_or_fail(key_id)
        }
    }

    // -- tick --

    /// One scheduling step: wake, drain, execute. The clock is read once.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        if !self.wake_sleeping_macros(now) {
            return;
        }
        self.process_queue();
        self.execute_active_macro(now);
    }

    /// Toggles whose cycle wait expired ask for the slot again.
    /// Returns false if an overflow stopped the engine.
    fn wake_sleeping_macros(&mut self, now: Instant) -> bool {
        let woken: Vec<KeyId> = self
            .states
            .values_mut()
            .filter(|s| s.is_sleeping())
            .filter_map(|s| s.check_and_clear_cycle_timer(now).then_some(s.key_id))
            .collect();

        for key_id in woken {
            logger::info_p("engine", &format!("{} woke", key_id));
            if !self.rearbitrate(key_id) {
                return false;
            }
        }
        true
    }

    /// Fill a free slot from the queue head, skipping stale entries.
    fn process_queue(&mut self) {
        while self.queue.is_slot_free() {
            let Some(key_id) = self.queue.pop_next_from_queue() else { return };
            match self.states.get_mut(&key_id) {
                Some(state) if state.is_active() => {
                    state.start();
                    self.queue.set_slot(Some(key_id));
                }
                Some(_) => logger::info_p("engine", &format!("{} cancelled while queued, skipped", key_id)),
                None => logger::warn_p("engine", &format!("queued key {} has no macro, skipped", key_id)),
            }
        }
    }

    fn execute_active_macro(&mut self, now: Instant) {
        let Some(key_id) = self.queue.slot() else { return };

        match self.states.get(&key_id) {
            Some(state) if state.is_active() => {}
            Some(_) => {
                logger::warn_p("engine", &format!("slot holder {} is inactive, freeing slot", key_id));
                self.queue.free_slot();
                self.process_queue();
                return;
            }
            None => {
                logger::warn_p("engine", &format!("slot holder {} has no macro, freeing slot", key_id));
                self.queue.free_slot();
                self.process_queue();
                return;
            }
        }

        for _ in 0..MAX_ACTIONS_PER_TICK {
            let Some(state) = self.states.get_mut(&key_id) else { return };
            state.check_and_clear_action_timer(now);
            if state.is_waiting() {
                return;
            }

            let Some(action) = state.current_action().cloned() else {
                self.complete(key_id, now);
                return;
            };

            match action.kind {
                ActionKind::Repeat { count, actions } => state.enter_repeat(count, actions),
                _ => {
                    let wait = self.executor.execute(&action);
                    state.advance();
                    if wait > 0 {
                        state.set_action_wait(now, wait);
                        return;
                    }
                }
            }
        }
    }

    /// The slot holder ran out of actions.
    fn complete(&mut self, key_id: KeyId, now: Instant) {
        let Some(state) = self.states.get_mut(&key_id) else { return };

        match state.kind {
            MacroKind::Toggle => {
                let armed = state.set_cycle_wait(now);
                self.queue.free_slot();
                self.process_queue();
                if !armed {
                    self.rearbitrate(key_id);
                }
            }
            MacroKind::Hold if state.key_held() => state.restart(),
            MacroKind::Hold | MacroKind::Press => {
                state.stop();
                self.queue.free_slot();
                self.process_queue();
            }
        }
    }

    // -- lifecycle --

    /// Stop everything and install the macros of `profile`.
    pub fn load_profile(&mut self, profile: &Profile) {
        self.states = profile
            .macros
            .iter()
            .map(|(&key_id, config)| (key_id, MacroState::new(key_id, config)))
            .collect();
        self.emergency_stop_all();
        logger::info_p("engine", &format!("loaded profile '{}' ({} macros)", profile.name, self.states.len()));
    }

    /// Every macro OFF, slot and queue empty, all output released.
    pub fn emergency_stop_all(&mut self) {
        for state in self.states.values_mut() {
            state.stop();
        }
        self.queue.clear_all();
        self.executor.release_all();
        logger::warn_p("engine", "emergency stop");
    }

    pub fn start_error_blink(&mut self, duration: Duration, message: &str) {
        logger::error_p("engine", message);
        self.blink = Some((self.clock.now() + duration, message.to_string()));
    }

    pub fn is_emergency_blinking(&self) -> bool {
        self.error_message().is_some()
    }

    /// Message of the running blink; `None` once it has expired.
    pub fn error_message(&self) -> Option<&str> {
        match &self.blink {
            Some((until, msg)) if self.clock.now() < *until => Some(msg),
            _ => None,
        }
    }

    // -- views --

    pub fn macro_state(&self, key_id: KeyId) -> Option<&MacroState> {
        self.states.get(&key_id)
    }

    pub fn state_name(&self, key_id: KeyId) -> Option<StateName> {
        self.states
            .get(&key_id)
            .map(|s| s.state_name(self.queue.is_in_queue(key_id)))
    }

    pub fn remaining(&self, key_id: KeyId) -> Option<Duration> {
        self.states.get(&key_id)?.remaining(self.clock.now())
    }

    pub fn slot(&self) -> Option<KeyId> {
        self.queue.slot()
    }

    pub fn queue_items(&self) -> Vec<KeyId> {
        self.queue.queue_items()
    }

    pub fn key_ids(&self) -> impl Iterator<Item = KeyId> + '_ {
        self.states.keys().copied()
    }

    pub fn snapshot(&self) -> Vec<KeyView> {
        let now = self.clock.now();
        self.states
            .values()
            .map(|s| KeyView {
                key_id: s.key_id,
                name: s.name.clone(),
                kind: s.kind,
                state: s.state_name(self.queue.is_in_queue(s.key_id)),
                remaining: s.remaining(now),
                progress: s.progress(),
            })
            .collect()
    }

    /// Structural checks over slot, queue and timers.
    pub fn check_invariants(&self) -> Result<()> {
        if let Some(key_id) = self.queue.slot() {
            match self.states.get(&key_id) {
                None => bail!("slot holds unknown key {}", key_id),
                Some(s) if !s.is_active() => bail!("slot holds inactive key {}", key_id),
                _ => {}
            }
            if self.queue.is_in_queue(key_id) {
                bail!("slot holder {} is also queued", key_id);
            }
        }

        let mut seen = BTreeSet::new();
        for key_id in self.queue.queue_items() {
            if !seen.insert(key_id) {
                bail!("key {} queued twice", key_id);
            }
            match self.states.get(&key_id) {
                None => bail!("queue holds unknown key {}", key_id),
                Some(s) if !s.is_active() => bail!("queue holds inactive key {}", key_id),
                _ => {}
            }
        }

        for state in self.states.values() {
            if state.action_wait_deadline().is_some() && state.cycle_wait_deadline().is_some() {
                bail!("key {} has both timers armed", state.key_id);
            }
        }
        Ok(())
    }
}
