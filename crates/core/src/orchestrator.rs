use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Result;

use crate::engine::{EMERGENCY_BLINK, ERROR_BLINK, MacroEngine};
use crate::logger;
use crate::profile::ProfileManager;
use crate::types::*;

/// Knobs for the outer loop.
#[derive(Debug, Clone, Copy)]
pub struct LoopOptions {
    pub tick: Duration,
    pub check_invariants: bool,
}

/// Drain pending commands. Returns false on Quit or a closed channel.
fn process_commands(
    cmd_rx: &mpsc::Receiver<Command>,
    engine: &mut MacroEngine,
    profiles: &mut ProfileManager,
) -> bool {
    loop {
        let cmd = match cmd_rx.try_recv() {
            Ok(cmd) => cmd,
            Err(TryRecvError::Empty) => return true,
            Err(TryRecvError::Disconnected) => {
                engine.emergency_stop_all();
                return false;
            }
        };
        match cmd {
            Command::Quit => {
                logger::info("shutting down");
                engine.emergency_stop_all();
                return false;
            }
            Command::KeyDown(key) => engine.handle_key_press(key),
            Command::KeyUp(key) => engine.handle_key_release(key),
            Command::EmergencyStop => {
                engine.emergency_stop_all();
                engine.start_error_blink(EMERGENCY_BLINK, "EMERGENCY STOP");
            }
            Command::SwitchProfile(direction) => {
                let profile = profiles.switch(direction);
                if profile.macros.is_empty() {
                    logger::warn(&format!("profile '{}' has no valid macros", profile.name));
                }
                engine.load_profile(profile);
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "tick panicked".to_string())
}

/// Run one engine tick. A panic or failed invariant check stops all macros
/// and starts the error blink; the loop carries on either way.
pub fn guarded_tick(engine: &mut MacroEngine, check_invariants: bool) -> Result<(), String> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<()> {
        engine.tick();
        if check_invariants {
            engine.check_invariants()?;
        }
        Ok(())
    }));

    let message = match outcome {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(e)) => format!("{:#}", e),
        Err(payload) => panic_message(payload.as_ref()),
    };

    fail(engine, "tick", &message);
    Err(message)
}

/// Drain pending commands under the same guard as a tick. A panic while
/// handling input stops all macros and the loop keeps running.
pub fn guarded_commands(
    cmd_rx: &mpsc::Receiver<Command>,
    engine: &mut MacroEngine,
    profiles: &mut ProfileManager,
) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| process_commands(cmd_rx, engine, profiles))) {
        Ok(keep_running) => keep_running,
        Err(payload) => {
            fail(engine, "command", &panic_message(payload.as_ref()));
            true
        }
    }
}

fn fail(engine: &mut MacroEngine, stage: &str, message: &str) {
    logger::error(&format!("{} failed: {}", stage, message));
    engine.emergency_stop_all();
    engine.start_error_blink(ERROR_BLINK, &format!("ERROR: {}", message));
}

/// Build the read-only view the TUI renders.
pub fn build_view(engine: &MacroEngine, profiles: &ProfileManager) -> PadView {
    PadView {
        profile_name: profiles.current().name.clone(),
        profiles: profiles.names(),
        keys: engine.snapshot(),
        slot: engine.slot(),
        queue: engine.queue_items(),
        error: engine.error_message().map(str::to_string),
    }
}

/// Main loop. Runs on a background thread until Quit or the sender drops.
pub fn orchestrate(
    mut engine: MacroEngine,
    mut profiles: ProfileManager,
    view: Arc<Mutex<PadView>>,
    cmd_rx: mpsc::Receiver<Command>,
    options: LoopOptions,
) {
    engine.load_profile(profiles.current());

    loop {
        if !guarded_commands(&cmd_rx, &mut engine, &mut profiles) {
            break;
        }

        // Errors are already logged and shown by the blink
        let _ = guarded_tick(&mut engine, options.check_invariants);

        let snapshot = build_view(&engine, &profiles);
        *view.lock().unwrap_or_else(PoisonError::into_inner) = snapshot;

        std::thread::sleep(options.tick);
    }

    let snapshot = build_view(&engine, &profiles);
    *view.lock().unwrap_or_else(PoisonError::into_inner) = snapshot;
    logger::info("orchestrator stopped");
}
