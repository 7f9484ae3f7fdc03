//! Randomized input sequences; engine invariants must hold after every step

mod common;
use common::*;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use macropad_core::keycode::Keycode;
use macropad_core::types::*;

fn random_actions(rng: &mut StdRng, depth: u32) -> Vec<Action> {
    let len = rng.gen_range(1..=4);
    let mut actions = Vec::with_capacity(len);
    for _ in 0..len {
        let action = match rng.gen_range(0..10) {
            0..=3 => press(Keycode::A),
            4..=6 => wait(rng.gen_range(0..=60)),
            7 => Action::new(ActionKind::WaitRandom { min: 0, max: 30 }),
            8 => press(Keycode::B).with_wait(rng.gen_range(0..=20)),
            _ if depth < 2 => {
                let count = rng.gen_range(0..=3);
                repeat(count, random_actions(rng, depth + 1))
            }
            _ => press(Keycode::C),
        };
        actions.push(action);
    }
    actions
}

fn random_profile(rng: &mut StdRng) -> Profile {
    let mut macros = Vec::new();
    for key in 0..KEY_COUNT as KeyId {
        if !rng.gen_bool(0.8) {
            continue;
        }
        let kind = match rng.gen_range(0..3) {
            0 => MacroKind::Press,
            1 => MacroKind::Hold,
            _ => MacroKind::Toggle,
        };
        let cycle = if rng.gen_bool(0.3) { 0 } else { rng.gen_range(1..=200) };
        macros.push((key, macro_config(kind, cycle, random_actions(rng, 0))));
    }
    profile(macros)
}

#[test]
fn test_random_sequences_keep_invariants() {
    for seed in 0..40u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut h = Harness::new(&random_profile(&mut rng));

        for _ in 0..600 {
            match rng.gen_range(0..100) {
                0..=24 => h.press(rng.gen_range(0..KEY_COUNT as KeyId)),
                25..=39 => h.release(rng.gen_range(0..KEY_COUNT as KeyId)),
                40..=89 => h.step(rng.gen_range(0..=50)),
                90..=95 => h.step(rng.gen_range(100..=1000)),
                96..=97 => {
                    h.engine.emergency_stop_all();
                    h.engine.check_invariants().unwrap();
                }
                _ => {
                    let next = random_profile(&mut rng);
                    h.engine.load_profile(&next);
                    h.engine.check_invariants().unwrap();
                }
            }

            // Slot holder is never queued and never OFF
            if let Some(slot) = h.engine.slot() {
                assert_ne!(h.state(slot), StateName::Off, "seed {}", seed);
                assert!(!h.engine.queue_items().contains(&slot), "seed {}", seed);
            }
            for key in h.engine.queue_items() {
                assert_eq!(h.state(key), StateName::InQueue, "seed {}", seed);
            }
        }
    }
}

#[test]
fn test_stop_twice_equals_once() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut h = Harness::new(&random_profile(&mut rng));
    let keys: Vec<KeyId> = h.engine.key_ids().collect();
    for &key in &keys {
        h.press(key);
        h.step(5);
    }

    h.engine.emergency_stop_all();
    let once: Vec<_> = h.engine.snapshot().into_iter().map(|k| (k.key_id, k.state, k.remaining, k.progress)).collect();
    h.engine.emergency_stop_all();
    let twice: Vec<_> = h.engine.snapshot().into_iter().map(|k| (k.key_id, k.state, k.remaining, k.progress)).collect();
    assert_eq!(once, twice);
}
