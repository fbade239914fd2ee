//! Property tests for the pure rules and for session bookkeeping under
//! arbitrary command sequences.

use std::time::{Duration, Instant};

use catchmaster::core::classifier::{classify, intensity};
use catchmaster::core::invariants::validate_session;
use catchmaster::core::outcome::{DecidedBy, DecisionInputs, decide};
use catchmaster::core::selector::{Personality, select_personality};
use catchmaster::io::config::GameConfig;
use catchmaster::io::history_store::MemoryHistoryStore;
use catchmaster::session::{SelectionOutcome, Session};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

#[derive(Debug, Clone, Copy)]
enum Op {
    Door(usize),
    Peek(usize),
    Beg,
    Trust(u8),
    Continue,
    Wait(u64),
    Reset,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0usize..4).prop_map(Op::Door),
        1 => (0usize..3).prop_map(Op::Peek),
        1 => Just(Op::Beg),
        1 => any::<u8>().prop_map(Op::Trust),
        3 => Just(Op::Continue),
        2 => (0u64..5_000).prop_map(Op::Wait),
        1 => Just(Op::Reset),
    ]
}

fn personality() -> impl Strategy<Value = Personality> {
    prop_oneof![
        Just(Personality::Trickster),
        Just(Personality::Manipulator),
        Just(Personality::Psycho),
    ]
}

proptest! {
    #[test]
    fn classify_never_goes_backwards(a in 0u32..200, b in 0u32..200) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(classify(lo) <= classify(hi));
    }

    #[test]
    fn intensity_is_monotonic_and_saturates(stage in 0u32..500, step in 0.0f64..20.0) {
        let here = intensity(stage, step);
        prop_assert!((20.0..=100.0).contains(&here));
        prop_assert!(intensity(stage + 1, step) >= here);
    }

    #[test]
    fn no_losses_means_trickster(wins in 0u32..1_000) {
        prop_assert_eq!(select_personality(wins, 0), Personality::Trickster);
    }

    #[test]
    fn decide_is_reproducible_for_a_seed(
        seed in any::<u64>(),
        door in 0usize..3,
        stage in 1u32..20,
        doubt_level in 0u8..=100,
        personality in personality(),
        consecutive_wins in 0u32..4,
        mercy_pending in any::<bool>(),
    ) {
        let inputs = DecisionInputs {
            stage,
            doubt_level,
            personality,
            consecutive_wins,
            consecutive_losses: 0,
            mercy_pending,
        };
        let snapshot = inputs;
        let first = decide(door, &inputs, &mut StdRng::seed_from_u64(seed));
        let second = decide(door, &inputs, &mut StdRng::seed_from_u64(seed));
        prop_assert_eq!(first, second);
        prop_assert_eq!(inputs, snapshot);
        prop_assert_eq!(first.door, door);
        if first.rule == DecidedBy::Mercy {
            prop_assert!(mercy_pending && first.outcome.is_win());
        }
        if first.fooled {
            prop_assert!(!first.outcome.is_win());
        }
    }

    #[test]
    fn session_bookkeeping_holds_for_any_commands(
        seed in any::<u64>(),
        ops in prop::collection::vec(op(), 1..80),
    ) {
        let mut session = Session::new(
            GameConfig::default(),
            MemoryHistoryStore::new(),
            StdRng::seed_from_u64(seed),
        );
        let mut now = Instant::now();
        let mut selections = 0u32;
        let mut resets = 0u32;
        let mut last_fooled = 0u32;

        for op in ops {
            match op {
                Op::Door(door) => {
                    if let SelectionOutcome::Resolved(_) = session.select_door(door, now) {
                        selections += 1;
                    }
                }
                Op::Peek(door) => {
                    session.use_peek(door, now);
                }
                Op::Beg => {
                    session.use_beg();
                }
                Op::Trust(level) => session.set_doubt_level(level),
                Op::Continue => {
                    session.continue_game();
                }
                Op::Wait(ms) => {
                    now += Duration::from_millis(ms);
                    session.tick(now);
                }
                Op::Reset => {
                    session.reset_game();
                    resets += 1;
                }
            }

            let violations = validate_session(session.state(), 3);
            prop_assert!(violations.is_empty(), "violations: {:?}", violations);
            prop_assert!(session.state().stage <= session.config().final_stage);
            prop_assert_eq!(session.history().total_selections(), selections);
            prop_assert_eq!(session.history().games_played, resets);
            prop_assert!(session.history().times_fooled >= last_fooled);
            last_fooled = session.history().times_fooled;
        }

        if session.store().save_count() > 0 {
            let saved = session.store().snapshot();
            prop_assert_eq!(saved.as_ref(), Some(session.history()));
        }
    }
}
