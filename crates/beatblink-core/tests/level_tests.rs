use beatblink_core::level::advance;
use beatblink_core::{LevelRules, LevelState, LevelStateMachine, MAX_LEVEL};
use proptest::prelude::*;

fn rules() -> LevelRules {
    LevelRules {
        sensitivity: 0.7,
        winner_threshold: 0.95,
        winner_duration_ms: 5000,
    }
}

/// Intensity at which the scaled curve reaches the lower edge of `level`.
fn level_edge(level: u8, rules: &LevelRules) -> f32 {
    let scaled = f32::from(level - 1) / 5.0;
    scaled.powf(1.0 / rules.sensitivity)
}

#[test]
fn test_rising_sequence_enters_winner() {
    let mut machine = LevelStateMachine::new(rules());

    machine.apply(0.0, 1_000);
    assert_eq!(machine.state().current, 1);

    machine.apply(0.5, 1_016);
    assert!(!machine.state().is_winner);

    let state = machine.apply(0.96, 1_033).clone();
    assert_eq!(state.current, 5);
    assert!(state.is_winner);
    assert_eq!(state.winner_start_time, Some(1_033));
}

#[test]
fn test_level_five_below_threshold_never_wins() {
    let mut machine = LevelStateMachine::new(rules());
    for tick in 0..100 {
        // 0.9 ^ 0.7 = 0.929 -> level 5, but 0.9 < threshold
        machine.apply(0.9, tick * 16);
        assert_eq!(machine.state().current, 5);
        assert!(!machine.state().is_winner);
    }
}

#[test]
fn test_winner_exit_waits_for_duration() {
    let mut machine = LevelStateMachine::new(rules());
    machine.apply(0.99, 10_000);
    assert!(machine.state().is_winner);

    // Level dropped, duration not yet elapsed
    machine.apply(0.2, 12_000);
    assert!(machine.state().is_winner);
    assert_eq!(machine.state().winner_start_time, Some(10_000));

    // Exactly at the duration: strict comparison keeps the winner
    machine.apply(0.2, 15_000);
    assert!(machine.state().is_winner);

    machine.apply(0.2, 15_001);
    assert!(!machine.state().is_winner);
    assert_eq!(machine.state().winner_start_time, None);
}

#[test]
fn test_huge_winner_duration_holds_the_winner() {
    let mut machine = LevelStateMachine::new(LevelRules {
        winner_duration_ms: u64::MAX,
        ..rules()
    });
    machine.apply(0.99, 10_000);
    assert!(machine.state().is_winner);

    machine.apply(0.1, 10_001);
    assert!(machine.state().is_winner);
    machine.apply(0.1, i64::MAX);
    assert!(machine.state().is_winner);
    assert_eq!(machine.state().winner_start_time, Some(10_000));
}

#[test]
fn test_winner_can_be_entered_again_after_exit() {
    let mut machine = LevelStateMachine::new(rules());
    machine.apply(0.99, 0);
    machine.apply(0.1, 6_000);
    assert!(!machine.state().is_winner);

    machine.apply(0.99, 7_000);
    assert!(machine.state().is_winner);
    assert_eq!(machine.state().winner_start_time, Some(7_000));
}

#[test]
fn test_level_edges() {
    let rules = rules();
    for level in 2..=MAX_LEVEL {
        let edge = level_edge(level, &rules);
        let below = advance(&LevelState::initial(), edge - 0.001, 0, &rules);
        let above = advance(&LevelState::initial(), edge + 0.001, 0, &rules);
        assert_eq!(below.current, level - 1, "below edge of level {}", level);
        assert_eq!(above.current, level, "above edge of level {}", level);
    }
}

proptest! {
    #[test]
    fn prop_level_and_progress_in_range(intensity in 0.0f32..=1.0) {
        let next = advance(&LevelState::initial(), intensity, 0, &rules());
        prop_assert!((1..=MAX_LEVEL).contains(&next.current));
        prop_assert!(next.progress >= 0.0 && next.progress < 1.0);
    }

    #[test]
    fn prop_neighbouring_intensities_differ_by_one_level(
        intensity in 0.0f32..=0.999,
        step in 0.0f32..0.001,
    ) {
        let rules = rules();
        let a = advance(&LevelState::initial(), intensity, 0, &rules);
        let b = advance(&LevelState::initial(), intensity + step, 0, &rules);
        prop_assert!(b.current >= a.current);
        prop_assert!(b.current - a.current <= 1);
    }

    #[test]
    fn prop_winner_implies_start_time(samples in prop::collection::vec(0.0f32..=1.0, 1..200)) {
        let mut machine = LevelStateMachine::new(rules());
        let mut saw_entry_condition = false;
        for (tick, intensity) in samples.into_iter().enumerate() {
            let state = machine.apply(intensity, tick as i64 * 100).clone();
            if state.current == MAX_LEVEL && intensity > 0.95 {
                saw_entry_condition = true;
            }
            prop_assert_eq!(state.is_winner, state.winner_start_time.is_some());
            if state.is_winner {
                prop_assert!(saw_entry_condition);
            }
        }
    }
}
