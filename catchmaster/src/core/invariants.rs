//! Session invariants checked after every transition.

use crate::core::classifier::classify;
use crate::core::state::SessionState;

/// Check semantic invariants of a session snapshot:
/// - At most one door result per stage
/// - Consecutive win/loss streaks are mutually exclusive
/// - `doubt_level` within `[0, 100]`
/// - `stage >= 1` and `stage_type` matches `stage`
/// - Lives within `[0, max_lives]` when the variant is enabled
pub fn validate_session(state: &SessionState, max_lives: u32) -> Vec<String> {
    let mut errors = Vec::new();

    let opened = state.door_results.iter().filter(|r| r.is_some()).count();
    if opened > 1 {
        errors.push(format!("{opened} doors opened in stage {}", state.stage));
    }

    if state.consecutive_wins > 0 && state.consecutive_losses > 0 {
        errors.push(format!(
            "streaks overlap: consecutive_wins={} consecutive_losses={}",
            state.consecutive_wins, state.consecutive_losses
        ));
    }

    if state.doubt_level > 100 {
        errors.push(format!("doubt_level {} exceeds 100", state.doubt_level));
    }

    if state.stage == 0 {
        errors.push("stage must be >= 1".to_string());
    }

    if state.stage_type != classify(state.stage) {
        errors.push(format!(
            "stage_type {} does not match stage {}",
            state.stage_type.as_str(),
            state.stage
        ));
    }

    if let Some(lives) = state.lives {
        if lives > max_lives {
            errors.push(format!("lives {lives} exceeds max {max_lives}"));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Outcome;

    #[test]
    fn fresh_state_is_valid() {
        let state = SessionState::new(50, Some(3));
        assert!(validate_session(&state, 3).is_empty());
    }

    #[test]
    fn reports_every_violation() {
        let mut state = SessionState::new(120, Some(5));
        state.door_results = [Some(Outcome::Win), Some(Outcome::Lose), None];
        state.consecutive_wins = 1;
        state.consecutive_losses = 1;
        state.stage = 9;

        let errors = validate_session(&state, 3);
        assert!(errors.iter().any(|err| err.contains("doors opened")));
        assert!(errors.iter().any(|err| err.contains("streaks overlap")));
        assert!(errors.iter().any(|err| err.contains("doubt_level")));
        assert!(errors.iter().any(|err| err.contains("does not match")));
        assert!(errors.iter().any(|err| err.contains("lives")));
    }
}
