//! Hint prompt composition.
//!
//! The composed text is the only input the text generator sees. Everything
//! here is deterministic: the same stage, history and streaks always produce
//! the same prompt.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use tracing::debug;

use crate::core::classifier::{TacticTier, intensity, tactic_tier};
use crate::core::history::GameHistory;
use crate::core::types::StreakStats;

const HINT_TEMPLATE: &str = include_str!("prompts/hint.md");

/// One line per stage, indexed from stage 1. Later stages reuse the last line.
const PSYCH_TRICKS: [&str; 15] = [
    "Appeal to their fear of loss.",
    "Make your hint sound like expert advice.",
    "Refer to recent success deceptively.",
    "Flatter them to trigger overconfidence.",
    "Use misleading framing to confuse logic.",
    "Give them the illusion of control.",
    "Trigger scarcity. Make it feel like a rare chance.",
    "Confirm what they already believe, wrongly.",
    "Introduce a decoy idea to shift attention.",
    "Trigger fear-based decision making.",
    "Cause mental fatigue by overloading decisions.",
    "Gaslight them. Contradict previous hints subtly.",
    "Make uncertainty feel dangerous.",
    "Break their hope. Make them doubt effort matters.",
    "Tell them they never had control. Break their sense of reality.",
];

/// Voice the opponent adopts for a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persona {
    Friendly,
    Playful,
    Villain,
    Panic,
}

impl Persona {
    pub fn for_stage(stage: u32) -> Self {
        match tactic_tier(stage) {
            TacticTier::Subtle => Persona::Friendly,
            TacticTier::Confusing => Persona::Playful,
            TacticTier::Gaslighting | TacticTier::Distortion => Persona::Villain,
            TacticTier::Attrition => Persona::Panic,
        }
    }

    fn role(self) -> &'static str {
        match self {
            Persona::Friendly => "a supportive coach",
            Persona::Playful => "a playful trickster",
            Persona::Villain => "a ruthless villain",
            Persona::Panic => "the mischievous AI",
        }
    }

    fn task(self) -> &'static str {
        match self {
            Persona::Friendly => "Provide an encouraging hint under 20 words.",
            Persona::Playful => "Provide a subtle misleading hint under 20 words.",
            Persona::Villain => "Provide an aggressive deceptive hint under 20 words.",
            Persona::Panic => "Create a sense of urgency in under 20 words.",
        }
    }
}

pub fn tactics(tier: TacticTier) -> [&'static str; 3] {
    match tier {
        TacticTier::Subtle => [
            "Subtle Encouragement",
            "Gentle Misdirection",
            "Hidden Patterns",
        ],
        TacticTier::Confusing => ["False Familiarity", "Mixed Signals", "Confusing Certainty"],
        TacticTier::Gaslighting => ["Gaslighting", "False Concern", "Strategic Misdirection"],
        TacticTier::Attrition => [
            "Sunk Cost Fallacy",
            "Self-doubt Induction",
            "Pattern Breaking",
        ],
        TacticTier::Distortion => [
            "Total Reality Distortion",
            "Integrity Breakdown",
            "Existential Doubt",
        ],
    }
}

pub fn psych_trick(stage: u32) -> &'static str {
    let idx = (stage.max(1) as usize - 1).min(PSYCH_TRICKS.len() - 1);
    PSYCH_TRICKS[idx]
}

fn vulnerability(streaks: StreakStats) -> &'static str {
    if streaks.loss_streak > streaks.win_streak {
        "self-doubt. Suggest they might not be capable."
    } else {
        "overconfidence. Set them up for failure."
    }
}

/// `"Door N: k times"` for every door the player has opened at least once.
pub fn door_history_lines(history: &GameHistory) -> Vec<String> {
    history
        .door_selections
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .map(|(idx, count)| format!("Door {}: {} times", idx + 1, count))
        .collect()
}

/// Compose the generator instruction for a stage.
pub fn build_prompt(
    stage: u32,
    door_history: &[String],
    streaks: StreakStats,
    intensity_step: f64,
) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("hint", HINT_TEMPLATE)
        .context("load hint template")?;
    let template = env.get_template("hint")?;

    let persona = Persona::for_stage(stage);
    let history = if door_history.is_empty() {
        "none".to_string()
    } else {
        door_history.join(", ")
    };
    let rendered = template
        .render(context! {
            stage => stage,
            intensity => intensity(stage, intensity_step).round() as u32,
            tactics => tactics(tactic_tier(stage)),
            persona_role => persona.role(),
            persona_task => persona.task(),
            history => history,
            win_streak => streaks.win_streak,
            loss_streak => streaks.loss_streak,
            trick => psych_trick(stage),
            vulnerability => vulnerability(streaks),
        })
        .context("render hint template")?;
    debug!(stage, bytes = rendered.len(), "hint prompt composed");
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streaks(win_streak: u32, loss_streak: u32) -> StreakStats {
        StreakStats {
            win_streak,
            loss_streak,
        }
    }

    #[test]
    fn first_stage_prompt() {
        let prompt = build_prompt(1, &[], streaks(0, 0), 5.3).expect("prompt");
        assert!(prompt.starts_with(
            "You are a mentor in a psychological game. Current stage: 1.\nYour manipulation intensity: 25%.\n"
        ));
        assert!(prompt.contains(
            "Use these tactics: Subtle Encouragement | Gentle Misdirection | Hidden Patterns"
        ));
        assert!(!prompt.contains("Total Reality Distortion"));
        assert!(prompt.contains("a supportive coach. Stage 1. Player history: none."));
        assert!(prompt.contains("Psychological tactic: Appeal to their fear of loss."));
        assert!(prompt.contains("Target their vulnerability: overconfidence."));
        assert!(prompt.ends_with(
            "Rules:\n- Never reveal the correct door.\n- Keep under 20 words.\nSystem: Provide the hint now."
        ));
    }

    #[test]
    fn streak_clauses_only_past_two() {
        let calm = build_prompt(5, &[], streaks(1, 0), 5.3).expect("prompt");
        assert!(!calm.contains("Player feels confident"));
        let hot = build_prompt(5, &[], streaks(2, 0), 5.3).expect("prompt");
        assert!(hot.contains("Player feels confident; bait them into overconfidence"));
        let cold = build_prompt(5, &[], streaks(0, 3), 5.3).expect("prompt");
        assert!(cold.contains("Player is frustrated"));
        assert!(cold.contains("Target their vulnerability: self-doubt."));
    }

    #[test]
    fn late_stages_escalate() {
        let prompt = build_prompt(14, &["Door 2: 3 times".to_string()], streaks(0, 0), 5.3)
            .expect("prompt");
        assert!(prompt.contains("Your manipulation intensity: 94%."));
        assert!(prompt.contains("Total Reality Distortion"));
        assert!(prompt.contains("a ruthless villain"));
        assert!(prompt.contains("Player history: Door 2: 3 times."));
        let prompt = build_prompt(11, &[], streaks(0, 0), 5.3).expect("prompt");
        assert!(prompt.contains("the mischievous AI"));
    }

    #[test]
    fn psych_trick_saturates() {
        assert_eq!(psych_trick(0), PSYCH_TRICKS[0]);
        assert_eq!(psych_trick(15), PSYCH_TRICKS[14]);
        assert_eq!(psych_trick(40), PSYCH_TRICKS[14]);
    }

    #[test]
    fn history_lines_skip_unopened_doors() {
        let history = GameHistory {
            door_selections: [2, 0, 5],
            ..GameHistory::default()
        };
        assert_eq!(
            door_history_lines(&history),
            vec!["Door 1: 2 times".to_string(), "Door 3: 5 times".to_string()]
        );
    }
}
