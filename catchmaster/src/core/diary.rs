//! The opponent's notebook: observations derived from durable history.

use crate::core::history::GameHistory;
use crate::core::types::DOOR_COUNT;

/// Resets required before the notebook is offered to the player.
pub const DIARY_UNLOCK_GAMES: u32 = 5;

/// Read-only report rendered by the CLI.
#[derive(Debug, Clone, PartialEq)]
pub struct DiaryReport {
    /// Whole-number share of selections per door.
    pub door_percentages: [u32; DOOR_COUNT],
    /// Most-opened door (lowest index on ties).
    pub favorite_door: usize,
    pub total_selections: u32,
    pub selections_per_game: f64,
    /// Behavioural lines, in display order.
    pub patterns: Vec<String>,
    /// The opponent's commentary, in display order.
    pub thoughts: Vec<String>,
}

pub fn is_unlocked(history: &GameHistory) -> bool {
    history.games_played >= DIARY_UNLOCK_GAMES
}

pub fn build_diary(history: &GameHistory) -> DiaryReport {
    let total = history.total_selections();
    let door_percentages = history.door_selections.map(|count| {
        if total == 0 {
            0
        } else {
            ((f64::from(count) / f64::from(total)) * 100.0).round() as u32
        }
    });

    let mut favorite_door = 0;
    for (idx, count) in history.door_selections.iter().enumerate() {
        if *count > history.door_selections[favorite_door] {
            favorite_door = idx;
        }
    }

    let selections_per_game = f64::from(total) / f64::from(history.games_played.max(1));

    let mut patterns = vec![format!(
        "You make {:.1} selections per game on average.",
        selections_per_game
    )];
    if history.switched_doors > 0 {
        patterns.push(format!(
            "You've switched your strategy {} times.",
            history.switched_doors
        ));
    }
    if history.games_played > 1 {
        patterns.push(format!(
            "You've reset the game {} times, thinking it would help...",
            history.games_played
        ));
    }
    if history.times_fooled > 0 {
        patterns.push(format!(
            "I've successfully fooled you {} times.",
            history.times_fooled
        ));
    }

    let mut thoughts = vec![favorite_door_remark(favorite_door).to_string()];
    if history.times_fooled > 3 {
        thoughts.push("Your trust is so easily manipulated. It's almost too easy.".to_string());
    }
    if total > 10 {
        thoughts.push(format!(
            "After {total} choices, I can predict your next move with 73% accuracy."
        ));
    }
    thoughts.push("Every choice you make teaches me how to control you better.".to_string());

    DiaryReport {
        door_percentages,
        favorite_door,
        total_selections: total,
        selections_per_game,
        patterns,
        thoughts,
    }
}

fn favorite_door_remark(door: usize) -> &'static str {
    match door {
        0 => "You lean left. The first choice, the obvious one.",
        1 => "You favor the middle path. So predictable, always seeking balance.",
        _ => "The right door calls to you. Always reaching for what seems just out of reach.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_has_no_percentages() {
        let report = build_diary(&GameHistory::default());
        assert_eq!(report.door_percentages, [0, 0, 0]);
        assert_eq!(report.favorite_door, 0);
        assert_eq!(report.patterns.len(), 1);
        assert_eq!(
            report.thoughts.last().map(String::as_str),
            Some("Every choice you make teaches me how to control you better.")
        );
    }

    #[test]
    fn favorite_door_and_observations() {
        let history = GameHistory {
            door_selections: [2, 9, 1],
            switched_doors: 4,
            times_fooled: 5,
            games_played: 6,
            ..GameHistory::default()
        };
        let report = build_diary(&history);
        assert_eq!(report.favorite_door, 1);
        assert_eq!(report.door_percentages, [17, 75, 8]);
        assert_eq!(report.total_selections, 12);
        assert!(report.patterns.iter().any(|p| p.contains("switched your strategy 4")));
        assert!(report.patterns.iter().any(|p| p.contains("reset the game 6")));
        assert!(report.thoughts[0].contains("middle path"));
        assert!(report.thoughts.iter().any(|t| t.contains("73% accuracy")));
        assert!(is_unlocked(&history));
    }

    #[test]
    fn locked_before_five_games() {
        let history = GameHistory {
            games_played: 4,
            ..GameHistory::default()
        };
        assert!(!is_unlocked(&history));
    }
}
