use crate::model::{AnswerOutcome, Item, ItemKind};

//
// ─── CONSTANTS ─────────────────────────────────────────────────────────────────
//

/// Fixed wall-clock budget for one session: two hours.
pub const SESSION_DURATION_MS: i64 = 7_200_000;

pub const MS_PER_MINUTE: i64 = 60_000;

/// Base points for a correct multiple-choice answer.
const CHOICE_BASE_POINTS: u32 = 10;
/// Answer a choice item faster than this to earn the speed bonus.
const CHOICE_SPEED_WINDOW_MS: i64 = 10_000;

/// Base points for a correctly repeated sentence.
const SPEECH_BASE_POINTS: u32 = 15;
/// Answer a spoken item faster than this to earn the speed bonus.
const SPEECH_SPEED_WINDOW_MS: i64 = 15_000;

const SPEED_BONUS_POINTS: u32 = 5;

//
// ─── PER-ITEM SCORING ──────────────────────────────────────────────────────────
//

/// Grade a multiple-choice answer.
///
/// Correctness is index equality against the item; points are base plus a
/// speed bonus when answered inside the window. Incorrect answers always
/// score zero, never negative.
#[must_use]
pub fn score_choice(item: &Item, option_index: usize, elapsed_since_shown_ms: i64) -> AnswerOutcome {
    debug_assert_eq!(item.kind(), ItemKind::MultipleChoice);
    let is_correct = option_index == item.correct_index();
    AnswerOutcome {
        is_correct,
        points_awarded: item_points(
            is_correct,
            CHOICE_BASE_POINTS,
            CHOICE_SPEED_WINDOW_MS,
            elapsed_since_shown_ms,
        ),
    }
}

/// Grade a spoken-repetition answer whose transcript match was already
/// decided (see [`crate::speech::transcript_matches`]).
#[must_use]
pub fn score_speech(is_match: bool, elapsed_since_shown_ms: i64) -> AnswerOutcome {
    AnswerOutcome {
        is_correct: is_match,
        points_awarded: item_points(
            is_match,
            SPEECH_BASE_POINTS,
            SPEECH_SPEED_WINDOW_MS,
            elapsed_since_shown_ms,
        ),
    }
}

fn item_points(is_correct: bool, base: u32, window_ms: i64, elapsed_ms: i64) -> u32 {
    if !is_correct {
        return 0;
    }
    if elapsed_ms < window_ms {
        base + SPEED_BONUS_POINTS
    } else {
        base
    }
}

//
// ─── SESSION TIME BONUS ────────────────────────────────────────────────────────
//

/// Completion-time bonus, computed exactly once when a session finishes.
///
/// Finish inside 30 minutes for +50, 45 for +25, 60 for +10; anything
/// slower earns nothing extra.
#[must_use]
pub fn session_time_bonus(total_elapsed_ms: i64) -> u32 {
    if total_elapsed_ms <= 30 * MS_PER_MINUTE {
        50
    } else if total_elapsed_ms <= 45 * MS_PER_MINUTE {
        25
    } else if total_elapsed_ms <= 60 * MS_PER_MINUTE {
        10
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemId;

    fn choice_item() -> Item {
        Item::multiple_choice(
            ItemId::new(1),
            "Which animal says meow?",
            vec!["dog".into(), "cat".into()],
            1,
            "Cats meow.",
            "animals",
        )
        .unwrap()
    }

    #[test]
    fn fast_correct_choice_earns_speed_bonus() {
        let outcome = score_choice(&choice_item(), 1, 4_000);
        assert!(outcome.is_correct);
        assert_eq!(outcome.points_awarded, 15);
    }

    #[test]
    fn slow_correct_choice_earns_base_only() {
        let outcome = score_choice(&choice_item(), 1, 12_000);
        assert!(outcome.is_correct);
        assert_eq!(outcome.points_awarded, 10);
    }

    #[test]
    fn incorrect_choice_scores_zero_at_any_speed() {
        for elapsed in [0, 4_000, 12_000, 1_000_000] {
            let outcome = score_choice(&choice_item(), 0, elapsed);
            assert!(!outcome.is_correct);
            assert_eq!(outcome.points_awarded, 0);
        }
    }

    #[test]
    fn speech_windows_differ_from_choice() {
        assert_eq!(score_speech(true, 14_999).points_awarded, 20);
        assert_eq!(score_speech(true, 15_000).points_awarded, 15);
        assert_eq!(score_speech(false, 1_000).points_awarded, 0);
    }

    #[test]
    fn session_bonus_brackets() {
        assert_eq!(session_time_bonus(25 * MS_PER_MINUTE), 50);
        assert_eq!(session_time_bonus(40 * MS_PER_MINUTE), 25);
        assert_eq!(session_time_bonus(50 * MS_PER_MINUTE), 10);
        assert_eq!(session_time_bonus(70 * MS_PER_MINUTE), 0);
    }

    #[test]
    fn session_bonus_boundaries_are_inclusive() {
        assert_eq!(session_time_bonus(30 * MS_PER_MINUTE), 50);
        assert_eq!(session_time_bonus(45 * MS_PER_MINUTE), 25);
        assert_eq!(session_time_bonus(60 * MS_PER_MINUTE), 10);
        assert_eq!(session_time_bonus(60 * MS_PER_MINUTE + 1), 0);
    }
}
