use chrono::{DateTime, Utc};
use thiserror::Error;

/// Points decision for one answered item. Consumed immediately by the
/// session; never persisted on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub is_correct: bool,
    pub points_awarded: u32,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("participant name must not be empty")]
    EmptyName,

    #[error("correct count ({correct}) exceeds answered count ({answered})")]
    CorrectExceedsAnswered { correct: u32, answered: u32 },

    #[error("answered count ({answered}) exceeds current item index ({index})")]
    AnsweredExceedsIndex { answered: u32, index: u32 },

    #[error("last activity ({last_activity}) is before session start ({started})")]
    ActivityBeforeStart {
        started: DateTime<Utc>,
        last_activity: DateTime<Utc>,
    },
}

/// Mutable progress record for one participant through an item bank.
///
/// Created once per session, mutated only through the session state machine,
/// and persisted after every mutation. It is never deleted; a finished
/// session's state simply becomes inert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    participant_name: String,
    current_item_index: u32,
    score: u32,
    items_answered: u32,
    correct_count: u32,
    session_started_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
}

impl SessionState {
    /// Create a fresh state for a participant at the start of a session.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::EmptyName` when the trimmed name is empty.
    pub fn begin(participant_name: &str, now: DateTime<Utc>) -> Result<Self, SessionStateError> {
        let trimmed = participant_name.trim();
        if trimmed.is_empty() {
            return Err(SessionStateError::EmptyName);
        }
        Ok(Self {
            participant_name: trimmed.to_owned(),
            current_item_index: 0,
            score: 0,
            items_answered: 0,
            correct_count: 0,
            session_started_at: now,
            last_activity_at: now,
        })
    }

    /// Rehydrate a state from persisted storage, re-checking the counter
    /// invariants so a corrupt row cannot enter the state machine.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError` when any invariant is violated.
    pub fn from_persisted(
        participant_name: String,
        current_item_index: u32,
        score: u32,
        items_answered: u32,
        correct_count: u32,
        session_started_at: DateTime<Utc>,
        last_activity_at: DateTime<Utc>,
    ) -> Result<Self, SessionStateError> {
        if participant_name.trim().is_empty() {
            return Err(SessionStateError::EmptyName);
        }
        if correct_count > items_answered {
            return Err(SessionStateError::CorrectExceedsAnswered {
                correct: correct_count,
                answered: items_answered,
            });
        }
        if items_answered > current_item_index.saturating_add(1) {
            return Err(SessionStateError::AnsweredExceedsIndex {
                answered: items_answered,
                index: current_item_index,
            });
        }
        if last_activity_at < session_started_at {
            return Err(SessionStateError::ActivityBeforeStart {
                started: session_started_at,
                last_activity: last_activity_at,
            });
        }
        Ok(Self {
            participant_name,
            current_item_index,
            score,
            items_answered,
            correct_count,
            session_started_at,
            last_activity_at,
        })
    }

    /// Fold one graded answer into the counters. Score only ever grows.
    pub fn record_answer(&mut self, outcome: AnswerOutcome, now: DateTime<Utc>) {
        self.items_answered = self.items_answered.saturating_add(1);
        if outcome.is_correct {
            self.correct_count = self.correct_count.saturating_add(1);
        }
        self.score = self.score.saturating_add(outcome.points_awarded);
        self.last_activity_at = now;
    }

    /// Move to the next item.
    pub fn advance(&mut self, now: DateTime<Utc>) {
        self.current_item_index = self.current_item_index.saturating_add(1);
        self.last_activity_at = now;
    }

    /// Add the completion-time bonus to the running score.
    pub fn add_bonus(&mut self, bonus: u32, now: DateTime<Utc>) {
        self.score = self.score.saturating_add(bonus);
        self.last_activity_at = now;
    }

    /// Update the activity timestamp without touching any counter.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = now;
    }

    #[must_use]
    pub fn participant_name(&self) -> &str {
        &self.participant_name
    }

    #[must_use]
    pub fn current_item_index(&self) -> u32 {
        self.current_item_index
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn items_answered(&self) -> u32 {
        self.items_answered
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn session_started_at(&self) -> DateTime<Utc> {
        self.session_started_at
    }

    #[must_use]
    pub fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_activity_at
    }

    /// Wall-clock time spent in the session so far.
    #[must_use]
    pub fn total_elapsed_ms(&self) -> i64 {
        crate::time::elapsed_ms(self.session_started_at, self.last_activity_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    #[test]
    fn begin_trims_and_validates_name() {
        let now = fixed_now();
        assert_eq!(
            SessionState::begin("  ", now),
            Err(SessionStateError::EmptyName)
        );
        let state = SessionState::begin("  Lena ", now).unwrap();
        assert_eq!(state.participant_name(), "Lena");
        assert_eq!(state.current_item_index(), 0);
        assert_eq!(state.score(), 0);
    }

    #[test]
    fn from_persisted_rejects_counter_violations() {
        let now = fixed_now();
        let err = SessionState::from_persisted("Lena".into(), 2, 30, 1, 2, now, now).unwrap_err();
        assert!(matches!(err, SessionStateError::CorrectExceedsAnswered { .. }));

        let err = SessionState::from_persisted("Lena".into(), 1, 30, 4, 2, now, now).unwrap_err();
        assert!(matches!(err, SessionStateError::AnsweredExceedsIndex { .. }));

        let err = SessionState::from_persisted(
            "Lena".into(),
            1,
            30,
            1,
            1,
            now,
            now - Duration::seconds(1),
        )
        .unwrap_err();
        assert!(matches!(err, SessionStateError::ActivityBeforeStart { .. }));
    }

    #[test]
    fn from_persisted_accepts_a_graded_unadvanced_answer() {
        let now = fixed_now();
        // Persist-after-grading stores one more answer than the index; a
        // crash at that point must still be loadable.
        let state = SessionState::from_persisted("Lena".into(), 1, 25, 2, 2, now, now).unwrap();
        assert_eq!(state.items_answered(), state.current_item_index() + 1);

        // Two ahead of the index has no legitimate mutation path.
        let err = SessionState::from_persisted("Lena".into(), 1, 25, 3, 2, now, now).unwrap_err();
        assert!(matches!(err, SessionStateError::AnsweredExceedsIndex { .. }));
    }

    #[test]
    fn record_answer_keeps_score_monotone() {
        let now = fixed_now();
        let mut state = SessionState::begin("Lena", now).unwrap();
        state.record_answer(
            AnswerOutcome {
                is_correct: true,
                points_awarded: 15,
            },
            now,
        );
        state.record_answer(
            AnswerOutcome {
                is_correct: false,
                points_awarded: 0,
            },
            now,
        );
        assert_eq!(state.score(), 15);
        assert_eq!(state.items_answered(), 2);
        assert_eq!(state.correct_count(), 1);
    }

    #[test]
    fn total_elapsed_tracks_activity() {
        let now = fixed_now();
        let mut state = SessionState::begin("Lena", now).unwrap();
        state.touch(now + Duration::minutes(10));
        assert_eq!(state.total_elapsed_ms(), 600_000);
    }
}
