use serde::{Deserialize, Serialize};

use crate::model::SessionState;
use crate::scoring;

/// External-facing summary of a session, handed to the reporting
/// collaborator. Serialized in the aggregator's camelCase wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub id: String,
    pub name: String,
    pub score: u32,
    pub base_score: u32,
    pub time_bonus: u32,
    pub total_time: i64,
    pub time_in_minutes: i64,
    pub questions_answered: u32,
    pub correct_answers: u32,
    pub progress_percent: u8,
}

impl ResultRecord {
    /// Derive a record from a session state.
    ///
    /// `time_bonus` must be whatever the session already folded into the
    /// running score (zero for an interim push); `base_score` is recovered by
    /// subtracting it back out so the aggregator can show both parts.
    #[must_use]
    pub fn from_state(
        session_id: &str,
        state: &SessionState,
        bank_len: usize,
        time_bonus: u32,
    ) -> Self {
        let total_time = state.total_elapsed_ms();
        let answered = state.items_answered();
        let progress = progress_percent(answered, bank_len);
        Self {
            id: session_id.to_owned(),
            name: state.participant_name().to_owned(),
            score: state.score(),
            base_score: state.score().saturating_sub(time_bonus),
            time_bonus,
            total_time,
            time_in_minutes: total_time / scoring::MS_PER_MINUTE,
            questions_answered: answered,
            correct_answers: state.correct_count(),
            progress_percent: progress,
        }
    }
}

fn progress_percent(answered: u32, bank_len: usize) -> u8 {
    if bank_len == 0 {
        return 0;
    }
    let pct = (u64::from(answered) * 100) / bank_len as u64;
    u8::try_from(pct.min(100)).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    #[test]
    fn record_splits_base_and_bonus() {
        let now = fixed_now();
        let mut state = SessionState::begin("Omar", now).unwrap();
        state.record_answer(
            crate::model::AnswerOutcome {
                is_correct: true,
                points_awarded: 15,
            },
            now + Duration::minutes(25),
        );
        state.add_bonus(50, now + Duration::minutes(25));

        let record = ResultRecord::from_state("s-1", &state, 4, 50);
        assert_eq!(record.score, 65);
        assert_eq!(record.base_score, 15);
        assert_eq!(record.time_bonus, 50);
        assert_eq!(record.time_in_minutes, 25);
        assert_eq!(record.progress_percent, 25);
    }

    #[test]
    fn progress_is_clamped_and_zero_safe() {
        assert_eq!(progress_percent(3, 0), 0);
        assert_eq!(progress_percent(5, 4), 100);
        assert_eq!(progress_percent(2, 4), 50);
    }

    #[test]
    fn wire_shape_is_camel_case() {
        let now = fixed_now();
        let state = SessionState::begin("Omar", now).unwrap();
        let record = ResultRecord::from_state("s-1", &state, 4, 0);
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("questionsAnswered").is_some());
        assert!(json.get("progressPercent").is_some());
        assert!(json.get("totalTime").is_some());
    }
}
