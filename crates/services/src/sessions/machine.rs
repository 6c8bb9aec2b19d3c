use chrono::{DateTime, Utc};

use drill_core::model::{
    AnswerOutcome, Item, ItemBank, ItemKind, ResultRecord, SessionId, SessionState,
    SessionStateError,
};
use drill_core::scoring::{self, SESSION_DURATION_MS};
use drill_core::speech::{expected_sentence, transcript_matches};
use drill_core::time::elapsed_ms;

use super::progress::SessionProgress;
use crate::error::SessionError;

/// Lifecycle of one practice session. `Finished` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    InProgress,
    Finished,
}

/// The session state machine: sequences items, grades answers, applies the
/// completion bonus, and enforces the once-per-item answer contract.
///
/// Pure and synchronous; persistence and reporting live in the workflow.
/// Every operation either applies fully or fails as a no-op with
/// `SessionError` and no partial mutation.
pub struct SessionMachine {
    session_id: SessionId,
    bank: ItemBank,
    phase: Phase,
    state: Option<SessionState>,
    pending_outcome: Option<AnswerOutcome>,
    item_shown_at: Option<DateTime<Utc>>,
    time_bonus: u32,
}

impl SessionMachine {
    /// Create a machine for a session over the given bank.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyBank` when there is nothing to practice.
    pub fn new(session_id: SessionId, bank: ItemBank) -> Result<Self, SessionError> {
        if bank.is_empty() {
            return Err(SessionError::EmptyBank);
        }
        Ok(Self {
            session_id,
            bank,
            phase: Phase::NotStarted,
            state: None,
            pending_outcome: None,
            item_shown_at: None,
            time_bonus: 0,
        })
    }

    /// Start a fresh session for the named participant.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the machine is
    /// `NotStarted`, or `SessionError::NameRequired` for a blank name.
    pub fn begin(&mut self, name: &str, now: DateTime<Utc>) -> Result<&SessionState, SessionError> {
        if self.phase != Phase::NotStarted {
            return Err(SessionError::InvalidTransition("begin after start"));
        }
        let state =
            SessionState::begin(name, now).map_err(|_: SessionStateError| SessionError::NameRequired)?;
        self.state = Some(state);
        self.phase = Phase::InProgress;
        self.pending_outcome = None;
        self.item_shown_at = Some(now);
        Ok(self.state.as_ref().expect("state just set"))
    }

    /// Rebuild the machine from a persisted state.
    ///
    /// A session whose two-hour deadline already passed goes straight to
    /// `Finished` without replaying items; otherwise it continues
    /// `InProgress` at the persisted index. Restoring the same state twice
    /// with no operations in between yields an identical machine.
    pub fn restore(&mut self, state: SessionState, now: DateTime<Utc>) -> Phase {
        let deadline_passed = elapsed_ms(state.session_started_at(), now) >= SESSION_DURATION_MS;
        let bank_exhausted = state.current_item_index() as usize >= self.bank.len();

        self.phase = if deadline_passed || bank_exhausted {
            Phase::Finished
        } else {
            Phase::InProgress
        };
        self.state = Some(state);
        self.pending_outcome = None;
        self.item_shown_at = Some(now);
        self.phase
    }

    /// Grade a multiple-choice answer for the current item.
    ///
    /// Does not advance; the caller shows feedback first and then calls
    /// [`Self::advance`]. An option index that addresses no option grades as
    /// incorrect rather than failing.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` (as a no-op) when the session is not in
    /// progress, the current item is not multiple-choice, or the item was
    /// already answered.
    pub fn submit_choice(
        &mut self,
        option_index: usize,
        now: DateTime<Utc>,
    ) -> Result<AnswerOutcome, SessionError> {
        let item = self.gated_current_item(ItemKind::MultipleChoice)?;
        let outcome = scoring::score_choice(item, option_index, self.elapsed_since_shown(now));
        self.apply_outcome(outcome, now);
        Ok(outcome)
    }

    /// Grade a spoken-repetition transcript for the current item.
    ///
    /// The transcript is compared against the prompt's expected sentence
    /// with the lenient normalized rules; an empty transcript grades as
    /// incorrect. Does not advance.
    ///
    /// # Errors
    ///
    /// Same gating as [`Self::submit_choice`], for spoken-repetition items.
    pub fn submit_transcript(
        &mut self,
        transcript: &str,
        now: DateTime<Utc>,
    ) -> Result<AnswerOutcome, SessionError> {
        let item = self.gated_current_item(ItemKind::SpokenRepetition)?;
        let matched = transcript_matches(expected_sentence(item.prompt()), transcript);
        let outcome = scoring::score_speech(matched, self.elapsed_since_shown(now));
        self.apply_outcome(outcome, now);
        Ok(outcome)
    }

    /// Move past the current item once it has a graded answer.
    ///
    /// At the last item the session finishes: the completion-time bonus is
    /// folded into the score exactly once and the phase becomes `Finished`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotAnswered` when the current item has no
    /// recorded outcome, or an invalid-transition error outside
    /// `InProgress`.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<Phase, SessionError> {
        match self.phase {
            Phase::NotStarted => return Err(SessionError::InvalidTransition("advance before begin")),
            Phase::Finished => return Err(SessionError::Finished),
            Phase::InProgress => {}
        }
        if self.pending_outcome.is_none() {
            return Err(SessionError::NotAnswered);
        }
        let state = self.state.as_mut().expect("in-progress session has state");

        self.pending_outcome = None;
        state.advance(now);
        if (state.current_item_index() as usize) >= self.bank.len() {
            self.finish(now);
        } else {
            self.item_shown_at = Some(now);
        }
        Ok(self.phase)
    }

    /// Force the session to `Finished`, whatever it is doing.
    ///
    /// Callable at any time; a graded, not-yet-advanced outcome is already
    /// part of the state and survives. Idempotent once finished.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Phase {
        if self.phase == Phase::InProgress {
            if let Some(state) = self.state.as_mut() {
                state.touch(now);
            }
            self.finish(now);
        }
        self.phase
    }

    fn finish(&mut self, now: DateTime<Utc>) {
        let state = self.state.as_mut().expect("finishing session has state");
        let bonus = scoring::session_time_bonus(elapsed_ms(state.session_started_at(), now));
        state.add_bonus(bonus, now);
        self.time_bonus = bonus;
        self.phase = Phase::Finished;
        self.pending_outcome = None;
        self.item_shown_at = None;
    }

    fn gated_current_item(&self, kind: ItemKind) -> Result<&Item, SessionError> {
        match self.phase {
            Phase::NotStarted => return Err(SessionError::InvalidTransition("answer before begin")),
            Phase::Finished => return Err(SessionError::Finished),
            Phase::InProgress => {}
        }
        if self.pending_outcome.is_some() {
            return Err(SessionError::AlreadyAnswered);
        }
        let item = self.current_item().ok_or(SessionError::Finished)?;
        if item.kind() != kind {
            return Err(SessionError::ItemKindMismatch);
        }
        Ok(item)
    }

    fn apply_outcome(&mut self, outcome: AnswerOutcome, now: DateTime<Utc>) {
        let state = self.state.as_mut().expect("in-progress session has state");
        state.record_answer(outcome, now);
        self.pending_outcome = Some(outcome);
    }

    fn elapsed_since_shown(&self, now: DateTime<Utc>) -> i64 {
        self.item_shown_at.map_or(0, |shown| elapsed_ms(shown, now))
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    #[must_use]
    pub fn bank(&self) -> &ItemBank {
        &self.bank
    }

    /// The item awaiting an answer, when the session is in progress.
    #[must_use]
    pub fn current_item(&self) -> Option<&Item> {
        if self.phase != Phase::InProgress {
            return None;
        }
        let state = self.state.as_ref()?;
        self.bank.get(state.current_item_index() as usize)
    }

    /// The outcome recorded for the current item, if it was answered but not
    /// yet advanced past. This is what feedback screens display.
    #[must_use]
    pub fn pending_outcome(&self) -> Option<AnswerOutcome> {
        self.pending_outcome
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.bank.len();
        let answered = self
            .state
            .as_ref()
            .map_or(0, |s| s.items_answered() as usize);
        SessionProgress {
            total,
            answered,
            remaining: total.saturating_sub(answered),
            is_complete: self.phase == Phase::Finished,
        }
    }

    /// The result record for the session as it stands: final once finished,
    /// interim otherwise.
    #[must_use]
    pub fn result_record(&self) -> Option<ResultRecord> {
        self.state.as_ref().map(|state| {
            ResultRecord::from_state(
                self.session_id.as_str(),
                state,
                self.bank.len(),
                self.time_bonus,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use drill_core::model::ItemId;
    use drill_core::time::fixed_now;

    fn bank() -> ItemBank {
        ItemBank::new(vec![
            Item::multiple_choice(
                ItemId::new(1),
                "Which animal says meow?",
                vec!["dog".into(), "cat".into()],
                1,
                "Cats meow.",
                "animals",
            )
            .unwrap(),
            Item::spoken_repetition(ItemId::new(2), "Repeat after me: I see a cat", "", "sentences")
                .unwrap(),
            Item::multiple_choice(
                ItemId::new(3),
                "Which animal barks?",
                vec!["dog".into(), "cat".into()],
                0,
                "Dogs bark.",
                "animals",
            )
            .unwrap(),
        ])
    }

    fn machine() -> SessionMachine {
        SessionMachine::new(SessionId::new("s-1").unwrap(), bank()).unwrap()
    }

    #[test]
    fn empty_bank_is_rejected() {
        let err = SessionMachine::new(SessionId::new("s-1").unwrap(), ItemBank::default());
        assert!(matches!(err, Err(SessionError::EmptyBank)));
    }

    #[test]
    fn begin_requires_not_started_and_a_name() {
        let mut m = machine();
        assert!(matches!(
            m.begin("  ", fixed_now()),
            Err(SessionError::NameRequired)
        ));
        m.begin("Lena", fixed_now()).unwrap();
        assert_eq!(m.phase(), Phase::InProgress);
        assert!(matches!(
            m.begin("Lena", fixed_now()),
            Err(SessionError::InvalidTransition(_))
        ));
    }

    #[test]
    fn full_run_scores_and_finishes_with_bonus() {
        let mut m = machine();
        let t0 = fixed_now();
        m.begin("Lena", t0).unwrap();

        // Fast correct choice: 10 + 5.
        let out = m
            .submit_choice(1, t0 + Duration::milliseconds(4_000))
            .unwrap();
        assert_eq!(out.points_awarded, 15);
        m.advance(t0 + Duration::milliseconds(5_000)).unwrap();

        // Spoken item with extra words: lenient match, fast, 15 + 5.
        let out = m
            .submit_transcript("i think i see a cat", t0 + Duration::milliseconds(9_000))
            .unwrap();
        assert!(out.is_correct);
        assert_eq!(out.points_awarded, 20);
        m.advance(t0 + Duration::milliseconds(10_000)).unwrap();

        // Slow correct choice: base 10 only.
        let out = m
            .submit_choice(0, t0 + Duration::milliseconds(22_000))
            .unwrap();
        assert_eq!(out.points_awarded, 10);
        let phase = m.advance(t0 + Duration::milliseconds(23_000)).unwrap();
        assert_eq!(phase, Phase::Finished);

        // Finished inside 30 minutes: +50 bonus on top of 45 base.
        let record = m.result_record().unwrap();
        assert_eq!(record.base_score, 45);
        assert_eq!(record.time_bonus, 50);
        assert_eq!(record.score, 95);
        assert_eq!(record.progress_percent, 100);
        assert_eq!(record.correct_answers, 3);
    }

    #[test]
    fn answer_is_accepted_at_most_once_before_advance() {
        let mut m = machine();
        let t0 = fixed_now();
        m.begin("Lena", t0).unwrap();
        m.submit_choice(0, t0).unwrap();
        assert!(matches!(
            m.submit_choice(1, t0),
            Err(SessionError::AlreadyAnswered)
        ));
        // The no-op left the graded outcome and counters untouched.
        let state = m.state().unwrap();
        assert_eq!(state.items_answered(), 1);
        assert_eq!(state.score(), 0);
    }

    #[test]
    fn advance_requires_a_recorded_outcome() {
        let mut m = machine();
        m.begin("Lena", fixed_now()).unwrap();
        assert!(matches!(
            m.advance(fixed_now()),
            Err(SessionError::NotAnswered)
        ));
    }

    #[test]
    fn kind_mismatch_is_a_no_op() {
        let mut m = machine();
        let t0 = fixed_now();
        m.begin("Lena", t0).unwrap();
        assert!(matches!(
            m.submit_transcript("I see a cat", t0),
            Err(SessionError::ItemKindMismatch)
        ));
        assert_eq!(m.state().unwrap().items_answered(), 0);
    }

    #[test]
    fn out_of_range_option_grades_incorrect() {
        let mut m = machine();
        let t0 = fixed_now();
        m.begin("Lena", t0).unwrap();
        let out = m.submit_choice(9, t0).unwrap();
        assert!(!out.is_correct);
        assert_eq!(out.points_awarded, 0);
    }

    #[test]
    fn restore_past_deadline_finishes_without_replay() {
        let mut m = machine();
        let t0 = fixed_now();
        let state = SessionState::from_persisted("Lena".into(), 1, 15, 1, 1, t0, t0).unwrap();

        let phase = m.restore(state, t0 + Duration::milliseconds(SESSION_DURATION_MS));
        assert_eq!(phase, Phase::Finished);
        assert!(matches!(
            m.submit_choice(0, t0),
            Err(SessionError::Finished)
        ));
        assert!(matches!(m.advance(t0), Err(SessionError::Finished)));
    }

    #[test]
    fn restore_within_deadline_continues_at_index() {
        let mut m = machine();
        let t0 = fixed_now();
        let state = SessionState::from_persisted("Lena".into(), 1, 15, 1, 1, t0, t0).unwrap();

        let later = t0 + Duration::minutes(10);
        let phase = m.restore(state.clone(), later);
        assert_eq!(phase, Phase::InProgress);
        assert_eq!(m.current_item().unwrap().id(), ItemId::new(2));

        // Idempotence: restoring again with no operations in between leaves
        // an identical state.
        let snapshot = m.state().cloned();
        m.restore(state, later);
        assert_eq!(m.state().cloned(), snapshot);
    }

    #[test]
    fn expire_keeps_a_graded_unadvanced_outcome() {
        let mut m = machine();
        let t0 = fixed_now();
        m.begin("Lena", t0).unwrap();
        m.submit_choice(1, t0 + Duration::milliseconds(2_000)).unwrap();

        let phase = m.expire(t0 + Duration::minutes(70));
        assert_eq!(phase, Phase::Finished);

        let record = m.result_record().unwrap();
        // 15 points from the graded answer survive; 70 minutes earns no bonus.
        assert_eq!(record.base_score, 15);
        assert_eq!(record.time_bonus, 0);
        assert_eq!(record.questions_answered, 1);
    }

    #[test]
    fn expire_before_begin_has_nothing_to_report() {
        let mut m = machine();
        assert_eq!(m.expire(fixed_now()), Phase::NotStarted);
        assert!(m.result_record().is_none());
    }

    #[test]
    fn counters_stay_within_invariants_throughout() {
        let mut m = machine();
        let mut now = fixed_now();
        m.begin("Lena", now).unwrap();

        let check = |m: &SessionMachine| {
            let s = m.state().unwrap();
            assert!(s.correct_count() <= s.items_answered());
            assert!(s.items_answered() <= s.current_item_index() + 1);
            assert!((s.current_item_index() as usize) <= m.bank().len());
        };

        check(&m);
        m.submit_choice(1, now).unwrap();
        check(&m);
        now += Duration::seconds(5);
        m.advance(now).unwrap();
        check(&m);
        m.submit_transcript("I see a cat.", now).unwrap();
        check(&m);
        now += Duration::seconds(5);
        m.advance(now).unwrap();
        check(&m);
        m.submit_choice(0, now).unwrap();
        now += Duration::seconds(5);
        m.advance(now).unwrap();
        check(&m);
        let s = m.state().unwrap();
        assert!(s.items_answered() <= s.current_item_index());
    }
}
