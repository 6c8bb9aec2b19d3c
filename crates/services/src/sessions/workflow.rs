use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use drill_core::Clock;
use drill_core::model::{AnswerOutcome, Item, ItemBank, ItemKind, SessionId, SessionState};
use drill_core::scoring::SESSION_DURATION_MS;
use drill_core::time::elapsed_ms;
use storage::repository::{SessionRecord, SessionRepository};

use super::machine::{Phase, SessionMachine};
use super::progress::SessionProgress;
use crate::error::SessionError;
use crate::reporter::ResultReporter;
use crate::speech::SpeechVerifier;

/// Orchestrates one session end to end: drives the state machine, persists
/// after every mutation, and reports results at the terminal transitions.
///
/// All operations take `&mut self`, so the session is non-reentrant by
/// construction: a countdown or UI layer signals expiry, and the owner
/// applies [`Self::expire`] between operations, never in the middle of one.
/// An in-flight grading therefore always completes and persists before
/// expiry lands on top of it.
pub struct SessionWorkflow {
    clock: Clock,
    machine: SessionMachine,
    sessions: Arc<dyn SessionRepository>,
    reporter: ResultReporter,
    verifier: SpeechVerifier,
    save_pending: bool,
}

impl SessionWorkflow {
    /// Build a workflow over an externally resolved item bank.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyBank` when the bank has no items.
    pub fn new(
        clock: Clock,
        session_id: SessionId,
        bank: ItemBank,
        sessions: Arc<dyn SessionRepository>,
        reporter: ResultReporter,
        verifier: SpeechVerifier,
    ) -> Result<Self, SessionError> {
        Ok(Self {
            clock,
            machine: SessionMachine::new(session_id, bank)?,
            sessions,
            reporter,
            verifier,
            save_pending: false,
        })
    }

    /// Start a fresh session for the named participant and persist it.
    ///
    /// # Errors
    ///
    /// Returns the machine's validation errors; persistence failures are
    /// logged and retried later, never returned.
    pub async fn begin(&mut self, name: &str) -> Result<SessionProgress, SessionError> {
        let now = self.clock.now();
        self.machine.begin(name, now)?;
        self.persist().await;
        Ok(self.machine.progress())
    }

    /// Continue a previously persisted session.
    ///
    /// Loads the stored state for this session id; when the two-hour
    /// deadline has already passed the session goes straight to `Finished`
    /// (no item replay) and its result is reported. Reopening an existing
    /// session always loads; it never recreates.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NothingToResume` when no state is persisted,
    /// or `SessionError::Storage` when the load itself fails.
    pub async fn resume(&mut self) -> Result<Phase, SessionError> {
        let record = self
            .sessions
            .load_session(self.machine.session_id())
            .await?
            .ok_or(SessionError::NothingToResume)?;
        let state = record.into_state()?;

        let now = self.clock.now();
        let deadline_passed =
            elapsed_ms(state.session_started_at(), now) >= SESSION_DURATION_MS;
        let phase = self.machine.restore(state, now);
        self.persist().await;
        // A session that already completed its items was reported when it
        // finished; only the deadline-passed transition reports here.
        if phase == Phase::Finished && deadline_passed {
            debug!(session_id = %self.machine.session_id(), "resumed past deadline, finishing");
            self.report().await;
        }
        Ok(phase)
    }

    /// Grade a multiple-choice answer for the current item and persist.
    ///
    /// # Errors
    ///
    /// Propagates the machine's gating errors as no-ops.
    pub async fn submit_choice(&mut self, option_index: usize) -> Result<AnswerOutcome, SessionError> {
        let now = self.clock.now();
        let outcome = self.machine.submit_choice(option_index, now)?;
        self.persist().await;
        Ok(outcome)
    }

    /// Grade an already-captured transcript for the current item and persist.
    ///
    /// # Errors
    ///
    /// Propagates the machine's gating errors as no-ops.
    pub async fn submit_transcript(&mut self, transcript: &str) -> Result<AnswerOutcome, SessionError> {
        let now = self.clock.now();
        let outcome = self.machine.submit_transcript(transcript, now)?;
        self.persist().await;
        Ok(outcome)
    }

    /// Capture one utterance for the current spoken-repetition item and
    /// grade it.
    ///
    /// A capture failure surfaces as `SessionError::Capture` with no state
    /// mutation: the participant is told to try again, and nothing counts
    /// as answered until a transcript is actually graded.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Capture` for capture failures, or the
    /// machine's gating errors.
    pub async fn submit_speech(&mut self) -> Result<AnswerOutcome, SessionError> {
        // Gate fully before touching the microphone so a capture is never
        // taken for an item that cannot accept one.
        if self.machine.phase() != Phase::InProgress {
            return Err(SessionError::InvalidTransition("speech outside session"));
        }
        if self.machine.pending_outcome().is_some() {
            return Err(SessionError::AlreadyAnswered);
        }
        let item = self.machine.current_item().ok_or(SessionError::Finished)?;
        if item.kind() != ItemKind::SpokenRepetition {
            return Err(SessionError::ItemKindMismatch);
        }
        let transcript = self.verifier.capture().await?;
        self.submit_transcript(transcript.as_str()).await
    }

    /// Move past the current item. Finishing the last item reports the
    /// final result.
    ///
    /// # Errors
    ///
    /// Propagates the machine's gating errors as no-ops.
    pub async fn advance(&mut self) -> Result<SessionProgress, SessionError> {
        let now = self.clock.now();
        let phase = self.machine.advance(now)?;
        self.persist().await;
        if phase == Phase::Finished {
            self.report().await;
        }
        Ok(self.machine.progress())
    }

    /// Force the session to finish now, whatever it is doing.
    ///
    /// Cancels any in-progress capture (releasing the microphone), persists
    /// whatever state exists, and always reports. Idempotent once finished.
    pub async fn expire(&mut self) -> Phase {
        self.verifier.cancel_capture();
        let phase = self.machine.expire(self.clock.now());
        if self.machine.state().is_some() {
            self.persist().await;
            self.report().await;
        }
        phase
    }

    /// Manual exit: persist the current state and push an interim result
    /// before yielding control. The session stays resumable.
    pub async fn suspend(&mut self) {
        if self.machine.state().is_some() {
            self.persist().await;
            self.report().await;
        }
    }

    /// When the running session will hit its two-hour deadline. Feed this
    /// to a countdown task.
    #[must_use]
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.machine
            .state()
            .map(|s| s.session_started_at() + Duration::milliseconds(SESSION_DURATION_MS))
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        self.machine.progress()
    }

    #[must_use]
    pub fn current_item(&self) -> Option<&Item> {
        self.machine.current_item()
    }

    #[must_use]
    pub fn state(&self) -> Option<&SessionState> {
        self.machine.state()
    }

    #[must_use]
    pub fn pending_outcome(&self) -> Option<AnswerOutcome> {
        self.machine.pending_outcome()
    }

    /// True when the most recent save failed and the state on disk is
    /// stale. The next mutation writes the full record again, so the gap
    /// heals opportunistically.
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.save_pending
    }

    async fn persist(&mut self) {
        let Some(state) = self.machine.state() else {
            return;
        };
        let record = SessionRecord::from_state(state);
        match self
            .sessions
            .save_session(self.machine.session_id(), &record)
            .await
        {
            Ok(()) => {
                if self.save_pending {
                    debug!(session_id = %self.machine.session_id(), "persistence recovered");
                }
                self.save_pending = false;
            }
            Err(e) => {
                warn!(
                    session_id = %self.machine.session_id(),
                    error = %e,
                    "session save failed, will retry on next mutation"
                );
                self.save_pending = true;
            }
        }
    }

    async fn report(&self) {
        if let Some(record) = self.machine.result_record() {
            self.reporter.push(&record).await;
        }
    }
}
