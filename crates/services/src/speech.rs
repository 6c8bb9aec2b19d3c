use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::CaptureError;

/// Best-effort text produced by the transcription backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript(String);

impl Transcript {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Contract for the audio-capture/transcription backend.
///
/// One call to `capture` records one utterance and returns a best-effort
/// transcript. Implementations hold the exclusive microphone resource only
/// for the duration of the call and must release it on every exit path:
/// success, failure, and cancellation. `capture` never auto-retries; the
/// session grades exactly one transcript per item.
#[async_trait]
pub trait SpeechCapture: Send + Sync {
    /// Record and transcribe one utterance.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError` when no usable transcript could be produced.
    async fn capture(&self) -> Result<Transcript, CaptureError>;

    /// Stop an in-flight capture from outside. The pending `capture` call
    /// returns `CaptureError::Cancelled` and the microphone is released.
    /// Session expiry is the one cross-cutting caller of this.
    fn cancel(&self);
}

/// Owns the capture backend for spoken-repetition items: one transcript per
/// attempt, cancellable from outside. Grading the transcript is the session
/// machine's job.
#[derive(Clone)]
pub struct SpeechVerifier {
    capture: Arc<dyn SpeechCapture>,
}

impl SpeechVerifier {
    #[must_use]
    pub fn new(capture: Arc<dyn SpeechCapture>) -> Self {
        Self { capture }
    }

    /// Capture one transcript for the current item.
    ///
    /// # Errors
    ///
    /// Propagates the backend's `CaptureError`; the caller surfaces it as
    /// "try again" without touching session state.
    pub async fn capture(&self) -> Result<Transcript, CaptureError> {
        self.capture.capture().await
    }

    /// Forcibly stop an in-progress capture, releasing the microphone.
    pub fn cancel_capture(&self) {
        self.capture.cancel();
    }
}

/// Scripted capture backend for tests and headless demos.
///
/// Returns pre-seeded results in order; once the script is exhausted,
/// `capture` parks until cancelled.
#[derive(Default)]
pub struct ScriptedCapture {
    script: Mutex<VecDeque<Result<Transcript, CaptureError>>>,
    cancelled: AtomicBool,
    cancel_signal: Notify,
}

impl ScriptedCapture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful transcript.
    pub fn push_transcript(&self, text: impl Into<String>) {
        if let Ok(mut guard) = self.script.lock() {
            guard.push_back(Ok(Transcript::new(text)));
        }
    }

    /// Queue a capture failure.
    pub fn push_failure(&self, error: CaptureError) {
        if let Ok(mut guard) = self.script.lock() {
            guard.push_back(Err(error));
        }
    }
}

#[async_trait]
impl SpeechCapture for ScriptedCapture {
    async fn capture(&self) -> Result<Transcript, CaptureError> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(CaptureError::Cancelled);
        }
        let scripted = self
            .script
            .lock()
            .map_err(|e| CaptureError::DeviceError(e.to_string()))?
            .pop_front();
        match scripted {
            Some(result) => result,
            None => {
                // Nothing scripted: behave like an open microphone waiting
                // for speech until someone cancels.
                self.cancel_signal.notified().await;
                Err(CaptureError::Cancelled)
            }
        }
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.cancel_signal.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_capture_replays_in_order() {
        let capture = ScriptedCapture::new();
        capture.push_transcript("I see a cat.");
        capture.push_failure(CaptureError::NoSpeechDetected);

        let verifier = SpeechVerifier::new(Arc::new(capture));
        let first = verifier.capture().await.unwrap();
        assert_eq!(first.as_str(), "I see a cat.");
        assert_eq!(
            verifier.capture().await.unwrap_err(),
            CaptureError::NoSpeechDetected
        );
    }

    #[tokio::test]
    async fn cancel_stops_a_parked_capture() {
        let capture = Arc::new(ScriptedCapture::new());
        let verifier = SpeechVerifier::new(capture);

        let pending = {
            let verifier = verifier.clone();
            tokio::spawn(async move { verifier.capture().await })
        };
        // Let the capture task park on the empty script.
        tokio::task::yield_now().await;
        verifier.cancel_capture();

        let result = pending.await.unwrap();
        assert_eq!(result.unwrap_err(), CaptureError::Cancelled);
    }

    #[tokio::test]
    async fn cancelled_backend_rejects_further_captures() {
        let capture = ScriptedCapture::new();
        capture.push_transcript("unused");
        capture.cancel();
        assert_eq!(
            capture.capture().await.unwrap_err(),
            CaptureError::Cancelled
        );
    }

}
