//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;

/// Why a speech capture produced no usable transcript.
///
/// Capture failures are surfaced to the caller as "try again" and never
/// mutate session state; the verifier does not auto-retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CaptureError {
    #[error("no speech detected")]
    NoSpeechDetected,

    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("capture device error: {0}")]
    DeviceError(String),

    /// The capture was stopped from outside, e.g. by session expiry.
    #[error("capture cancelled")]
    Cancelled,
}

/// Errors emitted by the session state machine and its workflow.
///
/// Invalid-transition errors are strict no-ops: the operation mutates
/// nothing and the session continues. Persistence failures are deliberately
/// absent here; they are logged and retried on the next mutation, never
/// surfaced to the participant.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("invalid transition: {0}")]
    InvalidTransition(&'static str),

    #[error("item bank must not be empty")]
    EmptyBank,

    #[error("participant name must not be empty")]
    NameRequired,

    #[error("operation does not match the current item's kind")]
    ItemKindMismatch,

    #[error("current item already has a graded answer")]
    AlreadyAnswered,

    #[error("current item has no graded answer yet")]
    NotAnswered,

    #[error("session is finished")]
    Finished,

    #[error("no persisted session to resume")]
    NothingToResume,

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while pushing a result to the external aggregator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportingError {
    #[error("no aggregator configured")]
    Disabled,

    #[error("aggregator returned status {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
