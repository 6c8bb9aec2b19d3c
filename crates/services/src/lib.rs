#![forbid(unsafe_code)]

pub mod error;
pub mod reporter;
pub mod sessions;
pub mod speech;

pub use drill_core::Clock;

pub use error::{CaptureError, ReportingError, SessionError};
pub use reporter::{AggregatorConfig, HttpAggregator, ResultAggregator, ResultReporter};
pub use sessions::{Countdown, CountdownEvent, Phase, SessionMachine, SessionProgress, SessionWorkflow};
pub use speech::{ScriptedCapture, SpeechCapture, SpeechVerifier, Transcript};
