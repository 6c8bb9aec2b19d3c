mod countdown;
mod machine;
mod progress;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use countdown::{Countdown, CountdownEvent};
pub use machine::{Phase, SessionMachine};
pub use progress::SessionProgress;
pub use workflow::SessionWorkflow;
