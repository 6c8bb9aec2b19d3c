mod ids;
mod item;
mod report;
mod session;

pub use ids::{ItemId, ParseIdError, SessionId, SessionIdError};
pub use item::{Item, ItemBank, ItemError, ItemKind};
pub use report::ResultRecord;
pub use session::{AnswerOutcome, SessionState, SessionStateError};
