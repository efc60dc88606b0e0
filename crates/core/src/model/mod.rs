mod answer;
mod ids;
mod kind;
mod question;
pub(crate) mod session;
mod snapshot;

pub use answer::{Answer, Selection};
pub use ids::{QuestionId, SessionId};
pub use kind::SessionKind;
pub use question::{Question, QuestionDraft, QuestionError};
pub use session::{SessionProgress, SessionState};
pub use snapshot::{SessionSnapshot, SnapshotError};
