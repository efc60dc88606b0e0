mod persist;
mod quiz_session;
mod service;
mod submission;
mod timer_watch;

// Public API of the session subsystem.
pub use crate::error::{QuizSessionError, SubmitError};
pub use quiz_session::QuizSession;
pub use service::QuizService;
pub use submission::{PendingSubmission, SubmissionController, SubmissionStatus};
pub use timer_watch::TimerWatch;
