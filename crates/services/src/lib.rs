#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod remote;
pub mod sessions;

pub use quiz_core::Clock;

pub use config::ApiConfig;
pub use error::{ApiError, ConfigError, InvalidSubmit, QuizSessionError, SubmitError};
pub use remote::{
    HttpQuizApi, ScoreResult, ScoringService, SessionStarter, StartRequest, StartedSession,
    SubmitRequest, SubmittedAnswer,
};
pub use sessions::{
    PendingSubmission, QuizService, QuizSession, SubmissionController, SubmissionStatus,
    TimerWatch,
};
