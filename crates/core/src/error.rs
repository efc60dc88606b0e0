use thiserror::Error;

use crate::model::QuestionError;

/// Errors raised by session state operations. None of them change state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("a session needs at least one question")]
    Empty,

    #[error("question index {index} out of range (0..{len})")]
    OutOfRange { index: usize, len: usize },

    #[error("option {option} out of range for question {index} ({options} options)")]
    OptionOutOfRange {
        index: usize,
        option: usize,
        options: usize,
    },

    #[error(transparent)]
    Question(#[from] QuestionError),
}
