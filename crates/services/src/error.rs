//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::SessionError;
use quiz_core::model::SnapshotError;
use storage::repository::StorageError;

/// Errors emitted by the remote quiz API collaborators.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl ApiError {
    /// Human-readable message suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Status { message, .. } => message.clone(),
            Self::Http(err) if err.is_timeout() => "the request timed out".to_owned(),
            Self::Http(err) if err.is_connect() => "could not reach the server".to_owned(),
            other => other.to_string(),
        }
    }
}

/// Why a submission was refused before anything was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum InvalidSubmit {
    #[error("a submission is already in flight")]
    AlreadySubmitting,
    #[error("the session was already scored")]
    AlreadySucceeded,
    #[error("the session has no session id")]
    MissingSessionId,
    #[error("no submission is in flight")]
    NotSubmitting,
}

/// Errors emitted by `SubmissionController`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubmitError {
    #[error("invalid state: {0}")]
    InvalidState(InvalidSubmit),
    #[error("submission failed: {message}")]
    Failed {
        message: String,
        #[source]
        source: ApiError,
    },
}

impl SubmitError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Errors emitted by `QuizSession` and `QuizService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizSessionError {
    #[error("session already scored")]
    Finished,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while reading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{var} is not set")]
    Missing { var: &'static str },
    #[error("{var} is not a usable base url: {raw}")]
    InvalidBaseUrl { var: &'static str, raw: String },
    #[error("{var} must be a positive integer, got {raw}")]
    InvalidNumber { var: &'static str, raw: String },
}
