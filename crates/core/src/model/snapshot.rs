use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Answer, Question, SessionId, SessionState};
use crate::timer::TimerState;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SnapshotError {
    #[error("snapshot has no questions")]
    NoQuestions,

    #[error("snapshot index {index} out of range (0..{len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("snapshot answer for index {index} has no matching question")]
    AnswerOutOfRange { index: usize },

    #[error("snapshot answer for index {index} belongs to question {found}, expected {expected}")]
    AnswerMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("snapshot answer for index {index} selects missing option {option}")]
    OptionOutOfRange { index: usize, option: usize },

    #[error("snapshot has neither a start anchor nor a frozen elapsed time")]
    TimerMissing,

    #[error("snapshot has both a start anchor and a frozen elapsed time")]
    TimerConflict,

    #[error("snapshot start anchor {0} is not a valid timestamp")]
    InvalidAnchor(i64),
}

/// Persisted shape of a session.
///
/// A plain value: no behavior, only the fields needed to rebuild a
/// `SessionState` verbatim. Field names are the compact keys used by the
/// storage layer. Exactly one of `start_anchor_ms` / `frozen_elapsed_secs`
/// is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(rename = "SID", default)]
    pub session_id: Option<SessionId>,
    #[serde(rename = "Qs")]
    pub questions: Vec<Question>,
    #[serde(rename = "ANS", default)]
    pub answers: BTreeMap<usize, Answer>,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "ST", default, skip_serializing_if = "Option::is_none")]
    pub start_anchor_ms: Option<i64>,
    #[serde(rename = "EL", default, skip_serializing_if = "Option::is_none")]
    pub frozen_elapsed_secs: Option<u64>,
    #[serde(rename = "IDX", default)]
    pub current_index: usize,
    #[serde(rename = "TL", default)]
    pub time_limit_secs: Option<u64>,
}

impl SessionState {
    /// Capture the session as a persistable value.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let (start_anchor_ms, frozen_elapsed_secs) = match self.timer {
            TimerState::Running { anchor } => (Some(anchor.timestamp_millis()), None),
            TimerState::Frozen { elapsed_secs } => (None, Some(elapsed_secs)),
        };

        SessionSnapshot {
            session_id: self.session_id.clone(),
            questions: self.questions.clone(),
            answers: self.answers.clone(),
            start_anchor_ms,
            frozen_elapsed_secs,
            current_index: self.current_index,
            time_limit_secs: self.time_limit_secs,
        }
    }

    /// Rebuild a session from a snapshot, re-checking every invariant.
    ///
    /// A restored running timer keeps its original anchor, so time spent
    /// while the app was not running is counted.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError` if the snapshot violates a session invariant.
    pub fn restore(snapshot: SessionSnapshot) -> Result<Self, SnapshotError> {
        let SessionSnapshot {
            session_id,
            questions,
            answers,
            start_anchor_ms,
            frozen_elapsed_secs,
            current_index,
            time_limit_secs,
        } = snapshot;

        if questions.is_empty() {
            return Err(SnapshotError::NoQuestions);
        }
        if current_index >= questions.len() {
            return Err(SnapshotError::IndexOutOfRange {
                index: current_index,
                len: questions.len(),
            });
        }

        for (&index, answer) in &answers {
            let question = questions
                .get(index)
                .ok_or(SnapshotError::AnswerOutOfRange { index })?;
            if answer.question_id != *question.id() {
                return Err(SnapshotError::AnswerMismatch {
                    index,
                    expected: question.id().to_string(),
                    found: answer.question_id.to_string(),
                });
            }
            if answer.selected_option_index >= question.option_count() {
                return Err(SnapshotError::OptionOutOfRange {
                    index,
                    option: answer.selected_option_index,
                });
            }
        }

        let timer = match (start_anchor_ms, frozen_elapsed_secs) {
            (Some(ms), None) => TimerState::Running {
                anchor: DateTime::<Utc>::from_timestamp_millis(ms)
                    .ok_or(SnapshotError::InvalidAnchor(ms))?,
            },
            (None, Some(elapsed_secs)) => TimerState::Frozen { elapsed_secs },
            (None, None) => return Err(SnapshotError::TimerMissing),
            (Some(_), Some(_)) => return Err(SnapshotError::TimerConflict),
        };

        Ok(Self {
            session_id: session_id.filter(|id| !id.is_blank()),
            questions,
            answers,
            current_index,
            timer,
            time_limit_secs: time_limit_secs.filter(|limit| *limit > 0),
        })
    }
}
