//! Contracts with the remote quiz service: starting a session and scoring it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use quiz_core::model::{Question, QuestionId, SessionId, SessionKind, SessionState};

use crate::error::ApiError;

mod http;

pub use http::HttpQuizApi;

//
// ─── START ─────────────────────────────────────────────────────────────────────
//

/// Parameters for starting a new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub kind: SessionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_count: Option<u32>,
}

impl StartRequest {
    #[must_use]
    pub fn new(kind: SessionKind) -> Self {
        Self {
            kind,
            subject_id: None,
            topic_id: None,
            question_count: None,
        }
    }
}

/// A freshly started session as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedSession {
    pub session_id: SessionId,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub time_limit_seconds: Option<u64>,
}

#[async_trait]
pub trait SessionStarter: Send + Sync {
    /// Ask the remote service for a new session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport, status or decoding failures.
    async fn start(&self, request: &StartRequest) -> Result<StartedSession, ApiError>;
}

//
// ─── SCORING ───────────────────────────────────────────────────────────────────
//

/// One answer as sent to the scoring service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_id: QuestionId,
    pub selected_answer: usize,
}

/// Body of `POST /sessions/{id}/submit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub answers: Vec<SubmittedAnswer>,
    pub time_spent: u64,
}

impl SubmitRequest {
    /// Package the recorded answers, in question order, with `time_spent`.
    #[must_use]
    pub fn from_state(state: &SessionState, time_spent: u64) -> Self {
        let answers = state
            .answers()
            .values()
            .map(|answer| SubmittedAnswer {
                question_id: answer.question_id.clone(),
                selected_answer: answer.selected_option_index,
            })
            .collect();
        Self {
            answers,
            time_spent,
        }
    }
}

/// Scoring result. Fields the engine does not interpret are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub score: f64,
    pub total: u32,
    pub time_spent: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[async_trait]
pub trait ScoringService: Send + Sync {
    /// Submit a session for scoring.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport, status or decoding failures.
    async fn submit(
        &self,
        session_id: &SessionId,
        request: &SubmitRequest,
    ) -> Result<ScoreResult, ApiError>;
}
