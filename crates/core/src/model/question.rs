use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question id cannot be empty")]
    EmptyId,

    #[error("question {id} has an empty prompt")]
    EmptyPrompt { id: String },

    #[error("question {id} has no options")]
    NoOptions { id: String },
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Unvalidated question as received from the session start collaborator or
/// read back from a persisted snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub id: String,
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl QuestionDraft {
    #[must_use]
    pub fn new(id: impl Into<String>, prompt: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            options,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    /// Validate the draft into an immutable `Question`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the id or prompt is blank, or no options are given.
    pub fn validate(self) -> Result<Question, QuestionError> {
        let id = self.id.trim().to_owned();
        if id.is_empty() {
            return Err(QuestionError::EmptyId);
        }
        if self.prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt { id });
        }
        if self.options.is_empty() {
            return Err(QuestionError::NoOptions { id });
        }

        let explanation = self
            .explanation
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty());

        Ok(Question {
            id: QuestionId::new(id),
            prompt: self.prompt,
            options: self.options,
            explanation,
            metadata: self.metadata,
        })
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A single multiple-choice question. Immutable for the life of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuestionDraft", into = "QuestionDraft")]
pub struct Question {
    id: QuestionId,
    prompt: String,
    options: Vec<String>,
    explanation: Option<String>,
    metadata: BTreeMap<String, String>,
}

impl Question {
    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    #[must_use]
    pub fn option(&self, index: usize) -> Option<&str> {
        self.options.get(index).map(String::as_str)
    }

    /// Explanation shown after the question is answered, if the content has one.
    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    #[must_use]
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }
}

impl TryFrom<QuestionDraft> for Question {
    type Error = QuestionError;

    fn try_from(draft: QuestionDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

impl From<Question> for QuestionDraft {
    fn from(question: Question) -> Self {
        Self {
            id: question.id.as_str().to_owned(),
            prompt: question.prompt,
            options: question.options,
            explanation: question.explanation,
            metadata: question.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Vec<String> {
        vec!["A".into(), "B".into(), "C".into()]
    }

    #[test]
    fn validate_trims_id_and_drops_blank_explanation() {
        let question = QuestionDraft::new(" q1 ", "What is 2 + 2?", options())
            .with_explanation("   ")
            .validate()
            .unwrap();
        assert_eq!(question.id().as_str(), "q1");
        assert_eq!(question.explanation(), None);
        assert_eq!(question.option(1), Some("B"));
        assert_eq!(question.option(3), None);
    }

    #[test]
    fn validate_rejects_missing_parts() {
        let err = QuestionDraft::new("", "prompt", options()).validate().unwrap_err();
        assert_eq!(err, QuestionError::EmptyId);

        let err = QuestionDraft::new("q1", " ", options()).validate().unwrap_err();
        assert!(matches!(err, QuestionError::EmptyPrompt { .. }));

        let err = QuestionDraft::new("q1", "prompt", Vec::new())
            .validate()
            .unwrap_err();
        assert!(matches!(err, QuestionError::NoOptions { .. }));
    }

    #[test]
    fn deserialize_runs_validation() {
        let ok: Question = serde_json::from_str(
            r#"{"id":"q9","prompt":"Capital of France?","options":["Paris","Rome"],"explanation":"Paris."}"#,
        )
        .unwrap();
        assert_eq!(ok.explanation(), Some("Paris."));

        let bad = serde_json::from_str::<Question>(r#"{"id":"q9","prompt":"x","options":[]}"#);
        assert!(bad.is_err());
    }
}
