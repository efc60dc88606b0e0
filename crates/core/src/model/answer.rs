use serde::{Deserialize, Serialize};

use crate::model::ids::QuestionId;

/// A recorded selection for one question. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: QuestionId,
    pub selected_option_index: usize,
}

/// Outcome of a selection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The selection was stored as the final answer for the question.
    Recorded(Answer),
    /// The question was already locked; nothing changed. Carries the stored answer.
    AlreadyAnswered(Answer),
}

impl Selection {
    #[must_use]
    pub fn answer(&self) -> &Answer {
        match self {
            Self::Recorded(answer) | Self::AlreadyAnswered(answer) => answer,
        }
    }

    #[must_use]
    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }
}
