//! Append-once answer recording.

use crate::error::SessionError;
use crate::model::{Answer, Selection, SessionState};

impl SessionState {
    /// Record `option` as the final answer for question `index`.
    ///
    /// If the question already has an answer nothing changes and
    /// `Selection::AlreadyAnswered` carries the stored choice, so the caller
    /// can re-surface it (e.g. reopen the explanation).
    ///
    /// # Errors
    ///
    /// Returns `SessionError::OutOfRange` for an unknown question index and
    /// `SessionError::OptionOutOfRange` for an option the question does not have.
    pub fn select(&mut self, index: usize, option: usize) -> Result<Selection, SessionError> {
        self.check_index(index)?;

        if let Some(existing) = self.answers.get(&index) {
            return Ok(Selection::AlreadyAnswered(existing.clone()));
        }

        let question = &self.questions[index];
        if option >= question.option_count() {
            return Err(SessionError::OptionOutOfRange {
                index,
                option,
                options: question.option_count(),
            });
        }

        let answer = Answer {
            question_id: question.id().clone(),
            selected_option_index: option,
        };
        self.answers.insert(index, answer.clone());
        Ok(Selection::Recorded(answer))
    }

    /// Record an answer for the current question.
    ///
    /// # Errors
    ///
    /// See [`SessionState::select`].
    pub fn select_current(&mut self, option: usize) -> Result<Selection, SessionError> {
        self.select(self.current_index, option)
    }
}
