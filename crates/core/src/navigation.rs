//! Moving the current question pointer. Never touches answers or the timer.

use crate::error::SessionError;
use crate::model::SessionState;

impl SessionState {
    /// Advance to the next question. Returns false at the last question.
    pub fn next(&mut self) -> bool {
        if self.current_index >= self.last_index() {
            return false;
        }
        self.current_index += 1;
        true
    }

    /// Go back one question. Returns false at the first question.
    pub fn prev(&mut self) -> bool {
        if self.current_index == 0 {
            return false;
        }
        self.current_index -= 1;
        true
    }

    /// Jump to any question, answered or not.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::OutOfRange` if `index` is not a question index;
    /// the current index is left unchanged.
    pub fn jump_to(&mut self, index: usize) -> Result<(), SessionError> {
        self.check_index(index)?;
        self.current_index = index;
        Ok(())
    }
}
