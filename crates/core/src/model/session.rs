use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::SessionError;
use crate::model::{Answer, Question, SessionId};
use crate::timer::TimerState;

/// Aggregated view of answering progress, useful for the question map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
}

impl SessionProgress {
    #[must_use]
    pub fn all_answered(&self) -> bool {
        self.remaining == 0
    }
}

//
// ─── SESSION STATE ─────────────────────────────────────────────────────────────
//

/// Canonical record of one quiz attempt.
///
/// Invariants held by every constructor and mutator:
/// - `current_index < questions.len()` and `questions` is never empty;
/// - an answer stored under index `i` carries `questions[i].id()`;
/// - answers are append-once.
///
/// Navigation lives in `navigation.rs`, answer recording in `recorder.rs`.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionState {
    pub(crate) session_id: Option<SessionId>,
    pub(crate) questions: Vec<Question>,
    pub(crate) answers: BTreeMap<usize, Answer>,
    pub(crate) current_index: usize,
    pub(crate) timer: TimerState,
    pub(crate) time_limit_secs: Option<u64>,
}

impl SessionState {
    /// Create a session positioned on the first question with the timer
    /// running from zero at `now`.
    ///
    /// A blank `session_id` is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if `questions` is empty.
    pub fn new(
        session_id: Option<SessionId>,
        questions: Vec<Question>,
        time_limit_secs: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::Empty);
        }

        Ok(Self {
            session_id: session_id.filter(|id| !id.is_blank()),
            questions,
            answers: BTreeMap::new(),
            current_index: 0,
            timer: TimerState::running_from(0, now),
            time_limit_secs: time_limit_secs.filter(|limit| *limit > 0),
        })
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// Number of questions. Always at least one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Always false; a session cannot be built without questions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn last_index(&self) -> usize {
        self.questions.len().saturating_sub(1)
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn current_question(&self) -> &Question {
        &self.questions[self.current_index]
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<usize, Answer> {
        &self.answers
    }

    #[must_use]
    pub fn answer(&self, index: usize) -> Option<&Answer> {
        self.answers.get(&index)
    }

    #[must_use]
    pub fn is_answered(&self, index: usize) -> bool {
        self.answers.contains_key(&index)
    }

    /// Selected option for a question, if answered.
    #[must_use]
    pub fn selected_option(&self, index: usize) -> Option<usize> {
        self.answers.get(&index).map(|a| a.selected_option_index)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    /// Indices without an answer, in question order.
    #[must_use]
    pub fn unanswered_indices(&self) -> Vec<usize> {
        (0..self.questions.len())
            .filter(|i| !self.answers.contains_key(i))
            .collect()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.questions.len();
        let answered = self.answers.len();
        SessionProgress {
            total,
            answered,
            remaining: total.saturating_sub(answered),
        }
    }

    //
    // ─── TIMING ────────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn timer(&self) -> TimerState {
        self.timer
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> Option<u64> {
        self.time_limit_secs
    }

    #[must_use]
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        self.timer.sample(now)
    }

    /// Seconds left for time-boxed sessions; `None` when there is no limit.
    #[must_use]
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> Option<u64> {
        self.time_limit_secs.map(|limit| self.timer.remaining(limit, now))
    }

    /// Wall-clock deadline for time-boxed sessions while the timer runs.
    #[must_use]
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.time_limit_secs.and_then(|limit| self.timer.deadline(limit))
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.remaining_secs(now) == Some(0)
    }

    /// Restart the timer so it reports `at_elapsed_secs` at `now`.
    pub fn start_timer(&mut self, at_elapsed_secs: u64, now: DateTime<Utc>) {
        self.timer.start(at_elapsed_secs, now);
    }

    /// Stop the timer and return the captured elapsed seconds.
    pub fn freeze_timer(&mut self, now: DateTime<Utc>) -> u64 {
        self.timer.freeze(now)
    }

    /// Restart a frozen timer from its frozen value.
    pub fn resume_timer(&mut self, now: DateTime<Utc>) {
        self.timer.resume(now);
    }

    pub(crate) fn check_index(&self, index: usize) -> Result<(), SessionError> {
        if index < self.questions.len() {
            Ok(())
        } else {
            Err(SessionError::OutOfRange {
                index,
                len: self.questions.len(),
            })
        }
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("session_id", &self.session_id)
            .field("questions_len", &self.questions.len())
            .field("answers_len", &self.answers.len())
            .field("current_index", &self.current_index)
            .field("timer", &self.timer)
            .field("time_limit_secs", &self.time_limit_secs)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::QuestionDraft;
    use crate::time::fixed_now;
    use chrono::Duration;

    pub(crate) fn build_questions(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| {
                QuestionDraft::new(
                    format!("q{i}"),
                    format!("Question {i}?"),
                    vec!["A".into(), "B".into(), "C".into(), "D".into()],
                )
                .with_explanation(format!("Because {i}."))
                .validate()
                .unwrap()
            })
            .collect()
    }

    pub(crate) fn build_session(n: usize) -> SessionState {
        SessionState::new(
            Some(SessionId::new("s-1")),
            build_questions(n),
            None,
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn new_session_starts_at_first_question_with_running_timer() {
        let session = build_session(3);
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.current_question().id().as_str(), "q0");
        assert!(session.timer().is_running());
        assert_eq!(session.elapsed_secs(fixed_now()), 0);
        assert_eq!(session.unanswered_indices(), vec![0, 1, 2]);
    }

    #[test]
    fn empty_session_is_rejected() {
        let err = SessionState::new(None, Vec::new(), None, fixed_now()).unwrap_err();
        assert_eq!(err, SessionError::Empty);
    }

    #[test]
    fn blank_session_id_and_zero_limit_are_dropped() {
        let session =
            SessionState::new(Some(SessionId::new(" ")), build_questions(1), Some(0), fixed_now())
                .unwrap();
        assert!(session.session_id().is_none());
        assert!(session.time_limit_secs().is_none());
        assert!(!session.is_expired(fixed_now() + Duration::days(1)));
    }

    #[test]
    fn time_boxed_session_exposes_deadline_and_expiry() {
        let now = fixed_now();
        let session = SessionState::new(None, build_questions(2), Some(300), now).unwrap();
        assert_eq!(session.deadline(), Some(now + Duration::seconds(300)));
        assert_eq!(session.remaining_secs(now + Duration::seconds(120)), Some(180));
        assert!(!session.is_expired(now + Duration::seconds(299)));
        assert!(session.is_expired(now + Duration::seconds(300)));
    }
}
