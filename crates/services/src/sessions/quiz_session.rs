use std::fmt;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use quiz_core::TimerState;
use quiz_core::model::{
    Question, Selection, SessionKind, SessionProgress, SessionSnapshot, SessionState,
};
use storage::repository::SessionStore;

use super::persist::SnapshotWriter;
use super::submission::{PendingSubmission, SubmissionController, SubmissionStatus};
use super::timer_watch::TimerWatch;
use crate::Clock;
use crate::error::{ApiError, QuizSessionError};
use crate::remote::{ScoreResult, ScoringService, StartedSession};

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One quiz attempt in progress: the single owner of its `SessionState`.
///
/// Every command goes through `&mut self`. Timer transitions are published
/// to `TimerWatch` readers, and persisted sessions queue a snapshot after
/// each state change.
pub struct QuizSession {
    kind: SessionKind,
    state: SessionState,
    submission: SubmissionController,
    clock: Clock,
    timer_tx: watch::Sender<TimerState>,
    writer: Option<SnapshotWriter>,
}

impl QuizSession {
    #[must_use]
    pub fn new(kind: SessionKind, state: SessionState, clock: Clock) -> Self {
        let (timer_tx, _) = watch::channel(state.timer());
        Self {
            kind,
            state,
            submission: SubmissionController::new(),
            clock,
            timer_tx,
            writer: None,
        }
    }

    /// Build a session from the start collaborator's response, timer
    /// running from zero now.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::Session` if the response has no questions.
    pub fn from_started(
        kind: SessionKind,
        started: StartedSession,
        clock: Clock,
    ) -> Result<Self, QuizSessionError> {
        let state = SessionState::new(
            Some(started.session_id),
            started.questions,
            started.time_limit_seconds,
            clock.now(),
        )?;
        Ok(Self::new(kind, state, clock))
    }

    /// Persist this session through `store` from now on, starting with the
    /// current state. Ignored for kinds that are not persisted, and outside
    /// a Tokio runtime, where no writer task can be spawned.
    pub fn attach_store(&mut self, store: SessionStore) {
        if !self.kind.is_persisted() {
            return;
        }
        let Some(writer) = SnapshotWriter::spawn(store, self.kind) else {
            tracing::warn!(
                kind = self.kind.as_str(),
                "no tokio runtime; session will not be persisted"
            );
            return;
        };
        self.writer = Some(writer);
        self.persist();
    }

    //
    // ─── OBSERVATION ───────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn status(&self) -> &SubmissionStatus {
        self.submission.status()
    }

    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.writer.is_some()
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.state.current_index()
    }

    #[must_use]
    pub fn current_question(&self) -> &Question {
        self.state.current_question()
    }

    #[must_use]
    pub fn is_answered(&self, index: usize) -> bool {
        self.state.is_answered(index)
    }

    #[must_use]
    pub fn selected_option(&self, index: usize) -> Option<usize> {
        self.state.selected_option(index)
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        self.state.progress()
    }

    #[must_use]
    pub fn elapsed_secs(&self) -> u64 {
        self.state.elapsed_secs(self.clock.now())
    }

    #[must_use]
    pub fn remaining_secs(&self) -> Option<u64> {
        self.state.remaining_secs(self.clock.now())
    }

    #[must_use]
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.state.deadline()
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.state.is_expired(self.clock.now())
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    /// A display-side handle on the timer.
    #[must_use]
    pub fn timer_watch(&self) -> TimerWatch {
        TimerWatch::new(
            self.timer_tx.subscribe(),
            self.clock.clone(),
            self.state.time_limit_secs(),
        )
    }

    //
    // ─── NAVIGATION ────────────────────────────────────────────────────────────
    //

    pub fn next(&mut self) -> bool {
        let moved = self.state.next();
        if moved {
            self.persist();
        }
        moved
    }

    pub fn prev(&mut self) -> bool {
        let moved = self.state.prev();
        if moved {
            self.persist();
        }
        moved
    }

    /// # Errors
    ///
    /// Returns `QuizSessionError::Session` for an index outside the question range.
    pub fn jump_to(&mut self, index: usize) -> Result<(), QuizSessionError> {
        let before = self.state.current_index();
        self.state.jump_to(index)?;
        if before != index {
            tracing::debug!(from = before, to = index, "jumped");
            self.persist();
        }
        Ok(())
    }

    //
    // ─── ANSWERS ───────────────────────────────────────────────────────────────
    //

    /// Lock `option` in as the answer for question `index`.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::Finished` once the session has been scored,
    /// or `QuizSessionError::Session` for invalid indices.
    pub fn select(&mut self, index: usize, option: usize) -> Result<Selection, QuizSessionError> {
        if self.status().is_succeeded() {
            return Err(QuizSessionError::Finished);
        }
        let selection = self.state.select(index, option)?;
        match &selection {
            Selection::Recorded(answer) => {
                tracing::debug!(
                    index,
                    question_id = %answer.question_id,
                    option,
                    "answer recorded"
                );
                self.persist();
            }
            Selection::AlreadyAnswered(answer) => {
                tracing::debug!(
                    index,
                    kept = answer.selected_option_index,
                    "question already answered"
                );
            }
        }
        Ok(selection)
    }

    /// # Errors
    ///
    /// See [`QuizSession::select`].
    pub fn select_current(&mut self, option: usize) -> Result<Selection, QuizSessionError> {
        self.select(self.state.current_index(), option)
    }

    //
    // ─── SUBMISSION ────────────────────────────────────────────────────────────
    //

    /// Synchronous first half of a submission: freezes the timer and
    /// captures the payload. The session stays usable while the caller
    /// sends `PendingSubmission` and later reports back via `finish_submit`.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::Submit` with `InvalidState` if a submission
    /// is in flight, already succeeded, or the session has no id.
    pub fn begin_submit(&mut self) -> Result<PendingSubmission, QuizSessionError> {
        let pending = self.submission.begin(&mut self.state, self.clock.now())?;
        self.publish_timer();
        self.persist();
        Ok(pending)
    }

    /// Second half of a submission.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::Submit` if the remote call failed (timer
    /// resumed, retry allowed) or no submission was in flight.
    pub fn finish_submit(
        &mut self,
        outcome: Result<ScoreResult, ApiError>,
    ) -> Result<ScoreResult, QuizSessionError> {
        let finished = self
            .submission
            .finish(&mut self.state, outcome, self.clock.now());
        self.publish_timer();

        match (&finished, &self.writer) {
            (Ok(_), Some(writer)) => writer.clear(),
            (Err(_), _) => self.persist(),
            (Ok(_), None) => {}
        }

        finished.map_err(QuizSessionError::from)
    }

    /// Submit and wait for the result.
    ///
    /// # Errors
    ///
    /// See [`QuizSession::begin_submit`] and [`QuizSession::finish_submit`].
    pub async fn submit(
        &mut self,
        scoring: &dyn ScoringService,
    ) -> Result<ScoreResult, QuizSessionError> {
        let pending = self.begin_submit()?;
        let outcome = scoring
            .submit(&pending.session_id, &pending.request)
            .await;
        self.finish_submit(outcome)
    }

    /// Submit only if a time-boxed session has run out of time and nothing
    /// is in flight or already scored.
    pub async fn submit_if_expired(
        &mut self,
        scoring: &dyn ScoringService,
    ) -> Option<Result<ScoreResult, QuizSessionError>> {
        let idle = matches!(
            self.status(),
            SubmissionStatus::Idle | SubmissionStatus::Failed { .. }
        );
        if !idle || !self.is_expired() {
            return None;
        }
        tracing::info!("time limit reached; submitting");
        Some(self.submit(scoring).await)
    }

    /// Wait for queued persistence writes to land. No-op when not persisted.
    pub async fn flush(&self) {
        if let Some(writer) = &self.writer {
            writer.flush().await;
        }
    }

    fn persist(&self) {
        if self.status().is_succeeded() {
            return;
        }
        if let Some(writer) = &self.writer {
            writer.save(self.state.snapshot());
        }
    }

    fn publish_timer(&self) {
        self.timer_tx.send_replace(self.state.timer());
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("status", self.submission.status())
            .field("persisted", &self.writer.is_some())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quiz_core::model::{QuestionDraft, SessionId};
    use quiz_core::time::{fixed_clock, fixed_now};
    use storage::repository::Storage;

    fn started(n: usize, limit: Option<u64>) -> StartedSession {
        StartedSession {
            session_id: SessionId::new("s-42"),
            questions: (0..n)
                .map(|i| {
                    QuestionDraft::new(format!("q{i}"), "?", vec!["a".into(), "b".into()])
                        .validate()
                        .unwrap()
                })
                .collect(),
            time_limit_seconds: limit,
        }
    }

    fn down() -> ApiError {
        ApiError::Transport("offline".into())
    }

    #[test]
    fn browsing_continues_while_submission_is_in_flight() {
        let (clock, handle) = Clock::manual(fixed_now());
        let mut session =
            QuizSession::from_started(SessionKind::Quiz, started(3, None), clock).unwrap();
        session.select(0, 1).unwrap();
        handle.advance(Duration::seconds(12));

        let pending = session.begin_submit().unwrap();
        assert_eq!(pending.request.time_spent, 12);

        assert!(session.next());
        session.jump_to(2).unwrap();
        assert!(session.select(1, 0).unwrap().is_recorded());
        assert!(matches!(
            session.begin_submit(),
            Err(QuizSessionError::Submit(_))
        ));

        handle.advance(Duration::seconds(8));
        assert!(session.finish_submit(Err(down())).is_err());
        assert_eq!(session.elapsed_secs(), 12);
        assert_eq!(session.progress().answered, 2);
    }

    #[test]
    fn timer_watch_sees_freeze_and_resume() {
        let (clock, handle) = Clock::manual(fixed_now());
        let mut session =
            QuizSession::from_started(SessionKind::Quiz, started(1, Some(60)), clock).unwrap();
        let watch = session.timer_watch();
        handle.advance(Duration::seconds(5));
        assert_eq!(watch.elapsed_secs(), 5);
        assert_eq!(watch.remaining_secs(), Some(55));

        session.begin_submit().unwrap();
        assert!(!watch.is_running());
        handle.advance(Duration::seconds(3));
        assert_eq!(watch.elapsed_secs(), 5);

        session.finish_submit(Err(down())).unwrap_err();
        assert!(watch.is_running());
        assert_eq!(watch.elapsed_secs(), 5);
    }

    #[tokio::test]
    async fn timer_watch_is_notified_of_each_transition() {
        let (clock, handle) = Clock::manual(fixed_now());
        let mut session =
            QuizSession::from_started(SessionKind::Quiz, started(2, Some(90)), clock).unwrap();
        assert_eq!(session.kind(), SessionKind::Quiz);
        let mut watch = session.timer_watch();
        assert_eq!(watch.deadline(), Some(fixed_now() + Duration::seconds(90)));
        assert_eq!(session.deadline(), watch.deadline());

        handle.advance(Duration::seconds(10));
        session.begin_submit().unwrap();
        assert!(watch.changed().await);
        assert_eq!(watch.state(), TimerState::Frozen { elapsed_secs: 10 });
        assert_eq!(watch.deadline(), None);

        handle.advance(Duration::seconds(4));
        session.finish_submit(Err(down())).unwrap_err();
        assert!(watch.changed().await);
        assert!(watch.is_running());
        assert_eq!(
            watch.deadline(),
            Some(fixed_now() + Duration::seconds(94))
        );

        drop(session);
        assert!(!watch.changed().await);
    }

    #[test]
    fn progress_reports_when_every_question_is_answered() {
        let mut session =
            QuizSession::from_started(SessionKind::Quiz, started(2, None), fixed_clock())
                .unwrap();
        session.select(0, 0).unwrap();
        assert!(!session.progress().all_answered());
        session.select(1, 1).unwrap();
        assert!(session.progress().all_answered());
    }

    #[test]
    fn scored_session_rejects_new_answers() {
        let mut session =
            QuizSession::from_started(SessionKind::Quiz, started(2, None), fixed_clock())
                .unwrap();
        session.begin_submit().unwrap();
        session
            .finish_submit(Ok(ScoreResult {
                score: 0.0,
                total: 2,
                time_spent: 0,
                extra: serde_json::Map::new(),
            }))
            .unwrap();
        assert!(matches!(
            session.select(0, 0),
            Err(QuizSessionError::Finished)
        ));
        assert!(session.next());
    }

    #[tokio::test]
    async fn persisted_session_writes_snapshots_and_clears_on_success() {
        let storage = Storage::in_memory();
        let store = storage.sessions();
        let kind = SessionKind::ComprehensiveTest;
        let mut session =
            QuizSession::from_started(kind, started(3, Some(600)), fixed_clock()).unwrap();
        session.attach_store(store.clone());
        assert!(session.is_persisted());

        session.select(0, 1).unwrap();
        session.next();
        session.flush().await;
        let saved = store.load(kind).await.unwrap().expect("snapshot saved");
        assert_eq!(saved, session.snapshot());
        assert_eq!(saved.current_index, 1);

        session.begin_submit().unwrap();
        session
            .finish_submit(Ok(ScoreResult {
                score: 1.0,
                total: 3,
                time_spent: 0,
                extra: serde_json::Map::new(),
            }))
            .unwrap();
        session.next();
        session.flush().await;
        assert!(store.load(kind).await.unwrap().is_none());
    }

    #[test]
    fn attaching_a_store_outside_a_runtime_keeps_the_session_in_memory() {
        let store = Storage::in_memory().sessions();
        let mut session = QuizSession::from_started(
            SessionKind::ComprehensiveTest,
            started(2, Some(60)),
            fixed_clock(),
        )
        .unwrap();
        session.attach_store(store);
        assert!(!session.is_persisted());
        assert!(session.select(0, 1).unwrap().is_recorded());
    }

    #[tokio::test]
    async fn quiz_kind_is_never_persisted() {
        let store = Storage::in_memory().sessions();
        let mut session =
            QuizSession::from_started(SessionKind::Quiz, started(2, None), fixed_clock())
                .unwrap();
        session.attach_store(store.clone());
        session.select(0, 0).unwrap();
        session.flush().await;
        assert!(!session.is_persisted());
        assert!(store.load(SessionKind::Quiz).await.unwrap().is_none());
    }
}
