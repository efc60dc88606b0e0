use std::sync::Arc;

use quiz_core::model::{SessionKind, SessionState};
use storage::repository::SessionStore;

use super::quiz_session::QuizSession;
use crate::Clock;
use crate::config::ApiConfig;
use crate::error::{ApiError, QuizSessionError};
use crate::remote::{HttpQuizApi, ScoreResult, ScoringService, SessionStarter, StartRequest};

/// Starts, resumes and submits quiz sessions.
///
/// Owns the time source and the remote collaborators so callers only deal
/// with `QuizSession` values.
#[derive(Clone)]
pub struct QuizService {
    clock: Clock,
    starter: Arc<dyn SessionStarter>,
    scoring: Arc<dyn ScoringService>,
    sessions: Option<SessionStore>,
}

impl QuizService {
    #[must_use]
    pub fn new(
        clock: Clock,
        starter: Arc<dyn SessionStarter>,
        scoring: Arc<dyn ScoringService>,
    ) -> Self {
        Self {
            clock,
            starter,
            scoring,
            sessions: None,
        }
    }

    /// Use one HTTP client for both starting and scoring.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the HTTP client cannot be built.
    pub fn http(config: ApiConfig, clock: Clock) -> Result<Self, ApiError> {
        let api = Arc::new(HttpQuizApi::new(config)?);
        Ok(Self::new(clock, api.clone(), api))
    }

    /// Persist resumable sessions through `sessions`.
    #[must_use]
    pub fn with_store(mut self, sessions: SessionStore) -> Self {
        self.sessions = Some(sessions);
        self
    }

    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Start a new session. A comprehensive test replaces any persisted one.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError` if the remote call fails or returns no questions.
    pub async fn start_session(
        &self,
        request: &StartRequest,
    ) -> Result<QuizSession, QuizSessionError> {
        let started = self.starter.start(request).await?;
        let mut session = QuizSession::from_started(request.kind, started, self.clock.clone())?;
        if let Some(store) = &self.sessions {
            session.attach_store(store.clone());
        }
        Ok(session)
    }

    /// Reload the persisted comprehensive test, if any.
    ///
    /// A snapshot taken mid-submission has a frozen timer; it is resumed
    /// from the frozen value, so time the app spent closed is not charged.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::Storage` on read failures and
    /// `QuizSessionError::Snapshot` if the stored session is inconsistent.
    pub async fn resume_persisted(&self) -> Result<Option<QuizSession>, QuizSessionError> {
        let kind = SessionKind::ComprehensiveTest;
        let Some(store) = &self.sessions else {
            return Ok(None);
        };
        let Some(snapshot) = store.load(kind).await? else {
            return Ok(None);
        };

        let mut state = SessionState::restore(snapshot)?;
        if !state.timer().is_running() {
            state.resume_timer(self.clock.now());
        }
        tracing::info!(
            session_id = ?state.session_id(),
            answered = state.answered_count(),
            index = state.current_index(),
            "resumed persisted session"
        );

        let mut session = QuizSession::new(kind, state, self.clock.clone());
        session.attach_store(store.clone());
        Ok(Some(session))
    }

    /// Forget the persisted comprehensive test.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::Storage` on write failures.
    pub async fn discard_persisted(&self) -> Result<(), QuizSessionError> {
        if let Some(store) = &self.sessions {
            store.clear(SessionKind::ComprehensiveTest).await?;
        }
        Ok(())
    }

    /// Submit `session` to the scoring service.
    ///
    /// # Errors
    ///
    /// See [`QuizSession::submit`].
    pub async fn submit(&self, session: &mut QuizSession) -> Result<ScoreResult, QuizSessionError> {
        session.submit(self.scoring.as_ref()).await
    }

    /// Submit `session` if its time limit has passed.
    pub async fn submit_if_expired(
        &self,
        session: &mut QuizSession,
    ) -> Option<Result<ScoreResult, QuizSessionError>> {
        session.submit_if_expired(self.scoring.as_ref()).await
    }
}
