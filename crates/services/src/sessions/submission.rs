use chrono::{DateTime, Utc};

use quiz_core::model::{SessionId, SessionState};

use crate::Clock;
use crate::error::{ApiError, InvalidSubmit, SubmitError};
use crate::remote::{ScoreResult, ScoringService, SubmitRequest};

/// Where a session is in its submission lifecycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SubmissionStatus {
    #[default]
    Idle,
    /// A request carrying `time_spent` is in flight.
    Submitting { time_spent: u64 },
    /// Scored; the timer stays frozen for good.
    Succeeded(ScoreResult),
    /// The last attempt failed; the timer was resumed and a retry is allowed.
    Failed { message: String, time_spent: u64 },
}

impl SubmissionStatus {
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        matches!(self, Self::Submitting { .. })
    }

    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    #[must_use]
    pub fn result(&self) -> Option<&ScoreResult> {
        match self {
            Self::Succeeded(result) => Some(result),
            _ => None,
        }
    }
}

/// Request captured by `SubmissionController::begin`, ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSubmission {
    pub session_id: SessionId,
    pub request: SubmitRequest,
}

/// State machine `Idle | Submitting | Succeeded | Failed` for one session.
///
/// The synchronous halves (`begin`, `finish`) are separate from the network
/// call so the owner can keep mutating the session while a request is out.
#[derive(Debug, Clone, Default)]
pub struct SubmissionController {
    status: SubmissionStatus,
}

impl SubmissionController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn status(&self) -> &SubmissionStatus {
        &self.status
    }

    /// Validate, freeze the timer and capture the payload.
    ///
    /// Allowed from `Idle` and `Failed`. On rejection nothing is frozen.
    ///
    /// # Errors
    ///
    /// Returns `SubmitError::InvalidState` while a submission is in flight,
    /// after success, or when the session has no id.
    pub fn begin(
        &mut self,
        state: &mut SessionState,
        now: DateTime<Utc>,
    ) -> Result<PendingSubmission, SubmitError> {
        match self.status {
            SubmissionStatus::Submitting { .. } => {
                return Err(SubmitError::InvalidState(InvalidSubmit::AlreadySubmitting));
            }
            SubmissionStatus::Succeeded(_) => {
                return Err(SubmitError::InvalidState(InvalidSubmit::AlreadySucceeded));
            }
            SubmissionStatus::Idle | SubmissionStatus::Failed { .. } => {}
        }

        let session_id = state
            .session_id()
            .cloned()
            .ok_or(SubmitError::InvalidState(InvalidSubmit::MissingSessionId))?;

        let time_spent = state.freeze_timer(now);
        let request = SubmitRequest::from_state(state, time_spent);
        self.status = SubmissionStatus::Submitting { time_spent };
        tracing::info!(
            %session_id,
            time_spent,
            answers = request.answers.len(),
            "submitting session"
        );

        Ok(PendingSubmission {
            session_id,
            request,
        })
    }

    /// Apply the outcome of the in-flight request.
    ///
    /// Success keeps the timer frozen. Failure resumes the timer from the
    /// frozen value at `now`, so the time the failed call took is not
    /// charged to the user.
    ///
    /// # Errors
    ///
    /// Returns `SubmitError::Failed` carrying the remote error, or
    /// `SubmitError::InvalidState` if no submission is in flight.
    pub fn finish(
        &mut self,
        state: &mut SessionState,
        outcome: Result<ScoreResult, ApiError>,
        now: DateTime<Utc>,
    ) -> Result<ScoreResult, SubmitError> {
        let SubmissionStatus::Submitting { time_spent } = self.status else {
            return Err(SubmitError::InvalidState(InvalidSubmit::NotSubmitting));
        };

        match outcome {
            Ok(result) => {
                tracing::info!(score = result.score, total = result.total, "session scored");
                self.status = SubmissionStatus::Succeeded(result.clone());
                Ok(result)
            }
            Err(source) => {
                state.resume_timer(now);
                let message = source.user_message();
                tracing::warn!(error = %source, time_spent, "submission failed; timer resumed");
                self.status = SubmissionStatus::Failed {
                    message: message.clone(),
                    time_spent,
                };
                Err(SubmitError::Failed { message, source })
            }
        }
    }

    /// `begin`, call the scoring service, then `finish`.
    ///
    /// # Errors
    ///
    /// See [`SubmissionController::begin`] and [`SubmissionController::finish`].
    pub async fn submit(
        &mut self,
        state: &mut SessionState,
        scoring: &dyn ScoringService,
        clock: &Clock,
    ) -> Result<ScoreResult, SubmitError> {
        let pending = self.begin(state, clock.now())?;
        let outcome = scoring.submit(&pending.session_id, &pending.request).await;
        self.finish(state, outcome, clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use quiz_core::model::QuestionDraft;
    use quiz_core::time::{fixed_now, ManualClock};
    use std::sync::Mutex;

    /// Scripted scorer: pops outcomes in order, records requests and
    /// advances a manual clock to simulate network latency.
    struct ScriptedScorer {
        outcomes: Mutex<Vec<Result<ScoreResult, ApiError>>>,
        seen: Mutex<Vec<SubmitRequest>>,
        latency: Option<(ManualClock, Duration)>,
    }

    impl ScriptedScorer {
        fn new(mut outcomes: Vec<Result<ScoreResult, ApiError>>) -> Self {
            outcomes.reverse();
            Self {
                outcomes: Mutex::new(outcomes),
                seen: Mutex::new(Vec::new()),
                latency: None,
            }
        }

        fn with_latency(mut self, clock: ManualClock, latency: Duration) -> Self {
            self.latency = Some((clock, latency));
            self
        }

        fn times_reported(&self) -> Vec<u64> {
            self.seen.lock().unwrap().iter().map(|r| r.time_spent).collect()
        }
    }

    #[async_trait]
    impl ScoringService for ScriptedScorer {
        async fn submit(
            &self,
            _session_id: &SessionId,
            request: &SubmitRequest,
        ) -> Result<ScoreResult, ApiError> {
            self.seen.lock().unwrap().push(request.clone());
            if let Some((clock, latency)) = &self.latency {
                clock.advance(*latency);
            }
            self.outcomes
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(ApiError::Transport("no scripted outcome".into())))
        }
    }

    fn score(time_spent: u64) -> ScoreResult {
        ScoreResult {
            score: 1.0,
            total: 3,
            time_spent,
            extra: serde_json::Map::new(),
        }
    }

    fn down() -> ApiError {
        ApiError::Status {
            status: 503,
            message: "scoring is down".into(),
        }
    }

    fn build_state(session_id: Option<&str>) -> SessionState {
        let questions = (0..3)
            .map(|i| {
                QuestionDraft::new(format!("q{i}"), "?", vec!["a".into(), "b".into(), "c".into()])
                    .validate()
                    .unwrap()
            })
            .collect();
        SessionState::new(session_id.map(SessionId::new), questions, None, fixed_now()).unwrap()
    }

    #[test]
    fn begin_freezes_timer_and_rejects_reentry() {
        let mut state = build_state(Some("s-1"));
        let mut controller = SubmissionController::new();
        let at = fixed_now() + Duration::seconds(42);

        let pending = controller.begin(&mut state, at).unwrap();
        assert_eq!(pending.request.time_spent, 42);
        assert!(!state.timer().is_running());
        assert!(controller.status().is_submitting());

        let err = controller.begin(&mut state, at + Duration::seconds(5)).unwrap_err();
        assert!(matches!(
            err,
            SubmitError::InvalidState(InvalidSubmit::AlreadySubmitting)
        ));
        assert_eq!(state.elapsed_secs(at + Duration::seconds(5)), 42);
    }

    #[test]
    fn missing_session_id_is_rejected_without_freezing() {
        let mut state = build_state(None);
        let mut controller = SubmissionController::new();
        let err = controller.begin(&mut state, fixed_now()).unwrap_err();
        assert!(matches!(
            err,
            SubmitError::InvalidState(InvalidSubmit::MissingSessionId)
        ));
        assert!(state.timer().is_running());
        assert_eq!(controller.status(), &SubmissionStatus::Idle);
    }

    #[test]
    fn finish_without_begin_is_invalid() {
        let mut state = build_state(Some("s-1"));
        let mut controller = SubmissionController::new();
        let err = controller
            .finish(&mut state, Ok(score(0)), fixed_now())
            .unwrap_err();
        assert!(matches!(
            err,
            SubmitError::InvalidState(InvalidSubmit::NotSubmitting)
        ));
    }

    #[tokio::test]
    async fn failed_submit_resumes_timer_without_charging_latency() {
        let (clock, handle) = Clock::manual(fixed_now());
        let mut state = build_state(Some("s-1"));
        handle.advance(Duration::seconds(42));

        let scorer = ScriptedScorer::new(vec![Err(down()), Err(down())])
            .with_latency(handle.clone(), Duration::seconds(10));
        let mut controller = SubmissionController::new();

        let err = controller.submit(&mut state, &scorer, &clock).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(state.timer().is_running());
        assert_eq!(state.elapsed_secs(clock.now()), 42);
        assert_eq!(
            controller.status(),
            &SubmissionStatus::Failed {
                message: "scoring is down".into(),
                time_spent: 42
            }
        );

        controller.submit(&mut state, &scorer, &clock).await.unwrap_err();
        assert_eq!(scorer.times_reported(), vec![42, 42]);
    }

    #[tokio::test]
    async fn success_keeps_timer_frozen_and_blocks_resubmission() {
        let (clock, handle) = Clock::manual(fixed_now());
        let mut state = build_state(Some("s-1"));
        state.select(0, 2).unwrap();
        handle.advance(Duration::seconds(30));

        let scorer = ScriptedScorer::new(vec![Ok(score(30))]);
        let mut controller = SubmissionController::new();
        let result = controller.submit(&mut state, &scorer, &clock).await.unwrap();
        assert_eq!(result.time_spent, 30);
        assert_eq!(controller.status().result(), Some(&result));

        handle.advance(Duration::minutes(5));
        assert_eq!(state.elapsed_secs(clock.now()), 30);

        let err = controller.submit(&mut state, &scorer, &clock).await.unwrap_err();
        assert!(matches!(
            err,
            SubmitError::InvalidState(InvalidSubmit::AlreadySucceeded)
        ));
    }

    #[tokio::test]
    async fn retry_after_user_keeps_working_reports_fresh_time() {
        let (clock, handle) = Clock::manual(fixed_now());
        let mut state = build_state(Some("s-1"));
        handle.advance(Duration::seconds(20));

        let scorer = ScriptedScorer::new(vec![Err(down()), Ok(score(35))]);
        let mut controller = SubmissionController::new();
        controller.submit(&mut state, &scorer, &clock).await.unwrap_err();

        handle.advance(Duration::seconds(15));
        controller.submit(&mut state, &scorer, &clock).await.unwrap();
        assert_eq!(scorer.times_reported(), vec![20, 35]);
    }
}
