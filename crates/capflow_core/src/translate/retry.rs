//! Per-request retry/backoff state machine.
//!
//! The controller never sleeps: it computes the delay and the caller waits.
//! That keeps the state machine testable without a clock.

use std::time::Duration;

use serde::Serialize;

use crate::config::TranslationSettings;
use crate::models::{RejectReason, TranslationOutcome, TranslationRequest};

/// Retry budget and linear backoff step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Delay step; the wait after attempt `n` is `base_delay * n`.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn from_settings(settings: &TranslationSettings) -> Self {
        Self::new(settings.max_retries, settings.base_delay())
    }

    /// Delay before the attempt following attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Upper bound on attempts for one request.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&TranslationSettings::default())
    }
}

/// State of one translation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RequestState {
    Pending,
    InFlight,
    /// Waiting `delay` before the next attempt.
    Retrying { delay: Duration },
    Succeeded,
    Rejected(RejectReason),
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Succeeded | RequestState::Rejected(_))
    }
}

/// Error for transitions the state machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("batch {batch_id}: cannot {action} while {state:?}")]
pub struct TransitionError {
    pub batch_id: usize,
    pub action: &'static str,
    pub state: RequestState,
}

/// Drives one [`TranslationRequest`] from `Pending` to a terminal state.
#[derive(Debug, Clone)]
pub struct RetryController {
    request: TranslationRequest,
    policy: RetryPolicy,
    state: RequestState,
    delays: Vec<Duration>,
    translations: Option<Vec<String>>,
}

impl RetryController {
    pub fn new(request: TranslationRequest, policy: RetryPolicy) -> Self {
        Self {
            request,
            policy,
            state: RequestState::Pending,
            delays: Vec::new(),
            translations: None,
        }
    }

    pub fn request(&self) -> &TranslationRequest {
        &self.request
    }

    pub fn state(&self) -> &RequestState {
        &self.state
    }

    /// Delays computed so far, in order.
    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    pub fn attempts(&self) -> u32 {
        self.request.attempt_count
    }

    /// Translated texts once `Succeeded`.
    pub fn translations(&self) -> Option<&[String]> {
        self.translations.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// `Pending`/`Retrying` → `InFlight`. Increments the attempt count.
    pub fn begin_attempt(&mut self) -> Result<u32, TransitionError> {
        match self.state {
            RequestState::Pending | RequestState::Retrying { .. } => {
                self.request.attempt_count += 1;
                self.state = RequestState::InFlight;
                Ok(self.request.attempt_count)
            }
            _ => Err(self.transition_error("begin attempt")),
        }
    }

    /// Apply the outcome of the in-flight attempt and return the new state.
    pub fn on_outcome(
        &mut self,
        outcome: TranslationOutcome,
    ) -> Result<&RequestState, TransitionError> {
        if self.state != RequestState::InFlight {
            return Err(self.transition_error("record outcome"));
        }

        self.state = match outcome {
            TranslationOutcome::Success(texts) => {
                self.translations = Some(texts);
                RequestState::Succeeded
            }
            TranslationOutcome::PermanentReject(reason) => {
                self.request.last_failure = Some(reason);
                RequestState::Rejected(RejectReason::PermanentlyBlocked)
            }
            TranslationOutcome::TransientFailure(reason) => {
                self.request.last_failure = Some(reason);
                let attempt = self.request.attempt_count;
                if attempt <= self.policy.max_retries {
                    let delay = self.policy.delay_for(attempt);
                    self.delays.push(delay);
                    RequestState::Retrying { delay }
                } else {
                    RequestState::Rejected(RejectReason::RetriesExhausted)
                }
            }
        };

        Ok(&self.state)
    }

    /// Stop a non-terminal request. Terminal states are left untouched.
    pub fn cancel(&mut self) {
        if !self.is_terminal() {
            self.state = RequestState::Rejected(RejectReason::Cancelled);
        }
    }

    /// Reject a request that was never dispatched because the translator is
    /// unavailable. Reported as an infrastructure failure.
    pub fn reject_unavailable(&mut self, reason: impl Into<String>) {
        if !self.is_terminal() {
            self.request.last_failure = Some(reason.into());
            self.state = RequestState::Rejected(RejectReason::RetriesExhausted);
        }
    }

    /// Consume the controller, returning the request and its final translations.
    pub fn into_parts(self) -> (TranslationRequest, RequestState, Option<Vec<String>>) {
        (self.request, self.state, self.translations)
    }

    fn transition_error(&self, action: &'static str) -> TransitionError {
        TransitionError {
            batch_id: self.request.batch_id,
            action,
            state: self.state.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> RetryController {
        let request = TranslationRequest::new(0, vec!["hello".into()], "pt-BR");
        RetryController::new(request, RetryPolicy::new(3, Duration::from_secs(5)))
    }

    #[test]
    fn transient_failures_back_off_linearly_then_exhaust() {
        let mut ctl = controller();

        loop {
            ctl.begin_attempt().unwrap();
            let state = ctl
                .on_outcome(TranslationOutcome::transient("timeout"))
                .unwrap()
                .clone();
            if state.is_terminal() {
                assert_eq!(state, RequestState::Rejected(RejectReason::RetriesExhausted));
                break;
            }
        }

        let secs: Vec<u64> = ctl.delays().iter().map(|d| d.as_secs()).collect();
        assert_eq!(secs, vec![5, 10, 15]);
        assert_eq!(ctl.attempts(), 4);
        assert_eq!(ctl.request().last_failure.as_deref(), Some("timeout"));
    }

    #[test]
    fn permanent_reject_takes_one_attempt() {
        let mut ctl = controller();
        ctl.begin_attempt().unwrap();
        let state = ctl
            .on_outcome(TranslationOutcome::permanent("PROHIBITED_CONTENT"))
            .unwrap();

        assert_eq!(*state, RequestState::Rejected(RejectReason::PermanentlyBlocked));
        assert_eq!(ctl.attempts(), 1);
        assert!(ctl.delays().is_empty());
        assert!(ctl.begin_attempt().is_err());
    }

    #[test]
    fn success_after_retry_keeps_attempt_count() {
        let mut ctl = controller();
        ctl.begin_attempt().unwrap();
        ctl.on_outcome(TranslationOutcome::transient("429")).unwrap();
        ctl.begin_attempt().unwrap();
        ctl.on_outcome(TranslationOutcome::Success(vec!["olá".into()]))
            .unwrap();

        assert_eq!(*ctl.state(), RequestState::Succeeded);
        assert_eq!(ctl.attempts(), 2);
        assert_eq!(ctl.translations(), Some(&["olá".to_string()][..]));
    }

    #[test]
    fn outcome_without_attempt_is_rejected() {
        let mut ctl = controller();
        let err = ctl
            .on_outcome(TranslationOutcome::Success(vec![]))
            .unwrap_err();
        assert_eq!(err.state, RequestState::Pending);
    }

    #[test]
    fn zero_retries_rejects_on_first_transient() {
        let request = TranslationRequest::new(1, vec!["a".into()], "pt-BR");
        let mut ctl = RetryController::new(request, RetryPolicy::new(0, Duration::from_secs(5)));
        ctl.begin_attempt().unwrap();
        let state = ctl.on_outcome(TranslationOutcome::transient("503")).unwrap();
        assert_eq!(*state, RequestState::Rejected(RejectReason::RetriesExhausted));
    }

    #[test]
    fn cancel_keeps_success() {
        let mut ctl = controller();
        ctl.begin_attempt().unwrap();
        ctl.on_outcome(TranslationOutcome::Success(vec!["x".into()]))
            .unwrap();
        ctl.cancel();
        assert_eq!(*ctl.state(), RequestState::Succeeded);

        let mut pending = controller();
        pending.cancel();
        assert_eq!(*pending.state(), RequestState::Rejected(RejectReason::Cancelled));
    }

    #[test]
    fn unavailable_translator_exhausts_without_attempts() {
        let mut ctl = controller();
        ctl.reject_unavailable("gemini unavailable");

        assert_eq!(*ctl.state(), RequestState::Rejected(RejectReason::RetriesExhausted));
        assert_eq!(ctl.attempts(), 0);
        assert_eq!(ctl.request().last_failure.as_deref(), Some("gemini unavailable"));
        assert!(ctl.begin_attempt().is_err());
    }
}
