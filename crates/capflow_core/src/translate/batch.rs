//! Batch translation controller.
//!
//! Splits retained segment texts into contiguous batches, drives each one
//! through its own [`RetryController`] and merges the results back into
//! segment order. A rejected batch never aborts its siblings.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::limiter::InFlightLimiter;
use super::retry::{RequestState, RetryController, RetryPolicy};
use crate::config::TranslationSettings;
use crate::models::{RejectReason, TranslationOutcome, TranslationRequest};

/// Translation service collaborator.
///
/// Implementations must keep content-policy rejections
/// ([`TranslationOutcome::PermanentReject`]) apart from retry-worthy
/// failures.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Capability probe, checked once before a run's batches are
    /// dispatched. Must not fail.
    async fn is_available(&self) -> bool;

    /// Translate one batch. Output order must match input order.
    async fn translate(&self, texts: &[String], target_language: &str) -> TranslationOutcome;
}

/// Split texts into contiguous requests of at most `batch_size` texts.
pub fn partition_batches(
    texts: &[String],
    batch_size: usize,
    target_language: &str,
) -> Vec<TranslationRequest> {
    texts
        .chunks(batch_size.max(1))
        .enumerate()
        .map(|(batch_id, chunk)| TranslationRequest::new(batch_id, chunk.to_vec(), target_language))
        .collect()
}

/// Terminal result of one batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub batch_id: usize,
    /// Index of the batch's first text in the input.
    pub first_index: usize,
    pub request: TranslationRequest,
    pub state: RequestState,
    pub translations: Option<Vec<String>>,
    /// Backoff delays waited before retries.
    pub delays: Vec<Duration>,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.request.len()
    }

    pub fn is_empty(&self) -> bool {
        self.request.is_empty()
    }

    pub fn succeeded(&self) -> bool {
        self.state == RequestState::Succeeded
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self.state {
            RequestState::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Translation for one input text after merging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedTranslation {
    /// `None` when the batch was rejected.
    pub text: Option<String>,
    pub rejection: Option<RejectReason>,
}

/// All batch results of one run, ordered by batch id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchRun {
    pub batches: Vec<BatchResult>,
}

impl BatchRun {
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn succeeded_batches(&self) -> usize {
        self.batches.iter().filter(|b| b.succeeded()).count()
    }

    pub fn rejected_batches(&self, reason: RejectReason) -> usize {
        self.batches
            .iter()
            .filter(|b| b.reject_reason() == Some(reason))
            .count()
    }

    /// One entry per input text, in input order.
    pub fn merged(&self) -> Vec<MergedTranslation> {
        let mut merged = Vec::new();
        for batch in &self.batches {
            match (&batch.translations, batch.reject_reason()) {
                (Some(texts), _) => merged.extend(texts.iter().map(|t| MergedTranslation {
                    text: Some(t.clone()),
                    rejection: None,
                })),
                (None, reason) => merged.extend((0..batch.len()).map(|_| MergedTranslation {
                    text: None,
                    rejection: reason,
                })),
            }
        }
        merged
    }
}

/// Tunables for [`BatchTranslator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub batch_size: usize,
    pub max_in_flight: usize,
    pub attempt_timeout: Duration,
    pub policy: RetryPolicy,
}

impl BatchOptions {
    pub fn from_settings(settings: &TranslationSettings) -> Self {
        Self {
            batch_size: settings.batch_size.max(1),
            max_in_flight: settings.max_in_flight_batches.max(1),
            attempt_timeout: settings.attempt_timeout(),
            policy: RetryPolicy::from_settings(settings),
        }
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::from_settings(&TranslationSettings::default())
    }
}

/// Drives batches of one run through the translation collaborator.
#[derive(Clone)]
pub struct BatchTranslator {
    translator: Arc<dyn Translator>,
    limiter: InFlightLimiter,
    options: BatchOptions,
}

impl BatchTranslator {
    pub fn new(translator: Arc<dyn Translator>, limiter: InFlightLimiter, options: BatchOptions) -> Self {
        Self {
            translator,
            limiter,
            options,
        }
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Translate every text, reporting each finished batch.
    ///
    /// `on_batch` receives the finished batch plus (finished, total) counts.
    /// Cancellation stops new attempts; batches that already succeeded are
    /// kept and the rest end as `Rejected(Cancelled)`. When the translator
    /// reports itself unavailable nothing is dispatched and every batch ends
    /// as `Rejected(RetriesExhausted)`.
    pub async fn translate_all<F>(
        &self,
        texts: &[String],
        target_language: &str,
        cancel: &CancellationToken,
        on_batch: F,
    ) -> BatchRun
    where
        F: Fn(&BatchResult, usize, usize) + Sync,
    {
        let requests = partition_batches(texts, self.options.batch_size, target_language);
        let total = requests.len();
        let finished = AtomicUsize::new(0);

        tracing::debug!(
            "[Translate] {} texts in {} batches (max {} in flight)",
            texts.len(),
            total,
            self.options.max_in_flight
        );

        let mut first_index = 0;
        let jobs: Vec<(usize, TranslationRequest)> = requests
            .into_iter()
            .map(|request| {
                let start = first_index;
                first_index += request.len();
                (start, request)
            })
            .collect();

        if !jobs.is_empty() && !self.translator_available(cancel).await {
            tracing::warn!(
                "[Translate] {} unavailable; rejecting {} batches",
                self.translator.name(),
                total
            );
            let reason = format!("{} unavailable", self.translator.name());
            let batches = jobs
                .into_iter()
                .enumerate()
                .map(|(index, (start, request))| {
                    let mut ctl = RetryController::new(request, self.options.policy);
                    ctl.reject_unavailable(reason.as_str());
                    let result = batch_result(start, ctl);
                    on_batch(&result, index + 1, total);
                    result
                })
                .collect();
            return BatchRun { batches };
        }

        let mut batches: Vec<BatchResult> = stream::iter(jobs)
            .map(|(start, request)| {
                let finished = &finished;
                let on_batch = &on_batch;
                async move {
                    let result = self.drive_batch(start, request, cancel).await;
                    let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                    on_batch(&result, done, total);
                    result
                }
            })
            .buffer_unordered(self.options.max_in_flight)
            .collect()
            .await;

        // Completion order is arbitrary; output order is not.
        batches.sort_by_key(|b| b.batch_id);
        BatchRun { batches }
    }

    /// Availability check bounded by the attempt timeout. A cancelled check
    /// reports available so the batches end as cancelled.
    async fn translator_available(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => true,
            result = tokio::time::timeout(
                self.options.attempt_timeout,
                self.translator.is_available(),
            ) => result.unwrap_or(false),
        }
    }

    async fn drive_batch(
        &self,
        first_index: usize,
        request: TranslationRequest,
        cancel: &CancellationToken,
    ) -> BatchResult {
        let expected = request.len();
        let texts = request.texts.clone();
        let target = request.target_language.clone();
        let mut ctl = RetryController::new(request, self.options.policy);

        while !ctl.is_terminal() {
            if cancel.is_cancelled() {
                ctl.cancel();
                break;
            }

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = self.limiter.acquire() => permit,
            };
            let Some(permit) = permit else {
                ctl.cancel();
                break;
            };

            let attempt = match ctl.begin_attempt() {
                Ok(attempt) => attempt,
                Err(e) => {
                    tracing::warn!("[Translate] {}", e);
                    break;
                }
            };

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = tokio::time::timeout(
                    self.options.attempt_timeout,
                    self.translator.translate(&texts, &target),
                ) => Some(match result {
                    Ok(outcome) => outcome,
                    Err(_) => TranslationOutcome::transient(format!(
                        "attempt timed out after {}s",
                        self.options.attempt_timeout.as_secs()
                    )),
                }),
            };
            drop(permit);

            let Some(outcome) = outcome else {
                ctl.cancel();
                break;
            };
            let outcome = enforce_length(outcome, expected);

            let state = match ctl.on_outcome(outcome) {
                Ok(state) => state.clone(),
                Err(e) => {
                    tracing::warn!("[Translate] {}", e);
                    break;
                }
            };

            match state {
                RequestState::Retrying { delay } => {
                    tracing::warn!(
                        "[Translate] Batch {} attempt {} failed ({}); retrying in {}s",
                        ctl.request().batch_id + 1,
                        attempt,
                        ctl.request().last_failure.as_deref().unwrap_or("unknown"),
                        delay.as_secs()
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => ctl.cancel(),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                RequestState::Rejected(reason) => {
                    tracing::warn!(
                        "[Translate] Batch {} rejected after {} attempt(s): {} ({})",
                        ctl.request().batch_id + 1,
                        attempt,
                        reason,
                        ctl.request().last_failure.as_deref().unwrap_or("unknown")
                    );
                }
                _ => {}
            }
        }

        batch_result(first_index, ctl)
    }
}

fn batch_result(first_index: usize, ctl: RetryController) -> BatchResult {
    let delays = ctl.delays().to_vec();
    let (request, state, translations) = ctl.into_parts();
    BatchResult {
        batch_id: request.batch_id,
        first_index,
        request,
        state,
        translations,
        delays,
    }
}

/// A success with the wrong number of texts cannot be merged; retry it.
fn enforce_length(outcome: TranslationOutcome, expected: usize) -> TranslationOutcome {
    match outcome {
        TranslationOutcome::Success(texts) if texts.len() != expected => TranslationOutcome::transient(
            format!("response size mismatch: got {}, expected {}", texts.len(), expected),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tokio::time::Instant;

    /// Answers from a script, then repeats the last entry.
    struct Scripted {
        script: Mutex<Vec<TranslationOutcome>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(script: Vec<TranslationOutcome>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Translator for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn translate(&self, texts: &[String], _target: &str) -> TranslationOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock();
            let next = if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            };
            match next {
                TranslationOutcome::Success(_) => {
                    TranslationOutcome::Success(texts.iter().map(|t| format!("pt:{}", t)).collect())
                }
                other => other,
            }
        }
    }

    /// Slower for earlier batches; blocks texts starting with "blocked".
    struct Staggered;

    #[async_trait]
    impl Translator for Staggered {
        fn name(&self) -> &str {
            "staggered"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn translate(&self, texts: &[String], _target: &str) -> TranslationOutcome {
            let first: usize = texts[0].trim_start_matches("t").parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(1000 - first as u64 * 10)).await;
            if texts.iter().any(|t| t.starts_with("blocked")) {
                return TranslationOutcome::permanent("PROHIBITED_CONTENT");
            }
            TranslationOutcome::Success(texts.iter().map(|t| t.to_uppercase()).collect())
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("t{}", i)).collect()
    }

    fn translator(t: Arc<dyn Translator>, batch_size: usize, max_in_flight: usize) -> BatchTranslator {
        let options = BatchOptions {
            batch_size,
            max_in_flight,
            attempt_timeout: Duration::from_secs(600),
            policy: RetryPolicy::new(3, Duration::from_secs(5)),
        };
        BatchTranslator::new(t, InFlightLimiter::new(max_in_flight), options)
    }

    #[test]
    fn partition_preserves_order_and_sizes() {
        let batches = partition_batches(&texts(45), 20, "pt-BR");
        let sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![20, 20, 5]);
        assert_eq!(batches[2].texts[0], "t40");
        assert_eq!(batches[1].batch_id, 1);
        assert!(batches.iter().all(|b| b.attempt_count == 0));
    }

    #[test]
    fn ten_texts_make_one_batch() {
        assert_eq!(partition_batches(&texts(10), 20, "pt-BR").len(), 1);
        assert!(partition_batches(&[], 20, "pt-BR").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_batch_waits_linear_delays() {
        crate::logging::init_test_tracing();
        let scripted = Arc::new(Scripted::new(vec![TranslationOutcome::transient("503")]));
        let bt = translator(scripted.clone(), 20, 1);
        let started = Instant::now();

        let run = bt
            .translate_all(&texts(3), "pt-BR", &CancellationToken::new(), |_, _, _| {})
            .await;

        let batch = &run.batches[0];
        assert_eq!(batch.reject_reason(), Some(RejectReason::RetriesExhausted));
        let secs: Vec<u64> = batch.delays.iter().map(|d| d.as_secs()).collect();
        assert_eq!(secs, vec![5, 10, 15]);
        assert_eq!(scripted.calls.load(Ordering::SeqCst), 4);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(30) && elapsed < Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_reject_is_not_retried() {
        let scripted = Arc::new(Scripted::new(vec![TranslationOutcome::permanent("SAFETY")]));
        let bt = translator(scripted.clone(), 20, 1);

        let run = bt
            .translate_all(&texts(2), "pt-BR", &CancellationToken::new(), |_, _, _| {})
            .await;

        assert_eq!(run.batches[0].reject_reason(), Some(RejectReason::PermanentlyBlocked));
        assert_eq!(run.batches[0].request.attempt_count, 1);
        assert_eq!(scripted.calls.load(Ordering::SeqCst), 1);
        let merged = run.merged();
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().all(|m| m.text.is_none()
            && m.rejection == Some(RejectReason::PermanentlyBlocked)));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_then_success() {
        let scripted = Arc::new(Scripted::new(vec![
            TranslationOutcome::transient("429"),
            TranslationOutcome::Success(vec![]),
        ]));
        let bt = translator(scripted, 20, 1);

        let run = bt
            .translate_all(&texts(2), "pt-BR", &CancellationToken::new(), |_, _, _| {})
            .await;

        assert!(run.batches[0].succeeded());
        assert_eq!(run.batches[0].request.attempt_count, 2);
        assert_eq!(run.merged()[1].text.as_deref(), Some("pt:t1"));
    }

    #[tokio::test(start_paused = true)]
    async fn merge_order_ignores_completion_order() {
        let bt = translator(Arc::new(Staggered), 2, 4);
        let finished_order = Mutex::new(Vec::new());

        let run = bt
            .translate_all(&texts(8), "pt-BR", &CancellationToken::new(), |b, _, _| {
                finished_order.lock().push(b.batch_id)
            })
            .await;

        // Later batches sleep less, so they finish first.
        assert_eq!(*finished_order.lock(), vec![3, 2, 1, 0]);
        let merged: Vec<String> = run.merged().into_iter().filter_map(|m| m.text).collect();
        assert_eq!(merged, vec!["T0", "T1", "T2", "T3", "T4", "T5", "T6", "T7"]);
        assert_eq!(run.batches[3].first_index, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_batch_does_not_abort_siblings() {
        let bt = translator(Arc::new(Staggered), 2, 2);
        let input = vec!["t0".to_string(), "t1".into(), "blocked".into(), "t3".into()];

        let run = bt
            .translate_all(&input, "pt-BR", &CancellationToken::new(), |_, _, _| {})
            .await;

        assert_eq!(run.succeeded_batches(), 1);
        assert_eq!(run.rejected_batches(RejectReason::PermanentlyBlocked), 1);
        let merged = run.merged();
        assert_eq!(merged[0].text.as_deref(), Some("T0"));
        assert_eq!(merged[3].rejection, Some(RejectReason::PermanentlyBlocked));
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_never_exceeds_limit() {
        let limiter = InFlightLimiter::new(2);
        let options = BatchOptions {
            batch_size: 1,
            max_in_flight: 8,
            attempt_timeout: Duration::from_secs(600),
            policy: RetryPolicy::new(3, Duration::from_secs(5)),
        };
        let bt = BatchTranslator::new(Arc::new(Staggered), limiter.clone(), options);

        let run = bt
            .translate_all(&texts(8), "pt-BR", &CancellationToken::new(), |_, _, _| {})
            .await;

        assert_eq!(run.succeeded_batches(), 8);
        assert_eq!(limiter.peak(), 2);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_as_transient() {
        struct Hangs;

        #[async_trait]
        impl Translator for Hangs {
            fn name(&self) -> &str {
                "hangs"
            }
            async fn is_available(&self) -> bool {
                true
            }
            async fn translate(&self, _: &[String], _: &str) -> TranslationOutcome {
                std::future::pending().await
            }
        }

        let options = BatchOptions {
            batch_size: 20,
            max_in_flight: 1,
            attempt_timeout: Duration::from_secs(60),
            policy: RetryPolicy::new(1, Duration::from_secs(5)),
        };
        let bt = BatchTranslator::new(Arc::new(Hangs), InFlightLimiter::new(1), options);

        let run = bt
            .translate_all(&texts(1), "pt-BR", &CancellationToken::new(), |_, _, _| {})
            .await;

        let batch = &run.batches[0];
        assert_eq!(batch.reject_reason(), Some(RejectReason::RetriesExhausted));
        assert_eq!(batch.request.attempt_count, 2);
        assert!(batch.request.last_failure.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_keeps_finished_batches() {
        let bt = translator(Arc::new(Staggered), 2, 1);
        let cancel = CancellationToken::new();

        let run = bt
            .translate_all(&texts(6), "pt-BR", &cancel, |b, _, _| {
                if b.batch_id == 0 {
                    cancel.cancel();
                }
            })
            .await;

        assert!(run.batches[0].succeeded());
        assert_eq!(run.rejected_batches(RejectReason::Cancelled), 2);
        assert_eq!(run.merged().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_translator_dispatches_nothing() {
        struct Offline {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl Translator for Offline {
            fn name(&self) -> &str {
                "offline"
            }
            async fn is_available(&self) -> bool {
                false
            }
            async fn translate(&self, _: &[String], _: &str) -> TranslationOutcome {
                self.calls.fetch_add(1, Ordering::SeqCst);
                TranslationOutcome::transient("unreachable")
            }
        }

        let offline = Arc::new(Offline {
            calls: AtomicUsize::new(0),
        });
        let bt = translator(offline.clone(), 2, 2);
        let reported = AtomicUsize::new(0);

        let run = bt
            .translate_all(&texts(5), "pt-BR", &CancellationToken::new(), |_, _, _| {
                reported.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        assert_eq!(run.rejected_batches(RejectReason::RetriesExhausted), 3);
        assert_eq!(reported.load(Ordering::SeqCst), 3);
        assert_eq!(offline.calls.load(Ordering::SeqCst), 0);
        assert!(run.batches.iter().all(|b| b.request.attempt_count == 0));
        assert_eq!(
            run.batches[0].request.last_failure.as_deref(),
            Some("offline unavailable")
        );
        assert_eq!(run.merged().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn short_success_is_retried() {
        struct Short;

        #[async_trait]
        impl Translator for Short {
            fn name(&self) -> &str {
                "short"
            }
            async fn is_available(&self) -> bool {
                true
            }
            async fn translate(&self, _: &[String], _: &str) -> TranslationOutcome {
                TranslationOutcome::Success(vec!["only one".into()])
            }
        }

        let bt = translator(Arc::new(Short), 20, 1);
        let run = bt
            .translate_all(&texts(2), "pt-BR", &CancellationToken::new(), |_, _, _| {})
            .await;
        assert_eq!(run.batches[0].reject_reason(), Some(RejectReason::RetriesExhausted));
    }
}
