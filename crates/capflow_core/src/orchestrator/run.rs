//! Per-unit pipeline runner.
//!
//! Sequences probe, engine selection, transcription, filtering and
//! translation for one media unit. Every run ends in exactly one terminal
//! outcome; stage errors are reported, never returned.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::errors::{FailureReason, StageError};
use super::types::{PipelineRun, ProgressCallback, RunOutcome, RunReport, RunStage, SkipReason};
use crate::config::Settings;
use crate::engine::EngineSelector;
use crate::filter::ConfidenceFilter;
use crate::logging::RunLogger;
use crate::media::DurationProbe;
use crate::models::{
    normalize_segments, Engine, MediaRequest, MediaUnit, RejectReason, TranscriptSegment,
};
use crate::subtitles::CaptionEntry;
use crate::transcribe::Transcriber;
use crate::translate::{BatchOptions, BatchRun, BatchTranslator, InFlightLimiter, Translator};

/// Runs media units through the captioning pipeline.
///
/// Holds only read-only configuration and shared collaborators, so one
/// orchestrator can serve many concurrent runs.
pub struct Orchestrator {
    settings: Settings,
    selector: EngineSelector,
    filter: ConfidenceFilter,
    probe: Arc<dyn DurationProbe>,
    transcriber: Arc<dyn Transcriber>,
    translator: Arc<dyn Translator>,
    limiter: InFlightLimiter,
    progress_callback: Option<ProgressCallback>,
}

impl Orchestrator {
    pub fn new(
        settings: Settings,
        probe: Arc<dyn DurationProbe>,
        transcriber: Arc<dyn Transcriber>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            selector: EngineSelector::new(settings.engine.clone()),
            filter: ConfidenceFilter::new(settings.filter.clone()),
            limiter: InFlightLimiter::new(settings.pipeline.translator_quota),
            settings,
            probe,
            transcriber,
            translator,
            progress_callback: None,
        }
    }

    /// Share a translation quota with other orchestrators.
    pub fn with_limiter(mut self, limiter: InFlightLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn limiter(&self) -> &InFlightLimiter {
        &self.limiter
    }

    fn report_progress(&self, unit_id: &str, stage: RunStage, percent: u32, message: &str) {
        if let Some(ref callback) = self.progress_callback {
            callback(unit_id, stage, percent, message);
        }
    }

    fn enter(&self, run: &mut PipelineRun, stage: RunStage, percent: u32, logger: &RunLogger) {
        run.advance(stage);
        logger.phase(stage.name());
        self.report_progress(&run.unit_id, stage, percent, &format!("Starting {}", stage));
    }

    fn finish(&self, run: PipelineRun, outcome: RunOutcome, logger: &RunLogger) -> RunReport {
        match outcome {
            RunOutcome::Failed(reason) => {
                logger.error(&format!("Run finished: {}", outcome));
                if reason != FailureReason::Cancelled {
                    logger.show_tail("Recent log lines");
                }
            }
            RunOutcome::Skipped(_) => logger.warn(&format!("Run finished: {}", outcome)),
            _ => logger.success(&format!("Run finished: {}", outcome)),
        }

        let report = run.finish(outcome);
        self.report_progress(
            &report.unit_id,
            report.outcome.stage(),
            100,
            &format!("{}", report.outcome),
        );
        report
    }

    fn fail(
        &self,
        mut run: PipelineRun,
        error: StageError,
        logger: &RunLogger,
    ) -> RunReport {
        if error.is_cancelled() {
            logger.warn(&error.to_string());
        } else {
            logger.error(&error.to_string());
        }
        run.message = Some(error.to_string());
        self.finish(run, RunOutcome::Failed(error.failure_reason()), logger)
    }

    /// Run one media request to a terminal outcome.
    pub async fn run(
        &self,
        request: &MediaRequest,
        cancel: &CancellationToken,
        logger: &RunLogger,
    ) -> RunReport {
        let mut run = PipelineRun::new(request);
        logger.section(&format!("Run '{}': {}", request.id, request.source.display()));

        // Duration must be known before selection.
        let duration = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StageError::cancelled(RunStage::Pending.name())),
            result = self.probe.duration(&request.source) => result.map_err(StageError::from),
        };
        let duration = match duration {
            Ok(d) => d,
            Err(e) => return self.fail(run, e, logger),
        };
        let unit = MediaUnit::from_request(
            request,
            duration,
            &self.settings.translation.target_language,
        );
        logger.info(&format!("Duration: {:.1}s", duration));
        run.unit = Some(unit.clone());

        // Selecting
        self.enter(&mut run, RunStage::Selecting, 5, logger);
        let preferred = self.selector.preferred_engine(duration, unit.time_budget());
        let accurate_available = match preferred {
            Engine::Accurate => match self.accurate_available(cancel, logger).await {
                Ok(available) => available,
                Err(e) => return self.fail(run, e, logger),
            },
            Engine::Fast => false,
        };
        let selection = self
            .selector
            .select(duration, unit.time_budget(), accurate_available);
        if selection.is_degraded() {
            logger.warn(&format!(
                "Accurate engine unavailable for {:.0}s media; using fast engine",
                duration
            ));
        }
        logger.info(&format!("Engine: {}", selection.engine));
        run.selection = Some(selection);

        // Transcribing
        self.enter(&mut run, RunStage::Transcribing, 10, logger);
        let segments = match self
            .transcribe_with_fallback(&unit, selection.engine, cancel, logger, &mut run)
            .await
        {
            Ok(segments) => segments,
            Err(e) => return self.fail(run, e, logger),
        };
        logger.info(&format!("Transcribed {} segments", segments.len()));

        // Filtering
        self.enter(&mut run, RunStage::Filtering, 60, logger);
        let segments = normalize_segments(segments);
        let report = self.filter.filter_segments(&segments);
        logger.info(&report.summary());
        for verdict in report.verdicts.iter().filter(|v| !v.reason.is_empty()) {
            logger.debug(&format!(
                "Segment {}: {} ({})",
                verdict.segment_index + 1,
                verdict.outcome,
                verdict.reason
            ));
        }

        let retained: Vec<(TranscriptSegment, bool)> = report
            .verdicts
            .iter()
            .filter(|v| v.is_retained())
            .map(|v| (segments[v.segment_index].clone(), v.needs_review()))
            .collect();
        let all_dropped = report.all_dropped();
        run.filter = Some(report);

        if all_dropped {
            run.message = Some("every segment was dropped by the filter".to_string());
            return self.finish(run, RunOutcome::Skipped(SkipReason::NothingToTranslate), logger);
        }

        if cancel.is_cancelled() {
            return self.fail(run, StageError::cancelled(RunStage::Filtering.name()), logger);
        }

        // Translating
        self.enter(&mut run, RunStage::Translating, 65, logger);
        let batch_run = self
            .translate(&run.unit_id, &retained, unit.target_language(), cancel, logger)
            .await;

        run.batch_count = batch_run.batch_count();
        run.captions = retained
            .into_iter()
            .zip(batch_run.merged())
            .map(|((segment, review), merged)| {
                let entry = match (merged.text, merged.rejection) {
                    (Some(text), _) => CaptionEntry::translated(segment, text),
                    (None, reason) => CaptionEntry::untranslated(
                        segment,
                        reason.unwrap_or(RejectReason::RetriesExhausted),
                    ),
                };
                entry.with_review(review)
            })
            .collect();

        let outcome = translation_outcome(&batch_run);
        if let RunOutcome::Failed(FailureReason::Cancelled) = outcome {
            run.message = Some(format!(
                "cancelled with {} of {} batches translated",
                batch_run.succeeded_batches(),
                batch_run.batch_count()
            ));
        }
        self.finish(run, outcome, logger)
    }

    /// Availability of the accurate engine. A check that outlives its
    /// timeout counts as unavailable.
    async fn accurate_available(
        &self,
        cancel: &CancellationToken,
        logger: &RunLogger,
    ) -> Result<bool, StageError> {
        let timeout = self.settings.pipeline.availability_timeout();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StageError::cancelled(RunStage::Selecting.name())),
            result = tokio::time::timeout(timeout, self.transcriber.is_available(Engine::Accurate)) => {
                Ok(result.unwrap_or_else(|_| {
                    logger.warn(&format!(
                        "Accurate engine availability check timed out after {}s",
                        timeout.as_secs()
                    ));
                    false
                }))
            }
        }
    }

    async fn transcribe_once(
        &self,
        unit: &MediaUnit,
        engine: Engine,
        cancel: &CancellationToken,
    ) -> Result<Vec<TranscriptSegment>, StageError> {
        let timeout = self.settings.pipeline.transcription_timeout();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StageError::cancelled(RunStage::Transcribing.name())),
            result = tokio::time::timeout(timeout, self.transcriber.transcribe(unit.source(), engine)) => {
                match result {
                    Ok(segments) => segments.map_err(StageError::from),
                    Err(_) => Err(StageError::TranscriptionTimeout {
                        engine,
                        secs: timeout.as_secs(),
                    }),
                }
            }
        }
    }

    /// Transcribe, falling back once from the accurate to the fast engine.
    async fn transcribe_with_fallback(
        &self,
        unit: &MediaUnit,
        engine: Engine,
        cancel: &CancellationToken,
        logger: &RunLogger,
        run: &mut PipelineRun,
    ) -> Result<Vec<TranscriptSegment>, StageError> {
        match self.transcribe_once(unit, engine, cancel).await {
            Ok(segments) => {
                run.engine_used = Some(engine);
                return Ok(segments);
            }
            Err(e) if e.is_cancelled() || engine == Engine::Fast => return Err(e),
            Err(e) => {
                logger.warn(&format!("{}; falling back to fast engine", e));
            }
        }

        run.fallback_used = true;
        self.report_progress(&run.unit_id, RunStage::Transcribing, 30, "Falling back to fast engine");
        let segments = self.transcribe_once(unit, Engine::Fast, cancel).await?;
        run.engine_used = Some(Engine::Fast);
        Ok(segments)
    }

    async fn translate(
        &self,
        unit_id: &str,
        retained: &[(TranscriptSegment, bool)],
        target_language: &str,
        cancel: &CancellationToken,
        logger: &RunLogger,
    ) -> BatchRun {
        let texts: Vec<String> = retained.iter().map(|(s, _)| s.text.trim().to_string()).collect();
        let options = BatchOptions::from_settings(&self.settings.translation);
        let batches = BatchTranslator::new(Arc::clone(&self.translator), self.limiter.clone(), options);

        logger.info(&format!(
            "Translating {} segments to {} via {} (batch size {})",
            texts.len(),
            target_language,
            self.translator.name(),
            options.batch_size
        ));

        batches
            .translate_all(&texts, target_language, cancel, |batch, done, total| {
                match batch.reject_reason() {
                    None => logger.info(&format!(
                        "Batch {}/{} translated ({} segments, {} attempt(s))",
                        batch.batch_id + 1,
                        total,
                        batch.len(),
                        batch.request.attempt_count
                    )),
                    Some(reason) => logger.warn(&format!(
                        "Batch {}/{} rejected: {} ({})",
                        batch.batch_id + 1,
                        total,
                        reason,
                        batch.request.last_failure.as_deref().unwrap_or("no attempt")
                    )),
                }
                let percent = 65 + (done * 30 / total.max(1)) as u32;
                self.report_progress(unit_id, RunStage::Translating, percent, "Batch finished");
            })
            .await
    }
}

/// Terminal outcome of the Translating stage.
///
/// Cancellation wins; otherwise any exhausted batch in a run without
/// successes points at infrastructure rather than content.
pub(crate) fn translation_outcome(batch_run: &BatchRun) -> RunOutcome {
    let total = batch_run.batch_count();
    let succeeded = batch_run.succeeded_batches();

    if batch_run.rejected_batches(RejectReason::Cancelled) > 0 {
        return RunOutcome::Failed(FailureReason::Cancelled);
    }
    if succeeded == total {
        return RunOutcome::Completed;
    }
    if succeeded > 0 {
        return RunOutcome::PartiallyCompleted;
    }
    if batch_run.rejected_batches(RejectReason::RetriesExhausted) > 0 {
        RunOutcome::Failed(FailureReason::RetriesExhausted)
    } else {
        RunOutcome::Skipped(SkipReason::AllBlocked)
    }
}
