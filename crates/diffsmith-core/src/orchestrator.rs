//! Edit orchestrator
//!
//! Drives one batch end to end:
//! - decomposes the request, aborting only when no category has a task
//! - runs every task in category order, one at a time
//! - loops synthesize, validate, then apply or retry, within the attempt budget
//! - records every task's final state in the [`BatchReport`]
//!
//! Per task: `PENDING -> SYNTHESIZING -> VALIDATING -> APPLYING -> Applied`,
//! `VALIDATING -> SYNTHESIZING` on a rejected candidate while attempts remain,
//! `SYNTHESIZING -> Skipped` on SKIP, otherwise `Failed`.

use crate::applier::PatchApplier;
use crate::config::PipelineConfig;
use crate::decomposition::TaskDecomposer;
use crate::error::PipelineError;
use crate::ports::{fetch_fresh, BatchEvent, BatchObserver, CancelFlag, ContentSource, NoopObserver, PatchTool, TextSynthesizer};
use crate::synthesis::PatchSynthesizer;
use crate::types::{
    BatchContext, BatchReport, ContentSnapshot, EditRequest, FailureKind, Note, OutcomeState, TaskItem, TaskList,
    TaskOutcome,
};
use crate::validator::PatchValidator;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Composition of the pipeline components around shared collaborators
pub struct EditOrchestrator {
    decomposer: TaskDecomposer,
    synthesizer: PatchSynthesizer,
    validator: PatchValidator,
    applier: PatchApplier,
    source: Arc<dyn ContentSource>,
    observer: Arc<dyn BatchObserver>,
    cancel: CancelFlag,
    max_attempts: u32,
    fetch_timeout: Duration,
}

impl std::fmt::Debug for EditOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditOrchestrator")
            .field("max_attempts", &self.max_attempts)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl EditOrchestrator {
    /// Wire the pipeline around one set of collaborators
    ///
    /// The same service handle serves decomposition and synthesis.
    #[must_use]
    pub fn new(
        config: &PipelineConfig,
        service: Arc<dyn TextSynthesizer>,
        source: Arc<dyn ContentSource>,
        tool: Arc<dyn PatchTool>,
    ) -> Self {
        Self {
            decomposer: TaskDecomposer::new(Arc::clone(&service), config.synthesis_timeout()),
            synthesizer: PatchSynthesizer::new(service, config.synthesis_timeout()),
            validator: PatchValidator::new(
                Arc::clone(&source),
                Arc::clone(&tool),
                config.fetch_timeout(),
                config.validation_timeout(),
            ),
            applier: PatchApplier::new(Arc::clone(&source), tool, config.fetch_timeout(), config.apply_timeout()),
            source,
            observer: Arc::new(NoopObserver),
            cancel: CancelFlag::new(),
            max_attempts: config.max_attempts.max(1),
            fetch_timeout: config.fetch_timeout(),
        }
    }

    /// With progress observer
    #[inline]
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// With cancellation flag
    #[inline]
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle that cancels this orchestrator's batches between tasks
    #[inline]
    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Decomposer used by [`run_batch`](Self::run_batch)
    #[inline]
    #[must_use]
    pub fn decomposer(&self) -> &TaskDecomposer {
        &self.decomposer
    }

    /// Decompose `request` and execute every resulting task
    ///
    /// # Errors
    /// - [`PipelineError::DecompositionEmpty`] when no category has a task;
    ///   no content is fetched and nothing is synthesized or applied
    /// - [`PipelineError::Decomposition`] when a decomposition pass fails
    pub async fn run_batch(&self, ctx: &BatchContext, request: &EditRequest) -> Result<BatchReport, PipelineError> {
        tracing::info!("Starting batch {} on {}", ctx.session, ctx.target);

        let tasks = self.decomposer.decompose_all(request).await?;
        if tasks.is_empty() {
            tracing::warn!("Batch {}: decomposition produced no tasks", ctx.session);
            return Err(PipelineError::DecompositionEmpty { session: ctx.session });
        }

        Ok(self.execute(ctx, &tasks).await)
    }

    /// Execute an already decomposed task list
    pub async fn execute(&self, ctx: &BatchContext, tasks: &TaskList) -> BatchReport {
        let started_at = Utc::now();
        let notes = tasks.notes();
        let mut outcomes = Vec::with_capacity(tasks.len());

        for task in tasks.iter() {
            let outcome = if self.cancel.is_cancelled() {
                TaskOutcome::failed(task.clone(), FailureKind::Cancelled, "batch cancelled before this task started", 0)
            } else {
                self.observer.on_event(&BatchEvent::TaskStarted { task });
                self.run_task(ctx, task, notes).await
            };
            self.observer.on_event(&BatchEvent::TaskFinished { outcome: &outcome });
            outcomes.push(outcome);
        }

        let report = BatchReport {
            session: ctx.session,
            outcomes,
            notes: notes.to_vec(),
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(
            "Batch {} finished: {} applied, {} skipped, {} failed",
            ctx.session,
            report.count(OutcomeState::Applied),
            report.count(OutcomeState::Skipped),
            report.count(OutcomeState::Failed)
        );
        report
    }

    /// Retry loop for one task
    async fn run_task(&self, ctx: &BatchContext, task: &TaskItem, notes: &[Note]) -> TaskOutcome {
        tracing::info!("Task {}", task);
        let mut diagnostic: Option<String> = None;

        for attempt in 1..=self.max_attempts {
            tracing::debug!("Task {} attempt {}/{}", task, attempt, self.max_attempts);

            // never reuse a snapshot across attempts or tasks
            let snapshot = match fetch_fresh(self.source.as_ref(), ctx, task.category, self.fetch_timeout).await {
                Ok(content) => ContentSnapshot::new(task.category, content),
                Err(e) => {
                    let message = format!("could not read {}: {e}", ctx.file_name(task.category));
                    self.attempt_failed(task, attempt, &message);
                    diagnostic = Some(message);
                    continue;
                }
            };

            let candidate = match self
                .synthesizer
                .synthesize(ctx, &snapshot, task, notes, diagnostic.as_deref())
                .await
            {
                Ok(candidate) => candidate,
                Err(e) => {
                    let message = e.to_string();
                    self.attempt_failed(task, attempt, &message);
                    diagnostic = Some(message);
                    continue;
                }
            };

            if candidate.is_skip() {
                tracing::info!("Task {} skipped: no change needed", task);
                return TaskOutcome::skipped(task.clone(), attempt);
            }

            let validation = self.validator.validate(ctx, &candidate).await;
            if !validation.valid {
                self.attempt_failed(task, attempt, &validation.diagnostic);
                diagnostic = Some(validation.diagnostic);
                continue;
            }

            let result = self.applier.apply(ctx, &candidate).await;
            if result.applied {
                tracing::info!("Task {} applied on attempt {}", task, attempt);
                return TaskOutcome::applied(task.clone(), attempt);
            }
            tracing::error!("Task {} failed to apply: {}", task, result.message);
            return TaskOutcome::failed(task.clone(), FailureKind::ApplyDivergence, result.message, attempt);
        }

        let last = diagnostic.unwrap_or_else(|| "attempt budget exhausted".to_string());
        tracing::warn!("Task {} failed after {} attempts: {}", task, self.max_attempts, last);
        TaskOutcome::failed(task.clone(), FailureKind::RetryExhausted, last, self.max_attempts)
    }

    fn attempt_failed(&self, task: &TaskItem, attempt: u32, diagnostic: &str) {
        tracing::warn!("Task {} attempt {} rejected: {}", task, attempt, diagnostic);
        self.observer.on_event(&BatchEvent::AttemptFailed {
            task,
            attempt,
            diagnostic,
        });
    }
}
