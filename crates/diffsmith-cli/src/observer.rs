//! Progress reporting for batch runs

use diffsmith_core::{BatchEvent, BatchObserver, OutcomeState};

/// Logs every batch event through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl BatchObserver for LoggingObserver {
    fn on_event(&self, event: &BatchEvent<'_>) {
        match event {
            BatchEvent::TaskStarted { task } => tracing::info!("▶ {}", task),
            BatchEvent::AttemptFailed {
                task,
                attempt,
                diagnostic,
            } => tracing::warn!("✗ {} attempt {}: {}", task, attempt, diagnostic),
            BatchEvent::TaskFinished { outcome } => match outcome.state {
                OutcomeState::Applied => {
                    tracing::info!("✓ {} applied ({} attempts)", outcome.task, outcome.attempts_used);
                }
                OutcomeState::Skipped => tracing::info!("- {} skipped", outcome.task),
                OutcomeState::Failed => tracing::error!(
                    "✗ {} failed: {}",
                    outcome.task,
                    outcome.diagnostic.as_deref().unwrap_or("unknown")
                ),
            },
        }
    }
}
