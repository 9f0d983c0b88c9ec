//! Collaborator traits
//!
//! The pipeline talks to three external services: where target content
//! lives, the text-synthesis service, and the structural-patch tool. Each
//! call is bounded by a deadline enforced here, not by the implementation.

use crate::error::TransportError;
use crate::types::{BatchContext, Category, PromptContext, TaskItem, TaskOutcome, ToolOutput};
use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Source of canonical target content
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Current text of the category's target file
    async fn fetch_content(&self, ctx: &BatchContext, category: Category) -> Result<String, TransportError>;
}

/// Opaque text-generation service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextSynthesizer: Send + Sync {
    /// Generate a reply to `prompt`
    async fn complete(&self, prompt: &PromptContext) -> Result<String, TransportError>;
}

/// External structural-patch tool
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PatchTool: Send + Sync {
    /// Trial application; must not persist anything
    async fn dry_run_apply(
        &self,
        ctx: &BatchContext,
        category: Category,
        diff: &str,
    ) -> Result<ToolOutput, TransportError>;

    /// Real application
    async fn commit_apply(
        &self,
        ctx: &BatchContext,
        category: Category,
        diff: &str,
    ) -> Result<ToolOutput, TransportError>;
}

/// Progress event emitted while a batch runs
#[derive(Debug, Clone, Copy)]
pub enum BatchEvent<'a> {
    /// Task left PENDING
    TaskStarted { task: &'a TaskItem },
    /// An attempt ended without a usable candidate
    AttemptFailed {
        task: &'a TaskItem,
        attempt: u32,
        diagnostic: &'a str,
    },
    /// Task reached its final state
    TaskFinished { outcome: &'a TaskOutcome },
}

/// Receiver of [`BatchEvent`]s; called inline, so keep it cheap
pub trait BatchObserver: Send + Sync {
    fn on_event(&self, event: &BatchEvent<'_>);
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl BatchObserver for NoopObserver {
    fn on_event(&self, _event: &BatchEvent<'_>) {}
}

/// Cooperative cancellation, honoured between tasks
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; tasks already started run to completion
    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Run `call` with a deadline, mapping expiry to [`TransportError::Timeout`]
pub(crate) async fn with_deadline<T>(
    operation: &str,
    limit: Duration,
    call: impl Future<Output = Result<T, TransportError>>,
) -> Result<T, TransportError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout {
            operation: operation.to_string(),
            secs: limit.as_secs(),
        }),
    }
}

/// Fetch content under the fetch deadline
pub(crate) async fn fetch_fresh(
    source: &dyn ContentSource,
    ctx: &BatchContext,
    category: Category,
    limit: Duration,
) -> Result<String, TransportError> {
    with_deadline("content fetch", limit, source.fetch_content(ctx, category)).await
}
