//! Diffsmith Core - request-to-patch pipeline
//!
//! The pipeline that:
//! - Decomposes a natural-language edit request into ordered tasks per category
//! - Synthesizes a candidate unified diff for each task against fresh content
//! - Validates candidates with a non-persisting dry run
//! - Applies valid candidates and retries rejected ones with diagnostics
//! - Reports per-task outcomes without aborting the batch
//!
//! # Example
//!
//! ```rust,ignore
//! use diffsmith_core::{BatchContext, DiffsmithConfig, EditOrchestrator, EditRequest};
//!
//! # async fn example(service: Arc<dyn TextSynthesizer>, source: Arc<dyn ContentSource>, tool: Arc<dyn PatchTool>)
//! #     -> Result<(), Box<dyn std::error::Error>> {
//! let config = DiffsmithConfig::new();
//! let orchestrator = EditOrchestrator::new(&config.pipeline, service, source, tool);
//!
//! let ctx = config.workspace.batch_context();
//! let report = orchestrator.run_batch(&ctx, &EditRequest::new("change the title to Hello World")).await?;
//!
//! println!("{} tasks processed", report.outcomes.len());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod applier;
pub mod config;
pub mod decomposition;
pub mod error;
pub mod orchestrator;
pub mod ports;
pub mod synthesis;
pub mod types;
pub mod validator;

// Re-exports for convenience
pub use applier::PatchApplier;
pub use config::{
    ConfigError, DiffsmithConfig, FileNames, LlmConfig, LoggingConfig, PatchToolKind, PipelineConfig,
    WorkspaceConfig,
};
pub use decomposition::{parse_reply, DecompositionProfile, ParsedReply, TaskDecomposer};
pub use error::{DecompositionError, PipelineError, SynthesisError, TransportError};
pub use orchestrator::EditOrchestrator;
pub use ports::{BatchEvent, BatchObserver, CancelFlag, ContentSource, NoopObserver, PatchTool, TextSynthesizer};
pub use synthesis::{accept_reply, build_prompt, PatchSynthesizer, SKIP_SENTINEL};
pub use types::{
    ApplyResult, BatchContext, BatchReport, Category, ContentSnapshot, EditRequest, FailureKind, Note, OutcomeState,
    PatchCandidate, PromptContext, TaskItem, TaskList, TaskOutcome, ToolOutput, UnknownCategory, ValidationResult,
};
pub use validator::PatchValidator;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with diffsmith core
    pub use crate::{
        BatchContext, BatchReport, Category, ContentSource, DiffsmithConfig, EditOrchestrator, EditRequest,
        OutcomeState, PatchTool, TextSynthesizer,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
