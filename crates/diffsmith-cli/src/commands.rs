//! Subcommand implementations
//!
//! Each returns the process exit status; only setup problems are `Err`.

use crate::observer::LoggingObserver;
use anyhow::Context;
use diffsmith_core::{
    accept_reply, Category, DiffsmithConfig, EditOrchestrator, EditRequest, PatchTool, PatchValidator, PipelineError,
    TaskDecomposer, TextSynthesizer,
};
use diffsmith_openai::OpenAiChatClient;
use diffsmith_workspace::{patch_tool, DirectoryWorkspace};
use std::path::Path;
use std::sync::Arc;

/// Every task applied or skipped; diff valid
pub const EXIT_OK: u8 = 0;
/// At least one task failed; diff invalid
pub const EXIT_FAILED: u8 = 1;
/// The request decomposed into no task at all
pub const EXIT_NOTHING_TO_DO: u8 = 2;

fn open_workspace(config: &DiffsmithConfig) -> anyhow::Result<(DirectoryWorkspace, Arc<dyn PatchTool>)> {
    let workspace = DirectoryWorkspace::open(&config.workspace.root)?;
    let tool = patch_tool(&config.workspace, &workspace);
    Ok((workspace, tool))
}

fn text_service(config: &DiffsmithConfig) -> anyhow::Result<Arc<dyn TextSynthesizer>> {
    let client = OpenAiChatClient::from_config(&config.llm)?;
    tracing::debug!("Using model {}", client.model());
    Ok(Arc::new(client))
}

/// `diffsmith run`: decompose, synthesize, validate and apply; prints the JSON report
///
/// # Errors
/// Fails when the workspace or service cannot be set up, or decomposition fails
pub async fn run(config: &DiffsmithConfig, request: &str, pretty: bool) -> anyhow::Result<u8> {
    let (workspace, tool) = open_workspace(config)?;
    let service = text_service(config)?;
    let orchestrator = EditOrchestrator::new(&config.pipeline, service, Arc::new(workspace), tool)
        .with_observer(Arc::new(LoggingObserver));

    let cancel = orchestrator.cancel_flag();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; finishing the current task and cancelling the rest");
            cancel.cancel();
        }
    });

    let ctx = config.workspace.batch_context();
    let result = orchestrator.run_batch(&ctx, &EditRequest::new(request)).await;
    interrupt.abort();

    let report = match result {
        Ok(report) => report,
        Err(PipelineError::DecompositionEmpty { session }) => {
            tracing::warn!("Nothing to do for session {}", session);
            println!("{}", serde_json::json!({ "session": session, "outcomes": [] }));
            return Ok(EXIT_NOTHING_TO_DO);
        }
        Err(e) => return Err(e.into()),
    };

    let json = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");

    Ok(if report.is_clean() { EXIT_OK } else { EXIT_FAILED })
}

/// `diffsmith decompose`: print the task list without touching any file
///
/// # Errors
/// Fails when the service cannot be set up or a decomposition pass fails
pub async fn decompose(config: &DiffsmithConfig, request: &str) -> anyhow::Result<u8> {
    decompose_with(config, text_service(config)?, request).await
}

/// [`decompose`] against a given text-synthesis service; reads no target file
///
/// # Errors
/// Fails when a decomposition pass fails
pub async fn decompose_with(
    config: &DiffsmithConfig,
    service: Arc<dyn TextSynthesizer>,
    request: &str,
) -> anyhow::Result<u8> {
    let decomposer = TaskDecomposer::new(service, config.pipeline.synthesis_timeout());
    let tasks = decomposer.decompose_all(&EditRequest::new(request)).await?;
    if tasks.is_empty() {
        println!("No edits needed.");
        return Ok(EXIT_NOTHING_TO_DO);
    }

    for category in Category::ALL {
        let items = tasks.tasks(category);
        if items.is_empty() {
            continue;
        }
        println!("{} ({}):", category, config.workspace.files.get(category));
        for item in items {
            println!("  {}. {}", item.sequence + 1, item.description);
        }
    }
    if !tasks.notes().is_empty() {
        println!("notes:");
        for note in tasks.notes() {
            println!("  {note}");
        }
    }
    Ok(EXIT_OK)
}

/// `diffsmith check`: validate a diff file against the live target
///
/// # Errors
/// Fails when the workspace cannot be opened or the diff file cannot be read
pub async fn check(config: &DiffsmithConfig, category: &str, diff_path: &Path) -> anyhow::Result<u8> {
    let category: Category = category.parse()?;
    let text = tokio::fs::read_to_string(diff_path)
        .await
        .with_context(|| format!("reading {}", diff_path.display()))?;

    let ctx = config.workspace.batch_context();
    let candidate = match accept_reply(category, ctx.file_name(category), &text) {
        Ok(candidate) => candidate,
        Err(e) => {
            println!("invalid: {e}");
            return Ok(EXIT_FAILED);
        }
    };

    let (workspace, tool) = open_workspace(config)?;
    let validator = PatchValidator::new(
        Arc::new(workspace),
        tool,
        config.pipeline.fetch_timeout(),
        config.pipeline.validation_timeout(),
    );
    let verdict = validator.validate(&ctx, &candidate).await;
    if verdict.valid {
        println!("valid");
        Ok(EXIT_OK)
    } else {
        println!("invalid: {}", verdict.diagnostic);
        Ok(EXIT_FAILED)
    }
}
