//! In-process patch tool built on the diff grammar
//!
//! For hosts without a `patch` binary. Dry runs only read; commits write a
//! sibling temporary file and rename it over the target.

use crate::directory::DirectoryWorkspace;
use crate::error::WorkspaceError;
use async_trait::async_trait;
use diffsmith_core::{BatchContext, Category, PatchTool, ToolOutput, TransportError};
use diffsmith_grammar::UnifiedDiff;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Exit code used for a candidate that does not parse or fit
const REJECTED: i32 = 1;

/// Applies candidates with [`UnifiedDiff::apply_to`]
#[derive(Debug, Clone)]
pub struct NativePatchTool {
    workspace: DirectoryWorkspace,
}

impl NativePatchTool {
    /// Tool operating on `workspace`
    #[inline]
    #[must_use]
    pub fn new(workspace: DirectoryWorkspace) -> Self {
        Self { workspace }
    }

    /// Parse, check and apply in memory
    async fn stage(
        &self,
        ctx: &BatchContext,
        category: Category,
        diff: &str,
    ) -> Result<Result<(PathBuf, String), ToolOutput>, WorkspaceError> {
        let diff = match UnifiedDiff::parse(diff) {
            Ok(diff) => diff,
            Err(e) => return Ok(Err(ToolOutput::failure(REJECTED, format!("malformed patch: {e}")))),
        };
        if !diff.target().matches(ctx.file_name(category)) {
            return Ok(Err(ToolOutput::failure(
                REJECTED,
                format!("can't find file to patch: {}", diff.target()),
            )));
        }

        let path = self.workspace.path_of(ctx, category);
        let current = self.workspace.read(ctx, category).await?;
        match diff.apply_to(&current) {
            Ok(updated) => Ok(Ok((path, updated))),
            Err(failure) => Ok(Err(ToolOutput::failure(
                REJECTED,
                format!("checking file {}\n{failure}", diff.target()),
            ))),
        }
    }
}

#[async_trait]
impl PatchTool for NativePatchTool {
    async fn dry_run_apply(
        &self,
        ctx: &BatchContext,
        category: Category,
        diff: &str,
    ) -> Result<ToolOutput, TransportError> {
        Ok(match self.stage(ctx, category, diff).await? {
            Ok(_) => ToolOutput::success(format!("checking file {}", ctx.file_name(category))),
            Err(rejected) => rejected,
        })
    }

    async fn commit_apply(
        &self,
        ctx: &BatchContext,
        category: Category,
        diff: &str,
    ) -> Result<ToolOutput, TransportError> {
        let (path, updated) = match self.stage(ctx, category, diff).await? {
            Ok(staged) => staged,
            Err(rejected) => return Ok(rejected),
        };

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&target, &updated))
            .await
            .map_err(|e| TransportError::Io(format!("write task failed: {e}")))??;

        tracing::debug!("Wrote {}", path.display());
        Ok(ToolOutput::success(format!("patching file {}", ctx.file_name(category))))
    }
}

/// Replace `path` with `content` via a temporary file in the same directory
fn write_atomically(path: &Path, content: &str) -> Result<(), WorkspaceError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(|e| WorkspaceError::io_error(dir, e))?;
    staged
        .write_all(content.as_bytes())
        .and_then(|()| staged.as_file().sync_all())
        .map_err(|e| WorkspaceError::io_error(staged.path(), e))?;
    staged
        .persist(path)
        .map_err(|e| WorkspaceError::io_error(path, e.error))?;
    Ok(())
}
