//! GNU `patch` as the structural-patch tool
//!
//! Runs `patch [--dry-run] --batch --forward --fuzz=0 -p0 -d <root> -i <file>`
//! with the candidate staged in a temporary file. `--fuzz=0` keeps the tool
//! as strict as the in-memory check; rejects are discarded, never written.

use crate::error::WorkspaceError;
use async_trait::async_trait;
use diffsmith_core::{BatchContext, Category, PatchTool, ToolOutput, TransportError};
use diffsmith_grammar::STRIP_DEPTH;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Shells out to a GNU-compatible `patch` binary
#[derive(Debug, Clone)]
pub struct GnuPatchTool {
    root: PathBuf,
    program: String,
}

impl GnuPatchTool {
    /// Tool operating inside `root` using `patch` from `PATH`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            program: "patch".to_string(),
        }
    }

    /// With a specific executable
    #[inline]
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Executable in use
    #[inline]
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, diff: &str, dry_run: bool) -> Result<ToolOutput, WorkspaceError> {
        let mut staged = tempfile::Builder::new()
            .prefix("diffsmith-")
            .suffix(".diff")
            .tempfile()
            .map_err(|e| WorkspaceError::io_error(std::env::temp_dir(), e))?;
        staged
            .write_all(diff.as_bytes())
            .and_then(|()| staged.flush())
            .map_err(|e| WorkspaceError::io_error(staged.path(), e))?;

        let args = patch_args(&self.root, staged.path(), dry_run);
        tracing::debug!("Running {} {:?}", self.program, args);

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| WorkspaceError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        let exit_code = output.status.code().unwrap_or(-1);

        Ok(ToolOutput {
            exit_code,
            output: text,
        })
    }
}

/// Arguments for one `patch` invocation
#[must_use]
pub fn patch_args(root: &Path, diff_file: &Path, dry_run: bool) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::with_capacity(10);
    if dry_run {
        args.push("--dry-run".into());
    }
    args.extend(
        [
            "--batch",
            "--forward",
            "--fuzz=0",
            "--no-backup-if-mismatch",
            "--reject-file=-",
        ]
        .map(OsString::from),
    );
    args.push(format!("-p{STRIP_DEPTH}").into());
    args.push("-d".into());
    args.push(root.as_os_str().to_owned());
    args.push("-i".into());
    args.push(diff_file.as_os_str().to_owned());
    args
}

#[async_trait]
impl PatchTool for GnuPatchTool {
    async fn dry_run_apply(
        &self,
        _ctx: &BatchContext,
        _category: Category,
        diff: &str,
    ) -> Result<ToolOutput, TransportError> {
        Ok(self.run(diff, true).await?)
    }

    async fn commit_apply(
        &self,
        _ctx: &BatchContext,
        _category: Category,
        diff: &str,
    ) -> Result<ToolOutput, TransportError> {
        Ok(self.run(diff, false).await?)
    }
}
