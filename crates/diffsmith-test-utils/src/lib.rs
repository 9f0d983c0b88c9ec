//! Testing utilities for the diffsmith workspace
//!
//! In-memory collaborators and fixtures for driving the pipeline end to end.

#![allow(missing_docs)]

use async_trait::async_trait;
use diffsmith_core::{BatchContext, Category, ContentSource, PatchTool, PromptContext, TextSynthesizer, ToolOutput, TransportError};
use diffsmith_grammar::UnifiedDiff;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Nine-line page with the title on line 5
pub const TITLE_PAGE: &str = "<!DOCTYPE html>
<html lang=\"en\">
<head>
    <meta charset=\"UTF-8\">
    <title>Welcome My Website!</title>
</head>
<body>
</body>
</html>
";

/// Title change against [`TITLE_PAGE`]
pub const TITLE_DIFF: &str = "--- index.html
+++ index.html
@@ -4,3 +4,3 @@
     <meta charset=\"UTF-8\">
-    <title>Welcome My Website!</title>
+    <title>Hello World!</title>
 </head>
";

/// [`TITLE_PAGE`] after [`TITLE_DIFF`]
pub const TITLE_PAGE_UPDATED: &str = "<!DOCTYPE html>
<html lang=\"en\">
<head>
    <meta charset=\"UTF-8\">
    <title>Hello World!</title>
</head>
<body>
</body>
</html>
";

/// Twelve-line stylesheet
pub const STYLESHEET: &str = "body {
    margin: 0;
    font-family: sans-serif;
}

h1 {
    color: #333;
}

footer {
    padding: 1rem;
}
";

type Hook = Box<dyn Fn(&mut String) + Send + Sync>;

#[derive(Default)]
struct WorkspaceState {
    files: Mutex<HashMap<Category, String>>,
    fetches: AtomicUsize,
    dry_runs: AtomicUsize,
    commits: AtomicUsize,
    on_dry_run: Mutex<Option<Hook>>,
    on_commit: Mutex<Option<Hook>>,
}

/// In-memory target set that is both content source and patch tool
///
/// Dry runs and commits use the diff grammar's exact application, so a
/// candidate passes here exactly when it fits the stored content. Hooks can
/// tamper with a file during a dry run or after a commit.
#[derive(Clone, Default)]
pub struct FakeWorkspace {
    state: Arc<WorkspaceState>,
}

impl std::fmt::Debug for FakeWorkspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeWorkspace")
            .field("files", &*self.state.files.lock())
            .finish_non_exhaustive()
    }
}

impl FakeWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_file(self, category: Category, content: impl Into<String>) -> Self {
        self.set_content(category, content);
        self
    }

    pub fn set_content(&self, category: Category, content: impl Into<String>) {
        self.state.files.lock().insert(category, content.into());
    }

    pub fn content(&self, category: Category) -> Option<String> {
        self.state.files.lock().get(&category).cloned()
    }

    /// Run `hook` on the file after every successful dry run
    pub fn tamper_on_dry_run(&self, hook: impl Fn(&mut String) + Send + Sync + 'static) {
        *self.state.on_dry_run.lock() = Some(Box::new(hook));
    }

    /// Run `hook` on the file after every successful commit
    pub fn tamper_on_commit(&self, hook: impl Fn(&mut String) + Send + Sync + 'static) {
        *self.state.on_commit.lock() = Some(Box::new(hook));
    }

    pub fn fetch_count(&self) -> usize {
        self.state.fetches.load(Ordering::SeqCst)
    }

    pub fn dry_run_count(&self) -> usize {
        self.state.dry_runs.load(Ordering::SeqCst)
    }

    pub fn commit_count(&self) -> usize {
        self.state.commits.load(Ordering::SeqCst)
    }

    /// Total calls of any kind
    pub fn call_count(&self) -> usize {
        self.fetch_count() + self.dry_run_count() + self.commit_count()
    }

    fn stage(&self, ctx: &BatchContext, category: Category, diff: &str) -> Result<String, ToolOutput> {
        let diff = UnifiedDiff::parse(diff).map_err(|e| ToolOutput::failure(2, format!("malformed patch: {e}")))?;
        if !diff.target().matches(ctx.file_name(category)) {
            return Err(ToolOutput::failure(1, format!("can't find file to patch: {}", diff.target())));
        }
        let current = self
            .content(category)
            .ok_or_else(|| ToolOutput::failure(1, format!("can't find file to patch: {}", diff.target())))?;
        diff.apply_to(&current)
            .map_err(|failure| ToolOutput::failure(1, format!("Hunk FAILED: {failure}")))
    }

    fn run_hook(&self, category: Category, hook: &Mutex<Option<Hook>>) {
        if let Some(hook) = hook.lock().as_ref() {
            if let Some(content) = self.state.files.lock().get_mut(&category) {
                hook(content);
            }
        }
    }
}

#[async_trait]
impl ContentSource for FakeWorkspace {
    async fn fetch_content(&self, _ctx: &BatchContext, category: Category) -> Result<String, TransportError> {
        self.state.fetches.fetch_add(1, Ordering::SeqCst);
        self.content(category)
            .ok_or_else(|| TransportError::Io(format!("no {category} file")))
    }
}

#[async_trait]
impl PatchTool for FakeWorkspace {
    async fn dry_run_apply(
        &self,
        ctx: &BatchContext,
        category: Category,
        diff: &str,
    ) -> Result<ToolOutput, TransportError> {
        self.state.dry_runs.fetch_add(1, Ordering::SeqCst);
        Ok(match self.stage(ctx, category, diff) {
            Ok(_) => {
                self.run_hook(category, &self.state.on_dry_run);
                ToolOutput::success(format!("checking file {}", ctx.file_name(category)))
            }
            Err(rejected) => rejected,
        })
    }

    async fn commit_apply(
        &self,
        ctx: &BatchContext,
        category: Category,
        diff: &str,
    ) -> Result<ToolOutput, TransportError> {
        self.state.commits.fetch_add(1, Ordering::SeqCst);
        Ok(match self.stage(ctx, category, diff) {
            Ok(updated) => {
                self.set_content(category, updated);
                self.run_hook(category, &self.state.on_commit);
                ToolOutput::success(format!("patching file {}", ctx.file_name(category)))
            }
            Err(rejected) => rejected,
        })
    }
}

/// Text-synthesis service that replays queued replies in order
///
/// Every prompt is recorded. An exhausted script answers with a service error.
#[derive(Debug, Default)]
pub struct ScriptedSynthesizer {
    replies: Mutex<VecDeque<Result<String, TransportError>>>,
    prompts: Mutex<Vec<PromptContext>>,
}

impl ScriptedSynthesizer {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::default(),
        }
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies.lock().push_back(Ok(reply.into()));
    }

    pub fn push_error(&self, error: TransportError) {
        self.replies.lock().push_back(Err(error));
    }

    /// Prompts received so far, in call order
    pub fn prompts(&self) -> Vec<PromptContext> {
        self.prompts.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().len()
    }
}

#[async_trait]
impl TextSynthesizer for ScriptedSynthesizer {
    async fn complete(&self, prompt: &PromptContext) -> Result<String, TransportError> {
        self.prompts.lock().push(prompt.clone());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Service("script exhausted".to_string())))
    }
}

/// Decomposition replies for the three categories, in processing order
pub fn decomposition_replies(structure: &str, style: &str, behavior: &str) -> [String; 3] {
    [structure.to_string(), style.to_string(), behavior.to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_workspace_commits_exact_fit() {
        let workspace = FakeWorkspace::new().with_file(Category::Structure, TITLE_PAGE);
        let ctx = BatchContext::new("site");

        let output = workspace.commit_apply(&ctx, Category::Structure, TITLE_DIFF).await.unwrap();
        assert!(output.succeeded(), "{}", output.output);
        assert_eq!(workspace.content(Category::Structure).unwrap(), TITLE_PAGE_UPDATED);
        assert_eq!(workspace.commit_count(), 1);
    }

    #[tokio::test]
    async fn scripted_synthesizer_replays_then_errors() {
        let service = ScriptedSynthesizer::new(["one"]);
        let prompt = PromptContext::new("system", "user");
        assert_eq!(service.complete(&prompt).await.unwrap(), "one");
        assert!(service.complete(&prompt).await.is_err());
        assert_eq!(service.call_count(), 2);
    }
}
