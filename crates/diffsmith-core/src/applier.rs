//! Patch application
//!
//! Commits a validated candidate, re-reads the target, and checks that the
//! line count moved by exactly the diff's declared delta. Any disagreement
//! is a divergence: the task fails and is not retried.

use crate::ports::{fetch_fresh, with_deadline, ContentSource, PatchTool};
use crate::types::{ApplyResult, BatchContext, PatchCandidate};
use diffsmith_grammar::{line_count, UnifiedDiff};
use std::sync::Arc;
use std::time::Duration;

/// Commits validated candidates to the live target
pub struct PatchApplier {
    source: Arc<dyn ContentSource>,
    tool: Arc<dyn PatchTool>,
    fetch_timeout: Duration,
    apply_timeout: Duration,
}

impl std::fmt::Debug for PatchApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchApplier")
            .field("fetch_timeout", &self.fetch_timeout)
            .field("apply_timeout", &self.apply_timeout)
            .finish_non_exhaustive()
    }
}

impl PatchApplier {
    /// Create applier
    #[must_use]
    pub fn new(
        source: Arc<dyn ContentSource>,
        tool: Arc<dyn PatchTool>,
        fetch_timeout: Duration,
        apply_timeout: Duration,
    ) -> Self {
        Self {
            source,
            tool,
            fetch_timeout,
            apply_timeout,
        }
    }

    /// Commit `candidate`; only call after it validated
    pub async fn apply(&self, ctx: &BatchContext, candidate: &PatchCandidate) -> ApplyResult {
        let category = candidate.category();
        let file_name = ctx.file_name(category);

        let before = match fetch_fresh(self.source.as_ref(), ctx, category, self.fetch_timeout).await {
            Ok(content) => content,
            Err(e) => return not_applied(String::new(), format!("could not read {file_name} before commit: {e}")),
        };

        let Some(text) = candidate.diff_text() else {
            return ApplyResult {
                applied: false,
                resulting_content: before,
                message: "SKIP candidate: nothing to apply".to_string(),
            };
        };
        let diff = match UnifiedDiff::parse(text) {
            Ok(diff) => diff,
            Err(e) => return not_applied(before, format!("candidate no longer parses: {e}")),
        };

        let commit = with_deadline("commit", self.apply_timeout, self.tool.commit_apply(ctx, category, text)).await;
        let output = match commit {
            Ok(output) if output.succeeded() => output,
            Ok(output) => {
                tracing::error!(
                    "Commit of {} failed after a passing dry run (exit {})",
                    file_name,
                    output.exit_code
                );
                return not_applied(
                    before,
                    format!(
                        "commit failed after a passing dry run (exit {}): {}",
                        output.exit_code,
                        output.output.trim()
                    ),
                );
            }
            Err(e) => {
                tracing::error!("Commit of {} did not complete: {}", file_name, e);
                return not_applied(before, format!("commit did not complete: {e}"));
            }
        };

        let after = match fetch_fresh(self.source.as_ref(), ctx, category, self.fetch_timeout).await {
            Ok(content) => content,
            Err(e) => return not_applied(before, format!("committed, but could not re-read {file_name}: {e}")),
        };

        let expected = line_count(&before) as isize + diff.line_delta();
        let actual = line_count(&after) as isize;
        if actual != expected {
            tracing::error!(
                "Divergence in {}: expected {} lines after commit, found {}",
                file_name,
                expected,
                actual
            );
            return ApplyResult {
                applied: false,
                resulting_content: after,
                message: format!(
                    "divergence: {file_name} has {actual} lines after commit, expected {expected} \
                     ({} before, delta {:+})",
                    line_count(&before),
                    diff.line_delta()
                ),
            };
        }

        tracing::debug!("Applied candidate to {}: {}", file_name, output.output.trim());
        ApplyResult {
            applied: true,
            resulting_content: after,
            message: output.output.trim().to_string(),
        }
    }
}

fn not_applied(content: String, message: String) -> ApplyResult {
    ApplyResult {
        applied: false,
        resulting_content: content,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::ports::{MockContentSource, MockPatchTool};
    use crate::types::{Category, ToolOutput};
    use parking_lot::Mutex;

    const PAGE: &str = "<h1>\nHi\n</h1>\n";
    const INSERT: &str = "--- index.html\n+++ index.html\n@@ -1,3 +1,4 @@\n <h1>\n Hi\n+there\n </h1>\n";

    fn candidate() -> PatchCandidate {
        PatchCandidate::Diff {
            category: Category::Structure,
            text: INSERT.to_string(),
        }
    }

    /// Source that serves `before` until a commit happens, then `after`
    fn two_state_source(before: &'static str, after: &'static str, committed: Arc<Mutex<bool>>) -> MockContentSource {
        let mut source = MockContentSource::new();
        source.expect_fetch_content().returning(move |_, _| {
            Ok(if *committed.lock() { after } else { before }.to_string())
        });
        source
    }

    fn committing_tool(committed: Arc<Mutex<bool>>) -> MockPatchTool {
        let mut tool = MockPatchTool::new();
        tool.expect_commit_apply().times(1).returning(move |_, _, _| {
            *committed.lock() = true;
            Ok(ToolOutput::success("patching file index.html"))
        });
        tool
    }

    fn applier(source: MockContentSource, tool: MockPatchTool) -> PatchApplier {
        PatchApplier::new(
            Arc::new(source),
            Arc::new(tool),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn commit_returns_fresh_content() {
        let committed = Arc::new(Mutex::new(false));
        let source = two_state_source(PAGE, "<h1>\nHi\nthere\n</h1>\n", Arc::clone(&committed));
        let result = applier(source, committing_tool(committed))
            .apply(&BatchContext::new("site"), &candidate())
            .await;

        assert!(result.applied, "{}", result.message);
        assert_eq!(result.resulting_content, "<h1>\nHi\nthere\n</h1>\n");
        assert_eq!(result.message, "patching file index.html");
    }

    #[tokio::test]
    async fn line_count_disagreement_is_divergence() {
        let committed = Arc::new(Mutex::new(false));
        let source = two_state_source(PAGE, "<h1>\nHi\nthere\nand more\n</h1>\n", Arc::clone(&committed));
        let result = applier(source, committing_tool(committed))
            .apply(&BatchContext::new("site"), &candidate())
            .await;

        assert!(!result.applied);
        assert!(result.message.starts_with("divergence: index.html has 5 lines after commit, expected 4"));
    }

    #[tokio::test]
    async fn failed_commit_is_not_applied() {
        let mut tool = MockPatchTool::new();
        tool.expect_commit_apply()
            .returning(|_, _, _| Ok(ToolOutput::failure(1, "Hunk #1 FAILED at 1.")));
        let mut source = MockContentSource::new();
        source.expect_fetch_content().returning(|_, _| Ok(PAGE.to_string()));

        let result = applier(source, tool).apply(&BatchContext::new("site"), &candidate()).await;
        assert!(!result.applied);
        assert_eq!(result.resulting_content, PAGE);
        assert!(result.message.contains("Hunk #1 FAILED"));
    }

    #[tokio::test]
    async fn commit_timeout_is_not_applied() {
        let mut tool = MockPatchTool::new();
        tool.expect_commit_apply().returning(|_, _, _| {
            Err(TransportError::Timeout {
                operation: "commit".into(),
                secs: 1,
            })
        });
        let mut source = MockContentSource::new();
        source.expect_fetch_content().returning(|_, _| Ok(PAGE.to_string()));

        let result = applier(source, tool).apply(&BatchContext::new("site"), &candidate()).await;
        assert!(!result.applied);
        assert_eq!(result.message, "commit did not complete: commit timed out after 1s");
    }
}
