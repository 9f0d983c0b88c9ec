//! Patch validation
//!
//! A candidate passes when it:
//! 1. parses under the diff grammar and names the category's file
//! 2. fits the freshly fetched target exactly, checked in memory
//! 3. survives the patch tool's dry run
//!
//! The target is hashed before and after; a dry run that changes it is an
//! integrity failure, reported as invalid.

use crate::ports::{fetch_fresh, with_deadline, ContentSource, PatchTool};
use crate::types::{BatchContext, PatchCandidate, ValidationResult};
use diffsmith_grammar::{ContentHash, UnifiedDiff};
use std::sync::Arc;
use std::time::Duration;

/// Stages candidates against the live target without persisting anything
pub struct PatchValidator {
    source: Arc<dyn ContentSource>,
    tool: Arc<dyn PatchTool>,
    fetch_timeout: Duration,
    dry_run_timeout: Duration,
}

impl std::fmt::Debug for PatchValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchValidator")
            .field("fetch_timeout", &self.fetch_timeout)
            .field("dry_run_timeout", &self.dry_run_timeout)
            .finish_non_exhaustive()
    }
}

impl PatchValidator {
    /// Create validator
    #[must_use]
    pub fn new(
        source: Arc<dyn ContentSource>,
        tool: Arc<dyn PatchTool>,
        fetch_timeout: Duration,
        dry_run_timeout: Duration,
    ) -> Self {
        Self {
            source,
            tool,
            fetch_timeout,
            dry_run_timeout,
        }
    }

    /// Validate `candidate`; SKIP is always valid
    pub async fn validate(&self, ctx: &BatchContext, candidate: &PatchCandidate) -> ValidationResult {
        let Some(text) = candidate.diff_text() else {
            return ValidationResult::valid();
        };
        let category = candidate.category();
        let file_name = ctx.file_name(category);

        let diff = match UnifiedDiff::parse(text) {
            Ok(diff) => diff,
            Err(e) => return ValidationResult::invalid(e.to_string()),
        };
        if !diff.target().matches(file_name) {
            return ValidationResult::invalid(format!(
                "diff patches '{}' but the {category} target is '{file_name}'",
                diff.target()
            ));
        }

        let before = match fetch_fresh(self.source.as_ref(), ctx, category, self.fetch_timeout).await {
            Ok(content) => content,
            Err(e) => return ValidationResult::invalid(format!("could not read {file_name}: {e}")),
        };
        let before_hash = ContentHash::of_text(&before);

        if let Err(failure) = diff.check_against(&before) {
            tracing::debug!("Candidate for {} does not fit: {}", file_name, failure);
            return ValidationResult::invalid(failure.to_string());
        }

        let dry_run = with_deadline(
            "dry run",
            self.dry_run_timeout,
            self.tool.dry_run_apply(ctx, category, text),
        )
        .await;

        let verdict = match dry_run {
            Ok(output) if output.succeeded() => ValidationResult::valid(),
            Ok(output) => {
                let detail = output.output.trim();
                if detail.is_empty() {
                    ValidationResult::invalid(format!("dry run exited with status {}", output.exit_code))
                } else {
                    ValidationResult::invalid(detail.to_string())
                }
            }
            Err(e) => ValidationResult::invalid(format!("dry run failed: {e}")),
        };

        match fetch_fresh(self.source.as_ref(), ctx, category, self.fetch_timeout).await {
            Ok(after) if ContentHash::of_text(&after) == before_hash => verdict,
            Ok(after) => {
                tracing::error!(
                    "Integrity violation: dry run changed {} ({} -> {})",
                    file_name,
                    before_hash.short(),
                    ContentHash::of_text(&after).short()
                );
                ValidationResult::invalid(format!(
                    "integrity: {file_name} changed during the dry run; candidate rejected"
                ))
            }
            Err(e) => ValidationResult::invalid(format!(
                "integrity: could not re-read {file_name} after the dry run: {e}"
            )),
        }
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
    const DIFF: &str = "--- index.html\n+++ index.html\n@@ -1,3 +1,3 @@\n <h1>\n-Hi\n+Hello\n </h1>\n";

    fn candidate(text: &str) -> PatchCandidate {
        PatchCandidate::Diff {
            category: Category::Structure,
            text: text.to_string(),
        }
    }

    fn fixed_source(content: &'static str) -> MockContentSource {
        let mut source = MockContentSource::new();
        source.expect_fetch_content().returning(move |_, _| Ok(content.to_string()));
        source
    }

    fn validator(source: MockContentSource, tool: MockPatchTool) -> PatchValidator {
        PatchValidator::new(
            Arc::new(source),
            Arc::new(tool),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn skip_is_valid_without_calls() {
        let v = validator(MockContentSource::new(), MockPatchTool::new());
        let result = v
            .validate(&BatchContext::new("site"), &PatchCandidate::Skip { category: Category::Style })
            .await;
        assert_eq!(result, ValidationResult::valid());
    }

    #[tokio::test]
    async fn fitting_candidate_is_valid() {
        let mut tool = MockPatchTool::new();
        tool.expect_dry_run_apply()
            .times(1)
            .returning(|_, _, _| Ok(ToolOutput::success("checking file index.html")));
        tool.expect_commit_apply().never();

        let result = validator(fixed_source(PAGE), tool)
            .validate(&BatchContext::new("site"), &candidate(DIFF))
            .await;
        assert!(result.valid, "{}", result.diagnostic);
    }

    #[tokio::test]
    async fn stale_context_fails_before_dry_run() {
        let mut tool = MockPatchTool::new();
        tool.expect_dry_run_apply().never();

        let result = validator(fixed_source("<h2>\nHi\n</h2>\n"), tool)
            .validate(&BatchContext::new("site"), &candidate(DIFF))
            .await;
        assert!(!result.valid);
        assert_eq!(
            result.diagnostic,
            "hunk 1: line 1 does not match; expected '<h1>', found '<h2>'"
        );
    }

    #[tokio::test]
    async fn grammar_error_fails_without_fetch() {
        let bad = DIFF.replace("@@ -1,3 +1,3 @@", "@@ -1,3 +1,9 @@");
        let result = validator(MockContentSource::new(), MockPatchTool::new())
            .validate(&BatchContext::new("site"), &candidate(&bad))
            .await;
        assert!(!result.valid);
        assert!(result.diagnostic.contains("declares 3 old / 9 new"));
    }

    #[tokio::test]
    async fn tool_rejection_is_reported_verbatim() {
        let mut tool = MockPatchTool::new();
        tool.expect_dry_run_apply().returning(|_, _, _| {
            Ok(ToolOutput::failure(
                1,
                "checking file index.html\nHunk #1 FAILED at 1.\n1 out of 1 hunk FAILED\n",
            ))
        });

        let result = validator(fixed_source(PAGE), tool)
            .validate(&BatchContext::new("site"), &candidate(DIFF))
            .await;
        assert!(!result.valid);
        assert_eq!(
            result.diagnostic,
            "checking file index.html\nHunk #1 FAILED at 1.\n1 out of 1 hunk FAILED"
        );
    }

    #[tokio::test]
    async fn tool_timeout_is_invalid() {
        let mut tool = MockPatchTool::new();
        tool.expect_dry_run_apply().returning(|_, _, _| {
            Err(TransportError::Timeout {
                operation: "dry run".into(),
                secs: 1,
            })
        });

        let result = validator(fixed_source(PAGE), tool)
            .validate(&BatchContext::new("site"), &candidate(DIFF))
            .await;
        assert!(!result.valid);
        assert!(result.diagnostic.contains("timed out"));
    }

    #[tokio::test]
    async fn mutating_dry_run_is_integrity_failure() {
        let reads = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&reads);
        let mut source = MockContentSource::new();
        source.expect_fetch_content().returning(move |_, _| {
            let mut n = counter.lock();
            *n += 1;
            Ok(if *n == 1 { PAGE } else { "<h1>\nHello\n</h1>\n" }.to_string())
        });
        let mut tool = MockPatchTool::new();
        tool.expect_dry_run_apply()
            .returning(|_, _, _| Ok(ToolOutput::success("patching file index.html")));

        let result = validator(source, tool)
            .validate(&BatchContext::new("site"), &candidate(DIFF))
            .await;
        assert!(!result.valid);
        assert!(result.diagnostic.starts_with("integrity:"));
        assert_eq!(*reads.lock(), 2);
    }
}
