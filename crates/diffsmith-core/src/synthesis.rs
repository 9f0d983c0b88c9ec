//! Patch synthesis
//!
//! Owns the prompt contract for producing one candidate diff and the rule
//! for accepting what comes back: the literal `SKIP`, or text that passes
//! the diff grammar, optionally wrapped in a single markdown code fence.
//! Anything else is rejected before a validator round trip.

use crate::error::SynthesisError;
use crate::ports::{with_deadline, TextSynthesizer};
use crate::types::{BatchContext, Category, ContentSnapshot, Note, PatchCandidate, PromptContext, TaskItem};
use diffsmith_grammar::UnifiedDiff;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

/// Reply meaning "this task needs no change to this file"
pub const SKIP_SENTINEL: &str = "SKIP";

const RULES: &str = "You write unified diffs that are applied with `patch -p0` from inside the site directory.

Reply with exactly one of:
- the single word SKIP, when the task needs no change to this file
- one unified diff for this file and nothing else: no explanation, no second file

Diff rules:
1. Start with `--- <file>` then `+++ <file>`, using the bare file name given below (no `a/` or `b/` prefix, no directories).
2. Each hunk starts with `@@ -<old_start>,<old_len> +<new_start>,<new_len> @@`.
3. <old_len> counts context lines plus removed lines; <new_len> counts context lines plus added lines.
4. Context lines start with one space, removed lines with `-`, added lines with `+`.
5. Context and removed lines must match the current file exactly, at the line numbers shown.
6. Put at least one unchanged context line before and after every change, except at the very start or end of the file.
7. Several hunks are allowed; list them top to bottom without overlap. The <new_start> of a later hunk is its <old_start> shifted by the lines added minus removed in earlier hunks.
8. End the diff with a newline.

Example. The file is:
   3| <head>
   4|     <meta charset=\"UTF-8\">
   5|     <title>Welcome My Website!</title>
   6| </head>
To change the title:
--- index.html
+++ index.html
@@ -4,3 +4,3 @@
     <meta charset=\"UTF-8\">
-    <title>Welcome My Website!</title>
+    <title>Hello World!</title>
 </head>
";

/// Builds prompts and accepts replies for one task at a time
///
/// Holds no content between calls; every call gets its snapshot from the caller.
pub struct PatchSynthesizer {
    service: Arc<dyn TextSynthesizer>,
    timeout: Duration,
}

impl std::fmt::Debug for PatchSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchSynthesizer")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl PatchSynthesizer {
    /// Create synthesizer
    #[inline]
    #[must_use]
    pub fn new(service: Arc<dyn TextSynthesizer>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    /// Produce a candidate for `task` against `snapshot`
    ///
    /// # Errors
    /// - [`SynthesisError::Transport`] when the service call fails or times out
    /// - [`SynthesisError::MalformedCandidate`] when the reply is neither SKIP nor a diff
    pub async fn synthesize(
        &self,
        ctx: &BatchContext,
        snapshot: &ContentSnapshot,
        task: &TaskItem,
        notes: &[Note],
        prior_diagnostic: Option<&str>,
    ) -> Result<PatchCandidate, SynthesisError> {
        let file_name = ctx.file_name(snapshot.category());
        let prompt = build_prompt(file_name, snapshot, task, notes, prior_diagnostic);
        let reply = with_deadline("synthesis", self.timeout, self.service.complete(&prompt)).await?;
        accept_reply(snapshot.category(), file_name, &reply)
    }
}

/// Prompt for one synthesis attempt
#[must_use]
pub fn build_prompt(
    file_name: &str,
    snapshot: &ContentSnapshot,
    task: &TaskItem,
    notes: &[Note],
    prior_diagnostic: Option<&str>,
) -> PromptContext {
    let mut user = String::new();
    let _ = writeln!(
        user,
        "File: {file_name} ({} lines, {})",
        snapshot.line_count(),
        snapshot.category().language()
    );
    user.push_str("Current content; the `N| ` prefixes are line numbers, not part of the file:\n");
    user.push_str(&snapshot.numbered());
    let _ = write!(user, "\nTask: {}\n", task.description);

    user.push_str("\nShared identifiers:\n");
    if notes.is_empty() {
        user.push_str("(none)\n");
    }
    for note in notes {
        let _ = writeln!(user, "- {note}");
    }

    if let Some(diagnostic) = prior_diagnostic.filter(|d| !d.trim().is_empty()) {
        let _ = write!(
            user,
            "\nPrevious attempt failed:\n{}\nWrite a new diff against the content above that fixes this.\n",
            diagnostic.trim_end()
        );
    }

    PromptContext::new(RULES, user)
}

/// Accept a reply as SKIP or a grammar-conformant diff for `file_name`
///
/// # Errors
/// Returns [`SynthesisError::MalformedCandidate`] with the grammar diagnostic
pub fn accept_reply(
    category: Category,
    file_name: &str,
    reply: &str,
) -> Result<PatchCandidate, SynthesisError> {
    let normalized = reply.replace("\r\n", "\n");
    let body = strip_fence(normalized.trim_start_matches(['\n', ' ']))?;

    if body.trim() == SKIP_SENTINEL {
        return Ok(PatchCandidate::Skip { category });
    }

    // a trailing empty line can be blank context, so only add a missing terminator
    let text = if body.ends_with('\n') {
        body.to_string()
    } else {
        format!("{body}\n")
    };
    let diff = UnifiedDiff::parse(&text).map_err(|e| SynthesisError::MalformedCandidate(e.to_string()))?;
    if !diff.target().matches(file_name) {
        return Err(SynthesisError::MalformedCandidate(format!(
            "diff patches '{}' but this task edits '{file_name}'",
            diff.target()
        )));
    }

    Ok(PatchCandidate::Diff { category, text })
}

/// Remove one surrounding markdown fence, if present
fn strip_fence(text: &str) -> Result<&str, SynthesisError> {
    if !text.starts_with("```") {
        return Ok(text);
    }
    let Some((_, rest)) = text.split_once('\n') else {
        return Err(SynthesisError::MalformedCandidate("code fence has no content".into()));
    };
    let Some(inner) = rest.trim_end_matches(['\n', ' ']).strip_suffix("```") else {
        return Err(SynthesisError::MalformedCandidate(
            "code fence is not closed at the end of the reply; reply with the diff only".into(),
        ));
    };
    if inner.contains("\n```") {
        return Err(SynthesisError::MalformedCandidate(
            "reply contains more than one code block; reply with one diff only".into(),
        ));
    }
    Ok(inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::ports::MockTextSynthesizer;
    use pretty_assertions::assert_eq;

    const DIFF: &str = "--- index.html
+++ index.html
@@ -1,2 +1,2 @@
 <h1>
-Hi
+Hello
";

    fn snapshot() -> ContentSnapshot {
        ContentSnapshot::new(Category::Structure, "<h1>\nHi\n</h1>\n")
    }

    fn task() -> TaskItem {
        TaskItem::new(Category::Structure, "Change the heading text to Hello", 0)
    }

    #[test]
    fn skip_is_accepted() {
        let candidate = accept_reply(Category::Style, "index.css", "  SKIP\n").unwrap();
        assert_eq!(candidate, PatchCandidate::Skip { category: Category::Style });
    }

    #[test]
    fn fenced_diff_is_unwrapped() {
        let reply = format!("```diff\n{DIFF}```");
        let candidate = accept_reply(Category::Structure, "index.html", &reply).unwrap();
        assert_eq!(candidate.diff_text(), Some(DIFF));
    }

    #[test]
    fn missing_final_newline_is_restored() {
        let candidate = accept_reply(Category::Structure, "index.html", DIFF.trim_end()).unwrap();
        assert_eq!(candidate.diff_text(), Some(DIFF));
    }

    #[test]
    fn blank_final_context_line_survives() {
        let diff = "--- index.css\n+++ index.css\n@@ -1,3 +1,3 @@\n a {\n-  x: 1;\n+  x: 2;\n\n";
        let plain = accept_reply(Category::Style, "index.css", diff).unwrap();
        assert_eq!(plain.diff_text(), Some(diff));

        let fenced = accept_reply(Category::Style, "index.css", &format!("```diff\n{diff}```\n")).unwrap();
        assert_eq!(fenced.diff_text(), Some(diff));
    }

    #[test]
    fn prose_is_malformed() {
        let err = accept_reply(Category::Structure, "index.html", "Sure! Here is the change:\n").unwrap_err();
        assert!(matches!(err, SynthesisError::MalformedCandidate(_)));
    }

    #[test]
    fn prose_around_fence_is_malformed() {
        let reply = format!("Here you go:\n```diff\n{DIFF}```\nLet me know!");
        assert!(accept_reply(Category::Structure, "index.html", &reply).is_err());
    }

    #[test]
    fn wrong_file_is_malformed() {
        let err = accept_reply(Category::Style, "index.css", DIFF).unwrap_err();
        assert_eq!(
            err,
            SynthesisError::MalformedCandidate("diff patches 'index.html' but this task edits 'index.css'".into())
        );
    }

    #[test]
    fn prompt_numbers_lines_and_lists_notes() {
        let notes = vec![Note::new("css-class", "card", "card layout")];
        let prompt = build_prompt("index.html", &snapshot(), &task(), &notes, None);
        assert!(prompt.user.contains("1| <h1>\n2| Hi\n3| </h1>\n"));
        assert!(prompt.user.contains("Task: Change the heading text to Hello"));
        assert!(prompt.user.contains("- css-class: card - card layout"));
        assert!(!prompt.user.contains("Previous attempt failed"));
        assert!(prompt.system.contains("SKIP"));
    }

    #[test]
    fn prompt_carries_prior_diagnostic() {
        let prompt = build_prompt(
            "index.html",
            &snapshot(),
            &task(),
            &[],
            Some("hunk 1: line 2 does not match; expected 'Hey', found 'Hi'"),
        );
        assert!(prompt
            .user
            .contains("Previous attempt failed:\nhunk 1: line 2 does not match; expected 'Hey', found 'Hi'\n"));
        assert!(prompt.user.contains("(none)"));
    }

    #[tokio::test]
    async fn synthesize_calls_service_once() {
        let mut service = MockTextSynthesizer::new();
        service
            .expect_complete()
            .withf(|p| p.user.contains("File: index.html"))
            .times(1)
            .returning(|_| Ok(DIFF.to_string()));

        let synthesizer = PatchSynthesizer::new(Arc::new(service), Duration::from_secs(5));
        let candidate = synthesizer
            .synthesize(&BatchContext::new("site"), &snapshot(), &task(), &[], None)
            .await
            .unwrap();
        assert_eq!(candidate.category(), Category::Structure);
        assert!(!candidate.is_skip());
    }

    #[tokio::test]
    async fn service_failure_is_transport_error() {
        let mut service = MockTextSynthesizer::new();
        service
            .expect_complete()
            .returning(|_| Err(TransportError::Service("rate limited".into())));

        let synthesizer = PatchSynthesizer::new(Arc::new(service), Duration::from_secs(5));
        let err = synthesizer
            .synthesize(&BatchContext::new("site"), &snapshot(), &task(), &[], None)
            .await
            .unwrap_err();
        assert_eq!(err, SynthesisError::Transport(TransportError::Service("rate limited".into())));
    }
}
