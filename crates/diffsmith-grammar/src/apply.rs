//! Exact application of a parsed diff to text
//!
//! No fuzz and no offset search: every context and removed line must sit at
//! the position its hunk header declares.

use crate::diff::UnifiedDiff;
use crate::error::ApplyFailure;

impl UnifiedDiff {
    /// Check that every hunk fits `content` without producing output
    ///
    /// # Errors
    /// Returns the first hunk line that does not fit
    pub fn check_against(&self, content: &str) -> Result<(), ApplyFailure> {
        let (lines, _) = split_lines(content);
        self.check_lines(&lines)
    }

    /// Apply every hunk to `content`, returning the new text
    ///
    /// The trailing-newline state of `content` is preserved.
    ///
    /// # Errors
    /// Returns the first hunk line that does not fit; nothing is produced
    pub fn apply_to(&self, content: &str) -> Result<String, ApplyFailure> {
        let (lines, ends_with_newline) = split_lines(content);
        self.check_lines(&lines)?;

        let mut out: Vec<&str> = Vec::with_capacity(lines.len());
        let mut cursor = 0;
        for hunk in self.hunks() {
            let start = hunk.header().old_start - 1;
            out.extend_from_slice(&lines[cursor..start]);
            out.extend(hunk.new_lines());
            cursor = start + hunk.header().old_len;
        }
        out.extend_from_slice(&lines[cursor..]);

        let mut result = out.join("\n");
        if ends_with_newline && !out.is_empty() {
            result.push('\n');
        }
        Ok(result)
    }

    fn check_lines(&self, lines: &[&str]) -> Result<(), ApplyFailure> {
        let total = lines.len();

        for (i, hunk) in self.hunks().iter().enumerate() {
            let number = i + 1;
            let start = hunk.header().old_start - 1;

            for (offset, expected) in hunk.old_lines().enumerate() {
                let index = start + offset;
                match lines.get(index) {
                    None => {
                        return Err(ApplyFailure::OutOfRange {
                            hunk: number,
                            line: index + 1,
                            expected: expected.to_string(),
                            total,
                        })
                    }
                    Some(found) if *found != expected => {
                        return Err(ApplyFailure::Mismatch {
                            hunk: number,
                            line: index + 1,
                            expected: expected.to_string(),
                            found: (*found).to_string(),
                        })
                    }
                    Some(_) => {}
                }
            }

            let ends_at = hunk.header().old_end();
            if !hunk.has_trailing_context() && ends_at != total {
                return Err(ApplyFailure::MissingTrailingContext {
                    hunk: number,
                    ends_at,
                    total,
                });
            }
        }

        Ok(())
    }
}

/// Split into lines without terminators; empty content counts as terminated
fn split_lines(content: &str) -> (Vec<&str>, bool) {
    if content.is_empty() {
        return (Vec::new(), true);
    }
    let ends_with_newline = content.ends_with('\n');
    let mut lines: Vec<&str> = content.split('\n').collect();
    if ends_with_newline {
        lines.pop();
    }
    (lines, ends_with_newline)
}

/// Number of lines in `content`, counted the way [`UnifiedDiff::apply_to`] does
#[must_use]
pub fn line_count(content: &str) -> usize {
    split_lines(content).0.len()
}
