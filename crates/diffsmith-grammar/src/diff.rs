//! Unified diff documents
//!
//! ```text
//! --- <name>
//! +++ <name>
//! @@ -<old_start>,<old_len> +<new_start>,<new_len> @@
//!  <context line>
//! -<removed line>
//! +<added line>
//! ```
//!
//! [`UnifiedDiff::parse`] is the authoritative grammar gate. It reads each
//! hunk body by the lengths its header declares, so a removed line that
//! happens to start with `-- ` is never mistaken for a file header.

use crate::error::GrammarError;
use crate::hunk::{Hunk, HunkHeader, HunkLine};
use crate::target::TargetName;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A single-file unified diff that passed every grammar rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnifiedDiff {
    target: TargetName,
    hunks: Vec<Hunk>,
}

impl UnifiedDiff {
    /// Build a diff from hunks, enforcing the same rules as [`parse`](Self::parse)
    ///
    /// # Errors
    /// Returns the first violated rule
    pub fn new(target: TargetName, hunks: Vec<Hunk>) -> Result<Self, GrammarError> {
        if hunks.is_empty() {
            return Err(GrammarError::NoHunks);
        }
        for (i, hunk) in hunks.iter().enumerate() {
            let (counted_old, counted_new) = hunk.counted_lengths();
            let header = *hunk.header();
            if counted_old != header.old_len || counted_new != header.new_len {
                return Err(GrammarError::CountMismatch {
                    hunk: i + 1,
                    header,
                    counted_old,
                    counted_new,
                });
            }
        }
        check_structure(&hunks)?;
        Ok(Self { target, hunks })
    }

    /// Parse candidate text
    ///
    /// # Errors
    /// Returns the first grammar violation, with line and hunk numbers
    pub fn parse(text: &str) -> Result<Self, GrammarError> {
        if text.trim().is_empty() {
            return Err(GrammarError::Empty);
        }
        if !text.ends_with('\n') {
            return Err(GrammarError::MissingTrailingNewline);
        }

        // drop only the final terminator; a bare empty line may be blank context
        let mut lines: Vec<&str> = text.split('\n').collect();
        lines.pop();

        let old_line = lines.first().copied().unwrap_or_default();
        let old_raw = old_line
            .strip_prefix("--- ")
            .ok_or_else(|| GrammarError::MissingOldHeader {
                found: old_line.to_string(),
            })?;
        let new_line = lines.get(1).copied().unwrap_or_default();
        let new_raw = new_line
            .strip_prefix("+++ ")
            .ok_or_else(|| GrammarError::MissingNewHeader {
                found: new_line.to_string(),
            })?;

        let old_name: TargetName = old_raw
            .parse()
            .map_err(|source| GrammarError::BadName { line: 1, source })?;
        let new_name: TargetName = new_raw
            .parse()
            .map_err(|source| GrammarError::BadName { line: 2, source })?;
        if old_name != new_name {
            return Err(GrammarError::NameMismatch {
                old: old_name.to_string(),
                new: new_name.to_string(),
            });
        }

        let mut hunks = Vec::new();
        let mut pos = 2;
        while pos < lines.len() {
            if lines[pos..].iter().all(|l| l.is_empty()) {
                break;
            }
            let line = lines[pos];
            if line.starts_with("--- ") {
                return Err(GrammarError::MultipleFiles { line: pos + 1 });
            }
            if !line.starts_with("@@") {
                let err = match hunks.len() {
                    0 => GrammarError::ExpectedHunkHeader {
                        line: pos + 1,
                        found: line.to_string(),
                    },
                    n => GrammarError::ExtraLine {
                        hunk: n,
                        line: pos + 1,
                        found: line.to_string(),
                    },
                };
                return Err(err);
            }

            let number = hunks.len() + 1;
            let header: HunkHeader = line
                .parse()
                .map_err(|source| GrammarError::BadHunkHeader { hunk: number, source })?;
            pos += 1;

            let (body, next) = read_body(&lines, pos, &header)?;
            pos = next;

            let hunk = Hunk::new(header, body);
            let (counted_old, counted_new) = hunk.counted_lengths();
            if counted_old != header.old_len || counted_new != header.new_len {
                return Err(GrammarError::CountMismatch {
                    hunk: number,
                    header,
                    counted_old,
                    counted_new,
                });
            }
            hunks.push(hunk);
        }

        if hunks.is_empty() {
            return Err(GrammarError::NoHunks);
        }
        check_structure(&hunks)?;

        Ok(Self {
            target: old_name,
            hunks,
        })
    }

    /// File the diff patches
    #[inline]
    #[must_use]
    pub fn target(&self) -> &TargetName {
        &self.target
    }

    /// Hunks in file order
    #[inline]
    #[must_use]
    pub fn hunks(&self) -> &[Hunk] {
        &self.hunks
    }

    /// Total line-count change, the sum of `new_len - old_len` over all hunks
    #[must_use]
    pub fn line_delta(&self) -> isize {
        self.hunks.iter().map(|h| h.header().line_delta()).sum()
    }
}

impl FromStr for UnifiedDiff {
    type Err = GrammarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for UnifiedDiff {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- {}", self.target)?;
        writeln!(f, "+++ {}", self.target)?;
        for hunk in &self.hunks {
            write!(f, "{hunk}")?;
        }
        Ok(())
    }
}

/// Read body lines until the header's lengths are satisfied
///
/// Stops early at a hunk header or end of input; the caller turns the short
/// count into a [`GrammarError::CountMismatch`].
fn read_body(
    lines: &[&str],
    mut pos: usize,
    header: &HunkHeader,
) -> Result<(Vec<HunkLine>, usize), GrammarError> {
    let mut body = Vec::new();
    let (mut old_seen, mut new_seen) = (0usize, 0usize);

    while old_seen < header.old_len || new_seen < header.new_len {
        let Some(&line) = lines.get(pos) else { break };
        if line.starts_with("@@") {
            break;
        }
        pos += 1;

        let parsed = match line.chars().next() {
            // "\ No newline at end of file"
            Some('\\') => continue,
            Some(' ') => HunkLine::Context(line[1..].to_string()),
            Some('-') => HunkLine::Removed(line[1..].to_string()),
            Some('+') => HunkLine::Added(line[1..].to_string()),
            // GNU patch reads a fully empty body line as blank context
            None => HunkLine::Context(String::new()),
            Some(_) => {
                return Err(GrammarError::InvalidLinePrefix {
                    line: pos,
                    found: line.to_string(),
                })
            }
        };
        if parsed.is_old() {
            old_seen += 1;
        }
        if parsed.is_new() {
            new_seen += 1;
        }
        body.push(parsed);
    }

    while lines.get(pos).is_some_and(|l| l.starts_with('\\')) {
        pos += 1;
    }

    Ok((body, pos))
}

/// Context, ordering, and cumulative-offset rules across hunks
fn check_structure(hunks: &[Hunk]) -> Result<(), GrammarError> {
    let mut offset: isize = 0;
    let mut previous_end: Option<usize> = None;

    for (i, hunk) in hunks.iter().enumerate() {
        let number = i + 1;
        let header = hunk.header();

        if !hunk.has_changes() {
            return Err(GrammarError::NoChanges { hunk: number });
        }
        if !hunk.lines().iter().any(HunkLine::is_context) {
            return Err(GrammarError::MissingContext { hunk: number });
        }
        if header.old_start == 0 {
            return Err(GrammarError::ZeroStart { hunk: number });
        }
        if !hunk.has_leading_context() && header.old_start > 1 {
            return Err(GrammarError::MissingLeadingContext {
                hunk: number,
                start: header.old_start,
            });
        }
        if let Some(previous_end) = previous_end {
            if header.old_start <= previous_end {
                return Err(GrammarError::Overlap {
                    hunk: number,
                    start: header.old_start,
                    previous_end,
                });
            }
        }

        let expected = header.old_start as isize + offset;
        if header.new_start as isize != expected {
            return Err(GrammarError::OffsetMismatch {
                hunk: number,
                expected,
                found: header.new_start,
            });
        }

        offset += header.line_delta();
        previous_end = Some(header.old_end());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TITLE_DIFF: &str = "--- index.html
+++ index.html
@@ -4,3 +4,3 @@
     <meta charset=\"UTF-8\">
-    <title>Welcome My Website!</title>
+    <title>Hello World!</title>
 </head>
";

    #[test]
    fn parses_single_hunk() {
        let diff = UnifiedDiff::parse(TITLE_DIFF).unwrap();
        assert_eq!(diff.target().as_str(), "index.html");
        assert_eq!(diff.hunks().len(), 1);
        assert_eq!(*diff.hunks()[0].header(), HunkHeader::new(4, 3, 4, 3));
        assert_eq!(diff.line_delta(), 0);
    }

    #[test]
    fn display_reproduces_canonical_text() {
        let diff = UnifiedDiff::parse(TITLE_DIFF).unwrap();
        assert_eq!(diff.to_string(), TITLE_DIFF);
    }

    #[test]
    fn missing_trailing_newline_is_rejected() {
        let text = TITLE_DIFF.trim_end();
        assert_eq!(
            UnifiedDiff::parse(text),
            Err(GrammarError::MissingTrailingNewline)
        );
    }

    #[test]
    fn huge_start_is_a_header_error() {
        let text = "--- index.js\n+++ index.js\n@@ -18446744073709551615,2 +18446744073709551615,2 @@\n a\n-b\n+c\n";
        assert!(matches!(
            UnifiedDiff::parse(text),
            Err(GrammarError::BadHunkHeader { hunk: 1, .. })
        ));
    }

    #[test]
    fn bare_empty_last_line_is_blank_context() {
        let text = "--- index.css\n+++ index.css\n@@ -1,3 +1,3 @@\n a {\n-  x: 1;\n+  x: 2;\n\n";
        let diff = UnifiedDiff::parse(text).unwrap();
        assert_eq!(
            diff.hunks()[0].lines().last(),
            Some(&HunkLine::Context(String::new()))
        );
        assert_eq!(diff.apply_to("a {\n  x: 1;\n\n}\n").unwrap(), "a {\n  x: 2;\n\n}\n");
    }

    #[test]
    fn surplus_trailing_blank_lines_are_ignored() {
        let text = format!("{TITLE_DIFF}\n\n");
        let diff = UnifiedDiff::parse(&text).unwrap();
        assert_eq!(diff.to_string(), TITLE_DIFF);
    }

    #[test]
    fn empty_is_rejected() {
        assert_eq!(UnifiedDiff::parse("  \n"), Err(GrammarError::Empty));
    }

    #[test]
    fn prose_before_header_is_rejected() {
        let text = format!("Here is the diff:\n{TITLE_DIFF}");
        assert!(matches!(
            UnifiedDiff::parse(&text),
            Err(GrammarError::MissingOldHeader { .. })
        ));
    }

    #[test]
    fn strip_depth_one_names_are_rejected() {
        let text = TITLE_DIFF
            .replace("--- index.html", "--- a/index.html")
            .replace("+++ index.html", "+++ b/index.html");
        assert!(matches!(
            UnifiedDiff::parse(&text),
            Err(GrammarError::BadName { line: 1, .. })
        ));
    }

    #[test]
    fn header_names_must_agree() {
        let text = TITLE_DIFF.replace("+++ index.html", "+++ index.css");
        assert!(matches!(
            UnifiedDiff::parse(&text),
            Err(GrammarError::NameMismatch { .. })
        ));
    }

    #[test]
    fn wrong_lengths_are_rejected() {
        let text = "--- index.html
+++ index.html
@@ -10,3 +10,18 @@
  <body>
+    <nav class=\"bg-gray-800 p-4\">
+    </nav>
     <h1 class=\"text-3xl font-bold underline\">Welcome My Website!</h1>
";
        let err = UnifiedDiff::parse(text).unwrap_err();
        assert_eq!(
            err,
            GrammarError::CountMismatch {
                hunk: 1,
                header: HunkHeader::new(10, 3, 10, 18),
                counted_old: 2,
                counted_new: 4,
            }
        );
    }

    #[test]
    fn body_longer_than_header_is_rejected() {
        let text = "--- index.css
+++ index.css
@@ -1,2 +1,2 @@
 body {
-  margin: 0;
+  margin: 4px;
 }
";
        assert!(matches!(
            UnifiedDiff::parse(text),
            Err(GrammarError::ExtraLine { hunk: 1, line: 7, .. })
        ));
    }

    #[test]
    fn only_added_lines_is_rejected() {
        let text = "--- index.js
+++ index.js
@@ -1,0 +1,2 @@
+const a = 1;
+const b = 2;
";
        assert_eq!(
            UnifiedDiff::parse(text),
            Err(GrammarError::MissingContext { hunk: 1 })
        );
    }

    #[test]
    fn change_without_leading_context_mid_file_is_rejected() {
        let text = "--- index.js
+++ index.js
@@ -5,2 +5,2 @@
-let x = 1;
+let x = 2;
 console.log(x);
";
        assert_eq!(
            UnifiedDiff::parse(text),
            Err(GrammarError::MissingLeadingContext { hunk: 1, start: 5 })
        );
    }

    #[test]
    fn change_at_first_line_needs_no_leading_context() {
        let text = "--- index.js
+++ index.js
@@ -1,2 +1,2 @@
-let x = 1;
+let x = 2;
 console.log(x);
";
        assert!(UnifiedDiff::parse(text).is_ok());
    }

    #[test]
    fn context_only_hunk_is_rejected() {
        let text = "--- index.js
+++ index.js
@@ -1,1 +1,1 @@
 let x = 1;
";
        assert_eq!(
            UnifiedDiff::parse(text),
            Err(GrammarError::NoChanges { hunk: 1 })
        );
    }

    #[test]
    fn second_file_is_rejected() {
        let text = format!("{TITLE_DIFF}--- index.css\n+++ index.css\n");
        assert!(matches!(
            UnifiedDiff::parse(&text),
            Err(GrammarError::MultipleFiles { line: 8 })
        ));
    }

    #[test]
    fn removed_line_starting_with_dashes_is_body() {
        let text = "--- index.css
+++ index.css
@@ -1,3 +1,2 @@
 a {
--- legacy;
 }
";
        let diff = UnifiedDiff::parse(text).unwrap();
        assert_eq!(
            diff.hunks()[0].lines()[1],
            HunkLine::Removed("-- legacy;".into())
        );
    }

    #[test]
    fn multiple_hunks_track_cumulative_offset() {
        let text = "--- index.js
+++ index.js
@@ -1,2 +1,3 @@
 a
+b
 c
@@ -5,3 +6,2 @@
 e
-f
 g
";
        let diff = UnifiedDiff::parse(text).unwrap();
        assert_eq!(diff.hunks().len(), 2);
        assert_eq!(diff.line_delta(), 0);
    }

    #[test]
    fn inconsistent_second_hunk_offset_is_rejected() {
        let text = "--- index.js
+++ index.js
@@ -1,2 +1,3 @@
 a
+b
 c
@@ -5,3 +5,2 @@
 e
-f
 g
";
        assert_eq!(
            UnifiedDiff::parse(text),
            Err(GrammarError::OffsetMismatch {
                hunk: 2,
                expected: 6,
                found: 5
            })
        );
    }

    #[test]
    fn overlapping_hunks_are_rejected() {
        let text = "--- index.js
+++ index.js
@@ -1,3 +1,3 @@
 a
-b
+B
 c
@@ -3,2 +3,2 @@
 c
-d
+D
";
        assert!(matches!(
            UnifiedDiff::parse(text),
            Err(GrammarError::Overlap { hunk: 2, start: 3, previous_end: 3 })
        ));
    }

    #[test]
    fn no_newline_marker_is_accepted() {
        let text = "--- index.js
+++ index.js
@@ -1,2 +1,2 @@
 a
-b
\\ No newline at end of file
+c
\\ No newline at end of file
";
        let diff = UnifiedDiff::parse(text).unwrap();
        assert_eq!(diff.hunks()[0].counted_lengths(), (2, 2));
    }

    #[test]
    fn new_checks_lengths() {
        let name: TargetName = "index.js".parse().unwrap();
        let hunk = Hunk::new(
            HunkHeader::new(1, 5, 1, 5),
            vec![HunkLine::Context("a".into()), HunkLine::Added("b".into())],
        );
        assert!(matches!(
            UnifiedDiff::new(name, vec![hunk]),
            Err(GrammarError::CountMismatch { .. })
        ));
    }
}
