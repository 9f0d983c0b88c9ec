//! Error types for the diff grammar
//!
//! - [`GrammarError`]: candidate text is not a well-formed unified diff
//! - [`ApplyFailure`]: a well-formed diff does not fit the target content
//!
//! Display strings are diagnostics: they are fed back verbatim into the next
//! synthesis attempt, so each one names the hunk and line at fault.

use crate::hunk::{HeaderError, HunkHeader};
use crate::target::NameError;

/// Violations of the unified-diff grammar
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrammarError {
    /// Nothing but whitespace
    #[error("candidate is empty")]
    Empty,

    /// Last line has no terminator
    #[error("candidate must end with a newline")]
    MissingTrailingNewline,

    /// First line is not `--- <name>`
    #[error("line 1: expected `--- <file name>`, found '{found}'")]
    MissingOldHeader { found: String },

    /// Second line is not `+++ <name>`
    #[error("line 2: expected `+++ <file name>`, found '{found}'")]
    MissingNewHeader { found: String },

    /// Header file name is unusable
    #[error("line {line}: {source}")]
    BadName {
        line: usize,
        #[source]
        source: NameError,
    },

    /// `---` and `+++` disagree
    #[error("`--- {old}` and `+++ {new}` name different files")]
    NameMismatch { old: String, new: String },

    /// More than one file section
    #[error("line {line}: a candidate may patch only one file, found a second `---` header")]
    MultipleFiles { line: usize },

    /// File headers with no hunk
    #[error("candidate contains no hunks")]
    NoHunks,

    /// Line where a hunk header was required
    #[error("line {line}: expected a hunk header `@@ -a,b +c,d @@`, found '{found}'")]
    ExpectedHunkHeader { line: usize, found: String },

    /// Hunk header does not parse
    #[error("hunk {hunk}: {source}")]
    BadHunkHeader {
        hunk: usize,
        #[source]
        source: HeaderError,
    },

    /// Body line with an unknown prefix
    #[error("line {line}: body lines must start with ' ', '-' or '+', found '{found}'")]
    InvalidLinePrefix { line: usize, found: String },

    /// Header lengths disagree with the body
    #[error(
        "hunk {hunk}: header `{header}` declares {declared_old} old / {declared_new} new lines \
         but the body has {counted_old} old (context + removed) / {counted_new} new (context + added)",
        declared_old = header.old_len,
        declared_new = header.new_len
    )]
    CountMismatch {
        hunk: usize,
        header: HunkHeader,
        counted_old: usize,
        counted_new: usize,
    },

    /// Body continues past the declared lengths
    #[error("line {line}: '{found}' lies beyond the lines declared by hunk {hunk}'s header")]
    ExtraLine {
        hunk: usize,
        line: usize,
        found: String,
    },

    /// Hunk changes nothing
    #[error("hunk {hunk}: contains no added or removed lines")]
    NoChanges { hunk: usize },

    /// Hunk has no context line at all
    #[error("hunk {hunk}: contains only added/removed lines; include unchanged context lines before and after the change")]
    MissingContext { hunk: usize },

    /// First line is a change although the hunk does not start at line 1
    #[error("hunk {hunk}: starts at line {start} with a changed line; at least one context line must precede the change")]
    MissingLeadingContext { hunk: usize, start: usize },

    /// Zero start line
    #[error("hunk {hunk}: line numbers start at 1")]
    ZeroStart { hunk: usize },

    /// Hunks out of order or overlapping
    #[error("hunk {hunk}: starts at line {start}, which is not after the previous hunk's last line {previous_end}")]
    Overlap {
        hunk: usize,
        start: usize,
        previous_end: usize,
    },

    /// New start inconsistent with earlier hunks' line deltas
    #[error("hunk {hunk}: new start should be {expected} (old start plus the line changes of earlier hunks), found {found}")]
    OffsetMismatch {
        hunk: usize,
        expected: isize,
        found: usize,
    },
}

/// A well-formed diff that does not fit the content it was applied to
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyFailure {
    /// Context or removed line differs from the target
    #[error("hunk {hunk}: line {line} does not match; expected '{expected}', found '{found}'")]
    Mismatch {
        hunk: usize,
        line: usize,
        expected: String,
        found: String,
    },

    /// Hunk reaches past the end of the target
    #[error("hunk {hunk}: expects '{expected}' at line {line}, but the file has only {total} lines")]
    OutOfRange {
        hunk: usize,
        line: usize,
        expected: String,
        total: usize,
    },

    /// Hunk without trailing context that does not end at end of file
    #[error("hunk {hunk}: ends with a changed line at line {ends_at} of {total}; add a context line after the change")]
    MissingTrailingContext {
        hunk: usize,
        ends_at: usize,
        total: usize,
    },
}

impl ApplyFailure {
    /// Hunk the failure belongs to (1-based)
    #[inline]
    #[must_use]
    pub fn hunk(&self) -> usize {
        match self {
            Self::Mismatch { hunk, .. }
            | Self::OutOfRange { hunk, .. }
            | Self::MissingTrailingContext { hunk, .. } => *hunk,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_mismatch_names_header_and_counts() {
        let err = GrammarError::CountMismatch {
            hunk: 1,
            header: HunkHeader::new(10, 3, 10, 18),
            counted_old: 2,
            counted_new: 15,
        };
        let msg = err.to_string();
        assert!(msg.contains("@@ -10,3 +10,18 @@"));
        assert!(msg.contains("3 old / 18 new"));
        assert!(msg.contains("2 old"));
    }

    #[test]
    fn mismatch_names_line_and_texts() {
        let err = ApplyFailure::Mismatch {
            hunk: 1,
            line: 10,
            expected: "  <body>".into(),
            found: "</html>".into(),
        };
        assert_eq!(
            err.to_string(),
            "hunk 1: line 10 does not match; expected '  <body>', found '</html>'"
        );
        assert_eq!(err.hunk(), 1);
    }

    #[test]
    fn bad_name_keeps_source() {
        let err = GrammarError::BadName {
            line: 1,
            source: NameError::NotBare("a/index.html".into()),
        };
        assert!(err.to_string().starts_with("line 1: 'a/index.html' is not a bare file name"));
    }
}
