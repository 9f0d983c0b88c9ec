//! Hunks and hunk headers
//!
//! A hunk is one contiguous block of context, removed, and added lines under
//! an `@@ -a,b +c,d @@` header. `b` counts context + removed lines, `d`
//! counts context + added lines.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Parsed `@@ -old_start,old_len +new_start,new_len @@` line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HunkHeader {
    /// First line of the hunk in the target (1-based)
    pub old_start: usize,
    /// Context + removed lines
    pub old_len: usize,
    /// First line of the hunk in the result (1-based)
    pub new_start: usize,
    /// Context + added lines
    pub new_len: usize,
}

impl HunkHeader {
    /// Create a header
    #[inline]
    #[must_use]
    pub const fn new(old_start: usize, old_len: usize, new_start: usize, new_len: usize) -> Self {
        Self {
            old_start,
            old_len,
            new_start,
            new_len,
        }
    }

    /// Line-count change this hunk produces (`new_len - old_len`)
    #[inline]
    #[must_use]
    pub fn line_delta(&self) -> isize {
        self.new_len as isize - self.old_len as isize
    }

    /// Last target line covered by the hunk (1-based, inclusive)
    #[inline]
    #[must_use]
    pub fn old_end(&self) -> usize {
        self.old_start.saturating_add(self.old_len).saturating_sub(1)
    }
}

impl Display for HunkHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_len, self.new_start, self.new_len
        )
    }
}

impl FromStr for HunkHeader {
    type Err = HeaderError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let rest = line
            .strip_prefix("@@ ")
            .ok_or_else(|| HeaderError(line.to_string()))?;
        let end = rest.find(" @@").ok_or_else(|| HeaderError(line.to_string()))?;
        let mut ranges = rest[..end].split(' ');

        let old = ranges
            .next()
            .and_then(|r| r.strip_prefix('-'))
            .ok_or_else(|| HeaderError(line.to_string()))?;
        let new = ranges
            .next()
            .and_then(|r| r.strip_prefix('+'))
            .ok_or_else(|| HeaderError(line.to_string()))?;
        if ranges.next().is_some() {
            return Err(HeaderError(line.to_string()));
        }

        let (old_start, old_len) = parse_range(old).ok_or_else(|| HeaderError(line.to_string()))?;
        let (new_start, new_len) = parse_range(new).ok_or_else(|| HeaderError(line.to_string()))?;

        Ok(Self::new(old_start, old_len, new_start, new_len))
    }
}

/// `start[,len]`; an omitted length means 1
///
/// Both numbers must fit in `u32` and so must `start + len`, which keeps all
/// later line arithmetic free of overflow.
fn parse_range(range: &str) -> Option<(usize, usize)> {
    let (start, len) = match range.split_once(',') {
        Some((start, len)) => (start.parse::<u32>().ok()?, len.parse::<u32>().ok()?),
        None => (range.parse::<u32>().ok()?, 1),
    };
    start.checked_add(len)?;
    Some((start as usize, len as usize))
}

/// Malformed hunk header
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed hunk header '{0}', expected `@@ -<start>,<len> +<start>,<len> @@`")]
pub struct HeaderError(pub String);

/// One body line of a hunk
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HunkLine {
    /// Unchanged line (prefix: one space)
    Context(String),
    /// Line removed from the target (prefix: `-`)
    Removed(String),
    /// Line added to the result (prefix: `+`)
    Added(String),
}

impl HunkLine {
    /// Line text without its prefix
    #[inline]
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Context(t) | Self::Removed(t) | Self::Added(t) => t,
        }
    }

    /// Present in the target (context or removed)
    #[inline]
    #[must_use]
    pub fn is_old(&self) -> bool {
        matches!(self, Self::Context(_) | Self::Removed(_))
    }

    /// Present in the result (context or added)
    #[inline]
    #[must_use]
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Context(_) | Self::Added(_))
    }

    /// Context line
    #[inline]
    #[must_use]
    pub fn is_context(&self) -> bool {
        matches!(self, Self::Context(_))
    }

    fn prefix(&self) -> char {
        match self {
            Self::Context(_) => ' ',
            Self::Removed(_) => '-',
            Self::Added(_) => '+',
        }
    }
}

impl Display for HunkLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix(), self.text())
    }
}

/// A header plus its body lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    header: HunkHeader,
    lines: Vec<HunkLine>,
}

impl Hunk {
    /// Create a hunk with an explicit header; counts are not checked here
    #[inline]
    #[must_use]
    pub fn new(header: HunkHeader, lines: Vec<HunkLine>) -> Self {
        Self { header, lines }
    }

    /// Create a hunk whose lengths are computed from its body
    #[must_use]
    pub fn from_lines(old_start: usize, new_start: usize, lines: Vec<HunkLine>) -> Self {
        let old_len = lines.iter().filter(|l| l.is_old()).count();
        let new_len = lines.iter().filter(|l| l.is_new()).count();
        Self::new(HunkHeader::new(old_start, old_len, new_start, new_len), lines)
    }

    /// Header
    #[inline]
    #[must_use]
    pub fn header(&self) -> &HunkHeader {
        &self.header
    }

    /// Body lines
    #[inline]
    #[must_use]
    pub fn lines(&self) -> &[HunkLine] {
        &self.lines
    }

    /// Lines expected in the target, in order
    pub fn old_lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter(|l| l.is_old()).map(HunkLine::text)
    }

    /// Lines produced in the result, in order
    pub fn new_lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter(|l| l.is_new()).map(HunkLine::text)
    }

    /// Counted (old, new) lengths of the body
    #[must_use]
    pub fn counted_lengths(&self) -> (usize, usize) {
        (
            self.lines.iter().filter(|l| l.is_old()).count(),
            self.lines.iter().filter(|l| l.is_new()).count(),
        )
    }

    /// Whether any line is added or removed
    #[inline]
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.lines.iter().any(|l| !l.is_context())
    }

    /// Whether a context line precedes the first change
    #[inline]
    #[must_use]
    pub fn has_leading_context(&self) -> bool {
        self.lines.first().is_some_and(HunkLine::is_context)
    }

    /// Whether a context line follows the last change
    #[inline]
    #[must_use]
    pub fn has_trailing_context(&self) -> bool {
        self.lines.last().is_some_and(HunkLine::is_context)
    }
}

impl Display for Hunk {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header)?;
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
