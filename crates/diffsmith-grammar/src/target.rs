//! File names in diff headers
//!
//! Candidates are applied with strip depth 0 (`patch -p0`) from inside the
//! target directory, so a header names the bare target file: `index.html`,
//! never `a/index.html` or `/srv/site/index.html`.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Strip depth every call site uses when handing a candidate to `patch`
pub const STRIP_DEPTH: u8 = 0;

/// Bare target file name taken from a `---`/`+++` header line
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetName(String);

impl TargetName {
    /// Get the file name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this name refers to `file_name`
    #[inline]
    #[must_use]
    pub fn matches(&self, file_name: &str) -> bool {
        self.0 == file_name
    }
}

impl Display for TargetName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TargetName {
    type Err = NameError;

    /// Parse the text after `--- ` or `+++ `; a tab-separated timestamp is ignored
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let name = raw.split('\t').next().unwrap_or_default().trim();

        if name.is_empty() {
            return Err(NameError::Empty);
        }
        if name == "/dev/null" {
            return Err(NameError::DevNull);
        }
        if name.starts_with('/') || name.contains('\\') || name.contains(':') {
            return Err(NameError::NotBare(name.to_string()));
        }
        if name.split('/').any(|seg| seg == "..") {
            return Err(NameError::ParentSegment(name.to_string()));
        }
        if name.contains('/') {
            return Err(NameError::NotBare(name.to_string()));
        }

        Ok(Self(name.to_string()))
    }
}

/// Errors in header file names
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    /// Header has no file name
    #[error("header names no file")]
    Empty,

    /// Creation/deletion headers are not supported
    #[error("/dev/null headers (file creation or deletion) are not supported")]
    DevNull,

    /// Name carries a directory component
    #[error("'{0}' is not a bare file name; headers use strip depth 0, e.g. `--- index.html`")]
    NotBare(String),

    /// Name escapes the target directory
    #[error("'{0}' contains a '..' segment")]
    ParentSegment(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_parses() {
        let name: TargetName = "index.html".parse().unwrap();
        assert_eq!(name.as_str(), "index.html");
        assert!(name.matches("index.html"));
    }

    #[test]
    fn timestamp_suffix_is_ignored() {
        let name: TargetName = "index.css\t2024-05-01 10:00:00".parse().unwrap();
        assert_eq!(name.as_str(), "index.css");
    }

    #[test]
    fn git_prefixed_name_is_rejected() {
        let result: Result<TargetName, _> = "a/index.html".parse();
        assert!(matches!(result, Err(NameError::NotBare(_))));
    }

    #[test]
    fn absolute_name_is_rejected() {
        let result: Result<TargetName, _> = "/usr/share/nginx/html/index.html".parse();
        assert!(matches!(result, Err(NameError::NotBare(_))));
    }

    #[test]
    fn parent_segment_is_rejected() {
        let result: Result<TargetName, _> = "../index.js".parse();
        assert!(matches!(result, Err(NameError::ParentSegment(_))));
    }

    #[test]
    fn dev_null_is_rejected() {
        let result: Result<TargetName, _> = "/dev/null".parse();
        assert_eq!(result, Err(NameError::DevNull));
    }

    #[test]
    fn empty_is_rejected() {
        let result: Result<TargetName, _> = "   ".parse();
        assert_eq!(result, Err(NameError::Empty));
    }
}
