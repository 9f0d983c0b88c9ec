//! Diffsmith Grammar
//!
//! Unified-diff parsing, structural checks, and exact hunk application.
//!
//! # Core Concepts
//!
//! - [`UnifiedDiff`]: one file section with one or more hunks, parsed strictly
//! - [`Hunk`]: `@@ -a,b +c,d @@` header plus context, removed, and added lines
//! - [`TargetName`]: bare file name from the `---`/`+++` headers (strip depth 0)
//! - [`ContentHash`]: 32-byte Blake3 hash used to prove content was not touched
//!
//! Parsing is length-driven: a hunk body ends when the declared old and new
//! lengths are consumed, so a removed line such as `--- legacy` is never
//! mistaken for a file header.
//!
//! # Example
//!
//! ```rust
//! use diffsmith_grammar::UnifiedDiff;
//!
//! let diff = UnifiedDiff::parse(
//!     "--- index.html\n+++ index.html\n@@ -1,2 +1,2 @@\n <h1>\n-Hi\n+Hello\n",
//! )
//! .unwrap();
//! assert_eq!(diff.apply_to("<h1>\nHi\n").unwrap(), "<h1>\nHello\n");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod apply;
mod diff;
mod error;
mod hash;
mod hunk;
mod target;

pub use apply::line_count;
pub use diff::UnifiedDiff;
pub use error::{ApplyFailure, GrammarError};
pub use hash::{ContentHash, HashError};
pub use hunk::{HeaderError, Hunk, HunkHeader, HunkLine};
pub use target::{NameError, TargetName, STRIP_DEPTH};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
