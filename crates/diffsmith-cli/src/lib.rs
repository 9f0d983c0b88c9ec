//! Diffsmith CLI
//!
//! Composition root: loads configuration, installs logging, and wires the
//! directory workspace, the patch tool and the chat client into the pipeline.
//!
//! ```text
//! diffsmith --root ./site run "change the title to Hello World"
//! diffsmith decompose "add a nav bar with Home and About links"
//! diffsmith --patch-tool native check --category style fix.diff
//! ```

#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod logging;
pub mod observer;

pub use observer::LoggingObserver;
