//! Diffsmith Workspace
//!
//! Directory-backed target set for the patch pipeline.
//!
//! # Core Operations
//!
//! - **Fetch**: read a category's target file ([`DirectoryWorkspace`])
//! - **Dry run**: stage a candidate without writing ([`GnuPatchTool`], [`NativePatchTool`])
//! - **Commit**: apply a candidate to the target file
//!
//! # Example
//!
//! ```rust,ignore
//! use diffsmith_core::WorkspaceConfig;
//! use diffsmith_workspace::{patch_tool, DirectoryWorkspace};
//!
//! let config = WorkspaceConfig::default();
//! let workspace = DirectoryWorkspace::open(&config.root)?;
//! let tool = patch_tool(&config, &workspace);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod directory;
pub mod error;
pub mod gnu;
pub mod native;

pub use directory::DirectoryWorkspace;
pub use error::WorkspaceError;
pub use gnu::{patch_args, GnuPatchTool};
pub use native::NativePatchTool;

use diffsmith_core::{PatchTool, PatchToolKind, WorkspaceConfig};
use std::sync::Arc;

/// Patch tool selected by `config.patch_tool`
#[must_use]
pub fn patch_tool(config: &WorkspaceConfig, workspace: &DirectoryWorkspace) -> Arc<dyn PatchTool> {
    match config.patch_tool {
        PatchToolKind::Gnu => {
            Arc::new(GnuPatchTool::new(workspace.root()).with_program(config.patch_binary.clone()))
        }
        PatchToolKind::Native => Arc::new(NativePatchTool::new(workspace.clone())),
    }
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
