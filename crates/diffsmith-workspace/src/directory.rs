//! Target files in a local directory

use crate::error::WorkspaceError;
use async_trait::async_trait;
use diffsmith_core::{BatchContext, Category, ContentSource, TransportError};
use std::path::{Path, PathBuf};

/// Serves each category's file from one root directory
#[derive(Debug, Clone)]
pub struct DirectoryWorkspace {
    root: PathBuf,
}

impl DirectoryWorkspace {
    /// Open `root`, which must be an existing directory
    ///
    /// # Errors
    /// Returns [`WorkspaceError::NotADirectory`] otherwise
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, WorkspaceError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(WorkspaceError::NotADirectory(root));
        }
        Ok(Self { root })
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the category's file
    #[must_use]
    pub fn path_of(&self, ctx: &BatchContext, category: Category) -> PathBuf {
        self.root.join(ctx.file_name(category))
    }

    /// Read the category's file
    ///
    /// # Errors
    /// Returns [`WorkspaceError::Io`] when the file cannot be read
    pub async fn read(&self, ctx: &BatchContext, category: Category) -> Result<String, WorkspaceError> {
        let path = self.path_of(ctx, category);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| WorkspaceError::io_error(path, e))
    }
}

#[async_trait]
impl ContentSource for DirectoryWorkspace {
    async fn fetch_content(&self, ctx: &BatchContext, category: Category) -> Result<String, TransportError> {
        Ok(self.read(ctx, category).await?)
    }
}
