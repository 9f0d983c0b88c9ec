//! Error types for directory-backed targets
//!
//! - opening the target directory
//! - reading and writing target files
//! - launching the patch tool

use diffsmith_core::TransportError;
use std::path::PathBuf;

/// Workspace errors
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// Root is missing or not a directory
    #[error("target root {0} is not a directory")]
    NotADirectory(PathBuf),

    /// File I/O failed
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Patch tool could not be started
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl WorkspaceError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<WorkspaceError> for TransportError {
    fn from(err: WorkspaceError) -> Self {
        match err {
            WorkspaceError::Spawn { .. } => Self::Connection(err.to_string()),
            WorkspaceError::NotADirectory(_) | WorkspaceError::Io { .. } => Self::Io(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_failure_maps_to_connection() {
        let err = WorkspaceError::Spawn {
            program: "patch".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        let transport: TransportError = err.into();
        assert_eq!(
            transport,
            TransportError::Connection("failed to run 'patch': not found".into())
        );
    }

    #[test]
    fn io_failure_names_path() {
        let err = WorkspaceError::io_error(
            "/srv/site/index.css",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let transport: TransportError = err.into();
        assert_eq!(transport, TransportError::Io("io error on /srv/site/index.css: denied".into()));
    }
}
