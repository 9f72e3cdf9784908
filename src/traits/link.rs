//! Symlink operations for backends.

use std::future::Future;
use std::path::{Path, PathBuf};

use crate::TreeError;

/// Symlink operations for a filesystem backend.
pub trait LinkBackend: Send + Sync {
    /// Create a symbolic link at `link` pointing to `target`.
    ///
    /// `target` is stored verbatim and does not need to exist.
    ///
    /// # Errors
    ///
    /// - [`TreeError::FileExists`] if `link` already exists
    fn symlink(
        &self,
        target: &Path,
        link: &Path,
    ) -> impl Future<Output = Result<(), TreeError>> + Send;

    /// Read the raw target of a symbolic link.
    ///
    /// # Errors
    ///
    /// - [`TreeError::FileMissing`] if `path` does not exist
    fn read_link(&self, path: &Path)
    -> impl Future<Output = Result<PathBuf, TreeError>> + Send;
}
