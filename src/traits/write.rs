//! Write operations for backends.

use std::future::Future;
use std::path::Path;

use crate::{Permissions, TreeError};

/// Write operations for a filesystem backend.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync`, and the returned futures must
/// be `Send`.
pub trait WriteBackend: Send + Sync {
    /// Create a new regular file holding `data`.
    ///
    /// # Errors
    ///
    /// - [`TreeError::FileExists`] if the path already exists
    /// - [`TreeError::FileMissing`] if the parent directory does not exist
    fn write_new(&self, path: &Path, data: &[u8])
    -> impl Future<Output = Result<(), TreeError>> + Send;

    /// Remove a regular file or a symlink (the link itself, not its target).
    ///
    /// # Errors
    ///
    /// - [`TreeError::FileMissing`] if the path does not exist
    fn remove_file(&self, path: &Path) -> impl Future<Output = Result<(), TreeError>> + Send;

    /// Set the permission bits of a file or directory.
    ///
    /// # Errors
    ///
    /// - [`TreeError::FileMissing`] if the path does not exist
    fn set_permissions(
        &self,
        path: &Path,
        permissions: Permissions,
    ) -> impl Future<Output = Result<(), TreeError>> + Send;
}
