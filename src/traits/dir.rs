//! Directory operations for backends.

use std::future::Future;
use std::path::Path;

use crate::TreeError;

/// Directory operations for a filesystem backend.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync`, and the returned futures must
/// be `Send`.
pub trait DirBackend: Send + Sync {
    /// Create a directory (parent must exist).
    ///
    /// # Errors
    ///
    /// - [`TreeError::FileExists`] if the path already exists
    /// - [`TreeError::FileMissing`] if the parent directory does not exist
    fn create_dir(&self, path: &Path) -> impl Future<Output = Result<(), TreeError>> + Send;

    /// Remove an empty directory. Removal is never recursive.
    ///
    /// # Errors
    ///
    /// - [`TreeError::FileMissing`] if the path does not exist
    /// - [`TreeError::Io`] if the directory is not empty
    fn remove_dir(&self, path: &Path) -> impl Future<Output = Result<(), TreeError>> + Send;

    /// List the entry names of a directory, in the order the backend
    /// returns them.
    ///
    /// # Errors
    ///
    /// - [`TreeError::FileMissing`] if the path does not exist
    fn read_dir(&self, path: &Path)
    -> impl Future<Output = Result<Vec<String>, TreeError>> + Send;
}
