//! Read operations for backends.

use std::future::Future;
use std::path::{Path, PathBuf};

use crate::{Metadata, TreeError};

/// Read operations for a filesystem backend.
///
/// Every method is an asynchronous suspension point: issuing it yields to
/// the runtime and its result arrives when the future completes.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync`, and the returned futures must
/// be `Send`, so tree walks can spawn one task per node.
pub trait ReadBackend: Send + Sync {
    /// Metadata for `path` without following a trailing symlink.
    ///
    /// Returns `Ok(None)` if the path does not exist. Only returns an error
    /// for unexpected failures.
    fn symlink_metadata(
        &self,
        path: &Path,
    ) -> impl Future<Output = Result<Option<Metadata>, TreeError>> + Send;

    /// Read entire file contents as bytes.
    ///
    /// # Errors
    ///
    /// - [`TreeError::FileMissing`] if the path does not exist
    fn read(&self, path: &Path) -> impl Future<Output = Result<Vec<u8>, TreeError>> + Send;

    /// Resolve `path` to an absolute path with every symlink followed.
    ///
    /// # Errors
    ///
    /// - [`TreeError::FileMissing`] if the path does not exist
    fn canonicalize(&self, path: &Path)
    -> impl Future<Output = Result<PathBuf, TreeError>> + Send;

    /// The directory relative paths are resolved against.
    fn current_dir(&self) -> Result<PathBuf, TreeError>;
}
