//! Ownership operations for backends.

use std::future::Future;
use std::path::Path;

use crate::TreeError;

/// Ownership changes for a filesystem backend.
pub trait OwnershipBackend: Send + Sync {
    /// Change the owner and/or group of `path` without following a trailing
    /// symlink. `None` leaves that id unchanged.
    ///
    /// # Errors
    ///
    /// - [`TreeError::PermissionDenied`] if the invoking identity may not
    ///   make the change
    fn set_owner(
        &self,
        path: &Path,
        uid: Option<u32>,
        gid: Option<u32>,
    ) -> impl Future<Output = Result<(), TreeError>> + Send;
}
