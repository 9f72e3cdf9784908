//! Error types for tree materialization and serialization.

use std::path::{Path, PathBuf};

use crate::FileType;

/// Error type covering validation, filesystem and task failures.
///
/// Variants carry the path of the node that failed where one is known.
/// Uses `#[non_exhaustive]` for forward compatibility.
///
/// # Examples
///
/// ```rust
/// use jsondir::TreeError;
/// use std::path::PathBuf;
///
/// let err = TreeError::FileExists { path: PathBuf::from("out/a") };
/// assert_eq!(err.to_string(), "file already exists: out/a");
/// ```
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    // Validation Errors
    /// A `-`-prefixed key is not a recognized attribute.
    #[error("unknown attribute '{name}' in node")]
    UnknownAttribute {
        /// The offending key, marker included.
        name: String,
    },

    /// The `type` attribute names no supported file type.
    #[error("unknown file type '{file_type}' for {path}")]
    UnknownFileType {
        /// The node path.
        path: PathBuf,
        /// The rejected type value.
        file_type: String,
    },

    /// A required attribute is missing (e.g. `dest` on a symlink).
    #[error("'{parameter}' is a required attribute for {path}")]
    MissingRequiredParameter {
        /// The node path.
        path: PathBuf,
        /// The attribute that is missing.
        parameter: &'static str,
    },

    /// The mode (or umask) value could not be interpreted.
    #[error("invalid mode {mode} for {path}")]
    InvalidMode {
        /// The node path.
        path: PathBuf,
        /// The rejected value, rendered as JSON.
        mode: String,
    },

    /// An attribute value has the wrong shape.
    #[error("invalid value for attribute '{name}' on {path}: {reason}")]
    InvalidAttribute {
        /// The node path.
        path: PathBuf,
        /// The attribute name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A child entry is not a mapping.
    #[error("child '{key}' is not a node")]
    MalformedNode {
        /// The child key.
        key: String,
    },

    /// The owner names no known user.
    #[error("unknown user '{name}'")]
    UnknownUser {
        /// The user name.
        name: String,
    },

    /// The group names no known group.
    #[error("unknown group '{name}'")]
    UnknownGroup {
        /// The group name.
        name: String,
    },

    // Filesystem Errors
    /// The target path already exists.
    #[error("file already exists: {path}")]
    FileExists {
        /// The path that already exists.
        path: PathBuf,
    },

    /// The path does not exist.
    #[error("file does not exist: {path}")]
    FileMissing {
        /// The missing path.
        path: PathBuf,
    },

    /// The operation requires a different file type.
    #[error("incorrect file type for {path}: expected {expected}")]
    IncorrectFileType {
        /// The path with the wrong type.
        path: PathBuf,
        /// The type the operation needs.
        expected: FileType,
    },

    /// The invoking identity may not perform the operation.
    #[error("{operation}: permission denied: {path}")]
    PermissionDenied {
        /// The path involved.
        path: PathBuf,
        /// The operation that was denied.
        operation: &'static str,
    },

    /// A destructive operation was refused.
    #[error("unsafe operation refused for {path}: {reason}")]
    UnsafeOperation {
        /// The path that would have been affected.
        path: PathBuf,
        /// Why it was refused.
        reason: &'static str,
    },

    /// I/O error with context.
    #[error("{operation} failed for {path}: {source}")]
    Io {
        /// The operation that failed.
        operation: &'static str,
        /// The path involved in the operation.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    // Runtime Errors
    /// A spawned walk task panicked or was aborted.
    #[error("walk task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

impl TreeError {
    /// Wrap an I/O error, promoting common kinds to their dedicated variants.
    pub fn io(operation: &'static str, path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::AlreadyExists => TreeError::FileExists {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::NotFound => TreeError::FileMissing {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => TreeError::PermissionDenied {
                path: path.to_path_buf(),
                operation,
            },
            _ => TreeError::Io {
                operation,
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_attribute_display_names_key() {
        let err = TreeError::UnknownAttribute {
            name: "-colour".into(),
        };
        assert_eq!(err.to_string(), "unknown attribute '-colour' in node");
    }

    #[test]
    fn incorrect_file_type_display() {
        let err = TreeError::IncorrectFileType {
            path: PathBuf::from("out/link"),
            expected: FileType::Symlink,
        };
        assert_eq!(
            err.to_string(),
            "incorrect file type for out/link: expected symlink"
        );
    }

    #[test]
    fn io_already_exists_becomes_file_exists() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AlreadyExists, "test");
        let err = TreeError::io("create", Path::new("out"), io_err);
        assert!(matches!(err, TreeError::FileExists { ref path } if path == Path::new("out")));
    }

    #[test]
    fn io_not_found_becomes_file_missing() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err = TreeError::io("read", Path::new("gone"), io_err);
        assert!(matches!(err, TreeError::FileMissing { .. }));
    }

    #[test]
    fn io_permission_denied_keeps_operation() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test");
        let err = TreeError::io("chown", Path::new("x"), io_err);
        assert!(matches!(
            err,
            TreeError::PermissionDenied {
                operation: "chown",
                ..
            }
        ));
    }

    #[test]
    fn io_other_keeps_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = TreeError::io("write", Path::new("x"), io_err);
        assert!(matches!(err, TreeError::Io { .. }));
        assert!(err.to_string().contains("boom"));
    }
}
