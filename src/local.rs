//! Backend over the real filesystem, using `tokio::fs`.

use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::{
    DirBackend, FileType, LinkBackend, Metadata, OwnershipBackend, Permissions, ReadBackend,
    TreeError, WriteBackend,
};

/// The host filesystem.
///
/// Relative paths resolve against the process working directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalBackend;

impl LocalBackend {
    /// Create a backend over the host filesystem.
    pub const fn new() -> Self {
        Self
    }
}

fn convert_metadata(path: &Path, meta: &std::fs::Metadata) -> Result<Metadata, TreeError> {
    let ft = meta.file_type();
    let file_type = if ft.is_symlink() {
        FileType::Symlink
    } else if ft.is_dir() {
        FileType::Directory
    } else if ft.is_file() {
        FileType::File
    } else {
        return Err(TreeError::UnknownFileType {
            path: path.to_path_buf(),
            file_type: format!("{ft:?}"),
        });
    };

    Ok(Metadata {
        file_type,
        permissions: Permissions::from_mode(meta.mode()),
        uid: meta.uid(),
        gid: meta.gid(),
        size: meta.size(),
    })
}

impl ReadBackend for LocalBackend {
    async fn symlink_metadata(&self, path: &Path) -> Result<Option<Metadata>, TreeError> {
        match tokio::fs::symlink_metadata(path).await {
            Ok(meta) => convert_metadata(path, &meta).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TreeError::io("stat", path, e)),
        }
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>, TreeError> {
        tokio::fs::read(path)
            .await
            .map_err(|e| TreeError::io("read", path, e))
    }

    async fn canonicalize(&self, path: &Path) -> Result<PathBuf, TreeError> {
        tokio::fs::canonicalize(path)
            .await
            .map_err(|e| TreeError::io("canonicalize", path, e))
    }

    fn current_dir(&self) -> Result<PathBuf, TreeError> {
        std::env::current_dir().map_err(|e| TreeError::io("current_dir", Path::new("."), e))
    }
}

impl WriteBackend for LocalBackend {
    async fn write_new(&self, path: &Path, data: &[u8]) -> Result<(), TreeError> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(|e| TreeError::io("create", path, e))?;
        file.write_all(data)
            .await
            .map_err(|e| TreeError::io("write", path, e))?;
        // tokio files write in the background; flush to observe the result.
        file.flush()
            .await
            .map_err(|e| TreeError::io("write", path, e))
    }

    async fn remove_file(&self, path: &Path) -> Result<(), TreeError> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| TreeError::io("remove", path, e))
    }

    async fn set_permissions(&self, path: &Path, permissions: Permissions) -> Result<(), TreeError> {
        let perm = std::fs::Permissions::from_mode(permissions.mode());
        tokio::fs::set_permissions(path, perm)
            .await
            .map_err(|e| TreeError::io("chmod", path, e))
    }
}

impl DirBackend for LocalBackend {
    async fn create_dir(&self, path: &Path) -> Result<(), TreeError> {
        tokio::fs::create_dir(path)
            .await
            .map_err(|e| TreeError::io("mkdir", path, e))
    }

    async fn remove_dir(&self, path: &Path) -> Result<(), TreeError> {
        tokio::fs::remove_dir(path)
            .await
            .map_err(|e| TreeError::io("rmdir", path, e))
    }

    /// Entry names that are not valid UTF-8 cannot be described as tree
    /// keys and are skipped.
    async fn read_dir(&self, path: &Path) -> Result<Vec<String>, TreeError> {
        let mut entries = tokio::fs::read_dir(path)
            .await
            .map_err(|e| TreeError::io("read_dir", path, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| TreeError::io("read_dir", path, e))?
        {
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => {
                    warn!(
                        dir = %path.display(),
                        name = ?name,
                        "skipping entry with a non-UTF-8 name"
                    );
                }
            }
        }
        Ok(names)
    }
}

impl LinkBackend for LocalBackend {
    async fn symlink(&self, target: &Path, link: &Path) -> Result<(), TreeError> {
        tokio::fs::symlink(target, link)
            .await
            .map_err(|e| TreeError::io("symlink", link, e))
    }

    async fn read_link(&self, path: &Path) -> Result<PathBuf, TreeError> {
        tokio::fs::read_link(path)
            .await
            .map_err(|e| TreeError::io("readlink", path, e))
    }
}

impl OwnershipBackend for LocalBackend {
    async fn set_owner(
        &self,
        path: &Path,
        uid: Option<u32>,
        gid: Option<u32>,
    ) -> Result<(), TreeError> {
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || std::os::unix::fs::lchown(&owned, uid, gid))
            .await?
            .map_err(|e| TreeError::io("chown", path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_path_has_no_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let meta = LocalBackend
            .symlink_metadata(&dir.path().join("nothing"))
            .await
            .unwrap();
        assert!(meta.is_none());
    }

    #[tokio::test]
    async fn write_new_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");

        LocalBackend.write_new(&path, b"first").await.unwrap();
        let err = LocalBackend.write_new(&path, b"second").await.unwrap_err();

        assert!(matches!(err, TreeError::FileExists { .. }));
        assert_eq!(LocalBackend.read(&path).await.unwrap(), b"first");
    }

    #[tokio::test]
    async fn symlink_metadata_does_not_follow_links() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("link");

        LocalBackend
            .symlink(Path::new("missing-target"), &link)
            .await
            .unwrap();

        let meta = LocalBackend.symlink_metadata(&link).await.unwrap().unwrap();
        assert_eq!(meta.file_type, FileType::Symlink);
        assert_eq!(
            LocalBackend.read_link(&link).await.unwrap(),
            PathBuf::from("missing-target")
        );
    }

    #[tokio::test]
    async fn set_permissions_keeps_special_bits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tool");
        LocalBackend.write_new(&path, b"").await.unwrap();

        LocalBackend
            .set_permissions(&path, Permissions::from_mode(0o2750))
            .await
            .unwrap();

        let meta = LocalBackend.symlink_metadata(&path).await.unwrap().unwrap();
        assert_eq!(meta.permissions.mode(), 0o2750);
    }

    #[tokio::test]
    async fn read_dir_lists_entry_names() {
        let dir = tempfile::tempdir().unwrap();
        LocalBackend.create_dir(&dir.path().join("sub")).await.unwrap();
        LocalBackend
            .write_new(&dir.path().join("file"), b"")
            .await
            .unwrap();

        let mut names = LocalBackend.read_dir(dir.path()).await.unwrap();
        names.sort();
        assert_eq!(names, vec!["file", "sub"]);
    }

    #[tokio::test]
    async fn remove_dir_is_not_recursive() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        LocalBackend.create_dir(&sub).await.unwrap();
        LocalBackend.write_new(&sub.join("f"), b"").await.unwrap();

        assert!(LocalBackend.remove_dir(&sub).await.is_err());
        LocalBackend.remove_file(&sub.join("f")).await.unwrap();
        LocalBackend.remove_dir(&sub).await.unwrap();
    }

    #[tokio::test]
    async fn read_dir_skips_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plain"), b"").unwrap();
        std::fs::write(dir.path().join(OsStr::from_bytes(b"bad\xff")), b"").unwrap();

        let names = LocalBackend.read_dir(dir.path()).await.unwrap();
        assert_eq!(names, vec!["plain".to_owned()]);
    }
}
