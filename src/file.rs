//! A view of one filesystem entry over a [`Backend`].

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{Backend, FileType, Metadata, Permissions, TreeError};

/// Everything needed to create one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSpec {
    /// Where the entry lives.
    pub path: PathBuf,
    /// What kind of entry to create.
    pub file_type: FileType,
    /// Permission bits applied after creation (ignored for symlinks).
    pub permissions: Permissions,
    /// Owning uid to set, if any.
    pub owner: Option<u32>,
    /// Owning gid to set, if any.
    pub group: Option<u32>,
    /// Symlink target. Required for symlinks.
    pub dest: Option<PathBuf>,
    /// Initial content of a regular file.
    pub content: Vec<u8>,
}

/// One filesystem entry: what exists at a path, and optionally what should.
///
/// Existence and metadata are captured when the view is constructed and
/// refreshed by [`create`](Self::create) and [`remove`](Self::remove);
/// nothing is cached beyond the view's lifetime.
#[derive(Debug)]
pub struct File<'a, B> {
    backend: &'a B,
    path: PathBuf,
    spec: Option<FileSpec>,
    metadata: Option<Metadata>,
}

impl<'a, B: Backend> File<'a, B> {
    /// View an existing (or missing) path.
    pub async fn open(backend: &'a B, path: impl Into<PathBuf>) -> Result<Self, TreeError> {
        let path = path.into();
        let metadata = backend.symlink_metadata(&path).await?;
        Ok(Self {
            backend,
            path,
            spec: None,
            metadata,
        })
    }

    /// View the path of `spec`, ready to [`create`](Self::create) it.
    pub async fn from_spec(backend: &'a B, spec: FileSpec) -> Result<Self, TreeError> {
        let mut file = Self::open(backend, spec.path.clone()).await?;
        file.spec = Some(spec);
        Ok(file)
    }

    /// Returns `true` if something exists at the path.
    pub fn exists(&self) -> bool {
        self.metadata.is_some()
    }

    /// The type on disk if the entry exists, otherwise the declared one.
    pub fn file_type(&self) -> Option<FileType> {
        self.metadata
            .as_ref()
            .map(|meta| meta.file_type)
            .or_else(|| self.spec.as_ref().map(|spec| spec.file_type))
    }

    /// The entry path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Metadata of the existing entry.
    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// Create the entry described by the spec, then apply its mode and
    /// ownership.
    ///
    /// # Errors
    ///
    /// - [`TreeError::FileExists`] if something already exists at the path
    /// - [`TreeError::MissingRequiredParameter`] if there is no spec, or a
    ///   symlink spec has no `dest`
    pub async fn create(&mut self) -> Result<(), TreeError> {
        if self.exists() {
            return Err(TreeError::FileExists {
                path: self.path.clone(),
            });
        }
        let spec = self
            .spec
            .as_ref()
            .ok_or_else(|| TreeError::MissingRequiredParameter {
                path: self.path.clone(),
                parameter: "type",
            })?;

        match spec.file_type {
            FileType::File => {
                self.backend.write_new(&self.path, &spec.content).await?;
                self.backend
                    .set_permissions(&self.path, spec.permissions)
                    .await?;
            }
            FileType::Directory => {
                self.backend.create_dir(&self.path).await?;
                self.backend
                    .set_permissions(&self.path, spec.permissions)
                    .await?;
            }
            FileType::Symlink => {
                let dest = spec
                    .dest
                    .as_ref()
                    .ok_or_else(|| TreeError::MissingRequiredParameter {
                        path: self.path.clone(),
                        parameter: "dest",
                    })?;
                self.backend.symlink(dest, &self.path).await?;
            }
        }

        if spec.owner.is_some() || spec.group.is_some() {
            self.backend
                .set_owner(&self.path, spec.owner, spec.group)
                .await?;
        }

        debug!(path = %self.path.display(), file_type = %spec.file_type, "created");
        self.metadata = self.backend.symlink_metadata(&self.path).await?;
        Ok(())
    }

    /// Remove the entry. Directories must already be empty.
    ///
    /// # Errors
    ///
    /// - [`TreeError::FileMissing`] if nothing exists at the path
    pub async fn remove(&mut self) -> Result<(), TreeError> {
        let meta = self
            .metadata
            .as_ref()
            .ok_or_else(|| TreeError::FileMissing {
                path: self.path.clone(),
            })?;

        if meta.is_dir() {
            self.backend.remove_dir(&self.path).await?;
        } else {
            self.backend.remove_file(&self.path).await?;
        }

        debug!(path = %self.path.display(), "removed");
        self.metadata = None;
        Ok(())
    }

    /// Content of a regular file.
    ///
    /// # Errors
    ///
    /// - [`TreeError::FileMissing`] if nothing exists at the path
    /// - [`TreeError::IncorrectFileType`] if the entry is not a regular file
    pub async fn content(&self) -> Result<Vec<u8>, TreeError> {
        self.expect_type(FileType::File)?;
        self.backend.read(&self.path).await
    }

    /// Target of a symlink.
    ///
    /// # Errors
    ///
    /// - [`TreeError::FileMissing`] if nothing exists at the path
    /// - [`TreeError::IncorrectFileType`] if the entry is not a symlink
    pub async fn dest(&self) -> Result<PathBuf, TreeError> {
        self.expect_type(FileType::Symlink)?;
        self.backend.read_link(&self.path).await
    }

    fn expect_type(&self, expected: FileType) -> Result<(), TreeError> {
        match &self.metadata {
            None => Err(TreeError::FileMissing {
                path: self.path.clone(),
            }),
            Some(meta) if meta.file_type != expected => Err(TreeError::IncorrectFileType {
                path: self.path.clone(),
                expected,
            }),
            Some(_) => Ok(()),
        }
    }
}
