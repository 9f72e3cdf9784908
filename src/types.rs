//! Core types shared by the normalizer, the walkers and the backends.

use std::fmt;
use std::str::FromStr;

/// Marker that distinguishes attribute keys from child names.
pub const ATTRIBUTE_MARKER: char = '-';

/// Type of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
}

impl FileType {
    /// Canonical name as it appears in the `type` attribute.
    pub const fn as_str(&self) -> &'static str {
        match self {
            FileType::File => "file",
            FileType::Directory => "directory",
            FileType::Symlink => "symlink",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = ();

    /// Accepts the canonical names plus the short `ls`-style aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" | "f" | "-" => Ok(FileType::File),
            "directory" | "dir" | "d" => Ok(FileType::Directory),
            "symlink" | "symbolic link" | "l" => Ok(FileType::Symlink),
            _ => Err(()),
        }
    }
}

/// Unix-style permissions stored as a 12-bit mode (rwx triplets plus
/// setuid, setgid and sticky).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Permissions(u32);

impl Permissions {
    /// Set-user-ID bit.
    pub const SETUID: u32 = 0o4000;
    /// Set-group-ID bit.
    pub const SETGID: u32 = 0o2000;
    /// Sticky bit.
    pub const STICKY: u32 = 0o1000;

    /// Create permissions from a Unix mode (e.g., 0o755).
    #[inline]
    pub const fn from_mode(mode: u32) -> Self {
        Self(mode & 0o7777)
    }

    /// Get the raw mode value.
    #[inline]
    pub const fn mode(&self) -> u32 {
        self.0
    }

    /// Returns `true` if any of setuid, setgid or sticky is set.
    #[inline]
    pub const fn has_special_bits(&self) -> bool {
        self.0 & 0o7000 != 0
    }
}

/// Metadata for an existing filesystem entry, read without following links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Type of the entry.
    pub file_type: FileType,
    /// Permission bits.
    pub permissions: Permissions,
    /// Owning user id.
    pub uid: u32,
    /// Owning group id.
    pub gid: u32,
    /// Size in bytes.
    pub size: u64,
}

impl Metadata {
    /// Returns `true` if this is a directory.
    #[inline]
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }
}

/// The reserved attribute names a node may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttrName {
    /// Entry name, injected from the parent's child key.
    Name,
    /// Entry type.
    Type,
    /// Filesystem path.
    Path,
    /// Permission mode.
    Mode,
    /// Mask applied to default modes.
    Umask,
    /// Owning user.
    Owner,
    /// Owning group.
    Group,
    /// Symlink target.
    Dest,
    /// File content.
    Content,
    /// Attributes propagated to descendants.
    Inherit,
}

impl AttrName {
    /// Every reserved attribute, in declaration order.
    pub const ALL: [AttrName; 10] = [
        AttrName::Name,
        AttrName::Type,
        AttrName::Path,
        AttrName::Mode,
        AttrName::Umask,
        AttrName::Owner,
        AttrName::Group,
        AttrName::Dest,
        AttrName::Content,
        AttrName::Inherit,
    ];

    /// The attribute name without marker.
    pub const fn as_str(&self) -> &'static str {
        match self {
            AttrName::Name => "name",
            AttrName::Type => "type",
            AttrName::Path => "path",
            AttrName::Mode => "mode",
            AttrName::Umask => "umask",
            AttrName::Owner => "owner",
            AttrName::Group => "group",
            AttrName::Dest => "dest",
            AttrName::Content => "content",
            AttrName::Inherit => "inherit",
        }
    }

    /// The wire key, marker included (e.g. `-mode`).
    pub fn key(&self) -> String {
        format!("{ATTRIBUTE_MARKER}{}", self.as_str())
    }

    /// Attributes that identify a node and never propagate to children.
    pub const fn is_positional(&self) -> bool {
        matches!(self, AttrName::Name | AttrName::Path)
    }
}

impl fmt::Display for AttrName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttrName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AttrName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_type_aliases() {
        assert_eq!("f".parse(), Ok(FileType::File));
        assert_eq!("-".parse(), Ok(FileType::File));
        assert_eq!("dir".parse(), Ok(FileType::Directory));
        assert_eq!("d".parse(), Ok(FileType::Directory));
        assert_eq!("symbolic link".parse(), Ok(FileType::Symlink));
        assert_eq!("l".parse(), Ok(FileType::Symlink));
        assert_eq!("fifo".parse::<FileType>(), Err(()));
    }

    #[test]
    fn file_type_display_round_trips() {
        for ty in [FileType::File, FileType::Directory, FileType::Symlink] {
            assert_eq!(ty.to_string().parse(), Ok(ty));
        }
    }

    #[test]
    fn permissions_from_mode_masks_file_type_bits() {
        let p = Permissions::from_mode(0o104755);
        assert_eq!(p.mode(), 0o4755);
        assert!(p.has_special_bits());
        assert!(!Permissions::from_mode(0o755).has_special_bits());
    }

    #[test]
    fn attr_name_parses_every_reserved_name() {
        for name in AttrName::ALL {
            assert_eq!(name.as_str().parse(), Ok(name));
        }
        assert_eq!("colour".parse::<AttrName>(), Err(()));
        assert_eq!(AttrName::Mode.key(), "-mode");
    }

    #[test]
    fn only_name_and_path_are_positional() {
        let positional: Vec<_> = AttrName::ALL
            .into_iter()
            .filter(AttrName::is_positional)
            .collect();
        assert_eq!(positional, vec![AttrName::Name, AttrName::Path]);
    }
}
