//! Invoking identity and owner/group lookup.

use std::path::Path;

use nix::unistd::{Group, User, geteuid};
use serde_json::Value;

use crate::TreeError;

/// The effective user a tree walk runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    uid: u32,
}

impl Identity {
    /// The effective uid of this process.
    pub fn current() -> Self {
        Self {
            uid: geteuid().as_raw(),
        }
    }

    /// An identity for an explicit uid.
    pub const fn from_uid(uid: u32) -> Self {
        Self { uid }
    }

    /// The effective uid.
    pub const fn uid(&self) -> u32 {
        self.uid
    }

    /// Returns `true` for the superuser.
    pub const fn is_root(&self) -> bool {
        self.uid == 0
    }

    /// Whether this identity can hand a file to `uid`.
    pub const fn may_chown_to(&self, uid: u32) -> bool {
        self.is_root() || self.uid == uid
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::current()
    }
}

/// Resolve an `owner` value (uid number, numeric string or user name).
pub(crate) fn resolve_user(value: &Value, path: &Path) -> Result<u32, TreeError> {
    match id_or_name(value, path, "owner")? {
        IdOrName::Id(uid) => Ok(uid),
        IdOrName::Name(name) => match User::from_name(name) {
            Ok(Some(user)) => Ok(user.uid.as_raw()),
            Ok(None) => Err(TreeError::UnknownUser {
                name: name.to_owned(),
            }),
            Err(errno) => Err(TreeError::io("getpwnam", path, errno.into())),
        },
    }
}

/// Resolve a `group` value (gid number, numeric string or group name).
pub(crate) fn resolve_group(value: &Value, path: &Path) -> Result<u32, TreeError> {
    match id_or_name(value, path, "group")? {
        IdOrName::Id(gid) => Ok(gid),
        IdOrName::Name(name) => match Group::from_name(name) {
            Ok(Some(group)) => Ok(group.gid.as_raw()),
            Ok(None) => Err(TreeError::UnknownGroup {
                name: name.to_owned(),
            }),
            Err(errno) => Err(TreeError::io("getgrnam", path, errno.into())),
        },
    }
}

enum IdOrName<'a> {
    Id(u32),
    Name(&'a str),
}

fn id_or_name<'a>(
    value: &'a Value,
    path: &Path,
    attribute: &'static str,
) -> Result<IdOrName<'a>, TreeError> {
    let invalid = |reason: &str| TreeError::InvalidAttribute {
        path: path.to_path_buf(),
        name: attribute,
        reason: reason.to_owned(),
    };

    match value {
        Value::Number(number) => number
            .as_u64()
            .and_then(|id| u32::try_from(id).ok())
            .map(IdOrName::Id)
            .ok_or_else(|| invalid("id out of range")),
        Value::String(text) if text.is_empty() => Err(invalid("empty name")),
        Value::String(text) => Ok(text
            .parse::<u32>()
            .map_or(IdOrName::Name(text.as_str()), IdOrName::Id)),
        _ => Err(invalid("expected a name or a numeric id")),
    }
}
