//! Attribute normalization: one tree level at a time.
//!
//! [`normalize`] validates a node's attribute keys, splits off its children
//! and fills in `path`, `type` and the inheritance list. [`Normalized::resolve`]
//! then evaluates computed values and turns the result into a [`FileSpec`].
//! [`inherit_into`] copies a resolved parent's inheritable values into a child
//! before that child is normalized.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::identity::{resolve_group, resolve_user};
use crate::mode::{interpret_mode, interpret_umask};
use crate::{
    ATTRIBUTE_MARKER, AttrName, AttrValue, Attributes, FileSpec, FileType, Identity, Node,
    TreeError,
};

/// Path given to a root node that declares none.
pub const ROOT_PATH: &str = ".";

/// One node split into attributes and children, with defaults filled in.
#[derive(Debug, Clone)]
pub struct Normalized {
    /// Attributes, including the inferred `path` and `type`.
    pub attributes: BTreeMap<AttrName, AttrValue>,
    /// Child nodes by name.
    pub children: BTreeMap<String, Node>,
    /// Attributes this node passes on to its descendants. Always contains
    /// [`AttrName::Inherit`].
    pub inherit: Vec<AttrName>,
}

/// A node ready to be created.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// Every attribute, computed values evaluated.
    pub attributes: Attributes,
    /// What to create on disk.
    pub spec: FileSpec,
    /// Attributes passed on to descendants.
    pub inherit: Vec<AttrName>,
    /// Child nodes by name.
    pub children: BTreeMap<String, Node>,
}

/// Split `node` into attributes and children and fill in defaults.
///
/// `parent` is the parent's resolved attribute set; `None` for the root.
///
/// # Errors
///
/// - [`TreeError::UnknownAttribute`] for an unrecognized attribute key, or an
///   unrecognized name in the `inherit` list
/// - [`TreeError::InvalidAttribute`] for a malformed `name` or `inherit` value
pub fn normalize(node: Node, parent: Option<&Attributes>) -> Result<Normalized, TreeError> {
    let mut attributes = BTreeMap::new();
    for (key, value) in node.attributes {
        let name = key
            .parse::<AttrName>()
            .map_err(|()| TreeError::UnknownAttribute {
                name: format!("{ATTRIBUTE_MARKER}{key}"),
            })?;
        attributes.insert(name, value);
    }
    let children = node.children;

    if !attributes.contains_key(&AttrName::Path) {
        let path = match parent {
            Some(parent) => child_path(parent, &attributes)?,
            None => ROOT_PATH.to_owned(),
        };
        attributes.insert(AttrName::Path, AttrValue::Literal(Value::String(path)));
    }

    if !attributes.contains_key(&AttrName::Type) {
        let inferred = if attributes.contains_key(&AttrName::Dest) {
            FileType::Symlink
        } else if !children.is_empty() {
            FileType::Directory
        } else {
            FileType::File
        };
        attributes.insert(AttrName::Type, AttrValue::Literal(inferred.as_str().into()));
    }

    let inherit = inheritance_list(attributes.get(&AttrName::Inherit), &node_path(&attributes))?;
    if attributes.contains_key(&AttrName::Inherit) {
        let names = inherit.iter().map(|name| Value::from(name.as_str())).collect();
        attributes.insert(AttrName::Inherit, AttrValue::Literal(Value::Array(names)));
    }

    Ok(Normalized {
        attributes,
        children,
        inherit,
    })
}

fn child_path(
    parent: &Attributes,
    attributes: &BTreeMap<AttrName, AttrValue>,
) -> Result<String, TreeError> {
    let parent_path = parent.get_str(AttrName::Path).unwrap_or(ROOT_PATH);
    let invalid = |reason: &str| TreeError::InvalidAttribute {
        path: PathBuf::from(parent_path),
        name: "name",
        reason: reason.to_owned(),
    };

    let name = match attributes.get(&AttrName::Name) {
        Some(AttrValue::Literal(Value::String(name))) => name,
        Some(_) => return Err(invalid("expected a string")),
        None => {
            return Err(TreeError::MissingRequiredParameter {
                path: PathBuf::from(parent_path),
                parameter: "name",
            });
        }
    };
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(invalid("not a single path component"));
    }

    Ok(Path::new(parent_path)
        .join(name)
        .to_string_lossy()
        .into_owned())
}

/// The node's path for error reports: the literal path when it is a string,
/// otherwise its JSON text.
fn node_path(attributes: &BTreeMap<AttrName, AttrValue>) -> PathBuf {
    match attributes.get(&AttrName::Path) {
        Some(AttrValue::Literal(Value::String(path))) => PathBuf::from(path),
        Some(AttrValue::Literal(other)) => PathBuf::from(other.to_string()),
        Some(AttrValue::Computed(_)) => PathBuf::from("<computed>"),
        None => PathBuf::from(ROOT_PATH),
    }
}

fn inheritance_list(value: Option<&AttrValue>, path: &Path) -> Result<Vec<AttrName>, TreeError> {
    let invalid = |reason: &str| TreeError::InvalidAttribute {
        path: path.to_path_buf(),
        name: "inherit",
        reason: reason.to_owned(),
    };

    let raw: Vec<&str> = match value {
        None => Vec::new(),
        Some(AttrValue::Literal(Value::String(name))) => vec![name.as_str()],
        Some(AttrValue::Literal(Value::Array(names))) => names
            .iter()
            .map(|name| name.as_str().ok_or_else(|| invalid("expected attribute names")))
            .collect::<Result<_, _>>()?,
        Some(AttrValue::Literal(_)) => return Err(invalid("expected a name or a list of names")),
        Some(AttrValue::Computed(_)) => return Err(invalid("cannot be computed")),
    };

    let mut list = Vec::with_capacity(raw.len() + 1);
    for name in raw {
        let parsed = name
            .parse::<AttrName>()
            .map_err(|()| TreeError::UnknownAttribute {
                name: name.to_owned(),
            })?;
        if !list.contains(&parsed) {
            list.push(parsed);
        }
    }
    if !list.contains(&AttrName::Inherit) {
        list.push(AttrName::Inherit);
    }
    Ok(list)
}

/// Copy each of the parent's inheritable values into `child` unless the
/// child sets that attribute itself. `name` and `path` never propagate.
pub fn inherit_into(child: &mut Node, parent: &Attributes, inherit: &[AttrName]) {
    for name in inherit.iter().filter(|name| !name.is_positional()) {
        if child.attr(*name).is_some() {
            continue;
        }
        if let Some(value) = parent.get(*name) {
            child.set_attr(*name, AttrValue::Literal(value.clone()));
        }
    }
}

impl Normalized {
    /// Evaluate computed attributes and build the [`FileSpec`].
    ///
    /// Computed values see the node's literal attributes, inherited ones
    /// included.
    ///
    /// # Errors
    ///
    /// - [`TreeError::UnknownFileType`] for an unrecognized `type`
    /// - [`TreeError::InvalidMode`] for an uninterpretable `mode` or `umask`
    /// - [`TreeError::MissingRequiredParameter`] for a symlink without `dest`
    /// - [`TreeError::IncorrectFileType`] if a node with children is not a directory
    /// - [`TreeError::PermissionDenied`] if `owner` names another user and the
    ///   invoking identity is not root
    pub fn resolve(self, default_umask: u32, identity: Identity) -> Result<Resolved, TreeError> {
        let mut snapshot = Attributes::default();
        for (name, value) in &self.attributes {
            if let AttrValue::Literal(literal) = value {
                snapshot.insert(*name, literal.clone());
            }
        }

        let mut attributes = snapshot.clone();
        for (name, value) in &self.attributes {
            if let AttrValue::Computed(computed) = value {
                attributes.insert(*name, computed.evaluate(&snapshot));
            }
        }

        let spec = build_spec(&attributes, !self.children.is_empty(), default_umask, identity)?;
        Ok(Resolved {
            attributes,
            spec,
            inherit: self.inherit,
            children: self.children,
        })
    }
}

fn build_spec(
    attributes: &Attributes,
    has_children: bool,
    default_umask: u32,
    identity: Identity,
) -> Result<FileSpec, TreeError> {
    let path = match attributes.get(AttrName::Path) {
        Some(Value::String(path)) if !path.is_empty() => PathBuf::from(path),
        other => {
            return Err(TreeError::InvalidAttribute {
                path: PathBuf::from(other.map_or_else(|| ROOT_PATH.to_owned(), Value::to_string)),
                name: "path",
                reason: "expected a non-empty string".to_owned(),
            });
        }
    };

    let type_value = attributes.get(AttrName::Type);
    let file_type = type_value
        .and_then(Value::as_str)
        .and_then(|ty| ty.parse::<FileType>().ok())
        .ok_or_else(|| TreeError::UnknownFileType {
            path: path.clone(),
            file_type: type_value.map(Value::to_string).unwrap_or_default(),
        })?;
    if has_children && file_type != FileType::Directory {
        return Err(TreeError::IncorrectFileType {
            path,
            expected: FileType::Directory,
        });
    }

    let umask = match attributes.get(AttrName::Umask) {
        None => default_umask & 0o777,
        Some(value) => interpret_umask(value).ok_or_else(|| TreeError::InvalidMode {
            path: path.clone(),
            mode: value.to_string(),
        })?,
    };
    let mode_value = attributes.get(AttrName::Mode);
    let permissions = interpret_mode(mode_value, Some(file_type), umask).ok_or_else(|| {
        TreeError::InvalidMode {
            path: path.clone(),
            mode: mode_value.map(Value::to_string).unwrap_or_default(),
        }
    })?;

    let dest = match (file_type, attributes.get(AttrName::Dest)) {
        (FileType::Symlink, Some(Value::String(dest))) => Some(PathBuf::from(dest)),
        (FileType::Symlink, Some(_)) => {
            return Err(TreeError::InvalidAttribute {
                path,
                name: "dest",
                reason: "expected a string".to_owned(),
            });
        }
        (FileType::Symlink, None) => {
            return Err(TreeError::MissingRequiredParameter {
                path,
                parameter: "dest",
            });
        }
        _ => None,
    };

    let content = match file_type {
        FileType::File => content_bytes(attributes.get(AttrName::Content), &path)?,
        _ => Vec::new(),
    };

    let owner = attributes
        .get(AttrName::Owner)
        .map(|value| resolve_user(value, &path))
        .transpose()?;
    if let Some(uid) = owner {
        if !identity.may_chown_to(uid) {
            return Err(TreeError::PermissionDenied {
                path,
                operation: "chown",
            });
        }
    }
    let group = attributes
        .get(AttrName::Group)
        .map(|value| resolve_group(value, &path))
        .transpose()?;

    Ok(FileSpec {
        path,
        file_type,
        permissions,
        owner,
        group,
        dest,
        content,
    })
}

/// File content as a string, or as an array of byte values.
fn content_bytes(value: Option<&Value>, path: &Path) -> Result<Vec<u8>, TreeError> {
    let invalid = || TreeError::InvalidAttribute {
        path: path.to_path_buf(),
        name: "content",
        reason: "expected a string or an array of bytes".to_owned(),
    };

    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(text)) => Ok(text.as_bytes().to_vec()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|byte| u8::try_from(byte).ok())
                    .ok_or_else(invalid)
            })
            .collect(),
        Some(_) => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Permissions;
    use serde_json::json;

    const USER: Identity = Identity::from_uid(1000);

    fn node(value: Value) -> Node {
        Node::from_json(&value).unwrap()
    }

    fn literal(normalized: &Normalized, name: AttrName) -> Option<&Value> {
        normalized.attributes.get(&name).and_then(AttrValue::as_literal)
    }

    fn resolved_attrs(value: Value) -> Attributes {
        normalize(node(value), None)
            .unwrap()
            .resolve(0o022, USER)
            .unwrap()
            .attributes
    }

    #[test]
    fn unknown_attribute_names_the_key() {
        let err = normalize(node(json!({ "-colour": "red" })), None).unwrap_err();
        assert!(matches!(err, TreeError::UnknownAttribute { ref name } if name == "-colour"));
    }

    #[test]
    fn root_without_path_gets_dot() {
        let normalized = normalize(Node::new(), None).unwrap();
        assert_eq!(literal(&normalized, AttrName::Path), Some(&json!(".")));
    }

    #[test]
    fn child_path_joins_parent_path_and_name() {
        let parent = resolved_attrs(json!({ "-path": "out", "a": {} }));
        let child = normalize(node(json!({ "-name": "a" })), Some(&parent)).unwrap();
        assert_eq!(literal(&child, AttrName::Path), Some(&json!("out/a")));
    }

    #[test]
    fn child_name_must_be_one_component() {
        let parent = resolved_attrs(json!({ "-path": "out", "x": {} }));
        let err = normalize(node(json!({ "-name": "../escape" })), Some(&parent)).unwrap_err();
        assert!(matches!(err, TreeError::InvalidAttribute { name: "name", .. }));
    }

    #[test]
    fn type_is_inferred() {
        let ty = |value| literal(&normalize(node(value), None).unwrap(), AttrName::Type).cloned();
        assert_eq!(ty(json!({ "-dest": "x" })), Some(json!("symlink")));
        assert_eq!(ty(json!({ "a": {} })), Some(json!("directory")));
        assert_eq!(ty(json!({})), Some(json!("file")));
        assert_eq!(ty(json!({ "-type": "d" })), Some(json!("d")));
    }

    #[test]
    fn inherit_string_is_promoted_and_self_appended() {
        let normalized = normalize(node(json!({ "-inherit": "mode" })), None).unwrap();
        assert_eq!(normalized.inherit, vec![AttrName::Mode, AttrName::Inherit]);
        assert_eq!(
            literal(&normalized, AttrName::Inherit),
            Some(&json!(["mode", "inherit"]))
        );
    }

    #[test]
    fn inherit_list_is_deduplicated() {
        let normalized =
            normalize(node(json!({ "-inherit": ["inherit", "owner", "owner"] })), None).unwrap();
        assert_eq!(normalized.inherit, vec![AttrName::Inherit, AttrName::Owner]);
    }

    #[test]
    fn inherit_rejects_unknown_names() {
        let err = normalize(node(json!({ "-inherit": ["mode", "colour"] })), None).unwrap_err();
        assert!(matches!(err, TreeError::UnknownAttribute { ref name } if name == "colour"));
    }

    #[test]
    fn invalid_attribute_errors_name_the_node() {
        let err = normalize(node(json!({ "-path": "out", "-inherit": 7 })), None).unwrap_err();
        assert!(matches!(
            err,
            TreeError::InvalidAttribute { ref path, name: "inherit", .. } if path == Path::new("out")
        ));

        let err = normalize(node(json!({ "-path": 42 })), None)
            .unwrap()
            .resolve(0o022, Identity::from_uid(0))
            .unwrap_err();
        assert!(matches!(
            err,
            TreeError::InvalidAttribute { ref path, name: "path", .. } if path == Path::new("42")
        ));
    }

    #[test]
    fn inherit_into_respects_overrides_and_positional_attributes() {
        let parent = resolved_attrs(json!({
            "-path": "out",
            "-inherit": ["mode", "path", "content"],
            "-mode": 511,
            "-content": "shared",
            "a": {}
        }));
        let inherit = [AttrName::Mode, AttrName::Path, AttrName::Content, AttrName::Inherit];

        let mut child = node(json!({ "-content": "own" }));
        inherit_into(&mut child, &parent, &inherit);

        assert_eq!(child.attr(AttrName::Mode).and_then(AttrValue::as_literal), Some(&json!(511)));
        assert_eq!(
            child.attr(AttrName::Content).and_then(AttrValue::as_literal),
            Some(&json!("own"))
        );
        assert!(child.attr(AttrName::Path).is_none());
        assert!(child.attr(AttrName::Inherit).is_some());
    }

    #[test]
    fn resolve_builds_file_spec() {
        let resolved = normalize(node(json!({ "-path": "f", "-mode": "rw-r-----", "-content": "x" })), None)
            .unwrap()
            .resolve(0o022, USER)
            .unwrap();
        assert_eq!(resolved.spec.path, PathBuf::from("f"));
        assert_eq!(resolved.spec.file_type, FileType::File);
        assert_eq!(resolved.spec.permissions, Permissions::from_mode(0o640));
        assert_eq!(resolved.spec.content, b"x");
    }

    #[test]
    fn resolve_uses_node_umask_over_default() {
        let spec = |value| {
            normalize(node(value), None)
                .unwrap()
                .resolve(0o022, USER)
                .unwrap()
                .spec
        };
        assert_eq!(spec(json!({ "-type": "dir" })).permissions.mode(), 0o755);
        assert_eq!(
            spec(json!({ "-type": "dir", "-umask": "077" })).permissions.mode(),
            0o700
        );
    }

    #[test]
    fn resolve_evaluates_computed_values_after_inheritance() {
        let parent = resolved_attrs(json!({
            "-path": "out",
            "-inherit": "mode",
            "-mode": "rwx------",
            "a": {}
        }));
        let mut child = Node::new()
            .with_attr(AttrName::Name, "notes")
            .with_computed(AttrName::Content, |attrs| {
                json!(format!(
                    "{} {}",
                    attrs.get_str(AttrName::Path).unwrap_or_default(),
                    attrs.get_str(AttrName::Mode).unwrap_or_default()
                ))
            });
        inherit_into(&mut child, &parent, &[AttrName::Mode, AttrName::Inherit]);

        let resolved = normalize(child, Some(&parent))
            .unwrap()
            .resolve(0o022, USER)
            .unwrap();
        assert_eq!(resolved.spec.content, b"out/notes rwx------");
        assert_eq!(resolved.spec.permissions.mode(), 0o700);
    }

    #[test]
    fn resolve_rejects_bad_type_and_mode() {
        let resolve = |value| normalize(node(value), None).unwrap().resolve(0, USER);
        assert!(matches!(
            resolve(json!({ "-type": "fifo" })),
            Err(TreeError::UnknownFileType { .. })
        ));
        assert!(matches!(
            resolve(json!({ "-mode": 4096 })),
            Err(TreeError::InvalidMode { .. })
        ));
        assert!(matches!(
            resolve(json!({ "-umask": "9" })),
            Err(TreeError::InvalidMode { .. })
        ));
    }

    #[test]
    fn resolve_requires_dest_for_symlinks() {
        let err = normalize(node(json!({ "-type": "l" })), None)
            .unwrap()
            .resolve(0, USER)
            .unwrap_err();
        assert!(matches!(
            err,
            TreeError::MissingRequiredParameter {
                parameter: "dest",
                ..
            }
        ));
    }

    #[test]
    fn resolve_rejects_children_under_non_directory() {
        let err = normalize(node(json!({ "-type": "file", "a": {} })), None)
            .unwrap()
            .resolve(0, USER)
            .unwrap_err();
        assert!(matches!(
            err,
            TreeError::IncorrectFileType {
                expected: FileType::Directory,
                ..
            }
        ));
    }

    #[test]
    fn resolve_accepts_byte_array_content() {
        let resolved = normalize(node(json!({ "-content": [0, 159, 255] })), None)
            .unwrap()
            .resolve(0, USER)
            .unwrap();
        assert_eq!(resolved.spec.content, vec![0, 159, 255]);
        assert!(
            normalize(node(json!({ "-content": [256] })), None)
                .unwrap()
                .resolve(0, USER)
                .is_err()
        );
    }

    #[test]
    fn foreign_owner_requires_root() {
        let normalized = normalize(node(json!({ "-owner": 1001 })), None).unwrap();
        assert!(matches!(
            normalized.clone().resolve(0, USER),
            Err(TreeError::PermissionDenied { .. })
        ));
        let as_root = normalized.resolve(0, Identity::from_uid(0)).unwrap();
        assert_eq!(as_root.spec.owner, Some(1001));
    }

    #[test]
    fn own_owner_is_allowed() {
        let resolved = normalize(node(json!({ "-owner": "1000", "-group": 50 })), None)
            .unwrap()
            .resolve(0, USER)
            .unwrap();
        assert_eq!(resolved.spec.owner, Some(1000));
        assert_eq!(resolved.spec.group, Some(50));
    }
}
