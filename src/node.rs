//! The attributed tree: nodes, attribute values and the wire shape.
//!
//! On the wire a node is a JSON object. Keys starting with `-` are node
//! attributes, every other key names a child node:
//!
//! ```json
//! {
//!   "-path": "out",
//!   "-inherit": "mode",
//!   "-mode": "rwxr-x---",
//!   "notes.txt": { "-content": "hello" },
//!   "bin": { "run": { "-dest": "../notes.txt" } }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::{ATTRIBUTE_MARKER, AttrName, TreeError};

/// A function computing an attribute value from a node's other attributes.
#[derive(Clone)]
pub struct Computed(Arc<dyn Fn(&Attributes) -> Value + Send + Sync>);

impl Computed {
    /// Wrap a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Attributes) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Evaluate against a resolved attribute snapshot.
    pub fn evaluate(&self, attributes: &Attributes) -> Value {
        (self.0)(attributes)
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Computed(..)")
    }
}

/// An attribute value: either given directly or computed per node.
#[derive(Debug, Clone)]
pub enum AttrValue {
    /// A plain value.
    Literal(Value),
    /// Computed once per node, after inheritance has been merged.
    Computed(Computed),
}

impl AttrValue {
    /// The literal value, if this is not a computed one.
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            AttrValue::Literal(value) => Some(value),
            AttrValue::Computed(_) => None,
        }
    }
}

/// One node of an attributed tree.
///
/// Attribute keys are stored without their marker and are only validated
/// when the node is normalized, so a node built from arbitrary input can
/// carry unknown attributes until then.
///
/// # Example
///
/// ```rust
/// use jsondir::{AttrName, Node};
/// use serde_json::json;
///
/// let tree = Node::new()
///     .with_attr(AttrName::Path, "out")
///     .with_child("readme", Node::new().with_attr(AttrName::Content, "hi"))
///     .with_child("docs", Node::new().with_child("a.txt", Node::new()));
///
/// assert_eq!(tree.to_json()["readme"], json!({ "-content": "hi" }));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub(crate) attributes: BTreeMap<String, AttrValue>,
    pub(crate) children: BTreeMap<String, Node>,
}

impl Node {
    /// An empty node: a regular file unless attributes or children say otherwise.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a reserved attribute to a literal value.
    pub fn with_attr(mut self, name: AttrName, value: impl Into<Value>) -> Self {
        self.set_attr(name, AttrValue::Literal(value.into()));
        self
    }

    /// Set a reserved attribute to a value computed from the node's other
    /// attributes.
    pub fn with_computed<F>(self, name: AttrName, f: F) -> Self
    where
        F: Fn(&Attributes) -> Value + Send + Sync + 'static,
    {
        let mut node = self;
        node.set_attr(name, AttrValue::Computed(Computed::new(f)));
        node
    }

    /// Add a child node.
    pub fn with_child(mut self, name: impl Into<String>, child: Node) -> Self {
        self.children.insert(name.into(), child);
        self
    }

    /// Set a reserved attribute in place.
    pub fn set_attr(&mut self, name: AttrName, value: AttrValue) {
        self.attributes.insert(name.as_str().to_owned(), value);
    }

    /// Look up an attribute by name.
    pub fn attr(&self, name: AttrName) -> Option<&AttrValue> {
        self.attributes.get(name.as_str())
    }

    /// Look up a child by name.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.get(name)
    }

    /// Iterate over children in name order.
    pub fn children(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.children.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Parse the wire shape.
    ///
    /// # Errors
    ///
    /// - [`TreeError::MalformedNode`] if the value or a child value is not an object
    pub fn from_json(value: &Value) -> Result<Self, TreeError> {
        let Value::Object(map) = value else {
            return Err(TreeError::MalformedNode {
                key: String::from("<root>"),
            });
        };
        Self::from_map(map)
    }

    fn from_map(map: &Map<String, Value>) -> Result<Self, TreeError> {
        let mut node = Node::new();
        for (key, value) in map {
            if let Some(name) = key.strip_prefix(ATTRIBUTE_MARKER) {
                node.attributes
                    .insert(name.to_owned(), AttrValue::Literal(value.clone()));
                continue;
            }
            let Value::Object(child) = value else {
                return Err(TreeError::MalformedNode { key: key.clone() });
            };
            node.children.insert(key.clone(), Self::from_map(child)?);
        }
        Ok(node)
    }

    /// Render the wire shape. Computed attributes have no literal form and
    /// are left out.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (name, value) in &self.attributes {
            if let Some(literal) = value.as_literal() {
                map.insert(format!("{ATTRIBUTE_MARKER}{name}"), literal.clone());
            }
        }
        for (name, child) in &self.children {
            map.insert(name.clone(), child.to_json());
        }
        Value::Object(map)
    }
}

impl serde::Serialize for Node {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Node {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Node::from_json(&value).map_err(serde::de::Error::custom)
    }
}

/// A node's attributes after merging and resolution: every value is literal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    values: BTreeMap<AttrName, Value>,
}

impl Attributes {
    /// Look up an attribute value.
    pub fn get(&self, name: AttrName) -> Option<&Value> {
        self.values.get(&name)
    }

    /// Look up a string-valued attribute.
    pub fn get_str(&self, name: AttrName) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Returns `true` if the attribute is set.
    pub fn contains(&self, name: AttrName) -> bool {
        self.values.contains_key(&name)
    }

    pub(crate) fn insert(&mut self, name: AttrName, value: Value) {
        self.values.insert(name, value);
    }

    /// Iterate over the set attributes.
    pub fn iter(&self) -> impl Iterator<Item = (AttrName, &Value)> {
        self.values.iter().map(|(name, value)| (*name, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_splits_attributes_and_children() {
        let node = Node::from_json(&json!({
            "-path": "out",
            "-mode": 493,
            "a": { "a1": {} },
            "b": {}
        }))
        .unwrap();

        assert_eq!(
            node.attr(AttrName::Path).and_then(AttrValue::as_literal),
            Some(&json!("out"))
        );
        let names: Vec<_> = node.children().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(node.child("a").unwrap().child("a1").is_some());
    }

    #[test]
    fn from_json_keeps_unknown_attributes_for_validation() {
        let node = Node::from_json(&json!({ "-colour": "red" })).unwrap();
        assert!(node.attributes.contains_key("colour"));
    }

    #[test]
    fn from_json_rejects_scalar_children() {
        let err = Node::from_json(&json!({ "a": "not a node" })).unwrap_err();
        assert!(matches!(err, TreeError::MalformedNode { ref key } if key == "a"));
        assert!(Node::from_json(&json!([1, 2])).is_err());
    }

    #[test]
    fn to_json_skips_computed_values() {
        let node = Node::new()
            .with_attr(AttrName::Type, "file")
            .with_computed(AttrName::Content, |_| json!("later"));
        assert_eq!(node.to_json(), json!({ "-type": "file" }));
    }

    #[test]
    fn serde_round_trip_through_wire_shape() {
        let wire = json!({ "-path": "out", "x": { "-dest": "y" } });
        let node: Node = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(serde_json::to_value(&node).unwrap(), wire);
    }

    #[test]
    fn computed_sees_attributes() {
        let computed = Computed::new(|attrs| json!(attrs.get_str(AttrName::Name).unwrap_or("?")));
        let mut attrs = Attributes::default();
        attrs.insert(AttrName::Name, json!("notes"));
        assert_eq!(computed.evaluate(&attrs), json!("notes"));
    }
}
