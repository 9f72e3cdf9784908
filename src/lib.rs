//! # jsondir
//!
//! Convert between **attributed trees** and real filesystem subtrees, in both
//! directions.
//!
//! An attributed tree is a nested mapping. Keys starting with `-` are node
//! attributes; every other key names a child:
//!
//! ```json
//! {
//!   "-path": "site",
//!   "-inherit": "mode",
//!   "-mode": "rwxr-x---",
//!   "index.html": { "-content": "<h1>hi</h1>" },
//!   "current": { "-dest": "index.html" }
//! }
//! ```
//!
//! [`apply`] materializes a tree onto disk; [`read`] describes an existing
//! subtree as a tree.
//!
//! ---
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jsondir::{apply, read, ApplyOptions, Node, ReadOptions};
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), jsondir::TreeError> {
//! let tree = Node::from_json(&json!({
//!     "-path": "out",
//!     "a": { "a1": {} },
//!     "b": { "-content": "hello" }
//! }))?;
//! apply(tree, ApplyOptions::default()).await?;
//!
//! let back = read("out", ReadOptions::default()).await?;
//! assert_eq!(back.to_json()["b"]["-content"], json!("hello"));
//! # Ok(())
//! # }
//! ```
//!
//! ---
//!
//! ## Attributes
//!
//! | Attribute | Meaning |
//! |-----------|---------|
//! | `-name` | Entry name; injected from the parent's key |
//! | `-type` | `file`, `directory` or `symlink`; inferred when absent |
//! | `-path` | Target path; children default to `parent/name`, the root to `.` |
//! | `-mode` | `"rwsr-x---"`, `"750"` or an integer up to `511` |
//! | `-umask` | Mask for default modes |
//! | `-owner`, `-group` | Name or numeric id |
//! | `-dest` | Symlink target (required for symlinks) |
//! | `-content` | File content: a string or an array of bytes |
//! | `-inherit` | Attributes copied to descendants unless they override them |
//!
//! Any attribute may also be computed per node with
//! [`Node::with_computed`], from the node's other (inherited) attributes.
//!
//! ---
//!
//! ## Core Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Node`] | One level of an attributed tree |
//! | [`Materializer`] | Tree → filesystem, with [`ApplyOptions`] |
//! | [`Serializer`] | Filesystem → tree, with [`ReadOptions`] |
//! | [`Backend`] | Primitive filesystem operations the walkers consume |
//! | [`LocalBackend`] | [`Backend`] over the host filesystem |
//! | [`File`] | One entry viewed through a [`Backend`] |
//! | [`TreeError`] | Every failure, with context |
//!
//! ---
//!
//! ## Concurrency
//!
//! Both walks run on tokio. The children of a node are spawned together as
//! one task group once the node itself is done, so parents always precede
//! their children while siblings complete in any order. The first error
//! cancels nodes that have not started yet; tasks already in flight finish
//! before the error is returned.

// Private modules
mod context;
mod error;
mod file;
mod identity;
mod local;
mod materialize;
mod mode;
mod node;
mod normalize;
mod serialize;
mod traits;
mod types;

// Public re-exports - error types
pub use error::TreeError;

// Public re-exports - core types
pub use node::{AttrValue, Attributes, Computed, Node};
pub use types::{ATTRIBUTE_MARKER, AttrName, FileType, Metadata, Permissions};

// Public re-exports - modes
pub use mode::{DEFAULT_UMASK, format_mode, interpret_mode, interpret_umask};

// Public re-exports - normalization
pub use normalize::{Normalized, ROOT_PATH, Resolved, inherit_into, normalize};

// Public re-exports - walkers
pub use materialize::{ApplyOptions, ApplyReport, Materializer, apply};
pub use serialize::{ReadOptions, Serializer, read};

// Public re-exports - filesystem access
pub use file::{File, FileSpec};
pub use identity::Identity;
pub use local::LocalBackend;
pub use traits::{Backend, DirBackend, LinkBackend, OwnershipBackend, ReadBackend, WriteBackend};
