//! Reading an existing subtree back into an attributed tree.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinSet;
use tracing::debug;

use crate::context::{WalkState, join_group};
use crate::mode::format_mode;
use crate::{AttrName, Backend, File, FileType, LocalBackend, Node, TreeError};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What [`read`] embeds in the tree it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Embed regular-file content as `-content`.
    pub content: bool,
    /// Embed permissions as `-mode`, in symbolic form.
    pub mode: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            content: true,
            mode: false,
        }
    }
}

impl ReadOptions {
    /// Set [`content`](Self::content).
    pub fn content(mut self, enabled: bool) -> Self {
        self.content = enabled;
        self
    }

    /// Set [`mode`](Self::mode).
    pub fn mode(mut self, enabled: bool) -> Self {
        self.mode = enabled;
        self
    }
}

struct ReadContext<B> {
    backend: Arc<B>,
    options: ReadOptions,
    state: WalkState,
}

/// Reads filesystem subtrees from a backend.
#[derive(Debug, Clone)]
pub struct Serializer<B> {
    backend: Arc<B>,
    options: ReadOptions,
}

impl Serializer<LocalBackend> {
    /// Read from the host filesystem.
    pub fn new(options: ReadOptions) -> Self {
        Self::with_backend(Arc::new(LocalBackend::new()), options)
    }
}

impl<B: Backend> Serializer<B> {
    /// Read from `backend`.
    pub fn with_backend(backend: Arc<B>, options: ReadOptions) -> Self {
        Self { backend, options }
    }

    /// Describe the entry at `path` and everything below it.
    ///
    /// Every node carries `-path` and `-type`; files add `-content` (a
    /// string, or an array of bytes when not UTF-8), symlinks add `-dest`.
    /// Ownership cannot be described back and is left out.
    ///
    /// # Errors
    ///
    /// - [`TreeError::FileMissing`] if nothing exists at `path`
    pub async fn read(&self, path: impl Into<PathBuf>) -> Result<Node, TreeError> {
        let ctx = Arc::new(ReadContext {
            backend: Arc::clone(&self.backend),
            options: self.options,
            state: WalkState::new(),
        });
        let node = read_node(Arc::clone(&ctx), path.into()).await?;
        debug_assert_eq!(ctx.state.pending(), 0);
        Ok(node)
    }
}

/// Describe the entry at `path` on the host filesystem.
///
/// Shorthand for `Serializer::new(options).read(path)`.
pub async fn read(path: impl Into<PathBuf>, options: ReadOptions) -> Result<Node, TreeError> {
    Serializer::new(options).read(path).await
}

fn read_node<B: Backend>(
    ctx: Arc<ReadContext<B>>,
    path: PathBuf,
) -> BoxFuture<'static, Result<Node, TreeError>> {
    Box::pin(async move {
        if ctx.state.is_cancelled() {
            return Ok(Node::new());
        }

        let file = File::open(ctx.backend.as_ref(), path).await?;
        let Some(meta) = file.metadata().cloned() else {
            return Err(TreeError::FileMissing {
                path: file.path().to_path_buf(),
            });
        };

        let mut node = Node::new()
            .with_attr(AttrName::Path, file.path().to_string_lossy().into_owned())
            .with_attr(AttrName::Type, meta.file_type.as_str());
        if ctx.options.mode {
            node = node.with_attr(AttrName::Mode, format_mode(meta.permissions));
        }

        let names = match meta.file_type {
            FileType::File => {
                if ctx.options.content {
                    node = node.with_attr(AttrName::Content, content_value(file.content().await?));
                }
                Vec::new()
            }
            FileType::Symlink => {
                let dest = file.dest().await?;
                node = node.with_attr(AttrName::Dest, dest.to_string_lossy().into_owned());
                Vec::new()
            }
            FileType::Directory => ctx.backend.read_dir(file.path()).await?,
        };

        ctx.state.discover(names.len());
        ctx.state.finish_node();
        debug!(path = %file.path().display(), entries = names.len(), "read");

        if names.is_empty() {
            return Ok(node);
        }

        let mut group = JoinSet::new();
        for name in names {
            let child = read_node(Arc::clone(&ctx), file.path().join(&name));
            group.spawn(async move { child.await.map(|node| (name, node)) });
        }
        for (name, child) in join_group(&ctx.state, group).await? {
            node = node.with_child(name, child);
        }
        Ok(node)
    })
}

fn content_value(bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(text) => Value::String(text),
        Err(err) => Value::from(err.into_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_value_falls_back_to_bytes() {
        assert_eq!(content_value(b"plain".to_vec()), json!("plain"));
        assert_eq!(content_value(vec![0xff, 0x00]), json!([255, 0]));
    }

    #[test]
    fn read_options_default_to_content_without_mode() {
        let options = ReadOptions::default();
        assert!(options.content);
        assert!(!options.mode);
        let parsed: ReadOptions = serde_json::from_str(r#"{ "mode": true }"#).unwrap();
        assert_eq!(parsed, ReadOptions::default().mode(true));
    }

    #[tokio::test]
    async fn read_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = read(dir.path().join("nothing"), ReadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TreeError::FileMissing { .. }));
    }

    #[tokio::test]
    async fn read_describes_each_entry_type() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(root.join("f"), b"data").unwrap();
        std::os::unix::fs::symlink("f", root.join("l")).unwrap();

        let tree = read(&root, ReadOptions::default()).await.unwrap().to_json();
        assert_eq!(tree["-type"], json!("directory"));
        assert_eq!(tree["f"]["-type"], json!("file"));
        assert_eq!(tree["f"]["-content"], json!("data"));
        assert_eq!(tree["l"]["-type"], json!("symlink"));
        assert_eq!(tree["l"]["-dest"], json!("f"));
        assert_eq!(
            tree["l"]["-path"],
            json!(root.join("l").to_string_lossy())
        );
    }
}
