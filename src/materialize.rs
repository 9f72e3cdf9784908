//! Materializing an attributed tree onto a backend.
//!
//! The walk is top-down. Each node is normalized against its parent's
//! resolved attributes, created (or found satisfied), and then its children
//! are spawned as one task group and joined before the node reports back.
//! Parents are always resolved before their children are dispatched; the
//! order between siblings is unspecified.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::context::{WalkState, join_group};
use crate::mode::DEFAULT_UMASK;
use crate::normalize::{Resolved, inherit_into, normalize};
use crate::{
    AttrName, AttrValue, Attributes, Backend, File, FileSpec, FileType, Identity, LocalBackend,
    Node, TreeError,
};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How [`apply`] treats entries that already exist.
///
/// # Example
///
/// ```rust
/// use jsondir::ApplyOptions;
///
/// let options: ApplyOptions = serde_json::from_str(r#"{ "overwrite": true }"#).unwrap();
/// assert!(options.overwrite);
/// assert_eq!(options.umask, 0o022);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ApplyOptions {
    /// Leave existing entries untouched instead of failing.
    pub ignore_exists: bool,
    /// Replace existing non-directory entries. Implies `ignore_exists`.
    pub overwrite: bool,
    /// Recursively delete the root's target before creating anything.
    pub nuke: bool,
    /// Umask applied to default modes when a node sets none. Only the
    /// permission bits (`0o777`) are meaningful.
    #[serde(deserialize_with = "deserialize_umask")]
    pub umask: u32,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            ignore_exists: false,
            overwrite: false,
            nuke: false,
            umask: DEFAULT_UMASK,
        }
    }
}

impl ApplyOptions {
    /// Set [`ignore_exists`](Self::ignore_exists).
    pub fn ignore_exists(mut self, enabled: bool) -> Self {
        self.ignore_exists = enabled;
        self
    }

    /// Set [`overwrite`](Self::overwrite).
    pub fn overwrite(mut self, enabled: bool) -> Self {
        self.overwrite = enabled;
        self
    }

    /// Set [`nuke`](Self::nuke).
    pub fn nuke(mut self, enabled: bool) -> Self {
        self.nuke = enabled;
        self
    }

    /// Set [`umask`](Self::umask).
    pub fn umask(mut self, umask: u32) -> Self {
        self.umask = umask & 0o777;
        self
    }

    fn tolerates_existing(&self) -> bool {
        self.ignore_exists || self.overwrite
    }
}

fn deserialize_umask<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;
    use serde::de::Error;

    let umask = u32::deserialize(deserializer)?;
    if umask > 0o777 {
        return Err(D::Error::custom(format_args!(
            "umask {umask:#o} exceeds 0o777"
        )));
    }
    Ok(umask)
}

/// What an [`apply`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Entries created where nothing existed.
    pub created: usize,
    /// Existing entries removed and recreated.
    pub replaced: usize,
    /// Existing entries left as they were.
    pub satisfied: usize,
    /// Entries deleted by the nuke pass.
    pub nuked: usize,
}

#[derive(Debug, Default)]
struct Counters {
    created: AtomicUsize,
    replaced: AtomicUsize,
    satisfied: AtomicUsize,
}

struct OperationContext<B> {
    backend: Arc<B>,
    options: ApplyOptions,
    identity: Identity,
    state: WalkState,
    counters: Counters,
}

/// Creates attributed trees on a backend.
///
/// # Example
///
/// ```rust,no_run
/// use jsondir::{ApplyOptions, Materializer, Node};
/// use serde_json::json;
///
/// # async fn demo() -> Result<(), jsondir::TreeError> {
/// let tree = Node::from_json(&json!({ "-path": "out", "a": { "a1": {} }, "b": {} }))?;
/// let report = Materializer::new(ApplyOptions::default()).apply(tree).await?;
/// assert_eq!(report.created, 4);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Materializer<B> {
    backend: Arc<B>,
    options: ApplyOptions,
    identity: Identity,
}

impl Materializer<LocalBackend> {
    /// Materialize onto the host filesystem.
    pub fn new(options: ApplyOptions) -> Self {
        Self::with_backend(Arc::new(LocalBackend::new()), options)
    }
}

impl<B: Backend> Materializer<B> {
    /// Materialize onto `backend`.
    pub fn with_backend(backend: Arc<B>, options: ApplyOptions) -> Self {
        Self {
            backend,
            options,
            identity: Identity::current(),
        }
    }

    /// Check `owner` attributes against `identity` instead of the process's
    /// effective user.
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    /// Create `root` and its descendants.
    ///
    /// # Errors
    ///
    /// The first error any node raises. Tasks already running for other
    /// branches finish first; nodes not yet started are skipped.
    ///
    /// - [`TreeError::UnsafeOperation`] if `nuke` is set and the root has no
    ///   explicit path, or its target contains the working directory
    /// - [`TreeError::FileExists`] for an existing entry that is neither
    ///   tolerated nor a directory being merged into
    /// - any validation error from normalization
    pub async fn apply(&self, root: Node) -> Result<ApplyReport, TreeError> {
        let ctx = Arc::new(OperationContext {
            backend: Arc::clone(&self.backend),
            options: self.options,
            identity: self.identity,
            state: WalkState::new(),
            counters: Counters::default(),
        });

        let explicit_path = root.attr(AttrName::Path).is_some();
        let root = normalize(root, None)?.resolve(self.options.umask, self.identity)?;

        let nuked = if self.options.nuke {
            if !explicit_path {
                return Err(TreeError::UnsafeOperation {
                    path: root.spec.path,
                    reason: "nuke requires an explicit root path",
                });
            }
            nuke(ctx.backend.as_ref(), &root.spec.path).await?
        } else {
            0
        };

        apply_resolved(Arc::clone(&ctx), root).await?;
        debug_assert_eq!(ctx.state.pending(), 0);

        let report = ApplyReport {
            created: ctx.counters.created.load(Ordering::SeqCst),
            replaced: ctx.counters.replaced.load(Ordering::SeqCst),
            satisfied: ctx.counters.satisfied.load(Ordering::SeqCst),
            nuked,
        };
        info!(
            created = report.created,
            replaced = report.replaced,
            satisfied = report.satisfied,
            nuked = report.nuked,
            "tree applied"
        );
        Ok(report)
    }
}

/// Create `root` and its descendants on the host filesystem.
///
/// Shorthand for `Materializer::new(options).apply(root)`.
pub async fn apply(root: Node, options: ApplyOptions) -> Result<ApplyReport, TreeError> {
    Materializer::new(options).apply(root).await
}

fn apply_node<B: Backend>(
    ctx: Arc<OperationContext<B>>,
    node: Node,
    parent: Arc<Attributes>,
) -> BoxFuture<'static, Result<(), TreeError>> {
    Box::pin(async move {
        if ctx.state.is_cancelled() {
            return Ok(());
        }
        let resolved =
            normalize(node, Some(parent.as_ref()))?.resolve(ctx.options.umask, ctx.identity)?;
        apply_resolved(ctx, resolved).await
    })
}

/// Create one resolved node, then dispatch its children as one task group.
async fn apply_resolved<B: Backend>(
    ctx: Arc<OperationContext<B>>,
    resolved: Resolved,
) -> Result<(), TreeError> {
    let Resolved {
        attributes,
        spec,
        inherit,
        children,
    } = resolved;

    materialize(&ctx, spec).await?;
    ctx.state.discover(children.len());
    ctx.state.finish_node();

    if children.is_empty() || ctx.state.is_cancelled() {
        return Ok(());
    }

    let attributes = Arc::new(attributes);
    let mut group = JoinSet::new();
    for (name, mut child) in children {
        child.set_attr(AttrName::Name, AttrValue::Literal(Value::String(name)));
        inherit_into(&mut child, &attributes, &inherit);
        group.spawn(apply_node(Arc::clone(&ctx), child, Arc::clone(&attributes)));
    }
    join_group(&ctx.state, group).await.map(|_| ())
}

/// Create one entry, or decide that the existing one satisfies it.
async fn materialize<B: Backend>(
    ctx: &OperationContext<B>,
    spec: FileSpec,
) -> Result<(), TreeError> {
    let declared = spec.file_type;
    let mut file = File::from_spec(ctx.backend.as_ref(), spec).await?;
    if ctx.state.is_cancelled() {
        return Ok(());
    }

    let Some(existing) = file.metadata().map(|meta| meta.file_type) else {
        file.create().await?;
        ctx.counters.created.fetch_add(1, Ordering::SeqCst);
        return Ok(());
    };

    let options = &ctx.options;
    if existing == FileType::Directory && declared == FileType::Directory {
        debug!(path = %file.path().display(), "merging into existing directory");
        ctx.counters.satisfied.fetch_add(1, Ordering::SeqCst);
    } else if options.overwrite && existing != FileType::Directory {
        debug!(path = %file.path().display(), %existing, "replacing");
        file.remove().await?;
        file.create().await?;
        ctx.counters.replaced.fetch_add(1, Ordering::SeqCst);
    } else if options.tolerates_existing() {
        debug!(path = %file.path().display(), "exists, left untouched");
        ctx.counters.satisfied.fetch_add(1, Ordering::SeqCst);
    } else {
        return Err(TreeError::FileExists {
            path: file.path().to_path_buf(),
        });
    }
    Ok(())
}

/// Delete the root's target before anything is created.
///
/// Returns the number of entries removed.
async fn nuke<B: Backend>(backend: &B, target: &Path) -> Result<usize, TreeError> {
    let Some(meta) = backend.symlink_metadata(target).await? else {
        return Ok(0);
    };

    if meta.file_type != FileType::Symlink {
        let canonical = backend.canonicalize(target).await?;
        let cwd = backend.canonicalize(&backend.current_dir()?).await?;
        if cwd.starts_with(&canonical) {
            return Err(TreeError::UnsafeOperation {
                path: target.to_path_buf(),
                reason: "target is the working directory or one of its ancestors",
            });
        }
    }

    warn!(path = %target.display(), "nuking target before apply");
    remove_tree(backend, target.to_path_buf()).await
}

/// Remove `path` and everything below it, emptying directories before
/// removing them.
fn remove_tree<B: Backend>(backend: &B, path: PathBuf) -> BoxFuture<'_, Result<usize, TreeError>> {
    Box::pin(async move {
        let mut file = File::open(backend, path).await?;
        if !file.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        if file.file_type() == Some(FileType::Directory) {
            for name in backend.read_dir(file.path()).await? {
                removed += remove_tree(backend, file.path().join(name)).await?;
            }
        }
        file.remove().await?;
        Ok(removed + 1)
    })
}
