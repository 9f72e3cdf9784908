//! # Backend Traits
//!
//! The primitive filesystem operations the tree walkers consume.
//!
//! ## Trait Layers
//!
//! ```text
//! ReadBackend + WriteBackend + DirBackend + LinkBackend + OwnershipBackend = Backend
//! ```
//!
//! | Trait | Operations |
//! |-------|------------|
//! | [`ReadBackend`] | `symlink_metadata`, `read`, `canonicalize`, `current_dir` |
//! | [`WriteBackend`] | `write_new`, `remove_file`, `set_permissions` |
//! | [`DirBackend`] | `create_dir`, `remove_dir`, `read_dir` |
//! | [`LinkBackend`] | `symlink`, `read_link` |
//! | [`OwnershipBackend`] | `set_owner` |
//!
//! ## Blanket Implementation
//!
//! [`Backend`] is implemented for every type implementing the five component
//! traits. Implement the components and the walkers accept your type.
//!
//! ## Asynchrony
//!
//! Methods return `impl Future + Send`. Implementations are free to write
//! `async fn` as long as the resulting futures are `Send`; the walkers spawn
//! one tokio task per node.

mod dir;
mod link;
mod ownership;
mod read;
mod write;

pub use dir::DirBackend;
pub use link::LinkBackend;
pub use ownership::OwnershipBackend;
pub use read::ReadBackend;
pub use write::WriteBackend;

/// Everything the materializer and serializer need from a filesystem.
///
/// # Blanket Implementation
///
/// Automatically implemented for any `'static` type that implements all
/// component traits. You never need to implement `Backend` directly.
///
/// # Example
///
/// ```rust
/// use jsondir::{Backend, LocalBackend};
///
/// fn takes_backend<B: Backend>(_backend: &B) {}
/// takes_backend(&LocalBackend::new());
/// ```
pub trait Backend:
    ReadBackend + WriteBackend + DirBackend + LinkBackend + OwnershipBackend + 'static
{
}

// Blanket implementation
impl<T> Backend for T where
    T: ReadBackend + WriteBackend + DirBackend + LinkBackend + OwnershipBackend + 'static
{
}
