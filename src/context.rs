//! Shared state of one tree walk.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::task::JoinSet;
use tracing::trace;

use crate::TreeError;

/// Completion and cancellation tracking shared by every task of a walk.
///
/// `pending` starts at one for the root. A node adds its children before
/// finishing its own step, so the count only reaches zero once every
/// discovered node is done.
#[derive(Debug)]
pub(crate) struct WalkState {
    cancelled: AtomicBool,
    pending: AtomicUsize,
}

impl WalkState {
    pub(crate) fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            pending: AtomicUsize::new(1),
        }
    }

    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Record `count` newly discovered nodes.
    pub(crate) fn discover(&self, count: usize) {
        self.pending.fetch_add(count, Ordering::SeqCst);
    }

    /// Record that one node finished its own step. Returns the number of
    /// nodes still pending.
    pub(crate) fn finish_node(&self) -> usize {
        let remaining = self.pending.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 {
            trace!("walk complete");
        }
        remaining
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

/// Join every task of one parent's group.
///
/// The first failure cancels the walk; the remaining tasks still run to
/// completion (skipping their work) and their results are discarded.
pub(crate) async fn join_group<T: 'static>(
    state: &WalkState,
    mut group: JoinSet<Result<T, TreeError>>,
) -> Result<Vec<T>, TreeError> {
    let mut first_error = None;
    let mut outputs = Vec::with_capacity(group.len());

    while let Some(joined) = group.join_next().await {
        match joined.map_err(TreeError::from).and_then(|result| result) {
            Ok(output) => outputs.push(output),
            Err(err) => {
                state.cancel();
                first_error.get_or_insert(err);
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(outputs),
    }
}
