//! # Node Lifecycle
//!
//! Tracks `Running -> ShuttingDown -> Done` for one node of the bus tree.
//! The status lives in a `watch` channel so any number of handles can wait
//! for a transition without touching the node's own state.

use std::sync::Arc;
use tokio::sync::watch;

/// Lifecycle status of a bus node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeStatus {
    /// Accepting publishes and subscriptions.
    Running,
    /// Shutdown requested; unwinding the subtree.
    ShuttingDown,
    /// The node and every descendant have finished.
    Done,
}

/// Shared lifecycle cell for one node.
#[derive(Debug, Clone)]
pub(crate) struct Lifecycle {
    status: Arc<watch::Sender<NodeStatus>>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        let (status, _) = watch::channel(NodeStatus::Running);
        Self {
            status: Arc::new(status),
        }
    }

    pub(crate) fn status(&self) -> NodeStatus {
        *self.status.borrow()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.status() == NodeStatus::Running
    }

    /// Move to `ShuttingDown`. Returns `false` if shutdown was already
    /// requested, so repeated calls are harmless.
    pub(crate) fn request_shutdown(&self) -> bool {
        self.status.send_if_modified(|status| {
            if *status == NodeStatus::Running {
                *status = NodeStatus::ShuttingDown;
                true
            } else {
                false
            }
        })
    }

    pub(crate) fn mark_done(&self) {
        self.status.send_replace(NodeStatus::Done);
    }

    /// Resolves once the node has left `Running`.
    pub(crate) async fn shutting_down(&self) {
        let mut rx = self.status.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|status| *status != NodeStatus::Running).await;
    }

    /// Resolves once the node is `Done`.
    pub(crate) async fn done(&self) {
        let mut rx = self.status.subscribe();
        let _ = rx.wait_for(|status| *status == NodeStatus::Done).await;
    }
}
