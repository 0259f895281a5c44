use std::time::Duration;

use thiserror::Error;

/// A failed write to the tracking store.
///
/// Never surfaces to HTTP callers: the tracker logs it and moves on.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connectivity, constraint or disk failure reported by the backend.
    #[error("store backend error: {0}")]
    Backend(#[from] anyhow::Error),

    #[error("store write timed out after {0:?}")]
    Timeout(Duration),
}
