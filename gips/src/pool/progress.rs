//! Shared progress of a running `execute` call.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Snapshot of pool progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStatus {
    /// Tasks handed to the current (or last) `execute` call.
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Stage of the batch being run.
    pub stage: usize,
    pub is_complete: bool,
}

impl PoolStatus {
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Progress as a fraction from 0.0 to 1.0.
    pub fn progress_fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.processed() as f64 / self.total as f64
    }
}

/// Handle for watching and cancelling a pool from another thread.
///
/// Cheap to clone.
#[derive(Debug, Clone)]
pub struct PoolHandle {
    pub(super) status: Arc<Mutex<PoolStatus>>,
    pub(super) cancellation: CancellationToken,
}

impl PoolHandle {
    pub fn status(&self) -> PoolStatus {
        self.status.lock().clone()
    }

    /// Stop starting new tasks; running tasks complete.
    pub fn cancel(&self) {
        info!("Pool cancellation requested");
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_fraction() {
        let mut status = PoolStatus::default();
        assert_eq!(status.progress_fraction(), 1.0);
        status.total = 4;
        status.succeeded = 1;
        status.failed = 1;
        assert_eq!(status.processed(), 2);
        assert_eq!(status.progress_fraction(), 0.5);
    }

    #[test]
    fn test_handle_cancels_shared_token() {
        let token = CancellationToken::new();
        let handle = PoolHandle {
            status: Arc::new(Mutex::new(PoolStatus::default())),
            cancellation: token.clone(),
        };
        handle.cancel();
        assert!(token.is_cancelled());
        assert!(handle.clone().is_cancelled());
    }
}
