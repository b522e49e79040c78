//! Per-task execution results.

use std::path::PathBuf;

use thiserror::Error;

use crate::datasource::ProductName;
use crate::driver::TaskId;

/// Why a task did not produce its file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    /// The generator returned an error.
    #[error("generator failed: {0}")]
    Generator(String),

    /// The generator panicked.
    #[error("generator panicked: {0}")]
    Panicked(String),

    /// The generator reported success but its output is unusable.
    #[error("malformed output {path}: {reason}")]
    MalformedOutput { path: PathBuf, reason: String },

    /// A task this one depends on did not succeed.
    #[error("prerequisite task #{0} failed")]
    PrerequisiteFailed(TaskId),

    /// No generator is registered for the product.
    #[error("no generator registered for product '{0}'")]
    NoGenerator(ProductName),

    /// Cancellation was requested before the task started.
    #[error("cancelled before start")]
    Cancelled,

    /// The pool deadline passed before the task started.
    #[error("deadline passed before start")]
    TimedOut,
}

/// Result of one task, keyed by task id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded { task: TaskId, output: PathBuf },
    Failed { task: TaskId, reason: FailureReason },
}

impl TaskOutcome {
    pub fn task(&self) -> TaskId {
        match self {
            TaskOutcome::Succeeded { task, .. } | TaskOutcome::Failed { task, .. } => *task,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded { .. })
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            TaskOutcome::Failed { reason, .. } => Some(reason),
            TaskOutcome::Succeeded { .. } => None,
        }
    }
}

/// Errors creating a pool.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("failed to build worker pool: {0}")]
    Build(#[from] rayon::ThreadPoolBuildError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_accessors() {
        let ok = TaskOutcome::Succeeded {
            task: 3,
            output: PathBuf::from("a.tif"),
        };
        let failed = TaskOutcome::Failed {
            task: 4,
            reason: FailureReason::PrerequisiteFailed(3),
        };
        assert!(ok.is_success());
        assert_eq!(failed.task(), 4);
        assert_eq!(failed.failure().unwrap().to_string(), "prerequisite task #3 failed");
    }
}
