//! Bounded parallel execution of generation tasks.
//!
//! Tasks run on a dedicated rayon pool, one batch per stage, lowest stage
//! first. Within a batch tasks are independent; across batches a task runs
//! only when every prerequisite succeeded.
//!
//! ```text
//! stage 0: [ref T1] [ref T2] [ref T3]      ─┐ batch
//!                     │ fails               │
//! stage 1: [ndvi T1] [ndvi T2] [ndvi T3]   ─┘ ndvi T2 → PrerequisiteFailed
//! ```
//!
//! Failures stay with their task: a generator error, a panic (caught with
//! `catch_unwind`) or a malformed output marks that task failed and its
//! siblings carry on. Nothing is retried.
//!
//! Cancellation (`CancellationToken`) and the optional deadline are checked
//! between batches and before each task starts. Tasks already running are
//! never interrupted.

mod generator;
mod outcome;
mod progress;

pub use generator::{GenerationError, GenerationRequest, Generator, GeneratorRegistry};
pub use outcome::{FailureReason, PoolError, TaskOutcome};
pub use progress::{PoolHandle, PoolStatus};

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ProcessingSettings;
use crate::driver::{GenerationTask, TaskId};
use crate::layout::{Layout, ParsedPath};

/// Worker pool for generation tasks.
pub struct ProcessingPool {
    pool: rayon::ThreadPool,
    workers: usize,
    timeout: Option<Duration>,
    cancel: CancellationToken,
    status: Arc<Mutex<PoolStatus>>,
}

impl ProcessingPool {
    /// Create a pool with `workers` threads.
    ///
    /// # Arguments
    ///
    /// * `workers` - Number of worker threads, at least 1
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NoWorkers`] for a zero worker count and
    /// [`PoolError::Build`] when rayon cannot start its threads.
    pub fn new(workers: usize) -> Result<Self, PoolError> {
        if workers == 0 {
            return Err(PoolError::NoWorkers);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("gips-worker-{i}"))
            .build()?;
        Ok(Self {
            pool,
            workers,
            timeout: None,
            cancel: CancellationToken::new(),
            status: Arc::new(Mutex::new(PoolStatus::default())),
        })
    }

    /// Create a pool from the `[processing]` configuration.
    ///
    /// Uses `workers` and `timeout` from the settings.
    ///
    /// # Errors
    ///
    /// Same as [`ProcessingPool::new`].
    pub fn from_settings(settings: &ProcessingSettings) -> Result<Self, PoolError> {
        Ok(Self::new(settings.workers)?.with_timeout(settings.timeout))
    }

    /// Stop starting tasks once `timeout` has elapsed since `execute` began.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels the pool's not-yet-started tasks.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Handle for progress queries and cancellation from other threads.
    pub fn handle(&self) -> PoolHandle {
        PoolHandle {
            status: Arc::clone(&self.status),
            cancellation: self.cancel.clone(),
        }
    }

    /// Run tasks and return one outcome per task, in task order.
    ///
    /// Tasks run stage by stage. A failed task never aborts the batch: its
    /// dependents fail with `PrerequisiteFailed` and any file it wrote at
    /// its output is removed.
    pub fn execute(
        &self,
        tasks: &[GenerationTask],
        generators: &GeneratorRegistry,
        layout: &Layout,
    ) -> Vec<TaskOutcome> {
        let deadline = self.timeout.map(|t| Instant::now() + t);

        let mut stages: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (index, task) in tasks.iter().enumerate() {
            stages.entry(task.stage).or_default().push(index);
        }

        let mut outcomes: Vec<Option<TaskOutcome>> = vec![None; tasks.len()];
        let mut failed: BTreeSet<TaskId> = BTreeSet::new();
        *self.status.lock() = PoolStatus {
            total: tasks.len(),
            ..PoolStatus::default()
        };

        for (stage, batch) in stages {
            self.status.lock().stage = stage;
            let halt = if self.cancel.is_cancelled() {
                Some(FailureReason::Cancelled)
            } else if deadline.is_some_and(|d| Instant::now() >= d) {
                Some(FailureReason::TimedOut)
            } else {
                None
            };

            let results: Vec<(usize, TaskOutcome)> = match halt {
                Some(reason) => {
                    warn!(stage, tasks = batch.len(), reason = %reason, "Skipping batch");
                    batch
                        .iter()
                        .map(|&i| {
                            let outcome = TaskOutcome::Failed {
                                task: tasks[i].id,
                                reason: reason.clone(),
                            };
                            self.record(&outcome);
                            (i, outcome)
                        })
                        .collect()
                }
                None => {
                    let failed = &failed;
                    self.pool.install(|| {
                        batch
                            .par_iter()
                            .map(|&i| {
                                let outcome =
                                    self.run_task(&tasks[i], failed, generators, layout, deadline);
                                self.record(&outcome);
                                (i, outcome)
                            })
                            .collect()
                    })
                }
            };

            let succeeded = results.iter().filter(|(_, o)| o.is_success()).count();
            info!(
                stage,
                tasks = results.len(),
                succeeded,
                failed = results.len() - succeeded,
                "Batch complete"
            );

            for (index, outcome) in results {
                if !outcome.is_success() {
                    failed.insert(outcome.task());
                }
                outcomes[index] = Some(outcome);
            }
        }

        self.status.lock().is_complete = true;
        outcomes.into_iter().flatten().collect()
    }

    fn record(&self, outcome: &TaskOutcome) {
        let mut status = self.status.lock();
        if outcome.is_success() {
            status.succeeded += 1;
        } else {
            status.failed += 1;
        }
    }

    fn run_task(
        &self,
        task: &GenerationTask,
        failed: &BTreeSet<TaskId>,
        generators: &GeneratorRegistry,
        layout: &Layout,
        deadline: Option<Instant>,
    ) -> TaskOutcome {
        let fail = |reason: FailureReason| {
            warn!(task = %task, reason = %reason, "Task failed");
            TaskOutcome::Failed {
                task: task.id,
                reason,
            }
        };

        if self.cancel.is_cancelled() {
            return fail(FailureReason::Cancelled);
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return fail(FailureReason::TimedOut);
        }
        if let Some(prerequisite) = task.prerequisites.iter().find(|p| failed.contains(p)) {
            return fail(FailureReason::PrerequisiteFailed(*prerequisite));
        }
        let Some(generator) = generators.get(&task.product) else {
            return fail(FailureReason::NoGenerator(task.product.clone()));
        };

        debug!(task = %task, inputs = task.inputs.len(), "Generating");
        let previous = modified(&task.output);
        let request = GenerationRequest::from(task);
        let reason = match catch_unwind(AssertUnwindSafe(|| generator.generate(&request))) {
            Ok(Ok(path)) => match validate_output(task, &path, layout) {
                Ok(output) => {
                    debug!(task = %task, output = %output.display(), "Generated");
                    return TaskOutcome::Succeeded {
                        task: task.id,
                        output,
                    };
                }
                Err(reason) => reason,
            },
            Ok(Err(e)) => FailureReason::Generator(e.to_string()),
            Err(payload) => FailureReason::Panicked(panic_message(payload.as_ref())),
        };
        discard_output(task, previous);
        fail(reason)
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Remove whatever a failed generator left at the task's output.
///
/// A file that is untouched since before generation stays; anything written
/// during the attempt is deleted, together with a `.partial` sibling.
fn discard_output(task: &GenerationTask, previous: Option<SystemTime>) {
    let mut partial = task.output.as_os_str().to_owned();
    partial.push(".partial");
    let mut leftovers = vec![PathBuf::from(partial)];
    if modified(&task.output).is_some_and(|now| previous != Some(now)) {
        leftovers.push(task.output.clone());
    }

    for path in leftovers {
        match fs::remove_file(&path) {
            Ok(()) => warn!(task = %task, path = %path.display(), "Removed output of failed task"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                task = %task,
                path = %path.display(),
                error = %e,
                "Could not remove output of failed task"
            ),
        }
    }
}

/// The output must be a non-empty file at the task's canonical location.
fn validate_output(
    task: &GenerationTask,
    path: &Path,
    layout: &Layout,
) -> Result<PathBuf, FailureReason> {
    let path = if path.is_relative() {
        layout.root().join(path)
    } else {
        path.to_path_buf()
    };
    let malformed = |reason: &str| FailureReason::MalformedOutput {
        path: path.clone(),
        reason: reason.to_string(),
    };

    let metadata = fs::metadata(&path).map_err(|_| malformed("file does not exist"))?;
    if !metadata.is_file() {
        return Err(malformed("not a regular file"));
    }
    if metadata.len() == 0 {
        return Err(malformed("file is empty"));
    }
    match layout.parse(&path) {
        Ok(ParsedPath::Product(key)) if key == task.key() => Ok(path),
        Ok(_) => Err(malformed("path names a different product")),
        Err(_) => Err(malformed("path does not follow the product naming")),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
