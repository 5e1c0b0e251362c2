//! Jobs: ordered task lists that freeze the moment they start running.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use jobline_core::JobId;
use tracing::{debug, warn};

use crate::{
    engine::Scheduler,
    error::{Result, SchedulerError},
    task::{Task, TaskContext},
    types::TaskResult,
};

/// An ordered sequence of tasks run as one unit by a [`Scheduler`].
///
/// `Job` is a handle: clones share the same task list, so a caller can keep
/// one after submitting the job. Tasks can be appended until the job starts
/// running; from then on the list is frozen for good.
#[derive(Clone)]
pub struct Job {
    inner: Arc<JobInner>,
}

struct JobInner {
    id: JobId,
    state: Mutex<JobState>,
}

struct JobState {
    frozen: bool,
    /// Held by the scheduler the job is queued on or running in.
    submitted: bool,
    tasks: Vec<Arc<dyn Task>>,
}

impl Job {
    /// Empty job with a generated id.
    pub fn new() -> Self {
        Self::with_id(JobId::new())
    }

    pub fn with_id(id: impl Into<JobId>) -> Self {
        Self {
            inner: Arc::new(JobInner {
                id: id.into(),
                state: Mutex::new(JobState {
                    frozen: false,
                    submitted: false,
                    tasks: Vec::new(),
                }),
            }),
        }
    }

    /// Build a job from already-boxed tasks, generating an id when none is given.
    pub fn from_tasks<I>(id: Option<JobId>, tasks: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Task>>,
    {
        let job = Self::with_id(id.unwrap_or_default());
        job.state().tasks.extend(tasks);
        job
    }

    /// Builder-style append for freshly created jobs.
    pub fn task<T: Task + 'static>(self, task: T) -> Self {
        self.add(task);
        self
    }

    /// Append a task. Returns `false` (and leaves the job untouched) once the
    /// job has started running.
    pub fn add<T: Task + 'static>(&self, task: T) -> bool {
        self.add_arc(Arc::new(task))
    }

    pub fn add_arc(&self, task: Arc<dyn Task>) -> bool {
        let mut state = self.state();
        if state.frozen {
            warn!(job_id = %self.inner.id, "job is frozen; task not added");
            return false;
        }
        state.tasks.push(task);
        true
    }

    pub fn id(&self) -> &JobId {
        &self.inner.id
    }

    pub fn is_frozen(&self) -> bool {
        self.state().frozen
    }

    pub fn len(&self) -> usize {
        self.state().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every task in insertion order, feeding each one's output to the
    /// next. Freezes the job before anything else, even when it has no tasks.
    ///
    /// Returns the last task's output, or `None` for a job without tasks.
    /// The first task that fails (or panics) ends the run with
    /// [`SchedulerError::TaskFailed`]; the remaining tasks are skipped.
    ///
    /// Normally invoked by the owning scheduler.
    pub async fn run(&self, scheduler: &Scheduler, previous: TaskResult) -> Result<TaskResult> {
        let tasks = {
            let mut state = self.state();
            state.frozen = true;
            state.tasks.clone()
        };

        if tasks.is_empty() {
            return Ok(None);
        }

        let mut result = previous;
        for (index, task) in tasks.into_iter().enumerate() {
            let ctx = TaskContext::new(scheduler.clone(), self.clone(), Arc::clone(&task), index);
            debug!(job_id = %self.inner.id, task_index = index, "task started");

            let outcome = AssertUnwindSafe(task.run(&ctx, result)).catch_unwind().await;
            result = match outcome {
                Ok(Ok(next)) => next,
                Ok(Err(e)) => return Err(self.failed(index, e.to_string())),
                Err(panic) => return Err(self.failed(index, panic_message(panic.as_ref()))),
            };

            debug!(
                job_id = %self.inner.id,
                task_index = index,
                has_result = result.is_some(),
                "task finished"
            );
        }

        Ok(result)
    }

    fn failed(&self, task_index: usize, reason: String) -> SchedulerError {
        SchedulerError::TaskFailed {
            job_id: self.inner.id.clone(),
            task_index,
            reason,
        }
    }

    fn state(&self) -> MutexGuard<'_, JobState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the job for one scheduler. `false` if it is already queued
    /// somewhere or has already started.
    pub(crate) fn submit(&self) -> bool {
        let mut state = self.state();
        if state.frozen || state.submitted {
            return false;
        }
        state.submitted = true;
        true
    }

    /// Release a claim made by [`submit`](Self::submit) for a job dropped
    /// from a queue before it started.
    pub(crate) fn withdraw(&self) {
        let mut state = self.state();
        if !state.frozen {
            state.submitted = false;
        }
    }

    pub(crate) fn freeze(&self) {
        self.state().frozen = true;
    }
}

impl Default for Job {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("Job")
            .field("id", &self.inner.id)
            .field("frozen", &state.frozen)
            .field("tasks", &state.tasks.len())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("task panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("task panicked: {s}")
    } else {
        "task panicked".to_string()
    }
}
