use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{engine::Scheduler, error::TaskError, job::Job, types::TaskResult};

/// A unit of work inside a job.
///
/// Receives the result of the previous task in the same job (or, for a job's
/// first task, the result of the job that ran just before) and returns the value
/// for the next one. Returning `Ok(None)` clears the chain; nothing is
/// forwarded implicitly.
#[async_trait]
pub trait Task: Send + Sync {
    async fn run(&self, ctx: &TaskContext, previous: TaskResult) -> Result<TaskResult, TaskError>;
}

/// Read-only view of where a task is running.
///
/// All handles are cheap clones. Calling back into `scheduler()` from a task
/// is allowed: queue edits land in the pending queue and a pause takes
/// effect once the current job finishes.
#[derive(Clone)]
pub struct TaskContext {
    scheduler: Scheduler,
    job: Job,
    task: Arc<dyn Task>,
    task_index: usize,
}

impl TaskContext {
    pub(crate) fn new(scheduler: Scheduler, job: Job, task: Arc<dyn Task>, task_index: usize) -> Self {
        Self { scheduler, job, task, task_index }
    }

    /// The scheduler driving this job (the group scheduler for grouped jobs).
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn task(&self) -> &Arc<dyn Task> {
        &self.task
    }

    /// Zero-based position of the running task within its job.
    pub fn task_index(&self) -> usize {
        self.task_index
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("scheduler", &self.scheduler.label())
            .field("job", self.job.id())
            .field("task_index", &self.task_index)
            .finish()
    }
}

/// Adapter turning an async closure into a [`Task`]. Built by [`task_fn`].
pub struct FnTask<F> {
    f: F,
}

/// Wrap a closure as a task.
///
/// The closure gets an owned [`TaskContext`] so the returned future can be
/// `'static`.
///
/// ```rust,no_run
/// use jobline_scheduler::{task_fn, Job, TaskOutput};
///
/// let job = Job::new().task(task_fn(|_ctx, _prev| async move {
///     Ok(Some(TaskOutput::with_data(serde_json::json!({"rows": 42}))))
/// }));
/// ```
pub fn task_fn<F, Fut>(f: F) -> FnTask<F>
where
    F: Fn(TaskContext, TaskResult) -> Fut + Send + Sync,
    Fut: Future<Output = Result<TaskResult, TaskError>> + Send + 'static,
{
    FnTask { f }
}

#[async_trait]
impl<F, Fut> Task for FnTask<F>
where
    F: Fn(TaskContext, TaskResult) -> Fut + Send + Sync,
    Fut: Future<Output = Result<TaskResult, TaskError>> + Send + 'static,
{
    async fn run(&self, ctx: &TaskContext, previous: TaskResult) -> Result<TaskResult, TaskError> {
        (self.f)(ctx.clone(), previous).await
    }
}
