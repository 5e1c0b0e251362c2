use jobline_core::JobId;
use thiserror::Error;

/// Errors that can occur while the scheduler drives a job.
///
/// Rejected operations (adding to a frozen job, removing the running job,
/// addressing an unknown group) are not errors: they return `false`/`None`
/// and log a warning.
#[derive(Debug, Clone, Error)]
pub enum SchedulerError {
    /// A task returned an error or panicked; the rest of the job was skipped.
    #[error("Job {job_id} failed at task {task_index}: {reason}")]
    TaskFailed {
        job_id: JobId,
        task_index: usize,
        reason: String,
    },
}

/// Failure reported by a task body.
///
/// Tasks that can recover should encode the failure in their result instead;
/// returning this stalls the scheduler that runs the job.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TaskError(pub String);

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for TaskError {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskError {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(e: serde_json::Error) -> Self {
        Self(format!("serialization error: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
