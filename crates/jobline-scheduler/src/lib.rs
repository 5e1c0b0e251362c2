//! `jobline-scheduler`: in-process job queue with sequential tasks,
//! pause tokens and named parallel groups.
//!
//! # Overview
//!
//! A [`Job`] is an ordered list of [`Task`]s. A [`Scheduler`] runs its jobs
//! one at a time in submission order; inside a job, tasks run one at a time
//! and each receives the previous task's result. The last result of a job is
//! passed on to the job that runs right after it; a pause or an empty queue
//! in between starts the next job from nothing.
//!
//! Jobs added with [`Scheduler::add_in`] go to a named group: a child
//! scheduler with its own queue and pause state. Groups progress
//! independently, so work is serial within a group and concurrent across
//! groups.
//!
//! | Operation        | Root                 | Group                        |
//! |------------------|----------------------|------------------------------|
//! | queue a job      | `add(job)`           | `add_in(name, job)`          |
//! | drop pending job | `remove(&id)`        | `remove_in(name, &id)`       |
//! | hold the queue   | `pause(token)`       | `pause_in(name, token)`      |
//! | release          | `resume(token)`      | `resume_in(name, token)`     |
//! | reset            | `clear()`            | `clear_in(name)`             |
//!
//! # Quick start
//!
//! ```rust,no_run
//! use jobline_scheduler::{task_fn, Job, Scheduler, TaskOutput};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let scheduler = Scheduler::new();
//!
//!     let fetch = Job::new()
//!         .task(task_fn(|_ctx, _prev| async {
//!             Ok(Some(TaskOutput::with_data(json!({"rows": 42}))))
//!         }))
//!         .task(task_fn(|_ctx, prev| async move {
//!             println!("got {:?}", prev);
//!             Ok(prev)
//!         }));
//!
//!     scheduler.add(fetch);
//!     scheduler.settled().await;
//! }
//! ```
//!
//! # Failures
//!
//! A task error (or panic) ends its job and stalls the scheduler that ran it:
//! no further job starts there until [`Scheduler::clear`]. Tasks that can
//! recover should report the problem in their result instead. Nothing is
//! retried.

pub mod engine;
pub mod error;
pub mod job;
pub mod pause;
pub mod task;
pub mod types;

pub use engine::Scheduler;
pub use error::{Result, SchedulerError, TaskError};
pub use job::Job;
pub use jobline_core::{JobId, PauseToken, SchedulerConfig, SchedulerId};
pub use pause::PauseController;
pub use task::{task_fn, FnTask, Task, TaskContext};
pub use types::{DriveState, TaskOutput, TaskResult};
