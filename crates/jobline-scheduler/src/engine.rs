use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use jobline_core::{JobId, PauseToken, SchedulerConfig, SchedulerId};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{
    error::SchedulerError,
    job::Job,
    pause::PauseController,
    types::{DriveState, TaskResult},
};

/// FIFO job driver with pause tokens and named child groups.
///
/// Jobs on one scheduler run strictly one after another, and each job's
/// result is handed to the first task of the job that follows it directly.
/// Once the queue drains or a pause holds it, the chain starts over from
/// nothing. Jobs added under a group
/// name go to a child scheduler with its own queue, pause state and drive
/// loop, so groups progress independently of each other and of the parent.
///
/// `Scheduler` is a cheap handle (clones share state). Its drive loop is a
/// task on the ambient Tokio runtime, spawned when work arrives and none is
/// running. The job it starts with is taken off the queue before `add` or
/// `resume` returns. The state lock is never held while a task runs, so tasks may
/// call back into their own scheduler.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    id: SchedulerId,
    label: String,
    config: SchedulerConfig,
    state: Mutex<State>,
    state_tx: watch::Sender<DriveState>,
}

struct State {
    /// Pending jobs only; the running job lives in `active`.
    queue: VecDeque<Job>,
    active: Option<Job>,
    pause: PauseController,
    children: HashMap<String, Scheduler>,
    /// True while a drive task exists for this scheduler.
    driving: bool,
    last_result: TaskResult,
    /// Bumped by `clear`; a job that started before it neither records
    /// `last_result` nor feeds the next job.
    epoch: u64,
    completed: u64,
    failure: Option<SchedulerError>,
}

impl Scheduler {
    /// Root scheduler with default config.
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        let label = config.root_label.clone();
        Self::build(label, config)
    }

    fn build(label: String, config: SchedulerConfig) -> Self {
        let (state_tx, _) = watch::channel(DriveState::Idle);
        Self {
            inner: Arc::new(Inner {
                id: SchedulerId::new(),
                label,
                config,
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    active: None,
                    pause: PauseController::new(),
                    children: HashMap::new(),
                    driving: false,
                    last_result: None,
                    epoch: 0,
                    completed: 0,
                    failure: None,
                }),
                state_tx,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Queue
    // -----------------------------------------------------------------------

    /// Queue a job. On an idle scheduler the job starts right away: it is
    /// the active job, and frozen, by the time this returns.
    ///
    /// A job with the same id as one queued or running here is rejected with
    /// a warning, as is a job already queued on any scheduler or already run.
    pub fn add(&self, job: Job) -> &Self {
        let mut st = self.lock();
        let duplicate = st.active.iter().chain(st.queue.iter()).any(|j| j.id() == job.id());
        if duplicate {
            warn!(scheduler = %self.inner.label, job_id = %job.id(), "job id already queued; not queued again");
            return self;
        }
        if !job.submit() {
            warn!(scheduler = %self.inner.label, job_id = %job.id(), "job already submitted or ran; not queued");
            return self;
        }

        debug!(
            scheduler = %self.inner.label,
            job_id = %job.id(),
            pending = st.queue.len() + 1,
            "job queued"
        );
        st.queue.push_back(job);
        self.kick(&mut st);
        self
    }

    /// Queue a job on the group `name`, creating the group on first use.
    pub fn add_in(&self, name: &str, job: Job) -> &Self {
        self.child_or_create(name).add(job);
        self
    }

    /// Drop a pending job. The running job cannot be removed: that returns
    /// `false`. Any other id returns `true`, whether or not it was queued.
    pub fn remove(&self, job_id: &JobId) -> bool {
        let mut st = self.lock();
        if st.active.as_ref().is_some_and(|j| j.id() == job_id) {
            warn!(scheduler = %self.inner.label, %job_id, "job is running; cannot be removed");
            return false;
        }

        let before = st.queue.len();
        st.queue.retain(|j| {
            let keep = j.id() != job_id;
            if !keep {
                j.withdraw();
            }
            keep
        });
        if st.queue.len() < before {
            info!(scheduler = %self.inner.label, %job_id, "job removed");
        } else {
            debug!(scheduler = %self.inner.label, %job_id, "remove: job not queued");
        }
        true
    }

    pub fn remove_in(&self, name: &str, job_id: &JobId) -> bool {
        match self.child_for(name, "remove") {
            Some(child) => child.remove(job_id),
            None => false,
        }
    }

    /// Drop every pending job, pause token, last result and stall on this
    /// scheduler, then clear and discard every group. A job that is already
    /// running finishes normally, but its result goes nowhere.
    pub fn clear(&self) -> &Self {
        let children: Vec<Scheduler> = {
            let mut st = self.lock();
            for job in st.queue.drain(..) {
                job.withdraw();
            }
            st.pause.clear();
            st.last_result = None;
            st.epoch += 1;
            st.failure = None;
            self.publish(&st);
            std::mem::take(&mut st.children).into_values().collect()
        };

        for child in &children {
            child.clear();
        }
        info!(scheduler = %self.inner.label, groups = children.len(), "scheduler cleared");
        self
    }

    /// Clear only the group `name` (recursively). The group itself is kept.
    pub fn clear_in(&self, name: &str) -> &Self {
        if let Some(child) = self.child_for(name, "clear") {
            child.clear();
        }
        self
    }

    // -----------------------------------------------------------------------
    // Pause / resume
    // -----------------------------------------------------------------------

    /// Hold the queue. The running job, if any, is not interrupted; the next
    /// one waits until every token is released. Returns the token to hand
    /// back to [`resume`](Self::resume).
    pub fn pause(&self, token: Option<PauseToken>) -> PauseToken {
        let mut st = self.lock();
        let token = st.pause.pause(token);
        debug!(scheduler = %self.inner.label, %token, "paused");
        self.publish(&st);
        token
    }

    /// Pause only the group `name`. `None` if the group does not exist.
    pub fn pause_in(&self, name: &str, token: Option<PauseToken>) -> Option<PauseToken> {
        self.child_for(name, "pause").map(|child| child.pause(token))
    }

    /// Release one token (or all, with `None`). Returns `true` once no token
    /// is left, in which case the queue starts moving again.
    pub fn resume(&self, token: Option<&PauseToken>) -> bool {
        let mut st = self.lock();
        let released = st.pause.resume(token);
        if released {
            debug!(scheduler = %self.inner.label, "resumed");
            self.kick(&mut st);
        } else {
            debug!(
                scheduler = %self.inner.label,
                outstanding = st.pause.tokens().len(),
                "still paused"
            );
        }
        released
    }

    pub fn resume_in(&self, name: &str, token: Option<&PauseToken>) -> bool {
        match self.child_for(name, "resume") {
            Some(child) => child.resume(token),
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    /// The group scheduler registered under `name`, if any.
    pub fn child(&self, name: &str) -> Option<Scheduler> {
        self.lock().children.get(name).cloned()
    }

    /// Get the group `name`, creating it if needed. Repeated calls return the
    /// same scheduler until the parent is cleared.
    pub fn child_or_create(&self, name: &str) -> Scheduler {
        let mut st = self.lock();
        let child = st.children.entry(name.to_string()).or_insert_with(|| {
            let child = Scheduler::build(
                format!("{}/{}", self.inner.label, name),
                self.inner.config.clone(),
            );
            debug!(scheduler = %self.inner.label, group = name, child_id = %child.id(), "group created");
            child
        });
        child.clone()
    }

    /// Names of the current groups, in no particular order.
    pub fn children(&self) -> Vec<String> {
        self.lock().children.keys().cloned().collect()
    }

    fn child_for(&self, name: &str, op: &str) -> Option<Scheduler> {
        let child = self.child(name);
        if child.is_none() {
            warn!(scheduler = %self.inner.label, group = name, op, "no such group");
        }
        child
    }

    // -----------------------------------------------------------------------
    // Observers
    // -----------------------------------------------------------------------

    pub fn id(&self) -> &SchedulerId {
        &self.inner.id
    }

    /// Log label: the configured root label, or `parent/name` for groups.
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// The job currently running, if any.
    pub fn active_job(&self) -> Option<Job> {
        self.lock().active.clone()
    }

    pub fn is_paused(&self) -> bool {
        self.lock().pause.is_paused()
    }

    pub fn pause_tokens(&self) -> Vec<PauseToken> {
        self.lock().pause.tokens()
    }

    /// Pending jobs in the order they will run. Excludes the running job.
    pub fn queue(&self) -> Vec<Job> {
        self.lock().queue.iter().cloned().collect()
    }

    pub fn state(&self) -> DriveState {
        *self.inner.state_tx.borrow()
    }

    /// Number of jobs this scheduler has run to completion.
    pub fn completed_jobs(&self) -> u64 {
        self.lock().completed
    }

    /// Result of the last job completed since the last `clear`.
    pub fn last_result(&self) -> TaskResult {
        self.lock().last_result.clone()
    }

    /// The failure that stalled this scheduler, until the next `clear`.
    pub fn failure(&self) -> Option<SchedulerError> {
        self.lock().failure.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DriveState> {
        self.inner.state_tx.subscribe()
    }

    /// Wait until the drive state satisfies `pred` and return that state.
    pub async fn wait_for(&self, pred: impl Fn(DriveState) -> bool) -> DriveState {
        let mut rx = self.subscribe();
        let reached = rx.wait_for(|state| pred(*state)).await.map(|state| *state);
        // the sender lives as long as `self`, so the channel cannot close here
        reached.unwrap_or_else(|_| self.state())
    }

    /// Wait until nothing is running: idle, paused, or stalled.
    pub async fn settled(&self) -> DriveState {
        self.wait_for(|state| state != DriveState::Running).await
    }

    // -----------------------------------------------------------------------
    // Drive loop
    // -----------------------------------------------------------------------

    /// Start a drive task if there is work and nothing holds the queue. The
    /// head job becomes active here, under the caller's lock, so a `pause`,
    /// `remove` or `clear` issued right after can no longer touch it.
    fn kick(&self, st: &mut State) {
        if st.driving || st.failure.is_some() || st.pause.is_paused() || st.queue.is_empty() {
            self.publish(st);
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(
                    scheduler = %self.inner.label,
                    pending = st.queue.len(),
                    "no Tokio runtime; jobs wait for the next add or resume inside a runtime"
                );
                self.publish(st);
                return;
            }
        };

        let Some(job) = Self::start_next(st) else {
            self.publish(st);
            return;
        };
        st.driving = true;
        self.publish(st);
        debug!(scheduler = %self.inner.label, "drive loop started");

        let this = self.clone();
        let epoch = st.epoch;
        runtime.spawn(async move { this.drive(job, epoch).await });
    }

    /// Pop the head job and make it the active one.
    fn start_next(st: &mut State) -> Option<Job> {
        let job = st.queue.pop_front()?;
        job.freeze();
        st.active = Some(job.clone());
        Some(job)
    }

    async fn drive(self, first: Job, first_epoch: u64) {
        let mut job = first;
        let mut epoch = first_epoch;
        let mut input: TaskResult = None;

        loop {
            info!(scheduler = %self.inner.label, job_id = %job.id(), tasks = job.len(), "job started");
            let outcome = job.run(&self, input).await;

            let next = {
                let mut st = self.lock();
                st.active = None;
                match outcome {
                    Ok(result) => {
                        st.completed += 1;
                        info!(scheduler = %self.inner.label, job_id = %job.id(), "job completed");
                        if st.epoch == epoch {
                            st.last_result = result.clone();
                            input = result;
                        } else {
                            input = None;
                        }
                    }
                    Err(e) => {
                        error!(
                            scheduler = %self.inner.label,
                            job_id = %job.id(),
                            error = %e,
                            "job failed; scheduler stalled until cleared"
                        );
                        st.failure = Some(e);
                        st.driving = false;
                        self.publish(&st);
                        return;
                    }
                }

                if st.pause.is_paused() {
                    st.driving = false;
                    self.publish(&st);
                    debug!(scheduler = %self.inner.label, "drive loop parked on pause");
                    return;
                }
                let Some(next) = Self::start_next(&mut st) else {
                    st.driving = false;
                    self.publish(&st);
                    debug!(scheduler = %self.inner.label, "queue drained");
                    return;
                };
                epoch = st.epoch;
                next
            };
            job = next;

            if self.inner.config.yield_between_jobs {
                tokio::task::yield_now().await;
            }
        }
    }

    /// Recompute the drive state from `st` and notify watchers on change.
    fn publish(&self, st: &State) {
        let next = if st.failure.is_some() {
            DriveState::Stalled
        } else if st.driving {
            DriveState::Running
        } else if st.pause.is_paused() {
            DriveState::Paused
        } else {
            DriveState::Idle
        };
        self.inner.state_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("state", &self.state())
            .finish()
    }
}
