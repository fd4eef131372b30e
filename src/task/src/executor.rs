//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! The work-stealing task executor.
use crossbeam_deque::{Injector, Steal, Stealer, Worker};
use log::{debug, trace, warn};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use taskhal_common::{Deadline, Error, ErrorKind, Result};

use crate::scope::{ScopeId, ScopeState};
use crate::task::{Task, TaskKind, TaskRef, TaskState};

/// Builds an `Executor`.
///
/// # Examples
///
///     use std::time::Duration;
///     use taskhal_task::ExecutorBuilder;
///
///     let executor = ExecutorBuilder::new()
///         .worker_count(2)
///         .name("compute")
///         .wait_poll_interval(Duration::from_micros(500))
///         .build()
///         .expect("Failed to create an executor.");
///     assert_eq!(executor.worker_count(), 2);
///
#[derive(Debug, Clone)]
pub struct ExecutorBuilder {
    worker_count: Option<usize>,
    name: String,
    wait_poll_interval: Duration,
}

impl Default for ExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutorBuilder {
    pub fn new() -> Self {
        Self {
            worker_count: None,
            name: "taskhal".to_owned(),
            wait_poll_interval: Duration::from_millis(1),
        }
    }

    /// Set the number of worker threads.
    ///
    /// Defaults to the available parallelism of the system.
    pub fn worker_count(&mut self, v: usize) -> &mut Self {
        self.worker_count = Some(v);
        self
    }

    /// Set the name of the executor. Worker threads are named after it.
    pub fn name(&mut self, v: impl Into<String>) -> &mut Self {
        self.name = v.into();
        self
    }

    /// Set how often idle workers re-poll fence-wait tasks whose condition
    /// was not met.
    ///
    /// Defaults to 1 millisecond.
    pub fn wait_poll_interval(&mut self, v: Duration) -> &mut Self {
        self.wait_poll_interval = v;
        self
    }

    pub fn build(&mut self) -> Result<Arc<Executor>> {
        let worker_count = match self.worker_count {
            Some(0) => {
                return Err(Error::with_detail(
                    ErrorKind::InvalidArgument,
                    "worker_count must not be zero",
                ));
            }
            Some(x) => x,
            None => thread::available_parallelism()
                .map(|x| x.get())
                .unwrap_or(1),
        };
        if self.wait_poll_interval == Duration::from_secs(0) {
            return Err(Error::with_detail(
                ErrorKind::InvalidArgument,
                "wait_poll_interval must not be zero",
            ));
        }

        let workers: Vec<Worker<TaskRef>> = (0..worker_count).map(|_| Worker::new_lifo()).collect();

        let shared = Arc::new(Shared {
            name: self.name.clone(),
            injector: Injector::new(),
            stealers: workers.iter().map(Worker::stealer).collect(),
            waiting: Mutex::new(Vec::new()),
            num_waiting: AtomicUsize::new(0),
            epoch: AtomicU64::new(0),
            num_sleepers: AtomicUsize::new(0),
            sleep_lock: Mutex::new(()),
            sleep_cvar: Condvar::new(),
            shutdown: AtomicBool::new(false),
            scopes: RwLock::new(HashMap::new()),
            next_scope_id: AtomicU64::new(1),
            wait_poll_interval: self.wait_poll_interval,
        });

        // If spawning fails halfway, dropping `executor` stops the workers
        // spawned so far
        let executor = Executor {
            shared,
            join_handles: Mutex::new(Vec::with_capacity(worker_count)),
        };

        for (i, local) in workers.into_iter().enumerate() {
            let shared = Arc::clone(&executor.shared);
            let join_handle = thread::Builder::new()
                .name(format!("{} worker {}", self.name, i))
                .spawn(move || worker_main(shared, local, i))
                .map_err(|e| Error::with_detail(ErrorKind::ResourceExhausted, e))?;
            executor.join_handles.lock().push(join_handle);
        }

        debug!(
            "executor '{}' started with {} worker(s)",
            self.name, worker_count
        );

        Ok(Arc::new(executor))
    }
}

/// A multithreaded scheduler running the ready tasks of many scopes.
///
/// Each worker thread owns a local deque of ready tasks; idle workers steal
/// from the global queue and from each other. A task runs after all of its
/// predecessors reach a terminal state, but otherwise no execution order is
/// guaranteed, not even between tasks submitted in a particular order.
///
/// Threads blocked in `flush` or `Scope::wait` run ready tasks too.
pub struct Executor {
    shared: Arc<Shared>,
    join_handles: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("name", &self.shared.name)
            .field("worker_count", &self.worker_count())
            .finish()
    }
}

struct Shared {
    name: String,
    injector: Injector<TaskRef>,
    stealers: Vec<Stealer<TaskRef>>,

    /// Fence-wait tasks whose condition was not met when last polled.
    waiting: Mutex<Vec<TaskRef>>,
    num_waiting: AtomicUsize,

    /// Incremented whenever new work becomes available.
    epoch: AtomicU64,
    num_sleepers: AtomicUsize,
    sleep_lock: Mutex<()>,
    sleep_cvar: Condvar,

    shutdown: AtomicBool,

    scopes: RwLock<HashMap<ScopeId, Arc<ScopeState>>>,
    next_scope_id: AtomicU64,

    wait_poll_interval: Duration,
}

/// Provides the body of a call or issue-marker task access to the executor.
pub struct TaskContext<'a> {
    shared: &'a Shared,
    local: Option<&'a Worker<TaskRef>>,
    task: &'a TaskRef,
}

impl fmt::Debug for TaskContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("task", self.task)
            .finish()
    }
}

impl TaskContext<'_> {
    /// The task being executed.
    pub fn task(&self) -> &TaskRef {
        self.task
    }

    pub fn scope(&self) -> ScopeId {
        self.task.scope()
    }

    /// Construct a task belonging to the same scope as the current one.
    pub fn new_task(&self, kind: TaskKind) -> TaskRef {
        Task::new(self.task.scope(), kind)
    }

    /// Submit a task. Tasks that are ready right away are pushed to the
    /// current worker's local deque.
    pub fn submit(&self, task: TaskRef) -> Result<()> {
        self.shared.submit(task, self.local)
    }
}

impl Executor {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn worker_count(&self) -> usize {
        self.shared.stealers.len()
    }

    /// Submit a task.
    ///
    /// The task is scheduled as soon as all of its predecessors reach a
    /// terminal state. Each task must be submitted exactly once, after its
    /// dependency edges are in place.
    ///
    /// Fails with `InvalidArgument` if the task's scope is not registered to
    /// this executor, and with `Unavailable` if the executor is shutting down.
    pub fn submit(&self, task: TaskRef) -> Result<()> {
        self.shared.submit(task, None)
    }

    /// Submit multiple tasks.
    pub fn submit_all(&self, tasks: impl IntoIterator<Item = TaskRef>) -> Result<()> {
        for task in tasks {
            self.shared.submit(task, None)?;
        }
        Ok(())
    }

    /// Run ready tasks on the calling thread until none is left, and return
    /// the number of tasks processed.
    ///
    /// This never blocks on tasks that are not ready.
    pub fn flush(&self) -> usize {
        let mut count = 0;
        loop {
            if let Some(task) = self.shared.find_task(None) {
                self.shared.run_task(task, None);
                count += 1;
                continue;
            }
            let polled = self.shared.poll_waiting(None);
            if polled == 0 {
                return count;
            }
            count += polled;
        }
    }

    /// Wake up idle workers, e.g., after a condition polled by fence-wait
    /// tasks changed.
    pub fn notify(&self) {
        self.shared.notify_one();
    }

    pub(crate) fn register_scope(&self, name: String) -> Arc<ScopeState> {
        let id = ScopeId::from_raw(self.shared.next_scope_id.fetch_add(1, Ordering::Relaxed));
        let state = Arc::new(ScopeState::new(id, name));
        self.shared.scopes.write().insert(id, Arc::clone(&state));
        state
    }

    pub(crate) fn deregister_scope(&self, id: ScopeId) {
        self.shared.scopes.write().remove(&id);
    }

    pub(crate) fn wait_scope(
        &self,
        state: &ScopeState,
        deadline: Deadline,
        stop_on_failure: bool,
    ) -> Result<()> {
        let ref shared = self.shared;
        loop {
            if stop_on_failure {
                if let Some(error) = state.failure() {
                    return Err(error);
                }
            }
            if state.pending_count() == 0 {
                return Ok(());
            }
            if deadline.has_elapsed() {
                return Err(Error::with_detail(
                    ErrorKind::DeadlineExceeded,
                    format!("{} task(s) still pending", state.pending_count()),
                ));
            }

            // Donate the cycles
            if let Some(task) = shared.find_task(None) {
                shared.run_task(task, None);
                continue;
            }
            if shared.poll_waiting(None) > 0 {
                continue;
            }

            state.park_until(deadline.clamp(shared.wait_poll_interval), stop_on_failure);
        }
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.notify_all();

        // The last reference might be dropped by a task body running on
        // one of the workers
        for join_handle in self.join_handles.get_mut().drain(..) {
            if thread::current().id() != join_handle.thread().id() {
                let _ = join_handle.join();
            }
        }

        debug!("executor '{}' stopped", self.shared.name);
    }
}

impl Shared {
    fn scope(&self, id: ScopeId) -> Option<Arc<ScopeState>> {
        self.scopes.read().get(&id).cloned()
    }

    fn submit(&self, task: TaskRef, local: Option<&Worker<TaskRef>>) -> Result<()> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(Error::with_detail(
                ErrorKind::Unavailable,
                "the executor is shutting down",
            ));
        }
        let scope = self.scope(task.scope()).ok_or_else(|| {
            Error::with_detail(
                ErrorKind::InvalidArgument,
                format!("{:?} is not registered to this executor", task.scope()),
            )
        })?;
        scope.task_submitted();

        trace!("task #{} submitted", task.id());

        if task.unblock() {
            self.push_ready(task, local);
        }
        Ok(())
    }

    fn push_ready(&self, task: TaskRef, local: Option<&Worker<TaskRef>>) {
        trace!("task #{} ready", task.id());
        match local {
            Some(local) => local.push(task),
            None => self.injector.push(task),
        }
        self.notify_one();
    }

    fn notify_one(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if self.num_sleepers.load(Ordering::SeqCst) > 0 {
            let _guard = self.sleep_lock.lock();
            self.sleep_cvar.notify_one();
        }
    }

    fn notify_all(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let _guard = self.sleep_lock.lock();
        self.sleep_cvar.notify_all();
    }

    fn find_task(&self, local: Option<&Worker<TaskRef>>) -> Option<TaskRef> {
        if let Some(task) = local.and_then(|local| local.pop()) {
            return Some(task);
        }

        loop {
            let mut retry = false;

            let steal = match local {
                Some(local) => self.injector.steal_batch_and_pop(local),
                None => self.injector.steal(),
            };
            match steal {
                Steal::Success(task) => return Some(task),
                Steal::Retry => retry = true,
                Steal::Empty => {}
            }

            for stealer in self.stealers.iter() {
                match stealer.steal() {
                    Steal::Success(task) => return Some(task),
                    Steal::Retry => retry = true,
                    Steal::Empty => {}
                }
            }

            if !retry {
                return None;
            }
        }
    }

    /// Poll the parked fence-wait tasks once. Returns the number of them that
    /// reached a terminal state.
    fn poll_waiting(&self, local: Option<&Worker<TaskRef>>) -> usize {
        if self.num_waiting.load(Ordering::Acquire) == 0 {
            return 0;
        }

        let tasks = std::mem::replace(&mut *self.waiting.lock(), Vec::new());
        self.num_waiting.fetch_sub(tasks.len(), Ordering::AcqRel);

        let mut count = 0;
        for task in tasks {
            self.run_task(Arc::clone(&task), local);
            if task.state().is_terminal() {
                count += 1;
            }
        }
        count
    }

    fn park_waiting(&self, task: TaskRef, local: Option<&Worker<TaskRef>>) {
        task.set_state(TaskState::Ready);
        self.waiting.lock().push(task);
        self.num_waiting.fetch_add(1, Ordering::AcqRel);

        // Workers only poll periodically while they know there are waiting
        // tasks. A worker that parked a task finds out by itself.
        if local.is_none() {
            self.notify_one();
        }
    }

    fn run_task(&self, task: TaskRef, local: Option<&Worker<TaskRef>>) {
        if let Some(error) = task.take_poison() {
            return self.finish_task(&task, Err(error), local);
        }

        let kind = match task.take_payload() {
            Some(kind) => kind,
            None => {
                let error = Error::with_detail(ErrorKind::Internal, "the task has no payload");
                return self.finish_task(&task, Err(error), local);
            }
        };

        task.set_state(TaskState::Executing);
        trace!("task #{} ({}) executing", task.id(), kind.name());

        let result = match kind {
            TaskKind::Barrier => Ok(()),
            TaskKind::FenceWait { mut source, deadline } => match source.poll() {
                Ok(true) => Ok(()),
                // The task itself fails. `DeadlineExceeded` is reserved for
                // waits that can be retried.
                Ok(false) if deadline.has_elapsed() => {
                    warn!("task #{}: the fence wait deadline elapsed", task.id());
                    Err(Error::with_detail(
                        ErrorKind::Aborted,
                        "the fence wait deadline elapsed",
                    ))
                }
                Ok(false) => {
                    task.put_payload(TaskKind::FenceWait { source, deadline });
                    return self.park_waiting(task, local);
                }
                Err(error) => Err(error),
            },
            TaskKind::FenceSignal(target) => guarded(|| target.signal()),
            TaskKind::Call(f) | TaskKind::IssueMarker(f) => {
                let ctx = TaskContext {
                    shared: self,
                    local,
                    task: &task,
                };
                guarded(|| f(&ctx))
            }
            TaskKind::DispatchSlice { func, range } => {
                guarded(|| range.into_iter().try_for_each(|i| func.run(i)))
            }
        };

        self.finish_task(&task, result, local);
    }

    fn finish_task(&self, task: &TaskRef, result: Result<()>, local: Option<&Worker<TaskRef>>) {
        let scope = self.scope(task.scope());

        match result {
            Ok(()) => trace!("task #{} completed", task.id()),
            Err(ref error) => {
                if error.kind() == ErrorKind::Aborted {
                    trace!("task #{} skipped: {}", task.id(), error);
                } else {
                    warn!("task #{} failed: {}", task.id(), error);
                }

                // Release the payload now rather than with the last reference
                // to the task
                if let Some(kind) = task.take_payload() {
                    kind.abort(error);
                }

                if let Some(ref scope) = scope {
                    scope.record_failure(error);
                }
            }
        }

        let error = result.as_ref().err().cloned();
        for successor in task.settle(result) {
            if let Some(ref error) = error {
                successor.poison(error);
            }
            if successor.unblock() {
                self.push_ready(successor, local);
            }
        }

        match scope {
            Some(scope) => scope.task_done(),
            None => warn!(
                "task #{} completed after its scope {:?} was destroyed",
                task.id(),
                task.scope()
            ),
        }
    }
}

/// Run a task body, converting a panic into an error.
fn guarded(f: impl FnOnce() -> Result<()>) -> Result<()> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        Err(Error::with_detail(
            ErrorKind::Internal,
            "the task body panicked",
        ))
    })
}

fn worker_main(shared: Arc<Shared>, local: Worker<TaskRef>, index: usize) {
    trace!("executor '{}': worker {} running", shared.name, index);

    loop {
        let epoch = shared.epoch.load(Ordering::SeqCst);

        if let Some(task) = shared.find_task(Some(&local)) {
            shared.run_task(task, Some(&local));
            continue;
        }
        if shared.poll_waiting(Some(&local)) > 0 {
            continue;
        }
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }

        let mut guard = shared.sleep_lock.lock();
        shared.num_sleepers.fetch_add(1, Ordering::SeqCst);
        if shared.epoch.load(Ordering::SeqCst) == epoch && !shared.shutdown.load(Ordering::Acquire)
        {
            if shared.num_waiting.load(Ordering::Acquire) > 0 {
                shared
                    .sleep_cvar
                    .wait_for(&mut guard, shared.wait_poll_interval);
            } else {
                shared.sleep_cvar.wait(&mut guard);
            }
        }
        shared.num_sleepers.fetch_sub(1, Ordering::SeqCst);
    }

    trace!("executor '{}': worker {} exiting", shared.name, index);
}
