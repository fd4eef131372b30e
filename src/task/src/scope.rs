//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Scopes group in-flight tasks so that their completion and failure can be
//! observed in aggregate.
use log::{debug, warn};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use taskhal_common::{Deadline, Error, Result, Timeout};

use crate::executor::Executor;
use crate::task::{Task, TaskKind, TaskRef};

/// Identifies a scope registered to an `Executor`.
///
/// Tasks refer to their scope by `ScopeId`; the executor resolves it through
/// its scope registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    pub fn from_raw(x: u64) -> Self {
        ScopeId(x)
    }

    pub fn into_raw(self) -> u64 {
        self.0
    }
}

/// The part of a scope shared with the executor.
pub(crate) struct ScopeState {
    id: ScopeId,
    name: String,
    pending: AtomicUsize,
    failure: Mutex<Option<Error>>,
    idle_lock: Mutex<()>,
    idle_cvar: Condvar,
}

impl fmt::Debug for ScopeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeState")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl ScopeState {
    pub(crate) fn new(id: ScopeId, name: String) -> Self {
        Self {
            id,
            name,
            pending: AtomicUsize::new(0),
            failure: Mutex::new(None),
            idle_lock: Mutex::new(()),
            idle_cvar: Condvar::new(),
        }
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub(crate) fn failure(&self) -> Option<Error> {
        self.failure.lock().clone()
    }

    pub(crate) fn task_submitted(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn task_done(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self.idle_lock.lock();
            self.idle_cvar.notify_all();
        }
    }

    /// Mark the scope failed. Only the first error is retained.
    pub(crate) fn record_failure(&self, error: &Error) {
        {
            let mut failure = self.failure.lock();
            if failure.is_some() {
                return;
            }
            *failure = Some(error.clone());
        }
        warn!("scope '{}' failed: {}", self.name, error);

        let _guard = self.idle_lock.lock();
        self.idle_cvar.notify_all();
    }

    /// Block until the scope becomes idle, fails, or `until` is reached.
    /// Returns immediately if `stop_on_failure` is set and the scope has
    /// failed.
    pub(crate) fn park_until(&self, until: Instant, stop_on_failure: bool) {
        let mut guard = self.idle_lock.lock();
        if self.pending_count() == 0 || (stop_on_failure && self.failure.lock().is_some()) {
            return;
        }
        self.idle_cvar.wait_until(&mut guard, until);
    }
}

/// A group of tasks whose aggregate completion or failure can be awaited.
///
/// A scope is registered to an executor when created and deregistered when
/// dropped. Dropping a scope blocks until every task submitted to it has
/// reached a terminal state.
///
/// Failures are sticky: once a task of the scope fails, every subsequent
/// `wait` returns (a clone of) the first error.
pub struct Scope {
    executor: Arc<Executor>,
    state: Arc<ScopeState>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("state", &self.state).finish()
    }
}

impl Scope {
    pub fn new(executor: &Arc<Executor>, name: impl Into<String>) -> Self {
        let state = executor.register_scope(name.into());
        debug!("scope '{}' ({:?}) created", state.name, state.id);
        Self {
            executor: Arc::clone(executor),
            state,
        }
    }

    pub fn id(&self) -> ScopeId {
        self.state.id
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    /// Construct a task belonging to this scope. The task does not run until
    /// it is submitted.
    pub fn new_task(&self, kind: TaskKind) -> TaskRef {
        Task::new(self.id(), kind)
    }

    /// Submit a task to the executor. Shorthand for `Executor::submit`.
    pub fn submit(&self, task: TaskRef) -> Result<()> {
        self.executor.submit(task)
    }

    /// The number of submitted tasks that have not reached a terminal state.
    pub fn pending_count(&self) -> usize {
        self.state.pending_count()
    }

    /// The first error reported by a task of this scope.
    pub fn failure(&self) -> Option<Error> {
        self.state.failure()
    }

    /// Block until every submitted task reaches a terminal state, donating the
    /// calling thread's cycles to the executor meanwhile.
    ///
    /// Returns the scope's failure as soon as one is observed, and
    /// `DeadlineExceeded` if `timeout` elapses first. Neither cancels
    /// in-flight tasks.
    pub fn wait(&self, timeout: Timeout) -> Result<()> {
        self.executor
            .wait_scope(&self.state, timeout.to_deadline(), true)
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        // Tasks resolve their scope through the registry, so it can only be
        // removed after all of them are done
        let _ = self
            .executor
            .wait_scope(&self.state, Deadline::Infinite, false);
        self.executor.deregister_scope(self.state.id);
        debug!("scope '{}' ({:?}) destroyed", self.state.name, self.state.id);
    }
}
