//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Task graph nodes.
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use taskhal_common::{Deadline, Error, ErrorKind, Result};

use crate::executor::TaskContext;
use crate::scope::ScopeId;

/// Shared handle of a task.
pub type TaskRef = Arc<Task>;

/// A condition polled by a fence-wait task.
pub trait WaitSource: Send + fmt::Debug {
    /// Returns `Ok(true)` if the condition is met. An error fails the waiting
    /// task (and everything that depends on it).
    fn poll(&mut self) -> Result<bool>;
}

/// The action performed by a fence-signal task.
pub trait SignalTarget: Send + fmt::Debug {
    /// Called when every predecessor completed successfully.
    fn signal(self: Box<Self>) -> Result<()>;

    /// Called instead of `signal` when the task fails.
    fn fail(self: Box<Self>, error: &Error);
}

/// The kernel of a dispatch-slice task, run once for each workgroup index in
/// the slice.
pub trait WorkgroupFn: Send + Sync + fmt::Debug {
    fn run(&self, workgroup_index: u64) -> Result<()>;
}

/// The body of a call or issue-marker task.
pub type TaskFn = Box<dyn FnOnce(&TaskContext<'_>) -> Result<()> + Send>;

/// The variant-specific payload of a task.
pub enum TaskKind {
    /// Does nothing. Used to join multiple predecessors.
    Barrier,

    /// Completes when `source` reports its condition is met. Fails with
    /// `DeadlineExceeded` if `deadline` elapses first.
    FenceWait {
        source: Box<dyn WaitSource>,
        deadline: Deadline,
    },

    /// Runs a `SignalTarget` after the predecessors complete.
    FenceSignal(Box<dyn SignalTarget>),

    /// Calls a function.
    Call(TaskFn),

    /// Runs the workgroups `range` of a dispatch.
    DispatchSlice {
        func: Arc<dyn WorkgroupFn>,
        range: Range<u64>,
    },

    /// Calls a function that translates submitted work into further tasks.
    IssueMarker(TaskFn),
}

impl TaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::Barrier => "barrier",
            TaskKind::FenceWait { .. } => "fence-wait",
            TaskKind::FenceSignal(_) => "fence-signal",
            TaskKind::Call(_) => "call",
            TaskKind::DispatchSlice { .. } => "dispatch-slice",
            TaskKind::IssueMarker(_) => "issue-marker",
        }
    }

    /// Consume the payload of a task which will never run.
    pub(crate) fn abort(self, error: &Error) {
        if let TaskKind::FenceSignal(target) = self {
            target.fail(error);
        }
    }
}

impl fmt::Debug for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::FenceWait { source, deadline } => f
                .debug_struct("FenceWait")
                .field("source", source)
                .field("deadline", deadline)
                .finish(),
            TaskKind::FenceSignal(target) => f.debug_tuple("FenceSignal").field(target).finish(),
            TaskKind::DispatchSlice { func, range } => f
                .debug_struct("DispatchSlice")
                .field("func", func)
                .field("range", range)
                .finish(),
            _ => f.write_str(self.name()),
        }
    }
}

/// The lifecycle state of a task. A task only moves forward through these
/// states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskState {
    /// Created, or submitted with some predecessors outstanding.
    Unscheduled,
    /// Every predecessor has completed. Waiting for a worker.
    Ready,
    Executing,
    Completed,
    Failed,
}

impl TaskState {
    fn from_u8(x: u8) -> Self {
        match x {
            0 => TaskState::Unscheduled,
            1 => TaskState::Ready,
            2 => TaskState::Executing,
            3 => TaskState::Completed,
            _ => TaskState::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        self >= TaskState::Completed
    }
}

#[derive(Debug, Default)]
struct Successors {
    tasks: SmallVec<[TaskRef; 4]>,
    /// `Some` once the owning task reached a terminal state.
    outcome: Option<Result<()>>,
}

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// A node of the task graph.
///
/// A task starts with a blocking count of one, which is held until the task
/// is submitted. Each dependency edge adds one more. The task becomes ready
/// when the count reaches zero.
pub struct Task {
    id: u64,
    scope: ScopeId,
    state: AtomicU8,
    blocking: AtomicUsize,
    /// The error of the first failed predecessor.
    poison: Mutex<Option<Error>>,
    payload: Mutex<Option<TaskKind>>,
    successors: Mutex<Successors>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("scope", &self.scope)
            .field("state", &self.state())
            .field("blocking", &self.blocking.load(Ordering::Relaxed))
            .finish()
    }
}

impl Task {
    /// Construct a task belonging to the scope `scope`.
    pub fn new(scope: ScopeId, kind: TaskKind) -> TaskRef {
        Arc::new(Self {
            id: NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed),
            scope,
            state: AtomicU8::new(TaskState::Unscheduled as u8),
            blocking: AtomicUsize::new(1),
            poison: Mutex::new(None),
            payload: Mutex::new(Some(kind)),
            successors: Mutex::new(Successors::default()),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Add a dependency edge from `pred` to `this`.
    ///
    /// If `pred` has already completed, no edge is added. If it has already
    /// failed, `this` is marked to fail without running.
    ///
    /// # Valid Usage
    ///
    /// `this` must not be ready yet: it must either be unsubmitted, or have
    /// a predecessor which has not reached a terminal state (e.g., the task
    /// calling this method from its body).
    pub fn depends_on(this: &TaskRef, pred: &TaskRef) {
        let mut successors = pred.successors.lock();
        match successors.outcome {
            Some(Ok(())) => {}
            Some(Err(ref error)) => this.poison(error),
            None => {
                this.blocking.fetch_add(1, Ordering::AcqRel);
                successors.tasks.push(Arc::clone(this));
            }
        }
    }

    pub(crate) fn poison(&self, error: &Error) {
        let mut poison = self.poison.lock();
        if poison.is_none() {
            *poison = Some(if error.kind() == ErrorKind::Aborted {
                error.clone()
            } else {
                Error::with_detail(ErrorKind::Aborted, error.clone())
            });
        }
    }

    pub(crate) fn take_poison(&self) -> Option<Error> {
        self.poison.lock().take()
    }

    pub(crate) fn set_state(&self, state: TaskState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Remove one blocking reference. Returns `true` if the task just became
    /// ready.
    pub(crate) fn unblock(&self) -> bool {
        if self.blocking.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.set_state(TaskState::Ready);
            true
        } else {
            false
        }
    }

    pub(crate) fn take_payload(&self) -> Option<TaskKind> {
        self.payload.lock().take()
    }

    pub(crate) fn put_payload(&self, kind: TaskKind) {
        *self.payload.lock() = Some(kind);
    }

    /// Record the outcome and detach the successors.
    pub(crate) fn settle(&self, outcome: Result<()>) -> SmallVec<[TaskRef; 4]> {
        self.set_state(if outcome.is_ok() {
            TaskState::Completed
        } else {
            TaskState::Failed
        });
        let mut successors = self.successors.lock();
        successors.outcome = Some(outcome);
        std::mem::replace(&mut successors.tasks, SmallVec::new())
    }
}
