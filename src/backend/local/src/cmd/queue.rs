//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Implementation of `CmdQueue`.
use log::debug;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use taskhal_base::{self as base, CmdSequenceRef, SemaphoreRef, SubmissionBatch};
use taskhal_common::{Deadline, ErrorKind, Result, Timeout};
use taskhal_task::{Executor, Scope, Task, TaskKind, TaskRef};

use super::issue::{IssueTarget, Issuer, QueueState};
use super::semaphore::{SemaphoreSignal, SemaphoreWait};

/// How long `submit_and_wait` blocks on the semaphore before it gives the
/// executor another chance.
const WAIT_SLICE: Duration = Duration::from_millis(1);

/// The part of a queue referenced by its issue tasks.
#[derive(Debug)]
struct QueueShared {
    name: String,
    state: Mutex<QueueState>,
    target: Arc<dyn IssueTarget>,
    max_slices: usize,
}

/// Implementation of `CmdQueue`.
///
/// Each submitted batch is turned into three tasks of the queue's scope:
///
///  - A fence-wait task completing when the wait semaphores reach their
///    payload values.
///  - An issue task translating the command buffers into further tasks. It
///    runs after the wait task and after the issue task of the previously
///    submitted batch, so batches are issued in the submission order.
///  - A fence-signal task signaling the signal semaphores after all the
///    tasks the batch issued complete.
///
/// The work the batches issue is ordered only by barriers, events, and
/// semaphores, and may run out of the submission order.
///
/// Dropping a `TaskQueue` blocks until every submitted batch completes.
pub struct TaskQueue {
    shared: Arc<QueueShared>,
    scope: Scope,
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("name", &self.shared.name)
            .field("scope", &self.scope)
            .finish()
    }
}

impl TaskQueue {
    pub(crate) fn new(
        executor: &Arc<Executor>,
        name: String,
        target: Arc<dyn IssueTarget>,
        max_slices: usize,
    ) -> Self {
        debug!("creating queue '{}'", name);
        Self {
            scope: Scope::new(executor, name.clone()),
            shared: Arc::new(QueueShared {
                name,
                state: Mutex::new(QueueState::default()),
                target,
                max_slices,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The scope owning the tasks of this queue.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Build the tasks of a batch and chain its issue task to the previous
    /// one's. Must be called with the queue state locked.
    fn enqueue(&self, state: &mut QueueState, batch: &SubmissionBatch<'_>) -> Result<()> {
        let batch_index = state.next_batch;
        state.next_batch += 1;

        let retire = self.scope.new_task(TaskKind::FenceSignal(Box::new(
            SemaphoreSignal::new(batch_index, &batch.signal),
        )));

        let issue = {
            let shared = Arc::clone(&self.shared);
            let retire = Arc::clone(&retire);
            let cmd_buffers: Vec<CmdSequenceRef> = batch.command_buffers.to_vec();
            self.scope.new_task(TaskKind::IssueMarker(Box::new(move |ctx| {
                let mut state = shared.state.lock();
                let mut issuer =
                    Issuer::new(ctx, &mut *state, &retire, batch_index, shared.max_slices);
                for cmd_buffer in cmd_buffers.iter() {
                    shared.target.issue(&**cmd_buffer, &mut issuer)?;
                }
                debug!("queue '{}': issued batch #{}", shared.name, batch_index);
                Ok(())
            })))
        };
        Task::depends_on(&retire, &issue);

        if let Some(ref tail) = state.tail_issue {
            Task::depends_on(&issue, tail);
        }
        state.tail_issue = Some(Arc::clone(&issue));

        let wait: Option<TaskRef> = if batch.wait.is_empty() {
            None
        } else {
            let wait = self.scope.new_task(TaskKind::FenceWait {
                source: Box::new(SemaphoreWait::new(&batch.wait)),
                deadline: Deadline::Infinite,
            });
            Task::depends_on(&issue, &wait);
            Some(wait)
        };

        debug!(
            "queue '{}': submitting batch #{} ({} command buffer(s))",
            self.shared.name,
            batch_index,
            batch.command_buffers.len()
        );

        self.scope.submit(retire)?;
        self.scope.submit(issue)?;
        if let Some(wait) = wait {
            self.scope.submit(wait)?;
        }
        Ok(())
    }
}

impl base::CmdQueue for TaskQueue {
    fn submit(&self, batches: &[SubmissionBatch<'_>]) -> Result<()> {
        for batch in batches {
            batch.validate()?;
        }
        let mut state = self.shared.state.lock();
        for batch in batches {
            self.enqueue(&mut state, batch)?;
        }
        Ok(())
    }

    fn submit_and_wait(
        &self,
        batches: &[SubmissionBatch<'_>],
        semaphore: &SemaphoreRef,
        value: u64,
        timeout: Timeout,
    ) -> Result<()> {
        self.submit(batches)?;

        let deadline = timeout.to_deadline();
        let executor = self.scope.executor();
        loop {
            if semaphore.query()? >= value {
                return Ok(());
            }
            if let Some(error) = self.scope.failure() {
                return Err(error);
            }
            if deadline.has_elapsed() {
                return Err(ErrorKind::DeadlineExceeded.into());
            }
            if executor.flush() == 0 {
                let slice = deadline
                    .clamp(WAIT_SLICE)
                    .saturating_duration_since(Instant::now());
                match semaphore.wait(value, Timeout::After(slice)) {
                    Err(ref e) if e.is_deadline_exceeded() => {}
                    result => result?,
                }
            }
        }
    }

    fn wait_idle(&self, timeout: Timeout) -> Result<()> {
        self.scope.wait(timeout)
    }
}
