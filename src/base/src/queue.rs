//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Command queues and submission batches.
use std::fmt;
use std::sync::Arc;

use crate::command::CmdBuffer;
use crate::common::{Error, ErrorKind, Result, Timeout};
use crate::sync::SemaphoreRef;

/// Trait for recorded command sequences that can be submitted to a queue.
///
/// A queue replays a submitted sequence into its own `CmdBuffer`
/// implementation when the batch containing it is issued.
pub trait CmdSequence: Send + Sync + fmt::Debug {
    /// Return `true` if the sequence can be applied.
    fn is_executable(&self) -> bool;

    /// Replay the commands into `target` in the recorded order.
    fn apply(&self, target: &mut dyn CmdBuffer) -> Result<()>;
}

/// Shared handle of a command sequence.
pub type CmdSequenceRef = Arc<dyn CmdSequence>;

/// A list of semaphores, each paired with a payload value.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemaphoreList<'a> {
    pub semaphores: &'a [SemaphoreRef],
    pub payload_values: &'a [u64],
}

impl<'a> SemaphoreList<'a> {
    pub fn new(semaphores: &'a [SemaphoreRef], payload_values: &'a [u64]) -> Self {
        Self {
            semaphores,
            payload_values,
        }
    }

    pub fn len(&self) -> usize {
        self.semaphores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.semaphores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a SemaphoreRef, u64)> + 'a {
        let (semaphores, payload_values) = (self.semaphores, self.payload_values);
        semaphores.iter().zip(payload_values.iter().cloned())
    }
}

/// A set of command sequences submitted together, with the semaphores the
/// batch waits on before it is issued and the ones it signals after its work
/// completes.
///
/// The descriptor is only borrowed for the duration of the submit call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmissionBatch<'a> {
    pub wait: SemaphoreList<'a>,
    pub signal: SemaphoreList<'a>,
    pub command_buffers: &'a [CmdSequenceRef],
}

impl SubmissionBatch<'_> {
    /// Check the shape of the batch.
    ///
    /// Returns `InvalidArgument` if a semaphore list and its payload values
    /// differ in length, and `FailedPrecondition` if some command buffer is
    /// not executable.
    pub fn validate(&self) -> Result<()> {
        for (name, list) in &[("wait", &self.wait), ("signal", &self.signal)] {
            if list.semaphores.len() != list.payload_values.len() {
                return Err(Error::with_detail(
                    ErrorKind::InvalidArgument,
                    format!(
                        "{} semaphore list has {} semaphores but {} payload values",
                        name,
                        list.semaphores.len(),
                        list.payload_values.len()
                    ),
                ));
            }
        }
        if let Some(i) = self
            .command_buffers
            .iter()
            .position(|cb| !cb.is_executable())
        {
            return Err(Error::with_detail(
                ErrorKind::FailedPrecondition,
                format!("command buffer #{} is not executable", i),
            ));
        }
        Ok(())
    }
}

/// Trait for command queues.
pub trait CmdQueue: Send + Sync + fmt::Debug {
    /// Validate and enqueue `batches` for issue. Returns without waiting for
    /// any of them to execute.
    ///
    /// Batches are issued in the order they are submitted to the queue. If
    /// one of `batches` fails validation, none of them is enqueued.
    fn submit(&self, batches: &[SubmissionBatch<'_>]) -> Result<()>;

    /// `submit`, then block until `semaphore` reaches `value`.
    ///
    /// Returns `DeadlineExceeded` if `timeout` elapses first, and the queue's
    /// failure if one is observed meanwhile.
    fn submit_and_wait(
        &self,
        batches: &[SubmissionBatch<'_>],
        semaphore: &SemaphoreRef,
        value: u64,
        timeout: Timeout,
    ) -> Result<()>;

    /// Block until every submitted batch has finished executing.
    ///
    /// Returns `DeadlineExceeded` if `timeout` elapses first, and the queue's
    /// failure if one is observed meanwhile.
    fn wait_idle(&self, timeout: Timeout) -> Result<()>;
}

/// Shared handle of a command queue.
pub type CmdQueueRef = Arc<dyn CmdQueue>;
