//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Command queues, semaphores, and the translation of command buffers into
//! tasks.
mod issue;
mod queue;
mod semaphore;

pub use self::issue::{
    IssueTarget, Issuer, TaskCmdBuffer, TaskIssueTarget, MAX_DISPATCH_SLICES,
};
pub use self::queue::TaskQueue;
pub use self::semaphore::LocalSemaphore;
