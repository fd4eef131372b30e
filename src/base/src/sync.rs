//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Synchronization objects.
use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::common::{Error, Result, Timeout};
use crate::resources::BufferRef;
use crate::{AccessTypeFlags, DeviceSize};

/// Event object.
///
/// Events are used for intra-queue synchronization. An event signaled by a
/// command buffer can be waited on by later commands submitted to the same
/// queue, including those in subsequent command buffers of the same batch.
#[derive(Debug)]
pub struct Event {
    id: u64,
    label: Option<String>,
}

/// Shared handle of an event object.
pub type EventRef = Arc<Event>;

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

impl Event {
    pub fn new() -> EventRef {
        Arc::new(Self {
            id: NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed),
            label: None,
        })
    }

    pub fn with_label(label: impl Into<String>) -> EventRef {
        Arc::new(Self {
            id: NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed),
            label: Some(label.into()),
        })
    }

    /// A process-wide unique identifier of this event.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_ref().map(String::as_str)
    }
}

/// Trait for timeline semaphores.
///
/// A semaphore holds a monotonically increasing 64-bit payload value. Once a
/// semaphore is failed, every query and wait on it returns the failure.
pub trait Semaphore: Send + Sync + fmt::Debug {
    /// Retrieve the current payload value.
    fn query(&self) -> Result<u64>;

    /// Advance the payload value to `value`.
    ///
    /// Returns `FailedPrecondition` if `value` is lower than the current one.
    fn signal(&self, value: u64) -> Result<()>;

    /// Put the semaphore into the failed state.
    fn fail(&self, error: Error);

    /// Block the calling thread until the payload value reaches `value`.
    ///
    /// Returns `DeadlineExceeded` if `timeout` elapses first.
    fn wait(&self, value: u64, timeout: Timeout) -> Result<()>;
}

/// Shared handle of a semaphore object.
pub type SemaphoreRef = Arc<dyn Semaphore>;

/// A global memory barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBarrier {
    pub src_access: AccessTypeFlags,
    pub dst_access: AccessTypeFlags,
}

/// A memory barrier on a range of a buffer.
#[derive(Debug, Clone)]
pub struct BufferBarrier {
    pub src_access: AccessTypeFlags,
    pub dst_access: AccessTypeFlags,
    pub buffer: BufferRef,
    pub range: Range<DeviceSize>,
}

impl PartialEq for BufferBarrier {
    fn eq(&self, other: &Self) -> bool {
        self.src_access == other.src_access
            && self.dst_access == other.dst_access
            && crate::ptr_eq(&self.buffer, &other.buffer)
            && self.range == other.range
    }
}
