//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Device objects.
use std::fmt;
use std::sync::Arc;

use crate::common::{ArenaBlockPool, Result, Timeout};
use crate::queue::CmdQueueRef;
use crate::resources::BufferRef;
use crate::sync::SemaphoreRef;
use crate::DeviceSize;

/// Trait for devices.
pub trait Device: Send + Sync + fmt::Debug {
    /// The command queues of the device.
    fn queues(&self) -> &[CmdQueueRef];

    /// The block pool backing command buffer storage.
    fn arena_pool(&self) -> &Arc<ArenaBlockPool>;

    /// Create a zero-filled buffer of `len` bytes.
    fn new_buffer(&self, len: DeviceSize) -> Result<BufferRef>;

    /// Create a semaphore with the payload value `initial_value`.
    fn new_semaphore(&self, initial_value: u64) -> Result<SemaphoreRef>;

    /// Block until every queue of the device is idle.
    fn wait_idle(&self, timeout: Timeout) -> Result<()>;
}

/// Shared handle of a device.
pub type DeviceRef = Arc<dyn Device>;
