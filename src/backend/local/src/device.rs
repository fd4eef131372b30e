//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Implementation of `Device`.
use log::debug;
use std::sync::Arc;
use std::time::Instant;

use taskhal_base::{self as base, CmdBufferMode, CmdCategoryFlags, DeviceSize};
use taskhal_common::{ArenaBlockPool, Error, ErrorKind, Result, Timeout};
use taskhal_task::{Executor, ExecutorBuilder};
use taskhal_utils::DeferredCmdBuffer;

use crate::buffer::HostBuffer;
use crate::cmd::{IssueTarget, LocalSemaphore, TaskIssueTarget, TaskQueue, MAX_DISPATCH_SLICES};

/// The smallest accepted arena block size.
pub const MIN_BLOCK_SIZE: usize = 4 << 10;

/// The largest accepted arena block size.
pub const MAX_BLOCK_SIZE: usize = 64 << 10;

/// The parameters of a `Device`.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// The size of arena blocks used for command buffer storage.
    pub block_size: usize,
    /// The maximum number of arena blocks the device allocates. Allocations
    /// beyond it fail with `ResourceExhausted`. `None` means no limit.
    pub max_block_count: Option<usize>,
    /// The number of worker threads. `None` means the available parallelism.
    pub worker_count: Option<usize>,
    pub queue_count: usize,
    /// The maximum number of slices each dispatch is split into, per worker
    /// thread.
    pub dispatch_slice_count: usize,
    /// Used to name worker threads and queues.
    pub identifier: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            block_size: 32 << 10,
            max_block_count: None,
            worker_count: None,
            queue_count: 1,
            dispatch_slice_count: 4,
            identifier: "local".to_owned(),
        }
    }
}

/// Builds a `Device`.
///
/// # Examples
///
///     use taskhal_local::DeviceBuilder;
///
///     let device = DeviceBuilder::new()
///         .worker_count(2)
///         .queue_count(2)
///         .block_size(4096)
///         .build()
///         .expect("Failed to create a device.");
///     assert_eq!(device.task_queues().len(), 2);
///
#[derive(Debug, Clone)]
pub struct DeviceBuilder {
    config: DeviceConfig,
    issue_target: Option<Arc<dyn IssueTarget>>,
}

impl Default for DeviceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceBuilder {
    pub fn new() -> Self {
        Self::with_config(DeviceConfig::default())
    }

    pub fn with_config(config: DeviceConfig) -> Self {
        Self {
            config,
            issue_target: None,
        }
    }

    /// Set the arena block size. Must be between 4 KiB and 64 KiB.
    ///
    /// Defaults to 32 KiB.
    pub fn block_size(&mut self, v: usize) -> &mut Self {
        self.config.block_size = v;
        self
    }

    pub fn max_block_count(&mut self, v: Option<usize>) -> &mut Self {
        self.config.max_block_count = v;
        self
    }

    pub fn worker_count(&mut self, v: usize) -> &mut Self {
        self.config.worker_count = Some(v);
        self
    }

    /// Set the number of queues. Defaults to 1.
    pub fn queue_count(&mut self, v: usize) -> &mut Self {
        self.config.queue_count = v;
        self
    }

    /// Defaults to 4.
    pub fn dispatch_slice_count(&mut self, v: usize) -> &mut Self {
        self.config.dispatch_slice_count = v;
        self
    }

    pub fn identifier(&mut self, v: impl Into<String>) -> &mut Self {
        self.config.identifier = v.into();
        self
    }

    /// Replace the `IssueTarget` used by the queues. Defaults to
    /// `TaskIssueTarget`.
    pub fn issue_target(&mut self, v: Arc<dyn IssueTarget>) -> &mut Self {
        self.issue_target = Some(v);
        self
    }

    pub fn build(&mut self) -> Result<Arc<Device>> {
        let config = self.config.clone();
        if config.block_size < MIN_BLOCK_SIZE || config.block_size > MAX_BLOCK_SIZE {
            return Err(Error::with_detail(
                ErrorKind::InvalidArgument,
                format!(
                    "block_size must be between {} and {} (got {})",
                    MIN_BLOCK_SIZE, MAX_BLOCK_SIZE, config.block_size
                ),
            ));
        }
        if config.queue_count == 0 {
            return Err(Error::with_detail(
                ErrorKind::InvalidArgument,
                "queue_count must not be zero",
            ));
        }
        if config.dispatch_slice_count == 0 {
            return Err(Error::with_detail(
                ErrorKind::InvalidArgument,
                "dispatch_slice_count must not be zero",
            ));
        }

        let pool = Arc::new(ArenaBlockPool::with_limit(
            config.block_size,
            config.max_block_count,
        )?);

        let mut builder = ExecutorBuilder::new();
        builder.name(config.identifier.clone());
        if let Some(x) = config.worker_count {
            builder.worker_count(x);
        }
        let executor = builder.build()?;

        let max_slices = (config.dispatch_slice_count * executor.worker_count())
            .min(MAX_DISPATCH_SLICES);
        let target = self
            .issue_target
            .clone()
            .unwrap_or_else(|| Arc::new(TaskIssueTarget) as Arc<dyn IssueTarget>);

        let queues: Vec<Arc<TaskQueue>> = (0..config.queue_count)
            .map(|i| {
                Arc::new(TaskQueue::new(
                    &executor,
                    format!("{} queue {}", config.identifier, i),
                    Arc::clone(&target),
                    max_slices,
                ))
            })
            .collect();
        let queue_refs = queues
            .iter()
            .map(|q| Arc::clone(q) as base::CmdQueueRef)
            .collect();

        debug!(
            "device '{}' created with {} queue(s)",
            config.identifier, config.queue_count
        );

        Ok(Arc::new(Device {
            config,
            pool,
            executor,
            queues,
            queue_refs,
        }))
    }
}

/// Implementation of `Device` running commands on a pool of host threads.
///
/// All queues of a device share one executor.
#[derive(Debug)]
pub struct Device {
    config: DeviceConfig,
    pool: Arc<ArenaBlockPool>,
    executor: Arc<Executor>,
    queues: Vec<Arc<TaskQueue>>,
    queue_refs: Vec<base::CmdQueueRef>,
}

impl Device {
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn task_queues(&self) -> &[Arc<TaskQueue>] {
        &self.queues
    }

    pub fn queue(&self, index: usize) -> Option<&Arc<TaskQueue>> {
        self.queues.get(index)
    }

    /// Create a command buffer storing its commands in the device's arena
    /// block pool.
    pub fn new_cmd_buffer(
        &self,
        mode: CmdBufferMode,
        categories: CmdCategoryFlags,
    ) -> DeferredCmdBuffer {
        DeferredCmdBuffer::new(Arc::clone(&self.pool), mode, categories)
    }
}

impl base::Device for Device {
    fn queues(&self) -> &[base::CmdQueueRef] {
        &self.queue_refs
    }

    fn arena_pool(&self) -> &Arc<ArenaBlockPool> {
        &self.pool
    }

    fn new_buffer(&self, len: DeviceSize) -> Result<base::BufferRef> {
        Ok(Arc::new(HostBuffer::new(len)?))
    }

    fn new_semaphore(&self, initial_value: u64) -> Result<base::SemaphoreRef> {
        Ok(Arc::new(LocalSemaphore::new(initial_value)))
    }

    fn wait_idle(&self, timeout: Timeout) -> Result<()> {
        let deadline = timeout.to_deadline();
        for queue in self.queues.iter() {
            let timeout = match deadline.instant() {
                Some(at) => Timeout::After(at.saturating_duration_since(Instant::now())),
                None => Timeout::Infinite,
            };
            base::CmdQueue::wait_idle(&**queue, timeout)?;
        }
        Ok(())
    }
}
