//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Translation of command buffers into tasks.
use arrayvec::ArrayVec;
use log::trace;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use taskhal_base::{self as base, DeviceSize, StageFlags};
use taskhal_common::{Error, ErrorKind, Result};
use taskhal_task::{Task, TaskContext, TaskKind, TaskRef, TaskState, WorkgroupFn};

/// The maximum number of slices a single dispatch is split into.
pub const MAX_DISPATCH_SLICES: usize = 64;

/// Translates a command buffer into tasks at issue time.
///
/// `issue` is called from the issue task of a batch, once for each command
/// buffer of the batch, in order. Calls for the batches of one queue never
/// overlap and happen in the submission order.
pub trait IssueTarget: Send + Sync + fmt::Debug {
    fn issue(&self, cmd_buffer: &dyn base::CmdSequence, issuer: &mut Issuer<'_>) -> Result<()>;
}

/// The default `IssueTarget`. Replays command buffers into `TaskCmdBuffer`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskIssueTarget;

impl IssueTarget for TaskIssueTarget {
    fn issue(&self, cmd_buffer: &dyn base::CmdSequence, issuer: &mut Issuer<'_>) -> Result<()> {
        cmd_buffer.apply(&mut TaskCmdBuffer::new(issuer))
    }
}

/// The per-queue rendezvous state shared by all batches of a queue.
#[derive(Debug, Default)]
pub(crate) struct QueueState {
    /// The issue task of the most recently submitted batch.
    pub(crate) tail_issue: Option<TaskRef>,
    pub(crate) next_batch: u64,
    /// The task completing when each signaled event becomes signaled.
    events: HashMap<u64, TaskRef>,
}

impl QueueState {
    /// Record the task signaling `event`. Entries of events that have
    /// completed are dropped. Failed entries stay so later waiters see the
    /// failure.
    fn set_event_signal(&mut self, event: u64, task: TaskRef) {
        self.events
            .retain(|_, signal| signal.state() != TaskState::Completed);
        self.events.insert(event, task);
    }
}

/// Emits the tasks of a batch being issued.
///
/// Every emitted task runs after the latest execution barrier, and the batch
/// retires after every emitted task.
pub struct Issuer<'a> {
    ctx: &'a TaskContext<'a>,
    state: &'a mut QueueState,
    retire: &'a TaskRef,
    batch: u64,
    max_slices: usize,
    last_barrier: Option<TaskRef>,
    since_barrier: SmallVec<[TaskRef; 16]>,
}

impl fmt::Debug for Issuer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Issuer")
            .field("batch", &self.batch)
            .field("since_barrier", &self.since_barrier.len())
            .finish()
    }
}

impl<'a> Issuer<'a> {
    pub(crate) fn new(
        ctx: &'a TaskContext<'a>,
        state: &'a mut QueueState,
        retire: &'a TaskRef,
        batch: u64,
        max_slices: usize,
    ) -> Self {
        Self {
            ctx,
            state,
            retire,
            batch,
            max_slices,
            last_barrier: None,
            since_barrier: SmallVec::new(),
        }
    }

    /// The sequential number of the batch within its queue.
    pub fn batch(&self) -> u64 {
        self.batch
    }

    /// Construct a task ordered after the latest barrier.
    fn new_task(&self, kind: TaskKind) -> TaskRef {
        let task = self.ctx.new_task(kind);
        if let Some(ref barrier) = self.last_barrier {
            Task::depends_on(&task, barrier);
        }
        task
    }

    /// Make the batch retire after `task`, and the next barrier wait for it.
    fn track(&mut self, task: &TaskRef) {
        Task::depends_on(self.retire, task);
        self.since_barrier.push(Arc::clone(task));
    }

    fn emit(&mut self, kind: TaskKind) -> Result<()> {
        let task = self.new_task(kind);
        self.track(&task);
        self.ctx.submit(task)
    }

    /// A task depending on everything emitted so far.
    fn join_all(&mut self) -> TaskRef {
        let join = self.ctx.new_task(TaskKind::Barrier);
        if let Some(ref barrier) = self.last_barrier {
            Task::depends_on(&join, barrier);
        }
        for task in self.since_barrier.iter() {
            Task::depends_on(&join, task);
        }
        Task::depends_on(self.retire, &join);
        join
    }

    fn barrier(&mut self) -> Result<()> {
        if self.since_barrier.is_empty() {
            return Ok(());
        }
        let join = self.join_all();
        self.since_barrier.clear();
        self.last_barrier = Some(Arc::clone(&join));
        self.ctx.submit(join)
    }

    fn signal_event(&mut self, event: &base::EventRef) -> Result<()> {
        let join = self.join_all();
        self.state.set_event_signal(event.id(), Arc::clone(&join));
        self.ctx.submit(join)
    }

    fn reset_event(&mut self, event: &base::EventRef) {
        self.state.events.remove(&event.id());
    }

    /// Make the following tasks wait for `events`. Events never signaled on
    /// this queue impose no ordering.
    fn wait_events(&mut self, events: &[base::EventRef]) -> Result<()> {
        let join = self.new_task(TaskKind::Barrier);
        for event in events {
            if let Some(signal) = self.state.events.get(&event.id()) {
                Task::depends_on(&join, signal);
            }
        }
        Task::depends_on(self.retire, &join);
        self.last_barrier = Some(Arc::clone(&join));
        self.ctx.submit(join)
    }

    /// Emit a dispatch of `work` over `total` workgroups.
    fn dispatch(&mut self, work: Arc<DispatchWork>, total: u64) -> Result<()> {
        if total == 0 {
            return Ok(());
        }
        let join = self.ctx.new_task(TaskKind::Barrier);
        for range in split_workgroups(total, self.max_slices) {
            let slice = self.new_task(TaskKind::DispatchSlice {
                func: work.clone(),
                range,
            });
            Task::depends_on(&join, &slice);
            self.ctx.submit(slice)?;
        }
        self.track(&join);
        self.ctx.submit(join)
    }

    /// Emit a dispatch whose workgroup count is read from `buffer` when it
    /// executes.
    fn dispatch_indirect(
        &mut self,
        work: DispatchWork,
        buffer: base::BufferRef,
        offset: DeviceSize,
    ) -> Result<()> {
        let join = self.ctx.new_task(TaskKind::Barrier);
        let max_slices = self.max_slices;
        let join2 = Arc::clone(&join);
        let launch = self.new_task(TaskKind::Call(Box::new(move |ctx| {
            let mut bytes = [0u8; 12];
            buffer.read(offset, &mut bytes)?;
            let mut work = work;
            for (i, x) in work.state.workgroup_count.iter_mut().enumerate() {
                *x = u32::from_le_bytes([
                    bytes[i * 4],
                    bytes[i * 4 + 1],
                    bytes[i * 4 + 2],
                    bytes[i * 4 + 3],
                ]);
            }
            let total = work.state.workgroup_total()?;
            trace!("indirect dispatch of {} workgroup(s)", total);
            if total == 0 {
                return Ok(());
            }
            let work = Arc::new(work);
            for range in split_workgroups(total, max_slices) {
                let slice = ctx.new_task(TaskKind::DispatchSlice {
                    func: work.clone(),
                    range,
                });
                // `join2` is still blocked by this task
                Task::depends_on(&join2, &slice);
                ctx.submit(slice)?;
            }
            Ok(())
        })));
        Task::depends_on(&join, &launch);
        self.ctx.submit(launch)?;
        self.track(&join);
        self.ctx.submit(join)
    }
}

/// Split `0..total` into at most `max_slices` ranges of nearly equal length.
fn split_workgroups(
    total: u64,
    max_slices: usize,
) -> ArrayVec<Range<u64>, MAX_DISPATCH_SLICES> {
    let count = (max_slices.min(MAX_DISPATCH_SLICES).max(1) as u64).min(total);
    let mut slices = ArrayVec::new();
    if count == 0 {
        return slices;
    }
    let chunk = (total + count - 1) / count;
    let mut start = 0;
    while start < total {
        let end = (start + chunk).min(total);
        slices.push(start..end);
        start = end;
    }
    slices
}

/// The kernel and the bound state of a dispatch.
#[derive(Debug)]
struct DispatchWork {
    executable: base::ExecutableRef,
    entry: u32,
    state: base::DispatchState,
}

impl WorkgroupFn for DispatchWork {
    fn run(&self, workgroup_index: u64) -> Result<()> {
        self.executable.run_workgroup(
            self.entry,
            &self.state,
            self.state.workgroup_id(workgroup_index),
        )
    }
}

/// A `CmdBuffer` that emits the tasks performing each command through an
/// `Issuer`.
///
/// Commands between two execution barriers run concurrently. Transfer
/// commands access the buffers when their tasks run, not when they are
/// recorded.
#[derive(Debug)]
pub struct TaskCmdBuffer<'i, 'a> {
    issuer: &'i mut Issuer<'a>,
    dispatch_state: base::DispatchState,
}

impl<'i, 'a> TaskCmdBuffer<'i, 'a> {
    pub fn new(issuer: &'i mut Issuer<'a>) -> Self {
        Self {
            issuer,
            dispatch_state: base::DispatchState::default(),
        }
    }
}

impl base::CmdBuffer for TaskCmdBuffer<'_, '_> {
    fn begin(&mut self) -> Result<()> {
        self.dispatch_state = base::DispatchState::default();
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        Ok(())
    }

    fn execution_barrier(
        &mut self,
        _src_stage: StageFlags,
        _dst_stage: StageFlags,
        _memory_barriers: &[base::MemoryBarrier],
        _buffer_barriers: &[base::BufferBarrier],
    ) -> Result<()> {
        self.issuer.barrier()
    }

    fn signal_event(&mut self, event: &base::EventRef, _src_stage: StageFlags) -> Result<()> {
        self.issuer.signal_event(event)
    }

    fn reset_event(&mut self, event: &base::EventRef, _src_stage: StageFlags) -> Result<()> {
        self.issuer.reset_event(event);
        Ok(())
    }

    fn wait_events(
        &mut self,
        events: &[base::EventRef],
        _src_stage: StageFlags,
        _dst_stage: StageFlags,
        _memory_barriers: &[base::MemoryBarrier],
        _buffer_barriers: &[base::BufferBarrier],
    ) -> Result<()> {
        self.issuer.wait_events(events)
    }

    fn fill_buffer(
        &mut self,
        buffer: &base::BufferRef,
        offset: DeviceSize,
        len: DeviceSize,
        pattern: &[u8],
    ) -> Result<()> {
        let buffer = buffer.clone();
        let pattern: SmallVec<[u8; 4]> = pattern.into();
        self.issuer.emit(TaskKind::Call(Box::new(move |_| {
            buffer.fill(offset, len, &pattern)
        })))
    }

    fn update_buffer(
        &mut self,
        data: &[u8],
        buffer: &base::BufferRef,
        offset: DeviceSize,
    ) -> Result<()> {
        let buffer = buffer.clone();
        let data = data.to_vec();
        self.issuer
            .emit(TaskKind::Call(Box::new(move |_| buffer.write(offset, &data))))
    }

    fn copy_buffer(
        &mut self,
        src: &base::BufferRef,
        src_offset: DeviceSize,
        dst: &base::BufferRef,
        dst_offset: DeviceSize,
        len: DeviceSize,
    ) -> Result<()> {
        let (src, dst) = (src.clone(), dst.clone());
        self.issuer.emit(TaskKind::Call(Box::new(move |_| {
            base::check_range(src.len(), src_offset, len)?;
            let mut data = vec![0u8; len as usize];
            src.read(src_offset, &mut data)?;
            dst.write(dst_offset, &data)
        })))
    }

    fn push_constants(
        &mut self,
        layout: &base::PipelineLayoutRef,
        offset: u32,
        values: &[u8],
    ) -> Result<()> {
        let constants = &mut self.dispatch_state.push_constants;
        let size = layout.push_constant_size() as usize;
        if constants.len() < size {
            constants.resize(size, 0);
        }
        let start = offset as usize;
        let end = start + values.len();
        if end > constants.len() {
            return Err(Error::with_detail(
                ErrorKind::InvalidArgument,
                "push constants out of range",
            ));
        }
        constants[start..end].copy_from_slice(values);
        Ok(())
    }

    fn push_descriptor_set(
        &mut self,
        _layout: &base::PipelineLayoutRef,
        set: u32,
        bindings: &[base::DescriptorBinding],
    ) -> Result<()> {
        let sets = &mut self.dispatch_state.sets;
        let set = set as usize;
        if sets.len() <= set {
            sets.resize(set + 1, Vec::new());
        }
        sets[set] = bindings.to_vec();
        Ok(())
    }

    fn dispatch(
        &mut self,
        executable: &base::ExecutableRef,
        entry: u32,
        workgroup_count: [u32; 3],
    ) -> Result<()> {
        let mut state = self.dispatch_state.clone();
        state.workgroup_count = workgroup_count;
        let total = state.workgroup_total()?;
        let work = Arc::new(DispatchWork {
            executable: executable.clone(),
            entry,
            state,
        });
        self.issuer.dispatch(work, total)
    }

    fn dispatch_indirect(
        &mut self,
        executable: &base::ExecutableRef,
        entry: u32,
        buffer: &base::BufferRef,
        offset: DeviceSize,
    ) -> Result<()> {
        let work = DispatchWork {
            executable: executable.clone(),
            entry,
            state: self.dispatch_state.clone(),
        };
        self.issuer.dispatch_indirect(work, buffer.clone(), offset)
    }

    fn begin_debug_group(&mut self, label: &str) -> Result<()> {
        trace!("batch #{}: begin debug group '{}'", self.issuer.batch, label);
        Ok(())
    }

    fn end_debug_group(&mut self) -> Result<()> {
        trace!("batch #{}: end debug group", self.issuer.batch);
        Ok(())
    }
}
