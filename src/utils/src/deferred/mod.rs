//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Record-and-replay command buffers.
use log::trace;
use parking_lot::RwLock;
use smallvec::SmallVec;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use taskhal_base::{self as base, CmdBufferMode, CmdCategoryFlags, DeviceSize, StageFlags};
use taskhal_common::{Arena, ArenaBlockPool, ArenaMark, ArenaSlice, Error, ErrorKind, Result};

mod codec;
use self::codec::{Decoder, Encoder, ListEncoder, Opcode};

/// The state of a `DeferredCmdBuffer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmdBufferState {
    /// Created or reset. `begin` has not been called yet.
    Initial,
    Recording,
    /// `end` was called. The buffer can be applied.
    Executable,
    /// A record call failed. Only `reset` is permitted.
    Invalid,
}

/// A command buffer that records commands into arena blocks so that they can
/// be replayed later against any `CmdBuffer` implementation.
///
/// Host-memory arguments (fill patterns, update data, push constants, labels,
/// and argument arrays) are copied into the arena, so the caller's storage
/// can be discarded as soon as each call returns. Buffers, events, pipeline
/// layouts, and executables are *not* retained; the caller must keep them
/// alive until every replay completes. Replaying a command that refers to a
/// dropped object fails with `FailedPrecondition`.
///
/// # Examples
///
///     use std::sync::Arc;
///     use taskhal_base::{CmdBuffer, CmdBufferMode, CmdCategoryFlags};
///     use taskhal_common::ArenaBlockPool;
///     use taskhal_utils::DeferredCmdBuffer;
///
///     let pool = Arc::new(ArenaBlockPool::new(4096).unwrap());
///     let mut cmd_buffer = DeferredCmdBuffer::new(
///         pool,
///         CmdBufferMode::empty(),
///         CmdCategoryFlags::all(),
///     );
///     cmd_buffer.begin().unwrap();
///     cmd_buffer.begin_debug_group("empty").unwrap();
///     cmd_buffer.end_debug_group().unwrap();
///     cmd_buffer.end().unwrap();
///     assert_eq!(cmd_buffer.entry_count(), 2);
///
pub struct DeferredCmdBuffer {
    mode: CmdBufferMode,
    categories: CmdCategoryFlags,
    state: CmdBufferState,
    /// Set by the first `apply` of a one-shot command buffer.
    consumed: AtomicBool,
    log: RwLock<Log>,
}

impl fmt::Debug for DeferredCmdBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredCmdBuffer")
            .field("mode", &self.mode)
            .field("categories", &self.categories)
            .field("state", &self.state)
            .field("entry_count", &self.entry_count())
            .finish()
    }
}

/// The recorded entries and everything they refer to.
struct Log {
    arena: Arena,
    entries: Vec<ArenaSlice>,
    handles: HandleTable,
    debug_depth: u32,
}

#[derive(Default)]
struct HandleTable {
    buffers: Vec<Weak<dyn base::Buffer>>,
    events: Vec<Weak<base::Event>>,
    layouts: Vec<Weak<base::PipelineLayout>>,
    executables: Vec<Weak<dyn base::Executable>>,
}

#[derive(Clone, Copy)]
struct LogMark {
    arena: ArenaMark,
    num_entries: usize,
    handles: [usize; 4],
    debug_depth: u32,
}

/// Intern a handle into a table, reusing the slot of the most recent
/// reference to the same live object.
fn intern<T: ?Sized>(table: &mut Vec<Weak<T>>, obj: &Arc<T>) -> u32 {
    let ptr = Arc::as_ptr(obj) as *const u8;
    if let Some(i) = table
        .iter()
        .rposition(|w| w.strong_count() > 0 && w.as_ptr() as *const u8 == ptr)
    {
        return i as u32;
    }
    table.push(Arc::downgrade(obj));
    (table.len() - 1) as u32
}

fn resolve<T: ?Sized>(table: &[Weak<T>], index: u32, what: &str) -> Result<Arc<T>> {
    table
        .get(index as usize)
        .and_then(Weak::upgrade)
        .ok_or_else(|| {
            Error::with_detail(
                ErrorKind::FailedPrecondition,
                format!("a {} referenced by the command buffer was dropped", what),
            )
        })
}

impl Log {
    fn new(pool: Arc<ArenaBlockPool>) -> Self {
        Self {
            arena: Arena::new(pool),
            entries: Vec::new(),
            handles: HandleTable::default(),
            debug_depth: 0,
        }
    }

    fn mark(&self) -> LogMark {
        let h = &self.handles;
        LogMark {
            arena: self.arena.mark(),
            num_entries: self.entries.len(),
            handles: [
                h.buffers.len(),
                h.events.len(),
                h.layouts.len(),
                h.executables.len(),
            ],
            debug_depth: self.debug_depth,
        }
    }

    fn rollback(&mut self, mark: LogMark) {
        self.arena.rollback(mark.arena);
        self.entries.truncate(mark.num_entries);
        let h = &mut self.handles;
        h.buffers.truncate(mark.handles[0]);
        h.events.truncate(mark.handles[1]);
        h.layouts.truncate(mark.handles[2]);
        h.executables.truncate(mark.handles[3]);
        self.debug_depth = mark.debug_depth;
    }

    /// Release all entries and return the arena blocks to the pool.
    fn clear(&mut self) {
        self.arena.reset();
        self.entries = Vec::new();
        self.handles = HandleTable::default();
        self.debug_depth = 0;
    }

    fn blob(&mut self, data: &[u8]) -> Result<ArenaSlice> {
        self.arena.alloc_copy(data)
    }

    fn push(&mut self, entry: &Encoder) -> Result<()> {
        let slice = self.arena.alloc_copy(entry.as_bytes())?;
        self.entries.push(slice);
        Ok(())
    }

    fn buffer(&mut self, x: &base::BufferRef) -> u32 {
        intern(&mut self.handles.buffers, x)
    }

    fn event(&mut self, x: &base::EventRef) -> u32 {
        intern(&mut self.handles.events, x)
    }

    fn layout(&mut self, x: &base::PipelineLayoutRef) -> u32 {
        intern(&mut self.handles.layouts, x)
    }

    fn executable(&mut self, x: &base::ExecutableRef) -> u32 {
        intern(&mut self.handles.executables, x)
    }

    fn memory_barriers(&mut self, barriers: &[base::MemoryBarrier]) -> Result<ArenaSlice> {
        let mut list = ListEncoder::default();
        for b in barriers {
            list.u16(b.src_access.bits()).u16(b.dst_access.bits());
        }
        self.blob(list.as_bytes())
    }

    fn buffer_barriers(&mut self, barriers: &[base::BufferBarrier]) -> Result<ArenaSlice> {
        let mut list = ListEncoder::default();
        for b in barriers {
            let buffer = self.buffer(&b.buffer);
            list.u16(b.src_access.bits())
                .u16(b.dst_access.bits())
                .u32(buffer)
                .u64(b.range.start)
                .u64(b.range.end);
        }
        self.blob(list.as_bytes())
    }
}

fn invalid_argument(msg: impl Into<String>) -> Error {
    Error::with_detail(ErrorKind::InvalidArgument, msg.into())
}

fn failed_precondition(msg: impl Into<String>) -> Error {
    Error::with_detail(ErrorKind::FailedPrecondition, msg.into())
}

impl DeferredCmdBuffer {
    /// Construct a `DeferredCmdBuffer` in the initial state.
    ///
    /// `categories` restricts the commands that can be recorded.
    pub fn new(
        pool: Arc<ArenaBlockPool>,
        mode: CmdBufferMode,
        categories: CmdCategoryFlags,
    ) -> Self {
        Self {
            mode,
            categories,
            state: CmdBufferState::Initial,
            consumed: AtomicBool::new(false),
            log: RwLock::new(Log::new(pool)),
        }
    }

    pub fn mode(&self) -> CmdBufferMode {
        self.mode
    }

    pub fn categories(&self) -> CmdCategoryFlags {
        self.categories
    }

    pub fn state(&self) -> CmdBufferState {
        self.state
    }

    /// The number of recorded commands.
    pub fn entry_count(&self) -> usize {
        self.log.read().entries.len()
    }

    /// Return `true` if this buffer can be applied.
    pub fn is_executable(&self) -> bool {
        let one_shot = self.mode.contains(CmdBufferMode::ONE_SHOT);
        self.state == CmdBufferState::Executable
            && !(one_shot && self.consumed.load(Ordering::Acquire))
    }

    /// Discard the recorded commands, release the arena blocks, and return to
    /// the initial state.
    pub fn reset(&mut self) {
        self.log.get_mut().clear();
        self.state = CmdBufferState::Initial;
        *self.consumed.get_mut() = false;
    }

    /// Record a command. A failure rolls back everything the command
    /// allocated and invalidates the buffer.
    fn record(
        &mut self,
        category: CmdCategoryFlags,
        encode: impl FnOnce(&mut Log) -> Result<()>,
    ) -> Result<()> {
        match self.state {
            CmdBufferState::Recording => {}
            CmdBufferState::Initial => {
                return Err(failed_precondition("the command buffer is not recording"));
            }
            CmdBufferState::Executable => {
                return Err(failed_precondition("the command buffer was already ended"));
            }
            CmdBufferState::Invalid => {
                return Err(failed_precondition("the command buffer is invalid"));
            }
        }

        let log = self.log.get_mut();
        let mark = log.mark();

        let result = if self.categories.contains(category) {
            encode(log)
        } else {
            Err(failed_precondition(format!(
                "the command buffer does not allow {:?} commands",
                category
            )))
        };

        if result.is_err() {
            log.rollback(mark);
            self.state = CmdBufferState::Invalid;
        }
        result
    }

    /// Replay the recorded commands against `target`, in the recorded order.
    ///
    /// `target.begin()` is called first and `target.end()` last. The first
    /// failure aborts the replay and is returned; commands applied before it
    /// are not undone.
    ///
    /// A one-shot command buffer can be applied only once; later calls fail
    /// with `FailedPrecondition`, whether or not the first one succeeded. Its
    /// storage is released when the first call returns. A reusable command
    /// buffer can be applied any number of times, including concurrently.
    pub fn apply(&self, target: &mut dyn base::CmdBuffer) -> Result<()> {
        if self.state != CmdBufferState::Executable {
            return Err(failed_precondition(format!(
                "the command buffer is not executable (state = {:?})",
                self.state
            )));
        }

        if self.mode.contains(CmdBufferMode::ONE_SHOT) {
            if self.consumed.swap(true, Ordering::AcqRel) {
                return Err(failed_precondition(
                    "the one-shot command buffer was already applied",
                ));
            }
            let mut log = self.log.write();
            let result = replay(&log, target);
            log.clear();
            trace!("released the storage of a one-shot command buffer");
            result
        } else {
            replay(&self.log.read(), target)
        }
    }
}

fn replay(log: &Log, target: &mut dyn base::CmdBuffer) -> Result<()> {
    let arena = &log.arena;
    let handles = &log.handles;

    let buffer = |i: u32| resolve(&handles.buffers, i, "buffer");
    let event = |i: u32| resolve(&handles.events, i, "event");
    let layout = |i: u32| resolve(&handles.layouts, i, "pipeline layout");
    let executable = |i: u32| resolve(&handles.executables, i, "executable");

    let stages = |x: u8| StageFlags::from_bits_truncate(x);
    let access = |x: u16| base::AccessTypeFlags::from_bits_truncate(x);

    let memory_barriers = |s: ArenaSlice| -> Result<SmallVec<[base::MemoryBarrier; 4]>> {
        let mut d = Decoder::new(arena.get(s));
        let mut out = SmallVec::new();
        while !d.is_empty() {
            out.push(base::MemoryBarrier {
                src_access: access(d.u16()?),
                dst_access: access(d.u16()?),
            });
        }
        Ok(out)
    };
    let buffer_barriers = |s: ArenaSlice| -> Result<SmallVec<[base::BufferBarrier; 4]>> {
        let mut d = Decoder::new(arena.get(s));
        let mut out = SmallVec::new();
        while !d.is_empty() {
            out.push(base::BufferBarrier {
                src_access: access(d.u16()?),
                dst_access: access(d.u16()?),
                buffer: buffer(d.u32()?)?,
                range: d.u64()?..d.u64()?,
            });
        }
        Ok(out)
    };

    target.begin()?;

    for &entry in log.entries.iter() {
        let mut d = Decoder::new(arena.get(entry));
        match d.opcode()? {
            Opcode::ExecutionBarrier => {
                let src_stage = stages(d.u8()?);
                let dst_stage = stages(d.u8()?);
                let mb = memory_barriers(d.slice()?)?;
                let bb = buffer_barriers(d.slice()?)?;
                target.execution_barrier(src_stage, dst_stage, &mb, &bb)?;
            }
            Opcode::SignalEvent => {
                let ev = event(d.u32()?)?;
                target.signal_event(&ev, stages(d.u8()?))?;
            }
            Opcode::ResetEvent => {
                let ev = event(d.u32()?)?;
                target.reset_event(&ev, stages(d.u8()?))?;
            }
            Opcode::WaitEvents => {
                let src_stage = stages(d.u8()?);
                let dst_stage = stages(d.u8()?);
                let mut events: SmallVec<[base::EventRef; 4]> = SmallVec::new();
                let mut list = Decoder::new(arena.get(d.slice()?));
                while !list.is_empty() {
                    events.push(event(list.u32()?)?);
                }
                let mb = memory_barriers(d.slice()?)?;
                let bb = buffer_barriers(d.slice()?)?;
                target.wait_events(&events, src_stage, dst_stage, &mb, &bb)?;
            }
            Opcode::FillBuffer => {
                let buf = buffer(d.u32()?)?;
                let offset = d.u64()?;
                let len = d.u64()?;
                let pattern = arena.get(d.slice()?);
                target.fill_buffer(&buf, offset, len, pattern)?;
            }
            Opcode::UpdateBuffer => {
                let data = arena.get(d.slice()?);
                let buf = buffer(d.u32()?)?;
                target.update_buffer(data, &buf, d.u64()?)?;
            }
            Opcode::CopyBuffer => {
                let src = buffer(d.u32()?)?;
                let src_offset = d.u64()?;
                let dst = buffer(d.u32()?)?;
                let dst_offset = d.u64()?;
                target.copy_buffer(&src, src_offset, &dst, dst_offset, d.u64()?)?;
            }
            Opcode::PushConstants => {
                let lay = layout(d.u32()?)?;
                let offset = d.u32()?;
                let values = arena.get(d.slice()?);
                target.push_constants(&lay, offset, values)?;
            }
            Opcode::PushDescriptorSet => {
                let lay = layout(d.u32()?)?;
                let set = d.u32()?;
                let mut bindings: SmallVec<[base::DescriptorBinding; 8]> = SmallVec::new();
                let mut list = Decoder::new(arena.get(d.slice()?));
                while !list.is_empty() {
                    bindings.push(base::DescriptorBinding {
                        binding: list.u32()?,
                        buffer: buffer(list.u32()?)?,
                        offset: list.u64()?,
                        len: list.u64()?,
                    });
                }
                target.push_descriptor_set(&lay, set, &bindings)?;
            }
            Opcode::Dispatch => {
                let exe = executable(d.u32()?)?;
                let entry = d.u32()?;
                let count = [d.u32()?, d.u32()?, d.u32()?];
                target.dispatch(&exe, entry, count)?;
            }
            Opcode::DispatchIndirect => {
                let exe = executable(d.u32()?)?;
                let entry = d.u32()?;
                let buf = buffer(d.u32()?)?;
                target.dispatch_indirect(&exe, entry, &buf, d.u64()?)?;
            }
            Opcode::BeginDebugGroup => {
                let label = std::str::from_utf8(arena.get(d.slice()?))
                    .map_err(|e| Error::with_detail(ErrorKind::Internal, e))?;
                target.begin_debug_group(label)?;
            }
            Opcode::EndDebugGroup => {
                target.end_debug_group()?;
            }
        }
    }

    target.end()
}

impl base::CmdBuffer for DeferredCmdBuffer {
    fn begin(&mut self) -> Result<()> {
        if self.state != CmdBufferState::Initial {
            return Err(failed_precondition(format!(
                "begin called in the state {:?}",
                self.state
            )));
        }
        self.state = CmdBufferState::Recording;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        if self.state != CmdBufferState::Recording {
            return Err(failed_precondition(format!(
                "end called in the state {:?}",
                self.state
            )));
        }
        let depth = self.log.get_mut().debug_depth;
        if depth > 0 {
            return Err(failed_precondition(format!(
                "{} debug group(s) are still open",
                depth
            )));
        }
        self.state = CmdBufferState::Executable;
        Ok(())
    }

    fn execution_barrier(
        &mut self,
        src_stage: StageFlags,
        dst_stage: StageFlags,
        memory_barriers: &[base::MemoryBarrier],
        buffer_barriers: &[base::BufferBarrier],
    ) -> Result<()> {
        self.record(CmdCategoryFlags::empty(), |log| {
            let mb = log.memory_barriers(memory_barriers)?;
            let bb = log.buffer_barriers(buffer_barriers)?;
            log.push(
                Encoder::new(Opcode::ExecutionBarrier)
                    .u8(src_stage.bits())
                    .u8(dst_stage.bits())
                    .slice(mb)
                    .slice(bb),
            )
        })
    }

    fn signal_event(&mut self, event: &base::EventRef, src_stage: StageFlags) -> Result<()> {
        self.record(CmdCategoryFlags::empty(), |log| {
            let ev = log.event(event);
            log.push(Encoder::new(Opcode::SignalEvent).u32(ev).u8(src_stage.bits()))
        })
    }

    fn reset_event(&mut self, event: &base::EventRef, src_stage: StageFlags) -> Result<()> {
        self.record(CmdCategoryFlags::empty(), |log| {
            let ev = log.event(event);
            log.push(Encoder::new(Opcode::ResetEvent).u32(ev).u8(src_stage.bits()))
        })
    }

    fn wait_events(
        &mut self,
        events: &[base::EventRef],
        src_stage: StageFlags,
        dst_stage: StageFlags,
        memory_barriers: &[base::MemoryBarrier],
        buffer_barriers: &[base::BufferBarrier],
    ) -> Result<()> {
        self.record(CmdCategoryFlags::empty(), |log| {
            let mut list = ListEncoder::default();
            for ev in events {
                list.u32(log.event(ev));
            }
            let events = log.blob(list.as_bytes())?;
            let mb = log.memory_barriers(memory_barriers)?;
            let bb = log.buffer_barriers(buffer_barriers)?;
            log.push(
                Encoder::new(Opcode::WaitEvents)
                    .u8(src_stage.bits())
                    .u8(dst_stage.bits())
                    .slice(events)
                    .slice(mb)
                    .slice(bb),
            )
        })
    }

    fn fill_buffer(
        &mut self,
        buffer: &base::BufferRef,
        offset: DeviceSize,
        len: DeviceSize,
        pattern: &[u8],
    ) -> Result<()> {
        self.record(CmdCategoryFlags::TRANSFER, |log| {
            if ![1, 2, 4].contains(&pattern.len()) {
                return Err(invalid_argument(format!(
                    "fill pattern must be 1, 2, or 4 bytes long (got {})",
                    pattern.len()
                )));
            }
            let buf = log.buffer(buffer);
            let pattern = log.blob(pattern)?;
            log.push(
                Encoder::new(Opcode::FillBuffer)
                    .u32(buf)
                    .u64(offset)
                    .u64(len)
                    .slice(pattern),
            )
        })
    }

    fn update_buffer(
        &mut self,
        data: &[u8],
        buffer: &base::BufferRef,
        offset: DeviceSize,
    ) -> Result<()> {
        self.record(CmdCategoryFlags::TRANSFER, |log| {
            if data.is_empty() {
                return Err(invalid_argument("update data must not be empty"));
            }
            let data = log.blob(data)?;
            let buf = log.buffer(buffer);
            log.push(
                Encoder::new(Opcode::UpdateBuffer)
                    .slice(data)
                    .u32(buf)
                    .u64(offset),
            )
        })
    }

    fn copy_buffer(
        &mut self,
        src: &base::BufferRef,
        src_offset: DeviceSize,
        dst: &base::BufferRef,
        dst_offset: DeviceSize,
        len: DeviceSize,
    ) -> Result<()> {
        self.record(CmdCategoryFlags::TRANSFER, |log| {
            let src = log.buffer(src);
            let dst = log.buffer(dst);
            log.push(
                Encoder::new(Opcode::CopyBuffer)
                    .u32(src)
                    .u64(src_offset)
                    .u32(dst)
                    .u64(dst_offset)
                    .u64(len),
            )
        })
    }

    fn push_constants(
        &mut self,
        layout: &base::PipelineLayoutRef,
        offset: u32,
        values: &[u8],
    ) -> Result<()> {
        self.record(CmdCategoryFlags::DISPATCH, |log| {
            if offset % 4 != 0 || values.len() % 4 != 0 {
                return Err(invalid_argument(
                    "push constant offset and size must be multiples of 4",
                ));
            }
            if offset as usize + values.len() > layout.push_constant_size() as usize {
                return Err(invalid_argument(format!(
                    "push constants {}+{} exceed the layout's range of {} bytes",
                    offset,
                    values.len(),
                    layout.push_constant_size()
                )));
            }
            let lay = log.layout(layout);
            let values = log.blob(values)?;
            log.push(
                Encoder::new(Opcode::PushConstants)
                    .u32(lay)
                    .u32(offset)
                    .slice(values),
            )
        })
    }

    fn push_descriptor_set(
        &mut self,
        layout: &base::PipelineLayoutRef,
        set: u32,
        bindings: &[base::DescriptorBinding],
    ) -> Result<()> {
        self.record(CmdCategoryFlags::DISPATCH, |log| {
            if set >= layout.set_count() {
                return Err(invalid_argument(format!(
                    "descriptor set {} is out of range (the layout has {})",
                    set,
                    layout.set_count()
                )));
            }
            let lay = log.layout(layout);
            let mut list = ListEncoder::default();
            for b in bindings {
                let buf = log.buffer(&b.buffer);
                list.u32(b.binding).u32(buf).u64(b.offset).u64(b.len);
            }
            let bindings = log.blob(list.as_bytes())?;
            log.push(
                Encoder::new(Opcode::PushDescriptorSet)
                    .u32(lay)
                    .u32(set)
                    .slice(bindings),
            )
        })
    }

    fn dispatch(
        &mut self,
        executable: &base::ExecutableRef,
        entry: u32,
        workgroup_count: [u32; 3],
    ) -> Result<()> {
        self.record(CmdCategoryFlags::DISPATCH, |log| {
            if entry >= executable.entry_point_count() {
                return Err(invalid_argument(format!(
                    "entry point {} is out of range",
                    entry
                )));
            }
            base::workgroup_total(workgroup_count)?;
            let exe = log.executable(executable);
            log.push(
                Encoder::new(Opcode::Dispatch)
                    .u32(exe)
                    .u32(entry)
                    .u32(workgroup_count[0])
                    .u32(workgroup_count[1])
                    .u32(workgroup_count[2]),
            )
        })
    }

    fn dispatch_indirect(
        &mut self,
        executable: &base::ExecutableRef,
        entry: u32,
        buffer: &base::BufferRef,
        offset: DeviceSize,
    ) -> Result<()> {
        self.record(CmdCategoryFlags::DISPATCH, |log| {
            if entry >= executable.entry_point_count() {
                return Err(invalid_argument(format!(
                    "entry point {} is out of range",
                    entry
                )));
            }
            let exe = log.executable(executable);
            let buf = log.buffer(buffer);
            log.push(
                Encoder::new(Opcode::DispatchIndirect)
                    .u32(exe)
                    .u32(entry)
                    .u32(buf)
                    .u64(offset),
            )
        })
    }

    fn begin_debug_group(&mut self, label: &str) -> Result<()> {
        self.record(CmdCategoryFlags::empty(), |log| {
            let label = log.blob(label.as_bytes())?;
            log.push(Encoder::new(Opcode::BeginDebugGroup).slice(label))?;
            log.debug_depth += 1;
            Ok(())
        })
    }

    fn end_debug_group(&mut self) -> Result<()> {
        self.record(CmdCategoryFlags::empty(), |log| {
            if log.debug_depth == 0 {
                return Err(failed_precondition("no debug group is open"));
            }
            log.push(&Encoder::new(Opcode::EndDebugGroup))?;
            log.debug_depth -= 1;
            Ok(())
        })
    }
}

impl base::CmdSequence for DeferredCmdBuffer {
    fn is_executable(&self) -> bool {
        DeferredCmdBuffer::is_executable(self)
    }

    fn apply(&self, target: &mut dyn base::CmdBuffer) -> Result<()> {
        DeferredCmdBuffer::apply(self, target)
    }
}
