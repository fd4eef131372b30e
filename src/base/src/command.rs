//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Command buffers.
use crate::common::Result;
use crate::kernel::{DescriptorBinding, ExecutableRef, PipelineLayoutRef};
use crate::resources::BufferRef;
use crate::sync::{BufferBarrier, EventRef, MemoryBarrier};
use crate::{DeviceSize, StageFlags};

/// Trait for command buffers.
///
/// This is the command surface shared by every command buffer
/// implementation: recorders (which store the commands for later replay) as
/// well as concrete targets (which translate them into work right away).
/// Commands are applied in the order they are called.
///
/// Resource handles are passed by reference. An implementation that needs to
/// keep them beyond the call decides whether to retain them.
///
/// # Valid Usage
///
///  - `begin` must be called before any command, and `end` after the last
///    one. Implementations report violations as `FailedPrecondition`.
///
pub trait CmdBuffer {
    fn begin(&mut self) -> Result<()>;

    fn end(&mut self) -> Result<()>;

    /// Insert an execution dependency between the commands before and after
    /// this one.
    fn execution_barrier(
        &mut self,
        src_stage: StageFlags,
        dst_stage: StageFlags,
        memory_barriers: &[MemoryBarrier],
        buffer_barriers: &[BufferBarrier],
    ) -> Result<()>;

    /// Signal `event` when the preceding commands in `src_stage` complete.
    fn signal_event(&mut self, event: &EventRef, src_stage: StageFlags) -> Result<()>;

    /// Unsignal `event`.
    fn reset_event(&mut self, event: &EventRef, src_stage: StageFlags) -> Result<()>;

    /// Make the following commands wait until every one of `events` is
    /// signaled.
    fn wait_events(
        &mut self,
        events: &[EventRef],
        src_stage: StageFlags,
        dst_stage: StageFlags,
        memory_barriers: &[MemoryBarrier],
        buffer_barriers: &[BufferBarrier],
    ) -> Result<()>;

    /// Fill a range of a buffer with a repeated 1-, 2-, or 4-byte pattern.
    fn fill_buffer(
        &mut self,
        buffer: &BufferRef,
        offset: DeviceSize,
        len: DeviceSize,
        pattern: &[u8],
    ) -> Result<()>;

    /// Copy host memory into a buffer.
    fn update_buffer(&mut self, data: &[u8], buffer: &BufferRef, offset: DeviceSize)
        -> Result<()>;

    fn copy_buffer(
        &mut self,
        src: &BufferRef,
        src_offset: DeviceSize,
        dst: &BufferRef,
        dst_offset: DeviceSize,
        len: DeviceSize,
    ) -> Result<()>;

    /// Update the push constants visible to subsequent dispatches.
    fn push_constants(
        &mut self,
        layout: &PipelineLayoutRef,
        offset: u32,
        values: &[u8],
    ) -> Result<()>;

    /// Replace the descriptor set `set` visible to subsequent dispatches.
    fn push_descriptor_set(
        &mut self,
        layout: &PipelineLayoutRef,
        set: u32,
        bindings: &[DescriptorBinding],
    ) -> Result<()>;

    fn dispatch(
        &mut self,
        executable: &ExecutableRef,
        entry: u32,
        workgroup_count: [u32; 3],
    ) -> Result<()>;

    /// Dispatch with the workgroup counts read from three little-endian
    /// `u32`s in `buffer` at `offset`, at the time the dispatch executes.
    fn dispatch_indirect(
        &mut self,
        executable: &ExecutableRef,
        entry: u32,
        buffer: &BufferRef,
        offset: DeviceSize,
    ) -> Result<()>;

    /// Begin a debug group.
    ///
    /// The default implementation does nothing.
    fn begin_debug_group(&mut self, label: &str) -> Result<()> {
        let _ = label;
        Ok(())
    }

    /// End the innermost debug group.
    ///
    /// The default implementation does nothing.
    fn end_debug_group(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Boxed handle of a command buffer.
pub type CmdBufferRef = Box<dyn CmdBuffer + Send>;
