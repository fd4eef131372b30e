//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! A command buffer that records the calls made on it.
use std::fmt;
use std::sync::Arc;

use taskhal_base::{self as base, DeviceSize, StageFlags};
use taskhal_common::{Error, ErrorKind, Result};

/// Wraps a shared handle so that it compares by identity.
pub struct Handle<T: ?Sized>(pub Arc<T>);

impl<T: ?Sized> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Handle(Arc::clone(&self.0))
    }
}

impl<T: ?Sized> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        base::ptr_eq(&self.0, &other.0)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:p}: ", Arc::as_ptr(&self.0) as *const u8)?;
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl<T: ?Sized> From<&Arc<T>> for Handle<T> {
    fn from(x: &Arc<T>) -> Self {
        Handle(Arc::clone(x))
    }
}

/// A call made on a `RecordingCmdBuffer`, with owned copies of its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCmd {
    Begin,
    End,
    ExecutionBarrier {
        src_stage: StageFlags,
        dst_stage: StageFlags,
        memory_barriers: Vec<base::MemoryBarrier>,
        buffer_barriers: Vec<base::BufferBarrier>,
    },
    SignalEvent {
        event: Handle<base::Event>,
        src_stage: StageFlags,
    },
    ResetEvent {
        event: Handle<base::Event>,
        src_stage: StageFlags,
    },
    WaitEvents {
        events: Vec<Handle<base::Event>>,
        src_stage: StageFlags,
        dst_stage: StageFlags,
        memory_barriers: Vec<base::MemoryBarrier>,
        buffer_barriers: Vec<base::BufferBarrier>,
    },
    FillBuffer {
        buffer: Handle<dyn base::Buffer>,
        offset: DeviceSize,
        len: DeviceSize,
        pattern: Vec<u8>,
    },
    UpdateBuffer {
        data: Vec<u8>,
        buffer: Handle<dyn base::Buffer>,
        offset: DeviceSize,
    },
    CopyBuffer {
        src: Handle<dyn base::Buffer>,
        src_offset: DeviceSize,
        dst: Handle<dyn base::Buffer>,
        dst_offset: DeviceSize,
        len: DeviceSize,
    },
    PushConstants {
        layout: Handle<base::PipelineLayout>,
        offset: u32,
        values: Vec<u8>,
    },
    PushDescriptorSet {
        layout: Handle<base::PipelineLayout>,
        set: u32,
        bindings: Vec<base::DescriptorBinding>,
    },
    Dispatch {
        executable: Handle<dyn base::Executable>,
        entry: u32,
        workgroup_count: [u32; 3],
    },
    DispatchIndirect {
        executable: Handle<dyn base::Executable>,
        entry: u32,
        buffer: Handle<dyn base::Buffer>,
        offset: DeviceSize,
    },
    BeginDebugGroup(String),
    EndDebugGroup,
}

/// A `CmdBuffer` that appends every call to a list of `RecordedCmd`s.
///
/// It can be made to fail at a particular call to test error handling.
#[derive(Debug, Default, Clone)]
pub struct RecordingCmdBuffer {
    cmds: Vec<RecordedCmd>,
    fail_at: Option<usize>,
}

impl RecordingCmdBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a `RecordingCmdBuffer` that fails with `Internal` instead of
    /// recording the `index`-th call (zero-based, `begin` included).
    pub fn failing_at(index: usize) -> Self {
        Self {
            cmds: Vec::new(),
            fail_at: Some(index),
        }
    }

    pub fn cmds(&self) -> &[RecordedCmd] {
        &self.cmds
    }

    pub fn into_cmds(self) -> Vec<RecordedCmd> {
        self.cmds
    }

    pub fn clear(&mut self) {
        self.cmds.clear();
    }

    fn push(&mut self, cmd: RecordedCmd) -> Result<()> {
        if self.fail_at == Some(self.cmds.len()) {
            return Err(Error::with_detail(
                ErrorKind::Internal,
                format!("injected failure at {:?}", cmd),
            ));
        }
        self.cmds.push(cmd);
        Ok(())
    }
}

impl base::CmdBuffer for RecordingCmdBuffer {
    fn begin(&mut self) -> Result<()> {
        self.push(RecordedCmd::Begin)
    }

    fn end(&mut self) -> Result<()> {
        self.push(RecordedCmd::End)
    }

    fn execution_barrier(
        &mut self,
        src_stage: StageFlags,
        dst_stage: StageFlags,
        memory_barriers: &[base::MemoryBarrier],
        buffer_barriers: &[base::BufferBarrier],
    ) -> Result<()> {
        self.push(RecordedCmd::ExecutionBarrier {
            src_stage,
            dst_stage,
            memory_barriers: memory_barriers.to_vec(),
            buffer_barriers: buffer_barriers.to_vec(),
        })
    }

    fn signal_event(&mut self, event: &base::EventRef, src_stage: StageFlags) -> Result<()> {
        self.push(RecordedCmd::SignalEvent {
            event: event.into(),
            src_stage,
        })
    }

    fn reset_event(&mut self, event: &base::EventRef, src_stage: StageFlags) -> Result<()> {
        self.push(RecordedCmd::ResetEvent {
            event: event.into(),
            src_stage,
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
        self.push(RecordedCmd::WaitEvents {
            events: events.iter().map(Handle::from).collect(),
            src_stage,
            dst_stage,
            memory_barriers: memory_barriers.to_vec(),
            buffer_barriers: buffer_barriers.to_vec(),
        })
    }

    fn fill_buffer(
        &mut self,
        buffer: &base::BufferRef,
        offset: DeviceSize,
        len: DeviceSize,
        pattern: &[u8],
    ) -> Result<()> {
        self.push(RecordedCmd::FillBuffer {
            buffer: buffer.into(),
            offset,
            len,
            pattern: pattern.to_vec(),
        })
    }

    fn update_buffer(
        &mut self,
        data: &[u8],
        buffer: &base::BufferRef,
        offset: DeviceSize,
    ) -> Result<()> {
        self.push(RecordedCmd::UpdateBuffer {
            data: data.to_vec(),
            buffer: buffer.into(),
            offset,
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
        self.push(RecordedCmd::CopyBuffer {
            src: src.into(),
            src_offset,
            dst: dst.into(),
            dst_offset,
            len,
        })
    }

    fn push_constants(
        &mut self,
        layout: &base::PipelineLayoutRef,
        offset: u32,
        values: &[u8],
    ) -> Result<()> {
        self.push(RecordedCmd::PushConstants {
            layout: layout.into(),
            offset,
            values: values.to_vec(),
        })
    }

    fn push_descriptor_set(
        &mut self,
        layout: &base::PipelineLayoutRef,
        set: u32,
        bindings: &[base::DescriptorBinding],
    ) -> Result<()> {
        self.push(RecordedCmd::PushDescriptorSet {
            layout: layout.into(),
            set,
            bindings: bindings.to_vec(),
        })
    }

    fn dispatch(
        &mut self,
        executable: &base::ExecutableRef,
        entry: u32,
        workgroup_count: [u32; 3],
    ) -> Result<()> {
        self.push(RecordedCmd::Dispatch {
            executable: executable.into(),
            entry,
            workgroup_count,
        })
    }

    fn dispatch_indirect(
        &mut self,
        executable: &base::ExecutableRef,
        entry: u32,
        buffer: &base::BufferRef,
        offset: DeviceSize,
    ) -> Result<()> {
        self.push(RecordedCmd::DispatchIndirect {
            executable: executable.into(),
            entry,
            buffer: buffer.into(),
            offset,
        })
    }

    fn begin_debug_group(&mut self, label: &str) -> Result<()> {
        self.push(RecordedCmd::BeginDebugGroup(label.to_owned()))
    }

    fn end_debug_group(&mut self) -> Result<()> {
        self.push(RecordedCmd::EndDebugGroup)
    }
}
