//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
use std::fmt;
use std::sync::Arc;

use taskhal_base as base;
use taskhal_common::{Result, Timeout};
use taskhal_utils::DeferredCmdBuffer;

/// Create a command buffer storing its commands in the arena block pool of
/// `device`.
pub fn new_cmd_buffer(
    device: &base::DeviceRef,
    mode: base::CmdBufferMode,
) -> DeferredCmdBuffer {
    DeferredCmdBuffer::new(
        Arc::clone(device.arena_pool()),
        mode,
        base::CmdCategoryFlags::all(),
    )
}

/// Read the whole contents of a buffer.
pub fn read_buffer(buffer: &base::BufferRef) -> Vec<u8> {
    let mut data = vec![0u8; buffer.len() as usize];
    buffer
        .read(0, &mut data)
        .expect("Failed to read the buffer.");
    data
}

/// Read a little-endian `u32` array from a buffer.
pub fn read_u32s(buffer: &base::BufferRef) -> Vec<u32> {
    read_buffer(buffer)
        .chunks(4)
        .map(|x| u32::from_le_bytes([x[0], x[1], x[2], x[3]]))
        .collect()
}

pub fn u32s_to_bytes(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|x| x.to_le_bytes().to_vec()).collect()
}

/// Submit command buffers in a single batch and block until they complete.
pub fn submit_and_wait(
    device: &base::DeviceRef,
    queue: &base::CmdQueueRef,
    cmd_buffers: &[base::CmdSequenceRef],
) -> Result<()> {
    let semaphore = device.new_semaphore(0)?;
    let signal = [semaphore.clone()];
    queue.submit_and_wait(
        &[base::SubmissionBatch {
            command_buffers: cmd_buffers,
            signal: base::SemaphoreList::new(&signal, &[1]),
            ..Default::default()
        }],
        &semaphore,
        1,
        Timeout::After(std::time::Duration::from_secs(10)),
    )
}

type KernelFn = dyn Fn(&base::DispatchState, [u32; 3]) -> Result<()> + Send + Sync;

/// An `Executable` with a single entry point running a closure.
pub struct FnExecutable(Box<KernelFn>);

impl fmt::Debug for FnExecutable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnExecutable")
    }
}

impl FnExecutable {
    pub fn new(
        f: impl Fn(&base::DispatchState, [u32; 3]) -> Result<()> + Send + Sync + 'static,
    ) -> base::ExecutableRef {
        Arc::new(FnExecutable(Box::new(f)))
    }
}

impl base::Executable for FnExecutable {
    fn entry_point_count(&self) -> u32 {
        1
    }

    fn run_workgroup(
        &self,
        _entry: u32,
        state: &base::DispatchState,
        workgroup_id: [u32; 3],
    ) -> Result<()> {
        (self.0)(state, workgroup_id)
    }
}

/// Write a little-endian `u32` to the binding `binding` of the descriptor
/// set 0.
pub fn store_u32(state: &base::DispatchState, binding: u32, index: u64, value: u32) -> Result<()> {
    let b = state
        .binding(0, binding)
        .expect("The binding is missing.");
    b.buffer.write(b.offset + index * 4, &value.to_le_bytes())
}

pub fn load_u32(state: &base::DispatchState, binding: u32, index: u64) -> Result<u32> {
    let b = state
        .binding(0, binding)
        .expect("The binding is missing.");
    let mut bytes = [0u8; 4];
    b.buffer.read(b.offset + index * 4, &mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

/// Read the `index`-th `u32` of the push constants.
pub fn push_constant_u32(state: &base::DispatchState, index: usize) -> u32 {
    let x = &state.push_constants[index * 4..index * 4 + 4];
    u32::from_le_bytes([x[0], x[1], x[2], x[3]])
}
