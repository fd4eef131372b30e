//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Executables, pipeline layouts, and the state visible to a dispatch.
use std::fmt;
use std::sync::Arc;

use crate::common::{Error, ErrorKind, Result};
use crate::resources::BufferRef;
use crate::DeviceSize;

/// The maximum size of push constants, in bytes.
pub const MAX_PUSH_CONSTANT_SIZE: u32 = 256;

/// Describes the push constant range and the descriptor sets used by
/// dispatches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineLayout {
    push_constant_size: u32,
    set_count: u32,
}

/// Shared handle of a pipeline layout.
pub type PipelineLayoutRef = Arc<PipelineLayout>;

impl PipelineLayout {
    pub fn new(push_constant_size: u32, set_count: u32) -> Result<PipelineLayoutRef> {
        if push_constant_size % 4 != 0 || push_constant_size > MAX_PUSH_CONSTANT_SIZE {
            return Err(Error::with_detail(
                ErrorKind::InvalidArgument,
                format!("invalid push constant size: {}", push_constant_size),
            ));
        }
        Ok(Arc::new(Self {
            push_constant_size,
            set_count,
        }))
    }

    pub fn push_constant_size(&self) -> u32 {
        self.push_constant_size
    }

    pub fn set_count(&self) -> u32 {
        self.set_count
    }
}

/// A buffer range bound to a binding slot of a descriptor set.
#[derive(Debug, Clone)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub buffer: BufferRef,
    pub offset: DeviceSize,
    pub len: DeviceSize,
}

impl PartialEq for DescriptorBinding {
    fn eq(&self, other: &Self) -> bool {
        self.binding == other.binding
            && crate::ptr_eq(&self.buffer, &other.buffer)
            && self.offset == other.offset
            && self.len == other.len
    }
}

/// The push constants and descriptor sets captured for a dispatch.
#[derive(Debug, Clone, Default)]
pub struct DispatchState {
    pub push_constants: Vec<u8>,
    pub sets: Vec<Vec<DescriptorBinding>>,
    pub workgroup_count: [u32; 3],
}

impl DispatchState {
    /// Find the binding `binding` of the descriptor set `set`.
    pub fn binding(&self, set: u32, binding: u32) -> Option<&DescriptorBinding> {
        self.sets
            .get(set as usize)?
            .iter()
            .find(|b| b.binding == binding)
    }

    /// The total number of workgroups.
    pub fn workgroup_total(&self) -> Result<u64> {
        workgroup_total(self.workgroup_count)
    }

    /// Convert a linear workgroup index into a workgroup ID. The X coordinate
    /// varies fastest.
    pub fn workgroup_id(&self, index: u64) -> [u32; 3] {
        let [x, y, _] = self.workgroup_count;
        let (x, y) = (x.max(1) as u64, y.max(1) as u64);
        [
            (index % x) as u32,
            ((index / x) % y) as u32,
            (index / (x * y)) as u32,
        ]
    }
}

/// The number of workgroups in a grid of `workgroup_count`. Fails with
/// `InvalidArgument` if it does not fit in `u64`.
pub fn workgroup_total(workgroup_count: [u32; 3]) -> Result<u64> {
    let [x, y, z] = workgroup_count;
    (x as u64)
        .checked_mul(y as u64)
        .and_then(|xy| xy.checked_mul(z as u64))
        .ok_or_else(|| {
            Error::with_detail(
                ErrorKind::InvalidArgument,
                format!("the workgroup count {:?} is too large", workgroup_count),
            )
        })
}

/// Trait for executables, the kernels run by dispatch commands.
///
/// The runtime calls `run_workgroup` once for each workgroup of a dispatch,
/// possibly from many threads at once.
pub trait Executable: Send + Sync + fmt::Debug {
    /// The number of entry points. Valid entry ordinals are
    /// `0..entry_point_count()`.
    fn entry_point_count(&self) -> u32;

    fn run_workgroup(&self, entry: u32, state: &DispatchState, workgroup_id: [u32; 3])
        -> Result<()>;
}

/// Shared handle of an executable.
pub type ExecutableRef = Arc<dyn Executable>;
