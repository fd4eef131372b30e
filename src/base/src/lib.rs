//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! This crate is a part of [taskhal](../taskhal/index.html) and provides the
//! base interface for backend implementations.
#![warn(rust_2018_idioms)]

pub use taskhal_common as common;

pub mod command;
pub mod device;
mod flags;
pub use self::flags::*;
pub mod kernel;
pub mod queue;
pub mod resources;
pub mod sync;

/// Represents a buffer size and offset value.
pub type DeviceSize = u64;

/// Compare two shared handles by the address of the object they point to.
///
/// Unlike `Arc::ptr_eq`, vtable pointers are ignored.
pub fn ptr_eq<T: ?Sized>(x: &std::sync::Arc<T>, y: &std::sync::Arc<T>) -> bool {
    std::sync::Arc::as_ptr(x) as *const u8 == std::sync::Arc::as_ptr(y) as *const u8
}

/// The `taskhal_base` prelude.
pub mod prelude {
    #[doc(no_inline)]
    pub use crate::{
        command::CmdBuffer,
        device::Device,
        kernel::Executable,
        queue::{CmdQueue, CmdSequence},
        resources::Buffer,
        sync::Semaphore,
    };
}

// Import all objects
#[doc(no_inline)]
pub use crate::{command::*, device::*, kernel::*, queue::*, resources::*, sync::*};

#[doc(no_inline)]
pub use taskhal_common::{Error, ErrorKind, Result, Timeout};
