//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! # taskhal: Command Buffers on a Host Task Runtime
//!
//! taskhal records GPU-style command buffers and executes them on a pool of
//! host threads. It is made of the following layers:
//!
//!  - [`common`]: the error type, timeouts, and the arena block allocator.
//!  - [`task`]: a dependency-driven task runtime. Tasks become runnable when
//!    every task they depend on completes, and are run by a work-stealing
//!    pool of workers.
//!  - [`base`]: the command buffer interface and the traits implemented by
//!    backends (`Device`, `CmdQueue`, `Semaphore`, `Buffer`, `Executable`).
//!  - [`utils`]: [`DeferredCmdBuffer`](utils::DeferredCmdBuffer), which
//!    records commands into arena blocks and replays them later.
//!  - [`backends::local`]: a backend translating command buffers into tasks.
//!
//! # Terminology
//!
//! ## Abbreviations
//!
//! - **Cmd** - command
//! - **Dst** - destination
//! - **Ref** - reference
//! - **Src** - source
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use taskhal::prelude::*;
//! use taskhal::base::{self, CmdBufferMode, CmdCategoryFlags};
//! use taskhal::backends::local::DeviceBuilder;
//! use taskhal::common::Timeout;
//!
//! let device = DeviceBuilder::new().worker_count(2).build().unwrap();
//! let buffer = device.new_buffer(64).unwrap();
//!
//! let mut cmd_buffer = device.new_cmd_buffer(
//!     CmdBufferMode::ONE_SHOT,
//!     CmdCategoryFlags::all(),
//! );
//! cmd_buffer.begin().unwrap();
//! cmd_buffer.fill_buffer(&buffer, 0, 64, &[0x42]).unwrap();
//! cmd_buffer.end().unwrap();
//!
//! let semaphore = device.new_semaphore(0).unwrap();
//! let signal = [semaphore.clone()];
//! let cmd_buffers: [base::CmdSequenceRef; 1] = [Arc::new(cmd_buffer)];
//! device.queues()[0]
//!     .submit_and_wait(
//!         &[base::SubmissionBatch {
//!             command_buffers: &cmd_buffers,
//!             signal: base::SemaphoreList::new(&signal, &[1]),
//!             ..Default::default()
//!         }],
//!         &semaphore,
//!         1,
//!         Timeout::Infinite,
//!     )
//!     .unwrap();
//!
//! let mut data = [0u8; 64];
//! buffer.read(0, &mut data).unwrap();
//! assert!(data.iter().all(|&x| x == 0x42));
//! ```
//!
#![warn(rust_2018_idioms)]

pub extern crate taskhal_base as base;
pub extern crate taskhal_common as common;
pub extern crate taskhal_task as task;
pub extern crate taskhal_utils as utils;

/// Includes each backend implementation.
pub mod backends {
    pub extern crate taskhal_local as local;
}

/// The taskhal prelude.
pub mod prelude {
    #[doc(no_inline)]
    pub use crate::base::prelude::*;
    #[doc(no_inline)]
    pub use crate::utils::prelude::*;
}
