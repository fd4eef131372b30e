//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! taskhal local backend. Runs command buffers on a pool of host threads.
//!
//! # Execution model
//!
//! A [`Device`] owns one [`Executor`](taskhal_task::Executor) shared by all
//! of its [`TaskQueue`]s. A submitted batch is issued by a task of the queue's
//! scope, which replays each command buffer into a [`TaskCmdBuffer`]. The
//! latter turns every command into tasks:
//!
//!  - Transfer commands become call tasks accessing [`HostBuffer`]s.
//!  - Dispatches are split into dispatch-slice tasks, which are joined by a
//!    barrier task.
//!  - Execution barriers become barrier tasks that every later command
//!    depends on.
//!  - Events are tracked by the queue. Waiting on an event that was never
//!    signaled on the same queue imposes no ordering.
//!
//! Commands between two barriers run concurrently, in no particular order.
//!
//! # Limitations
//!
//!  - Stage and access flags are not used to narrow barriers. Every barrier
//!    orders all preceding commands before all following ones.
//!  - A batch whose issue fails (including when one of its wait semaphores
//!    fails) makes every later batch of the same queue fail too.
//!
#![warn(rust_2018_idioms)]

pub mod buffer;
pub mod cmd;
pub mod device;

pub use crate::buffer::HostBuffer;
pub use crate::cmd::*;
pub use crate::device::*;
