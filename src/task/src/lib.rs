//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! This crate is a part of [taskhal](../taskhal/index.html) and provides the
//! task graph and the executor running it.
//!
//! # Task graph
//!
//! A [`Task`] is a node carrying a [`TaskKind`] payload and a set of
//! dependency edges. Edges are added with [`Task::depends_on`] before the task
//! is submitted. A task runs only after all of its predecessors have reached
//! a terminal state. If any of them failed, the task is failed without its
//! body ever running, and so are its own successors.
//!
//! Every task belongs to a [`Scope`]. A scope counts its pending tasks and
//! retains the first failure among them, so a group of tasks can be awaited
//! as a whole.
//!
//! # Examples
//!
//!     use taskhal_task::{ExecutorBuilder, Scope, Task, TaskKind};
//!     use taskhal_common::Timeout;
//!
//!     let executor = ExecutorBuilder::new().worker_count(2).build().unwrap();
//!     let scope = Scope::new(&executor, "example");
//!
//!     let first = scope.new_task(TaskKind::Call(Box::new(|_| Ok(()))));
//!     let second = scope.new_task(TaskKind::Barrier);
//!     Task::depends_on(&second, &first);
//!
//!     scope.submit(second).unwrap();
//!     scope.submit(first).unwrap();
//!     scope.wait(Timeout::Infinite).unwrap();
//!
#![warn(rust_2018_idioms)]

mod executor;
mod scope;
mod task;
pub use self::executor::*;
pub use self::scope::*;
pub use self::task::*;
