//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! # taskhal Common: Utilities
//!
//! Error types, timeouts, and the arena block pool shared by every crate of
//! [taskhal](../taskhal/index.html).
#![warn(rust_2018_idioms)]

mod arena;
mod error;
mod timeout;
pub use self::arena::*;
pub use self::error::*;
pub use self::timeout::*;
