//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Utilities for taskhal.
//!
//! This crate is a part of [taskhal](../taskhal/index.html).
#![warn(rust_2018_idioms)]

pub mod deferred;
pub use self::deferred::{CmdBufferState, DeferredCmdBuffer};

/// The taskhal Utilities prelude.
pub mod prelude {
    #[doc(no_inline)]
    pub use crate::deferred::DeferredCmdBuffer;
}
