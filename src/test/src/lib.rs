//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Test framework for taskhal implementations.
#![warn(rust_2018_idioms)]

mod recording;
pub mod utils;

pub use crate::recording::*;
