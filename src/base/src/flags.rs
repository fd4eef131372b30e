//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
use bitflags::bitflags;

bitflags! {
    /// Specifies zero or more execution stages.
    pub struct StageFlags: u8 {
        const INDIRECT = 0b1;
        const DISPATCH = 0b10;
        const TRANSFER = 0b100;
        const HOST = 0b1000;
    }
}

bitflags! {
    /// Specifies zero or more types of memory access.
    pub struct AccessTypeFlags: u16 {
        const INDIRECT_READ = 0b1;
        const DISPATCH_UNIFORM_READ = 0b10;
        const DISPATCH_READ = 0b100;
        const DISPATCH_WRITE = 0b1000;
        const TRANSFER_READ = 0b10000;
        const TRANSFER_WRITE = 0b100000;
        const HOST_READ = 0b1000000;
        const HOST_WRITE = 0b10000000;
    }
}

const ACCESS_TO_STAGES: [StageFlags; 8] = [
    // IndirectRead
    StageFlags::INDIRECT,
    // DispatchUniformRead
    StageFlags::DISPATCH,
    // DispatchRead
    StageFlags::DISPATCH,
    // DispatchWrite
    StageFlags::DISPATCH,
    // TransferRead
    StageFlags::TRANSFER,
    // TransferWrite
    StageFlags::TRANSFER,
    // HostRead
    StageFlags::HOST,
    // HostWrite
    StageFlags::HOST,
];

impl AccessTypeFlags {
    /// Return a set of execution stages supporting at least one of given
    /// access types.
    pub fn supported_stages(&self) -> StageFlags {
        let bits = (*self & Self::all()).bits();
        ACCESS_TO_STAGES
            .iter()
            .enumerate()
            .filter(|&(i, _)| bits & (1 << i) != 0)
            .fold(StageFlags::empty(), |x, (_, &stages)| x | stages)
    }
}

bitflags! {
    /// Specifies how a command buffer may be submitted.
    pub struct CmdBufferMode: u8 {
        /// The command buffer is applied exactly once. Its storage is released
        /// after the first replay.
        const ONE_SHOT = 0b1;
    }
}

bitflags! {
    /// Specifies the categories of commands a command buffer may contain.
    pub struct CmdCategoryFlags: u8 {
        /// Buffer fill, update, and copy commands.
        const TRANSFER = 0b1;
        /// Dispatch commands and their argument bindings.
        const DISPATCH = 0b10;
    }
}
