//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Byte encoding of command entries.
//!
//! An entry starts with an `Opcode` byte followed by little-endian fixed-size
//! fields. Variable-length arguments are stored in separate arena regions and
//! referenced by `ArenaSlice`.
use arrayvec::ArrayVec;

use taskhal_common::{ArenaSlice, Error, ErrorKind, Result};

/// The maximum size of an encoded entry.
pub(super) const MAX_ENTRY_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(super) enum Opcode {
    ExecutionBarrier = 1,
    SignalEvent,
    ResetEvent,
    WaitEvents,
    FillBuffer,
    UpdateBuffer,
    CopyBuffer,
    PushConstants,
    PushDescriptorSet,
    Dispatch,
    DispatchIndirect,
    BeginDebugGroup,
    EndDebugGroup,
}

impl Opcode {
    fn from_u8(x: u8) -> Option<Self> {
        use self::Opcode::*;
        Some(match x {
            1 => ExecutionBarrier,
            2 => SignalEvent,
            3 => ResetEvent,
            4 => WaitEvents,
            5 => FillBuffer,
            6 => UpdateBuffer,
            7 => CopyBuffer,
            8 => PushConstants,
            9 => PushDescriptorSet,
            10 => Dispatch,
            11 => DispatchIndirect,
            12 => BeginDebugGroup,
            13 => EndDebugGroup,
            _ => return None,
        })
    }
}

/// Builds a single entry.
#[derive(Debug)]
pub(super) struct Encoder(ArrayVec<u8, MAX_ENTRY_SIZE>);

impl Encoder {
    pub fn new(op: Opcode) -> Self {
        let mut data = ArrayVec::new();
        data.push(op as u8);
        Encoder(data)
    }

    // Every entry is far smaller than `MAX_ENTRY_SIZE`, so `extend` never
    // overflows
    fn bytes(&mut self, x: &[u8]) -> &mut Self {
        self.0.extend(x.iter().cloned());
        self
    }

    pub fn u8(&mut self, x: u8) -> &mut Self {
        self.bytes(&[x])
    }

    pub fn u32(&mut self, x: u32) -> &mut Self {
        self.bytes(&x.to_le_bytes())
    }

    pub fn u64(&mut self, x: u64) -> &mut Self {
        self.bytes(&x.to_le_bytes())
    }

    pub fn slice(&mut self, x: ArenaSlice) -> &mut Self {
        let [a, b, c] = x.to_raw();
        self.u32(a).u32(b).u32(c)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Appends fixed-size records to a variable-length argument.
#[derive(Debug, Default)]
pub(super) struct ListEncoder(Vec<u8>);

impl ListEncoder {
    pub fn u16(&mut self, x: u16) -> &mut Self {
        self.0.extend_from_slice(&x.to_le_bytes());
        self
    }

    pub fn u32(&mut self, x: u32) -> &mut Self {
        self.0.extend_from_slice(&x.to_le_bytes());
        self
    }

    pub fn u64(&mut self, x: u64) -> &mut Self {
        self.0.extend_from_slice(&x.to_le_bytes());
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Reads the fields of an entry or a list in order.
#[derive(Debug)]
pub(super) struct Decoder<'a> {
    data: &'a [u8],
}

fn truncated() -> Error {
    Error::with_detail(ErrorKind::Internal, "truncated command entry")
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.data.len() < len {
            return Err(truncated());
        }
        let (x, rest) = self.data.split_at(len);
        self.data = rest;
        Ok(x)
    }

    pub fn opcode(&mut self) -> Result<Opcode> {
        let x = self.u8()?;
        Opcode::from_u8(x).ok_or_else(|| {
            Error::with_detail(ErrorKind::Internal, format!("unknown opcode {}", x))
        })
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        let x = self.take(2)?;
        Ok(u16::from_le_bytes([x[0], x[1]]))
    }

    pub fn u32(&mut self) -> Result<u32> {
        let x = self.take(4)?;
        Ok(u32::from_le_bytes([x[0], x[1], x[2], x[3]]))
    }

    pub fn u64(&mut self) -> Result<u64> {
        let x = self.take(8)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(x);
        Ok(u64::from_le_bytes(bytes))
    }

    pub fn slice(&mut self) -> Result<ArenaSlice> {
        Ok(ArenaSlice::from_raw([self.u32()?, self.u32()?, self.u32()?]))
    }
}
