//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Implementation of `Buffer` backed by host memory.
use parking_lot::Mutex;
use std::convert::TryFrom;

use taskhal_base::{self as base, check_range, DeviceSize};
use taskhal_common::{Error, ErrorKind, Result};

/// Implementation of `Buffer` backed by host memory.
#[derive(Debug)]
pub struct HostBuffer {
    data: Mutex<Vec<u8>>,
}

impl HostBuffer {
    /// Allocate a zero-filled buffer.
    ///
    /// Returns `ResourceExhausted` if the memory cannot be allocated.
    pub fn new(len: DeviceSize) -> Result<Self> {
        let len = usize::try_from(len)
            .map_err(|e| Error::with_detail(ErrorKind::ResourceExhausted, e))?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|e| Error::with_detail(ErrorKind::ResourceExhausted, e))?;
        data.resize(len, 0);
        Ok(Self {
            data: Mutex::new(data),
        })
    }

    /// Copy the whole contents of the buffer.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.lock().clone()
    }
}

impl base::Buffer for HostBuffer {
    fn len(&self) -> DeviceSize {
        self.data.lock().len() as DeviceSize
    }

    fn read(&self, offset: DeviceSize, out: &mut [u8]) -> Result<()> {
        let data = self.data.lock();
        check_range(data.len() as DeviceSize, offset, out.len() as DeviceSize)?;
        let start = offset as usize;
        out.copy_from_slice(&data[start..start + out.len()]);
        Ok(())
    }

    fn write(&self, offset: DeviceSize, src: &[u8]) -> Result<()> {
        let mut data = self.data.lock();
        check_range(data.len() as DeviceSize, offset, src.len() as DeviceSize)?;
        let start = offset as usize;
        data[start..start + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn fill(&self, offset: DeviceSize, len: DeviceSize, pattern: &[u8]) -> Result<()> {
        if pattern.is_empty() {
            return Err(Error::with_detail(
                ErrorKind::InvalidArgument,
                "empty fill pattern",
            ));
        }
        let mut data = self.data.lock();
        check_range(data.len() as DeviceSize, offset, len)?;
        let start = offset as usize;
        for (x, y) in data[start..start + len as usize]
            .iter_mut()
            .zip(pattern.iter().cycle())
        {
            *x = *y;
        }
        Ok(())
    }
}
