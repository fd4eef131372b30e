//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Buffer objects.
use std::fmt;
use std::sync::Arc;

use crate::common::{Error, ErrorKind, Result};
use crate::DeviceSize;

/// Trait for buffer objects.
///
/// Buffers are shared between recorded command buffers and the tasks executing
/// them, so every method takes `&self` and implementations must synchronize
/// internally. Concurrent accesses to overlapping ranges are not ordered by
/// the buffer; ordering is established by barriers and events.
pub trait Buffer: Send + Sync + fmt::Debug {
    /// The size of the buffer in bytes.
    fn len(&self) -> DeviceSize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy `out.len()` bytes starting at `offset` into `out`.
    fn read(&self, offset: DeviceSize, out: &mut [u8]) -> Result<()>;

    /// Copy `data` into the buffer starting at `offset`.
    fn write(&self, offset: DeviceSize, data: &[u8]) -> Result<()>;

    /// Fill `len` bytes starting at `offset` with a repeated `pattern`.
    ///
    /// The default implementation is built on `write`.
    fn fill(&self, offset: DeviceSize, len: DeviceSize, pattern: &[u8]) -> Result<()> {
        if pattern.is_empty() {
            return Err(Error::with_detail(
                ErrorKind::InvalidArgument,
                "empty fill pattern",
            ));
        }
        check_range(self.len(), offset, len)?;

        let chunk: Vec<u8> = pattern
            .iter()
            .cycle()
            .take(pattern.len() * (256 / pattern.len()).max(1))
            .cloned()
            .collect();

        let mut done = 0;
        while done < len {
            let n = (len - done).min(chunk.len() as DeviceSize);
            self.write(offset + done, &chunk[..n as usize])?;
            done += n;
        }
        Ok(())
    }
}

/// Boxed handle of a buffer object.
pub type BufferRef = Arc<dyn Buffer>;

/// Check that `offset..offset + len` lies within a buffer of `buffer_len`
/// bytes.
pub fn check_range(buffer_len: DeviceSize, offset: DeviceSize, len: DeviceSize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= buffer_len => Ok(()),
        _ => Err(Error::with_detail(
            ErrorKind::InvalidArgument,
            format!(
                "range {}+{} is out of bounds of a buffer of {} bytes",
                offset, len, buffer_len
            ),
        )),
    }
}
