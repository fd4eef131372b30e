//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Fixed-size memory blocks recycled through a shared pool, and a bump
//! allocator built on top of them.
//!
//! Blocks are never returned to the system allocator while their pool is
//! alive. A pool that once needed `n` blocks keeps `n` blocks around, which
//! removes allocator calls from the steady state of command recording and
//! submission.
//!
//! # Examples
//!
//!     use std::sync::Arc;
//!     use taskhal_common::{Arena, ArenaBlockPool};
//!
//!     let pool = Arc::new(ArenaBlockPool::new(4096).unwrap());
//!     let mut arena = Arena::new(Arc::clone(&pool));
//!     let s = arena.alloc_copy(b"push constants").unwrap();
//!     assert_eq!(arena.get(s), b"push constants");
//!     drop(arena);
//!     assert_eq!(pool.num_free(), 1);
//!
use log::trace;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::{Error, ErrorKind, Result};

/// The smallest block size accepted by `ArenaBlockPool::new`.
pub const MIN_BLOCK_SIZE: usize = 64;

/// A fixed-size chunk of memory handed out by `ArenaBlockPool`.
pub struct Block {
    data: Box<[u8]>,
    next: Option<Box<Block>>,
}

impl Block {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("ptr", &self.data.as_ptr())
            .field("len", &self.data.len())
            .finish()
    }
}

/// A singly-linked chain of blocks owned exclusively by its holder.
#[derive(Default)]
pub struct BlockChain {
    head: Option<Box<Block>>,
    len: usize,
}

impl BlockChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link `block` to the front of the chain.
    pub fn push(&mut self, mut block: Box<Block>) {
        block.next = self.head.take();
        self.head = Some(block);
        self.len += 1;
    }

    /// Unlink the first block of the chain.
    pub fn pop(&mut self) -> Option<Box<Block>> {
        self.head.take().map(|mut block| {
            self.head = block.next.take();
            self.len -= 1;
            block
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

impl fmt::Debug for BlockChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockChain").field("len", &self.len).finish()
    }
}

impl Drop for BlockChain {
    fn drop(&mut self) {
        // Unlink iteratively so that a long chain does not overflow the stack
        while self.pop().is_some() {}
    }
}

/// Thread-safe pool of fixed-size blocks.
pub struct ArenaBlockPool {
    block_size: usize,
    max_block_count: Option<usize>,
    num_allocated: AtomicUsize,
    free: Mutex<BlockChain>,
}

impl fmt::Debug for ArenaBlockPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaBlockPool")
            .field("block_size", &self.block_size)
            .field("max_block_count", &self.max_block_count)
            .field("num_allocated", &self.num_allocated())
            .field("num_free", &self.num_free())
            .finish()
    }
}

impl ArenaBlockPool {
    /// Construct a pool handing out blocks of `block_size` bytes.
    pub fn new(block_size: usize) -> Result<Self> {
        Self::with_limit(block_size, None)
    }

    /// Construct a pool that never allocates more than `max_block_count`
    /// blocks in total. Requests beyond the limit fail with
    /// `ResourceExhausted`.
    pub fn with_limit(block_size: usize, max_block_count: Option<usize>) -> Result<Self> {
        if block_size < MIN_BLOCK_SIZE {
            return Err(Error::with_detail(
                ErrorKind::InvalidArgument,
                format!("block size {} is below {}", block_size, MIN_BLOCK_SIZE),
            ));
        }
        Ok(Self {
            block_size,
            max_block_count,
            num_allocated: AtomicUsize::new(0),
            free: Mutex::new(BlockChain::new()),
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// The number of blocks ever allocated by this pool.
    pub fn num_allocated(&self) -> usize {
        self.num_allocated.load(Ordering::Relaxed)
    }

    /// The number of blocks currently sitting in the free list.
    pub fn num_free(&self) -> usize {
        self.free.lock().len()
    }

    /// Take a block from the free list, or allocate a fresh one if the free
    /// list is empty. The contents of a recycled block are unspecified.
    pub fn acquire(&self) -> Result<Box<Block>> {
        if let Some(block) = self.free.lock().pop() {
            return Ok(block);
        }

        if let Some(limit) = self.max_block_count {
            self.num_allocated
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                    if n < limit {
                        Some(n + 1)
                    } else {
                        None
                    }
                })
                .map_err(|_| {
                    Error::with_detail(
                        ErrorKind::ResourceExhausted,
                        format!("arena block limit ({}) reached", limit),
                    )
                })?;
        } else {
            self.num_allocated.fetch_add(1, Ordering::Relaxed);
        }

        let data = match alloc_zeroed(self.block_size) {
            Ok(data) => data,
            Err(e) => {
                self.num_allocated.fetch_sub(1, Ordering::Relaxed);
                return Err(e);
            }
        };

        trace!("arena: allocated block #{} ({} bytes)", self.num_allocated(), self.block_size);

        Ok(Box::new(Block { data, next: None }))
    }

    /// Return a chain of blocks to the free list in a single critical section.
    pub fn release(&self, mut chain: BlockChain) {
        if chain.is_empty() {
            return;
        }
        let mut free = self.free.lock();
        while let Some(block) = chain.pop() {
            free.push(block);
        }
    }
}

/// Allocate a zero-filled buffer, reporting allocation failure as an error
/// instead of aborting.
pub(crate) fn alloc_zeroed(len: usize) -> Result<Box<[u8]>> {
    let mut data = Vec::new();
    data.try_reserve_exact(len).map_err(|e| {
        Error::with_detail(ErrorKind::ResourceExhausted, e.to_string())
    })?;
    data.resize(len, 0);
    Ok(data.into_boxed_slice())
}

/// Bit set in `ArenaSlice::chunk` for oversized allocations.
const OVERSIZED_BIT: u32 = 1 << 31;

/// A region allocated from an `Arena`.
///
/// This is a plain index into the arena rather than a reference, so it can be
/// stored inside data living in the same arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ArenaSlice {
    chunk: u32,
    offset: u32,
    len: u32,
}

impl ArenaSlice {
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Encode this slice as three integers.
    pub fn to_raw(&self) -> [u32; 3] {
        [self.chunk, self.offset, self.len]
    }

    /// Decode a slice produced by `to_raw`.
    pub fn from_raw(x: [u32; 3]) -> Self {
        Self {
            chunk: x[0],
            offset: x[1],
            len: x[2],
        }
    }
}

/// A position in an `Arena` which the arena can be rolled back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaMark {
    num_blocks: usize,
    offset: usize,
    num_oversized: usize,
}

/// Bump allocator drawing blocks from an `ArenaBlockPool`.
///
/// All blocks are returned to the pool on `reset` or drop. Requests larger
/// than the pool's block size are served by dedicated allocations owned by
/// the arena.
pub struct Arena {
    pool: Arc<ArenaBlockPool>,
    blocks: Vec<Box<Block>>,
    /// Bump offset into the last element of `blocks`.
    offset: usize,
    oversized: Vec<Box<[u8]>>,
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("num_blocks", &self.blocks.len())
            .field("offset", &self.offset)
            .field("num_oversized", &self.oversized.len())
            .finish()
    }
}

impl Arena {
    pub fn new(pool: Arc<ArenaBlockPool>) -> Self {
        Self {
            pool,
            blocks: Vec::new(),
            offset: 0,
            oversized: Vec::new(),
        }
    }

    pub fn pool(&self) -> &Arc<ArenaBlockPool> {
        &self.pool
    }

    /// The number of pool blocks currently held by this arena.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Allocate a zero-initialized region of `len` bytes.
    pub fn alloc(&mut self, len: usize) -> Result<ArenaSlice> {
        if len == 0 {
            return Ok(ArenaSlice::default());
        }
        if len > u32::max_value() as usize {
            return Err(ErrorKind::ResourceExhausted.into());
        }

        let block_size = self.pool.block_size();
        if len > block_size {
            let data = alloc_zeroed(len)?;
            self.oversized.push(data);
            return Ok(ArenaSlice {
                chunk: OVERSIZED_BIT | (self.oversized.len() - 1) as u32,
                offset: 0,
                len: len as u32,
            });
        }

        if self.blocks.is_empty() || self.offset + len > block_size {
            let block = self.pool.acquire()?;
            self.blocks.push(block);
            self.offset = 0;
        }

        let slice = ArenaSlice {
            chunk: (self.blocks.len() - 1) as u32,
            offset: self.offset as u32,
            len: len as u32,
        };
        self.offset += len;

        // Recycled blocks contain stale data
        self.get_mut(slice).iter_mut().for_each(|x| *x = 0);

        Ok(slice)
    }

    /// Allocate a region and copy `data` into it.
    pub fn alloc_copy(&mut self, data: &[u8]) -> Result<ArenaSlice> {
        let slice = self.alloc(data.len())?;
        self.get_mut(slice).copy_from_slice(data);
        Ok(slice)
    }

    /// Get the contents of a region allocated by this arena.
    ///
    /// # Panics
    ///
    /// Panics if `slice` was not allocated by this arena, or was invalidated
    /// by `rollback` or `reset`.
    pub fn get(&self, slice: ArenaSlice) -> &[u8] {
        if slice.len == 0 {
            return &[];
        }
        let range = slice.offset as usize..(slice.offset + slice.len) as usize;
        if slice.chunk & OVERSIZED_BIT != 0 {
            &self.oversized[(slice.chunk & !OVERSIZED_BIT) as usize][range]
        } else {
            &self.blocks[slice.chunk as usize].data()[range]
        }
    }

    /// Get the mutable contents of a region allocated by this arena.
    ///
    /// # Panics
    ///
    /// See `get`.
    pub fn get_mut(&mut self, slice: ArenaSlice) -> &mut [u8] {
        if slice.len == 0 {
            return &mut [];
        }
        let range = slice.offset as usize..(slice.offset + slice.len) as usize;
        if slice.chunk & OVERSIZED_BIT != 0 {
            &mut self.oversized[(slice.chunk & !OVERSIZED_BIT) as usize][range]
        } else {
            &mut self.blocks[slice.chunk as usize].data_mut()[range]
        }
    }

    /// Remember the current allocation position.
    pub fn mark(&self) -> ArenaMark {
        ArenaMark {
            num_blocks: self.blocks.len(),
            offset: self.offset,
            num_oversized: self.oversized.len(),
        }
    }

    /// Discard every allocation made after `mark` was taken. Blocks acquired
    /// since then are returned to the pool.
    pub fn rollback(&mut self, mark: ArenaMark) {
        let mut chain = BlockChain::new();
        while self.blocks.len() > mark.num_blocks {
            if let Some(block) = self.blocks.pop() {
                chain.push(block);
            }
        }
        self.pool.release(chain);
        self.oversized.truncate(mark.num_oversized);
        self.offset = mark.offset;
    }

    /// Discard all allocations and return every block to the pool.
    pub fn reset(&mut self) {
        let mut chain = BlockChain::new();
        for block in self.blocks.drain(..) {
            chain.push(block);
        }
        self.pool.release(chain);
        self.oversized.clear();
        self.offset = 0;
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        self.reset();
    }
}
