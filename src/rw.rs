//! The read/write engine (C6): translates `(inode, offset, length)` into
//! block I/O through the direct + single-indirect index.
//!
//! This is the hard part of the whole filesystem (see spec §1): offsets
//! rarely land on a block boundary, and a file can straddle the direct and
//! indirect regions at any point. The two public entry points,
//! [`read_file`] and [`write_file`], are deliberately free functions rather
//! than methods — they only need a `Disk` plus the pieces of state
//! [`crate::fs::Filesystem`] already owns (an inode and, for writes, the
//! bitmap), which keeps the block-walking logic testable in isolation from
//! mount/unmount bookkeeping.

use crate::bitmap::FreeBlockBitmap;
use crate::disk::{Block, Disk, BLOCK_SIZE};
use crate::error::Error;
use crate::layout::{
    decode_indirect_block, encode_pointer_into, BlockAddress, RawInode, POINTERS_PER_BLOCK,
    POINTERS_PER_INODE,
};

/// The largest logical block index a `(direct + indirect)` inode can
/// address: five direct slots, then `POINTERS_PER_BLOCK` indirect slots.
const MAX_LOGICAL_BLOCKS: u64 = (POINTERS_PER_INODE + POINTERS_PER_BLOCK) as u64;

/// Resolves logical block `logical` to its physical pointer, if any,
/// without allocating. Caches the indirect block across calls within a
/// single read so a multi-block read only pays for one indirect-block
/// fetch.
fn logical_block_pointer<D: Disk>(
    disk: &D,
    inode: &RawInode,
    indirect_cache: &mut Option<Block>,
    logical: u32,
) -> Result<Option<BlockAddress>, Error> {
    if logical < POINTERS_PER_INODE {
        return Ok(inode.direct[logical as usize]);
    }
    let idx = (logical - POINTERS_PER_INODE) as usize;
    let Some(indirect_ptr) = inode.indirect else {
        return Ok(None);
    };
    if indirect_cache.is_none() {
        let mut block: Block = [0u8; BLOCK_SIZE];
        disk.read(indirect_ptr.get(), &mut block)
            .map_err(|_| Error::Io("reading indirect block"))?;
        *indirect_cache = Some(block);
    }
    let pointers = decode_indirect_block(indirect_cache.as_ref().unwrap());
    Ok(pointers[idx])
}

/// Reads up to `buf.len()` bytes from `inode` starting at `offset`, per
/// §4.5. Returns the number of bytes actually copied, which is `0` when
/// `offset >= inode.size` and otherwise `min(buf.len(), inode.size -
/// offset)`.
pub fn read_file<D: Disk>(
    disk: &D,
    inode: &RawInode,
    buf: &mut [u8],
    offset: u64,
) -> Result<usize, Error> {
    let size = inode.size as u64;
    if offset >= size || buf.is_empty() {
        return Ok(0);
    }
    let effective_len = core::cmp::min(buf.len() as u64, size - offset) as usize;
    let block_size = BLOCK_SIZE as u64;

    let mut indirect_cache: Option<Block> = None;
    let mut copied = 0usize;
    let mut cursor = offset;

    while copied < effective_len {
        let logical = cursor / block_size;
        if logical >= MAX_LOGICAL_BLOCKS {
            return Err(Error::Corrupt("logical block index exceeds the direct+indirect addressing range"));
        }
        let in_block_off = (cursor % block_size) as usize;
        let take = core::cmp::min(block_size as usize - in_block_off, effective_len - copied);

        let ptr = logical_block_pointer(disk, inode, &mut indirect_cache, logical as u32)?
            .ok_or(Error::Corrupt("size implies a data block that is not allocated"))?;

        let mut block: Block = [0u8; BLOCK_SIZE];
        disk.read(ptr.get(), &mut block)
            .map_err(|_| Error::Io("reading data block"))?;
        buf[copied..copied + take].copy_from_slice(&block[in_block_off..in_block_off + take]);

        cursor += take as u64;
        copied += take;
    }

    Ok(copied)
}

/// Resolves logical block `logical` to a physical pointer, allocating a
/// fresh (zero-filled) block — and, if needed, a fresh indirect block —
/// when the slot is empty. Returns `Err(Error::NoSpace)` if the allocator
/// is exhausted; the caller treats that as "stop here, keep what's done".
fn get_or_allocate_block<D: Disk>(
    disk: &D,
    bitmap: &mut FreeBlockBitmap,
    inode: &mut RawInode,
    indirect_cache: &mut Option<Block>,
    indirect_dirty: &mut bool,
    logical: u32,
) -> Result<u32, Error> {
    if logical < POINTERS_PER_INODE {
        if let Some(addr) = inode.direct[logical as usize] {
            return Ok(addr.get());
        }
        let new_block = bitmap.allocate()?;
        zero_block(disk, new_block)?;
        inode.direct[logical as usize] = BlockAddress::new(new_block);
        return Ok(new_block);
    }

    let idx = (logical - POINTERS_PER_INODE) as usize;
    if indirect_cache.is_none() {
        let indirect_ptr = match inode.indirect {
            Some(addr) => addr.get(),
            None => {
                let new_indirect = bitmap.allocate()?;
                zero_block(disk, new_indirect)?;
                inode.indirect = BlockAddress::new(new_indirect);
                new_indirect
            }
        };
        let mut block: Block = [0u8; BLOCK_SIZE];
        disk.read(indirect_ptr, &mut block)
            .map_err(|_| Error::Io("reading indirect block"))?;
        *indirect_cache = Some(block);
    }
    let cached = indirect_cache.as_mut().unwrap();
    if let Some(addr) = decode_indirect_block(cached)[idx] {
        return Ok(addr.get());
    }
    let new_block = bitmap.allocate()?;
    zero_block(disk, new_block)?;
    encode_pointer_into(cached, idx, BlockAddress::new(new_block));
    *indirect_dirty = true;
    Ok(new_block)
}

/// Writes an all-zero block to `index`. New block allocations always start
/// zeroed, so a partial write that lands in a fresh block reads back zero
/// in the bytes the caller didn't touch (§4.5 edge case policy).
fn zero_block<D: Disk>(disk: &D, index: u32) -> Result<(), Error> {
    disk.write(index, &[0u8; BLOCK_SIZE])
        .map_err(|_| Error::Io("zero-filling a newly allocated block"))
}

/// Writes `buf` into `inode` at `offset`, allocating blocks (and, if
/// needed, the indirect block) as required, per §4.5.
///
/// Returns the number of bytes actually written. This is always
/// `buf.len()` unless the allocator runs out of space or the write would
/// cross the `5*BLOCK_SIZE + 1024*BLOCK_SIZE` capacity limit, in which
/// case it returns the partial count and leaves everything written so far
/// persisted — per §7's policy, neither condition is an error from a
/// mutating operation's point of view.
pub fn write_file<D: Disk>(
    disk: &D,
    bitmap: &mut FreeBlockBitmap,
    inode: &mut RawInode,
    buf: &[u8],
    offset: u64,
) -> Result<usize, Error> {
    if buf.is_empty() {
        return Ok(0);
    }
    let block_size = BLOCK_SIZE as u64;

    let mut indirect_cache: Option<Block> = None;
    let mut indirect_dirty = false;
    let mut written = 0usize;
    let mut cursor = offset;

    while written < buf.len() {
        let logical = cursor / block_size;
        if logical >= MAX_LOGICAL_BLOCKS {
            break;
        }
        let in_block_off = (cursor % block_size) as usize;
        let take = core::cmp::min(block_size as usize - in_block_off, buf.len() - written);

        let ptr = match get_or_allocate_block(
            disk,
            bitmap,
            inode,
            &mut indirect_cache,
            &mut indirect_dirty,
            logical as u32,
        ) {
            Ok(ptr) => ptr,
            Err(Error::NoSpace) => break,
            Err(e) => return Err(e),
        };

        let mut block: Block = [0u8; BLOCK_SIZE];
        if in_block_off != 0 || take < block_size as usize {
            disk.read(ptr, &mut block)
                .map_err(|_| Error::Io("reading data block for partial write"))?;
        }
        block[in_block_off..in_block_off + take].copy_from_slice(&buf[written..written + take]);
        disk.write(ptr, &block)
            .map_err(|_| Error::Io("writing data block"))?;

        cursor += take as u64;
        written += take;
    }

    if indirect_dirty {
        let indirect_ptr = inode
            .indirect
            .expect("indirect_dirty is only set after inode.indirect is populated");
        disk.write(indirect_ptr.get(), indirect_cache.as_ref().unwrap())
            .map_err(|_| Error::Io("writing indirect block"))?;
    }

    let new_size = offset + written as u64;
    if new_size > inode.size as u64 {
        inode.size = new_size as u32;
    }

    Ok(written)
}
