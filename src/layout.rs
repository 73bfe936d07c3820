//! On-disk layout (C2): the superblock, inode, and indirect-block formats,
//! plus the small helpers that (de)serialize them from/to a raw [`Block`].
//!
//! Everything here is little-endian and tightly packed, matching §6 of the
//! spec byte for byte. Rather than overlay a C-style union on a raw buffer
//! (the approach the original source took), each type gets an explicit
//! `decode`/`encode` pair so the layout is visible in code instead of relying
//! on struct-layout aliasing.

use crate::disk::{Block, BLOCK_SIZE};
use core::num::NonZeroU32;

/// The filesystem's magic number, stamped into the superblock by `format`.
pub const FS_MAGIC: u32 = 0xF0F0_3410;

/// Inodes packed per inode-table block.
pub const INODES_PER_BLOCK: u32 = (BLOCK_SIZE / RawInode::ON_DISK_SIZE) as u32;
/// Pointers packed per indirect block.
pub const POINTERS_PER_BLOCK: u32 = (BLOCK_SIZE / 4) as u32;
/// Direct pointers carried inside every inode.
pub const POINTERS_PER_INODE: u32 = 5;

/// A nonzero block index, i.e. a valid pointer to a block other than the
/// superblock. `0` can never be a legal data pointer since block 0 is always
/// the superblock, so `Option<BlockAddress>` is exactly as wide as `u32` and
/// makes the "0 means empty slot" convention from §3 explicit in the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockAddress(NonZeroU32);

impl BlockAddress {
    /// Wraps `n` as a [`BlockAddress`], or returns `None` if `n == 0` (the
    /// on-disk "empty slot" sentinel).
    pub fn new(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(Self)
    }

    /// Returns the raw block index.
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

/// Decodes a pointer slot read from disk: `0` becomes `None`, anything else
/// becomes `Some(BlockAddress)`.
pub fn decode_pointer(raw: u32) -> Option<BlockAddress> {
    BlockAddress::new(raw)
}

/// Encodes a pointer slot for writing to disk: `None` becomes `0`.
pub fn encode_pointer(ptr: Option<BlockAddress>) -> u32 {
    ptr.map_or(0, BlockAddress::get)
}

/// The on-disk superblock, stored in block 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    /// Must equal [`FS_MAGIC`] for the image to be mountable.
    pub magic: u32,
    /// Total number of blocks on the device.
    pub nblocks: u32,
    /// Number of blocks reserved for the inode table (`blocks 1..=ninodeblocks`).
    pub ninodeblocks: u32,
    /// `ninodeblocks * INODES_PER_BLOCK`.
    pub ninodes: u32,
}

impl SuperBlock {
    /// Computes a fresh superblock for a `nblocks`-block device, per §4.4:
    /// `ninodeblocks = max(1, ceil(nblocks / 10))`.
    ///
    /// The original source computed this with integer division (silently
    /// `floor`, despite the name), which left a one-inode-block device unable
    /// to hold a single inode; this crate uses a true ceiling.
    pub fn for_device(nblocks: u32) -> Self {
        let ninodeblocks = nblocks.div_ceil(10).max(1);
        Self {
            magic: FS_MAGIC,
            nblocks,
            ninodeblocks,
            ninodes: ninodeblocks * INODES_PER_BLOCK,
        }
    }

    /// Decodes a superblock from block 0's raw bytes.
    pub fn decode(block: &Block) -> Self {
        Self {
            magic: u32::from_le_bytes(block[0..4].try_into().unwrap()),
            nblocks: u32::from_le_bytes(block[4..8].try_into().unwrap()),
            ninodeblocks: u32::from_le_bytes(block[8..12].try_into().unwrap()),
            ninodes: u32::from_le_bytes(block[12..16].try_into().unwrap()),
        }
    }

    /// Encodes this superblock into a fresh, zero-padded block.
    pub fn encode(&self) -> Block {
        let mut block = [0u8; BLOCK_SIZE];
        block[0..4].copy_from_slice(&self.magic.to_le_bytes());
        block[4..8].copy_from_slice(&self.nblocks.to_le_bytes());
        block[8..12].copy_from_slice(&self.ninodeblocks.to_le_bytes());
        block[12..16].copy_from_slice(&self.ninodes.to_le_bytes());
        block
    }
}

/// A single on-disk inode record: 32 bytes, five direct pointers plus one
/// indirect pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawInode {
    /// `true` iff this slot is allocated to a file.
    pub valid: bool,
    /// File size in bytes.
    pub size: u32,
    /// Five direct data-block pointers.
    pub direct: [Option<BlockAddress>; POINTERS_PER_INODE as usize],
    /// The single-level indirect pointer block, if any.
    pub indirect: Option<BlockAddress>,
}

impl RawInode {
    /// Size of one inode record on disk, in bytes: `isvalid + size + 5
    /// direct + indirect`, each a `u32`.
    pub const ON_DISK_SIZE: usize = 4 * (2 + POINTERS_PER_INODE as usize + 1);

    /// The all-zero, invalid inode written by `format` into every slot.
    pub const fn empty() -> Self {
        Self {
            valid: false,
            size: 0,
            direct: [None; POINTERS_PER_INODE as usize],
            indirect: None,
        }
    }

    /// Decodes one inode record out of `slot`'s bytes within an inode-table
    /// block.
    pub fn decode(bytes: &[u8]) -> Self {
        debug_assert_eq!(bytes.len(), Self::ON_DISK_SIZE);
        let valid = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) != 0;
        let size = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let mut direct = [None; POINTERS_PER_INODE as usize];
        for (i, slot) in direct.iter_mut().enumerate() {
            let off = 8 + i * 4;
            *slot = decode_pointer(u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap()));
        }
        let indirect_off = 8 + POINTERS_PER_INODE as usize * 4;
        let indirect = decode_pointer(
            u32::from_le_bytes(bytes[indirect_off..indirect_off + 4].try_into().unwrap()),
        );
        Self {
            valid,
            size,
            direct,
            indirect,
        }
    }

    /// Encodes this inode record into `bytes` (exactly [`Self::ON_DISK_SIZE`]
    /// bytes long).
    pub fn encode_into(&self, bytes: &mut [u8]) {
        debug_assert_eq!(bytes.len(), Self::ON_DISK_SIZE);
        bytes[0..4].copy_from_slice(&(self.valid as u32).to_le_bytes());
        bytes[4..8].copy_from_slice(&self.size.to_le_bytes());
        for (i, slot) in self.direct.iter().enumerate() {
            let off = 8 + i * 4;
            bytes[off..off + 4].copy_from_slice(&encode_pointer(*slot).to_le_bytes());
        }
        let indirect_off = 8 + POINTERS_PER_INODE as usize * 4;
        bytes[indirect_off..indirect_off + 4]
            .copy_from_slice(&encode_pointer(self.indirect).to_le_bytes());
    }
}

/// Reads the pointer list out of an indirect block's raw bytes.
pub fn decode_indirect_block(block: &Block) -> [Option<BlockAddress>; POINTERS_PER_BLOCK as usize] {
    let mut pointers = [None; POINTERS_PER_BLOCK as usize];
    for (i, slot) in pointers.iter_mut().enumerate() {
        let off = i * 4;
        *slot = decode_pointer(u32::from_le_bytes(block[off..off + 4].try_into().unwrap()));
    }
    pointers
}

/// Writes a single pointer slot into an indirect block's raw bytes, in place.
pub fn encode_pointer_into(block: &mut Block, slot: usize, ptr: Option<BlockAddress>) {
    let off = slot * 4;
    block[off..off + 4].copy_from_slice(&encode_pointer(ptr).to_le_bytes());
}
