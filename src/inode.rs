//! Inode numbering and the single-inode accessor (C3).

use crate::disk::Disk;
use crate::error::Error;
use crate::layout::{RawInode, SuperBlock, INODES_PER_BLOCK};
use core::num::NonZeroU32;

/// A validated inode number.
///
/// Inumber `0` is reserved as the "no such inode" / failure sentinel (§3),
/// so a live `InodeNumber` is always `>= 1`; [`InodeNumber::to_index`]
/// subtracts the `1` back out to get the 0-based slot index used in on-disk
/// arithmetic. This is the fix for the distilled spec's flagged off-by-one:
/// the original source mixed 0-based and 1-based inumbers across
/// `fs_create`/`fs_getsize`; wrapping the sentinel in the type makes the two
/// bases impossible to conflate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InodeNumber(NonZeroU32);

impl InodeNumber {
    /// Constructs an `InodeNumber` from a raw, possibly-invalid value.
    /// Returns `None` for `0`; does not check it against `ninodes`.
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// The raw inumber, as exposed at the crate boundary (matches the
    /// spec's "create returns the new inumber, 0 on failure" convention).
    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// The 0-based slot index used to locate this inode within the inode
    /// table: `inode-table block = index / INODES_PER_BLOCK + 1`, `slot =
    /// index % INODES_PER_BLOCK`.
    fn to_index(self) -> u32 {
        self.0.get() - 1
    }

    /// Builds an `InodeNumber` from a 0-based slot index (the inverse of
    /// [`Self::to_index`]).
    fn from_index(index: u32) -> Self {
        Self(NonZeroU32::new(index + 1).expect("index + 1 is never zero"))
    }

    /// The inode-table block this inode lives in (`1`-based; block `0` is
    /// the superblock).
    fn block(self) -> u32 {
        self.to_index() / INODES_PER_BLOCK + 1
    }

    /// The slot within that block.
    fn slot(self) -> usize {
        (self.to_index() % INODES_PER_BLOCK) as usize
    }
}

/// Loads and stores individual [`RawInode`] records by [`InodeNumber`].
///
/// This never touches the free-block bitmap — it is purely the (block,
/// slot) <-> inode translation described in §4.2. It must tolerate being
/// called on a currently-invalid slot, since `create` targets exactly such a
/// slot.
pub struct InodeAccessor<'a, D: Disk> {
    disk: &'a D,
    superblock: &'a SuperBlock,
}

impl<'a, D: Disk> InodeAccessor<'a, D> {
    /// Builds an accessor bound to `disk` under the geometry of `superblock`.
    pub fn new(disk: &'a D, superblock: &'a SuperBlock) -> Self {
        Self { disk, superblock }
    }

    /// Returns `Some(inumber)` if `raw` names a slot within the inode table,
    /// regardless of whether that slot is currently valid.
    pub fn validate_range(&self, raw: u32) -> Option<InodeNumber> {
        let inumber = InodeNumber::new(raw)?;
        if inumber.to_index() < self.superblock.ninodes {
            Some(inumber)
        } else {
            None
        }
    }

    /// Reads the inode-table block enclosing `n` and returns its slot.
    pub fn load(&self, n: InodeNumber) -> Result<RawInode, Error> {
        let mut block = [0u8; crate::disk::BLOCK_SIZE];
        self.disk
            .read(n.block(), &mut block)
            .map_err(|_| Error::Io("reading inode table block"))?;
        let off = n.slot() * RawInode::ON_DISK_SIZE;
        Ok(RawInode::decode(&block[off..off + RawInode::ON_DISK_SIZE]))
    }

    /// Replaces `n`'s slot with `inode` and writes the enclosing block back.
    pub fn store(&self, n: InodeNumber, inode: &RawInode) -> Result<(), Error> {
        let mut block = [0u8; crate::disk::BLOCK_SIZE];
        self.disk
            .read(n.block(), &mut block)
            .map_err(|_| Error::Io("reading inode table block"))?;
        let off = n.slot() * RawInode::ON_DISK_SIZE;
        inode.encode_into(&mut block[off..off + RawInode::ON_DISK_SIZE]);
        self.disk
            .write(n.block(), &block)
            .map_err(|_| Error::Io("writing inode table block"))
    }

    /// Iterates every `(inumber, block, slot-offset-within-block)` in
    /// ascending block-then-slot order — the scan order `create` and the
    /// bitmap rebuild both rely on.
    pub fn all_inumbers(&self) -> impl Iterator<Item = InodeNumber> + 'a {
        let ninodes = self.superblock.ninodes;
        (0..ninodes).map(InodeNumber::from_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::MemoryDisk;

    fn formatted_disk(nblocks: u32) -> (MemoryDisk, SuperBlock) {
        let disk = MemoryDisk::new(nblocks);
        let sb = SuperBlock::for_device(nblocks);
        disk.write(0, &sb.encode()).unwrap();
        let zeroed = [0u8; crate::disk::BLOCK_SIZE];
        for b in 1..=sb.ninodeblocks {
            disk.write(b, &zeroed).unwrap();
        }
        (disk, sb)
    }

    #[test]
    fn index_and_inumber_are_inverses() {
        for raw in [1u32, 2, 128, 129, 255] {
            let n = InodeNumber::new(raw).unwrap();
            assert_eq!(InodeNumber::from_index(n.to_index()), n);
        }
    }

    #[test]
    fn block_and_slot_follow_spec_formula() {
        let n = InodeNumber::new(1).unwrap(); // index 0
        assert_eq!(n.block(), 1);
        assert_eq!(n.slot(), 0);

        let n = InodeNumber::new(INODES_PER_BLOCK).unwrap(); // index 127
        assert_eq!(n.block(), 1);
        assert_eq!(n.slot(), (INODES_PER_BLOCK - 1) as usize);

        let n = InodeNumber::new(INODES_PER_BLOCK + 1).unwrap(); // index 128
        assert_eq!(n.block(), 2);
        assert_eq!(n.slot(), 0);
    }

    #[test]
    fn load_store_round_trips_on_freshly_formatted_disk() {
        let (disk, sb) = formatted_disk(20);
        let accessor = InodeAccessor::new(&disk, &sb);
        let n = InodeNumber::new(5).unwrap();
        assert!(!accessor.load(n).unwrap().valid);

        let inode = RawInode {
            valid: true,
            size: 99,
            ..RawInode::empty()
        };
        accessor.store(n, &inode).unwrap();
        assert_eq!(accessor.load(n).unwrap(), inode);

        // A neighboring slot in the same block is untouched.
        let neighbor = InodeNumber::new(6).unwrap();
        assert!(!accessor.load(neighbor).unwrap().valid);
    }

    #[test]
    fn validate_range_rejects_out_of_range_and_zero() {
        let (disk, sb) = formatted_disk(20);
        let accessor = InodeAccessor::new(&disk, &sb);
        assert!(accessor.validate_range(0).is_none());
        assert!(accessor.validate_range(sb.ninodes + 1).is_none());
        assert!(accessor.validate_range(1).is_some());
        assert!(accessor.validate_range(sb.ninodes).is_some());
    }
}
