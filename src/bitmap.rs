//! The free-block bitmap (C4) and the allocator built on top of it (C5).
//!
//! The bitmap is a derived cache: nothing here is ever written to disk. It
//! is rebuilt from the on-disk inode table every time the filesystem is
//! mounted (see [`FreeBlockBitmap::rebuild`]) and is otherwise kept
//! incrementally consistent as [`crate::fs::Filesystem`] creates, deletes,
//! and writes to files.

use crate::disk::{Block, Disk, BLOCK_SIZE};
use crate::error::Error;
use crate::inode::InodeAccessor;
use crate::layout::{decode_indirect_block, SuperBlock};

/// The in-memory occupancy map: `occupied[i]` is `true` iff block `i` is in
/// use by the superblock, the inode table, or some file's data.
pub struct FreeBlockBitmap {
    occupied: Vec<bool>,
}

impl FreeBlockBitmap {
    /// Rebuilds the bitmap from scratch by scanning the on-disk inode table,
    /// per §4.3:
    /// 1. Block 0 and blocks `1..=ninodeblocks` are occupied unconditionally.
    /// 2. Every nonzero direct pointer of every valid inode is occupied.
    /// 3. If an inode has an indirect block, that block and every nonzero
    ///    entry within it are occupied.
    pub fn rebuild<D: Disk>(disk: &D, superblock: &SuperBlock) -> Result<Self, Error> {
        let mut occupied = vec![false; superblock.nblocks as usize];
        occupied[0] = true;
        for b in 1..=superblock.ninodeblocks {
            occupied[b as usize] = true;
        }

        let accessor = InodeAccessor::new(disk, superblock);
        for n in accessor.all_inumbers() {
            let inode = accessor.load(n)?;
            if !inode.valid {
                continue;
            }
            for ptr in inode.direct.into_iter().flatten() {
                occupied[ptr.get() as usize] = true;
            }
            if let Some(indirect) = inode.indirect {
                occupied[indirect.get() as usize] = true;
                let mut block: Block = [0u8; BLOCK_SIZE];
                disk.read(indirect.get(), &mut block)
                    .map_err(|_| Error::Io("reading indirect block during bitmap rebuild"))?;
                for ptr in decode_indirect_block(&block).into_iter().flatten() {
                    occupied[ptr.get() as usize] = true;
                }
            }
        }

        Ok(Self { occupied })
    }

    /// Whether block `i` is currently marked occupied.
    pub fn is_occupied(&self, i: u32) -> bool {
        self.occupied[i as usize]
    }

    /// The number of blocks tracked by this bitmap (equals the device's
    /// `nblocks`).
    pub fn len(&self) -> usize {
        self.occupied.len()
    }

    /// First-fit allocation: scans ascending, claims and returns the first
    /// free index. Deterministic ascending tie-break keeps tests
    /// reproducible.
    pub fn allocate(&mut self) -> Result<u32, Error> {
        match self.occupied.iter().position(|&used| !used) {
            Some(i) => {
                self.occupied[i] = true;
                Ok(i as u32)
            }
            None => Err(Error::NoSpace),
        }
    }

    /// Marks block `i` free. Idempotent: releasing an already-free block is
    /// a silent no-op, matching the spec's explicit no-op policy.
    pub fn release(&mut self, i: u32) {
        self.occupied[i as usize] = false;
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::MemoryDisk;
    use crate::inode::InodeNumber;
    use crate::layout::{encode_pointer_into, BlockAddress, RawInode};

    fn formatted(nblocks: u32) -> (MemoryDisk, SuperBlock) {
        let disk = MemoryDisk::new(nblocks);
        let sb = SuperBlock::for_device(nblocks);
        disk.write(0, &sb.encode()).unwrap();
        let zeroed = [0u8; BLOCK_SIZE];
        for b in 1..=sb.ninodeblocks {
            disk.write(b, &zeroed).unwrap();
        }
        (disk, sb)
    }

    #[test]
    fn fresh_mount_occupies_only_superblock_and_inode_table() {
        let (disk, sb) = formatted(20);
        let bitmap = FreeBlockBitmap::rebuild(&disk, &sb).unwrap();
        assert_eq!(bitmap.len(), 20);
        for i in 0..=sb.ninodeblocks {
            assert!(bitmap.is_occupied(i));
        }
        for i in (sb.ninodeblocks + 1)..20 {
            assert!(!bitmap.is_occupied(i));
        }
    }

    #[test]
    fn rebuild_marks_direct_and_indirect_pointers() {
        let (disk, sb) = formatted(30);
        let accessor = InodeAccessor::new(&disk, &sb);
        let n = InodeNumber::new(1).unwrap();
        let inode = RawInode {
            valid: true,
            size: 1,
            direct: [
                BlockAddress::new(10),
                BlockAddress::new(11),
                None,
                None,
                None,
            ],
            indirect: BlockAddress::new(12),
        };
        accessor.store(n, &inode).unwrap();

        let mut indirect_block = [0u8; BLOCK_SIZE];
        encode_pointer_into(&mut indirect_block, 0, BlockAddress::new(20));
        encode_pointer_into(&mut indirect_block, 1, BlockAddress::new(21));
        disk.write(12, &indirect_block).unwrap();

        let bitmap = FreeBlockBitmap::rebuild(&disk, &sb).unwrap();
        for b in [10, 11, 12, 20, 21] {
            assert!(bitmap.is_occupied(b));
        }
        assert!(!bitmap.is_occupied(13));
        assert!(!bitmap.is_occupied(22));
    }

    #[test]
    fn allocate_is_first_fit_ascending() {
        let (disk, sb) = formatted(10);
        let mut bitmap = FreeBlockBitmap::rebuild(&disk, &sb).unwrap();
        let first_free = sb.ninodeblocks + 1;
        assert_eq!(bitmap.allocate().unwrap(), first_free);
        assert_eq!(bitmap.allocate().unwrap(), first_free + 1);
    }

    #[test]
    fn allocate_fails_with_no_space_when_exhausted() {
        let (disk, sb) = formatted(3); // 1 superblock + 1 inode block + 1 data block
        let mut bitmap = FreeBlockBitmap::rebuild(&disk, &sb).unwrap();
        bitmap.allocate().unwrap();
        assert!(matches!(bitmap.allocate(), Err(Error::NoSpace)));
    }

    #[test]
    fn release_is_idempotent() {
        let (disk, sb) = formatted(10);
        let mut bitmap = FreeBlockBitmap::rebuild(&disk, &sb).unwrap();
        let i = bitmap.allocate().unwrap();
        bitmap.release(i);
        bitmap.release(i);
        assert!(!bitmap.is_occupied(i));
    }
}
