//! The filesystem manager (C7): owns the mounted state and wires the inode
//! accessor, the free-block bitmap, and the read/write engine together into
//! the public `format`/`mount`/`create`/`delete`/`getsize`/`read`/`write`
//! API, plus the debug reporter (C8).
//!
//! There is no explicit "unmounted" value and no explicit unmount call: a
//! [`Filesystem`] simply owns its [`Disk`] and its [`FreeBlockBitmap`] for as
//! long as it's alive, and both are dropped together when it goes out of
//! scope. The mount/unmount state machine the original source tracked with a
//! global `mounted` flag is, here, just "does a `Filesystem` value exist".

use crate::bitmap::FreeBlockBitmap;
use crate::disk::{Disk, BLOCK_SIZE};
use crate::error::Error;
use crate::inode::{InodeAccessor, InodeNumber};
use crate::layout::{decode_indirect_block, RawInode, SuperBlock, FS_MAGIC};
use crate::rw;

/// A mounted filesystem over some block device `D`.
///
/// Every operation other than [`Filesystem::format`] requires a live value
/// of this type, which can only be produced by [`Filesystem::mount`] — so a
/// caller can never accidentally operate on an unmounted device.
pub struct Filesystem<D: Disk> {
    disk: D,
    superblock: SuperBlock,
    bitmap: FreeBlockBitmap,
}

impl<D: Disk> Filesystem<D> {
    /// Formats `disk` for use as a simplefs device (§4.1): sizes the inode
    /// table per [`SuperBlock::for_device`], writes the superblock to block
    /// 0, and zeroes every inode-table slot. Destroys any data already on
    /// `disk`. Does not mount the result — call [`Filesystem::mount`]
    /// afterward to obtain a usable handle.
    pub fn format(disk: &D) -> Result<(), Error> {
        let nblocks = disk.size();
        let sb = SuperBlock::for_device(nblocks);
        log::info!(
            "formatting: {} blocks, {} inode blocks, {} inodes",
            sb.nblocks,
            sb.ninodeblocks,
            sb.ninodes
        );
        disk.write(0, &sb.encode())
            .map_err(|_| Error::Io("writing superblock"))?;
        let zeroed = [0u8; BLOCK_SIZE];
        for b in 1..=sb.ninodeblocks {
            disk.write(b, &zeroed)
                .map_err(|_| Error::Io("zeroing inode table"))?;
        }
        Ok(())
    }

    /// Mounts `disk`: reads and validates the superblock, then rebuilds the
    /// free-block bitmap by scanning the inode table (§4.3). Fails with
    /// [`Error::BadMagic`] if `disk` was never formatted (or its superblock
    /// is corrupt).
    pub fn mount(disk: D) -> Result<Self, Error> {
        let mut block = [0u8; BLOCK_SIZE];
        disk.read(0, &mut block)
            .map_err(|_| Error::Io("reading superblock"))?;
        let superblock = SuperBlock::decode(&block);
        if superblock.magic != FS_MAGIC {
            return Err(Error::BadMagic);
        }
        let bitmap = FreeBlockBitmap::rebuild(&disk, &superblock)?;
        log::info!(
            "mounted: {} blocks, {} inodes, {} free",
            superblock.nblocks,
            superblock.ninodes,
            (0..superblock.nblocks).filter(|&b| !bitmap.is_occupied(b)).count()
        );
        Ok(Self {
            disk,
            superblock,
            bitmap,
        })
    }

    /// Resolves `raw` to an [`InodeNumber`] and its current on-disk record,
    /// failing with [`Error::InvalidInumber`] if `raw` is out of range or
    /// names a currently-unallocated slot.
    fn load_valid(&self, raw: u32) -> Result<(InodeNumber, RawInode), Error> {
        let accessor = InodeAccessor::new(&self.disk, &self.superblock);
        let n = accessor
            .validate_range(raw)
            .ok_or(Error::InvalidInumber(raw))?;
        let inode = accessor.load(n)?;
        if !inode.valid {
            return Err(Error::InvalidInumber(raw));
        }
        Ok((n, inode))
    }

    /// Allocates a fresh inode (§4.2): the first invalid slot, scanning
    /// ascending from inumber 1, becomes valid with size 0 and no block
    /// pointers. Fails with [`Error::NoSpace`] if every slot is in use.
    pub fn create(&mut self) -> Result<InodeNumber, Error> {
        let accessor = InodeAccessor::new(&self.disk, &self.superblock);
        for n in accessor.all_inumbers() {
            let inode = accessor.load(n)?;
            if !inode.valid {
                let fresh = RawInode {
                    valid: true,
                    ..RawInode::empty()
                };
                accessor.store(n, &fresh)?;
                log::debug!("created inode {}", n.get());
                return Ok(n);
            }
        }
        Err(Error::NoSpace)
    }

    /// Releases every block `raw`'s inode owns — its direct blocks, its
    /// indirect block, and every block the indirect block points to — back
    /// to the bitmap, then marks the inode slot invalid.
    pub fn delete(&mut self, raw: u32) -> Result<(), Error> {
        let (n, inode) = self.load_valid(raw)?;

        for ptr in inode.direct.into_iter().flatten() {
            self.bitmap.release(ptr.get());
        }
        if let Some(indirect) = inode.indirect {
            let mut block = [0u8; BLOCK_SIZE];
            self.disk
                .read(indirect.get(), &mut block)
                .map_err(|_| Error::Io("reading indirect block"))?;
            for ptr in decode_indirect_block(&block).into_iter().flatten() {
                self.bitmap.release(ptr.get());
            }
            self.bitmap.release(indirect.get());
        }

        let accessor = InodeAccessor::new(&self.disk, &self.superblock);
        accessor.store(n, &RawInode::empty())?;
        log::debug!("deleted inode {}", raw);
        Ok(())
    }

    /// Returns `raw`'s current file size in bytes.
    pub fn getsize(&self, raw: u32) -> Result<u32, Error> {
        let (_, inode) = self.load_valid(raw)?;
        Ok(inode.size)
    }

    /// Reads up to `buf.len()` bytes from `raw` starting at `offset` (§4.5).
    pub fn read(&self, raw: u32, buf: &mut [u8], offset: u64) -> Result<usize, Error> {
        let (_, inode) = self.load_valid(raw)?;
        rw::read_file(&self.disk, &inode, buf, offset)
    }

    /// Writes `buf` into `raw` at `offset`, allocating blocks as needed
    /// (§4.5). Returns the number of bytes actually written, which is
    /// `buf.len()` unless the allocator runs out of space or the write
    /// would cross the addressable capacity limit.
    pub fn write(&mut self, raw: u32, buf: &[u8], offset: u64) -> Result<usize, Error> {
        let (n, mut inode) = self.load_valid(raw)?;
        let accessor = InodeAccessor::new(&self.disk, &self.superblock);
        let written = rw::write_file(&self.disk, &mut self.bitmap, &mut inode, buf, offset)?;
        accessor.store(n, &inode)?;
        log::trace!("wrote {} bytes to inode {} at offset {}", written, raw, offset);
        Ok(written)
    }

    /// Builds a snapshot report of every allocated inode (C8), for
    /// diagnostics or a driver's `debug` command. Never printed directly by
    /// this crate — callers decide where `Display`'s output goes.
    pub fn debug(&self) -> Result<DebugReport, Error> {
        let accessor = InodeAccessor::new(&self.disk, &self.superblock);
        let mut inodes = Vec::new();
        for n in accessor.all_inumbers() {
            let inode = accessor.load(n)?;
            if !inode.valid {
                continue;
            }
            let direct: Vec<u32> = inode.direct.into_iter().flatten().map(|p| p.get()).collect();
            let mut indirect_pointers = Vec::new();
            if let Some(indirect) = inode.indirect {
                let mut block = [0u8; BLOCK_SIZE];
                self.disk
                    .read(indirect.get(), &mut block)
                    .map_err(|_| Error::Io("reading indirect block"))?;
                indirect_pointers = decode_indirect_block(&block)
                    .into_iter()
                    .flatten()
                    .map(|p| p.get())
                    .collect();
            }
            inodes.push(InodeReport {
                inumber: n.get(),
                size: inode.size,
                direct,
                indirect: inode.indirect.map(|p| p.get()),
                indirect_pointers,
            });
        }
        Ok(DebugReport {
            superblock: self.superblock,
            free_blocks: (0..self.superblock.nblocks)
                .filter(|&b| !self.bitmap.is_occupied(b))
                .count(),
            inodes,
        })
    }
}

/// One inode's worth of information in a [`DebugReport`].
#[derive(Debug, Clone)]
pub struct InodeReport {
    pub inumber: u32,
    pub size: u32,
    pub direct: Vec<u32>,
    pub indirect: Option<u32>,
    pub indirect_pointers: Vec<u32>,
}

/// A point-in-time snapshot of a mounted filesystem's metadata, as produced
/// by [`Filesystem::debug`]. Mirrors the original source's `fs_debug`
/// console dump, but as a value the caller can format, log, or inspect in
/// a test — this crate never writes to stdout itself.
#[derive(Debug, Clone)]
pub struct DebugReport {
    pub superblock: SuperBlock,
    pub free_blocks: usize,
    pub inodes: Vec<InodeReport>,
}

impl std::fmt::Display for DebugReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "superblock:")?;
        writeln!(f, "    {} blocks", self.superblock.nblocks)?;
        writeln!(f, "    {} inode blocks", self.superblock.ninodeblocks)?;
        writeln!(f, "    {} inodes", self.superblock.ninodes)?;
        writeln!(f, "    {} free blocks", self.free_blocks)?;
        for inode in &self.inodes {
            writeln!(f, "inode {}:", inode.inumber)?;
            writeln!(f, "    size: {} bytes", inode.size)?;
            if !inode.direct.is_empty() {
                let list = inode
                    .direct
                    .iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                writeln!(f, "    direct blocks: {}", list)?;
            }
            if let Some(indirect) = inode.indirect {
                writeln!(f, "    indirect block: {}", indirect)?;
                if !inode.indirect_pointers.is_empty() {
                    let list = inode
                        .indirect_pointers
                        .iter()
                        .map(u32::to_string)
                        .collect::<Vec<_>>()
                        .join(" ");
                    writeln!(f, "    indirect data blocks: {}", list)?;
                }
            }
        }
        Ok(())
    }
}
