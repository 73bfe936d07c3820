//! The structured error type shared by every fallible operation in this crate.

/// Everything that can go wrong while formatting, mounting, or operating on
/// a [`Filesystem`](crate::fs::Filesystem).
///
/// Every public, fallible method in this crate returns `Result<_, Error>`.
/// No variant is swallowed silently except the two no-op cases the spec
/// calls out explicitly: a zero-length write and releasing an
/// already-free block, neither of which reaches this type at all.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A data operation (`create`, `delete`, `getsize`, `read`, `write`,
    /// `debug_report`) was attempted before `mount` succeeded.
    #[error("filesystem is not mounted")]
    NotMounted,

    /// `format` (or a second `mount`) was attempted on an already-mounted
    /// filesystem.
    #[error("filesystem is already mounted")]
    AlreadyMounted,

    /// The superblock's magic number didn't match [`FS_MAGIC`](crate::layout::FS_MAGIC).
    #[error("block 0 does not contain a valid simplefs superblock")]
    BadMagic,

    /// An inumber was out of range, or pointed at an inode with `isvalid == 0`.
    #[error("inode {0} does not exist")]
    InvalidInumber(u32),

    /// The free-block bitmap has no block left to hand out.
    #[error("no free blocks remain")]
    NoSpace,

    /// A logical block index fell past `POINTERS_PER_INODE + POINTERS_PER_BLOCK`.
    #[error("logical block {0} exceeds the direct+indirect addressing range")]
    OutOfBounds(u64),

    /// An on-disk pointer violated an invariant that `size` implied should
    /// hold (e.g. a hole where the file's size says a block must exist).
    /// A well-formed image never reaches this; this crate doesn't implement
    /// an fsck pass that would repair it.
    #[error("filesystem metadata is inconsistent: {0}")]
    Corrupt(&'static str),

    /// The underlying [`Disk`](crate::disk::Disk) reported an I/O failure.
    /// The bitmap may be inconsistent after this; treat the filesystem as
    /// unreliable until remount.
    #[error("disk I/O error: {0}")]
    Io(&'static str),
}
