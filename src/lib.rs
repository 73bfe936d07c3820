//! A simple Unix-style inode filesystem over a fixed-size block device.
//!
//! The on-disk layout is intentionally small: a superblock in block 0, a
//! flat table of fixed-size inodes, and data blocks addressed through five
//! direct pointers plus one single-level indirect block per inode. There
//! are no directories, no permissions, no timestamps, and no journal —
//! files are named only by their inode number, and a caller builds
//! anything richer (naming, concurrency, a driver loop) on top.
//!
//! ```
//! use simplefs::{disk::MemoryDisk, fs::Filesystem};
//!
//! let disk = MemoryDisk::new(64);
//! Filesystem::format(&disk).unwrap();
//! let mut fs = Filesystem::mount(disk).unwrap();
//!
//! let inumber = fs.create().unwrap();
//! fs.write(inumber.get(), b"hello, simplefs", 0).unwrap();
//!
//! let mut buf = [0u8; 15];
//! fs.read(inumber.get(), &mut buf, 0).unwrap();
//! assert_eq!(&buf, b"hello, simplefs");
//! ```

pub mod bitmap;
pub mod disk;
pub mod error;
pub mod fs;
pub mod inode;
pub mod layout;
pub mod rw;

pub use error::Error;
pub use fs::Filesystem;
pub use inode::InodeNumber;
