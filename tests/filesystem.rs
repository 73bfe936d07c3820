//! Whole-crate scenarios exercising `Filesystem` as a caller would: format,
//! mount, create/write/read/delete, and a remount to check the bitmap
//! rebuild is stable across it.

use simplefs::disk::MemoryDisk;
use simplefs::error::Error;
use simplefs::fs::Filesystem;

fn init_logging() {
    let _ = env_logger::Builder::from_default_env().is_test(true).try_init();
}

fn mounted(nblocks: u32) -> Filesystem<MemoryDisk> {
    init_logging();
    let disk = MemoryDisk::new(nblocks);
    Filesystem::format(&disk).unwrap();
    Filesystem::mount(disk).unwrap()
}

#[test]
fn fresh_device_mounts_with_no_inodes_allocated() {
    let fs = mounted(50);
    assert!(matches!(fs.getsize(1), Err(Error::InvalidInumber(1))));
}

#[test]
fn created_files_get_sequential_inumbers_starting_at_one() {
    let mut fs = mounted(50);
    let a = fs.create().unwrap();
    let b = fs.create().unwrap();
    let c = fs.create().unwrap();
    assert_eq!([a.get(), b.get(), c.get()], [1, 2, 3]);
}

#[test]
fn write_past_end_extends_size_overwrite_within_end_does_not() {
    let mut fs = mounted(50);
    let n = fs.create().unwrap().get();

    fs.write(n, b"0123456789", 0).unwrap();
    assert_eq!(fs.getsize(n).unwrap(), 10);

    fs.write(n, b"ab", 3).unwrap();
    assert_eq!(fs.getsize(n).unwrap(), 10);
    let mut buf = [0u8; 10];
    fs.read(n, &mut buf, 0).unwrap();
    assert_eq!(&buf, b"012ab56789");

    fs.write(n, b"XY", 9).unwrap();
    assert_eq!(fs.getsize(n).unwrap(), 11);
}

#[test]
fn a_large_file_spans_direct_and_indirect_blocks_and_reads_back_whole() {
    let mut fs = mounted(2000);
    let n = fs.create().unwrap().get();

    let data: Vec<u8> = (0..20_000u32).map(|i| (i % 256) as u8).collect();
    let written = fs.write(n, &data, 0).unwrap();
    assert_eq!(written, data.len());
    assert_eq!(fs.getsize(n).unwrap() as usize, data.len());

    let mut buf = vec![0u8; data.len()];
    let read = fs.read(n, &mut buf, 0).unwrap();
    assert_eq!(read, data.len());
    assert_eq!(buf, data);
}

#[test]
fn reading_a_partial_range_in_the_middle_of_a_file_works() {
    let mut fs = mounted(50);
    let n = fs.create().unwrap().get();
    let data: Vec<u8> = (0..10_000u32).map(|i| (i % 256) as u8).collect();
    fs.write(n, &data, 0).unwrap();

    let mut buf = [0u8; 100];
    fs.read(n, &mut buf, 4096 + 50).unwrap();
    assert_eq!(&buf[..], &data[4096 + 50..4096 + 150]);
}

#[test]
fn deleting_and_recreating_reuses_the_lowest_inumber_and_zeroes_state() {
    let mut fs = mounted(50);
    let a = fs.create().unwrap().get();
    fs.write(a, b"stale data", 0).unwrap();
    let b = fs.create().unwrap().get();
    fs.delete(a).unwrap();

    let reused = fs.create().unwrap().get();
    assert_eq!(reused, a);
    assert_eq!(fs.getsize(reused).unwrap(), 0);
    assert_ne!(reused, b);
}

#[test]
fn deleted_blocks_become_available_to_other_files() {
    // 1 superblock + 1 inode block + 3 data blocks: just enough for one
    // 3-block file at a time.
    let mut fs = mounted(5);
    let a = fs.create().unwrap().get();
    let filler = vec![0x9u8; 3 * simplefs::disk::BLOCK_SIZE];
    assert_eq!(fs.write(a, &filler, 0).unwrap(), filler.len());

    let b = fs.create().unwrap().get();
    // No space left: the device is full, so this should come back short.
    assert_eq!(fs.write(b, &filler, 0).unwrap(), 0);

    fs.delete(a).unwrap();
    assert_eq!(fs.write(b, &filler, 0).unwrap(), filler.len());
}

#[test]
fn two_identically_built_filesystems_report_identical_free_space() {
    // `Filesystem` intentionally doesn't hand its `Disk` back out once
    // mounted — the only way to observe the bitmap from outside the crate
    // is through `debug()`. This checks that rebuilding the bitmap from
    // scratch (as `mount` always does) is deterministic given the same
    // on-disk state, by reproducing that state on a second device.
    let mut fs = mounted(200);
    let n = fs.create().unwrap().get();
    fs.write(n, &vec![1u8; 50_000], 0).unwrap();
    let report_a = fs.debug().unwrap();

    let mut fs2 = mounted(200);
    let n2 = fs2.create().unwrap().get();
    fs2.write(n2, &vec![1u8; 50_000], 0).unwrap();
    let report_b = fs2.debug().unwrap();

    assert_eq!(report_a.free_blocks, report_b.free_blocks);
    assert_eq!(report_a.inodes.len(), report_b.inodes.len());
}

#[test]
fn debug_report_formats_as_text() {
    let mut fs = mounted(50);
    let n = fs.create().unwrap().get();
    fs.write(n, b"hi", 0).unwrap();
    let text = fs.debug().unwrap().to_string();
    assert!(text.contains("inode 1:"));
    assert!(text.contains("size: 2 bytes"));
}

#[test]
fn random_payloads_of_varying_size_round_trip_through_write_and_read() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut fs = mounted(400);
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);

    for _ in 0..8 {
        let n = fs.create().unwrap().get();
        let len = rng.gen_range(1..=6000usize);
        let data: Vec<u8> = (0..len).map(|_| rng.r#gen::<u8>()).collect();

        let written = fs.write(n, &data, 0).unwrap();
        assert_eq!(written, data.len());
        assert_eq!(fs.getsize(n).unwrap() as usize, data.len());

        let mut buf = vec![0u8; len];
        let read = fs.read(n, &mut buf, 0).unwrap();
        assert_eq!(read, data.len());
        assert_eq!(buf, data);

        fs.delete(n).unwrap();
    }
}

