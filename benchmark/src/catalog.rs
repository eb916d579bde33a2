// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Catalog of filesystem operations with their optimal write cost.
//!
//! Each [`BenchmarkCase`] names one operation, an optional untimed `prepare`
//! step, and the minimum number of bytes a single-copy/single-pointer
//! copy-on-write filesystem must persist to carry it out. The costs are worked
//! out by hand from the BPFS on-disk structures; the breakdown next to each
//! entry lists the fields that have to change.
//!
//! Cases run against an otherwise empty filesystem whose root is the mount
//! point passed to the operation. Files are named `a`, `b` and `c` and filled
//! with ASCII `'0'`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::{FileExt, PermissionsExt};
use std::path::Path;

/// An operation performed against the filesystem mounted at the given path.
pub type Operation = fn(&Path) -> io::Result<()>;

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;

/// Large files are written in chunks of this size.
const FILL_CHUNK: usize = 16 * KIB;

/// Block size of the filesystem under test.
const BLOCK: u64 = 4096;

/// One operation under test.
#[derive(Debug, Clone, Copy)]
pub struct BenchmarkCase {
    pub name: &'static str,
    /// Theoretical minimum bytes persisted by `run`.
    pub optimal_bytes: u64,
    /// Untimed setup, run in its own mount before the measured one.
    pub prepare: Option<Operation>,
    /// The measured operation.
    pub run: Operation,
}

/// Registry of benchmark cases, in ascending name order.
#[derive(Debug, Clone, Copy)]
pub struct BenchmarkCatalog {
    cases: &'static [BenchmarkCase],
}

impl BenchmarkCatalog {
    /// The built-in catalog.
    pub fn builtin() -> Self {
        Self { cases: &CATALOG }
    }

    /// Every case, in catalog order.
    pub fn all(&self) -> &'static [BenchmarkCase] {
        self.cases
    }

    pub fn get(&self, name: &str) -> Option<&'static BenchmarkCase> {
        self.cases.iter().find(|case| case.name == name)
    }

    /// The requested cases in catalog order, each at most once.
    ///
    /// Names with no matching case are left out; see [`Self::unknown`].
    pub fn lookup<S: AsRef<str>>(&self, names: &[S]) -> Vec<&'static BenchmarkCase> {
        self.cases
            .iter()
            .filter(|case| names.iter().any(|name| name.as_ref() == case.name))
            .collect()
    }

    /// The requested names that match no case.
    pub fn unknown<'a, S: AsRef<str>>(&self, names: &'a [S]) -> Vec<&'a str> {
        names
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| self.get(name).is_none())
            .collect()
    }
}

impl Default for BenchmarkCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

// ============================================================================
// Catalog
// ============================================================================

// Sizes below are in bytes. "cmtime" is an inode's ctime and mtime (4 bytes
// each); an inode is ino(8) + 4 x 4-byte fields + 3 x 8-byte fields + 3 x
// 4-byte times.
const INODE: u64 = 8 + 4 + 4 + 4 + 4 + 8 + 8 + 8 + 3 * 4;
/// rec_len(2) + file_type(1) + name_len(2) + name(1)
const DIRENT_HEADER: u64 = 2 + 1 + 2 + 1;
/// Indirect block entries covering 128 KiB of data.
const INDIR_128K: u64 = 128 / 4 * 8;

static CATALOG: [BenchmarkCase; 29] = [
    // 128 KiB is the largest write FUSE forwards atomically.
    BenchmarkCase {
        name: "append_0B_128k",
        // data + indir + height + root + size + mtime
        optimal_bytes: 128 * 1024 + INDIR_128K + 8 + 8 + 8 + 4,
        prepare: Some(touch_a),
        run: append_a_128k,
    },
    BenchmarkCase {
        name: "append_0B_4k",
        // data + root + size + mtime
        optimal_bytes: BLOCK + 8 + 8 + 4,
        prepare: Some(touch_a),
        run: append_a_4k,
    },
    BenchmarkCase {
        name: "append_0B_8B",
        // data + root + size + mtime
        optimal_bytes: 8 + 8 + 8 + 4,
        prepare: Some(touch_a),
        run: append_a_8b,
    },
    BenchmarkCase {
        name: "append_2M_128k",
        // data + indir1 + indir0 + root addr/height + size + mtime
        optimal_bytes: 128 * 1024 + INDIR_128K + 2 * 8 + 8 + 8 + 4,
        prepare: Some(fill_a_2m),
        run: append_a_128k,
    },
    BenchmarkCase {
        name: "append_2M_4k",
        // data + new root + old root + indir0 + indir1 + size + mtime
        optimal_bytes: BLOCK + 8 + 8 + 8 + 8 + 8 + 4,
        prepare: Some(fill_a_2m),
        run: append_a_4k,
    },
    BenchmarkCase {
        name: "append_8B_8B",
        // data + size + mtime
        optimal_bytes: 8 + 8 + 4,
        prepare: Some(fill_a_8b),
        run: append_a_8b,
    },
    BenchmarkCase {
        name: "chmod",
        // mode + ctime
        optimal_bytes: 4 + 4,
        prepare: Some(touch_a),
        run: chmod_a,
    },
    BenchmarkCase {
        name: "create",
        // dirent + inode + cmtime + dirent.file_type + dirent.ino
        optimal_bytes: 4 + 1 + 2 + INODE + 4 + 4 + 1 + 8,
        prepare: None,
        run: touch_a,
    },
    BenchmarkCase {
        name: "empty",
        optimal_bytes: 0,
        prepare: None,
        run: nothing,
    },
    BenchmarkCase {
        name: "link",
        // dirent + cmtime + nlinks + ctime + dirent.file_type + dirent.ino
        optimal_bytes: 4 + 1 + 2 + 8 + 4 + 4 + 1 + 8,
        prepare: Some(touch_a),
        run: link_a_b,
    },
    BenchmarkCase {
        name: "mkdir",
        // dirent + inode + cmtime + root + nlinks + nbytes + rec_len
        //   + dirent.file_type + parent nlinks + dirent.ino
        optimal_bytes: 4 + 1 + 2 + INODE + 4 + 4 + 8 + 4 + 8 + 2 + 1 + 4 + 8,
        prepare: None,
        run: mkdir_a,
    },
    BenchmarkCase {
        name: "read",
        // atime
        optimal_bytes: 4,
        prepare: Some(touch_a),
        run: read_a,
    },
    BenchmarkCase {
        name: "readdir",
        // atime + atime
        optimal_bytes: 4 + 4,
        prepare: None,
        run: list_root,
    },
    BenchmarkCase {
        name: "rename_clobber",
        // inos + dirents + inode root + cmtime
        optimal_bytes: 2 * 8 + BLOCK + 8 + 2 * 4,
        prepare: Some(touch_a_b),
        run: rename_a_b,
    },
    BenchmarkCase {
        name: "rename_inter",
        // inos + dirents + inode roots + inode root addr + cmtimes + rec_len + dirent
        optimal_bytes: 2 * 8 + 2 * BLOCK + BLOCK + 2 * 8 + 8 + 4 * 4 + 2 + DIRENT_HEADER,
        prepare: Some(mkdir_a_b_touch_a_c),
        run: rename_a_c_b_c,
    },
    BenchmarkCase {
        name: "rename_intra",
        // inos + dirents + inode root + cmtime + rec_len + dirent
        optimal_bytes: 2 * 8 + BLOCK + 8 + 2 * 4 + 2 + DIRENT_HEADER,
        prepare: Some(touch_a),
        run: rename_a_b,
    },
    BenchmarkCase {
        name: "rmdir",
        // nlinks + dirent.ino + cmtime
        optimal_bytes: 4 + 8 + 8,
        prepare: Some(mkdir_a),
        run: rmdir_a,
    },
    BenchmarkCase {
        name: "unlink_0B",
        // dirent.ino + cmtime
        optimal_bytes: 8 + 8,
        prepare: Some(touch_a),
        run: unlink_a,
    },
    BenchmarkCase {
        name: "unlink_16M",
        // dirent.ino + cmtime
        optimal_bytes: 8 + 8,
        prepare: Some(fill_a_16m),
        run: unlink_a,
    },
    BenchmarkCase {
        name: "unlink_1M",
        // dirent.ino + cmtime
        optimal_bytes: 8 + 8,
        prepare: Some(fill_a_1m),
        run: unlink_a,
    },
    BenchmarkCase {
        name: "unlink_4k",
        // dirent.ino + cmtime
        optimal_bytes: 8 + 8,
        prepare: Some(fill_a_4k),
        run: unlink_a,
    },
    BenchmarkCase {
        name: "unlink_hardlink",
        // dirent.ino + cmtime + nlinks + ctime
        optimal_bytes: 8 + 8 + 4 + 4,
        prepare: Some(touch_a_link_b),
        run: unlink_a,
    },
    BenchmarkCase {
        name: "write_1M_124k_1",
        // data CoW + data + indir + indir CoW + root + mtime
        optimal_bytes: 1 + 4095 + 124 * 1024 + INDIR_128K + BLOCK + 8 + 4,
        prepare: Some(fill_a_1m),
        run: overwrite_a_124k_at_1,
    },
    BenchmarkCase {
        name: "write_1M_128k",
        // data + indir + indir CoW + root + mtime
        optimal_bytes: 128 * 1024 + INDIR_128K + BLOCK + 8 + 4,
        prepare: Some(fill_a_1m),
        run: overwrite_a_128k,
    },
    BenchmarkCase {
        name: "write_1M_16B",
        // data CoW + indir + data + mtime
        optimal_bytes: BLOCK - 16 + 8 + 16 + 4,
        prepare: Some(fill_a_1m),
        run: overwrite_a_16b,
    },
    BenchmarkCase {
        name: "write_1M_4k",
        // data + indir + mtime
        optimal_bytes: BLOCK + 8 + 4,
        prepare: Some(fill_a_1m),
        run: overwrite_a_4k,
    },
    BenchmarkCase {
        name: "write_1M_4k_1",
        // data CoW + data + indir CoW + indir + mtime
        optimal_bytes: 2 * BLOCK - BLOCK + BLOCK + BLOCK + 2 * 8 + 8 + 4,
        prepare: Some(fill_a_1m),
        run: overwrite_a_4k_at_1,
    },
    BenchmarkCase {
        name: "write_1M_8B",
        // data + mtime
        optimal_bytes: 8 + 4,
        prepare: Some(fill_a_1m),
        run: overwrite_a_8b,
    },
    BenchmarkCase {
        name: "write_1M_8B_4092",
        // data CoW + data + indir CoW + indir + mtime
        optimal_bytes: 2 * BLOCK - 8 + 8 + BLOCK + 2 * 8 + 8 + 4,
        prepare: Some(fill_a_1m),
        run: overwrite_a_8b_at_4092,
    },
];

// ============================================================================
// File helpers
// ============================================================================

fn touch(path: &Path) -> io::Result<()> {
    File::create(path).map(drop)
}

/// Create `path` holding `len` ASCII '0' bytes, written in 16 KiB chunks.
fn fill(path: &Path, len: usize) -> io::Result<()> {
    let chunk = [b'0'; FILL_CHUNK];
    let mut file = File::create(path)?;
    let mut remaining = len;
    while remaining > 0 {
        let n = remaining.min(FILL_CHUNK);
        file.write_all(&chunk[..n])?;
        remaining -= n;
    }
    Ok(())
}

/// Append `len` bytes in a single write.
fn append(path: &Path, len: usize) -> io::Result<()> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(&vec![b'0'; len])
}

/// Overwrite `len` bytes at `offset` in a single positioned write.
fn overwrite(path: &Path, offset: u64, len: usize) -> io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.write_all_at(&vec![b'0'; len], offset)
}

// ============================================================================
// Operations
// ============================================================================

fn nothing(_mnt: &Path) -> io::Result<()> {
    Ok(())
}

fn touch_a(mnt: &Path) -> io::Result<()> {
    touch(&mnt.join("a"))
}

fn touch_a_b(mnt: &Path) -> io::Result<()> {
    touch(&mnt.join("a"))?;
    touch(&mnt.join("b"))
}

fn touch_a_link_b(mnt: &Path) -> io::Result<()> {
    touch_a(mnt)?;
    link_a_b(mnt)
}

fn fill_a_8b(mnt: &Path) -> io::Result<()> {
    fill(&mnt.join("a"), 8)
}

fn fill_a_4k(mnt: &Path) -> io::Result<()> {
    fill(&mnt.join("a"), 4 * KIB)
}

fn fill_a_1m(mnt: &Path) -> io::Result<()> {
    fill(&mnt.join("a"), MIB)
}

fn fill_a_2m(mnt: &Path) -> io::Result<()> {
    fill(&mnt.join("a"), 2 * MIB)
}

fn fill_a_16m(mnt: &Path) -> io::Result<()> {
    fill(&mnt.join("a"), 16 * MIB)
}

fn append_a_8b(mnt: &Path) -> io::Result<()> {
    append(&mnt.join("a"), 8)
}

fn append_a_4k(mnt: &Path) -> io::Result<()> {
    append(&mnt.join("a"), 4 * KIB)
}

fn append_a_128k(mnt: &Path) -> io::Result<()> {
    append(&mnt.join("a"), 128 * KIB)
}

fn overwrite_a_8b(mnt: &Path) -> io::Result<()> {
    overwrite(&mnt.join("a"), 0, 8)
}

/// Straddles the first block boundary.
fn overwrite_a_8b_at_4092(mnt: &Path) -> io::Result<()> {
    overwrite(&mnt.join("a"), BLOCK - 4, 8)
}

fn overwrite_a_16b(mnt: &Path) -> io::Result<()> {
    overwrite(&mnt.join("a"), 0, 16)
}

fn overwrite_a_4k(mnt: &Path) -> io::Result<()> {
    overwrite(&mnt.join("a"), 0, 4 * KIB)
}

fn overwrite_a_4k_at_1(mnt: &Path) -> io::Result<()> {
    overwrite(&mnt.join("a"), 1, 4 * KIB)
}

fn overwrite_a_128k(mnt: &Path) -> io::Result<()> {
    overwrite(&mnt.join("a"), 0, 128 * KIB)
}

fn overwrite_a_124k_at_1(mnt: &Path) -> io::Result<()> {
    overwrite(&mnt.join("a"), 1, 124 * KIB)
}

fn chmod_a(mnt: &Path) -> io::Result<()> {
    fs::set_permissions(mnt.join("a"), fs::Permissions::from_mode(0o600))
}

fn link_a_b(mnt: &Path) -> io::Result<()> {
    fs::hard_link(mnt.join("a"), mnt.join("b"))
}

fn unlink_a(mnt: &Path) -> io::Result<()> {
    fs::remove_file(mnt.join("a"))
}

fn mkdir_a(mnt: &Path) -> io::Result<()> {
    fs::create_dir(mnt.join("a"))
}

fn rmdir_a(mnt: &Path) -> io::Result<()> {
    fs::remove_dir(mnt.join("a"))
}

fn mkdir_a_b_touch_a_c(mnt: &Path) -> io::Result<()> {
    fs::create_dir(mnt.join("a"))?;
    fs::create_dir(mnt.join("b"))?;
    touch(&mnt.join("a").join("c"))
}

fn rename_a_b(mnt: &Path) -> io::Result<()> {
    fs::rename(mnt.join("a"), mnt.join("b"))
}

fn rename_a_c_b_c(mnt: &Path) -> io::Result<()> {
    fs::rename(mnt.join("a").join("c"), mnt.join("b").join("c"))
}

fn read_a(mnt: &Path) -> io::Result<()> {
    let mut byte = [0u8; 1];
    File::open(mnt.join("a"))?.read(&mut byte).map(drop)
}

fn list_root(mnt: &Path) -> io::Result<()> {
    for entry in fs::read_dir(mnt)? {
        entry?;
    }
    Ok(())
}
