// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Core type definitions for the virtual filesystem

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::Serialize;

/// Block size reported for every inode.
pub const BLOCK_SIZE: u64 = 4096;

/// First descriptor number handed out. 0 through 2 stay reserved for the
/// stdio descriptors the guest runtime already holds.
pub const FIRST_FD: u64 = 3;

/// Mode bits reported for directories.
pub const DIR_MODE: u32 = (libc::S_IFDIR | 0o755) as u32;

/// Mode bits reported for regular files.
pub const FILE_MODE: u32 = (libc::S_IFREG | 0o644) as u32;

/// Millisecond wall-clock timestamp that never decreases within the process,
/// even if the system clock steps backwards.
pub fn now_millis() -> i64 {
    static LAST: AtomicI64 = AtomicI64::new(0);
    let wall = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0);
    let prev = LAST.fetch_max(wall, Ordering::SeqCst);
    wall.max(prev)
}

/// File timestamps in milliseconds since the epoch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FileTimes {
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub birthtime: i64,
}

impl FileTimes {
    pub fn stamp_now() -> Self {
        let now = now_millis();
        Self {
            atime: now,
            mtime: now,
            ctime: now,
            birthtime: now,
        }
    }
}

/// Kind of entry a path resolves to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum InodeKind {
    Directory,
    RegularFile,
}

/// A single entry in the virtual inode table, keyed by absolute path
#[derive(Clone, Debug)]
pub struct Inode {
    pub kind: InodeKind,
    pub mode: u32,
    pub ino: u64,
    pub times: FileTimes,
    /// File payload. The buffer is shared, so materialized blobs are
    /// referenced rather than copied.
    pub content: Bytes,
}

impl Inode {
    pub fn directory(ino: u64) -> Self {
        Self {
            kind: InodeKind::Directory,
            mode: DIR_MODE,
            ino,
            times: FileTimes::stamp_now(),
            content: Bytes::new(),
        }
    }

    pub fn file(ino: u64, content: Bytes) -> Self {
        Self {
            kind: InodeKind::RegularFile,
            mode: FILE_MODE,
            ino,
            times: FileTimes::stamp_now(),
            content,
        }
    }

    /// Directories report one block of 4096 bytes, files their payload size.
    pub fn size(&self) -> u64 {
        match self.kind {
            InodeKind::Directory => BLOCK_SIZE,
            InodeKind::RegularFile => self.content.len() as u64,
        }
    }

    pub fn blocks(&self) -> u64 {
        match self.kind {
            InodeKind::Directory => 1,
            InodeKind::RegularFile => (self.content.len() as u64).div_ceil(BLOCK_SIZE),
        }
    }

    pub fn nlink(&self) -> u32 {
        match self.kind {
            InodeKind::Directory => 2,
            InodeKind::RegularFile => 1,
        }
    }

    /// Attribute snapshot in the shape `stat`/`fstat` replies use.
    pub fn stat(&self) -> StatRecord {
        StatRecord {
            dev: 0,
            ino: self.ino,
            mode: self.mode,
            nlink: self.nlink(),
            uid: 0,
            gid: 0,
            rdev: 0,
            size: self.size(),
            blksize: BLOCK_SIZE,
            blocks: self.blocks(),
            atime_ms: self.times.atime,
            mtime_ms: self.times.mtime,
            ctime_ms: self.times.ctime,
            birthtime_ms: self.times.birthtime,
        }
    }
}

/// Stat reply as the guest runtime's filesystem layer expects it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StatRecord {
    pub dev: u64,
    pub ino: u64,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u64,
    pub size: u64,
    pub blksize: u64,
    pub blocks: u64,
    pub atime_ms: i64,
    pub mtime_ms: i64,
    pub ctime_ms: i64,
    pub birthtime_ms: i64,
}

impl StatRecord {
    pub fn is_directory(&self) -> bool {
        self.mode & (libc::S_IFMT as u32) == libc::S_IFDIR as u32
    }

    pub fn is_file(&self) -> bool {
        self.mode & (libc::S_IFMT as u32) == libc::S_IFREG as u32
    }
}

/// An open file handle: the path it was opened against plus the cursor used
/// by sequential reads
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Descriptor {
    pub fd: u64,
    pub path: String,
    pub cursor: u64,
}
