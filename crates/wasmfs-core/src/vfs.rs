// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Virtual inode and descriptor tables

use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use tracing::debug;

use crate::error::{FsError, FsResult};
use crate::types::{Descriptor, Inode, InodeKind, StatRecord, FIRST_FD};

/// In-memory filesystem state shared between the bootstrap materializer and
/// the guest syscall surface. Operations are synchronous map updates behind
/// mutexes; callers hold the value behind an `Arc`.
pub struct VirtualFs {
    inodes: Mutex<HashMap<String, Inode>>,
    descriptors: Mutex<HashMap<u64, Descriptor>>,
    next_fd: Mutex<u64>,
    next_ino: Mutex<u64>,
}

impl VirtualFs {
    pub fn new() -> Self {
        Self {
            inodes: Mutex::new(HashMap::new()),
            descriptors: Mutex::new(HashMap::new()),
            next_fd: Mutex::new(FIRST_FD),
            next_ino: Mutex::new(1),
        }
    }

    fn allocate_ino(&self) -> u64 {
        let mut next = self.next_ino.lock().unwrap();
        let ino = *next;
        *next += 1;
        ino
    }

    /// Register a directory inode at `path`, replacing whatever held the
    /// path before. Never fails.
    pub fn create_directory(&self, path: &str) {
        let inode = Inode::directory(self.allocate_ino());
        debug!(operation = "vfs_mkdir", path = %path, "registering directory inode");
        self.inodes.lock().unwrap().insert(path.to_string(), inode);
    }

    /// Register or replace a regular file inode at `path`. The content
    /// buffer is shared, not copied. Never fails.
    pub fn create_or_replace_file(&self, path: &str, content: Bytes) {
        let inode = Inode::file(self.allocate_ino(), content);
        debug!(
            operation = "vfs_write_file",
            path = %path,
            size = %inode.size(),
            "registering file inode"
        );
        self.inodes.lock().unwrap().insert(path.to_string(), inode);
    }

    /// Look up the inode registered at `path` without side effects.
    pub fn lookup(&self, path: &str) -> FsResult<Inode> {
        self.inodes.lock().unwrap().get(path).cloned().ok_or(FsError::NotFound)
    }

    pub fn stat(&self, path: &str) -> FsResult<StatRecord> {
        Ok(self.lookup(path)?.stat())
    }

    /// Allocate a descriptor for an existing regular file. Numbers start at
    /// [`FIRST_FD`] and are never reused within the process lifetime, even
    /// after close.
    pub fn open(&self, path: &str) -> FsResult<u64> {
        let inode = self.lookup(path)?;
        if inode.kind != InodeKind::RegularFile {
            return Err(FsError::NotFound);
        }
        let fd = {
            let mut next = self.next_fd.lock().unwrap();
            let fd = *next;
            *next += 1;
            fd
        };
        let descriptor = Descriptor {
            fd,
            path: path.to_string(),
            cursor: 0,
        };
        self.descriptors.lock().unwrap().insert(fd, descriptor);
        debug!(operation = "vfs_open", path = %path, fd = %fd, "descriptor allocated");
        Ok(fd)
    }

    /// Drop a descriptor. Unknown descriptors are ignored, so close is
    /// idempotent.
    pub fn close(&self, fd: u64) {
        self.descriptors.lock().unwrap().remove(&fd);
    }

    pub fn descriptor(&self, fd: u64) -> FsResult<Descriptor> {
        self.descriptors.lock().unwrap().get(&fd).cloned().ok_or(FsError::BadDescriptor)
    }

    /// Move a descriptor's sequential-read cursor forward.
    pub fn advance_cursor(&self, fd: u64, by: u64) -> FsResult<()> {
        let mut descriptors = self.descriptors.lock().unwrap();
        let descriptor = descriptors.get_mut(&fd).ok_or(FsError::BadDescriptor)?;
        descriptor.cursor += by;
        Ok(())
    }

    /// Number of live descriptors.
    pub fn open_descriptors(&self) -> usize {
        self.descriptors.lock().unwrap().len()
    }

    /// Number of registered inodes.
    pub fn inode_count(&self) -> usize {
        self.inodes.lock().unwrap().len()
    }
}

impl Default for VirtualFs {
    fn default() -> Self {
        Self::new()
    }
}
