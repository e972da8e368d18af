// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Syscall surface presented to the guest runtime
//!
//! The guest module is linked against a runtime that expects a Node-flavored
//! filesystem API. [`SyscallShim`] implements exactly the calls that runtime
//! issues while loading its SRS parameters, normalizing every failure into
//! [`SyscallError`] so the guest sees the POSIX codes it checks for.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::error::{FsError, SyscallError};
use crate::types::{InodeKind, StatRecord};
use crate::vfs::VirtualFs;

/// Capability object wired into the guest module's import table. One
/// instance per host; the bootstrap sequence hands the same capability to
/// every guest start.
pub trait GuestSyscalls: Send + Sync {
    /// Register a directory. The mode bits are recorded for the caller's
    /// benefit only and never enforced. Total.
    fn mkdir(&self, path: &str, mode: u32) -> Result<(), SyscallError>;

    fn stat(&self, path: &str) -> Result<StatRecord, SyscallError>;

    /// Open an existing regular file. Flags and mode are accepted for
    /// call-shape compatibility and ignored; everything opens readable.
    fn open(&self, path: &str, flags: u32, mode: u32) -> Result<u64, SyscallError>;

    /// Copy bytes from the file behind `fd` into `buf[offset..]`.
    ///
    /// The transfer count is the smallest of the requested `length`, the
    /// bytes remaining in the file from the effective position, and the room
    /// remaining in `buf` from `offset`. A count of zero is a successful
    /// end-of-file read. When `position` is given the descriptor cursor is
    /// left untouched; otherwise the read starts at the cursor and advances
    /// it by the transfer count.
    fn read(
        &self,
        fd: u64,
        buf: &mut [u8],
        offset: usize,
        length: usize,
        position: Option<u64>,
    ) -> Result<usize, SyscallError>;

    fn fstat(&self, fd: u64) -> Result<StatRecord, SyscallError>;

    /// Release a descriptor. Closing an unknown descriptor succeeds.
    fn close(&self, fd: u64) -> Result<(), SyscallError>;

    /// Whole-file read, used by the engine for small configuration blobs.
    fn read_file(&self, path: &str) -> Result<Bytes, SyscallError>;

    /// Whole-file write. Replaces whatever held the path. Total.
    fn write_file(&self, path: &str, data: Bytes) -> Result<(), SyscallError>;

    /// Working directory as reported to the guest. Falls back to `/` when
    /// the sandboxed host cannot answer.
    fn getcwd(&self) -> String;
}

/// [`GuestSyscalls`] over a shared [`VirtualFs`]
pub struct SyscallShim {
    fs: Arc<VirtualFs>,
}

impl SyscallShim {
    pub fn new(fs: Arc<VirtualFs>) -> Self {
        Self { fs }
    }

    pub fn fs(&self) -> &Arc<VirtualFs> {
        &self.fs
    }

    fn file_for_read(&self, fd: u64) -> Result<(String, Bytes, u64), SyscallError> {
        let descriptor =
            self.fs.descriptor(fd).map_err(|err| err.into_syscall("read", None))?;
        let inode = self
            .fs
            .lookup(&descriptor.path)
            .map_err(|_| FsError::BadDescriptor.into_syscall("read", Some(&descriptor.path)))?;
        if inode.kind != InodeKind::RegularFile {
            return Err(FsError::BadDescriptor.into_syscall("read", Some(&descriptor.path)));
        }
        Ok((descriptor.path, inode.content, descriptor.cursor))
    }
}

impl GuestSyscalls for SyscallShim {
    fn mkdir(&self, path: &str, mode: u32) -> Result<(), SyscallError> {
        debug!(operation = "shim_mkdir", path = %path, mode = %mode, "mkdir");
        self.fs.create_directory(path);
        Ok(())
    }

    fn stat(&self, path: &str) -> Result<StatRecord, SyscallError> {
        self.fs.stat(path).map_err(|err| err.into_syscall("stat", Some(path)))
    }

    fn open(&self, path: &str, _flags: u32, _mode: u32) -> Result<u64, SyscallError> {
        self.fs.open(path).map_err(|err| err.into_syscall("open", Some(path)))
    }

    fn read(
        &self,
        fd: u64,
        buf: &mut [u8],
        offset: usize,
        length: usize,
        position: Option<u64>,
    ) -> Result<usize, SyscallError> {
        let (path, content, cursor) = self.file_for_read(fd)?;

        let read_position = position.unwrap_or(cursor);
        let in_file = (content.len() as u64).saturating_sub(read_position);
        let in_buf = (buf.len() as u64).saturating_sub(offset as u64);
        let count = (length as u64).min(in_file).min(in_buf) as usize;
        if count == 0 {
            return Ok(0);
        }

        let start = read_position as usize;
        let src = content
            .get(start..start + count)
            .ok_or_else(|| {
                FsError::Io("source range escaped the file bounds".into())
                    .into_syscall("read", Some(&path))
            })?;
        let dst = buf.get_mut(offset..offset + count).ok_or_else(|| {
            FsError::Io("destination range escaped the buffer".into()).into_syscall("read", None)
        })?;
        dst.copy_from_slice(src);

        if position.is_none() {
            self.fs
                .advance_cursor(fd, count as u64)
                .map_err(|err| err.into_syscall("read", Some(&path)))?;
        }
        debug!(
            operation = "shim_read",
            fd = %fd,
            count = %count,
            positional = %position.is_some(),
            "read"
        );
        Ok(count)
    }

    fn fstat(&self, fd: u64) -> Result<StatRecord, SyscallError> {
        let descriptor =
            self.fs.descriptor(fd).map_err(|err| err.into_syscall("fstat", None))?;
        // The inode may have been replaced since open; any surviving entry,
        // directory included, still answers fstat. Only a vanished entry is
        // a bad descriptor.
        self.fs
            .stat(&descriptor.path)
            .map_err(|_| FsError::BadDescriptor.into_syscall("fstat", Some(&descriptor.path)))
    }

    fn close(&self, fd: u64) -> Result<(), SyscallError> {
        self.fs.close(fd);
        Ok(())
    }

    fn read_file(&self, path: &str) -> Result<Bytes, SyscallError> {
        let inode = self.fs.lookup(path).map_err(|err| err.into_syscall("open", Some(path)))?;
        if inode.kind != InodeKind::RegularFile {
            return Err(FsError::NotFound.into_syscall("open", Some(path)));
        }
        Ok(inode.content)
    }

    fn write_file(&self, path: &str, data: Bytes) -> Result<(), SyscallError> {
        debug!(operation = "shim_write_file", path = %path, size = %data.len(), "writeFile");
        self.fs.create_or_replace_file(path, data);
        Ok(())
    }

    fn getcwd(&self) -> String {
        std::env::current_dir()
            .map(|dir| dir.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "/".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shim_with(paths: &[(&str, &[u8])]) -> SyscallShim {
        let fs = Arc::new(VirtualFs::new());
        for (path, content) in paths {
            fs.create_or_replace_file(path, Bytes::copy_from_slice(content));
        }
        SyscallShim::new(fs)
    }

    #[test]
    fn stat_missing_path_reports_enoent_shape() {
        let shim = shim_with(&[]);
        let err = shim.stat("/tmp/nope").unwrap_err();
        assert_eq!(err.code, "ENOENT");
        assert_eq!(err.errno, -libc::ENOENT);
        assert_eq!(err.syscall, "stat");
        assert_eq!(err.path.as_deref(), Some("/tmp/nope"));
    }

    #[test]
    fn open_missing_path_reports_enoent_shape() {
        let shim = shim_with(&[]);
        let err = shim.open("/tmp/nope", 0, 0o644).unwrap_err();
        assert_eq!(err.code, "ENOENT");
        assert_eq!(err.syscall, "open");
    }

    #[test]
    fn mkdir_then_stat_reports_directory_shape() {
        let shim = shim_with(&[]);
        shim.mkdir("/tmp", 0o755).unwrap();
        let stat = shim.stat("/tmp").unwrap();
        assert!(stat.is_directory());
        assert_eq!(stat.size, 4096);
        assert_eq!(stat.blocks, 1);
        assert_eq!(stat.nlink, 2);
    }

    #[test]
    fn sequential_reads_accumulate_and_hit_eof() {
        let shim = shim_with(&[("/f", b"abcdefgh")]);
        let fd = shim.open("/f", 0, 0).unwrap();

        let mut buf = [0u8; 3];
        assert_eq!(shim.read(fd, &mut buf, 0, 3, None).unwrap(), 3);
        assert_eq!(&buf, b"abc");
        assert_eq!(shim.read(fd, &mut buf, 0, 3, None).unwrap(), 3);
        assert_eq!(&buf, b"def");

        let mut tail = [0u8; 10];
        assert_eq!(shim.read(fd, &mut tail, 0, 10, None).unwrap(), 2);
        assert_eq!(&tail[..2], b"gh");
        assert_eq!(shim.read(fd, &mut tail, 0, 10, None).unwrap(), 0);
    }

    #[test]
    fn reads_reassemble_the_exact_file() {
        let payload: Vec<u8> = (0..=255u8).collect();
        let shim = shim_with(&[("/f", &payload)]);
        let fd = shim.open("/f", 0, 0).unwrap();

        let mut assembled = Vec::new();
        let mut chunk = [0u8; 96];
        let chunk_len = chunk.len();
        loop {
            let n = shim.read(fd, &mut chunk, 0, chunk_len, None).unwrap();
            if n == 0 {
                break;
            }
            assembled.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(assembled, payload);
    }

    #[test]
    fn positional_read_leaves_the_cursor_alone() {
        let shim = shim_with(&[("/f", b"abcdefgh")]);
        let fd = shim.open("/f", 0, 0).unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(shim.read(fd, &mut buf, 0, 4, Some(4)).unwrap(), 4);
        assert_eq!(&buf, b"efgh");

        // The sequential cursor still points at the start.
        assert_eq!(shim.read(fd, &mut buf, 0, 4, None).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
    }

    #[test]
    fn positional_read_past_eof_returns_zero() {
        let shim = shim_with(&[("/f", b"short")]);
        let fd = shim.open("/f", 0, 0).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(shim.read(fd, &mut buf, 0, 8, Some(100)).unwrap(), 0);
    }

    #[test]
    fn read_respects_the_destination_bounds() {
        let shim = shim_with(&[("/f", b"abcdefgh")]);
        let fd = shim.open("/f", 0, 0).unwrap();

        let mut buf = [b'.'; 6];
        // Only two bytes of room remain from offset 4, despite length 8.
        assert_eq!(shim.read(fd, &mut buf, 4, 8, None).unwrap(), 2);
        assert_eq!(&buf, b"....ab");

        // Offset beyond the buffer end transfers nothing.
        let mut tiny = [b'.'; 2];
        assert_eq!(shim.read(fd, &mut tiny, 5, 1, None).unwrap(), 0);
        assert_eq!(&tiny, b"..");
    }

    #[test]
    fn read_and_fstat_on_closed_descriptor_report_ebadf() {
        let shim = shim_with(&[("/f", b"x")]);
        let fd = shim.open("/f", 0, 0).unwrap();
        shim.close(fd).unwrap();
        shim.close(fd).unwrap();

        let mut buf = [0u8; 1];
        let err = shim.read(fd, &mut buf, 0, 1, None).unwrap_err();
        assert_eq!(err.code, "EBADF");
        assert_eq!(err.errno, -libc::EBADF);

        let err = shim.fstat(fd).unwrap_err();
        assert_eq!(err.code, "EBADF");
        assert_eq!(err.syscall, "fstat");
    }

    #[test]
    fn write_file_read_file_round_trip() {
        let shim = shim_with(&[]);
        shim.write_file("/tmp/out", Bytes::from_static(b"payload")).unwrap();
        assert_eq!(shim.read_file("/tmp/out").unwrap(), Bytes::from_static(b"payload"));
        assert_eq!(shim.stat("/tmp/out").unwrap().size, 7);
    }

    #[test]
    fn read_file_rejects_directories_and_missing_paths() {
        let shim = shim_with(&[]);
        assert_eq!(shim.read_file("/gone").unwrap_err().code, "ENOENT");
        shim.mkdir("/dir", 0o755).unwrap();
        let err = shim.read_file("/dir").unwrap_err();
        assert_eq!(err.code, "ENOENT");
        assert_eq!(err.syscall, "open");
    }

    // A descriptor whose path was replaced by a directory keeps answering
    // fstat with the directory's shape, but reads through it fail.
    #[test]
    fn dangling_descriptor_fails_on_read_but_not_fstat() {
        let shim = shim_with(&[("/spot", b"file bytes")]);
        let fd = shim.open("/spot", 0, 0).unwrap();
        shim.mkdir("/spot", 0o755).unwrap();

        assert!(shim.fstat(fd).unwrap().is_directory());

        let mut buf = [0u8; 4];
        assert_eq!(shim.read(fd, &mut buf, 0, 4, None).unwrap_err().code, "EBADF");
    }

    #[test]
    fn getcwd_always_answers() {
        let shim = shim_with(&[]);
        assert!(!shim.getcwd().is_empty());
    }
}
