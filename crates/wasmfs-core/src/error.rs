// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for the virtual filesystem

use serde::Serialize;

/// Core filesystem error type
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    #[error("not found")]
    NotFound,
    #[error("bad file descriptor")]
    BadDescriptor,
    #[error("io error: {0}")]
    Io(String),
}

impl FsError {
    /// POSIX error name as the guest runtime spells it.
    pub fn code(&self) -> &'static str {
        match self {
            FsError::NotFound => "ENOENT",
            FsError::BadDescriptor => "EBADF",
            FsError::Io(_) => "EIO",
        }
    }

    /// Negative errno value matching the guest's syscall convention.
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound => -libc::ENOENT,
            FsError::BadDescriptor => -libc::EBADF,
            FsError::Io(_) => -libc::EIO,
        }
    }

    fn strerror(&self) -> &str {
        match self {
            FsError::NotFound => "no such file or directory",
            FsError::BadDescriptor => "bad file descriptor",
            FsError::Io(detail) => detail,
        }
    }

    /// Wrap this error into the reply shape the guest inspects.
    pub fn into_syscall(self, syscall: &'static str, path: Option<&str>) -> SyscallError {
        let message = match path {
            Some(path) => format!("{}: {}, {} '{}'", self.code(), self.strerror(), syscall, path),
            None => format!("{}: {}, {}", self.code(), self.strerror(), syscall),
        };
        SyscallError {
            code: self.code(),
            errno: self.errno(),
            syscall,
            path: path.map(str::to_string),
            message,
        }
    }
}

pub type FsResult<T> = Result<T, FsError>;

/// Failure reported to the guest runtime. The guest checks the POSIX code
/// string, the negative errno, the name of the failing syscall and the
/// offending path, in that order of interest.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct SyscallError {
    pub code: &'static str,
    pub errno: i32,
    pub syscall: &'static str,
    pub path: Option<String>,
    pub message: String,
}
