// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! In-memory filesystem emulation for a sandboxed WASM guest
//!
//! The proof engine is compiled for a runtime that performs blocking-style
//! file I/O against paths under `HOME` and `XDG_CACHE_HOME`. Inside the
//! sandbox there is no real filesystem, so this crate keeps an inode table
//! and a descriptor table in memory and exposes the handful of syscalls the
//! engine actually issues through [`GuestSyscalls`].

pub mod error;
pub mod shim;
pub mod types;
pub mod vfs;

pub use error::{FsError, FsResult, SyscallError};
pub use shim::{GuestSyscalls, SyscallShim};
pub use types::{Descriptor, FileTimes, Inode, InodeKind, StatRecord};
pub use vfs::VirtualFs;
