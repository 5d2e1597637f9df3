//! Linux-specific implementation.
//! Other UNIX-es might have an equivalent of `fallocate`, in that case write another specialized
//! implementation or just use fallback.

use nix::{
    errno::Errno,
    fcntl::{fallocate, FallocateFlags},
};
use std::{convert::TryInto, fs::File, io, os::unix::io::AsRawFd};

use crate::{sparse, Strategy};

/// No privileges to acquire on Unix.
#[derive(Debug)]
pub(super) struct Platform;

impl Platform {
    /// A no-op.
    #[inline]
    pub(super) fn new() -> Self {
        Self
    }

    /// `fallocate` is available to everyone.
    #[inline]
    pub(super) fn fast_path_available(&self) -> bool {
        true
    }

    /// Allocate the disk space by using [`fallocate`], or by writing the last
    /// byte if the filesystem doesn't support it.
    #[inline]
    pub(super) fn allocate(
        &self,
        file: &mut File,
        _current_len: u64,
        target_len: u64,
    ) -> Result<Strategy, io::Error> {
        let len = target_len
            .try_into()
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

        // Plain mode reserves the extents for the whole range and grows the
        // file size, leaving the existing data intact.
        match fallocate(file.as_raw_fd(), FallocateFlags::empty(), 0, len) {
            Ok(()) => Ok(Strategy::Preallocated),
            Err(errno @ (Errno::EOPNOTSUPP | Errno::ENOSYS)) => {
                tracing::debug!(message = "fallocate is not supported, writing the last byte", %errno);
                sparse::write_last_byte(file, target_len)?;
                Ok(Strategy::SparseWrite)
            }
            Err(errno) => Err(errno.into()),
        }
    }
}
