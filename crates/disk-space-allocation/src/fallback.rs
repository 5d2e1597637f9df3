//! The fallback implementation.

use std::{fs::File, io};

use crate::{sparse, Strategy};

/// No platform state needed.
#[derive(Debug)]
pub(super) struct Platform;

impl Platform {
    /// A no-op.
    #[inline]
    pub(super) fn new() -> Self {
        Self
    }

    /// There is no fast path here.
    #[inline]
    pub(super) fn fast_path_available(&self) -> bool {
        false
    }

    /// Allocate the disk space by writing to the very end of the file.
    #[inline]
    pub(super) fn allocate(
        &self,
        file: &mut File,
        _current_len: u64,
        target_len: u64,
    ) -> Result<Strategy, io::Error> {
        sparse::write_last_byte(file, target_len)?;
        Ok(Strategy::SparseWrite)
    }
}
