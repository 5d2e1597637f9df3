//! The disk space allocation facilities.
//!
//! An [`Allocator`] turns a byte count into allocated disk space as cheaply as
//! the current platform allows. The concrete implementation is picked at
//! compile time; every implementation produces a file whose apparent size is
//! exactly what was requested, and reports the path it took as a [`Strategy`].

use std::{fs::OpenOptions, io, path::Path};

mod sparse;

cfg_if::cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android"))] {
        mod linux;
        use self::linux as implementation;
    } else if #[cfg(windows)] {
        mod windows;
        use self::windows as implementation;
    } else {
        mod fallback;
        use self::fallback as implementation;
    }
}

/// The type we use for data size calculations.
pub type ByteSize = u64;

/// The allocation path that was actually taken for a request.
///
/// All of the variants leave the file at the requested apparent size, they
/// only differ in how much work the OS will have to do later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Nothing had to be allocated.
    Untouched,
    /// The extents were reserved via `fallocate`.
    Preallocated,
    /// A single zero byte was written right before the new end of the file.
    SparseWrite,
    /// The range was marked as valid data, no zero-fill will happen.
    ValidData,
    /// The end of the file was moved, the OS zero-fills the range lazily.
    EndOfFile,
    /// The fast path failed and the length was set directly.
    Truncated,
}

impl Strategy {
    /// A short name of the strategy, for diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Untouched => "untouched",
            Strategy::Preallocated => "preallocated",
            Strategy::SparseWrite => "sparse-write",
            Strategy::ValidData => "valid-data",
            Strategy::EndOfFile => "end-of-file",
            Strategy::Truncated => "truncated",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error that can occur while allocating the disk space.
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    /// There is not enough free space on the device.
    #[error("not enough free space: {0}")]
    NoSpace(#[source] io::Error),
    /// The process is not allowed to create or modify the file.
    #[error("access denied: {0}")]
    AccessDenied(#[source] io::Error),
    /// The target has vanished.
    #[error("target not found: {0}")]
    NotFound(#[source] io::Error),
    /// Any other OS-level failure.
    #[error(transparent)]
    Other(io::Error),
}

impl From<io::Error> for AllocationError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::StorageFull => Self::NoSpace(err),
            io::ErrorKind::PermissionDenied => Self::AccessDenied(err),
            io::ErrorKind::NotFound => Self::NotFound(err),
            _ => Self::Other(err),
        }
    }
}

/// The capability of allocating disk space for a file at a path.
pub trait Allocate {
    /// Allocate `len` bytes for the file at `path`.
    ///
    /// A missing file is created with `len` as its size, an existing file is
    /// extended by `len` bytes.
    fn allocate(&self, path: &Path, len: ByteSize) -> Result<Strategy, AllocationError>;

    /// Extend the existing file at `path` by `len` bytes.
    ///
    /// Unlike [`Allocate::allocate`] this never creates the file, and a
    /// missing one yields [`AllocationError::NotFound`].
    fn extend(&self, path: &Path, len: ByteSize) -> Result<Strategy, AllocationError>;
}

/// The platform allocator.
///
/// Holds whatever platform state the fast allocation needs, so construct it
/// once and pass it around.
#[derive(Debug)]
pub struct Allocator {
    /// The platform-specific implementation.
    platform: implementation::Platform,
}

impl Allocator {
    /// Create a new [`Allocator`], acquiring the system privileges necessary
    /// for the fast allocation where the platform has such a notion.
    ///
    /// Never fails: if the privileges can't be obtained the allocator just
    /// takes the slower paths.
    pub fn new() -> Self {
        let platform = implementation::Platform::new();
        tracing::debug!(
            message = "disk space allocator initialized",
            fast_path_available = platform.fast_path_available()
        );
        Self { platform }
    }

    /// Whether the fastest allocation path is available to this process.
    pub fn fast_path_available(&self) -> bool {
        self.platform.fast_path_available()
    }

    /// Open the file and grow it by `len` bytes.
    fn open_and_allocate(
        &self,
        path: &Path,
        len: ByteSize,
        create: bool,
    ) -> Result<Strategy, AllocationError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .open(path)?;

        if len == 0 {
            return Ok(Strategy::Untouched);
        }

        let current_len = file.metadata()?.len();
        let target_len = current_len.checked_add(len).ok_or_else(|| {
            AllocationError::Other(io::Error::new(
                io::ErrorKind::InvalidInput,
                "requested file size overflows",
            ))
        })?;

        let strategy = self.platform.allocate(&mut file, current_len, target_len)?;
        tracing::trace!(
            message = "allocated",
            path = %path.display(),
            %current_len,
            %target_len,
            %strategy
        );
        Ok(strategy)
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocate for Allocator {
    fn allocate(&self, path: &Path, len: ByteSize) -> Result<Strategy, AllocationError> {
        self.open_and_allocate(path, len, true)
    }

    fn extend(&self, path: &Path, len: ByteSize) -> Result<Strategy, AllocationError> {
        self.open_and_allocate(path, len, false)
    }
}

/// Whether the current process runs with administrator (root) rights.
#[cfg(unix)]
pub fn is_elevated() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Whether the current process runs with administrator (root) rights.
#[cfg(windows)]
pub fn is_elevated() -> bool {
    match windows::is_elevated() {
        Ok(elevated) => elevated,
        Err(err) => {
            tracing::debug!(message = "unable to query the token elevation", error = %err);
            false
        }
    }
}

/// Whether the current process runs with administrator (root) rights.
#[cfg(not(any(unix, windows)))]
pub fn is_elevated() -> bool {
    false
}
