//! Best-effort concealment of the produced files.
//!
//! What "concealed" means depends on the platform: Windows gets the hidden and
//! system attributes, Linux gets a dot-prefixed name plus the immutable flag,
//! everything else only gets the name.

use std::{
    io,
    path::{Path, PathBuf},
};

use diskfill_distribution::Conceal;

pub mod dotfile;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
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

/// An error that can occur while concealing a file.
#[derive(Debug, thiserror::Error)]
pub enum ConcealError {
    /// The file could not be renamed.
    #[error("unable to rename {} to {}: {source}", .from.display(), .to.display())]
    Rename {
        /// The original path.
        from: PathBuf,
        /// The path we tried to rename to.
        to: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
    /// The file attributes could not be set.
    #[error("unable to set the attributes of {}: {source}", .path.display())]
    Attributes {
        /// The path to the file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

/// The platform concealer.
#[derive(Debug, Default)]
pub struct Concealer;

impl Concealer {
    /// Create a new [`Concealer`].
    pub fn new() -> Self {
        Self
    }
}

impl Conceal for Concealer {
    type Error = ConcealError;

    fn conceal(&self, path: &Path) -> Result<PathBuf, Self::Error> {
        implementation::conceal(path)
    }
}
