//! The fallback implementation.

use std::path::{Path, PathBuf};

use crate::{dotfile, ConcealError};

/// Hide the file by name only.
pub(super) fn conceal(path: &Path) -> Result<PathBuf, ConcealError> {
    dotfile::rename(path)
}
