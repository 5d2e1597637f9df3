//! Hiding by name, the Unix way.

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use crate::ConcealError;

/// The dot-prefixed sibling of the path.
///
/// Returns `None` if the file name already starts with a dot, or if there is
/// no file name at all.
pub fn dotted(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?;
    if name.to_string_lossy().starts_with('.') {
        return None;
    }

    let mut hidden = OsString::from(".");
    hidden.push(name);
    Some(path.with_file_name(hidden))
}

/// Rename the file to its dot-prefixed name, return the new path.
pub fn rename(path: &Path) -> Result<PathBuf, ConcealError> {
    let Some(hidden) = dotted(path) else {
        return Ok(path.to_path_buf());
    };

    fs::rename(path, &hidden).map_err(|source| ConcealError::Rename {
        from: path.to_path_buf(),
        to: hidden.clone(),
        source,
    })?;
    Ok(hidden)
}
