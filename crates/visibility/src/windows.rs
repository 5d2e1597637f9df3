//! Windows-specific implementation.

#![allow(unsafe_code)]

use std::{
    io,
    iter,
    os::windows::ffi::OsStrExt,
    path::{Path, PathBuf},
};
use winapi::{
    shared::minwindef::BOOL,
    um::{
        fileapi::SetFileAttributesW,
        winnt::{FILE_ATTRIBUTE_HIDDEN, FILE_ATTRIBUTE_SYSTEM},
    },
};

use crate::ConcealError;

/// Mark the file as hidden and system, the path stays the same.
pub(super) fn conceal(path: &Path) -> Result<PathBuf, ConcealError> {
    let wide: Vec<u16> = path
        .as_os_str()
        .encode_wide()
        .chain(iter::once(0))
        .collect();

    cvt(unsafe {
        SetFileAttributesW(wide.as_ptr(), FILE_ATTRIBUTE_HIDDEN | FILE_ATTRIBUTE_SYSTEM)
    })
    .map_err(|source| ConcealError::Attributes {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(path.to_path_buf())
}

/// Interpret the result of a system API call.
fn cvt(i: BOOL) -> io::Result<BOOL> {
    if i == 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(i)
    }
}
