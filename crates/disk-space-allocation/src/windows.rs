//! Windows-specific implementation.

#![allow(unsafe_code)]

use std::{
    convert::TryInto,
    ffi::CString,
    fs::File,
    io::{self, Seek, SeekFrom},
    mem,
    os::windows::io::AsRawHandle,
};
use winapi::{
    shared::{
        minwindef::{BOOL, DWORD, FALSE, LPVOID, PDWORD},
        ntdef::NULL,
        winerror::ERROR_NOT_ALL_ASSIGNED,
    },
    um::{
        fileapi::{SetEndOfFile, SetFileValidData},
        handleapi::CloseHandle,
        processthreadsapi::{GetCurrentProcess, OpenProcessToken},
        securitybaseapi::{AdjustTokenPrivileges, GetTokenInformation},
        winbase::LookupPrivilegeValueA,
        winnt::{
            TokenElevation, HANDLE, LONGLONG, LPCSTR, PHANDLE, PLUID, PTOKEN_PRIVILEGES,
            SE_MANAGE_VOLUME_NAME, SE_PRIVILEGE_ENABLED, TOKEN_ADJUST_PRIVILEGES,
            TOKEN_ELEVATION, TOKEN_PRIVILEGES, TOKEN_QUERY,
        },
    },
};

use crate::{sparse, Strategy};

/// A wrapper around a HANDLE that automatically closes.
struct Handle(HANDLE);

impl Handle {
    /// Create an null handle.
    pub fn null() -> Self {
        Handle(NULL)
    }

    /// Return the underlying `HANDLE`.
    pub fn as_ptr(&self) -> HANDLE {
        self.0
    }

    /// Return a mutable pointer to the underlying `HANDLE`, allowing it to be
    /// used as an output parameter.
    pub fn as_out_ptr(&mut self) -> PHANDLE {
        &mut self.0 as PHANDLE
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if !self.0.is_null() {
            let rv = unsafe { CloseHandle(self.0) };
            assert!(rv != 0);

            self.0 = NULL;
        }
    }
}

/// The Windows allocator state.
#[derive(Debug)]
pub(super) struct Platform {
    /// Whether `SeManageVolumePrivilege` is enabled for the process, which
    /// is what `SetFileValidData` needs.
    manage_volume: bool,
}

impl Platform {
    /// Request the required priviliges and remember whether we got them.
    pub(super) fn new() -> Self {
        let manage_volume = match prepare_privileges() {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(
                    message = "unable to acquire the manage volume privilege, valid data marking is disabled",
                    error = %err
                );
                false
            }
        };
        Self { manage_volume }
    }

    /// Valid data marking is only possible with the privilege.
    #[inline]
    pub(super) fn fast_path_available(&self) -> bool {
        self.manage_volume
    }

    /// Allocate disk space with Windows specifics.
    ///
    /// A freshly created file takes the creation path, anything else is
    /// extended in place.
    pub(super) fn allocate(
        &self,
        file: &mut File,
        current_len: u64,
        target_len: u64,
    ) -> Result<Strategy, io::Error> {
        if current_len == 0 {
            self.allocate_fresh(file, target_len)
        } else {
            self.extend(file, target_len)
        }
    }

    /// Move the end of the file, then try to skip the zero-fill.
    fn extend(&self, file: &mut File, target_len: u64) -> Result<Strategy, io::Error> {
        // Aim at the desired end of the file while recording the previous
        // seek position.
        let current_pos = file.stream_position()?;
        file.seek(SeekFrom::Start(target_len))?;

        // Set new file end. The new range reads as zeroes, the OS fills it
        // lazily unless we mark it as valid.
        cvt(unsafe { SetEndOfFile(file.as_raw_handle() as HANDLE) })?;

        // Restore the file position we captured at the start.
        file.seek(SeekFrom::Start(current_pos))?;

        if self.mark_valid(file, target_len) {
            return Ok(Strategy::ValidData);
        }
        Ok(Strategy::EndOfFile)
    }

    /// Grow a zero-length file with a single write, then try to skip the
    /// zero-fill; resort to setting the length if anything goes wrong.
    fn allocate_fresh(&self, file: &mut File, target_len: u64) -> Result<Strategy, io::Error> {
        match sparse::write_last_byte(file, target_len) {
            Ok(()) => {
                if self.mark_valid(file, target_len) {
                    return Ok(Strategy::ValidData);
                }
            }
            Err(err) => {
                tracing::debug!(message = "unable to write the last byte", error = %err);
            }
        }

        file.set_len(target_len)?;
        Ok(Strategy::Truncated)
    }

    /// Try marking the whole file as valid data, returns whether it worked.
    fn mark_valid(&self, file: &File, len: u64) -> bool {
        if !self.manage_volume {
            return false;
        }

        let len: LONGLONG = match len.try_into() {
            Ok(len) => len,
            Err(_) => return false,
        };

        match cvt(unsafe { SetFileValidData(file.as_raw_handle() as HANDLE, len) }) {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(message = "SetFileValidData failed", error = %err);
                false
            }
        }
    }
}

/// Request the required priviliges.
fn prepare_privileges() -> Result<(), io::Error> {
    let mut current_process_token = Handle::null();

    cvt(unsafe {
        OpenProcessToken(
            GetCurrentProcess(),
            TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY,
            current_process_token.as_out_ptr(),
        )
    })?;

    let name = CString::new(SE_MANAGE_VOLUME_NAME)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    let mut privs = TOKEN_PRIVILEGES::default();
    cvt(unsafe {
        LookupPrivilegeValueA(
            NULL as LPCSTR,
            name.as_ptr(),
            &mut privs.Privileges[0].Luid as PLUID,
        )
    })?;
    privs.PrivilegeCount = 1;
    privs.Privileges[0].Attributes = SE_PRIVILEGE_ENABLED;

    cvt(unsafe {
        AdjustTokenPrivileges(
            current_process_token.as_ptr(),
            FALSE,
            &mut privs as PTOKEN_PRIVILEGES,
            0, // PreviousState is NULL
            NULL as PTOKEN_PRIVILEGES,
            NULL as PDWORD,
        )
    })?;

    // The call succeeds even when the token doesn't hold the privilege at
    // all, this is only visible via the last error.
    let last_error = io::Error::last_os_error();
    if last_error.raw_os_error() == Some(ERROR_NOT_ALL_ASSIGNED as i32) {
        return Err(last_error);
    }

    Ok(())
}

/// Query whether the process token is elevated.
pub(super) fn is_elevated() -> Result<bool, io::Error> {
    let mut current_process_token = Handle::null();

    cvt(unsafe {
        OpenProcessToken(
            GetCurrentProcess(),
            TOKEN_QUERY,
            current_process_token.as_out_ptr(),
        )
    })?;

    let mut elevation = TOKEN_ELEVATION::default();
    let mut returned: DWORD = 0;
    cvt(unsafe {
        GetTokenInformation(
            current_process_token.as_ptr(),
            TokenElevation,
            &mut elevation as *mut TOKEN_ELEVATION as LPVOID,
            mem::size_of::<TOKEN_ELEVATION>() as DWORD,
            &mut returned,
        )
    })?;

    Ok(elevation.TokenIsElevated != 0)
}

/// Interpret the result of a system API call.
fn cvt(i: BOOL) -> std::io::Result<BOOL> {
    if i == 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(i)
    }
}
