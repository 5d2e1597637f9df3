//! Free space accounting.

use std::{io, path::Path};

use diskfill_distribution::ByteSize;

use crate::size::SizeRequest;

/// The space kept free when the request doesn't fit.
pub const HEADROOM: ByteSize = 1024 * 1024;

/// The space usage of a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    /// The total size of the volume.
    pub total: ByteSize,
    /// The space available to the current user.
    pub free: ByteSize,
}

/// Query the usage of the volume the path is on.
pub fn usage(path: impl AsRef<Path>) -> Result<Usage, io::Error> {
    let path = path.as_ref();
    Ok(Usage {
        total: fs2::total_space(path)?,
        free: fs2::available_space(path)?,
    })
}

/// The budget to distribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    /// The amount of bytes to fill.
    pub bytes: ByteSize,
    /// The originally requested amount, if it had to be reduced.
    pub clamped_from: Option<ByteSize>,
}

impl Budget {
    /// Turn the request into a budget that fits into the `free` space.
    ///
    /// A request that doesn't fit is reduced to leave [`HEADROOM`] free.
    pub fn resolve(request: SizeRequest, free: ByteSize) -> Self {
        match request {
            SizeRequest::Full => Self {
                bytes: free,
                clamped_from: None,
            },
            SizeRequest::Bytes(requested) if requested <= free => Self {
                bytes: requested,
                clamped_from: None,
            },
            SizeRequest::Bytes(requested) => Self {
                bytes: free.saturating_sub(HEADROOM),
                clamped_from: Some(requested),
            },
        }
    }
}
