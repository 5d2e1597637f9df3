//! The portable slow path shared by all the implementations.

use std::{
    fs::File,
    io::{self, Seek, SeekFrom, Write},
};

/// Grow the file to `len` by writing a single zero byte at the very end.
///
/// On filesystems with sparse files support this leaves a hole in front of
/// the written byte, otherwise the OS fills the whole range with zeroes.
pub(crate) fn write_last_byte(file: &mut File, len: u64) -> io::Result<()> {
    // Compute the position one byte behind the desired end of the file.
    let Some(pre_end_pos) = len.checked_sub(1) else {
        return Ok(());
    };

    // Store current file position.
    let current_pos = file.stream_position()?;

    // Go back one byte behind the desired end of file and write a zero.
    file.seek(SeekFrom::Start(pre_end_pos))?;
    file.write_all(&[0])?;

    // Restore the file position we captured at the start.
    file.seek(SeekFrom::Start(current_pos))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn grows_to_len() {
        let mut file = tempfile::tempfile().unwrap();
        write_last_byte(&mut file, 10_000).unwrap();
        assert_eq!(file.metadata().unwrap().len(), 10_000);
    }

    #[test]
    fn zero_is_noop() {
        let mut file = tempfile::tempfile().unwrap();
        write_last_byte(&mut file, 0).unwrap();
        assert_eq!(file.metadata().unwrap().len(), 0);
    }

    #[test]
    fn keeps_position() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"abc").unwrap();
        write_last_byte(&mut file, 100).unwrap();
        assert_eq!(file.stream_position().unwrap(), 3);
    }
}
