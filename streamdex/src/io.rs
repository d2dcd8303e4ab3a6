//! Positioned file reads.
//!
//! `PositionedFile` reads at absolute offsets with `pread` (`seek_read` on
//! Windows) so it never moves a shared file cursor. Several readers can hold
//! one concurrently through `&self`.

use std::fs::File;
use std::io;
use std::path::Path;

/// A read-only file handle addressed by absolute byte offset.
#[derive(Debug)]
pub struct PositionedFile {
    file: File,
    len: u64,
}

impl PositionedFile {
    /// Open a file for positioned reads, capturing its current length.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }

    /// Length of the file when it was opened.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Whether the file was empty when opened.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read as many bytes as are available at `offset`, up to `buf.len()`.
    ///
    /// Returns the number of bytes read. A result shorter than `buf.len()`
    /// means the end of the file was reached.
    pub fn read_at_most(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match read_at(&self.file, &mut buf[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}
