//! Output capture: a bounded buffer and the non-blocking drain step.

use std::io::{self, Read};
use std::os::fd::AsFd;

use nix::fcntl::{fcntl, FcntlArg, OFlag};

/// Captured output, bounded by a byte limit.
///
/// Bytes beyond the limit are dropped but still count as drained, so a
/// chatty process keeps being read and never blocks on a full pipe.
#[derive(Debug)]
pub struct CaptureBuffer {
    bytes: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl CaptureBuffer {
    /// Creates an empty buffer holding at most `limit` bytes.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self { bytes: Vec::new(), limit, truncated: false }
    }

    /// Appends as much of `chunk` as fits.
    pub fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.bytes.len());
        if chunk.len() > room {
            self.truncated = true;
        }
        self.bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    /// Bytes captured so far.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether anything was dropped.
    #[must_use]
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Consumes the buffer, returning the bytes and the truncation flag.
    #[must_use]
    pub fn into_parts(self) -> (Vec<u8>, bool) {
        (self.bytes, self.truncated)
    }
}

/// Reads whatever `reader` has available right now, at most `chunk_limit` bytes.
///
/// `reader` must be non-blocking: a `WouldBlock` error ends the drain, as does
/// end of file. `buf` sets the size of each individual read. Returns the
/// number of bytes read, including any the capture buffer had to drop.
///
/// # Errors
///
/// Returns any read error other than `WouldBlock` and `Interrupted`.
pub fn drain(
    reader: &mut impl Read,
    buf: &mut [u8],
    chunk_limit: usize,
    capture: &mut CaptureBuffer,
) -> io::Result<usize> {
    let mut total = 0;
    while total < chunk_limit {
        let want = buf.len().min(chunk_limit - total);
        match reader.read(&mut buf[..want]) {
            Ok(0) => break,
            Ok(n) => {
                capture.push(&buf[..n]);
                total += n;
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

/// Puts a file descriptor into non-blocking mode.
///
/// # Errors
///
/// Returns the OS error if either `fcntl` call fails.
pub fn set_nonblocking(fd: &impl AsFd) -> io::Result<()> {
    let flags = fcntl(fd.as_fd(), FcntlArg::F_GETFL)?;
    let new_flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(fd.as_fd(), FcntlArg::F_SETFL(new_flags))?;
    Ok(())
}
