//! Platform read primitive.
//!
//! A `SocketIo` performs the two system calls the dispatcher needs.
//!
//! # Implementors
//!
//! - `LibcSocket` (default): `readv(2)` plus `ioctl(FIONREAD)`.
//! - `CopyReadv` (feature = "copy-readv"): one `read(2)` into a scratch
//!   buffer, scattered afterwards. For targets without a usable `readv`.

use std::io::IoSliceMut;
use std::os::unix::io::RawFd;

/// Vectored read and pending-byte query on a raw socket.
///
/// **Contract:**
/// - Neither call may block; the socket is non-blocking.
/// - Errors are raw errno values. `EAGAIN`/`EWOULDBLOCK` and `EINTR` are
///   reported as-is; the caller decides what is transient.
/// - `readv` fills `iov` in order starting from the first slice and
///   returns the byte count; `Ok(0)` means orderly shutdown.
pub trait SocketIo {
    fn readv(&mut self, fd: RawFd, iov: &mut [IoSliceMut<'_>]) -> Result<usize, i32>;

    /// Bytes waiting in the socket receive buffer.
    fn pending(&mut self, fd: RawFd) -> Result<usize, i32>;
}

impl<S: SocketIo + ?Sized> SocketIo for &mut S {
    fn readv(&mut self, fd: RawFd, iov: &mut [IoSliceMut<'_>]) -> Result<usize, i32> {
        (**self).readv(fd, iov)
    }

    fn pending(&mut self, fd: RawFd) -> Result<usize, i32> {
        (**self).pending(fd)
    }
}
