//! `LibcSocket`: default `SocketIo` implementation.
//!
//! `readv(2)` straight into the caller's slices and `ioctl(FIONREAD)` for
//! the pending-byte query. Stateless; one instance can serve every
//! connection on the loop.

use chainio_core::socket::SocketIo;

use nix::errno::Errno;

use std::io::IoSliceMut;
use std::os::unix::io::RawFd;

nix::ioctl_read_bad!(fionread, libc::FIONREAD, libc::c_int);

/// Bytes queued in the receive buffer of `fd`.
pub(crate) fn pending_bytes(fd: RawFd) -> Result<usize, i32> {
    let mut n: libc::c_int = 0;
    unsafe { fionread(fd, &mut n) }.map_err(|e| e as i32)?;
    Ok(n.max(0) as usize)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LibcSocket;

impl LibcSocket {
    pub fn new() -> Self {
        Self
    }
}

impl SocketIo for LibcSocket {
    fn readv(&mut self, fd: RawFd, iov: &mut [IoSliceMut<'_>]) -> Result<usize, i32> {
        // IoSliceMut is ABI-compatible with `struct iovec` on unix.
        let ret = unsafe {
            libc::readv(
                fd,
                iov.as_ptr() as *const libc::iovec,
                iov.len() as libc::c_int,
            )
        };
        if ret < 0 {
            return Err(Errno::last() as i32);
        }
        Ok(ret as usize)
    }

    fn pending(&mut self, fd: RawFd) -> Result<usize, i32> {
        pending_bytes(fd)
    }
}
