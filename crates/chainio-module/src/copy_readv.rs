//! `CopyReadv`: `SocketIo` for targets without a native vectored read.
//!
//! Emulates `readv(2)` with a single `read(2)` into a scratch buffer sized
//! to the whole scatter list, then copies the bytes out slice by slice.
//!
//! Failure semantics:
//! - empty scatter list → `EINVAL`
//! - total length 0 → `Ok(0)` without a system call
//! - scratch allocation fails → `ENOMEM`, nothing read
//! - `read(2)` fails → its errno, nothing copied
//!
//! Only the bytes actually read are copied; slices past the fill point are
//! left untouched. The scratch buffer is kept between calls.

use chainio_core::socket::SocketIo;
use chainio_core::ktrace;

use crate::libc_socket::pending_bytes;

use nix::errno::Errno;

use std::io::IoSliceMut;
use std::os::unix::io::RawFd;

#[derive(Debug, Default)]
pub struct CopyReadv {
    scratch: Vec<u8>,
}

impl CopyReadv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current scratch capacity (grows to the largest request seen).
    pub fn scratch_capacity(&self) -> usize {
        self.scratch.capacity()
    }

    fn ensure_scratch(&mut self, total: usize) -> Result<(), i32> {
        if self.scratch.len() < total {
            self.scratch
                .try_reserve_exact(total - self.scratch.len())
                .map_err(|_| libc::ENOMEM)?;
            self.scratch.resize(total, 0);
        }
        Ok(())
    }
}

/// Copy `src` across `iov` in order. Returns bytes copied.
fn scatter(mut src: &[u8], iov: &mut [IoSliceMut<'_>]) -> usize {
    let mut copied = 0;
    for slice in iov.iter_mut() {
        if src.is_empty() {
            break;
        }
        let k = slice.len().min(src.len());
        slice[..k].copy_from_slice(&src[..k]);
        src = &src[k..];
        copied += k;
    }
    copied
}

impl SocketIo for CopyReadv {
    fn readv(&mut self, fd: RawFd, iov: &mut [IoSliceMut<'_>]) -> Result<usize, i32> {
        if iov.is_empty() {
            return Err(libc::EINVAL);
        }

        let total = iov
            .iter()
            .try_fold(0usize, |acc, s| acc.checked_add(s.len()))
            .filter(|&t| t <= isize::MAX as usize)
            .ok_or(libc::EINVAL)?;
        if total == 0 {
            return Ok(0);
        }

        self.ensure_scratch(total)?;

        let ret = unsafe {
            libc::read(
                fd,
                self.scratch.as_mut_ptr() as *mut libc::c_void,
                total,
            )
        };
        if ret < 0 {
            return Err(Errno::last() as i32);
        }

        let n = ret as usize;
        let copied = scatter(&self.scratch[..n], iov);
        debug_assert_eq!(copied, n);
        ktrace!("copy-readv: fd:{} read:{} over {} slices", fd, n, iov.len());
        Ok(n)
    }

    fn pending(&mut self, fd: RawFd) -> Result<usize, i32> {
        pending_bytes(fd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;
    use std::os::unix::io::AsRawFd;
    use std::os::unix::net::UnixStream;

    #[test]
    fn short_read_leaves_tail_untouched() {
        let (mut tx, rx) = UnixStream::pair().unwrap();
        tx.write_all(b"hello").unwrap();

        let mut a = [0xAAu8; 3];
        let mut b = [0xAAu8; 4];
        let mut c = [0xAAu8; 4];
        let mut iov = [
            IoSliceMut::new(&mut a),
            IoSliceMut::new(&mut b),
            IoSliceMut::new(&mut c),
        ];

        let mut shim = CopyReadv::new();
        assert_eq!(shim.readv(rx.as_raw_fd(), &mut iov), Ok(5));
        assert_eq!(&a, b"hel");
        assert_eq!(&b, &[b'l', b'o', 0xAA, 0xAA]);
        assert_eq!(c, [0xAA; 4]);
        assert!(shim.scratch_capacity() >= 11);
    }

    #[test]
    fn empty_list_is_einval() {
        let mut shim = CopyReadv::new();
        let mut iov: [IoSliceMut<'_>; 0] = [];
        assert_eq!(shim.readv(0, &mut iov), Err(libc::EINVAL));
    }

    #[test]
    fn zero_total_skips_the_syscall() {
        let mut shim = CopyReadv::new();
        let mut empty = [0u8; 0];
        let mut iov = [IoSliceMut::new(&mut empty)];
        // -1 would fail with EBADF if a read were attempted.
        assert_eq!(shim.readv(-1, &mut iov), Ok(0));
    }

    #[test]
    fn read_error_copies_nothing() {
        let mut shim = CopyReadv::new();
        let mut a = [0x55u8; 4];
        let mut iov = [IoSliceMut::new(&mut a)];
        assert_eq!(shim.readv(-1, &mut iov), Err(libc::EBADF));
        assert_eq!(a, [0x55; 4]);
    }

    #[test]
    fn nonblocking_empty_is_eagain() {
        let (_tx, rx) = UnixStream::pair().unwrap();
        rx.set_nonblocking(true).unwrap();

        let mut shim = CopyReadv::new();
        let mut a = [0u8; 4];
        let mut iov = [IoSliceMut::new(&mut a)];
        let err = shim.readv(rx.as_raw_fd(), &mut iov).unwrap_err();
        assert!(err == libc::EAGAIN || err == libc::EWOULDBLOCK);
    }

    #[test]
    fn pending_matches_queue() {
        let (mut tx, rx) = UnixStream::pair().unwrap();
        tx.write_all(&[1u8; 9]).unwrap();
        assert_eq!(CopyReadv::new().pending(rx.as_raw_fd()), Ok(9));
    }
}
