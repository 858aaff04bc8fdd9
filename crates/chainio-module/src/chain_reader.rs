//! `ChainReader`: the read dispatcher.
//!
//! One call of [`ChainReader::read_chain`]:
//!
//! 1. Consults the readiness hint for the active mechanism and may answer
//!    `WouldBlock` (or end of stream) without touching the socket.
//! 2. Coalesces the chain's free space into a bounded scatter list.
//! 3. Issues one vectored read, retrying on `EINTR` only.
//! 4. Advances the `last` markers of the buffers that received bytes and
//!    updates `ready` / `available` for the mechanism.
//!
//! `ready` is only ever cleared here. Setting it is the notification
//! layer's job.

use chainio_core::coalesce::coalesce;
use chainio_core::error::{ReadError, Result};
use chainio_core::event::{Connection, ReadEvent, ReadOutcome};
use chainio_core::socket::SocketIo;
use chainio_core::{kdebug, kerror, kinfo, kwarn, Buffer, Mechanism};

use crate::config::{ConfigError, ReaderConfig};

use std::os::unix::io::RawFd;

/// Reads sockets into buffer chains through a `SocketIo`.
pub struct ChainReader<S: SocketIo> {
    io: S,
    config: ReaderConfig,
}

impl<S: SocketIo> ChainReader<S> {
    /// Fails when `config` does not validate: a zero entry capacity
    /// would never read, one past `IOV_MAX` would fail every `readv`.
    pub fn new(io: S, config: ReaderConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { io, config })
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn io(&self) -> &S {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut S {
        &mut self.io
    }

    /// Read what is available on `conn` into `chain`.
    ///
    /// `limit` caps the bytes requested (0 = no cap). Returns
    /// `Bytes(n)` with the chain's markers advanced by `n`, `Bytes(0)` at
    /// end of stream, or `WouldBlock`. Errors are fatal for the
    /// connection; `conn.read.error` is set when they come from the socket.
    ///
    /// A chain with no free space answers `WouldBlock` without a read and
    /// leaves `ready` set. Callers looping on `ready` must drain the chain
    /// before the next call.
    pub fn read_chain(
        &mut self,
        conn: &mut Connection,
        chain: &mut [Buffer],
        limit: usize,
    ) -> Result<ReadOutcome> {
        let fd = conn.fd;
        let rev = &mut conn.read;

        if let Some(outcome) = self.gate(fd, rev)? {
            return Ok(outcome);
        }

        let mut batch = coalesce(chain, self.config.iovs, limit)?;
        let size = batch.size();

        if size == 0 {
            // readv with nothing to fill would read as end of stream.
            kwarn!("readv: fd:{} chain has no free space", fd);
            return Ok(ReadOutcome::WouldBlock);
        }

        kdebug!("readv: fd:{} {}, last:{}", fd, batch.len(), batch.last_len());

        let n = {
            let mut iov = batch.io_slices();
            loop {
                match self.io.readv(fd, &mut iov) {
                    Ok(n) => break n,
                    Err(libc::EINTR) => {
                        kdebug!("readv: fd:{} interrupted, retrying", fd);
                    }
                    Err(e) if e == libc::EAGAIN || e == libc::EWOULDBLOCK => {
                        kdebug!("readv: fd:{} would block (errno {})", fd, e);
                        rev.ready = false;
                        return Ok(ReadOutcome::WouldBlock);
                    }
                    Err(e) => return Err(fatal(fd, rev, e, "readv")),
                }
            }
        };

        if n == 0 {
            rev.ready = false;
            rev.eof = true;

            // A closed peer can leave a stale nonzero count behind.
            if self.config.mechanism == Mechanism::Counted {
                rev.available = 0;
            }

            return Ok(ReadOutcome::Bytes(0));
        }

        batch.commit(n);
        drop(batch);

        self.update(fd, rev, n, size)
    }

    /// Pre-read readiness check. `Some` short-circuits the read.
    fn gate(&self, fd: RawFd, rev: &mut ReadEvent) -> Result<Option<ReadOutcome>> {
        match self.config.mechanism {
            Mechanism::Counted => {
                kdebug!(
                    "readv: fd:{} eof:{}, avail:{}, err:{:?}",
                    fd,
                    rev.pending_eof,
                    rev.available,
                    rev.hangup_errno
                );

                if rev.available == 0 {
                    if !rev.pending_eof {
                        return Ok(Some(ReadOutcome::WouldBlock));
                    }

                    rev.ready = false;
                    rev.eof = true;

                    kinfo!(
                        "readv: fd:{} peer closed with nothing queued, err:{:?}",
                        fd,
                        rev.hangup_errno
                    );

                    if let Some(errno) = rev.hangup_errno {
                        rev.error = true;
                        return Err(ReadError::Socket { errno, op: "kevent" });
                    }

                    return Ok(Some(ReadOutcome::Bytes(0)));
                }
            }
            Mechanism::EdgeHangup => {
                kdebug!(
                    "readv: fd:{} eof:{}, avail:{}",
                    fd,
                    rev.pending_eof,
                    rev.available
                );

                if rev.available == 0 && !rev.pending_eof {
                    return Ok(Some(ReadOutcome::WouldBlock));
                }
            }
            Mechanism::Level => {}
        }

        Ok(None)
    }

    /// Post-read hint update after `n > 0` bytes of a `size`-byte request.
    fn update(&mut self, fd: RawFd, rev: &mut ReadEvent, n: usize, size: usize) -> Result<ReadOutcome> {
        let read = i32::try_from(n).unwrap_or(i32::MAX);

        if self.config.mechanism == Mechanism::Counted {
            rev.available = rev.available.saturating_sub(read);

            // Negative when more bytes arrived between kevent() and readv().
            if rev.available <= 0 {
                if !rev.pending_eof {
                    rev.ready = false;
                }
                rev.available = 0;
            }

            return Ok(ReadOutcome::Bytes(n));
        }

        if self.config.query_pending {
            if rev.available >= 0 {
                rev.available = rev.available.saturating_sub(read);

                if rev.available <= 0 {
                    rev.available = 0;
                    rev.ready = false;
                }

                kdebug!("readv: fd:{} avail:{}", fd, rev.available);
            } else if n == size {
                match self.io.pending(fd) {
                    Ok(pending) => {
                        rev.available = i32::try_from(pending).unwrap_or(i32::MAX);
                    }
                    Err(e) => return Err(fatal(fd, rev, e, "ioctl(FIONREAD)")),
                }

                kdebug!("readv: fd:{} avail:{}", fd, rev.available);
            }
        }

        if self.config.mechanism == Mechanism::EdgeHangup {
            if n < size {
                if !rev.pending_eof {
                    rev.ready = false;
                }
                rev.available = 0;
            }

            return Ok(ReadOutcome::Bytes(n));
        }

        if n < size && !self.config.greedy {
            rev.ready = false;
        }

        Ok(ReadOutcome::Bytes(n))
    }
}

/// Mark the connection failed and build the error to hand back.
fn fatal(fd: RawFd, rev: &mut ReadEvent, errno: i32, op: &'static str) -> ReadError {
    let err = ReadError::Socket { errno, op };
    kerror!("{} (fd {})", err, fd);
    rev.error = true;
    rev.ready = false;
    err
}
