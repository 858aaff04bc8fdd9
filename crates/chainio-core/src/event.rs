//! Per-connection read readiness.
//!
//! The notification layer (epoll, kqueue, poll) fills a [`ReadEvent`] when
//! it learns something about the socket; the read dispatcher consumes and
//! updates it on every call. The fields are the only state that carries
//! over between reads.

use std::os::unix::io::RawFd;

/// `available` value meaning "no byte count known".
pub const AVAILABLE_UNKNOWN: i32 = -1;

/// Read-side readiness of one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadEvent {
    /// A read is expected to succeed without blocking.
    pub ready: bool,
    /// The peer closed its side.
    pub eof: bool,
    /// A fatal error was seen. Terminal.
    pub error: bool,
    /// Bytes believed to be waiting in the kernel, or `AVAILABLE_UNKNOWN`.
    pub available: i32,
    /// The notification layer saw a hangup that reads have not drained yet.
    pub pending_eof: bool,
    /// Error reported together with the hangup (kqueue `EV_EOF` fflags).
    pub hangup_errno: Option<i32>,
    /// Set once the notification layer has reported on this socket.
    pub notified: bool,
}

impl Default for ReadEvent {
    fn default() -> Self {
        Self {
            ready: false,
            eof: false,
            error: false,
            available: AVAILABLE_UNKNOWN,
            pending_eof: false,
            hangup_errno: None,
            notified: false,
        }
    }
}

impl ReadEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Readable notification. `available` is the kernel's byte count when
    /// the mechanism provides one, `AVAILABLE_UNKNOWN` otherwise.
    pub fn notify_readable(&mut self, available: i32) {
        self.notified = true;
        self.ready = true;
        self.available = available;
    }

    /// Hangup notification (`EPOLLRDHUP`, `EV_EOF`).
    pub fn notify_hangup(&mut self, errno: Option<i32>) {
        self.notified = true;
        self.pending_eof = true;
        self.hangup_errno = errno;
    }

    /// Where the connection stands, derived from the flags.
    pub fn state(&self) -> ReadState {
        if self.error {
            ReadState::Errored
        } else if self.eof {
            ReadState::Eof
        } else if self.ready {
            ReadState::Readable
        } else if !self.notified {
            ReadState::Unknown
        } else {
            ReadState::WouldBlock
        }
    }
}

/// Readiness states. `Eof` and `Errored` are terminal; `Readable` is only
/// ever entered through a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    Unknown,
    WouldBlock,
    Readable,
    Eof,
    Errored,
}

/// A connected socket plus its read readiness.
#[derive(Debug)]
pub struct Connection {
    pub fd: RawFd,
    pub read: ReadEvent,
}

impl Connection {
    pub fn new(fd: RawFd) -> Self {
        Self {
            fd,
            read: ReadEvent::default(),
        }
    }
}

/// Result of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes placed into the chain. `Bytes(0)` is end of stream.
    Bytes(usize),
    /// Nothing to read now; wait for the next notification.
    WouldBlock,
}

impl ReadOutcome {
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, ReadOutcome::Bytes(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_event_is_unknown() {
        let ev = ReadEvent::new();
        assert_eq!(ev.state(), ReadState::Unknown);
        assert_eq!(ev.available, AVAILABLE_UNKNOWN);
    }

    #[test]
    fn notifications_drive_state() {
        let mut ev = ReadEvent::new();
        ev.notify_readable(12);
        assert_eq!(ev.state(), ReadState::Readable);
        assert_eq!(ev.available, 12);

        ev.ready = false;
        assert_eq!(ev.state(), ReadState::WouldBlock);

        ev.notify_hangup(Some(libc::ECONNRESET));
        assert!(ev.pending_eof);
        assert_eq!(ev.hangup_errno, Some(libc::ECONNRESET));

        ev.eof = true;
        assert_eq!(ev.state(), ReadState::Eof);
        ev.error = true;
        assert_eq!(ev.state(), ReadState::Errored);
    }

    #[test]
    fn outcome_eof() {
        assert!(ReadOutcome::Bytes(0).is_eof());
        assert!(!ReadOutcome::Bytes(1).is_eof());
        assert!(!ReadOutcome::WouldBlock.is_eof());
    }
}
