//! chainio error types.
//!
//! Only conditions the caller must act on are errors. Would-block and
//! interrupted reads never surface here; end of stream is `Bytes(0)`.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// Transport failure. The connection is marked errored and must be
    /// torn down by the caller.
    Socket {
        /// Raw OS error number.
        errno: i32,
        /// Operation that reported it (`"readv"`, `"ioctl(FIONREAD)"`, ...).
        op: &'static str,
    },
    /// The scatter list could not be reserved.
    Alloc {
        /// Entry capacity that was requested.
        entries: usize,
    },
}

impl ReadError {
    /// OS error number, if the failure came from the kernel.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Socket { errno, .. } => Some(*errno),
            Self::Alloc { .. } => None,
        }
    }

    pub fn op(&self) -> &'static str {
        match self {
            Self::Socket { op, .. } => op,
            Self::Alloc { .. } => "coalesce",
        }
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Socket { errno, op } => write!(
                f,
                "{} failed: {} (errno {})",
                op,
                std::io::Error::from_raw_os_error(*errno),
                errno
            ),
            Self::Alloc { entries } => {
                write!(f, "scatter list allocation failed ({} entries)", entries)
            }
        }
    }
}

impl std::error::Error for ReadError {}

impl From<ReadError> for std::io::Error {
    fn from(e: ReadError) -> Self {
        match e {
            ReadError::Socket { errno, .. } => std::io::Error::from_raw_os_error(errno),
            ReadError::Alloc { .. } => std::io::Error::new(std::io::ErrorKind::OutOfMemory, e),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReadError>;
