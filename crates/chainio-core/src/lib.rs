//! # chainio-core
//!
//! Core types for reading a socket straight into a chain of buffers.
//!
//! This crate holds the data model and the seams; it performs no I/O of
//! its own. The read dispatcher and the platform primitives live in
//! `chainio-module`.
//!
//! ## Modules
//!
//! - `buffer` - Owned memory regions and the buffers carved from them
//! - `coalesce` - Builds a bounded scatter list from a buffer chain
//! - `event` - Per-connection readiness state and read outcomes
//! - `mechanism` - Which readiness strategy the event layer provides
//! - `socket` - The vectored read / pending-bytes trait
//! - `error` - Error types
//! - `klog` - Kernel-style leveled logging macros
//! - `env` - Environment variable utilities

pub mod buffer;
pub mod coalesce;
pub mod event;
pub mod mechanism;
pub mod socket;
pub mod error;
pub mod klog;
pub mod env;

// Re-exports for convenience
pub use buffer::{Buffer, Region, RegionId};
pub use coalesce::{coalesce, Batch, ScatterEntry};
pub use event::{Connection, ReadEvent, ReadOutcome, ReadState, AVAILABLE_UNKNOWN};
pub use mechanism::Mechanism;
pub use socket::SocketIo;
pub use error::{ReadError, Result};
pub use env::{env_get, env_get_bool, env_get_opt};

/// Tunables shared by every crate in the workspace.
pub mod constants {
    /// Scatter entries kept inline (on the stack) per read call.
    /// Matches the usual `NGX_IOVS_PREALLOCATE`-style sizing of 64.
    pub const IOVS_PREALLOCATE: usize = 64;

    /// Upper bound for a single vectored read (`IOV_MAX` on Linux and BSD).
    pub const IOV_MAX: usize = 1024;
}
