//! Kernel-style leveled logging for chainio
//!
//! Every line goes to stderr under a lock so lines from different
//! connections never interleave.
//!
//! # Environment Variables
//!
//! - `CHAINIO_LOG_LEVEL=<level>` - off, error, warn, info, debug, trace (or 0-5)
//! - `CHAINIO_FLUSH_EPRINT=1` - Flush stderr after every line
//!
//! # Usage
//!
//! ```ignore
//! use chainio_core::{kdebug, kerror};
//!
//! kdebug!("readv: fd:{} avail:{}", fd, avail);
//! kerror!("readv() failed (fd {}): errno {}", fd, errno);
//! ```

use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Log levels, most severe first.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Off,
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            LogLevel::Off => "",
            LogLevel::Error => "[error]",
            LogLevel::Warn => "[warn] ",
            LogLevel::Info => "[info] ",
            LogLevel::Debug => "[debug]",
            LogLevel::Trace => "[trace]",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "0" => Ok(LogLevel::Off),
            "error" | "1" => Ok(LogLevel::Error),
            "warn" | "2" => Ok(LogLevel::Warn),
            "info" | "3" => Ok(LogLevel::Info),
            "debug" | "4" => Ok(LogLevel::Debug),
            "trace" | "5" => Ok(LogLevel::Trace),
            _ => Err(()),
        }
    }
}

static FLUSH_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Warn as u8);
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Read `CHAINIO_LOG_LEVEL` / `CHAINIO_FLUSH_EPRINT`.
///
/// Runs lazily on the first log call; call it up front if the level must
/// be settled before the event loop starts.
pub fn init() {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    FLUSH_ENABLED.store(
        crate::env::env_get_bool("CHAINIO_FLUSH_EPRINT", false),
        Ordering::Relaxed,
    );

    if let Some(level) = crate::env::env_get_opt::<LogLevel>("CHAINIO_LOG_LEVEL") {
        LOG_LEVEL.store(level as u8, Ordering::Relaxed);
    }
}

#[inline]
fn ensure_init() {
    if !INITIALIZED.load(Ordering::Relaxed) {
        init();
    }
}

/// Current log level.
#[inline]
pub fn log_level() -> LogLevel {
    ensure_init();
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Override the level programmatically (wins over the environment).
pub fn set_log_level(level: LogLevel) {
    INITIALIZED.store(true, Ordering::SeqCst);
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn set_flush_enabled(enabled: bool) {
    FLUSH_ENABLED.store(enabled, Ordering::Relaxed);
}

#[inline]
pub fn level_enabled(level: LogLevel) -> bool {
    level != LogLevel::Off && level <= log_level()
}

#[doc(hidden)]
pub fn _klog_impl(level: LogLevel, args: std::fmt::Arguments<'_>) {
    if !level_enabled(level) {
        return;
    }
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = write!(handle, "chainio {} ", level.tag());
    let _ = handle.write_fmt(args);
    let _ = handle.write_all(b"\n");
    if FLUSH_ENABLED.load(Ordering::Relaxed) {
        let _ = handle.flush();
    }
}

// ============================================================================
// Public Macros
// ============================================================================

/// Fatal conditions: the connection is about to be torn down.
#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => {{
        $crate::klog::_klog_impl(
            $crate::klog::LogLevel::Error,
            format_args!($($arg)*)
        );
    }};
}

#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => {{
        $crate::klog::_klog_impl(
            $crate::klog::LogLevel::Warn,
            format_args!($($arg)*)
        );
    }};
}

#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => {{
        $crate::klog::_klog_impl(
            $crate::klog::LogLevel::Info,
            format_args!($($arg)*)
        );
    }};
}

/// Per-read event tracing. Compiled in, filtered at runtime.
#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => {{
        if $crate::klog::level_enabled($crate::klog::LogLevel::Debug) {
            $crate::klog::_klog_impl(
                $crate::klog::LogLevel::Debug,
                format_args!($($arg)*)
            );
        }
    }};
}

#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => {{
        if $crate::klog::level_enabled($crate::klog::LogLevel::Trace) {
            $crate::klog::_klog_impl(
                $crate::klog::LogLevel::Trace,
                format_args!($($arg)*)
            );
        }
    }};
}

// ============================================================================
// Tests
// ============================================================================
