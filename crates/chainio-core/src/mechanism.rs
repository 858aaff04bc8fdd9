//! Readiness mechanisms.
//!
//! Each notification API tells a different story about a readable socket,
//! and the dispatcher interprets reads differently for each:
//!
//! | Mechanism    | Source             | `available` hint            |
//! |--------------|--------------------|-----------------------------|
//! | `Counted`    | kqueue `EVFILT_READ` | exact byte count (`data`) |
//! | `EdgeHangup` | epoll + `EPOLLRDHUP` | unknown, 0 once drained   |
//! | `Level`      | poll / select        | unknown                   |

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mechanism {
    /// The kernel reports exactly how many bytes are pending.
    Counted,
    /// Edge notifications with a close-imminent flag, no byte count.
    EdgeHangup,
    /// No hint beyond "readable".
    Level,
}

impl Mechanism {
    /// The mechanism native to the target OS.
    pub fn platform_default() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(any(
                target_os = "macos",
                target_os = "ios",
                target_os = "freebsd",
                target_os = "netbsd",
                target_os = "openbsd",
                target_os = "dragonfly",
            ))] {
                Mechanism::Counted
            } else if #[cfg(any(target_os = "linux", target_os = "android"))] {
                Mechanism::EdgeHangup
            } else {
                Mechanism::Level
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mechanism::Counted => "counted",
            Mechanism::EdgeHangup => "edge",
            Mechanism::Level => "level",
        }
    }
}

impl Default for Mechanism {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mechanism {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "counted" | "kqueue" => Ok(Mechanism::Counted),
            "edge" | "epoll" => Ok(Mechanism::EdgeHangup),
            "level" | "poll" | "select" => Ok(Mechanism::Level),
            _ => Err(()),
        }
    }
}
