//! # Mach Platform Abstraction Layer
//!
//! This crate provides a typed API over the raw `mach_msg()` ABI and the
//! clock it is timed against, with interchangeable backends:
//! - **Mock Mode**: Scriptable kernel and manual clock for unit testing
//! - **Runtime Mode**: The real `mach_msg()` trap (Apple targets only)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mach_platform::{Clock, MachMsgOption, MachMsgTrap, MonotonicClock};
//!
//! let now = MonotonicClock.now_ns();
//! let options = MachMsgOption::SEND_MSG | MachMsgOption::SEND_TIMEOUT;
//! ```
//!
//! ## Build Modes
//!
//! ```bash
//! # Mock (default - testing on any host)
//! cargo build
//!
//! # Runtime (real trap on macOS)
//! cargo build --features runtime
//! ```

#![no_std]

#[cfg(feature = "mock")]
extern crate alloc;

#[cfg(test)]
extern crate std;

/// Typed options, status codes and the kernel/clock seams
///
/// This is the main module higher layers should use.
/// It provides the same signatures regardless of backend.
pub mod adapter;

/// Real backends: monotonic clock and the `mach_msg()` trap
pub mod syscalls;

/// Scriptable kernel and clock for tests
#[cfg(feature = "mock")]
pub mod mock;

/// Platform configuration and detection
pub mod config {
    /// Name of the kernel backend active at compile time
    ///
    /// Runtime wins when both backends are compiled in, since that is the one
    /// production code reaches through `SystemTrap`.
    pub fn platform_mode() -> &'static str {
        if is_runtime() {
            "runtime"
        } else if is_mock() {
            "mock"
        } else {
            "none"
        }
    }

    /// Check if the mock kernel is compiled in
    pub const fn is_mock() -> bool {
        cfg!(feature = "mock")
    }

    /// Check if the real trap is compiled in
    pub const fn is_runtime() -> bool {
        cfg!(all(feature = "runtime", target_vendor = "apple"))
    }
}

pub use adapter::{Clock, MachMsgError, MachMsgOption, MachMsgReturn, MachMsgTrap};
pub use syscalls::MonotonicClock;

#[cfg(all(feature = "runtime", target_vendor = "apple"))]
pub use syscalls::SystemTrap;

/// Raw ABI re-export for callers that need header types and constants
pub use mach_sys as sys;
