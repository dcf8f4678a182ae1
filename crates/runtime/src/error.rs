//! Runtime error types
//!
//! Recoverable errors travel as `Err(Unwind)` through every runtime call
//! that can run user code, until the protected region that owns the target
//! frame catches them (see `exception`). The raised value itself is not in
//! the `Unwind`; it sits in the runtime's current-exception slot.
//!
//! At the C boundary an `Unwind` cannot be returned, so it is parked in
//! thread-local state instead:
//! ```ignore
//! let result = drake_rt_invoke(recv, name, argc, argv, block);
//! if drake_rt_exception_pending() {
//!     // jump to the landing pad of the innermost protected region
//! }
//! ```

use std::cell::Cell;
use std::fmt;

/// Identity of a pushed exception frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub(crate) u64);

impl FrameId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Non-local transfer towards the protected region owning `frame`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unwind {
    pub frame: FrameId,
}

impl fmt::Display for Unwind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exception raised towards frame {}", self.frame.0)
    }
}

impl std::error::Error for Unwind {}

pub type RtResult<T> = Result<T, Unwind>;

/// Names of the error classes the runtime raises on its own
pub mod classes {
    pub const STANDARD_ERROR: &str = "StandardError";
    pub const ZERO_DIVISION_ERROR: &str = "ZeroDivisionError";
    pub const TYPE_ERROR: &str = "TypeError";
    pub const ARGUMENT_ERROR: &str = "ArgumentError";
}

/// Invalid runtime configuration value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Environment variable held something other than a recognised flag
    InvalidFlag { var: &'static str, value: String },
    /// `DRAKE_REPORT` held an unknown mode
    InvalidReport(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidFlag { var, value } => {
                write!(f, "{}='{}' is not a boolean flag (use 0/1/true/false)", var, value)
            }
            ConfigError::InvalidReport(value) => {
                write!(f, "DRAKE_REPORT='{}' not recognized", value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

thread_local! {
    /// Unwind waiting to be observed by compiled code
    static PENDING_UNWIND: Cell<Option<Unwind>> = const { Cell::new(None) };
}

pub fn set_pending_unwind(unwind: Unwind) {
    PENDING_UNWIND.with(|p| p.set(Some(unwind)));
}

pub fn take_pending_unwind() -> Option<Unwind> {
    PENDING_UNWIND.with(|p| p.take())
}

pub fn has_pending_unwind() -> bool {
    PENDING_UNWIND.with(|p| p.get().is_some())
}

pub fn clear_pending_unwind() {
    PENDING_UNWIND.with(|p| p.set(None));
}

/// Whether a raise is waiting for compiled code to jump to its handler
#[unsafe(no_mangle)]
pub extern "C" fn drake_rt_exception_pending() -> bool {
    has_pending_unwind()
}

/// Frame id the pending raise is addressed to, or -1 when none is pending
#[unsafe(no_mangle)]
pub extern "C" fn drake_rt_exception_target() -> i64 {
    PENDING_UNWIND.with(|p| p.get().map(|u| u.frame.0 as i64).unwrap_or(-1))
}

/// Acknowledge the pending raise (compiled code has reached its handler)
#[unsafe(no_mangle)]
pub extern "C" fn drake_rt_exception_clear() {
    clear_pending_unwind();
}
