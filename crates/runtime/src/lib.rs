//! Drake Runtime: dynamic value core for ahead-of-time compiled Drake programs
//!
//! Key design principles:
//! - Value: closed tagged union of everything compiled code can hold
//! - Runtime: one context object owning the class, singleton and constant
//!   tables, the exception-frame stack and the platform
//! - Dispatch: `Runtime::invoke` resolves a method name against bridge,
//!   singleton, kind, class-chain and universal tables, in that order
//! - Raises travel as `Err(Unwind)` to the protected region that owns the
//!   target frame; at the C boundary they become a pending flag
//!
//! Compiled programs link the `staticlib` and call the `drake_rt_*` symbols in
//! `ffi`. Embedders and tests use `Runtime` directly.

pub mod array;
pub mod block;
pub mod bridge;
pub mod builtins;
pub mod class;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod exception;
pub mod ffi;
pub mod format;
pub mod logging;
pub mod map;
pub mod operators;
pub mod platform;
pub mod range;
pub mod report;
pub mod runtime;
pub mod set;
pub mod tuple;
pub mod value;

pub use block::{Block, BlockCode, BlockFn, ExternBlockFn};
pub use bridge::ForeignBridge;
pub use class::{ClassId, ExternMethodFn, Method, MethodCode, MethodFn};
pub use config::RuntimeConfig;
pub use error::{ConfigError, FrameId, RtResult, Unwind};
pub use map::MapData;
pub use operators::{BinaryOp, values_equal};
pub use platform::{CapturePlatform, Platform, StdPlatform, Stream};
pub use range::RangeValue;
pub use report::{ReportConfig, ReportDestination, ReportFormat};
pub use runtime::{Runtime, RuntimeStats};
pub use set::SetData;
pub use tuple::NamedTupleData;
pub use value::{InstanceData, Kind, Value};
