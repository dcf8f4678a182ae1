//! Runtime context
//!
//! Every process-wide registry lives here: classes, singleton methods,
//! constants, the exception-frame stack, the current exception, the platform
//! streams and the foreign bridge. All operations take `&self`. State sits in
//! `RefCell`/`Cell` and borrows are released before any call back into user
//! code, so a block or method may re-enter the runtime freely.
//!
//! A `Runtime` is single-threaded (`!Send`). The C boundary keeps one per
//! thread (see `ffi`).

use crate::bridge::ForeignBridge;
use crate::class::{ClassTable, SingletonTable};
use crate::config::RuntimeConfig;
use crate::constants::ConstantTable;
use crate::error::{FrameId, RtResult};
use crate::format;
use crate::platform::{Platform, StdPlatform, Stream};
use crate::range::RangeValue;
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Counters surfaced by the at-exit report
#[derive(Debug, Default)]
pub struct RuntimeStats {
    pub invocations: Cell<u64>,
    pub soft_failures: Cell<u64>,
    pub raises: Cell<u64>,
    pub peak_frames: Cell<usize>,
}

impl RuntimeStats {
    pub(crate) fn bump(counter: &Cell<u64>) {
        counter.set(counter.get().saturating_add(1));
    }
}

pub struct Runtime {
    pub(crate) config: RuntimeConfig,
    pub(crate) classes: RefCell<ClassTable>,
    pub(crate) singletons: RefCell<SingletonTable>,
    pub(crate) constants: RefCell<ConstantTable>,
    pub(crate) frames: RefCell<Vec<FrameId>>,
    pub(crate) next_frame: Cell<u64>,
    pub(crate) current_exception: RefCell<Option<Value>>,
    pub(crate) platform: Rc<dyn Platform>,
    pub(crate) bridge: RefCell<Option<Rc<dyn ForeignBridge>>>,
    pub(crate) stats: RuntimeStats,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Default configuration, process stdio
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_platform(config, Rc::new(StdPlatform::new()))
    }

    pub fn with_platform(config: RuntimeConfig, platform: Rc<dyn Platform>) -> Self {
        Self {
            config,
            classes: RefCell::new(ClassTable::new()),
            singletons: RefCell::new(SingletonTable::default()),
            constants: RefCell::new(ConstantTable::new()),
            frames: RefCell::new(Vec::new()),
            next_frame: Cell::new(1),
            current_exception: RefCell::new(None),
            platform,
            bridge: RefCell::new(None),
            stats: RuntimeStats::default(),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn platform(&self) -> &dyn Platform {
        &*self.platform
    }

    pub fn stats(&self) -> &RuntimeStats {
        &self.stats
    }

    /// Soft failure: one `[runtime]` line on the error stream
    pub fn diagnostic(&self, message: &str) {
        RuntimeStats::bump(&self.stats.soft_failures);
        tracing::debug!(target: "drake_runtime", "soft failure: {}", message);
        if !self.config.quiet {
            let line = format!("[runtime] {}\n", message);
            self.platform.write(Stream::Stderr, line.as_bytes());
        }
    }

    /// Block-taking built-in called without a block
    pub fn missing_block(&self, name: &str, receiver: &Value) -> RtResult<Value> {
        self.diagnostic(&format!("{}#{} requires a block", receiver.kind(), name));
        Ok(Value::Nil)
    }

    /// Invoke a block value; anything else is a soft failure
    pub fn call_block(&self, block: &Value, args: &[Value]) -> RtResult<Value> {
        match block {
            Value::Block(b) => b.call(self, args),
            other => {
                self.diagnostic(&format!("{} is not callable", other.kind()));
                Ok(Value::Nil)
            }
        }
    }

    /// Render for concatenation and interpolation, honouring a user `to_s`
    /// on instances
    pub fn stringify(&self, value: &Value) -> RtResult<String> {
        if let Value::Instance(inst) = value {
            let method = self.classes.borrow().find_method(inst.class, "to_s");
            if let Some((_, method)) = method {
                let rendered = self.call_method(&method, value, &[], None)?;
                return Ok(format::to_string(self, &rendered));
            }
        }
        Ok(format::to_string(self, value))
    }

    /// String interpolation: every part stringified and joined
    pub fn interpolate(&self, parts: &[Value]) -> RtResult<Value> {
        let mut out = String::new();
        for part in parts {
            out.push_str(&self.stringify(part)?);
        }
        Ok(Value::from(out))
    }

    /// Range literal; endpoints that are neither integers nor one-character
    /// strings are a soft failure
    pub fn range(&self, from: &Value, to: &Value, exclusive: bool) -> Value {
        match RangeValue::from_values(from, to, exclusive) {
            Some(range) => Value::Range(range),
            None => {
                self.diagnostic(&format!(
                    "bad range endpoints {} and {}",
                    from.kind(),
                    to.kind()
                ));
                Value::Nil
            }
        }
    }

    /// Write `bytes` to the output (1) or error (2) stream
    pub fn write(&self, stream: Stream, bytes: &[u8]) {
        self.platform.write(stream, bytes);
    }

    /// `puts`-style output of a value's `to_s` plus newline
    pub fn puts(&self, value: &Value) -> RtResult<()> {
        let mut line = self.stringify(value)?;
        line.push('\n');
        self.platform.write(Stream::Stdout, line.as_bytes());
        Ok(())
    }
}
