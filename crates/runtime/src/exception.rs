//! Exception frames
//!
//! A protected region pushes a frame on entry and pops it on every exit.
//! `raise` records the raised value as the current exception and returns an
//! `Unwind` addressed to the innermost frame; the value travels back through
//! `?` until the region owning that frame catches it. With no frame pushed,
//! `raise` is fatal.
//!
//! Compiled code drives frames by hand through the C boundary; Rust callers
//! use `rescue` and `ensure`, which pair push and pop on every path.

use crate::class::Method;
use crate::error::{FrameId, RtResult, Unwind, classes};
use crate::format;
use crate::platform::Stream;
use crate::runtime::{Runtime, RuntimeStats};
use crate::value::{InstanceData, Value};
use std::rc::Rc;

fn error_message(rt: &Runtime, receiver: &Value, _args: &[Value]) -> RtResult<Value> {
    Ok(rt.ivar_get(receiver, "message"))
}

fn error_initialize(rt: &Runtime, receiver: &Value, args: &[Value]) -> RtResult<Value> {
    let message = args.first().cloned().unwrap_or(Value::Nil);
    rt.ivar_set(receiver, "message", message);
    Ok(Value::Nil)
}

impl Runtime {
    pub fn push_exception_frame(&self) -> FrameId {
        let id = FrameId(self.next_frame.get());
        self.next_frame.set(id.0 + 1);
        let depth = {
            let mut frames = self.frames.borrow_mut();
            frames.push(id);
            frames.len()
        };
        if depth > self.stats.peak_frames.get() {
            self.stats.peak_frames.set(depth);
        }
        tracing::trace!(target: "drake_runtime", frame = id.0, depth, "push frame");
        id
    }

    /// Pop the innermost frame; popping an empty stack is a soft failure
    pub fn pop_exception_frame(&self) -> Option<FrameId> {
        let popped = self.frames.borrow_mut().pop();
        match popped {
            Some(id) => tracing::trace!(target: "drake_runtime", frame = id.0, "pop frame"),
            None => self.diagnostic("pop_exception_frame with no frame pushed"),
        }
        popped
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.borrow().len()
    }

    /// Raise `value` towards the innermost frame
    ///
    /// Never returns when no frame is pushed.
    pub fn raise(&self, value: Value) -> Unwind {
        let target = self.frames.borrow().last().copied();
        let Some(frame) = target else {
            let message = format!("Unhandled exception: {}", self.describe_exception(&value));
            self.fatal(&message);
        };
        RuntimeStats::bump(&self.stats.raises);
        tracing::debug!(target: "drake_runtime", frame = frame.0, "raise");
        *self.current_exception.borrow_mut() = Some(value);
        Unwind { frame }
    }

    /// Take the value of the last raise; a second call returns nil
    pub fn get_current_exception(&self) -> Value {
        self.current_exception.borrow_mut().take().unwrap_or(Value::Nil)
    }

    /// Run `body` inside a fresh frame; an unwind addressed to that frame
    /// hands the raised value to `handler`
    pub fn rescue<B, H>(&self, body: B, handler: H) -> RtResult<Value>
    where
        B: FnOnce(&Runtime) -> RtResult<Value>,
        H: FnOnce(&Runtime, Value) -> RtResult<Value>,
    {
        let frame = self.push_exception_frame();
        let result = body(self);
        self.unwind_to(frame);
        match result {
            Err(unwind) if unwind.frame == frame => {
                let exception = self.get_current_exception();
                handler(self, exception)
            }
            other => other,
        }
    }

    /// Run `cleanup` after `body` whether it returned or unwound
    pub fn ensure<B, C>(&self, body: B, cleanup: C) -> RtResult<Value>
    where
        B: FnOnce(&Runtime) -> RtResult<Value>,
        C: FnOnce(&Runtime) -> RtResult<()>,
    {
        let result = body(self);
        // a pending exception survives code run by the cleanup
        let pending = match &result {
            Err(_) => self.current_exception.borrow_mut().take(),
            Ok(_) => None,
        };
        cleanup(self)?;
        if pending.is_some() {
            *self.current_exception.borrow_mut() = pending;
        }
        result
    }

    /// Drop `frame` and anything left above it
    fn unwind_to(&self, frame: FrameId) {
        let mut frames = self.frames.borrow_mut();
        if let Some(pos) = frames.iter().rposition(|f| *f == frame) {
            frames.truncate(pos);
        }
    }

    /// Built-in error class by name, created on first use under
    /// `StandardError` with `initialize(message)` and `message`
    pub fn error_class(&self, name: &str) -> Value {
        if let Some(id) = self.lookup_class(name) {
            return Value::Class(id);
        }
        let class = self.define_class(name);
        if name != classes::STANDARD_ERROR {
            let parent = self.error_class(classes::STANDARD_ERROR);
            self.set_superclass(&class, &parent);
        } else {
            self.define_method(&class, Method::native("initialize", error_initialize));
            self.define_method(&class, Method::native("message", error_message));
        }
        class
    }

    /// Build an instance of the named error class carrying `message`
    pub fn new_error(&self, class_name: &str, message: &str) -> Value {
        let Value::Class(id) = self.error_class(class_name) else {
            return Value::Nil;
        };
        let error = Rc::new(InstanceData::new(id));
        error.ivar_set("message", Value::str(message));
        Value::Instance(error)
    }

    /// Raise a built-in error
    pub fn raise_error(&self, class_name: &str, message: &str) -> Unwind {
        let error = self.new_error(class_name, message);
        self.raise(error)
    }

    /// Write a diagnostic and terminate the process with status 1
    pub fn fatal(&self, message: &str) -> ! {
        tracing::error!(target: "drake_runtime", "fatal: {}", message);
        let line = format!("[runtime] fatal: {}\n", message);
        self.platform.write(Stream::Stderr, line.as_bytes());
        self.platform.flush(Stream::Stdout);
        self.platform.flush(Stream::Stderr);
        std::process::exit(1);
    }

    fn describe_exception(&self, value: &Value) -> String {
        match value {
            Value::Instance(inst) => {
                let class = self.class_name(inst.class);
                match inst.ivar_get("message") {
                    Value::Nil => class,
                    message => format!("{}: {}", class, format::to_string(self, &message)),
                }
            }
            other => format::display(self, other),
        }
    }
}
