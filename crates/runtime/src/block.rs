//! Block (closure) support
//!
//! A block pairs a function pointer with the environment captured at its
//! creation site. The runtime never inspects the environment; it hands it
//! back to the function on every call together with the argument vector.
//! Arity handling is the compiled function's job: extra arguments are passed
//! through and missing ones are simply absent from the slice.
//!
//! Two calling conventions are supported:
//! - `Native`: a Rust function, used by embedders and tests
//! - `Extern`: a C-ABI function emitted by the compiler (see `ffi`)

use crate::error::RtResult;
use crate::runtime::Runtime;
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

/// Maximum number of captured values allowed in a block environment.
pub const MAX_CAPTURES: usize = 1024;

/// Native block body: `(runtime, env, args)`
pub type BlockFn = fn(&Runtime, &[Value], &[Value]) -> RtResult<Value>;

/// Compiled block body: `(env, env_len, argc, argv) -> result handle`
pub type ExternBlockFn =
    unsafe extern "C" fn(*const *mut Value, usize, i64, *const *mut Value) -> *mut Value;

#[derive(Clone, Copy)]
pub enum BlockCode {
    Native(BlockFn),
    Extern(ExternBlockFn),
}

pub struct Block {
    code: BlockCode,
    env: Rc<[Value]>,
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("env_len", &self.env.len())
            .finish_non_exhaustive()
    }
}

impl Block {
    /// Panics if `env` exceeds `MAX_CAPTURES`; the compiler never emits one.
    pub fn new(code: BlockCode, env: Vec<Value>) -> Self {
        assert!(
            env.len() <= MAX_CAPTURES,
            "block: environment of {} values exceeds MAX_CAPTURES ({})",
            env.len(),
            MAX_CAPTURES
        );
        Self {
            code,
            env: Rc::from(env),
        }
    }

    pub fn native(func: BlockFn, env: Vec<Value>) -> Self {
        Self::new(BlockCode::Native(func), env)
    }

    pub fn env(&self) -> &[Value] {
        &self.env
    }

    pub fn call(&self, rt: &Runtime, args: &[Value]) -> RtResult<Value> {
        match self.code {
            BlockCode::Native(func) => func(rt, &self.env, args),
            BlockCode::Extern(func) => crate::ffi::call_extern_block(rt, func, &self.env, args),
        }
    }
}

impl From<Block> for Value {
    fn from(block: Block) -> Self {
        Value::Block(Rc::new(block))
    }
}
