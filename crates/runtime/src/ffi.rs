//! C-ABI boundary
//!
//! Compiled code talks to the runtime exclusively through these
//! `drake_rt_*` symbols. A value crosses the boundary as a handle: a
//! `*mut Value` allocated by the runtime, with null standing for nil.
//! Handles returned to compiled code are never freed by the runtime.
//!
//! Every thread gets its own `Runtime`, built on first use from the
//! environment (`RuntimeConfig::from_env`). Re-entry from inside an extern
//! method or block reuses the same instance.
//!
//! A raise cannot unwind through C frames. When an operation ends in an
//! `Unwind`, the entry point returns null and parks the unwind in the
//! pending slot (`drake_rt_exception_pending`); compiled code checks it
//! after each call and jumps to its landing pad or returns.

use crate::block::{Block, BlockCode, ExternBlockFn};
use crate::bridge::ForeignBridge;
use crate::class::{ClassId, ExternMethodFn, Method, MethodCode};
use crate::config::RuntimeConfig;
use crate::constants::SEPARATOR;
use crate::error::{RtResult, set_pending_unwind, take_pending_unwind};
use crate::format;
use crate::logging;
use crate::map::MapData;
use crate::platform::Stream;
use crate::runtime::Runtime;
use crate::tuple::NamedTupleData;
use crate::value::Value;
use std::ffi::{CStr, CString, c_char};
use std::ptr;
use std::rc::Rc;

thread_local! {
    static RUNTIME: Runtime = new_runtime();
}

fn new_runtime() -> Runtime {
    let config = RuntimeConfig::from_env();
    logging::init_logging(&config);
    Runtime::with_config(config)
}

/// Run `f` against this thread's runtime
pub fn with_runtime<R>(f: impl FnOnce(&Runtime) -> R) -> R {
    RUNTIME.with(f)
}

// =============================================================================
// Handles
// =============================================================================

pub fn into_handle(value: Value) -> *mut Value {
    match value {
        Value::Nil => ptr::null_mut(),
        other => Box::into_raw(Box::new(other)),
    }
}

/// # Safety
/// `handle` must be null or a handle produced by this runtime.
pub unsafe fn from_handle(handle: *mut Value) -> Value {
    if handle.is_null() {
        Value::Nil
    } else {
        unsafe { (*handle).clone() }
    }
}

/// # Safety
/// `argv` must be null or point to `argc` handles.
unsafe fn handles(argc: i64, argv: *const *mut Value) -> Vec<Value> {
    if argv.is_null() || argc <= 0 {
        return Vec::new();
    }
    (0..argc as usize)
        .map(|i| unsafe { from_handle(*argv.add(i)) })
        .collect()
}

/// # Safety
/// `s` must be null or a valid NUL-terminated string.
unsafe fn c_str(s: *const c_char) -> String {
    if s.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(s).to_string_lossy().into_owned() }
    }
}

fn finish(result: RtResult<Value>) -> *mut Value {
    match result {
        Ok(value) => into_handle(value),
        Err(unwind) => {
            set_pending_unwind(unwind);
            ptr::null_mut()
        }
    }
}

/// Argument handles lent to compiled code for the duration of one call
struct LentHandles(Vec<*mut Value>);

impl LentHandles {
    fn new(values: &[Value]) -> Self {
        Self(values.iter().cloned().map(into_handle).collect())
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn as_ptr(&self) -> *const *mut Value {
        self.0.as_ptr()
    }
}

impl Drop for LentHandles {
    fn drop(&mut self) {
        for &handle in &self.0 {
            if !handle.is_null() {
                drop(unsafe { Box::from_raw(handle) });
            }
        }
    }
}

/// Collect the result of an extern call, turning a pending raise back into
/// an `Unwind`
///
/// # Safety
/// `result` must be null or a handle produced by this runtime.
unsafe fn receive(result: *mut Value) -> RtResult<Value> {
    if let Some(unwind) = take_pending_unwind() {
        return Err(unwind);
    }
    Ok(unsafe { from_handle(result) })
}

pub(crate) fn call_extern_block(
    _rt: &Runtime,
    func: ExternBlockFn,
    env: &[Value],
    args: &[Value],
) -> RtResult<Value> {
    let env = LentHandles::new(env);
    let argv = LentHandles::new(args);
    unsafe {
        let result = func(env.as_ptr(), env.len(), argv.len() as i64, argv.as_ptr());
        receive(result)
    }
}

pub(crate) fn call_extern_method(
    _rt: &Runtime,
    func: ExternMethodFn,
    receiver: &Value,
    args: &[Value],
) -> RtResult<Value> {
    let recv = LentHandles::new(std::slice::from_ref(receiver));
    let argv = LentHandles::new(args);
    let recv_ptr = recv.0.first().copied().unwrap_or(ptr::null_mut());
    unsafe {
        let result = func(recv_ptr, argv.len() as i64, argv.as_ptr());
        receive(result)
    }
}

// =============================================================================
// Boxing and unboxing
// =============================================================================

#[unsafe(no_mangle)]
pub extern "C" fn drake_rt_nil() -> *mut Value {
    ptr::null_mut()
}

#[unsafe(no_mangle)]
pub extern "C" fn drake_rt_int32(n: i32) -> *mut Value {
    into_handle(Value::Int32(n))
}

#[unsafe(no_mangle)]
pub extern "C" fn drake_rt_int64(n: i64) -> *mut Value {
    into_handle(Value::Int64(n))
}

#[unsafe(no_mangle)]
pub extern "C" fn drake_rt_bool(b: bool) -> *mut Value {
    into_handle(Value::Bool(b))
}

#[unsafe(no_mangle)]
pub extern "C" fn drake_rt_float(f: f64) -> *mut Value {
    into_handle(Value::Float(f))
}

/// # Safety
/// `s` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_string(s: *const c_char) -> *mut Value {
    into_handle(Value::from(unsafe { c_str(s) }))
}

/// Opaque struct blob, copied
///
/// # Safety
/// `bytes` must be null or point to `len` readable bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_struct(bytes: *const u8, len: usize) -> *mut Value {
    let data = if bytes.is_null() {
        &[][..]
    } else {
        unsafe { std::slice::from_raw_parts(bytes, len) }
    };
    into_handle(Value::structure(data))
}

/// Kind tag of a handle, in `Kind` declaration order (nil is 0)
///
/// # Safety
/// `h` must be null or a runtime handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_kind(h: *mut Value) -> i32 {
    unsafe { from_handle(h) }.kind() as i32
}

/// Widening unbox; anything that is not an integer reads 0
///
/// # Safety
/// `h` must be null or a runtime handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_unbox_i64(h: *mut Value) -> i64 {
    unsafe { from_handle(h) }.as_i64().unwrap_or(0)
}

/// # Safety
/// `h` must be null or a runtime handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_unbox_i32(h: *mut Value) -> i32 {
    unsafe { from_handle(h) }.as_i32().unwrap_or(0)
}

/// # Safety
/// `h` must be null or a runtime handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_unbox_f64(h: *mut Value) -> f64 {
    unsafe { from_handle(h) }.as_f64().unwrap_or(0.0)
}

/// # Safety
/// `h` must be null or a runtime handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_unbox_bool(h: *mut Value) -> bool {
    unsafe { from_handle(h) }.as_bool().unwrap_or(false)
}

/// NUL-terminated copy of the value's `to_s`, owned by the caller's
/// allocator policy (never freed by the runtime)
///
/// # Safety
/// `h` must be null or a runtime handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_cstring(h: *mut Value) -> *mut c_char {
    let value = unsafe { from_handle(h) };
    let text = with_runtime(|rt| format::to_string(rt, &value));
    CString::new(text.replace('\0', ""))
        .map(CString::into_raw)
        .unwrap_or(ptr::null_mut())
}

// =============================================================================
// Literals
// =============================================================================

/// # Safety
/// `items` must be null or point to `n` handles.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_array(n: i64, items: *const *mut Value) -> *mut Value {
    into_handle(Value::array(unsafe { handles(n, items) }))
}

/// # Safety
/// `keys` and `values` must each be null or point to `n` handles.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_map(
    n: i64,
    keys: *const *mut Value,
    values: *const *mut Value,
) -> *mut Value {
    let keys = unsafe { handles(n, keys) };
    let values = unsafe { handles(n, values) };
    into_handle(Value::map(MapData::from_pairs(&keys, &values)))
}

/// # Safety
/// `items` must be null or point to `n` handles.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_tuple(n: i64, items: *const *mut Value) -> *mut Value {
    into_handle(Value::tuple(unsafe { handles(n, items) }))
}

/// # Safety
/// `keys` must point to `n` NUL-terminated strings and `values` to `n`
/// handles.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_named_tuple(
    n: i64,
    keys: *const *const c_char,
    values: *const *mut Value,
) -> *mut Value {
    let names: Vec<Rc<str>> = if keys.is_null() || n <= 0 {
        Vec::new()
    } else {
        (0..n as usize)
            .map(|i| Rc::from(unsafe { c_str(*keys.add(i)) }))
            .collect()
    };
    let values = unsafe { handles(n, values) };
    into_handle(Value::NamedTuple(Rc::new(NamedTupleData::new(names, values))))
}

/// # Safety
/// `from` and `to` must be null or runtime handles.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_range(
    from: *mut Value,
    to: *mut Value,
    exclusive: bool,
) -> *mut Value {
    let (from, to) = unsafe { (from_handle(from), from_handle(to)) };
    into_handle(with_runtime(|rt| rt.range(&from, &to, exclusive)))
}

/// `Set(T)`: a constructor whose `new` makes sets of `T`
///
/// # Safety
/// `element_type` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_set_constructor(element_type: *const c_char) -> *mut Value {
    let name = unsafe { c_str(element_type) };
    into_handle(Value::SetConstructor(Rc::from(name)))
}

/// # Safety
/// `env` must be null or point to `env_len` handles.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_block(
    func: ExternBlockFn,
    env_len: i64,
    env: *const *mut Value,
) -> *mut Value {
    let env = unsafe { handles(env_len, env) };
    into_handle(Value::from(Block::new(BlockCode::Extern(func), env)))
}

/// String interpolation
///
/// # Safety
/// `parts` must be null or point to `n` handles.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_interpolate(n: i64, parts: *const *mut Value) -> *mut Value {
    let parts = unsafe { handles(n, parts) };
    finish(with_runtime(|rt| rt.interpolate(&parts)))
}

// =============================================================================
// Dispatch
// =============================================================================

/// # Safety
/// `receiver` and `block` must be null or runtime handles, `name` a valid
/// NUL-terminated string, and `argv` null or `argc` handles.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_invoke(
    receiver: *mut Value,
    name: *const c_char,
    argc: i64,
    argv: *const *mut Value,
    block: *mut Value,
) -> *mut Value {
    let receiver = unsafe { from_handle(receiver) };
    let name = unsafe { c_str(name) };
    let args = unsafe { handles(argc, argv) };
    let block = (!block.is_null()).then(|| unsafe { from_handle(block) });
    finish(with_runtime(|rt| {
        rt.invoke(&receiver, &name, &args, block.as_ref())
    }))
}

/// `super` call from a method defined on `owner`
///
/// # Safety
/// As `drake_rt_invoke`; `owner` must be a class handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_invoke_super(
    owner: *mut Value,
    receiver: *mut Value,
    name: *const c_char,
    argc: i64,
    argv: *const *mut Value,
    block: *mut Value,
) -> *mut Value {
    let owner = unsafe { from_handle(owner) };
    let receiver = unsafe { from_handle(receiver) };
    let name = unsafe { c_str(name) };
    let args = unsafe { handles(argc, argv) };
    let block = (!block.is_null()).then(|| unsafe { from_handle(block) });
    finish(with_runtime(|rt| match owner {
        Value::Class(id) => rt.invoke_super(id, &receiver, &name, &args, block.as_ref()),
        other => {
            rt.diagnostic(&format!("super: owner is a {}, not a class", other.kind()));
            Ok(Value::Nil)
        }
    }))
}

/// # Safety
/// `obj` and `key` must be null or runtime handles.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_index_get(obj: *mut Value, key: *mut Value) -> *mut Value {
    let (obj, key) = unsafe { (from_handle(obj), from_handle(key)) };
    finish(with_runtime(|rt| rt.index_get(&obj, &key)))
}

/// # Safety
/// All three must be null or runtime handles.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_index_set(
    obj: *mut Value,
    key: *mut Value,
    value: *mut Value,
) -> *mut Value {
    let (obj, key, value) = unsafe { (from_handle(obj), from_handle(key), from_handle(value)) };
    finish(with_runtime(|rt| rt.index_set(&obj, &key, &value)))
}

/// Binary operator by symbol (`"+"`, `"<=>"`, …)
///
/// # Safety
/// `op` must be a valid NUL-terminated string; `lhs` and `rhs` null or
/// runtime handles.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_binary_op(
    op: *const c_char,
    lhs: *mut Value,
    rhs: *mut Value,
) -> *mut Value {
    let op = unsafe { c_str(op) };
    let (lhs, rhs) = unsafe { (from_handle(lhs), from_handle(rhs)) };
    finish(with_runtime(|rt| rt.binary_op_symbol(&op, &lhs, &rhs)))
}

/// False only for nil and `false`
///
/// # Safety
/// `h` must be null or a runtime handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_is_truthy(h: *mut Value) -> bool {
    unsafe { from_handle(h) }.is_truthy()
}

/// # Safety
/// `pattern` and `value` must be null or runtime handles.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_case_compare(pattern: *mut Value, value: *mut Value) -> bool {
    let (pattern, value) = unsafe { (from_handle(pattern), from_handle(value)) };
    with_runtime(|rt| match rt.case_compare(&pattern, &value) {
        Ok(hit) => hit,
        Err(unwind) => {
            set_pending_unwind(unwind);
            false
        }
    })
}

/// Human-readable rendering with quoted strings
///
/// # Safety
/// `h` must be null or a runtime handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_display(h: *mut Value) -> *mut Value {
    let value = unsafe { from_handle(h) };
    into_handle(Value::from(with_runtime(|rt| format::display(rt, &value))))
}

/// Concatenation rendering, honouring a user `to_s`
///
/// # Safety
/// `h` must be null or a runtime handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_to_string(h: *mut Value) -> *mut Value {
    let value = unsafe { from_handle(h) };
    finish(with_runtime(|rt| rt.stringify(&value).map(Value::from)))
}

// =============================================================================
// Class authoring
// =============================================================================

/// # Safety
/// `name` must be a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_define_class(name: *const c_char) -> *mut Value {
    let name = unsafe { c_str(name) };
    into_handle(with_runtime(|rt| rt.define_class(&name)))
}

/// # Safety
/// `name` must be a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_define_module(name: *const c_char) -> *mut Value {
    let name = unsafe { c_str(name) };
    into_handle(with_runtime(|rt| rt.define_module(&name)))
}

/// # Safety
/// Both must be class handles.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_set_superclass(class: *mut Value, parent: *mut Value) {
    let (class, parent) = unsafe { (from_handle(class), from_handle(parent)) };
    with_runtime(|rt| rt.set_superclass(&class, &parent));
}

/// # Safety
/// `class` must be a class handle and `name` a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_define_method(
    class: *mut Value,
    name: *const c_char,
    func: ExternMethodFn,
    expects_block: bool,
) {
    let class = unsafe { from_handle(class) };
    let method = Method {
        name: Rc::from(unsafe { c_str(name) }),
        code: MethodCode::Extern(func),
        expects_block,
    };
    with_runtime(|rt| rt.define_method(&class, method));
}

/// # Safety
/// `receiver` must be null or a runtime handle and `name` a valid
/// NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_define_singleton_method(
    receiver: *mut Value,
    name: *const c_char,
    func: ExternMethodFn,
    expects_block: bool,
) {
    let receiver = unsafe { from_handle(receiver) };
    let method = Method {
        name: Rc::from(unsafe { c_str(name) }),
        code: MethodCode::Extern(func),
        expects_block,
    };
    with_runtime(|rt| rt.define_singleton_method(&receiver, method));
}

/// # Safety
/// `class` must be a class handle and `name` a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_define_enum_member(
    class: *mut Value,
    name: *const c_char,
    value: i64,
) -> *mut Value {
    let class = unsafe { from_handle(class) };
    let name = unsafe { c_str(name) };
    into_handle(with_runtime(|rt| rt.define_enum_member(&class, &name, value)))
}

/// # Safety
/// Both must be class handles.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_extend(container: *mut Value, module: *mut Value) {
    let (container, module) = unsafe { (from_handle(container), from_handle(module)) };
    with_runtime(|rt| rt.extend(&container, &module));
}

/// # Safety
/// `instance` must be null or a runtime handle and `name` a valid
/// NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_ivar_get(
    instance: *mut Value,
    name: *const c_char,
) -> *mut Value {
    let instance = unsafe { from_handle(instance) };
    let name = unsafe { c_str(name) };
    into_handle(with_runtime(|rt| rt.ivar_get(&instance, &name)))
}

/// # Safety
/// `instance` and `value` must be null or runtime handles and `name` a
/// valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_ivar_set(
    instance: *mut Value,
    name: *const c_char,
    value: *mut Value,
) {
    let instance = unsafe { from_handle(instance) };
    let name = unsafe { c_str(name) };
    let value = unsafe { from_handle(value) };
    with_runtime(|rt| rt.ivar_set(&instance, &name, value));
}

// =============================================================================
// Constants
// =============================================================================

/// # Safety
/// `name` must be a valid NUL-terminated string and `value` null or a
/// runtime handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_define_constant(name: *const c_char, value: *mut Value) {
    let name = unsafe { c_str(name) };
    let value = unsafe { from_handle(value) };
    with_runtime(|rt| rt.define_constant(&name, value));
}

/// Resolve `A::B::C` given as `n` segments
///
/// # Safety
/// `segments` must point to `n` valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_constant_lookup(
    n: i64,
    segments: *const *const c_char,
) -> *mut Value {
    let path: Vec<String> = if segments.is_null() || n <= 0 {
        Vec::new()
    } else {
        (0..n as usize)
            .map(|i| unsafe { c_str(*segments.add(i)) })
            .collect()
    };
    // a single pre-joined segment is accepted too
    let path: Vec<String> = path
        .iter()
        .flat_map(|s| s.split(SEPARATOR).map(String::from).collect::<Vec<_>>())
        .collect();
    into_handle(with_runtime(|rt| rt.constant_lookup(&path)))
}

// =============================================================================
// Exceptions
// =============================================================================

/// Push a frame and return its id (compare with `drake_rt_exception_target`)
#[unsafe(no_mangle)]
pub extern "C" fn drake_rt_push_frame() -> i64 {
    with_runtime(|rt| rt.push_exception_frame().as_u64() as i64)
}

#[unsafe(no_mangle)]
pub extern "C" fn drake_rt_pop_frame() {
    with_runtime(|rt| {
        rt.pop_exception_frame();
    });
}

/// Raise `value`; returns null with the raise pending, or terminates the
/// process when no frame is pushed
///
/// # Safety
/// `value` must be null or a runtime handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_raise(value: *mut Value) -> *mut Value {
    let value = unsafe { from_handle(value) };
    finish(with_runtime(|rt| Err(rt.raise(value))))
}

/// Raise a built-in error class (`ZeroDivisionError`, `TypeError`, …)
///
/// # Safety
/// Both must be valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_raise_error(
    class_name: *const c_char,
    message: *const c_char,
) -> *mut Value {
    let class_name = unsafe { c_str(class_name) };
    let message = unsafe { c_str(message) };
    finish(with_runtime(|rt| Err(rt.raise_error(&class_name, &message))))
}

/// The last raised value, once
#[unsafe(no_mangle)]
pub extern "C" fn drake_rt_current_exception() -> *mut Value {
    into_handle(with_runtime(|rt| rt.get_current_exception()))
}

// =============================================================================
// Platform
// =============================================================================

/// Write the value's `to_s` to stream 1 (stdout) or 2 (stderr)
///
/// # Safety
/// `h` must be null or a runtime handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_write(stream: i64, h: *mut Value) {
    let value = unsafe { from_handle(h) };
    with_runtime(|rt| {
        let Some(stream) = Stream::from_id(stream) else {
            rt.diagnostic(&format!("write to unknown stream {}", stream));
            return;
        };
        match rt.stringify(&value) {
            Ok(text) => rt.write(stream, text.as_bytes()),
            Err(unwind) => set_pending_unwind(unwind),
        }
    });
}

/// # Safety
/// `h` must be null or a runtime handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_puts(h: *mut Value) {
    let value = unsafe { from_handle(h) };
    with_runtime(|rt| {
        if let Err(unwind) = rt.puts(&value) {
            set_pending_unwind(unwind);
        }
    });
}

#[unsafe(no_mangle)]
pub extern "C" fn drake_rt_flush(stream: i64) {
    with_runtime(|rt| match Stream::from_id(stream) {
        Some(stream) => rt.platform().flush(stream),
        None => rt.diagnostic(&format!("flush of unknown stream {}", stream)),
    });
}

/// Next input line, or null at end of input
#[unsafe(no_mangle)]
pub extern "C" fn drake_rt_read_line() -> *mut Value {
    with_runtime(|rt| match rt.platform().read_line() {
        Some(line) => into_handle(Value::from(line)),
        None => ptr::null_mut(),
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn drake_rt_read_all() -> *mut Value {
    into_handle(Value::from(with_runtime(|rt| rt.platform().read_all())))
}

/// Hand the process arguments to the runtime, called from `main`
///
/// # Safety
/// `argv` must point to `argc` valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_args_init(argc: i32, argv: *const *const c_char) {
    let args: Vec<String> = if argv.is_null() || argc <= 0 {
        Vec::new()
    } else {
        (0..argc as usize)
            .map(|i| unsafe { c_str(*argv.add(i)) })
            .collect()
    };
    with_runtime(|rt| rt.platform().set_args(args));
}

#[unsafe(no_mangle)]
pub extern "C" fn drake_rt_argc() -> i64 {
    with_runtime(|rt| rt.platform().args().len() as i64)
}

/// Argument `i`, or null when out of range
#[unsafe(no_mangle)]
pub extern "C" fn drake_rt_argv(i: i64) -> *mut Value {
    with_runtime(|rt| {
        let args = rt.platform().args();
        usize::try_from(i)
            .ok()
            .and_then(|i| args.get(i).cloned())
            .map(|arg| into_handle(Value::from(arg)))
            .unwrap_or(ptr::null_mut())
    })
}

// =============================================================================
// Bridge and report
// =============================================================================

/// Foreign call target: `(name, argc, argv) -> result handle`
pub type ExternBridgeFn = unsafe extern "C" fn(*const c_char, i64, *const *mut Value) -> *mut Value;

struct ExternBridge(ExternBridgeFn);

impl ForeignBridge for ExternBridge {
    fn call(&self, _rt: &Runtime, name: &str, args: &[Value]) -> RtResult<Value> {
        let name = CString::new(name).unwrap_or_default();
        let argv = LentHandles::new(args);
        unsafe {
            let result = (self.0)(name.as_ptr(), argv.len() as i64, argv.as_ptr());
            receive(result)
        }
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn drake_rt_bridge() -> *mut Value {
    into_handle(Value::Bridge)
}

#[unsafe(no_mangle)]
pub extern "C" fn drake_rt_bridge_register(func: ExternBridgeFn) {
    with_runtime(|rt| rt.set_bridge(Rc::new(ExternBridge(func))));
}

/// At-exit report, called from generated `main` before returning
#[unsafe(no_mangle)]
pub extern "C" fn drake_rt_report() {
    with_runtime(|rt| rt.emit_report());
}

/// Owning class of an instance handle, or null
///
/// # Safety
/// `h` must be null or a runtime handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drake_rt_class_of(h: *mut Value) -> *mut Value {
    let value = unsafe { from_handle(h) };
    let class: Option<ClassId> = match &value {
        Value::Instance(inst) => Some(inst.class),
        Value::Enum(member) => Some(member.class),
        Value::Class(id) => Some(*id),
        _ => None,
    };
    class.map(|id| into_handle(Value::Class(id))).unwrap_or(ptr::null_mut())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{clear_pending_unwind, has_pending_unwind};

    fn cs(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    unsafe extern "C" fn speak(
        _recv: *mut Value,
        _argc: i64,
        _argv: *const *mut Value,
    ) -> *mut Value {
        let woof = cs("Woof");
        unsafe { drake_rt_string(woof.as_ptr()) }
    }

    unsafe extern "C" fn add_env(
        env: *const *mut Value,
        env_len: usize,
        argc: i64,
        argv: *const *mut Value,
    ) -> *mut Value {
        unsafe {
            let base = if env_len > 0 { drake_rt_unbox_i64(*env) } else { 0 };
            let arg = if argc > 0 { drake_rt_unbox_i64(*argv) } else { 0 };
            drake_rt_int64(base + arg)
        }
    }

    unsafe extern "C" fn raising_method(
        _recv: *mut Value,
        _argc: i64,
        _argv: *const *mut Value,
    ) -> *mut Value {
        unsafe { drake_rt_raise(drake_rt_int64(99)) }
    }

    #[test]
    fn test_boxing() {
        unsafe {
            assert!(drake_rt_nil().is_null());
            assert_eq!(drake_rt_unbox_i64(drake_rt_int32(-5)), -5);
            assert_eq!(drake_rt_unbox_f64(drake_rt_int64(2)), 2.0);
            assert!(drake_rt_unbox_bool(drake_rt_bool(true)));
            assert!(!drake_rt_is_truthy(ptr::null_mut()));
            assert!(drake_rt_is_truthy(drake_rt_int64(0)));
            assert_eq!(drake_rt_kind(ptr::null_mut()), 0);
        }
    }

    #[test]
    fn test_invoke_extern_method() {
        unsafe {
            let name = cs("Dog");
            let class = drake_rt_define_class(name.as_ptr());
            let speak_name = cs("speak");
            drake_rt_define_method(class, speak_name.as_ptr(), speak, false);

            let new = cs("new");
            let dog = drake_rt_invoke(class, new.as_ptr(), 0, ptr::null(), ptr::null_mut());
            let got = drake_rt_invoke(dog, speak_name.as_ptr(), 0, ptr::null(), ptr::null_mut());
            assert_eq!(from_handle(got), Value::str("Woof"));
        }
    }

    #[test]
    fn test_extern_block_sees_env() {
        unsafe {
            let env = [drake_rt_int64(40)];
            let block = drake_rt_block(add_env, 1, env.as_ptr());
            let call = cs("call");
            let args = [drake_rt_int64(2)];
            let got = drake_rt_invoke(block, call.as_ptr(), 1, args.as_ptr(), ptr::null_mut());
            assert_eq!(drake_rt_unbox_i64(got), 42);
        }
    }

    #[test]
    fn test_raise_through_extern_method() {
        clear_pending_unwind();
        unsafe {
            let frame = drake_rt_push_frame();
            let name = cs("Boom");
            let class = drake_rt_define_class(name.as_ptr());
            let go = cs("go");
            drake_rt_define_singleton_method(class, go.as_ptr(), raising_method, false);

            let got = drake_rt_invoke(class, go.as_ptr(), 0, ptr::null(), ptr::null_mut());
            assert!(got.is_null());
            assert!(has_pending_unwind());
            assert_eq!(crate::error::drake_rt_exception_target(), frame);
            crate::error::drake_rt_exception_clear();
            drake_rt_pop_frame();
            assert_eq!(drake_rt_unbox_i64(drake_rt_current_exception()), 99);
        }
    }

    #[test]
    fn test_operators_and_index() {
        unsafe {
            let plus = cs("+");
            let sum = drake_rt_binary_op(plus.as_ptr(), drake_rt_int64(1), drake_rt_int64(2));
            assert_eq!(drake_rt_unbox_i64(sum), 3);

            let items = [drake_rt_int64(10), drake_rt_int64(20)];
            let arr = drake_rt_array(2, items.as_ptr());
            let last = drake_rt_index_get(arr, drake_rt_int64(-1));
            assert_eq!(drake_rt_unbox_i64(last), 20);
            drake_rt_index_set(arr, drake_rt_int64(0), drake_rt_int64(5));
            assert_eq!(drake_rt_unbox_i64(drake_rt_index_get(arr, drake_rt_int64(0))), 5);
        }
    }

    #[test]
    fn test_constants_and_enums() {
        unsafe {
            let color = cs("Color");
            let class = drake_rt_define_class(color.as_ptr());
            let red = cs("RED");
            let member = drake_rt_define_enum_member(class, red.as_ptr(), 3);

            let path = [color.as_ptr(), red.as_ptr()];
            let found = drake_rt_constant_lookup(2, path.as_ptr());
            assert_eq!(from_handle(found), from_handle(member));

            let joined = cs("Color::RED");
            let path = [joined.as_ptr()];
            let found = drake_rt_constant_lookup(1, path.as_ptr());
            assert_eq!(from_handle(found), from_handle(member));
        }
    }

    #[test]
    fn test_named_tuple_and_display() {
        unsafe {
            let x = cs("x");
            let keys = [x.as_ptr()];
            let values = [drake_rt_int64(1)];
            let nt = drake_rt_named_tuple(1, keys.as_ptr(), values.as_ptr());
            let shown = drake_rt_display(nt);
            assert_eq!(from_handle(shown), Value::str("{x: 1}"));

            let text = drake_rt_cstring(drake_rt_float(0.5));
            assert_eq!(CStr::from_ptr(text).to_str().unwrap(), "0.5");
        }
    }

    #[test]
    fn test_args() {
        unsafe {
            let prog = cs("prog");
            let arg = cs("--flag");
            let argv = [prog.as_ptr(), arg.as_ptr()];
            drake_rt_args_init(2, argv.as_ptr());
            assert_eq!(drake_rt_argc(), 2);
            assert_eq!(from_handle(drake_rt_argv(1)), Value::str("--flag"));
            assert!(drake_rt_argv(2).is_null());
        }
    }
}
