//! C-ABI boundary tests
//!
//! These drive the runtime purely through `drake_rt_*` calls, the way
//! generated code does, to catch regressions in handle conversion and
//! pending-raise propagation.

use drake_runtime::Value;
use drake_runtime::error::{
    drake_rt_exception_clear, drake_rt_exception_pending, drake_rt_exception_target,
};
use drake_runtime::ffi::*;
use std::ffi::{CStr, CString};
use std::ptr;

fn cs(s: &str) -> CString {
    CString::new(s).unwrap()
}

unsafe fn text(h: *mut Value) -> String {
    unsafe { CStr::from_ptr(drake_rt_cstring(h)).to_string_lossy().into_owned() }
}

unsafe extern "C" fn triple(
    _env: *const *mut Value,
    _env_len: usize,
    argc: i64,
    argv: *const *mut Value,
) -> *mut Value {
    unsafe {
        let n = if argc > 0 { drake_rt_unbox_i64(*argv) } else { 0 };
        drake_rt_int64(n * 3)
    }
}

unsafe extern "C" fn base_greet(
    _recv: *mut Value,
    _argc: i64,
    _argv: *const *mut Value,
) -> *mut Value {
    let hello = cs("hello");
    unsafe { drake_rt_string(hello.as_ptr()) }
}

// `def greet; super + " there"; end` on the subclass
unsafe extern "C" fn child_greet(
    recv: *mut Value,
    _argc: i64,
    _argv: *const *mut Value,
) -> *mut Value {
    unsafe {
        let owner_name = cs("Child");
        let owner = drake_rt_define_class(owner_name.as_ptr());
        let greet = cs("greet");
        let base =
            drake_rt_invoke_super(owner, recv, greet.as_ptr(), 0, ptr::null(), ptr::null_mut());
        if drake_rt_exception_pending() {
            return ptr::null_mut();
        }
        let suffix = cs(" there");
        let plus = cs("+");
        drake_rt_binary_op(plus.as_ptr(), base, drake_rt_string(suffix.as_ptr()))
    }
}

// `def each; yield 1; yield 2; end` with the block in the trailing slot
unsafe extern "C" fn yield_twice(
    _recv: *mut Value,
    argc: i64,
    argv: *const *mut Value,
) -> *mut Value {
    unsafe {
        let block = *argv.add(argc as usize - 1);
        let call = cs("call");
        let mut last = ptr::null_mut();
        for n in [1, 2] {
            let args = [drake_rt_int64(n)];
            last = drake_rt_invoke(block, call.as_ptr(), 1, args.as_ptr(), ptr::null_mut());
            if drake_rt_exception_pending() {
                return ptr::null_mut();
            }
        }
        last
    }
}

#[test]
fn test_string_round_trip() {
    unsafe {
        let s = cs("héllo");
        let h = drake_rt_string(s.as_ptr());
        assert_eq!(text(h), "héllo");
        let upcase = cs("upcase");
        let up = drake_rt_invoke(h, upcase.as_ptr(), 0, ptr::null(), ptr::null_mut());
        assert_eq!(text(up), "HÉLLO");
    }
}

#[test]
fn test_extern_block_through_array_map() {
    unsafe {
        let items = [drake_rt_int64(1), drake_rt_int64(2)];
        let arr = drake_rt_array(2, items.as_ptr());
        let block = drake_rt_block(triple, 0, ptr::null());
        let map = cs("map");
        let out = drake_rt_invoke(arr, map.as_ptr(), 0, ptr::null(), block);
        assert_eq!(text(drake_rt_display(out)), "[3, 6]");
    }
}

#[test]
fn test_super_from_extern_method() {
    unsafe {
        let base_name = cs("Base");
        let child_name = cs("Child");
        let base = drake_rt_define_class(base_name.as_ptr());
        let child = drake_rt_define_class(child_name.as_ptr());
        drake_rt_set_superclass(child, base);
        let greet = cs("greet");
        drake_rt_define_method(base, greet.as_ptr(), base_greet, false);
        drake_rt_define_method(child, greet.as_ptr(), child_greet, false);

        let new = cs("new");
        let obj = drake_rt_invoke(child, new.as_ptr(), 0, ptr::null(), ptr::null_mut());
        let got = drake_rt_invoke(obj, greet.as_ptr(), 0, ptr::null(), ptr::null_mut());
        assert_eq!(text(got), "hello there");
    }
}

#[test]
fn test_block_slot_for_extern_method() {
    unsafe {
        let name = cs("Pair");
        let class = drake_rt_define_class(name.as_ptr());
        let each = cs("each");
        drake_rt_define_method(class, each.as_ptr(), yield_twice, true);

        let new = cs("new");
        let pair = drake_rt_invoke(class, new.as_ptr(), 0, ptr::null(), ptr::null_mut());
        let block = drake_rt_block(triple, 0, ptr::null());
        let got = drake_rt_invoke(pair, each.as_ptr(), 0, ptr::null(), block);
        assert_eq!(drake_rt_unbox_i64(got), 6);
    }
}

#[test]
fn test_landing_pad_protocol() {
    unsafe {
        // begin; 1 / 0; rescue ZeroDivisionError => e; e.message; end
        let frame = drake_rt_push_frame();
        let slash = cs("/");
        let got = drake_rt_binary_op(slash.as_ptr(), drake_rt_int64(1), drake_rt_int64(0));
        assert!(got.is_null());
        assert!(drake_rt_exception_pending());
        assert_eq!(drake_rt_exception_target(), frame);

        drake_rt_exception_clear();
        drake_rt_pop_frame();
        let error = drake_rt_current_exception();
        let zde = cs("ZeroDivisionError");
        let path = [zde.as_ptr()];
        let class = drake_rt_constant_lookup(1, path.as_ptr());
        assert!(drake_rt_case_compare(class, error));

        let message = cs("message");
        let msg = drake_rt_invoke(error, message.as_ptr(), 0, ptr::null(), ptr::null_mut());
        assert_eq!(text(msg), "divided by 0");
        assert!(!drake_rt_exception_pending());
    }
}

#[test]
fn test_interpolation_and_ranges() {
    unsafe {
        let range = drake_rt_range(drake_rt_int64(1), drake_rt_int64(4), true);
        let to_a = cs("to_a");
        let arr = drake_rt_invoke(range, to_a.as_ptr(), 0, ptr::null(), ptr::null_mut());

        let label = cs("items: ");
        let parts = [drake_rt_string(label.as_ptr()), arr];
        let s = drake_rt_interpolate(2, parts.as_ptr());
        assert_eq!(text(s), "items: [1, 2, 3]");
    }
}

#[test]
fn test_map_literal_and_index() {
    unsafe {
        let a = cs("a");
        let keys = [drake_rt_string(a.as_ptr())];
        let values = [drake_rt_float(1.5)];
        let map = drake_rt_map(1, keys.as_ptr(), values.as_ptr());
        let hit = drake_rt_index_get(map, keys[0]);
        assert_eq!(drake_rt_unbox_f64(hit), 1.5);

        let b = cs("b");
        assert!(drake_rt_index_get(map, drake_rt_string(b.as_ptr())).is_null());
    }
}
