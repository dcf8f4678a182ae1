//! Exception frames: nested rescue, ensure ordering, operator errors and
//! the fatal path for a raise nobody catches.

use drake_runtime::{CapturePlatform, Method, RtResult, Runtime, RuntimeConfig, Value};
use std::cell::RefCell;
use std::process::Command;
use std::rc::Rc;

const FATAL_CHILD_ENV: &str = "DRAKE_TEST_FATAL_CHILD";

fn capture() -> (Runtime, Rc<CapturePlatform>) {
    let platform = Rc::new(CapturePlatform::new());
    let rt = Runtime::with_platform(RuntimeConfig::default(), platform.clone());
    (rt, platform)
}

fn message_of(rt: &Runtime, error: &Value) -> Value {
    rt.invoke(error, "message", &[], None).unwrap()
}

fn explode(rt: &Runtime, _recv: &Value, _args: &[Value]) -> RtResult<Value> {
    Err(rt.raise_error("ArgumentError", "bad fuse"))
}

#[test]
fn test_raise_from_method_reaches_rescue() {
    let (rt, _) = capture();
    let bomb = rt.define_class("Bomb");
    rt.define_method(&bomb, Method::native("explode", explode));
    let b = rt.invoke(&bomb, "new", &[], None).unwrap();

    let got = rt
        .rescue(
            |rt| {
                rt.invoke(&b, "explode", &[], None)?;
                Ok(Value::str("not reached"))
            },
            |rt, error| Ok(message_of(rt, &error)),
        )
        .unwrap();
    assert_eq!(got, Value::str("bad fuse"));
    assert_eq!(rt.frame_depth(), 0);
}

#[test]
fn test_inner_rescue_catches_first() {
    let (rt, _) = capture();
    let outer_hit = Rc::new(RefCell::new(false));
    let flag = outer_hit.clone();

    let got = rt
        .rescue(
            |rt| {
                rt.rescue(
                    |rt| Err(rt.raise(Value::Int64(1))),
                    |_, value| Ok(value),
                )
            },
            move |_, _| {
                *flag.borrow_mut() = true;
                Ok(Value::Nil)
            },
        )
        .unwrap();
    assert_eq!(got, Value::Int64(1));
    assert!(!*outer_hit.borrow());
}

#[test]
fn test_reraise_from_handler_goes_outward() {
    let (rt, _) = capture();
    let got = rt
        .rescue(
            |rt| {
                rt.rescue(
                    |rt| Err(rt.raise(Value::str("first"))),
                    |rt, _| Err(rt.raise(Value::str("second"))),
                )
            },
            |_, value| Ok(value),
        )
        .unwrap();
    assert_eq!(got, Value::str("second"));
}

#[test]
fn test_ensure_runs_before_outer_handler() {
    let (rt, platform) = capture();
    let got = rt
        .rescue(
            |rt| {
                rt.ensure(
                    |rt| Err(rt.raise(Value::str("boom"))),
                    |rt| rt.puts(&Value::str("cleanup")),
                )
            },
            |rt, value| {
                rt.puts(&Value::str("handler"))?;
                Ok(value)
            },
        )
        .unwrap();
    assert_eq!(got, Value::str("boom"));
    assert_eq!(platform.stdout_string(), "cleanup\nhandler\n");
}

#[test]
fn test_operator_errors_are_typed() {
    let (rt, _) = capture();
    let zero_div = rt.error_class("ZeroDivisionError");
    let type_error = rt.error_class("TypeError");
    let standard = rt.error_class("StandardError");

    let caught = rt
        .rescue(
            |rt| rt.binary_op_symbol("%", &Value::Int64(7), &Value::Int64(0)),
            |_, error| Ok(error),
        )
        .unwrap();
    assert!(rt.case_compare(&zero_div, &caught).unwrap());
    assert!(rt.case_compare(&standard, &caught).unwrap());
    assert_eq!(message_of(&rt, &caught), Value::str("divided by 0"));

    let caught = rt
        .rescue(
            |rt| rt.binary_op_symbol("-", &Value::str("a"), &Value::Int64(1)),
            |_, error| Ok(error),
        )
        .unwrap();
    assert!(rt.case_compare(&type_error, &caught).unwrap());
}

#[test]
fn test_integer_and_string_extremes() {
    let (rt, platform) = capture();
    let min = Value::Int64(i64::MIN);
    let quotient = rt.binary_op_symbol("//", &min, &Value::Int64(-1)).unwrap();
    assert_eq!(quotient, min);

    let sliced = rt
        .invoke(&Value::str("hello"), "slice", &[Value::Int64(1), Value::Int64(i64::MAX)], None)
        .unwrap();
    assert_eq!(sliced, Value::str("ello"));

    let argument_error = rt.error_class("ArgumentError");
    let caught = rt
        .rescue(
            |rt| rt.binary_op_symbol("*", &Value::str("ab"), &Value::Int64(i64::MAX)),
            |_, error| Ok(error),
        )
        .unwrap();
    assert!(rt.case_compare(&argument_error, &caught).unwrap());
    assert!(platform.stderr_string().is_empty());
}

#[test]
fn test_user_error_subclass() {
    let (rt, _) = capture();
    let standard = rt.error_class("StandardError");
    let custom = rt.define_class("ConfigMissing");
    rt.set_superclass(&custom, &standard);

    let got = rt
        .rescue(
            |rt| {
                let error = rt.invoke(&custom, "new", &[Value::str("no file")], None)?;
                Err(rt.raise(error))
            },
            |rt, error| Ok(message_of(rt, &error)),
        )
        .unwrap();
    assert_eq!(got, Value::str("no file"));
}

/// Child half of `test_unhandled_raise_exits_with_status_1`
#[test]
fn fatal_child() {
    if std::env::var_os(FATAL_CHILD_ENV).is_none() {
        return;
    }
    let rt = Runtime::new();
    let _ = rt.raise_error("TypeError", "nobody home");
    unreachable!("raise without a frame must terminate");
}

#[test]
fn test_unhandled_raise_exits_with_status_1() {
    let exe = std::env::current_exe().unwrap();
    let output = Command::new(exe)
        .args(["fatal_child", "--exact", "--nocapture"])
        .env(FATAL_CHILD_ENV, "1")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("[runtime] fatal: Unhandled exception: TypeError: nobody home"),
        "stderr was: {}",
        stderr
    );
}
