//! End-to-end dispatch scenarios
//!
//! Each test builds a small program's worth of classes, methods and
//! constants the way generated code would, then drives it through
//! `Runtime::invoke` and the operator entry points.

use drake_runtime::{Block, CapturePlatform, Method, RtResult, Runtime, RuntimeConfig, Value};
use std::rc::Rc;

fn capture() -> (Runtime, Rc<CapturePlatform>) {
    let platform = Rc::new(CapturePlatform::new());
    let rt = Runtime::with_platform(RuntimeConfig::default(), platform.clone());
    (rt, platform)
}

// arrays compare by identity, so assertions look at the elements
fn items_of(array: &Value) -> Vec<Value> {
    match array {
        Value::Array(items) => items.borrow().clone(),
        other => panic!("expected an array, got {:?}", other),
    }
}

fn shape_init(rt: &Runtime, recv: &Value, args: &[Value]) -> RtResult<Value> {
    rt.ivar_set(recv, "size", args.first().cloned().unwrap_or(Value::Int64(1)));
    Ok(Value::Nil)
}

fn shape_area(_rt: &Runtime, _recv: &Value, _args: &[Value]) -> RtResult<Value> {
    Ok(Value::Int64(0))
}

fn square_area(rt: &Runtime, recv: &Value, _args: &[Value]) -> RtResult<Value> {
    let size = rt.ivar_get(recv, "size");
    rt.binary_op_symbol("*", &size, &size)
}

fn shape_to_s(rt: &Runtime, recv: &Value, _args: &[Value]) -> RtResult<Value> {
    let area = rt.invoke(recv, "area", &[], None)?;
    rt.interpolate(&[Value::str("shape of area "), area])
}

fn double(_rt: &Runtime, _env: &[Value], args: &[Value]) -> RtResult<Value> {
    Ok(Value::Int64(args.first().and_then(Value::as_i64).unwrap_or(0) * 2))
}

fn sum(rt: &Runtime, _env: &[Value], args: &[Value]) -> RtResult<Value> {
    rt.binary_op_symbol("+", &args[0], &args[1])
}

fn record_key(_rt: &Runtime, env: &[Value], args: &[Value]) -> RtResult<Value> {
    if let Some(Value::Array(seen)) = env.first() {
        seen.borrow_mut().push(args[0].clone());
    }
    Ok(Value::Nil)
}

fn shapes(rt: &Runtime) -> (Value, Value) {
    let shape = rt.define_class("Shape");
    let square = rt.define_class("Square");
    rt.set_superclass(&square, &shape);
    rt.define_method(&shape, Method::native("initialize", shape_init));
    rt.define_method(&shape, Method::native("area", shape_area));
    rt.define_method(&shape, Method::native("to_s", shape_to_s));
    rt.define_method(&square, Method::native("area", square_area));
    (shape, square)
}

#[test]
fn test_user_to_s_drives_interpolation() {
    let (rt, platform) = capture();
    let (_, square) = shapes(&rt);
    let sq = rt.invoke(&square, "new", &[Value::Int64(3)], None).unwrap();

    rt.puts(&sq).unwrap();
    assert_eq!(platform.stdout_string(), "shape of area 9\n");

    let text = rt.interpolate(&[Value::str("<"), sq, Value::str(">")]).unwrap();
    assert_eq!(text, Value::str("<shape of area 9>"));
}

#[test]
fn test_class_queries() {
    let (rt, _) = capture();
    let (shape, square) = shapes(&rt);
    let sq = rt.invoke(&square, "new", &[], None).unwrap();

    assert_eq!(rt.invoke(&sq, "class", &[], None).unwrap(), square);
    assert_eq!(rt.invoke(&square, "superclass", &[], None).unwrap(), shape);
    assert_eq!(rt.invoke(&sq, "is_a?", &[shape.clone()], None).unwrap(), Value::Bool(true));
    assert_eq!(rt.invoke(&sq, "instance_of?", &[shape], None).unwrap(), Value::Bool(false));
    assert_eq!(
        rt.invoke(&sq, "respond_to?", &[Value::str("area")], None).unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn test_collection_pipeline() {
    let (rt, _) = capture();
    let items = Value::array(vec![Value::Int64(1), Value::Int64(2), Value::Int64(3)]);
    let doubled = rt
        .invoke(&items, "map", &[], Some(&Value::from(Block::native(double, vec![]))))
        .unwrap();
    assert_eq!(
        items_of(&doubled),
        vec![Value::Int64(2), Value::Int64(4), Value::Int64(6)]
    );

    let total = rt
        .invoke(
            &doubled,
            "inject",
            &[Value::Int64(0)],
            Some(&Value::from(Block::native(sum, vec![]))),
        )
        .unwrap();
    assert_eq!(total, Value::Int64(12));
}

#[test]
fn test_map_iterates_in_insertion_order() {
    let (rt, _) = capture();
    let map = Value::map(drake_runtime::MapData::new());
    for key in ["zeta", "alpha", "mid"] {
        rt.index_set(&map, &Value::str(key), &Value::Int64(1)).unwrap();
    }
    let seen = Value::array(vec![]);
    let block = Value::from(Block::native(record_key, vec![seen.clone()]));
    rt.invoke(&map, "each", &[], Some(&block)).unwrap();
    assert_eq!(
        items_of(&seen),
        vec![Value::str("zeta"), Value::str("alpha"), Value::str("mid")]
    );
}

#[test]
fn test_enum_case_dispatch() {
    let (rt, _) = capture();
    let color = rt.define_class("Color");
    let red = rt.define_enum_member(&color, "RED", 0);
    let green = rt.define_enum_member(&color, "GREEN", 1);

    let from_value = rt.invoke(&color, "new", &[Value::Int64(1)], None).unwrap();
    assert_eq!(from_value, green);
    assert!(rt.case_compare(&color, &red).unwrap());
    assert!(rt.case_compare(&green, &from_value).unwrap());
    assert!(!rt.case_compare(&red, &from_value).unwrap());
    assert_eq!(rt.constant_lookup(&["Color", "GREEN"]), green);
}

#[test]
fn test_singleton_on_one_instance_only() {
    let (rt, platform) = capture();
    let (shape, _) = shapes(&rt);
    let a = rt.invoke(&shape, "new", &[], None).unwrap();
    let b = rt.invoke(&shape, "new", &[], None).unwrap();
    rt.define_singleton_method(&a, Method::native("area", |_, _, _| Ok(Value::Int64(42))));

    assert_eq!(rt.invoke(&a, "area", &[], None).unwrap(), Value::Int64(42));
    assert_eq!(rt.invoke(&b, "area", &[], None).unwrap(), Value::Int64(0));
    assert!(platform.stderr_string().is_empty());
}

#[test]
fn test_soft_failures_keep_running() {
    let (rt, platform) = capture();
    let got = rt.invoke(&Value::Int64(5), "frobnicate", &[], None).unwrap();
    assert!(got.is_nil());
    let cmp = rt
        .binary_op_symbol("<", &Value::str("a"), &Value::Int64(1))
        .unwrap();
    assert!(cmp.is_nil());
    assert!(rt.constant_lookup(&["Missing"]).is_nil());

    let errors = platform.stderr_string();
    assert!(errors.contains("[runtime] Method not found: frobnicate on Int64"));
    assert!(errors.contains("[runtime] uninitialized constant Missing"));
    assert_eq!(rt.stats().soft_failures.get(), 3);
}

#[test]
fn test_set_constructor_dedups_seed() {
    let (rt, _) = capture();
    let ctor = Value::SetConstructor(Rc::from("Int32"));
    let seed = Value::array(vec![Value::Int64(1), Value::Int64(1), Value::Int64(2)]);
    let set = rt.invoke(&ctor, "new", &[seed], None).unwrap();
    assert_eq!(rt.invoke(&set, "size", &[], None).unwrap(), Value::Int64(2));
}
