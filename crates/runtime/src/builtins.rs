//! Built-in methods for primitive receivers
//!
//! Strings, numbers, booleans and enum members answer a fixed table of
//! methods. `call_universal` holds the methods every receiver answers once
//! class lookup has failed.

use crate::error::RtResult;
use crate::format;
use crate::operators::BinaryOp;
use crate::runtime::Runtime;
use crate::value::{EnumMember, Value};
use std::rc::Rc;

/// String, numeric, boolean and enum built-ins
pub(crate) fn call_primitive(
    rt: &Runtime,
    receiver: &Value,
    name: &str,
    args: &[Value],
    block: Option<&Value>,
) -> Option<RtResult<Value>> {
    match receiver {
        Value::Str(s) => string_method(rt, s, name, args),
        Value::Int32(_) | Value::Int64(_) | Value::Float(_) => {
            numeric_method(rt, receiver, name, block)
        }
        Value::Bool(b) => match name {
            "!" | "not" => Some(Ok(Value::Bool(!b))),
            "&" => Some(Ok(Value::Bool(*b && arg_truthy(args)))),
            "|" => Some(Ok(Value::Bool(*b || arg_truthy(args)))),
            "^" => Some(Ok(Value::Bool(*b != arg_truthy(args)))),
            _ => None,
        },
        Value::Enum(member) => enum_method(rt, member, name),
        _ => None,
    }
}

fn arg_truthy(args: &[Value]) -> bool {
    args.first().is_some_and(Value::is_truthy)
}

fn string_method(rt: &Runtime, s: &str, name: &str, args: &[Value]) -> Option<RtResult<Value>> {
    let arg0 = args.first().cloned().unwrap_or(Value::Nil);
    let result = match name {
        "length" | "size" => Value::Int64(s.chars().count() as i64),
        "bytesize" => Value::Int64(s.len() as i64),
        "upcase" => Value::from(s.to_uppercase()),
        "downcase" => Value::from(s.to_lowercase()),
        "capitalize" => {
            let mut chars = s.chars();
            let out = match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            };
            Value::from(out)
        }
        "strip" => Value::str(s.trim()),
        "lstrip" => Value::str(s.trim_start()),
        "rstrip" => Value::str(s.trim_end()),
        "chomp" => {
            let trimmed = s.strip_suffix('\n').map(|t| t.strip_suffix('\r').unwrap_or(t));
            Value::str(trimmed.unwrap_or(s))
        }
        "slice" | "[]" => slice(s, args),
        "inspect" => Value::from(format::display(rt, &Value::str(s))),
        "to_s" | "to_str" => Value::str(s),
        "empty?" => Value::Bool(s.is_empty()),
        "reverse" => Value::from(s.chars().rev().collect::<String>()),
        "to_i" => Value::Int64(parse_leading_int(s)),
        "to_f" => Value::Float(parse_leading_float(s)),
        "to_sym" => Value::str(s),
        "include?" | "includes?" | "contains?" => {
            Value::Bool(arg0.as_str().is_some_and(|needle| s.contains(needle)))
        }
        "start_with?" | "starts_with?" => {
            Value::Bool(arg0.as_str().is_some_and(|p| s.starts_with(p)))
        }
        "end_with?" | "ends_with?" => Value::Bool(arg0.as_str().is_some_and(|p| s.ends_with(p))),
        "index" => match arg0.as_str().and_then(|needle| s.find(needle)) {
            Some(byte) => Value::Int64(s[..byte].chars().count() as i64),
            None => Value::Nil,
        },
        "chars" => Value::array(s.chars().map(|c| Value::from(c.to_string())).collect()),
        "lines" => Value::array(s.lines().map(Value::str).collect()),
        "split" => {
            let parts: Vec<Value> = match arg0.as_str() {
                Some(sep) if !sep.is_empty() => s.split(sep).map(Value::str).collect(),
                _ => s.split_whitespace().map(Value::str).collect(),
            };
            Value::array(parts)
        }
        "*" => match arg0.as_i64() {
            Some(n) => return Some(rt.repeat_str(s, n)),
            None => return None,
        },
        _ => return None,
    };
    Some(Ok(result))
}

/// `slice(start, len)`, `slice(range)` and `slice(index)`, counted in
/// characters; negative positions count from the end
fn slice(s: &str, args: &[Value]) -> Value {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len() as i64;
    let wrap = |i: i64| if i < 0 { len + i } else { i };

    let (start, count) = match (args.first(), args.get(1)) {
        (Some(Value::Range(r)), _) => {
            let start = wrap(r.from);
            let mut end = wrap(r.to);
            if !r.exclusive {
                end = end.saturating_add(1);
            }
            (start, end.saturating_sub(start).max(0))
        }
        (Some(start), Some(count)) => match (start.as_i64(), count.as_i64()) {
            (Some(start), Some(count)) if count >= 0 => (wrap(start), count),
            _ => return Value::Nil,
        },
        (Some(index), None) => match index.as_i64().map(wrap) {
            Some(i) if i >= 0 && i < len => return Value::from(chars[i as usize].to_string()),
            _ => return Value::Nil,
        },
        (None, _) => return Value::Nil,
    };
    if start < 0 || start > len {
        return Value::Nil;
    }
    let end = start.saturating_add(count).min(len);
    Value::from(chars[start as usize..end as usize].iter().collect::<String>())
}

fn parse_leading_int(s: &str) -> i64 {
    let t = s.trim_start();
    let end = t
        .char_indices()
        .take_while(|&(i, c)| c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    t[..end].parse().unwrap_or(0)
}

fn parse_leading_float(s: &str) -> f64 {
    let t = s.trim_start();
    let mut best = 0.0;
    for (i, c) in t.char_indices() {
        if let Ok(f) = t[..i + c.len_utf8()].parse::<f64>() {
            best = f;
        } else if !matches!(c, '-' | '+' | '.' | 'e' | 'E') && !c.is_ascii_digit() {
            break;
        }
    }
    best
}

fn numeric_method(
    rt: &Runtime,
    receiver: &Value,
    name: &str,
    block: Option<&Value>,
) -> Option<RtResult<Value>> {
    let result = match (receiver, name) {
        (_, "to_s") => Value::from(format::to_string(rt, receiver)),
        (_, "inspect") => Value::from(format::display(rt, receiver)),
        (Value::Float(f), "to_i" | "to_int" | "truncate") => Value::Int64(*f as i64),
        (_, "to_i" | "to_int") => Value::Int64(receiver.as_i64()?),
        (_, "to_f") => Value::Float(receiver.as_f64()?),
        (Value::Float(f), "abs") => Value::Float(f.abs()),
        (_, "abs") => Value::Int64(receiver.as_i64()?.wrapping_abs()),
        (Value::Float(f), "floor") => Value::Int64(f.floor() as i64),
        (Value::Float(f), "ceil") => Value::Int64(f.ceil() as i64),
        (Value::Float(f), "round") => Value::Int64(f.round() as i64),
        (Value::Float(f), "nan?") => Value::Bool(f.is_nan()),
        (Value::Float(f), "zero?") => Value::Bool(*f == 0.0),
        (_, "zero?") => Value::Bool(receiver.as_i64()? == 0),
        (_, "even?") => Value::Bool(receiver.as_i64()? % 2 == 0),
        (_, "odd?") => Value::Bool(receiver.as_i64()? % 2 != 0),
        (_, "succ" | "next") => Value::Int64(receiver.as_i64()?.wrapping_add(1)),
        (_, "pred") => Value::Int64(receiver.as_i64()?.wrapping_sub(1)),
        (_, "chr") => {
            let code = u32::try_from(receiver.as_i64()?).ok();
            code.and_then(char::from_u32)
                .map(|c| Value::from(c.to_string()))
                .unwrap_or(Value::Nil)
        }
        (_, "times") => {
            let n = receiver.as_i64()?;
            let Some(block) = block else {
                return Some(rt.missing_block(name, receiver));
            };
            for i in 0..n.max(0) {
                if let Err(unwind) = rt.call_block(block, &[Value::Int64(i)]) {
                    return Some(Err(unwind));
                }
            }
            receiver.clone()
        }
        _ => return None,
    };
    Some(Ok(result))
}

fn enum_method(rt: &Runtime, member: &Rc<EnumMember>, name: &str) -> Option<RtResult<Value>> {
    let result = match name {
        "value" | "to_i" | "ordinal" => Value::Int64(member.value),
        "name" | "to_s" => Value::Str(member.name.clone()),
        "inspect" => Value::from(format::display(rt, &Value::Enum(member.clone()))),
        "class" => Value::Class(member.class),
        _ => return None,
    };
    Some(Ok(result))
}

/// Methods every receiver answers after class lookup has failed
pub(crate) fn call_universal(
    rt: &Runtime,
    receiver: &Value,
    name: &str,
    args: &[Value],
) -> Option<RtResult<Value>> {
    let arg0 = args.first().cloned().unwrap_or(Value::Nil);
    if let Some(op) = BinaryOp::from_symbol(name) {
        return Some(rt.binary_op(op, receiver, &arg0));
    }
    let result = match name {
        "to_s" => Value::from(format::to_string(rt, receiver)),
        "inspect" => Value::from(format::display(rt, receiver)),
        "nil?" | "is_nil?" => Value::Bool(false),
        "equal?" | "same?" => Value::Bool(receiver.identical(&arg0)),
        "===" => return Some(rt.case_compare(receiver, &arg0).map(Value::Bool)),
        "class" => match receiver {
            Value::Instance(inst) => Value::Class(inst.class),
            Value::Enum(member) => Value::Class(member.class),
            other => Value::str(other.kind().name()),
        },
        "is_a?" | "kind_of?" => Value::Bool(is_a(rt, receiver, &arg0)),
        "instance_of?" => Value::Bool(match (receiver, &arg0) {
            (Value::Instance(inst), Value::Class(id)) => inst.class == *id,
            _ => false,
        }),
        "respond_to?" => {
            let method = arg0.as_str().unwrap_or("");
            Value::Bool(rt.responds_to(receiver, method))
        }
        "dup" | "itself" | "freeze" => receiver.clone(),
        _ => return None,
    };
    Some(Ok(result))
}

fn is_a(rt: &Runtime, value: &Value, class: &Value) -> bool {
    match (value, class) {
        (Value::Instance(inst), Value::Class(id)) => rt.is_subclass_of(inst.class, *id),
        (Value::Enum(member), Value::Class(id)) => member.class == *id,
        (other, Value::Str(kind_name)) => other.kind().name() == &**kind_name,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;
    use crate::error::classes;
    use crate::range::RangeValue;

    fn call(rt: &Runtime, recv: &Value, name: &str, args: &[Value]) -> Value {
        rt.invoke(recv, name, args, None).unwrap()
    }

    fn sum_into(_rt: &Runtime, env: &[Value], args: &[Value]) -> RtResult<Value> {
        if let Some(Value::Array(acc)) = env.first() {
            acc.borrow_mut().push(args[0].clone());
        }
        Ok(Value::Nil)
    }

    #[test]
    fn test_string_basics() {
        let rt = Runtime::new();
        let s = Value::str("  Héllo ");
        assert_eq!(call(&rt, &s, "length", &[]), Value::Int64(8));
        assert_eq!(call(&rt, &s, "strip", &[]), Value::str("Héllo"));
        assert_eq!(call(&rt, &Value::str("abc"), "upcase", &[]), Value::str("ABC"));
        assert_eq!(call(&rt, &Value::str("ABC"), "downcase", &[]), Value::str("abc"));
        assert_eq!(call(&rt, &Value::str("hi"), "inspect", &[]), Value::str("\"hi\""));
        assert_eq!(call(&rt, &Value::str("abc"), "reverse", &[]), Value::str("cba"));
    }

    #[test]
    fn test_string_slice() {
        let rt = Runtime::new();
        let s = Value::str("hello world");
        assert_eq!(
            call(&rt, &s, "slice", &[Value::Int64(0), Value::Int64(5)]),
            Value::str("hello")
        );
        assert_eq!(
            call(&rt, &s, "slice", &[Value::Int64(-5), Value::Int64(5)]),
            Value::str("world")
        );
        assert_eq!(
            call(&rt, &s, "slice", &[Value::Int64(6), Value::Int64(99)]),
            Value::str("world")
        );
        assert!(call(&rt, &s, "slice", &[Value::Int64(40), Value::Int64(1)]).is_nil());

        let range = Value::Range(RangeValue::new(0, 4, false));
        assert_eq!(call(&rt, &s, "slice", &[range]), Value::str("hello"));
        let range = Value::Range(RangeValue::new(0, 4, true));
        assert_eq!(call(&rt, &s, "slice", &[range]), Value::str("hell"));
        let range = Value::Range(RangeValue::new(-5, -1, false));
        assert_eq!(call(&rt, &s, "slice", &[range]), Value::str("world"));
    }

    #[test]
    fn test_string_conversions() {
        let rt = Runtime::new();
        assert_eq!(call(&rt, &Value::str("42abc"), "to_i", &[]), Value::Int64(42));
        assert_eq!(call(&rt, &Value::str("-7"), "to_i", &[]), Value::Int64(-7));
        assert_eq!(call(&rt, &Value::str("x"), "to_i", &[]), Value::Int64(0));
        assert_eq!(call(&rt, &Value::str("2.5kg"), "to_f", &[]), Value::Float(2.5));
        let parts = call(&rt, &Value::str("a b  c"), "split", &[]);
        assert_eq!(format::to_string(&rt, &parts), "[\"a\", \"b\", \"c\"]");
        let parts = call(&rt, &Value::str("a,b"), "split", &[Value::str(",")]);
        assert_eq!(format::to_string(&rt, &parts), "[\"a\", \"b\"]");
    }

    #[test]
    fn test_numeric() {
        let rt = Runtime::new();
        assert_eq!(call(&rt, &Value::Int32(-3), "abs", &[]), Value::Int64(3));
        assert_eq!(call(&rt, &Value::Int64(4), "even?", &[]), Value::Bool(true));
        assert_eq!(call(&rt, &Value::Float(2.7), "to_i", &[]), Value::Int64(2));
        assert_eq!(call(&rt, &Value::Int64(2), "to_f", &[]), Value::Float(2.0));
        assert_eq!(call(&rt, &Value::Float(2.0), "to_s", &[]), Value::str("2"));
        assert_eq!(call(&rt, &Value::Int64(9), "succ", &[]), Value::Int64(10));
    }

    #[test]
    fn test_times_yields_indices() {
        let rt = Runtime::new();
        let acc = Value::array(vec![]);
        let block = Value::from(Block::native(sum_into, vec![acc.clone()]));
        let got = rt.invoke(&Value::Int64(3), "times", &[], Some(&block)).unwrap();
        assert_eq!(got, Value::Int64(3));
        assert_eq!(format::to_string(&rt, &acc), "[0, 1, 2]");
    }

    #[test]
    fn test_enum_members() {
        let rt = Runtime::new();
        let color = rt.define_class("Color");
        let green = rt.define_enum_member(&color, "GREEN", 1);
        assert_eq!(call(&rt, &green, "value", &[]), Value::Int64(1));
        assert_eq!(call(&rt, &green, "to_s", &[]), Value::str("GREEN"));
        assert_eq!(call(&rt, &green, "class", &[]), color);
        assert_eq!(call(&rt, &green, "is_a?", &[color.clone()]), Value::Bool(true));
    }

    #[test]
    fn test_universal() {
        let rt = Runtime::new();
        let arr = Value::array(vec![]);
        assert_eq!(call(&rt, &arr, "nil?", &[]), Value::Bool(false));
        assert_eq!(call(&rt, &arr, "equal?", &[arr.clone()]), Value::Bool(true));
        assert_eq!(call(&rt, &arr, "==", &[Value::array(vec![])]), Value::Bool(false));
        assert_eq!(call(&rt, &Value::Int64(1), "class", &[]), Value::str("Int64"));
        assert_eq!(call(&rt, &Value::Int64(2), "+", &[Value::Int64(3)]), Value::Int64(5));
        assert_eq!(call(&rt, &arr, "is_a?", &[Value::str("Array")]), Value::Bool(true));
    }

    #[test]
    fn test_string_bounds_at_integer_extremes() {
        let rt = Runtime::new();
        let s = Value::str("hello");
        assert_eq!(
            call(&rt, &s, "slice", &[Value::Int64(1), Value::Int64(i64::MAX)]),
            Value::str("ello")
        );
        assert!(call(&rt, &s, "slice", &[Value::Int64(i64::MIN), Value::Int64(2)]).is_nil());
        assert_eq!(call(&rt, &Value::str("ab"), "*", &[Value::Int64(-3)]), Value::str(""));

        let argument_error = rt.error_class(classes::ARGUMENT_ERROR);
        let caught = rt
            .rescue(
                |rt| rt.invoke(&Value::str("ab"), "*", &[Value::Int64(i64::MAX)], None),
                |_, error| Ok(error),
            )
            .unwrap();
        assert!(rt.case_compare(&argument_error, &caught).unwrap());
    }
}
