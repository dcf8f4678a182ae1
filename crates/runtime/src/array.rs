//! Array operations
//!
//! Index semantics shared by `index_get`/`index_set` and the `[]`/`[]=`
//! methods:
//!
//! - a negative index counts from the end (`length + index`)
//! - an out-of-range read yields "nothing"
//! - an out-of-range write past the end grows the array, filling the gap with
//!   "nothing"; a write still negative after wrapping is dropped
//!
//! Higher-order methods (`each`, `map`, `select`, `inject`, `until`, ...)
//! iterate over a snapshot of the elements, so a block that pushes onto the
//! array it is iterating does not see its own additions.

use crate::error::RtResult;
use crate::format;
use crate::operators::BinaryOp;
use crate::range::RangeValue;
use crate::runtime::Runtime;
use crate::value::{ArrayRef, Value};

fn resolve_index(len: usize, index: i64) -> i64 {
    if index < 0 { len as i64 + index } else { index }
}

/// Read with negative wrap; out of range is "nothing"
pub fn get(items: &[Value], index: i64) -> Value {
    let idx = resolve_index(items.len(), index);
    if idx < 0 || idx as usize >= items.len() {
        return Value::Nil;
    }
    items[idx as usize].clone()
}

/// Write with negative wrap and auto-extension
pub fn set(items: &mut Vec<Value>, index: i64, value: Value) {
    let idx = resolve_index(items.len(), index);
    if idx < 0 {
        return;
    }
    let idx = idx as usize;
    if idx >= items.len() {
        items.resize(idx + 1, Value::Nil);
    }
    items[idx] = value;
}

/// Elements covered by `range`, endpoints wrapping like indices
pub fn slice_range(items: &[Value], range: &RangeValue) -> Value {
    let len = items.len() as i64;
    let start = resolve_index(items.len(), range.from);
    let mut end = resolve_index(items.len(), range.to);
    if !range.exclusive {
        end = end.saturating_add(1);
    }
    if start < 0 || start > len {
        return Value::Nil;
    }
    let end = end.clamp(start, len);
    Value::array(items[start as usize..end as usize].to_vec())
}

pub fn push(array: &ArrayRef, value: Value) {
    array.borrow_mut().push(value);
}

/// Remove the last element; "nothing" when empty
pub fn pop(array: &ArrayRef) -> Value {
    array.borrow_mut().pop().unwrap_or(Value::Nil)
}

// =============================================================================
// Enumerable helpers (shared with ranges, sets and tuples)
// =============================================================================

pub(crate) fn each<I>(rt: &Runtime, items: I, block: &Value) -> RtResult<()>
where
    I: IntoIterator<Item = Value>,
{
    for item in items {
        rt.call_block(block, std::slice::from_ref(&item))?;
    }
    Ok(())
}

pub(crate) fn map_items<I>(rt: &Runtime, items: I, block: &Value) -> RtResult<Vec<Value>>
where
    I: IntoIterator<Item = Value>,
{
    let mut out = Vec::new();
    for item in items {
        out.push(rt.call_block(block, std::slice::from_ref(&item))?);
    }
    Ok(out)
}

pub(crate) fn each_with_index<I>(rt: &Runtime, items: I, block: &Value) -> RtResult<()>
where
    I: IntoIterator<Item = Value>,
{
    for (i, item) in items.into_iter().enumerate() {
        rt.call_block(block, &[item, Value::Int64(i as i64)])?;
    }
    Ok(())
}

/// Keep the elements for which the block's truthiness equals `keep`
pub(crate) fn filter_items<I>(
    rt: &Runtime,
    items: I,
    block: &Value,
    keep: bool,
) -> RtResult<Vec<Value>>
where
    I: IntoIterator<Item = Value>,
{
    let mut out = Vec::new();
    for item in items {
        if rt.call_block(block, std::slice::from_ref(&item))?.is_truthy() == keep {
            out.push(item);
        }
    }
    Ok(out)
}

/// Left fold. Without a seed the first element becomes the accumulator and
/// is not passed to the block; an empty input with no seed is "nothing".
pub(crate) fn inject<I>(
    rt: &Runtime,
    items: I,
    seed: Option<&Value>,
    block: &Value,
) -> RtResult<Value>
where
    I: IntoIterator<Item = Value>,
{
    let mut rest = items.into_iter();
    let mut acc = match seed {
        Some(seed) => seed.clone(),
        None => match rest.next() {
            Some(first) => first,
            None => return Ok(Value::Nil),
        },
    };
    for item in rest {
        acc = rt.call_block(block, &[acc, item])?;
    }
    Ok(acc)
}

/// First element for which the block is truthy
pub(crate) fn until<I>(rt: &Runtime, items: I, block: &Value) -> RtResult<Value>
where
    I: IntoIterator<Item = Value>,
{
    for item in items {
        if rt.call_block(block, std::slice::from_ref(&item))?.is_truthy() {
            return Ok(item);
        }
    }
    Ok(Value::Nil)
}

pub(crate) fn contains(items: &[Value], candidate: &Value) -> bool {
    items.iter().any(|item| item.equals(candidate))
}

/// Block-taking methods common to every enumerable kind
///
/// `select`/`reject` results are handed to `wrap` so sets can stay sets.
pub(crate) fn enumerate<I>(
    rt: &Runtime,
    receiver: &Value,
    items: I,
    name: &str,
    args: &[Value],
    block: Option<&Value>,
    wrap: fn(Vec<Value>) -> Value,
) -> Option<RtResult<Value>>
where
    I: IntoIterator<Item = Value>,
{
    match name {
        "each" | "map" | "collect" | "select" | "filter" | "reject" | "inject" | "reduce"
        | "until" | "find" | "detect" | "each_with_index" => {}
        _ => return None,
    }
    let Some(block) = block else {
        return Some(rt.missing_block(name, receiver));
    };
    let result = match name {
        "each" => each(rt, items, block).map(|_| receiver.clone()),
        "each_with_index" => each_with_index(rt, items, block).map(|_| receiver.clone()),
        "map" | "collect" => map_items(rt, items, block).map(Value::array),
        "select" | "filter" => filter_items(rt, items, block, true).map(wrap),
        "reject" => filter_items(rt, items, block, false).map(wrap),
        "inject" | "reduce" => inject(rt, items, args.first(), block),
        _ => until(rt, items, block),
    };
    Some(result)
}

/// Built-in array protocol; `None` when `name` is not an array method
pub(crate) fn call_method(
    rt: &Runtime,
    array: &ArrayRef,
    receiver: &Value,
    name: &str,
    args: &[Value],
    block: Option<&Value>,
) -> Option<RtResult<Value>> {
    let arg0 = args.first().cloned().unwrap_or(Value::Nil);
    let result = match name {
        "length" | "size" | "count" => Value::Int64(array.borrow().len() as i64),
        "empty?" => Value::Bool(array.borrow().is_empty()),
        "first" => array.borrow().first().cloned().unwrap_or(Value::Nil),
        "last" => array.borrow().last().cloned().unwrap_or(Value::Nil),
        "push" | "<<" | "append" => {
            for arg in args {
                push(array, arg.clone());
            }
            receiver.clone()
        }
        "pop" => pop(array),
        "[]" | "at" | "slice" => match (&arg0, arg0.as_i64()) {
            (Value::Range(range), _) => slice_range(&array.borrow(), range),
            (_, Some(i)) => get(&array.borrow(), i),
            _ => Value::Nil,
        },
        "[]=" => {
            let value = args.get(1).cloned().unwrap_or(Value::Nil);
            if let Some(i) = arg0.as_i64() {
                set(&mut array.borrow_mut(), i, value.clone());
            }
            value
        }
        "delete_at" => {
            let mut items = array.borrow_mut();
            match arg0.as_i64().map(|i| resolve_index(items.len(), i)) {
                Some(i) if i >= 0 && (i as usize) < items.len() => items.remove(i as usize),
                _ => Value::Nil,
            }
        }
        "include?" | "includes?" | "contains?" => Value::Bool(contains(&array.borrow(), &arg0)),
        "index" => match array.borrow().iter().position(|v| v.equals(&arg0)) {
            Some(i) => Value::Int64(i as i64),
            None => Value::Nil,
        },
        "join" => {
            let sep = arg0.as_str().unwrap_or("").to_string();
            let parts: Vec<String> = array
                .borrow()
                .iter()
                .map(|v| format::to_string(rt, v))
                .collect();
            Value::from(parts.join(&sep))
        }
        "reverse" => {
            let mut items = array.borrow().clone();
            items.reverse();
            Value::array(items)
        }
        "to_a" => receiver.clone(),
        "sum" => {
            let items = array.borrow().clone();
            let mut acc = Value::Int64(0);
            for item in items {
                match rt.binary_op(BinaryOp::Add, &acc, &item) {
                    Ok(sum) => acc = sum,
                    Err(unwind) => return Some(Err(unwind)),
                }
            }
            acc
        }
        _ => {
            let items = array.borrow().clone();
            return enumerate(rt, receiver, items, name, args, block, Value::array);
        }
    };
    Some(Ok(result))
}
