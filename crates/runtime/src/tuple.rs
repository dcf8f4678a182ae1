//! Tuples and named tuples
//!
//! Both are immutable once built and compare structurally.

use crate::array;
use crate::error::RtResult;
use crate::map::MapData;
use crate::runtime::Runtime;
use crate::value::Value;
use std::rc::Rc;

#[derive(Debug)]
pub struct NamedTupleData {
    pub keys: Box<[Rc<str>]>,
    pub values: Box<[Value]>,
}

impl NamedTupleData {
    /// Pairs keys with values; extra keys or values are dropped.
    pub fn new(keys: Vec<Rc<str>>, values: Vec<Value>) -> Self {
        let n = keys.len().min(values.len());
        let mut keys = keys;
        let mut values = values;
        keys.truncate(n);
        values.truncate(n);
        Self {
            keys: keys.into_boxed_slice(),
            values: values.into_boxed_slice(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.keys
            .iter()
            .position(|k| &**k == key)
            .map(|i| self.values[i].clone())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn structurally_equal(&self, other: &NamedTupleData) -> bool {
        self.keys == other.keys
            && self.values.len() == other.values.len()
            && self.values.iter().zip(other.values.iter()).all(|(a, b)| a.equals(b))
    }
}

/// Built-in tuple protocol; `None` when `name` is not a tuple method
pub(crate) fn call_tuple_method(
    rt: &Runtime,
    items: &Rc<[Value]>,
    receiver: &Value,
    name: &str,
    args: &[Value],
    block: Option<&Value>,
) -> Option<RtResult<Value>> {
    let result = match name {
        "size" | "length" | "count" => Value::Int64(items.len() as i64),
        "first" => items.first().cloned().unwrap_or(Value::Nil),
        "last" => items.last().cloned().unwrap_or(Value::Nil),
        "[]" | "at" => match args.first().and_then(Value::as_i64) {
            Some(i) => array::get(items, i),
            None => Value::Nil,
        },
        "to_a" => Value::array(items.to_vec()),
        "include?" | "includes?" => {
            let candidate = args.first().cloned().unwrap_or(Value::Nil);
            Value::Bool(array::contains(items, &candidate))
        }
        _ => {
            let items = items.iter().cloned();
            return array::enumerate(rt, receiver, items, name, args, block, Value::tuple);
        }
    };
    Some(Ok(result))
}

/// Built-in named tuple protocol; every key is also an accessor method
pub(crate) fn call_named_tuple_method(
    nt: &NamedTupleData,
    name: &str,
    args: &[Value],
) -> Option<RtResult<Value>> {
    if let Some(value) = nt.get(name) {
        return Some(Ok(value));
    }
    let result = match name {
        "size" | "length" | "count" => Value::Int64(nt.len() as i64),
        "keys" => Value::array(nt.keys.iter().map(|k| Value::Str(k.clone())).collect()),
        "values" => Value::array(nt.values.to_vec()),
        "[]" => index(nt, args.first().unwrap_or(&Value::Nil)),
        "has_key?" | "key?" => {
            let key = args.first().and_then(Value::as_str).unwrap_or("");
            Value::Bool(nt.get(key).is_some())
        }
        "to_h" => {
            let keys: Vec<Value> = nt.keys.iter().map(|k| Value::Str(k.clone())).collect();
            Value::map(MapData::from_pairs(&keys, &nt.values))
        }
        _ => return None,
    };
    Some(Ok(result))
}

/// Index by key name or by position
pub fn index(nt: &NamedTupleData, key: &Value) -> Value {
    match key {
        Value::Str(s) => nt.get(s).unwrap_or(Value::Nil),
        other => match other.as_i64() {
            Some(i) => array::get(&nt.values, i),
            None => Value::Nil,
        },
    }
}
