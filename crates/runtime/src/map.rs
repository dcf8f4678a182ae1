//! Ordered map for the runtime
//!
//! Entries are kept in insertion order and located by a linear value-equality
//! scan, not by hashing. Keys compare the way `==` does at the language
//! level, so two distinct strings with the same content find the same entry,
//! while two distinct arrays never do. Lookup is O(n); a hash-indexed variant
//! would need a key hash consistent with `Value::equals` and must keep the
//! insertion order for iteration.

use crate::error::RtResult;
use crate::runtime::Runtime;
use crate::value::{MapRef, Value};

#[derive(Debug, Clone, Default)]
pub struct MapData {
    entries: Vec<(Value, Value)>,
}

impl MapData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from parallel key/value slices; a repeated key keeps its first
    /// position and its last value.
    pub fn from_pairs(keys: &[Value], values: &[Value]) -> Self {
        let mut map = Self::new();
        for (k, v) in keys.iter().zip(values.iter()) {
            map.insert(k.clone(), v.clone());
        }
        map
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, key: &Value) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k.equals(key))
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.position(key).map(|i| self.entries[i].1.clone())
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.position(key).is_some()
    }

    /// Replace the value of an equal key in place, or append a new entry
    pub fn insert(&mut self, key: Value, value: Value) {
        match self.position(&key) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        self.position(key).map(|i| self.entries.remove(i).1)
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.entries.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> {
        self.entries.iter()
    }
}

/// Built-in map protocol
///
/// Returns `None` when `name` is not a map method so dispatch can continue
/// with the universal built-ins. Blocks receive `(key, value)`.
pub(crate) fn call_method(
    rt: &Runtime,
    map: &MapRef,
    receiver: &Value,
    name: &str,
    args: &[Value],
    block: Option<&Value>,
) -> Option<RtResult<Value>> {
    let arg0 = args.first().cloned().unwrap_or(Value::Nil);
    let result = match name {
        "length" | "size" | "count" => Ok(Value::Int64(map.borrow().len() as i64)),
        "empty?" => Ok(Value::Bool(map.borrow().is_empty())),
        "keys" => Ok(Value::array(map.borrow().keys())),
        "values" => Ok(Value::array(map.borrow().values())),
        "[]" => Ok(map.borrow().get(&arg0).unwrap_or(Value::Nil)),
        "[]=" => {
            let value = args.get(1).cloned().unwrap_or(Value::Nil);
            map.borrow_mut().insert(arg0, value.clone());
            Ok(value)
        }
        "has_key?" | "key?" | "include?" => Ok(Value::Bool(map.borrow().contains_key(&arg0))),
        "fetch" => {
            let found = map.borrow().get(&arg0);
            Ok(found.unwrap_or_else(|| args.get(1).cloned().unwrap_or(Value::Nil)))
        }
        "delete" => Ok(map.borrow_mut().remove(&arg0).unwrap_or(Value::Nil)),
        "each" | "map" | "select" | "inject" | "reduce" | "until" | "find" => {
            let Some(block) = block else {
                return Some(rt.missing_block(name, receiver));
            };
            iterate(rt, map, receiver, name, args, block)
        }
        _ => return None,
    };
    Some(result)
}

fn iterate(
    rt: &Runtime,
    map: &MapRef,
    receiver: &Value,
    name: &str,
    args: &[Value],
    block: &Value,
) -> RtResult<Value> {
    // Snapshot so the block may mutate the map it is iterating
    let entries = map.borrow().entries();
    match name {
        "each" => {
            for (k, v) in entries {
                rt.call_block(block, &[k, v])?;
            }
            Ok(receiver.clone())
        }
        "map" => {
            let mut out = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                out.push(rt.call_block(block, &[k, v])?);
            }
            Ok(Value::array(out))
        }
        "select" => {
            let mut out = MapData::new();
            for (k, v) in entries {
                if rt.call_block(block, &[k.clone(), v.clone()])?.is_truthy() {
                    out.insert(k, v);
                }
            }
            Ok(Value::map(out))
        }
        "inject" | "reduce" => {
            let mut entries = entries.into_iter();
            let mut acc = match args.first() {
                Some(seed) => seed.clone(),
                None => match entries.next() {
                    Some((k, v)) => Value::tuple(vec![k, v]),
                    None => return Ok(Value::Nil),
                },
            };
            for (k, v) in entries {
                acc = rt.call_block(block, &[acc, Value::tuple(vec![k, v])])?;
            }
            Ok(acc)
        }
        _ => {
            for (k, v) in entries {
                if rt.call_block(block, &[k.clone(), v.clone()])?.is_truthy() {
                    return Ok(Value::tuple(vec![k, v]));
                }
            }
            Ok(Value::Nil)
        }
    }
}
