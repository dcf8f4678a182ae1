//! Sets ("bags")
//!
//! Backed by a plain vector; `add` scans for an equal element before
//! appending, so membership is O(n) like map lookup.

use crate::array;
use crate::error::RtResult;
use crate::runtime::Runtime;
use crate::value::{SetRef, Value};
use std::rc::Rc;

#[derive(Debug, Clone, Default)]
pub struct SetData {
    items: Vec<Value>,
    /// Element type named at construction (`Set(Int).new`), informational only
    pub element_type: Option<Rc<str>>,
}

impl SetData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_element_type(element_type: Rc<str>) -> Self {
        Self {
            items: Vec::new(),
            element_type: Some(element_type),
        }
    }

    pub fn from_items(items: impl IntoIterator<Item = Value>) -> Self {
        let mut set = Self::new();
        for item in items {
            set.add(item);
        }
        set
    }

    /// Insert unless an equal element is already present.
    /// Returns whether the element was added.
    pub fn add(&mut self, value: Value) -> bool {
        if self.contains(&value) {
            return false;
        }
        self.items.push(value);
        true
    }

    pub fn contains(&self, value: &Value) -> bool {
        array::contains(&self.items, value)
    }

    pub fn remove(&mut self, value: &Value) -> bool {
        match self.items.iter().position(|v| v.equals(value)) {
            Some(i) => {
                self.items.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.items.clone()
    }
}

fn wrap_set(items: Vec<Value>) -> Value {
    Value::set(SetData::from_items(items))
}

/// Built-in set protocol; `None` when `name` is not a set method
///
/// `select`/`reject` keep the result a Set, `map` erases it to an Array.
pub(crate) fn call_method(
    rt: &Runtime,
    set: &SetRef,
    receiver: &Value,
    name: &str,
    args: &[Value],
    block: Option<&Value>,
) -> Option<RtResult<Value>> {
    let arg0 = args.first().cloned().unwrap_or(Value::Nil);
    let result = match name {
        "add" | "<<" | "push" => {
            set.borrow_mut().add(arg0);
            receiver.clone()
        }
        "add?" => Value::Bool(set.borrow_mut().add(arg0)),
        "delete" => Value::Bool(set.borrow_mut().remove(&arg0)),
        "include?" | "includes?" | "contains?" | "member?" => {
            Value::Bool(set.borrow().contains(&arg0))
        }
        "size" | "length" | "count" => Value::Int64(set.borrow().len() as i64),
        "empty?" => Value::Bool(set.borrow().is_empty()),
        "to_a" => Value::array(set.borrow().to_vec()),
        _ => {
            let items = set.borrow().to_vec();
            return array::enumerate(rt, receiver, items, name, args, block, wrap_set);
        }
    };
    Some(Ok(result))
}
