//! Constant and enum table
//!
//! Constants are stored under their fully qualified name (`Outer::Inner::X`).
//! Lookup from a path of segments tries, in order:
//! 1. the exact joined path
//! 2. any entry whose last segment matches the requested last segment
//! 3. the path with trailing segments dropped one at a time
//!
//! A miss at every step is a soft failure.

use crate::runtime::Runtime;
use crate::value::Value;
use std::rc::Rc;

pub const SEPARATOR: &str = "::";

#[derive(Debug, Default)]
pub struct ConstantTable {
    entries: Vec<(Rc<str>, Value)>,
}

impl ConstantTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Redefining a name replaces its value in place
    pub fn define(&mut self, name: &str, value: Value) {
        match self.entries.iter_mut().find(|(n, _)| &**n == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((Rc::from(name), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.entries
            .iter()
            .find(|(n, _)| &**n == name)
            .map(|(_, v)| v.clone())
    }

    pub fn lookup<S: AsRef<str>>(&self, path: &[S]) -> Option<Value> {
        let segments: Vec<&str> = path.iter().map(AsRef::as_ref).collect();
        let last = *segments.last()?;

        if let Some(v) = self.get(&segments.join(SEPARATOR)) {
            return Some(v);
        }
        if let Some((_, v)) = self
            .entries
            .iter()
            .find(|(n, _)| last_segment(n) == last)
        {
            return Some(v.clone());
        }
        (1..segments.len())
            .rev()
            .find_map(|n| self.get(&segments[..n].join(SEPARATOR)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn last_segment(name: &str) -> &str {
    name.rsplit(SEPARATOR).next().unwrap_or(name)
}

impl Runtime {
    /// Define a global constant. A qualified name whose namespace is a known
    /// class also lands in that class's constant list.
    pub fn define_constant(&self, name: &str, value: Value) {
        if let Some((owner, short)) = name.rsplit_once(SEPARATOR) {
            let mut classes = self.classes.borrow_mut();
            if let Some(id) = classes.lookup(owner) {
                classes.add_constant(id, short, value.clone());
            }
        }
        self.constants.borrow_mut().define(name, value);
    }

    /// Resolve a constant path; misses are soft failures returning nil
    pub fn constant_lookup<S: AsRef<str>>(&self, path: &[S]) -> Value {
        let found = self.constants.borrow().lookup(path);
        match found {
            Some(value) => value,
            None => {
                let joined: Vec<&str> = path.iter().map(AsRef::as_ref).collect();
                self.diagnostic(&format!(
                    "uninitialized constant {}",
                    joined.join(SEPARATOR)
                ));
                Value::Nil
            }
        }
    }
}
