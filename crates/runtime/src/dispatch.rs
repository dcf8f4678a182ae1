//! Dispatch Engine
//!
//! `invoke(receiver, name, args, block)` resolves a call in this order:
//!
//! 1. bridge handle → foreign bridge
//! 2. nil receiver → only nil queries answer
//! 3. singleton methods registered against the receiver
//! 4. string, numeric and enum built-ins
//! 5. kind protocols (block, tuple, named tuple, array, map, range, set)
//! 6. class receivers: `new`, the class's method chain, constant `each`
//! 7. instance receivers: the class's method chain
//! 8. universal built-ins (`to_s`, `inspect`, `==`, `class`, …)
//! 9. otherwise a soft failure returning nil
//!
//! A user method flagged `expects_block` receives the block (or nil) as a
//! trailing positional argument.

use crate::array;
use crate::builtins;
use crate::class::{ClassId, Method};
use crate::error::RtResult;
use crate::map;
use crate::range;
use crate::runtime::{Runtime, RuntimeStats};
use crate::set::{self, SetData};
use crate::tuple;
use crate::value::{InstanceData, Value};
use std::rc::Rc;

impl Runtime {
    /// Dynamic method call
    pub fn invoke(
        &self,
        receiver: &Value,
        name: &str,
        args: &[Value],
        block: Option<&Value>,
    ) -> RtResult<Value> {
        RuntimeStats::bump(&self.stats.invocations);

        if let Value::Bridge = receiver {
            return self.call_bridge(name, args);
        }
        if receiver.is_nil() {
            return self.invoke_on_nil(name, args);
        }
        if let Some(method) = self.find_singleton(receiver, name) {
            return self.call_method(&method, receiver, args, block);
        }
        if let Some(result) = builtins::call_primitive(self, receiver, name, args, block) {
            return result;
        }
        if let Some(result) = self.call_kind_method(receiver, name, args, block) {
            return result;
        }
        match receiver {
            Value::Class(id) => {
                if let Some(result) = self.invoke_on_class(*id, receiver, name, args, block) {
                    return result;
                }
            }
            Value::Instance(inst) => {
                if let Some(method) = self.find_method(inst.class, name) {
                    return self.call_method(&method, receiver, args, block);
                }
            }
            _ => {}
        }
        if let Some(result) = builtins::call_universal(self, receiver, name, args) {
            return result;
        }
        self.method_missing(receiver, name)
    }

    /// `super` from a method owned by `owner`: the walk starts at the
    /// owner's superclass, whatever the receiver's dynamic class.
    pub fn invoke_super(
        &self,
        owner: ClassId,
        receiver: &Value,
        name: &str,
        args: &[Value],
        block: Option<&Value>,
    ) -> RtResult<Value> {
        RuntimeStats::bump(&self.stats.invocations);
        let method = self
            .superclass_of(owner)
            .and_then(|parent| self.find_method(parent, name));
        match method {
            Some(method) => self.call_method(&method, receiver, args, block),
            None => {
                self.diagnostic(&format!(
                    "super: no superclass method '{}' for {}",
                    name,
                    self.class_name(owner)
                ));
                Ok(Value::Nil)
            }
        }
    }

    /// Chain lookup from `class` upwards
    pub fn find_method(&self, class: ClassId, name: &str) -> Option<Method> {
        self.classes
            .borrow()
            .find_method(class, name)
            .map(|(_, method)| method)
    }

    /// Strict receiver lookup, then the name-only scan when enabled
    pub(crate) fn find_singleton(&self, receiver: &Value, name: &str) -> Option<Method> {
        let singletons = self.singletons.borrow();
        singletons.find(receiver, name).or_else(|| {
            if self.config.singleton_name_fallback {
                singletons.find_by_name(name)
            } else {
                None
            }
        })
    }

    /// Call `method`, appending the block slot when it expects one
    pub fn call_method(
        &self,
        method: &Method,
        receiver: &Value,
        args: &[Value],
        block: Option<&Value>,
    ) -> RtResult<Value> {
        if method.expects_block {
            let mut full = Vec::with_capacity(args.len() + 1);
            full.extend_from_slice(args);
            full.push(block.cloned().unwrap_or(Value::Nil));
            method.code.call(self, receiver, &full)
        } else {
            method.code.call(self, receiver, args)
        }
    }

    /// Whether a user-level method answers `name` for `receiver`
    pub fn responds_to(&self, receiver: &Value, name: &str) -> bool {
        if self.find_singleton(receiver, name).is_some() {
            return true;
        }
        match receiver.class_id() {
            Some(id) => self.find_method(id, name).is_some(),
            None => false,
        }
    }

    fn invoke_on_nil(&self, name: &str, args: &[Value]) -> RtResult<Value> {
        match name {
            "nil?" | "is_nil?" => Ok(Value::Bool(true)),
            "==" | "!=" | "equal?" => {
                let other = args.first().cloned().unwrap_or(Value::Nil);
                Ok(Value::Bool(other.is_nil() == (name != "!=")))
            }
            _ => self.method_missing(&Value::Nil, name),
        }
    }

    fn call_kind_method(
        &self,
        receiver: &Value,
        name: &str,
        args: &[Value],
        block: Option<&Value>,
    ) -> Option<RtResult<Value>> {
        match receiver {
            Value::Block(_) => match name {
                "call" | "yield" | "()" => Some(self.call_block(receiver, args)),
                _ => None,
            },
            Value::Tuple(items) => {
                tuple::call_tuple_method(self, items, receiver, name, args, block)
            }
            Value::NamedTuple(nt) => tuple::call_named_tuple_method(nt, name, args),
            Value::Array(items) => array::call_method(self, items, receiver, name, args, block),
            Value::Map(m) => map::call_method(self, m, receiver, name, args, block),
            Value::Range(r) => range::call_method(self, r, receiver, name, args, block),
            Value::Set(s) => set::call_method(self, s, receiver, name, args, block),
            Value::SetConstructor(element_type) => match name {
                "new" => {
                    let mut set = SetData::with_element_type(element_type.clone());
                    if let Some(seed) = args.first() {
                        for item in seed_items(seed) {
                            set.add(item);
                        }
                    }
                    Some(Ok(Value::set(set)))
                }
                _ => None,
            },
            _ => None,
        }
    }

    fn invoke_on_class(
        &self,
        id: ClassId,
        receiver: &Value,
        name: &str,
        args: &[Value],
        block: Option<&Value>,
    ) -> Option<RtResult<Value>> {
        if name == "new" {
            return Some(self.instantiate(id, args, block));
        }
        if let Some(method) = self.find_method(id, name) {
            return Some(self.call_method(&method, receiver, args, block));
        }
        let result = match name {
            "each" => {
                let block = block?;
                let constants: Vec<Value> = self
                    .classes
                    .borrow()
                    .get(id)
                    .map(|c| c.constants().iter().map(|(_, v)| v.clone()).collect())
                    .unwrap_or_default();
                for value in &constants {
                    if let Err(unwind) = self.call_block(block, std::slice::from_ref(value)) {
                        return Some(Err(unwind));
                    }
                }
                receiver.clone()
            }
            "name" => Value::from(self.class_name(id)),
            "superclass" => self.superclass_of(id).map(Value::Class).unwrap_or(Value::Nil),
            "constants" => {
                let names: Vec<Value> = self
                    .classes
                    .borrow()
                    .get(id)
                    .map(|c| c.constants().iter().map(|(n, _)| Value::Str(n.clone())).collect())
                    .unwrap_or_default();
                Value::array(names)
            }
            "values" => {
                let members: Vec<Value> = self
                    .classes
                    .borrow()
                    .get(id)
                    .map(|c| c.enum_members().iter().cloned().map(Value::Enum).collect())
                    .unwrap_or_default();
                Value::array(members)
            }
            "===" => {
                let candidate = args.first().cloned().unwrap_or(Value::Nil);
                return Some(self.case_compare(receiver, &candidate).map(Value::Bool));
            }
            _ => return None,
        };
        Some(Ok(result))
    }

    /// `Class.new`: enum construction by value, or allocation plus
    /// `initialize` from anywhere in the chain
    fn instantiate(&self, id: ClassId, args: &[Value], block: Option<&Value>) -> RtResult<Value> {
        let is_enum = self
            .classes
            .borrow()
            .get(id)
            .is_some_and(|c| !c.enum_members().is_empty());
        if is_enum && args.len() == 1 {
            let member = match &args[0] {
                Value::Enum(m) if m.class == id => Some(m.clone()),
                other => other
                    .as_i64()
                    .and_then(|n| self.classes.borrow().enum_member_by_value(id, n)),
            };
            return match member {
                Some(m) => Ok(Value::Enum(m)),
                None => {
                    let msg = format!(
                        "{} has no member with value {}",
                        self.class_name(id),
                        crate::format::display(self, &args[0])
                    );
                    self.diagnostic(&msg);
                    Ok(Value::Nil)
                }
            };
        }

        let instance = Value::Instance(Rc::new(InstanceData::new(id)));
        if let Some(init) = self.find_method(id, "initialize") {
            self.call_method(&init, &instance, args, block)?;
        }
        Ok(instance)
    }

    fn method_missing(&self, receiver: &Value, name: &str) -> RtResult<Value> {
        let target = match receiver {
            Value::Class(id) => self.class_name(*id),
            Value::Instance(inst) => format!("#<{}>", self.class_name(inst.class)),
            other => other.kind().to_string(),
        };
        self.diagnostic(&format!("Method not found: {} on {}", name, target));
        Ok(Value::Nil)
    }
}

/// Elements used to seed a new set
fn seed_items(seed: &Value) -> Vec<Value> {
    match seed {
        Value::Array(items) => items.borrow().clone(),
        Value::Set(s) => s.borrow().to_vec(),
        Value::Tuple(items) => items.to_vec(),
        Value::Range(r) => r.to_vec(),
        Value::Nil => Vec::new(),
        other => vec![other.clone()],
    }
}
