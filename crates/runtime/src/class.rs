//! Class Registry
//!
//! Classes and modules live in an arena owned by the runtime and are
//! addressed by `ClassId`. Superclass links are ids too, so a class can be
//! looked up, walked, or extended without holding a borrow of the table
//! across a call into user code.
//!
//! Classes are created lazily by name and never torn down: defining the same
//! name twice hands back the same id.

use crate::error::RtResult;
use crate::runtime::Runtime;
use crate::value::{EnumMember, Value};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Handle into the class arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub(crate) u32);

impl ClassId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Native method body: `(runtime, receiver, args)`
pub type MethodFn = fn(&Runtime, &Value, &[Value]) -> RtResult<Value>;

/// Compiled method body: `(receiver, argc, argv) -> result handle`
pub type ExternMethodFn = unsafe extern "C" fn(*mut Value, i64, *const *mut Value) -> *mut Value;

#[derive(Clone, Copy)]
pub enum MethodCode {
    Native(MethodFn),
    Extern(ExternMethodFn),
}

impl MethodCode {
    pub fn call(&self, rt: &Runtime, receiver: &Value, args: &[Value]) -> RtResult<Value> {
        match *self {
            MethodCode::Native(func) => func(rt, receiver, args),
            MethodCode::Extern(func) => crate::ffi::call_extern_method(rt, func, receiver, args),
        }
    }
}

#[derive(Clone)]
pub struct Method {
    pub name: Rc<str>,
    pub code: MethodCode,
    /// The block (or nil) is appended as a trailing positional argument
    pub expects_block: bool,
}

impl Method {
    pub fn native(name: &str, func: MethodFn) -> Self {
        Self {
            name: Rc::from(name),
            code: MethodCode::Native(func),
            expects_block: false,
        }
    }

    pub fn with_block(mut self) -> Self {
        self.expects_block = true;
        self
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.code {
            MethodCode::Native(_) => "native",
            MethodCode::Extern(_) => "extern",
        };
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("code", &kind)
            .field("expects_block", &self.expects_block)
            .finish()
    }
}

#[derive(Debug)]
pub struct ClassData {
    pub name: Rc<str>,
    pub is_module: bool,
    pub superclass: Option<ClassId>,
    /// Definition order; later entries shadow earlier ones of the same name
    methods: Vec<Method>,
    constants: Vec<(Rc<str>, Value)>,
    enum_members: Vec<Rc<EnumMember>>,
}

impl ClassData {
    fn new(name: &str, is_module: bool) -> Self {
        Self {
            name: Rc::from(name),
            is_module,
            superclass: None,
            methods: Vec::new(),
            constants: Vec::new(),
            enum_members: Vec::new(),
        }
    }

    pub fn own_method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().rev().find(|m| &*m.name == name)
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn constants(&self) -> &[(Rc<str>, Value)] {
        &self.constants
    }

    pub fn enum_members(&self) -> &[Rc<EnumMember>] {
        &self.enum_members
    }
}

/// Why `set_superclass` refused a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuperclassError {
    /// The link would make the class its own ancestor
    Cycle,
}

impl fmt::Display for SuperclassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuperclassError::Cycle => write!(f, "superclass link would create a cycle"),
        }
    }
}

impl std::error::Error for SuperclassError {}

#[derive(Debug, Default)]
pub struct ClassTable {
    classes: Vec<ClassData>,
    by_name: HashMap<Rc<str>, ClassId>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `name`, creating it if needed. Returns the id and whether a
    /// new entry was created. An existing entry keeps its module flag.
    pub fn define(&mut self, name: &str, is_module: bool) -> (ClassId, bool) {
        if let Some(&id) = self.by_name.get(name) {
            return (id, false);
        }
        let id = ClassId(self.classes.len() as u32);
        let data = ClassData::new(name, is_module);
        self.by_name.insert(data.name.clone(), id);
        self.classes.push(data);
        (id, true)
    }

    pub fn lookup(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: ClassId) -> Option<&ClassData> {
        self.classes.get(id.index())
    }

    fn get_mut(&mut self, id: ClassId) -> Option<&mut ClassData> {
        self.classes.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn name(&self, id: ClassId) -> Option<Rc<str>> {
        self.get(id).map(|c| c.name.clone())
    }

    pub fn superclass(&self, id: ClassId) -> Option<ClassId> {
        self.get(id).and_then(|c| c.superclass)
    }

    pub fn set_superclass(&mut self, id: ClassId, parent: ClassId) -> Result<(), SuperclassError> {
        if self.ancestors(parent).contains(&id) {
            return Err(SuperclassError::Cycle);
        }
        if let Some(class) = self.get_mut(id) {
            class.superclass = Some(parent);
        }
        Ok(())
    }

    /// `id` followed by every superclass up to the root
    pub fn ancestors(&self, id: ClassId) -> Vec<ClassId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            // set_superclass rejects cycles; the bound guards stale ids
            if chain.contains(&c) || chain.len() > self.classes.len() {
                break;
            }
            chain.push(c);
            current = self.superclass(c);
        }
        chain
    }

    pub fn is_subclass_of(&self, id: ClassId, ancestor: ClassId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    pub fn add_method(&mut self, id: ClassId, method: Method) {
        if let Some(class) = self.get_mut(id) {
            class.methods.push(method);
        }
    }

    pub fn has_own_method(&self, id: ClassId, name: &str) -> bool {
        self.get(id).is_some_and(|c| c.own_method(name).is_some())
    }

    /// Walk `id → superclass → … → root`; first match wins
    pub fn find_method(&self, id: ClassId, name: &str) -> Option<(ClassId, Method)> {
        self.ancestors(id).into_iter().find_map(|c| {
            self.get(c)
                .and_then(|class| class.own_method(name))
                .map(|m| (c, m.clone()))
        })
    }

    pub fn add_constant(&mut self, id: ClassId, name: &str, value: Value) {
        if let Some(class) = self.get_mut(id) {
            match class.constants.iter_mut().find(|(n, _)| &**n == name) {
                Some(slot) => slot.1 = value,
                None => class.constants.push((Rc::from(name), value)),
            }
        }
    }

    pub fn add_enum_member(&mut self, id: ClassId, member: Rc<EnumMember>) {
        if let Some(class) = self.get_mut(id) {
            class.enum_members.push(member);
        }
    }

    /// Member of `id` whose ordinal is `value`
    pub fn enum_member_by_value(&self, id: ClassId, value: i64) -> Option<Rc<EnumMember>> {
        self.get(id)?
            .enum_members
            .iter()
            .find(|m| m.value == value)
            .cloned()
    }

    pub fn method_count(&self) -> usize {
        self.classes.iter().map(|c| c.methods.len()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClassId, &ClassData)> {
        self.classes
            .iter()
            .enumerate()
            .map(|(i, c)| (ClassId(i as u32), c))
    }
}

/// A method attached to one receiver identity
#[derive(Debug, Clone)]
pub struct SingletonMethod {
    pub receiver: Value,
    pub method: Method,
}

/// Flat list of singleton methods, searched newest first
#[derive(Debug, Default)]
pub struct SingletonTable {
    entries: Vec<SingletonMethod>,
}

impl SingletonTable {
    pub fn add(&mut self, receiver: Value, method: Method) {
        self.entries.push(SingletonMethod { receiver, method });
    }

    /// Strict lookup: the receiver must be the same identity
    pub fn find(&self, receiver: &Value, name: &str) -> Option<Method> {
        self.entries
            .iter()
            .rev()
            .find(|e| &*e.method.name == name && e.receiver.identical(receiver))
            .map(|e| e.method.clone())
    }

    /// Name-only lookup ignoring the receiver
    pub fn find_by_name(&self, name: &str) -> Option<Method> {
        self.entries
            .iter()
            .rev()
            .find(|e| &*e.method.name == name)
            .map(|e| e.method.clone())
    }

    pub fn has(&self, receiver: &Value, name: &str) -> bool {
        self.find(receiver, name).is_some()
    }

    /// Every method registered against `receiver`, oldest first
    pub fn methods_of(&self, receiver: &Value) -> Vec<Method> {
        self.entries
            .iter()
            .filter(|e| e.receiver.identical(receiver))
            .map(|e| e.method.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Class authoring

impl Runtime {
    fn define_class_like(&self, name: &str, is_module: bool) -> Value {
        let (id, created) = self.classes.borrow_mut().define(name, is_module);
        if created {
            tracing::debug!(target: "drake_runtime", class = name, is_module, "defined class");
            self.constants.borrow_mut().define(name, Value::Class(id));
        }
        Value::Class(id)
    }

    /// Create (or fetch) the class named `name`
    pub fn define_class(&self, name: &str) -> Value {
        self.define_class_like(name, false)
    }

    pub fn define_module(&self, name: &str) -> Value {
        self.define_class_like(name, true)
    }

    pub fn lookup_class(&self, name: &str) -> Option<ClassId> {
        self.classes.borrow().lookup(name)
    }

    pub fn class_name(&self, id: ClassId) -> String {
        self.classes
            .borrow()
            .name(id)
            .map(|n| n.to_string())
            .unwrap_or_else(|| format!("#<Class:{}>", id.0))
    }

    pub fn superclass_of(&self, id: ClassId) -> Option<ClassId> {
        self.classes.borrow().superclass(id)
    }

    pub fn is_subclass_of(&self, id: ClassId, ancestor: ClassId) -> bool {
        self.classes.borrow().is_subclass_of(id, ancestor)
    }

    /// Link `class` under `parent`. Non-class arguments and cycles are soft
    /// failures.
    pub fn set_superclass(&self, class: &Value, parent: &Value) {
        let (Value::Class(id), Value::Class(parent_id)) = (class, parent) else {
            self.diagnostic("set_superclass expects two classes");
            return;
        };
        let result = self.classes.borrow_mut().set_superclass(*id, *parent_id);
        if let Err(e) = result {
            let msg = format!(
                "cannot make {} a subclass of {}: {}",
                self.class_name(*id),
                self.class_name(*parent_id),
                e
            );
            self.diagnostic(&msg);
        }
    }

    /// Attach `method` to the class's method list
    pub fn define_method(&self, class: &Value, method: Method) {
        let Value::Class(id) = class else {
            self.diagnostic(&format!("define_method '{}' on a non-class receiver", method.name));
            return;
        };
        tracing::trace!(
            target: "drake_runtime",
            class = %self.class_name(*id),
            method = %method.name,
            "defined method"
        );
        self.classes.borrow_mut().add_method(*id, method);
    }

    /// Attach `method` to exactly one receiver identity
    pub fn define_singleton_method(&self, receiver: &Value, method: Method) {
        tracing::trace!(target: "drake_runtime", method = %method.name, "defined singleton method");
        self.singletons.borrow_mut().add(receiver.clone(), method);
    }

    /// Register `name` as a member of enum `class` with ordinal `value`
    ///
    /// The member becomes a class constant and a global constant
    /// `Class::NAME`.
    pub fn define_enum_member(&self, class: &Value, name: &str, value: i64) -> Value {
        let Value::Class(id) = class else {
            self.diagnostic(&format!("define_enum_member '{}' on a non-class receiver", name));
            return Value::Nil;
        };
        let member = Rc::new(EnumMember {
            class: *id,
            name: Rc::from(name),
            value,
        });
        let boxed = Value::Enum(member.clone());
        let qualified = {
            let mut classes = self.classes.borrow_mut();
            classes.add_enum_member(*id, member);
            classes.add_constant(*id, name, boxed.clone());
            format!("{}::{}", classes.name(*id).as_deref().unwrap_or(""), name)
        };
        self.constants.borrow_mut().define(&qualified, boxed.clone());
        boxed
    }

    /// Mix `module` into `container`
    ///
    /// Module methods not already present are copied into the container's
    /// method list and registered as singleton methods of the container.
    /// Singleton methods registered on the module itself are re-exported.
    pub fn extend(&self, container: &Value, module: &Value) {
        let (Value::Class(cid), Value::Class(mid)) = (container, module) else {
            self.diagnostic("extend expects a class and a module");
            return;
        };
        let module_methods = self
            .classes
            .borrow()
            .get(*mid)
            .map(|m| m.methods().to_vec())
            .unwrap_or_default();
        let module_singletons = self.singletons.borrow().methods_of(module);

        let mut classes = self.classes.borrow_mut();
        let mut singletons = self.singletons.borrow_mut();
        for method in module_methods {
            if !classes.has_own_method(*cid, &method.name) {
                classes.add_method(*cid, method.clone());
            }
            if !singletons.has(container, &method.name) {
                singletons.add(container.clone(), method);
            }
        }
        for method in module_singletons {
            if !singletons.has(container, &method.name) {
                singletons.add(container.clone(), method);
            }
        }
    }

    /// Read an instance variable; non-instances and unset names read nil
    pub fn ivar_get(&self, instance: &Value, name: &str) -> Value {
        match instance {
            Value::Instance(inst) => inst.ivar_get(name),
            _ => Value::Nil,
        }
    }

    pub fn ivar_set(&self, instance: &Value, name: &str, value: Value) {
        match instance {
            Value::Instance(inst) => inst.ivar_set(name, value),
            other => self.diagnostic(&format!(
                "cannot set instance variable '{}' on {}",
                name,
                other.kind()
            )),
        }
    }
}
