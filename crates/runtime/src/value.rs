use crate::block::Block;
use crate::class::ClassId;
use crate::map::MapData;
use crate::range::RangeValue;
use crate::set::SetData;
use crate::tuple::NamedTupleData;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared, mutable element storage of an Array value.
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;
/// Shared, mutable ordered map storage.
pub type MapRef = Rc<RefCell<MapData>>;
/// Shared, mutable set ("bag") storage.
pub type SetRef = Rc<RefCell<SetData>>;

/// Kind tag of a value, as reported by diagnostics and `class` queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Nil,
    Str,
    Int32,
    Int64,
    Bool,
    Float,
    Struct,
    Array,
    Class,
    Instance,
    Map,
    Block,
    Range,
    Tuple,
    NamedTuple,
    Enum,
    SetConstructor,
    Set,
    Bridge,
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Kind::Nil => "Nil",
            Kind::Str => "String",
            Kind::Int32 => "Int32",
            Kind::Int64 => "Int64",
            Kind::Bool => "Bool",
            Kind::Float => "Float",
            Kind::Struct => "Struct",
            Kind::Array => "Array",
            Kind::Class => "Class",
            Kind::Instance => "Instance",
            Kind::Map => "Map",
            Kind::Block => "Block",
            Kind::Range => "Range",
            Kind::Tuple => "Tuple",
            Kind::NamedTuple => "NamedTuple",
            Kind::Enum => "Enum",
            Kind::SetConstructor => "SetConstructor",
            Kind::Set => "Set",
            Kind::Bridge => "Bridge",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Instance of a user-defined class
///
/// The ivar map is allocated on the first write; reads before that see
/// "nothing" for every name.
#[derive(Debug)]
pub struct InstanceData {
    pub class: ClassId,
    pub ivars: RefCell<Option<MapData>>,
}

impl InstanceData {
    pub fn new(class: ClassId) -> Self {
        Self {
            class,
            ivars: RefCell::new(None),
        }
    }

    pub fn ivar_get(&self, name: &str) -> Value {
        match &*self.ivars.borrow() {
            Some(map) => map.get(&Value::str(name)).unwrap_or(Value::Nil),
            None => Value::Nil,
        }
    }

    pub fn ivar_set(&self, name: &str, value: Value) {
        self.ivars
            .borrow_mut()
            .get_or_insert_with(MapData::new)
            .insert(Value::str(name), value);
    }
}

/// A named member of an enum class, carrying its ordinal value.
#[derive(Debug)]
pub struct EnumMember {
    pub class: ClassId,
    pub name: Rc<str>,
    pub value: i64,
}

/// Value: what compiled code talks about
///
/// A closed tagged union covering every kind the runtime knows. `Nil` is the
/// language's "nothing"; `Str` is the unboxed string; everything else is what
/// the C boundary calls a Box. Aggregates are reference counted, so cloning a
/// Value never copies an aggregate and identity is `Rc::ptr_eq`.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Str(Rc<str>),
    Int32(i32),
    Int64(i64),
    Bool(bool),
    Float(f64),

    /// Opaque byte blob copied from a compiled-code struct
    Struct(Rc<[u8]>),

    Array(ArrayRef),

    /// Handle into the class table; the same name always yields the same id
    Class(ClassId),

    Instance(Rc<InstanceData>),
    Map(MapRef),
    Block(Rc<Block>),
    Range(RangeValue),
    Tuple(Rc<[Value]>),
    NamedTuple(Rc<NamedTupleData>),
    Enum(Rc<EnumMember>),

    /// `Set(T)` before `.new` is called on it; holds the element type name
    SetConstructor(Rc<str>),

    Set(SetRef),

    /// Sentinel receiver routed to the foreign-call shim
    Bridge,
}

impl Value {
    pub fn str(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn map(map: MapData) -> Value {
        Value::Map(Rc::new(RefCell::new(map)))
    }

    pub fn set(set: SetData) -> Value {
        Value::Set(Rc::new(RefCell::new(set)))
    }

    pub fn tuple(items: Vec<Value>) -> Value {
        Value::Tuple(Rc::from(items))
    }

    pub fn structure(bytes: &[u8]) -> Value {
        Value::Struct(Rc::from(bytes))
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::Nil => Kind::Nil,
            Value::Str(_) => Kind::Str,
            Value::Int32(_) => Kind::Int32,
            Value::Int64(_) => Kind::Int64,
            Value::Bool(_) => Kind::Bool,
            Value::Float(_) => Kind::Float,
            Value::Struct(_) => Kind::Struct,
            Value::Array(_) => Kind::Array,
            Value::Class(_) => Kind::Class,
            Value::Instance(_) => Kind::Instance,
            Value::Map(_) => Kind::Map,
            Value::Block(_) => Kind::Block,
            Value::Range(_) => Kind::Range,
            Value::Tuple(_) => Kind::Tuple,
            Value::NamedTuple(_) => Kind::NamedTuple,
            Value::Enum(_) => Kind::Enum,
            Value::SetConstructor(_) => Kind::SetConstructor,
            Value::Set(_) => Kind::Set,
            Value::Bridge => Kind::Bridge,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Only `false` and "nothing" are falsy; `0`, `""` and empty
    /// collections are truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Int32(_) | Value::Int64(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int32(_) | Value::Int64(_) | Value::Float(_))
    }

    /// Unbox as a 64-bit integer. An Int32 box sign-extends.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(n) => Some(*n as i64),
            Value::Int64(n) => Some(*n),
            _ => None,
        }
    }

    /// Unbox as a 32-bit integer. An Int64 box is truncated.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(n) => Some(*n),
            Value::Int64(n) => Some(*n as i32),
            _ => None,
        }
    }

    /// Unbox as a float. Integer boxes convert.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int32(n) => Some(*n as f64),
            Value::Int64(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Struct(b) => Some(b),
            _ => None,
        }
    }

    /// Value equality
    ///
    /// Primitives compare by value (Int32 and Int64 are one integer kind),
    /// strings by content, ranges by their fields. Arrays, maps, sets,
    /// instances and blocks compare by identity: two freshly built empty
    /// arrays are not equal.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (a, b) if a.is_integer() && b.is_integer() => a.as_i64() == b.as_i64(),
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Struct(a), Value::Struct(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => a == b,
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Block(a), Value::Block(b)) => Rc::ptr_eq(a, b),
            (Value::Range(a), Value::Range(b)) => {
                a.from == b.from && a.to == b.to && a.exclusive == b.exclusive
            }
            (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::NamedTuple(a), Value::NamedTuple(b)) => a.structurally_equal(b),
            (Value::Enum(a), Value::Enum(b)) => a.class == b.class && a.value == b.value,
            (Value::SetConstructor(a), Value::SetConstructor(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => Rc::ptr_eq(a, b),
            (Value::Bridge, Value::Bridge) => true,
            _ => false,
        }
    }

    /// Receiver identity, used to match singleton methods
    ///
    /// Like `equals` except tuples and structs must be the same allocation.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            (Value::NamedTuple(a), Value::NamedTuple(b)) => Rc::ptr_eq(a, b),
            (Value::Struct(a), Value::Struct(b)) => Rc::ptr_eq(a, b),
            (Value::Enum(a), Value::Enum(b)) => Rc::ptr_eq(a, b),
            _ => self.equals(other),
        }
    }

    /// Class handle for class and instance receivers
    pub fn class_id(&self) -> Option<ClassId> {
        match self {
            Value::Class(id) => Some(*id),
            Value::Instance(inst) => Some(inst.class),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int32(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}
