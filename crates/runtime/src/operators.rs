//! Operator protocol
//!
//! A binary operator first looks for a user override: when the left operand
//! is a class or instance whose chain defines a method named exactly like the
//! operator, that method runs with the right operand. Otherwise the built-in
//! rules apply:
//!
//! - `+` adds int+int (wrapping) or float+float; anything else, mixed
//!   int/float included, stringifies both sides and concatenates
//! - `- * / % // **` promote mixed int/float to float; `/` is always float;
//!   `%` is the truncating remainder and `//` floors
//! - zero divisors raise `ZeroDivisionError`, other kinds raise `TypeError`
//! - comparisons order numbers and strings; anything else is a soft failure
//!
//! `index_get`, `index_set` and `case_compare` live here too.

use crate::array;
use crate::error::{RtResult, classes};
use crate::runtime::Runtime;
use crate::tuple;
use crate::value::Value;
use std::cmp::Ordering;
use std::fmt;

/// Largest string `*` will build (1 GiB)
pub const MAX_STRING_BYTES: usize = 1 << 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    FloorDiv,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    Cmp,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 16] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Mod,
        BinaryOp::Pow,
        BinaryOp::FloorDiv,
        BinaryOp::Shl,
        BinaryOp::Shr,
        BinaryOp::Lt,
        BinaryOp::Gt,
        BinaryOp::Le,
        BinaryOp::Ge,
        BinaryOp::Eq,
        BinaryOp::Ne,
        BinaryOp::Cmp,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Cmp => "<=>",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.symbol() == symbol)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Operand pair after numeric promotion
enum Numbers {
    Ints(i64, i64),
    Floats(f64, f64),
}

fn promote(lhs: &Value, rhs: &Value) -> Option<Numbers> {
    if let (Some(a), Some(b)) = (lhs.as_i64(), rhs.as_i64()) {
        return Some(Numbers::Ints(a, b));
    }
    if lhs.is_numeric() && rhs.is_numeric() {
        return Some(Numbers::Floats(lhs.as_f64()?, rhs.as_f64()?));
    }
    None
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::Float(f) => *f == 0.0,
        other => other.as_i64() == Some(0),
    }
}

fn int_pow(mut base: i64, mut exp: i64) -> i64 {
    let mut acc: i64 = 1;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = acc.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exp >>= 1;
    }
    acc
}

fn shift_left(a: i64, b: i64) -> i64 {
    if b < 0 {
        shift_right(a, b.checked_neg().unwrap_or(i64::MAX))
    } else if b >= 64 {
        0
    } else {
        a.wrapping_shl(b as u32)
    }
}

fn shift_right(a: i64, b: i64) -> i64 {
    if b < 0 {
        shift_left(a, b.checked_neg().unwrap_or(i64::MAX))
    } else if b >= 64 {
        if a < 0 { -1 } else { 0 }
    } else {
        a >> b
    }
}

fn ordering_value(ord: Ordering) -> Value {
    Value::Int64(match ord {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    })
}

impl Runtime {
    /// Apply a binary operator
    pub fn binary_op(&self, op: BinaryOp, lhs: &Value, rhs: &Value) -> RtResult<Value> {
        if let Some(id) = lhs.class_id() {
            if let Some(method) = self.find_method(id, op.symbol()) {
                return self.call_method(&method, lhs, std::slice::from_ref(rhs), None);
            }
            if op == BinaryOp::Ne {
                if let Some(method) = self.find_method(id, "==") {
                    let eq = self.call_method(&method, lhs, std::slice::from_ref(rhs), None)?;
                    return Ok(Value::Bool(!eq.is_truthy()));
                }
            }
        }
        match op {
            BinaryOp::Add => self.add(lhs, rhs),
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Pow
            | BinaryOp::FloorDiv => self.arithmetic(op, lhs, rhs),
            BinaryOp::Shl => self.shift_or_append(lhs, rhs),
            BinaryOp::Shr => match (lhs.as_i64(), rhs.as_i64()) {
                (Some(a), Some(b)) => Ok(Value::Int64(shift_right(a, b))),
                _ => Err(self.operand_error(op, lhs, rhs)),
            },
            BinaryOp::Eq => Ok(Value::Bool(values_equal(lhs, rhs))),
            BinaryOp::Ne => Ok(Value::Bool(!values_equal(lhs, rhs))),
            BinaryOp::Cmp => Ok(self.compare(lhs, rhs).map(ordering_value).unwrap_or(Value::Nil)),
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
                let Some(ord) = self.compare(lhs, rhs) else {
                    self.diagnostic(&format!(
                        "comparison of {} with {} failed",
                        lhs.kind(),
                        rhs.kind()
                    ));
                    return Ok(Value::Nil);
                };
                let result = match op {
                    BinaryOp::Lt => ord == Ordering::Less,
                    BinaryOp::Gt => ord == Ordering::Greater,
                    BinaryOp::Le => ord != Ordering::Greater,
                    _ => ord != Ordering::Less,
                };
                Ok(Value::Bool(result))
            }
        }
    }

    /// Apply an operator given by its symbol; unknown symbols are a soft
    /// failure
    pub fn binary_op_symbol(&self, symbol: &str, lhs: &Value, rhs: &Value) -> RtResult<Value> {
        match BinaryOp::from_symbol(symbol) {
            Some(op) => self.binary_op(op, lhs, rhs),
            None => {
                self.diagnostic(&format!("unknown operator '{}'", symbol));
                Ok(Value::Nil)
            }
        }
    }

    fn add(&self, lhs: &Value, rhs: &Value) -> RtResult<Value> {
        match (lhs, rhs) {
            (a, b) if a.is_integer() && b.is_integer() => {
                let (a, b) = (a.as_i64().unwrap_or(0), b.as_i64().unwrap_or(0));
                Ok(Value::Int64(a.wrapping_add(b)))
            }
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
            _ => {
                let mut out = self.stringify(lhs)?;
                out.push_str(&self.stringify(rhs)?);
                Ok(Value::from(out))
            }
        }
    }

    fn arithmetic(&self, op: BinaryOp, lhs: &Value, rhs: &Value) -> RtResult<Value> {
        if op == BinaryOp::Mul {
            if let (Value::Str(s), Some(n)) = (lhs, rhs.as_i64()) {
                return self.repeat_str(s, n);
            }
        }
        let Some(numbers) = promote(lhs, rhs) else {
            return Err(self.operand_error(op, lhs, rhs));
        };
        if matches!(op, BinaryOp::Div | BinaryOp::Mod | BinaryOp::FloorDiv) && is_zero(rhs) {
            return Err(self.raise_error(classes::ZERO_DIVISION_ERROR, "divided by 0"));
        }
        let result = match (op, numbers) {
            (BinaryOp::Sub, Numbers::Ints(a, b)) => Value::Int64(a.wrapping_sub(b)),
            (BinaryOp::Sub, Numbers::Floats(a, b)) => Value::Float(a - b),
            (BinaryOp::Mul, Numbers::Ints(a, b)) => Value::Int64(a.wrapping_mul(b)),
            (BinaryOp::Mul, Numbers::Floats(a, b)) => Value::Float(a * b),
            (BinaryOp::Div, Numbers::Ints(a, b)) => Value::Float(a as f64 / b as f64),
            (BinaryOp::Div, Numbers::Floats(a, b)) => Value::Float(a / b),
            (BinaryOp::Mod, Numbers::Ints(a, b)) => Value::Int64(a.wrapping_rem(b)),
            (BinaryOp::Mod, Numbers::Floats(a, b)) => Value::Float(a % b),
            (BinaryOp::FloorDiv, Numbers::Ints(a, b)) => Value::Int64(floor_div(a, b)),
            (BinaryOp::FloorDiv, Numbers::Floats(a, b)) => Value::Float((a / b).floor()),
            (BinaryOp::Pow, Numbers::Ints(a, b)) if b >= 0 => Value::Int64(int_pow(a, b)),
            (BinaryOp::Pow, Numbers::Ints(a, b)) => Value::Float((a as f64).powf(b as f64)),
            (BinaryOp::Pow, Numbers::Floats(a, b)) => Value::Float(a.powf(b)),
            _ => return Err(self.operand_error(op, lhs, rhs)),
        };
        Ok(result)
    }

    fn shift_or_append(&self, lhs: &Value, rhs: &Value) -> RtResult<Value> {
        match lhs {
            Value::Array(items) => {
                array::push(items, rhs.clone());
                Ok(lhs.clone())
            }
            Value::Set(set) => {
                set.borrow_mut().add(rhs.clone());
                Ok(lhs.clone())
            }
            Value::Str(s) => {
                let mut out = s.to_string();
                out.push_str(&self.stringify(rhs)?);
                Ok(Value::from(out))
            }
            _ => match (lhs.as_i64(), rhs.as_i64()) {
                (Some(a), Some(b)) => Ok(Value::Int64(shift_left(a, b))),
                _ => Err(self.operand_error(BinaryOp::Shl, lhs, rhs)),
            },
        }
    }

    /// `str * n`; a negative count is the empty string, a result past
    /// `MAX_STRING_BYTES` raises `ArgumentError`
    pub(crate) fn repeat_str(&self, s: &str, count: i64) -> RtResult<Value> {
        let count = usize::try_from(count.max(0)).unwrap_or(usize::MAX);
        match s.len().checked_mul(count) {
            Some(bytes) if bytes <= MAX_STRING_BYTES => Ok(Value::from(s.repeat(count))),
            _ => Err(self.raise_error(
                classes::ARGUMENT_ERROR,
                &format!("string repeat count {} is too large", count),
            )),
        }
    }

    fn operand_error(&self, op: BinaryOp, lhs: &Value, rhs: &Value) -> crate::error::Unwind {
        let message = format!(
            "unsupported operand types for {}: {} and {}",
            op,
            lhs.kind(),
            rhs.kind()
        );
        self.raise_error(classes::TYPE_ERROR, &message)
    }

    /// Ordering for numbers (mixed kinds promote), strings and members of
    /// the same enum
    pub fn compare(&self, lhs: &Value, rhs: &Value) -> Option<Ordering> {
        match (lhs, rhs) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Enum(a), Value::Enum(b)) if a.class == b.class => Some(a.value.cmp(&b.value)),
            _ => match promote(lhs, rhs)? {
                Numbers::Ints(a, b) => Some(a.cmp(&b)),
                Numbers::Floats(a, b) => a.partial_cmp(&b),
            },
        }
    }

    /// `obj[key]`
    pub fn index_get(&self, obj: &Value, key: &Value) -> RtResult<Value> {
        let result = match obj {
            Value::Array(items) => match key {
                Value::Range(range) => array::slice_range(&items.borrow(), range),
                _ => key
                    .as_i64()
                    .map(|i| array::get(&items.borrow(), i))
                    .unwrap_or(Value::Nil),
            },
            Value::Map(map) => map.borrow().get(key).unwrap_or(Value::Nil),
            Value::Tuple(items) => key.as_i64().map(|i| array::get(items, i)).unwrap_or(Value::Nil),
            Value::NamedTuple(nt) => tuple::index(nt, key),
            Value::Str(_) => {
                return self.invoke(obj, "[]", std::slice::from_ref(key), None);
            }
            Value::Class(_) | Value::Instance(_) => {
                return self.invoke(obj, "[]", std::slice::from_ref(key), None);
            }
            Value::Nil => Value::Nil,
            other => {
                self.diagnostic(&format!("{} does not support []", other.kind()));
                Value::Nil
            }
        };
        Ok(result)
    }

    /// `obj[key] = value`; returns the assigned value
    pub fn index_set(&self, obj: &Value, key: &Value, value: &Value) -> RtResult<Value> {
        match obj {
            Value::Array(items) => match key.as_i64() {
                Some(i) => array::set(&mut items.borrow_mut(), i, value.clone()),
                None => self.diagnostic(&format!(
                    "array index must be an integer, got {}",
                    key.kind()
                )),
            },
            Value::Map(map) => map.borrow_mut().insert(key.clone(), value.clone()),
            Value::Class(_) | Value::Instance(_) => {
                self.invoke(obj, "[]=", &[key.clone(), value.clone()], None)?;
            }
            other => self.diagnostic(&format!("{} does not support []=", other.kind())),
        }
        Ok(value.clone())
    }

    /// Pattern-match equality used by `case`/`when` and membership tests
    ///
    /// A range matches its members, a class matches its instances (and
    /// enum members), a user `===` wins for classes and instances, and
    /// everything else falls back to `==`.
    pub fn case_compare(&self, pattern: &Value, value: &Value) -> RtResult<bool> {
        if pattern.identical(value) {
            return Ok(true);
        }
        match pattern {
            Value::Range(range) => Ok(range.includes(value)),
            Value::Class(id) => {
                if let Some(method) = self.find_method(*id, "===") {
                    let arg = std::slice::from_ref(value);
                    let hit = self.call_method(&method, pattern, arg, None)?;
                    return Ok(hit.is_truthy());
                }
                Ok(match value {
                    Value::Instance(inst) => self.is_subclass_of(inst.class, *id),
                    Value::Enum(member) => member.class == *id,
                    _ => false,
                })
            }
            Value::Instance(inst) => {
                if let Some(method) = self.find_method(inst.class, "===") {
                    let arg = std::slice::from_ref(value);
                    let hit = self.call_method(&method, pattern, arg, None)?;
                    return Ok(hit.is_truthy());
                }
                Ok(self.binary_op(BinaryOp::Eq, pattern, value)?.is_truthy())
            }
            _ => Ok(values_equal(pattern, value)),
        }
    }
}

/// `==` without overrides: nil equals only nil, then value equality
pub fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs.is_nil(), rhs.is_nil()) {
        (true, true) => true,
        (true, false) | (false, true) => false,
        _ => lhs.equals(rhs),
    }
}

/// Floored quotient; `i64::MIN // -1` wraps like the other integer ops
fn floor_div(a: i64, b: i64) -> i64 {
    let q = a.wrapping_div(b);
    if (a.wrapping_rem(b) != 0) && ((a < 0) != (b < 0)) {
        q.wrapping_sub(1)
    } else {
        q
    }
}
