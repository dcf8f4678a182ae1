//! Integer and character ranges
//!
//! A range built from two single-character strings (`'a'..'e'`) keeps the
//! code points as its endpoints and sets `is_char`; enumerating it produces
//! one-character strings instead of integers.

use crate::array;
use crate::error::{RtResult, classes};
use crate::runtime::Runtime;
use crate::value::Value;

/// Most elements `to_a` will materialize
pub const MAX_RANGE_ELEMENTS: usize = 1 << 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeValue {
    pub from: i64,
    pub to: i64,
    pub exclusive: bool,
    pub is_char: bool,
}

impl RangeValue {
    pub fn new(from: i64, to: i64, exclusive: bool) -> Self {
        Self {
            from,
            to,
            exclusive,
            is_char: false,
        }
    }

    pub fn chars(from: char, to: char, exclusive: bool) -> Self {
        Self {
            from: from as i64,
            to: to as i64,
            exclusive,
            is_char: true,
        }
    }

    /// Build from literal endpoints: two integers, or two one-character
    /// strings. Anything else is not a range.
    pub fn from_values(from: &Value, to: &Value, exclusive: bool) -> Option<Self> {
        if let (Some(a), Some(b)) = (from.as_i64(), to.as_i64()) {
            return Some(Self::new(a, b, exclusive));
        }
        match (single_char(from), single_char(to)) {
            (Some(a), Some(b)) => Some(Self::chars(a, b, exclusive)),
            _ => None,
        }
    }

    /// Last ordinal covered; `None` for `x...i64::MIN`, which covers nothing
    fn upper(&self) -> Option<i64> {
        if self.exclusive { self.to.checked_sub(1) } else { Some(self.to) }
    }

    /// Element count, saturating at `usize::MAX`
    pub fn len(&self) -> usize {
        match self.upper() {
            Some(upper) if upper >= self.from => {
                let span = upper as i128 - self.from as i128 + 1;
                usize::try_from(span).unwrap_or(usize::MAX)
            }
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value produced for ordinal `n`
    pub fn element(&self, n: i64) -> Value {
        if self.is_char {
            match u32::try_from(n).ok().and_then(char::from_u32) {
                Some(c) => Value::from(c.to_string()),
                None => Value::Nil,
            }
        } else {
            Value::Int64(n)
        }
    }

    pub fn endpoint_string(&self, n: i64) -> String {
        if self.is_char {
            u32::try_from(n)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_default()
        } else {
            n.to_string()
        }
    }

    /// Elements in order, produced on demand
    pub fn iter(&self) -> impl Iterator<Item = Value> + use<> {
        let range = *self;
        range
            .upper()
            .map(|upper| range.from..=upper)
            .into_iter()
            .flatten()
            .map(move |n| range.element(n))
    }

    /// Materialize every element, stepping by one
    pub fn to_vec(&self) -> Vec<Value> {
        self.iter().collect()
    }

    /// Membership requires the candidate's char-ness to match the range's
    /// before ordinals are compared: `'c'` is not in `1..200`.
    pub fn includes(&self, candidate: &Value) -> bool {
        let ordinal = if self.is_char {
            single_char(candidate).map(|c| c as i64)
        } else {
            match candidate {
                Value::Float(f) => {
                    let upper_ok = if self.exclusive {
                        *f < self.to as f64
                    } else {
                        *f <= self.to as f64
                    };
                    return *f >= self.from as f64 && upper_ok;
                }
                other => other.as_i64(),
            }
        };
        match (ordinal, self.upper()) {
            (Some(n), Some(upper)) => n >= self.from && n <= upper,
            _ => false,
        }
    }
}

fn single_char(value: &Value) -> Option<char> {
    let s = value.as_str()?;
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// Built-in range protocol; `None` when `name` is not a range method
pub(crate) fn call_method(
    rt: &Runtime,
    range: &RangeValue,
    receiver: &Value,
    name: &str,
    args: &[Value],
    block: Option<&Value>,
) -> Option<RtResult<Value>> {
    let result = match name {
        "to_a" => {
            if range.len() > MAX_RANGE_ELEMENTS {
                let message = format!("range of {} elements is too large for to_a", range.len());
                return Some(Err(rt.raise_error(classes::ARGUMENT_ERROR, &message)));
            }
            Value::array(range.to_vec())
        }
        "size" | "length" | "count" => {
            Value::Int64(i64::try_from(range.len()).unwrap_or(i64::MAX))
        }
        "empty?" => Value::Bool(range.is_empty()),
        "first" | "begin" => {
            if range.is_empty() {
                Value::Nil
            } else {
                range.element(range.from)
            }
        }
        "last" => match range.upper() {
            Some(upper) if !range.is_empty() => range.element(upper),
            _ => Value::Nil,
        },
        "include?" | "includes?" | "member?" | "===" => {
            let candidate = args.first().cloned().unwrap_or(Value::Nil);
            Value::Bool(range.includes(&candidate))
        }
        "exclusive?" => Value::Bool(range.exclusive),
        _ => {
            return array::enumerate(rt, receiver, range.iter(), name, args, block, Value::array);
        }
    };
    Some(Ok(result))
}
