//! Value rendering
//!
//! Two flavours share one walker:
//!
//! - `display` quotes strings; used for human-readable composite rendering
//!   (`inspect`, `p`-style output)
//! - `to_string` leaves a top-level string unquoted; used by concatenation
//!   and interpolation
//!
//! Elements nested inside collections are always rendered with `display`, so
//! `to_string(["a"])` is `["a"]`.

use crate::runtime::Runtime;
use crate::value::Value;

pub fn display(rt: &Runtime, value: &Value) -> String {
    let mut out = String::new();
    write_value(rt, value, true, &mut out);
    out
}

pub fn to_string(rt: &Runtime, value: &Value) -> String {
    let mut out = String::new();
    write_value(rt, value, false, &mut out);
    out
}

fn write_value(rt: &Runtime, value: &Value, quote: bool, out: &mut String) {
    match value {
        Value::Nil => out.push_str("nil"),
        Value::Str(s) => {
            if quote {
                out.push('"');
                out.push_str(s);
                out.push('"');
            } else {
                out.push_str(s);
            }
        }
        Value::Int32(n) => out.push_str(&n.to_string()),
        Value::Int64(n) => out.push_str(&n.to_string()),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Float(f) => out.push_str(&format_float(*f)),
        Value::Struct(_) => out.push_str("{Struct}"),
        Value::Array(items) => {
            let items = items.borrow().clone();
            write_seq(rt, &items, "[", "]", out);
        }
        Value::Tuple(items) => write_seq(rt, items, "{", "}", out),
        Value::Set(set) => {
            let items = set.borrow().to_vec();
            write_seq(rt, &items, "Set{", "}", out);
        }
        Value::Map(map) => {
            let entries = map.borrow().entries();
            out.push('{');
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(rt, k, true, out);
                out.push_str(" -> ");
                write_value(rt, v, true, out);
            }
            out.push('}');
        }
        Value::NamedTuple(nt) => {
            out.push('{');
            for (i, (k, v)) in nt.keys.iter().zip(nt.values.iter()).enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(k);
                out.push_str(": ");
                write_value(rt, v, true, out);
            }
            out.push('}');
        }
        Value::Range(range) => {
            let dots = if range.exclusive { "..." } else { ".." };
            out.push_str(&range.endpoint_string(range.from));
            out.push_str(dots);
            out.push_str(&range.endpoint_string(range.to));
        }
        Value::Class(id) => out.push_str(&rt.class_name(*id)),
        Value::Instance(inst) => {
            out.push_str("#<");
            out.push_str(&rt.class_name(inst.class));
            out.push('>');
        }
        Value::Enum(member) => {
            if quote {
                out.push_str(&rt.class_name(member.class));
                out.push_str("::");
            }
            out.push_str(&member.name);
        }
        Value::Block(_) => out.push_str("#<Block>"),
        Value::SetConstructor(elem) => {
            out.push_str("Set(");
            out.push_str(elem);
            out.push(')');
        }
        Value::Bridge => out.push_str("#<Bridge>"),
    }
}

fn write_seq(rt: &Runtime, items: &[Value], open: &str, close: &str, out: &mut String) {
    out.push_str(open);
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_value(rt, item, true, out);
    }
    out.push_str(close);
}

/// Render a float the way C's `%g` does: six significant digits, trailing
/// zeros stripped, scientific notation outside `1e-4 <= |f| < 1e6`.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    const PRECISION: i32 = 6;
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, f);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exp < -4 || exp >= PRECISION {
        let mantissa = trim_fraction(mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    } else {
        let decimals = (PRECISION - 1 - exp).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, f)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
