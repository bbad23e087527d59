//! Built-in and user-supplied template functions

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::model::Value;

/// A callable available to templates by name.
///
/// Failures are plain messages; the executor attaches the template position.
#[derive(Clone)]
pub struct Function(Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>);

impl Function {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, String> {
        (self.0)(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Function(..)")
    }
}

pub type FuncMap = HashMap<String, Function>;

/// Names the executor resolves without a [`FuncMap`] entry.
pub const BUILTINS: &[&str] = &[
    "and", "or", "not", "len", "index", "slice", "print", "printf", "println", "eq", "ne",
    "lt", "le", "gt", "ge", "html", "urlquery", "js",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

type Builtin = fn(&[Value]) -> Result<Value, String>;

/// Eagerly evaluated builtins. `and`/`or` short-circuit and live in the executor.
pub(crate) fn builtin(name: &str) -> Option<Builtin> {
    let f: Builtin = match name {
        "not" => not,
        "len" => len,
        "index" => index,
        "slice" => slice,
        "print" => |args| Ok(Value::String(sprint(args))),
        "println" => |args| Ok(Value::String(sprintln(args))),
        "printf" => printf,
        "eq" => eq,
        "ne" => |args| Ok(Value::Bool(!compare_eq(args, "ne", 2)?)),
        "lt" => |args| ordered(args, "lt", |o| o.is_lt()),
        "le" => |args| ordered(args, "le", |o| o.is_le()),
        "gt" => |args| ordered(args, "gt", |o| o.is_gt()),
        "ge" => |args| ordered(args, "ge", |o| o.is_ge()),
        "html" => |args| Ok(Value::String(html_escape(&eval_args(args)))),
        "urlquery" => |args| Ok(Value::String(query_escape(&eval_args(args)))),
        "js" => |args| Ok(Value::String(js_escape(&eval_args(args)))),
        _ => return None,
    };
    Some(f)
}

fn arity(name: &str, args: &[Value], want: usize) -> Result<(), String> {
    if args.len() != want {
        return Err(format!(
            "wrong number of args for {}: want {} got {}",
            name,
            want,
            args.len()
        ));
    }
    Ok(())
}

fn not(args: &[Value]) -> Result<Value, String> {
    arity("not", args, 1)?;
    Ok(Value::Bool(!args[0].is_true()))
}

fn len(args: &[Value]) -> Result<Value, String> {
    arity("len", args, 1)?;
    let n = match &args[0] {
        Value::String(s) => s.len(),
        Value::List(items) => items.len(),
        Value::Map(entries) => entries.len(),
        Value::Nil => return Err("len of nil pointer".to_string()),
        other => return Err(format!("len of type {}", other.type_name())),
    };
    Ok(Value::Int(n as i64))
}

fn to_index(value: &Value) -> Result<i64, String> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Uint(u) => i64::try_from(*u).map_err(|_| format!("index out of range: {}", u)),
        Value::Nil => Err("cannot index slice/array with nil".to_string()),
        other => Err(format!("cannot index slice/array with type {}", other.type_name())),
    }
}

fn checked_index(value: &Value, len: usize) -> Result<usize, String> {
    let i = to_index(value)?;
    if i < 0 || i as usize >= len {
        return Err(format!("index out of range: {}", i));
    }
    Ok(i as usize)
}

fn index(args: &[Value]) -> Result<Value, String> {
    let Some((item, indexes)) = args.split_first() else {
        return Err("wrong number of args for index: want at least 1 got 0".to_string());
    };
    let mut current = item.clone();
    for key in indexes {
        current = match &current {
            Value::List(items) => items[checked_index(key, items.len())?].clone(),
            Value::String(s) => Value::Int(s.as_bytes()[checked_index(key, s.len())?] as i64),
            Value::Map(entries) => match key {
                Value::String(k) => entries.get(k).cloned().unwrap_or_default(),
                other => {
                    return Err(format!(
                        "value has type {}; should be string",
                        other.type_name()
                    ));
                }
            },
            Value::Nil => return Err("index of untyped nil".to_string()),
            other => return Err(format!("can't index item of type {}", other.type_name())),
        };
    }
    Ok(current)
}

fn slice(args: &[Value]) -> Result<Value, String> {
    let Some((item, indexes)) = args.split_first() else {
        return Err("wrong number of args for slice: want at least 1 got 0".to_string());
    };
    if indexes.len() > 3 {
        return Err(format!("too many slice indexes: {}", indexes.len()));
    }
    let len = match item {
        Value::String(s) => {
            if indexes.len() == 3 {
                return Err("cannot 3-index slice a string".to_string());
            }
            s.len()
        }
        Value::List(items) => items.len(),
        Value::Nil => return Err("slice of untyped nil".to_string()),
        other => return Err(format!("can't slice item of type {}", other.type_name())),
    };

    let mut bounds = [0, len, len];
    for (i, index) in indexes.iter().enumerate() {
        let value = to_index(index)?;
        if value < 0 || value as usize > len {
            return Err(format!("index out of range: {}", value));
        }
        bounds[i] = value as usize;
    }
    if bounds[0] > bounds[1] {
        return Err(format!("invalid slice index: {} > {}", bounds[0], bounds[1]));
    }
    if indexes.len() == 3 && bounds[1] > bounds[2] {
        return Err(format!("invalid slice index: {} > {}", bounds[1], bounds[2]));
    }

    match item {
        Value::String(s) => s
            .get(bounds[0]..bounds[1])
            .map(|sub| Value::String(sub.to_string()))
            .ok_or_else(|| "slice splits a UTF-8 sequence".to_string()),
        Value::List(items) => Ok(Value::List(items[bounds[0]..bounds[1]].to_vec())),
        _ => Ok(Value::Nil),
    }
}

/// `fmt.Sprint`: operands are separated by a space when neither side is a string.
pub(crate) fn sprint(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        let is_string = matches!(arg, Value::String(_));
        if i > 0 && !is_string && !matches!(args[i - 1], Value::String(_)) {
            out.push(' ');
        }
        out.push_str(&arg.to_string());
    }
    out
}

fn sprintln(args: &[Value]) -> String {
    let parts: Vec<String> = args.iter().map(Value::to_string).collect();
    format!("{}\n", parts.join(" "))
}

/// Single argument as-is, several joined the way `print` joins them.
fn eval_args(args: &[Value]) -> String {
    match args {
        [Value::String(s)] => s.clone(),
        _ => sprint(args),
    }
}

fn printf(args: &[Value]) -> Result<Value, String> {
    let Some((format, rest)) = args.split_first() else {
        return Err("wrong number of args for printf: want at least 1 got 0".to_string());
    };
    let Value::String(format) = format else {
        return Err(format!(
            "printf format must be a string, got {}",
            format.type_name()
        ));
    };
    Ok(Value::String(sprintf(format, rest)))
}

struct Spec {
    minus: bool,
    zero: bool,
    plus: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

impl Spec {
    fn pad(&self, body: String, numeric: bool) -> String {
        let Some(width) = self.width else {
            return body;
        };
        let len = body.chars().count();
        if len >= width {
            return body;
        }
        let fill = width - len;
        if self.minus {
            format!("{}{}", body, " ".repeat(fill))
        } else if self.zero && numeric {
            match body.strip_prefix('-') {
                Some(digits) => format!("-{}{}", "0".repeat(fill), digits),
                None => format!("{}{}", "0".repeat(fill), body),
            }
        } else {
            format!("{}{}", " ".repeat(fill), body)
        }
    }
}

fn bad_verb(verb: char, arg: &Value) -> String {
    format!("%!{}({}={})", verb, arg.type_name(), arg)
}

fn digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<usize> {
    let mut n: Option<usize> = None;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        n = Some(n.unwrap_or(0) * 10 + d as usize);
        chars.next();
    }
    n
}

/// The `fmt.Sprintf` verbs templates commonly use.
pub(crate) fn sprintf(format: &str, args: &[Value]) -> String {
    let mut out = String::new();
    let mut next_arg = 0;
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut spec = Spec {
            minus: false,
            zero: false,
            plus: false,
            width: None,
            precision: None,
        };
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => spec.minus = true,
                '0' => spec.zero = true,
                '+' => spec.plus = true,
                ' ' | '#' => {}
                _ => break,
            }
            chars.next();
        }
        spec.width = digits(&mut chars);
        if chars.peek() == Some(&'.') {
            chars.next();
            spec.precision = Some(digits(&mut chars).unwrap_or(0));
        }

        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }
        let Some(arg) = args.get(next_arg) else {
            out.push_str(&format!("%!{}(MISSING)", verb));
            continue;
        };
        next_arg += 1;
        out.push_str(&format_verb(verb, &spec, arg));
    }

    if next_arg < args.len() {
        let extra: Vec<String> = args[next_arg..]
            .iter()
            .map(|arg| format!("{}={}", arg.type_name(), arg))
            .collect();
        out.push_str(&format!("%!(EXTRA {})", extra.join(", ")));
    }
    out
}

fn format_verb(verb: char, spec: &Spec, arg: &Value) -> String {
    let sign = |body: String, negative: bool| {
        if spec.plus && !negative {
            format!("+{}", body)
        } else {
            body
        }
    };

    match verb {
        'v' => spec.pad(arg.to_string(), false),
        's' => match arg {
            Value::String(s) => {
                let body = match spec.precision {
                    Some(p) => s.chars().take(p).collect(),
                    None => s.clone(),
                };
                spec.pad(body, false)
            }
            Value::Int(_) | Value::Uint(_) | Value::Float(_) | Value::Bool(_) => {
                bad_verb(verb, arg)
            }
            other => spec.pad(other.to_string(), false),
        },
        'd' => match arg {
            Value::Int(i) => spec.pad(sign(i.to_string(), *i < 0), true),
            Value::Uint(u) => spec.pad(sign(u.to_string(), false), true),
            _ => bad_verb(verb, arg),
        },
        'q' => match arg {
            Value::String(s) => spec.pad(format!("{:?}", s), false),
            Value::Int(i) => match u32::try_from(*i).ok().and_then(char::from_u32) {
                Some(c) => spec.pad(format!("{:?}", c), false),
                None => bad_verb(verb, arg),
            },
            _ => bad_verb(verb, arg),
        },
        't' => match arg {
            Value::Bool(b) => spec.pad(b.to_string(), false),
            _ => bad_verb(verb, arg),
        },
        'f' | 'F' => {
            let value = match arg {
                Value::Float(f) => *f,
                _ => return bad_verb(verb, arg),
            };
            let precision = spec.precision.unwrap_or(6);
            spec.pad(sign(format!("{:.*}", precision, value), value < 0.0), true)
        }
        'x' | 'X' => {
            let body = match arg {
                Value::Int(i) if *i < 0 => format!("-{:x}", i.unsigned_abs()),
                Value::Int(i) => format!("{:x}", i),
                Value::Uint(u) => format!("{:x}", u),
                Value::String(s) => s.bytes().map(|b| format!("{:02x}", b)).collect(),
                _ => return bad_verb(verb, arg),
            };
            let body = if verb == 'X' {
                body.to_uppercase()
            } else {
                body
            };
            spec.pad(body, true)
        }
        _ => bad_verb(verb, arg),
    }
}

fn eq(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Bool(compare_eq(args, "eq", 0)?))
}

/// `eq a b c` is true when `a` equals any of the rest; `exact` pins the arity.
fn compare_eq(args: &[Value], name: &str, exact: usize) -> Result<bool, String> {
    if exact > 0 {
        arity(name, args, exact)?;
    }
    let Some((first, rest)) = args.split_first() else {
        return Err(format!("wrong number of args for {}: want at least 1 got 0", name));
    };
    if rest.is_empty() {
        return Err("missing argument for comparison".to_string());
    }
    for other in rest {
        if basic_eq(first, other)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn basic_eq(a: &Value, b: &Value) -> Result<bool, String> {
    match (a, b) {
        (Value::Nil, Value::Nil) => Ok(true),
        (Value::Nil, _) | (_, Value::Nil) => Ok(false),
        (Value::Bool(x), Value::Bool(y)) => Ok(x == y),
        (Value::String(x), Value::String(y)) => Ok(x == y),
        (Value::Float(x), Value::Float(y)) => Ok(x == y),
        (Value::Complex(a1, b1), Value::Complex(a2, b2)) => Ok(a1 == a2 && b1 == b2),
        (Value::Int(_) | Value::Uint(_), Value::Int(_) | Value::Uint(_)) => {
            Ok(int_cmp(a, b) == std::cmp::Ordering::Equal)
        }
        (Value::List(_) | Value::Map(_) | Value::Object(_), _)
        | (_, Value::List(_) | Value::Map(_) | Value::Object(_)) => Err(format!(
            "non-comparable types {}: {}",
            a.type_name(),
            b.type_name()
        )),
        _ => Err("incompatible types for comparison".to_string()),
    }
}

fn int_cmp(a: &Value, b: &Value) -> std::cmp::Ordering {
    let widen = |v: &Value| -> i128 {
        match v {
            Value::Int(i) => *i as i128,
            Value::Uint(u) => *u as i128,
            _ => 0,
        }
    };
    widen(a).cmp(&widen(b))
}

fn ordered(
    args: &[Value],
    name: &str,
    test: fn(std::cmp::Ordering) -> bool,
) -> Result<Value, String> {
    arity(name, args, 2)?;
    let (a, b) = (&args[0], &args[1]);
    let ordering = match (a, b) {
        (Value::Int(_) | Value::Uint(_), Value::Int(_) | Value::Uint(_)) => int_cmp(a, b),
        (Value::Float(x), Value::Float(y)) => x
            .partial_cmp(y)
            .ok_or_else(|| "invalid comparison of NaN".to_string())?,
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(_) | Value::Complex(..) | Value::Nil, _) => {
            return Err(format!("invalid type for comparison: {}", a.type_name()));
        }
        (Value::List(_) | Value::Map(_) | Value::Object(_), _) => {
            return Err(format!("non-comparable type {}", a.type_name()));
        }
        _ => return Err("incompatible types for comparison".to_string()),
    };
    Ok(Value::Bool(test(ordering)))
}

/// Escapes text for safe inclusion in HTML.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            '\0' => out.push('\u{FFFD}'),
            _ => out.push(c),
        }
    }
    out
}

fn query_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

fn js_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '<' => out.push_str("\\u003C"),
            '>' => out.push_str("\\u003E"),
            '&' => out.push_str("\\u0026"),
            '=' => out.push_str("\\u003D"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04X}", c as u32)),
            _ => out.push(c),
        }
    }
    out
}
