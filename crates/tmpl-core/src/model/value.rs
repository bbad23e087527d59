use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::{Kind, TypeInfo, TypeRef};

/// Lazily evaluated zero-argument accessor.
pub type Accessor = Arc<dyn Fn() -> Value + Send + Sync>;

/// Runtime value templates execute against.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Complex(f64, f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Object(Arc<Object>),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Nil => Kind::Unit,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Uint(_) => Kind::Uint,
            Value::Float(_) => Kind::Float,
            Value::Complex(..) => Kind::Complex,
            Value::String(_) => Kind::String,
            Value::List(_) => Kind::Sequence,
            Value::Map(_) => Kind::Map,
            Value::Object(_) => Kind::Struct,
        }
    }

    /// Name used in diagnostics: the struct name for objects, the kind otherwise.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Object(object) => object.type_name(),
            Value::Nil => "nil",
            other => other.kind().as_str(),
        }
    }

    /// Truthiness: false, zero, empty and nil are false.
    pub fn is_true(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Uint(u) => *u != 0,
            Value::Float(f) => *f != 0.0,
            Value::Complex(re, im) => *re != 0.0 || *im != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
            Value::Object(_) => true,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Member lookup by name: struct fields, then accessors, then map keys.
    pub fn member(&self, name: &str) -> Option<Value> {
        match self {
            Value::Object(object) => object.lookup(name),
            Value::Map(entries) => entries.get(name).cloned(),
            _ => None,
        }
    }

    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::Uint(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or_default())
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Formats a float the way `%v` does: shortest representation, exponent form
/// for exponents below -4 or above 5.
pub(crate) fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    if f == 0.0 {
        return "0".to_string();
    }

    let sci = format!("{:e}", f);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m.to_string(), e.parse::<i32>().unwrap_or(0)),
        None => return sci,
    };
    if (-4..6).contains(&exp) {
        format!("{}", f)
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("<nil>"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Uint(u) => write!(f, "{}", u),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::Complex(re, im) => {
                let sign = if *im >= 0.0 || im.is_nan() { "+" } else { "" };
                write!(f, "({}{}{}i)", format_float(*re), sign, format_float(*im))
            }
            Value::String(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("map[")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}:{}", k, v)?;
                }
                f.write_str("]")
            }
            Value::Object(object) => {
                f.write_str("{")?;
                for (i, (_, v)) in object.fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("Nil"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Value::Uint(u) => f.debug_tuple("Uint").field(u).finish(),
            Value::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Value::Complex(re, im) => f.debug_tuple("Complex").field(re).field(im).finish(),
            Value::String(s) => f.debug_tuple("String").field(s).finish(),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            Value::Object(object) => fmt::Debug::fmt(object, f),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Uint(a), Value::Uint(b)) => a == b,
            (Value::Int(a), Value::Uint(b)) | (Value::Uint(b), Value::Int(a)) => {
                u64::try_from(*a).is_ok_and(|a| a == *b)
            }
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Complex(ar, ai), Value::Complex(br, bi)) => ar == br && ai == bi,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                a.type_name == b.type_name && a.fields == b.fields
            }
            _ => false,
        }
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident as $conv:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(<$conv>::from(v))
                }
            }
        )*
    };
}

impl_value_from!(
    bool => Bool as bool,
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    u8 => Uint as u64,
    u16 => Uint as u64,
    u32 => Uint as u64,
    u64 => Uint as u64,
    f32 => Float as f64,
    f64 => Float as f64,
    String => String as String,
    &str => String as String,
);

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(entries)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(Arc::new(object))
    }
}

/// Runtime form of a struct: ordered fields plus lazily evaluated accessors.
pub struct Object {
    type_name: &'static str,
    info: TypeRef,
    fields: Vec<(String, Value)>,
    accessors: Vec<(String, Accessor)>,
}

impl Object {
    pub fn new(type_name: &'static str, info: TypeRef) -> Self {
        Self {
            type_name,
            info,
            fields: Vec::new(),
            accessors: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn type_info(&self) -> TypeInfo {
        (self.info)()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn accessor<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.accessors.push((name.into(), Arc::new(f)));
    }

    /// Promotes the members of the embedded field `name` into this object. Names
    /// already present win.
    pub fn promote(&mut self, name: &str) {
        let Some(Value::Object(embedded)) = self.get(name).cloned() else {
            return;
        };
        for (field, value) in &embedded.fields {
            if !self.contains(field) {
                self.fields.push((field.clone(), value.clone()));
            }
        }
        for (accessor, f) in &embedded.accessors {
            if !self.contains(accessor) {
                self.accessors.push((accessor.clone(), Arc::clone(f)));
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name) || self.accessors.iter().any(|(n, _)| n == name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn has_accessor(&self, name: &str) -> bool {
        self.accessors.iter().any(|(n, _)| n == name)
    }

    /// Evaluates the accessor `name`.
    pub fn call(&self, name: &str) -> Option<Value> {
        self.accessors
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f())
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned().or_else(|| self.call(name))
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.type_name);
        for (name, value) in &self.fields {
            s.field(name, value);
        }
        s.finish_non_exhaustive()
    }
}
