//! Runtime values.

use std::fmt;
use std::rc::Rc;

use ratus_syntax::FnDecl;
use ratus_typeck::Builtin;

use crate::env::FrameId;
use crate::host::HostFn;

/// Record members in insertion order.
pub type Fields<'m> = Vec<(String, Value<'m>)>;

/// A runtime value.
///
/// Records and lists share their storage until one copy is modified, so
/// passing them around is cheap while keeping value semantics.
#[derive(Debug, Clone)]
pub enum Value<'m> {
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Bool(bool),
    None,
    Record(Rc<Fields<'m>>),
    List(Rc<Vec<Value<'m>>>),
    Function(Rc<Closure<'m>>),
    Builtin(Builtin),
    Host(Rc<HostFn>),
}

/// A function value: its declaration and the frame it was created in.
#[derive(Debug)]
pub struct Closure<'m> {
    pub decl: &'m FnDecl,
    pub frame: FrameId,
}

impl<'m> Value<'m> {
    pub fn str(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn record(fields: Fields<'m>) -> Self {
        Value::Record(Rc::new(fields))
    }

    pub fn list(items: Vec<Value<'m>>) -> Self {
        Value::List(Rc::new(items))
    }

    /// Name of the value's kind, for fault messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Str(_) => "Str",
            Value::Bool(_) => "Bool",
            Value::None => "none",
            Value::Record(_) => "record",
            Value::List(_) => "list",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin",
            Value::Host(_) => "host function",
        }
    }

    pub fn member(&self, name: &str) -> Option<&Value<'m>> {
        match self {
            Value::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Structural equality. Numbers compare across `Int` and `Float`,
    /// record members regardless of order, functions by identity.
    pub fn structurally_eq(&self, other: &Value<'m>) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::None, Value::None) => true,
            (Value::Record(a), Value::Record(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(name, value)| other.member(name).is_some_and(|v| value.structurally_eq(v)))
                    && b.iter().all(|(name, _)| self.member(name).is_some())
            }
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.structurally_eq(y))
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Host(a), Value::Host(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn write_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write_quoted(f, s),
            other => write!(f, "{other}"),
        }
    }
}

/// Top-level rendering: strings print raw, strings inside records and lists
/// print quoted.
impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::Str(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::None => f.write_str("none"),
            Value::Record(fields) => {
                f.write_str("{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: ")?;
                    value.write_nested(f)?;
                }
                f.write_str("}")
            }
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.write_nested(f)?;
                }
                f.write_str("]")
            }
            Value::Function(closure) => match &closure.decl.name {
                Some(name) => write!(f, "<fn {}>", name.name),
                None => f.write_str("<fn>"),
            },
            Value::Builtin(b) => write!(f, "<builtin {}>", b.name()),
            Value::Host(h) => write!(f, "<host {}>", h.name()),
        }
    }
}

/// Shortest round-trip form, always with a fractional part.
pub fn format_float(x: f64) -> String {
    let mut out = format!("{x}");
    if x.is_finite() && !out.contains('.') {
        out.push_str(".0");
    }
    out
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            '\0' => f.write_str("\\0")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_keep_a_fractional_part() {
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_float(-1.5), "-1.5");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }

    #[test]
    fn nested_strings_are_quoted() {
        let value = Value::record(vec![
            ("x".into(), Value::Int(1)),
            ("y".into(), Value::list(vec![Value::str("a\"b"), Value::None])),
        ]);
        assert_eq!(value.to_string(), r#"{x: 1, y: ["a\"b", none]}"#);
        assert_eq!(Value::str("raw").to_string(), "raw");
    }

    #[test]
    fn equality_is_structural() {
        let a = Value::record(vec![("x".into(), Value::Int(1)), ("y".into(), Value::Int(2))]);
        let b = Value::record(vec![("y".into(), Value::Float(2.0)), ("x".into(), Value::Int(1))]);
        assert!(a.structurally_eq(&b));
        assert!(!a.structurally_eq(&Value::None));
        assert!(Value::Builtin(Builtin::Len).structurally_eq(&Value::Builtin(Builtin::Len)));
    }
}
