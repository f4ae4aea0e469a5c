//! Built-in functions.

use std::rc::Rc;

use ratus_common::Span;
use ratus_typeck::Builtin;

use crate::eval::{FaultKind, RuntimeFault, too_long};
use crate::value::Value;

/// Look a builtin up by the name programs call it with.
pub fn lookup(name: &str) -> Option<Builtin> {
    Builtin::ALL.into_iter().find(|b| b.name() == name)
}

/// Apply `builtin`. Lists it builds may hold at most `max_len` items.
pub fn call<'m>(
    builtin: Builtin,
    mut args: Vec<Value<'m>>,
    span: Span,
    max_len: usize,
) -> Result<Value<'m>, RuntimeFault> {
    if !builtin.arity().contains(&args.len()) {
        return Err(RuntimeFault::new(
            FaultKind::TypeMismatch,
            span,
            format!("`{}` called with {} arguments", builtin.name(), args.len()),
        ));
    }
    let misuse = |arg: &Value<'_>| {
        RuntimeFault::new(
            FaultKind::TypeMismatch,
            span,
            format!("`{}` cannot take a {}", builtin.name(), arg.kind_name()),
        )
    };

    match builtin {
        Builtin::Len => match &args[0] {
            Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
            Value::List(items) => Ok(Value::Int(items.len() as i64)),
            other => Err(misuse(other)),
        },
        Builtin::Str => Ok(match &args[0] {
            Value::Str(s) => Value::Str(Rc::clone(s)),
            other => Value::str(&other.to_string()),
        }),
        Builtin::Int => match &args[0] {
            Value::Int(n) => Ok(Value::Int(*n)),
            Value::Float(x) => {
                let truncated = x.trunc();
                // `i64::MAX as f64` rounds up to 2^63, which is already out of range.
                if !truncated.is_finite() || truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
                    return Err(RuntimeFault::new(
                        FaultKind::IntegerOverflow,
                        span,
                        format!("{x} does not fit in an Int"),
                    ));
                }
                Ok(Value::Int(truncated as i64))
            }
            other => Err(misuse(other)),
        },
        Builtin::Float => match &args[0] {
            Value::Int(n) => Ok(Value::Float(*n as f64)),
            Value::Float(x) => Ok(Value::Float(*x)),
            other => Err(misuse(other)),
        },
        Builtin::Abs => match &args[0] {
            Value::Int(n) => n.checked_abs().map(Value::Int).ok_or_else(|| {
                RuntimeFault::new(FaultKind::IntegerOverflow, span, "integer overflow in `abs`")
            }),
            Value::Float(x) => Ok(Value::Float(x.abs())),
            other => Err(misuse(other)),
        },
        Builtin::Range => {
            let bounds: Vec<i64> = args
                .iter()
                .map(|a| match a {
                    Value::Int(n) => Ok(*n),
                    other => Err(misuse(other)),
                })
                .collect::<Result<_, _>>()?;
            let (start, end) = match bounds.as_slice() {
                [end] => (0, *end),
                [start, end] => (*start, *end),
                _ => (0, 0),
            };
            let len = (i128::from(end) - i128::from(start)).max(0);
            if len > max_len as i128 {
                return Err(too_long("list", max_len, span));
            }
            Ok(Value::list((start..end).map(Value::Int).collect()))
        }
        Builtin::Push => {
            let item = args.pop().unwrap_or(Value::None);
            match args.pop() {
                Some(Value::List(items)) if items.len() >= max_len => Err(too_long("list", max_len, span)),
                Some(Value::List(mut items)) => {
                    Rc::make_mut(&mut items).push(item);
                    Ok(Value::List(items))
                }
                Some(other) => Err(misuse(&other)),
                None => Err(misuse(&Value::None)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 1 << 10;

    #[test]
    fn push_leaves_the_original_list_alone() {
        let original = Value::list(vec![Value::Int(1)]);
        let pushed = call(Builtin::Push, vec![original.clone(), Value::Int(2)], Span::DUMMY, LIMIT).expect("push");
        assert_eq!(original.to_string(), "[1]");
        assert_eq!(pushed.to_string(), "[1, 2]");
    }

    #[test]
    fn conversions() {
        let int = call(Builtin::Int, vec![Value::Float(-2.7)], Span::DUMMY, LIMIT).expect("int");
        assert_eq!(int.to_string(), "-2");
        let float = call(Builtin::Float, vec![Value::Int(3)], Span::DUMMY, LIMIT).expect("float");
        assert_eq!(float.to_string(), "3.0");
        let too_big = call(Builtin::Int, vec![Value::Float(1e300)], Span::DUMMY, LIMIT);
        assert_eq!(too_big.map_err(|f| f.kind).err(), Some(FaultKind::IntegerOverflow));
    }

    #[test]
    fn range_and_len() {
        let r = call(Builtin::Range, vec![Value::Int(2), Value::Int(5)], Span::DUMMY, LIMIT).expect("range");
        assert_eq!(r.to_string(), "[2, 3, 4]");
        let n = call(Builtin::Len, vec![Value::str("héllo")], Span::DUMMY, LIMIT).expect("len");
        assert_eq!(n.to_string(), "5");
        assert_eq!(lookup("push"), Some(Builtin::Push));
        assert_eq!(lookup("print"), None);
    }

    #[test]
    fn oversized_lists_fault_before_allocating() {
        let huge = call(Builtin::Range, vec![Value::Int(100_000_000_000)], Span::DUMMY, LIMIT);
        assert_eq!(huge.map_err(|f| f.kind).err(), Some(FaultKind::AllocationLimitExceeded));
        let wide = call(Builtin::Range, vec![Value::Int(i64::MIN), Value::Int(i64::MAX)], Span::DUMMY, LIMIT);
        assert_eq!(wide.map_err(|f| f.kind).err(), Some(FaultKind::AllocationLimitExceeded));
        let empty = call(Builtin::Range, vec![Value::Int(5), Value::Int(i64::MIN)], Span::DUMMY, LIMIT).expect("range");
        assert_eq!(empty.to_string(), "[]");

        let full = call(Builtin::Range, vec![Value::Int(3)], Span::DUMMY, 3).expect("fits");
        let pushed = call(Builtin::Push, vec![full, Value::Int(3)], Span::DUMMY, 3);
        assert_eq!(pushed.map_err(|f| f.kind).err(), Some(FaultKind::AllocationLimitExceeded));
    }
}
