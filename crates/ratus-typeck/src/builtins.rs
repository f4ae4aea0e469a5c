//! Builtin functions and their call rules.
//!
//! Builtins are overloaded (`abs` works on both numbers, `range` takes one or
//! two bounds), so they are checked by a rule per builtin instead of a single
//! function shape.

use crate::shape::{Shape, ShapeArena, ShapeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Len,
    Str,
    Int,
    Float,
    Abs,
    Range,
    Push,
}

impl Builtin {
    pub const ALL: [Builtin; 7] = [
        Builtin::Len,
        Builtin::Str,
        Builtin::Int,
        Builtin::Float,
        Builtin::Abs,
        Builtin::Range,
        Builtin::Push,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Len => "len",
            Builtin::Str => "str",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Abs => "abs",
            Builtin::Range => "range",
            Builtin::Push => "push",
        }
    }

    /// Accepted argument counts.
    pub fn arity(self) -> std::ops::RangeInclusive<usize> {
        match self {
            Builtin::Range => 1..=2,
            Builtin::Push => 2..=2,
            _ => 1..=1,
        }
    }
}

/// Why a builtin call does not check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuiltinMisuse {
    Arity,
    Argument { index: usize, expected: &'static str },
}

/// The result shape of calling `builtin` with arguments of the given shapes.
pub fn call_shape(arena: &mut ShapeArena, builtin: Builtin, args: &[ShapeId]) -> Result<ShapeId, BuiltinMisuse> {
    if !builtin.arity().contains(&args.len()) {
        return Err(BuiltinMisuse::Arity);
    }

    let resolved: Vec<Shape> = args.iter().map(|&a| arena.get(arena.resolve(a)).clone()).collect();
    let permissive = |s: &Shape| matches!(s, Shape::Error | Shape::Never);

    let misuse = |index, expected| Err(BuiltinMisuse::Argument { index, expected });

    match builtin {
        Builtin::Len => match &resolved[0] {
            Shape::Str | Shape::List(_) => Ok(ShapeId::INT),
            s if permissive(s) => Ok(ShapeId::INT),
            _ => misuse(0, "Str or a list"),
        },
        Builtin::Str => Ok(ShapeId::STR),
        Builtin::Int | Builtin::Float => match &resolved[0] {
            Shape::Int | Shape::Float => Ok(if builtin == Builtin::Int { ShapeId::INT } else { ShapeId::FLOAT }),
            s if permissive(s) => Ok(if builtin == Builtin::Int { ShapeId::INT } else { ShapeId::FLOAT }),
            _ => misuse(0, "Int or Float"),
        },
        Builtin::Abs => match &resolved[0] {
            Shape::Int => Ok(ShapeId::INT),
            Shape::Float => Ok(ShapeId::FLOAT),
            s if permissive(s) => Ok(args[0]),
            _ => misuse(0, "Int or Float"),
        },
        Builtin::Range => {
            for (index, shape) in resolved.iter().enumerate() {
                if !matches!(shape, Shape::Int) && !permissive(shape) {
                    return misuse(index, "Int");
                }
            }
            Ok(arena.list(ShapeId::INT))
        }
        Builtin::Push => match &resolved[0] {
            Shape::List(elem) => match arena.join(*elem, args[1]) {
                Some(joined) => Ok(arena.list(joined)),
                None => misuse(1, "a value compatible with the list elements"),
            },
            s if permissive(s) => Ok(arena.list(args[1])),
            _ => misuse(0, "a list"),
        },
    }
}
