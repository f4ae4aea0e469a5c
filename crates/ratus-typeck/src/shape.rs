//! Shapes and the arena that owns them.
//!
//! A shape describes what a value supports: the members of a record, the
//! parameters of a function, the element of a list. Shapes are stored in a
//! [`ShapeArena`] and referenced by [`ShapeId`]. Structurally identical shapes
//! are interned to the same id, so `ShapeId` equality is a cheap first check
//! for shape equality. Named shapes (from `type` declarations) are the only
//! way to build a cycle: they are allocated before their target is known and
//! refer to it by id.

use std::collections::HashMap;
use std::fmt;

use crate::builtins::Builtin;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShapeId(pub u32);

impl ShapeId {
    pub const INT: ShapeId = ShapeId(0);
    pub const FLOAT: ShapeId = ShapeId(1);
    pub const STR: ShapeId = ShapeId(2);
    pub const BOOL: ShapeId = ShapeId(3);
    pub const NONE: ShapeId = ShapeId(4);
    /// Bottom: the element of `[]` and the provisional result of a recursive call.
    pub const NEVER: ShapeId = ShapeId(5);
    /// Poison left behind by a reported error; compatible with everything.
    pub const ERROR: ShapeId = ShapeId(6);
}

impl fmt::Debug for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shape#{}", self.0)
    }
}

/// Identity of one function with unannotated parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Shape {
    Int,
    Float,
    Str,
    Bool,
    None,
    Never,
    Error,
    /// Members in declaration order; names are unique.
    Record(Vec<(String, ShapeId)>),
    List(ShapeId),
    /// `T?`: a `T` or `none`.
    Optional(ShapeId),
    Func {
        params: Vec<ShapeId>,
        ret: ShapeId,
    },
    /// A function checked separately at each call with the argument shapes.
    Template(TemplateId),
    Builtin(Builtin),
    /// A `type` declaration; `target` is filled in once the declaration's body
    /// has been resolved.
    Named {
        name: String,
        target: Option<ShapeId>,
    },
}

/// Owner of every shape created while checking one module.
#[derive(Debug)]
pub struct ShapeArena {
    shapes: Vec<Shape>,
    interned: HashMap<Shape, ShapeId>,
    template_names: Vec<String>,
    pub(crate) subtype_memo: HashMap<(ShapeId, ShapeId), bool>,
}

/// Alias chains longer than this are treated as broken.
const MAX_ALIAS_CHAIN: usize = 64;

impl Default for ShapeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl ShapeArena {
    pub fn new() -> Self {
        let mut arena = Self {
            shapes: Vec::new(),
            interned: HashMap::new(),
            template_names: Vec::new(),
            subtype_memo: HashMap::new(),
        };
        // Order must match the ShapeId constants.
        for shape in [
            Shape::Int,
            Shape::Float,
            Shape::Str,
            Shape::Bool,
            Shape::None,
            Shape::Never,
            Shape::Error,
        ] {
            arena.intern(shape);
        }
        arena
    }

    pub fn get(&self, id: ShapeId) -> &Shape {
        &self.shapes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn intern(&mut self, shape: Shape) -> ShapeId {
        if let Some(&id) = self.interned.get(&shape) {
            return id;
        }
        let id = ShapeId(self.shapes.len() as u32);
        self.shapes.push(shape.clone());
        self.interned.insert(shape, id);
        id
    }

    pub fn record(&mut self, fields: Vec<(String, ShapeId)>) -> ShapeId {
        self.intern(Shape::Record(fields))
    }

    pub fn list(&mut self, elem: ShapeId) -> ShapeId {
        self.intern(Shape::List(elem))
    }

    pub fn func(&mut self, params: Vec<ShapeId>, ret: ShapeId) -> ShapeId {
        self.intern(Shape::Func { params, ret })
    }

    pub fn builtin(&mut self, builtin: Builtin) -> ShapeId {
        self.intern(Shape::Builtin(builtin))
    }

    /// `inner?`, normalized so that optionals never nest and `none?` is `None`.
    pub fn optional(&mut self, inner: ShapeId) -> ShapeId {
        // A name still being declared has no target to inspect yet.
        let resolved = match self.get(inner) {
            Shape::Named { target: None, .. } => inner,
            _ => self.resolve(inner),
        };
        match self.get(resolved) {
            Shape::Optional(_) | Shape::None | Shape::Error => inner,
            Shape::Never => ShapeId::NONE,
            _ => self.intern(Shape::Optional(inner)),
        }
    }

    pub fn template(&mut self, name: impl Into<String>) -> ShapeId {
        let id = TemplateId(self.template_names.len() as u32);
        self.template_names.push(name.into());
        self.intern(Shape::Template(id))
    }

    /// Allocate a named shape whose target is not known yet.
    pub fn declare_named(&mut self, name: impl Into<String>) -> ShapeId {
        let id = ShapeId(self.shapes.len() as u32);
        self.shapes.push(Shape::Named {
            name: name.into(),
            target: None,
        });
        id
    }

    pub fn define_named(&mut self, id: ShapeId, new_target: ShapeId) {
        if let Shape::Named { target, .. } = &mut self.shapes[id.0 as usize] {
            *target = Some(new_target);
        }
    }

    /// Follow named shapes to the structure they stand for.
    ///
    /// An undefined or cyclic alias chain resolves to [`ShapeId::ERROR`].
    pub fn resolve(&self, mut id: ShapeId) -> ShapeId {
        for _ in 0..MAX_ALIAS_CHAIN {
            match self.get(id) {
                Shape::Named { target: Some(t), .. } => id = *t,
                Shape::Named { target: None, .. } => return ShapeId::ERROR,
                _ => return id,
            }
        }
        ShapeId::ERROR
    }

    pub fn is_numeric(&self, id: ShapeId) -> bool {
        matches!(self.get(self.resolve(id)), Shape::Int | Shape::Float)
    }

    /// The member `name` of a record shape.
    pub fn member(&self, record: ShapeId, name: &str) -> Option<ShapeId> {
        match self.get(self.resolve(record)) {
            Shape::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, s)| *s),
            _ => None,
        }
    }

    /// Whether `Never` occurs in the shape, e.g. `[Never]` inferred from `[]`.
    pub fn mentions_never(&self, id: ShapeId) -> bool {
        self.mentions_never_inner(id, 0)
    }

    fn mentions_never_inner(&self, id: ShapeId, depth: usize) -> bool {
        if depth > 16 {
            return false;
        }
        match self.get(id) {
            Shape::Never => true,
            Shape::List(e) | Shape::Optional(e) => self.mentions_never_inner(*e, depth + 1),
            Shape::Record(fields) => fields.iter().any(|(_, s)| self.mentions_never_inner(*s, depth + 1)),
            _ => false,
        }
    }

    /// The named shapes among `named` that have no finite value.
    ///
    /// Least fixpoint: a name is inhabited once its target is inhabited given
    /// the names already known to be. Lists, optionals and functions are
    /// always inhabited (`[]`, `none`, any function), records only when every
    /// member is.
    pub fn uninhabited(&self, named: &[ShapeId]) -> Vec<ShapeId> {
        let mut inhabited: Vec<ShapeId> = Vec::new();
        loop {
            let mut changed = false;
            for &id in named {
                if inhabited.contains(&id) {
                    continue;
                }
                let target = match self.get(id) {
                    Shape::Named { target: Some(t), .. } => *t,
                    _ => continue,
                };
                if self.is_inhabited(target, named, &inhabited) {
                    inhabited.push(id);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        named.iter().copied().filter(|id| !inhabited.contains(id)).collect()
    }

    fn is_inhabited(&self, id: ShapeId, named: &[ShapeId], inhabited: &[ShapeId]) -> bool {
        match self.get(id) {
            // Names outside `named` were declared in an enclosing block and already validated.
            Shape::Named { .. } => !named.contains(&id) || inhabited.contains(&id),
            Shape::Record(fields) => fields.iter().all(|(_, s)| self.is_inhabited(*s, named, inhabited)),
            Shape::Never => false,
            _ => true,
        }
    }

    /// The display form used in diagnostics: `{x: Int, next: Node?}`.
    pub fn display(&self, id: ShapeId) -> String {
        let mut out = String::new();
        self.write_shape(&mut out, id, 0);
        out
    }

    fn write_shape(&self, out: &mut String, id: ShapeId, depth: usize) {
        if depth > 8 {
            out.push('…');
            return;
        }
        match self.get(id) {
            Shape::Int => out.push_str("Int"),
            Shape::Float => out.push_str("Float"),
            Shape::Str => out.push_str("Str"),
            Shape::Bool => out.push_str("Bool"),
            Shape::None => out.push_str("None"),
            Shape::Never => out.push_str("Never"),
            Shape::Error => out.push_str("{unknown}"),
            Shape::Named { name, .. } => out.push_str(name),
            Shape::Record(fields) => {
                out.push('{');
                for (i, (name, shape)) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(name);
                    out.push_str(": ");
                    self.write_shape(out, *shape, depth + 1);
                }
                out.push('}');
            }
            Shape::List(elem) => {
                out.push('[');
                self.write_shape(out, *elem, depth + 1);
                out.push(']');
            }
            Shape::Optional(inner) => {
                let wrap = matches!(self.get(*inner), Shape::Func { .. });
                if wrap {
                    out.push('(');
                }
                self.write_shape(out, *inner, depth + 1);
                if wrap {
                    out.push(')');
                }
                out.push('?');
            }
            Shape::Func { params, ret } => {
                out.push_str("fn(");
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_shape(out, *param, depth + 1);
                }
                out.push_str(") -> ");
                self.write_shape(out, *ret, depth + 1);
            }
            Shape::Template(t) => {
                let name = self.template_names.get(t.0 as usize).map_or("<lambda>", String::as_str);
                out.push_str("fn ");
                out.push_str(name);
                out.push_str("(..)");
            }
            Shape::Builtin(b) => {
                out.push_str("builtin ");
                out.push_str(b.name());
            }
        }
    }
}
