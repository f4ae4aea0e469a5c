//! Structural subtyping and joins.
//!
//! `a <: b` holds when a value of shape `a` can be used wherever `b` is
//! expected: records may have extra members (width) and more specific member
//! shapes (depth), functions are contravariant in their parameters and
//! covariant in their result, and `T <: T?`.
//!
//! Recursive shapes are handled co-inductively: a pair already under
//! examination is assumed to hold. Failed checks are always memoized. A
//! successful check may rest on assumptions that only the outermost call can
//! confirm, so successes are memoized once that call succeeds.

use crate::shape::{Shape, ShapeArena, ShapeId};

/// Joins nest through records and lists; recursive shapes could otherwise
/// unfold forever.
const MAX_JOIN_DEPTH: usize = 32;

impl ShapeArena {
    pub fn is_subtype(&mut self, a: ShapeId, b: ShapeId) -> bool {
        let mut assumed = Vec::new();
        let mut proven = Vec::new();
        let result = self.subtype_inner(a, b, &mut assumed, &mut proven);
        if result {
            for pair in proven {
                self.subtype_memo.insert(pair, true);
            }
        }
        result
    }

    fn subtype_inner(
        &mut self,
        a: ShapeId,
        b: ShapeId,
        assumed: &mut Vec<(ShapeId, ShapeId)>,
        proven: &mut Vec<(ShapeId, ShapeId)>,
    ) -> bool {
        if a == b {
            return true;
        }
        if let Some(&known) = self.subtype_memo.get(&(a, b)) {
            return known;
        }
        if assumed.contains(&(a, b)) {
            return true;
        }

        assumed.push((a, b));
        let result = self.subtype_structural(a, b, assumed, proven);
        assumed.pop();

        if result {
            proven.push((a, b));
        } else {
            self.subtype_memo.insert((a, b), false);
        }
        result
    }

    fn subtype_structural(
        &mut self,
        a: ShapeId,
        b: ShapeId,
        assumed: &mut Vec<(ShapeId, ShapeId)>,
        proven: &mut Vec<(ShapeId, ShapeId)>,
    ) -> bool {
        let (ra, rb) = (self.resolve(a), self.resolve(b));
        if ra == rb {
            return true;
        }
        let sa = self.get(ra).clone();
        let sb = self.get(rb).clone();

        match (&sa, &sb) {
            (Shape::Error, _) | (_, Shape::Error) | (Shape::Never, _) => true,

            (_, Shape::Optional(inner_b)) => match &sa {
                Shape::None => true,
                Shape::Optional(inner_a) => self.subtype_inner(*inner_a, *inner_b, assumed, proven),
                _ => self.subtype_inner(ra, *inner_b, assumed, proven),
            },
            (Shape::Optional(_), _) => false,

            (Shape::Int, Shape::Int)
            | (Shape::Float, Shape::Float)
            | (Shape::Str, Shape::Str)
            | (Shape::Bool, Shape::Bool)
            | (Shape::None, Shape::None) => true,

            (Shape::Record(fields_a), Shape::Record(fields_b)) => fields_b.iter().all(|(name, shape_b)| {
                match fields_a.iter().find(|(n, _)| n == name) {
                    Some((_, shape_a)) => self.subtype_inner(*shape_a, *shape_b, assumed, proven),
                    None => false,
                }
            }),

            (Shape::List(elem_a), Shape::List(elem_b)) => self.subtype_inner(*elem_a, *elem_b, assumed, proven),

            (
                Shape::Func {
                    params: params_a,
                    ret: ret_a,
                },
                Shape::Func {
                    params: params_b,
                    ret: ret_b,
                },
            ) => {
                params_a.len() == params_b.len()
                    && params_a
                        .iter()
                        .zip(params_b)
                        .all(|(pa, pb)| self.subtype_inner(*pb, *pa, assumed, proven))
                    && self.subtype_inner(*ret_a, *ret_b, assumed, proven)
            }

            (Shape::Template(x), Shape::Template(y)) => x == y,
            (Shape::Builtin(x), Shape::Builtin(y)) => x == y,

            _ => false,
        }
    }

    /// Mutual subtyping.
    pub fn equivalent(&mut self, a: ShapeId, b: ShapeId) -> bool {
        self.is_subtype(a, b) && self.is_subtype(b, a)
    }

    /// The least shape both `a` and `b` are subtypes of, if there is one.
    pub fn join(&mut self, a: ShapeId, b: ShapeId) -> Option<ShapeId> {
        self.join_inner(a, b, 0)
    }

    fn join_inner(&mut self, a: ShapeId, b: ShapeId, depth: usize) -> Option<ShapeId> {
        if a == b {
            return Some(a);
        }
        if a == ShapeId::ERROR || b == ShapeId::ERROR {
            return Some(ShapeId::ERROR);
        }
        if self.is_subtype(a, b) {
            return Some(b);
        }
        if self.is_subtype(b, a) {
            return Some(a);
        }
        if depth >= MAX_JOIN_DEPTH {
            return None;
        }

        let (ra, rb) = (self.resolve(a), self.resolve(b));
        let sa = self.get(ra).clone();
        let sb = self.get(rb).clone();

        match (&sa, &sb) {
            (Shape::None, _) => Some(self.optional(b)),
            (_, Shape::None) => Some(self.optional(a)),
            (Shape::Optional(inner), _) => {
                let joined = self.join_inner(*inner, b, depth + 1)?;
                Some(self.optional(joined))
            }
            (_, Shape::Optional(inner)) => {
                let joined = self.join_inner(a, *inner, depth + 1)?;
                Some(self.optional(joined))
            }
            (Shape::Record(fields_a), Shape::Record(fields_b)) => {
                let mut fields = Vec::new();
                for (name, shape_a) in fields_a {
                    let Some((_, shape_b)) = fields_b.iter().find(|(n, _)| n == name) else {
                        continue;
                    };
                    if let Some(joined) = self.join_inner(*shape_a, *shape_b, depth + 1) {
                        fields.push((name.clone(), joined));
                    }
                }
                Some(self.record(fields))
            }
            (Shape::List(elem_a), Shape::List(elem_b)) => {
                let joined = self.join_inner(*elem_a, *elem_b, depth + 1)?;
                Some(self.list(joined))
            }
            (
                Shape::Func {
                    params: params_a,
                    ret: ret_a,
                },
                Shape::Func {
                    params: params_b,
                    ret: ret_b,
                },
            ) if params_a.len() == params_b.len() => {
                let same_params = params_a
                    .iter()
                    .zip(params_b)
                    .all(|(pa, pb)| self.equivalent(*pa, *pb));
                if !same_params {
                    return None;
                }
                let ret = self.join_inner(*ret_a, *ret_b, depth + 1)?;
                Some(self.func(params_a.clone(), ret))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(arena: &mut ShapeArena) -> ShapeId {
        arena.record(vec![("x".into(), ShapeId::INT), ("y".into(), ShapeId::INT)])
    }

    #[test]
    fn width_subtyping() {
        let mut arena = ShapeArena::new();
        let p = point(&mut arena);
        let x_only = arena.record(vec![("x".into(), ShapeId::INT)]);
        assert!(arena.is_subtype(p, x_only));
        assert!(!arena.is_subtype(x_only, p));
    }

    #[test]
    fn member_order_is_irrelevant() {
        let mut arena = ShapeArena::new();
        let xy = point(&mut arena);
        let yx = arena.record(vec![("y".into(), ShapeId::INT), ("x".into(), ShapeId::INT)]);
        assert_ne!(xy, yx);
        assert!(arena.equivalent(xy, yx));
    }

    #[test]
    fn functions_are_contravariant_in_parameters() {
        let mut arena = ShapeArena::new();
        let p = point(&mut arena);
        let x_only = arena.record(vec![("x".into(), ShapeId::INT)]);
        let takes_x = arena.func(vec![x_only], ShapeId::INT);
        let takes_point = arena.func(vec![p], ShapeId::INT);
        assert!(arena.is_subtype(takes_x, takes_point));
        assert!(!arena.is_subtype(takes_point, takes_x));
    }

    #[test]
    fn optional_accepts_none_and_inner() {
        let mut arena = ShapeArena::new();
        let maybe_int = arena.optional(ShapeId::INT);
        assert!(arena.is_subtype(ShapeId::NONE, maybe_int));
        assert!(arena.is_subtype(ShapeId::INT, maybe_int));
        assert!(!arena.is_subtype(maybe_int, ShapeId::INT));
        assert_eq!(arena.optional(maybe_int), maybe_int);
    }

    #[test]
    fn recursive_shapes_terminate() {
        let mut arena = ShapeArena::new();
        // type A = {v: Int, next: A?};  type B = {next: B?};
        let a = arena.declare_named("A");
        let a_opt = arena.optional(a);
        let a_body = arena.record(vec![("v".into(), ShapeId::INT), ("next".into(), a_opt)]);
        arena.define_named(a, a_body);
        let b = arena.declare_named("B");
        let b_opt = arena.optional(b);
        let b_body = arena.record(vec![("next".into(), b_opt)]);
        arena.define_named(b, b_body);

        assert!(arena.is_subtype(a, b));
        assert!(!arena.is_subtype(b, a));
        // Memoized answers agree with the first computation.
        assert!(arena.is_subtype(a, b));
        assert!(!arena.is_subtype(b, a));
    }

    #[test]
    fn join_of_records_keeps_common_members() {
        let mut arena = ShapeArena::new();
        let p = point(&mut arena);
        let xz = arena.record(vec![("x".into(), ShapeId::INT), ("z".into(), ShapeId::STR)]);
        let x_only = arena.record(vec![("x".into(), ShapeId::INT)]);
        assert_eq!(arena.join(p, xz), Some(x_only));
    }

    #[test]
    fn join_with_none_is_optional() {
        let mut arena = ShapeArena::new();
        let maybe_str = arena.optional(ShapeId::STR);
        assert_eq!(arena.join(ShapeId::STR, ShapeId::NONE), Some(maybe_str));
        assert_eq!(arena.join(ShapeId::INT, ShapeId::STR), None);
        assert_eq!(arena.join(ShapeId::NEVER, ShapeId::STR), Some(ShapeId::STR));
    }

    #[test]
    fn uninhabited_recursive_record_is_detected() {
        let mut arena = ShapeArena::new();
        // type Bad = {next: Bad};  type Good = {next: Good?};
        let bad = arena.declare_named("Bad");
        let bad_body = arena.record(vec![("next".into(), bad)]);
        arena.define_named(bad, bad_body);
        let good = arena.declare_named("Good");
        let good_opt = arena.optional(good);
        let good_body = arena.record(vec![("next".into(), good_opt)]);
        arena.define_named(good, good_body);

        assert_eq!(arena.uninhabited(&[bad, good]), vec![bad]);
    }
}
