//! Type checking for Ratus.
//!
//! Types are structural: a value fits wherever its shape has at least the
//! members the context uses. The checker walks the module once, keeping an
//! explicit scope chain, and records the shape of every expression it checks.
//!
//! ## Features
//!
//! - Width and depth record subtyping, contravariant function parameters
//! - Recursive `type` declarations, with uninhabited ones rejected
//! - Functions with unannotated parameters checked per call (templates)
//! - Return type inference, including recursive functions
//! - Optional narrowing by comparison with `none`

mod builtins;
mod check;
pub mod errors;
mod scope;
mod shape;
mod subtype;

pub use builtins::{Builtin, BuiltinMisuse, call_shape};
pub use check::TypeTable;
pub use errors::{TypeError, TypeErrorKind};
pub use scope::FnId;
pub use shape::{Shape, ShapeArena, ShapeId, TemplateId};

use ratus_syntax::{Expr, Module, TypeExpr};

use crate::check::TypeChecker;

/// The declared shape of a function supplied by the embedding application.
///
/// Host functions live in the same outermost scope as the builtins, so a
/// program may shadow them.
#[derive(Debug, Clone)]
pub struct HostSignature {
    pub name: String,
    /// Must be a function type such as `fn(Int) -> Str`.
    pub ty: TypeExpr,
}

/// A module that passed checking, with the shapes found for it.
#[derive(Debug)]
pub struct Checked<'m> {
    pub module: &'m Module,
    pub arena: ShapeArena,
    pub types: TypeTable,
}

impl Checked<'_> {
    pub fn shape_of(&self, expr: &Expr) -> Option<ShapeId> {
        self.types.get(expr.id)
    }

    /// The display form of the shape recorded for `expr`.
    pub fn display_shape(&self, expr: &Expr) -> Option<String> {
        self.shape_of(expr).map(|s| self.arena.display(s))
    }
}

/// Type check a module.
///
/// All errors found in the module are returned, ordered by position.
pub fn check(module: &Module) -> Result<Checked<'_>, Vec<TypeError>> {
    check_with_host(module, &[])
}

/// Type check a module that may call the given host functions.
///
/// Problems in a signature are reported without a source position.
#[tracing::instrument(level = "debug", skip_all, fields(host = host.len()))]
pub fn check_with_host<'m>(module: &'m Module, host: &[&HostSignature]) -> Result<Checked<'m>, Vec<TypeError>> {
    let mut checker = TypeChecker::new(host);
    checker.check_module(module);
    let errors = checker.finish();
    tracing::debug!(errors = errors.len(), shapes = checker.arena.len(), "type check finished");
    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(Checked {
        module,
        arena: checker.arena,
        types: checker.types,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TypeErrorKind> {
        let module = ratus_parser::parse_source(source).expect("test source parses");
        match check(&module) {
            Ok(_) => Vec::new(),
            Err(errors) => errors.into_iter().map(|e| e.kind).collect(),
        }
    }

    fn entry_shape(source: &str) -> String {
        let module = ratus_parser::parse_source(source).expect("test source parses");
        let checked = check(&module).unwrap_or_else(|errs| panic!("unexpected errors: {errs:#?}"));
        let entry = module.entry.as_ref().expect("module has an entry");
        checked.display_shape(entry).expect("entry was checked")
    }

    #[test]
    fn test_check_arithmetic() {
        assert_eq!(entry_shape("1 + 2"), "Int");
        assert_eq!(entry_shape("1 + 2.5"), "Float");
        assert_eq!(entry_shape("\"a\" + \"b\""), "Str");
        assert_eq!(entry_shape("[1] + [2]"), "[Int]");
    }

    #[test]
    fn test_check_mixed_add_is_rejected_once() {
        let module = ratus_parser::parse_source("1 + \"a\"").expect("parses");
        let errors = check(&module).err().expect("rejected");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind.name(), "TypeMismatchError");
        assert_eq!(errors[0].span.range(), 0..7);
    }

    #[test]
    fn test_check_record_width_subtyping() {
        let source = "
            fn norm(p: {x: Int, y: Int}) -> Int { return p.x * p.x + p.y * p.y; }
            norm({x: 1, y: 2, z: 3})
        ";
        assert_eq!(entry_shape(source), "Int");
        assert_eq!(
            kinds("fn norm(p: {x: Int, y: Int}) -> Int { return p.x; } norm({x: 1})"),
            vec![TypeErrorKind::ArgumentType]
        );
    }

    #[test]
    fn test_check_template_infers_from_use() {
        let source = "fn get_y(p) { return p.y; } get_y({x: 1, y: \"b\"})";
        assert_eq!(entry_shape(source), "Str");
        assert_eq!(
            kinds("fn get_y(p) { return p.y; } get_y({x: 1})"),
            vec![TypeErrorKind::MissingMember]
        );
    }

    #[test]
    fn test_check_recursive_inference() {
        let source = "fn fact(n) { if n <= 1 { return 1; } return n * fact(n - 1); } fact(5)";
        assert_eq!(entry_shape(source), "Int");
    }

    #[test]
    fn test_check_growing_recursion_hits_limit() {
        let source = "fn wrap(x) { return wrap([x]); } wrap(1)";
        assert!(kinds(source).contains(&TypeErrorKind::InferenceLimit));
    }

    #[test]
    fn test_check_optional_member_needs_narrowing() {
        assert_eq!(entry_shape("let x = {y: none}; x.y"), "None");
        assert_eq!(
            kinds("fn f(p: {v: Int}?) -> Int { return p.v; } f(none)"),
            vec![TypeErrorKind::TypeMismatch]
        );
        let narrowed = "fn f(p: {v: Int}?) -> Int { if p != none { return p.v; } return 0; } f(none)";
        assert_eq!(kinds(narrowed), vec![]);
        let else_narrowed = "fn f(p: {v: Int}?) -> Int { if p == none { return 0; } else { return p.v; } } f(none)";
        assert_eq!(kinds(else_narrowed), vec![]);
    }

    #[test]
    fn test_check_inferred_return_includes_fallthrough() {
        assert_eq!(entry_shape("fn f(x: Int) { if x > 0 { return x; } } f(1)"), "Int?");
    }

    #[test]
    fn test_check_recursive_types() {
        assert_eq!(
            kinds("type Node = {v: Int, next: Node?}; let n: Node = {v: 1, next: none}; n.v"),
            vec![]
        );
        assert_eq!(kinds("type Bad = {next: Bad};"), vec![TypeErrorKind::InfiniteType]);
        assert_eq!(kinds("let x: Missing = 1;"), vec![TypeErrorKind::UnboundType]);
    }

    #[test]
    fn test_check_bindings() {
        assert_eq!(kinds("let x = 1; x = 2;"), vec![TypeErrorKind::ImmutableAssignment]);
        assert_eq!(kinds("var x = 1; x = \"s\";"), vec![TypeErrorKind::TypeMismatch]);
        assert_eq!(kinds("let x = 1; let x = 2;"), vec![TypeErrorKind::DuplicateBinding]);
        assert_eq!(kinds("y"), vec![TypeErrorKind::UnboundName]);
        assert_eq!(kinds("var p = {x: 1}; p.x = 5;"), vec![]);
    }

    #[test]
    fn test_check_empty_list_needs_annotation() {
        let module = ratus_parser::parse_source("var xs = []; xs = push(xs, 1);").expect("parses");
        let errors = check(&module).err().expect("rejected");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].help.as_deref().is_some_and(|h| h.contains("var xs: [Int]")));
        assert_eq!(kinds("var xs: [Int] = []; xs = push(xs, 1);"), vec![]);
    }

    #[test]
    fn test_check_calls() {
        assert_eq!(kinds("fn f(a: Int) -> Int { return a; } f(1, 2)"), vec![TypeErrorKind::Arity]);
        assert_eq!(kinds("let x = 1; x(2)"), vec![TypeErrorKind::TypeMismatch]);
        assert_eq!(kinds("len(1)"), vec![TypeErrorKind::ArgumentType]);
        assert_eq!(entry_shape("range(3)"), "[Int]");
    }

    #[test]
    fn test_check_higher_order_template() {
        let source = "
            fn apply(f: fn(Int) -> Int, x: Int) -> Int { return f(x); }
            apply(fn(n) { return n + 1; }, 2)
        ";
        assert_eq!(entry_shape(source), "Int");
        // The lambda is checked with the parameter shape `apply` offers.
        assert_eq!(
            kinds("fn apply(f: fn(Int) -> Int) -> Int { return f(1); } apply(fn(s) { return s + \"!\"; })"),
            vec![TypeErrorKind::TypeMismatch]
        );
        assert_eq!(
            kinds("fn apply(f: fn(Int) -> Int) -> Int { return f(1); } apply(fn(s) { return \"!\"; })"),
            vec![TypeErrorKind::ArgumentType]
        );
    }

    #[test]
    fn test_check_misplaced_control_flow() {
        assert_eq!(kinds("return 1;"), vec![TypeErrorKind::MisplacedControlFlow]);
        assert_eq!(kinds("break;"), vec![TypeErrorKind::MisplacedControlFlow]);
        assert_eq!(kinds("while true { break; }"), vec![]);
        assert_eq!(
            kinds("while true { fn f() { continue; } }"),
            vec![TypeErrorKind::MisplacedControlFlow]
        );
    }

    #[test]
    fn test_check_incompatible_returns() {
        assert_eq!(
            kinds("fn f(x: Bool) { if x { return 1; } return \"a\"; } f(true)"),
            vec![TypeErrorKind::ReturnType]
        );
    }

    fn host(name: &str, ty: &str) -> HostSignature {
        let tokens = ratus_lexer::tokenize(ty).expect("signature lexes");
        HostSignature {
            name: name.to_string(),
            ty: ratus_parser::parse_type(tokens).expect("signature parses"),
        }
    }

    fn host_kinds(source: &str, signatures: &[HostSignature]) -> Vec<TypeErrorKind> {
        let module = ratus_parser::parse_source(source).expect("test source parses");
        let refs: Vec<&HostSignature> = signatures.iter().collect();
        match check_with_host(&module, &refs) {
            Ok(_) => Vec::new(),
            Err(errors) => errors.into_iter().map(|e| e.kind).collect(),
        }
    }

    #[test]
    fn test_check_host_functions() {
        let choose = [host("choose", "fn(Bool, Int, Int) -> Int")];
        assert_eq!(host_kinds("choose(1 > 2, 10, 5) + 1", &choose), vec![]);
        assert_eq!(host_kinds("choose(1, 10, 5)", &choose), vec![TypeErrorKind::ArgumentType]);
        assert_eq!(host_kinds("choose(true, 1)", &choose), vec![TypeErrorKind::Arity]);
        assert_eq!(host_kinds("let choose = 1; choose + 1", &choose), vec![]);
        assert_eq!(host_kinds("choose", &[]), vec![TypeErrorKind::UnboundName]);
    }

    #[test]
    fn test_check_bad_host_signatures() {
        let errors = {
            let module = ratus_parser::parse_source("1").expect("parses");
            let signature = host("answer", "Int");
            check_with_host(&module, &[&signature]).err().expect("rejected")
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, TypeErrorKind::TypeMismatch);
        assert!(errors[0].message.contains("answer"));
        assert_eq!(host_kinds("1", &[host("len", "fn(Int) -> Int")]), vec![TypeErrorKind::DuplicateBinding]);
        assert_eq!(host_kinds("1", &[host("f", "fn(Point) -> Int")]), vec![TypeErrorKind::UnboundType]);
    }

    #[test]
    fn test_check_errors_are_ordered() {
        let module = ratus_parser::parse_source("let a = z; let b = 1 + true; q").expect("parses");
        let errors = check(&module).err().expect("rejected");
        let starts: Vec<u32> = errors.iter().map(|e| e.span.start.0).collect();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(starts, sorted);
        assert_eq!(errors.len(), 3);
    }
}
