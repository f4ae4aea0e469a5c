//! Integration tests for ratus-typeck crate.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use ratus_typeck::{ShapeArena, ShapeId, TypeError, TypeErrorKind, check};

fn errors(source: &str) -> Vec<TypeError> {
    let module = ratus_parser::parse_source(source).expect("test source parses");
    match check(&module) {
        Ok(_) => Vec::new(),
        Err(errors) => errors,
    }
}

fn kinds(source: &str) -> Vec<TypeErrorKind> {
    errors(source).into_iter().map(|e| e.kind).collect()
}

fn shape_of_entry(source: &str) -> String {
    let module = ratus_parser::parse_source(source).expect("test source parses");
    let checked = check(&module).unwrap_or_else(|errs| panic!("unexpected type errors: {errs:#?}"));
    let entry = module.entry.as_ref().expect("module has an entry");
    checked.display_shape(entry).expect("entry has a shape")
}

// ============================================================================
// Well-typed Programs
// ============================================================================

#[test]
fn test_literal_shapes() {
    assert_eq!(shape_of_entry("1"), "Int");
    assert_eq!(shape_of_entry("1.5"), "Float");
    assert_eq!(shape_of_entry("\"s\""), "Str");
    assert_eq!(shape_of_entry("true"), "Bool");
    assert_eq!(shape_of_entry("[1, 2]"), "[Int]");
    assert_eq!(shape_of_entry("let r = {a: 1, b: \"x\"}; r.b"), "Str");
}

#[test]
fn test_member_access_on_none_member() {
    assert_eq!(kinds("let x = {y: none}; x.y"), vec![]);
    assert_eq!(shape_of_entry("let x = {y: none}; x.y"), "None");
}

#[test]
fn test_structural_parameter_accepts_wider_records() {
    let source = "
        fn name_of(p: {name: Str}) -> Str { return p.name; }
        let user = {name: \"ada\", age: 36};
        name_of(user)
    ";
    assert_eq!(shape_of_entry(source), "Str");
}

#[test]
fn test_list_of_mixed_records_joins() {
    let source = "let xs = [{a: 1, b: 2}, {a: 3}]; xs[0].a";
    assert_eq!(shape_of_entry(source), "Int");
    assert_eq!(kinds("let xs = [{a: 1, b: 2}, {a: 3}]; xs[0].b"), vec![TypeErrorKind::MissingMember]);
}

#[test]
fn test_loops_and_strings() {
    let source = "
        var n = 0;
        for c in \"abc\" { n = n + len(c); }
        for i in range(1, 4) { n = n + i; }
        n
    ";
    assert_eq!(shape_of_entry(source), "Int");
}

#[test]
fn test_template_instantiated_per_shape() {
    let source = "
        fn first(xs) { return xs[0]; }
        let a = first([1, 2]);
        let b = first([\"x\"]);
        b + str(a)
    ";
    assert_eq!(shape_of_entry(source), "Str");
}

#[test]
fn test_recursive_type_declaration() {
    let source = "
        type List = {head: Int, tail: List?};
        fn total(l: List?) -> Int {
            if l != none { return l.head + total(l.tail); }
            return 0;
        }
        total({head: 1, tail: {head: 2, tail: none}})
    ";
    assert_eq!(shape_of_entry(source), "Int");
}

// ============================================================================
// Rejected Programs
// ============================================================================

#[test]
fn test_mixed_addition_reports_one_error() {
    let errs = errors("1 + \"a\"");
    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].kind, TypeErrorKind::TypeMismatch);
    assert_eq!(errs[0].kind.name(), "TypeMismatchError");
    assert_eq!(errs[0].span.range(), 0..7);
}

#[test]
fn test_errors_accumulate_in_source_order() {
    let errs = errors("let a = 1 + true; let b = missing; let c = {x: 1}.field;");
    let kinds: Vec<_> = errs.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TypeErrorKind::TypeMismatch,
            TypeErrorKind::UnboundName,
            TypeErrorKind::MissingMember,
        ]
    );
    assert!(errs.windows(2).all(|w| w[0].span.start <= w[1].span.start));
}

#[test]
fn test_condition_must_be_bool() {
    assert_eq!(kinds("if 1 { }"), vec![TypeErrorKind::TypeMismatch]);
    assert_eq!(kinds("while \"x\" { }"), vec![TypeErrorKind::TypeMismatch]);
}

#[test]
fn test_declared_return_is_enforced() {
    assert_eq!(
        kinds("fn f() -> Int { return \"s\"; } f()"),
        vec![TypeErrorKind::ReturnType]
    );
    assert_eq!(
        kinds("fn f(x: Int) -> Int { if x > 0 { return 1; } } f(1)"),
        vec![TypeErrorKind::ReturnType]
    );
}

#[test]
fn test_arity_and_arguments() {
    assert_eq!(kinds("fn f(a: Int) -> Int { return a; } f()"), vec![TypeErrorKind::Arity]);
    assert_eq!(
        kinds("fn f(a: Int) -> Int { return a; } f(\"s\")"),
        vec![TypeErrorKind::ArgumentType]
    );
}

#[test]
fn test_error_diagnostics_carry_codes() {
    let errs = errors("1 + \"a\"");
    let diagnostic = ratus_diagnostic::Diagnostic::from(&errs[0]);
    assert_eq!(diagnostic.kind, ratus_diagnostic::DiagnosticKind::Type);
    assert!(diagnostic.code.is_some());
    assert!(!diagnostic.labels.is_empty());
}

// ============================================================================
// Subtyping Properties
// ============================================================================

#[derive(Debug, Clone)]
enum Tree {
    Int,
    Float,
    Str,
    Bool,
    None,
    Never,
    List(Box<Tree>),
    Optional(Box<Tree>),
    Record(Vec<(String, Tree)>),
    Func(Vec<Tree>, Box<Tree>),
}

fn tree() -> impl Strategy<Value = Tree> {
    let leaf = prop_oneof![
        Just(Tree::Int),
        Just(Tree::Float),
        Just(Tree::Str),
        Just(Tree::Bool),
        Just(Tree::None),
        Just(Tree::Never),
    ];
    leaf.prop_recursive(3, 24, 3, |inner| {
        prop_oneof![
            inner.clone().prop_map(|t| Tree::List(Box::new(t))),
            inner.clone().prop_map(|t| Tree::Optional(Box::new(t))),
            prop::collection::btree_map(prop::sample::select(vec!["a", "b", "c"]), inner.clone(), 0..3)
                .prop_map(|fields| Tree::Record(fields.into_iter().map(|(n, t)| (n.to_string(), t)).collect())),
            (prop::collection::vec(inner.clone(), 0..2), inner)
                .prop_map(|(params, ret)| Tree::Func(params, Box::new(ret))),
        ]
    })
}

fn build(arena: &mut ShapeArena, tree: &Tree) -> ShapeId {
    match tree {
        Tree::Int => ShapeId::INT,
        Tree::Float => ShapeId::FLOAT,
        Tree::Str => ShapeId::STR,
        Tree::Bool => ShapeId::BOOL,
        Tree::None => ShapeId::NONE,
        Tree::Never => ShapeId::NEVER,
        Tree::List(elem) => {
            let elem = build(arena, elem);
            arena.list(elem)
        }
        Tree::Optional(inner) => {
            let inner = build(arena, inner);
            arena.optional(inner)
        }
        Tree::Record(fields) => {
            let fields = fields.iter().map(|(n, t)| (n.clone(), build(arena, t))).collect();
            arena.record(fields)
        }
        Tree::Func(params, ret) => {
            let params = params.iter().map(|t| build(arena, t)).collect();
            let ret = build(arena, ret);
            arena.func(params, ret)
        }
    }
}

proptest! {
    #[test]
    fn test_subtyping_is_reflexive(t in tree()) {
        let mut arena = ShapeArena::new();
        let a = build(&mut arena, &t);
        let b = build(&mut arena, &t);
        prop_assert!(arena.is_subtype(a, b));
    }

    #[test]
    fn test_subtyping_is_transitive(a in tree(), b in tree(), c in tree()) {
        let mut arena = ShapeArena::new();
        let (a, b, c) = (build(&mut arena, &a), build(&mut arena, &b), build(&mut arena, &c));
        if arena.is_subtype(a, b) && arena.is_subtype(b, c) {
            prop_assert!(arena.is_subtype(a, c));
        }
    }

    #[test]
    fn test_type_is_subtype_of_its_optional(t in tree()) {
        let mut arena = ShapeArena::new();
        let a = build(&mut arena, &t);
        let opt = arena.optional(a);
        prop_assert!(arena.is_subtype(a, opt));
        prop_assert!(arena.is_subtype(ShapeId::NONE, opt));
    }
}

#[test]
fn test_mutually_recursive_shapes_terminate() {
    let mut arena = ShapeArena::new();
    // type Even = {next: Odd?}; type Odd = {next: Even?};
    let even = arena.declare_named("Even");
    let odd = arena.declare_named("Odd");
    let odd_opt = arena.optional(odd);
    let even_opt = arena.optional(even);
    let even_body = arena.record(vec![("next".into(), odd_opt)]);
    let odd_body = arena.record(vec![("next".into(), even_opt)]);
    arena.define_named(even, even_body);
    arena.define_named(odd, odd_body);

    assert!(arena.is_subtype(odd, even));
    assert!(arena.is_subtype(even, odd));

    let maybe_int = arena.optional(ShapeId::INT);
    let flat = arena.record(vec![("next".into(), maybe_int)]);
    assert!(!arena.is_subtype(even, flat));
}
