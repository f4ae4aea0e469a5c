//! Type checker implementation.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use ratus_common::Span;
use ratus_syntax::{BinOp, Block, Expr, ExprKind, FnDecl, Ident, Module, NodeId, Stmt, StmtKind, TypeExpr, TypeExprKind, UnaryOp};

use crate::builtins::{self, Builtin, BuiltinMisuse};
use crate::errors::{self, TypeError, TypeMismatchError};
use crate::scope::{Binding, FnId, Scope};
use crate::shape::{Shape, ShapeArena, ShapeId};
use crate::HostSignature;

/// Nested template instantiations allowed before inference gives up.
const MAX_INSTANTIATION_DEPTH: usize = 48;
/// Total body checks across the module.
const MAX_INSTANCES: usize = 4096;
/// Rounds of re-checking a recursive function with a widened result guess.
const MAX_FIXPOINT_ROUNDS: usize = 4;

const BUILTIN_TYPES: [&str; 5] = ["Int", "Float", "Str", "Bool", "None"];

/// Shapes of checked expressions, keyed by node id.
#[derive(Debug, Default)]
pub struct TypeTable {
    shapes: HashMap<NodeId, ShapeId>,
}

impl TypeTable {
    pub fn get(&self, id: NodeId) -> Option<ShapeId> {
        self.shapes.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    fn insert(&mut self, id: NodeId, shape: ShapeId) {
        self.shapes.insert(id, shape);
    }
}

struct FnInfo<'m> {
    decl: &'m FnDecl,
    /// Scope the function was defined in.
    scope: Rc<Scope>,
    /// Annotated parameter shapes.
    params: Vec<Option<ShapeId>>,
    declared_ret: Option<ShapeId>,
    /// Set when a parameter is unannotated.
    template: Option<ShapeId>,
    checked: bool,
    /// Whether the final sweep should check the body if no call did.
    sweep: bool,
}

type InstanceKey = (FnId, Vec<ShapeId>);

/// An instantiation whose body is being checked right now.
struct Active {
    key: InstanceKey,
    provisional: ShapeId,
    recursed: bool,
}

/// Per-function control flow context.
#[derive(Default)]
struct Frame {
    in_function: bool,
    declared_ret: Option<ShapeId>,
    returns: Vec<(ShapeId, Span)>,
    loop_depth: usize,
}

/// The type checker.
pub(crate) struct TypeChecker<'m> {
    pub(crate) arena: ShapeArena,
    pub(crate) types: TypeTable,
    errors: Vec<TypeError>,
    scope: Rc<Scope>,
    functions: Vec<FnInfo<'m>>,
    templates: HashMap<ShapeId, FnId>,
    /// Memoized result shape per function and argument shapes.
    instances: HashMap<InstanceKey, ShapeId>,
    /// Insertion order of `instances`, for rolling back a failed round.
    instance_log: Vec<InstanceKey>,
    body_checks: usize,
    active: Vec<Active>,
    frames: Vec<Frame>,
    sweeping: bool,
}

impl<'m> TypeChecker<'m> {
    pub(crate) fn new(host: &[&HostSignature]) -> Self {
        let mut arena = ShapeArena::new();
        let prelude = Scope::root();
        for builtin in Builtin::ALL {
            let shape = arena.builtin(builtin);
            let binding = Binding {
                shape,
                declared: shape,
                mutable: false,
                slot: 0,
                span: Span::DUMMY,
                function: None,
            };
            // Names in `Builtin::ALL` are distinct.
            let _ = prelude.define(builtin.name(), binding);
        }
        let mut checker = Self {
            arena,
            types: TypeTable::default(),
            errors: Vec::new(),
            scope: Rc::clone(&prelude),
            functions: Vec::new(),
            templates: HashMap::new(),
            instances: HashMap::new(),
            instance_log: Vec::new(),
            body_checks: 0,
            active: Vec::new(),
            frames: vec![Frame::default()],
            sweeping: false,
        };
        for signature in host {
            checker.declare_host(signature);
        }
        checker.scope = Scope::child(&prelude);
        checker
    }

    /// Bind a host function next to the builtins.
    fn declare_host(&mut self, signature: &HostSignature) {
        let before = self.errors.len();
        let shape = self.resolve_type(&signature.ty);
        let resolved = self.arena.resolve(shape);
        if !matches!(self.arena.get(resolved), Shape::Func { .. } | Shape::Error) {
            let found = self.arena.display(shape);
            self.errors.push(
                TypeMismatchError::new("a function type", found, Span::DUMMY)
                    .with_context("a host function signature")
                    .build(),
            );
        }
        let binding = Binding {
            shape,
            declared: shape,
            mutable: false,
            slot: 0,
            span: Span::DUMMY,
            function: None,
        };
        if self.scope.define(&signature.name, binding).is_err() {
            self.errors.push(errors::duplicate_binding(&signature.name, Span::DUMMY));
        }
        // Signature spans point into the signature text, not the program.
        for err in &mut self.errors[before..] {
            err.span = Span::DUMMY;
            err.message = format!("host function `{}`: {}", signature.name, err.message);
        }
    }

    pub(crate) fn check_module(&mut self, module: &'m Module) {
        self.check_stmts(&module.stmts);
        if let Some(entry) = &module.entry {
            self.check_expr(entry);
        }
        self.sweep_unchecked();
    }

    /// Errors ordered by position, first occurrence kept.
    pub(crate) fn finish(&mut self) -> Vec<TypeError> {
        let mut errors = std::mem::take(&mut self.errors);
        errors.sort_by_key(|e| (e.span.start, e.span.end));
        let mut seen = HashSet::new();
        errors.retain(|e| seen.insert((e.span, e.message.clone(), e.label.clone())));
        errors
    }

    /// Check the bodies no call reached, with unannotated parameters unknown.
    fn sweep_unchecked(&mut self) {
        self.sweeping = true;
        let mut index = 0;
        while index < self.functions.len() {
            let info = &self.functions[index];
            if info.sweep && !info.checked {
                let args: Vec<ShapeId> = info.params.iter().map(|p| p.unwrap_or(ShapeId::ERROR)).collect();
                let site = info.decl.span;
                self.instantiate(FnId(index as u32), &args, site);
            }
            index += 1;
        }
        self.sweeping = false;
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn check_stmts(&mut self, stmts: &'m [Stmt]) {
        self.declare_types(stmts);
        let mut hoisted = self.hoist_functions(stmts).into_iter();
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Fn(_) => {
                    if let Some(fid) = hoisted.next() {
                        if self.functions[fid.0 as usize].template.is_none() {
                            self.function_shape(fid);
                        }
                    }
                }
                _ => self.check_stmt(stmt),
            }
        }
    }

    fn declare_types(&mut self, stmts: &'m [Stmt]) {
        let mut pending: Vec<(ShapeId, &'m Ident, &'m TypeExpr)> = Vec::new();
        for stmt in stmts {
            let StmtKind::TypeDecl { name, ty } = &stmt.kind else {
                continue;
            };
            if BUILTIN_TYPES.contains(&name.name.as_str()) {
                self.errors.push(errors::duplicate_binding(&name.name, name.span));
                continue;
            }
            let id = self.arena.declare_named(&name.name);
            if self.scope.define_type(&name.name, id, name.span).is_err() {
                self.errors.push(errors::duplicate_binding(&name.name, name.span));
                continue;
            }
            pending.push((id, name, ty));
        }

        for &(id, _, ty) in &pending {
            let target = self.resolve_type(ty);
            self.arena.define_named(id, target);
        }

        let ids: Vec<ShapeId> = pending.iter().map(|&(id, _, _)| id).collect();
        for bad in self.arena.uninhabited(&ids) {
            if let Some(&(_, name, _)) = pending.iter().find(|&&(id, _, _)| id == bad) {
                self.errors.push(errors::infinite_type(&name.name, name.span));
            }
            self.arena.define_named(bad, ShapeId::ERROR);
        }
    }

    fn hoist_functions(&mut self, stmts: &'m [Stmt]) -> Vec<FnId> {
        let mut ids = Vec::new();
        for stmt in stmts {
            let StmtKind::Fn(decl) = &stmt.kind else {
                continue;
            };
            let fid = self.register_fn(decl);
            ids.push(fid);
            let Some(name) = &decl.name else {
                continue;
            };
            let binding = Binding {
                shape: self.functions[fid.0 as usize].template.unwrap_or(ShapeId::ERROR),
                declared: ShapeId::ERROR,
                mutable: false,
                slot: 0,
                span: name.span,
                function: Some(fid),
            };
            if self.scope.define(&name.name, binding).is_err() {
                self.errors.push(errors::duplicate_binding(&name.name, name.span));
            }
        }
        ids
    }

    fn register_fn(&mut self, decl: &'m FnDecl) -> FnId {
        let params = decl
            .params
            .iter()
            .map(|p| p.ty.as_ref().map(|t| self.resolve_type(t)))
            .collect();
        let declared_ret = decl.ret.as_ref().map(|t| self.resolve_type(t));
        let template = if decl.is_fully_annotated() {
            None
        } else {
            Some(self.arena.template(decl.display_name()))
        };

        let fid = FnId(self.functions.len() as u32);
        if let Some(t) = template {
            self.templates.insert(t, fid);
        }
        self.functions.push(FnInfo {
            decl,
            scope: Rc::clone(&self.scope),
            params,
            declared_ret,
            template,
            checked: false,
            sweep: self.active.is_empty() || self.sweeping,
        });
        fid
    }

    fn resolve_type(&mut self, ty: &TypeExpr) -> ShapeId {
        match &ty.kind {
            TypeExprKind::Named(ident) => match ident.name.as_str() {
                "Int" => ShapeId::INT,
                "Float" => ShapeId::FLOAT,
                "Str" => ShapeId::STR,
                "Bool" => ShapeId::BOOL,
                "None" => ShapeId::NONE,
                name => match self.scope.lookup_type(name) {
                    Some(shape) => shape,
                    None => {
                        self.errors.push(errors::unbound_type(name, ident.span));
                        ShapeId::ERROR
                    }
                },
            },
            TypeExprKind::Record(fields) => {
                let mut members: Vec<(String, ShapeId)> = Vec::with_capacity(fields.len());
                for field in fields {
                    if members.iter().any(|(n, _)| *n == field.name.name) {
                        self.errors.push(errors::duplicate_binding(&field.name.name, field.name.span));
                        continue;
                    }
                    let shape = self.resolve_type(&field.ty);
                    members.push((field.name.name.clone(), shape));
                }
                self.arena.record(members)
            }
            TypeExprKind::List(elem) => {
                let elem = self.resolve_type(elem);
                self.arena.list(elem)
            }
            TypeExprKind::Function { params, ret } => {
                let params = params.iter().map(|p| self.resolve_type(p)).collect();
                let ret = self.resolve_type(ret);
                self.arena.func(params, ret)
            }
            TypeExprKind::Optional(inner) => {
                let inner = self.resolve_type(inner);
                self.arena.optional(inner)
            }
        }
    }

    // ========================================================================
    // Functions
    // ========================================================================

    /// The shape a reference to the function evaluates to.
    fn function_shape(&mut self, fid: FnId) -> ShapeId {
        let info = &self.functions[fid.0 as usize];
        if let Some(template) = info.template {
            return template;
        }
        let params: Vec<ShapeId> = info.params.iter().map(|p| p.unwrap_or(ShapeId::ERROR)).collect();
        let site = info.decl.span;
        let ret = self.instantiate(fid, &params, site);
        self.arena.func(params, ret)
    }

    /// Check the body of `fid` with parameters of the given shapes and return
    /// its result shape.
    ///
    /// A recursive call to an instance that is still being checked sees a
    /// provisional result, `Never` at first. When the body actually recursed
    /// and its result differs from the guess, it is checked again with the
    /// result as the new guess, discarding errors and instances derived from
    /// the old one.
    fn instantiate(&mut self, fid: FnId, args: &[ShapeId], site: Span) -> ShapeId {
        let key: InstanceKey = (fid, args.to_vec());
        if let Some(&ret) = self.instances.get(&key) {
            return ret;
        }
        let info = &self.functions[fid.0 as usize];
        let declared_ret = info.declared_ret;
        let name = info.decl.display_name();

        if let Some(pos) = self.active.iter().position(|a| a.key == key) {
            if let Some(ret) = declared_ret {
                return ret;
            }
            self.active[pos].recursed = true;
            return self.active[pos].provisional;
        }
        if self.active.len() >= MAX_INSTANTIATION_DEPTH || self.body_checks >= MAX_INSTANCES {
            self.errors.push(errors::inference_limit(name, site));
            return ShapeId::ERROR;
        }

        tracing::trace!(
            function = name,
            args = ?args.iter().map(|&a| self.arena.display(a)).collect::<Vec<_>>(),
            "instantiating"
        );

        self.active.push(Active {
            key: key.clone(),
            provisional: ShapeId::NEVER,
            recursed: false,
        });
        let errors_mark = self.errors.len();
        let log_mark = self.instance_log.len();

        let mut ret = ShapeId::ERROR;
        let mut settled = false;
        for _ in 0..MAX_FIXPOINT_ROUNDS {
            self.body_checks += 1;
            ret = self.check_body(fid, args);
            let Some((recursed, provisional)) = self.active.last().map(|a| (a.recursed, a.provisional)) else {
                break;
            };
            if !recursed || declared_ret.is_some() || self.arena.equivalent(ret, provisional) {
                settled = true;
                break;
            }
            self.errors.truncate(errors_mark);
            for stale in self.instance_log.drain(log_mark..) {
                self.instances.remove(&stale);
            }
            if let Some(top) = self.active.last_mut() {
                top.provisional = ret;
                top.recursed = false;
            }
        }
        self.active.pop();

        if !settled {
            let name = self.functions[fid.0 as usize].decl.display_name();
            self.errors.push(errors::inference_limit(name, site));
            ret = ShapeId::ERROR;
        }
        self.functions[fid.0 as usize].checked = true;
        self.instances.insert(key.clone(), ret);
        self.instance_log.push(key);
        ret
    }

    fn check_body(&mut self, fid: FnId, args: &[ShapeId]) -> ShapeId {
        let info = &self.functions[fid.0 as usize];
        let decl = info.decl;
        let declared_ret = info.declared_ret;
        let scope = Scope::child(&info.scope);

        for (param, &shape) in decl.params.iter().zip(args) {
            let binding = Binding {
                shape,
                declared: shape,
                mutable: false,
                slot: 0,
                span: param.span,
                function: None,
            };
            if scope.define(&param.name.name, binding).is_err() {
                self.errors.push(errors::duplicate_binding(&param.name.name, param.name.span));
            }
        }

        let outer = std::mem::replace(&mut self.scope, scope);
        self.frames.push(Frame {
            in_function: true,
            declared_ret,
            ..Frame::default()
        });
        self.check_stmts(&decl.body.stmts);
        let frame = self.frames.pop().unwrap_or_default();
        self.scope = outer;

        let falls_through = !always_returns(&decl.body);
        if let Some(ret) = declared_ret {
            if falls_through && !self.arena.is_subtype(ShapeId::NONE, ret) {
                let expected = self.arena.display(ret);
                self.errors.push(errors::missing_return(&expected, decl.body.span));
            }
            return ret;
        }

        let mut result = ShapeId::NEVER;
        let mut failed = false;
        for (shape, span) in frame.returns {
            match self.arena.join(result, shape) {
                Some(joined) => result = joined,
                None => {
                    let (first, found) = (self.arena.display(result), self.arena.display(shape));
                    self.errors.push(errors::incompatible_returns(&first, &found, span));
                    failed = true;
                }
            }
        }
        if failed {
            return ShapeId::ERROR;
        }
        if falls_through {
            result = self.arena.join(result, ShapeId::NONE).unwrap_or(ShapeId::ERROR);
        }
        result
    }

    /// Whether a value of shape `actual` may be used where `expected` is.
    ///
    /// Templates and builtins have no fixed function shape, so against a
    /// function shape they are checked by calling them with its parameters.
    fn conforms(&mut self, actual: ShapeId, expected: ShapeId) -> bool {
        let resolved_actual = self.arena.resolve(actual);
        let resolved_expected = self.arena.resolve(expected);
        let actual_shape = self.arena.get(resolved_actual).clone();
        let expected_shape = self.arena.get(resolved_expected).clone();

        match (actual_shape, expected_shape) {
            (Shape::Template(_), Shape::Func { params, ret }) => {
                let Some(&fid) = self.templates.get(&resolved_actual) else {
                    return false;
                };
                let info = &self.functions[fid.0 as usize];
                if info.params.len() != params.len() {
                    return false;
                }
                let declared = info.params.clone();
                let site = info.decl.span;
                let mut args = Vec::with_capacity(params.len());
                for (declared, offered) in declared.into_iter().zip(params) {
                    match declared {
                        Some(d) => {
                            if !self.arena.is_subtype(offered, d) {
                                return false;
                            }
                            args.push(d);
                        }
                        None => args.push(offered),
                    }
                }
                let result = self.instantiate(fid, &args, site);
                self.arena.is_subtype(result, ret)
            }
            (Shape::Builtin(builtin), Shape::Func { params, ret }) => {
                match builtins::call_shape(&mut self.arena, builtin, &params) {
                    Ok(result) => self.arena.is_subtype(result, ret),
                    Err(_) => false,
                }
            }
            (Shape::Template(_) | Shape::Builtin(_), Shape::Optional(inner)) => self.conforms(actual, inner),
            _ => self.arena.is_subtype(actual, expected),
        }
    }

    /// The shape of calling `callee` with the given argument shapes.
    fn apply(&mut self, callee: ShapeId, callee_span: Span, args: &[ShapeId], arg_exprs: &[Expr], span: Span) -> ShapeId {
        let resolved = self.arena.resolve(callee);
        match self.arena.get(resolved).clone() {
            Shape::Func { params, ret } => {
                if params.len() != args.len() {
                    let name = self.arena.display(callee);
                    self.errors.push(errors::wrong_arity(&name, params.len(), args.len(), span));
                    return ret;
                }
                for (index, (&param, &arg)) in params.iter().zip(args).enumerate() {
                    self.check_argument(index, param, arg, arg_exprs[index].span);
                }
                ret
            }
            Shape::Template(_) => {
                let Some(&fid) = self.templates.get(&resolved) else {
                    return ShapeId::ERROR;
                };
                let info = &self.functions[fid.0 as usize];
                let name = info.decl.display_name();
                if info.params.len() != args.len() {
                    self.errors.push(errors::wrong_arity(name, info.params.len(), args.len(), span));
                    return ShapeId::ERROR;
                }
                let declared = info.params.clone();
                let mut key_args = Vec::with_capacity(args.len());
                for (index, (declared, &arg)) in declared.into_iter().zip(args).enumerate() {
                    match declared {
                        Some(d) => {
                            self.check_argument(index, d, arg, arg_exprs[index].span);
                            key_args.push(d);
                        }
                        None => key_args.push(arg),
                    }
                }
                self.instantiate(fid, &key_args, span)
            }
            Shape::Builtin(builtin) => match builtins::call_shape(&mut self.arena, builtin, args) {
                Ok(shape) => shape,
                Err(BuiltinMisuse::Arity) => {
                    let accepted = builtin.arity();
                    let expected = if args.len() < *accepted.start() {
                        *accepted.start()
                    } else {
                        *accepted.end()
                    };
                    self.errors
                        .push(errors::wrong_arity(builtin.name(), expected, args.len(), span));
                    ShapeId::ERROR
                }
                Err(BuiltinMisuse::Argument { index, expected }) => {
                    let found = self.arena.display(args[index]);
                    self.errors
                        .push(errors::argument_mismatch(index, expected, &found, arg_exprs[index].span));
                    ShapeId::ERROR
                }
            },
            Shape::Error => ShapeId::ERROR,
            Shape::Never => ShapeId::NEVER,
            _ => {
                let shape = self.arena.display(callee);
                self.errors.push(errors::not_callable(&shape, callee_span));
                ShapeId::ERROR
            }
        }
    }

    fn check_argument(&mut self, index: usize, param: ShapeId, arg: ShapeId, span: Span) {
        if !self.conforms(arg, param) {
            let (expected, found) = (self.arena.display(param), self.arena.display(arg));
            self.errors
                .push(errors::argument_mismatch(index, &expected, &found, span));
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn check_stmt(&mut self, stmt: &'m Stmt) {
        match &stmt.kind {
            StmtKind::Let {
                mutable,
                name,
                ty,
                value,
            } => {
                let value_shape = self.check_expr(value);
                let shape = match ty {
                    Some(ty) => {
                        let declared = self.resolve_type(ty);
                        if !self.conforms(value_shape, declared) {
                            self.mismatch(declared, value_shape, value.span, "`let` binding");
                        }
                        declared
                    }
                    None => value_shape,
                };
                let binding = Binding {
                    shape,
                    declared: shape,
                    mutable: *mutable,
                    slot: 0,
                    span: name.span,
                    function: None,
                };
                if self.scope.define(&name.name, binding).is_err() {
                    self.errors.push(errors::duplicate_binding(&name.name, name.span));
                }
            }
            // Both are handled by `check_stmts` before the walk.
            StmtKind::Fn(_) | StmtKind::TypeDecl { .. } => {}
            StmtKind::If { branches, else_block } => self.check_if(branches, else_block.as_ref()),
            StmtKind::While { condition, body } => {
                self.check_condition(condition, "`while` condition");
                self.enter_loop();
                self.check_block(body, Vec::new());
                self.exit_loop();
            }
            StmtKind::For {
                binding,
                iterable,
                body,
            } => {
                let iterable_shape = self.check_expr(iterable);
                let resolved = self.arena.resolve(iterable_shape);
                let elem = match self.arena.get(resolved) {
                    Shape::List(elem) => *elem,
                    Shape::Str => ShapeId::STR,
                    Shape::Error => ShapeId::ERROR,
                    Shape::Never => ShapeId::NEVER,
                    _ => {
                        let shape = self.arena.display(iterable_shape);
                        self.errors.push(errors::not_iterable(&shape, iterable.span));
                        ShapeId::ERROR
                    }
                };
                let outer = Rc::clone(&self.scope);
                let loop_scope = Scope::child(&outer);
                let _ = loop_scope.define(
                    &binding.name,
                    Binding {
                        shape: elem,
                        declared: elem,
                        mutable: false,
                        slot: 0,
                        span: binding.span,
                        function: None,
                    },
                );
                self.scope = loop_scope;
                self.enter_loop();
                self.check_block(body, Vec::new());
                self.exit_loop();
                self.scope = outer;
            }
            StmtKind::Return(value) => {
                let shape = value.as_ref().map_or(ShapeId::NONE, |v| self.check_expr(v));
                let span = value.as_ref().map_or(stmt.span, |v| v.span);
                let (in_function, declared_ret) = self
                    .frames
                    .last()
                    .map_or((false, None), |f| (f.in_function, f.declared_ret));
                if !in_function {
                    self.errors.push(errors::misplaced("return", "a function", stmt.span));
                    return;
                }
                if let Some(declared) = declared_ret {
                    if !self.conforms(shape, declared) {
                        let (expected, found) = (self.arena.display(declared), self.arena.display(shape));
                        self.errors.push(errors::return_mismatch(&expected, &found, span));
                    }
                }
                if let Some(frame) = self.frames.last_mut() {
                    frame.returns.push((shape, span));
                }
            }
            StmtKind::Break => self.check_in_loop("break", stmt.span),
            StmtKind::Continue => self.check_in_loop("continue", stmt.span),
            StmtKind::Block(block) => self.check_block(block, Vec::new()),
            StmtKind::Assign { target, value } => {
                let value_shape = self.check_expr(value);
                let declared = self.check_place(target);
                if !self.conforms(value_shape, declared) {
                    let mut err = TypeMismatchError::new(
                        self.arena.display(declared),
                        self.arena.display(value_shape),
                        value.span,
                    )
                    .with_context("assignment")
                    .build();
                    if self.arena.mentions_never(declared) {
                        err = err.with_help("annotate the binding, e.g. `var xs: [Int] = [];`");
                    }
                    self.errors.push(err);
                }
            }
            StmtKind::Expr(expr) => {
                self.check_expr(expr);
            }
        }
    }

    fn check_if(&mut self, branches: &'m [(Expr, Block)], else_block: Option<&'m Block>) {
        let outer = Rc::clone(&self.scope);
        // Narrowings from earlier `x == none` conditions hold in later branches.
        let mut otherwise: Vec<(String, Binding)> = Vec::new();
        for (condition, block) in branches {
            self.scope = narrowed_scope(&outer, &otherwise);
            self.check_condition(condition, "`if` condition");
            let guarded = self.narrowings(condition, BinOp::Ne);
            self.check_block(block, guarded);
            otherwise.extend(self.narrowings(condition, BinOp::Eq));
        }
        if let Some(block) = else_block {
            self.scope = narrowed_scope(&outer, &otherwise);
            self.check_block(block, Vec::new());
        }
        self.scope = outer;
    }

    fn check_condition(&mut self, condition: &'m Expr, context: &str) {
        let shape = self.check_expr(condition);
        if !self.conforms(shape, ShapeId::BOOL) {
            self.mismatch(ShapeId::BOOL, shape, condition.span, context);
        }
    }

    fn check_block(&mut self, block: &'m Block, narrowings: Vec<(String, Binding)>) {
        let outer = Rc::clone(&self.scope);
        let narrowed = narrowed_scope(&outer, &narrowings);
        self.scope = Scope::child(&narrowed);
        self.check_stmts(&block.stmts);
        self.scope = outer;
    }

    /// The shape a place may be assigned, reporting immutable roots.
    fn check_place(&mut self, place: &'m Expr) -> ShapeId {
        let shape = match &place.kind {
            ExprKind::Ident(ident) => match self.scope.lookup(&ident.name) {
                Some(binding) => {
                    if !binding.mutable {
                        self.errors.push(errors::immutable_assignment(
                            &ident.name,
                            place.span,
                            binding.span,
                        ));
                        ShapeId::ERROR
                    } else {
                        binding.declared
                    }
                }
                None => {
                    self.errors.push(errors::unbound_name(&ident.name, ident.span));
                    ShapeId::ERROR
                }
            },
            ExprKind::Attribute { base, name } => {
                let base_shape = self.check_place(base);
                self.member_shape(base_shape, name, place.span)
            }
            ExprKind::Index { base, index } => {
                let base_shape = self.check_place(base);
                self.check_index(index);
                let resolved = self.arena.resolve(base_shape);
                match self.arena.get(resolved) {
                    Shape::List(elem) => *elem,
                    Shape::Error | Shape::Never => ShapeId::ERROR,
                    Shape::Str => {
                        self.errors.push(errors::string_assignment(place.span));
                        ShapeId::ERROR
                    }
                    _ => {
                        let shape = self.arena.display(base_shape);
                        self.errors.push(errors::not_indexable(&shape, base.span));
                        ShapeId::ERROR
                    }
                }
            }
            _ => {
                self.check_expr(place);
                ShapeId::ERROR
            }
        };
        self.types.insert(place.id, shape);
        shape
    }

    fn check_in_loop(&mut self, what: &str, span: Span) {
        if self.frames.last().is_none_or(|f| f.loop_depth == 0) {
            self.errors.push(errors::misplaced(what, "a loop", span));
        }
    }

    fn enter_loop(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.loop_depth += 1;
        }
    }

    fn exit_loop(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.loop_depth = frame.loop_depth.saturating_sub(1);
        }
    }

    /// Bindings narrowed by `condition` when it compares with `none` using `op`.
    ///
    /// With `op == Ne` these hold where `condition` is true, with `op == Eq`
    /// where it is false.
    fn narrowings(&self, condition: &Expr, op: BinOp) -> Vec<(String, Binding)> {
        let ExprKind::Binary {
            op: found,
            left,
            right,
        } = &condition.kind
        else {
            return Vec::new();
        };
        let combines = match op {
            BinOp::Ne => BinOp::And,
            _ => BinOp::Or,
        };
        if *found == combines {
            let mut all = self.narrowings(left, op);
            all.extend(self.narrowings(right, op));
            return all;
        }
        if *found != op {
            return Vec::new();
        }

        let ident = match (&left.kind, &right.kind) {
            (ExprKind::Ident(ident), ExprKind::None) | (ExprKind::None, ExprKind::Ident(ident)) => ident,
            _ => return Vec::new(),
        };
        let Some(binding) = self.scope.lookup(&ident.name) else {
            return Vec::new();
        };
        if binding.mutable || binding.function.is_some() {
            return Vec::new();
        }
        match self.arena.get(self.arena.resolve(binding.shape)) {
            Shape::Optional(inner) => vec![(
                ident.name.clone(),
                Binding {
                    shape: *inner,
                    declared: *inner,
                    ..binding
                },
            )],
            _ => Vec::new(),
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn check_expr(&mut self, expr: &'m Expr) -> ShapeId {
        let shape = self.infer_expr(expr);
        self.types.insert(expr.id, shape);
        shape
    }

    fn infer_expr(&mut self, expr: &'m Expr) -> ShapeId {
        match &expr.kind {
            ExprKind::Int(_) => ShapeId::INT,
            ExprKind::Float(_) => ShapeId::FLOAT,
            ExprKind::Str(_) => ShapeId::STR,
            ExprKind::Bool(_) => ShapeId::BOOL,
            ExprKind::None => ShapeId::NONE,

            ExprKind::Ident(ident) => match self.scope.lookup(&ident.name) {
                Some(binding) => match binding.function {
                    Some(fid) => self.function_shape(fid),
                    None => binding.shape,
                },
                None => {
                    self.errors.push(errors::unbound_name(&ident.name, ident.span));
                    ShapeId::ERROR
                }
            },

            ExprKind::List(elems) => {
                let mut elem = ShapeId::NEVER;
                for item in elems {
                    let shape = self.check_expr(item);
                    match self.arena.join(elem, shape) {
                        Some(joined) => elem = joined,
                        None => self.mismatch(elem, shape, item.span, "list literal"),
                    }
                }
                self.arena.list(elem)
            }

            ExprKind::Record(fields) => {
                let mut members: Vec<(String, ShapeId)> = Vec::with_capacity(fields.len());
                for field in fields {
                    let shape = self.check_expr(&field.value);
                    if members.iter().any(|(n, _)| *n == field.name.name) {
                        self.errors.push(errors::duplicate_binding(&field.name.name, field.name.span));
                        continue;
                    }
                    members.push((field.name.name.clone(), shape));
                }
                self.arena.record(members)
            }

            ExprKind::Binary { op, left, right } => {
                let left_shape = self.check_expr(left);
                let right_shape = match op {
                    BinOp::And | BinOp::Or => {
                        let narrowed = match op {
                            BinOp::And => self.narrowings(left, BinOp::Ne),
                            _ => self.narrowings(left, BinOp::Eq),
                        };
                        let outer = Rc::clone(&self.scope);
                        self.scope = narrowed_scope(&outer, &narrowed);
                        let shape = self.check_expr(right);
                        self.scope = outer;
                        shape
                    }
                    _ => self.check_expr(right),
                };
                match self.binary_shape(*op, left_shape, right_shape) {
                    Some(shape) => shape,
                    None => {
                        let (l, r) = (self.arena.display(left_shape), self.arena.display(right_shape));
                        self.errors.push(errors::binary_op_mismatch(*op, &l, &r, expr.span));
                        ShapeId::ERROR
                    }
                }
            }

            ExprKind::Unary { op, operand } => {
                let shape = self.check_expr(operand);
                let resolved = self.arena.resolve(shape);
                let ok = match op {
                    UnaryOp::Neg => self.arena.is_numeric(resolved),
                    UnaryOp::Not => resolved == ShapeId::BOOL,
                };
                if ok || resolved == ShapeId::ERROR || resolved == ShapeId::NEVER {
                    match op {
                        UnaryOp::Neg => resolved,
                        UnaryOp::Not => ShapeId::BOOL,
                    }
                } else {
                    let operand_shape = self.arena.display(shape);
                    self.errors.push(errors::unary_op_mismatch(*op, &operand_shape, expr.span));
                    ShapeId::ERROR
                }
            }

            ExprKind::Call { callee, args } => {
                let callee_shape = self.check_expr(callee);
                let arg_shapes: Vec<ShapeId> = args.iter().map(|a| self.check_expr(a)).collect();
                self.apply(callee_shape, callee.span, &arg_shapes, args, expr.span)
            }

            ExprKind::Attribute { base, name } => {
                let base_shape = self.check_expr(base);
                self.member_shape(base_shape, name, expr.span)
            }

            ExprKind::Index { base, index } => {
                let base_shape = self.check_expr(base);
                self.check_index(index);
                let resolved = self.arena.resolve(base_shape);
                match self.arena.get(resolved) {
                    Shape::List(elem) => *elem,
                    Shape::Str => ShapeId::STR,
                    Shape::Error => ShapeId::ERROR,
                    Shape::Never => ShapeId::NEVER,
                    _ => {
                        let shape = self.arena.display(base_shape);
                        self.errors.push(errors::not_indexable(&shape, base.span));
                        ShapeId::ERROR
                    }
                }
            }

            ExprKind::Lambda(decl) => {
                let fid = self.register_fn(decl);
                self.function_shape(fid)
            }
        }
    }

    fn check_index(&mut self, index: &'m Expr) {
        let shape = self.check_expr(index);
        if !self.conforms(shape, ShapeId::INT) {
            self.mismatch(ShapeId::INT, shape, index.span, "index");
        }
    }

    fn member_shape(&mut self, base: ShapeId, name: &Ident, span: Span) -> ShapeId {
        let resolved = self.arena.resolve(base);
        match self.arena.get(resolved) {
            Shape::Error => ShapeId::ERROR,
            Shape::Never => ShapeId::NEVER,
            Shape::Optional(_) => {
                let shape = self.arena.display(base);
                self.errors.push(errors::optional_access(&name.name, &shape, span));
                ShapeId::ERROR
            }
            _ => match self.arena.member(resolved, &name.name) {
                Some(member) => member,
                None => {
                    let shape = self.arena.display(base);
                    self.errors.push(errors::missing_member(&name.name, &shape, span));
                    ShapeId::ERROR
                }
            },
        }
    }

    /// The result of a binary operator, or `None` if the operands do not fit it.
    fn binary_shape(&mut self, op: BinOp, left: ShapeId, right: ShapeId) -> Option<ShapeId> {
        let mut l = self.arena.resolve(left);
        let mut r = self.arena.resolve(right);
        let boolean = !op.is_arithmetic();

        if l == ShapeId::ERROR || r == ShapeId::ERROR {
            return Some(if boolean { ShapeId::BOOL } else { ShapeId::ERROR });
        }
        if l == ShapeId::NEVER && r == ShapeId::NEVER {
            return Some(if boolean { ShapeId::BOOL } else { ShapeId::NEVER });
        }
        if l == ShapeId::NEVER {
            l = r;
        }
        if r == ShapeId::NEVER {
            r = l;
        }

        let numeric = self.arena.is_numeric(l) && self.arena.is_numeric(r);
        let both_int = l == ShapeId::INT && r == ShapeId::INT;
        match op {
            BinOp::Add => {
                if both_int {
                    return Some(ShapeId::INT);
                }
                if numeric {
                    return Some(ShapeId::FLOAT);
                }
                if l == ShapeId::STR && r == ShapeId::STR {
                    return Some(ShapeId::STR);
                }
                match (self.arena.get(l).clone(), self.arena.get(r).clone()) {
                    (Shape::List(a), Shape::List(b)) => {
                        let elem = self.arena.join(a, b)?;
                        Some(self.arena.list(elem))
                    }
                    _ => None,
                }
            }
            BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                if both_int {
                    Some(ShapeId::INT)
                } else if numeric {
                    Some(ShapeId::FLOAT)
                } else {
                    None
                }
            }
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                (numeric || (l == ShapeId::STR && r == ShapeId::STR)).then_some(ShapeId::BOOL)
            }
            BinOp::Eq | BinOp::Ne => {
                let comparable = numeric || self.arena.is_subtype(l, r) || self.arena.is_subtype(r, l);
                comparable.then_some(ShapeId::BOOL)
            }
            BinOp::And | BinOp::Or => (l == ShapeId::BOOL && r == ShapeId::BOOL).then_some(ShapeId::BOOL),
        }
    }

    fn mismatch(&mut self, expected: ShapeId, found: ShapeId, span: Span, context: &str) {
        let err = TypeMismatchError::new(self.arena.display(expected), self.arena.display(found), span)
            .with_context(context)
            .build();
        self.errors.push(err);
    }
}

/// A child of `outer` holding `narrowings`, or `outer` itself when there are none.
fn narrowed_scope(outer: &Rc<Scope>, narrowings: &[(String, Binding)]) -> Rc<Scope> {
    if narrowings.is_empty() {
        return Rc::clone(outer);
    }
    let scope = Scope::child(outer);
    for (name, binding) in narrowings {
        // `x != none and x != none` narrows the same name twice.
        let _ = scope.define(name, binding.clone());
    }
    scope
}

/// Whether every path through `block` ends in a `return`.
fn always_returns(block: &Block) -> bool {
    block.stmts.iter().any(|stmt| match &stmt.kind {
        StmtKind::Return(_) => true,
        StmtKind::Block(inner) => always_returns(inner),
        StmtKind::If { branches, else_block } => {
            else_block.as_ref().is_some_and(always_returns) && branches.iter().all(|(_, b)| always_returns(b))
        }
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_of(source: &str) -> Block {
        let module = ratus_parser::parse_source(source).expect("test source parses");
        match module.stmts.into_iter().next().map(|s| s.kind) {
            Some(StmtKind::Fn(decl)) => decl.body,
            other => panic!("expected a function, got {other:?}"),
        }
    }

    #[test]
    fn return_in_both_branches_always_returns() {
        assert!(always_returns(&block_of("fn f(x) { if x { return 1; } else { return 2; } }")));
        assert!(!always_returns(&block_of("fn f(x) { if x { return 1; } }")));
        assert!(!always_returns(&block_of("fn f(x) { while x { return 1; } }")));
    }

    #[test]
    fn type_table_records_every_checked_expression() {
        let module = ratus_parser::parse_source("let a = 1 + 2; a").expect("parses");
        let mut checker = TypeChecker::new(&[]);
        checker.check_module(&module);
        assert!(checker.finish().is_empty());
        let entry = module.entry.as_ref().expect("entry");
        assert_eq!(checker.types.get(entry.id), Some(ShapeId::INT));
        assert!(checker.types.len() >= 4);
    }
}
