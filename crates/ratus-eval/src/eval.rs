//! Statement and expression evaluation.

use std::rc::Rc;

use ratus_common::Span;
use ratus_diagnostic::{Diagnostic, DiagnosticKind, ErrorCode, Label};
use ratus_syntax::{BinOp, Block, Expr, ExprKind, FnDecl, Ident, Module, Stmt, StmtKind, UnaryOp};
use ratus_typeck::Builtin;
use thiserror::Error;

use crate::builtin;
use crate::env::{FrameId, Heap, StaleFrame};
use crate::host::HostFn;
use crate::value::{Closure, Value};
use crate::EvalConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    DivisionByZero,
    IndexOutOfRange,
    MissingMemberAccess,
    StructuralMisuse,
    TypeMismatch,
    IntegerOverflow,
    UnboundName,
    StepLimitExceeded,
    CallDepthExceeded,
    AllocationLimitExceeded,
    HostFailure,
}

impl FaultKind {
    pub fn name(self) -> &'static str {
        match self {
            FaultKind::DivisionByZero => "DivisionByZero",
            FaultKind::IndexOutOfRange => "IndexOutOfRange",
            FaultKind::MissingMemberAccess => "MissingMemberAccess",
            FaultKind::StructuralMisuse => "StructuralMisuse",
            FaultKind::TypeMismatch => "TypeMismatch",
            FaultKind::IntegerOverflow => "IntegerOverflow",
            FaultKind::UnboundName => "UnboundName",
            FaultKind::StepLimitExceeded => "StepLimitExceeded",
            FaultKind::CallDepthExceeded => "CallDepthExceeded",
            FaultKind::AllocationLimitExceeded => "AllocationLimitExceeded",
            FaultKind::HostFailure => "HostFailure",
        }
    }

    pub fn code(self) -> ErrorCode {
        match self {
            FaultKind::DivisionByZero => ErrorCode::DivisionByZero,
            FaultKind::IndexOutOfRange => ErrorCode::IndexOutOfRange,
            FaultKind::MissingMemberAccess => ErrorCode::MissingMemberAccess,
            FaultKind::StructuralMisuse => ErrorCode::StructuralMisuse,
            FaultKind::TypeMismatch => ErrorCode::RuntimeTypeMismatch,
            FaultKind::IntegerOverflow => ErrorCode::ArithmeticOverflow,
            FaultKind::UnboundName => ErrorCode::UnboundNameAtRuntime,
            FaultKind::StepLimitExceeded => ErrorCode::StepLimitExceeded,
            FaultKind::CallDepthExceeded => ErrorCode::CallDepthExceeded,
            FaultKind::AllocationLimitExceeded => ErrorCode::AllocationLimitExceeded,
            FaultKind::HostFailure => ErrorCode::HostFunctionFailed,
        }
    }
}

/// A fault that aborted evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RuntimeFault {
    pub kind: FaultKind,
    pub span: Span,
    pub message: String,
}

impl RuntimeFault {
    pub fn new(kind: FaultKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
        }
    }

    fn stale(err: StaleFrame, span: Span) -> Self {
        Self::new(FaultKind::StructuralMisuse, span, err.to_string())
    }
}

impl From<&RuntimeFault> for Diagnostic {
    fn from(fault: &RuntimeFault) -> Self {
        Diagnostic::error(DiagnosticKind::Runtime, fault.span, &fault.message)
            .with_code(fault.kind.code())
            .with_label(Label::new(fault.span, fault.kind.name()))
    }
}

type EvalResult<T> = Result<T, RuntimeFault>;

/// How a statement finished.
#[derive(Debug)]
enum Flow<'m> {
    Normal,
    Return(Value<'m>),
    Break(Span),
    Continue(Span),
}

/// One step of an assignment path, outermost first.
enum Step<'m> {
    Member(&'m str, Span),
    Index(i64, Span),
}

/// The evaluator.
pub struct Evaluator<'m> {
    config: EvalConfig,
    heap: Heap<'m>,
    /// Innermost frame of the code being run.
    frame: FrameId,
    /// Frame of each active caller, outermost first.
    callers: Vec<FrameId>,
    /// Values computed but not yet stored in a frame.
    temps: Vec<Value<'m>>,
    host: Vec<Rc<HostFn>>,
    steps: u64,
}

impl<'m> Evaluator<'m> {
    pub fn new(config: EvalConfig) -> Self {
        Self::with_host(config, Vec::new())
    }

    /// An evaluator that resolves names of `host` functions after the
    /// program's own bindings and before builtins.
    pub fn with_host(config: EvalConfig, host: Vec<Rc<HostFn>>) -> Self {
        let mut heap = Heap::new();
        let frame = heap.alloc(None);
        heap.capture(frame);
        Self {
            config,
            heap,
            frame,
            callers: Vec::new(),
            temps: Vec::new(),
            host,
            steps: 0,
        }
    }

    pub fn live_frames(&self) -> usize {
        self.heap.live_frames()
    }

    /// Run a module and produce its result.
    ///
    /// The result is the trailing entry expression if there is one, otherwise
    /// what a zero-parameter top-level `main` returns, otherwise `none`.
    pub fn eval_module(&mut self, module: &'m Module) -> EvalResult<Value<'m>> {
        self.bind_functions(&module.stmts)?;
        for stmt in &module.stmts {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                flow => return Err(escaped(flow, stmt.span)),
            }
            self.maybe_collect();
        }

        if let Some(entry) = &module.entry {
            return self.eval_expr(entry);
        }
        let main = match self.heap.lookup(self.frame, "main") {
            Ok(Some(Value::Function(closure))) if closure.decl.params.is_empty() => Some(Rc::clone(closure)),
            Ok(_) => None,
            Err(e) => return Err(RuntimeFault::stale(e, module.span)),
        };
        match main {
            Some(closure) => {
                let span = closure.decl.span;
                self.call_closure(&closure, Vec::new(), span)
            }
            None => Ok(Value::None),
        }
    }

    /// Collect once enough frames were allocated. The roots are every active
    /// frame and every value held in `temps`.
    fn maybe_collect(&mut self) {
        if self.heap.allocated_since_collect() < self.config.gc_threshold {
            return;
        }
        let mut roots = Vec::with_capacity(self.callers.len() + 1);
        roots.extend_from_slice(&self.callers);
        roots.push(self.frame);
        let freed = self.heap.collect(&roots, &self.temps);
        tracing::debug!(freed, live = self.heap.live_frames(), "collected frames");
    }

    /// Keep `value` reachable while `f` runs, then hand it back.
    fn with_root<T>(
        &mut self,
        value: Value<'m>,
        f: impl FnOnce(&mut Self) -> EvalResult<T>,
    ) -> EvalResult<(Value<'m>, T)> {
        let base = self.temps.len();
        self.temps.push(value);
        let result = f(self);
        let value = std::mem::replace(&mut self.temps[base], Value::None);
        self.temps.truncate(base);
        result.map(|out| (value, out))
    }

    /// Evaluate `exprs` in order, keeping finished results reachable until all
    /// of them are done.
    fn eval_rooted(&mut self, exprs: impl IntoIterator<Item = &'m Expr>) -> EvalResult<Vec<Value<'m>>> {
        let base = self.temps.len();
        for expr in exprs {
            match self.eval_expr(expr) {
                Ok(value) => self.temps.push(value),
                Err(fault) => {
                    self.temps.truncate(base);
                    return Err(fault);
                }
            }
        }
        Ok(self.temps.split_off(base))
    }

    fn step(&mut self, span: Span) -> EvalResult<()> {
        self.charge(1, span)
    }

    fn charge(&mut self, steps: u64, span: Span) -> EvalResult<()> {
        self.steps = self.steps.saturating_add(steps);
        match self.config.max_steps {
            Some(max) if self.steps > max => Err(RuntimeFault::new(
                FaultKind::StepLimitExceeded,
                span,
                format!("evaluation exceeded {max} steps"),
            )),
            _ => Ok(()),
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn bind_functions(&mut self, stmts: &'m [Stmt]) -> EvalResult<()> {
        for stmt in stmts {
            if let StmtKind::Fn(decl) = &stmt.kind {
                if let Some(name) = &decl.name {
                    let value = self.make_closure(decl);
                    self.heap
                        .define(self.frame, &name.name, value)
                        .map_err(|e| RuntimeFault::stale(e, stmt.span))?;
                }
            }
        }
        Ok(())
    }

    fn make_closure(&mut self, decl: &'m FnDecl) -> Value<'m> {
        self.heap.capture(self.frame);
        Value::Function(Rc::new(Closure {
            decl,
            frame: self.frame,
        }))
    }

    /// Run `stmts` in a fresh child frame.
    fn exec_block(&mut self, block: &'m Block) -> EvalResult<Flow<'m>> {
        let frame = self.heap.alloc(Some(self.frame));
        let outer = std::mem::replace(&mut self.frame, frame);
        let result = self.exec_stmts(&block.stmts);
        self.frame = outer;
        self.heap.release(frame);
        result
    }

    fn exec_stmts(&mut self, stmts: &'m [Stmt]) -> EvalResult<Flow<'m>> {
        self.bind_functions(stmts)?;
        for stmt in stmts {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &'m Stmt) -> EvalResult<Flow<'m>> {
        self.step(stmt.span)?;
        match &stmt.kind {
            StmtKind::Let { name, value, .. } => {
                let value = self.eval_expr(value)?;
                self.heap
                    .define(self.frame, &name.name, value)
                    .map_err(|e| RuntimeFault::stale(e, stmt.span))?;
                Ok(Flow::Normal)
            }
            // Bound when the enclosing block was entered.
            StmtKind::Fn(_) | StmtKind::TypeDecl { .. } => Ok(Flow::Normal),
            StmtKind::If { branches, else_block } => {
                for (condition, block) in branches {
                    if self.eval_condition(condition)? {
                        return self.exec_block(block);
                    }
                }
                match else_block {
                    Some(block) => self.exec_block(block),
                    None => Ok(Flow::Normal),
                }
            }
            StmtKind::While { condition, body } => {
                while self.eval_condition(condition)? {
                    self.maybe_collect();
                    match self.exec_block(body)? {
                        Flow::Break(_) => break,
                        Flow::Normal | Flow::Continue(_) => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::For {
                binding,
                iterable,
                body,
            } => {
                let value = self.eval_expr(iterable)?;
                let items: Vec<Value<'m>> = match &value {
                    Value::List(items) => items.iter().cloned().collect(),
                    Value::Str(s) => s.chars().map(|c| Value::str(c.encode_utf8(&mut [0; 4]))).collect(),
                    other => {
                        return Err(RuntimeFault::new(
                            FaultKind::TypeMismatch,
                            iterable.span,
                            format!("cannot iterate over a {}", other.kind_name()),
                        ));
                    }
                };
                let (_, flow) = self.with_root(value, |this| this.run_for(binding, body, items))?;
                Ok(flow)
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Value::None,
                };
                Ok(Flow::Return(value))
            }
            StmtKind::Break => Ok(Flow::Break(stmt.span)),
            StmtKind::Continue => Ok(Flow::Continue(stmt.span)),
            StmtKind::Block(block) => self.exec_block(block),
            StmtKind::Assign { target, value } => {
                let value = self.eval_expr(value)?;
                let (value, (name, path)) = self.with_root(value, |this| this.assign_path(target))?;
                self.store(name, path, value)?;
                Ok(Flow::Normal)
            }
            StmtKind::Expr(expr) => {
                self.eval_expr(expr)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn eval_condition(&mut self, condition: &'m Expr) -> EvalResult<bool> {
        match self.eval_expr(condition)? {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch(condition.span, format!("condition is a {}, not a Bool", other.kind_name()))),
        }
    }

    fn run_for(&mut self, binding: &'m Ident, body: &'m Block, items: Vec<Value<'m>>) -> EvalResult<Flow<'m>> {
        for item in items {
            let frame = self.heap.alloc(Some(self.frame));
            let outer = std::mem::replace(&mut self.frame, frame);
            let result = self
                .heap
                .define(frame, &binding.name, item)
                .map_err(|e| RuntimeFault::stale(e, binding.span))
                .and_then(|()| {
                    self.maybe_collect();
                    self.exec_block(body)
                });
            self.frame = outer;
            self.heap.release(frame);
            match result? {
                Flow::Break(_) => break,
                Flow::Normal | Flow::Continue(_) => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    /// Resolve an assignment target to the variable it starts from and the
    /// steps into it, evaluating index expressions left to right.
    fn assign_path(&mut self, target: &'m Expr) -> EvalResult<(&'m Ident, Vec<Step<'m>>)> {
        let mut path: Vec<&'m Expr> = Vec::new();
        let mut root = target;
        let name = loop {
            match &root.kind {
                ExprKind::Ident(ident) => break ident,
                ExprKind::Attribute { base, .. } | ExprKind::Index { base, .. } => {
                    path.push(root);
                    root = base;
                }
                _ => {
                    return Err(RuntimeFault::new(
                        FaultKind::StructuralMisuse,
                        target.span,
                        "invalid assignment target",
                    ));
                }
            }
        };
        path.reverse();

        let mut steps = Vec::with_capacity(path.len());
        for place in path {
            match &place.kind {
                ExprKind::Attribute { name, .. } => steps.push(Step::Member(&name.name, place.span)),
                ExprKind::Index { index, .. } => {
                    let i = self.eval_int(index)?;
                    steps.push(Step::Index(i, place.span));
                }
                _ => {}
            }
        }
        Ok((name, steps))
    }

    fn store(&mut self, name: &'m Ident, steps: Vec<Step<'m>>, value: Value<'m>) -> EvalResult<()> {
        let mut slot = match self.heap.lookup_mut(self.frame, &name.name) {
            Ok(Some(slot)) => slot,
            Ok(None) => return Err(unbound(&name.name, name.span)),
            Err(e) => return Err(RuntimeFault::stale(e, name.span)),
        };
        for step in steps {
            slot = match (step, slot) {
                (Step::Member(member, span), Value::Record(fields)) => {
                    match Rc::make_mut(fields).iter_mut().find(|(n, _)| n == member) {
                        Some((_, v)) => v,
                        None => return Err(missing_member(member, span)),
                    }
                }
                (Step::Index(i, span), Value::List(items)) => {
                    let len = items.len();
                    match usize::try_from(i).ok().filter(|&p| p < len) {
                        Some(p) => &mut Rc::make_mut(items)[p],
                        None => return Err(out_of_range(i, len, span)),
                    }
                }
                (Step::Member(member, span), other) => {
                    return Err(mismatch(span, format!("cannot set `.{member}` on a {}", other.kind_name())));
                }
                (Step::Index(_, span), other) => {
                    return Err(mismatch(span, format!("cannot assign into a {}", other.kind_name())));
                }
            };
        }
        *slot = value;
        Ok(())
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub fn eval_expr(&mut self, expr: &'m Expr) -> EvalResult<Value<'m>> {
        self.step(expr.span)?;
        match &expr.kind {
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Float(x) => Ok(Value::Float(*x)),
            ExprKind::Str(s) => Ok(Value::str(s)),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::None => Ok(Value::None),

            ExprKind::Ident(ident) => match self.heap.lookup(self.frame, &ident.name) {
                Ok(Some(value)) => Ok(value.clone()),
                Ok(None) => self
                    .host
                    .iter()
                    .find(|h| h.name() == ident.name)
                    .map(|h| Value::Host(Rc::clone(h)))
                    .or_else(|| builtin::lookup(&ident.name).map(Value::Builtin))
                    .ok_or_else(|| unbound(&ident.name, ident.span)),
                Err(e) => Err(RuntimeFault::stale(e, ident.span)),
            },

            ExprKind::List(items) => {
                let items = self.eval_rooted(items)?;
                Ok(Value::list(items))
            }

            ExprKind::Record(fields) => {
                let values = self.eval_rooted(fields.iter().map(|field| &field.value))?;
                let members = fields.iter().map(|field| field.name.name.clone()).zip(values).collect();
                Ok(Value::record(members))
            }

            ExprKind::Binary { op: BinOp::And, left, right } => {
                if self.eval_condition(left)? {
                    Ok(Value::Bool(self.eval_condition(right)?))
                } else {
                    Ok(Value::Bool(false))
                }
            }
            ExprKind::Binary { op: BinOp::Or, left, right } => {
                if self.eval_condition(left)? {
                    Ok(Value::Bool(true))
                } else {
                    Ok(Value::Bool(self.eval_condition(right)?))
                }
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.eval_expr(left)?;
                let (left, right) = self.with_root(left, |this| this.eval_expr(right))?;
                eval_binary(*op, left, right, expr.span, self.config.max_collection_len)
            }

            ExprKind::Unary { op, operand } => {
                let value = self.eval_expr(operand)?;
                match (op, value) {
                    (UnaryOp::Neg, Value::Int(n)) => n.checked_neg().map(Value::Int).ok_or_else(|| overflow(expr.span)),
                    (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (op, other) => Err(mismatch(expr.span, format!("cannot apply `{op}` to a {}", other.kind_name()))),
                }
            }

            ExprKind::Call { callee, args } => {
                let callee = self.eval_expr(callee)?;
                let (callee, args) = self.with_root(callee, |this| this.eval_rooted(args))?;
                self.call(callee, args, expr.span)
            }

            ExprKind::Attribute { base, name } => {
                let base = self.eval_expr(base)?;
                match &base {
                    Value::Record(_) => base
                        .member(&name.name)
                        .cloned()
                        .ok_or_else(|| missing_member(&name.name, expr.span)),
                    other => Err(mismatch(
                        expr.span,
                        format!("cannot read `.{}` from a {}", name.name, other.kind_name()),
                    )),
                }
            }

            ExprKind::Index { base, index } => {
                let base = self.eval_expr(base)?;
                let (base, i) = self.with_root(base, |this| this.eval_int(index))?;
                match &base {
                    Value::List(items) => usize::try_from(i)
                        .ok()
                        .and_then(|i| items.get(i))
                        .cloned()
                        .ok_or_else(|| out_of_range(i, items.len(), expr.span)),
                    Value::Str(s) => usize::try_from(i)
                        .ok()
                        .and_then(|i| s.chars().nth(i))
                        .map(|c| Value::str(c.encode_utf8(&mut [0; 4])))
                        .ok_or_else(|| out_of_range(i, s.chars().count(), expr.span)),
                    other => Err(mismatch(expr.span, format!("cannot index into a {}", other.kind_name()))),
                }
            }

            ExprKind::Lambda(decl) => Ok(self.make_closure(decl)),
        }
    }

    fn eval_int(&mut self, expr: &'m Expr) -> EvalResult<i64> {
        match self.eval_expr(expr)? {
            Value::Int(n) => Ok(n),
            other => Err(mismatch(expr.span, format!("index is a {}, not an Int", other.kind_name()))),
        }
    }

    fn call(&mut self, callee: Value<'m>, args: Vec<Value<'m>>, span: Span) -> EvalResult<Value<'m>> {
        match callee {
            Value::Function(closure) => self.call_closure(&closure, args, span),
            Value::Builtin(b) => {
                let result = builtin::call(b, args, span, self.config.max_collection_len)?;
                // Building a range costs one step per item.
                if let (Builtin::Range, Value::List(items)) = (b, &result) {
                    self.charge(items.len() as u64, span)?;
                }
                Ok(result)
            }
            Value::Host(host) => host.call(&args).map_err(|message| {
                RuntimeFault::new(
                    FaultKind::HostFailure,
                    span,
                    format!("`{}` failed: {message}", host.name()),
                )
            }),
            other => Err(mismatch(span, format!("a {} is not callable", other.kind_name()))),
        }
    }

    fn call_closure(&mut self, closure: &Closure<'m>, args: Vec<Value<'m>>, span: Span) -> EvalResult<Value<'m>> {
        let decl = closure.decl;
        if decl.params.len() != args.len() {
            return Err(mismatch(
                span,
                format!(
                    "`{}` takes {} arguments but {} were supplied",
                    decl.display_name(),
                    decl.params.len(),
                    args.len()
                ),
            ));
        }
        if self.callers.len() >= self.config.max_call_depth {
            return Err(RuntimeFault::new(
                FaultKind::CallDepthExceeded,
                span,
                format!("call depth exceeded {}", self.config.max_call_depth),
            ));
        }
        if !self.heap.is_live(closure.frame) {
            return Err(RuntimeFault::stale(StaleFrame(closure.frame), span));
        }

        let frame = self.heap.alloc(Some(closure.frame));
        for (param, arg) in decl.params.iter().zip(args) {
            self.heap
                .define(frame, &param.name.name, arg)
                .map_err(|e| RuntimeFault::stale(e, param.span))?;
        }

        let outer = std::mem::replace(&mut self.frame, frame);
        self.callers.push(outer);
        self.maybe_collect();
        let result = self.exec_stmts(&decl.body.stmts);
        self.callers.pop();
        self.frame = outer;
        self.heap.release(frame);

        match result? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::None),
            flow => Err(escaped(flow, decl.span)),
        }
    }
}

fn eval_binary<'m>(
    op: BinOp,
    left: Value<'m>,
    right: Value<'m>,
    span: Span,
    max_len: usize,
) -> EvalResult<Value<'m>> {
    use Value::{Float, Int};

    let arithmetic = |l: &Value<'m>, r: &Value<'m>| -> Option<(f64, f64)> {
        match (l, r) {
            (Int(a), Float(b)) => Some((*a as f64, *b)),
            (Float(a), Int(b)) => Some((*a, *b as f64)),
            (Float(a), Float(b)) => Some((*a, *b)),
            _ => None,
        }
    };

    match op {
        BinOp::Eq => return Ok(Value::Bool(left.structurally_eq(&right))),
        BinOp::Ne => return Ok(Value::Bool(!left.structurally_eq(&right))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = match (&left, &right) {
                (Int(a), Int(b)) => a.partial_cmp(b),
                (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
                (l, r) => arithmetic(l, r).and_then(|(a, b)| a.partial_cmp(&b)),
            };
            let Some(ordering) = ordering else {
                // NaN compares false with everything.
                if arithmetic(&left, &right).is_some() {
                    return Ok(Value::Bool(false));
                }
                return Err(operand_mismatch(op, &left, &right, span));
            };
            let holds = match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::Le => ordering.is_le(),
                BinOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            return Ok(Value::Bool(holds));
        }
        _ => {}
    }

    match (op, &left, &right) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) if a.len() + b.len() > max_len => {
            Err(too_long("string", max_len, span))
        }
        (BinOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::str(&format!("{a}{b}"))),
        (BinOp::Add, Value::List(a), Value::List(b)) if a.len() + b.len() > max_len => {
            Err(too_long("list", max_len, span))
        }
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            let mut items = Vec::with_capacity(a.len() + b.len());
            items.extend(a.iter().cloned());
            items.extend(b.iter().cloned());
            Ok(Value::list(items))
        }
        (_, Int(a), Int(b)) => {
            let (a, b) = (*a, *b);
            let result = match op {
                BinOp::Add => a.checked_add(b),
                BinOp::Sub => a.checked_sub(b),
                BinOp::Mul => a.checked_mul(b),
                BinOp::Div | BinOp::Mod if b == 0 => return Err(division_by_zero(op, span)),
                BinOp::Div => a.checked_div(b),
                BinOp::Mod => a.checked_rem(b),
                _ => return Err(operand_mismatch(op, &left, &right, span)),
            };
            result.map(Int).ok_or_else(|| overflow(span))
        }
        _ => {
            let Some((a, b)) = arithmetic(&left, &right) else {
                return Err(operand_mismatch(op, &left, &right, span));
            };
            match op {
                BinOp::Add => Ok(Float(a + b)),
                BinOp::Sub => Ok(Float(a - b)),
                BinOp::Mul => Ok(Float(a * b)),
                BinOp::Div | BinOp::Mod if b == 0.0 => Err(division_by_zero(op, span)),
                BinOp::Div => Ok(Float(a / b)),
                BinOp::Mod => Ok(Float(a % b)),
                _ => Err(operand_mismatch(op, &left, &right, span)),
            }
        }
    }
}

fn escaped(flow: Flow<'_>, fallback: Span) -> RuntimeFault {
    let (what, span) = match flow {
        Flow::Break(span) => ("break", span),
        Flow::Continue(span) => ("continue", span),
        Flow::Return(_) => ("return", fallback),
        Flow::Normal => ("statement", fallback),
    };
    RuntimeFault::new(
        FaultKind::StructuralMisuse,
        span,
        format!("`{what}` escaped the construct it belongs to"),
    )
}

fn mismatch(span: Span, message: String) -> RuntimeFault {
    RuntimeFault::new(FaultKind::TypeMismatch, span, message)
}

fn operand_mismatch(op: BinOp, left: &Value<'_>, right: &Value<'_>, span: Span) -> RuntimeFault {
    mismatch(
        span,
        format!("cannot apply `{op}` to a {} and a {}", left.kind_name(), right.kind_name()),
    )
}

fn division_by_zero(op: BinOp, span: Span) -> RuntimeFault {
    let what = if op == BinOp::Mod { "remainder" } else { "division" };
    RuntimeFault::new(FaultKind::DivisionByZero, span, format!("{what} by zero"))
}

pub(crate) fn too_long(what: &str, max_len: usize, span: Span) -> RuntimeFault {
    RuntimeFault::new(
        FaultKind::AllocationLimitExceeded,
        span,
        format!("{what} would be longer than {max_len}"),
    )
}

fn overflow(span: Span) -> RuntimeFault {
    RuntimeFault::new(FaultKind::IntegerOverflow, span, "integer overflow")
}

fn out_of_range(index: i64, len: usize, span: Span) -> RuntimeFault {
    RuntimeFault::new(
        FaultKind::IndexOutOfRange,
        span,
        format!("index {index} is out of range for length {len}"),
    )
}

fn missing_member(name: &str, span: Span) -> RuntimeFault {
    RuntimeFault::new(FaultKind::MissingMemberAccess, span, format!("record has no member `{name}`"))
}

fn unbound(name: &str, span: Span) -> RuntimeFault {
    RuntimeFault::new(FaultKind::UnboundName, span, format!("`{name}` is not bound"))
}
