//! The Ratus parser.

use ratus_common::Span;
use ratus_diagnostic::ErrorCode;
use ratus_lexer::{Token, TokenKind};
use ratus_syntax::*;

use crate::error::ParseError;
use crate::recovery::{DelimiterStack, ParseMode, is_stmt_start};

type PResult<T> = Result<T, ParseError>;

/// Nesting bound for expressions, blocks and operator chains.
const MAX_DEPTH: usize = 200;

/// Errors reported in recovery mode before the parser gives up.
const MAX_ERRORS: usize = 32;

/// What a statement-level parse produced.
enum Parsed {
    Stmt(Stmt),
    /// An expression with no `;` right before the end of the module.
    Entry(Expr),
}

/// The Ratus parser.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
    mode: ParseMode,
    /// Set once the parser has decided to stop; unwinding callers must not re-record.
    aborted: bool,
    /// Open blocks around the current position.
    blocks: usize,
    depth: usize,
    next_id: u32,
}

impl Parser {
    /// `tokens` must end with an `Eof` token, as the lexer guarantees.
    pub fn new(mut tokens: Vec<Token>, mode: ParseMode) -> Self {
        if !matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::Eof)) {
            let end = tokens.last().map_or(Span::DUMMY, |t| Span::new(t.span.end, t.span.end));
            let (line, column) = tokens.last().map_or((1, 1), |t| (t.line, t.column));
            tokens.push(Token::new(TokenKind::Eof, "", end, line, column));
        }
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            mode,
            aborted: false,
            blocks: 0,
            depth: 0,
            next_id: 0,
        }
    }

    pub fn errors(self) -> Vec<ParseError> {
        self.errors
    }

    /// Parse a complete source file.
    pub fn parse_module(&mut self) -> Module {
        let start = self.current_span();
        let mut stmts = Vec::new();
        let mut entry = None;

        while !self.at_end() {
            match self.parse_stmt(true) {
                Ok(Parsed::Stmt(stmt)) => stmts.push(stmt),
                Ok(Parsed::Entry(expr)) => entry = Some(expr),
                Err(err) => {
                    if self.aborted || self.recover(err).is_err() {
                        break;
                    }
                }
            }
        }

        let end = self.current_span();
        tracing::debug!(statements = stmts.len(), errors = self.errors.len(), "parsed module");
        Module {
            stmts,
            entry,
            span: start.merge(end),
        }
    }

    // ========== Statements ==========

    fn parse_stmt(&mut self, top_level: bool) -> PResult<Parsed> {
        let start = self.current_span();

        let kind = match self.current_kind() {
            TokenKind::Let | TokenKind::Var => self.parse_let()?,
            TokenKind::Fn if matches!(self.peek_kind(1), TokenKind::Ident(_)) => {
                StmtKind::Fn(self.parse_fn_decl()?)
            }
            TokenKind::Type => self.parse_type_decl()?,
            TokenKind::If => self.parse_if()?,
            TokenKind::While => {
                self.advance();
                let condition = self.parse_expr()?;
                let body = self.parse_block("`{` after the `while` condition")?;
                StmtKind::While { condition, body }
            }
            TokenKind::For => {
                self.advance();
                let binding = self.parse_ident("a loop variable after `for`")?;
                self.expect(TokenKind::In, "`in` after the loop variable")?;
                let iterable = self.parse_expr()?;
                let body = self.parse_block("`{` after the `for` iterable")?;
                StmtKind::For {
                    binding,
                    iterable,
                    body,
                }
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect_semicolon()?;
                StmtKind::Return(value)
            }
            TokenKind::Break => {
                self.advance();
                self.expect_semicolon()?;
                StmtKind::Break
            }
            TokenKind::Continue => {
                self.advance();
                self.expect_semicolon()?;
                StmtKind::Continue
            }
            TokenKind::LBrace => StmtKind::Block(self.parse_block("`{`")?),
            _ => {
                let expr = self.parse_expr()?;
                if self.eat(&TokenKind::Eq) {
                    if !expr.is_place() {
                        return Err(ParseError::new(
                            expr.span,
                            "a name, attribute or index on the left of `=`",
                            "an expression that cannot be assigned to",
                        )
                        .with_code(ErrorCode::InvalidAssignTarget));
                    }
                    let value = self.parse_expr()?;
                    self.expect_semicolon()?;
                    StmtKind::Assign {
                        target: expr,
                        value,
                    }
                } else if self.eat(&TokenKind::Semicolon) {
                    StmtKind::Expr(expr)
                } else if top_level && self.at_end() {
                    return Ok(Parsed::Entry(expr));
                } else if !top_level && self.check(&TokenKind::RBrace) {
                    StmtKind::Expr(expr)
                } else {
                    return Err(self.unexpected("`;` after the expression").with_code(ErrorCode::MissingSemicolon));
                }
            }
        };

        let span = start.merge(self.previous_span());
        Ok(Parsed::Stmt(Stmt::new(kind, span)))
    }

    fn parse_let(&mut self) -> PResult<StmtKind> {
        let mutable = self.check(&TokenKind::Var);
        self.advance();
        let name = self.parse_ident("a name to bind")?;
        let ty = if self.eat(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(TokenKind::Eq, "`=` in the binding")?;
        let value = self.parse_expr()?;
        self.expect_semicolon()?;
        Ok(StmtKind::Let {
            mutable,
            name,
            ty,
            value,
        })
    }

    fn parse_type_decl(&mut self) -> PResult<StmtKind> {
        self.advance();
        let name = self.parse_ident("a type name after `type`")?;
        self.expect(TokenKind::Eq, "`=` after the type name")?;
        let ty = self.parse_type()?;
        self.expect_semicolon()?;
        Ok(StmtKind::TypeDecl { name, ty })
    }

    fn parse_if(&mut self) -> PResult<StmtKind> {
        let mut branches = Vec::new();
        let mut else_block = None;

        self.advance();
        loop {
            let condition = self.parse_expr()?;
            let body = self.parse_block("`{` after the `if` condition")?;
            branches.push((condition, body));

            if !self.eat(&TokenKind::Else) {
                break;
            }
            if !self.eat(&TokenKind::If) {
                else_block = Some(self.parse_block("`{` after `else`")?);
                break;
            }
        }

        Ok(StmtKind::If {
            branches,
            else_block,
        })
    }

    /// `fn` followed by an optional name, parameters, return type and body.
    fn parse_fn_decl(&mut self) -> PResult<FnDecl> {
        let start = self.current_span();
        self.advance();

        let name = if matches!(self.current_kind(), TokenKind::Ident(_)) {
            Some(self.parse_ident("a function name")?)
        } else {
            None
        };

        self.expect(TokenKind::LParen, "`(` to start the parameter list")?;
        let params = self.parse_comma_list(TokenKind::RParen, Self::parse_param)?;
        self.expect(TokenKind::RParen, "`)` to close the parameter list")?;

        let ret = if self.eat(&TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = self.parse_block("`{` to start the function body")?;
        let span = start.merge(body.span);

        Ok(FnDecl {
            id: self.fresh_id(),
            name,
            params,
            ret,
            body,
            span,
        })
    }

    fn parse_param(&mut self) -> PResult<Param> {
        let name = self.parse_ident("a parameter name")?;
        let ty = if self.eat(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let span = name.span.merge(self.previous_span());
        Ok(Param { name, ty, span })
    }

    fn parse_block(&mut self, expected: &str) -> PResult<Block> {
        let start = self.current_span();
        self.expect(TokenKind::LBrace, expected)?;

        self.blocks += 1;
        let block = self.nested(|p| {
            let mut stmts = Vec::new();
            while !p.check(&TokenKind::RBrace) && !p.at_end() {
                match p.parse_stmt(false) {
                    Ok(Parsed::Stmt(stmt)) => stmts.push(stmt),
                    Ok(Parsed::Entry(expr)) => {
                        let span = expr.span;
                        stmts.push(Stmt::new(StmtKind::Expr(expr), span));
                    }
                    Err(err) => p.recover(err)?,
                }
            }
            p.expect(TokenKind::RBrace, "`}` to close the block")?;
            Ok(Block {
                stmts,
                span: start.merge(p.previous_span()),
            })
        });
        self.blocks -= 1;
        block
    }

    // ========== Expressions ==========

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.nested(Self::parse_or_expr)
    }

    fn parse_or_expr(&mut self) -> PResult<Expr> {
        let mut left = self.parse_and_expr()?;
        let mut chain = 0;

        while self.eat(&TokenKind::Or) {
            self.bump_chain(&mut chain)?;
            let right = self.parse_and_expr()?;
            left = self.binary(BinOp::Or, left, right);
        }

        Ok(left)
    }

    fn parse_and_expr(&mut self) -> PResult<Expr> {
        let mut left = self.parse_comparison_expr()?;
        let mut chain = 0;

        while self.eat(&TokenKind::And) {
            self.bump_chain(&mut chain)?;
            let right = self.parse_comparison_expr()?;
            left = self.binary(BinOp::And, left, right);
        }

        Ok(left)
    }

    fn parse_comparison_expr(&mut self) -> PResult<Expr> {
        let mut left = self.parse_equality_expr()?;
        let mut chain = 0;

        loop {
            let op = match self.current_kind() {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::LtEq => BinOp::Le,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::GtEq => BinOp::Ge,
                _ => break,
            };
            self.advance();
            self.bump_chain(&mut chain)?;
            let right = self.parse_equality_expr()?;
            left = self.binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_equality_expr(&mut self) -> PResult<Expr> {
        let mut left = self.parse_additive_expr()?;
        let mut chain = 0;

        loop {
            let op = match self.current_kind() {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::BangEq => BinOp::Ne,
                _ => break,
            };
            self.advance();
            self.bump_chain(&mut chain)?;
            let right = self.parse_additive_expr()?;
            left = self.binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_additive_expr(&mut self) -> PResult<Expr> {
        let mut left = self.parse_multiplicative_expr()?;
        let mut chain = 0;

        loop {
            let op = match self.current_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            self.bump_chain(&mut chain)?;
            let right = self.parse_multiplicative_expr()?;
            left = self.binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative_expr(&mut self) -> PResult<Expr> {
        let mut left = self.parse_unary_expr()?;
        let mut chain = 0;

        loop {
            let op = match self.current_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            self.bump_chain(&mut chain)?;
            let right = self.parse_unary_expr()?;
            left = self.binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> PResult<Expr> {
        let start = self.current_span();

        let op = match self.current_kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Not | TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_postfix_expr(),
        };
        self.advance();

        let operand = self.nested(Self::parse_unary_expr)?;
        let span = start.merge(operand.span);
        Ok(self.node(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn parse_postfix_expr(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary_expr()?;
        let mut chain = 0;

        loop {
            if self.eat(&TokenKind::LParen) {
                self.bump_chain(&mut chain)?;
                let args = self.parse_comma_list(TokenKind::RParen, Self::parse_expr)?;
                self.expect(TokenKind::RParen, "`)` to close the argument list")?;
                let span = expr.span.merge(self.previous_span());
                expr = self.node(
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    span,
                );
            } else if self.eat(&TokenKind::Dot) {
                self.bump_chain(&mut chain)?;
                let name = self.parse_ident("a member name after `.`")?;
                let span = expr.span.merge(name.span);
                expr = self.node(
                    ExprKind::Attribute {
                        base: Box::new(expr),
                        name,
                    },
                    span,
                );
            } else if self.eat(&TokenKind::LBracket) {
                self.bump_chain(&mut chain)?;
                let index = self.parse_expr()?;
                self.expect(TokenKind::RBracket, "`]` to close the index")?;
                let span = expr.span.merge(self.previous_span());
                expr = self.node(
                    ExprKind::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                    },
                    span,
                );
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_primary_expr(&mut self) -> PResult<Expr> {
        let span = self.current_span();

        let kind = match self.current_kind().clone() {
            TokenKind::Int(n) => ExprKind::Int(n),
            TokenKind::Float(x) => ExprKind::Float(x),
            TokenKind::Str(s) => ExprKind::Str(s),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::None => ExprKind::None,
            TokenKind::Ident(name) => ExprKind::Ident(Ident::new(name, span)),
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "`)` to close the parenthesized expression")?;
                // Parentheses only group; the node keeps its own id but spans the parens.
                let span = span.merge(self.previous_span());
                return Ok(Expr { span, ..inner });
            }
            TokenKind::LBracket => return self.parse_list(),
            TokenKind::LBrace => return self.parse_record(),
            TokenKind::Fn => {
                let decl = self.nested(Self::parse_fn_decl)?;
                let span = decl.span;
                return Ok(self.node(ExprKind::Lambda(Box::new(decl)), span));
            }
            _ => {
                return Err(self.unexpected("an expression").with_code(ErrorCode::ExpectedExpression));
            }
        };

        self.advance();
        Ok(self.node(kind, span))
    }

    fn parse_list(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        self.advance();
        let items = self.nested(|p| p.parse_comma_list(TokenKind::RBracket, Self::parse_expr))?;
        self.expect(TokenKind::RBracket, "`]` to close the list")?;
        let span = start.merge(self.previous_span());
        Ok(self.node(ExprKind::List(items), span))
    }

    fn parse_record(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        self.advance();
        let fields = self.nested(|p| {
            p.parse_comma_list(TokenKind::RBrace, |p| {
                let name = p.parse_ident("a member name in the record")?;
                p.expect(TokenKind::Colon, "`:` after the member name")?;
                let value = p.parse_expr()?;
                let span = name.span.merge(value.span);
                Ok(RecordField { name, value, span })
            })
        })?;
        self.expect(TokenKind::RBrace, "`}` to close the record")?;
        let span = start.merge(self.previous_span());
        Ok(self.node(ExprKind::Record(fields), span))
    }

    fn parse_ident(&mut self, expected: &str) -> PResult<Ident> {
        match self.current_kind().clone() {
            TokenKind::Ident(name) => {
                let span = self.current_span();
                self.advance();
                Ok(Ident::new(name, span))
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    // ========== Types ==========

    /// Parse a type that makes up the whole input, such as a host function signature.
    pub fn parse_type_only(&mut self) -> Option<TypeExpr> {
        let parsed = self.parse_type().and_then(|ty| {
            self.expect(TokenKind::Eof, "end of the type")?;
            Ok(ty)
        });
        match parsed {
            Ok(ty) => Some(ty),
            Err(err) => {
                self.errors.push(err);
                None
            }
        }
    }

    fn parse_type(&mut self) -> PResult<TypeExpr> {
        let mut ty = self.nested(Self::parse_primary_type)?;
        while self.eat(&TokenKind::Question) {
            let span = ty.span.merge(self.previous_span());
            ty = TypeExpr::new(TypeExprKind::Optional(Box::new(ty)), span);
        }
        Ok(ty)
    }

    fn parse_primary_type(&mut self) -> PResult<TypeExpr> {
        let start = self.current_span();

        let kind = match self.current_kind().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                TypeExprKind::Named(Ident::new(name, start))
            }
            TokenKind::None => {
                self.advance();
                TypeExprKind::Named(Ident::new("None", start))
            }
            TokenKind::LBrace => {
                self.advance();
                let fields = self.parse_comma_list(TokenKind::RBrace, |p| {
                    let name = p.parse_ident("a member name in the record type")?;
                    p.expect(TokenKind::Colon, "`:` after the member name")?;
                    let ty = p.parse_type()?;
                    let span = name.span.merge(ty.span);
                    Ok(RecordTypeField { name, ty, span })
                })?;
                self.expect(TokenKind::RBrace, "`}` to close the record type")?;
                TypeExprKind::Record(fields)
            }
            TokenKind::LBracket => {
                self.advance();
                let elem = self.parse_type()?;
                self.expect(TokenKind::RBracket, "`]` to close the list type")?;
                TypeExprKind::List(Box::new(elem))
            }
            TokenKind::Fn => {
                self.advance();
                self.expect(TokenKind::LParen, "`(` after `fn` in a function type")?;
                let params = self.parse_comma_list(TokenKind::RParen, Self::parse_type)?;
                self.expect(TokenKind::RParen, "`)` to close the parameter types")?;
                self.expect(TokenKind::Arrow, "`->` and a return type")?;
                let ret = self.parse_type()?;
                TypeExprKind::Function {
                    params,
                    ret: Box::new(ret),
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_type()?;
                self.expect(TokenKind::RParen, "`)` to close the type")?;
                return Ok(TypeExpr::new(inner.kind, start.merge(self.previous_span())));
            }
            _ => return Err(self.unexpected("a type").with_code(ErrorCode::ExpectedType)),
        };

        Ok(TypeExpr::new(kind, start.merge(self.previous_span())))
    }

    // ========== Node Helpers ==========

    fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn node(&mut self, kind: ExprKind, span: Span) -> Expr {
        let id = self.fresh_id();
        Expr::new(id, kind, span)
    }

    fn binary(&mut self, op: BinOp, left: Expr, right: Expr) -> Expr {
        let span = left.span.merge(right.span);
        self.node(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            span,
        )
    }

    /// Run `f` one nesting level deeper, failing instead of exhausting the stack.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= MAX_DEPTH {
            return Err(self.too_deep());
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Operator chains build left-deep trees without recursing here, so they
    /// count against the same bound.
    fn bump_chain(&self, chain: &mut usize) -> PResult<()> {
        *chain += 1;
        if self.depth + *chain >= MAX_DEPTH {
            Err(self.too_deep())
        } else {
            Ok(())
        }
    }

    fn too_deep(&self) -> ParseError {
        ParseError::new(
            self.current_span(),
            format!("at most {MAX_DEPTH} levels of nesting"),
            "a deeper expression",
        )
        .with_code(ErrorCode::NestingTooDeep)
    }

    // ========== Token Helpers ==========

    fn current(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek_kind(&self, n: usize) -> &TokenKind {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + n).min(last)].kind
    }

    fn current_span(&self) -> Span {
        self.current().span
    }

    fn previous_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            self.current_span()
        }
    }

    fn at_end(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.current_kind()) == std::mem::discriminant(kind)
    }

    fn advance(&mut self) {
        if !self.at_end() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> PResult<()> {
        if self.eat(&kind) {
            Ok(())
        } else {
            let code = if kind == TokenKind::LBrace {
                ErrorCode::ExpectedBlock
            } else {
                ErrorCode::UnexpectedToken
            };
            Err(self.unexpected(expected).with_code(code))
        }
    }

    fn expect_semicolon(&mut self) -> PResult<()> {
        if self.eat(&TokenKind::Semicolon) {
            Ok(())
        } else {
            Err(self.unexpected("`;`").with_code(ErrorCode::MissingSemicolon))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::new(self.current_span(), expected, self.current_kind().to_string())
    }

    // ========== Error Recovery ==========

    /// Record `err` and skip to the next statement boundary. Fails when the
    /// parser must stop instead (strict mode, too many errors, or an inner
    /// block already stopped).
    fn recover(&mut self, err: ParseError) -> PResult<()> {
        if self.aborted {
            return Err(err);
        }
        tracing::trace!(error = %err, "recovering from parse error");
        self.errors.push(err.clone());
        if self.mode == ParseMode::Strict || self.errors.len() >= MAX_ERRORS {
            self.aborted = true;
            return Err(err);
        }
        self.synchronize();
        Ok(())
    }

    /// Skip tokens until just after a `;`, or before a statement keyword or a
    /// `}` that closes an enclosing block. Always makes progress unless it
    /// stops at such a `}`.
    fn synchronize(&mut self) {
        let mut delimiters = DelimiterStack::new();
        let mut advanced = false;

        while !self.at_end() {
            if advanced && delimiters.is_empty() && is_stmt_start(self.current_kind()) {
                return;
            }

            let kind = self.current_kind().clone();
            if !delimiters.update(&kind) && kind == TokenKind::RBrace && self.blocks > 0 {
                // Leave the `}` for the enclosing block; a stray `)` or `]` is skipped.
                return;
            }
            self.advance();
            advanced = true;

            if kind == TokenKind::Semicolon && delimiters.is_empty() {
                return;
            }
        }
    }

    /// Parse a comma-separated list up to (not including) `closing`.
    fn parse_comma_list<T>(
        &mut self,
        closing: TokenKind,
        mut parse_item: impl FnMut(&mut Self) -> PResult<T>,
    ) -> PResult<Vec<T>> {
        let mut items = Vec::new();

        while !self.check(&closing) && !self.at_end() {
            items.push(parse_item(self)?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratus_lexer::tokenize;

    fn parse_ok(source: &str) -> Module {
        let tokens = tokenize(source).expect("lexing failed");
        let mut parser = Parser::new(tokens, ParseMode::Recover);
        let module = parser.parse_module();
        let errors = parser.errors();
        assert!(errors.is_empty(), "unexpected parse errors: {errors:?}");
        module
    }

    #[test]
    fn test_node_ids_are_unique() {
        let module = parse_ok("let f = fn(x) { return x + 1; }; f(1) + f(2)");
        let mut ids = Vec::new();
        fn collect(expr: &Expr, ids: &mut Vec<NodeId>) {
            ids.push(expr.id);
            match &expr.kind {
                ExprKind::Binary { left, right, .. } => {
                    collect(left, ids);
                    collect(right, ids);
                }
                ExprKind::Call { callee, args } => {
                    collect(callee, ids);
                    args.iter().for_each(|a| collect(a, ids));
                }
                _ => {}
            }
        }
        collect(module.entry.as_ref().expect("entry"), &mut ids);
        let len = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), len);
    }

    #[test]
    fn test_strict_mode_stops_at_first_error() {
        let tokens = tokenize("let = 1; let = 2;").expect("lexing failed");
        let mut parser = Parser::new(tokens, ParseMode::Strict);
        parser.parse_module();
        assert_eq!(parser.errors().len(), 1);
    }

    #[test]
    fn test_recovery_reports_each_bad_statement() {
        let tokens = tokenize("let = 1; let x = 2; let = 3;").expect("lexing failed");
        let mut parser = Parser::new(tokens, ParseMode::Recover);
        let module = parser.parse_module();
        assert_eq!(module.stmts.len(), 1);
        assert_eq!(parser.errors().len(), 2);
    }

    #[test]
    fn test_parse_type_only() {
        let tokens = tokenize("fn(Int, [Str]?) -> Bool").expect("lexing failed");
        let mut parser = Parser::new(tokens, ParseMode::Strict);
        let ty = parser.parse_type_only().expect("parses");
        assert!(matches!(&ty.kind, TypeExprKind::Function { params, .. } if params.len() == 2));

        let tokens = tokenize("Int Int").expect("lexing failed");
        let mut parser = Parser::new(tokens, ParseMode::Strict);
        assert!(parser.parse_type_only().is_none());
        assert_eq!(parser.errors().len(), 1);
    }

    #[test]
    fn test_deep_nesting_is_an_error_not_an_overflow() {
        let source = format!("{}1{}", "(".repeat(500), ")".repeat(500));
        let tokens = tokenize(&source).expect("lexing failed");
        let mut parser = Parser::new(tokens, ParseMode::Strict);
        parser.parse_module();
        let errors = parser.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::NestingTooDeep);
    }
}
