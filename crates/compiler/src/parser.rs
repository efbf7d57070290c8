//! Recursive-descent parser with a Pratt-style precedence ladder for
//! expressions (§4.2). Blocks are brace-delimited; `NEWLINE` and `;` are
//! both accepted statement separators and are otherwise skipped wherever a
//! new statement or declaration is expected.

use crate::ast::*;
use crate::error::{CompileError, Phase};
use crate::lexer::{split_interpolation, InterpChunk, Lexer};
use crate::token::{Literal, Token, TokenKind};
use crate::types::{Modifier, Type};
use std::collections::HashSet;

/// Injected by the driver so the parser can load `import "path"` targets
/// without owning filesystem access itself.
pub trait ModuleResolver {
    fn resolve(&mut self, path: &str) -> Result<String, String>;
}

pub struct Parser<'r> {
    tokens: Vec<Token>,
    pos: usize,
    filename: String,
    pub errors: Vec<CompileError>,
    resolver: Option<&'r mut dyn ModuleResolver>,
    visited_imports: HashSet<String>,
    pub imports: Vec<String>,
    pub imported_stmts: Vec<Stmt>,
}

type PResult<T> = Result<T, ()>;

impl<'r> Parser<'r> {
    pub fn new(tokens: Vec<Token>, filename: impl Into<String>, resolver: Option<&'r mut dyn ModuleResolver>) -> Self {
        Parser {
            tokens,
            pos: 0,
            filename: filename.into(),
            errors: Vec::new(),
            resolver,
            visited_imports: HashSet::new(),
            imports: Vec::new(),
            imported_stmts: Vec::new(),
        }
    }

    pub fn parse_module(mut self) -> (Module, Vec<CompileError>) {
        let mut stmts = Vec::new();
        self.skip_separators();
        while !self.check(TokenKind::Eof) {
            match self.parse_decl_or_stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(()) => self.synchronize(),
            }
            self.skip_separators();
        }
        let mut all = std::mem::take(&mut self.imported_stmts);
        all.extend(stmts);
        let module = Module { filename: self.filename.clone(), imports: self.imports.clone(), stmts: all };
        (module, self.errors)
    }

    // ---- token stream helpers ----

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let tok = self.peek().clone();
            self.error(tok.line, format!("expected {what}, found '{}'", tok.lexeme));
            Err(())
        }
    }

    fn error(&mut self, line: u32, message: impl Into<String>) {
        self.errors.push(CompileError::new(Phase::Parse, self.filename.clone(), line, message));
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Semicolon) {
            self.advance();
        }
    }

    fn consume_terminator(&mut self) {
        // A terminator is optional right before a closing brace or EOF.
        if matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Semicolon) {
            self.advance();
        }
        self.skip_separators();
    }

    /// Recovery: skip to the next newline/`;` or EOF after a parse error so
    /// the checker can still run to completion over the rest of the module.
    fn synchronize(&mut self) {
        while !matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof) {
            self.advance();
        }
        self.skip_separators();
    }

    // ---- declarations and statements ----

    fn parse_decl_or_stmt(&mut self) -> PResult<Stmt> {
        match self.peek_kind() {
            TokenKind::Fn => self.parse_function(Modifier::Default),
            TokenKind::Native => {
                self.advance();
                self.expect(TokenKind::Fn, "'fn' after 'native'")?;
                self.parse_function_body(Modifier::Native, true)
            }
            TokenKind::Import => self.parse_import(),
            t if t == TokenKind::Identifier && self.peek().lexeme == "struct" => self.parse_struct_decl(),
            _ => self.parse_stmt(),
        }
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Var => self.parse_var_decl(),
            TokenKind::LBrace => self.parse_block(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Return => {
                self.advance();
                let value = if matches!(self.peek_kind(), TokenKind::Newline | TokenKind::RBrace | TokenKind::Eof) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.consume_terminator();
                Ok(Stmt::new(StmtKind::Return(value), tok))
            }
            TokenKind::Break => {
                self.advance();
                self.consume_terminator();
                Ok(Stmt::new(StmtKind::Break, tok))
            }
            TokenKind::Continue => {
                self.advance();
                self.consume_terminator();
                Ok(Stmt::new(StmtKind::Continue, tok))
            }
            t if t == TokenKind::Identifier && self.peek().lexeme == "lock" => self.parse_lock(),
            _ => self.parse_expr_stmt(),
        }
    }

    fn parse_block(&mut self) -> PResult<Stmt> {
        let tok = self.expect(TokenKind::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        self.skip_separators();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            match self.parse_decl_or_stmt() {
                Ok(s) => stmts.push(s),
                Err(()) => self.synchronize(),
            }
            self.skip_separators();
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(Stmt::new(StmtKind::Block(stmts), tok))
    }

    /// The body after `=>`: a single statement on the same line, or a
    /// brace-delimited block (§4.2).
    fn parse_arrow_body(&mut self) -> PResult<Stmt> {
        self.expect(TokenKind::FatArrow, "'=>'")?;
        if self.check(TokenKind::LBrace) {
            self.parse_block()
        } else {
            self.parse_stmt()
        }
    }

    fn parse_type(&mut self) -> PResult<Type> {
        let mut base = match self.peek_kind() {
            TokenKind::TyInt => { self.advance(); Type::Int }
            TokenKind::TyLong => { self.advance(); Type::Long }
            TokenKind::TyDouble => { self.advance(); Type::Double }
            TokenKind::TyStr => { self.advance(); Type::String }
            TokenKind::TyChar => { self.advance(); Type::Char }
            TokenKind::TyBool => { self.advance(); Type::Bool }
            TokenKind::TyVoid => { self.advance(); Type::Void }
            TokenKind::TyByte => { self.advance(); Type::Byte }
            TokenKind::TyInt32 => { self.advance(); Type::Int32 }
            TokenKind::TyUint => { self.advance(); Type::Uint }
            TokenKind::TyUint32 => { self.advance(); Type::Uint32 }
            TokenKind::TyFloat => { self.advance(); Type::Float }
            TokenKind::TyAny => { self.advance(); Type::Any }
            TokenKind::Star => {
                self.advance();
                let pointee = self.parse_type()?;
                return Ok(Type::Pointer(Box::new(pointee)));
            }
            TokenKind::Identifier => {
                let name = self.advance().lexeme;
                Type::Opaque(name)
            }
            _ => {
                let tok = self.peek().clone();
                self.error(tok.line, format!("expected a type, found '{}'", tok.lexeme));
                return Err(());
            }
        };
        loop {
            if self.check(TokenKind::LBracket) && self.tokens.get(self.pos + 1).map(|t| t.kind) == Some(TokenKind::RBracket) {
                self.advance();
                self.advance();
                base = Type::Array(Box::new(base));
            } else if self.matches(TokenKind::Question) {
                base = Type::Nullable(Box::new(base));
            } else {
                break;
            }
        }
        Ok(base)
    }

    fn parse_var_decl(&mut self) -> PResult<Stmt> {
        let tok = self.advance();
        let name = self.expect(TokenKind::Identifier, "variable name")?.lexeme;
        let ty = if self.matches(TokenKind::Colon) { self.parse_type()? } else { Type::Any };
        let init = if self.matches(TokenKind::Eq) { Some(self.parse_expr()?) } else { None };
        self.consume_terminator();
        Ok(Stmt::new(StmtKind::VarDecl(name, ty, init), tok))
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let tok = self.advance();
        let cond = self.parse_expr()?;
        let then_branch = Box::new(self.parse_arrow_body()?);
        let mut elifs = Vec::new();
        let mut else_branch = None;
        loop {
            self.skip_separators_peek_only();
            if self.check(TokenKind::Elif) {
                self.advance();
                let c = self.parse_expr()?;
                let b = self.parse_arrow_body()?;
                elifs.push((c, b));
            } else if self.check(TokenKind::Else) {
                self.advance();
                else_branch = Some(Box::new(self.parse_arrow_body()?));
                break;
            } else {
                break;
            }
        }
        Ok(Stmt::new(StmtKind::If(cond, then_branch, elifs, else_branch), tok))
    }

    /// `elif`/`else` may follow on the next line; peek through a single
    /// run of newlines without committing if neither keyword follows.
    fn skip_separators_peek_only(&mut self) {
        let save = self.pos;
        self.skip_separators();
        if !matches!(self.peek_kind(), TokenKind::Elif | TokenKind::Else) {
            self.pos = save;
        }
    }

    fn parse_while(&mut self) -> PResult<Stmt> {
        let tok = self.advance();
        let cond = self.parse_expr()?;
        let body = Box::new(self.parse_arrow_body()?);
        Ok(Stmt::new(StmtKind::While(cond, body), tok))
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        let tok = self.advance();
        // Disambiguate `for x in iterable` (ForEach) from classic
        // `for init; cond; incr`.
        if self.check(TokenKind::Identifier) && self.tokens.get(self.pos + 1).map(|t| t.kind) == Some(TokenKind::In) {
            let var = self.advance().lexeme;
            self.advance(); // `in`
            let iterable = self.parse_expr()?;
            let body = Box::new(self.parse_arrow_body()?);
            return Ok(Stmt::new(StmtKind::ForEach(var, iterable, body), tok));
        }
        let init = if self.check(TokenKind::Var) { Some(Box::new(self.parse_var_decl()?)) } else { None };
        if init.is_none() {
            self.expect(TokenKind::Semicolon, "';' or loop header")?;
        }
        let cond = if self.check(TokenKind::Semicolon) { None } else { Some(self.parse_expr()?) };
        self.expect(TokenKind::Semicolon, "';' separating for-loop clauses")?;
        let incr = if self.check(TokenKind::FatArrow) { None } else { Some(self.parse_expr()?) };
        let body = Box::new(self.parse_arrow_body()?);
        Ok(Stmt::new(StmtKind::For(init, cond, incr, body), tok))
    }

    fn parse_lock(&mut self) -> PResult<Stmt> {
        let tok = self.advance();
        self.expect(TokenKind::LParen, "'(' after lock")?;
        let expr = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')'")?;
        let body = Box::new(self.parse_arrow_body()?);
        Ok(Stmt::new(StmtKind::Lock(expr, body), tok))
    }

    fn parse_import(&mut self) -> PResult<Stmt> {
        let tok = self.advance();
        let path_tok = self.expect(TokenKind::StringLiteral, "import path string")?;
        let path = match path_tok.literal {
            Some(Literal::Str(s)) => s,
            _ => String::new(),
        };
        self.consume_terminator();
        self.imports.push(path.clone());
        if self.visited_imports.insert(path.clone()) {
            if let Some(resolver) = self.resolver.as_deref_mut() {
                match resolver.resolve(&path) {
                    Ok(source) => {
                        let (tokens, lex_errs) = Lexer::new(&source, path.clone()).tokenize();
                        self.errors.extend(lex_errs);
                        let sub = Parser::new(tokens, path.clone(), None);
                        let (module, sub_errs) = sub.parse_module();
                        self.errors.extend(sub_errs);
                        self.imported_stmts.extend(module.stmts);
                    }
                    Err(message) => self.error(tok.line, format!("cannot import '{path}': {message}")),
                }
            }
        }
        Ok(Stmt::new(StmtKind::Import(path), tok))
    }

    fn parse_struct_decl(&mut self) -> PResult<Stmt> {
        let tok = self.advance(); // `struct` (a contextual identifier)
        let name = self.expect(TokenKind::Identifier, "struct name")?.lexeme;
        let is_native = false;
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut fields = Vec::new();
        self.skip_separators();
        while !self.check(TokenKind::RBrace) {
            let fname = self.expect(TokenKind::Identifier, "field name")?.lexeme;
            self.expect(TokenKind::Colon, "':'")?;
            let ty = self.parse_type()?;
            let default = if self.matches(TokenKind::Eq) { Some(self.parse_expr()?) } else { None };
            fields.push(FieldDecl { name: fname, ty, default, c_alias: None });
            if !self.matches(TokenKind::Comma) {
                self.skip_separators();
            }
            self.skip_separators();
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(Stmt::new(StmtKind::StructDecl { name, fields, is_native }, tok))
    }

    fn parse_params(&mut self) -> PResult<Vec<Param>> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        let mut seen = HashSet::new();
        while !self.check(TokenKind::RParen) {
            let name_tok = self.expect(TokenKind::Identifier, "parameter name")?;
            if !seen.insert(name_tok.lexeme.clone()) {
                self.error(name_tok.line, format!("duplicate parameter name '{}'", name_tok.lexeme));
            }
            let ty = if self.matches(TokenKind::Colon) { self.parse_type()? } else { Type::Any };
            params.push(Param { name: name_tok.lexeme, ty });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(params)
    }

    fn parse_function(&mut self, modifier: Modifier) -> PResult<Stmt> {
        self.advance(); // `fn`
        self.parse_function_body(modifier, false)
    }

    fn parse_function_body(&mut self, modifier: Modifier, is_native: bool) -> PResult<Stmt> {
        let tok = self.peek().clone();
        let name = self.expect(TokenKind::Identifier, "function name")?.lexeme;
        let params = self.parse_params()?;
        let ret = if self.matches(TokenKind::Arrow) { self.parse_type()? } else { Type::Void };
        let body = Box::new(self.parse_arrow_body()?);
        Ok(Stmt::new(StmtKind::Function { name, params, ret, body, modifier, is_native }, tok))
    }

    fn parse_expr_stmt(&mut self) -> PResult<Stmt> {
        let tok = self.peek().clone();
        let expr = self.parse_expr()?;
        self.consume_terminator();
        Ok(Stmt::new(StmtKind::ExprStmt(expr), tok))
    }

    // ---- expressions: precedence climbing (§4.2) ----

    pub fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> PResult<Expr> {
        let lhs = self.parse_or()?;
        let op_tok = self.peek().clone();
        let compound = match op_tok.kind {
            TokenKind::Eq => None,
            TokenKind::PlusEq => Some(CompoundOp::Add),
            TokenKind::MinusEq => Some(CompoundOp::Sub),
            TokenKind::StarEq => Some(CompoundOp::Mul),
            TokenKind::SlashEq => Some(CompoundOp::Div),
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_assignment()?;
        self.build_assignment(lhs, compound, rhs, op_tok)
    }

    fn build_assignment(&mut self, lhs: Expr, compound: Option<CompoundOp>, rhs: Expr, tok: Token) -> PResult<Expr> {
        match (&*lhs.kind, compound) {
            (ExprKind::Variable(name), None) => Ok(Expr::new(ExprKind::Assign(name.clone(), Box::new(rhs)), tok)),
            (ExprKind::ArrayAccess(arr, idx), None) => {
                Ok(Expr::new(ExprKind::IndexAssign(arr.clone(), idx.clone(), Box::new(rhs)), tok))
            }
            (ExprKind::MemberAccess(obj, field), None) => {
                Ok(Expr::new(ExprKind::MemberAssign(obj.clone(), field.clone(), Box::new(rhs)), tok))
            }
            (ExprKind::Variable(_) | ExprKind::ArrayAccess(..) | ExprKind::MemberAccess(..), Some(op)) => {
                Ok(Expr::new(ExprKind::CompoundAssign(Box::new(lhs), op, Box::new(rhs)), tok))
            }
            _ => {
                self.error(tok.line, "invalid assignment target: expected a variable, index, or field");
                Err(())
            }
        }
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek_kind(), TokenKind::PipePipe | TokenKind::Or) {
            let tok = self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::new(ExprKind::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs)), tok);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_equality()?;
        while matches!(self.peek_kind(), TokenKind::AmpAmp | TokenKind::And) {
            let tok = self.advance();
            let rhs = self.parse_equality()?;
            lhs = Expr::new(ExprKind::Binary(BinOp::And, Box::new(lhs), Box::new(rhs)), tok);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::BangEq => BinOp::Ne,
                _ => break,
            };
            let tok = self.advance();
            let rhs = self.parse_comparison()?;
            lhs = Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), tok);
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_range()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::LtEq => BinOp::Le,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::GtEq => BinOp::Ge,
                _ => break,
            };
            let tok = self.advance();
            let rhs = self.parse_range()?;
            lhs = Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), tok);
        }
        Ok(lhs)
    }

    fn parse_range(&mut self) -> PResult<Expr> {
        let lhs = self.parse_additive()?;
        if self.check(TokenKind::DotDot) {
            let tok = self.advance();
            let rhs = self.parse_additive()?;
            return Ok(Expr::new(ExprKind::Range(Box::new(lhs), Box::new(rhs)), tok));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            let tok = self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), tok);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Rem,
                _ => break,
            };
            let tok = self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), tok);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        match self.peek_kind() {
            TokenKind::Minus => {
                let tok = self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(ExprKind::Unary(UnOp::Neg, Box::new(operand)), tok))
            }
            TokenKind::Bang => {
                let tok = self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(ExprKind::Unary(UnOp::Not, Box::new(operand)), tok))
            }
            TokenKind::PlusPlus => {
                let tok = self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(ExprKind::PreIncrement(Box::new(operand)), tok))
            }
            TokenKind::MinusMinus => {
                let tok = self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(ExprKind::PreDecrement(Box::new(operand)), tok))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let name_tok = self.expect(TokenKind::Identifier, "field or method name")?;
                    if self.check(TokenKind::LParen) {
                        let args = self.parse_args()?;
                        expr = Expr::new(
                            ExprKind::Call(
                                Box::new(Expr::new(ExprKind::MemberAccess(Box::new(expr), name_tok.lexeme.clone()), name_tok.clone())),
                                args,
                            ),
                            name_tok,
                        );
                    } else {
                        expr = Expr::new(ExprKind::MemberAccess(Box::new(expr), name_tok.lexeme.clone()), name_tok);
                    }
                }
                TokenKind::LParen => {
                    let tok = self.peek().clone();
                    let args = self.parse_args()?;
                    expr = Expr::new(ExprKind::Call(Box::new(expr), args), tok);
                }
                TokenKind::LBracket => {
                    let tok = self.advance();
                    if self.check(TokenKind::RBracket) {
                        self.error(tok.line, "empty index expression");
                        return Err(());
                    }
                    let (start, end, step, is_slice) = self.parse_slice_or_index()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    expr = if is_slice {
                        Expr::new(ExprKind::ArraySlice(Box::new(expr), start.map(Box::new), end.map(Box::new), step.map(Box::new)), tok)
                    } else {
                        Expr::new(ExprKind::ArrayAccess(Box::new(expr), Box::new(start.expect("index present"))), tok)
                    };
                }
                TokenKind::PlusPlus => {
                    let tok = self.advance();
                    expr = Expr::new(ExprKind::PostIncrement(Box::new(expr)), tok);
                }
                TokenKind::MinusMinus => {
                    let tok = self.advance();
                    expr = Expr::new(ExprKind::PostDecrement(Box::new(expr)), tok);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_slice_or_index(&mut self) -> PResult<(Option<Expr>, Option<Expr>, Option<Expr>, bool)> {
        let start = if self.check(TokenKind::Colon) { None } else { Some(self.parse_expr()?) };
        if !self.matches(TokenKind::Colon) {
            return Ok((start, None, None, false));
        }
        let end = if matches!(self.peek_kind(), TokenKind::Colon | TokenKind::RBracket) { None } else { Some(self.parse_expr()?) };
        let step = if self.matches(TokenKind::Colon) {
            if self.check(TokenKind::RBracket) { None } else { Some(self.parse_expr()?) }
        } else {
            None
        };
        Ok((start, end, step, true))
    }

    fn parse_args(&mut self) -> PResult<Vec<Expr>> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        while !self.check(TokenKind::RParen) {
            if self.check(TokenKind::DotDot) {
                let tok = self.advance();
                let inner = self.parse_expr()?;
                args.push(Expr::new(ExprKind::Spread(Box::new(inner)), tok));
            } else {
                args.push(self.parse_expr()?);
            }
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::IntLiteral => {
                self.advance();
                let Literal::Int(v) = tok.literal.clone().unwrap() else { unreachable!() };
                Ok(Expr::new(ExprKind::IntLiteral(v), tok))
            }
            TokenKind::DoubleLiteral => {
                self.advance();
                let Literal::Double(v) = tok.literal.clone().unwrap() else { unreachable!() };
                Ok(Expr::new(ExprKind::DoubleLiteral(v), tok))
            }
            TokenKind::True | TokenKind::False => {
                self.advance();
                let Literal::Bool(v) = tok.literal.clone().unwrap() else { unreachable!() };
                Ok(Expr::new(ExprKind::BoolLiteral(v), tok))
            }
            TokenKind::CharLiteral => {
                self.advance();
                let Literal::Char(v) = tok.literal.clone().unwrap() else { unreachable!() };
                Ok(Expr::new(ExprKind::CharLiteral(v), tok))
            }
            TokenKind::Nil => {
                self.advance();
                Ok(Expr::new(ExprKind::NilLiteral, tok))
            }
            TokenKind::StringLiteral => {
                self.advance();
                let Literal::Str(s) = tok.literal.clone().unwrap() else { unreachable!() };
                Ok(Expr::new(ExprKind::StringLiteral(s), tok))
            }
            TokenKind::StringInterpStart => {
                self.advance();
                self.parse_interpolated(tok)
            }
            TokenKind::Identifier => {
                self.advance();
                if self.check(TokenKind::LBrace) && self.looks_like_struct_literal() {
                    self.parse_struct_literal(tok)
                } else if self.check(TokenKind::Colon) && self.tokens.get(self.pos + 1).map(|t| t.kind) == Some(TokenKind::Colon) {
                    self.advance();
                    self.advance();
                    let member = self.expect(TokenKind::Identifier, "static member name")?.lexeme;
                    let args = self.parse_args()?;
                    Ok(Expr::new(ExprKind::StaticCall(tok.lexeme.clone(), member, args), tok))
                } else {
                    Ok(Expr::new(ExprKind::Variable(tok.lexeme.clone()), tok))
                }
            }
            TokenKind::Fn => self.parse_lambda(Modifier::Default),
            TokenKind::Native => {
                self.advance();
                self.expect(TokenKind::Fn, "'fn' after 'native'")?;
                self.parse_lambda_body(Modifier::Native)
            }
            t if t == TokenKind::Identifier && matches!(tok.lexeme.as_str(), "private" | "shared") => {
                self.advance();
                self.expect(TokenKind::Fn, "'fn' after modifier")?;
                let modifier = if tok.lexeme == "private" { Modifier::Private } else { Modifier::Shared };
                self.parse_lambda_body(modifier)
            }
            TokenKind::Match => self.parse_match(),
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elems = Vec::new();
                while !self.check(TokenKind::RBracket) {
                    elems.push(self.parse_expr()?);
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket, "']'")?;
                Ok(Expr::new(ExprKind::ArrayLiteral(elems), tok))
            }
            _ => {
                self.error(tok.line, format!("unexpected token '{}'", tok.lexeme));
                Err(())
            }
        }
    }

    fn looks_like_struct_literal(&self) -> bool {
        // `Name { field: value, ... }` vs a block following an expression
        // statement that happens to start with an identifier: the field
        // colon after the first identifier disambiguates, with an empty
        // `{}` also accepted as a struct literal with all-default fields.
        let mut i = self.pos + 1;
        if self.tokens.get(i).map(|t| t.kind) == Some(TokenKind::RBrace) {
            return true;
        }
        matches!(self.tokens.get(i).map(|t| t.kind), Some(TokenKind::Identifier))
            && { i += 1; self.tokens.get(i).map(|t| t.kind) == Some(TokenKind::Colon) }
    }

    fn parse_struct_literal(&mut self, name_tok: Token) -> PResult<Expr> {
        self.advance(); // `{`
        let mut fields = Vec::new();
        while !self.check(TokenKind::RBrace) {
            let fname = self.expect(TokenKind::Identifier, "field name")?.lexeme;
            self.expect(TokenKind::Colon, "':'")?;
            let value = self.parse_expr()?;
            fields.push(FieldInit { name: fname, value });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(Expr::new(ExprKind::StructLiteral(name_tok.lexeme.clone(), fields), name_tok))
    }

    fn parse_lambda(&mut self, modifier: Modifier) -> PResult<Expr> {
        self.advance(); // `fn`
        self.parse_lambda_body(modifier)
    }

    fn parse_lambda_body(&mut self, modifier: Modifier) -> PResult<Expr> {
        let tok = self.peek().clone();
        let params = self.parse_params()?;
        let ret = if self.matches(TokenKind::Arrow) { self.parse_type()? } else { Type::Any };
        let body = Box::new(self.parse_arrow_body()?);
        Ok(Expr::new(ExprKind::Lambda(params, ret, modifier, body), tok))
    }

    fn parse_match(&mut self) -> PResult<Expr> {
        let tok = self.advance();
        let subject = self.parse_expr()?;
        self.expect(TokenKind::FatArrow, "'=>' after match subject")?;
        let brace_delimited = self.matches(TokenKind::LBrace);
        self.skip_separators();
        let mut arms = Vec::new();
        loop {
            if brace_delimited && self.check(TokenKind::RBrace) {
                break;
            }
            if !brace_delimited && !matches!(self.peek_kind(), TokenKind::Else) && !self.starts_pattern() {
                break;
            }
            if self.check(TokenKind::Else) {
                self.advance();
                self.expect(TokenKind::FatArrow, "'=>'")?;
                let body = Box::new(self.parse_stmt()?);
                arms.push(MatchArm { patterns: Vec::new(), is_else: true, body });
                self.skip_separators();
                break;
            }
            let mut patterns = vec![self.parse_or()?];
            while self.matches(TokenKind::Pipe) {
                patterns.push(self.parse_or()?);
            }
            self.expect(TokenKind::FatArrow, "'=>'")?;
            let body = Box::new(self.parse_stmt()?);
            arms.push(MatchArm { patterns, is_else: false, body });
            self.skip_separators();
        }
        if brace_delimited {
            self.expect(TokenKind::RBrace, "'}'")?;
        }
        Ok(Expr::new(ExprKind::Match(Box::new(subject), arms), tok))
    }

    fn starts_pattern(&self) -> bool {
        !matches!(self.peek_kind(), TokenKind::Eof | TokenKind::RBrace)
    }

    fn parse_interpolated(&mut self, tok: Token) -> PResult<Expr> {
        let raw = match &tok.literal {
            Some(Literal::Str(s)) => s.clone(),
            _ => String::new(),
        };
        let chunks = split_interpolation(&raw);
        let mut parts = Vec::new();
        for chunk in chunks {
            match chunk {
                InterpChunk::Literal(s) => parts.push(InterpPart::Literal(s)),
                InterpChunk::Expr(src) => {
                    let (sub_tokens, lex_errs) = Lexer::new(&src, self.filename.clone()).tokenize();
                    self.errors.extend(lex_errs);
                    let mut sub = Parser::new(sub_tokens, self.filename.clone(), None);
                    match sub.parse_expr() {
                        Ok(e) => parts.push(InterpPart::Expr(e)),
                        Err(()) => self.errors.extend(sub.errors),
                    }
                }
            }
        }
        Ok(Expr::new(ExprKind::Interpolated(parts), tok))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> (Module, Vec<CompileError>) {
        let (tokens, lex_errs) = Lexer::new(src, "t.sn").tokenize();
        assert!(lex_errs.is_empty());
        Parser::new(tokens, "t.sn", None).parse_module()
    }

    #[test]
    fn parses_var_decl_and_binary_expr() {
        let (m, errs) = parse("var x = 1 + 2 * 3\n");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(m.stmts.len(), 1);
        assert!(matches!(m.stmts[0].kind, StmtKind::VarDecl(..)));
    }

    #[test]
    fn and_lower_than_comparison() {
        let (m, errs) = parse("var x = a > b and c > d\n");
        assert!(errs.is_empty(), "{errs:?}");
        if let StmtKind::VarDecl(_, _, Some(init)) = &m.stmts[0].kind {
            if let ExprKind::Binary(BinOp::And, l, r) = &*init.kind {
                assert!(matches!(&*l.kind, ExprKind::Binary(BinOp::Gt, ..)));
                assert!(matches!(&*r.kind, ExprKind::Binary(BinOp::Gt, ..)));
            } else {
                panic!("expected top-level 'and'");
            }
        } else {
            panic!("expected var decl");
        }
    }

    #[test]
    fn or_lower_than_and() {
        let (m, errs) = parse("var x = a and b or c and d\n");
        assert!(errs.is_empty(), "{errs:?}");
        if let StmtKind::VarDecl(_, _, Some(init)) = &m.stmts[0].kind {
            if let ExprKind::Binary(BinOp::Or, l, r) = &*init.kind {
                assert!(matches!(&*l.kind, ExprKind::Binary(BinOp::And, ..)));
                assert!(matches!(&*r.kind, ExprKind::Binary(BinOp::And, ..)));
            } else {
                panic!("expected top-level 'or'");
            }
        } else {
            panic!("expected var decl");
        }
    }

    #[test]
    fn parses_function_with_arrow_block() {
        let (m, errs) = parse("fn add(a: int, b: int) -> int => { return a + b }\n");
        assert!(errs.is_empty(), "{errs:?}");
        assert!(matches!(m.stmts[0].kind, StmtKind::Function { .. }));
    }

    #[test]
    fn parses_if_elif_else() {
        let (m, errs) = parse("if x > 0 => print(1)\nelif x < 0 => print(2)\nelse => print(3)\n");
        assert!(errs.is_empty(), "{errs:?}");
        if let StmtKind::If(_, _, elifs, else_b) = &m.stmts[0].kind {
            assert_eq!(elifs.len(), 1);
            assert!(else_b.is_some());
        } else {
            panic!("expected if");
        }
    }

    #[test]
    fn duplicate_param_name_reports_error() {
        let (_, errs) = parse("fn f(a: int, a: int) => return a\n");
        assert!(errs.iter().any(|e| e.message.contains("duplicate parameter")));
    }

    #[test]
    fn invalid_assignment_target_reports_error() {
        let (_, errs) = parse("1 + 2 = 3\n");
        assert!(errs.iter().any(|e| e.message.contains("invalid assignment target")));
    }

    #[test]
    fn parses_match_expression() {
        let (m, errs) = parse(
            "var day = 3\nvar name = match day => 1 | 2 => \"weekday\" else => \"weekend\"\n",
        );
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(m.stmts.len(), 2);
    }

    #[test]
    fn parses_struct_literal() {
        let (m, errs) = parse("var p = Point { x: 1.0, y: 2.0 }\n");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(m.stmts.len(), 1);
    }

    #[test]
    fn parses_interpolated_string() {
        let (m, errs) = parse("var s = $\"count={n + 1}\"\n");
        assert!(errs.is_empty(), "{errs:?}");
        if let StmtKind::VarDecl(_, _, Some(init)) = &m.stmts[0].kind {
            assert!(matches!(&*init.kind, ExprKind::Interpolated(_)));
        } else {
            panic!("expected var decl with interpolated init");
        }
    }
}
