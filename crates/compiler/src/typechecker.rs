//! Two-pass type checker (§4.4): pass 1 hoists struct/function declarations
//! and computes struct layout plus circular-dependency detection; pass 2
//! walks every body, annotating expressions with resolved types and running
//! escape analysis. Both passes run to completion rather than bailing out
//! at the first error, per the reporting policy in §7.

use crate::ast::*;
use crate::error::{CompileError, Diagnostics, Phase};
use crate::symtab::{MemQual, SymbolKind, SymbolTable};
use crate::types::{self, compute_layout, detect_cycle, types_equal, Field as TField, Modifier, StructDef, StructHandle, Type};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct FunctionSig {
    pub params: Vec<Type>,
    pub ret: Type,
    pub modifier: Modifier,
}

pub struct TypeChecker {
    diagnostics: Diagnostics,
    symtab: SymbolTable,
    structs: HashMap<String, StructHandle>,
    functions: HashMap<String, FunctionSig>,
    filename: String,
    current_function_return: Vec<Type>,
    /// Scope depth of the innermost function/lambda's own top scope (where
    /// its params live), pushed alongside `current_function_return`. A
    /// `Return` value whose base variable was declared at or below this
    /// depth is local to the returning function (§4.4.3 third bullet).
    current_function_scope_depth: Vec<usize>,
    loop_depth: usize,
}

impl TypeChecker {
    pub fn new(filename: impl Into<String>) -> Self {
        TypeChecker {
            diagnostics: Diagnostics::new(),
            symtab: SymbolTable::new(),
            structs: HashMap::new(),
            functions: builtin_functions(),
            filename: filename.into(),
            current_function_return: Vec::new(),
            current_function_scope_depth: Vec::new(),
            loop_depth: 0,
        }
    }

    pub fn check(mut self, module: &mut Module) -> Result<(), Vec<CompileError>> {
        self.hoist_declarations(&mut module.stmts);
        self.resolve_opaque_types();
        self.check_circular_structs();
        for stmt in &mut module.stmts {
            self.check_stmt(stmt);
        }
        if self.diagnostics.has_errors() {
            Err(self.diagnostics.into_errors())
        } else {
            Ok(())
        }
    }

    fn err(&mut self, line: u32, message: impl Into<String>) {
        self.diagnostics.push(CompileError::new(Phase::Semantic, self.filename.clone(), line, message));
    }

    // ---- pass 1 ----

    fn hoist_declarations(&mut self, stmts: &mut [Stmt]) {
        for stmt in stmts.iter_mut() {
            if let StmtKind::StructDecl { name, fields, is_native } = &stmt.kind {
                let tfields: Vec<TField> = fields
                    .iter()
                    .map(|f| TField { name: f.name.clone(), ty: f.ty.clone(), offset: 0, default: f.default.clone().map(Box::new), c_alias: f.c_alias.clone() })
                    .collect();
                let handle = StructDef::new(Some(name.clone()), tfields, *is_native);
                if self.structs.insert(name.clone(), handle).is_some() {
                    self.err(stmt.token.line, format!("duplicate struct declaration '{name}'"));
                }
            }
        }
        for fields in stmts.iter().filter_map(|s| match &s.kind {
            StmtKind::StructDecl { fields, .. } => Some(fields),
            _ => None,
        }) {
            let mut seen = std::collections::HashSet::new();
            for f in fields {
                if !seen.insert(f.name.clone()) {
                    self.err(0, format!("duplicate field name '{}'", f.name));
                }
            }
        }
        for stmt in stmts.iter() {
            if let StmtKind::Function { name, params, ret, modifier, .. } = &stmt.kind {
                let sig = FunctionSig {
                    params: params.iter().map(|p| self.resolve_named_type(&p.ty)).collect(),
                    ret: self.resolve_named_type(ret),
                    modifier: *modifier,
                };
                self.symtab.add(name, Type::Function { params: sig.params.clone(), ret: Box::new(sig.ret.clone()), modifier: *modifier }, SymbolKind::Global, MemQual::Value);
                self.functions.insert(name.clone(), sig);
            }
        }
    }

    fn resolve_named_type(&self, ty: &Type) -> Type {
        match ty {
            Type::Opaque(name) => self.structs.get(name).cloned().map(Type::Struct).unwrap_or_else(|| ty.clone()),
            Type::Array(elem) => Type::Array(Box::new(self.resolve_named_type(elem))),
            Type::Pointer(p) => Type::Pointer(Box::new(self.resolve_named_type(p))),
            Type::Nullable(inner) => Type::Nullable(Box::new(self.resolve_named_type(inner))),
            other => other.clone(),
        }
    }

    /// Patches every field's `Opaque(name)` placeholder to the real struct
    /// handle now that every struct name is known, then computes layout.
    fn resolve_opaque_types(&mut self) {
        let names: Vec<String> = self.structs.keys().cloned().collect();
        for name in &names {
            let handle = self.structs[name].clone();
            let resolved: Vec<TField> = handle
                .borrow()
                .fields
                .iter()
                .map(|f| TField {
                    name: f.name.clone(),
                    ty: self.resolve_named_type(&f.ty),
                    offset: f.offset,
                    default: f.default.clone(),
                    c_alias: f.c_alias.clone(),
                })
                .collect();
            handle.borrow_mut().fields = resolved;
        }
        for name in &names {
            compute_layout(&self.structs[name]);
        }
    }

    fn check_circular_structs(&mut self) {
        for (name, handle) in self.structs.clone() {
            if let Some(chain) = detect_cycle(&handle) {
                handle.borrow_mut().is_recursive = true;
                self.err(0, format!("circular struct dependency: {}", chain.join(" -> ")));
                let _ = &name;
            }
        }
    }

    // ---- pass 2: statements ----

    fn check_stmt(&mut self, stmt: &mut Stmt) {
        let line = stmt.token.line;
        match &mut stmt.kind {
            StmtKind::ExprStmt(e) => self.check_expr(e),
            StmtKind::VarDecl(name, declared_ty, init) => {
                let resolved_declared = self.resolve_named_type(declared_ty);
                let ty = if let Some(init) = init {
                    self.check_expr(init);
                    if matches!(resolved_declared, Type::Any) {
                        init.ty.clone()
                    } else {
                        if !types_equal(&resolved_declared, &init.ty) && !matches!(init.ty, Type::Any) {
                            self.err(line, format!("cannot assign {} to variable '{name}' of type {resolved_declared}", init.ty));
                        }
                        resolved_declared.clone()
                    }
                } else {
                    resolved_declared.clone()
                };
                *declared_ty = ty.clone();
                self.symtab.add(name, ty, SymbolKind::Local, MemQual::Value);
            }
            StmtKind::Block(stmts) => {
                self.symtab.push_scope();
                for s in stmts {
                    self.check_stmt(s);
                }
                self.symtab.pop_scope();
            }
            StmtKind::If(cond, then_b, elifs, else_b) => {
                self.check_expr(cond);
                self.check_stmt(then_b);
                for (c, b) in elifs {
                    self.check_expr(c);
                    self.check_stmt(b);
                }
                if let Some(b) = else_b {
                    self.check_stmt(b);
                }
            }
            StmtKind::While(cond, body) => {
                self.check_expr(cond);
                self.loop_depth += 1;
                self.check_stmt(body);
                self.loop_depth -= 1;
            }
            StmtKind::For(init, cond, incr, body) => {
                self.symtab.push_scope();
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                if let Some(cond) = cond {
                    self.check_expr(cond);
                }
                if let Some(incr) = incr {
                    self.check_expr(incr);
                }
                self.loop_depth += 1;
                self.check_stmt(body);
                self.loop_depth -= 1;
                self.symtab.pop_scope();
            }
            StmtKind::ForEach(var, iterable, body) => {
                self.check_expr(iterable);
                let elem_ty = match &iterable.ty {
                    Type::Array(elem) => (**elem).clone(),
                    _ => Type::Any,
                };
                self.symtab.push_scope();
                self.symtab.add(var, elem_ty, SymbolKind::Local, MemQual::Value);
                self.loop_depth += 1;
                self.check_stmt(body);
                self.loop_depth -= 1;
                self.symtab.pop_scope();
            }
            StmtKind::Return(value) => {
                let expected = self.current_function_return.last().cloned();
                if let Some(value) = value {
                    self.check_expr(value);
                    value.escape.returned = true;
                    if let Some(&entry_depth) = self.current_function_scope_depth.last() {
                        let mut bases = Vec::new();
                        collect_base_variables(value, &mut bases);
                        let local_to_function = bases.iter().any(|name| {
                            self.symtab
                                .lookup(name)
                                .map(|sym| sym.declared_scope >= entry_depth)
                                .unwrap_or(false)
                        });
                        if local_to_function {
                            value.escape.escapes_scope = true;
                        }
                    }
                    if let Some(expected) = &expected {
                        if !matches!(expected, Type::Any) && !types_equal(expected, &value.ty) && !matches!(value.ty, Type::Any) {
                            self.err(line, format!("return type mismatch: expected {expected}, found {}", value.ty));
                        }
                    }
                } else if let Some(expected) = &expected {
                    if !expected.is_void() {
                        self.err(line, format!("missing return value, expected {expected}"));
                    }
                }
            }
            StmtKind::Break | StmtKind::Continue => {
                if self.loop_depth == 0 {
                    self.err(line, "break/continue outside loop");
                }
            }
            StmtKind::Function { name: _, params, ret, body, .. } => {
                let resolved_ret = self.resolve_named_type(ret);
                *ret = resolved_ret.clone();
                self.symtab.push_scope();
                for p in params.iter_mut() {
                    p.ty = self.resolve_named_type(&p.ty);
                    self.symtab.add(&p.name, p.ty.clone(), SymbolKind::Param, MemQual::Value);
                }
                self.current_function_return.push(resolved_ret);
                self.current_function_scope_depth.push(self.symtab.current_depth());
                self.check_stmt(body);
                self.current_function_scope_depth.pop();
                self.current_function_return.pop();
                self.symtab.pop_scope();
            }
            StmtKind::StructDecl { .. } => {
                // Fully handled during hoisting; defaults are type-checked
                // lazily the first time a struct literal omits that field.
            }
            StmtKind::Import(_) => {}
            StmtKind::Lock(expr, body) => {
                self.check_expr(expr);
                self.check_stmt(body);
            }
        }
    }

    // ---- pass 2: expressions ----

    fn check_expr(&mut self, expr: &mut Expr) {
        let line = expr.token.line;
        let ty = match &mut *expr.kind {
            ExprKind::IntLiteral(_) => Type::Int,
            ExprKind::DoubleLiteral(_) => Type::Double,
            ExprKind::BoolLiteral(_) => Type::Bool,
            ExprKind::CharLiteral(_) => Type::Char,
            ExprKind::StringLiteral(_) => Type::String,
            ExprKind::NilLiteral => Type::Nullable(Box::new(Type::Any)),
            ExprKind::Variable(name) => match self.symtab.lookup(name) {
                Some(sym) => sym.ty.clone(),
                None => {
                    self.err(line, format!("unknown identifier '{name}'"));
                    Type::Any
                }
            },
            ExprKind::Binary(op, l, r) => {
                self.check_expr(l);
                self.check_expr(r);
                self.check_binary(*op, l, r, line)
            }
            ExprKind::Unary(op, operand) => {
                self.check_expr(operand);
                match op {
                    UnOp::Not => Type::Bool,
                    UnOp::Neg => operand.ty.clone(),
                }
            }
            ExprKind::Assign(name, value) => {
                self.check_expr(value);
                match self.symtab.lookup(name) {
                    Some(sym) => sym.ty.clone(),
                    None => {
                        self.err(line, format!("unknown identifier '{name}'"));
                        value.ty.clone()
                    }
                }
            }
            ExprKind::CompoundAssign(target, _, value) => {
                self.check_expr(target);
                self.check_expr(value);
                target.ty.clone()
            }
            ExprKind::IndexAssign(arr, idx, value) => {
                self.check_expr(arr);
                self.check_expr(idx);
                self.check_expr(value);
                match &arr.ty {
                    Type::Array(elem) => (**elem).clone(),
                    _ => value.ty.clone(),
                }
            }
            ExprKind::MemberAccess(obj, field) => {
                self.check_expr(obj);
                self.field_type(&obj.ty, field, line)
            }
            ExprKind::MemberAssign(obj, field, value) => {
                self.check_expr(obj);
                self.check_expr(value);
                let field_ty = self.field_type(&obj.ty, field, line);
                self.run_escape_analysis(obj, value);
                field_ty
            }
            ExprKind::Call(callee, args) => {
                for a in args.iter_mut() {
                    self.check_expr(a);
                }
                self.check_call(callee, args, line)
            }
            ExprKind::StaticCall(_, _, args) => {
                for a in args.iter_mut() {
                    self.check_expr(a);
                }
                Type::Any
            }
            ExprKind::ArrayLiteral(elems) => {
                for e in elems.iter_mut() {
                    self.check_expr(e);
                }
                let elem_ty = elems.first().map(|e| e.ty.clone()).unwrap_or(Type::Any);
                Type::Array(Box::new(elem_ty))
            }
            ExprKind::ArrayAccess(arr, idx) => {
                self.check_expr(arr);
                self.check_expr(idx);
                match &arr.ty {
                    Type::Array(elem) => (**elem).clone(),
                    Type::String => Type::Char,
                    _ => Type::Any,
                }
            }
            ExprKind::ArraySlice(arr, start, end, step) => {
                self.check_expr(arr);
                if let Some(s) = start { self.check_expr(s); }
                if let Some(e) = end { self.check_expr(e); }
                if let Some(s) = step { self.check_expr(s); }
                arr.ty.clone()
            }
            ExprKind::Range(start, end) => {
                self.check_expr(start);
                self.check_expr(end);
                Type::Array(Box::new(Type::Int))
            }
            ExprKind::Spread(inner) => {
                self.check_expr(inner);
                inner.ty.clone()
            }
            ExprKind::Interpolated(parts) => {
                for part in parts.iter_mut() {
                    if let InterpPart::Expr(e) = part {
                        self.check_expr(e);
                    }
                }
                Type::String
            }
            ExprKind::Lambda(params, ret, modifier, body) => {
                let resolved_ret = self.resolve_named_type(ret);
                *ret = resolved_ret.clone();
                self.symtab.push_scope();
                for p in params.iter_mut() {
                    p.ty = self.resolve_named_type(&p.ty);
                    self.symtab.add(&p.name, p.ty.clone(), SymbolKind::Param, MemQual::Value);
                }
                self.current_function_return.push(resolved_ret.clone());
                self.current_function_scope_depth.push(self.symtab.current_depth());
                self.check_stmt(body);
                self.current_function_scope_depth.pop();
                self.current_function_return.pop();
                self.symtab.pop_scope();
                Type::Function {
                    params: params.iter().map(|p| p.ty.clone()).collect(),
                    ret: Box::new(resolved_ret),
                    modifier: *modifier,
                }
            }
            ExprKind::Match(subject, arms) => {
                self.check_expr(subject);
                let mut result_ty = None;
                for arm in arms.iter_mut() {
                    for p in arm.patterns.iter_mut() {
                        self.check_expr(p);
                    }
                    self.check_stmt(&mut arm.body);
                    if let Some(ty) = arm_value_type(&arm.body) {
                        if result_ty.is_none() {
                            result_ty = Some(ty);
                        }
                    }
                }
                result_ty.unwrap_or(Type::Void)
            }
            ExprKind::PreIncrement(e) | ExprKind::PreDecrement(e) | ExprKind::PostIncrement(e) | ExprKind::PostDecrement(e) => {
                self.check_expr(e);
                e.ty.clone()
            }
            ExprKind::StructLiteral(name, fields) => self.check_struct_literal(name, fields, line),
        };
        expr.ty = ty;
        expr.escape.declared_scope = self.symtab.current_depth();
    }

    fn check_binary(&mut self, op: BinOp, l: &Expr, r: &Expr, line: u32) -> Type {
        use BinOp::*;
        match op {
            Eq | Ne | Lt | Le | Gt | Ge | And | Or => Type::Bool,
            Add | Sub | Mul | Div | Rem => {
                if matches!(l.ty, Type::Double | Type::Float) || matches!(r.ty, Type::Double | Type::Float) {
                    Type::Double
                } else if matches!(l.ty, Type::Any) {
                    r.ty.clone()
                } else if matches!(r.ty, Type::Any) {
                    l.ty.clone()
                } else if !types_equal(&l.ty, &r.ty) && op == Add && matches!(l.ty, Type::String) {
                    Type::String
                } else if !types_equal(&l.ty, &r.ty) {
                    self.err(line, format!("type mismatch in binary expression: {} vs {}", l.ty, r.ty));
                    l.ty.clone()
                } else {
                    l.ty.clone()
                }
            }
        }
    }

    fn field_type(&mut self, obj_ty: &Type, field: &str, line: u32) -> Type {
        match obj_ty {
            Type::Struct(s) => {
                let b = s.borrow();
                match b.fields.iter().find(|f| f.name == field) {
                    Some(f) => f.ty.clone(),
                    None => {
                        self.err(line, format!("struct '{}' has no field '{field}'", b.name.as_deref().unwrap_or("?")));
                        Type::Any
                    }
                }
            }
            Type::Any => Type::Any,
            other => {
                self.err(line, format!("cannot access field '{field}' on type {other}"));
                Type::Any
            }
        }
    }

    fn check_call(&mut self, callee: &Expr, args: &[Expr], line: u32) -> Type {
        if let ExprKind::Variable(name) = &*callee.kind {
            if let Some(sig) = self.functions.get(name).cloned() {
                if sig.params.len() != args.len() {
                    self.err(line, format!("'{name}' expects {} arguments, found {}", sig.params.len(), args.len()));
                }
                return sig.ret;
            }
        }
        match &callee.ty {
            Type::Function { ret, .. } => (**ret).clone(),
            _ => Type::Any,
        }
    }

    fn check_struct_literal(&mut self, name: &str, fields: &mut [FieldInit], line: u32) -> Type {
        let Some(handle) = self.structs.get(name).cloned() else {
            self.err(line, format!("unknown struct '{name}'"));
            return Type::Any;
        };
        let field_defs: Vec<TField> = handle.borrow().fields.clone();
        let given: std::collections::HashSet<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        for f in &field_defs {
            if !given.contains(f.name.as_str()) && f.default.is_none() {
                self.err(line, format!("missing required field '{}' in struct literal for '{name}'", f.name));
            }
        }
        for init in fields.iter_mut() {
            self.check_expr(&mut init.value);
            match field_defs.iter().find(|f| f.name == init.name) {
                Some(f) => {
                    if !types_equal(&f.ty, &init.value.ty) && !matches!(init.value.ty, Type::Any) {
                        self.err(line, format!("field '{}' expects {}, found {}", init.name, f.ty, init.value.ty));
                    }
                }
                None => self.err(line, format!("struct '{name}' has no field '{}'", init.name)),
            }
        }
        Type::Struct(handle)
    }

    /// §4.4.3: walks the lhs chain to its base variable's declared scope and
    /// compares against every base variable reachable from the rhs; a rhs
    /// base declared deeper than the lhs base means the value is escaping
    /// to an outer-owned arena.
    fn run_escape_analysis(&mut self, obj: &mut Expr, value: &mut Expr) {
        let Some(lhs_base) = base_variable(obj) else { return };
        let Some(d_lhs) = self.symtab.lookup(&lhs_base).map(|s| s.declared_scope) else { return };
        let mut rhs_bases = Vec::new();
        collect_base_variables(value, &mut rhs_bases);
        let mut escapes = false;
        for name in rhs_bases {
            if let Some(sym) = self.symtab.lookup(&name) {
                if sym.declared_scope > d_lhs {
                    escapes = true;
                }
            }
        }
        if escapes {
            value.escape.escapes_scope = true;
            mark_chain_escaped(obj);
        }
    }
}

fn arm_value_type(body: &Stmt) -> Option<Type> {
    match &body.kind {
        StmtKind::ExprStmt(e) => Some(e.ty.clone()),
        StmtKind::Block(stmts) => stmts.last().and_then(arm_value_type),
        _ => None,
    }
}

fn base_variable(expr: &Expr) -> Option<String> {
    match &*expr.kind {
        ExprKind::Variable(name) => Some(name.clone()),
        ExprKind::MemberAccess(obj, _) => base_variable(obj),
        ExprKind::ArrayAccess(arr, _) => base_variable(arr),
        _ => None,
    }
}

fn collect_base_variables(expr: &Expr, out: &mut Vec<String>) {
    match &*expr.kind {
        ExprKind::Variable(name) => out.push(name.clone()),
        ExprKind::MemberAccess(obj, _) => collect_base_variables(obj, out),
        ExprKind::ArrayAccess(arr, idx) => {
            collect_base_variables(arr, out);
            collect_base_variables(idx, out);
        }
        ExprKind::Binary(_, l, r) => {
            collect_base_variables(l, out);
            collect_base_variables(r, out);
        }
        ExprKind::Call(_, args) => {
            for a in args {
                collect_base_variables(a, out);
            }
        }
        _ => {}
    }
}

fn mark_chain_escaped(expr: &mut Expr) {
    if let ExprKind::MemberAccess(obj, _) = &mut *expr.kind {
        expr.escape.escapes_scope = true;
        mark_chain_escaped(obj);
    }
}

fn builtin_functions() -> HashMap<String, FunctionSig> {
    let mut m = HashMap::new();
    m.insert("print".into(), FunctionSig { params: vec![Type::Any], ret: Type::Void, modifier: Modifier::Native });
    m.insert("range".into(), FunctionSig { params: vec![Type::Int, Type::Int], ret: Type::Array(Box::new(Type::Int)), modifier: Modifier::Native });
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn check(src: &str) -> Vec<CompileError> {
        let (tokens, lex_errs) = Lexer::new(src, "t.sn").tokenize();
        assert!(lex_errs.is_empty());
        let (mut module, parse_errs) = Parser::new(tokens, "t.sn", None).parse_module();
        assert!(parse_errs.is_empty(), "{parse_errs:?}");
        match TypeChecker::new("t.sn").check(&mut module) {
            Ok(()) => Vec::new(),
            Err(errs) => errs,
        }
    }

    #[test]
    fn unknown_identifier_reported() {
        let errs = check("var x = y\n");
        assert!(errs.iter().any(|e| e.message.contains("unknown identifier")));
    }

    #[test]
    fn circular_struct_without_pointer_fails() {
        let errs = check("struct N { v: int, n: N }\n");
        assert!(errs.iter().any(|e| e.message.contains("circular")), "{errs:?}");
    }

    #[test]
    fn pointer_breaks_struct_cycle() {
        let errs = check("struct N { v: int, n: *N }\n");
        assert!(errs.is_empty(), "{errs:?}");
    }

    #[test]
    fn break_outside_loop_is_an_error() {
        let errs = check("break\n");
        assert!(errs.iter().any(|e| e.message.contains("outside loop")));
    }

    #[test]
    fn struct_literal_missing_required_field() {
        let errs = check("struct Point { x: double, y: double = 0.0 }\nvar p = Point { }\n");
        assert!(errs.iter().any(|e| e.message.contains("missing required field")), "{errs:?}");
    }

    #[test]
    fn struct_defaults_allow_empty_literal_with_defaults_only() {
        let errs = check("struct Point { x: double = 0.0, y: double = 0.0 }\nvar p = Point { }\n");
        assert!(errs.is_empty(), "{errs:?}");
    }
}
