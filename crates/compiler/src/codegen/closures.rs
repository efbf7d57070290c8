//! Lambdas and closures (spec §4.7.2).
//!
//! A lambda body is lifted to a top-level C function named
//! `__lambda_<id>__` taking a `void *__closure__` as its first parameter
//! (dropped for `native` lambdas, which may not capture). Its free
//! variables — identifiers used in the body that are neither parameters nor
//! locals it declares itself, found transitively through nested lambdas —
//! become fields of a generated closure-record struct laid out as
//! `{ fn, arena, size, T_1 c_1, ... }`; a captureless lambda still gets the
//! three-field header so every closure value has a uniform prefix callers
//! can read without knowing which lambda produced it.

use crate::ast::{Expr, ExprKind, Param, Stmt, StmtKind};
use crate::codegen::error::CodeGenError;
use crate::codegen::state::{c_type, CodeGen, LambdaInfo};
use crate::codegen::stmt::emit_stmt;
use crate::types::{Modifier, Type};
use std::collections::BTreeSet;

const CLOSURE_HEADER: &str = "void *fn; RtArena *arena; uint64_t size;";

pub fn emit_lambda_expr(
    cg: &mut CodeGen,
    params: &[Param],
    ret: &Type,
    body: &Stmt,
    modifier: Modifier,
) -> Result<String, CodeGenError> {
    let id = cg.fresh_lambda_id();
    let captures = collect_captures(cg, params, body);

    let info = LambdaInfo {
        id,
        params: params.to_vec(),
        ret: ret.clone(),
        modifier,
        captures: captures.clone(),
    };

    let fn_name = format!("__lambda_{id}__");
    let struct_name = format!("struct __closure_{id}__");
    let native = matches!(modifier, Modifier::Native);

    let mut param_list = String::new();
    if !native {
        param_list.push_str("void *__closure__");
    }
    for p in params {
        if !param_list.is_empty() {
            param_list.push_str(", ");
        }
        param_list.push_str(&format!("{} {}", c_type(&p.ty), CodeGen::mangle(&p.name)));
    }
    let ret_c = c_type(ret);
    cg.lambda_fwd.push_str(&format!("static {ret_c} {fn_name}({param_list});\n"));

    if !native && !captures.is_empty() {
        let mut fields = String::new();
        for (name, ty) in &captures {
            fields.push_str(&format!("{} *{};", c_type(ty), CodeGen::mangle(name)));
        }
        cg.lambda_fwd.push_str(&format!("{struct_name} {{ {CLOSURE_HEADER} {fields} }};\n"));
    } else if !native {
        cg.lambda_fwd.push_str(&format!("{struct_name} {{ {CLOSURE_HEADER} }};\n"));
    }

    let saved_arena = cg.current_arena_var.clone();
    let saved_function = cg.current_function.take();
    let saved_return = std::mem::replace(&mut cg.current_return_type, ret.clone());
    cg.enclosing_lambdas.push(info);
    cg.caller_arena_stack.push(saved_arena.clone());
    cg.symtab.push_scope();
    if modifier == Modifier::Private {
        cg.current_arena_var = cg.fresh_temp("lambda_arena");
    }
    for p in params {
        cg.symtab.add(&p.name, p.ty.clone(), crate::symtab::SymbolKind::Param, crate::symtab::MemQual::Value);
    }
    for (name, ty) in &captures {
        cg.symtab.add(name, ty.clone(), crate::symtab::SymbolKind::Capture, crate::symtab::MemQual::AsRef);
    }

    let mut fn_body = String::new();
    if !native && !captures.is_empty() {
        fn_body.push_str(&format!("{struct_name} *__c__ = ({struct_name}*)__closure__;\n"));
        for (name, _) in &captures {
            let m = CodeGen::mangle(name);
            fn_body.push_str(&format!("#define {m} (*__c__->{m})\n"));
        }
    }
    if modifier == Modifier::Private {
        fn_body.push_str(&format!(
            "RtArena *{} = rt_arena_create(0);\n",
            cg.current_arena_var
        ));
    }
    let body_code = emit_stmt(cg, body)?;
    fn_body.push_str(&body_code);
    if !native && !captures.is_empty() {
        for (name, _) in &captures {
            fn_body.push_str(&format!("#undef {}\n", CodeGen::mangle(name)));
        }
    }

    cg.lambda_defs.push_str(&format!("static {ret_c} {fn_name}({param_list}) {{\n{fn_body}}}\n"));

    cg.symtab.pop_scope();
    cg.enclosing_lambdas.pop();
    cg.caller_arena_stack.pop();
    cg.current_function = saved_function;
    cg.current_return_type = saved_return;
    cg.current_arena_var = saved_arena;

    // Build the closure record literal at the capture site, in the caller's arena.
    let rec_tmp = cg.fresh_temp("closure");
    let mut init = format!(
        "{struct_name} *{rec_tmp} = ({struct_name}*)rt_arena_alloc({arena}, sizeof({struct_name})); {rec_tmp}->fn = (void*){fn_name}; {rec_tmp}->arena = {arena}; {rec_tmp}->size = sizeof({struct_name}); ",
        arena = cg.current_arena_var
    );
    for (name, _) in &captures {
        let m = CodeGen::mangle(name);
        init.push_str(&format!("{rec_tmp}->{m} = &{m}; "));
    }
    init.push_str(&format!("(SnClosure*){rec_tmp}; "));
    Ok(format!("({{ {init}}})"))
}

pub fn emit_call_through_closure(cg: &mut CodeGen, callee: &Expr, args: &[Expr]) -> Result<String, CodeGenError> {
    let (params, ret) = match &callee.ty {
        Type::Function { params, ret, .. } => (params.clone(), (**ret).clone()),
        _ => return Err(CodeGenError::new("call target is not a function value")),
    };
    let callee_c = crate::codegen::expr::emit_expr(cg, callee)?;
    let mut param_types = String::from("void*");
    for p in &params {
        param_types.push_str(", ");
        param_types.push_str(&c_type(p));
    }
    let ret_c = c_type(&ret);
    let mut arg_strs = Vec::with_capacity(args.len() + 1);
    for a in args {
        arg_strs.push(crate::codegen::expr::emit_expr(cg, a)?);
    }
    let clos_tmp = cg.fresh_temp("clos");
    let mut call = format!("({{ SnClosure *{clos_tmp} = {callee_c}; ");
    call.push_str(&format!(
        "(({ret_c}(*)({param_types})){clos_tmp}->fn)({clos_tmp}",
    ));
    for a in &arg_strs {
        call.push_str(", ");
        call.push_str(a);
    }
    call.push_str("); }})");
    Ok(call)
}

/// Free variables of `body`: identifiers read but not bound by `params` or
/// any `VarDecl`/loop binder inside it, walked recursively through nested
/// lambdas (a capture of an outer lambda's capture is still a capture of
/// this one, spec §4.7.2 "transitively through nested lambdas").
fn collect_captures(cg: &CodeGen, params: &[Param], body: &Stmt) -> Vec<(String, Type)> {
    let mut bound: BTreeSet<String> = params.iter().map(|p| p.name.clone()).collect();
    let mut free = BTreeSet::new();
    walk_stmt_for_captures(body, &mut bound, &mut free);

    free.into_iter()
        .filter_map(|name| cg.symtab.lookup(&name).map(|sym| (name, sym.ty.clone())))
        .collect()
}

fn walk_stmt_for_captures(stmt: &Stmt, bound: &mut BTreeSet<String>, free: &mut BTreeSet<String>) {
    match &stmt.kind {
        StmtKind::ExprStmt(e) => walk_expr_for_captures(e, bound, free),
        StmtKind::VarDecl(name, _, init) => {
            if let Some(e) = init {
                walk_expr_for_captures(e, bound, free);
            }
            bound.insert(name.clone());
        }
        StmtKind::Block(stmts) => {
            let mut inner = bound.clone();
            for s in stmts {
                walk_stmt_for_captures(s, &mut inner, free);
            }
        }
        StmtKind::If(cond, then, elifs, els) => {
            walk_expr_for_captures(cond, bound, free);
            walk_stmt_for_captures(then, &mut bound.clone(), free);
            for (c, s) in elifs {
                walk_expr_for_captures(c, bound, free);
                walk_stmt_for_captures(s, &mut bound.clone(), free);
            }
            if let Some(s) = els {
                walk_stmt_for_captures(s, &mut bound.clone(), free);
            }
        }
        StmtKind::While(cond, body) => {
            walk_expr_for_captures(cond, bound, free);
            walk_stmt_for_captures(body, &mut bound.clone(), free);
        }
        StmtKind::For(init, cond, incr, body) => {
            let mut inner = bound.clone();
            if let Some(s) = init {
                walk_stmt_for_captures(s, &mut inner, free);
            }
            if let Some(c) = cond {
                walk_expr_for_captures(c, &inner, free);
            }
            if let Some(i) = incr {
                walk_expr_for_captures(i, &inner, free);
            }
            walk_stmt_for_captures(body, &mut inner, free);
        }
        StmtKind::ForEach(name, iterable, body) => {
            walk_expr_for_captures(iterable, bound, free);
            let mut inner = bound.clone();
            inner.insert(name.clone());
            walk_stmt_for_captures(body, &mut inner, free);
        }
        StmtKind::Return(Some(e)) => walk_expr_for_captures(e, bound, free),
        StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue | StmtKind::Import(_) => {}
        StmtKind::Function { .. } | StmtKind::StructDecl { .. } => {}
        StmtKind::Lock(e, body) => {
            walk_expr_for_captures(e, bound, free);
            walk_stmt_for_captures(body, &mut bound.clone(), free);
        }
    }
}

fn walk_expr_for_captures(expr: &Expr, bound: &BTreeSet<String>, free: &mut BTreeSet<String>) {
    match &*expr.kind {
        ExprKind::Variable(name) | ExprKind::Assign(name, _) => {
            if !bound.contains(name) {
                free.insert(name.clone());
            }
            if let ExprKind::Assign(_, v) = &*expr.kind {
                walk_expr_for_captures(v, bound, free);
            }
        }
        ExprKind::Binary(_, l, r) | ExprKind::Range(l, r) => {
            walk_expr_for_captures(l, bound, free);
            walk_expr_for_captures(r, bound, free);
        }
        ExprKind::Unary(_, e)
        | ExprKind::Spread(e)
        | ExprKind::PreIncrement(e)
        | ExprKind::PreDecrement(e)
        | ExprKind::PostIncrement(e)
        | ExprKind::PostDecrement(e) => walk_expr_for_captures(e, bound, free),
        ExprKind::CompoundAssign(t, _, v) => {
            walk_expr_for_captures(t, bound, free);
            walk_expr_for_captures(v, bound, free);
        }
        ExprKind::IndexAssign(a, i, v) => {
            walk_expr_for_captures(a, bound, free);
            walk_expr_for_captures(i, bound, free);
            walk_expr_for_captures(v, bound, free);
        }
        ExprKind::MemberAccess(o, _) => walk_expr_for_captures(o, bound, free),
        ExprKind::MemberAssign(o, _, v) => {
            walk_expr_for_captures(o, bound, free);
            walk_expr_for_captures(v, bound, free);
        }
        ExprKind::Call(callee, args) => {
            walk_expr_for_captures(callee, bound, free);
            for a in args {
                walk_expr_for_captures(a, bound, free);
            }
        }
        ExprKind::StaticCall(_, _, args) | ExprKind::ArrayLiteral(args) => {
            for a in args {
                walk_expr_for_captures(a, bound, free);
            }
        }
        ExprKind::ArrayAccess(a, i) => {
            walk_expr_for_captures(a, bound, free);
            walk_expr_for_captures(i, bound, free);
        }
        ExprKind::ArraySlice(a, s, e, st) => {
            walk_expr_for_captures(a, bound, free);
            for opt in [s, e, st] {
                if let Some(x) = opt {
                    walk_expr_for_captures(x, bound, free);
                }
            }
        }
        ExprKind::Interpolated(parts) => {
            for p in parts {
                if let crate::ast::InterpPart::Expr(e) = p {
                    walk_expr_for_captures(e, bound, free);
                }
            }
        }
        ExprKind::Lambda(params, _, _, body) => {
            let mut inner = bound.clone();
            for p in params {
                inner.insert(p.name.clone());
            }
            walk_stmt_for_captures(body, &mut inner, free);
        }
        ExprKind::Match(subject, arms) => {
            walk_expr_for_captures(subject, bound, free);
            for arm in arms {
                for p in &arm.patterns {
                    walk_expr_for_captures(p, bound, free);
                }
                walk_stmt_for_captures(&arm.body, &mut bound.clone(), free);
            }
        }
        ExprKind::StructLiteral(_, fields) => {
            for f in fields {
                walk_expr_for_captures(&f.value, bound, free);
            }
        }
        ExprKind::IntLiteral(_)
        | ExprKind::DoubleLiteral(_)
        | ExprKind::BoolLiteral(_)
        | ExprKind::CharLiteral(_)
        | ExprKind::StringLiteral(_)
        | ExprKind::NilLiteral => {}
    }
}
