//! Pattern matching (spec §4.7.3).
//!
//! `match` lowers to a GCC statement expression: the subject is evaluated
//! once into a temporary, then an `if`/`else if` chain tests each arm's
//! (possibly disjunctive) pattern list against it, falling through to the
//! `else` arm. Each arm's last statement, if it's an expression statement,
//! supplies the arm's value; the whole thing evaluates to a result
//! temporary so `match` can be used in expression position.

use crate::ast::{Expr, MatchArm, StmtKind};
use crate::codegen::error::CodeGenError;
use crate::codegen::expr::emit_expr;
use crate::codegen::state::{c_type, CodeGen};
use crate::codegen::stmt::emit_stmt;
use crate::types::Type;

pub fn emit_match(cg: &mut CodeGen, subject: &Expr, arms: &[MatchArm], result_ty: &Type) -> Result<String, CodeGenError> {
    let subj_tmp = cg.fresh_temp("match_subj");
    let result_tmp = cg.fresh_temp("match_res");
    let subj_c = emit_expr(cg, subject)?;
    let subj_ty = subject.ty.clone();

    let mut body = format!(
        "{sty} {subj_tmp} = {subj_c}; {rty} {result_tmp};\n",
        sty = c_type(&subj_ty),
        rty = c_type(result_ty)
    );

    let mut wrote_if = false;
    for arm in arms {
        if arm.is_else {
            continue;
        }
        let mut conds = Vec::with_capacity(arm.patterns.len());
        for pat in &arm.patterns {
            conds.push(emit_pattern_test(cg, &subj_tmp, &subj_ty, pat)?);
        }
        let keyword = if wrote_if { "else if" } else { "if" };
        wrote_if = true;
        body.push_str(&format!("{keyword} ({}) {{\n", conds.join(" || ")));
        body.push_str(&emit_arm_body(cg, &arm.body, &result_tmp)?);
        body.push_str("}\n");
    }

    if let Some(else_arm) = arms.iter().find(|a| a.is_else) {
        let keyword = if wrote_if { "else" } else { "if (1)" };
        body.push_str(&format!("{keyword} {{\n"));
        body.push_str(&emit_arm_body(cg, &else_arm.body, &result_tmp)?);
        body.push_str("}\n");
    }

    body.push_str(&format!("{result_tmp};\n"));
    Ok(format!("({{ {body}}})"))
}

fn emit_pattern_test(cg: &mut CodeGen, subj_tmp: &str, subj_ty: &Type, pattern: &Expr) -> Result<String, CodeGenError> {
    let pat_c = emit_expr(cg, pattern)?;
    if matches!(subj_ty, Type::String) {
        return Ok(format!("rt_eq_string({}, {subj_tmp}, {pat_c})", cg.current_arena_var));
    }
    Ok(format!("({subj_tmp} == {pat_c})"))
}

/// Runs the arm body for its side effects, then assigns the value of its
/// last expression-statement (if any) into `result_tmp` — the same "last
/// statement is the value" rule §4.7.3 uses for arm bodies.
fn emit_arm_body(cg: &mut CodeGen, body: &crate::ast::Stmt, result_tmp: &str) -> Result<String, CodeGenError> {
    let stmts: Vec<&crate::ast::Stmt> = match &body.kind {
        StmtKind::Block(stmts) => stmts.iter().collect(),
        _ => vec![body],
    };

    let mut out = String::new();
    cg.symtab.push_scope();
    for (i, s) in stmts.iter().enumerate() {
        if i + 1 == stmts.len() {
            if let StmtKind::ExprStmt(e) = &s.kind {
                let val = emit_expr(cg, e)?;
                out.push_str(&format!("{result_tmp} = {val};\n"));
                continue;
            }
        }
        out.push_str(&emit_stmt(cg, s)?);
    }
    cg.symtab.pop_scope();
    Ok(out)
}
