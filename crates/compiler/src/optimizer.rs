//! AST-to-AST rewrites that run once type checking has succeeded (§4.5).
//! Every pass is purely syntactic and, by construction, never changes
//! observable behavior: rewrites only fire when side-effect-freedom can be
//! proven locally (literal or bare variable operands).

use crate::ast::*;
use crate::types::Modifier;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptLevel {
    None,
    Basic,
    Full,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OptimizerStats {
    pub statements_removed: usize,
    pub variables_removed: usize,
    pub no_ops_simplified: usize,
    pub strings_merged: usize,
}

pub struct Optimizer {
    level: OptLevel,
    stats: OptimizerStats,
}

impl Optimizer {
    pub fn new(level: OptLevel) -> Self {
        Optimizer { level, stats: OptimizerStats::default() }
    }

    pub fn run(mut self, module: &mut Module) -> OptimizerStats {
        if self.level == OptLevel::None {
            return self.stats;
        }
        for stmt in &mut module.stmts {
            self.opt_stmt(stmt, None);
        }
        self.stats
    }

    fn opt_stmt(&mut self, stmt: &mut Stmt, enclosing_fn: Option<&str>) {
        match &mut stmt.kind {
            StmtKind::Block(stmts) => {
                self.eliminate_dead_code(stmts);
                self.eliminate_unused_vars(stmts);
                for s in stmts.iter_mut() {
                    self.opt_stmt(s, enclosing_fn);
                }
            }
            StmtKind::If(cond, then_b, elifs, else_b) => {
                self.opt_expr(cond);
                self.opt_stmt(then_b, enclosing_fn);
                for (c, b) in elifs {
                    self.opt_expr(c);
                    self.opt_stmt(b, enclosing_fn);
                }
                if let Some(b) = else_b {
                    self.opt_stmt(b, enclosing_fn);
                }
            }
            StmtKind::While(cond, body) => {
                self.opt_expr(cond);
                self.opt_stmt(body, enclosing_fn);
            }
            StmtKind::For(init, cond, incr, body) => {
                if let Some(init) = init {
                    self.opt_stmt(init, enclosing_fn);
                }
                if let Some(cond) = cond {
                    self.opt_expr(cond);
                }
                if let Some(incr) = incr {
                    self.opt_expr(incr);
                }
                self.opt_stmt(body, enclosing_fn);
            }
            StmtKind::ForEach(_, iterable, body) => {
                self.opt_expr(iterable);
                self.opt_stmt(body, enclosing_fn);
            }
            StmtKind::ExprStmt(e) => self.opt_expr(e),
            StmtKind::VarDecl(_, _, Some(init)) => self.opt_expr(init),
            StmtKind::Return(Some(value)) => {
                self.opt_expr(value);
                if self.level == OptLevel::Full {
                    self.try_mark_tail_call(value, enclosing_fn);
                }
            }
            StmtKind::Function { name, body, .. } => self.opt_stmt(body, Some(name)),
            StmtKind::Lock(expr, body) => {
                self.opt_expr(expr);
                self.opt_stmt(body, enclosing_fn);
            }
            _ => {}
        }
    }

    fn opt_expr(&mut self, expr: &mut Expr) {
        match &mut *expr.kind {
            ExprKind::Binary(op, l, r) => {
                self.opt_expr(l);
                self.opt_expr(r);
                if let Some(replacement) = algebraic_noop(*op, l, r) {
                    *expr = replacement;
                }
            }
            ExprKind::Unary(op, operand) => {
                self.opt_expr(operand);
                if let Some(replacement) = double_unary_noop(*op, operand) {
                    *expr = replacement;
                }
            }
            ExprKind::Interpolated(parts) => {
                for part in parts.iter_mut() {
                    if let InterpPart::Expr(e) = part {
                        self.opt_expr(e);
                    }
                }
                self.merge_adjacent_string_parts(parts);
            }
            ExprKind::Call(callee, args) => {
                self.opt_expr(callee);
                for a in args.iter_mut() {
                    self.opt_expr(a);
                }
            }
            ExprKind::ArrayLiteral(elems) => {
                for e in elems.iter_mut() {
                    self.opt_expr(e);
                }
            }
            ExprKind::ArrayAccess(arr, idx) => {
                self.opt_expr(arr);
                self.opt_expr(idx);
            }
            ExprKind::MemberAccess(obj, _) => self.opt_expr(obj),
            ExprKind::MemberAssign(obj, _, value) => {
                self.opt_expr(obj);
                self.opt_expr(value);
            }
            ExprKind::Assign(_, value) | ExprKind::CompoundAssign(_, _, value) => self.opt_expr(value),
            ExprKind::Lambda(_, _, _, body) => self.opt_stmt(body, None),
            ExprKind::Match(subject, arms) => {
                self.opt_expr(subject);
                for arm in arms.iter_mut() {
                    self.opt_stmt(&mut arm.body, None);
                }
            }
            _ => {}
        }
    }

    fn eliminate_dead_code(&mut self, stmts: &mut Vec<Stmt>) {
        if let Some(pos) = stmts.iter().position(|s| matches!(s.kind, StmtKind::Return(_) | StmtKind::Break | StmtKind::Continue)) {
            let removed = stmts.len() - (pos + 1);
            if removed > 0 {
                self.stats.statements_removed += removed;
                stmts.truncate(pos + 1);
            }
        }
    }

    /// Conservative: a variable is kept if its name appears anywhere in any
    /// textual use in the containing block, including inside a nested
    /// lambda, so capture-by-reference is never mistaken for dead code.
    fn eliminate_unused_vars(&mut self, stmts: &mut Vec<Stmt>) {
        let mut removed = 0;
        let snapshot = stmts.clone();
        stmts.retain(|s| {
            if let StmtKind::VarDecl(name, _, _) = &s.kind {
                let mut used = HashSet::new();
                for other in stmts_excluding(&snapshot, s) {
                    collect_used_names(other, &mut used);
                }
                if !used.contains(name) {
                    removed += 1;
                    return false;
                }
            }
            true
        });
        self.stats.variables_removed += removed;
    }

    fn merge_adjacent_string_parts(&mut self, parts: &mut Vec<InterpPart>) {
        let mut merged = Vec::with_capacity(parts.len());
        for part in parts.drain(..) {
            match (merged.last_mut(), &part) {
                (Some(InterpPart::Literal(prev)), InterpPart::Literal(next)) => {
                    prev.push_str(next);
                    self.stats.strings_merged += 1;
                }
                _ => merged.push(part),
            }
        }
        *parts = merged;
    }

}

fn is_side_effect_free(e: &Expr) -> bool {
    matches!(
        &*e.kind,
        ExprKind::IntLiteral(_)
            | ExprKind::DoubleLiteral(_)
            | ExprKind::BoolLiteral(_)
            | ExprKind::CharLiteral(_)
            | ExprKind::StringLiteral(_)
            | ExprKind::Variable(_)
    )
}

fn algebraic_noop(op: BinOp, l: &Expr, r: &Expr) -> Option<Expr> {
    if !is_side_effect_free(l) || !is_side_effect_free(r) {
        return None;
    }
    let is_zero = |e: &Expr| matches!(&*e.kind, ExprKind::IntLiteral(0)) || matches!(&*e.kind, ExprKind::DoubleLiteral(v) if *v == 0.0);
    let is_one = |e: &Expr| matches!(&*e.kind, ExprKind::IntLiteral(1)) || matches!(&*e.kind, ExprKind::DoubleLiteral(v) if *v == 1.0);
    match op {
        BinOp::Add if is_zero(r) => Some(l.clone()),
        BinOp::Add if is_zero(l) => Some(r.clone()),
        BinOp::Sub if is_zero(r) => Some(l.clone()),
        BinOp::Mul if is_one(r) => Some(l.clone()),
        BinOp::Mul if is_one(l) => Some(r.clone()),
        BinOp::Div if is_one(r) => Some(l.clone()),
        _ => None,
    }
}

fn double_unary_noop(op: UnOp, operand: &Expr) -> Option<Expr> {
    match (&*operand.kind, op) {
        (ExprKind::Unary(UnOp::Not, inner), UnOp::Not) => Some((**inner).clone()),
        (ExprKind::Unary(UnOp::Neg, inner), UnOp::Neg) => Some((**inner).clone()),
        _ => None,
    }
}

fn collect_used_names(stmt: &Stmt, out: &mut HashSet<String>) {
    match &stmt.kind {
        StmtKind::ExprStmt(e) => collect_expr_names(e, out),
        StmtKind::VarDecl(_, _, init) => {
            if let Some(e) = init {
                collect_expr_names(e, out);
            }
        }
        StmtKind::Block(stmts) => stmts.iter().for_each(|s| collect_used_names(s, out)),
        StmtKind::If(cond, then_b, elifs, else_b) => {
            collect_expr_names(cond, out);
            collect_used_names(then_b, out);
            for (c, b) in elifs {
                collect_expr_names(c, out);
                collect_used_names(b, out);
            }
            if let Some(b) = else_b {
                collect_used_names(b, out);
            }
        }
        StmtKind::While(cond, body) => {
            collect_expr_names(cond, out);
            collect_used_names(body, out);
        }
        StmtKind::For(init, cond, incr, body) => {
            if let Some(i) = init {
                collect_used_names(i, out);
            }
            if let Some(c) = cond {
                collect_expr_names(c, out);
            }
            if let Some(i) = incr {
                collect_expr_names(i, out);
            }
            collect_used_names(body, out);
        }
        StmtKind::ForEach(_, iterable, body) => {
            collect_expr_names(iterable, out);
            collect_used_names(body, out);
        }
        StmtKind::Return(Some(e)) => collect_expr_names(e, out),
        StmtKind::Function { body, .. } => collect_used_names(body, out),
        StmtKind::Lock(e, body) => {
            collect_expr_names(e, out);
            collect_used_names(body, out);
        }
        _ => {}
    }
}

fn collect_expr_names(expr: &Expr, out: &mut HashSet<String>) {
    match &*expr.kind {
        ExprKind::Variable(name) | ExprKind::Assign(name, _) => {
            out.insert(name.clone());
            if let ExprKind::Assign(_, value) = &*expr.kind {
                collect_expr_names(value, out);
            }
        }
        ExprKind::Binary(_, l, r) => {
            collect_expr_names(l, out);
            collect_expr_names(r, out);
        }
        ExprKind::Unary(_, e) | ExprKind::Spread(e) | ExprKind::PreIncrement(e) | ExprKind::PreDecrement(e) | ExprKind::PostIncrement(e) | ExprKind::PostDecrement(e) => {
            collect_expr_names(e, out)
        }
        ExprKind::CompoundAssign(t, _, v) => {
            collect_expr_names(t, out);
            collect_expr_names(v, out);
        }
        ExprKind::IndexAssign(a, i, v) => {
            collect_expr_names(a, out);
            collect_expr_names(i, out);
            collect_expr_names(v, out);
        }
        ExprKind::MemberAccess(obj, _) => collect_expr_names(obj, out),
        ExprKind::MemberAssign(obj, _, v) => {
            collect_expr_names(obj, out);
            collect_expr_names(v, out);
        }
        ExprKind::Call(callee, args) => {
            collect_expr_names(callee, out);
            args.iter().for_each(|a| collect_expr_names(a, out));
        }
        ExprKind::StaticCall(_, _, args) => args.iter().for_each(|a| collect_expr_names(a, out)),
        ExprKind::ArrayLiteral(elems) => elems.iter().for_each(|e| collect_expr_names(e, out)),
        ExprKind::ArrayAccess(a, i) => {
            collect_expr_names(a, out);
            collect_expr_names(i, out);
        }
        ExprKind::ArraySlice(a, s, e, st) => {
            collect_expr_names(a, out);
            [s, e, st].into_iter().flatten().for_each(|x| collect_expr_names(x, out));
        }
        ExprKind::Range(s, e) => {
            collect_expr_names(s, out);
            collect_expr_names(e, out);
        }
        ExprKind::Interpolated(parts) => parts.iter().for_each(|p| {
            if let InterpPart::Expr(e) = p {
                collect_expr_names(e, out);
            }
        }),
        ExprKind::Lambda(_, _, _, body) => collect_used_names(body, out),
        ExprKind::Match(subject, arms) => {
            collect_expr_names(subject, out);
            for arm in arms {
                arm.patterns.iter().for_each(|p| collect_expr_names(p, out));
                collect_used_names(&arm.body, out);
            }
        }
        ExprKind::StructLiteral(_, fields) => fields.iter().for_each(|f| collect_expr_names(&f.value, out)),
        _ => {}
    }
}

fn stmts_excluding<'a, 'b>(stmts: &'a [Stmt], excluded: &'b Stmt) -> impl Iterator<Item = &'a Stmt> + use<'a, 'b> {
    stmts.iter().filter(move |s| !std::ptr::eq(*s, excluded))
}

pub fn is_native_modifier(m: Modifier) -> bool {
    matches!(m, Modifier::Native)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn optimize(src: &str, level: OptLevel) -> (Module, OptimizerStats) {
        let (tokens, _) = Lexer::new(src, "t.sn").tokenize();
        let (mut module, errs) = Parser::new(tokens, "t.sn", None).parse_module();
        assert!(errs.is_empty(), "{errs:?}");
        let stats = Optimizer::new(level).run(&mut module);
        (module, stats)
    }

    #[test]
    fn dead_code_after_return_is_removed() {
        let (module, stats) = optimize("fn f() => { return 1\nprint(2) }\n", OptLevel::Basic);
        assert_eq!(stats.statements_removed, 1);
        if let StmtKind::Function { body, .. } = &module.stmts[0].kind {
            if let StmtKind::Block(stmts) = &body.kind {
                assert_eq!(stmts.len(), 1);
            }
        }
    }

    #[test]
    fn unused_variable_is_removed() {
        let (_, stats) = optimize("fn f() => { var unused = 1\nprint(2) }\n", OptLevel::Basic);
        assert_eq!(stats.variables_removed, 1);
    }

    #[test]
    fn no_optimization_at_level_none() {
        let (_, stats) = optimize("fn f() => { return 1\nprint(2) }\n", OptLevel::None);
        assert_eq!(stats.statements_removed, 0);
    }
}
