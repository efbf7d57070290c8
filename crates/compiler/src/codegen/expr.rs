//! Expression emission (spec §4.7, Handle ABI §4.7.1).
//!
//! Every array-mutating call (`push`, `pop`, `ins`, `rem`) returns a
//! possibly-new handle that the caller must rebind; `emit_expr` handles the
//! common case (the receiver is a plain variable) by wrapping the call in a
//! GCC statement expression that performs the rebind as a side effect and
//! yields the popped value or old handle where the surface syntax expects
//! one. Chained mutation on a non-lvalue receiver is rejected by the type
//! checker's assignment-target check before codegen ever sees it.

use crate::ast::{BinOp, Expr, ExprKind, InterpPart, UnOp};
use crate::codegen::closures::emit_call_through_closure;
use crate::codegen::error::CodeGenError;
use crate::codegen::patterns::emit_match;
use crate::codegen::state::{array_suffix, c_type, CodeGen};
use crate::types::Type;

const MUTATING_REBIND_METHODS: &[&str] = &["push", "pop", "ins", "rem"];

pub fn emit_expr(cg: &mut CodeGen, e: &Expr) -> Result<String, CodeGenError> {
    match &*e.kind {
        ExprKind::IntLiteral(v) => Ok(format!("INT64_C({v})")),
        ExprKind::DoubleLiteral(v) => Ok(format!("{v:?}")),
        ExprKind::BoolLiteral(v) => Ok(if *v { "1".to_string() } else { "0".to_string() }),
        ExprKind::CharLiteral(c) => Ok(format!("'{}'", escape_char(*c))),
        ExprKind::StringLiteral(s) => Ok(emit_string_literal(cg, s)),
        ExprKind::NilLiteral => Ok("0".to_string()),
        ExprKind::Variable(name) => Ok(CodeGen::mangle(name)),

        ExprKind::Binary(op, l, r) => emit_binary(cg, *op, l, r, &e.ty),
        ExprKind::Unary(op, operand) => emit_unary(cg, *op, operand),

        ExprKind::Assign(target, value) => {
            let lhs = CodeGen::mangle(target);
            let rhs = emit_promoted_value(cg, value)?;
            Ok(format!("({lhs} = {rhs})"))
        }
        ExprKind::CompoundAssign(target, op, value) => {
            let lhs = emit_expr(cg, target)?;
            let rhs = emit_expr(cg, value)?;
            let sym = match op {
                crate::ast::CompoundOp::Add => "+",
                crate::ast::CompoundOp::Sub => "-",
                crate::ast::CompoundOp::Mul => "*",
                crate::ast::CompoundOp::Div => "/",
            };
            Ok(format!("({lhs} = {lhs} {sym} {rhs})"))
        }
        ExprKind::IndexAssign(arr, idx, value) => emit_index_assign(cg, arr, idx, value),

        ExprKind::MemberAccess(obj, field) => {
            let obj_c = emit_expr(cg, obj)?;
            Ok(format!("{obj_c}.{field}"))
        }
        ExprKind::MemberAssign(obj, field, value) => {
            let obj_c = emit_expr(cg, obj)?;
            let val_c = emit_promoted_value(cg, value)?;
            Ok(format!("({obj_c}.{field} = {val_c})"))
        }

        ExprKind::Call(callee, args) => emit_call(cg, callee, args, &e.ty),
        ExprKind::StaticCall(owner, method, args) => emit_static_call(cg, owner, method, args),

        ExprKind::ArrayLiteral(elems) => emit_array_literal(cg, elems, &e.ty),
        ExprKind::ArrayAccess(arr, idx) => emit_array_access(cg, arr, idx),
        ExprKind::ArraySlice(arr, start, end, step) => emit_array_slice(cg, arr, start, end, step, &e.ty),
        ExprKind::Range(start, end) => {
            let s = emit_expr(cg, start)?;
            let en = emit_expr(cg, end)?;
            Ok(format!("rt_array_range_h({}, {s}, {en})", cg.current_arena_var))
        }
        ExprKind::Spread(inner) => emit_expr(cg, inner),
        ExprKind::Interpolated(parts) => emit_interpolated(cg, parts),

        ExprKind::Lambda(params, ret, modifier, body) => {
            crate::codegen::closures::emit_lambda_expr(cg, params, ret, body, *modifier)
        }
        ExprKind::Match(subject, arms) => emit_match(cg, subject, arms, &e.ty),

        ExprKind::PreIncrement(target) => {
            let t = emit_expr(cg, target)?;
            Ok(format!("(++{t})"))
        }
        ExprKind::PreDecrement(target) => {
            let t = emit_expr(cg, target)?;
            Ok(format!("(--{t})"))
        }
        ExprKind::PostIncrement(target) => {
            let t = emit_expr(cg, target)?;
            Ok(format!("({t}++)"))
        }
        ExprKind::PostDecrement(target) => {
            let t = emit_expr(cg, target)?;
            Ok(format!("({t}--)"))
        }

        ExprKind::StructLiteral(name, fields) => emit_struct_literal(cg, name, fields, &e.ty),
    }
}

/// A value about to be stored through a handle-bearing lvalue (member
/// assignment, var decl init, return) goes through `rt_managed_promote` (or
/// one of its depth-aware siblings) when escape analysis flagged it as
/// crossing into an outer arena (spec §4.4.3, §4.7.4).
pub fn emit_promoted_value(cg: &mut CodeGen, value: &Expr) -> Result<String, CodeGenError> {
    let dest = cg.current_arena_var.clone();
    emit_promoted_value_into(cg, value, &dest)
}

/// Like [`emit_promoted_value`], but promotes into an explicit destination
/// arena rather than the current one — needed for `return` out of a
/// `private`-modifier lambda, whose own arena is destroyed immediately
/// after the value is read (§4.7.2, §4.4.3's "returned" escape tag).
pub fn emit_promoted_value_into(cg: &mut CodeGen, value: &Expr, dest_arena: &str) -> Result<String, CodeGenError> {
    let raw = emit_expr(cg, value)?;
    if !value.escape.escapes_scope || !value.ty.is_handle_bearing() {
        return Ok(raw);
    }
    let promote_fn = promotion_fn_for(&value.ty);
    Ok(format!(
        "{promote_fn}({dest_arena}, {src}, {raw})",
        src = cg.current_arena_var
    ))
}

fn promotion_fn_for(ty: &Type) -> &'static str {
    match ty {
        Type::String => "promote_string",
        Type::Array(elem) => match elem.as_ref() {
            Type::String => "promote_array_string",
            Type::Array(inner) if matches!(inner.as_ref(), Type::String) => "promote_array2_string",
            Type::Array(_) => "promote_array_handle_depth2",
            _ => "rt_managed_promote",
        },
        _ => "rt_managed_promote",
    }
}

fn escape_char(c: char) -> String {
    match c {
        '\n' => "\\n".to_string(),
        '\t' => "\\t".to_string(),
        '\r' => "\\r".to_string(),
        '\\' => "\\\\".to_string(),
        '\'' => "\\'".to_string(),
        '\0' => "\\0".to_string(),
        c => c.to_string(),
    }
}

fn escape_c_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

fn emit_string_literal(cg: &CodeGen, s: &str) -> String {
    format!(
        "rt_managed_strdup({}, 0, \"{}\")",
        cg.current_arena_var,
        escape_c_string(s)
    )
}

fn emit_binary(cg: &mut CodeGen, op: BinOp, l: &Expr, r: &Expr, result_ty: &Type) -> Result<String, CodeGenError> {
    let lc = emit_expr(cg, l)?;
    let rc = emit_expr(cg, r)?;

    if matches!(op, BinOp::Add) && matches!(l.ty, Type::String) {
        return Ok(format!("rt_string_concat({}, {lc}, {rc})", cg.current_arena_var));
    }
    if matches!(op, BinOp::Eq | BinOp::Ne) && matches!(l.ty, Type::String) {
        let eq = format!("rt_eq_string({}, {lc}, {rc})", cg.current_arena_var);
        return Ok(if matches!(op, BinOp::Eq) { eq } else { format!("(!{eq})") });
    }

    let is_integral = matches!(l.ty, Type::Int | Type::Long | Type::Int32 | Type::Uint | Type::Uint32 | Type::Byte | Type::Char);
    if is_integral {
        if let Some(suffix) = checked_arith_suffix(&l.ty) {
            match op {
                BinOp::Add if cg.checked_arithmetic => return Ok(format!("rt_add_checked_{suffix}({lc}, {rc})")),
                BinOp::Sub if cg.checked_arithmetic => return Ok(format!("rt_sub_checked_{suffix}({lc}, {rc})")),
                BinOp::Mul if cg.checked_arithmetic => return Ok(format!("rt_mul_checked_{suffix}({lc}, {rc})")),
                BinOp::Div => {
                    let f = if cg.checked_arithmetic { "rt_div_checked" } else { "rt_div_unchecked" };
                    return Ok(format!("{f}_{suffix}({lc}, {rc})"));
                }
                BinOp::Rem => {
                    let f = if cg.checked_arithmetic { "rt_rem_checked" } else { "rt_rem_unchecked" };
                    return Ok(format!("{f}_{suffix}({lc}, {rc})"));
                }
                _ => {}
            }
        }
    }

    let _ = result_ty;
    let sym = match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Rem => "%",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::And => "&&",
        BinOp::Or => "||",
    };
    Ok(format!("({lc} {sym} {rc})"))
}

/// Only `long`/`int32`/`uint`/`uint32` have a checked-arithmetic family in
/// the runtime; `byte`/`char` ride on `int32`'s (both are 4-byte-safe).
fn checked_arith_suffix(ty: &Type) -> Option<&'static str> {
    match ty {
        Type::Int | Type::Long => Some("long"),
        Type::Int32 | Type::Byte | Type::Char => Some("int32"),
        Type::Uint => Some("uint"),
        Type::Uint32 => Some("uint32"),
        _ => None,
    }
}

fn emit_unary(cg: &mut CodeGen, op: UnOp, operand: &Expr) -> Result<String, CodeGenError> {
    let oc = emit_expr(cg, operand)?;
    Ok(match op {
        UnOp::Neg => format!("(-{oc})"),
        UnOp::Not => format!("(!{oc})"),
    })
}

fn emit_index_assign(cg: &mut CodeGen, arr: &Expr, idx: &Expr, value: &Expr) -> Result<String, CodeGenError> {
    let elem_ty = match &arr.ty {
        Type::Array(e) => (**e).clone(),
        _ => Type::Any,
    };
    let arr_c = emit_expr(cg, arr)?;
    let idx_c = emit_expr(cg, idx)?;
    let val_c = emit_expr(cg, value)?;
    let c_ty = c_type(&elem_ty);
    Ok(format!(
        "(((({c_ty}*)rt_managed_pin({arena}, {arr_c}))[{idx_c}]) = {val_c})",
        arena = cg.current_arena_var
    ))
}

fn emit_array_access(cg: &mut CodeGen, arr: &Expr, idx: &Expr) -> Result<String, CodeGenError> {
    let elem_ty = match &arr.ty {
        Type::Array(e) => (**e).clone(),
        _ => Type::Any,
    };
    let arr_c = emit_expr(cg, arr)?;
    let idx_c = emit_expr(cg, idx)?;
    let c_ty = c_type(&elem_ty);
    Ok(format!(
        "((({c_ty}*)rt_managed_pin({arena}, {arr_c}))[{idx_c}])",
        arena = cg.current_arena_var
    ))
}

fn emit_array_slice(
    cg: &mut CodeGen,
    arr: &Expr,
    start: &Option<Box<Expr>>,
    end: &Option<Box<Expr>>,
    step: &Option<Box<Expr>>,
    result_ty: &Type,
) -> Result<String, CodeGenError> {
    let elem_ty = match result_ty {
        Type::Array(e) => (**e).clone(),
        _ => Type::Any,
    };
    let suffix = array_suffix(&elem_ty);
    let arr_c = emit_expr(cg, arr)?;
    let start_c = match start {
        Some(s) => emit_expr(cg, s)?,
        None => "SN_SLICE_OMITTED".to_string(),
    };
    let end_c = match end {
        Some(s) => emit_expr(cg, s)?,
        None => "SN_SLICE_OMITTED".to_string(),
    };
    let step_c = match step {
        Some(s) => emit_expr(cg, s)?,
        None => "1".to_string(),
    };
    Ok(format!(
        "rt_array_slice_{suffix}_h({arena}, rt_managed_pin({arena}, {arr_c}), {start_c}, {end_c}, {step_c})",
        arena = cg.current_arena_var
    ))
}

fn emit_array_literal(cg: &mut CodeGen, elems: &[Expr], arr_ty: &Type) -> Result<String, CodeGenError> {
    let elem_ty = match arr_ty {
        Type::Array(e) => (**e).clone(),
        _ => Type::Any,
    };
    let suffix = array_suffix(&elem_ty);
    let tmp = cg.fresh_temp("arr");
    let mut body = String::new();
    body.push_str(&format!("uint32_t {tmp} = 0; "));
    for el in elems {
        let el_c = emit_expr(cg, el)?;
        body.push_str(&format!(
            "{tmp} = rt_array_push_{suffix}_h({arena}, {tmp}, {el_c}); ",
            arena = cg.current_arena_var
        ));
    }
    body.push_str(&format!("{tmp}; "));
    Ok(format!("({{ {body}}})"))
}

/// Dispatches an interpolated-string sub-expression to the scalar-to-string
/// converter for its static type (spec §4.1 `$"..."`); the runtime has no
/// single generic `to_string`, matching its C calling convention.
fn to_string_call(cg: &CodeGen, ty: &Type, val: &str) -> String {
    let arena = &cg.current_arena_var;
    match ty {
        Type::String => val.to_string(),
        Type::Double | Type::Float => format!("rt_double_to_string({arena}, (double){val})"),
        Type::Bool => format!("rt_bool_to_string({arena}, (bool){val})"),
        Type::Char | Type::Byte => format!("rt_char_to_string({arena}, (uint8_t){val})"),
        Type::Array(elem) if matches!(elem.as_ref(), Type::Int | Type::Long) => {
            format!("rt_array_to_string_long({arena}, rt_managed_pin({arena}, {val}), 1)")
        }
        _ => format!("rt_long_to_string({arena}, (int64_t){val})"),
    }
}

fn emit_interpolated(cg: &mut CodeGen, parts: &[InterpPart]) -> Result<String, CodeGenError> {
    let tmp = cg.fresh_temp("sb");
    let mut body = String::new();
    body.push_str(&format!("StringBuilder *{tmp} = rt_string_builder_new(); "));
    for part in parts {
        match part {
            InterpPart::Literal(s) => {
                let lit = emit_string_literal(cg, s);
                body.push_str(&format!(
                    "rt_string_builder_push({tmp}, {arena}, {lit}); ",
                    arena = cg.current_arena_var
                ));
            }
            InterpPart::Expr(e) => {
                let val = emit_expr(cg, e)?;
                let as_string = to_string_call(cg, &e.ty, &val);
                body.push_str(&format!(
                    "rt_string_builder_push({tmp}, {arena}, {as_string}); ",
                    arena = cg.current_arena_var
                ));
            }
        }
    }
    body.push_str(&format!("rt_string_builder_finish({tmp}, {}); ", cg.current_arena_var));
    Ok(format!("({{ {body}}})"))
}

fn emit_struct_literal(cg: &mut CodeGen, name: &str, fields: &[crate::ast::FieldInit], ty: &Type) -> Result<String, CodeGenError> {
    let struct_ty = match ty {
        Type::Struct(s) => s.clone(),
        _ => return Err(CodeGenError::new(format!("struct literal '{name}' has no resolved type"))),
    };
    let c_name = format!("struct {}", CodeGen::mangle(name));
    let tmp = cg.fresh_temp("lit");
    let mut body = format!("{c_name} {tmp}; ");
    let def = struct_ty.borrow();
    for f in &def.fields {
        let provided = fields.iter().find(|fi| &fi.name == &f.name);
        let value_c = match provided {
            Some(fi) => emit_promoted_value(cg, &fi.value)?,
            None => match &f.default {
                Some(default_expr) => emit_expr(cg, default_expr)?,
                None => "0".to_string(),
            },
        };
        body.push_str(&format!("{tmp}.{} = {value_c}; ", f.name));
    }
    body.push_str(&format!("{tmp}; "));
    Ok(format!("({{ {body}}})"))
}

fn emit_static_call(cg: &mut CodeGen, owner: &str, method: &str, args: &[Expr]) -> Result<String, CodeGenError> {
    let mut arg_strs = Vec::with_capacity(args.len());
    for a in args {
        arg_strs.push(emit_expr(cg, a)?);
    }
    Ok(format!("{}_{}({})", CodeGen::mangle(owner), method, arg_strs.join(", ")))
}

fn emit_call(cg: &mut CodeGen, callee: &Expr, args: &[Expr], result_ty: &Type) -> Result<String, CodeGenError> {
    if let ExprKind::MemberAccess(obj, method) = &*callee.kind {
        if let Type::Array(elem) = &obj.ty {
            return emit_array_method_call(cg, obj, method, elem, args, result_ty);
        }
        if matches!(obj.ty, Type::String) {
            return emit_string_method_call(cg, obj, method, args);
        }
    }

    if let ExprKind::Variable(name) = &*callee.kind {
        match name.as_str() {
            "print" => return emit_print(cg, args),
            "range" if args.len() == 2 => {
                let s = emit_expr(cg, &args[0])?;
                let en = emit_expr(cg, &args[1])?;
                return Ok(format!("rt_array_range_h({}, {s}, {en})", cg.current_arena_var));
            }
            _ => {
                let mut arg_strs = Vec::with_capacity(args.len());
                for a in args {
                    arg_strs.push(emit_expr(cg, a)?);
                }
                return Ok(format!("{}({})", CodeGen::mangle(name), arg_strs.join(", ")));
            }
        }
    }

    emit_call_through_closure(cg, callee, args)
}

/// `print(a, b, ...)` lowers to one `printf` call: a format string built at
/// compile time from each argument's static type, plus the argument list.
/// Arguments are space-joined in the emitted output, matching the
/// original's `print` builtin (spec GLOSSARY).
fn emit_print(cg: &mut CodeGen, args: &[Expr]) -> Result<String, CodeGenError> {
    let mut fmt = String::new();
    let mut rest = String::new();
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            fmt.push(' ');
        }
        let c = emit_expr(cg, a)?;
        match &a.ty {
            Type::String => {
                fmt.push_str("%s");
                rest.push_str(&format!(", rt_string_cstr({}, {c})", cg.current_arena_var));
            }
            Type::Double | Type::Float => {
                fmt.push_str("%f");
                rest.push_str(&format!(", (double){c}"));
            }
            Type::Bool => {
                fmt.push_str("%s");
                rest.push_str(&format!(", ({c}) ? \"true\" : \"false\""));
            }
            Type::Char => {
                fmt.push_str("%c");
                rest.push_str(&format!(", {c}"));
            }
            _ => {
                fmt.push_str("%lld");
                rest.push_str(&format!(", (long long){c}"));
            }
        }
    }
    fmt.push_str("\\n");
    Ok(format!("printf(\"{fmt}\"{rest})"))
}

fn emit_string_method_call(cg: &mut CodeGen, obj: &Expr, method: &str, args: &[Expr]) -> Result<String, CodeGenError> {
    let obj_c = emit_expr(cg, obj)?;
    let arena = cg.current_arena_var.clone();
    match method {
        "len" => Ok(format!("rt_string_len({arena}, {obj_c})")),
        "concat" if args.len() == 1 => {
            let a0 = emit_expr(cg, &args[0])?;
            Ok(format!("rt_string_concat({arena}, {obj_c}, {a0})"))
        }
        _ => Err(CodeGenError::new(format!("unsupported string method '{method}'"))),
    }
}

/// The runtime only instantiates the full `rt_array_*` family (concat,
/// slice, rev, reverse, rem, ins, sum, join, indexOf, contains) for
/// primitive element types. Nested arrays and struct elements get `push`
/// and `pop` (§6 "ptr"/"struct" families) but nothing else; codegen
/// reports the §7 "unsupported element type" error rather than emitting a
/// call to a symbol the runtime never defines.
fn has_full_family(suffix: &str) -> bool {
    !matches!(suffix, "ptr" | "struct")
}

fn emit_array_method_call(
    cg: &mut CodeGen,
    obj: &Expr,
    method: &str,
    elem: &Type,
    args: &[Expr],
    result_ty: &Type,
) -> Result<String, CodeGenError> {
    let suffix = array_suffix(elem);
    let arena = cg.current_arena_var.clone();

    if MUTATING_REBIND_METHODS.contains(&method) {
        if (method == "ins" || method == "rem") && !has_full_family(suffix) {
            return Err(CodeGenError::new(format!(
                "array method '{method}' is not supported for element type '{elem}'"
            )));
        }
        let receiver = emit_expr(cg, obj)?;
        return emit_mutating_array_call(cg, &receiver, method, suffix, args, result_ty);
    }

    if !has_full_family(suffix) {
        return Err(CodeGenError::new(format!(
            "array method '{method}' is not supported for element type '{elem}'"
        )));
    }

    let obj_c = emit_expr(cg, obj)?;
    match method {
        "reverse" => Ok(format!("(rt_array_reverse_inplace_{suffix}({arena}, {obj_c}), {obj_c})")),
        "rev" => Ok(format!("rt_array_rev_{suffix}_h({arena}, {obj_c})")),
        "len" => Ok(format!("((int64_t)sn_array_len(rt_managed_pin({arena}, {obj_c})))")),
        "sum" => Ok(format!("rt_array_sum_{suffix}(rt_managed_pin({arena}, {obj_c}))")),
        "indexOf" if args.len() == 1 => {
            let needle = emit_expr(cg, &args[0])?;
            Ok(format!("rt_array_index_of_{suffix}(rt_managed_pin({arena}, {obj_c}), {needle})"))
        }
        "contains" if args.len() == 1 => {
            let needle = emit_expr(cg, &args[0])?;
            Ok(format!("rt_array_contains_{suffix}(rt_managed_pin({arena}, {obj_c}), {needle})"))
        }
        "join" if args.len() == 1 => {
            let sep = emit_expr(cg, &args[0])?;
            Ok(format!(
                "rt_managed_strdup({arena}, 0, rt_array_join_{suffix}(rt_managed_pin({arena}, {obj_c}), rt_string_cstr({arena}, {sep})))"
            ))
        }
        "concat" if args.len() == 1 => {
            let other = emit_expr(cg, &args[0])?;
            Ok(format!(
                "rt_array_concat_{suffix}_h({arena}, rt_managed_pin({arena}, {obj_c}), rt_managed_pin({arena}, {other}))"
            ))
        }
        _ => Err(CodeGenError::new(format!("unsupported array method '{method}' for element type '{elem}'"))),
    }
}

fn emit_mutating_array_call(
    cg: &mut CodeGen,
    receiver: &str,
    method: &str,
    suffix: &'static str,
    args: &[Expr],
    result_ty: &Type,
) -> Result<String, CodeGenError> {
    let arena = cg.current_arena_var.clone();
    match method {
        "push" if args.len() == 1 => {
            let el = emit_expr(cg, &args[0])?;
            Ok(format!(
                "({receiver} = rt_array_push_{suffix}_h({arena}, {receiver}, {el}))"
            ))
        }
        "ins" if args.len() == 2 => {
            let el = emit_expr(cg, &args[0])?;
            let idx = emit_expr(cg, &args[1])?;
            Ok(format!(
                "({receiver} = rt_array_ins_{suffix}_h({arena}, {receiver}, {el}, {idx}))"
            ))
        }
        "rem" if args.len() == 1 => {
            let idx = emit_expr(cg, &args[0])?;
            Ok(format!(
                "({receiver} = rt_array_rem_{suffix}_h({arena}, {receiver}, {idx}))"
            ))
        }
        "pop" if suffix == "ptr" => {
            let out = cg.fresh_temp("pop");
            Ok(format!(
                "({{ uint32_t {out}; {receiver} = rt_array_pop_ptr_h({arena}, {receiver}, &{out}); {out}; }})"
            ))
        }
        "pop" => {
            let c_ty = c_type(result_ty);
            let out = cg.fresh_temp("pop");
            Ok(format!(
                "({{ {c_ty} {out}; {receiver} = rt_array_pop_{suffix}_h({arena}, {receiver}, &{out}); {out}; }})"
            ))
        }
        _ => Err(CodeGenError::new(format!("unsupported mutating array method '{method}'"))),
    }
}
