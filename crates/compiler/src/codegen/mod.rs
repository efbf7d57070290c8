//! Code generator: lowers a type-checked, optimized [`crate::ast::Module`]
//! to a single C translation unit (spec §4.7).
//!
//! Submodules, each responsible for one slice of the Handle ABI contract
//! (§4.7.1):
//! - [`state`] — the `CodeGen` struct and shared C-type vocabulary.
//! - [`expr`] — expression emission, including array mutation dispatch.
//! - [`stmt`] — statement emission.
//! - [`closures`] — lambda lifting and capture records (§4.7.2).
//! - [`patterns`] — `match` lowering (§4.7.3).
//! - [`error`] — the one fatal codegen-phase error.
//!
//! Output assembly order follows §4.7.5: runtime prelude, lambda forward
//! declarations, lambda definitions, struct typedefs and function bodies,
//! generated `main`.

pub mod closures;
pub mod error;
pub mod expr;
pub mod patterns;
pub mod state;
pub mod stmt;

pub use error::CodeGenError;
pub use state::CodeGen;

use crate::ast::{Module, Param, StmtKind};
use crate::codegen::state::c_type;
use crate::types::Modifier;

const PRELUDE: &str = r#"/* generated by snc; do not edit */
#include <stdint.h>
#include <stdbool.h>
#include <stdio.h>
#include <stdlib.h>
#include <string.h>

typedef struct RtArena RtArena;

extern RtArena *rt_arena_create(const RtArena *parent);
extern void rt_arena_destroy(RtArena *arena);
extern void *rt_arena_alloc(const RtArena *arena, uint64_t size);
extern uint32_t rt_managed_alloc(const RtArena *arena, uint32_t previous, uint64_t size);
extern void *rt_managed_pin(const RtArena *arena, uint32_t handle);
extern void rt_managed_unpin(const RtArena *arena, uint32_t handle);
extern void rt_managed_mark_dead(const RtArena *arena, uint32_t handle);

extern uint32_t rt_managed_promote(const RtArena *dest, const RtArena *src, uint32_t handle);
extern uint32_t promote_string(const RtArena *dest, const RtArena *src, uint32_t handle);
extern uint32_t promote_array_string(const RtArena *dest, const RtArena *src, uint32_t handle);
extern uint32_t promote_array2_string(const RtArena *dest, const RtArena *src, uint32_t handle);
extern uint32_t promote_array_handle_depth(const RtArena *dest, const RtArena *src, uint32_t handle, uint32_t depth);
static inline uint32_t promote_array_handle_depth2(const RtArena *dest, const RtArena *src, uint32_t handle) {
    return promote_array_handle_depth(dest, src, handle, 2);
}

extern uint32_t rt_managed_strdup(const RtArena *arena, uint32_t previous, const char *cstr);
extern bool rt_eq_string(const RtArena *arena, uint32_t a, uint32_t b);
extern uint32_t rt_string_concat(const RtArena *arena, uint32_t a, uint32_t b);
extern uint64_t rt_string_len(const RtArena *arena, uint32_t h);
extern const char *rt_string_cstr(const RtArena *arena, uint32_t h);
extern uint32_t rt_long_to_string(const RtArena *arena, int64_t v);
extern uint32_t rt_double_to_string(const RtArena *arena, double v);
extern uint32_t rt_bool_to_string(const RtArena *arena, bool v);
extern uint32_t rt_char_to_string(const RtArena *arena, uint8_t v);

typedef struct StringBuilder StringBuilder;
extern StringBuilder *rt_string_builder_new(void);
extern void rt_string_builder_push(StringBuilder *b, const RtArena *arena, uint32_t part);
extern uint32_t rt_string_builder_finish(StringBuilder *b, const RtArena *arena);

extern int64_t rt_add_checked_long(int64_t a, int64_t b);
extern int64_t rt_sub_checked_long(int64_t a, int64_t b);
extern int64_t rt_mul_checked_long(int64_t a, int64_t b);
extern int64_t rt_div_checked_long(int64_t a, int64_t b);
extern int64_t rt_rem_checked_long(int64_t a, int64_t b);
extern int64_t rt_div_unchecked_long(int64_t a, int64_t b);
extern int64_t rt_rem_unchecked_long(int64_t a, int64_t b);
extern int32_t rt_add_checked_int32(int32_t a, int32_t b);
extern int32_t rt_sub_checked_int32(int32_t a, int32_t b);
extern int32_t rt_mul_checked_int32(int32_t a, int32_t b);
extern int32_t rt_div_checked_int32(int32_t a, int32_t b);
extern int32_t rt_rem_checked_int32(int32_t a, int32_t b);
extern uint64_t rt_add_checked_uint(uint64_t a, uint64_t b);
extern uint64_t rt_sub_checked_uint(uint64_t a, uint64_t b);
extern uint64_t rt_mul_checked_uint(uint64_t a, uint64_t b);
extern uint64_t rt_div_checked_uint(uint64_t a, uint64_t b);
extern uint64_t rt_rem_checked_uint(uint64_t a, uint64_t b);
extern uint32_t rt_add_checked_uint32(uint32_t a, uint32_t b);
extern uint32_t rt_sub_checked_uint32(uint32_t a, uint32_t b);
extern uint32_t rt_mul_checked_uint32(uint32_t a, uint32_t b);
extern uint32_t rt_div_checked_uint32(uint32_t a, uint32_t b);
extern uint32_t rt_rem_checked_uint32(uint32_t a, uint32_t b);

typedef struct RtMutex RtMutex;
extern void rt_mutex_lock(const RtMutex *m);
extern void rt_mutex_unlock(const RtMutex *m);

#define SN_SLICE_OMITTED INT64_MIN

typedef struct { void *arena; uint64_t size; uint64_t capacity; } SnArrayMeta;
static inline SnArrayMeta *sn_array_meta_of(void *elem_ptr) { return ((SnArrayMeta *)elem_ptr) - 1; }
static inline uint64_t sn_array_len(void *elem_ptr) { return elem_ptr ? sn_array_meta_of(elem_ptr)->size : 0; }

typedef struct SnClosure { void *fn; RtArena *arena; uint64_t size; } SnClosure;

"#;

macro_rules! array_family_decl {
    ($suffix:literal, $ty:literal) => {
        concat!(
            "extern uint32_t rt_array_push_", $suffix, "_h(const RtArena *arena, uint32_t arr, ", $ty, " elem);\n",
            "extern uint32_t rt_array_pop_", $suffix, "_h(const RtArena *arena, uint32_t arr, ", $ty, " *out);\n",
            "extern uint32_t rt_array_ins_", $suffix, "_h(const RtArena *arena, uint32_t arr, ", $ty, " elem, int64_t idx);\n",
            "extern uint32_t rt_array_rem_", $suffix, "_h(const RtArena *arena, uint32_t arr, int64_t idx);\n",
            "extern uint32_t rt_array_concat_", $suffix, "_h(const RtArena *arena, const void *a, const void *b);\n",
            "extern uint32_t rt_array_slice_", $suffix, "_h(const RtArena *arena, const void *src, int64_t start, int64_t end, int64_t step);\n",
            "extern uint32_t rt_array_rev_", $suffix, "_h(const RtArena *arena, uint32_t arr);\n",
            "extern void rt_array_reverse_inplace_", $suffix, "(const RtArena *arena, uint32_t arr);\n",
            "extern int64_t rt_array_index_of_", $suffix, "(const void *raw, ", $ty, " needle);\n",
            "extern bool rt_array_contains_", $suffix, "(const void *raw, ", $ty, " needle);\n",
        )
    };
}

const ARRAY_FAMILIES: &str = concat!(
    array_family_decl!("long", "int64_t"),
    "extern int64_t rt_array_sum_long(const void *raw);\n",
    "extern const char *rt_array_join_long(const void *raw, const char *sep);\n",
    "extern uint32_t rt_array_to_string_long(const RtArena *arena, const void *raw, uint32_t depth);\n",
    array_family_decl!("uint", "uint64_t"),
    array_family_decl!("int32", "int32_t"),
    array_family_decl!("uint32", "uint32_t"),
    array_family_decl!("double", "double"),
    "extern double rt_array_sum_double(const void *raw);\n",
    "extern const char *rt_array_join_double(const void *raw, const char *sep);\n",
    array_family_decl!("float", "float"),
    array_family_decl!("char", "uint8_t"),
    array_family_decl!("bool", "uint8_t"),
    array_family_decl!("byte", "uint8_t"),
    "extern uint32_t rt_array_range_h(const RtArena *arena, int64_t start, int64_t end);\n",
    "extern uint32_t rt_array_push_ptr_h(const RtArena *arena, uint32_t arr, uint32_t elem);\n",
    "extern uint32_t rt_array_pop_ptr_h(const RtArena *arena, uint32_t arr, uint32_t *out);\n",
    "extern uint32_t rt_array_get_ptr(const void *raw, int64_t idx);\n",
    "extern uint32_t rt_array_push_struct_h(const RtArena *arena, uint32_t arr, const void *elem, uint64_t elem_size);\n",
);

pub fn emit_program(module: &Module, checked_arithmetic: bool) -> Result<String, CodeGenError> {
    let mut cg = CodeGen::new(checked_arithmetic);

    // Globals declared at module scope run in generated main before any
    // user `main` is invoked.
    let mut globals = String::new();
    let mut has_user_main = false;

    for stmt in &module.stmts {
        match &stmt.kind {
            StmtKind::StructDecl { name, fields, is_native } => {
                emit_struct_decl(&mut cg, name, fields, *is_native)?;
            }
            StmtKind::Function { name, params, ret, body, modifier, is_native } => {
                if name == "main" {
                    has_user_main = true;
                }
                emit_function_decl(&mut cg, name, params, ret, body, *modifier, *is_native)?;
            }
            StmtKind::Import(_) => {}
            _ => {
                globals.push_str(&crate::codegen::stmt::emit_stmt(&mut cg, stmt)?);
            }
        }
    }

    Ok(assemble(&cg, &globals, has_user_main))
}

fn emit_struct_decl(
    cg: &mut CodeGen,
    name: &str,
    fields: &[crate::ast::FieldDecl],
    is_native: bool,
) -> Result<(), CodeGenError> {
    if is_native {
        cg.struct_defs.push_str(&format!("/* native struct '{name}' defined externally */\n"));
        return Ok(());
    }
    let c_name = format!("struct {}", CodeGen::mangle(name));
    let mut body = String::new();
    for f in fields {
        let field_name = f.c_alias.as_deref().unwrap_or(&f.name);
        body.push_str(&format!("    {} {};\n", c_type(&f.ty), field_name));
    }
    cg.struct_defs.push_str(&format!("{c_name} {{\n{body}}};\n\n"));
    Ok(())
}

fn emit_function_decl(
    cg: &mut CodeGen,
    name: &str,
    params: &[Param],
    ret: &crate::types::Type,
    body: &crate::ast::Stmt,
    modifier: Modifier,
    is_native: bool,
) -> Result<(), CodeGenError> {
    let c_name = CodeGen::mangle(name);
    let ret_c = c_type(ret);
    let param_list = if params.is_empty() {
        "void".to_string()
    } else {
        params
            .iter()
            .map(|p| format!("{} {}", c_type(&p.ty), CodeGen::mangle(&p.name)))
            .collect::<Vec<_>>()
            .join(", ")
    };

    if is_native {
        cg.fn_defs.push_str(&format!("extern {ret_c} {c_name}({param_list});\n"));
        return Ok(());
    }

    cg.current_function = Some(name.to_string());
    cg.current_return_type = ret.clone();
    let body_c = crate::codegen::stmt::emit_function_body(cg, params, body)?;
    cg.current_function = None;

    let _ = modifier;
    cg.fn_defs.push_str(&format!("static {ret_c} {c_name}({param_list}) {{\n{body_c}}}\n\n"));
    Ok(())
}

fn assemble(cg: &CodeGen, globals: &str, has_user_main: bool) -> String {
    let mut out = String::new();
    out.push_str(PRELUDE);
    out.push_str(ARRAY_FAMILIES);
    out.push('\n');
    out.push_str(&cg.lambda_fwd);
    out.push('\n');
    out.push_str(&cg.struct_defs);
    out.push('\n');
    out.push_str(&cg.lambda_defs);
    out.push('\n');
    out.push_str(&cg.fn_defs);
    out.push('\n');

    out.push_str("int main(int argc, char **argv) {\n");
    out.push_str("    RtArena *__main_arena__ = rt_arena_create(0);\n");
    out.push_str("    uint32_t args = 0;\n");
    out.push_str("    for (int __i__ = 0; __i__ < argc; __i__++) {\n");
    out.push_str("        args = rt_array_push_ptr_h(__main_arena__, args, rt_managed_strdup(__main_arena__, 0, argv[__i__]));\n");
    out.push_str("    }\n");
    out.push_str(globals);
    if has_user_main {
        out.push_str(&format!("    {}();\n", CodeGen::mangle("main")));
    }
    out.push_str("    rt_arena_destroy(__main_arena__);\n");
    out.push_str("    return 0;\n");
    out.push_str("}\n");

    out
}
