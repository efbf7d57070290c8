//! Core codegen state: the buffers and context the generator thread through
//! every emission function (§4.7). Kept as one struct, passed by mutable
//! borrow to every phase, matching the "compiler as an explicit value"
//! re-architecture called for over the source's global mutable state.

use crate::ast::Param;
use crate::symtab::SymbolTable;
use crate::types::{Modifier, Type};
use std::cell::Cell;
use std::collections::HashMap;

pub struct LambdaInfo {
    pub id: u32,
    pub params: Vec<Param>,
    pub ret: Type,
    pub modifier: Modifier,
    pub captures: Vec<(String, Type)>,
}

pub struct CodeGen {
    pub out: String,
    pub lambda_fwd: String,
    pub lambda_defs: String,
    pub struct_defs: String,
    pub fn_defs: String,

    pub current_arena_var: String,
    pub expr_as_handle: bool,
    pub current_function: Option<String>,
    pub current_return_type: Type,
    pub enclosing_lambdas: Vec<LambdaInfo>,
    /// Arena active immediately before entering each lambda body currently
    /// on the stack (§4.7.2 "caller-provided arena"). A `private` lambda's
    /// own arena is destroyed at every `return`, so a returned value whose
    /// escape analysis flagged it as function-local (§4.4.3) must be
    /// promoted into this arena, not its own, before the destroy runs.
    /// Empty at top level, where every function shares the single
    /// `__main_arena__` and promotion is a same-arena no-op.
    pub caller_arena_stack: Vec<String>,

    pub symtab: SymbolTable,
    pub checked_arithmetic: bool,
    pub lambda_counter: Cell<u32>,
    pub temp_counter: Cell<u32>,
    pub lambda_registry: HashMap<u32, LambdaInfo>,
}

impl CodeGen {
    pub fn new(checked_arithmetic: bool) -> Self {
        CodeGen {
            out: String::new(),
            lambda_fwd: String::new(),
            lambda_defs: String::new(),
            struct_defs: String::new(),
            fn_defs: String::new(),
            current_arena_var: "__main_arena__".to_string(),
            expr_as_handle: false,
            current_function: None,
            current_return_type: Type::Void,
            enclosing_lambdas: Vec::new(),
            caller_arena_stack: Vec::new(),
            symtab: SymbolTable::new(),
            checked_arithmetic,
            lambda_counter: Cell::new(0),
            temp_counter: Cell::new(0),
            lambda_registry: HashMap::new(),
        }
    }

    pub fn fresh_temp(&self, prefix: &str) -> String {
        let id = self.temp_counter.get();
        self.temp_counter.set(id + 1);
        format!("__{prefix}_{id}__")
    }

    pub fn fresh_lambda_id(&self) -> u32 {
        let id = self.lambda_counter.get();
        self.lambda_counter.set(id + 1);
        id
    }

    pub fn mangle(name: &str) -> String {
        format!("sn_{name}")
    }
}

/// C type used to hold a value of this SN type. Handle-bearing types
/// (string, array, function, any, non-native struct-by-handle-field
/// aggregates) are always a `uint32_t` handle per the handle ABI (§4.7.1);
/// everything else is its natural scalar C type.
pub fn c_type(ty: &Type) -> String {
    match ty {
        Type::Void => "void".to_string(),
        Type::Bool => "uint8_t".to_string(),
        Type::Char => "char".to_string(),
        Type::Byte => "uint8_t".to_string(),
        Type::Int32 => "int32_t".to_string(),
        Type::Uint32 => "uint32_t".to_string(),
        Type::Int | Type::Long => "int64_t".to_string(),
        Type::Uint => "uint64_t".to_string(),
        Type::Float => "float".to_string(),
        Type::Double => "double".to_string(),
        Type::String => "uint32_t".to_string(),
        Type::Any => "uint32_t".to_string(),
        Type::Array(_) => "uint32_t".to_string(),
        Type::Pointer(pointee) => format!("{}*", c_type(pointee)),
        Type::Nullable(inner) => c_type(inner),
        Type::Function { .. } => "SnClosure*".to_string(),
        Type::Struct(s) => {
            let b = s.borrow();
            if b.is_native {
                b.name.clone().unwrap_or_else(|| "void".to_string())
            } else {
                format!("struct {}", CodeGen::mangle(b.name.as_deref().unwrap_or("anon")))
            }
        }
        Type::Opaque(name) => format!("struct {}", CodeGen::mangle(name)),
    }
}

/// Element-type suffix used in the `rt_array_<op>_<suffix>[_h]` family
/// (§6 Runtime ABI).
pub fn array_suffix(elem: &Type) -> &'static str {
    match elem {
        Type::Int | Type::Long => "long",
        Type::Uint => "uint",
        Type::Int32 => "int32",
        Type::Uint32 => "uint32",
        Type::Double => "double",
        Type::Float => "float",
        Type::Char => "char",
        Type::Bool => "bool",
        Type::Byte => "byte",
        Type::String => "ptr",
        Type::Array(_) | Type::Function { .. } | Type::Any => "ptr",
        Type::Struct(_) => "struct",
        _ => "ptr",
    }
}
