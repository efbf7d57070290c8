//! SN's type system: primitive singletons, composite types, struct layout.
//!
//! Primitive variants are process-wide singletons, so identity comparison
//! (`matches!` on the discriminant) is sufficient for them. Composite types
//! (struct, array, pointer, function) are compared structurally by
//! [`types_equal`], which breaks cycles through already-visited struct names
//! rather than recursing forever on self-referential layouts.

use crate::ast::Expr;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Default,
    Private,
    Shared,
    Native,
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::Default => write!(f, "default"),
            Modifier::Private => write!(f, "private"),
            Modifier::Shared => write!(f, "shared"),
            Modifier::Native => write!(f, "native"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    pub offset: u64,
    pub default: Option<Box<Expr>>,
    pub c_alias: Option<String>,
}

#[derive(Debug)]
pub struct StructDef {
    pub name: Option<String>,
    pub fields: Vec<Field>,
    pub size: u64,
    pub alignment: u64,
    pub is_native: bool,
    pub is_recursive: bool,
    laid_out: bool,
}

impl StructDef {
    pub fn new(name: Option<String>, fields: Vec<Field>, is_native: bool) -> StructHandle {
        Rc::new(RefCell::new(StructDef {
            name,
            fields,
            size: 0,
            alignment: 1,
            is_native,
            is_recursive: false,
            laid_out: false,
        }))
    }
}

pub type StructHandle = Rc<RefCell<StructDef>>;

#[derive(Debug, Clone)]
pub enum Type {
    Void,
    Bool,
    Char,
    Byte,
    Int32,
    Uint32,
    Int,
    Uint,
    Long,
    Float,
    Double,
    String,
    Any,
    Array(Box<Type>),
    Pointer(Box<Type>),
    Nullable(Box<Type>),
    Function {
        params: Vec<Type>,
        ret: Box<Type>,
        modifier: Modifier,
    },
    Struct(StructHandle),
    /// Unresolved forward reference, patched once the named struct is hoisted.
    Opaque(String),
}

impl Type {
    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    /// True for types whose C representation is a `uint32_t` arena handle
    /// (§4.7.1) rather than a value the C compiler lays out directly.
    /// Structs are emitted as raw C aggregates (`struct sn_Name` by value,
    /// not a handle) — their handle-bearing fields, if any, are each
    /// promoted/cleaned up individually, not the struct as a whole.
    pub fn is_handle_bearing(&self) -> bool {
        matches!(self, Type::String | Type::Array(_) | Type::Function { .. } | Type::Any)
    }

    pub fn struct_name(&self) -> Option<String> {
        match self {
            Type::Struct(s) => s.borrow().name.clone(),
            Type::Opaque(name) => Some(name.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Bool => write!(f, "bool"),
            Type::Char => write!(f, "char"),
            Type::Byte => write!(f, "byte"),
            Type::Int32 => write!(f, "int32"),
            Type::Uint32 => write!(f, "uint32"),
            Type::Int => write!(f, "int"),
            Type::Uint => write!(f, "uint"),
            Type::Long => write!(f, "long"),
            Type::Float => write!(f, "float"),
            Type::Double => write!(f, "double"),
            Type::String => write!(f, "string"),
            Type::Any => write!(f, "any"),
            Type::Array(elem) => write!(f, "{elem}[]"),
            Type::Pointer(pointee) => write!(f, "*{pointee}"),
            Type::Nullable(inner) => write!(f, "{inner}?"),
            Type::Function { params, ret, modifier } => {
                let ps: Vec<_> = params.iter().map(|t| t.to_string()).collect();
                write!(f, "{modifier} fn({}) -> {ret}", ps.join(", "))
            }
            Type::Struct(s) => write!(f, "{}", s.borrow().name.as_deref().unwrap_or("<anon struct>")),
            Type::Opaque(name) => write!(f, "{name}"),
        }
    }
}

/// Structural equality with cycle protection: two struct types are equal iff
/// they share a name (recursing further would not terminate on cyclic
/// layouts), otherwise field-by-field.
pub fn types_equal(a: &Type, b: &Type) -> bool {
    types_equal_inner(a, b, &mut HashSet::new())
}

fn types_equal_inner(a: &Type, b: &Type, seen: &mut HashSet<(String, String)>) -> bool {
    match (a, b) {
        (Type::Array(x), Type::Array(y)) => types_equal_inner(x, y, seen),
        (Type::Pointer(x), Type::Pointer(y)) => types_equal_inner(x, y, seen),
        (Type::Nullable(x), Type::Nullable(y)) => types_equal_inner(x, y, seen),
        (
            Type::Function { params: p1, ret: r1, modifier: m1 },
            Type::Function { params: p2, ret: r2, modifier: m2 },
        ) => {
            m1 == m2
                && p1.len() == p2.len()
                && p1.iter().zip(p2).all(|(x, y)| types_equal_inner(x, y, seen))
                && types_equal_inner(r1, r2, seen)
        }
        (Type::Struct(s1), Type::Struct(s2)) => {
            if Rc::ptr_eq(s1, s2) {
                return true;
            }
            let (n1, n2) = (s1.borrow().name.clone(), s2.borrow().name.clone());
            if let (Some(n1), Some(n2)) = (&n1, &n2) {
                if n1 == n2 {
                    return true;
                }
                let key = (n1.clone(), n2.clone());
                if seen.contains(&key) {
                    return true;
                }
                seen.insert(key);
            }
            let (f1, f2) = (s1.borrow(), s2.borrow());
            f1.fields.len() == f2.fields.len()
                && f1
                    .fields
                    .iter()
                    .zip(f2.fields.iter())
                    .all(|(x, y)| x.name == y.name && types_equal_inner(&x.ty, &y.ty, seen))
        }
        (Type::Opaque(x), Type::Opaque(y)) => x == y,
        (x, y) => std::mem::discriminant(x) == std::mem::discriminant(y) && matches!(
            (x, y),
            (Type::Void, Type::Void)
                | (Type::Bool, Type::Bool)
                | (Type::Char, Type::Char)
                | (Type::Byte, Type::Byte)
                | (Type::Int32, Type::Int32)
                | (Type::Uint32, Type::Uint32)
                | (Type::Int, Type::Int)
                | (Type::Uint, Type::Uint)
                | (Type::Long, Type::Long)
                | (Type::Float, Type::Float)
                | (Type::Double, Type::Double)
                | (Type::String, Type::String)
                | (Type::Any, Type::Any)
        ),
    }
}

/// Fixed size/alignment in bytes for every primitive (§4.4.1). Composite
/// handle-bearing values (arrays, strings, pointers, structs) are 8/8 in
/// their code-generated form since they are always a pointer or a handle.
pub fn size_of_type(ty: &Type) -> u64 {
    match ty {
        Type::Void => 0,
        Type::Bool | Type::Byte | Type::Char => 1,
        Type::Int32 | Type::Uint32 | Type::Float => 4,
        Type::Int | Type::Uint | Type::Long | Type::Double | Type::String => 8,
        Type::Array(_) | Type::Pointer(_) | Type::Function { .. } | Type::Any => 8,
        Type::Nullable(inner) => size_of_type(inner).max(8),
        Type::Struct(s) => {
            let s = s.borrow();
            if s.laid_out { s.size } else { 8 }
        }
        Type::Opaque(_) => 8,
    }
}

pub fn align_of_type(ty: &Type) -> u64 {
    match ty {
        Type::Void => 1,
        Type::Bool | Type::Byte | Type::Char => 1,
        Type::Int32 | Type::Uint32 | Type::Float => 4,
        Type::Struct(s) => {
            let s = s.borrow();
            if s.laid_out { s.alignment } else { 8 }
        }
        _ => 8,
    }
}

fn align_up(value: u64, align: u64) -> u64 {
    if align == 0 {
        return value;
    }
    (value + align - 1) / align * align
}

/// Computes and writes `size`/`offset` for every field exactly once (§4.4.1).
/// Idempotent: a struct already laid out is left untouched.
pub fn compute_layout(def: &StructHandle) {
    if def.borrow().laid_out {
        return;
    }
    let mut offset = 0u64;
    let mut max_align = 1u64;
    let field_count = def.borrow().fields.len();
    for i in 0..field_count {
        let field_ty = def.borrow().fields[i].ty.clone();
        let align = align_of_type(&field_ty).max(1);
        let size = size_of_type(&field_ty);
        offset = align_up(offset, align);
        def.borrow_mut().fields[i].offset = offset;
        offset += size;
        max_align = max_align.max(align);
    }
    let total = align_up(offset, max_align);
    let mut def_mut = def.borrow_mut();
    def_mut.size = total;
    def_mut.alignment = max_align;
    def_mut.laid_out = true;
}

/// DFS cycle detector over the struct field graph (§4.4.2). Descends through
/// arrays (an array of a currently-visiting struct is circular) but not
/// through pointers, which break the cycle for non-native structs.
pub fn detect_cycle(root: &StructHandle) -> Option<Vec<String>> {
    let mut visiting: Vec<String> = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    fn walk(
        def: &StructHandle,
        visiting: &mut Vec<String>,
        visited: &mut HashSet<String>,
    ) -> Option<Vec<String>> {
        let name = def.borrow().name.clone().unwrap_or_default();
        if def.borrow().is_native {
            return None;
        }
        if visiting.contains(&name) {
            let pos = visiting.iter().position(|n| n == &name).unwrap();
            let mut chain = visiting[pos..].to_vec();
            chain.push(name);
            return Some(chain);
        }
        if visited.contains(&name) {
            return None;
        }
        visiting.push(name.clone());
        let field_types: Vec<Type> = def.borrow().fields.iter().map(|f| f.ty.clone()).collect();
        for field_ty in field_types {
            if let Some(chain) = walk_type(&field_ty, visiting, visited) {
                return Some(chain);
            }
        }
        visiting.pop();
        visited.insert(name);
        None
    }
    fn walk_type(
        ty: &Type,
        visiting: &mut Vec<String>,
        visited: &mut HashSet<String>,
    ) -> Option<Vec<String>> {
        match ty {
            Type::Struct(s) => walk(s, visiting, visited),
            Type::Array(elem) => walk_type(elem, visiting, visited),
            Type::Pointer(_) => None,
            _ => None,
        }
    }
    walk(root, &mut visiting, &mut visited)
}

/// Deep copy that breaks self-reference by interning struct types by name:
/// a second occurrence of the same struct anywhere in the cloned graph
/// reuses the already-cloned node, which is the sole mechanism the rest of
/// the compiler relies on to avoid infinite recursion on cyclic types.
pub fn clone_type(ty: &Type, interned: &mut std::collections::HashMap<String, StructHandle>) -> Type {
    match ty {
        Type::Void => Type::Void,
        Type::Bool => Type::Bool,
        Type::Char => Type::Char,
        Type::Byte => Type::Byte,
        Type::Int32 => Type::Int32,
        Type::Uint32 => Type::Uint32,
        Type::Int => Type::Int,
        Type::Uint => Type::Uint,
        Type::Long => Type::Long,
        Type::Float => Type::Float,
        Type::Double => Type::Double,
        Type::String => Type::String,
        Type::Any => Type::Any,
        Type::Array(elem) => Type::Array(Box::new(clone_type(elem, interned))),
        Type::Pointer(pointee) => Type::Pointer(Box::new(clone_type(pointee, interned))),
        Type::Nullable(inner) => Type::Nullable(Box::new(clone_type(inner, interned))),
        Type::Function { params, ret, modifier } => Type::Function {
            params: params.iter().map(|p| clone_type(p, interned)).collect(),
            ret: Box::new(clone_type(ret, interned)),
            modifier: *modifier,
        },
        Type::Opaque(name) => Type::Opaque(name.clone()),
        Type::Struct(s) => {
            let name = s.borrow().name.clone();
            if let Some(name) = &name {
                if let Some(existing) = interned.get(name) {
                    return Type::Struct(existing.clone());
                }
            }
            let (fields_src, is_native) = {
                let b = s.borrow();
                (b.fields.clone(), b.is_native)
            };
            let placeholder = StructDef::new(name.clone(), Vec::new(), is_native);
            if let Some(name) = &name {
                interned.insert(name.clone(), placeholder.clone());
            }
            let cloned_fields: Vec<Field> = fields_src
                .into_iter()
                .map(|f| Field {
                    name: f.name,
                    ty: clone_type(&f.ty, interned),
                    offset: f.offset,
                    default: f.default,
                    c_alias: f.c_alias,
                })
                .collect();
            placeholder.borrow_mut().fields = cloned_fields;
            let (size, alignment, is_recursive) = {
                let b = s.borrow();
                (b.size, b.alignment, b.is_recursive)
            };
            {
                let mut p = placeholder.borrow_mut();
                p.size = size;
                p.alignment = alignment;
                p.is_recursive = is_recursive;
            }
            Type::Struct(placeholder)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, ty: Type) -> Field {
        Field { name: name.into(), ty, offset: 0, default: None, c_alias: None }
    }

    #[test]
    fn layout_orders_fields_by_alignment_padding() {
        let def = StructDef::new(
            Some("Mixed".into()),
            vec![field("flag", Type::Bool), field("count", Type::Int)],
            false,
        );
        compute_layout(&def);
        let b = def.borrow();
        assert_eq!(b.fields[0].offset, 0);
        assert_eq!(b.fields[1].offset, 8);
        assert_eq!(b.size, 16);
        assert_eq!(b.alignment, 8);
    }

    #[test]
    fn self_referential_pointer_is_not_circular() {
        let def = StructDef::new(Some("Node".into()), Vec::new(), false);
        let self_ptr = Type::Pointer(Box::new(Type::Struct(def.clone())));
        def.borrow_mut().fields.push(field("next", self_ptr));
        def.borrow_mut().fields.push(field("value", Type::Int));
        assert!(detect_cycle(&def).is_none());
    }

    #[test]
    fn self_referential_value_is_circular() {
        let def = StructDef::new(Some("Node".into()), Vec::new(), false);
        def.borrow_mut().fields.push(field("next", Type::Struct(def.clone())));
        let chain = detect_cycle(&def).expect("expected cycle");
        assert!(chain.contains(&"Node".to_string()));
    }

    #[test]
    fn array_of_self_is_circular() {
        let def = StructDef::new(Some("Tree".into()), Vec::new(), false);
        def.borrow_mut()
            .fields
            .push(field("children", Type::Array(Box::new(Type::Struct(def.clone())))));
        assert!(detect_cycle(&def).is_some());
    }

    #[test]
    fn clone_type_terminates_on_cycle() {
        let def = StructDef::new(Some("Node".into()), Vec::new(), false);
        let self_ptr = Type::Pointer(Box::new(Type::Struct(def.clone())));
        def.borrow_mut().fields.push(field("next", self_ptr));
        let mut interned = std::collections::HashMap::new();
        let cloned = clone_type(&Type::Struct(def), &mut interned);
        assert!(matches!(cloned, Type::Struct(_)));
    }
}
