//! The fixed external C runtime this compiler targets. Every `Array`/`List`
//! built-in lowers to one of these `declare`d functions; the preamble also
//! carries the container layouts and print format strings shared by every
//! compiled module. This text is frozen: it must match byte-for-byte across
//! every emitted module, since the linked runtime object is compiled once
//! against it.

use oc_core::{SemanticType, TypeKind};

/// Text emitted once at the top of every module, before any class type or
/// function definition.
pub const PREAMBLE: &str = r#"; ModuleID = 'languageOcompiler'
source_filename = "languageO"
%Array = type { i32, i8* }
%List = type { i8* }

declare i8* @malloc(i64)
declare %Array* @o_array_new(i32)
declare i32    @o_array_length(%Array*)
declare i8*    @o_array_get(%Array*, i32)
declare void   @o_array_set(%Array*, i32, i8*)
declare %List* @o_list_empty()
declare %List* @o_list_singleton(i8*)
declare %List* @o_list_replicate(i8*, i32)
declare %List* @o_list_append(%List*, i8*)
declare i8*    @o_list_head(%List*)
declare %List* @o_list_tail(%List*)
declare %Array* @o_list_to_array(%List*)
declare i32    @printf(i8*, ...)

@.fmt_int  = private unnamed_addr constant [4 x i8] c"%d\0A\00"
@.fmt_real = private unnamed_addr constant [4 x i8] c"%f\0A\00"
"#;

/// The LLVM type a [`SemanticType`] occupies as a value (register type, not
/// storage type; both coincide here since nothing is passed by struct
/// value). Class instances and generic containers are always pointers.
pub fn llvm_type(ty: &SemanticType) -> String {
    match ty.kind {
        TypeKind::Void => "void".to_string(),
        TypeKind::Integer => "i32".to_string(),
        TypeKind::Real => "double".to_string(),
        TypeKind::Boolean => "i1".to_string(),
        TypeKind::Array => "%Array*".to_string(),
        TypeKind::List => "%List*".to_string(),
        TypeKind::Class => format!("{}*", crate::emit::mangle::struct_type_name(&ty.name)),
        TypeKind::Standard | TypeKind::Unknown => "i8*".to_string(),
    }
}

/// Whether a type's runtime representation is a raw value (`i32`/`double`/
/// `i1`) rather than a pointer; such values must be boxed onto the heap
/// before they can flow into a generic `Array`/`List` slot (`i8*`). There is
/// no runtime box/unbox entry point in the ABI: boxing is a plain
/// `malloc`+`bitcast`+`store` inline in the emitted function, sized by
/// [`primitive_size`] and typed by [`primitive_ptr_type`].
pub fn is_unboxed(ty: &SemanticType) -> bool {
    matches!(ty.kind, TypeKind::Integer | TypeKind::Real | TypeKind::Boolean)
}

/// `sizeof` in bytes of a primitive's unboxed representation, for the
/// `malloc` call that allocates its boxed form.
pub fn primitive_size(ty: &SemanticType) -> u64 {
    match ty.kind {
        TypeKind::Integer => 4,
        TypeKind::Real => 8,
        TypeKind::Boolean => 1,
        _ => unreachable!("primitive_size is only called for unboxed primitive types"),
    }
}

/// The pointer type a boxed primitive's raw `i8*` is `bitcast` to before the
/// `store`/`load` that writes or reads its value.
pub fn primitive_ptr_type(ty: &SemanticType) -> &'static str {
    match ty.kind {
        TypeKind::Integer => "i32*",
        TypeKind::Real => "double*",
        TypeKind::Boolean => "i1*",
        _ => unreachable!("primitive_ptr_type is only called for unboxed primitive types"),
    }
}

pub fn print_format(ty: &SemanticType) -> &'static str {
    match ty.kind {
        TypeKind::Real => "@.fmt_real",
        _ => "@.fmt_int",
    }
}
