//! Emission formatting: the fixed primitive table, pointer and array
//! spelling, bitfields, base order, macro preamble.

use std::path::PathBuf;

use hdrmend::config::Config;
use hdrmend::emit::{self, PREAMBLE};
use hdrmend::model::{
    ClassDecl, ClassTag, Decl, DeclId, DeclKind, EnumDecl, Field, Primitive, Qualifier, Status,
    TypeModel, TypeRef,
};

fn add_class(model: &mut TypeModel, name: &str, size: usize, fields: Vec<Field>) -> DeclId {
    add_class_with_bases(model, name, size, fields, Vec::new())
}

fn add_class_with_bases(
    model: &mut TypeModel,
    name: &str,
    size: usize,
    fields: Vec<Field>,
    bases: Vec<TypeRef>,
) -> DeclId {
    model.add_decl(Decl {
        name: name.to_string(),
        namespace: None,
        file: PathBuf::from("app_types.h"),
        offset: model.decls.len() as u32 * 16,
        comment: None,
        status: Status::Ok,
        kind: DeclKind::Class(ClassDecl {
            tag: ClassTag::Struct,
            size,
            bases,
            fields,
            nested: Vec::new(),
        }),
    })
}

#[test]
fn primitive_spelling_table() {
    let model = TypeModel::new();
    let cfg = Config::default();
    let table = [
        (Primitive::Void, "void f"),
        (Primitive::Bool, "bool f"),
        (Primitive::Char, "int8_t f"),
        (Primitive::UChar, "uint8_t f"),
        (Primitive::Short, "int16_t f"),
        (Primitive::UShort, "uint16_t f"),
        (Primitive::Int, "int32_t f"),
        (Primitive::UInt, "uint32_t f"),
        (Primitive::Long, "int64_t f"),
        (Primitive::ULong, "uint64_t f"),
        (Primitive::LongLong, "int64_t f"),
        (Primitive::ULongLong, "uint64_t f"),
        (Primitive::Float, "float f"),
        (Primitive::Double, "double f"),
    ];
    for (prim, expected) in table {
        let field = Field::new("f", TypeRef::Primitive(prim), 0);
        let got = emit::emit_field(&model, &cfg, &field).unwrap();
        assert_eq!(got, expected);
    }
}

#[test]
fn unmapped_primitive_is_a_fatal_emission_error() {
    let model = TypeModel::new();
    let cfg = Config::default();
    let field = Field::new("w", TypeRef::Primitive(Primitive::WChar), 4);
    assert!(emit::emit_field(&model, &cfg, &field).is_err());
}

#[test]
fn pointer_to_forward_declaration_spells_the_class_key() {
    let mut model = TypeModel::new();
    let cfg = Config::default();
    let ghost = add_class(&mut model, "Ghost", 0, Vec::new());
    let field = Field::new(
        "p",
        TypeRef::Pointer(Box::new(TypeRef::Pointer(Box::new(TypeRef::Decl(ghost))))),
        8,
    );
    let got = emit::emit_field(&model, &cfg, &field).unwrap();
    assert_eq!(got, "struct Ghost** p");
}

#[test]
fn qualified_pointer_spelling() {
    let mut model = TypeModel::new();
    let cfg = Config::default();
    let bar = add_class(
        &mut model,
        "Bar",
        4,
        vec![Field::new("y", TypeRef::Primitive(Primitive::Int), 4)],
    );
    let field = Field::new(
        "q",
        TypeRef::Pointer(Box::new(TypeRef::Qualified(
            Qualifier::Const,
            Box::new(TypeRef::Decl(bar)),
        ))),
        8,
    );
    let got = emit::emit_field(&model, &cfg, &field).unwrap();
    assert_eq!(got, "const Bar* q");
}

#[test]
fn array_size_follows_the_field_name() {
    let model = TypeModel::new();
    let cfg = Config::default();
    let field = Field::new(
        "data",
        TypeRef::Array(Box::new(TypeRef::Primitive(Primitive::Int)), 32),
        128,
    );
    let got = emit::emit_field(&model, &cfg, &field).unwrap();
    assert_eq!(got, "int32_t data[32]");
}

#[test]
fn bitfield_width_is_appended() {
    let model = TypeModel::new();
    let cfg = Config::default();
    let mut field = Field::new("flags", TypeRef::Primitive(Primitive::UChar), 1);
    field.bit_width = Some(3);
    let got = emit::emit_field(&model, &cfg, &field).unwrap();
    assert_eq!(got, "uint8_t flags : 3");
}

#[test]
fn alignment_attribute_is_normalized() {
    let model = TypeModel::new();
    let cfg = Config::default();
    let mut field = Field::new("x", TypeRef::Primitive(Primitive::Int), 4);
    field.attrs.push("alignas(0x8)".to_string());
    let got = emit::emit_field(&model, &cfg, &field).unwrap();
    assert_eq!(got, "alignas(8) int32_t x");
}

#[test]
fn field_comment_is_preserved() {
    let model = TypeModel::new();
    let cfg = Config::default();
    let mut field = Field::new("x", TypeRef::Primitive(Primitive::Int), 4);
    field.comment = Some("offset 0x10".to_string());
    let got = emit::emit_field(&model, &cfg, &field).unwrap();
    assert_eq!(got, "/* offset 0x10 */ int32_t x");
}

#[test]
fn unresolved_marker_replaces_the_comment() {
    let model = TypeModel::new();
    let cfg = Config::default();
    let mut field = Field::new("x", TypeRef::Primitive(Primitive::Int), 4);
    field.comment = Some("offset 0x10".to_string());
    field.status = Status::Unresolved;
    let got = emit::emit_field(&model, &cfg, &field).unwrap();
    assert_eq!(got, "/* Unresolved */ int32_t x");
}

#[test]
fn base_list_is_emitted_in_reverse_order() {
    let mut model = TypeModel::new();
    let cfg = Config::default();
    let a = add_class(&mut model, "BaseA", 4, Vec::new());
    let b = add_class(&mut model, "BaseB", 4, Vec::new());
    let c = add_class_with_bases(
        &mut model,
        "C",
        8,
        vec![Field::new("z", TypeRef::Primitive(Primitive::Int), 4)],
        vec![TypeRef::Decl(a), TypeRef::Decl(b)],
    );
    let got = emit::emit_class(&model, &cfg, c, false).unwrap();
    assert!(got.starts_with("struct C : BaseB, BaseA {"), "got: {got}");
}

#[test]
fn forward_declaration_emits_head_only() {
    let mut model = TypeModel::new();
    let cfg = Config::default();
    let ghost = add_class(&mut model, "Ghost", 0, Vec::new());
    assert_eq!(emit::emit_class(&model, &cfg, ghost, false).unwrap(), "struct Ghost");

    let full = add_class(
        &mut model,
        "Full",
        4,
        vec![Field::new("x", TypeRef::Primitive(Primitive::Int), 4)],
    );
    assert_eq!(emit::emit_class(&model, &cfg, full, true).unwrap(), "struct Full");
}

#[test]
fn itemless_enum_emits_head_only() {
    let mut model = TypeModel::new();
    let id = model.add_decl(Decl {
        name: "E".to_string(),
        namespace: None,
        file: PathBuf::from("app_types.h"),
        offset: 0,
        comment: None,
        status: Status::Ok,
        kind: DeclKind::Enum(EnumDecl {
            size: 4,
            items: Vec::new(),
        }),
    });
    assert_eq!(emit::emit_enum(&model, id), "enum E");
}

#[test]
fn preamble_is_verbatim() {
    assert!(PREAMBLE.starts_with("#pragma once\n"));
    assert!(PREAMBLE.contains("#define IS_32BIT"));
    // double space after `struct` is part of the literal
    assert!(PREAMBLE.contains("struct  E_NAME ## __Array { \\"));
    assert!(PREAMBLE.contains("DO_ARRAY_DEFINE(E_NAME) \\"));
    assert!(PREAMBLE.ends_with("#include <cstdint>\n#include \"il2cpp-class.h\"\n"));
}
