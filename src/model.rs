//! Intermediate model types — the bridge between clang extraction and header
//! emission.
//!
//! Declarations live in an arena owned by [`TypeModel`]; everything else
//! refers to them through [`DeclId`] indices. Type references are immutable
//! value trees and are replaced wholesale when a field is rewritten.

use std::collections::HashMap;
use std::path::PathBuf;

/// Index of a declaration in the model arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclId(pub u32);

/// Resolution status of a declaration or field.
///
/// `MacroArray`/`MacroList` mark declarations recovered from a
/// `DO_ARRAY_DEFINE`/`DO_LIST_DEFINE` expansion site; the emitter re-emits
/// those as the macro invocation instead of the expanded body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Ok,
    Unresolved,
    MacroArray,
    MacroList,
}

/// C++ class-key of a class-like declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassTag {
    Struct,
    Class,
    Union,
}

impl ClassTag {
    pub fn keyword(self) -> &'static str {
        match self {
            ClassTag::Struct => "struct",
            ClassTag::Class => "class",
            ClassTag::Union => "union",
        }
    }
}

/// cv-qualifier on a type reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
    Const,
    Volatile,
}

impl Qualifier {
    pub fn keyword(self) -> &'static str {
        match self {
            Qualifier::Const => "const",
            Qualifier::Volatile => "volatile",
        }
    }
}

/// Builtin C++ type kinds the model distinguishes.
///
/// Kinds past `Double` can be extracted but have no emission rule; the
/// emitter treats them as a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Void,
    Bool,
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    LongDouble,
    WChar,
    Char16,
    Char32,
}

impl Primitive {
    /// C spelling, used for name comparisons and diagnostics.
    pub fn spelling(self) -> &'static str {
        match self {
            Primitive::Void => "void",
            Primitive::Bool => "bool",
            Primitive::Char => "char",
            Primitive::UChar => "unsigned char",
            Primitive::Short => "short",
            Primitive::UShort => "unsigned short",
            Primitive::Int => "int",
            Primitive::UInt => "unsigned int",
            Primitive::Long => "long",
            Primitive::ULong => "unsigned long",
            Primitive::LongLong => "long long",
            Primitive::ULongLong => "unsigned long long",
            Primitive::Float => "float",
            Primitive::Double => "double",
            Primitive::LongDouble => "long double",
            Primitive::WChar => "wchar_t",
            Primitive::Char16 => "char16_t",
            Primitive::Char32 => "char32_t",
        }
    }

    /// Fixed-width spelling used in emitted headers. `None` means the kind
    /// has no emission rule.
    pub fn cstdint_spelling(self) -> Option<&'static str> {
        match self {
            Primitive::Void => Some("void"),
            Primitive::Bool => Some("bool"),
            Primitive::Char => Some("int8_t"),
            Primitive::UChar => Some("uint8_t"),
            Primitive::Short => Some("int16_t"),
            Primitive::UShort => Some("uint16_t"),
            Primitive::Int => Some("int32_t"),
            Primitive::UInt => Some("uint32_t"),
            Primitive::Long => Some("int64_t"),
            Primitive::ULong => Some("uint64_t"),
            Primitive::LongLong => Some("int64_t"),
            Primitive::ULongLong => Some("uint64_t"),
            Primitive::Float => Some("float"),
            Primitive::Double => Some("double"),
            _ => None,
        }
    }
}

/// How a field or element refers to a type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Primitive(Primitive),
    Typedef(DeclId),
    Decl(DeclId),
    Pointer(Box<TypeRef>),
    Array(Box<TypeRef>, usize),
    Qualified(Qualifier, Box<TypeRef>),
}

impl TypeRef {
    /// The innermost non-wrapper reference.
    pub fn core(&self) -> &TypeRef {
        match self {
            TypeRef::Pointer(inner) | TypeRef::Array(inner, _) | TypeRef::Qualified(_, inner) => {
                inner.core()
            }
            other => other,
        }
    }

    /// Replace the innermost reference, preserving all outer wrappers.
    pub fn replace_core(&mut self, new: TypeRef) {
        match self {
            TypeRef::Pointer(inner) | TypeRef::Array(inner, _) | TypeRef::Qualified(_, inner) => {
                inner.replace_core(new)
            }
            other => *other = new,
        }
    }

    /// True if any level of the wrapper chain is a pointer.
    pub fn has_pointer(&self) -> bool {
        match self {
            TypeRef::Pointer(_) => true,
            TypeRef::Array(inner, _) | TypeRef::Qualified(_, inner) => inner.has_pointer(),
            _ => false,
        }
    }

    /// Number of pointer levels down to the core.
    pub fn pointer_depth(&self) -> usize {
        match self {
            TypeRef::Pointer(inner) => 1 + inner.pointer_depth(),
            TypeRef::Array(inner, _) | TypeRef::Qualified(_, inner) => inner.pointer_depth(),
            _ => 0,
        }
    }
}

/// A data member of a class-like declaration.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub ty: TypeRef,
    /// Byte size of the field type (clang `sizeof`), used by the fast-path
    /// layout comparison. 0 when clang could not compute it.
    pub size: usize,
    pub bit_width: Option<usize>,
    pub attrs: Vec<String>,
    pub comment: Option<String>,
    pub status: Status,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeRef, size: usize) -> Self {
        Field {
            name: name.into(),
            ty,
            size,
            bit_width: None,
            attrs: Vec::new(),
            comment: None,
            status: Status::Ok,
        }
    }
}

/// One enumerator: name plus value-expression string.
#[derive(Debug, Clone)]
pub struct EnumItem {
    pub name: String,
    pub value: String,
}

/// Class-like declaration payload (struct/class/union).
#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub tag: ClassTag,
    /// 0 for forward declarations.
    pub size: usize,
    pub bases: Vec<TypeRef>,
    pub fields: Vec<Field>,
    pub nested: Vec<DeclId>,
}

/// Enum declaration payload.
#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub size: usize,
    pub items: Vec<EnumItem>,
}

/// Typedef declaration payload.
#[derive(Debug, Clone)]
pub struct TypedefDecl {
    pub element: TypeRef,
}

#[derive(Debug, Clone)]
pub enum DeclKind {
    Class(ClassDecl),
    Enum(EnumDecl),
    Typedef(TypedefDecl),
}

/// A named top-level type from one of the two headers.
#[derive(Debug, Clone)]
pub struct Decl {
    /// Unqualified name (the immediate namespace is stored separately).
    pub name: String,
    pub namespace: Option<String>,
    pub file: PathBuf,
    /// Byte offset of the span start within `file`.
    pub offset: u32,
    pub comment: Option<String>,
    pub status: Status,
    pub kind: DeclKind,
}

impl Decl {
    pub fn size(&self) -> usize {
        match &self.kind {
            DeclKind::Class(c) => c.size,
            DeclKind::Enum(e) => e.size,
            DeclKind::Typedef(_) => 0,
        }
    }

    pub fn as_class(&self) -> Option<&ClassDecl> {
        match &self.kind {
            DeclKind::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_class_mut(&mut self) -> Option<&mut ClassDecl> {
        match &mut self.kind {
            DeclKind::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumDecl> {
        match &self.kind {
            DeclKind::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_class(&self) -> bool {
        matches!(self.kind, DeclKind::Class(_))
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.kind, DeclKind::Enum(_))
    }

    pub fn is_typedef(&self) -> bool {
        matches!(self.kind, DeclKind::Typedef(_))
    }
}

/// The reconciliation model: both declaration forests plus the engine's
/// working state.
#[derive(Debug, Default)]
pub struct TypeModel {
    pub decls: Vec<Decl>,
    /// Input-header declarations: typedefs ++ enums ++ classes, sorted by
    /// source span.
    pub input: Vec<DeclId>,
    /// `app`-namespace enums and classes of the target header, sorted by
    /// source span.
    pub target: Vec<DeclId>,
    /// All top-level target declarations plus the `app` members; used for
    /// reference resolution.
    pub target_global: Vec<DeclId>,
    /// Configured known/remap-target types looked up in the input forest.
    pub prebuilt: HashMap<String, TypeRef>,
    /// Per-target-declaration list of additional types that must be emitted
    /// before it; first element emitted first.
    pub insertions: HashMap<DeclId, Vec<TypeRef>>,
    /// File the target compilation actually parsed (the scratch copy when
    /// the `size_t` workaround kicked in).
    pub target_file: PathBuf,
}

impl TypeModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_decl(&mut self, decl: Decl) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(decl);
        id
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.0 as usize]
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.decls[id.0 as usize]
    }

    /// Name of the core type a reference denotes. Primitives use their C
    /// spelling.
    pub fn type_name(&self, tref: &TypeRef) -> String {
        match tref.core() {
            TypeRef::Primitive(p) => p.spelling().to_string(),
            TypeRef::Typedef(id) | TypeRef::Decl(id) => self.decl(*id).name.clone(),
            // core() never returns a wrapper
            _ => unreachable!("core() returned a wrapper"),
        }
    }
}
