//! Name identity — decides whether two type names (or type references)
//! denote the same logical type across the mangling the two headers use.
//!
//! The input header disambiguates duplicate names with a numeric suffix
//! (`Foo_3`) and tags enums with a `__Enum` token (`Col__Enum`); the target
//! header carries the canonical spellings (`Foo`, `Col`). Reserved suffixes
//! (`__Array`, `__Class`, ...) carry semantic meaning and never collapse
//! across.

use crate::config::Config;
use crate::model::{DeclKind, TypeModel, TypeRef};

/// Do two type-name strings denote the same logical type?
///
/// The remap table is applied to both sides, so the relation stays
/// symmetric.
pub fn names_match(cfg: &Config, a: &str, b: &str) -> bool {
    let a = cfg.remap(a);
    let b = cfg.remap(b);

    // A reserved suffix present on one side only is a semantic difference.
    for suffix in cfg.known_reserved_suffixes.keys() {
        if a.ends_with(suffix.as_str()) != b.ends_with(suffix.as_str()) {
            return false;
        }
    }

    let a = a.replace("__Enum", "");
    let b = b.replace("__Enum", "");

    match (a.contains('_'), b.contains('_')) {
        (true, false) => mangled_base(&a) == b,
        (false, true) => a == mangled_base(&b),
        _ => a == b,
    }
}

/// Portion of a mangled name before its last `_` (`Foo_3` → `Foo`).
fn mangled_base(name: &str) -> &str {
    match name.rfind('_') {
        Some(pos) => &name[..pos],
        None => name,
    }
}

/// Strip a leading `<ns>::` qualifier when it names the declaration's own
/// namespace.
pub fn strip_namespace<'a>(name: &'a str, namespace: Option<&str>) -> &'a str {
    if let Some(ns) = namespace
        && let Some(rest) = name.strip_prefix(ns)
        && let Some(rest) = rest.strip_prefix("::")
    {
        return rest;
    }
    name
}

/// Is this a generic-instantiation name (`List_1_Foo`, `Action_2_T_U`)?
///
/// The arity digits after the first `_` must be followed by a further `_`
/// component: a bare numeric tail (`Bar_2`) is a duplicate-name suffix,
/// not a generic arity.
pub fn is_generic(cfg: &Config, name: &str) -> bool {
    let Some(pos) = name.find('_') else {
        return false;
    };
    let tail = &name[pos + 1..];
    if !tail.starts_with(|c: char| c.is_ascii_digit()) {
        return false;
    }
    let rest = tail.trim_start_matches(|c: char| c.is_ascii_digit());
    if !rest.starts_with('_') {
        return false;
    }
    !cfg.known_reserved_suffixes
        .keys()
        .any(|s| name.ends_with(s.as_str()))
}

/// Structural equality of two type references under the name rules.
///
/// References whose genericity differs are never the same.
pub fn typerefs_match(cfg: &Config, model: &TypeModel, a: &TypeRef, b: &TypeRef) -> bool {
    match (a, b) {
        (TypeRef::Primitive(x), TypeRef::Primitive(y)) => x == y,
        (TypeRef::Pointer(x), TypeRef::Pointer(y)) => typerefs_match(cfg, model, x, y),
        (TypeRef::Array(x, n), TypeRef::Array(y, m)) => {
            n == m && typerefs_match(cfg, model, x, y)
        }
        (TypeRef::Qualified(qx, x), TypeRef::Qualified(qy, y)) => {
            qx == qy && typerefs_match(cfg, model, x, y)
        }
        (TypeRef::Typedef(x), TypeRef::Typedef(y)) => named_match(cfg, model, *x, *y),
        (TypeRef::Decl(x), TypeRef::Decl(y)) => {
            let (dx, dy) = (model.decl(*x), model.decl(*y));
            match (&dx.kind, &dy.kind) {
                (DeclKind::Class(_), DeclKind::Class(_)) | (DeclKind::Enum(_), DeclKind::Enum(_)) => {
                    named_match(cfg, model, *x, *y)
                }
                _ => false,
            }
        }
        _ => false,
    }
}

fn named_match(
    cfg: &Config,
    model: &TypeModel,
    a: crate::model::DeclId,
    b: crate::model::DeclId,
) -> bool {
    let da = model.decl(a);
    let db = model.decl(b);
    let an = strip_namespace(&da.name, da.namespace.as_deref());
    let bn = strip_namespace(&db.name, db.namespace.as_deref());
    if is_generic(cfg, an) != is_generic(cfg, bn) {
        return false;
    }
    names_match(cfg, an, bn)
}

/// Does a reference denote the given declaration? The declaration side is
/// lifted to a reference of the matching kind.
pub fn typeref_matches_decl(
    cfg: &Config,
    model: &TypeModel,
    tref: &TypeRef,
    id: crate::model::DeclId,
) -> bool {
    let as_ref = match model.decl(id).kind {
        DeclKind::Typedef(_) => TypeRef::Typedef(id),
        _ => TypeRef::Decl(id),
    };
    typerefs_match(cfg, model, tref.core(), &as_ref)
}
