//! Emitter — model types → reconciled header text.
//!
//! Output order is part of the contract: preamble, global typedefs,
//! built-in classes, then `namespace app` with enums, inserted enums,
//! and classes (each preceded by its non-enum insertion list) in
//! target-list order. Identical inputs and configuration produce
//! byte-identical output.

use tracing::debug;

use crate::config::Config;
use crate::error::Error;
use crate::model::{DeclId, DeclKind, Field, Qualifier, Status, TypeModel, TypeRef};

/// Fixed header preamble, emitted verbatim.
pub const PREAMBLE: &str = r####"#pragma once
#if defined(__i386__) || defined(__arm__)
#define IS_32BIT
#endif
#ifndef DO_ARRAY_DEFINE
#define DO_ARRAY_DEFINE(E_NAME) \
struct  E_NAME ## __Array { \
Il2CppClass *klass; \
MonitorData *monitor; \
Il2CppArrayBounds *bounds; \
il2cpp_array_size_t max_length; \
E_NAME vector[32]; \
};
#endif
#ifndef DO_LIST_DEFINE
#define DO_LIST_DEFINE(E_NAME) \
DO_ARRAY_DEFINE(E_NAME) \
struct List_1_ ## E_NAME { \
Il2CppClass *klass; \
MonitorData *monitor; \
struct E_NAME ## __Array *_items; \
int32_t _size; \
int32_t _version; \
};
#endif

#include <cstdint>
#include "il2cpp-class.h"
"####;

/// Emit the whole reconciled header.
pub fn emit_header(model: &TypeModel, cfg: &Config) -> Result<String, Error> {
    let mut out = String::new();
    out.push_str(PREAMBLE);
    out.push('\n');

    // Global typedefs declared in the target header itself. The injected
    // size_t workaround typedef is not part of the type universe.
    for &id in &model.target_global {
        let d = model.decl(id);
        if d.is_typedef()
            && d.namespace.is_none()
            && d.file == model.target_file
            && d.name != "size_t"
        {
            out.push_str(&emit_typedef(model, cfg, id)?);
            out.push_str(";\n");
        }
    }
    out.push('\n');

    // Built-in known types the target compilation defines as classes.
    for name in cfg.built_in_names() {
        let hit = model.target_global.iter().copied().find(|&id| {
            let d = model.decl(id);
            d.is_class() && d.name == *name
        });
        if let Some(id) = hit {
            out.push_str(&emit_class(model, cfg, id, false)?);
            out.push_str(";\n\n");
        }
    }

    out.push_str("namespace app {\n");

    for &id in &model.target {
        if model.decl(id).is_enum() {
            out.push_str(&emit_enum(model, id));
            out.push_str(";\n\n");
        }
    }

    // Inserted enums, in discovery order.
    for &id in &model.target {
        let Some(list) = model.insertions.get(&id) else {
            continue;
        };
        for tref in list {
            if let TypeRef::Decl(dep) = tref.core()
                && model.decl(*dep).is_enum()
            {
                out.push_str(&emit_enum(model, *dep));
                out.push_str(";\n\n");
            }
        }
    }

    for &id in &model.target {
        let d = model.decl(id);
        if !d.is_class() {
            continue;
        }
        match d.status {
            Status::Unresolved => continue,
            Status::MacroArray => {
                if let Some(base) = d.name.strip_suffix("__Array") {
                    out.push_str(&format!("DO_ARRAY_DEFINE({base})\n\n"));
                }
            }
            Status::MacroList => {
                // the array half of a list expansion is covered by the macro
                if d.name.ends_with("__Array") {
                    continue;
                }
                let base = d.name.strip_prefix("List_1_").unwrap_or(&d.name);
                out.push_str(&format!("DO_LIST_DEFINE({base})\n\n"));
            }
            Status::Ok => {
                if let Some(list) = model.insertions.get(&id) {
                    for tref in list {
                        let TypeRef::Decl(dep) = tref.core() else {
                            continue;
                        };
                        if model.decl(*dep).is_enum() {
                            continue; // already emitted with the other enums
                        }
                        out.push_str(&emit_decl(model, cfg, *dep)?);
                        out.push_str(";\n\n");
                    }
                }
                out.push_str(&emit_class(model, cfg, id, false)?);
                out.push_str(";\n\n");
            }
        }
    }

    out.push_str("}\n");
    debug!(bytes = out.len(), "header emitted");
    Ok(out)
}

/// Emit any declaration kind as a full definition.
pub fn emit_decl(model: &TypeModel, cfg: &Config, id: DeclId) -> Result<String, Error> {
    match model.decl(id).kind {
        DeclKind::Class(_) => emit_class(model, cfg, id, false),
        DeclKind::Enum(_) => Ok(emit_enum(model, id)),
        DeclKind::Typedef(_) => emit_typedef(model, cfg, id),
    }
}

/// Emit a class definition, or just `<class-key> Name` for forward
/// declarations and declaration-only mode.
pub fn emit_class(
    model: &TypeModel,
    cfg: &Config,
    id: DeclId,
    declaration_only: bool,
) -> Result<String, Error> {
    let d = model.decl(id);
    let Some(c) = d.as_class() else {
        return Err(Error::Emission(format!("`{}` is not a class", d.name)));
    };
    let mut s = format!("{} {}", c.tag.keyword(), d.name);
    if c.size == 0 || declaration_only {
        return Ok(s);
    }
    if !c.bases.is_empty() {
        // base order mirrors the source convention: last base first
        let mut names = Vec::with_capacity(c.bases.len());
        for base in c.bases.iter().rev() {
            names.push(resolved_name(model, cfg, base).0);
        }
        s.push_str(&format!(" : {}", names.join(", ")));
    }
    s.push_str(" {\n");
    for f in &c.fields {
        s.push_str("    ");
        s.push_str(&emit_field(model, cfg, f)?);
        s.push_str(";\n");
    }
    for &nested in &c.nested {
        s.push_str("    ");
        s.push_str(&emit_decl(model, cfg, nested)?);
        s.push_str(";\n");
    }
    s.push('}');
    Ok(s)
}

/// Emit `enum Name` (item-less) or the full item list.
pub fn emit_enum(model: &TypeModel, id: DeclId) -> String {
    let d = model.decl(id);
    let Some(e) = d.as_enum() else {
        return format!("enum {}", d.name);
    };
    if e.items.is_empty() {
        return format!("enum {}", d.name);
    }
    let mut s = format!("enum {} {{\n", d.name);
    for item in &e.items {
        s.push_str(&format!("    {} = {},\n", item.name, item.value));
    }
    s.push('}');
    s
}

/// Emit `typedef <element-definition> <name>`.
pub fn emit_typedef(model: &TypeModel, cfg: &Config, id: DeclId) -> Result<String, Error> {
    let d = model.decl(id);
    let DeclKind::Typedef(td) = &d.kind else {
        return Err(Error::Emission(format!("`{}` is not a typedef", d.name)));
    };
    Ok(format!("typedef {}", declarator(model, cfg, &td.element, &d.name)?))
}

/// Emit one field: comment, attributes, declarator, bitfield width.
pub fn emit_field(model: &TypeModel, cfg: &Config, f: &Field) -> Result<String, Error> {
    let mut s = String::new();
    match f.status {
        Status::Unresolved => s.push_str("/* Unresolved */ "),
        _ => {
            if let Some(comment) = &f.comment {
                s.push_str(&format!("/* {comment} */ "));
            }
        }
    }
    for attr in &f.attrs {
        if attr.starts_with("alignas") {
            s.push_str("alignas(8) ");
        } else {
            s.push_str(attr);
            s.push(' ');
        }
    }
    s.push_str(&declarator(model, cfg, &f.ty, &f.name)?);
    if let Some(width) = f.bit_width {
        s.push_str(&format!(" : {width}"));
    }
    Ok(s)
}

/// Spell a type reference applied to a declarator name.
fn declarator(model: &TypeModel, cfg: &Config, tref: &TypeRef, name: &str) -> Result<String, Error> {
    if let TypeRef::Array(elem, len) = tref {
        return Ok(format!("{}[{len}]", declarator(model, cfg, elem, name)?));
    }
    if tref.has_pointer() {
        let stars = "*".repeat(tref.pointer_depth());
        let base = pointer_base_text(model, cfg, tref)?;
        return Ok(format!("{base}{stars} {name}"));
    }
    match tref {
        TypeRef::Qualified(q, inner) => Ok(format!(
            "{} {}",
            q.keyword(),
            declarator(model, cfg, inner, name)?
        )),
        TypeRef::Primitive(p) => {
            let spelled = p
                .cstdint_spelling()
                .ok_or_else(|| Error::Emission(format!("primitive kind `{}`", p.spelling())))?;
            Ok(format!("{spelled} {name}"))
        }
        TypeRef::Typedef(_) | TypeRef::Decl(_) => {
            let (spelled, _) = resolved_name(model, cfg, tref);
            Ok(format!("{spelled} {name}"))
        }
        // Array and Pointer were handled above.
        _ => Err(Error::Emission(format!("declarator for `{name}`"))),
    }
}

/// Spelling of a pointer's base: cv-qualifiers, elaborated class-key for
/// size-0 pointees, then the resolved type name.
fn pointer_base_text(model: &TypeModel, cfg: &Config, tref: &TypeRef) -> Result<String, Error> {
    let mut quals: Vec<Qualifier> = Vec::new();
    let mut cur = tref;
    loop {
        match cur {
            TypeRef::Pointer(inner) | TypeRef::Array(inner, _) => cur = inner.as_ref(),
            TypeRef::Qualified(q, inner) => {
                quals.push(*q);
                cur = inner.as_ref();
            }
            _ => break,
        }
    }

    let mut s = String::new();
    for q in quals {
        s.push_str(q.keyword());
        s.push(' ');
    }
    match cur {
        TypeRef::Primitive(p) => {
            let spelled = p
                .cstdint_spelling()
                .ok_or_else(|| Error::Emission(format!("primitive kind `{}`", p.spelling())))?;
            s.push_str(spelled);
        }
        TypeRef::Typedef(_) | TypeRef::Decl(_) => {
            let (name, resolved) = resolved_name(model, cfg, cur);
            if let Some(rid) = resolved
                && let Some(c) = model.decl(rid).as_class()
                && c.size == 0
            {
                s.push_str(c.tag.keyword());
                s.push(' ');
            }
            s.push_str(&name);
        }
        other => return Err(Error::Emission(format!("pointer base `{other:?}`"))),
    }
    Ok(s)
}

/// Resolve a named reference to its target-global declaration for spelling;
/// references with no target counterpart keep their own name (inserted
/// input types, prebuilt remap targets).
fn resolved_name(model: &TypeModel, cfg: &Config, tref: &TypeRef) -> (String, Option<DeclId>) {
    if let Some(id) = model.find_by_type(&model.target_global, tref.core(), cfg) {
        return (model.decl(id).name.clone(), Some(id));
    }
    match tref.core() {
        TypeRef::Typedef(id) | TypeRef::Decl(id) => (model.decl(*id).name.clone(), Some(*id)),
        TypeRef::Primitive(p) => (p.spelling().to_string(), None),
        other => (format!("{other:?}"), None),
    }
}
