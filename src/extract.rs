//! Extraction — clang `Entity`/`Type` → intermediate model.
//!
//! Both headers are parsed with identical options into one arena so that
//! cross-header references stay cheap indices. Every record/enum/typedef
//! entity a field mentions is interned (USR-keyed, cycle-safe), whether or
//! not it ends up in a registry list.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clang::diagnostic::Severity;
use clang::{Entity, EntityKind, Index, TranslationUnit, Type as ClangType, TypeKind};
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::error::Error;
use crate::model::{
    ClassDecl, ClassTag, Decl, DeclId, DeclKind, EnumDecl, EnumItem, Field, Primitive, Qualifier,
    Status, TypeModel, TypeRef, TypedefDecl,
};
use crate::registry;

/// Build the reconciliation model from the two headers.
pub fn build_type_model(
    index: &Index,
    cfg: &Config,
    input_path: &Path,
    target_path: &Path,
    sysroot: &Path,
) -> Result<TypeModel, Error> {
    let args = clang_args(target_path, sysroot);
    let mut model = TypeModel::new();

    // Input compilation: typedefs ++ enums ++ classes, in that order.
    {
        let (tu, errors) = parse_unit(index, input_path, &args)?;
        if !errors.is_empty() {
            for msg in &errors {
                tracing::error!(error = %msg, "input parse error");
            }
            return Err(Error::ParseFailure {
                path: input_path.to_path_buf(),
                count: errors.len(),
                messages: errors,
            });
        }
        collect_input(&mut model, &tu);
    }

    // Target compilation, with the size_t reparse workaround.
    let target_text;
    {
        let (tu, text, parsed_path) = parse_target(index, target_path, &args)?;
        target_text = text;
        model.target_file = parsed_path;
        collect_target(&mut model, &tu)?;
    }

    apply_macro_markers(&mut model, &target_text);

    registry::sort_by_source_span(&model.decls, &mut model.input, true)?;
    registry::sort_by_source_span(&model.decls, &mut model.target, false)?;
    registry::sort_by_source_span(&model.decls, &mut model.target_global, false)?;

    model.load_prebuilt(cfg);

    // Forward declarations carry no layout to reconcile.
    let decls = &model.decls;
    model.target.retain(|&id| decls[id.0 as usize].size() > 0);

    debug!(
        input = model.input.len(),
        target = model.target.len(),
        target_global = model.target_global.len(),
        prebuilt = model.prebuilt.len(),
        "type model built"
    );

    Ok(model)
}

/// Parser arguments shared by both compilations.
fn clang_args(target_path: &Path, sysroot: &Path) -> Vec<String> {
    let mut args = vec![
        "-x".to_string(),
        "c++".to_string(),
        "--target=aarch64-linux-gnu".to_string(),
        "-D_IDACLANG_=1".to_string(),
    ];
    if let Some(dir) = target_path.parent() {
        args.push(format!("-I{}", dir.display()));
    }
    args.push(format!("-I{}", sysroot.display()));
    args
}

/// Parse one translation unit and return it with any error-severity
/// diagnostic texts.
fn parse_unit<'i>(
    index: &'i Index,
    path: &Path,
    args: &[String],
) -> Result<(TranslationUnit<'i>, Vec<String>), Error> {
    debug!(path = %path.display(), "parsing header");
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    let tu = index
        .parser(path)
        .arguments(&arg_refs)
        .detailed_preprocessing_record(true)
        .parse()
        .map_err(|e| Error::Clang(format!("failed to parse {}: {e:?}", path.display())))?;
    let errors: Vec<String> = tu
        .get_diagnostics()
        .iter()
        .filter(|d| matches!(d.get_severity(), Severity::Error | Severity::Fatal))
        .map(|d| d.get_text())
        .collect();
    Ok((tu, errors))
}

/// Parse the target header. A failed first parse is retried once with
/// `typedef unsigned long size_t;` injected after `#pragma once`, via a
/// scratch copy under the system temp directory. Returns the translation
/// unit, the raw text that was actually parsed, and its path.
fn parse_target<'i>(
    index: &'i Index,
    path: &Path,
    args: &[String],
) -> Result<(TranslationUnit<'i>, String, PathBuf), Error> {
    let text = std::fs::read_to_string(path)?;
    let (tu, errors) = parse_unit(index, path, args)?;
    if errors.is_empty() {
        return Ok((tu, text, path.to_path_buf()));
    }
    drop(tu);

    let patched = inject_size_t(&text);
    let scratch_dir = std::env::temp_dir().join("hdrmend_scratch");
    std::fs::create_dir_all(&scratch_dir)?;
    let scratch = scratch_dir.join(path.file_name().unwrap_or_else(|| "target.h".as_ref()));
    std::fs::write(&scratch, &patched)?;
    debug!(scratch = %scratch.display(), "retrying target parse with size_t injected");

    let (tu, errors) = parse_unit(index, &scratch, args)?;
    if !errors.is_empty() {
        for msg in &errors {
            tracing::error!(error = %msg, "target parse error");
        }
        return Err(Error::ParseFailure {
            path: path.to_path_buf(),
            count: errors.len(),
            messages: errors,
        });
    }
    Ok((tu, patched, scratch))
}

/// Insert the `size_t` typedef after `#pragma once` (or at the top when the
/// pragma is absent).
fn inject_size_t(text: &str) -> String {
    const TYPEDEF: &str = "typedef unsigned long size_t;\n";
    match text.find("#pragma once") {
        Some(pos) => {
            let line_end = text[pos..]
                .find('\n')
                .map(|n| pos + n + 1)
                .unwrap_or(text.len());
            format!("{}{}{}", &text[..line_end], TYPEDEF, &text[line_end..])
        }
        None => format!("{TYPEDEF}{text}"),
    }
}

// ---------------------------------------------------------------------------
// Top-level collection
// ---------------------------------------------------------------------------

fn collect_input(model: &mut TypeModel, tu: &TranslationUnit) {
    let mut ctx = ExtractCtx::new(model);
    let mut typedefs = ListBuilder::new();
    let mut enums = ListBuilder::new();
    let mut classes = ListBuilder::new();

    for entity in tu.get_entity().get_children() {
        let bucket = match entity.get_kind() {
            EntityKind::TypedefDecl => &mut typedefs,
            EntityKind::EnumDecl => &mut enums,
            EntityKind::StructDecl | EntityKind::ClassDecl | EntityKind::UnionDecl => &mut classes,
            _ => continue,
        };
        match ctx.intern(&entity, None) {
            Ok(id) => bucket.push(id),
            Err(e) => warn!(err = %e, "skipping input declaration"),
        }
    }

    let mut input = typedefs.ids;
    input.extend(enums.ids);
    input.extend(classes.ids);
    ctx.model.input = input;
}

fn collect_target(model: &mut TypeModel, tu: &TranslationUnit) -> Result<(), Error> {
    let mut ctx = ExtractCtx::new(model);
    let mut target = ListBuilder::new();
    let mut global = ListBuilder::new();
    let mut found_app = false;

    for entity in tu.get_entity().get_children() {
        match entity.get_kind() {
            EntityKind::Namespace if entity.get_name().as_deref() == Some("app") => {
                found_app = true;
                for member in entity.get_children() {
                    match member.get_kind() {
                        EntityKind::EnumDecl
                        | EntityKind::StructDecl
                        | EntityKind::ClassDecl
                        | EntityKind::UnionDecl => match ctx.intern(&member, Some("app")) {
                            Ok(id) => {
                                target.push(id);
                                global.push(id);
                            }
                            Err(e) => warn!(err = %e, "skipping app declaration"),
                        },
                        EntityKind::TypedefDecl => match ctx.intern(&member, Some("app")) {
                            Ok(id) => global.push(id),
                            Err(e) => warn!(err = %e, "skipping app typedef"),
                        },
                        _ => {}
                    }
                }
            }
            EntityKind::TypedefDecl
            | EntityKind::EnumDecl
            | EntityKind::StructDecl
            | EntityKind::ClassDecl
            | EntityKind::UnionDecl => match ctx.intern(&entity, None) {
                Ok(id) => global.push(id),
                Err(e) => warn!(err = %e, "skipping target declaration"),
            },
            _ => {}
        }
    }

    if !found_app {
        return Err(Error::MissingAppNamespace);
    }

    ctx.model.target = target.ids;
    ctx.model.target_global = global.ids;
    Ok(())
}

/// Ordered id list with O(1) duplicate suppression.
struct ListBuilder {
    ids: Vec<DeclId>,
    seen: HashSet<DeclId>,
}

impl ListBuilder {
    fn new() -> Self {
        ListBuilder {
            ids: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn push(&mut self, id: DeclId) {
        if self.seen.insert(id) {
            self.ids.push(id);
        }
    }
}

// ---------------------------------------------------------------------------
// Entity interning
// ---------------------------------------------------------------------------

struct ExtractCtx<'m> {
    model: &'m mut TypeModel,
    by_usr: HashMap<String, DeclId>,
}

impl<'m> ExtractCtx<'m> {
    fn new(model: &'m mut TypeModel) -> Self {
        ExtractCtx {
            model,
            by_usr: HashMap::new(),
        }
    }

    /// Intern a declaration entity, preferring its definition when one
    /// exists. Recursive references resolve through the USR map, so cyclic
    /// type graphs terminate.
    fn intern(&mut self, entity: &Entity, namespace: Option<&str>) -> Result<DeclId> {
        let entity = entity.get_definition().unwrap_or(*entity);
        let usr = entity
            .get_usr()
            .map(|u| u.0)
            .context("declaration has no USR")?;
        if let Some(&id) = self.by_usr.get(&usr) {
            return Ok(id);
        }

        let (file, offset) = entity
            .get_range()
            .map(|r| {
                let loc = r.get_start().get_file_location();
                let file = loc
                    .file
                    .map(|f| f.get_path())
                    .unwrap_or_else(|| PathBuf::from("<builtin>"));
                (file, loc.offset)
            })
            .unwrap_or_else(|| (PathBuf::from("<builtin>"), 0));
        let name = entity
            .get_name()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("__anon_{offset}"));

        // Reserve the id before descending into members so self-references
        // resolve to it.
        let id = self.model.add_decl(Decl {
            name: name.clone(),
            namespace: namespace.map(str::to_string),
            file,
            offset,
            comment: entity.get_comment(),
            status: Status::Ok,
            kind: DeclKind::Class(ClassDecl {
                tag: ClassTag::Struct,
                size: 0,
                bases: Vec::new(),
                fields: Vec::new(),
                nested: Vec::new(),
            }),
        });
        self.by_usr.insert(usr, id);

        let kind = match entity.get_kind() {
            EntityKind::StructDecl | EntityKind::ClassDecl | EntityKind::UnionDecl => {
                self.extract_class(&entity, namespace, &name)
            }
            EntityKind::EnumDecl => self.extract_enum(&entity),
            EntityKind::TypedefDecl => self.extract_typedef(&entity, namespace)?,
            other => anyhow::bail!("unsupported declaration kind {other:?} for '{name}'"),
        };
        self.model.decl_mut(id).kind = kind;
        trace!(name = %self.model.decl(id).name, "interned declaration");
        Ok(id)
    }

    fn extract_class(&mut self, entity: &Entity, namespace: Option<&str>, name: &str) -> DeclKind {
        let tag = match entity.get_kind() {
            EntityKind::ClassDecl => ClassTag::Class,
            EntityKind::UnionDecl => ClassTag::Union,
            _ => ClassTag::Struct,
        };
        let size = entity
            .get_type()
            .and_then(|t| t.get_sizeof().ok())
            .unwrap_or(0);

        let mut bases = Vec::new();
        let mut fields = Vec::new();
        let mut nested = Vec::new();
        for child in entity.get_children() {
            match child.get_kind() {
                EntityKind::BaseSpecifier => {
                    if let Some(ty) = child.get_type() {
                        match self.map_type(&ty, namespace) {
                            Ok(base) => bases.push(base),
                            Err(e) => warn!(class = %name, err = %e, "skipping base type"),
                        }
                    }
                }
                EntityKind::FieldDecl => {
                    fields.push(self.extract_field(&child, namespace, name));
                }
                EntityKind::StructDecl
                | EntityKind::ClassDecl
                | EntityKind::UnionDecl
                | EntityKind::EnumDecl
                | EntityKind::TypedefDecl => match self.intern(&child, namespace) {
                    Ok(id) => nested.push(id),
                    Err(e) => warn!(class = %name, err = %e, "skipping nested declaration"),
                },
                _ => {}
            }
        }

        DeclKind::Class(ClassDecl {
            tag,
            size,
            bases,
            fields,
            nested,
        })
    }

    fn extract_field(&mut self, child: &Entity, namespace: Option<&str>, class: &str) -> Field {
        let field_name = child.get_name().unwrap_or_default();
        let field_type = child.get_type();
        let size = field_type
            .as_ref()
            .and_then(|t| t.get_sizeof().ok())
            .unwrap_or(0);
        // A field whose type cannot be mapped still occupies its bytes;
        // degrade the type but keep the size so layout sums stay honest.
        let ty = match field_type {
            Some(ref t) => match self.map_type(t, namespace) {
                Ok(ty) => ty,
                Err(e) => {
                    warn!(class = %class, field = %field_name, err = %e, "unmapped field type");
                    TypeRef::Primitive(Primitive::Void)
                }
            },
            None => TypeRef::Primitive(Primitive::Void),
        };

        let mut field = Field::new(field_name, ty, size);
        if child.is_bit_field() {
            field.bit_width = child.get_bit_field_width();
        }
        field.comment = child.get_comment();
        field
    }

    fn extract_enum(&mut self, entity: &Entity) -> DeclKind {
        let size = entity
            .get_type()
            .and_then(|t| t.get_sizeof().ok())
            .unwrap_or(0);
        let unsigned = entity
            .get_enum_underlying_type()
            .map(|t| {
                matches!(
                    t.get_canonical_type().get_kind(),
                    TypeKind::CharU
                        | TypeKind::UChar
                        | TypeKind::UShort
                        | TypeKind::UInt
                        | TypeKind::ULong
                        | TypeKind::ULongLong
                )
            })
            .unwrap_or(false);

        let mut items = Vec::new();
        for child in entity.get_children() {
            if child.get_kind() != EntityKind::EnumConstantDecl {
                continue;
            }
            let name = child.get_name().unwrap_or_default();
            let (signed, unsigned_val) = child.get_enum_constant_value().unwrap_or((0, 0));
            let value = if unsigned {
                unsigned_val.to_string()
            } else {
                signed.to_string()
            };
            items.push(EnumItem { name, value });
        }

        DeclKind::Enum(EnumDecl { size, items })
    }

    fn extract_typedef(&mut self, entity: &Entity, namespace: Option<&str>) -> Result<DeclKind> {
        let underlying = entity
            .get_typedef_underlying_type()
            .context("typedef has no underlying type")?;
        let element = self.map_type(&underlying, namespace)?;
        Ok(DeclKind::Typedef(TypedefDecl { element }))
    }

    // -----------------------------------------------------------------------
    // Type mapping: clang TypeKind → TypeRef
    // -----------------------------------------------------------------------

    fn map_type(&mut self, ty: &ClangType, namespace: Option<&str>) -> Result<TypeRef> {
        let base = self.map_unqualified(ty, namespace)?;
        let mut r = base;
        if ty.is_volatile_qualified() && !matches!(r, TypeRef::Qualified(Qualifier::Volatile, _)) {
            r = TypeRef::Qualified(Qualifier::Volatile, Box::new(r));
        }
        if ty.is_const_qualified() && !matches!(r, TypeRef::Qualified(Qualifier::Const, _)) {
            r = TypeRef::Qualified(Qualifier::Const, Box::new(r));
        }
        Ok(r)
    }

    fn map_unqualified(&mut self, ty: &ClangType, namespace: Option<&str>) -> Result<TypeRef> {
        match ty.get_kind() {
            TypeKind::Void => Ok(TypeRef::Primitive(Primitive::Void)),
            TypeKind::Bool => Ok(TypeRef::Primitive(Primitive::Bool)),
            TypeKind::CharS | TypeKind::SChar => Ok(TypeRef::Primitive(Primitive::Char)),
            TypeKind::CharU | TypeKind::UChar => Ok(TypeRef::Primitive(Primitive::UChar)),
            TypeKind::Short => Ok(TypeRef::Primitive(Primitive::Short)),
            TypeKind::UShort => Ok(TypeRef::Primitive(Primitive::UShort)),
            TypeKind::Int => Ok(TypeRef::Primitive(Primitive::Int)),
            TypeKind::UInt => Ok(TypeRef::Primitive(Primitive::UInt)),
            TypeKind::Long => Ok(TypeRef::Primitive(Primitive::Long)),
            TypeKind::ULong => Ok(TypeRef::Primitive(Primitive::ULong)),
            TypeKind::LongLong => Ok(TypeRef::Primitive(Primitive::LongLong)),
            TypeKind::ULongLong => Ok(TypeRef::Primitive(Primitive::ULongLong)),
            TypeKind::Float => Ok(TypeRef::Primitive(Primitive::Float)),
            TypeKind::Double => Ok(TypeRef::Primitive(Primitive::Double)),
            TypeKind::LongDouble => Ok(TypeRef::Primitive(Primitive::LongDouble)),
            TypeKind::WChar => Ok(TypeRef::Primitive(Primitive::WChar)),
            TypeKind::Char16 => Ok(TypeRef::Primitive(Primitive::Char16)),
            TypeKind::Char32 => Ok(TypeRef::Primitive(Primitive::Char32)),

            TypeKind::Pointer | TypeKind::LValueReference | TypeKind::RValueReference => {
                let pointee = ty
                    .get_pointee_type()
                    .context("pointer has no pointee type")?;
                let inner = self.map_type(&pointee, namespace)?;
                Ok(TypeRef::Pointer(Box::new(inner)))
            }

            TypeKind::ConstantArray => {
                let elem = ty.get_element_type().context("array has no element type")?;
                let len = ty.get_size().unwrap_or(0);
                let inner = self.map_type(&elem, namespace)?;
                Ok(TypeRef::Array(Box::new(inner), len))
            }

            TypeKind::IncompleteArray => {
                let elem = ty
                    .get_element_type()
                    .context("incomplete array has no element type")?;
                let inner = self.map_type(&elem, namespace)?;
                Ok(TypeRef::Pointer(Box::new(inner)))
            }

            TypeKind::Elaborated => {
                let inner = ty
                    .get_elaborated_type()
                    .context("elaborated type has no inner type")?;
                self.map_unqualified(&inner, namespace)
            }

            TypeKind::Typedef => {
                let decl = ty.get_declaration().context("typedef has no declaration")?;
                // va_list is a compiler built-in with no portable canonical type
                if let Some(name) = decl.get_name()
                    && matches!(
                        name.as_str(),
                        "va_list" | "__builtin_va_list" | "__gnuc_va_list"
                    )
                {
                    return Ok(TypeRef::Pointer(Box::new(TypeRef::Primitive(
                        Primitive::Void,
                    ))));
                }
                let id = self.intern(&decl, namespace)?;
                Ok(TypeRef::Typedef(id))
            }

            TypeKind::Record | TypeKind::Enum => {
                let decl = ty
                    .get_declaration()
                    .context("record/enum type has no declaration")?;
                let id = self.intern(&decl, namespace)?;
                Ok(TypeRef::Decl(id))
            }

            // Member-function pointers and prototypes carry no layout the
            // reconciler preserves; a void core keeps pointer chains intact.
            TypeKind::FunctionPrototype | TypeKind::FunctionNoPrototype => {
                Ok(TypeRef::Primitive(Primitive::Void))
            }

            other => anyhow::bail!("unsupported clang type kind: {other:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Raw-text macro index
// ---------------------------------------------------------------------------

/// Scan the target header's raw text for `DO_ARRAY_DEFINE`/`DO_LIST_DEFINE`
/// and mark every target declaration whose span starts at a hit offset.
/// The parser has already inlined the expansions; this recovers their
/// origin. Multiple declarations sharing one offset take the same marker.
fn apply_macro_markers(model: &mut TypeModel, text: &str) {
    const MARKERS: [(&str, Status); 2] = [
        ("DO_ARRAY_DEFINE", Status::MacroArray),
        ("DO_LIST_DEFINE", Status::MacroList),
    ];
    let target_file = model.target_file.clone();
    let target_ids = model.target.clone();
    for (needle, status) in MARKERS {
        let mut start = 0;
        while let Some(pos) = text[start..].find(needle) {
            let offset = (start + pos) as u32;
            for &id in &target_ids {
                let decl = model.decl_mut(id);
                if decl.offset == offset && decl.file == target_file {
                    debug!(name = %decl.name, marker = needle, "macro origin recovered");
                    decl.status = status;
                }
            }
            start += pos + needle.len();
        }
    }
}
