//! Declaration-list lookups and the prebuilt-type cache.
//!
//! The model keeps two ordered declaration lists (input, target) plus the
//! target-global list. Lookups are name-driven through the matcher;
//! iteration direction is part of the contract (later declarations shadow
//! earlier ones on the input side).

use tracing::warn;

use crate::config::Config;
use crate::error::Error;
use crate::matcher;
use crate::model::{Decl, DeclId, DeclKind, TypeModel, TypeRef};

impl TypeModel {
    /// Find a declaration by name, iterating last-to-first. The remap table
    /// is applied inside the matcher.
    pub fn find_by_name(&self, list: &[DeclId], name: &str, cfg: &Config) -> Option<DeclId> {
        list.iter().rev().copied().find(|&id| {
            let d = self.decl(id);
            let local = matcher::strip_namespace(&d.name, d.namespace.as_deref());
            matcher::names_match(cfg, local, name)
        })
    }

    /// Find the declaration a type reference denotes. Linear search in list
    /// order.
    pub fn find_by_type(&self, list: &[DeclId], tref: &TypeRef, cfg: &Config) -> Option<DeclId> {
        list.iter()
            .copied()
            .find(|&id| matcher::typeref_matches_decl(cfg, self, tref, id))
    }

    pub fn contains_type(&self, list: &[DeclId], tref: &TypeRef, cfg: &Config) -> bool {
        self.find_by_type(list, tref, cfg).is_some()
    }

    pub fn contains_name(&self, list: &[DeclId], name: &str, cfg: &Config) -> bool {
        self.find_by_name(list, name, cfg).is_some()
    }

    /// Load the prebuilt-type cache: every configured known name and every
    /// reserved-suffix remap target, looked up in the input list. Missing
    /// entries warn but do not fail construction.
    ///
    /// Class-like declarations are cached as a pointer wrapper (reference
    /// types are always used through a pointer); enums and typedefs are
    /// cached bare.
    pub fn load_prebuilt(&mut self, cfg: &Config) {
        let names: Vec<String> = cfg
            .known_names
            .iter()
            .cloned()
            .chain(cfg.known_reserved_suffixes.values().cloned())
            .collect();
        for name in names {
            if self.prebuilt.contains_key(&name) {
                continue;
            }
            match self.find_by_name(&self.input, &name, cfg) {
                Some(id) => {
                    let tref = match self.decl(id).kind {
                        DeclKind::Class(_) => TypeRef::Pointer(Box::new(TypeRef::Decl(id))),
                        DeclKind::Enum(_) => TypeRef::Decl(id),
                        DeclKind::Typedef(_) => TypeRef::Typedef(id),
                    };
                    self.prebuilt.insert(name, tref);
                }
                None => warn!(name = %name, "prebuilt type not found in input header"),
            }
        }
    }
}

/// Stable ascending sort by (source file, offset). With `strict`, entries
/// from more than one source file are a fatal error.
pub fn sort_by_source_span(
    decls: &[Decl],
    list: &mut [DeclId],
    strict: bool,
) -> Result<(), Error> {
    if strict {
        let mut files = list.iter().map(|&id| &decls[id.0 as usize].file);
        if let Some(first) = files.next()
            && let Some(other) = files.find(|f| *f != first)
        {
            return Err(Error::MixedSourceFiles(first.clone(), other.clone()));
        }
    }
    list.sort_by(|&a, &b| {
        let (da, db) = (&decls[a.0 as usize], &decls[b.0 as usize]);
        da.file.cmp(&db.file).then(da.offset.cmp(&db.offset))
    });
    Ok(())
}
