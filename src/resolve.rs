//! Reconciliation — rewrite each target declaration's layout against its
//! input counterpart.
//!
//! The target list is walked last-to-first by source span. Classes take the
//! fast path when field count and aggregate size agree, otherwise fields
//! are reassembled from the input side with inherited base fields filtered
//! out. Referenced types are resolved transitively; types missing from the
//! target are queued for insertion, unresolvable pointers decay to the
//! configured object type. A monotonic walked-name set guards against
//! cyclic type graphs.

use std::collections::HashSet;

use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::matcher;
use crate::model::{DeclId, DeclKind, Field, Primitive, Status, TypeModel, TypeRef};

/// Run the full resolution pass over the target list, then deduplicate the
/// insertion map.
pub fn reconcile(model: &mut TypeModel, cfg: &Config) {
    let mut resolver = Resolver {
        model,
        cfg,
        walked: HashSet::new(),
    };
    resolver.run();
}

struct Resolver<'a> {
    model: &'a mut TypeModel,
    cfg: &'a Config,
    walked: HashSet<String>,
}

impl Resolver<'_> {
    fn run(&mut self) {
        let order = self.model.target.clone();
        for &id in order.iter().rev() {
            let decl = self.model.decl(id);
            // Macro-marked declarations are re-emitted through the macro;
            // their bodies are never reconciled.
            if matches!(decl.status, Status::MacroArray | Status::MacroList) {
                continue;
            }
            match decl.kind {
                DeclKind::Class(_) => {
                    if !self.walk_class(id) {
                        let d = self.model.decl_mut(id);
                        if d.status == Status::Ok {
                            d.status = Status::Unresolved;
                        }
                        warn!(name = %self.model.decl(id).name, "no matching input class");
                    }
                }
                DeclKind::Enum(_) => self.walk_enum(id),
                DeclKind::Typedef(_) => {}
            }
        }
        self.plan_insertions();
    }

    // -----------------------------------------------------------------------
    // Per-class field walk
    // -----------------------------------------------------------------------

    fn walk_class(&mut self, id: DeclId) -> bool {
        let name = self.model.decl(id).name.clone();
        if !self.walked.insert(name.clone()) {
            return true;
        }
        let Some(input_id) = self.model.find_by_name(&self.model.input, &name, self.cfg) else {
            return false;
        };
        let Some(input_class) = self.model.decl(input_id).as_class() else {
            return false;
        };
        let in_fields: Vec<Field> = input_class.fields.clone();
        let Some(target_class) = self.model.decl(id).as_class() else {
            return false;
        };
        let t_fields: Vec<Field> = target_class.fields.clone();

        let in_sum: usize = in_fields.iter().map(|f| f.size).sum();
        let t_sum: usize = t_fields.iter().map(|f| f.size).sum();

        let rebuilt = if in_fields.len() == t_fields.len() && in_sum == t_sum {
            trace!(class = %name, fields = in_fields.len(), "layout agrees, pairwise compare");
            in_fields
                .into_iter()
                .zip(t_fields)
                .map(|(fi, ft)| self.compare_field(id, fi, ft))
                .collect()
        } else {
            debug!(
                class = %name,
                input_fields = in_fields.len(),
                target_fields = t_fields.len(),
                "layout differs, rebuilding from input"
            );
            self.rebuild_fields(id, in_fields, &t_fields)
        };

        if let Some(c) = self.model.decl_mut(id).as_class_mut() {
            c.fields = rebuilt;
        }
        true
    }

    /// Slow path: reassemble the field list from the input side, dropping
    /// fields inherited through the target's base classes.
    fn rebuild_fields(&mut self, id: DeclId, in_fields: Vec<Field>, t_fields: &[Field]) -> Vec<Field> {
        let base_fields = self.gather_base_fields(id);

        // Input fields past the last one matching the target's final field
        // do not belong to this class's layout.
        let mut upto = in_fields.len();
        if let Some(last) = t_fields.last()
            && let Some(pos) = in_fields
                .iter()
                .rposition(|f| backing_name(&f.name) == last.name)
        {
            upto = pos + 1;
        }

        let mut rebuilt: Vec<Field> = Vec::new();
        for fi in in_fields[..upto].iter().rev() {
            let fname = backing_name(&fi.name).to_string();
            if let Some(ft) = t_fields.iter().find(|t| t.name == fname) {
                let mut fi = fi.clone();
                fi.name = fname;
                rebuilt.push(self.compare_field(id, fi, ft.clone()));
            } else if base_fields.contains(&fname) {
                // inherited; re-emitted through the base class
            } else {
                let mut f = fi.clone();
                f.name = fname;
                if !self.try_update_field(id, &mut f) {
                    f.status = Status::Unresolved;
                }
                rebuilt.push(f);
            }
        }
        rebuilt.reverse();
        rebuilt
    }

    /// Field names contributed by the target class's transitive bases. Each
    /// base is walked first so its own layout is already reconciled.
    fn gather_base_fields(&mut self, id: DeclId) -> HashSet<String> {
        let mut out = HashSet::new();
        let bases: Vec<TypeRef> = self
            .model
            .decl(id)
            .as_class()
            .map(|c| c.bases.clone())
            .unwrap_or_default();
        for base in bases {
            if let TypeRef::Decl(bid) = base.core() {
                let bid = *bid;
                if self.model.decl(bid).is_class() {
                    self.walk_class(bid);
                    self.collect_field_names(bid, &mut out);
                }
            }
        }
        out
    }

    fn collect_field_names(&self, id: DeclId, out: &mut HashSet<String>) {
        let Some(c) = self.model.decl(id).as_class() else {
            return;
        };
        out.extend(c.fields.iter().map(|f| f.name.clone()));
        for base in &c.bases {
            if let TypeRef::Decl(bid) = base.core() {
                self.collect_field_names(*bid, out);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Field comparison
    // -----------------------------------------------------------------------

    /// Choose between the input and target renditions of one field.
    fn compare_field(&mut self, owner: DeclId, mut fi: Field, mut ft: Field) -> Field {
        self.collapse_wrapper(&mut fi);
        self.collapse_wrapper(&mut ft);

        let fi_known = self.is_known_field(&fi);
        let ft_known = self.is_known_field(&ft);

        // Both sides already carry known types: the input layout wins and
        // the emitter spells it with the target's canonical names.
        if fi_known && ft_known {
            return fi;
        }
        if same_kind(&fi.ty, &ft.ty)
            && matcher::typerefs_match(self.cfg, self.model, &fi.ty, &ft.ty)
        {
            return ft;
        }
        // The target kept a concrete non-pointer type where the input has a
        // pointer: the narrower target type is authoritative.
        if fi.ty.has_pointer() && fi.name == ft.name && !ft.ty.has_pointer() && ft_known {
            return ft;
        }
        // Enum specialization in the target is preserved.
        if matches!(fi.ty, TypeRef::Primitive(_) | TypeRef::Typedef(_))
            && self.is_enum_or_primitive(&ft.ty)
        {
            return ft;
        }
        // A target padding field absorbing the input's strongly-typed field.
        if fi.size == ft.size && ft.name.starts_with(&fi.name) {
            return if self.try_update_field(owner, &mut fi) {
                fi
            } else {
                ft
            };
        }
        if !self.try_update_field(owner, &mut fi) {
            fi.status = Status::Unresolved;
        }
        fi
    }

    fn is_known_field(&self, f: &Field) -> bool {
        match f.ty.core() {
            TypeRef::Primitive(_) => true,
            core => {
                let name = self.model.type_name(core);
                self.cfg.is_known(&name)
                    || self
                        .model
                        .contains_type(&self.model.target_global, core, self.cfg)
            }
        }
    }

    fn is_enum_or_primitive(&self, t: &TypeRef) -> bool {
        match t {
            TypeRef::Primitive(_) => true,
            TypeRef::Decl(id) => self.model.decl(*id).is_enum(),
            _ => false,
        }
    }

    /// Collapse a nominal single-field wrapper (`struct { int32_t v; }`)
    /// into its underlying numeric. Wrapper types whose name contains `FP`
    /// are exempt.
    fn collapse_wrapper(&mut self, f: &mut Field) {
        let id = match &f.ty {
            TypeRef::Decl(id) => *id,
            _ => return,
        };
        let decl = self.model.decl(id);
        if decl.name.contains("FP") {
            return;
        }
        let Some(class) = decl.as_class() else {
            return;
        };
        if class.fields.len() != 1 {
            return;
        }
        let inner = match &class.fields[0].ty {
            TypeRef::Primitive(p) => Some(*p),
            TypeRef::Typedef(td) => match &self.model.decl(*td).kind {
                DeclKind::Typedef(t) => match &t.element {
                    TypeRef::Primitive(p) => Some(*p),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        };
        if let Some(p) = inner {
            trace!(field = %f.name, wrapper = %decl.name, "wrapper collapsed");
            f.ty = TypeRef::Primitive(p);
        }
    }

    // -----------------------------------------------------------------------
    // Hierarchy walk
    // -----------------------------------------------------------------------

    /// Make a field's type usable in the target universe, queuing missing
    /// referenced types for insertion under `owner`.
    fn try_update_field(&mut self, owner: DeclId, f: &mut Field) -> bool {
        match f.ty.core() {
            TypeRef::Primitive(_) | TypeRef::Typedef(_) => return true,
            core => {
                if self.cfg.is_known(&self.model.type_name(core)) {
                    return true;
                }
            }
        }
        if f.ty.has_pointer() {
            let base = f.ty.core().clone();
            if self
                .model
                .contains_type(&self.model.target_global, &base, self.cfg)
            {
                return true;
            }
            return self.walk_type_hierarchy(owner, &mut f.ty, false);
        }
        if self
            .model
            .contains_type(&self.model.target_global, f.ty.core(), self.cfg)
        {
            return true;
        }
        if self.walk_type_hierarchy(owner, &mut f.ty, true) {
            let core = f.ty.core().clone();
            if matches!(core, TypeRef::Decl(_))
                && !self
                    .model
                    .contains_type(&self.model.target_global, &core, self.cfg)
            {
                self.record_insertion(owner, core);
            }
            true
        } else {
            false
        }
    }

    fn record_insertion(&mut self, owner: DeclId, tref: TypeRef) {
        trace!(
            owner = %self.model.decl(owner).name,
            inserted = %self.model.type_name(tref.core()),
            "queued type insertion"
        );
        self.model
            .insertions
            .entry(owner)
            .or_default()
            .insert(0, tref);
    }

    fn walk_type_hierarchy(&mut self, owner: DeclId, tref: &mut TypeRef, deep: bool) -> bool {
        let core_name = self.model.type_name(tref.core());
        if self.walked.contains(&core_name) {
            return true;
        }
        if self.cfg.is_known(&core_name) {
            return deep;
        }
        match tref {
            TypeRef::Primitive(_) | TypeRef::Typedef(_) => deep,
            TypeRef::Array(inner, _) | TypeRef::Qualified(_, inner) => {
                self.walk_type_hierarchy(owner, inner, deep)
            }
            TypeRef::Decl(id) => {
                let id = *id;
                if self.model.decl(id).is_class() {
                    self.walked.insert(core_name);
                    self.walk_class_fields(owner, id)
                } else if self.model.decl(id).is_enum() {
                    if !self
                        .model
                        .contains_name(&self.model.target, &core_name, self.cfg)
                    {
                        *tref = self.int32_replacement();
                    }
                    true
                } else {
                    deep
                }
            }
            TypeRef::Pointer(elem) => {
                if let TypeRef::Decl(eid) = elem.core()
                    && self.model.decl(*eid).is_enum()
                {
                    let ename = self.model.decl(*eid).name.clone();
                    if !self.model.contains_name(&self.model.target, &ename, self.cfg) {
                        elem.replace_core(self.int32_replacement());
                    }
                    return true;
                }
                self.remap_pointer_element(tref)
            }
        }
    }

    /// Resolve every field of a to-be-inserted class, recording its own
    /// dependencies under the same target declaration.
    fn walk_class_fields(&mut self, owner: DeclId, class_id: DeclId) -> bool {
        let Some(fields) = self
            .model
            .decl(class_id)
            .as_class()
            .map(|c| c.fields.clone())
        else {
            return false;
        };
        let mut updated = Vec::with_capacity(fields.len());
        for mut f in fields {
            self.collapse_wrapper(&mut f);
            if !self.try_update_field(owner, &mut f) {
                f.status = Status::Unresolved;
            }
            updated.push(f);
        }
        if let Some(c) = self.model.decl_mut(class_id).as_class_mut() {
            c.fields = updated;
        }
        true
    }

    fn int32_replacement(&self) -> TypeRef {
        self.model
            .prebuilt
            .get("int32_t")
            .cloned()
            .unwrap_or(TypeRef::Primitive(Primitive::Int))
    }

    /// Rewrite an unresolvable pointer's element: reserved suffixes map to
    /// their configured target, generic delegate names map to `Action`,
    /// everything else decays to `Il2CppObject`. Outer wrappers stay.
    fn remap_pointer_element(&mut self, tref: &mut TypeRef) -> bool {
        let elem_name = self.model.type_name(tref.core());
        let replacement = if let Some((suffix, target)) = self.cfg.reserved_suffix_of(&elem_name) {
            match self.model.prebuilt.get(target) {
                Some(r) => {
                    if let TypeRef::Decl(id) = r.core()
                        && self.model.decl(*id).is_enum()
                    {
                        // enums survive suffix remapping intact
                        trace!(name = %elem_name, suffix, "suffix target is an enum, left intact");
                        return true;
                    }
                    r.core().clone()
                }
                None => {
                    warn!(name = %elem_name, to = %target, "missing prebuilt remap target");
                    return false;
                }
            }
        } else if matcher::is_generic(self.cfg, &elem_name)
            && (elem_name.starts_with("Action_") || elem_name.starts_with("Func_"))
        {
            match self.model.prebuilt.get("Action") {
                Some(r) => r.core().clone(),
                None => {
                    warn!(name = %elem_name, "missing prebuilt Action");
                    return false;
                }
            }
        } else {
            match self.model.prebuilt.get("Il2CppObject") {
                Some(r) => r.core().clone(),
                None => {
                    warn!(name = %elem_name, "missing prebuilt Il2CppObject");
                    return false;
                }
            }
        };
        trace!(from = %elem_name, "pointer element remapped");
        tref.replace_core(replacement);
        true
    }

    // -----------------------------------------------------------------------
    // Enum walk
    // -----------------------------------------------------------------------

    /// Adopt the input enum's items; the target keeps its name and position.
    fn walk_enum(&mut self, id: DeclId) {
        let name = self.model.decl(id).name.clone();
        let Some(input_id) = self.model.find_by_name(&self.model.input, &name, self.cfg) else {
            self.model.decl_mut(id).status = Status::Unresolved;
            warn!(name = %name, "no matching input enum");
            return;
        };
        let Some(items) = self.model.decl(input_id).as_enum().map(|e| e.items.clone()) else {
            self.model.decl_mut(id).status = Status::Unresolved;
            warn!(name = %name, "input counterpart is not an enum");
            return;
        };
        if let DeclKind::Enum(e) = &mut self.model.decl_mut(id).kind {
            e.items = items;
        }
    }

    // -----------------------------------------------------------------------
    // Insertion planning
    // -----------------------------------------------------------------------

    /// Deduplicate insertion lists globally: each additional type is emitted
    /// exactly once, attached to its earliest-source-order dependent.
    fn plan_insertions(&mut self) {
        let mut inserted: Vec<String> = Vec::new();
        let order = self.model.target.clone();
        let mut insertions = std::mem::take(&mut self.model.insertions);
        for id in order {
            let Some(list) = insertions.get_mut(&id) else {
                continue;
            };
            list.retain(|tref| {
                let name = self.model.type_name(tref.core());
                if inserted
                    .iter()
                    .any(|seen| matcher::names_match(self.cfg, seen, &name))
                {
                    false
                } else {
                    inserted.push(name);
                    true
                }
            });
        }
        self.model.insertions = insertions;
    }
}

/// Property backing fields keep their logical name.
fn backing_name(name: &str) -> &str {
    name.strip_suffix("_k__BackingField").unwrap_or(name)
}

fn same_kind(a: &TypeRef, b: &TypeRef) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}
