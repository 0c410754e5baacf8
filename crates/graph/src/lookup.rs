//! Name lookup tables for call resolution
//!
//! Built once per graph construction from the full object list, then read
//! only. All maps store indices into the caller's object vector rather
//! than copies of the objects.
//!
//! The strict-cleaner global rule: a packaged object registers only its
//! fully qualified name globally; its simple name and intermediate
//! suffixes never enter the global maps. Standalone objects register their
//! simple name. Under its own package every object additionally registers
//! its simple name, which is what resolution's package-local steps use.
//!
//! Conflicting global registrations move the name into the skip set and
//! evict whatever was registered; skipped names accept nothing further.

use oradep_core::CodeObject;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, trace, warn};

/// Per-package lookup of simple names.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PackageLookup {
    pub normal: HashMap<String, usize>,
    pub overloaded: HashMap<String, BTreeSet<usize>>,
}

/// Global and package-local name tables plus the ambiguity skip set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LookupTables {
    /// Non-overloaded entries keyed by globally registered name.
    pub global_normal: HashMap<String, usize>,
    /// Overload sets keyed by globally registered name.
    pub global_over: HashMap<String, BTreeSet<usize>>,
    /// Simple-name lookups keyed by the owning package (empty string for
    /// standalone objects).
    pub package_local: HashMap<String, PackageLookup>,
    /// Names deemed ambiguous; resolution never touches them.
    pub skip: HashSet<String>,
}

impl LookupTables {
    /// Build the tables from `objects`. Indices in the returned maps refer
    /// to positions in that slice.
    pub fn build(objects: &[CodeObject]) -> Self {
        info!(count = objects.len(), "building lookup tables");
        let mut tables = LookupTables::default();

        for (idx, object) in objects.iter().enumerate() {
            debug_assert!(!object.id.is_empty(), "objects must carry generated IDs");
            trace!(id = object.id.as_str(), "registering object");

            // Package-local registration always uses the simple name under
            // the object's own package context.
            let local = tables
                .package_local
                .entry(object.package_name.clone())
                .or_default();
            if object.overloaded {
                local.overloaded.entry(object.name.clone()).or_default().insert(idx);
            } else {
                if let Some(&prev) = local.normal.get(&object.name)
                    && prev != idx
                {
                    warn!(
                        package = object.package_name.as_str(),
                        name = object.name.as_str(),
                        previous = objects[prev].id.as_str(),
                        new = object.id.as_str(),
                        "package-local name collision, keeping the newer object"
                    );
                }
                local.normal.insert(object.name.clone(), idx);
            }

            // Strict-cleaner global rule: qualified name only.
            tables.register_global(objects, object.qualified_name(), idx);
        }

        tables.validate_overload_sets(objects);

        if !tables.skip.is_empty() {
            let mut skipped: Vec<&String> = tables.skip.iter().collect();
            skipped.sort();
            warn!(names = ?skipped, "ambiguous global names excluded from resolution");
        }
        tables
    }

    fn register_global(&mut self, objects: &[CodeObject], name: String, idx: usize) {
        if self.skip.contains(&name) {
            trace!(name = name.as_str(), "name already skipped, ignoring registration");
            return;
        }
        let object = &objects[idx];

        if object.overloaded {
            if self.global_normal.contains_key(&name) {
                warn!(
                    name = name.as_str(),
                    id = object.id.as_str(),
                    "overload clashes with a non-overloaded entry, skipping name"
                );
                self.skip.insert(name.clone());
                self.global_normal.remove(&name);
                return;
            }
            self.global_over.entry(name.clone()).or_default().insert(idx);
            trace!(name = name.as_str(), id = object.id.as_str(), "registered global overload");
        } else {
            if let Some(&prev) = self.global_normal.get(&name) {
                // A different object under the same key is ambiguity even
                // when the ID strings coincide (same name, two files).
                if prev != idx {
                    warn!(
                        name = name.as_str(),
                        previous = objects[prev].id.as_str(),
                        new = object.id.as_str(),
                        "ambiguous non-overloaded global name, skipping"
                    );
                    self.skip.insert(name.clone());
                    self.global_normal.remove(&name);
                    self.global_over.remove(&name);
                }
                return;
            }
            if self.global_over.contains_key(&name) {
                warn!(
                    name = name.as_str(),
                    id = object.id.as_str(),
                    "non-overloaded object clashes with an overload set, skipping name"
                );
                self.skip.insert(name.clone());
                self.global_over.remove(&name);
                return;
            }
            self.global_normal.insert(name.clone(), idx);
            trace!(name = name.as_str(), id = object.id.as_str(), "registered global normal");
        }
    }

    /// An entry in the overload map with fewer than two members is not a
    /// real overload set: a single survivor is reclassified as a normal
    /// entry (subject to the usual conflict policy), an empty set dropped.
    fn validate_overload_sets(&mut self, objects: &[CodeObject]) {
        let mut invalid: Vec<(String, Option<usize>)> = Vec::new();
        for (name, set) in &self.global_over {
            if set.len() < 2 {
                invalid.push((name.clone(), set.iter().next().copied()));
            }
        }
        for (name, survivor) in invalid {
            warn!(
                name = name.as_str(),
                members = survivor.is_some() as usize,
                "overload set below two members, reclassifying"
            );
            self.global_over.remove(&name);
            let Some(idx) = survivor else { continue };
            if self.skip.contains(&name) {
                debug!(name = name.as_str(), "already skipped, not reclassifying");
                continue;
            }
            if let Some(&prev) = self.global_normal.get(&name) {
                if prev != idx {
                    warn!(
                        name = name.as_str(),
                        previous = objects[prev].id.as_str(),
                        new = objects[idx].id.as_str(),
                        "reclassification conflicts with a normal entry, skipping name"
                    );
                    self.skip.insert(name.clone());
                    self.global_normal.remove(&name);
                }
            } else {
                info!(name = name.as_str(), id = objects[idx].id.as_str(), "reclassified lone overload as normal");
                self.global_normal.insert(name, idx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oradep_core::{ObjectKind, Parameter};
    use pretty_assertions::assert_eq;

    fn object(name: &str, pkg: &str) -> CodeObject {
        let mut o = CodeObject::new(name, pkg, ObjectKind::Procedure);
        o.generate_id();
        o
    }

    fn overload(name: &str, pkg: &str, param: &str) -> CodeObject {
        let mut o = CodeObject::new(name, pkg, ObjectKind::Procedure);
        o.overloaded = true;
        o.parameters = vec![Parameter::new(param, "NUMBER")];
        o.generate_id();
        o
    }

    #[test]
    fn test_packaged_object_registers_fqn_only() {
        let objects = vec![object("proc", "pkg.sub")];
        let tables = LookupTables::build(&objects);

        assert!(tables.global_normal.contains_key("pkg.sub.proc"));
        assert!(!tables.global_normal.contains_key("proc"));
        assert!(!tables.global_normal.contains_key("sub.proc"));
        assert_eq!(tables.package_local["pkg.sub"].normal["proc"], 0);
    }

    #[test]
    fn test_standalone_object_registers_simple_name() {
        let objects = vec![object("solo", "")];
        let tables = LookupTables::build(&objects);
        assert_eq!(tables.global_normal["solo"], 0);
        assert!(tables.package_local[""].normal.contains_key("solo"));
    }

    #[test]
    fn test_duplicate_global_name_skipped() {
        // Two standalone objects sharing a name are two distinct
        // definitions; the name is ambiguous even though their ID strings
        // coincide.
        let objects = vec![object("global_dup", ""), object("global_dup", "")];

        let tables = LookupTables::build(&objects);
        assert!(tables.skip.contains("global_dup"));
        assert!(!tables.global_normal.contains_key("global_dup"));
    }

    #[test]
    fn test_overload_set_registration() {
        let objects = vec![overload("f", "pkg", "a"), overload("f", "pkg", "b")];
        let tables = LookupTables::build(&objects);

        let set = &tables.global_over["pkg.f"];
        assert_eq!(set.len(), 2);
        assert_eq!(tables.package_local["pkg"].overloaded["f"].len(), 2);
        assert!(!tables.global_normal.contains_key("pkg.f"));
    }

    #[test]
    fn test_normal_then_overload_conflict() {
        let mut plain = object("f", "pkg");
        plain.id = "pkg.f".into();
        let objects = vec![plain, overload("f", "pkg", "a")];
        let tables = LookupTables::build(&objects);

        assert!(tables.skip.contains("pkg.f"));
        assert!(!tables.global_normal.contains_key("pkg.f"));
        assert!(!tables.global_over.contains_key("pkg.f"));
    }

    #[test]
    fn test_overload_then_normal_conflict() {
        let objects = vec![
            overload("f", "pkg", "a"),
            overload("f", "pkg", "b"),
            {
                let mut plain = CodeObject::new("f", "pkg", ObjectKind::Procedure);
                plain.id = "pkg.f".into();
                plain
            },
        ];
        let tables = LookupTables::build(&objects);
        assert!(tables.skip.contains("pkg.f"));
        assert!(!tables.global_over.contains_key("pkg.f"));
    }

    #[test]
    fn test_single_member_overload_reclassified() {
        // Marked overloaded (structural duplicate) but only one survived.
        let objects = vec![overload("f", "pkg", "a")];
        let tables = LookupTables::build(&objects);

        assert!(!tables.global_over.contains_key("pkg.f"));
        assert_eq!(tables.global_normal["pkg.f"], 0);
        // Package-local overload set is untouched by global validation.
        assert_eq!(tables.package_local["pkg"].overloaded["f"].len(), 1);
    }

    #[test]
    fn test_skipped_name_blocks_later_registration() {
        let objects = vec![object("dup", ""), object("dup", ""), object("dup", "")];
        let tables = LookupTables::build(&objects);

        assert!(tables.skip.contains("dup"));
        assert!(!tables.global_normal.contains_key("dup"));
        assert!(!tables.global_over.contains_key("dup"));
    }
}
