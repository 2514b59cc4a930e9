//! Orphan scanner.
//!
//! Finds `<root>/<name>/.orc/config.json` descriptors whose `place_id` has no catalog
//! record. An id in the caller's known-set is never an orphan; anything else gets
//! one fresh catalog lookup before it is reported, so a known-set computed earlier in
//! the same run cannot produce false positives. A directory that a live record owns by
//! name (a workbench of that name, a workshop with that id) is never an orphan, whatever
//! its descriptor says: the owner's apply rewrites the descriptor instead.

use crate::catalog::Catalog;
use crate::core::error::OrcError;
use crate::core::schemas::{GATEHOUSE_ID_PREFIX, WORKBENCH_ID_PREFIX};
use crate::infra::descriptor::{CONTROL_DIR, DESCRIPTOR_FILE, read_descriptor};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Workbench and gatehouse ids are disjoint namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceFamily {
    Workbench,
    Gatehouse,
}

impl PlaceFamily {
    pub fn prefix(&self) -> &'static str {
        match self {
            PlaceFamily::Workbench => WORKBENCH_ID_PREFIX,
            PlaceFamily::Gatehouse => GATEHOUSE_ID_PREFIX,
        }
    }

    pub fn owns(&self, place_id: &str) -> bool {
        place_id
            .strip_prefix(self.prefix())
            .is_some_and(|rest| rest.starts_with('-'))
    }

    fn cataloged(&self, catalog: &dyn Catalog, place_id: &str) -> Result<bool, OrcError> {
        match self {
            PlaceFamily::Workbench => catalog.workbench_exists(place_id),
            PlaceFamily::Gatehouse => catalog.gatehouse_exists(place_id),
        }
    }

    /// Whether a live record's layout path is the directory named `dir_name`.
    fn claims_dir(&self, catalog: &dyn Catalog, dir_name: &str) -> Result<bool, OrcError> {
        match self {
            PlaceFamily::Workbench => catalog.workbench_name_exists(dir_name),
            PlaceFamily::Gatehouse => Ok(catalog.get_workshop(dir_name)?.is_some()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Orphan {
    pub id: String,
    /// Directory name under the scanned root.
    pub name: String,
    pub path: PathBuf,
}

pub fn scan_orphans(
    root: &Path,
    family: PlaceFamily,
    known: &HashSet<String>,
    catalog: &dyn Catalog,
) -> Result<Vec<Orphan>, OrcError> {
    let mut orphans = Vec::new();
    if !root.is_dir() {
        return Ok(orphans);
    }

    let walker = WalkDir::new(root)
        .min_depth(3)
        .max_depth(3)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() != 2 || e.file_name() == CONTROL_DIR);

    for entry in walker.filter_map(|e| e.ok()) {
        if entry.file_name() != DESCRIPTOR_FILE || !entry.file_type().is_file() {
            continue;
        }
        let Some(managed_dir) = entry.path().parent().and_then(Path::parent) else {
            continue;
        };
        let Some(descriptor) = read_descriptor(entry.path()) else {
            continue;
        };
        let id = descriptor.place_id;
        if !family.owns(&id) || known.contains(&id) {
            continue;
        }
        if family.cataloged(catalog, &id)? {
            tracing::debug!(%id, "descriptor not in known set but cataloged");
            continue;
        }
        let name = managed_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if family.claims_dir(catalog, &name)? {
            tracing::warn!(%id, path = %managed_dir.display(), "stale descriptor in a cataloged directory");
            continue;
        }
        tracing::info!(%id, path = %managed_dir.display(), "orphan found");
        orphans.push(Orphan {
            id,
            name,
            path: managed_dir.to_path_buf(),
        });
    }
    Ok(orphans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SqliteCatalog;
    use crate::infra::descriptor::{Descriptor, descriptor_path};
    use std::fs;

    fn place(root: &Path, name: &str, id: &str) {
        let path = descriptor_path(&root.join(name));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, Descriptor::new(id).render().unwrap()).unwrap();
    }

    #[test]
    fn family_prefixes_do_not_overlap() {
        assert!(PlaceFamily::Workbench.owns("BENCH-001"));
        assert!(!PlaceFamily::Workbench.owns("GATE-001"));
        assert!(!PlaceFamily::Gatehouse.owns("GATEWAY-1"));
    }

    #[test]
    fn missing_root_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cat = SqliteCatalog::open(&dir.path().join("orc.db")).unwrap();
        let found = scan_orphans(
            &dir.path().join("absent"),
            PlaceFamily::Workbench,
            &HashSet::new(),
            &cat,
        )
        .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn directory_owned_by_a_live_record_is_not_an_orphan() {
        let dir = tempfile::tempdir().unwrap();
        let cat = SqliteCatalog::open(&dir.path().join("orc.db")).unwrap();
        let factory = cat.create_factory("main").unwrap();
        let workshop = cat.create_workshop("forge", &factory.id).unwrap();
        cat.create_workbench("bench-a", &workshop.id, None, "").unwrap();
        let benches = dir.path().join("benches");
        let gates = dir.path().join("gates");
        place(&benches, "bench-a", "BENCH-777");
        place(&gates, &workshop.id, "GATE-777");

        let found =
            scan_orphans(&benches, PlaceFamily::Workbench, &HashSet::new(), &cat).unwrap();
        assert!(found.is_empty());
        let found =
            scan_orphans(&gates, PlaceFamily::Gatehouse, &HashSet::new(), &cat).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn nested_descriptors_are_not_matched() {
        let dir = tempfile::tempdir().unwrap();
        let cat = SqliteCatalog::open(&dir.path().join("orc.db")).unwrap();
        let root = dir.path().join("benches");
        place(&root.join("outer"), "inner", "BENCH-009");
        place(&root, "direct", "BENCH-008");

        let found =
            scan_orphans(&root, PlaceFamily::Workbench, &HashSet::new(), &cat).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "BENCH-008");
        assert_eq!(found[0].name, "direct");
    }
}
